//! Per-frame instance buffer table.
//!
//! Instance buffers live in the device's per-frame instance memory, so the
//! table is emptied whenever the frame ends.

use parking_lot::Mutex;
use tessera_core::mesh::InstanceRecorder;

use crate::device::GraphicsDevice;
use crate::draw::InstanceBinding;
use crate::error::GraphicsError;

/// Default number of instance buffer IDs.
pub const MAX_INSTANCE_BUFFERS: usize = 32;

/// Table of this frame's instance buffers, indexed by ID.
#[derive(Debug)]
pub struct InstanceCache {
    entries: Mutex<Vec<Option<InstanceBinding>>>,
}

impl InstanceCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(vec![None; capacity]),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_valid_id(&self, id: u16) -> bool {
        usize::from(id) < self.capacity()
    }

    /// Copy the records of `recorder` into instance memory under `id`.
    ///
    /// Whatever `id` held is dropped first. When the frame's instance memory
    /// cannot hold every record, nothing is stored and
    /// [`GraphicsError::InstanceMemoryExhausted`] is returned.
    pub fn add_instances(
        &self,
        device: &dyn GraphicsDevice,
        id: u16,
        recorder: &InstanceRecorder,
    ) -> Result<(), GraphicsError> {
        let data_type = recorder.data_type().ok_or(GraphicsError::NotInstancing)?;

        let mut entries = self.entries.lock();
        let capacity = entries.len();
        let slot = entries.get_mut(usize::from(id)).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!("instance buffer id {id} outside 0..{capacity}"))
        })?;
        *slot = None;

        let count = recorder.instance_count();
        if count == 0 {
            log::debug!("Instance buffer {id} recorded no instances, leaving it empty");
            return Ok(());
        }

        let stride = data_type.stride() as u32;
        if device.avail_instance_buffer(count, stride) < count {
            log::warn!("Instance buffer memory exhausted, dropping {count} instances of buffer {id}");
            return Err(GraphicsError::InstanceMemoryExhausted);
        }
        let buffer = device.alloc_instance_buffer(recorder.bytes(), stride)?;
        *slot = Some(InstanceBinding { buffer, data_type });

        log::trace!("Instance buffer {id}: {count} x {data_type:?}");
        Ok(())
    }

    /// The binding stored under `id` this frame.
    pub fn get(&self, id: u16) -> Option<InstanceBinding> {
        self.entries
            .lock()
            .get(usize::from(id))
            .copied()
            .flatten()
    }

    /// Number of IDs holding instances.
    pub fn len(&self) -> usize {
        self.entries.lock().iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every binding. Called when the frame ends.
    pub fn clear(&self) {
        self.entries.lock().fill(None);
    }
}
