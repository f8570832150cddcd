//! In-memory graphics device for testing and development.
//!
//! This device doesn't touch a GPU. Buffers are byte vectors, transient
//! vertex and instance memory are bump arenas, and submitted draws are recorded so tests can
//! inspect exactly what the mesh pipeline produced.

use bitflags::bitflags;
use parking_lot::Mutex;
use tessera_core::mesh::IndexFormat;

use crate::device::{DeviceLimits, GraphicsDevice};
use crate::draw::{DrawCall, IndexBufferRef, VertexBufferRef};
use crate::error::GraphicsError;
use crate::mesh::VertexLayout;
use crate::types::{
    DynamicIndexBufferHandle, DynamicVertexBufferHandle, IndexBufferHandle, InstanceBuffer,
    TransientVertexBuffer, VertexBufferHandle, VertexLayoutHandle,
};

use super::arena::TransientArena;

/// Configuration for a [`DummyDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DummyDeviceConfig {
    /// Reported limits, also enforced.
    pub limits: DeviceLimits,
}

impl DummyDeviceConfig {
    /// Set the per-frame transient vertex memory in bytes.
    pub fn with_transient_memory(mut self, bytes: u64) -> Self {
        self.limits.transient_vertex_memory = bytes;
        self
    }

    /// Set the per-frame instance data memory in bytes.
    pub fn with_instance_memory(mut self, bytes: u64) -> Self {
        self.limits.instance_memory = bytes;
        self
    }

    /// Set the maximum buffer size in bytes.
    pub fn with_max_buffer_size(mut self, bytes: u64) -> Self {
        self.limits.max_buffer_size = bytes;
        self
    }
}

bitflags! {
    /// What a stored buffer holds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        /// Indices are 32-bit rather than 16-bit.
        const INDEX_32 = 1 << 2;
        const DYNAMIC = 1 << 3;
    }
}

#[derive(Debug)]
struct DummyBuffer {
    data: Vec<u8>,
    usage: BufferUsage,
    layout: Option<VertexLayoutHandle>,
    index_format: Option<IndexFormat>,
}

#[derive(Debug)]
struct DummyState {
    layouts: Vec<Option<VertexLayout>>,
    buffers: Vec<Option<DummyBuffer>>,
    free_buffers: Vec<u32>,
    arena: TransientArena,
    transient_data: Vec<u8>,
    instance_arena: TransientArena,
    instance_data: Vec<u8>,
    submitted: Vec<DrawCall>,
    /// Creations to let through, then creations to fail.
    failure_schedule: (u32, u32),
}

impl DummyState {
    fn layout_stride(&self, handle: VertexLayoutHandle) -> Option<u32> {
        self.layouts
            .get(handle.raw() as usize)
            .and_then(Option::as_ref)
            .map(|layout| layout.stride)
    }

    fn buffer(&self, raw: u32) -> Option<&DummyBuffer> {
        self.buffers.get(raw as usize).and_then(Option::as_ref)
    }

    fn has_buffer(&self, raw: u32, usage: BufferUsage) -> bool {
        self.buffer(raw).is_some_and(|b| b.usage == usage)
    }
}

/// In-memory [`GraphicsDevice`].
#[derive(Debug)]
pub struct DummyDevice {
    limits: DeviceLimits,
    state: Mutex<DummyState>,
}

impl DummyDevice {
    /// Create a device with default limits.
    pub fn new() -> Self {
        Self::with_config(DummyDeviceConfig::default())
    }

    /// Create a device with the given configuration.
    pub fn with_config(config: DummyDeviceConfig) -> Self {
        Self {
            limits: config.limits,
            state: Mutex::new(DummyState {
                layouts: Vec::new(),
                buffers: Vec::new(),
                free_buffers: Vec::new(),
                arena: TransientArena::new(config.limits.transient_vertex_memory),
                transient_data: Vec::new(),
                instance_arena: TransientArena::new(config.limits.instance_memory),
                instance_data: Vec::new(),
                submitted: Vec::new(),
                failure_schedule: (0, 0),
            }),
        }
    }

    fn create_buffer(
        &self,
        data: &[u8],
        usage: BufferUsage,
        layout: Option<VertexLayoutHandle>,
        index_format: Option<IndexFormat>,
    ) -> Result<u32, GraphicsError> {
        let mut state = self.state.lock();

        match &mut state.failure_schedule {
            (0, 0) => {}
            (0, failures) => {
                *failures -= 1;
                return Err(GraphicsError::ResourceCreationFailed(format!(
                    "injected failure creating {usage:?} buffer"
                )));
            }
            (successes, _) => *successes -= 1,
        }
        if data.len() as u64 > self.limits.max_buffer_size {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer size {} exceeds maximum {}",
                data.len(),
                self.limits.max_buffer_size
            )));
        }
        if let Some(layout) = layout {
            if state.layout_stride(layout).is_none() {
                return Err(GraphicsError::InvalidParameter(format!(
                    "unknown vertex layout {}",
                    layout.raw()
                )));
            }
        }

        let buffer = DummyBuffer {
            data: data.to_vec(),
            usage,
            layout,
            index_format,
        };
        let raw = match state.free_buffers.pop() {
            Some(raw) => {
                state.buffers[raw as usize] = Some(buffer);
                raw
            }
            None => {
                state.buffers.push(Some(buffer));
                (state.buffers.len() - 1) as u32
            }
        };

        log::trace!(
            "DummyDevice: created {:?} buffer {} ({} bytes)",
            usage,
            raw,
            data.len()
        );
        Ok(raw)
    }

    fn destroy_buffer(&self, raw: u32, usage: BufferUsage) {
        let mut state = self.state.lock();
        if !state.has_buffer(raw, usage) {
            log::trace!("DummyDevice: ignoring destroy of unknown {usage:?} buffer {raw}");
            return;
        }
        state.buffers[raw as usize] = None;
        state.free_buffers.push(raw);
        log::trace!("DummyDevice: destroyed {usage:?} buffer {raw}");
    }

    /// Make the next `count` buffer creations fail.
    pub fn fail_next_buffer_creations(&self, count: u32) {
        self.fail_buffer_creations(0, count);
    }

    /// Let `skip` buffer creations succeed, then fail the next `count`.
    pub fn fail_buffer_creations(&self, skip: u32, count: u32) {
        self.state.lock().failure_schedule = (skip, count);
    }

    /// Number of live buffers of every kind.
    pub fn live_buffer_count(&self) -> usize {
        self.state.lock().buffers.iter().flatten().count()
    }

    /// Number of registered layouts.
    pub fn live_layout_count(&self) -> usize {
        self.state.lock().layouts.iter().flatten().count()
    }

    /// A registered layout.
    pub fn layout(&self, handle: VertexLayoutHandle) -> Option<VertexLayout> {
        self.state
            .lock()
            .layouts
            .get(handle.raw() as usize)
            .and_then(Option::clone)
    }

    /// Contents of a bound vertex stream.
    pub fn vertex_data(&self, buffer: &VertexBufferRef) -> Option<Vec<u8>> {
        let state = self.state.lock();
        match buffer {
            VertexBufferRef::Static(handle) => state
                .buffer(handle.raw())
                .filter(|b| b.usage == BufferUsage::VERTEX)
                .map(|b| b.data.clone()),
            VertexBufferRef::Dynamic(handle) => state
                .buffer(handle.raw())
                .filter(|b| b.usage == BufferUsage::VERTEX | BufferUsage::DYNAMIC)
                .map(|b| b.data.clone()),
            VertexBufferRef::Transient(tvb) => {
                let start = tvb.offset as usize;
                let end = start + tvb.size() as usize;
                state.transient_data.get(start..end).map(<[u8]>::to_vec)
            }
        }
    }

    /// Contents of an instance allocation made this frame.
    pub fn instance_data(&self, buffer: &InstanceBuffer) -> Option<Vec<u8>> {
        let start = buffer.offset as usize;
        let end = start + buffer.size() as usize;
        self.state.lock().instance_data.get(start..end).map(<[u8]>::to_vec)
    }

    /// Instance bytes handed out this frame.
    pub fn instance_memory_used(&self) -> u64 {
        self.state.lock().instance_arena.used()
    }

    /// Layout a persistent vertex buffer was created with.
    pub fn vertex_buffer_layout(&self, buffer: &VertexBufferRef) -> Option<VertexLayoutHandle> {
        let state = self.state.lock();
        match buffer {
            VertexBufferRef::Static(handle) => state.buffer(handle.raw()).and_then(|b| b.layout),
            VertexBufferRef::Dynamic(handle) => state.buffer(handle.raw()).and_then(|b| b.layout),
            VertexBufferRef::Transient(tvb) => Some(tvb.layout),
        }
    }

    /// Decoded contents of a bound index buffer.
    pub fn index_data(&self, buffer: &IndexBufferRef) -> Option<Vec<u32>> {
        let state = self.state.lock();
        let raw = match buffer {
            IndexBufferRef::Static(handle, _) => handle.raw(),
            IndexBufferRef::Dynamic(handle, _) => handle.raw(),
        };
        let stored = state.buffer(raw)?;
        let format = stored.index_format?;
        debug_assert_eq!(format, buffer.format());
        Some(format.decode(&stored.data))
    }

    fn buffer_usage(&self, raw: u32) -> Option<BufferUsage> {
        self.state.lock().buffer(raw).map(|b| b.usage)
    }

    /// Transient bytes handed out this frame.
    pub fn transient_used(&self) -> u64 {
        self.state.lock().arena.used()
    }

    /// Frames ended so far.
    pub fn frame_count(&self) -> u64 {
        self.state.lock().arena.frame_count()
    }

    /// Draws submitted since the last [`take_submitted`](Self::take_submitted).
    pub fn submitted(&self) -> Vec<DrawCall> {
        self.state.lock().submitted.clone()
    }

    /// Drain the recorded draws.
    pub fn take_submitted(&self) -> Vec<DrawCall> {
        std::mem::take(&mut self.state.lock().submitted)
    }
}

impl Default for DummyDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for DummyDevice {
    fn name(&self) -> &str {
        "Dummy Device"
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn create_vertex_layout(
        &self,
        layout: &VertexLayout,
    ) -> Result<VertexLayoutHandle, GraphicsError> {
        layout.validate().map_err(GraphicsError::InvalidParameter)?;

        let mut state = self.state.lock();
        if state.layouts.len() >= self.limits.max_vertex_layouts as usize {
            return Err(GraphicsError::ResourceCreationFailed(format!(
                "vertex layout limit {} reached",
                self.limits.max_vertex_layouts
            )));
        }
        state.layouts.push(Some(layout.clone()));
        let handle = VertexLayoutHandle::from_raw((state.layouts.len() - 1) as u32);

        log::trace!(
            "DummyDevice: created vertex layout {} {:?} (stride {})",
            handle.raw(),
            layout.label,
            layout.stride
        );
        Ok(handle)
    }

    fn destroy_vertex_layout(&self, handle: VertexLayoutHandle) {
        let mut state = self.state.lock();
        if let Some(slot) = state.layouts.get_mut(handle.raw() as usize) {
            *slot = None;
        }
    }

    fn create_vertex_buffer(
        &self,
        data: &[u8],
        layout: VertexLayoutHandle,
    ) -> Result<VertexBufferHandle, GraphicsError> {
        self.create_buffer(data, BufferUsage::VERTEX, Some(layout), None)
            .map(VertexBufferHandle::from_raw)
    }

    fn create_dynamic_vertex_buffer(
        &self,
        data: &[u8],
        layout: VertexLayoutHandle,
    ) -> Result<DynamicVertexBufferHandle, GraphicsError> {
        self.create_buffer(
            data,
            BufferUsage::VERTEX | BufferUsage::DYNAMIC,
            Some(layout),
            None,
        )
        .map(DynamicVertexBufferHandle::from_raw)
    }

    fn destroy_vertex_buffer(&self, handle: VertexBufferHandle) {
        self.destroy_buffer(handle.raw(), BufferUsage::VERTEX);
    }

    fn destroy_dynamic_vertex_buffer(&self, handle: DynamicVertexBufferHandle) {
        self.destroy_buffer(handle.raw(), BufferUsage::VERTEX | BufferUsage::DYNAMIC);
    }

    fn create_index_buffer(
        &self,
        data: &[u8],
        format: IndexFormat,
    ) -> Result<IndexBufferHandle, GraphicsError> {
        self.create_buffer(data, index_usage(format), None, Some(format))
            .map(IndexBufferHandle::from_raw)
    }

    fn create_dynamic_index_buffer(
        &self,
        data: &[u8],
        format: IndexFormat,
    ) -> Result<DynamicIndexBufferHandle, GraphicsError> {
        self.create_buffer(
            data,
            index_usage(format) | BufferUsage::DYNAMIC,
            None,
            Some(format),
        )
        .map(DynamicIndexBufferHandle::from_raw)
    }

    fn destroy_index_buffer(&self, handle: IndexBufferHandle) {
        if let Some(usage) = self.buffer_usage(handle.raw()) {
            if usage.contains(BufferUsage::INDEX) && !usage.contains(BufferUsage::DYNAMIC) {
                self.destroy_buffer(handle.raw(), usage);
            }
        }
    }

    fn destroy_dynamic_index_buffer(&self, handle: DynamicIndexBufferHandle) {
        if let Some(usage) = self.buffer_usage(handle.raw()) {
            if usage.contains(BufferUsage::INDEX | BufferUsage::DYNAMIC) {
                self.destroy_buffer(handle.raw(), usage);
            }
        }
    }

    fn avail_transient_vertex_buffer(&self, count: u32, layout: VertexLayoutHandle) -> u32 {
        let state = self.state.lock();
        let Some(stride) = state.layout_stride(layout) else {
            return 0;
        };
        let available = state.arena.available(u64::from(stride));
        available.min(u64::from(count)) as u32
    }

    fn alloc_transient_vertex_buffer(
        &self,
        data: &[u8],
        layout: VertexLayoutHandle,
    ) -> Result<TransientVertexBuffer, GraphicsError> {
        let mut state = self.state.lock();
        let stride = state.layout_stride(layout).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!("unknown vertex layout {}", layout.raw()))
        })?;
        if data.len() % stride as usize != 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "{} bytes is not a whole number of {}-byte vertices",
                data.len(),
                stride
            )));
        }

        let allocation = state
            .arena
            .allocate_aligned(data.len() as u64, u64::from(stride))
            .ok_or(GraphicsError::TransientMemoryExhausted)?;

        let start = allocation.offset as usize;
        let end = allocation.end() as usize;
        if state.transient_data.len() < end {
            state.transient_data.resize(end, 0);
        }
        state.transient_data[start..end].copy_from_slice(data);

        log::trace!(
            "DummyDevice: transient allocation at {} ({} bytes)",
            allocation.offset,
            allocation.size
        );
        Ok(TransientVertexBuffer {
            offset: allocation.offset,
            start_vertex: (allocation.offset / u64::from(stride)) as u32,
            vertex_count: (data.len() / stride as usize) as u32,
            stride,
            layout,
        })
    }

    fn avail_instance_buffer(&self, count: u32, stride: u32) -> u32 {
        let available = self.state.lock().instance_arena.available(u64::from(stride));
        available.min(u64::from(count)) as u32
    }

    fn alloc_instance_buffer(
        &self,
        data: &[u8],
        stride: u32,
    ) -> Result<InstanceBuffer, GraphicsError> {
        if stride == 0 || data.len() % stride as usize != 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "{} bytes is not a whole number of {stride}-byte instances",
                data.len()
            )));
        }

        let mut state = self.state.lock();
        let allocation = state
            .instance_arena
            .allocate_aligned(data.len() as u64, 16)
            .ok_or(GraphicsError::InstanceMemoryExhausted)?;

        let start = allocation.offset as usize;
        let end = allocation.end() as usize;
        if state.instance_data.len() < end {
            state.instance_data.resize(end, 0);
        }
        state.instance_data[start..end].copy_from_slice(data);

        log::trace!(
            "DummyDevice: instance allocation at {} ({} bytes)",
            allocation.offset,
            allocation.size
        );
        Ok(InstanceBuffer {
            offset: allocation.offset,
            count: (data.len() / stride as usize) as u32,
            stride,
        })
    }

    fn submit(&self, draw: &DrawCall) -> Result<(), GraphicsError> {
        let mut state = self.state.lock();
        let bound = |buffer: &VertexBufferRef| match buffer {
            VertexBufferRef::Static(handle) => state.has_buffer(handle.raw(), BufferUsage::VERTEX),
            VertexBufferRef::Dynamic(handle) => {
                state.has_buffer(handle.raw(), BufferUsage::VERTEX | BufferUsage::DYNAMIC)
            }
            VertexBufferRef::Transient(tvb) => {
                tvb.offset + tvb.size() <= state.transient_data.len() as u64
            }
        };
        let attribs_bound = draw.attribs.as_ref().is_none_or(|a| bound(&a.buffer));
        if !bound(&draw.positions.buffer) || !attribs_bound {
            return Err(GraphicsError::InvalidParameter(format!(
                "draw of mesh {} references a dead vertex buffer",
                draw.mesh_id
            )));
        }
        if let Some(instances) = &draw.instances {
            let end = instances.buffer.offset + instances.buffer.size();
            if end > state.instance_data.len() as u64 {
                return Err(GraphicsError::InvalidParameter(format!(
                    "draw of mesh {} references stale instance data",
                    draw.mesh_id
                )));
            }
        }

        log::trace!(
            "DummyDevice: draw mesh {} ({:?}, {} elements from {})",
            draw.mesh_id,
            draw.topology,
            draw.count,
            draw.first
        );
        state.submitted.push(draw.clone());
        Ok(())
    }

    fn frame(&self) {
        let mut state = self.state.lock();
        state.arena.reset();
        state.transient_data.clear();
        state.instance_arena.reset();
        state.instance_data.clear();
        log::trace!("DummyDevice: frame {} ended", state.arena.frame_count());
    }
}

fn index_usage(format: IndexFormat) -> BufferUsage {
    match format {
        IndexFormat::Uint16 => BufferUsage::INDEX,
        IndexFormat::Uint32 => BufferUsage::INDEX | BufferUsage::INDEX_32,
    }
}

static_assertions::assert_impl_all!(DummyDevice: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    /// Device with 240 bytes of transient memory, 20 positions.
    fn device_with_layout(layout: VertexLayout) -> (DummyDevice, VertexLayoutHandle) {
        let config = DummyDeviceConfig::default().with_transient_memory(240);
        let device = DummyDevice::with_config(config);
        let handle = device.create_vertex_layout(&layout).unwrap();
        (device, handle)
    }

    #[test]
    fn test_dummy_device_name() {
        let device = DummyDevice::new();
        assert_eq!(device.name(), "Dummy Device");
    }

    #[test]
    fn test_buffer_lifecycle() {
        let (device, layout) = device_with_layout(VertexLayout::positions());
        let data = [0u8; 36];

        let vb = device.create_vertex_buffer(&data, layout).unwrap();
        let ib = device
            .create_index_buffer(&IndexFormat::Uint16.encode(&[0, 1, 2]), IndexFormat::Uint16)
            .unwrap();
        assert_eq!(device.live_buffer_count(), 2);
        assert_eq!(
            device.vertex_data(&VertexBufferRef::Static(vb)).unwrap(),
            data.to_vec()
        );
        assert_eq!(
            device.index_data(&IndexBufferRef::Static(ib, IndexFormat::Uint16)),
            Some(vec![0, 1, 2])
        );

        // Wrong kind of handle is ignored.
        device.destroy_dynamic_vertex_buffer(DynamicVertexBufferHandle::from_raw(vb.raw()));
        assert_eq!(device.live_buffer_count(), 2);

        device.destroy_vertex_buffer(vb);
        device.destroy_index_buffer(ib);
        assert_eq!(device.live_buffer_count(), 0);
    }

    #[test]
    fn test_index_handles_checked_against_usage() {
        let device = DummyDevice::new();
        let data = IndexFormat::Uint32.encode(&[0, 1, 2]);
        let ib = device.create_index_buffer(&data, IndexFormat::Uint32).unwrap();
        assert_eq!(
            device.buffer_usage(ib.raw()),
            Some(BufferUsage::INDEX | BufferUsage::INDEX_32)
        );

        device.destroy_dynamic_index_buffer(DynamicIndexBufferHandle::from_raw(ib.raw()));
        assert_eq!(device.live_buffer_count(), 1);
        device.destroy_index_buffer(ib);
        assert_eq!(device.live_buffer_count(), 0);
    }

    #[test]
    fn test_unknown_layout_rejected() {
        let device = DummyDevice::new();
        let result = device.create_vertex_buffer(&[0; 12], VertexLayoutHandle::from_raw(3));
        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
    }

    #[test]
    fn test_injected_failures() {
        let (device, layout) = device_with_layout(VertexLayout::positions());
        device.fail_next_buffer_creations(1);
        assert!(device.create_vertex_buffer(&[0; 12], layout).is_err());
        assert!(device.create_vertex_buffer(&[0; 12], layout).is_ok());

        device.fail_buffer_creations(1, 1);
        assert!(device.create_vertex_buffer(&[0; 12], layout).is_ok());
        assert!(device.create_vertex_buffer(&[0; 12], layout).is_err());
        assert!(device.create_vertex_buffer(&[0; 12], layout).is_ok());
    }

    #[test]
    fn test_transient_allocation() {
        let (device, layout) = device_with_layout(VertexLayout::positions());
        assert_eq!(device.avail_transient_vertex_buffer(100, layout), 20);

        let data: Vec<u8> = (0..36).collect();
        let tvb = device.alloc_transient_vertex_buffer(&data, layout).unwrap();
        assert_eq!(tvb.start_vertex, 0);
        assert_eq!(tvb.vertex_count, 3);
        assert_eq!(
            device.vertex_data(&VertexBufferRef::Transient(tvb)),
            Some(data.clone())
        );

        let second = device.alloc_transient_vertex_buffer(&data, layout).unwrap();
        assert_eq!(second.start_vertex, 3);
        assert_eq!(device.avail_transient_vertex_buffer(100, layout), 14);

        device.frame();
        assert_eq!(device.transient_used(), 0);
        assert_eq!(device.frame_count(), 1);
        assert_eq!(device.vertex_data(&VertexBufferRef::Transient(tvb)), None);
    }

    #[test]
    fn test_transient_exhaustion() {
        let (device, layout) = device_with_layout(VertexLayout::positions());
        let data = vec![0u8; 240];
        device.alloc_transient_vertex_buffer(&data, layout).unwrap();
        assert_eq!(device.avail_transient_vertex_buffer(1, layout), 0);
        assert_eq!(
            device.alloc_transient_vertex_buffer(&data[..12], layout),
            Err(GraphicsError::TransientMemoryExhausted)
        );
    }

    #[test]
    fn test_instance_allocation() {
        let device = DummyDevice::with_config(DummyDeviceConfig::default().with_instance_memory(96));
        assert_eq!(device.avail_instance_buffer(10, 32), 3);

        let data: Vec<u8> = (0..64).collect();
        let buffer = device.alloc_instance_buffer(&data, 32).unwrap();
        assert_eq!((buffer.offset, buffer.count, buffer.stride), (0, 2, 32));
        assert_eq!(device.instance_data(&buffer), Some(data));
        assert_eq!(device.avail_instance_buffer(10, 32), 1);

        assert_eq!(
            device.alloc_instance_buffer(&[0; 64], 32),
            Err(GraphicsError::InstanceMemoryExhausted)
        );
        assert!(matches!(
            device.alloc_instance_buffer(&[0; 20], 16),
            Err(GraphicsError::InvalidParameter(_))
        ));

        device.frame();
        assert_eq!(device.instance_memory_used(), 0);
        assert_eq!(device.instance_data(&buffer), None);
    }

    #[test]
    fn test_partial_vertex_rejected() {
        let (device, layout) = device_with_layout(VertexLayout::positions());
        assert!(matches!(
            device.alloc_transient_vertex_buffer(&[0; 13], layout),
            Err(GraphicsError::InvalidParameter(_))
        ));
    }
}
