//! Per-instance data recording.
//!
//! An [`InstanceRecorder`] collects fixed-size records, one per instance,
//! into a single byte buffer. The record size is chosen by the
//! [`InstanceDataType`] the recording is started with.

use crate::math::Mat4;

/// Upper bound on the bytes reserved when a recording starts.
pub const MAX_INSTANCE_RESERVE: usize = 4 << 20;

/// Instances reserved when a recording starts, within [`MAX_INSTANCE_RESERVE`].
pub const INSTANCE_RESERVE_COUNT: usize = 2048;

/// Layout of one instance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InstanceDataType {
    /// A column-major 4x4 `f32` model matrix.
    #[default]
    Transform,
    Data16,
    Data32,
    Data48,
    Data64,
    Data80,
    Data96,
    Data112,
}

impl InstanceDataType {
    pub const ALL: [Self; 8] = [
        Self::Transform,
        Self::Data16,
        Self::Data32,
        Self::Data48,
        Self::Data64,
        Self::Data80,
        Self::Data96,
        Self::Data112,
    ];

    /// Bytes per instance.
    pub const fn stride(self) -> usize {
        match self {
            Self::Transform => std::mem::size_of::<[f32; 16]>(),
            Self::Data16 => 16,
            Self::Data32 => 32,
            Self::Data48 => 48,
            Self::Data64 => 64,
            Self::Data80 => 80,
            Self::Data96 => 96,
            Self::Data112 => 112,
        }
    }

    pub fn is_transform(self) -> bool {
        self == Self::Transform
    }
}

/// Accumulates instance records for one instance buffer.
#[derive(Debug, Default)]
pub struct InstanceRecorder {
    buffer: Vec<u8>,
    data_type: Option<InstanceDataType>,
}

impl InstanceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new recording, discarding anything left from the last one.
    pub fn start(&mut self, data_type: InstanceDataType) {
        let stride = data_type.stride();
        self.buffer.clear();
        self.buffer
            .reserve((INSTANCE_RESERVE_COUNT * stride).min(MAX_INSTANCE_RESERVE));
        self.data_type = Some(data_type);
    }

    /// Append one record. It must be exactly one stride long.
    pub fn instance(&mut self, data: &[u8]) {
        let Some(data_type) = self.data_type else {
            log::warn!("instance data outside an instancing recording, ignored");
            return;
        };
        if data.len() != data_type.stride() {
            log::warn!(
                "{} bytes of instance data for {data_type:?} records of {} bytes, ignored",
                data.len(),
                data_type.stride()
            );
            return;
        }
        self.buffer.extend_from_slice(data);
    }

    /// Append `transform` as a [`InstanceDataType::Transform`] record.
    pub fn transform(&mut self, transform: &Mat4) {
        self.instance(bytemuck::cast_slice(transform.as_slice()));
    }

    pub fn data_type(&self) -> Option<InstanceDataType> {
        self.data_type
    }

    pub fn is_active(&self) -> bool {
        self.data_type.is_some()
    }

    /// Records appended since `start`.
    pub fn instance_count(&self) -> u32 {
        self.data_type
            .map_or(0, |data_type| (self.buffer.len() / data_type.stride()) as u32)
    }

    /// The recorded bytes, `instance_count() * stride` long.
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Drop recorded data and leave the recording state, keeping the allocation.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.data_type = None;
    }
}
