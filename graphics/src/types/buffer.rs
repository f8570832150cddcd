//! Frame-scoped vertex buffer allocations.

use super::handle::VertexLayoutHandle;

/// A frame-scoped vertex allocation.
///
/// Only valid until the device's next [`frame`](crate::GraphicsDevice::frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransientVertexBuffer {
    /// Byte offset into the device's transient memory.
    pub offset: u64,
    /// First vertex, `offset / stride`.
    pub start_vertex: u32,
    /// Number of vertices.
    pub vertex_count: u32,
    /// Bytes per vertex.
    pub stride: u32,
    /// Layout the vertices were allocated with.
    pub layout: VertexLayoutHandle,
}

impl TransientVertexBuffer {
    /// Size in bytes.
    pub fn size(&self) -> u64 {
        u64::from(self.vertex_count) * u64::from(self.stride)
    }
}

/// A frame-scoped instance data allocation.
///
/// Like [`TransientVertexBuffer`], only valid until the next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceBuffer {
    /// Byte offset into the device's instance memory.
    pub offset: u64,
    /// Number of instance records.
    pub count: u32,
    /// Bytes per record.
    pub stride: u32,
}

impl InstanceBuffer {
    pub fn size(&self) -> u64 {
        u64::from(self.count) * u64::from(self.stride)
    }
}
