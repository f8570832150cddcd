//! Graphics device abstraction.
//!
//! The [`GraphicsDevice`] trait is the only way the mesh pipeline talks to
//! the GPU. It creates layouts and buffers, hands out per-frame transient
//! vertex and instance memory, and accepts resolved draw calls.
//!
//! Implementations must be `Send + Sync`: meshes are recorded and uploaded
//! from many threads at once.

use tessera_core::mesh::IndexFormat;

use crate::draw::DrawCall;
use crate::error::GraphicsError;
use crate::mesh::VertexLayout;
use crate::types::{
    DynamicIndexBufferHandle, DynamicVertexBufferHandle, IndexBufferHandle, InstanceBuffer,
    TransientVertexBuffer, VertexBufferHandle, VertexLayoutHandle,
};

/// Limits of a graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceLimits {
    /// Maximum buffer size in bytes.
    pub max_buffer_size: u64,
    /// Transient vertex memory available per frame, in bytes.
    pub transient_vertex_memory: u64,
    /// Instance data memory available per frame, in bytes.
    pub instance_memory: u64,
    /// Maximum number of registered vertex layouts.
    pub max_vertex_layouts: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_buffer_size: 1 << 30, // 1 GB
            transient_vertex_memory: 32 << 20,
            instance_memory: 8 << 20,
            max_vertex_layouts: 256,
        }
    }
}

/// A device able to hold mesh geometry and draw it.
///
/// Destroying a handle that was never created, or was already destroyed,
/// is ignored.
pub trait GraphicsDevice: Send + Sync {
    /// Human-readable device name.
    fn name(&self) -> &str;

    /// Device limits.
    fn limits(&self) -> DeviceLimits;

    /// Register a vertex layout.
    fn create_vertex_layout(
        &self,
        layout: &VertexLayout,
    ) -> Result<VertexLayoutHandle, GraphicsError>;

    /// Release a vertex layout.
    fn destroy_vertex_layout(&self, handle: VertexLayoutHandle);

    /// Create an immutable vertex buffer holding `data`.
    fn create_vertex_buffer(
        &self,
        data: &[u8],
        layout: VertexLayoutHandle,
    ) -> Result<VertexBufferHandle, GraphicsError>;

    /// Create an updatable vertex buffer holding `data`.
    fn create_dynamic_vertex_buffer(
        &self,
        data: &[u8],
        layout: VertexLayoutHandle,
    ) -> Result<DynamicVertexBufferHandle, GraphicsError>;

    fn destroy_vertex_buffer(&self, handle: VertexBufferHandle);

    fn destroy_dynamic_vertex_buffer(&self, handle: DynamicVertexBufferHandle);

    /// Create an immutable index buffer holding `data` encoded as `format`.
    fn create_index_buffer(
        &self,
        data: &[u8],
        format: IndexFormat,
    ) -> Result<IndexBufferHandle, GraphicsError>;

    /// Create an updatable index buffer holding `data` encoded as `format`.
    fn create_dynamic_index_buffer(
        &self,
        data: &[u8],
        format: IndexFormat,
    ) -> Result<DynamicIndexBufferHandle, GraphicsError>;

    fn destroy_index_buffer(&self, handle: IndexBufferHandle);

    fn destroy_dynamic_index_buffer(&self, handle: DynamicIndexBufferHandle);

    /// How many of `count` vertices in `layout` still fit in this frame's
    /// transient memory.
    fn avail_transient_vertex_buffer(&self, count: u32, layout: VertexLayoutHandle) -> u32;

    /// Copy `data` into this frame's transient memory.
    ///
    /// `data` must hold a whole number of vertices of `layout`.
    fn alloc_transient_vertex_buffer(
        &self,
        data: &[u8],
        layout: VertexLayoutHandle,
    ) -> Result<TransientVertexBuffer, GraphicsError>;

    /// How many of `count` records of `stride` bytes still fit in this
    /// frame's instance memory.
    fn avail_instance_buffer(&self, count: u32, stride: u32) -> u32;

    /// Copy `data`, a whole number of `stride`-byte records, into this
    /// frame's instance memory.
    fn alloc_instance_buffer(
        &self,
        data: &[u8],
        stride: u32,
    ) -> Result<InstanceBuffer, GraphicsError>;

    /// Queue a resolved draw.
    fn submit(&self, draw: &DrawCall) -> Result<(), GraphicsError>;

    /// End the frame. Every transient and instance allocation becomes invalid.
    fn frame(&self);
}
