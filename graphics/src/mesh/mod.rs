//! Mesh storage for the graphics engine.
//!
//! This module turns recorded geometry into drawable meshes:
//!
//! - [`VertexLayout`] - Describes one interleaved vertex stream
//! - [`VertexLayoutCache`] - Every layout a mesh can be drawn with, including aliases
//! - [`Mesh`] - A mesh table entry with its device buffers
//! - [`MeshCache`] - The mesh ID table, shared by every recording thread
//! - [`TransientBufferPool`] - This frame's transient vertex buffers
//! - [`InstanceCache`] - This frame's instance buffers

mod cache;
mod data;
mod geometry;
mod instance_cache;
mod layout;
mod layout_cache;
mod transient;

pub use cache::{MAX_MESHES, MeshCache, MeshCacheStats};
pub use data::{Mesh, MeshBuffers, PersistentIndexBuffer, PersistentVertexBuffer};
pub use geometry::OVERDRAW_THRESHOLD;
pub use instance_cache::{InstanceCache, MAX_INSTANCE_BUFFERS};
pub use layout::{VertexAttribute, VertexAttributeFormat, VertexAttributeSemantic, VertexLayout};
pub use layout_cache::{
    CachedLayout, LAYOUT_KEY_COUNT, LAYOUT_SKIP_SHIFT, VertexLayoutCache, layout_key,
};
pub use transient::{MAX_TRANSIENT_BUFFERS, TransientBufferPool, TransientRequest};

// Re-export CPU-side types from core
pub use tessera_core::mesh::{CpuGeometry, IndexFormat, InstanceDataType, PrimitiveTopology};
