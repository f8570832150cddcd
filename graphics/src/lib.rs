//! # Tessera Graphics
//!
//! Mesh storage and draw resolution for immediate-mode geometry.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GraphicsDevice`] - Trait the mesh cache creates buffers and submits draws through
//! - [`VertexLayoutCache`] - Every vertex layout a mesh can be drawn with, including aliases
//! - [`MeshCache`] - Mesh ID table holding persistent and transient meshes
//! - [`InstanceCache`] - Per-frame instance data for instanced draws
//! - [`SharedRuntime`] / [`RecordingContext`] - Shared state and per-thread recording
//! - [`DummyDevice`] - In-memory device for tests and headless use
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tessera_graphics::{DummyDevice, RuntimeConfig, SharedRuntime};
//! use tessera_core::mesh::flags::{PRIMITIVE_QUADS, VERTEX_COLOR};
//!
//! let runtime = SharedRuntime::new(Arc::new(DummyDevice::new()), RuntimeConfig::default())?;
//! let mut ctx = runtime.context();
//!
//! ctx.begin_mesh(1, PRIMITIVE_QUADS | VERTEX_COLOR)?;
//! ctx.color(0xffffffff);
//! ctx.vertex(0.0, 0.0, 0.0);
//! ctx.vertex(1.0, 0.0, 0.0);
//! ctx.vertex(1.0, 1.0, 0.0);
//! ctx.vertex(0.0, 1.0, 0.0);
//! ctx.end_mesh()?;
//!
//! ctx.mesh(1);
//! ctx.submit();
//! runtime.end_frame();
//! ```

pub mod backend;
pub mod device;
pub mod draw;
pub mod error;
pub mod mesh;
pub mod runtime;
pub mod types;

// Re-export main types for convenience
pub use backend::{DummyDevice, DummyDeviceConfig};
pub use device::{DeviceLimits, GraphicsDevice};
pub use draw::{
    DrawCall, DrawItem, DrawList, ElementRange, IndexBufferRef, InstanceBinding, VertexBinding,
    VertexBufferRef,
};
pub use error::GraphicsError;
pub use mesh::{
    InstanceCache, InstanceDataType, Mesh, MeshCache, MeshCacheStats, VertexLayout,
    VertexLayoutCache,
};
pub use runtime::{MatrixMode, RecordingContext, RuntimeConfig, SharedRuntime};
pub use types::{
    IndexBufferHandle, InstanceBuffer, TransientVertexBuffer, VertexBufferHandle,
    VertexLayoutHandle,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version.
///
/// Optional; nothing else depends on it having been called.
pub fn init() {
    log::info!("Tessera Graphics v{} initialized", VERSION);
}
