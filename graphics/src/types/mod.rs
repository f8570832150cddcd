//! Common types for device resources.
//!
//! This module contains typed handles and the frame-scoped transient
//! vertex and instance buffer descriptors.

mod buffer;
mod handle;

pub use buffer::{InstanceBuffer, TransientVertexBuffer};
pub use handle::{
    DynamicIndexBufferHandle, DynamicVertexBufferHandle, IndexBufferHandle, VertexBufferHandle,
    VertexLayoutHandle,
};
