//! Graphics device implementations.
//!
//! # Available Backends
//!
//! - [`DummyDevice`]: in-memory device for testing and development
//!
//! GPU backends implement [`GraphicsDevice`](crate::GraphicsDevice) the same
//! way; the mesh pipeline only ever sees the trait.

mod arena;
pub mod dummy;

pub use arena::{ArenaAllocation, TransientArena};
pub use dummy::{DummyDevice, DummyDeviceConfig};
