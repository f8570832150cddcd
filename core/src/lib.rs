//! # Tessera Core
//!
//! Backend-independent half of the immediate-mode geometry pipeline:
//! flag algebra, vertex attribute packing, the per-thread recorder and
//! normal generation.

pub mod math;
pub mod mesh;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
