//! Geometry recording.
//!
//! - [`flags`] - the packed mesh flags word and its accessors
//! - [`VertexAttribState`] - packs the current color, normal and texcoord
//! - [`MeshRecorder`] - accumulates vertices, emulating quads inline
//! - [`normals`] - flat and smooth normal generation
//! - [`InstanceRecorder`] - fixed-size per-instance records
//! - [`IndexFormat`], [`PrimitiveTopology`], [`CpuGeometry`] - device-facing data
//!
//! These types are re-exported by `tessera-graphics` for convenience.

mod attribs;
mod data;
pub mod flags;
mod instances;
pub mod normals;
mod recorder;

pub use attribs::{
    ATTRIB_STATE_CAPACITY, AttribOffsets, AttribStoreFuncs, VertexAttribState, attrib_store_funcs,
    pack_color, pack_normal, pack_texcoord, unpack_color, unpack_normal,
};
pub use data::{CpuGeometry, IndexFormat, PrimitiveTopology};
pub use flags::{MeshType, PrimitiveType, VertexAttribs};
pub use instances::{
    INSTANCE_RESERVE_COUNT, InstanceDataType, InstanceRecorder, MAX_INSTANCE_RESERVE,
};
pub use recorder::{DEFAULT_VERTEX_CAPACITY, MeshRecorder, RecordedGeometry};
