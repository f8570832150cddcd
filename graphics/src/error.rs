//! Graphics error types.

use thiserror::Error;

/// Errors that can occur in the graphics system.
///
/// Everything except the recording-state variants is recoverable: the
/// affected mesh is left empty and the frame carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// Failed to create a device resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// Out of device memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// The per-frame transient vertex memory ran out.
    #[error("transient vertex memory exhausted for this frame")]
    TransientMemoryExhausted,
    /// The per-frame instance data memory ran out.
    #[error("instance data memory exhausted for this frame")]
    InstanceMemoryExhausted,
    /// All transient buffer slots for this frame are in use.
    #[error("transient buffer table full ({0} buffers)")]
    TransientTableFull(usize),
    /// The mesh flags carry the reserved `MESH_INVALID` type.
    #[error("mesh {0} has the invalid mesh type")]
    InvalidMeshType(u16),
    /// `begin_mesh` was called while another recording was active.
    #[error("a recording is already in progress (mesh {0})")]
    RecordingInProgress(u16),
    /// `end_mesh` was called without a matching `begin_mesh`.
    #[error("no recording in progress")]
    NotRecording,
    /// `begin_instancing` was called while another instance recording was active.
    #[error("an instance recording is already in progress (buffer {0})")]
    InstancingInProgress(u16),
    /// `end_instancing` was called without a matching `begin_instancing`.
    #[error("no instance recording in progress")]
    NotInstancing,
}
