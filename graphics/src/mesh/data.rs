//! Mesh table entries.
//!
//! A [`Mesh`] is what a mesh ID resolves to once recording ends: the
//! device buffers holding its geometry plus the flags and counts needed to
//! draw it.
//!
//! # Storage
//!
//! Persistent meshes (static and dynamic) own deduplicated vertex buffers
//! and an index buffer. Transient meshes point into the frame's transient
//! buffer pool and are drawn unindexed.

use std::sync::Arc;

use tessera_core::mesh::flags;
use tessera_core::mesh::{CpuGeometry, IndexFormat, MeshType, PrimitiveTopology, VertexAttribs};

use crate::device::GraphicsDevice;
use crate::types::{
    DynamicIndexBufferHandle, DynamicVertexBufferHandle, IndexBufferHandle, VertexBufferHandle,
};

/// Vertex buffer owned by a persistent mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistentVertexBuffer {
    Static(VertexBufferHandle),
    Dynamic(DynamicVertexBufferHandle),
}

impl PersistentVertexBuffer {
    pub(crate) fn destroy(self, device: &dyn GraphicsDevice) {
        match self {
            Self::Static(handle) => device.destroy_vertex_buffer(handle),
            Self::Dynamic(handle) => device.destroy_dynamic_vertex_buffer(handle),
        }
    }
}

/// Index buffer owned by a persistent mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistentIndexBuffer {
    Static(IndexBufferHandle),
    Dynamic(DynamicIndexBufferHandle),
}

impl PersistentIndexBuffer {
    pub(crate) fn destroy(self, device: &dyn GraphicsDevice) {
        match self {
            Self::Static(handle) => device.destroy_index_buffer(handle),
            Self::Dynamic(handle) => device.destroy_dynamic_index_buffer(handle),
        }
    }
}

/// Where a mesh's geometry lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshBuffers {
    /// Deduplicated, indexed device buffers.
    Persistent {
        positions: PersistentVertexBuffer,
        attribs: Option<PersistentVertexBuffer>,
        indices: PersistentIndexBuffer,
        index_format: IndexFormat,
        /// Unique vertices after deduplication.
        vertex_count: u32,
    },
    /// Slots in the frame's transient buffer pool.
    Transient {
        positions: usize,
        attribs: Option<usize>,
    },
}

impl MeshBuffers {
    /// Release device buffers. Transient slots are reclaimed at frame end.
    pub(crate) fn destroy(self, device: &dyn GraphicsDevice) {
        if let Self::Persistent {
            positions,
            attribs,
            indices,
            ..
        } = self
        {
            positions.destroy(device);
            if let Some(attribs) = attribs {
                attribs.destroy(device);
            }
            indices.destroy(device);
        }
    }
}

/// A recorded mesh, ready to draw.
#[derive(Clone)]
pub struct Mesh {
    flags: u32,
    extra_data: u32,
    element_count: u32,
    buffers: MeshBuffers,
    cpu_geometry: Option<Arc<CpuGeometry>>,
}

impl Mesh {
    pub(crate) fn new(
        flags: u32,
        extra_data: u32,
        element_count: u32,
        buffers: MeshBuffers,
    ) -> Self {
        Self {
            flags,
            extra_data,
            element_count,
            buffers,
            cpu_geometry: None,
        }
    }

    pub(crate) fn with_cpu_geometry(mut self, geometry: Arc<CpuGeometry>) -> Self {
        self.cpu_geometry = Some(geometry);
        self
    }

    /// Flags the mesh was recorded with.
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Caller-supplied value passed to `begin_mesh_with_data`.
    pub fn extra_data(&self) -> u32 {
        self.extra_data
    }

    /// Indices for persistent meshes, vertices for transient ones.
    pub fn element_count(&self) -> u32 {
        self.element_count
    }

    pub fn buffers(&self) -> &MeshBuffers {
        &self.buffers
    }

    pub fn mesh_type(&self) -> MeshType {
        flags::mesh_type(self.flags)
    }

    pub fn vertex_attribs(&self) -> VertexAttribs {
        flags::vertex_attribs(self.flags)
    }

    /// Topology as submitted to the device.
    pub fn topology(&self) -> PrimitiveTopology {
        flags::primitive_type(self.flags).into()
    }

    pub fn is_transient(&self) -> bool {
        matches!(self.buffers, MeshBuffers::Transient { .. })
    }

    /// Unique vertices for persistent meshes, recorded vertices otherwise.
    pub fn vertex_count(&self) -> u32 {
        match self.buffers {
            MeshBuffers::Persistent { vertex_count, .. } => vertex_count,
            MeshBuffers::Transient { .. } => self.element_count,
        }
    }

    /// Index format, for persistent meshes.
    pub fn index_format(&self) -> Option<IndexFormat> {
        match self.buffers {
            MeshBuffers::Persistent { index_format, .. } => Some(index_format),
            MeshBuffers::Transient { .. } => None,
        }
    }

    /// CPU copy kept when recorded with `KEEP_CPU_GEOMETRY`.
    pub fn cpu_geometry(&self) -> Option<&Arc<CpuGeometry>> {
        self.cpu_geometry.as_ref()
    }
}

impl std::fmt::Debug for Mesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mesh")
            .field("mesh_type", &self.mesh_type())
            .field("topology", &self.topology())
            .field("attribs", &self.vertex_attribs())
            .field("element_count", &self.element_count)
            .field("vertex_count", &self.vertex_count())
            .field("extra_data", &self.extra_data)
            .field("cpu_geometry", &self.cpu_geometry.is_some())
            .finish()
    }
}

static_assertions::assert_impl_all!(Mesh: Send, Sync);

#[cfg(test)]
mod tests {
    use tessera_core::mesh::flags::{MESH_TRANSIENT, PRIMITIVE_QUADS, VERTEX_COLOR};

    use super::*;

    #[test]
    fn test_transient_mesh_accessors() {
        let mesh = Mesh::new(
            MESH_TRANSIENT | PRIMITIVE_QUADS | VERTEX_COLOR,
            7,
            6,
            MeshBuffers::Transient {
                positions: 0,
                attribs: Some(1),
            },
        );
        assert!(mesh.is_transient());
        assert_eq!(mesh.mesh_type(), MeshType::Transient);
        assert_eq!(mesh.topology(), PrimitiveTopology::TriangleList);
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.index_format(), None);
        assert_eq!(mesh.extra_data(), 7);
        assert_eq!(mesh.vertex_attribs(), VertexAttribs::COLOR);
    }

    #[test]
    fn test_persistent_mesh_accessors() {
        let mesh = Mesh::new(
            0,
            0,
            6,
            MeshBuffers::Persistent {
                positions: PersistentVertexBuffer::Static(VertexBufferHandle::from_raw(0)),
                attribs: None,
                indices: PersistentIndexBuffer::Static(IndexBufferHandle::from_raw(1)),
                index_format: IndexFormat::Uint16,
                vertex_count: 4,
            },
        );
        assert!(!mesh.is_transient());
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.element_count(), 6);
        assert_eq!(mesh.index_format(), Some(IndexFormat::Uint16));
        assert!(mesh.cpu_geometry().is_none());
    }
}
