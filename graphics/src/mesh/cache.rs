//! Mesh ID table.
//!
//! The cache maps small integer IDs to recorded meshes. Any thread may add
//! meshes concurrently. Deduplication, optimization and uploads run outside
//! the table lock; only the final swap into the table is serialized.
//!
//! # Locking
//!
//! Two mutexes guard the cache: the mesh table and the transient buffer
//! pool. When both are needed they are taken in that order.

use std::sync::Arc;

use parking_lot::Mutex;
use tessera_core::mesh::flags::{KEEP_CPU_GEOMETRY, POSITION_SIZE};
use tessera_core::mesh::{CpuGeometry, MeshType, RecordedGeometry};

use crate::device::GraphicsDevice;
use crate::draw::{DrawCall, DrawItem, IndexBufferRef, VertexBinding, VertexBufferRef};
use crate::error::GraphicsError;
use crate::types::VertexLayoutHandle;

use super::data::{Mesh, MeshBuffers, PersistentIndexBuffer, PersistentVertexBuffer};
use super::geometry::PersistentGeometry;
use super::layout_cache::VertexLayoutCache;
use super::transient::{TransientBufferPool, TransientRequest};

/// Default size of the mesh ID table.
pub const MAX_MESHES: usize = 4096;

/// Counters describing the cache contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshCacheStats {
    /// Static and dynamic meshes.
    pub persistent_meshes: usize,
    /// Transient meshes recorded this frame.
    pub transient_meshes: usize,
    /// Transient buffers allocated this frame.
    pub transient_buffers: usize,
    /// Whether transient memory ran out this frame.
    pub transient_exhausted: bool,
}

#[derive(Debug)]
struct MeshTable {
    entries: Vec<Option<Mesh>>,
    transient_ids: Vec<u16>,
}

/// Table of recorded meshes, indexed by mesh ID.
///
/// ID 0 is reserved and never holds a mesh.
#[derive(Debug)]
pub struct MeshCache {
    meshes: Mutex<MeshTable>,
    transient: Mutex<TransientBufferPool>,
    max_meshes: usize,
}

impl MeshCache {
    pub fn new(max_meshes: usize, max_transient_buffers: usize) -> Self {
        Self {
            meshes: Mutex::new(MeshTable {
                entries: vec![None; max_meshes],
                transient_ids: Vec::new(),
            }),
            transient: Mutex::new(TransientBufferPool::new(max_transient_buffers)),
            max_meshes,
        }
    }

    pub fn max_meshes(&self) -> usize {
        self.max_meshes
    }

    /// Whether `id` can hold a mesh.
    pub fn is_valid_id(&self, id: u16) -> bool {
        id != 0 && usize::from(id) < self.max_meshes
    }

    /// Store `geometry` under `id`, replacing what was there.
    ///
    /// The previous contents of `id` are released first. If building the new
    /// mesh fails, a warning is logged, `id` is left empty and the error is
    /// returned.
    pub fn add_mesh(
        &self,
        device: &dyn GraphicsDevice,
        layouts: &VertexLayoutCache,
        id: u16,
        extra_data: u32,
        geometry: &RecordedGeometry<'_>,
    ) -> Result<(), GraphicsError> {
        if !self.is_valid_id(id) {
            return Err(GraphicsError::InvalidParameter(format!(
                "mesh id {id} outside 1..{}",
                self.max_meshes
            )));
        }
        let mesh_type = geometry.mesh_type();
        if mesh_type == MeshType::Invalid {
            log::warn!("Mesh {id} recorded with the invalid mesh type, ignoring it");
            return Err(GraphicsError::InvalidMeshType(id));
        }

        if let Some(old) = self.take(id) {
            old.buffers().destroy(device);
        }
        if geometry.is_empty() {
            log::debug!("Mesh {id} recorded no vertices, leaving it empty");
            return Ok(());
        }

        let mesh = if mesh_type == MeshType::Transient {
            self.build_transient(device, layouts, extra_data, geometry)
        } else {
            self.build_persistent(device, layouts, extra_data, geometry, mesh_type)
        };
        let mesh = mesh.inspect_err(|err| log::warn!("Failed to build mesh {id}: {err}"))?;
        log::debug!(
            "Mesh {id}: {mesh_type:?}, {} elements over {} vertices, indices {:?}",
            mesh.element_count(),
            mesh.vertex_count(),
            mesh.index_format()
        );

        let is_transient = mesh.is_transient();
        let replaced = {
            let mut table = self.meshes.lock();
            if is_transient {
                table.transient_ids.push(id);
            }
            table.entries[usize::from(id)].replace(mesh)
        };
        // Another thread stored the same ID while this one was building.
        if let Some(replaced) = replaced {
            replaced.buffers().destroy(device);
        }
        Ok(())
    }

    fn take(&self, id: u16) -> Option<Mesh> {
        let mut table = self.meshes.lock();
        let old = table.entries[usize::from(id)].take()?;
        if old.is_transient() {
            log::warn!("Transient mesh {id} overwritten before the end of the frame");
            debug_assert!(false, "transient mesh {id} overwritten within a frame");
        }
        Some(old)
    }

    fn build_persistent(
        &self,
        device: &dyn GraphicsDevice,
        layouts: &VertexLayoutCache,
        extra_data: u32,
        geometry: &RecordedGeometry<'_>,
        mesh_type: MeshType,
    ) -> Result<Mesh, GraphicsError> {
        let (positions_layout, attribs_layout) = stream_layouts(layouts, geometry)?;

        let built = PersistentGeometry::build(geometry);
        let buffers = built.upload(
            device,
            positions_layout,
            attribs_layout,
            mesh_type == MeshType::Dynamic,
        )?;

        let mut mesh = Mesh::new(
            geometry.flags,
            extra_data,
            built.indices.len() as u32,
            buffers,
        );
        if geometry.flags & KEEP_CPU_GEOMETRY != 0 {
            mesh = mesh.with_cpu_geometry(built.to_cpu_geometry());
        }
        Ok(mesh)
    }

    fn build_transient(
        &self,
        device: &dyn GraphicsDevice,
        layouts: &VertexLayoutCache,
        extra_data: u32,
        geometry: &RecordedGeometry<'_>,
    ) -> Result<Mesh, GraphicsError> {
        let (positions_layout, attribs_layout) = stream_layouts(layouts, geometry)?;

        let mut requests = vec![TransientRequest {
            data: geometry.positions,
            stride: POSITION_SIZE,
            layout: positions_layout,
        }];
        if let Some(layout) = attribs_layout {
            requests.push(TransientRequest {
                data: geometry.attribs,
                stride: geometry.attrib_size,
                layout,
            });
        }

        let slots = self.transient.lock().alloc(device, &requests)?;
        let buffers = MeshBuffers::Transient {
            positions: slots[0],
            attribs: slots.get(1).copied(),
        };
        Ok(Mesh::new(
            geometry.flags,
            extra_data,
            geometry.vertex_count,
            buffers,
        ))
    }

    /// Forget every transient mesh and reset the transient pool.
    pub fn clear_transient_meshes(&self) {
        let mut table = self.meshes.lock();
        let ids = std::mem::take(&mut table.transient_ids);
        for id in ids {
            let entry = &mut table.entries[usize::from(id)];
            if entry.as_ref().is_some_and(Mesh::is_transient) {
                *entry = None;
            }
        }
        self.transient.lock().reset();
    }

    /// Release every mesh.
    pub fn clear(&self, device: &dyn GraphicsDevice) {
        let removed: Vec<Mesh> = {
            let mut table = self.meshes.lock();
            table.transient_ids.clear();
            table.entries.iter_mut().filter_map(Option::take).collect()
        };
        for mesh in removed {
            mesh.buffers().destroy(device);
        }
        self.transient.lock().reset();
    }

    /// Whether `id` currently holds a mesh.
    pub fn contains(&self, id: u16) -> bool {
        self.get(id).is_some()
    }

    /// Snapshot of the mesh stored under `id`.
    pub fn get(&self, id: u16) -> Option<Mesh> {
        self.meshes
            .lock()
            .entries
            .get(usize::from(id))
            .and_then(Option::clone)
    }

    /// CPU copy of a mesh recorded with `KEEP_CPU_GEOMETRY`.
    pub fn cpu_geometry(&self, id: u16) -> Option<Arc<CpuGeometry>> {
        self.get(id).and_then(|mesh| mesh.cpu_geometry().cloned())
    }

    pub fn stats(&self) -> MeshCacheStats {
        let table = self.meshes.lock();
        let pool = self.transient.lock();
        let (transient, persistent): (Vec<&Mesh>, Vec<&Mesh>) =
            table.entries.iter().flatten().partition(|mesh| mesh.is_transient());
        MeshCacheStats {
            persistent_meshes: persistent.len(),
            transient_meshes: transient.len(),
            transient_buffers: pool.len(),
            transient_exhausted: pool.is_exhausted(),
        }
    }

    /// Turn a draw request into a device draw call.
    ///
    /// Returns `None`, with a warning, when the ID holds no mesh.
    pub fn resolve(&self, item: &DrawItem, layouts: &VertexLayoutCache) -> Option<DrawCall> {
        let table = self.meshes.lock();
        let Some(mesh) = table.entries.get(usize::from(item.mesh_id)).and_then(Option::as_ref)
        else {
            log::warn!("Draw of empty mesh {} skipped", item.mesh_id);
            return None;
        };

        let mut flags = mesh.flags();
        let attribs_layout = match item.alias {
            Some(alias) => layouts.resolve_alias(&mut flags, alias),
            None => layouts.native(mesh.vertex_attribs()).map(|entry| entry.handle),
        };
        let positions_layout = layouts.positions()?.handle;
        let range = item.range.clamp(mesh.element_count());

        let (positions, attribs, indices) = match *mesh.buffers() {
            MeshBuffers::Persistent {
                positions,
                attribs,
                indices,
                index_format,
                ..
            } => {
                let indices = match indices {
                    PersistentIndexBuffer::Static(handle) => {
                        IndexBufferRef::Static(handle, index_format)
                    }
                    PersistentIndexBuffer::Dynamic(handle) => {
                        IndexBufferRef::Dynamic(handle, index_format)
                    }
                };
                (persistent_ref(positions), attribs.map(persistent_ref), Some(indices))
            }
            MeshBuffers::Transient { positions, attribs } => {
                let pool = self.transient.lock();
                let positions = VertexBufferRef::Transient(*pool.get(positions)?);
                let attribs = match attribs {
                    Some(slot) => Some(VertexBufferRef::Transient(*pool.get(slot)?)),
                    None => None,
                };
                (positions, attribs, None)
            }
        };

        let attribs = match (attribs, attribs_layout) {
            (Some(buffer), Some(layout)) => Some(VertexBinding { buffer, layout }),
            _ => None,
        };
        Some(DrawCall {
            mesh_id: item.mesh_id,
            transform: item.transform,
            flags,
            topology: mesh.topology(),
            positions: VertexBinding {
                buffer: positions,
                layout: positions_layout,
            },
            attribs,
            indices,
            first: range.start,
            count: range.count,
            instances: None,
        })
    }
}

fn persistent_ref(buffer: PersistentVertexBuffer) -> VertexBufferRef {
    match buffer {
        PersistentVertexBuffer::Static(handle) => VertexBufferRef::Static(handle),
        PersistentVertexBuffer::Dynamic(handle) => VertexBufferRef::Dynamic(handle),
    }
}

/// Layouts of the position stream and, if present, the attribute stream.
fn stream_layouts(
    layouts: &VertexLayoutCache,
    geometry: &RecordedGeometry<'_>,
) -> Result<(VertexLayoutHandle, Option<VertexLayoutHandle>), GraphicsError> {
    let missing = || GraphicsError::InvalidParameter("vertex layout not registered".to_string());
    let positions = layouts.positions().ok_or_else(missing)?.handle;
    let attribs = if geometry.has_attribs() {
        Some(layouts.native(geometry.vertex_attribs()).ok_or_else(missing)?.handle)
    } else {
        None
    };
    Ok((positions, attribs))
}

static_assertions::assert_impl_all!(MeshCache: Send, Sync);
