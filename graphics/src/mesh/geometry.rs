//! Building and uploading persistent mesh geometry.
//!
//! Recorded vertices are deduplicated across the position and attribute
//! streams together, so two vertices merge only when every byte of both
//! streams matches. The resulting index list has one entry per recorded
//! vertex and may be reordered for the vertex cache and overdraw.
//!
//! Remapping and index optimization are done by `meshopt`. Each vertex is
//! packed into a fixed-size [`VertexKey`] holding its position followed by
//! its attributes, so one remap covers both streams.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use meshopt::VertexDataAdapter;
use tessera_core::mesh::flags::{OPTIMIZE_GEOMETRY, POSITION_SIZE, VertexAttribs};
use tessera_core::mesh::{CpuGeometry, IndexFormat, RecordedGeometry};

use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::types::VertexLayoutHandle;

use super::data::{MeshBuffers, PersistentIndexBuffer, PersistentVertexBuffer};

/// Allowed vertex cache degradation when reordering for overdraw.
pub const OVERDRAW_THRESHOLD: f32 = 1.05;

/// Largest attribute block a vertex can carry.
const MAX_ATTRIB_SIZE: usize = VertexAttribs::all().vertex_size();

const KEY_SIZE: usize = POSITION_SIZE + MAX_ATTRIB_SIZE;

/// Position and attribute bytes of one vertex, zero padded.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct VertexKey([u8; KEY_SIZE]);

impl Default for VertexKey {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl VertexKey {
    fn pack(geometry: &RecordedGeometry<'_>, index: usize) -> Self {
        let mut key = Self::zeroed();
        let start = index * POSITION_SIZE;
        key.0[..POSITION_SIZE].copy_from_slice(&geometry.positions[start..start + POSITION_SIZE]);
        if geometry.has_attribs() {
            key.0[POSITION_SIZE..POSITION_SIZE + geometry.attrib_size]
                .copy_from_slice(geometry.attrib_bytes(index));
        }
        key
    }

    fn position(&self) -> &[u8] {
        &self.0[..POSITION_SIZE]
    }

    fn attribs(&self, size: usize) -> &[u8] {
        &self.0[POSITION_SIZE..POSITION_SIZE + size]
    }
}

/// Deduplicated, indexed geometry ready for upload.
#[derive(Debug, Clone, Default)]
pub(crate) struct PersistentGeometry {
    pub positions: Vec<u8>,
    pub attribs: Vec<u8>,
    pub attrib_size: usize,
    pub indices: Vec<u32>,
    pub vertex_count: usize,
}

impl PersistentGeometry {
    /// Deduplicate `geometry` and, when requested, optimize its indices.
    pub fn build(geometry: &RecordedGeometry<'_>) -> Self {
        let count = geometry.vertex_count as usize;
        let attrib_size = geometry.attrib_size;
        debug_assert!(attrib_size <= MAX_ATTRIB_SIZE);

        let keys: Vec<VertexKey> = (0..count).map(|i| VertexKey::pack(geometry, i)).collect();
        let (unique, remap) = meshopt::generate_vertex_remap(&keys, None);
        let unique_keys = meshopt::remap_vertex_buffer(&keys, unique, &remap);

        let mut positions = Vec::with_capacity(unique * POSITION_SIZE);
        let mut attribs = Vec::with_capacity(unique * attrib_size);
        for key in &unique_keys {
            positions.extend_from_slice(key.position());
            attribs.extend_from_slice(key.attribs(attrib_size));
        }

        let mut indices = meshopt::remap_index_buffer(None, count, &remap);

        let optimize = geometry.flags & OPTIMIZE_GEOMETRY != 0
            && geometry.primitive().is_triangle_list()
            && count % 3 == 0;
        if optimize {
            indices = meshopt::optimize_vertex_cache(&indices, unique);
            match VertexDataAdapter::new(&positions, POSITION_SIZE, 0) {
                Ok(adapter) => {
                    meshopt::optimize_overdraw_in_place(&mut indices, &adapter, OVERDRAW_THRESHOLD);
                }
                Err(err) => log::warn!("Skipping overdraw optimization: {err:?}"),
            }
        }

        log::trace!("Deduplicated {count} vertices to {unique} (optimized: {optimize})");
        Self {
            positions,
            attribs,
            attrib_size,
            indices,
            vertex_count: unique,
        }
    }

    /// Narrowest index format for the unique vertices.
    pub fn index_format(&self) -> IndexFormat {
        IndexFormat::for_vertex_count(self.vertex_count)
    }

    /// CPU copy of the final buffers.
    pub fn to_cpu_geometry(&self) -> Arc<CpuGeometry> {
        Arc::new(CpuGeometry {
            positions: bytemuck::pod_collect_to_vec(&self.positions),
            attribs: self.attribs.clone(),
            attrib_size: self.attrib_size,
            indices: self.indices.clone(),
        })
    }

    /// Create device buffers for this geometry.
    ///
    /// `attribs_layout` must be given exactly when the geometry has
    /// attributes. On failure every buffer created so far is destroyed.
    pub fn upload(
        &self,
        device: &dyn GraphicsDevice,
        positions_layout: VertexLayoutHandle,
        attribs_layout: Option<VertexLayoutHandle>,
        dynamic: bool,
    ) -> Result<MeshBuffers, GraphicsError> {
        debug_assert_eq!(attribs_layout.is_some(), self.attrib_size > 0);

        let create_vertices = |data: &[u8], layout| {
            if dynamic {
                device
                    .create_dynamic_vertex_buffer(data, layout)
                    .map(PersistentVertexBuffer::Dynamic)
            } else {
                device
                    .create_vertex_buffer(data, layout)
                    .map(PersistentVertexBuffer::Static)
            }
        };

        let positions = create_vertices(&self.positions, positions_layout)?;

        let attribs = match attribs_layout {
            Some(layout) => match create_vertices(&self.attribs, layout) {
                Ok(buffer) => Some(buffer),
                Err(err) => {
                    positions.destroy(device);
                    return Err(err);
                }
            },
            None => None,
        };

        let index_format = self.index_format();
        let index_data = index_format.encode(&self.indices);
        let indices = if dynamic {
            device
                .create_dynamic_index_buffer(&index_data, index_format)
                .map(PersistentIndexBuffer::Dynamic)
        } else {
            device
                .create_index_buffer(&index_data, index_format)
                .map(PersistentIndexBuffer::Static)
        };
        let indices = match indices {
            Ok(indices) => indices,
            Err(err) => {
                positions.destroy(device);
                if let Some(attribs) = attribs {
                    attribs.destroy(device);
                }
                return Err(err);
            }
        };

        Ok(MeshBuffers::Persistent {
            positions,
            attribs,
            indices,
            index_format,
            vertex_count: self.vertex_count as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use tessera_core::mesh::{MeshRecorder, VertexAttribs};
    use tessera_core::mesh::flags::{
        PRIMITIVE_QUADS, PRIMITIVE_TRIANGLES, VERTEX_COLOR, VERTEX_NORMAL, VERTEX_TEXCOORD_F32,
    };

    use super::*;
    use crate::backend::DummyDevice;
    use crate::mesh::VertexLayout;

    fn record_quad(recorder: &mut MeshRecorder, flags: u32) {
        recorder.start(flags);
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            recorder.color(0xff0000ff);
            recorder.vertex(x, y, 0.0);
        }
    }

    #[test]
    fn test_quad_deduplicates_to_four() {
        let mut recorder = MeshRecorder::new();
        record_quad(&mut recorder, PRIMITIVE_QUADS | VERTEX_COLOR);
        let built = PersistentGeometry::build(&recorder.end());

        assert_eq!(built.vertex_count, 4);
        assert_eq!(built.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(built.positions.len(), 4 * POSITION_SIZE);
        assert_eq!(built.attribs.len(), 4 * 4);
        assert_eq!(built.index_format(), IndexFormat::Uint16);
    }

    #[test]
    fn test_unique_vertices_keep_order() {
        let mut recorder = MeshRecorder::new();
        recorder.start(PRIMITIVE_TRIANGLES);
        for i in 0..9 {
            recorder.vertex(i as f32, 0.0, 0.0);
        }
        let built = PersistentGeometry::build(&recorder.end());
        assert_eq!(built.vertex_count, 9);
        assert_eq!(built.indices, (0..9).collect::<Vec<u32>>());
    }

    #[test]
    fn test_attributes_split_vertices() {
        // Same position, different colors.
        let mut recorder = MeshRecorder::new();
        recorder.start(PRIMITIVE_TRIANGLES | VERTEX_COLOR);
        for color in [1, 2, 1] {
            recorder.color(color);
            recorder.vertex(0.0, 0.0, 0.0);
        }
        let built = PersistentGeometry::build(&recorder.end());
        assert_eq!(built.vertex_count, 2);
        assert_eq!(built.indices, vec![0, 1, 0]);
    }

    #[test]
    fn test_widest_vertex_keeps_attributes_with_positions() {
        let mut recorder = MeshRecorder::new();
        recorder.start(PRIMITIVE_QUADS | VERTEX_COLOR | VERTEX_NORMAL | VERTEX_TEXCOORD_F32);
        for (i, (x, y)) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)].into_iter().enumerate() {
            recorder.color(i as u32 + 1);
            recorder.normal(0.0, 0.0, 1.0);
            recorder.texcoord(x * 0.5, y * 0.25);
            recorder.vertex(x, y, 0.0);
        }
        let built = PersistentGeometry::build(&recorder.end());

        assert_eq!(built.attrib_size, MAX_ATTRIB_SIZE);
        assert_eq!(built.vertex_count, 4);
        assert_eq!(built.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(built.attribs.len(), 4 * MAX_ATTRIB_SIZE);

        let cpu = built.to_cpu_geometry();
        for i in 0..4 {
            let attribs = cpu.attrib_bytes(i);
            let color = u32::from_be_bytes(attribs[..4].try_into().unwrap());
            assert_eq!(color, i as u32 + 1);
            let uv: [f32; 2] = bytemuck::pod_read_unaligned(&attribs[8..16]);
            assert_eq!(uv, [cpu.positions[i][0] * 0.5, cpu.positions[i][1] * 0.25]);
        }
    }

    #[test]
    fn test_optimized_keeps_triangles() {
        let mut recorder = MeshRecorder::new();
        recorder.start(PRIMITIVE_QUADS | OPTIMIZE_GEOMETRY);
        for y in 0..4 {
            for x in 0..4 {
                let (x0, y0) = (x as f32, y as f32);
                for (px, py) in [(x0, y0), (x0 + 1.0, y0), (x0 + 1.0, y0 + 1.0), (x0, y0 + 1.0)] {
                    recorder.vertex(px, py, 0.0);
                }
            }
        }
        let built = PersistentGeometry::build(&recorder.end());
        assert_eq!(built.vertex_count, 25);
        assert_eq!(built.indices.len(), 16 * 6);

        let mut plain = MeshRecorder::new();
        plain.start(PRIMITIVE_QUADS);
        for y in 0..4 {
            for x in 0..4 {
                let (x0, y0) = (x as f32, y as f32);
                for (px, py) in [(x0, y0), (x0 + 1.0, y0), (x0 + 1.0, y0 + 1.0), (x0, y0 + 1.0)] {
                    plain.vertex(px, py, 0.0);
                }
            }
        }
        let reference = PersistentGeometry::build(&plain.end());

        let sorted = |indices: &[u32]| {
            let mut tris: Vec<[u32; 3]> = indices
                .chunks_exact(3)
                .map(|t| {
                    let mut tri = [t[0], t[1], t[2]];
                    tri.sort_unstable();
                    tri
                })
                .collect();
            tris.sort_unstable();
            tris
        };
        assert_eq!(sorted(&built.indices), sorted(&reference.indices));
    }

    #[test]
    fn test_cpu_geometry_copy() {
        let mut recorder = MeshRecorder::new();
        record_quad(&mut recorder, PRIMITIVE_QUADS | VERTEX_COLOR);
        let cpu = PersistentGeometry::build(&recorder.end()).to_cpu_geometry();
        assert_eq!(cpu.vertex_count(), 4);
        assert_eq!(cpu.index_count(), 6);
        assert_eq!(cpu.positions[2], [1.0, 1.0, 0.0]);
        assert_eq!(cpu.attrib_bytes(0), &[0xff, 0x00, 0x00, 0xff]);
    }

    #[test]
    fn test_upload_failure_releases_buffers() {
        let device = DummyDevice::new();
        let positions = device.create_vertex_layout(&VertexLayout::positions()).unwrap();
        let attribs = device
            .create_vertex_layout(&VertexLayout::for_attribs(
                VertexAttribs::COLOR,
                VertexAttribs::empty(),
            ))
            .unwrap();

        let mut recorder = MeshRecorder::new();
        record_quad(&mut recorder, PRIMITIVE_QUADS | VERTEX_COLOR);
        let built = PersistentGeometry::build(&recorder.end());

        let buffers = built.upload(&device, positions, Some(attribs), false).unwrap();
        assert_eq!(device.live_buffer_count(), 3);
        buffers.destroy(&device);
        assert_eq!(device.live_buffer_count(), 0);

        // Positions and attributes succeed, the index buffer fails.
        device.fail_buffer_creations(2, 1);
        assert!(built.upload(&device, positions, Some(attribs), true).is_err());
        assert_eq!(device.live_buffer_count(), 0);

        // Attributes fail.
        device.fail_buffer_creations(1, 1);
        assert!(built.upload(&device, positions, Some(attribs), false).is_err());
        assert_eq!(device.live_buffer_count(), 0);
    }
}
