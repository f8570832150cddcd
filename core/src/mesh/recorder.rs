//! Per-thread geometry recorder.
//!
//! A [`MeshRecorder`] accumulates positions and packed attributes into two
//! parallel byte streams. The function that appends a vertex is one of four
//! monomorphized variants (quad emulation on/off, attributes on/off) chosen
//! in [`MeshRecorder::start`].
//!
//! # Quad emulation
//!
//! Quads are recorded as four vertices and stored as a triangle list. When the
//! fourth vertex of a quad arrives the recorder first re-appends the quad's
//! first and third vertex, so `v0 v1 v2 v3` is stored as
//! `v0 v1 v2 v0 v2 v3`. After `n` calls to `vertex()` the stored count is
//! `n + 2 * (n / 4)`.

use super::attribs::VertexAttribState;
use super::flags::{
    self, MeshType, POSITION_SIZE, PrimitiveType, VertexAttribs, GENERATE_FLAT_NORMALS,
    GENERATE_SMOOTH_NORMALS,
};
use super::normals;

/// Default number of vertices reserved when a recording starts.
pub const DEFAULT_VERTEX_CAPACITY: usize = 32 * 1024;

type StoreVertexFn = fn(&mut MeshRecorder, [f32; 3]);

/// Re-append the first and third vertex of the three most recent ones.
#[inline]
fn emulate_quad(buffer: &mut Vec<u8>, vertex_size: usize) {
    debug_assert!(buffer.len() >= 3 * vertex_size);
    let v0 = buffer.len() - 3 * vertex_size;
    let v2 = buffer.len() - vertex_size;
    buffer.extend_from_within(v0..v0 + vertex_size);
    buffer.extend_from_within(v2..v2 + vertex_size);
}

fn store_vertex<const IS_QUAD: bool, const HAS_ATTRIBS: bool>(
    recorder: &mut MeshRecorder,
    position: [f32; 3],
) {
    if IS_QUAD && (recorder.invocation_count & 3) == 3 {
        emulate_quad(&mut recorder.position_buffer, POSITION_SIZE);
        if HAS_ATTRIBS {
            emulate_quad(&mut recorder.attrib_buffer, recorder.attrib_state.size());
        }
        recorder.vertex_count += 2;
    }

    recorder
        .position_buffer
        .extend_from_slice(bytemuck::bytes_of(&position));
    if HAS_ATTRIBS {
        recorder
            .attrib_buffer
            .extend_from_slice(recorder.attrib_state.bytes());
    }

    recorder.vertex_count += 1;
    recorder.invocation_count += 1;

    debug_assert_eq!(
        recorder.position_buffer.len(),
        recorder.vertex_count as usize * POSITION_SIZE
    );
    debug_assert_eq!(
        recorder.attrib_buffer.len(),
        recorder.vertex_count as usize * recorder.attrib_state.size()
    );
}

/// Indexed by `is_quad * 2 + has_attribs`.
static STORE_VERTEX_FUNCS: [StoreVertexFn; 4] = [
    store_vertex::<false, false>,
    store_vertex::<false, true>,
    store_vertex::<true, false>,
    store_vertex::<true, true>,
];

#[inline]
fn store_vertex_func(is_quad: bool, has_attribs: bool) -> StoreVertexFn {
    STORE_VERTEX_FUNCS[usize::from(is_quad) * 2 + usize::from(has_attribs)]
}

/// Read-only view of a finished recording.
#[derive(Debug, Clone, Copy)]
pub struct RecordedGeometry<'a> {
    /// Flags the recording was started with.
    pub flags: u32,
    /// Tightly packed `[f32; 3]` positions.
    pub positions: &'a [u8],
    /// Packed attributes, `attrib_size` bytes per vertex. Empty without attributes.
    pub attribs: &'a [u8],
    /// Bytes per vertex in `attribs`.
    pub attrib_size: usize,
    /// Number of stored vertices, after quad emulation.
    pub vertex_count: u32,
}

impl<'a> RecordedGeometry<'a> {
    pub fn vertex_attribs(&self) -> VertexAttribs {
        flags::vertex_attribs(self.flags)
    }

    pub fn mesh_type(&self) -> MeshType {
        flags::mesh_type(self.flags)
    }

    pub fn primitive(&self) -> PrimitiveType {
        flags::primitive_type(self.flags)
    }

    pub fn has_attribs(&self) -> bool {
        self.attrib_size > 0
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_count == 0
    }

    /// Position of vertex `index`.
    pub fn position(&self, index: usize) -> [f32; 3] {
        let start = index * POSITION_SIZE;
        bytemuck::pod_read_unaligned(&self.positions[start..start + POSITION_SIZE])
    }

    /// Encoded attributes of vertex `index`.
    pub fn attrib_bytes(&self, index: usize) -> &'a [u8] {
        let start = index * self.attrib_size;
        &self.attribs[start..start + self.attrib_size]
    }
}

/// Accumulates one mesh worth of vertices.
///
/// Attribute setters change the values applied to the *next* `vertex()`
/// call, immediate-mode style.
pub struct MeshRecorder {
    position_buffer: Vec<u8>,
    attrib_buffer: Vec<u8>,
    attrib_state: VertexAttribState,
    store_vertex: StoreVertexFn,
    vertex_count: u32,
    invocation_count: u32,
    /// Set once `normal()` is called during the recording.
    normal_recorded: bool,
    flags: u32,
    reserve_vertices: usize,
}

impl MeshRecorder {
    /// Recorder reserving [`DEFAULT_VERTEX_CAPACITY`] vertices per recording.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_VERTEX_CAPACITY)
    }

    /// Recorder reserving `vertices` vertices per recording.
    pub fn with_capacity(vertices: usize) -> Self {
        Self {
            position_buffer: Vec::new(),
            attrib_buffer: Vec::new(),
            attrib_state: VertexAttribState::new(),
            store_vertex: store_vertex_func(false, false),
            vertex_count: 0,
            invocation_count: 0,
            normal_recorded: false,
            flags: 0,
            reserve_vertices: vertices,
        }
    }

    /// Begin a new recording, discarding anything left from the last one.
    pub fn start(&mut self, flags: u32) {
        let attribs = flags::vertex_attribs(flags);

        self.clear();
        self.flags = flags;
        self.attrib_state.reset(attribs);
        self.store_vertex = store_vertex_func(flags::is_quad(flags), !attribs.is_empty());

        self.position_buffer
            .reserve(self.reserve_vertices * POSITION_SIZE);
        if !attribs.is_empty() {
            self.attrib_buffer
                .reserve(self.reserve_vertices * attribs.vertex_size());
        }
    }

    /// Append a vertex with the current attributes.
    #[inline]
    pub fn vertex(&mut self, x: f32, y: f32, z: f32) {
        let store = self.store_vertex;
        store(self, [x, y, z]);
    }

    #[inline]
    pub fn color(&mut self, rgba: u32) {
        self.attrib_state.store_color(rgba);
    }

    #[inline]
    pub fn normal(&mut self, x: f32, y: f32, z: f32) {
        self.normal_recorded = true;
        self.attrib_state.store_normal(x, y, z);
    }

    #[inline]
    pub fn texcoord(&mut self, u: f32, v: f32) {
        self.attrib_state.store_texcoord(u, v);
    }

    /// Finish the recording and expose its buffers.
    ///
    /// Requested normal generation runs here. It fills the normal attribute
    /// only when no normal was recorded explicitly.
    pub fn end(&mut self) -> RecordedGeometry<'_> {
        self.generate_normals();
        self.geometry()
    }

    /// View of the buffers recorded so far.
    pub fn geometry(&self) -> RecordedGeometry<'_> {
        RecordedGeometry {
            flags: self.flags,
            positions: &self.position_buffer,
            attribs: &self.attrib_buffer,
            attrib_size: self.attrib_state.size(),
            vertex_count: self.vertex_count,
        }
    }

    /// Drop recorded vertices, keeping allocations.
    pub fn clear(&mut self) {
        self.position_buffer.clear();
        self.attrib_buffer.clear();
        self.vertex_count = 0;
        self.invocation_count = 0;
        self.normal_recorded = false;
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Stored vertex count, including vertices added by quad emulation.
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Number of `vertex()` calls since `start`.
    pub fn invocation_count(&self) -> u32 {
        self.invocation_count
    }

    fn generate_normals(&mut self) {
        let generate = self.flags & (GENERATE_FLAT_NORMALS | GENERATE_SMOOTH_NORMALS);
        if generate == 0 {
            return;
        }

        let Some(normal_offset) = self.attrib_state.offsets().normal else {
            log::warn!("normal generation requested for a mesh without normals, ignored");
            return;
        };
        if self.normal_recorded {
            log::warn!("normal generation requested for a mesh with recorded normals, ignored");
            return;
        }
        if !flags::primitive_type(self.flags).is_triangle_list() {
            log::warn!("normal generation requires triangles or quads, ignored");
            return;
        }

        let stride = self.attrib_state.size();
        if generate & GENERATE_SMOOTH_NORMALS != 0 {
            normals::generate_smooth_normals(
                &self.position_buffer,
                &mut self.attrib_buffer,
                stride,
                normal_offset,
            );
        } else {
            normals::generate_flat_normals(
                &self.position_buffer,
                &mut self.attrib_buffer,
                stride,
                normal_offset,
            );
        }
    }
}

impl Default for MeshRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MeshRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshRecorder")
            .field("flags", &format_args!("{:#x}", self.flags))
            .field("vertex_count", &self.vertex_count)
            .field("invocation_count", &self.invocation_count)
            .field("attribs", &self.attrib_state.attribs())
            .finish()
    }
}
