//! The packed 32-bit mesh flags word.
//!
//! One word per mesh carries the mesh type, the primitive type, the set of
//! recorded vertex attributes and a handful of processing options. Each
//! sub-field lives in its own bit range:
//!
//! | bits   | field                                   |
//! |--------|-----------------------------------------|
//! | 0..2   | mesh type ([`MeshType`])                |
//! | 2..5   | primitive type ([`PrimitiveType`])      |
//! | 5..9   | vertex attributes ([`VertexAttribs`])   |
//! | 9..14  | processing options                      |
//! | 20..22 | internal, never accepted from callers   |
//!
//! Disjointness of the ranges is checked at compile time below.

use bitflags::bitflags;
use static_assertions::const_assert_eq;

// ----------------------------------------------------------------------------
// Mesh type
// ----------------------------------------------------------------------------

pub const MESH_TYPE_SHIFT: u32 = 0;
pub const MESH_TYPE_MASK: u32 = 0b11 << MESH_TYPE_SHIFT;

pub const MESH_STATIC: u32 = 0 << MESH_TYPE_SHIFT;
pub const MESH_TRANSIENT: u32 = 1 << MESH_TYPE_SHIFT;
pub const MESH_DYNAMIC: u32 = 2 << MESH_TYPE_SHIFT;
pub const MESH_INVALID: u32 = 3 << MESH_TYPE_SHIFT;

// ----------------------------------------------------------------------------
// Primitive type
// ----------------------------------------------------------------------------

pub const PRIMITIVE_SHIFT: u32 = 2;
pub const PRIMITIVE_MASK: u32 = 0b111 << PRIMITIVE_SHIFT;

pub const PRIMITIVE_TRIANGLES: u32 = 0 << PRIMITIVE_SHIFT;
pub const PRIMITIVE_QUADS: u32 = 1 << PRIMITIVE_SHIFT;
pub const PRIMITIVE_TRIANGLE_STRIP: u32 = 2 << PRIMITIVE_SHIFT;
pub const PRIMITIVE_LINES: u32 = 3 << PRIMITIVE_SHIFT;
pub const PRIMITIVE_LINE_STRIP: u32 = 4 << PRIMITIVE_SHIFT;
pub const PRIMITIVE_POINTS: u32 = 5 << PRIMITIVE_SHIFT;

// ----------------------------------------------------------------------------
// Vertex attributes
// ----------------------------------------------------------------------------

pub const VERTEX_ATTRIB_SHIFT: u32 = 5;
pub const VERTEX_ATTRIB_MASK: u32 = 0b1111 << VERTEX_ATTRIB_SHIFT;

pub const VERTEX_COLOR: u32 = 1 << VERTEX_ATTRIB_SHIFT;
pub const VERTEX_NORMAL: u32 = 2 << VERTEX_ATTRIB_SHIFT;
pub const VERTEX_TEXCOORD: u32 = 4 << VERTEX_ATTRIB_SHIFT;
/// Modifier: store texcoords as two `f32` instead of two snorm `i16`.
/// Implies [`VERTEX_TEXCOORD`].
pub const TEXCOORD_F32: u32 = 8 << VERTEX_ATTRIB_SHIFT;
pub const VERTEX_TEXCOORD_F32: u32 = VERTEX_TEXCOORD | TEXCOORD_F32;

// ----------------------------------------------------------------------------
// Processing options
// ----------------------------------------------------------------------------

pub const OPTIMIZE_GEOMETRY: u32 = 1 << 9;
pub const NO_VERTEX_TRANSFORM: u32 = 1 << 10;
pub const KEEP_CPU_GEOMETRY: u32 = 1 << 11;
pub const GENERATE_FLAT_NORMALS: u32 = 1 << 12;
pub const GENERATE_SMOOTH_NORMALS: u32 = 1 << 13;

pub const OPTION_MASK: u32 = OPTIMIZE_GEOMETRY
    | NO_VERTEX_TRANSFORM
    | KEEP_CPU_GEOMETRY
    | GENERATE_FLAT_NORMALS
    | GENERATE_SMOOTH_NORMALS;

/// Every bit a caller may legitimately pass to `begin_mesh`.
pub const USER_MASK: u32 = MESH_TYPE_MASK | PRIMITIVE_MASK | VERTEX_ATTRIB_MASK | OPTION_MASK;

// ----------------------------------------------------------------------------
// Internal flags
// ----------------------------------------------------------------------------

/// Set on resolved draw calls that carry instance data.
pub const INTERNAL_INSTANCING_SUPPORTED: u32 = 1 << 20;
pub const INTERNAL_SAMPLER_COLOR_R: u32 = 1 << 21;

pub const INTERNAL_MASK: u32 = INTERNAL_INSTANCING_SUPPORTED | INTERNAL_SAMPLER_COLOR_R;

const_assert_eq!(MESH_TYPE_MASK & PRIMITIVE_MASK, 0);
const_assert_eq!((MESH_TYPE_MASK | PRIMITIVE_MASK) & VERTEX_ATTRIB_MASK, 0);
const_assert_eq!((MESH_TYPE_MASK | PRIMITIVE_MASK | VERTEX_ATTRIB_MASK) & OPTION_MASK, 0);
const_assert_eq!(USER_MASK & INTERNAL_MASK, 0);
const_assert_eq!(PRIMITIVE_POINTS & !PRIMITIVE_MASK, 0);
const_assert_eq!(VERTEX_ATTRIB_MASK >> VERTEX_ATTRIB_SHIFT, VertexAttribs::all().bits());
const_assert_eq!(VERTEX_COLOR >> VERTEX_ATTRIB_SHIFT, VertexAttribs::COLOR.bits());
const_assert_eq!(VERTEX_NORMAL >> VERTEX_ATTRIB_SHIFT, VertexAttribs::NORMAL.bits());
const_assert_eq!(VERTEX_TEXCOORD >> VERTEX_ATTRIB_SHIFT, VertexAttribs::TEXCOORD.bits());
const_assert_eq!(TEXCOORD_F32 >> VERTEX_ATTRIB_SHIFT, VertexAttribs::TEXCOORD_F32.bits());

bitflags! {
    /// Optional per-vertex attributes, in their canonical 4-bit form.
    ///
    /// The raw bits double as the index into attribute dispatch tables.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VertexAttribs: u32 {
        /// Packed RGBA8 color.
        const COLOR = 1 << 0;
        /// Packed unsigned normal, 3 bytes plus padding.
        const NORMAL = 1 << 1;
        /// Texture coordinates, snorm16x2 unless `TEXCOORD_F32` is set.
        const TEXCOORD = 1 << 2;
        /// Texture coordinates stored as float2.
        const TEXCOORD_F32 = 1 << 3;
    }
}

impl VertexAttribs {
    /// Number of distinct raw values, the size of tables keyed by `bits()`.
    pub const COUNT: usize = 16;

    /// The three attributes that occupy their own slot in a vertex.
    pub const SLOTS: Self = Self::COLOR.union(Self::NORMAL).union(Self::TEXCOORD);

    /// Extract the attribute set from a flags word.
    #[inline]
    pub fn from_flags(flags: u32) -> Self {
        Self::from_bits_truncate((flags & VERTEX_ATTRIB_MASK) >> VERTEX_ATTRIB_SHIFT).normalized()
    }

    /// Bits of this set positioned inside a flags word.
    #[inline]
    pub const fn to_flags(self) -> u32 {
        self.bits() << VERTEX_ATTRIB_SHIFT
    }

    /// Drop `TEXCOORD_F32` when there is no texcoord to modify.
    #[inline]
    pub fn normalized(self) -> Self {
        if self.contains(Self::TEXCOORD) {
            self
        } else {
            self - Self::TEXCOORD_F32
        }
    }

    /// Whether this is a canonical set (no dangling `TEXCOORD_F32`).
    pub fn is_normalized(self) -> bool {
        self == self.normalized()
    }

    /// Only the slot bits (color, normal, texcoord).
    #[inline]
    pub fn slots(self) -> Self {
        self & Self::SLOTS
    }

    /// Encoded size of one vertex's attributes in bytes.
    pub const fn vertex_size(self) -> usize {
        let mut size = 0;
        if self.contains(Self::COLOR) {
            size += COLOR_SIZE;
        }
        if self.contains(Self::NORMAL) {
            size += NORMAL_SIZE;
        }
        if self.contains(Self::TEXCOORD) {
            size += if self.contains(Self::TEXCOORD_F32) {
                TEXCOORD_F32_SIZE
            } else {
                TEXCOORD_PACKED_SIZE
            };
        }
        size
    }
}

/// Bytes of a packed RGBA8 color.
pub const COLOR_SIZE: usize = 4;
/// Bytes of a packed normal (three unorm8 plus padding).
pub const NORMAL_SIZE: usize = 4;
/// Bytes of a snorm16x2 texcoord.
pub const TEXCOORD_PACKED_SIZE: usize = 4;
/// Bytes of a float2 texcoord.
pub const TEXCOORD_F32_SIZE: usize = 8;
/// Bytes of a float3 position.
pub const POSITION_SIZE: usize = 12;

/// Storage and lifetime class of a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MeshType {
    /// Uploaded once, deduplicated and indexed.
    #[default]
    Static,
    /// Valid for the current frame only, unindexed.
    Transient,
    /// Like static, but backed by device buffers that may be updated.
    Dynamic,
    /// Reserved value; meshes with this type are rejected.
    Invalid,
}

impl MeshType {
    /// Extract the mesh type from a flags word.
    #[inline]
    pub fn from_flags(flags: u32) -> Self {
        match (flags & MESH_TYPE_MASK) >> MESH_TYPE_SHIFT {
            0 => Self::Static,
            1 => Self::Transient,
            2 => Self::Dynamic,
            _ => Self::Invalid,
        }
    }

    /// Bits of this type inside a flags word.
    pub const fn to_flags(self) -> u32 {
        match self {
            Self::Static => MESH_STATIC,
            Self::Transient => MESH_TRANSIENT,
            Self::Dynamic => MESH_DYNAMIC,
            Self::Invalid => MESH_INVALID,
        }
    }

    /// Static or dynamic.
    pub fn is_persistent(self) -> bool {
        matches!(self, Self::Static | Self::Dynamic)
    }
}

/// Primitive assembly of a mesh's vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveType {
    #[default]
    Triangles,
    /// Groups of four vertices, emulated as two triangles each.
    Quads,
    TriangleStrip,
    Lines,
    LineStrip,
    Points,
}

impl PrimitiveType {
    /// Extract the primitive type, or `None` for the two unassigned values.
    pub fn from_flags(flags: u32) -> Option<Self> {
        match (flags & PRIMITIVE_MASK) >> PRIMITIVE_SHIFT {
            0 => Some(Self::Triangles),
            1 => Some(Self::Quads),
            2 => Some(Self::TriangleStrip),
            3 => Some(Self::Lines),
            4 => Some(Self::LineStrip),
            5 => Some(Self::Points),
            _ => None,
        }
    }

    /// Bits of this primitive inside a flags word.
    pub const fn to_flags(self) -> u32 {
        match self {
            Self::Triangles => PRIMITIVE_TRIANGLES,
            Self::Quads => PRIMITIVE_QUADS,
            Self::TriangleStrip => PRIMITIVE_TRIANGLE_STRIP,
            Self::Lines => PRIMITIVE_LINES,
            Self::LineStrip => PRIMITIVE_LINE_STRIP,
            Self::Points => PRIMITIVE_POINTS,
        }
    }

    /// Whether recorded vertices form a triangle list after quad emulation.
    pub fn is_triangle_list(self) -> bool {
        matches!(self, Self::Triangles | Self::Quads)
    }
}

/// Mesh type of a flags word.
#[inline]
pub fn mesh_type(flags: u32) -> MeshType {
    MeshType::from_flags(flags)
}

/// Primitive type of a flags word. Unassigned values read as triangles;
/// callers validate flags with [`validate_flags`] before recording.
#[inline]
pub fn primitive_type(flags: u32) -> PrimitiveType {
    PrimitiveType::from_flags(flags).unwrap_or_default()
}

/// Attribute set of a flags word.
#[inline]
pub fn vertex_attribs(flags: u32) -> VertexAttribs {
    VertexAttribs::from_flags(flags)
}

/// Whether the flags request quad emulation.
#[inline]
pub fn is_quad(flags: u32) -> bool {
    primitive_type(flags) == PrimitiveType::Quads
}

/// Replace the attribute bits of `flags`.
#[inline]
pub fn with_vertex_attribs(flags: u32, attribs: VertexAttribs) -> u32 {
    (flags & !VERTEX_ATTRIB_MASK) | attribs.to_flags()
}

/// Problems found by [`validate_flags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagsProblem {
    /// Bits outside the user-facing ranges were set.
    ReservedBits(u32),
    /// The primitive field holds an unassigned value.
    UnknownPrimitive(u32),
    /// `TEXCOORD_F32` without `VERTEX_TEXCOORD`.
    DanglingTexcoordF32,
}

impl std::fmt::Display for FlagsProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReservedBits(bits) => write!(f, "reserved flag bits set: {bits:#x}"),
            Self::UnknownPrimitive(value) => write!(f, "unknown primitive type {value}"),
            Self::DanglingTexcoordF32 => write!(f, "TEXCOORD_F32 requires VERTEX_TEXCOORD"),
        }
    }
}

/// Check a caller-supplied flags word.
///
/// The mesh type is not checked here; `MESH_INVALID` is reported when the
/// recorded mesh reaches the cache.
pub fn validate_flags(flags: u32) -> Result<(), FlagsProblem> {
    let reserved = flags & !USER_MASK;
    if reserved != 0 {
        return Err(FlagsProblem::ReservedBits(reserved));
    }
    if PrimitiveType::from_flags(flags).is_none() {
        return Err(FlagsProblem::UnknownPrimitive((flags & PRIMITIVE_MASK) >> PRIMITIVE_SHIFT));
    }
    let raw = VertexAttribs::from_bits_truncate((flags & VERTEX_ATTRIB_MASK) >> VERTEX_ATTRIB_SHIFT);
    if !raw.is_normalized() {
        return Err(FlagsProblem::DanglingTexcoordF32);
    }
    Ok(())
}
