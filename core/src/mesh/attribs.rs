//! Encoding of the "current" vertex attributes.
//!
//! [`VertexAttribState`] holds the packed color, normal and texcoord that the
//! next recorded vertex will receive. The byte layout depends on which
//! attributes are active, always in the order color, normal, texcoord.
//!
//! Store functions are picked once per recording from a table of
//! monomorphized variants, one per [`VertexAttribs`] value, so the per-call
//! path never tests flags.

use super::flags::{
    COLOR_SIZE, NORMAL_SIZE, TEXCOORD_F32_SIZE, TEXCOORD_PACKED_SIZE, VertexAttribs,
};

/// Capacity of the scratch buffer. Large enough for every attribute set.
pub const ATTRIB_STATE_CAPACITY: usize = 32;

static_assertions::const_assert!(VertexAttribs::all().vertex_size() <= ATTRIB_STATE_CAPACITY);

type StoreColorFn = fn(&mut VertexAttribState, u32);
type StoreNormalFn = fn(&mut VertexAttribState, f32, f32, f32);
type StoreTexcoordFn = fn(&mut VertexAttribState, f32, f32);

/// The three store functions selected for one attribute set.
#[derive(Clone, Copy)]
pub struct AttribStoreFuncs {
    pub color: StoreColorFn,
    pub normal: StoreNormalFn,
    pub texcoord: StoreTexcoordFn,
}

impl std::fmt::Debug for AttribStoreFuncs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttribStoreFuncs").finish_non_exhaustive()
    }
}

/// Byte offsets of the active attributes within one encoded vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttribOffsets {
    pub color: Option<usize>,
    pub normal: Option<usize>,
    pub texcoord: Option<usize>,
}

impl AttribOffsets {
    /// Offsets for `attribs`, laid out color, normal, texcoord.
    pub const fn of(attribs: VertexAttribs) -> Self {
        let mut offset = 0;
        let mut offsets = Self {
            color: None,
            normal: None,
            texcoord: None,
        };
        if attribs.contains(VertexAttribs::COLOR) {
            offsets.color = Some(offset);
            offset += COLOR_SIZE;
        }
        if attribs.contains(VertexAttribs::NORMAL) {
            offsets.normal = Some(offset);
            offset += NORMAL_SIZE;
        }
        if attribs.contains(VertexAttribs::TEXCOORD) {
            offsets.texcoord = Some(offset);
        }
        offsets
    }
}

const fn color_offset(key: u32) -> usize {
    match AttribOffsets::of(VertexAttribs::from_bits_truncate(key)).color {
        Some(offset) => offset,
        None => 0,
    }
}

const fn normal_offset(key: u32) -> usize {
    match AttribOffsets::of(VertexAttribs::from_bits_truncate(key)).normal {
        Some(offset) => offset,
        None => 0,
    }
}

const fn texcoord_offset(key: u32) -> usize {
    match AttribOffsets::of(VertexAttribs::from_bits_truncate(key)).texcoord {
        Some(offset) => offset,
        None => 0,
    }
}

/// Pack an 0xRRGGBBAA color into the device byte order (R first in memory).
#[inline]
pub fn pack_color(rgba: u32) -> [u8; COLOR_SIZE] {
    rgba.to_be_bytes()
}

/// Inverse of [`pack_color`].
#[inline]
pub fn unpack_color(bytes: [u8; COLOR_SIZE]) -> u32 {
    u32::from_be_bytes(bytes)
}

#[inline]
fn to_unorm8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[inline]
fn to_snorm16(value: f32) -> i16 {
    (value.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

/// Pack a unit normal into three unorm8 bytes and a zero pad byte.
#[inline]
pub fn pack_normal(x: f32, y: f32, z: f32) -> [u8; NORMAL_SIZE] {
    [
        to_unorm8(x * 0.5 + 0.5),
        to_unorm8(y * 0.5 + 0.5),
        to_unorm8(z * 0.5 + 0.5),
        0,
    ]
}

/// Inverse of [`pack_normal`], up to quantization.
#[inline]
pub fn unpack_normal(bytes: [u8; NORMAL_SIZE]) -> [f32; 3] {
    let f = |b: u8| f32::from(b) / 255.0 * 2.0 - 1.0;
    [f(bytes[0]), f(bytes[1]), f(bytes[2])]
}

/// Pack texcoords as two snorm16 values.
#[inline]
pub fn pack_texcoord(u: f32, v: f32) -> [u8; TEXCOORD_PACKED_SIZE] {
    bytemuck::cast([to_snorm16(u), to_snorm16(v)])
}

fn store_color<const KEY: u32>(state: &mut VertexAttribState, rgba: u32) {
    let offset = color_offset(KEY);
    state.data[offset..offset + COLOR_SIZE].copy_from_slice(&pack_color(rgba));
}

fn store_normal<const KEY: u32>(state: &mut VertexAttribState, x: f32, y: f32, z: f32) {
    let offset = normal_offset(KEY);
    state.data[offset..offset + NORMAL_SIZE].copy_from_slice(&pack_normal(x, y, z));
}

fn store_packed_texcoord<const KEY: u32>(state: &mut VertexAttribState, u: f32, v: f32) {
    let offset = texcoord_offset(KEY);
    state.data[offset..offset + TEXCOORD_PACKED_SIZE].copy_from_slice(&pack_texcoord(u, v));
}

fn store_full_texcoord<const KEY: u32>(state: &mut VertexAttribState, u: f32, v: f32) {
    let offset = texcoord_offset(KEY);
    let bytes: [u8; TEXCOORD_F32_SIZE] = bytemuck::cast([u, v]);
    state.data[offset..offset + TEXCOORD_F32_SIZE].copy_from_slice(&bytes);
}

fn store_no_color(_: &mut VertexAttribState, _: u32) {}

fn store_no_normal(_: &mut VertexAttribState, _: f32, _: f32, _: f32) {}

fn store_no_texcoord(_: &mut VertexAttribState, _: f32, _: f32) {}

const fn store_funcs<const KEY: u32>() -> AttribStoreFuncs {
    let attribs = VertexAttribs::from_bits_truncate(KEY);
    AttribStoreFuncs {
        color: if attribs.contains(VertexAttribs::COLOR) {
            store_color::<KEY> as StoreColorFn
        } else {
            store_no_color as StoreColorFn
        },
        normal: if attribs.contains(VertexAttribs::NORMAL) {
            store_normal::<KEY> as StoreNormalFn
        } else {
            store_no_normal as StoreNormalFn
        },
        texcoord: if !attribs.contains(VertexAttribs::TEXCOORD) {
            store_no_texcoord as StoreTexcoordFn
        } else if attribs.contains(VertexAttribs::TEXCOORD_F32) {
            store_full_texcoord::<KEY> as StoreTexcoordFn
        } else {
            store_packed_texcoord::<KEY> as StoreTexcoordFn
        },
    }
}

/// Store functions for every raw [`VertexAttribs`] value.
///
/// Entries with `TEXCOORD_F32` but no `TEXCOORD` behave like the entry
/// without the modifier.
static STORE_FUNCS: [AttribStoreFuncs; VertexAttribs::COUNT] = [
    store_funcs::<0>(),
    store_funcs::<1>(),
    store_funcs::<2>(),
    store_funcs::<3>(),
    store_funcs::<4>(),
    store_funcs::<5>(),
    store_funcs::<6>(),
    store_funcs::<7>(),
    store_funcs::<8>(),
    store_funcs::<9>(),
    store_funcs::<10>(),
    store_funcs::<11>(),
    store_funcs::<12>(),
    store_funcs::<13>(),
    store_funcs::<14>(),
    store_funcs::<15>(),
];

/// Look up the store functions for an attribute set.
#[inline]
pub fn attrib_store_funcs(attribs: VertexAttribs) -> AttribStoreFuncs {
    STORE_FUNCS[attribs.bits() as usize]
}

/// Packed attributes for the next vertex.
///
/// A freshly reset state is all zeroes: black transparent color, a normal
/// that decodes to roughly (-1, -1, -1), and zero texcoords.
#[derive(Clone)]
pub struct VertexAttribState {
    data: [u8; ATTRIB_STATE_CAPACITY],
    size: usize,
    attribs: VertexAttribs,
    funcs: AttribStoreFuncs,
}

impl VertexAttribState {
    /// State with no active attributes.
    pub fn new() -> Self {
        Self::with_attribs(VertexAttribs::empty())
    }

    /// State configured for `attribs`.
    pub fn with_attribs(attribs: VertexAttribs) -> Self {
        let mut state = Self {
            data: [0; ATTRIB_STATE_CAPACITY],
            size: 0,
            attribs: VertexAttribs::empty(),
            funcs: attrib_store_funcs(VertexAttribs::empty()),
        };
        state.reset(attribs);
        state
    }

    /// Clear pending values and reconfigure for `attribs`.
    pub fn reset(&mut self, attribs: VertexAttribs) {
        let attribs = attribs.normalized();
        self.data = [0; ATTRIB_STATE_CAPACITY];
        self.size = attribs.vertex_size();
        self.attribs = attribs;
        self.funcs = attrib_store_funcs(attribs);
    }

    /// Set the pending color (0xRRGGBBAA). No-op without color.
    #[inline]
    pub fn store_color(&mut self, rgba: u32) {
        let store = self.funcs.color;
        store(self, rgba);
    }

    /// Set the pending normal. No-op without normals.
    #[inline]
    pub fn store_normal(&mut self, x: f32, y: f32, z: f32) {
        let store = self.funcs.normal;
        store(self, x, y, z);
    }

    /// Set the pending texcoord. No-op without texcoords.
    #[inline]
    pub fn store_texcoord(&mut self, u: f32, v: f32) {
        let store = self.funcs.texcoord;
        store(self, u, v);
    }

    /// Encoded bytes of the pending vertex.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.size]
    }

    /// Encoded size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Active attributes.
    pub fn attribs(&self) -> VertexAttribs {
        self.attribs
    }

    /// Offsets of the active attributes.
    pub fn offsets(&self) -> AttribOffsets {
        AttribOffsets::of(self.attribs)
    }
}

impl Default for VertexAttribState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VertexAttribState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexAttribState")
            .field("attribs", &self.attribs)
            .field("bytes", &self.bytes())
            .finish()
    }
}
