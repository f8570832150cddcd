//! Device-facing mesh data types.
//!
//! This module provides:
//! - [`PrimitiveTopology`] - How the device assembles submitted vertices
//! - [`IndexFormat`] - Index data format (u16 or u32)
//! - [`CpuGeometry`] - CPU copy of a persistent mesh's final buffers

use super::flags::PrimitiveType;

/// Primitive topology as seen by the device, after quad emulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Each vertex is a separate point.
    PointList,
    /// Every two vertices form a line.
    LineList,
    /// Vertices form a connected strip of lines.
    LineStrip,
    /// Every three vertices form a triangle.
    #[default]
    TriangleList,
    /// Vertices form a connected strip of triangles.
    TriangleStrip,
}

impl PrimitiveTopology {
    /// Number of vertices per primitive, `None` for strips.
    pub fn vertices_per_primitive(&self) -> Option<u32> {
        match self {
            Self::PointList => Some(1),
            Self::LineList => Some(2),
            Self::TriangleList => Some(3),
            Self::LineStrip | Self::TriangleStrip => None,
        }
    }
}

impl From<PrimitiveType> for PrimitiveTopology {
    fn from(primitive: PrimitiveType) -> Self {
        match primitive {
            PrimitiveType::Triangles | PrimitiveType::Quads => Self::TriangleList,
            PrimitiveType::TriangleStrip => Self::TriangleStrip,
            PrimitiveType::Lines => Self::LineList,
            PrimitiveType::LineStrip => Self::LineStrip,
            PrimitiveType::Points => Self::PointList,
        }
    }
}

/// Index format for indexed drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    /// 16-bit unsigned integers (max 65535 vertices).
    #[default]
    Uint16,
    /// 32-bit unsigned integers.
    Uint32,
}

impl IndexFormat {
    /// Get the size in bytes of each index.
    pub fn size(&self) -> usize {
        match self {
            Self::Uint16 => 2,
            Self::Uint32 => 4,
        }
    }

    /// Narrowest format able to address `vertex_count` vertices.
    pub fn for_vertex_count(vertex_count: usize) -> Self {
        if vertex_count <= u16::MAX as usize {
            Self::Uint16
        } else {
            Self::Uint32
        }
    }

    /// Encode 32-bit indices in this format.
    ///
    /// For `Uint16`, every index must fit in 16 bits.
    pub fn encode(&self, indices: &[u32]) -> Vec<u8> {
        match self {
            Self::Uint16 => {
                let narrow: Vec<u16> = indices
                    .iter()
                    .map(|&i| {
                        debug_assert!(i <= u16::MAX as u32);
                        i as u16
                    })
                    .collect();
                bytemuck::cast_slice(&narrow).to_vec()
            }
            Self::Uint32 => bytemuck::cast_slice(indices).to_vec(),
        }
    }

    /// Decode index bytes in this format back to 32-bit indices.
    pub fn decode(&self, bytes: &[u8]) -> Vec<u32> {
        match self {
            Self::Uint16 => bytes
                .chunks_exact(2)
                .map(|b| u32::from(u16::from_ne_bytes([b[0], b[1]])))
                .collect(),
            Self::Uint32 => bytemuck::pod_collect_to_vec(bytes),
        }
    }
}

/// CPU copy of a persistent mesh after deduplication.
#[derive(Clone, Default)]
pub struct CpuGeometry {
    /// Unique vertex positions.
    pub positions: Vec<[f32; 3]>,
    /// Unique vertex attributes, `attrib_size` bytes each.
    pub attribs: Vec<u8>,
    /// Bytes per vertex in `attribs`.
    pub attrib_size: usize,
    /// One index per recorded vertex.
    pub indices: Vec<u32>,
}

impl CpuGeometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Encoded attributes of unique vertex `index`.
    pub fn attrib_bytes(&self, index: usize) -> &[u8] {
        let start = index * self.attrib_size;
        &self.attribs[start..start + self.attrib_size]
    }
}

impl std::fmt::Debug for CpuGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuGeometry")
            .field("vertex_count", &self.vertex_count())
            .field("index_count", &self.index_count())
            .field("attrib_size", &self.attrib_size)
            .finish()
    }
}
