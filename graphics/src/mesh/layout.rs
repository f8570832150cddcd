//! Vertex layout descriptions.
//!
//! A mesh is drawn from two vertex streams: a position stream holding three
//! `f32` per vertex, and an interleaved attribute stream whose structure
//! depends on the mesh's attribute bits. Each stream gets its own
//! [`VertexLayout`].
//!
//! Attributes marked `skip` still occupy bytes in the stride but are not
//! exposed to the shader. This is how one stored attribute buffer can be
//! bound as if it contained fewer attributes.
//!
//! # Example
//!
//! ```ignore
//! // Stored {color, normal, texcoord}, bound as {color, texcoord}.
//! let layout = VertexLayout::new()
//!     .with_attribute(VertexAttributeSemantic::Color, VertexAttributeFormat::Unorm8x4)
//!     .with_skip(VertexAttributeSemantic::Normal, VertexAttributeFormat::Unorm8x4)
//!     .with_attribute(VertexAttributeSemantic::TexCoord0, VertexAttributeFormat::Snorm16x2);
//! assert_eq!(layout.stride, 12);
//! ```

use tessera_core::mesh::VertexAttribs;

/// Semantic meaning of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VertexAttributeSemantic {
    /// Vertex position.
    Position,
    /// Vertex color.
    Color,
    /// Vertex normal.
    Normal,
    /// Texture coordinates set 0.
    TexCoord0,
}

impl VertexAttributeSemantic {
    /// The attribute slot this semantic is stored in, if any.
    pub fn slot(&self) -> Option<VertexAttribs> {
        match self {
            Self::Position => None,
            Self::Color => Some(VertexAttribs::COLOR),
            Self::Normal => Some(VertexAttribs::NORMAL),
            Self::TexCoord0 => Some(VertexAttribs::TEXCOORD),
        }
    }
}

/// Format of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttributeFormat {
    /// Two 32-bit floats.
    Float2,
    /// Three 32-bit floats.
    Float3,
    /// Four 8-bit unsigned integers (normalized to 0.0-1.0).
    Unorm8x4,
    /// Two 16-bit signed integers (normalized to -1.0-1.0).
    Snorm16x2,
}

impl VertexAttributeFormat {
    /// Size in bytes.
    pub fn size(&self) -> u32 {
        match self {
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Unorm8x4 | Self::Snorm16x2 => 4,
        }
    }

    /// Number of components.
    pub fn components(&self) -> u32 {
        match self {
            Self::Float2 | Self::Snorm16x2 => 2,
            Self::Float3 => 3,
            Self::Unorm8x4 => 4,
        }
    }

    /// Whether integer components are normalized when read by the shader.
    pub fn is_normalized(&self) -> bool {
        matches!(self, Self::Unorm8x4 | Self::Snorm16x2)
    }
}

/// A single vertex attribute description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Semantic meaning of this attribute.
    pub semantic: VertexAttributeSemantic,
    /// Data format of this attribute.
    pub format: VertexAttributeFormat,
    /// Byte offset within the vertex.
    pub offset: u32,
    /// Values need a shader-side unpack beyond normalization.
    pub packed: bool,
    /// Bytes are present in the stride but not exposed.
    pub skip: bool,
}

/// Describes one interleaved vertex stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexLayout {
    /// Attributes in offset order, including skipped ones.
    pub attributes: Vec<VertexAttribute>,
    /// Bytes between consecutive vertices.
    pub stride: u32,
    /// Optional label for debugging.
    pub label: Option<String>,
}

impl VertexLayout {
    /// Create an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(
        mut self,
        semantic: VertexAttributeSemantic,
        format: VertexAttributeFormat,
        packed: bool,
        skip: bool,
    ) -> Self {
        self.attributes.push(VertexAttribute {
            semantic,
            format,
            offset: self.stride,
            packed,
            skip,
        });
        self.stride += format.size();
        self
    }

    /// Append an exposed attribute at the end of the stride.
    pub fn with_attribute(
        self,
        semantic: VertexAttributeSemantic,
        format: VertexAttributeFormat,
    ) -> Self {
        self.push(semantic, format, false, false)
    }

    /// Append an exposed attribute that the shader must unpack.
    pub fn with_packed_attribute(
        self,
        semantic: VertexAttributeSemantic,
        format: VertexAttributeFormat,
    ) -> Self {
        self.push(semantic, format, true, false)
    }

    /// Append bytes occupied by an attribute that is not exposed.
    pub fn with_skip(
        self,
        semantic: VertexAttributeSemantic,
        format: VertexAttributeFormat,
    ) -> Self {
        self.push(semantic, format, false, true)
    }

    /// Set a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Attributes visible to the shader.
    pub fn exposed(&self) -> impl Iterator<Item = &VertexAttribute> {
        self.attributes.iter().filter(|attr| !attr.skip)
    }

    /// Check if this layout exposes a specific semantic.
    pub fn has_semantic(&self, semantic: VertexAttributeSemantic) -> bool {
        self.exposed().any(|attr| attr.semantic == semantic)
    }

    /// Get an exposed attribute by semantic.
    pub fn get_attribute(&self, semantic: VertexAttributeSemantic) -> Option<&VertexAttribute> {
        self.exposed().find(|attr| attr.semantic == semantic)
    }

    /// Exposed semantics in offset order.
    pub fn exposed_semantics(&self) -> Vec<VertexAttributeSemantic> {
        self.exposed().map(|attr| attr.semantic).collect()
    }

    /// Whether both layouts expose the same semantics with the same formats.
    pub fn exposes_same_as(&self, other: &VertexLayout) -> bool {
        let ours: Vec<_> = self.exposed().map(|a| (a.semantic, a.format)).collect();
        let theirs: Vec<_> = other.exposed().map(|a| (a.semantic, a.format)).collect();
        ours == theirs
    }

    /// Check stride alignment and that attributes tile the stride.
    pub fn validate(&self) -> Result<(), String> {
        if self.stride == 0 {
            return Err("vertex layout has zero stride".to_string());
        }
        if self.stride % 4 != 0 {
            return Err(format!("stride {} is not a multiple of 4", self.stride));
        }
        let mut expected = 0;
        for attr in &self.attributes {
            if attr.offset != expected {
                return Err(format!(
                    "attribute {:?} at offset {} but {} expected",
                    attr.semantic, attr.offset, expected
                ));
            }
            expected += attr.format.size();
        }
        if expected != self.stride {
            return Err(format!(
                "attributes cover {} bytes of a {} byte stride",
                expected, self.stride
            ));
        }
        for (i, attr) in self.attributes.iter().enumerate() {
            if self.attributes[..i].iter().any(|a| a.semantic == attr.semantic) {
                return Err(format!("duplicate semantic {:?}", attr.semantic));
            }
        }
        Ok(())
    }
}

impl VertexLayout {
    /// Position stream layout: three `f32`, 12 bytes.
    pub fn positions() -> Self {
        Self::new()
            .with_attribute(VertexAttributeSemantic::Position, VertexAttributeFormat::Float3)
            .with_label("positions")
    }

    /// Attribute stream layout for stored `attribs` with `skips` hidden.
    ///
    /// Stored order is color, normal, texcoord. Only the slot bits of
    /// `skips` are looked at. The texcoord width always follows the stored
    /// format, whether or not it is skipped.
    pub fn for_attribs(attribs: VertexAttribs, skips: VertexAttribs) -> Self {
        let attribs = attribs.normalized();
        let skips = skips.slots();
        let texcoord_format = if attribs.contains(VertexAttribs::TEXCOORD_F32) {
            VertexAttributeFormat::Float2
        } else {
            VertexAttributeFormat::Snorm16x2
        };
        use VertexAttributeFormat::Unorm8x4;
        use VertexAttributeSemantic::{Color, Normal, TexCoord0};
        let slots = [
            (VertexAttribs::COLOR, Color, Unorm8x4, false),
            (VertexAttribs::NORMAL, Normal, Unorm8x4, true),
            (VertexAttribs::TEXCOORD, TexCoord0, texcoord_format, false),
        ];

        let mut layout = Self::new().with_label(format!("attribs {attribs:?} skip {skips:?}"));
        for (slot, semantic, format, packed) in slots {
            if !attribs.contains(slot) {
                continue;
            }
            layout = if skips.contains(slot) {
                layout.with_skip(semantic, format)
            } else if packed {
                layout.with_packed_attribute(semantic, format)
            } else {
                layout.with_attribute(semantic, format)
            };
        }
        layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(VertexAttributeFormat::Float2.size(), 8);
        assert_eq!(VertexAttributeFormat::Float3.size(), 12);
        assert_eq!(VertexAttributeFormat::Unorm8x4.size(), 4);
        assert_eq!(VertexAttributeFormat::Snorm16x2.size(), 4);
        assert!(VertexAttributeFormat::Snorm16x2.is_normalized());
        assert!(!VertexAttributeFormat::Float2.is_normalized());
    }

    #[test]
    fn test_positions_layout() {
        let layout = VertexLayout::positions();
        assert_eq!(layout.stride, 12);
        assert!(layout.has_semantic(VertexAttributeSemantic::Position));
        assert!(layout.validate().is_ok());
    }

    #[test]
    fn test_full_attribs_layout() {
        let layout = VertexLayout::for_attribs(VertexAttribs::all(), VertexAttribs::empty());
        assert_eq!(layout.stride, 16);
        let texcoord = layout.get_attribute(VertexAttributeSemantic::TexCoord0).unwrap();
        assert_eq!(texcoord.offset, 8);
        assert_eq!(texcoord.format, VertexAttributeFormat::Float2);
        assert!(layout.get_attribute(VertexAttributeSemantic::Normal).unwrap().packed);
        assert!(layout.validate().is_ok());
    }

    #[test]
    fn test_skip_keeps_offsets() {
        let stored = VertexAttribs::COLOR | VertexAttribs::NORMAL | VertexAttribs::TEXCOORD;
        let native = VertexLayout::for_attribs(stored, VertexAttribs::empty());
        let aliased = VertexLayout::for_attribs(stored, VertexAttribs::NORMAL);

        assert_eq!(aliased.stride, native.stride);
        assert!(!aliased.has_semantic(VertexAttributeSemantic::Normal));
        assert_eq!(
            aliased.get_attribute(VertexAttributeSemantic::TexCoord0).unwrap().offset,
            native.get_attribute(VertexAttributeSemantic::TexCoord0).unwrap().offset,
        );

        let direct = VertexLayout::for_attribs(
            VertexAttribs::COLOR | VertexAttribs::TEXCOORD,
            VertexAttribs::empty(),
        );
        assert!(aliased.exposes_same_as(&direct));
        assert_ne!(aliased.stride, direct.stride);
    }

    #[test]
    fn test_skipped_texcoord_width() {
        let stored = VertexAttribs::COLOR | VertexAttribs::TEXCOORD | VertexAttribs::TEXCOORD_F32;
        let layout = VertexLayout::for_attribs(stored, VertexAttribs::TEXCOORD);
        assert_eq!(layout.stride, 12);
        assert_eq!(layout.exposed_semantics(), vec![VertexAttributeSemantic::Color]);
    }

    #[test]
    fn test_validation() {
        let layout = VertexLayout::new()
            .with_attribute(VertexAttributeSemantic::Color, VertexAttributeFormat::Unorm8x4)
            .with_attribute(VertexAttributeSemantic::Color, VertexAttributeFormat::Unorm8x4);
        assert!(layout.validate().is_err());

        assert!(VertexLayout::new().validate().is_err());

        let mut odd = VertexLayout::positions();
        odd.stride = 14;
        assert!(odd.validate().is_err());
    }
}
