//! Draw requests and resolved draw calls.
//!
//! `mesh(id)` does not look at the mesh table. It records a [`DrawItem`]
//! holding the ID, the current model matrix and any pending `alias`,
//! `range` or `instances` state. Items are resolved into [`DrawCall`]s when the list is
//! submitted, so a draw always uses whatever the ID holds at that moment.

use tessera_core::math::Mat4;
use tessera_core::mesh::flags::INTERNAL_INSTANCING_SUPPORTED;
use tessera_core::mesh::{IndexFormat, InstanceDataType, PrimitiveTopology};

use crate::types::{
    DynamicIndexBufferHandle, DynamicVertexBufferHandle, IndexBufferHandle, InstanceBuffer,
    TransientVertexBuffer, VertexBufferHandle, VertexLayoutHandle,
};

/// Sub-range of a mesh's elements to draw.
///
/// Elements are indices for persistent meshes and vertices for transient
/// ones. The default covers everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRange {
    pub start: u32,
    pub count: u32,
}

impl Default for ElementRange {
    fn default() -> Self {
        Self {
            start: 0,
            count: u32::MAX,
        }
    }
}

impl ElementRange {
    /// Clamp to a mesh with `element_count` elements.
    pub fn clamp(self, element_count: u32) -> Self {
        let start = self.start.min(element_count);
        Self {
            start,
            count: self.count.min(element_count - start),
        }
    }
}

/// One-shot state consumed by the next `mesh()` call.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DrawState {
    alias: Option<u32>,
    range: Option<ElementRange>,
    instances: Option<u16>,
}

impl DrawState {
    pub fn set_alias(&mut self, flags: u32) {
        self.alias = Some(flags);
    }

    pub fn set_range(&mut self, start: u32, count: u32) {
        self.range = Some(ElementRange { start, count });
    }

    pub fn set_instances(&mut self, id: u16) {
        self.instances = Some(id);
    }

    /// Build the item for the next `mesh()` call, leaving the defaults behind.
    pub fn take_item(&mut self, mesh_id: u16, transform: Mat4) -> DrawItem {
        let state = std::mem::take(self);
        DrawItem {
            mesh_id,
            transform,
            alias: state.alias,
            range: state.range.unwrap_or_default(),
            instances: state.instances,
        }
    }
}

/// A recorded request to draw a mesh ID.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub mesh_id: u16,
    /// Model matrix at the time of the request.
    pub transform: Mat4,
    /// Attribute flags to expose instead of the stored ones.
    pub alias: Option<u32>,
    pub range: ElementRange,
    /// Instance buffer ID to draw the mesh once per record of.
    pub instances: Option<u16>,
}

/// Draw requests of one recording context, in submission order.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    items: Vec<DrawItem>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: DrawItem) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[DrawItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub(crate) fn drain(&mut self) -> std::vec::Drain<'_, DrawItem> {
        self.items.drain(..)
    }
}

/// A vertex stream bound for drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexBufferRef {
    Static(VertexBufferHandle),
    Dynamic(DynamicVertexBufferHandle),
    Transient(TransientVertexBuffer),
}

/// A vertex stream together with the layout it is read through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBinding {
    pub buffer: VertexBufferRef,
    pub layout: VertexLayoutHandle,
}

/// An index buffer bound for drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexBufferRef {
    Static(IndexBufferHandle, IndexFormat),
    Dynamic(DynamicIndexBufferHandle, IndexFormat),
}

impl IndexBufferRef {
    pub fn format(&self) -> IndexFormat {
        match self {
            Self::Static(_, format) | Self::Dynamic(_, format) => *format,
        }
    }
}

/// Per-instance data bound for drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceBinding {
    pub buffer: InstanceBuffer,
    pub data_type: InstanceDataType,
}

/// A fully resolved draw, ready for the device.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub mesh_id: u16,
    pub transform: Mat4,
    /// Mesh flags with the attribute bits describing what `attribs` exposes.
    pub flags: u32,
    pub topology: PrimitiveTopology,
    pub positions: VertexBinding,
    /// `None` when the mesh has no attributes or all of them are aliased away.
    pub attribs: Option<VertexBinding>,
    /// `None` for transient meshes, which draw vertices directly.
    pub indices: Option<IndexBufferRef>,
    /// First element drawn.
    pub first: u32,
    /// Number of elements drawn.
    pub count: u32,
    /// Set for instanced draws. `flags` then carries
    /// `INTERNAL_INSTANCING_SUPPORTED`.
    pub instances: Option<InstanceBinding>,
}

impl DrawCall {
    pub fn is_indexed(&self) -> bool {
        self.indices.is_some()
    }

    pub fn is_instanced(&self) -> bool {
        self.instances.is_some()
    }

    pub(crate) fn bind_instances(&mut self, binding: InstanceBinding) {
        self.instances = Some(binding);
        self.flags |= INTERNAL_INSTANCING_SUPPORTED;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_clamp() {
        assert_eq!(
            ElementRange::default().clamp(6),
            ElementRange { start: 0, count: 6 }
        );
        assert_eq!(
            ElementRange { start: 3, count: 100 }.clamp(6),
            ElementRange { start: 3, count: 3 }
        );
        assert_eq!(
            ElementRange { start: 10, count: 2 }.clamp(6),
            ElementRange { start: 6, count: 0 }
        );
    }

    #[test]
    fn test_draw_state_is_one_shot() {
        let mut state = DrawState::default();
        state.set_alias(7);
        state.set_range(3, 3);
        state.set_instances(2);

        let item = state.take_item(1, Mat4::identity());
        assert_eq!(item.mesh_id, 1);
        assert_eq!(item.alias, Some(7));
        assert_eq!(item.range, ElementRange { start: 3, count: 3 });
        assert_eq!(item.instances, Some(2));

        let item = state.take_item(1, Mat4::identity());
        assert_eq!(item.alias, None);
        assert_eq!(item.range, ElementRange::default());
        assert_eq!(item.instances, None);
    }

    #[test]
    fn test_draw_list() {
        let mut list = DrawList::new();
        list.push(DrawItem {
            mesh_id: 1,
            transform: Mat4::identity(),
            alias: None,
            range: ElementRange::default(),
            instances: None,
        });
        assert_eq!(list.len(), 1);
        assert_eq!(list.drain().count(), 1);
        assert!(list.is_empty());
    }
}
