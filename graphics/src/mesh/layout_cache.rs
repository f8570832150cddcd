//! Registered vertex layouts for every attribute combination.
//!
//! Every layout a mesh can ever be drawn with is created once at startup:
//! the position layout, one native layout per attribute set, and one skip
//! variant per way of hiding a strict subset of a set's attributes. Lookups
//! after that are table reads, so the cache needs no lock.
//!
//! # Keys
//!
//! A layout key is the stored attribute bits in the low four bits and the
//! skipped slots above them. Key 0 is the position layout.

use static_assertions::const_assert_eq;
use tessera_core::mesh::VertexAttribs;
use tessera_core::mesh::flags::{vertex_attribs, with_vertex_attribs};

use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::types::VertexLayoutHandle;

use super::layout::VertexLayout;

/// Shift of the skipped-slot bits inside a layout key.
pub const LAYOUT_SKIP_SHIFT: u32 = 4;

/// Number of layout keys: four attribute bits plus three slot bits.
pub const LAYOUT_KEY_COUNT: usize = 1 << (LAYOUT_SKIP_SHIFT + 3);

const_assert_eq!(VertexAttribs::COUNT, 1 << LAYOUT_SKIP_SHIFT);
const_assert_eq!(VertexAttribs::SLOTS.bits() >> 3, 0);

/// Table index for stored `attribs` with `skips` hidden.
pub fn layout_key(attribs: VertexAttribs, skips: VertexAttribs) -> usize {
    (attribs.bits() | (skips.slots().bits() << LAYOUT_SKIP_SHIFT)) as usize
}

/// A layout together with its device handle.
#[derive(Debug, Clone)]
pub struct CachedLayout {
    pub layout: VertexLayout,
    pub handle: VertexLayoutHandle,
}

/// Device layouts for every attribute set and skip variant.
#[derive(Debug)]
pub struct VertexLayoutCache {
    entries: Vec<Option<CachedLayout>>,
}

impl VertexLayoutCache {
    /// Register every layout with `device`.
    ///
    /// On failure, layouts registered so far are released again.
    pub fn new(device: &dyn GraphicsDevice) -> Result<Self, GraphicsError> {
        let mut cache = Self {
            entries: vec![None; LAYOUT_KEY_COUNT],
        };
        if let Err(err) = cache.register_all(device) {
            cache.destroy(device);
            return Err(err);
        }
        log::debug!("Registered {} vertex layouts", cache.len());
        Ok(cache)
    }

    fn register_all(&mut self, device: &dyn GraphicsDevice) -> Result<(), GraphicsError> {
        self.register(device, 0, VertexLayout::positions())?;

        for raw in 1..VertexAttribs::COUNT as u32 {
            let attribs = VertexAttribs::from_bits_truncate(raw);
            if !attribs.is_normalized() {
                continue;
            }
            self.register_attribs(device, attribs, VertexAttribs::empty())?;

            // Every non-empty strict subset of the stored slots.
            let slots = attribs.slots().bits();
            for skip_bits in 1..slots {
                if skip_bits & !slots == 0 {
                    let skips = VertexAttribs::from_bits_truncate(skip_bits);
                    self.register_attribs(device, attribs, skips)?;
                }
            }
        }
        Ok(())
    }

    fn register_attribs(
        &mut self,
        device: &dyn GraphicsDevice,
        attribs: VertexAttribs,
        skips: VertexAttribs,
    ) -> Result<(), GraphicsError> {
        let layout = VertexLayout::for_attribs(attribs, skips);
        debug_assert_eq!(layout.stride as usize, attribs.vertex_size());
        self.register(device, layout_key(attribs, skips), layout)
    }

    fn register(
        &mut self,
        device: &dyn GraphicsDevice,
        key: usize,
        layout: VertexLayout,
    ) -> Result<(), GraphicsError> {
        debug_assert!(self.entries[key].is_none(), "layout key {key} registered twice");
        layout
            .validate()
            .map_err(|reason| GraphicsError::InvalidParameter(format!("layout {key}: {reason}")))?;
        let handle = device.create_vertex_layout(&layout)?;
        self.entries[key] = Some(CachedLayout { layout, handle });
        Ok(())
    }

    /// Number of registered layouts.
    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Layout for stored `attribs` with `skips` hidden.
    pub fn get(&self, attribs: VertexAttribs, skips: VertexAttribs) -> Option<&CachedLayout> {
        self.entries
            .get(layout_key(attribs.normalized(), skips))
            .and_then(Option::as_ref)
    }

    /// Layout of the position stream.
    pub fn positions(&self) -> Option<&CachedLayout> {
        self.entries[0].as_ref()
    }

    /// Layout of an attribute stream with nothing hidden.
    pub fn native(&self, attribs: VertexAttribs) -> Option<&CachedLayout> {
        if attribs.slots().is_empty() {
            return None;
        }
        self.get(attribs, VertexAttribs::empty())
    }

    /// Layout that binds a mesh's attribute buffer as if it stored only the
    /// attributes of `alias_flags`.
    ///
    /// `flags` are the mesh's flags. They are rewritten to describe what the
    /// returned layout exposes. Returns `None` when no attribute stream is to
    /// be bound, either because the mesh has no attributes or because every
    /// one of them is hidden.
    ///
    /// Aliasing can only hide attributes. Requested attributes the mesh does
    /// not store are ignored with a warning.
    pub fn resolve_alias(&self, flags: &mut u32, alias_flags: u32) -> Option<VertexLayoutHandle> {
        let stored = vertex_attribs(*flags);
        let requested = vertex_attribs(alias_flags);

        let invented = requested.slots() - stored.slots();
        if !invented.is_empty() {
            log::warn!(
                "Alias requests {invented:?} which the mesh does not store, ignoring them"
            );
        }

        let skips = stored.slots() - requested.slots();
        if skips.is_empty() {
            return self.native(stored).map(|entry| entry.handle);
        }

        let exposed = (stored - skips).normalized();
        *flags = with_vertex_attribs(*flags, exposed);
        if exposed.slots().is_empty() {
            return None;
        }
        self.get(stored, skips).map(|entry| entry.handle)
    }

    /// Release every layout from `device`.
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        for entry in self.entries.iter_mut() {
            if let Some(entry) = entry.take() {
                device.destroy_vertex_layout(entry.handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tessera_core::mesh::flags::{
        PRIMITIVE_TRIANGLES, VERTEX_COLOR, VERTEX_NORMAL, VERTEX_TEXCOORD, VERTEX_TEXCOORD_F32,
    };

    use super::*;
    use crate::backend::DummyDevice;
    use crate::mesh::VertexAttributeSemantic;

    fn cache() -> (DummyDevice, VertexLayoutCache) {
        let device = DummyDevice::new();
        let cache = VertexLayoutCache::new(&device).unwrap();
        (device, cache)
    }

    #[test]
    fn test_layout_count() {
        let (device, cache) = cache();
        // 1 position layout, 11 native sets, and per set 2^slots - 2 skip variants:
        // sets with one slot add 0, two slots add 2, three slots add 6.
        // One-slot sets: C, N, T, T32. Two-slot: CN, CT, CT32, NT, NT32. Three: CNT, CNT32.
        let expected = 1 + 11 + 5 * 2 + 2 * 6;
        assert_eq!(cache.len(), expected);
        assert_eq!(device.live_layout_count(), expected);
    }

    #[test]
    fn test_position_layout() {
        let (_, cache) = cache();
        let positions = cache.positions().unwrap();
        assert_eq!(positions.layout.stride, 12);
        assert_eq!(layout_key(VertexAttribs::empty(), VertexAttribs::empty()), 0);
    }

    #[test]
    fn test_native_lookup() {
        let (_, cache) = cache();
        assert!(cache.native(VertexAttribs::empty()).is_none());
        let entry = cache.native(VertexAttribs::COLOR | VertexAttribs::TEXCOORD).unwrap();
        assert_eq!(entry.layout.stride, 8);
    }

    #[test]
    fn test_resolve_without_alias() {
        let (_, cache) = cache();
        let original = PRIMITIVE_TRIANGLES | VERTEX_COLOR | VERTEX_NORMAL;
        let mut flags = original;
        let handle = cache.resolve_alias(&mut flags, VERTEX_COLOR | VERTEX_NORMAL);
        assert_eq!(flags, original);
        assert_eq!(
            handle,
            cache.native(VertexAttribs::COLOR | VertexAttribs::NORMAL).map(|e| e.handle)
        );
    }

    #[test]
    fn test_resolve_hides_normal() {
        let (device, cache) = cache();
        let mut flags = PRIMITIVE_TRIANGLES | VERTEX_COLOR | VERTEX_NORMAL | VERTEX_TEXCOORD;
        let handle = cache
            .resolve_alias(&mut flags, VERTEX_COLOR | VERTEX_TEXCOORD)
            .unwrap();

        assert_eq!(flags, PRIMITIVE_TRIANGLES | VERTEX_COLOR | VERTEX_TEXCOORD);
        let layout = device.layout(handle).unwrap();
        assert_eq!(layout.stride, 12);
        assert_eq!(
            layout.exposed_semantics(),
            vec![VertexAttributeSemantic::Color, VertexAttributeSemantic::TexCoord0]
        );
        assert_eq!(
            layout.get_attribute(VertexAttributeSemantic::TexCoord0).unwrap().offset,
            8
        );
    }

    #[test]
    fn test_resolve_hidden_f32_texcoord() {
        let (_, cache) = cache();
        let mut flags = VERTEX_COLOR | VERTEX_TEXCOORD_F32;
        let handle = cache.resolve_alias(&mut flags, VERTEX_COLOR).unwrap();
        assert_eq!(flags, VERTEX_COLOR);
        let entry = cache
            .get(
                VertexAttribs::COLOR | VertexAttribs::TEXCOORD | VertexAttribs::TEXCOORD_F32,
                VertexAttribs::TEXCOORD,
            )
            .unwrap();
        assert_eq!(entry.handle, handle);
        assert_eq!(entry.layout.stride, 12);
    }

    #[test]
    fn test_resolve_hides_everything() {
        let (_, cache) = cache();
        let mut flags = PRIMITIVE_TRIANGLES | VERTEX_NORMAL;
        assert_eq!(cache.resolve_alias(&mut flags, 0), None);
        assert_eq!(flags, PRIMITIVE_TRIANGLES);
    }

    #[test]
    fn test_resolve_ignores_invented_attributes() {
        let (_, cache) = cache();
        let mut flags = VERTEX_COLOR;
        let handle = cache.resolve_alias(&mut flags, VERTEX_COLOR | VERTEX_NORMAL);
        assert_eq!(flags, VERTEX_COLOR);
        assert_eq!(handle, cache.native(VertexAttribs::COLOR).map(|e| e.handle));
    }

    #[test]
    fn test_misaligned_layout_is_rejected() {
        let device = DummyDevice::new();
        let mut cache = VertexLayoutCache {
            entries: vec![None; LAYOUT_KEY_COUNT],
        };
        let mut layout = VertexLayout::positions();
        layout.stride = 14;

        let result = cache.register(&device, 0, layout);
        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
        assert!(cache.is_empty());
        assert_eq!(device.live_layout_count(), 0);
    }

    #[test]
    fn test_destroy_releases_layouts() {
        let (device, mut cache) = cache();
        cache.destroy(&device);
        assert!(cache.is_empty());
        assert_eq!(device.live_layout_count(), 0);
    }
}
