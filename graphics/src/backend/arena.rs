//! Bump arena for per-frame transient vertex memory.
//!
//! Transient vertex data is written to consecutive regions of one large
//! block. Nothing is freed individually: the whole arena is reclaimed at
//! frame end with [`TransientArena::reset`].
//!
//! Allocations are aligned to the vertex stride so that the start of every
//! allocation is a whole vertex index. Strides such as 12 are not powers of
//! two, so alignment here is any non-zero value.

/// A sub-allocation from the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaAllocation {
    /// Byte offset into the arena.
    pub offset: u64,
    /// Size of the allocation in bytes.
    pub size: u64,
}

impl ArenaAllocation {
    /// End offset (offset + size).
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Frame-scoped bump allocator.
///
/// Not thread-safe; the owning device wraps it in a mutex.
#[derive(Debug)]
pub struct TransientArena {
    capacity: u64,
    write_offset: u64,
    frame_count: u64,
}

impl TransientArena {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            write_offset: 0,
            frame_count: 0,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes handed out since the last reset, including alignment padding.
    pub fn used(&self) -> u64 {
        self.write_offset
    }

    /// Number of resets so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// How many `stride`-sized elements still fit.
    pub fn available(&self, stride: u64) -> u64 {
        if stride == 0 {
            return 0;
        }
        let aligned_offset = align_up(self.write_offset, stride);
        self.capacity.saturating_sub(aligned_offset) / stride
    }

    /// Allocate `size` bytes starting at a multiple of `alignment`.
    ///
    /// Returns `None` when the frame's memory is used up.
    pub fn allocate_aligned(&mut self, size: u64, alignment: u64) -> Option<ArenaAllocation> {
        debug_assert!(alignment > 0, "alignment must be non-zero");

        let aligned_offset = align_up(self.write_offset, alignment);
        if aligned_offset + size > self.capacity {
            return None;
        }
        self.write_offset = aligned_offset + size;

        Some(ArenaAllocation {
            offset: aligned_offset,
            size,
        })
    }

    /// Reclaim the whole arena.
    pub fn reset(&mut self) {
        self.write_offset = 0;
        self.frame_count += 1;
    }
}

/// Round `value` up to a multiple of `alignment`.
#[inline]
fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 12), 0);
        assert_eq!(align_up(1, 12), 12);
        assert_eq!(align_up(24, 12), 24);
        assert_eq!(align_up(100, 64), 128);
    }

    #[test]
    fn test_allocation_aligned_to_stride() {
        let mut arena = TransientArena::new(1024);

        let a = arena.allocate_aligned(8, 8).unwrap();
        assert_eq!(a.offset, 0);
        assert_eq!(a.end(), 8);

        // 8 is not a multiple of 12.
        let b = arena.allocate_aligned(36, 12).unwrap();
        assert_eq!(b.offset, 12);
        assert_eq!(arena.used(), 48);
    }

    #[test]
    fn test_exhaustion() {
        let mut arena = TransientArena::new(120);
        assert_eq!(arena.available(12), 10);

        arena.allocate_aligned(96, 12).unwrap();
        assert_eq!(arena.available(12), 2);
        assert!(arena.allocate_aligned(36, 12).is_none());

        // A failed allocation leaves the arena untouched.
        assert_eq!(arena.used(), 96);
        assert!(arena.allocate_aligned(24, 12).is_some());
        assert_eq!(arena.available(12), 0);
    }

    #[test]
    fn test_reset() {
        let mut arena = TransientArena::new(64);
        arena.allocate_aligned(64, 4).unwrap();
        assert_eq!(arena.available(4), 0);

        arena.reset();
        assert_eq!(arena.used(), 0);
        assert_eq!(arena.frame_count(), 1);
        assert_eq!(arena.allocate_aligned(16, 4).unwrap().offset, 0);
    }

    #[test]
    fn test_zero_stride_has_no_room() {
        let arena = TransientArena::new(64);
        assert_eq!(arena.available(0), 0);
    }
}
