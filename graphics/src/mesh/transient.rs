//! Per-frame pool of transient vertex buffers.
//!
//! Transient meshes are copied verbatim into device transient memory. The
//! pool keeps the resulting descriptors in a fixed-capacity table that only
//! grows during a frame and is emptied at frame end.

use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::types::{TransientVertexBuffer, VertexLayoutHandle};

/// Default number of transient buffers per frame.
pub const MAX_TRANSIENT_BUFFERS: usize = 64;

/// One vertex stream to copy into transient memory.
#[derive(Debug, Clone, Copy)]
pub struct TransientRequest<'a> {
    pub data: &'a [u8],
    pub stride: usize,
    pub layout: VertexLayoutHandle,
}

impl TransientRequest<'_> {
    fn vertex_count(&self) -> u32 {
        (self.data.len() / self.stride) as u32
    }
}

/// Bump-allocated table of this frame's transient buffers.
#[derive(Debug)]
pub struct TransientBufferPool {
    buffers: Vec<TransientVertexBuffer>,
    capacity: usize,
    exhausted: bool,
}

impl TransientBufferPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: Vec::with_capacity(capacity),
            capacity,
            exhausted: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Buffers allocated this frame.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Whether an allocation failed this frame.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn get(&self, slot: usize) -> Option<&TransientVertexBuffer> {
        self.buffers.get(slot)
    }

    /// Allocate one transient buffer per request, all or nothing.
    ///
    /// Returns the pool slots in request order. Once any allocation fails,
    /// every later one fails too until [`reset`](Self::reset); the first
    /// failure of a frame is logged as a warning.
    pub fn alloc(
        &mut self,
        device: &dyn GraphicsDevice,
        requests: &[TransientRequest<'_>],
    ) -> Result<Vec<usize>, GraphicsError> {
        if self.exhausted {
            log::debug!("Transient pool exhausted, dropping mesh");
            return Err(GraphicsError::TransientMemoryExhausted);
        }
        if self.buffers.len() + requests.len() > self.capacity {
            return Err(self.exhaust(GraphicsError::TransientTableFull(self.capacity)));
        }
        for request in requests {
            let count = request.vertex_count();
            if device.avail_transient_vertex_buffer(count, request.layout) < count {
                return Err(self.exhaust(GraphicsError::TransientMemoryExhausted));
            }
        }

        let first = self.buffers.len();
        for request in requests {
            match device.alloc_transient_vertex_buffer(request.data, request.layout) {
                Ok(buffer) => self.buffers.push(buffer),
                Err(err) => {
                    // Already-copied data stays in device memory until frame end.
                    self.buffers.truncate(first);
                    return Err(self.exhaust(err));
                }
            }
        }
        Ok((first..self.buffers.len()).collect())
    }

    fn exhaust(&mut self, err: GraphicsError) -> GraphicsError {
        if !self.exhausted {
            log::warn!("Transient buffers exhausted for this frame: {err}");
        }
        self.exhausted = true;
        err
    }

    /// Forget every buffer. Called at frame end.
    pub fn reset(&mut self) {
        self.buffers.clear();
        self.exhausted = false;
    }
}

impl Default for TransientBufferPool {
    fn default() -> Self {
        Self::new(MAX_TRANSIENT_BUFFERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyDevice, DummyDeviceConfig};
    use crate::mesh::VertexLayout;

    fn setup(transient_memory: u64) -> (DummyDevice, VertexLayoutHandle) {
        let config = DummyDeviceConfig::default().with_transient_memory(transient_memory);
        let device = DummyDevice::with_config(config);
        let layout = device.create_vertex_layout(&VertexLayout::positions()).unwrap();
        (device, layout)
    }

    fn request(data: &[u8], layout: VertexLayoutHandle) -> TransientRequest<'_> {
        TransientRequest {
            data,
            stride: 12,
            layout,
        }
    }

    #[test]
    fn test_alloc_returns_sequential_slots() {
        let (device, layout) = setup(1024);
        let mut pool = TransientBufferPool::new(4);
        let data = [0u8; 36];

        let slots = pool
            .alloc(&device, &[request(&data, layout), request(&data, layout)])
            .unwrap();
        assert_eq!(slots, vec![0, 1]);
        assert_eq!(pool.get(1).unwrap().start_vertex, 3);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_table_full() {
        let (device, layout) = setup(1024);
        let mut pool = TransientBufferPool::new(1);
        let data = [0u8; 12];

        pool.alloc(&device, &[request(&data, layout)]).unwrap();
        assert_eq!(
            pool.alloc(&device, &[request(&data, layout)]),
            Err(GraphicsError::TransientTableFull(1))
        );
        assert!(pool.is_exhausted());
    }

    #[test]
    fn test_memory_exhaustion_is_sticky_until_reset() {
        let (device, layout) = setup(48);
        let mut pool = TransientBufferPool::new(8);

        let big = [0u8; 36];
        pool.alloc(&device, &[request(&big, layout)]).unwrap();
        assert_eq!(
            pool.alloc(&device, &[request(&big, layout)]),
            Err(GraphicsError::TransientMemoryExhausted)
        );

        // Would fit, but the pool stays exhausted for the frame.
        let small = [0u8; 12];
        assert!(pool.alloc(&device, &[request(&small, layout)]).is_err());

        pool.reset();
        device.frame();
        assert!(!pool.is_exhausted());
        assert!(pool.is_empty());
        assert_eq!(pool.alloc(&device, &[request(&big, layout)]).unwrap(), vec![0]);
    }

    #[test]
    fn test_all_or_nothing() {
        let (device, layout) = setup(1024);
        let mut pool = TransientBufferPool::new(2);
        let data = [0u8; 12];
        let requests = [request(&data, layout); 3];

        assert!(pool.alloc(&device, &requests).is_err());
        assert!(pool.is_empty());
        assert_eq!(device.transient_used(), 0);
    }
}
