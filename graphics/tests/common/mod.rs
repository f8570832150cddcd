//! Common utilities for mesh pipeline integration tests.
//!
//! Every test runs against the in-memory device, which records submitted
//! draws and exposes buffer contents for inspection.

use std::sync::Arc;

use tessera_graphics::{DummyDevice, DummyDeviceConfig, RecordingContext, RuntimeConfig, SharedRuntime};

/// Unit quad corners in recording order.
#[allow(dead_code)]
pub const QUAD_CORNERS: [[f32; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [1.0, 1.0, 0.0],
    [0.0, 1.0, 0.0],
];

/// Initialize logging for test output. Honors `RUST_LOG`.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Runtime plus a handle on its device.
pub struct TestContext {
    pub device: Arc<DummyDevice>,
    pub runtime: Arc<SharedRuntime>,
}

impl TestContext {
    /// Default device and a runtime with 64 mesh IDs.
    pub fn new() -> Self {
        Self::with_config(DummyDeviceConfig::default(), RuntimeConfig::default().with_max_meshes(64))
    }

    pub fn with_config(device_config: DummyDeviceConfig, config: RuntimeConfig) -> Self {
        init_logging();
        let device = Arc::new(DummyDevice::with_config(device_config));
        let runtime = SharedRuntime::new(device.clone(), config.with_initial_vertex_capacity(256))
            .expect("Failed to create runtime");
        Self { device, runtime }
    }

    pub fn context(&self) -> RecordingContext {
        self.runtime.context()
    }
}

/// Record a unit quad into mesh `id`, setting `rgba` before every vertex.
#[allow(dead_code)]
pub fn record_quad(
    ctx: &mut RecordingContext,
    id: u16,
    flags: u32,
    rgba: u32,
) -> Result<(), tessera_graphics::GraphicsError> {
    ctx.begin_mesh(id, flags)?;
    for [x, y, z] in QUAD_CORNERS {
        ctx.color(rgba);
        ctx.normal(0.0, 0.0, 1.0);
        ctx.texcoord(x, y);
        ctx.vertex(x, y, z);
    }
    ctx.end_mesh()
}
