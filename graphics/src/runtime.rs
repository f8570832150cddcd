//! Shared runtime and per-thread recording contexts.
//!
//! A [`SharedRuntime`] owns everything threads share: the device, the
//! vertex layout cache, the mesh table and the instance buffer table. Each
//! thread records through its own [`RecordingContext`], which holds the
//! recorders, matrix stacks and pending draws for that thread.
//!
//! # Example
//!
//! ```ignore
//! let runtime = SharedRuntime::new(Arc::new(DummyDevice::new()), RuntimeConfig::default())?;
//! let mut ctx = runtime.context();
//!
//! ctx.begin_mesh(1, PRIMITIVE_QUADS | VERTEX_COLOR)?;
//! ctx.color(0xff0000ff);
//! ctx.vertex(0.0, 0.0, 0.0);
//! // ...
//! ctx.end_mesh()?;
//!
//! ctx.mesh(1);
//! ctx.submit();
//! runtime.end_frame();
//! ```
//!
//! # Instancing
//!
//! ```ignore
//! ctx.begin_instancing(0, InstanceDataType::Transform)?;
//! for x in 0..10 {
//!     ctx.push();
//!     ctx.translate(x as f32, 0.0, 0.0);
//!     ctx.instance_transform();
//!     ctx.pop();
//! }
//! ctx.end_instancing()?;
//!
//! ctx.instances(0);
//! ctx.mesh(1);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tessera_core::math::{
    Mat4, MatrixStack, Vec3, look_at_rh, orthographic_rh, perspective_rh, rotation_degrees,
    transform_point,
};
use tessera_core::mesh::flags::{NO_VERTEX_TRANSFORM, validate_flags};
use tessera_core::mesh::{DEFAULT_VERTEX_CAPACITY, InstanceDataType, InstanceRecorder, MeshRecorder};

use crate::device::GraphicsDevice;
use crate::draw::{DrawList, DrawState};
use crate::error::GraphicsError;
use crate::mesh::{
    InstanceCache, MAX_INSTANCE_BUFFERS, MAX_MESHES, MAX_TRANSIENT_BUFFERS, MeshCache,
    VertexLayoutCache,
};

/// Default depth of each matrix stack.
pub const DEFAULT_MATRIX_STACK_DEPTH: usize = 16;

/// Sizing of a [`SharedRuntime`] and its contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Size of the mesh ID table. IDs run from 1 to `max_meshes - 1`.
    pub max_meshes: usize,
    /// Transient buffers available per frame.
    pub max_transient_buffers: usize,
    /// Size of the instance buffer ID table. IDs run from 0.
    pub max_instance_buffers: usize,
    /// Pushes allowed on each matrix stack.
    pub matrix_stack_depth: usize,
    /// Vertices each recording reserves up front.
    pub initial_vertex_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_meshes: MAX_MESHES,
            max_transient_buffers: MAX_TRANSIENT_BUFFERS,
            max_instance_buffers: MAX_INSTANCE_BUFFERS,
            matrix_stack_depth: DEFAULT_MATRIX_STACK_DEPTH,
            initial_vertex_capacity: DEFAULT_VERTEX_CAPACITY,
        }
    }
}

impl RuntimeConfig {
    pub fn with_max_meshes(mut self, max_meshes: usize) -> Self {
        self.max_meshes = max_meshes;
        self
    }

    pub fn with_max_transient_buffers(mut self, count: usize) -> Self {
        self.max_transient_buffers = count;
        self
    }

    pub fn with_max_instance_buffers(mut self, count: usize) -> Self {
        self.max_instance_buffers = count;
        self
    }

    pub fn with_matrix_stack_depth(mut self, depth: usize) -> Self {
        self.matrix_stack_depth = depth;
        self
    }

    pub fn with_initial_vertex_capacity(mut self, vertices: usize) -> Self {
        self.initial_vertex_capacity = vertices;
        self
    }

    fn validate(&self) -> Result<(), GraphicsError> {
        if self.max_meshes < 2 || self.max_meshes > usize::from(u16::MAX) + 1 {
            return Err(GraphicsError::InvalidParameter(format!(
                "max_meshes must be in 2..=65536, got {}",
                self.max_meshes
            )));
        }
        if self.max_transient_buffers < 2 {
            return Err(GraphicsError::InvalidParameter(format!(
                "max_transient_buffers must be at least 2, got {}",
                self.max_transient_buffers
            )));
        }
        if self.max_instance_buffers == 0 || self.max_instance_buffers > usize::from(u16::MAX) + 1 {
            return Err(GraphicsError::InvalidParameter(format!(
                "max_instance_buffers must be in 1..=65536, got {}",
                self.max_instance_buffers
            )));
        }
        Ok(())
    }
}

/// State shared by every recording thread.
pub struct SharedRuntime {
    device: Arc<dyn GraphicsDevice>,
    layouts: VertexLayoutCache,
    meshes: MeshCache,
    instances: InstanceCache,
    config: RuntimeConfig,
    frame: AtomicU64,
}

impl SharedRuntime {
    /// Register vertex layouts with `device` and create an empty mesh table.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        config: RuntimeConfig,
    ) -> Result<Arc<Self>, GraphicsError> {
        config.validate()?;
        let layouts = VertexLayoutCache::new(device.as_ref())?;
        log::info!(
            "Mesh runtime on {}: {} mesh ids, {} transient buffers per frame, {} layouts",
            device.name(),
            config.max_meshes,
            config.max_transient_buffers,
            layouts.len()
        );
        Ok(Arc::new(Self {
            device,
            layouts,
            meshes: MeshCache::new(config.max_meshes, config.max_transient_buffers),
            instances: InstanceCache::new(config.max_instance_buffers),
            config,
            frame: AtomicU64::new(0),
        }))
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn layouts(&self) -> &VertexLayoutCache {
        &self.layouts
    }

    pub fn meshes(&self) -> &MeshCache {
        &self.meshes
    }

    pub fn instances(&self) -> &InstanceCache {
        &self.instances
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Frames ended so far.
    pub fn frame(&self) -> u64 {
        self.frame.load(Ordering::Acquire)
    }

    /// A new recording context for the calling thread.
    pub fn context(self: &Arc<Self>) -> RecordingContext {
        RecordingContext::new(Arc::clone(self))
    }

    /// Resolve and submit every item of `list`, emptying it.
    ///
    /// Items naming an empty mesh ID, or an empty instance buffer ID, are
    /// skipped. Returns the number of draws the device accepted.
    pub fn submit(&self, list: &mut DrawList) -> usize {
        let mut submitted = 0;
        for item in list.drain() {
            let Some(mut call) = self.meshes.resolve(&item, &self.layouts) else {
                continue;
            };
            if let Some(id) = item.instances {
                let Some(binding) = self.instances.get(id) else {
                    log::warn!("Instance buffer {id} is empty, draw of mesh {} skipped", item.mesh_id);
                    continue;
                };
                call.bind_instances(binding);
            }
            match self.device.submit(&call) {
                Ok(()) => submitted += 1,
                Err(err) => log::warn!("Draw of mesh {} rejected: {err}", item.mesh_id),
            }
        }
        submitted
    }

    /// End the frame: forget transient meshes and instance buffers, and
    /// recycle their memory.
    ///
    /// Call once every thread has submitted its draws for the frame.
    pub fn end_frame(&self) {
        self.meshes.clear_transient_meshes();
        self.instances.clear();
        self.device.frame();
        let frame = self.frame.fetch_add(1, Ordering::AcqRel) + 1;
        log::debug!("Frame {frame} ended");
    }
}

impl Drop for SharedRuntime {
    fn drop(&mut self) {
        self.meshes.clear(self.device.as_ref());
        self.layouts.destroy(self.device.as_ref());
        log::debug!("Mesh runtime released its device resources");
    }
}

impl std::fmt::Debug for SharedRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRuntime")
            .field("device", &self.device.name())
            .field("config", &self.config)
            .field("frame", &self.frame())
            .field("meshes", &self.meshes.stats())
            .finish()
    }
}

/// Which matrix stack the transform operations act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatrixMode {
    #[default]
    Model,
    View,
    Projection,
}

#[derive(Debug, Clone, Copy)]
struct ActiveRecording {
    id: u16,
    extra_data: u32,
    transform: bool,
}

#[derive(Debug, Clone, Copy)]
struct ActiveInstancing {
    id: u16,
}

/// Per-thread recording and drawing state.
///
/// Contexts are cheap to create and can be moved to another thread, but a
/// single context is never used from two threads at once.
pub struct RecordingContext {
    runtime: Arc<SharedRuntime>,
    recorder: MeshRecorder,
    recording: Option<ActiveRecording>,
    instance_recorder: InstanceRecorder,
    instancing: Option<ActiveInstancing>,
    model: MatrixStack,
    view: MatrixStack,
    projection: MatrixStack,
    mode: MatrixMode,
    draw_state: DrawState,
    draw_list: DrawList,
}

impl RecordingContext {
    pub fn new(runtime: Arc<SharedRuntime>) -> Self {
        let config = runtime.config;
        Self {
            recorder: MeshRecorder::with_capacity(config.initial_vertex_capacity),
            recording: None,
            instance_recorder: InstanceRecorder::new(),
            instancing: None,
            model: MatrixStack::new(config.matrix_stack_depth),
            view: MatrixStack::new(config.matrix_stack_depth),
            projection: MatrixStack::new(config.matrix_stack_depth),
            mode: MatrixMode::Model,
            draw_state: DrawState::default(),
            draw_list: DrawList::new(),
            runtime,
        }
    }

    pub fn runtime(&self) -> &Arc<SharedRuntime> {
        &self.runtime
    }

    // ------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------

    /// Start recording mesh `id`.
    pub fn begin_mesh(&mut self, id: u16, flags: u32) -> Result<(), GraphicsError> {
        self.begin_mesh_with_data(id, flags, 0)
    }

    /// Start recording mesh `id`, attaching `extra_data` to it.
    pub fn begin_mesh_with_data(
        &mut self,
        id: u16,
        flags: u32,
        extra_data: u32,
    ) -> Result<(), GraphicsError> {
        if let Some(active) = self.recording {
            return Err(GraphicsError::RecordingInProgress(active.id));
        }
        if !self.runtime.meshes.is_valid_id(id) {
            return Err(GraphicsError::InvalidParameter(format!(
                "mesh id {id} outside 1..{}",
                self.runtime.config.max_meshes
            )));
        }
        validate_flags(flags)
            .map_err(|problem| GraphicsError::InvalidParameter(problem.to_string()))?;

        self.recorder.start(flags);
        self.recording = Some(ActiveRecording {
            id,
            extra_data,
            transform: flags & NO_VERTEX_TRANSFORM == 0,
        });
        Ok(())
    }

    /// Append a vertex with the current attributes.
    ///
    /// The position is transformed by the model matrix unless the mesh was
    /// begun with `NO_VERTEX_TRANSFORM`.
    #[inline]
    pub fn vertex(&mut self, x: f32, y: f32, z: f32) {
        debug_assert!(self.recording.is_some(), "vertex() outside begin_mesh/end_mesh");
        if self.recording.is_some_and(|active| active.transform) {
            let [x, y, z] = transform_point(self.model.top(), x, y, z);
            self.recorder.vertex(x, y, z);
        } else {
            self.recorder.vertex(x, y, z);
        }
    }

    /// Set the color of following vertices, `0xRRGGBBAA`.
    #[inline]
    pub fn color(&mut self, rgba: u32) {
        self.recorder.color(rgba);
    }

    #[inline]
    pub fn normal(&mut self, x: f32, y: f32, z: f32) {
        self.recorder.normal(x, y, z);
    }

    #[inline]
    pub fn texcoord(&mut self, u: f32, v: f32) {
        self.recorder.texcoord(u, v);
    }

    /// Finish the active recording and store the mesh.
    ///
    /// A mesh that fails to build leaves its ID empty; the error is returned
    /// and recording can continue with the next mesh.
    pub fn end_mesh(&mut self) -> Result<(), GraphicsError> {
        let active = self.recording.take().ok_or(GraphicsError::NotRecording)?;
        let geometry = self.recorder.end();
        let result = self.runtime.meshes.add_mesh(
            self.runtime.device.as_ref(),
            &self.runtime.layouts,
            active.id,
            active.extra_data,
            &geometry,
        );
        self.recorder.clear();
        result
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    // ------------------------------------------------------------------
    // Instancing
    // ------------------------------------------------------------------

    /// Start recording instance buffer `id` with records of `data_type`.
    ///
    /// Instance recording is independent of mesh recording; both may be
    /// active at once.
    pub fn begin_instancing(
        &mut self,
        id: u16,
        data_type: InstanceDataType,
    ) -> Result<(), GraphicsError> {
        if let Some(active) = self.instancing {
            return Err(GraphicsError::InstancingInProgress(active.id));
        }
        if !self.runtime.instances.is_valid_id(id) {
            return Err(GraphicsError::InvalidParameter(format!(
                "instance buffer id {id} outside 0..{}",
                self.runtime.config.max_instance_buffers
            )));
        }
        self.instance_recorder.start(data_type);
        self.instancing = Some(ActiveInstancing { id });
        Ok(())
    }

    /// Append one instance record of exactly the active type's stride.
    #[inline]
    pub fn instance(&mut self, data: &[u8]) {
        debug_assert!(self.instancing.is_some(), "instance() outside begin_instancing/end_instancing");
        self.instance_recorder.instance(data);
    }

    /// Append the current model matrix as a transform record.
    pub fn instance_transform(&mut self) {
        if self
            .instance_recorder
            .data_type()
            .is_some_and(|data_type| !data_type.is_transform())
        {
            log::warn!("instance_transform() while recording non-transform instances, ignored");
            return;
        }
        self.instance_recorder.transform(self.model.top());
    }

    /// Finish the active instance recording and store it for this frame.
    pub fn end_instancing(&mut self) -> Result<(), GraphicsError> {
        let active = self.instancing.take().ok_or(GraphicsError::NotInstancing)?;
        let result = self.runtime.instances.add_instances(
            self.runtime.device.as_ref(),
            active.id,
            &self.instance_recorder,
        );
        self.instance_recorder.clear();
        result
    }

    pub fn is_instancing(&self) -> bool {
        self.instancing.is_some()
    }

    // ------------------------------------------------------------------
    // Drawing
    // ------------------------------------------------------------------

    /// Queue a draw of mesh `id` with the current model matrix.
    ///
    /// Consumes any pending [`alias`](Self::alias), [`range`](Self::range)
    /// and [`instances`](Self::instances).
    pub fn mesh(&mut self, id: u16) {
        let item = self.draw_state.take_item(id, *self.model.top());
        self.draw_list.push(item);
    }

    /// Draw the next mesh as if it stored only the attributes in `flags`.
    pub fn alias(&mut self, flags: u32) {
        self.draw_state.set_alias(flags);
    }

    /// Draw only `count` elements from `start` of the next mesh.
    pub fn range(&mut self, start: u32, count: u32) {
        self.draw_state.set_range(start, count);
    }

    /// Draw the next mesh once per record of instance buffer `id`.
    pub fn instances(&mut self, id: u16) {
        self.draw_state.set_instances(id);
    }

    pub fn draw_list(&self) -> &DrawList {
        &self.draw_list
    }

    /// Submit queued draws to the device. Returns the number submitted.
    pub fn submit(&mut self) -> usize {
        self.runtime.submit(&mut self.draw_list)
    }

    // ------------------------------------------------------------------
    // Matrices
    // ------------------------------------------------------------------

    /// Make the model stack active.
    pub fn model(&mut self) {
        self.mode = MatrixMode::Model;
    }

    /// Make the view stack active.
    pub fn view(&mut self) {
        self.mode = MatrixMode::View;
    }

    /// Make the projection stack active.
    pub fn projection(&mut self) {
        self.mode = MatrixMode::Projection;
    }

    pub fn matrix_mode(&self) -> MatrixMode {
        self.mode
    }

    fn active_stack(&mut self) -> &mut MatrixStack {
        match self.mode {
            MatrixMode::Model => &mut self.model,
            MatrixMode::View => &mut self.view,
            MatrixMode::Projection => &mut self.projection,
        }
    }

    pub fn model_matrix(&self) -> &Mat4 {
        self.model.top()
    }

    pub fn view_matrix(&self) -> &Mat4 {
        self.view.top()
    }

    pub fn projection_matrix(&self) -> &Mat4 {
        self.projection.top()
    }

    /// Save the active matrix. Logs a warning if the stack is full.
    pub fn push(&mut self) {
        let mode = self.mode;
        if !self.active_stack().push() {
            log::warn!("{mode:?} matrix stack overflow, push ignored");
        }
    }

    /// Restore the active matrix. Logs a warning if nothing was saved.
    pub fn pop(&mut self) {
        let mode = self.mode;
        if !self.active_stack().pop() {
            log::warn!("{mode:?} matrix stack underflow, pop ignored");
        }
    }

    pub fn identity(&mut self) {
        self.active_stack().identity();
    }

    /// Replace the active matrix.
    pub fn set_matrix(&mut self, m: Mat4) {
        self.active_stack().set_top(m);
    }

    /// Apply `m` to the active matrix.
    pub fn multiply(&mut self, m: &Mat4) {
        self.active_stack().multiply_top(m);
    }

    pub fn translate(&mut self, x: f32, y: f32, z: f32) {
        self.multiply(&Mat4::new_translation(&Vec3::new(x, y, z)));
    }

    /// Rotate by `degrees` around the axis `(x, y, z)`.
    pub fn rotate(&mut self, degrees: f32, x: f32, y: f32, z: f32) {
        self.multiply(&rotation_degrees(degrees, Vec3::new(x, y, z)));
    }

    pub fn rotate_x(&mut self, degrees: f32) {
        self.rotate(degrees, 1.0, 0.0, 0.0);
    }

    pub fn rotate_y(&mut self, degrees: f32) {
        self.rotate(degrees, 0.0, 1.0, 0.0);
    }

    pub fn rotate_z(&mut self, degrees: f32) {
        self.rotate(degrees, 0.0, 0.0, 1.0);
    }

    pub fn scale(&mut self, x: f32, y: f32, z: f32) {
        self.multiply(&Mat4::new_nonuniform_scaling(&Vec3::new(x, y, z)));
    }

    /// Orthographic projection applied to the active matrix.
    pub fn ortho(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.multiply(&orthographic_rh(left, right, bottom, top, near, far));
    }

    /// Perspective projection applied to the active matrix. `fovy` is in
    /// degrees.
    pub fn perspective(&mut self, fovy: f32, aspect: f32, near: f32, far: f32) {
        self.multiply(&perspective_rh(fovy.to_radians(), aspect, near, far));
    }

    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        self.multiply(&look_at_rh(&eye, &target, &up));
    }
}

impl Drop for RecordingContext {
    fn drop(&mut self) {
        if let Some(active) = self.recording {
            log::warn!("Recording context dropped while mesh {} was being recorded", active.id);
        }
        if let Some(active) = self.instancing {
            log::warn!(
                "Recording context dropped while instance buffer {} was being recorded",
                active.id
            );
        }
        if !self.draw_list.is_empty() {
            log::debug!("Dropping {} unsubmitted draws", self.draw_list.len());
        }
    }
}

impl std::fmt::Debug for RecordingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingContext")
            .field("recording", &self.recording.map(|active| active.id))
            .field("instancing", &self.instancing.map(|active| active.id))
            .field("mode", &self.mode)
            .field("pending_draws", &self.draw_list.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(SharedRuntime: Send, Sync);
static_assertions::assert_impl_all!(RecordingContext: Send);

#[cfg(test)]
mod tests {
    use tessera_core::mesh::flags::{
        KEEP_CPU_GEOMETRY, PRIMITIVE_QUADS, PRIMITIVE_TRIANGLES, TEXCOORD_F32,
    };

    use super::*;
    use crate::backend::DummyDevice;

    fn runtime() -> Arc<SharedRuntime> {
        let config = RuntimeConfig::default()
            .with_max_meshes(32)
            .with_initial_vertex_capacity(64);
        SharedRuntime::new(Arc::new(DummyDevice::new()), config).unwrap()
    }

    #[test]
    fn test_config_validation() {
        let device: Arc<dyn GraphicsDevice> = Arc::new(DummyDevice::new());
        let bad = RuntimeConfig::default().with_max_meshes(1);
        assert!(SharedRuntime::new(Arc::clone(&device), bad).is_err());
        let bad = RuntimeConfig::default().with_max_meshes(70_000);
        assert!(SharedRuntime::new(Arc::clone(&device), bad).is_err());
        let bad = RuntimeConfig::default().with_max_instance_buffers(0);
        assert!(SharedRuntime::new(device, bad).is_err());
    }

    #[test]
    fn test_begin_mesh_errors() {
        let runtime = runtime();
        let mut ctx = runtime.context();

        assert!(matches!(
            ctx.begin_mesh(0, PRIMITIVE_TRIANGLES),
            Err(GraphicsError::InvalidParameter(_))
        ));
        assert!(matches!(
            ctx.begin_mesh(32, PRIMITIVE_TRIANGLES),
            Err(GraphicsError::InvalidParameter(_))
        ));
        assert!(matches!(
            ctx.begin_mesh(1, TEXCOORD_F32),
            Err(GraphicsError::InvalidParameter(_))
        ));
        assert_eq!(ctx.end_mesh(), Err(GraphicsError::NotRecording));

        ctx.begin_mesh(1, PRIMITIVE_TRIANGLES).unwrap();
        assert_eq!(
            ctx.begin_mesh(2, PRIMITIVE_TRIANGLES),
            Err(GraphicsError::RecordingInProgress(1))
        );
        assert!(ctx.is_recording());
        ctx.end_mesh().unwrap();
        assert!(!ctx.is_recording());
    }

    #[test]
    fn test_vertices_use_model_matrix() {
        let runtime = runtime();
        let mut ctx = runtime.context();

        ctx.translate(10.0, 0.0, 0.0);
        ctx.begin_mesh(1, PRIMITIVE_TRIANGLES | KEEP_CPU_GEOMETRY).unwrap();
        ctx.vertex(1.0, 2.0, 3.0);
        ctx.vertex(0.0, 0.0, 0.0);
        ctx.vertex(0.0, 1.0, 0.0);
        ctx.end_mesh().unwrap();

        let cpu = runtime.meshes().cpu_geometry(1).unwrap();
        assert_eq!(cpu.positions[0], [11.0, 2.0, 3.0]);
    }

    #[test]
    fn test_no_vertex_transform() {
        let runtime = runtime();
        let mut ctx = runtime.context();

        ctx.translate(10.0, 0.0, 0.0);
        let flags = PRIMITIVE_TRIANGLES | NO_VERTEX_TRANSFORM | KEEP_CPU_GEOMETRY;
        ctx.begin_mesh(1, flags).unwrap();
        ctx.vertex(1.0, 2.0, 3.0);
        ctx.vertex(0.0, 0.0, 0.0);
        ctx.vertex(0.0, 1.0, 0.0);
        ctx.end_mesh().unwrap();

        let cpu = runtime.meshes().cpu_geometry(1).unwrap();
        assert_eq!(cpu.positions[0], [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_matrix_stack_selection() {
        let runtime = runtime();
        let mut ctx = runtime.context();

        ctx.projection();
        ctx.ortho(0.0, 2.0, 0.0, 2.0, 0.0, 1.0);
        assert_eq!(ctx.matrix_mode(), MatrixMode::Projection);
        assert_eq!(*ctx.model_matrix(), Mat4::identity());
        assert_ne!(*ctx.projection_matrix(), Mat4::identity());

        ctx.model();
        ctx.push();
        ctx.scale(2.0, 2.0, 2.0);
        assert_eq!(ctx.model_matrix()[(0, 0)], 2.0);
        ctx.pop();
        assert_eq!(*ctx.model_matrix(), Mat4::identity());

        // Underflow is ignored.
        ctx.pop();
        assert_eq!(*ctx.model_matrix(), Mat4::identity());
    }

    #[test]
    fn test_transforms_apply_in_issue_order() {
        let runtime = runtime();
        let mut ctx = runtime.context();

        ctx.translate(1.0, 0.0, 0.0);
        ctx.rotate_z(90.0);
        let p = transform_point(ctx.model_matrix(), 0.0, 0.0, 0.0);
        // Translated to (1, 0, 0), then rotated onto the y axis.
        assert!((p[0] - 0.0).abs() < 1e-5);
        assert!((p[1] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_mesh_captures_state() {
        let runtime = runtime();
        let mut ctx = runtime.context();

        ctx.translate(0.0, 5.0, 0.0);
        ctx.alias(0);
        ctx.range(3, 3);
        ctx.mesh(4);
        ctx.mesh(4);

        let items = ctx.draw_list().items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].alias, Some(0));
        assert_eq!(items[0].range.start, 3);
        assert_eq!(items[0].transform[(1, 3)], 5.0);
        assert_eq!(items[1].alias, None);
        assert_eq!(items[1].range.count, u32::MAX);
        assert_eq!(items[1].instances, None);
    }

    #[test]
    fn test_instancing_errors() {
        let runtime = runtime();
        let mut ctx = runtime.context();

        assert_eq!(ctx.end_instancing(), Err(GraphicsError::NotInstancing));
        assert!(matches!(
            ctx.begin_instancing(32, InstanceDataType::Data16),
            Err(GraphicsError::InvalidParameter(_))
        ));

        ctx.begin_instancing(0, InstanceDataType::Data16).unwrap();
        assert_eq!(
            ctx.begin_instancing(1, InstanceDataType::Data16),
            Err(GraphicsError::InstancingInProgress(0))
        );
        // Mesh recording is independent.
        ctx.begin_mesh(1, PRIMITIVE_TRIANGLES).unwrap();
        ctx.end_mesh().unwrap();
        assert!(ctx.is_instancing());
        ctx.end_instancing().unwrap();
        assert!(!ctx.is_instancing());
    }

    #[test]
    fn test_instance_transform_uses_model_matrix() {
        let runtime = runtime();
        let mut ctx = runtime.context();

        ctx.begin_instancing(2, InstanceDataType::Transform).unwrap();
        for x in 0..3 {
            ctx.push();
            ctx.translate(x as f32, 0.0, 0.0);
            ctx.instance_transform();
            ctx.pop();
        }
        ctx.end_instancing().unwrap();

        let binding = runtime.instances().get(2).unwrap();
        assert_eq!(binding.buffer.count, 3);
        assert_eq!(binding.buffer.stride, 64);

        runtime.end_frame();
        assert!(runtime.instances().is_empty());
    }

    #[test]
    fn test_instance_transform_needs_transform_records() {
        let runtime = runtime();
        let mut ctx = runtime.context();

        ctx.begin_instancing(0, InstanceDataType::Data64).unwrap();
        ctx.instance_transform();
        ctx.instance(&[0; 64]);
        ctx.end_instancing().unwrap();
        assert_eq!(runtime.instances().get(0).unwrap().buffer.count, 1);
    }

    #[test]
    fn test_end_frame_counts() {
        let runtime = runtime();
        let mut ctx = runtime.context();
        ctx.begin_mesh(1, PRIMITIVE_QUADS).unwrap();
        ctx.end_mesh().unwrap();
        runtime.end_frame();
        runtime.end_frame();
        assert_eq!(runtime.frame(), 2);
    }
}
