//! Math type aliases, projection helpers and the matrix stack used by
//! recording contexts.

pub use nalgebra;

/// 2D vector (f32).
pub type Vec2 = nalgebra::Vector2<f32>;

/// 3D vector (f32).
pub type Vec3 = nalgebra::Vector3<f32>;

/// 4D vector (f32).
pub type Vec4 = nalgebra::Vector4<f32>;

/// 4x4 matrix (f32).
pub type Mat4 = nalgebra::Matrix4<f32>;

/// Right-handed perspective projection with depth range [0, 1].
///
/// `yfov` is in radians.
pub fn perspective_rh(yfov: f32, aspect: f32, znear: f32, zfar: f32) -> Mat4 {
    let f = 1.0 / (yfov / 2.0).tan();
    let nf = 1.0 / (znear - zfar);
    #[rustfmt::skip]
    let result = Mat4::new(
        f / aspect, 0.0,  0.0,              0.0,
        0.0,        f,    0.0,              0.0,
        0.0,        0.0,  zfar * nf,        znear * zfar * nf,
        0.0,        0.0,  -1.0,             0.0,
    );
    result
}

/// Right-handed orthographic projection with depth range [0, 1].
pub fn orthographic_rh(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let width = right - left;
    let height = top - bottom;
    let depth = far - near;
    #[rustfmt::skip]
    let result = Mat4::new(
        2.0 / width, 0.0,          0.0,          -(right + left) / width,
        0.0,         2.0 / height, 0.0,          -(top + bottom) / height,
        0.0,         0.0,          -1.0 / depth, -near / depth,
        0.0,         0.0,          0.0,          1.0,
    );
    result
}

/// Right-handed look-at view matrix.
pub fn look_at_rh(eye: &Vec3, target: &Vec3, up: &Vec3) -> Mat4 {
    let eye = nalgebra::Point3::from(*eye);
    let target = nalgebra::Point3::from(*target);
    nalgebra::Isometry3::look_at_rh(&eye, &target, up).to_homogeneous()
}

/// Rotation by `degrees` around `axis`. A zero axis yields identity.
pub fn rotation_degrees(degrees: f32, axis: Vec3) -> Mat4 {
    match nalgebra::Unit::try_new(axis, f32::EPSILON) {
        Some(axis) => nalgebra::Rotation3::from_axis_angle(&axis, degrees.to_radians()).to_homogeneous(),
        None => Mat4::identity(),
    }
}

/// Transform a point by a 4x4 matrix, dropping `w`.
#[inline]
pub fn transform_point(m: &Mat4, x: f32, y: f32, z: f32) -> [f32; 3] {
    let v = m * Vec4::new(x, y, z, 1.0);
    [v.x, v.y, v.z]
}

/// Bounded stack of matrices.
///
/// The top is kept outside the saved entries so that the common case of
/// reading and mutating the current matrix never touches the vector.
#[derive(Debug, Clone)]
pub struct MatrixStack {
    top: Mat4,
    saved: Vec<Mat4>,
    max_depth: usize,
}

impl MatrixStack {
    /// Create a stack holding the identity, allowing `max_depth` pushes.
    pub fn new(max_depth: usize) -> Self {
        Self {
            top: Mat4::identity(),
            saved: Vec::with_capacity(max_depth),
            max_depth,
        }
    }

    /// Current matrix.
    #[inline]
    pub fn top(&self) -> &Mat4 {
        &self.top
    }

    /// Number of saved entries below the top.
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    /// Save the current top. Returns `false` if the stack is full.
    pub fn push(&mut self) -> bool {
        if self.saved.len() >= self.max_depth {
            return false;
        }
        self.saved.push(self.top);
        true
    }

    /// Restore the last saved top. Returns `false` if nothing was saved.
    pub fn pop(&mut self) -> bool {
        match self.saved.pop() {
            Some(m) => {
                self.top = m;
                true
            }
            None => false,
        }
    }

    /// Replace the top with the identity.
    pub fn identity(&mut self) {
        self.top = Mat4::identity();
    }

    /// Replace the top.
    pub fn set_top(&mut self, m: Mat4) {
        self.top = m;
    }

    /// Pre-multiply the top: `top = m * top`.
    ///
    /// Transforms therefore take effect in the order they are issued.
    pub fn multiply_top(&mut self, m: &Mat4) {
        self.top = m * self.top;
    }

    /// Drop all saved entries and reset the top to identity.
    pub fn reset(&mut self) {
        self.saved.clear();
        self.top = Mat4::identity();
    }
}

impl Default for MatrixStack {
    fn default() -> Self {
        Self::new(16)
    }
}
