//! Per-frame model / view / projection matrices.
//!
//! The scene is laid out with x/y on the ground plane and z pointing up.
//! The camera orbits the centroid of all loaded layers: the rotate control
//! turns the model about the vertical axis through the centroid, zoom moves
//! the eye along a fixed tilted direction, and the projection can switch
//! between perspective and orthographic without changing the framing.

use glam::{Mat3, Mat4, Vec3};
use std::{fmt, str::FromStr};

pub const FOV_Y_DEG: f32 = 45.0;
pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 10.0;
pub const MAX_TILT_DEG: f32 = 85.0;
pub const DEFAULT_TILT_DEG: f32 = 45.0;
/// Eye distance in multiples of the scene radius at zoom 1. Keeps the
/// bounding sphere inside the 45 degree field of view (1 / sin 22.5 < 2.7).
pub const FRAMING: f32 = 2.7;
/// Direction the light travels, world space.
pub const LIGHT_DIR: [f32; 3] = [-0.4, 0.3, -0.85];


#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    #[default]
    Perspective,
    Orthographic,
}
impl Projection {
    pub const ALL: [Projection; 2] = [Projection::Perspective, Projection::Orthographic];
}
impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projection::Perspective => f.write_str("perspective"),
            Projection::Orthographic => f.write_str("orthographic"),
        }
    }
}
impl FromStr for Projection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "perspective" => Ok(Projection::Perspective),
            "orthographic" | "ortho" => Ok(Projection::Orthographic),
            other => Err(format!("unknown projection '{}'", other)),
        }
    }
}


/// Camera controls driven by the UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    rotate_deg: f32,
    zoom: f32,
    tilt_deg: f32,
    projection: Projection,
}
impl Default for ViewState {
    fn default() -> Self {
        Self {
            rotate_deg: 0.0,
            zoom: 1.0,
            tilt_deg: DEFAULT_TILT_DEG,
            projection: Projection::default(),
        }
    }
}
impl ViewState {
    pub fn rotate_deg(&self) -> f32 {
        self.rotate_deg
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn tilt_deg(&self) -> f32 {
        self.tilt_deg
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Wraps into [0, 360).
    pub fn set_rotate(&mut self, deg: f32) {
        if deg.is_finite() {
            self.rotate_deg = deg.rem_euclid(360.0);
        }
    }

    pub fn rotate_by(&mut self, delta_deg: f32) {
        self.set_rotate(self.rotate_deg + delta_deg);
    }

    /// Clamps into [MIN_ZOOM, MAX_ZOOM].
    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }
    }

    pub fn zoom_by(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.set_zoom(self.zoom * factor);
        }
    }

    /// 0 looks straight down.
    pub fn set_tilt(&mut self, deg: f32) {
        if deg.is_finite() {
            self.tilt_deg = deg.clamp(0.0, MAX_TILT_DEG);
        }
    }

    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
    }
}


/// Rotation about the vertical axis through `centroid`.
pub fn model_matrix(centroid: Vec3, rotate_deg: f32) -> Mat4 {
    Mat4::from_translation(centroid)
        * Mat4::from_rotation_z(rotate_deg.to_radians())
        * Mat4::from_translation(-centroid)
}

/// Portrait viewports are narrower than tall, so the fit is made on the width.
fn fit_scale(aspect: f32) -> f32 {
    aspect.min(1.0)
}

pub fn camera_distance(radius: f32, zoom: f32, aspect: f32) -> f32 {
    FRAMING * radius / (zoom * fit_scale(aspect))
}

pub fn eye_position(centroid: Vec3, distance: f32, tilt_deg: f32) -> Vec3 {
    let (sin, cos) = tilt_deg.to_radians().sin_cos();
    centroid + distance * Vec3::new(0.0, -sin, cos)
}

pub fn view_matrix(centroid: Vec3, eye: Vec3) -> Mat4 {
    Mat4::look_at_rh(eye, centroid, Vec3::Y)
}

/// Near/far planes bracketing a sphere of `radius` around the target.
fn depth_range(radius: f32, distance: f32) -> (f32, f32) {
    let near = (distance - 2.0 * radius).max(distance * 0.01).max(1e-3);
    let far = distance + 2.0 * radius;
    (near, far)
}

pub fn projection_matrix(
    projection: Projection,
    aspect: f32,
    radius: f32,
    zoom: f32,
    distance: f32,
) -> Mat4 {
    match projection {
        Projection::Perspective => {
            let (near, far) = depth_range(radius, distance);
            Mat4::perspective_rh_gl(FOV_Y_DEG.to_radians(), aspect, near, far)
        }
        Projection::Orthographic => {
            let half_h = radius / (zoom * fit_scale(aspect));
            let half_w = half_h * aspect;
            Mat4::orthographic_rh_gl(
                -half_w,
                half_w,
                -half_h,
                half_h,
                distance - 2.0 * radius,
                distance + 2.0 * radius,
            )
        }
    }
}

pub fn aspect(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}


/// Everything the layer programs need for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameTransforms {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub normal: Mat3,
    pub eye: Vec3,
    pub light_dir: Vec3,
}
impl FrameTransforms {
    pub fn compute(state: &ViewState, centroid: Vec3, radius: f32, aspect: f32) -> Self {
        let model = model_matrix(centroid, state.rotate_deg);
        let distance = camera_distance(radius, state.zoom, aspect);
        let eye = eye_position(centroid, distance, state.tilt_deg);

        Self {
            model,
            view: view_matrix(centroid, eye),
            projection: projection_matrix(state.projection, aspect, radius, state.zoom, distance),
            normal: Mat3::from_mat4(model).inverse().transpose(),
            eye,
            light_dir: Vec3::from(LIGHT_DIR).normalize(),
        }
    }

    pub fn model_array(&self) -> [f32; 16] {
        self.model.to_cols_array()
    }

    pub fn view_array(&self) -> [f32; 16] {
        self.view.to_cols_array()
    }

    pub fn projection_array(&self) -> [f32; 16] {
        self.projection.to_cols_array()
    }

    pub fn normal_array(&self) -> [f32; 9] {
        self.normal.to_cols_array()
    }

    /// World position to normalized device coordinates.
    pub fn world_to_ndc(&self, p: Vec3) -> Vec3 {
        (self.projection * self.view * self.model).project_point3(p)
    }
}
