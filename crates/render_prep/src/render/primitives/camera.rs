//! # 3D Camera System
//!
//! Camera projection parameters live on camera nodes; the camera's placement
//! comes from the node's world transform. Resolving a camera for a layer
//! combines both with the layer viewport's aspect ratio.
//!
//! ## Coordinate System
//! Right-handed, Y-up. The camera looks down its local -Z axis and the
//! projection maps depth to the OpenGL clip range `[-w, w]`.

use thiserror::Error;

use crate::foundation::math::{utils, Mat4, Point3, Vec3};
use crate::scene::Frustum;

/// Camera parameters that cannot produce a projection
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CameraError {
    /// Near plane is not a positive finite distance
    #[error("near plane {0} must be positive")]
    InvalidNear(f32),

    /// Far plane does not lie beyond the near plane
    #[error("far plane {far} must lie beyond near plane {near}")]
    InvalidDepthRange {
        /// Near clip distance
        near: f32,
        /// Far clip distance
        far: f32,
    },

    /// Perspective field of view outside `(0, pi)`
    #[error("field of view {0} rad is outside (0, pi)")]
    InvalidFieldOfView(f32),

    /// Orthographic extent collapses to zero
    #[error("orthographic height {0} gives an empty view")]
    InvalidHeight(f32),

    /// Viewport aspect ratio is zero or not finite
    #[error("aspect ratio {0} must be positive")]
    InvalidAspect(f32),
}

/// Projection model
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Perspective projection with vertical field of view in radians
    Perspective {
        /// Vertical field of view in radians
        fov_y: f32,
    },
    /// Orthographic projection showing `height` world units vertically
    Orthographic {
        /// Visible height in world units
        height: f32,
    },
}

/// Camera parameters attached to a camera node
#[derive(Debug, Clone)]
pub struct Camera {
    /// Projection model
    pub projection: Projection,

    /// Distance to near clipping plane
    pub near: f32,

    /// Distance to far clipping plane
    pub far: f32,

    /// Whether renderables outside the frustum are dropped
    pub frustum_culling: bool,
}

impl Camera {
    /// Create a perspective camera
    ///
    /// # Arguments
    /// * `fov_degrees` - Vertical field of view in degrees
    /// * `near` - Distance to near clipping plane (must be > 0)
    /// * `far` - Distance to far clipping plane (must be > near)
    pub fn perspective(fov_degrees: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Perspective { fov_y: utils::deg_to_rad(fov_degrees) },
            near,
            far,
            frustum_culling: true,
        }
    }

    /// Create an orthographic camera
    pub fn orthographic(height: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Orthographic { height },
            near,
            far,
            frustum_culling: true,
        }
    }

    /// Check that the parameters give a finite, non-degenerate projection for
    /// the given aspect ratio
    pub fn validate(&self, aspect: f32) -> Result<(), CameraError> {
        if !(self.near.is_finite() && self.near > 0.0) {
            return Err(CameraError::InvalidNear(self.near));
        }
        if !(self.far.is_finite() && self.far - self.near > f32::EPSILON) {
            return Err(CameraError::InvalidDepthRange { near: self.near, far: self.far });
        }
        if !(aspect.is_finite() && aspect > f32::EPSILON) {
            return Err(CameraError::InvalidAspect(aspect));
        }
        match self.projection {
            Projection::Perspective { fov_y } => {
                if !(fov_y > 0.0 && fov_y < std::f32::consts::PI) {
                    return Err(CameraError::InvalidFieldOfView(fov_y));
                }
            }
            Projection::Orthographic { height } => {
                if !(height.is_finite() && height > f32::EPSILON && height * aspect > f32::EPSILON) {
                    return Err(CameraError::InvalidHeight(height));
                }
            }
        }
        Ok(())
    }

    /// Projection matrix for the given aspect ratio (width / height)
    ///
    /// # Panics
    ///
    /// nalgebra asserts on degenerate parameters; check them with
    /// [`validate`](Self::validate) first.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        match self.projection {
            Projection::Perspective { fov_y } => Mat4::new_perspective(aspect, fov_y, self.near, self.far),
            Projection::Orthographic { height } => {
                let half_h = height * 0.5;
                let half_w = half_h * aspect;
                Mat4::new_orthographic(-half_w, half_w, -half_h, half_h, self.near, self.far)
            }
        }
    }

    /// Combine these parameters with a world placement
    ///
    /// Expects parameters accepted by [`validate`](Self::validate).
    pub fn resolve(&self, world_transform: &Mat4, aspect: f32) -> ResolvedCamera {
        let position = utils::translation_of(world_transform);
        let forward = world_transform.transform_vector(&Vec3::new(0.0, 0.0, -1.0));
        let up = world_transform.transform_vector(&Vec3::new(0.0, 1.0, 0.0));
        let forward = forward.try_normalize(f32::EPSILON).unwrap_or_else(|| Vec3::new(0.0, 0.0, -1.0));
        let up = up.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::y);

        let view = Mat4::look_at_rh(
            &Point3::from(position),
            &Point3::from(position + forward),
            &up,
        );
        let projection = self.projection_matrix(aspect);
        let view_projection = projection * view;

        ResolvedCamera {
            position,
            forward,
            view,
            projection,
            view_projection,
            frustum: Frustum::from_matrix(&view_projection),
            near: self.near,
            far: self.far,
            frustum_culling: self.frustum_culling,
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(60.0, 0.1, 1000.0)
    }
}

/// Camera state computed for one layer in one frame
#[derive(Debug, Clone)]
pub struct ResolvedCamera {
    /// World-space position
    pub position: Vec3,
    /// Normalized world-space viewing direction
    pub forward: Vec3,
    /// World-to-view matrix
    pub view: Mat4,
    /// View-to-clip matrix
    pub projection: Mat4,
    /// World-to-clip matrix
    pub view_projection: Mat4,
    /// Clipping frustum extracted from `view_projection`
    pub frustum: Frustum,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
    /// Whether culling against `frustum` is enabled
    pub frustum_culling: bool,
}

impl ResolvedCamera {
    /// Squared distance from the camera to a world-space point
    pub fn distance_squared(&self, point: Vec3) -> f32 {
        utils::distance_squared(self.position, point)
    }
}
