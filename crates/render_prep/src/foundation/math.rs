//! Math utilities and types
//!
//! Provides the math types used by scene traversal, culling and camera setup.

pub use nalgebra::{
    Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Local transform of a scene node: position, rotation and scale
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position relative to the parent node
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform with position and uniform scale
    pub fn from_position_scale(position: Vec3, scale: f32) -> Self {
        Self {
            position,
            scale: Vec3::new(scale, scale, scale),
            ..Default::default()
        }
    }

    /// Convert to a transformation matrix (translation * rotation * scale)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }
}

/// Math utility functions
pub mod utils {
    use super::{Mat3, Mat4, Point3, Vec3};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees.to_radians()
    }

    /// Translation component of an affine matrix
    pub fn translation_of(matrix: &Mat4) -> Vec3 {
        Vec3::new(matrix.m14, matrix.m24, matrix.m34)
    }

    /// Inverse-transpose of the upper 3x3 block, used to transform normals.
    ///
    /// Singular matrices (zero scale) fall back to the plain upper block so the
    /// result is always finite.
    pub fn normal_matrix(model: &Mat4) -> Mat3 {
        let upper: Mat3 = model.fixed_view::<3, 3>(0, 0).into_owned();
        upper
            .try_inverse()
            .map_or(upper, |inverse| inverse.transpose())
    }

    /// Transform a point by an affine matrix
    pub fn transform_point(matrix: &Mat4, point: Vec3) -> Vec3 {
        matrix.transform_point(&Point3::from(point)).coords
    }

    /// Squared distance between two points
    pub fn distance_squared(a: Vec3, b: Vec3) -> f32 {
        (a - b).norm_squared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transform_to_matrix_translates_then_scales() {
        let transform = Transform::from_position_scale(Vec3::new(1.0, 2.0, 3.0), 2.0);
        let point = utils::transform_point(&transform.to_matrix(), Vec3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(point, Vec3::new(3.0, 4.0, 5.0), epsilon = 1e-6);
    }

    #[test]
    fn test_normal_matrix_of_uniform_scale() {
        let model = Mat4::new_scaling(2.0);
        let normal = utils::normal_matrix(&model);
        assert_relative_eq!(normal, Mat3::identity() * 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_normal_matrix_singular_falls_back() {
        let model = Mat4::new_scaling(0.0);
        let normal = utils::normal_matrix(&model);
        assert!(normal.iter().all(|v| v.is_finite()));
    }
}
