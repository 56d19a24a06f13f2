//! Transform helpers on top of cgmath
//!
//! Euler angles are `(roll, pitch, yaw)` in radians about `(x, y, z)`.

use cgmath::{InnerSpace, Matrix, Matrix4, Quaternion, SquareMatrix, Vector3, Zero};

/// Local transform of a scene node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub scale: Vector3<f32>,
    pub rotation: Quaternion<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vector3::zero(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            rotation: Quaternion::new(1.0, 0.0, 0.0, 0.0),
        }
    }
}

impl Transform {
    pub fn from_position(position: Vector3<f32>) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }
}

pub fn quat_from_euler(euler: Vector3<f32>) -> Quaternion<f32> {
    let (sy, cy) = (euler.z * 0.5).sin_cos();
    let (sp, cp) = (euler.y * 0.5).sin_cos();
    let (sr, cr) = (euler.x * 0.5).sin_cos();

    Quaternion::new(
        cy * cp * cr + sy * sp * sr,
        cy * cp * sr - sy * sp * cr,
        sy * cp * sr + cy * sp * cr,
        sy * cp * cr - cy * sp * sr,
    )
}

/// Inverse of [`quat_from_euler`]; pitch saturates at +-90 degrees
pub fn quat_to_euler(q: Quaternion<f32>) -> Vector3<f32> {
    let (w, x, y, z) = (q.s, q.v.x, q.v.y, q.v.z);

    let sinr_cosp = 2.0 * (w * x + y * z);
    let cosr_cosp = 1.0 - 2.0 * (x * x + y * y);
    let roll = sinr_cosp.atan2(cosr_cosp);

    let sinp = 2.0 * (w * y - z * x);
    let pitch = if sinp.abs() >= 1.0 {
        std::f32::consts::FRAC_PI_2.copysign(sinp)
    } else {
        sinp.asin()
    };

    let siny_cosp = 2.0 * (w * z + x * y);
    let cosy_cosp = 1.0 - 2.0 * (y * y + z * z);
    let yaw = siny_cosp.atan2(cosy_cosp);

    Vector3::new(roll, pitch, yaw)
}

/// `T * R * S`: scale first, then rotation, then translation
pub fn transform_to_mat4(transform: &Transform) -> Matrix4<f32> {
    let rotation = if transform.rotation.magnitude2() > 0.0 {
        transform.rotation.normalize()
    } else {
        Quaternion::new(1.0, 0.0, 0.0, 0.0)
    };

    Matrix4::from_translation(transform.position)
        * Matrix4::from(rotation)
        * Matrix4::from_nonuniform_scale(transform.scale.x, transform.scale.y, transform.scale.z)
}

/// Inverse-transpose of `pose`, identity when `pose` is singular
pub fn normal_matrix(pose: &Matrix4<f32>) -> Matrix4<f32> {
    pose.invert()
        .map(|inverse| inverse.transpose())
        .unwrap_or_else(Matrix4::identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Rad, Rotation3, Vector4};

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-5, "{} != {}", a, b);
    }

    #[test]
    fn test_euler_round_trip() {
        let euler = Vector3::new(0.3, -0.7, 1.2);
        let back = quat_to_euler(quat_from_euler(euler));
        assert_close(back.x, euler.x);
        assert_close(back.y, euler.y);
        assert_close(back.z, euler.z);
    }

    #[test]
    fn test_yaw_matches_axis_rotation() {
        let q = quat_from_euler(Vector3::new(0.0, 0.0, 0.5));
        let expected = Quaternion::from_angle_z(Rad(0.5));
        assert_close(q.s, expected.s);
        assert_close(q.v.z, expected.v.z);
    }

    #[test]
    fn test_trs_order() {
        let transform = Transform {
            position: Vector3::new(1.0, 0.0, 0.0),
            scale: Vector3::new(2.0, 2.0, 2.0),
            rotation: Quaternion::from_angle_z(Rad(std::f32::consts::FRAC_PI_2)),
        };

        let p = transform_to_mat4(&transform) * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert_close(p.x, 1.0);
        assert_close(p.y, 2.0);
        assert_close(p.z, 0.0);
    }

    #[test]
    fn test_normal_matrix() {
        let pose = Matrix4::from_scale(2.0f32);
        let normal = normal_matrix(&pose);
        assert_close(normal.x.x, 0.5);

        let singular = Matrix4::from_scale(0.0f32);
        assert_eq!(normal_matrix(&singular), Matrix4::identity());
    }
}
