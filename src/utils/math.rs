//! Additional math helpers layered on top of `glam`.

use glam::{Mat2, Mat3, Quat, Vec2, Vec3};

/// Squared lengths below this are treated as zero when deriving directions.
pub const EPSILON: f32 = 1e-7;

/// Looser epsilon used for positional errors and normal validation.
pub const BIG_EPSILON: f32 = 1e-5;

/// Converts angular velocity vector (radians/sec) into a quaternion delta.
pub fn angular_velocity_to_quat(angular: Vec3, dt: f32) -> Quat {
    let angle = angular.length() * dt;
    if angle.abs() < 1e-6 {
        return Quat::IDENTITY;
    }
    let axis = angular.normalize();
    Quat::from_axis_angle(axis, angle)
}

/// Skew-symmetric matrix such that `skew(a) * b == a.cross(b)`.
pub fn skew(v: Vec3) -> Mat3 {
    Mat3::from_cols(
        Vec3::new(0.0, v.z, -v.y),
        Vec3::new(-v.z, 0.0, v.x),
        Vec3::new(v.y, -v.x, 0.0),
    )
}

/// Returns a unit vector perpendicular to `axis`.
///
/// Crosses with +Y first; when that is degenerate (axis parallel to Y) falls back to +X and
/// finally +Z, so the result is deterministic for every non-zero input.
pub fn perpendicular(axis: Vec3) -> Vec3 {
    for fallback in [Vec3::Y, Vec3::X, Vec3::Z] {
        let candidate = fallback.cross(axis);
        let length_squared = candidate.length_squared();
        if length_squared > EPSILON {
            return candidate / length_squared.sqrt();
        }
    }
    Vec3::X
}

/// Builds `(t1, t2)` such that `(t1, t2, axis)` is a right-handed orthonormal basis.
pub fn orthonormal_basis(axis: Vec3) -> (Vec3, Vec3) {
    let t1 = perpendicular(axis);
    let t2 = axis.cross(t1);
    (t1, t2)
}

/// Normalizes `v`, substituting `fallback` when `v` is numerically zero.
pub fn normalize_or(v: Vec3, fallback: Vec3) -> Vec3 {
    let length_squared = v.length_squared();
    if length_squared > EPSILON {
        v / length_squared.sqrt()
    } else {
        fallback
    }
}

/// Rotation vector (axis * angle, angle in `[-PI, PI]`) of a unit quaternion.
pub fn rotation_vector(q: Quat) -> Vec3 {
    // Take the shortest arc.
    let q = if q.w < 0.0 { -q } else { q };
    let (axis, angle) = q.to_axis_angle();
    if angle.abs() < 1e-6 || !axis.is_finite() {
        return Vec3::ZERO;
    }
    axis * angle
}

/// Wraps an angle into `[-PI, PI]`.
pub fn wrap_angle(angle: f32) -> f32 {
    let two_pi = std::f32::consts::TAU;
    let mut wrapped = angle % two_pi;
    if wrapped > std::f32::consts::PI {
        wrapped -= two_pi;
    } else if wrapped < -std::f32::consts::PI {
        wrapped += two_pi;
    }
    wrapped
}

/// Inverts a 2x2 matrix, returning zero for singular input.
pub fn invert_or_zero2(m: Mat2) -> Mat2 {
    if m.determinant() == 0.0 {
        return Mat2::ZERO;
    }
    let inverse = m.inverse();
    if inverse.is_finite() {
        inverse
    } else {
        Mat2::ZERO
    }
}

/// Inverts a 3x3 matrix, returning zero for singular input.
pub fn invert_or_zero3(m: Mat3) -> Mat3 {
    if m.determinant() == 0.0 {
        return Mat3::ZERO;
    }
    let inverse = m.inverse();
    if inverse.is_finite() {
        inverse
    } else {
        Mat3::ZERO
    }
}

/// Clamps a 2D accumulated impulse to `max_length`.
pub fn clamp_length2(v: Vec2, max_length: f32) -> Vec2 {
    let length_squared = v.length_squared();
    if length_squared > max_length * max_length && length_squared > 0.0 {
        v * (max_length / length_squared.sqrt())
    } else {
        v
    }
}

/// Clamps a 3D accumulated impulse to `max_length`.
pub fn clamp_length3(v: Vec3, max_length: f32) -> Vec3 {
    let length_squared = v.length_squared();
    if length_squared > max_length * max_length && length_squared > 0.0 {
        v * (max_length / length_squared.sqrt())
    } else {
        v
    }
}

/// Sum of absolute components, used as the impulse magnitude reported by solver iterations.
pub fn manhattan(v: Vec3) -> f32 {
    v.x.abs() + v.y.abs() + v.z.abs()
}
