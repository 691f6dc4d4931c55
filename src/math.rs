//! Geometry helpers shared by drivers, policies and the orchestrator.

use nalgebra::{Point3, UnitQuaternion, Vector3};

/// Threshold under which a direction vector is treated as zero.
pub const DIRECTION_EPSILON: f32 = 1.0e-6;

/// Returns the component of `v` along `axis` (dot-product projection).
pub fn extract_dot_vector(v: Vector3<f32>, axis: Vector3<f32>) -> Vector3<f32> {
    let Some(unit) = axis.try_normalize(DIRECTION_EPSILON) else {
        return Vector3::zeros();
    };
    unit * v.dot(&unit)
}

/// Returns `v` with its component along `axis` removed (dot-product rejection).
pub fn remove_dot_vector(v: Vector3<f32>, axis: Vector3<f32>) -> Vector3<f32> {
    v - extract_dot_vector(v, axis)
}

/// Projects `v` onto the horizontal (XZ) plane.
pub fn horizontal(v: Vector3<f32>) -> Vector3<f32> {
    Vector3::new(v.x, 0.0, v.z)
}

/// Clamps the magnitude of `v` to at most `max`.
pub fn clamp_magnitude(v: Vector3<f32>, max: f32) -> Vector3<f32> {
    let mag = v.norm();
    if mag > max && mag > DIRECTION_EPSILON {
        v * (max / mag)
    } else {
        v
    }
}

/// Builds a facing rotation whose forward (+Z) axis points along `direction`,
/// with world +Y as up. Returns identity for a degenerate direction.
pub fn look_rotation(direction: Vector3<f32>) -> UnitQuaternion<f32> {
    if direction.norm_squared() < DIRECTION_EPSILON * DIRECTION_EPSILON {
        return UnitQuaternion::identity();
    }
    UnitQuaternion::face_towards(&direction, &Vector3::y())
}

/// Rotates `from` toward `to` by at most `max_degrees`, never overshooting.
pub fn rotate_towards(
    from: UnitQuaternion<f32>,
    to: UnitQuaternion<f32>,
    max_degrees: f32,
) -> UnitQuaternion<f32> {
    let angle = from.angle_to(&to);
    let max_radians = max_degrees.to_radians();
    if angle <= max_radians || angle < DIRECTION_EPSILON {
        return to;
    }
    from.try_slerp(&to, max_radians / angle, DIRECTION_EPSILON)
        .unwrap_or(to)
}

/// Angle between two rotations in degrees.
pub fn angle_between_degrees(a: UnitQuaternion<f32>, b: UnitQuaternion<f32>) -> f32 {
    a.angle_to(&b).to_degrees()
}

/// Moves `from` toward `to` by at most `max_distance`.
pub fn move_towards(from: Point3<f32>, to: Point3<f32>, max_distance: f32) -> Point3<f32> {
    let delta = to - from;
    let dist = delta.norm();
    if dist <= max_distance || dist < DIRECTION_EPSILON {
        to
    } else {
        from + delta * (max_distance / dist)
    }
}

/// Intersects a ray with the plane through `plane_point` with normal `plane_normal`.
/// Returns the hit point, or None when the ray is parallel or points away.
pub fn ray_plane_intersection(
    ray_origin: Point3<f32>,
    ray_direction: Vector3<f32>,
    plane_normal: Vector3<f32>,
    plane_point: Point3<f32>,
) -> Option<Point3<f32>> {
    let denom = plane_normal.dot(&ray_direction);
    if denom.abs() < DIRECTION_EPSILON {
        return None;
    }
    let t = plane_normal.dot(&(plane_point - ray_origin)) / denom;
    if t < 0.0 {
        return None;
    }
    Some(ray_origin + ray_direction * t)
}

/// Reflects `v` about the plane described by `normal`.
pub fn reflect(v: Vector3<f32>, normal: Vector3<f32>) -> Vector3<f32> {
    v - normal * (2.0 * v.dot(&normal))
}
