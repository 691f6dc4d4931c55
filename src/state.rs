use nalgebra::{UnitQuaternion, Vector3};

/// Read-only snapshot of one locomotion tick, refreshed after the driver
/// steps. Consumers (animation, cameras, gameplay) read this instead of
/// poking at the physics body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacterState {
    /// Planar speed along the character's facing, in local space.
    pub forward_speed: Vector3<f32>,
    /// Signed heading of the local velocity, radians. atan2(x, z): zero when
    /// moving straight ahead, positive when drifting right.
    pub sides_speed: f32,
    /// World-space vertical velocity.
    pub vertical_speed: f32,
    /// Turn-in-place command in [-1, 1], nonzero only under the rotation
    /// policy.
    pub pivot_speed: f32,
    pub is_grounded: bool,
    pub is_sliding: bool,
    pub is_dashing: bool,
    /// Surface normal under the character, up when airborne or unknown.
    pub ground_normal: Vector3<f32>,
}

impl Default for CharacterState {
    fn default() -> Self {
        Self {
            forward_speed: Vector3::zeros(),
            sides_speed: 0.0,
            vertical_speed: 0.0,
            pivot_speed: 0.0,
            is_grounded: false,
            is_sliding: false,
            is_dashing: false,
            ground_normal: Vector3::y(),
        }
    }
}

impl CharacterState {
    /// Builds a snapshot from the world-space velocity and facing measured
    /// after the driver stepped.
    pub fn capture(
        velocity: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
        pivot_speed: f32,
        is_grounded: bool,
        is_sliding: bool,
        is_dashing: bool,
        ground_normal: Option<Vector3<f32>>,
    ) -> Self {
        let local = rotation.inverse_transform_vector(&velocity);
        let planar = Vector3::new(local.x, 0.0, local.z);
        let sides_speed = if planar.norm() > 1.0e-4 {
            local.x.atan2(local.z)
        } else {
            0.0
        };
        Self {
            forward_speed: planar,
            sides_speed,
            vertical_speed: velocity.y,
            pivot_speed,
            is_grounded,
            is_sliding,
            is_dashing,
            ground_normal: ground_normal.unwrap_or_else(Vector3::y),
        }
    }
}
