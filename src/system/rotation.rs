//! Rotation policy: turn in place toward a direction, without translating.
//!
//! Exposes a signed pivot speed in [-1, 1] for animation blending: positive
//! turns clockwise (toward the character's right), negative counterclockwise.

use nalgebra::Vector3;

use super::{BackendHint, PolicyBase, PolicyContext};

/// Dot-product dead zone around "already facing the target".
const PIVOT_DEAD_ZONE: f32 = 0.1;

#[derive(Default)]
pub struct RotationPolicy {
    pub(super) base: PolicyBase,
    desired_direction: Vector3<f32>,
}

impl RotationPolicy {
    pub fn set_direction(&mut self, direction: Vector3<f32>) {
        self.desired_direction = direction;
    }

    pub fn update(&mut self, ctx: &mut PolicyContext) -> BackendHint {
        self.base.tick_dash(ctx.config, ctx.now, ctx.dt);

        if let Some(agent) = ctx.nav.as_mut() {
            agent.set_enabled(false);
        }

        let target_rotation = self.base.update_rotation(ctx, self.desired_direction);

        let rotation = ctx.driver.rotation(ctx.world);
        let forward = rotation * Vector3::z();
        let right = rotation * Vector3::x();

        let alignment = forward.dot(&self.desired_direction);
        if alignment.abs() < PIVOT_DEAD_ZONE {
            self.base.pivot_speed = 0.0;
        } else {
            self.base.pivot_speed = right.dot(&self.desired_direction);
            // Behind the character: saturate so the blend picks a full turn.
            if alignment < 0.0 {
                self.base.pivot_speed = if self.base.pivot_speed >= 0.0 { 1.0 } else { -1.0 };
            }
        }

        ctx.driver.set_rotation(ctx.world, target_rotation);
        ctx.driver.set_velocity(ctx.world, Vector3::zeros());

        BackendHint::Driver
    }
}
