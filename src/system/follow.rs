//! Follow policy: keep within a distance band around a moving body.
//!
//! Hysteresis: start moving only past `max_radius`, stop once inside
//! `min_radius`. Between the two radii the previous decision holds, so the
//! character never oscillates at a band edge. With `use_navigation_mesh`
//! enabled and an agent attached, steering is delegated to the agent.

use nalgebra::{Point3, Vector3};
use rapier3d::prelude::RigidBodyHandle;

use super::{BackendHint, PolicyBase, PolicyContext};
use crate::math;

#[derive(Default)]
pub struct FollowPolicy {
    pub(super) base: PolicyBase,
    target: Option<RigidBodyHandle>,
    min_radius: f32,
    max_radius: f32,
    is_following: bool,
    use_navigation: bool,
}

impl FollowPolicy {
    /// Follows `target`, keeping the distance inside [min_radius, max_radius].
    pub fn set_follow(
        &mut self,
        target: RigidBodyHandle,
        min_radius: f32,
        max_radius: f32,
        use_navigation: bool,
    ) {
        self.target = Some(target);
        self.min_radius = min_radius;
        self.max_radius = max_radius;
        self.is_following = false;
        self.use_navigation = use_navigation;
    }

    pub fn update(&mut self, ctx: &mut PolicyContext) -> BackendHint {
        self.base.tick_dash(ctx.config, ctx.now, ctx.dt);

        let position = ctx.driver.position(ctx.world);
        let target_position = self.target.and_then(|handle| ctx.world.body_position(handle));

        let distance = match target_position {
            Some(target) => (target - position).norm(),
            None => -1.0,
        };

        let delegate_to_agent = self.use_navigation && ctx.nav.is_some();

        let mut stop = target_position.is_none();
        stop |= self.is_following && distance <= self.min_radius;
        stop |= !self.is_following && distance <= self.max_radius;

        if stop {
            self.is_following = false;

            if delegate_to_agent {
                let agent = ctx.nav.as_mut().expect("delegate_to_agent checked nav");
                agent.set_enabled(true);
                agent.set_stopped(true);
                // The driver keeps the vertical axis while the agent steers.
                let vertical = math::extract_dot_vector(ctx.momentum, Vector3::y());
                ctx.driver.set_velocity(ctx.world, vertical);
                return BackendHint::NavigationAgent;
            }

            // Keep falling while parked.
            let vertical = math::extract_dot_vector(ctx.momentum, Vector3::y());
            ctx.driver.set_velocity(ctx.world, vertical);
            return BackendHint::Driver;
        }

        self.is_following = true;
        let target = target_position.expect("non-stopped update always has a target");

        if delegate_to_agent {
            let forward = ctx.driver.rotation(ctx.world) * Vector3::z();
            let speed = self.base.calculate_speed(ctx, forward);
            let agent = ctx.nav.as_mut().expect("delegate_to_agent checked nav");
            agent.set_enabled(true);
            agent.set_stopped(false);
            agent.set_destination(target);
            agent.set_speed(speed);
            agent.set_angular_speed(ctx.config.angular_speed);
            let vertical = math::extract_dot_vector(ctx.momentum, Vector3::y());
            ctx.driver.set_velocity(ctx.world, vertical);
            return BackendHint::NavigationAgent;
        }

        if let Some(agent) = ctx.nav.as_mut() {
            agent.set_enabled(false);
        }

        // Steer on the horizontal plane toward the target.
        let flat_target = Point3::new(target.x, position.y, target.z);
        let target_direction = math::horizontal(flat_target - position)
            .try_normalize(math::DIRECTION_EPSILON)
            .unwrap_or_else(Vector3::zeros);

        let target_speed = self.base.calculate_speed(ctx, target_direction);
        let speed = self.base.accelerate(ctx, target_speed);
        let mut target_rotation = self.base.update_rotation(ctx, target_direction);

        let mut velocity = target_direction * speed;

        self.base.update_sliding(ctx);
        if self.base.is_sliding {
            velocity = self.base.slide_direction();
        }
        velocity += ctx.momentum;

        if self.base.is_dashing {
            velocity = self.base.dash_velocity();
            target_rotation = ctx.driver.rotation(ctx.world);
        }

        ctx.driver.set_velocity(ctx.world, velocity);
        ctx.driver.set_rotation(ctx.world, target_rotation);

        // Keep the agent's idea of position in sync for a later handover.
        let driver_position = ctx.driver.position(ctx.world);
        if let Some(agent) = ctx.nav.as_mut() {
            agent.warp(driver_position);
        }

        BackendHint::Driver
    }
}
