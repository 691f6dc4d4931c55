//! Directional policy: free movement along a caller-supplied direction.

use nalgebra::Vector3;

use super::{BackendHint, PolicyBase, PolicyContext};
use crate::math;

#[derive(Default)]
pub struct DirectionalPolicy {
    pub(super) base: PolicyBase,
    desired_direction: Vector3<f32>,
}

impl DirectionalPolicy {
    /// Sets the desired movement direction for subsequent ticks. Magnitude is
    /// preserved up to 1.0 so analog input scales speed.
    pub fn set_direction(&mut self, direction: Vector3<f32>) {
        self.desired_direction = direction;
    }

    pub fn update(&mut self, ctx: &mut PolicyContext) -> BackendHint {
        self.base.tick_dash(ctx.config, ctx.now, ctx.dt);

        if let Some(agent) = ctx.nav.as_mut() {
            agent.set_enabled(false);
        }

        let mut target_direction =
            math::clamp_magnitude(math::horizontal(self.desired_direction), 1.0);
        let mut target_speed = self.base.calculate_speed(ctx, target_direction);

        if target_direction.norm_squared() < math::DIRECTION_EPSILON {
            // Keep decelerating along the last movement direction.
            target_direction = self.base.movement_direction;
            target_speed = 0.0;
        }

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

        BackendHint::Driver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocomotionConfig;
    use crate::driver::{LocomotionDriver, RigidBodyDriver};
    use crate::system::TickHooks;
    use crate::world::{PhysicsWorld, TIMESTEP};
    use approx::assert_relative_eq;
    use crossbeam_channel::unbounded;
    use nalgebra::Point3;

    fn run_ticks(
        policy: &mut DirectionalPolicy,
        driver: &mut RigidBodyDriver,
        world: &mut PhysicsWorld,
        config: &LocomotionConfig,
        ticks: usize,
    ) {
        let hooks = TickHooks::default();
        let (tx, _rx) = unbounded();
        for i in 0..ticks {
            let mut ctx = PolicyContext {
                config,
                driver,
                world,
                nav: None,
                hooks: &hooks,
                momentum: Vector3::zeros(),
                terrain_normal: Vector3::y(),
                face_target: None,
                is_grounded: true,
                now: i as f32 * TIMESTEP,
                dt: TIMESTEP,
                events: &tx,
            };
            policy.update(&mut ctx);
        }
    }

    #[test]
    fn test_speed_ramps_with_acceleration_limit() {
        let mut world = PhysicsWorld::new();
        let mut driver = RigidBodyDriver::new(Default::default());
        driver.setup(&mut world, Point3::new(0.0, 1.0, 0.0));
        // Facing +Z already, so no turn damping.
        driver.set_rotation(&mut world, math::look_rotation(Vector3::z()));

        let config = LocomotionConfig::default();
        let mut policy = DirectionalPolicy::default();
        policy.set_direction(Vector3::z());

        run_ticks(&mut policy, &mut driver, &mut world, &config, 1);
        let speed = math::horizontal(driver.velocity(&world)).norm();
        assert_relative_eq!(speed, config.acceleration * TIMESTEP, epsilon = 1.0e-4);

        run_ticks(&mut policy, &mut driver, &mut world, &config, 200);
        let speed = math::horizontal(driver.velocity(&world)).norm();
        assert_relative_eq!(speed, config.run_speed, epsilon = 1.0e-3);
    }

    #[test]
    fn test_zero_direction_decelerates_to_rest() {
        let mut world = PhysicsWorld::new();
        let mut driver = RigidBodyDriver::new(Default::default());
        driver.setup(&mut world, Point3::new(0.0, 1.0, 0.0));
        driver.set_velocity(&mut world, Vector3::new(0.0, 0.0, 4.0));

        let config = LocomotionConfig::default();
        let mut policy = DirectionalPolicy::default();
        policy.set_direction(Vector3::zeros());

        run_ticks(&mut policy, &mut driver, &mut world, &config, 1);
        let speed = math::horizontal(driver.velocity(&world)).norm();
        assert_relative_eq!(
            speed,
            4.0 - config.deceleration * TIMESTEP,
            epsilon = 1.0e-4
        );

        run_ticks(&mut policy, &mut driver, &mut world, &config, 500);
        let speed = math::horizontal(driver.velocity(&world)).norm();
        assert_relative_eq!(speed, 0.0, epsilon = 1.0e-3);
    }

    #[test]
    fn test_turning_damps_target_speed() {
        let mut world = PhysicsWorld::new();
        let mut driver = RigidBodyDriver::new(Default::default());
        driver.setup(&mut world, Point3::new(0.0, 1.0, 0.0));
        // Facing +Z, asked to move -Z: 180 degrees of misalignment.
        driver.set_rotation(&mut world, math::look_rotation(Vector3::z()));

        let config = LocomotionConfig::default();
        let mut policy = DirectionalPolicy::default();
        policy.set_direction(-Vector3::z());

        let hooks = TickHooks::default();
        let (tx, _rx) = unbounded();
        let mut ctx = PolicyContext {
            config: &config,
            driver: &mut driver,
            world: &mut world,
            nav: None,
            hooks: &hooks,
            momentum: Vector3::zeros(),
            terrain_normal: Vector3::y(),
            face_target: None,
            is_grounded: true,
            now: 0.0,
            dt: TIMESTEP,
            events: &tx,
        };
        let target = ctx.config.run_speed;
        let damped = policy.base.calculate_speed(&ctx, -Vector3::z());
        policy.update(&mut ctx);
        assert_relative_eq!(damped, target * 0.5, epsilon = 1.0e-3);
    }

    #[test]
    fn test_momentum_added_to_velocity() {
        let mut world = PhysicsWorld::new();
        let mut driver = RigidBodyDriver::new(Default::default());
        driver.setup(&mut world, Point3::new(0.0, 1.0, 0.0));

        let config = LocomotionConfig::default();
        let mut policy = DirectionalPolicy::default();
        policy.set_direction(Vector3::zeros());

        let hooks = TickHooks::default();
        let (tx, _rx) = unbounded();
        let mut ctx = PolicyContext {
            config: &config,
            driver: &mut driver,
            world: &mut world,
            nav: None,
            hooks: &hooks,
            momentum: Vector3::new(0.0, -3.0, 0.0),
            terrain_normal: Vector3::y(),
            face_target: None,
            is_grounded: false,
            now: 0.0,
            dt: TIMESTEP,
            events: &tx,
        };
        policy.update(&mut ctx);
        assert_relative_eq!(driver.velocity(&world).y, -3.0, epsilon = 1.0e-5);
    }
}
