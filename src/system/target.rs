//! Target policy: walk to a fixed point (or raycast hit), then halt.

use nalgebra::{Point3, UnitQuaternion, Vector3};

use super::{BackendHint, PolicyBase, PolicyContext, SLOW_THRESHOLD, STOP_THRESHOLD};
use crate::locomotion::LocomotionEvent;
use crate::math;
use crate::world::PhysicsWorld;

#[derive(Default)]
pub struct TargetPolicy {
    pub(super) base: PolicyBase,
    target: Option<Point3<f32>>,
    stop_threshold: f32,
    /// Optional fixed facing applied once the target is reached.
    final_rotation: Option<UnitQuaternion<f32>>,
    moving: bool,
}

impl TargetPolicy {
    /// Walks toward `position` and halts within `stop_threshold`.
    /// `final_facing`, when set, is the direction to face after arrival.
    pub fn set_target(
        &mut self,
        position: Point3<f32>,
        final_facing: Option<Vector3<f32>>,
        stop_threshold: f32,
    ) {
        self.target = Some(position);
        self.stop_threshold = stop_threshold.max(STOP_THRESHOLD);
        self.final_rotation = final_facing.map(math::look_rotation);
        self.moving = true;
    }

    /// Resolves a target from a ray cast against the world. No hit clears
    /// the target, which halts the character.
    pub fn set_target_from_ray(
        &mut self,
        world: &PhysicsWorld,
        ray_origin: Point3<f32>,
        ray_direction: Vector3<f32>,
        final_facing: Option<Vector3<f32>>,
        stop_threshold: f32,
    ) {
        match world.cast_ray(ray_origin, ray_direction, f32::MAX, None) {
            Some((_, point)) => self.set_target(point, final_facing, stop_threshold),
            None => self.stop(final_facing),
        }
    }

    /// Halts in place, optionally turning to a final facing.
    pub fn stop(&mut self, final_facing: Option<Vector3<f32>>) {
        self.target = None;
        self.final_rotation = final_facing.map(math::look_rotation);
        self.moving = false;
    }

    pub fn update(&mut self, ctx: &mut PolicyContext) -> BackendHint {
        self.base.tick_dash(ctx.config, ctx.now, ctx.dt);

        if let Some(agent) = ctx.nav.as_mut() {
            agent.set_enabled(false);
        }

        let position = ctx.driver.position(ctx.world);
        let arrived = match self.target {
            Some(target) => math::horizontal(target - position).norm() <= self.stop_threshold,
            None => true,
        };

        if arrived {
            if self.moving {
                self.moving = false;
                let _ = ctx.events.send(LocomotionEvent::DestinationReached);
            }

            // Preserve vertical momentum so gravity keeps acting at the stop.
            let mut velocity = math::extract_dot_vector(ctx.momentum, Vector3::y());
            let mut rotation = match self.final_rotation {
                Some(dst) => math::rotate_towards(
                    ctx.driver.rotation(ctx.world),
                    dst,
                    ctx.config.angular_speed * ctx.dt,
                ),
                None => self.base.update_rotation(ctx, Vector3::zeros()),
            };

            if self.base.is_dashing {
                velocity = self.base.dash_velocity();
                rotation = ctx.driver.rotation(ctx.world);
            }

            ctx.driver.set_velocity(ctx.world, velocity);
            ctx.driver.set_rotation(ctx.world, rotation);
            return BackendHint::Driver;
        }

        let target = self.target.expect("non-arrived update always has a target");
        let to_target = math::horizontal(target - position);
        let distance = to_target.norm();
        let target_direction = to_target
            .try_normalize(math::DIRECTION_EPSILON)
            .unwrap_or_else(Vector3::zeros);

        let mut target_speed = self.base.calculate_speed(ctx, target_direction);
        // Ease off over the last stretch so the halt does not overshoot.
        if distance < SLOW_THRESHOLD {
            target_speed *= (distance / SLOW_THRESHOLD).clamp(0.0, 1.0);
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
    use crate::world::TIMESTEP;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_arrival_event_fires_exactly_once() {
        let mut world = PhysicsWorld::new();
        let mut driver = RigidBodyDriver::new(Default::default());
        driver.setup(&mut world, Point3::new(0.0, 1.0, 0.0));

        let config = LocomotionConfig::default();
        let mut policy = TargetPolicy::default();
        // Already inside the stop threshold.
        policy.set_target(Point3::new(0.01, 1.0, 0.0), None, 0.5);

        let hooks = TickHooks::default();
        let (tx, rx) = unbounded();
        for i in 0..5 {
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
                now: i as f32 * TIMESTEP,
                dt: TIMESTEP,
                events: &tx,
            };
            policy.update(&mut ctx);
        }

        let arrivals: Vec<_> = rx.try_iter().collect();
        assert_eq!(arrivals.len(), 1);
        assert!(matches!(arrivals[0], LocomotionEvent::DestinationReached));
    }

    #[test]
    fn test_moves_toward_target_until_threshold() {
        let mut world = PhysicsWorld::new();
        let mut driver = RigidBodyDriver::new(Default::default());
        driver.setup(&mut world, Point3::new(0.0, 1.0, 0.0));

        let config = LocomotionConfig::default();
        let mut policy = TargetPolicy::default();
        policy.set_target(Point3::new(0.0, 1.0, 6.0), None, 0.2);

        let hooks = TickHooks::default();
        let (tx, rx) = unbounded();
        let mut now = 0.0;
        for _ in 0..600 {
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
                now,
                dt: TIMESTEP,
                events: &tx,
            };
            policy.update(&mut ctx);
            world.step(TIMESTEP);
            now += TIMESTEP;
        }

        let pos = driver.position(&world);
        assert!(
            (pos.z - 6.0).abs() <= 0.25,
            "should halt near target, got z={}",
            pos.z
        );
        assert_eq!(rx.try_iter().count(), 1, "arrival fires once");
        // Halted: no horizontal velocity.
        assert!(math::horizontal(driver.velocity(&world)).norm() < 1.0e-3);
    }

    #[test]
    fn test_stop_halts_without_event_when_never_moving() {
        let mut world = PhysicsWorld::new();
        let mut driver = RigidBodyDriver::new(Default::default());
        driver.setup(&mut world, Point3::new(0.0, 1.0, 0.0));

        let config = LocomotionConfig::default();
        let mut policy = TargetPolicy::default();
        policy.stop(None);

        let hooks = TickHooks::default();
        let (tx, rx) = unbounded();
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
        policy.update(&mut ctx);
        assert_eq!(rx.try_iter().count(), 0);
    }
}
