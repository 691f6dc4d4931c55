//! Sensor driver: a dynamic body kept at hover height by downward raycasts.
//!
//! Instead of the engine's character controller, this backend casts one or
//! more rays toward the ground each step and, while grounded and not rising,
//! replaces the vertical velocity with the correction
//! `(target_height - measured_distance) / dt`. The capsule glides up steps
//! and slopes without ever registering a collision with them from below.

use nalgebra::{Point3, UnitQuaternion, Vector3};
use rapier3d::prelude::*;

use super::{insert_character_body, rebuild_capsule, LocomotionDriver};
use crate::config::ShapeConfig;
use crate::world::{GroundHit, PhysicsWorld};

/// Fraction of the capsule radius the outermost sensor ring sits at.
const RING_RADIUS_FACTOR: f32 = 0.8;

/// Rays per sensor ring.
const RAYS_PER_RING: usize = 6;

pub struct SensorDriver {
    shape: ShapeConfig,
    body_handle: Option<RigidBodyHandle>,
    collider_handle: Option<ColliderHandle>,
    requested_velocity: Vector3<f32>,
    grounded: bool,
    extended_range: bool,
    last_hit: Option<GroundHit>,
}

impl SensorDriver {
    pub fn new(shape: ShapeConfig) -> Self {
        Self {
            shape,
            body_handle: None,
            collider_handle: None,
            requested_velocity: Vector3::zeros(),
            grounded: false,
            extended_range: false,
            last_hit: None,
        }
    }

    /// Distance from the ray origin to the ground when resting.
    fn target_distance(&self) -> f32 {
        self.shape.height / 2.0 + self.shape.sensor_offset
    }

    /// Probe reach this step. The extension covers gait transitions where the
    /// capsule briefly lifts past the base range while still effectively
    /// grounded (stairs, slope crests).
    fn sensor_range(&self) -> f32 {
        let base = self.target_distance() + self.shape.skin_width;
        if self.extended_range {
            base + self.shape.step_height
        } else {
            base
        }
    }

    /// Ray origins: the capsule center (plus sensor offset), surrounded by
    /// `sensor_rows` concentric rings of `RAYS_PER_RING` rays each.
    fn ray_origins(&self, center: Point3<f32>) -> Vec<Point3<f32>> {
        let origin = Point3::new(center.x, center.y + self.shape.sensor_offset, center.z);
        let mut origins = vec![origin];
        let rows = self.shape.sensor_rows;
        for row in 1..=rows {
            let ring_radius = self.shape.radius * RING_RADIUS_FACTOR * row as f32 / rows as f32;
            // Alternate rings are rotated half a segment to spread coverage.
            let phase = if row % 2 == 0 { 0.5 } else { 0.0 };
            for i in 0..RAYS_PER_RING {
                let angle =
                    (i as f32 + phase) * (2.0 * std::f32::consts::PI / RAYS_PER_RING as f32);
                origins.push(Point3::new(
                    origin.x + ring_radius * angle.cos(),
                    origin.y,
                    origin.z + ring_radius * angle.sin(),
                ));
            }
        }
        origins
    }

    /// Closest ground hit across the whole sensor array.
    fn probe(&self, world: &PhysicsWorld) -> Option<GroundHit> {
        let body = self.body_handle?;
        let center = world.body_position(body)?;
        let range = self.sensor_range();

        let mut best: Option<GroundHit> = None;
        for origin in self.ray_origins(center) {
            if let Some(hit) = world.probe_ground(origin, range, Some(body)) {
                let closer = best.map(|b| hit.distance < b.distance).unwrap_or(true);
                if closer {
                    best = Some(hit);
                }
            }
        }
        best
    }

    /// Walkable surfaces get the hover correction; steeper ones still count
    /// as ground contact so the slide logic can take over.
    fn hit_is_walkable(&self, hit: &GroundHit) -> bool {
        let angle = hit.normal.angle(&Vector3::y()).to_degrees();
        angle <= self.shape.slope_angle_limit
    }
}

impl LocomotionDriver for SensorDriver {
    fn setup(&mut self, world: &mut PhysicsWorld, position: Point3<f32>) {
        let builder = RigidBodyBuilder::dynamic()
            .gravity_scale(0.0)
            .locked_axes(LockedAxes::ROTATION_LOCKED);
        let (body, collider) = insert_character_body(world, &self.shape, position, builder);
        self.body_handle = Some(body);
        self.collider_handle = Some(collider);
    }

    fn is_grounded(&self, _world: &PhysicsWorld) -> bool {
        self.grounded
    }

    fn velocity(&self, world: &PhysicsWorld) -> Vector3<f32> {
        self.body_handle
            .and_then(|h| world.body_velocity(h))
            .unwrap_or_else(Vector3::zeros)
    }

    fn set_velocity(&mut self, _world: &mut PhysicsWorld, velocity: Vector3<f32>) {
        self.requested_velocity = velocity;
    }

    fn move_delta(&mut self, world: &mut PhysicsWorld, delta: Vector3<f32>) {
        if let Some(body) = self.body_handle.and_then(|h| world.rigid_body_set.get_mut(h)) {
            let next = body.translation() + vector![delta.x, delta.y, delta.z];
            body.set_translation(next, true);
        }
    }

    fn position(&self, world: &PhysicsWorld) -> Point3<f32> {
        self.body_handle
            .and_then(|h| world.body_position(h))
            .unwrap_or_else(Point3::origin)
    }

    fn set_position(&mut self, world: &mut PhysicsWorld, position: Point3<f32>) {
        if let Some(body) = self.body_handle.and_then(|h| world.rigid_body_set.get_mut(h)) {
            body.set_translation(vector![position.x, position.y, position.z], true);
        }
        self.grounded = false;
        self.last_hit = None;
    }

    fn rotation(&self, world: &PhysicsWorld) -> UnitQuaternion<f32> {
        self.body_handle
            .and_then(|h| world.rigid_body_set.get(h))
            .map(|body| *body.rotation())
            .unwrap_or_else(UnitQuaternion::identity)
    }

    fn set_rotation(&mut self, world: &mut PhysicsWorld, rotation: UnitQuaternion<f32>) {
        if let Some(body) = self.body_handle.and_then(|h| world.rigid_body_set.get_mut(h)) {
            body.set_rotation(rotation, true);
        }
    }

    fn step(&mut self, world: &mut PhysicsWorld, dt: f32) {
        let Some(body_handle) = self.body_handle else {
            return;
        };
        if dt <= 0.0 {
            return;
        }

        let hit = self.probe(world);
        let walkable = hit.as_ref().map(|h| self.hit_is_walkable(h)).unwrap_or(false);
        self.last_hit = hit;
        self.grounded = hit.is_some();

        let mut velocity = self.requested_velocity;
        if let (Some(hit), true) = (hit, walkable) {
            // Rising requests (jumps) must not be cancelled by the snap.
            if self.requested_velocity.y <= 0.0 {
                let correction = (self.target_distance() - hit.distance) / dt;
                velocity.y = correction;
            }
        }

        if let Some(body) = world.rigid_body_set.get_mut(body_handle) {
            body.set_linvel(vector![velocity.x, velocity.y, velocity.z], true);
        }
    }

    fn set_extend_sensor_range(&mut self, grounded: bool) {
        self.extended_range = grounded;
    }

    fn ground_normal(&self, _world: &PhysicsWorld) -> Option<Vector3<f32>> {
        self.last_hit.map(|hit| hit.normal)
    }

    fn height(&self) -> f32 {
        self.shape.height
    }

    fn radius(&self) -> f32 {
        self.shape.radius
    }

    fn set_height(&mut self, world: &mut PhysicsWorld, height: f32) {
        self.shape.height = height;
        if let (Some(body), Some(collider)) = (self.body_handle, self.collider_handle.as_mut()) {
            rebuild_capsule(world, body, collider, &self.shape);
        }
    }

    fn slope_angle_limit(&self) -> f32 {
        self.shape.slope_angle_limit
    }

    fn skin_width(&self) -> f32 {
        self.shape.skin_width
    }

    fn body_handle(&self) -> Option<RigidBodyHandle> {
        self.body_handle
    }
}
