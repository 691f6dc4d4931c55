//! Manual physics driver: a plain dynamic body whose velocity the locomotion
//! policies write directly. Ground detection is stubbed always-true, so this
//! backend suits flat arenas where characters never leave the floor plane.

use nalgebra::{Point3, UnitQuaternion, Vector3};
use rapier3d::prelude::*;

use super::{insert_character_body, rebuild_capsule, LocomotionDriver};
use crate::config::ShapeConfig;
use crate::world::PhysicsWorld;

pub struct RigidBodyDriver {
    shape: ShapeConfig,
    body_handle: Option<RigidBodyHandle>,
    collider_handle: Option<ColliderHandle>,
}

impl RigidBodyDriver {
    pub fn new(shape: ShapeConfig) -> Self {
        Self {
            shape,
            body_handle: None,
            collider_handle: None,
        }
    }
}

impl LocomotionDriver for RigidBodyDriver {
    fn setup(&mut self, world: &mut PhysicsWorld, position: Point3<f32>) {
        // Gravity is integrated by the orchestrator's momentum, not the
        // physics engine, and the capsule must stay upright.
        let builder = RigidBodyBuilder::dynamic()
            .gravity_scale(0.0)
            .locked_axes(LockedAxes::ROTATION_LOCKED);
        let (body, collider) = insert_character_body(world, &self.shape, position, builder);
        self.body_handle = Some(body);
        self.collider_handle = Some(collider);
    }

    fn is_grounded(&self, _world: &PhysicsWorld) -> bool {
        true
    }

    fn velocity(&self, world: &PhysicsWorld) -> Vector3<f32> {
        self.body_handle
            .and_then(|h| world.body_velocity(h))
            .unwrap_or_else(Vector3::zeros)
    }

    fn set_velocity(&mut self, world: &mut PhysicsWorld, velocity: Vector3<f32>) {
        if let Some(body) = self.body_handle.and_then(|h| world.rigid_body_set.get_mut(h)) {
            body.set_linvel(vector![velocity.x, velocity.y, velocity.z], true);
        }
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

    fn step(&mut self, _world: &mut PhysicsWorld, _dt: f32) {
        // The engine integrates the requested linear velocity on its own.
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
        0.0
    }

    fn body_handle(&self) -> Option<RigidBodyHandle> {
        self.body_handle
    }
}
