//! Locomotion drivers: interchangeable physics backends for one character.
//!
//! A driver owns the character's body in the physics world and answers the
//! narrow capability set the orchestrator needs: velocity read/write, a
//! grounded query, raw positional moves and shape queries. Exactly one driver
//! is attached per character, chosen at setup time.

mod kinematic;
mod rigid_body;
mod sensor;

pub use kinematic::KinematicDriver;
pub use rigid_body::RigidBodyDriver;
pub use sensor::SensorDriver;

use nalgebra::{Point3, UnitQuaternion, Vector3};
use rapier3d::prelude::*;

use crate::config::ShapeConfig;
use crate::world::{PhysicsWorld, GROUP_CHARACTER, GROUP_STATIC};

/// Capability interface implemented by each physics backend.
pub trait LocomotionDriver {
    /// Binds the driver to the physics world: inserts the character body and
    /// collider at `position`. Must be called once before the first update.
    fn setup(&mut self, world: &mut PhysicsWorld, position: Point3<f32>);

    /// Backend-specific ground contact answer.
    fn is_grounded(&self, world: &PhysicsWorld) -> bool;

    /// Current world-space velocity.
    fn velocity(&self, world: &PhysicsWorld) -> Vector3<f32>;

    /// Requests a world-space velocity for the next physics step.
    fn set_velocity(&mut self, world: &mut PhysicsWorld, velocity: Vector3<f32>);

    /// Applies a raw positional delta (snapping, scripted shifts).
    fn move_delta(&mut self, world: &mut PhysicsWorld, delta: Vector3<f32>);

    fn position(&self, world: &PhysicsWorld) -> Point3<f32>;

    /// Teleports the body, bypassing collision response.
    fn set_position(&mut self, world: &mut PhysicsWorld, position: Point3<f32>);

    fn rotation(&self, world: &PhysicsWorld) -> UnitQuaternion<f32>;

    fn set_rotation(&mut self, world: &mut PhysicsWorld, rotation: UnitQuaternion<f32>);

    /// Per-physics-step work: applies the requested velocity to the body.
    /// Called by the orchestrator after the active policy has run, before
    /// `PhysicsWorld::step`.
    fn step(&mut self, world: &mut PhysicsWorld, dt: f32);

    /// Hint from the orchestrator that the character counts as grounded this
    /// tick. The sensor backend uses it to extend its probe range.
    fn set_extend_sensor_range(&mut self, _grounded: bool) {}

    /// Normal of the supporting surface, when the backend can measure one.
    fn ground_normal(&self, _world: &PhysicsWorld) -> Option<Vector3<f32>> {
        None
    }

    fn height(&self) -> f32;
    fn radius(&self) -> f32;
    /// Capsule center in character-local space.
    fn center(&self) -> Vector3<f32> {
        Vector3::new(0.0, self.height() / 2.0, 0.0)
    }
    fn set_height(&mut self, world: &mut PhysicsWorld, height: f32);
    /// Steepest walkable slope in degrees.
    fn slope_angle_limit(&self) -> f32;
    fn skin_width(&self) -> f32;

    /// Physics body handle, once setup has run.
    fn body_handle(&self) -> Option<RigidBodyHandle>;
}

/// Builds the character capsule collider shared by every backend.
/// Total height = 2 * half_height + 2 * radius; characters collide with
/// static geometry only.
fn build_capsule(shape: &ShapeConfig) -> Collider {
    let half_height = (shape.height - 2.0 * shape.radius).max(0.0) / 2.0;
    ColliderBuilder::capsule_y(half_height, shape.radius)
        .collision_groups(InteractionGroups::new(GROUP_CHARACTER, GROUP_STATIC))
        .build()
}

/// Inserts a character body + capsule and returns both handles.
fn insert_character_body(
    world: &mut PhysicsWorld,
    shape: &ShapeConfig,
    position: Point3<f32>,
    builder: RigidBodyBuilder,
) -> (RigidBodyHandle, ColliderHandle) {
    let body = builder
        .translation(vector![position.x, position.y, position.z])
        .build();
    let body_handle = world.rigid_body_set.insert(body);
    let collider_handle = world.collider_set.insert_with_parent(
        build_capsule(shape),
        body_handle,
        &mut world.rigid_body_set,
    );
    (body_handle, collider_handle)
}

/// Rebuilds the capsule for a new height, keeping the radius.
fn rebuild_capsule(
    world: &mut PhysicsWorld,
    body_handle: RigidBodyHandle,
    collider_handle: &mut ColliderHandle,
    shape: &ShapeConfig,
) {
    world.collider_set.remove(
        *collider_handle,
        &mut world.island_manager,
        &mut world.rigid_body_set,
        true,
    );
    *collider_handle = world.collider_set.insert_with_parent(
        build_capsule(shape),
        body_handle,
        &mut world.rigid_body_set,
    );
}
