//! Engine controller driver: a kinematic body moved through Rapier's
//! `KinematicCharacterController`, which supplies collide-and-slide,
//! autostep, ground snapping and the native grounded flag.

use nalgebra::{Point3, UnitQuaternion, Vector3};
use rapier3d::control::{CharacterAutostep, CharacterLength, KinematicCharacterController};
use rapier3d::prelude::*;

use super::{insert_character_body, rebuild_capsule, LocomotionDriver};
use crate::config::ShapeConfig;
use crate::world::{PhysicsWorld, GROUP_CHARACTER, GROUP_STATIC};

/// Distance the controller may pull the capsule down to stay glued to ground.
const SNAP_TO_GROUND: f32 = 0.2;

/// Autostep minimum width, small so platform edges still count.
const AUTOSTEP_MIN_WIDTH: f32 = 0.01;

/// Controller gap to surrounding geometry. Larger offset prevents getting
/// stuck when sliding against surfaces.
const CONTROLLER_OFFSET: f32 = 0.05;

/// Slopes steeper than this start sliding the capsule.
const MIN_SLOPE_SLIDE_ANGLE: f32 = 30.0;

/// Downward speed folded into non-rising moves so the capsule keeps a live
/// floor contact instead of hovering at the offset boundary, where
/// `move_shape` degenerates to a zero translation.
const GROUND_PRESS_SPEED: f32 = 1.0;

pub struct KinematicDriver {
    shape: ShapeConfig,
    body_handle: Option<RigidBodyHandle>,
    collider_handle: Option<ColliderHandle>,
    requested_velocity: Vector3<f32>,
    measured_velocity: Vector3<f32>,
    grounded: bool,
}

impl KinematicDriver {
    pub fn new(shape: ShapeConfig) -> Self {
        Self {
            shape,
            body_handle: None,
            collider_handle: None,
            requested_velocity: Vector3::zeros(),
            measured_velocity: Vector3::zeros(),
            grounded: false,
        }
    }

    /// Fresh controller each step, configured from the character shape.
    fn controller(&self) -> KinematicCharacterController {
        KinematicCharacterController {
            offset: CharacterLength::Absolute(CONTROLLER_OFFSET),
            autostep: Some(CharacterAutostep {
                max_height: CharacterLength::Absolute(self.shape.step_height),
                min_width: CharacterLength::Absolute(AUTOSTEP_MIN_WIDTH),
                include_dynamic_bodies: true,
            }),
            max_slope_climb_angle: self.shape.slope_angle_limit.to_radians(),
            min_slope_slide_angle: MIN_SLOPE_SLIDE_ANGLE.to_radians(),
            snap_to_ground: Some(CharacterLength::Absolute(SNAP_TO_GROUND)),
            ..Default::default()
        }
    }
}

impl LocomotionDriver for KinematicDriver {
    fn setup(&mut self, world: &mut PhysicsWorld, position: Point3<f32>) {
        let builder = RigidBodyBuilder::kinematic_position_based();
        let (body, collider) = insert_character_body(world, &self.shape, position, builder);
        self.body_handle = Some(body);
        self.collider_handle = Some(collider);
    }

    fn is_grounded(&self, _world: &PhysicsWorld) -> bool {
        self.grounded
    }

    fn velocity(&self, _world: &PhysicsWorld) -> Vector3<f32> {
        self.measured_velocity
    }

    fn set_velocity(&mut self, _world: &mut PhysicsWorld, velocity: Vector3<f32>) {
        self.requested_velocity = velocity;
    }

    fn move_delta(&mut self, world: &mut PhysicsWorld, delta: Vector3<f32>) {
        if let Some(body) = self.body_handle.and_then(|h| world.rigid_body_set.get_mut(h)) {
            let next = body.translation() + vector![delta.x, delta.y, delta.z];
            body.set_next_kinematic_translation(next);
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
        self.measured_velocity = Vector3::zeros();
    }

    fn rotation(&self, world: &PhysicsWorld) -> UnitQuaternion<f32> {
        self.body_handle
            .and_then(|h| world.rigid_body_set.get(h))
            .map(|body| *body.rotation())
            .unwrap_or_else(UnitQuaternion::identity)
    }

    fn set_rotation(&mut self, world: &mut PhysicsWorld, rotation: UnitQuaternion<f32>) {
        if let Some(body) = self.body_handle.and_then(|h| world.rigid_body_set.get_mut(h)) {
            body.set_next_kinematic_rotation(rotation);
        }
    }

    fn step(&mut self, world: &mut PhysicsWorld, dt: f32) {
        let (Some(body_handle), Some(collider_handle)) = (self.body_handle, self.collider_handle)
        else {
            return;
        };
        if dt <= 0.0 {
            return;
        }

        let mut desired = self.requested_velocity * dt;
        if self.requested_velocity.y <= 0.0 {
            desired.y -= GROUND_PRESS_SPEED * dt;
        }
        let movement = {
            let Some(body) = world.rigid_body_set.get(body_handle) else {
                return;
            };
            let Some(collider) = world.collider_set.get(collider_handle) else {
                return;
            };
            let current_pos = *body.position();
            let filter = QueryFilter::default()
                .exclude_rigid_body(body_handle)
                .exclude_sensors()
                .groups(InteractionGroups::new(
                    GROUP_STATIC,
                    Group::ALL & !GROUP_CHARACTER,
                ));

            self.controller().move_shape(
                dt,
                &world.rigid_body_set,
                &world.collider_set,
                &world.query_pipeline,
                collider.shape(),
                &current_pos,
                vector![desired.x, desired.y, desired.z],
                filter,
                |_collision| {},
            )
        };

        if let Some(body) = world.rigid_body_set.get_mut(body_handle) {
            let next = body.translation() + movement.translation;
            body.set_next_kinematic_translation(next);
        }
        self.measured_velocity = Vector3::new(
            movement.translation.x,
            movement.translation.y,
            movement.translation.z,
        ) / dt;
        self.grounded = movement.grounded;
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
