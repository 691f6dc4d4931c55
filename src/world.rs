//! Wrapper around the Rapier3D physics world.
//!
//! Owns the rigid body and collider sets plus the query pipeline that drivers
//! use for ground probes. Level geometry goes in through `add_block`/`add_ramp`;
//! character bodies are inserted by their locomotion drivers.

use nalgebra::{Point3, UnitQuaternion, Vector3};
use rapier3d::prelude::*;

/// Default world gravity magnitude (units/s^2). Character gravity is handled
/// by the orchestrator's momentum, so driver bodies opt out via gravity scale.
pub const DEFAULT_GRAVITY: f32 = 9.81;

/// Fixed simulation timestep the demo binary and tests step at (60 Hz).
pub const TIMESTEP: f32 = 1.0 / 60.0;

/// Static level geometry: floors, walls, ramps.
pub const GROUP_STATIC: Group = Group::GROUP_1;
/// Character capsules. Characters collide with static geometry only.
pub const GROUP_CHARACTER: Group = Group::GROUP_2;

/// Result of a downward ground probe.
#[derive(Debug, Clone, Copy)]
pub struct GroundHit {
    pub distance: f32,
    pub point: Point3<f32>,
    pub normal: Vector3<f32>,
}

pub struct PhysicsWorld {
    pub gravity: Vector<Real>,
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub integration_parameters: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    pub query_pipeline: QueryPipeline,
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self {
            gravity: vector![0.0, -DEFAULT_GRAVITY, 0.0],
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    pub fn set_gravity(&mut self, gravity_y: f32) {
        self.gravity = vector![0.0, gravity_y, 0.0];
    }

    /// Steps the physics simulation forward by dt seconds.
    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    /// Refreshes the query pipeline so raycasts and shape casts see the
    /// current collider positions. Call before driver updates each tick.
    pub fn update_queries(&mut self) {
        self.query_pipeline.update(&self.collider_set);
    }

    /// Adds an axis-aligned static block (kinematic body, cuboid collider).
    pub fn add_block(&mut self, position: Point3<f32>, size: Vector3<f32>) -> RigidBodyHandle {
        self.add_block_rotated(position, size, UnitQuaternion::identity())
    }

    /// Adds a static block with an arbitrary orientation.
    pub fn add_block_rotated(
        &mut self,
        position: Point3<f32>,
        size: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
    ) -> RigidBodyHandle {
        let body = RigidBodyBuilder::kinematic_position_based()
            .translation(vector![position.x, position.y, position.z])
            .rotation(rotation.scaled_axis())
            .build();
        let handle = self.rigid_body_set.insert(body);
        let collider = ColliderBuilder::cuboid(size.x / 2.0, size.y / 2.0, size.z / 2.0)
            .collision_groups(InteractionGroups::new(GROUP_STATIC, Group::ALL))
            .build();
        self.collider_set
            .insert_with_parent(collider, handle, &mut self.rigid_body_set);
        handle
    }

    /// Adds a static ramp: a triangular prism whose slope rises from +X
    /// toward -X.
    pub fn add_ramp(&mut self, position: Point3<f32>, size: Vector3<f32>) -> RigidBodyHandle {
        let hx = size.x / 2.0;
        let hy = size.y / 2.0;
        let hz = size.z / 2.0;
        let points = [
            point![-hx, -hy, -hz],
            point![hx, -hy, -hz],
            point![-hx, -hy, hz],
            point![hx, -hy, hz],
            point![-hx, hy, -hz],
            point![-hx, hy, hz],
        ];
        let shape = SharedShape::convex_hull(&points)
            .expect("ramp convex hull should always succeed with 6 valid vertices");
        let body = RigidBodyBuilder::kinematic_position_based()
            .translation(vector![position.x, position.y, position.z])
            .build();
        let handle = self.rigid_body_set.insert(body);
        let collider = ColliderBuilder::new(shape)
            .collision_groups(InteractionGroups::new(GROUP_STATIC, Group::ALL))
            .build();
        self.collider_set
            .insert_with_parent(collider, handle, &mut self.rigid_body_set);
        handle
    }

    /// Removes a body and its colliders.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
    }

    pub fn body_position(&self, handle: RigidBodyHandle) -> Option<Point3<f32>> {
        self.rigid_body_set.get(handle).map(|body| {
            let t = body.translation();
            Point3::new(t.x, t.y, t.z)
        })
    }

    pub fn body_velocity(&self, handle: RigidBodyHandle) -> Option<Vector3<f32>> {
        self.rigid_body_set.get(handle).map(|body| {
            let v = body.linvel();
            Vector3::new(v.x, v.y, v.z)
        })
    }

    /// Schedules a new position for a kinematic body (moving platforms,
    /// follow-target markers).
    pub fn set_kinematic_position(&mut self, handle: RigidBodyHandle, position: Point3<f32>) {
        if let Some(body) = self.rigid_body_set.get_mut(handle) {
            if body.is_kinematic() {
                body.set_next_kinematic_translation(vector![position.x, position.y, position.z]);
            }
        }
    }

    /// Casts a ray against static geometry, excluding `exclude_body`.
    /// Returns distance along the ray and the hit point.
    pub fn cast_ray(
        &self,
        origin: Point3<f32>,
        direction: Vector3<f32>,
        max_distance: f32,
        exclude_body: Option<RigidBodyHandle>,
    ) -> Option<(f32, Point3<f32>)> {
        let ray = Ray::new(
            point![origin.x, origin.y, origin.z],
            vector![direction.x, direction.y, direction.z],
        );
        let mut filter = QueryFilter::default().exclude_sensors();
        if let Some(body) = exclude_body {
            filter = filter.exclude_rigid_body(body);
        }
        let (_, toi) = self.query_pipeline.cast_ray(
            &self.rigid_body_set,
            &self.collider_set,
            &ray,
            max_distance,
            true,
            filter,
        )?;
        let hit = ray.point_at(toi);
        Some((toi, Point3::new(hit.x, hit.y, hit.z)))
    }

    /// Casts a downward ray and reports the surface normal along with the hit.
    /// This is the ground probe used by the sensor driver.
    pub fn probe_ground(
        &self,
        origin: Point3<f32>,
        max_distance: f32,
        exclude_body: Option<RigidBodyHandle>,
    ) -> Option<GroundHit> {
        let ray = Ray::new(point![origin.x, origin.y, origin.z], vector![0.0, -1.0, 0.0]);
        let mut filter = QueryFilter::default().exclude_sensors();
        if let Some(body) = exclude_body {
            filter = filter.exclude_rigid_body(body);
        }
        let (_, intersection) = self.query_pipeline.cast_ray_and_get_normal(
            &self.rigid_body_set,
            &self.collider_set,
            &ray,
            max_distance,
            true,
            filter,
        )?;
        let distance = intersection.time_of_impact;
        let point = ray.point_at(distance);
        let n = intersection.normal;
        Some(GroundHit {
            distance,
            point: Point3::new(point.x, point.y, point.z),
            normal: Vector3::new(n.x, n.y, n.z),
        })
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_ground_finds_floor() {
        let mut world = PhysicsWorld::new();
        world.add_block(Point3::new(0.0, -0.5, 0.0), Vector3::new(100.0, 1.0, 100.0));
        world.step(TIMESTEP);
        world.update_queries();

        let hit = world
            .probe_ground(Point3::new(0.0, 5.0, 0.0), 10.0, None)
            .expect("should detect floor");
        // Floor top at y=0, origin at y=5.
        assert!((hit.distance - 5.0).abs() < 0.01, "distance {}", hit.distance);
        assert!(hit.normal.y > 0.99, "normal {:?}", hit.normal);
    }

    #[test]
    fn test_probe_ground_reports_ramp_normal() {
        let mut world = PhysicsWorld::new();
        // Slope rises from +X to -X; over the sloped face the normal tilts in +X.
        world.add_ramp(Point3::new(0.0, 0.0, 0.0), Vector3::new(4.0, 4.0, 4.0));
        world.step(TIMESTEP);
        world.update_queries();

        let hit = world
            .probe_ground(Point3::new(0.5, 5.0, 0.0), 10.0, None)
            .expect("should hit ramp slope");
        assert!(hit.normal.y > 0.1 && hit.normal.x > 0.1, "normal {:?}", hit.normal);
    }

    #[test]
    fn test_probe_ground_misses_when_out_of_range() {
        let mut world = PhysicsWorld::new();
        world.add_block(Point3::new(0.0, -20.0, 0.0), Vector3::new(10.0, 1.0, 10.0));
        world.step(TIMESTEP);
        world.update_queries();

        assert!(world
            .probe_ground(Point3::new(0.0, 0.0, 0.0), 5.0, None)
            .is_none());
    }

    #[test]
    fn test_kinematic_platform_moves() {
        let mut world = PhysicsWorld::new();
        let platform = world.add_block(Point3::new(0.0, 0.0, 0.0), Vector3::new(4.0, 1.0, 4.0));
        world.set_kinematic_position(platform, Point3::new(0.0, 2.0, 0.0));
        world.step(TIMESTEP);

        let pos = world.body_position(platform).unwrap();
        assert!((pos.y - 2.0).abs() < 1.0e-4);
    }
}
