//! Locomotion systems: interchangeable movement policies.
//!
//! Exactly one policy is active per character. Each tick the orchestrator
//! hands the active policy a [`PolicyContext`] and the policy computes a
//! target velocity and facing, writes them into the driver, and reports
//! which backend (driver or navigation agent) is authoritative this tick.

mod directional;
mod follow;
mod rotation;
mod target;

pub use directional::DirectionalPolicy;
pub use follow::FollowPolicy;
pub use rotation::RotationPolicy;
pub use target::TargetPolicy;

use crossbeam_channel::Sender;
use nalgebra::{Point3, UnitQuaternion, Vector3};

use crate::config::{FaceDirection, LocomotionConfig};
use crate::driver::LocomotionDriver;
use crate::locomotion::LocomotionEvent;
use crate::math;
use crate::nav::NavAgent;
use crate::world::PhysicsWorld;

/// Minimum arrival distance for point targets.
pub const STOP_THRESHOLD: f32 = 0.05;

/// Distance at which the target policy starts easing off toward the stop.
pub const SLOW_THRESHOLD: f32 = 1.0;

/// Which backend the orchestrator should treat as authoritative this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendHint {
    Driver,
    NavigationAgent,
}

/// Discriminant for policy switching; tags compare cheaper than types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Directional,
    Target,
    Follow,
    Rotation,
}

/// Per-tick references to external collaborators. Absent entries disable the
/// features that need them (camera facing, cursor facing).
#[derive(Debug, Clone, Copy, Default)]
pub struct TickHooks {
    /// Camera forward vector, for the CameraDirection facing policy.
    pub camera_forward: Option<Vector3<f32>>,
    /// Cursor ray (origin, direction), for the GroundPlaneCursor facing policy.
    pub cursor_ray: Option<(Point3<f32>, Vector3<f32>)>,
}

/// Everything a policy may touch during one update.
pub struct PolicyContext<'a> {
    pub config: &'a LocomotionConfig,
    pub driver: &'a mut dyn LocomotionDriver,
    pub world: &'a mut PhysicsWorld,
    pub nav: Option<&'a mut (dyn NavAgent + 'static)>,
    pub hooks: &'a TickHooks,
    /// Orchestrator-owned accumulated momentum (gravity + impulses).
    pub momentum: Vector3<f32>,
    /// Normal of the supporting surface from the last ground probe.
    pub terrain_normal: Vector3<f32>,
    /// Position faced under the Target facing policy.
    pub face_target: Option<Point3<f32>>,
    /// Composite grounded flag (driver contact or recent ground time).
    pub is_grounded: bool,
    /// Simulation clock in seconds.
    pub now: f32,
    pub dt: f32,
    pub events: &'a Sender<LocomotionEvent>,
}

impl PolicyContext<'_> {
    /// Facing policy after applying the higher-priority override.
    pub fn face_direction(&self) -> FaceDirection {
        self.config
            .override_face_direction
            .unwrap_or(self.config.face_direction)
    }
}

/// State shared by all policies: facing bookkeeping, slide state and the
/// transient dash.
#[derive(Debug, Clone)]
pub struct PolicyBase {
    pub aim_direction: Vector3<f32>,
    pub movement_direction: Vector3<f32>,
    pub pivot_speed: f32,
    pub is_sliding: bool,
    slide_direction: Vector3<f32>,
    pub is_dashing: bool,
    dash_velocity: Vector3<f32>,
    dash_start_time: f32,
    dash_duration: f32,
    dash_drag: f32,
}

impl Default for PolicyBase {
    fn default() -> Self {
        Self {
            aim_direction: Vector3::z(),
            movement_direction: Vector3::z(),
            pivot_speed: 0.0,
            is_sliding: false,
            slide_direction: Vector3::zeros(),
            is_dashing: false,
            dash_velocity: Vector3::zeros(),
            dash_start_time: -100.0,
            dash_duration: 0.0,
            dash_drag: 10.0,
        }
    }
}

impl PolicyBase {
    /// Starts a dash. The impulse is converted to an initial velocity such
    /// that the drag decay dissipates it over roughly the nominal duration.
    pub fn dash(
        &mut self,
        direction: Vector3<f32>,
        impulse: f32,
        duration: f32,
        drag: f32,
        now: f32,
        dt: f32,
    ) {
        let Some(unit) = direction.try_normalize(math::DIRECTION_EPSILON) else {
            return;
        };
        if dt <= 0.0 {
            return;
        }
        self.is_dashing = true;
        self.dash_start_time = now;
        self.dash_duration = duration;
        self.dash_drag = drag;
        self.dash_velocity = unit * (impulse * (1.0 / (dt * drag + 1.0)).ln() / -dt);
    }

    /// Advances the dash decay. Past the nominal duration the velocity decays
    /// by `v /= 1 + drag*dt`; the dash ends once it drops below run speed.
    pub fn tick_dash(&mut self, config: &LocomotionConfig, now: f32, dt: f32) {
        if !self.is_dashing {
            return;
        }
        if now >= self.dash_start_time + self.dash_duration {
            self.dash_velocity /= 1.0 + self.dash_drag * dt;
        }
        if self.dash_velocity.norm() < config.run_speed {
            self.is_dashing = false;
        }
    }

    pub fn dash_velocity(&self) -> Vector3<f32> {
        self.dash_velocity
    }

    pub fn slide_direction(&self) -> Vector3<f32> {
        self.slide_direction
    }

    /// Computes the facing for this tick and returns the rotation the driver
    /// should take, capped at `angular_speed * dt` degrees of turn.
    pub fn update_rotation(
        &mut self,
        ctx: &mut PolicyContext,
        target_direction: Vector3<f32>,
    ) -> UnitQuaternion<f32> {
        let current = ctx.driver.rotation(ctx.world);
        let mut target_rotation = current;
        self.aim_direction = current * Vector3::z();
        self.movement_direction = target_direction
            .try_normalize(math::DIRECTION_EPSILON)
            .unwrap_or(self.aim_direction);

        let max_degrees = ctx.config.angular_speed * ctx.dt;

        match ctx.face_direction() {
            FaceDirection::MovementDirection => {
                if target_direction.norm_squared() > math::DIRECTION_EPSILON {
                    let dst = math::look_rotation(target_direction);
                    self.aim_direction = dst * Vector3::z();
                    target_rotation = math::rotate_towards(current, dst, max_degrees);
                }
            }
            FaceDirection::CameraDirection => {
                if let Some(camera_forward) = ctx.hooks.camera_forward {
                    self.aim_direction = camera_forward;
                    let flat = math::horizontal(camera_forward);
                    if flat.norm_squared() > math::DIRECTION_EPSILON {
                        let dst = math::look_rotation(flat);
                        target_rotation = math::rotate_towards(current, dst, max_degrees);
                    }
                }
            }
            FaceDirection::Target => {
                if let Some(target) = ctx.face_target {
                    let direction = target - ctx.driver.position(ctx.world);
                    self.aim_direction = direction;
                    let flat = math::horizontal(direction);
                    if flat.norm_squared() > math::DIRECTION_EPSILON {
                        let dst = math::look_rotation(flat);
                        target_rotation = math::rotate_towards(current, dst, max_degrees);
                    }
                }
            }
            FaceDirection::GroundPlaneCursor => {
                if let Some((ray_origin, ray_direction)) = ctx.hooks.cursor_ray {
                    let position = ctx.driver.position(ctx.world);
                    if let Some(cursor) = math::ray_plane_intersection(
                        ray_origin,
                        ray_direction,
                        Vector3::y(),
                        position,
                    ) {
                        let ahead = math::move_towards(position, cursor, 1.0);
                        let flat = math::horizontal(ahead - position);
                        if flat.norm_squared() > math::DIRECTION_EPSILON {
                            let dst = math::look_rotation(flat);
                            self.aim_direction = dst * Vector3::z();
                            target_rotation = math::rotate_towards(current, dst, max_degrees);
                        }
                    }
                }
            }
        }

        target_rotation
    }

    /// Target planar speed this tick. Under the MovementDirection facing
    /// policy a character turning sharply slows down in proportion to the
    /// misalignment, floored at half speed.
    pub fn calculate_speed(&self, ctx: &PolicyContext, target_direction: Vector3<f32>) -> f32 {
        let mut target_speed = if ctx.config.can_run {
            ctx.config.run_speed
        } else {
            ctx.config.run_speed / 2.0
        };

        if ctx.face_direction() == FaceDirection::MovementDirection
            && target_direction.norm_squared() > math::DIRECTION_EPSILON
        {
            let src = ctx.driver.rotation(ctx.world);
            let dst = math::look_rotation(target_direction);
            let angle = math::angle_between_degrees(src, dst) / 180.0;
            let damp = (1.0 - angle).clamp(0.5, 1.0);
            target_speed *= damp;
        }

        target_speed
    }

    /// Rate-limited approach from the current planar speed to `target_speed`:
    /// at most `acceleration*dt` up or `deceleration*dt` down per tick, never
    /// crossing the target.
    pub fn accelerate(&self, ctx: &PolicyContext, target_speed: f32) -> f32 {
        let speed = math::horizontal(ctx.driver.velocity(ctx.world)).norm();
        let increment = ctx.config.acceleration * ctx.dt;
        let decrement = ctx.config.deceleration * ctx.dt;

        if speed < target_speed {
            target_speed.min(speed + increment)
        } else if speed > target_speed {
            target_speed.max(speed - decrement)
        } else {
            speed
        }
    }

    /// Slope-slide override: on walkably-grounded contact steeper than the
    /// driver's slope limit, movement is replaced by a downhill slide.
    pub fn update_sliding(&mut self, ctx: &PolicyContext) {
        let slope_angle = ctx.terrain_normal.angle(&Vector3::y()).to_degrees();
        self.is_sliding = ctx.is_grounded && slope_angle > ctx.driver.slope_angle_limit();

        if self.is_sliding {
            self.slide_direction =
                math::reflect(-Vector3::y(), ctx.terrain_normal) * ctx.config.run_speed;
        } else {
            self.slide_direction = Vector3::zeros();
        }
    }
}

/// The active movement policy, one of four kinds.
pub enum LocomotionPolicy {
    Directional(DirectionalPolicy),
    Target(TargetPolicy),
    Follow(FollowPolicy),
    Rotation(RotationPolicy),
}

impl LocomotionPolicy {
    pub fn kind(&self) -> PolicyKind {
        match self {
            LocomotionPolicy::Directional(_) => PolicyKind::Directional,
            LocomotionPolicy::Target(_) => PolicyKind::Target,
            LocomotionPolicy::Follow(_) => PolicyKind::Follow,
            LocomotionPolicy::Rotation(_) => PolicyKind::Rotation,
        }
    }

    /// Fresh policy of the requested kind.
    pub fn new(kind: PolicyKind) -> Self {
        match kind {
            PolicyKind::Directional => LocomotionPolicy::Directional(DirectionalPolicy::default()),
            PolicyKind::Target => LocomotionPolicy::Target(TargetPolicy::default()),
            PolicyKind::Follow => LocomotionPolicy::Follow(FollowPolicy::default()),
            PolicyKind::Rotation => LocomotionPolicy::Rotation(RotationPolicy::default()),
        }
    }

    pub fn base(&self) -> &PolicyBase {
        match self {
            LocomotionPolicy::Directional(p) => &p.base,
            LocomotionPolicy::Target(p) => &p.base,
            LocomotionPolicy::Follow(p) => &p.base,
            LocomotionPolicy::Rotation(p) => &p.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut PolicyBase {
        match self {
            LocomotionPolicy::Directional(p) => &mut p.base,
            LocomotionPolicy::Target(p) => &mut p.base,
            LocomotionPolicy::Follow(p) => &mut p.base,
            LocomotionPolicy::Rotation(p) => &mut p.base,
        }
    }

    /// Runs the policy for one tick.
    pub fn update(&mut self, ctx: &mut PolicyContext) -> BackendHint {
        match self {
            LocomotionPolicy::Directional(p) => p.update(ctx),
            LocomotionPolicy::Target(p) => p.update(ctx),
            LocomotionPolicy::Follow(p) => p.update(ctx),
            LocomotionPolicy::Rotation(p) => p.update(ctx),
        }
    }

    /// Teardown before the orchestrator replaces this policy.
    pub fn on_destroy(&mut self, nav: Option<&mut (dyn NavAgent + 'static)>) {
        if let Some(agent) = nav {
            agent.set_stopped(true);
        }
    }
}
