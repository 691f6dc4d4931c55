//! Character locomotion orchestrator.
//!
//! [`CharacterLocomotion`] owns the active movement policy and the attached
//! physics driver, runs the per-tick pipeline (ground state machine, gravity,
//! policy, driver step, snapshot) and exposes the character-facing API:
//! steering commands, jumps, dashes, momentum impulses and teleports.
//!
//! Per-tick order matters: the ground state machine reads last tick's
//! momentum, gravity integrates after it, the policy runs on the result and
//! the snapshot is captured once the driver has applied everything.

use crossbeam_channel::{unbounded, Receiver, Sender};
use nalgebra::{Point3, UnitQuaternion, Vector3};
use rapier3d::prelude::RigidBodyHandle;

use crate::config::CharacterConfig;
use crate::driver::LocomotionDriver;
use crate::math;
use crate::nav::NavAgent;
use crate::state::CharacterState;
use crate::system::{
    BackendHint, LocomotionPolicy, PolicyContext, PolicyKind, TickHooks, STOP_THRESHOLD,
};
use crate::world::{PhysicsWorld, TIMESTEP};

/// Window after losing ground contact in which a jump is still accepted.
pub const JUMP_COYOTE_TIME: f32 = 0.3;
/// Grace window in which a character still counts as grounded after the
/// driver loses contact (stairs, ledge lips).
pub const GROUND_TIME_OFFSET: f32 = 0.1;
/// Vertical momentum above this counts as rising rather than settled.
const RISING_EPSILON: f32 = 0.001;

/// Vertical phase of the character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroundState {
    Grounded,
    Rising,
    Falling,
}

/// Edge-triggered notifications emitted by the orchestrator and the active
/// policy. Delivered through a crossbeam channel so gameplay code can react
/// off the tick path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocomotionEvent {
    /// A jump was executed; `chain` is the position in the air-jump chain,
    /// starting at 1 for the grounded jump.
    Jumped { chain: u32 },
    /// Ground contact regained after rising or falling.
    Landed,
    /// Ground contact lost (jump, ledge, launch).
    GroundLost,
    /// A point target was reached by the target policy.
    DestinationReached,
    /// Controllability toggled.
    ControllableChanged(bool),
}

/// Drives one character: policy in, velocity and facing out.
pub struct CharacterLocomotion {
    config: CharacterConfig,
    driver: Box<dyn LocomotionDriver>,
    nav: Option<Box<dyn NavAgent>>,
    policy: LocomotionPolicy,

    ground_state: GroundState,
    momentum: Vector3<f32>,
    terrain_normal: Vector3<f32>,
    face_target: Option<Point3<f32>>,
    is_controllable: bool,

    now: f32,
    last_grounded_time: f32,
    last_jump_time: f32,
    jump_chain: u32,

    state: CharacterState,
    events_tx: Sender<LocomotionEvent>,
    events_rx: Receiver<LocomotionEvent>,
}

impl CharacterLocomotion {
    /// Creates a character at `position`, inserting the driver's body into
    /// the world. Starts with the directional policy and no steering input.
    pub fn new(
        config: CharacterConfig,
        mut driver: Box<dyn LocomotionDriver>,
        world: &mut PhysicsWorld,
        position: Point3<f32>,
    ) -> Self {
        driver.setup(world, position);
        let (events_tx, events_rx) = unbounded();
        Self {
            config,
            driver,
            nav: None,
            policy: LocomotionPolicy::new(PolicyKind::Directional),
            ground_state: GroundState::Falling,
            momentum: Vector3::zeros(),
            terrain_normal: Vector3::y(),
            face_target: None,
            is_controllable: true,
            now: 0.0,
            last_grounded_time: -100.0,
            last_jump_time: -100.0,
            jump_chain: 0,
            state: CharacterState::default(),
            events_tx,
            events_rx,
        }
    }

    /// Attaches a navigation agent, sized to the character shape and warped
    /// to its current position.
    pub fn set_nav_agent(&mut self, world: &PhysicsWorld, mut agent: Box<dyn NavAgent>) {
        agent.configure(
            self.driver.radius(),
            self.driver.height(),
            self.config.locomotion.acceleration,
        );
        agent.warp(self.driver.position(world));
        agent.set_enabled(false);
        self.nav = Some(agent);
    }

    /// Advances the character by one tick. Call once per frame before
    /// `PhysicsWorld::step`.
    pub fn update(&mut self, world: &mut PhysicsWorld, hooks: &TickHooks, dt: f32) {
        self.now += dt;

        let driver_grounded = self.driver.is_grounded(world);
        if driver_grounded {
            self.last_grounded_time = self.now;
        }
        let grounded = self.now < self.last_grounded_time + GROUND_TIME_OFFSET;

        self.transition_ground_state(grounded);
        self.driver.set_extend_sensor_range(grounded);

        // Gravity integrates into momentum; contact zeroes it only while the
        // character is not being launched upward.
        self.momentum.y += self.config.locomotion.gravity * dt;
        if driver_grounded && self.momentum.y <= 0.0 {
            self.momentum.y = 0.0;
        }
        self.momentum.y = self.momentum.y.max(self.config.locomotion.max_fall_speed);

        let hint = if self.is_controllable {
            let mut ctx = PolicyContext {
                config: &self.config.locomotion,
                driver: &mut *self.driver,
                world,
                nav: self.nav.as_deref_mut(),
                hooks,
                momentum: self.momentum,
                terrain_normal: self.terrain_normal,
                face_target: self.face_target,
                is_grounded: grounded,
                now: self.now,
                dt,
                events: &self.events_tx,
            };
            self.policy.update(&mut ctx)
        } else {
            // Uncontrollable characters keep falling but take no steering.
            let vertical = Vector3::new(0.0, self.momentum.y, 0.0);
            self.driver.set_velocity(world, vertical);
            BackendHint::Driver
        };

        self.driver.step(world, dt);

        // While the navigation agent steers, the driver only follows its
        // horizontal track. `move_delta` keeps the ground probe intact and the
        // driver still owns the vertical axis through its own step above.
        let mut nav_velocity = None;
        if hint == BackendHint::NavigationAgent {
            if let Some(agent) = self.nav.as_deref_mut() {
                agent.step(dt);
                let delta = agent.position() - self.driver.position(world);
                self.driver.move_delta(world, math::horizontal(delta));
                nav_velocity = Some(agent.velocity());
            }
        }

        self.terrain_normal = self
            .driver
            .ground_normal(world)
            .unwrap_or_else(Vector3::y);

        let base = self.policy.base();
        self.state = CharacterState::capture(
            nav_velocity.unwrap_or_else(|| self.driver.velocity(world)),
            self.driver.rotation(world),
            base.pivot_speed,
            grounded,
            base.is_sliding,
            base.is_dashing,
            self.driver.ground_normal(world),
        );
    }

    fn transition_ground_state(&mut self, grounded: bool) {
        let next = if grounded && self.momentum.y <= RISING_EPSILON {
            GroundState::Grounded
        } else if self.momentum.y > RISING_EPSILON {
            GroundState::Rising
        } else {
            GroundState::Falling
        };

        if next == self.ground_state {
            return;
        }

        log::debug!("ground state {:?} -> {:?}", self.ground_state, next);
        if next == GroundState::Grounded {
            self.jump_chain = 0;
            let _ = self.events_tx.send(LocomotionEvent::Landed);
        } else if self.ground_state == GroundState::Grounded {
            let _ = self.events_tx.send(LocomotionEvent::GroundLost);
        }
        self.ground_state = next;
    }

    // ---- steering commands ----------------------------------------------

    /// Steers with a world-space direction under the directional policy.
    pub fn set_direction(&mut self, direction: Vector3<f32>) {
        self.ensure_policy(PolicyKind::Directional);
        if let LocomotionPolicy::Directional(p) = &mut self.policy {
            p.set_direction(direction);
        }
    }

    /// Walks to a world-space point. `final_facing` is adopted on arrival.
    pub fn set_target(
        &mut self,
        position: Point3<f32>,
        final_facing: Option<Vector3<f32>>,
        stop_threshold: f32,
    ) {
        self.ensure_policy(PolicyKind::Target);
        if let LocomotionPolicy::Target(p) = &mut self.policy {
            p.set_target(position, final_facing, stop_threshold);
        }
    }

    /// Walks to whatever scene geometry a ray hits (point-and-click). A miss
    /// stops the character in place.
    pub fn set_target_from_ray(
        &mut self,
        world: &PhysicsWorld,
        ray_origin: Point3<f32>,
        ray_direction: Vector3<f32>,
        final_facing: Option<Vector3<f32>>,
    ) {
        self.ensure_policy(PolicyKind::Target);
        if let LocomotionPolicy::Target(p) = &mut self.policy {
            p.set_target_from_ray(world, ray_origin, ray_direction, final_facing, STOP_THRESHOLD);
        }
    }

    /// Follows another body, keeping within the `[min_radius, max_radius]`
    /// band.
    pub fn follow(
        &mut self,
        target: RigidBodyHandle,
        min_radius: f32,
        max_radius: f32,
    ) {
        let use_navigation = self.config.locomotion.use_navigation_mesh && self.nav.is_some();
        self.ensure_policy(PolicyKind::Follow);
        if let LocomotionPolicy::Follow(p) = &mut self.policy {
            p.set_follow(target, min_radius, max_radius, use_navigation);
        }
    }

    /// Turns in place toward a world-space direction without translating.
    pub fn set_rotation_direction(&mut self, direction: Vector3<f32>) {
        self.ensure_policy(PolicyKind::Rotation);
        if let LocomotionPolicy::Rotation(p) = &mut self.policy {
            p.set_direction(direction);
        }
    }

    /// Halts under the target policy, optionally adopting a final facing.
    pub fn stop(&mut self, final_facing: Option<Vector3<f32>>) {
        self.ensure_policy(PolicyKind::Target);
        if let LocomotionPolicy::Target(p) = &mut self.policy {
            p.stop(final_facing);
        }
    }

    fn ensure_policy(&mut self, kind: PolicyKind) {
        if self.policy.kind() == kind {
            return;
        }
        self.policy.on_destroy(self.nav.as_deref_mut());
        self.policy = LocomotionPolicy::new(kind);
    }

    // ---- impulses --------------------------------------------------------

    /// Attempts a jump with `force` (or the configured jump force). Returns
    /// the position in the jump chain when accepted: grounded jumps (within
    /// the coyote window) start the chain, further air jumps continue it up
    /// to the configured count, and a cooldown separates consecutive jumps.
    pub fn jump(&mut self, force: Option<f32>) -> Option<u32> {
        if !self.config.locomotion.can_jump || !self.is_controllable {
            return None;
        }
        if self.now < self.last_jump_time + self.config.locomotion.time_between_jumps {
            return None;
        }
        if self.jump_chain >= self.config.locomotion.jump_times {
            return None;
        }
        let grounded_recently = self.now < self.last_grounded_time + JUMP_COYOTE_TIME;
        if !grounded_recently && self.jump_chain == 0 {
            return None;
        }

        self.momentum.y = force.unwrap_or(self.config.locomotion.jump_force);
        self.jump_chain += 1;
        self.last_jump_time = self.now;
        log::debug!("jump accepted, chain {}", self.jump_chain);
        let _ = self.events_tx.send(LocomotionEvent::Jumped {
            chain: self.jump_chain,
        });
        Some(self.jump_chain)
    }

    /// Starts a dash. Directional steering is cleared so the dash velocity
    /// is not fought by the regular ramp.
    pub fn dash(&mut self, direction: Vector3<f32>, impulse: f32, duration: f32, drag: f32) {
        if let LocomotionPolicy::Directional(p) = &mut self.policy {
            p.set_direction(Vector3::zeros());
        }
        self.policy
            .base_mut()
            .dash(direction, impulse, duration, drag, self.now, TIMESTEP);
    }

    /// Adds a world-space impulse to the accumulated momentum. An upward
    /// impulse while grounded launches the character.
    pub fn add_momentum(&mut self, impulse: Vector3<f32>) {
        self.momentum += impulse;
    }

    // ---- body manipulation ----------------------------------------------

    /// Teleports the character, re-warping the navigation agent.
    pub fn teleport(&mut self, world: &mut PhysicsWorld, position: Point3<f32>) {
        self.driver.set_position(world, position);
        if let Some(agent) = self.nav.as_deref_mut() {
            agent.warp(position);
        }
    }

    /// Resizes the capsule (crouch, morph), keeping the radius.
    pub fn change_height(&mut self, world: &mut PhysicsWorld, height: f32) {
        self.driver.set_height(world, height);
        if let Some(agent) = self.nav.as_deref_mut() {
            agent.configure(
                self.driver.radius(),
                height,
                self.config.locomotion.acceleration,
            );
        }
    }

    /// Position faced under the Target facing policy.
    pub fn set_face_target(&mut self, target: Option<Point3<f32>>) {
        self.face_target = target;
    }

    pub fn set_is_controllable(&mut self, value: bool) {
        if self.is_controllable == value {
            return;
        }
        self.is_controllable = value;
        if !value {
            // Stale stick input must not resume on its own when control
            // returns.
            if let LocomotionPolicy::Directional(p) = &mut self.policy {
                p.set_direction(Vector3::zeros());
            }
        }
        let _ = self
            .events_tx
            .send(LocomotionEvent::ControllableChanged(value));
    }

    // ---- accessors -------------------------------------------------------

    pub fn is_controllable(&self) -> bool {
        self.is_controllable
    }

    pub fn ground_state(&self) -> GroundState {
        self.ground_state
    }

    pub fn is_grounded(&self) -> bool {
        self.ground_state == GroundState::Grounded
    }

    pub fn momentum(&self) -> Vector3<f32> {
        self.momentum
    }

    /// Direction the character intends to face (may tilt out of plane under
    /// camera or target facing).
    pub fn aim_direction(&self) -> Vector3<f32> {
        self.policy.base().aim_direction
    }

    /// Direction the character intends to move, horizontal and normalized.
    pub fn movement_direction(&self) -> Vector3<f32> {
        self.policy.base().movement_direction
    }

    pub fn policy_kind(&self) -> PolicyKind {
        self.policy.kind()
    }

    /// Snapshot from the most recent tick.
    pub fn state(&self) -> &CharacterState {
        &self.state
    }

    pub fn position(&self, world: &PhysicsWorld) -> Point3<f32> {
        self.driver.position(world)
    }

    pub fn rotation(&self, world: &PhysicsWorld) -> UnitQuaternion<f32> {
        self.driver.rotation(world)
    }

    pub fn body_handle(&self) -> Option<RigidBodyHandle> {
        self.driver.body_handle()
    }

    pub fn config(&self) -> &CharacterConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut CharacterConfig {
        &mut self.config
    }

    /// The attached navigation agent, if any.
    pub fn nav_agent(&self) -> Option<&dyn NavAgent> {
        self.nav.as_deref()
    }

    /// Receiver for locomotion events; clone it freely.
    pub fn events(&self) -> Receiver<LocomotionEvent> {
        self.events_rx.clone()
    }
}
