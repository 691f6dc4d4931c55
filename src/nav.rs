//! Navigation agent boundary.
//!
//! Pathfinding is an external collaborator: the Follow policy can delegate
//! steering to an agent, and the orchestrator re-warps it on teleports. The
//! trait is the narrow contract; [`StraightLineAgent`] is a dependency-free
//! reference implementation used by the demo binary and tests.

use nalgebra::{Point3, Vector3};

use crate::math;

/// Contract a pathfinding backend must satisfy.
pub trait NavAgent {
    /// Adopts the character's collision shape and acceleration.
    fn configure(&mut self, radius: f32, height: f32, acceleration: f32);
    fn set_enabled(&mut self, enabled: bool);
    fn is_enabled(&self) -> bool;
    /// Pauses steering while keeping the current path.
    fn set_stopped(&mut self, stopped: bool);
    fn set_destination(&mut self, destination: Point3<f32>);
    fn set_speed(&mut self, speed: f32);
    fn set_angular_speed(&mut self, degrees_per_second: f32);
    fn position(&self) -> Point3<f32>;
    fn velocity(&self) -> Vector3<f32>;
    fn remaining_distance(&self) -> f32;
    /// Forces the agent to a position, discarding the current path.
    fn warp(&mut self, position: Point3<f32>);
    /// True while traversing a link between mesh surfaces (jumps, drops).
    fn is_traversing_link(&self) -> bool {
        false
    }
    /// Advances the agent's own steering by one tick.
    fn step(&mut self, dt: f32);
}

/// Agent that walks straight toward its destination, ignoring obstacles.
pub struct StraightLineAgent {
    position: Point3<f32>,
    destination: Option<Point3<f32>>,
    velocity: Vector3<f32>,
    speed: f32,
    enabled: bool,
    stopped: bool,
}

impl StraightLineAgent {
    pub fn new(position: Point3<f32>) -> Self {
        Self {
            position,
            destination: None,
            velocity: Vector3::zeros(),
            speed: 0.0,
            enabled: false,
            stopped: true,
        }
    }
}

impl NavAgent for StraightLineAgent {
    fn configure(&mut self, _radius: f32, _height: f32, _acceleration: f32) {}

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.velocity = Vector3::zeros();
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_stopped(&mut self, stopped: bool) {
        self.stopped = stopped;
        if stopped {
            self.velocity = Vector3::zeros();
        }
    }

    fn set_destination(&mut self, destination: Point3<f32>) {
        self.destination = Some(destination);
    }

    fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    fn set_angular_speed(&mut self, _degrees_per_second: f32) {}

    fn position(&self) -> Point3<f32> {
        self.position
    }

    fn velocity(&self) -> Vector3<f32> {
        self.velocity
    }

    fn remaining_distance(&self) -> f32 {
        self.destination
            .map(|d| (d - self.position).norm())
            .unwrap_or(0.0)
    }

    fn warp(&mut self, position: Point3<f32>) {
        self.position = position;
        self.velocity = Vector3::zeros();
    }

    fn step(&mut self, dt: f32) {
        if !self.enabled || self.stopped {
            return;
        }
        let Some(destination) = self.destination else {
            return;
        };
        let before = self.position;
        self.position = math::move_towards(before, destination, self.speed * dt);
        self.velocity = if dt > 0.0 {
            (self.position - before) / dt
        } else {
            Vector3::zeros()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moves_toward_destination_when_enabled() {
        let mut agent = StraightLineAgent::new(Point3::origin());
        agent.set_destination(Point3::new(0.0, 0.0, 10.0));
        agent.set_speed(2.0);
        agent.set_enabled(true);
        agent.set_stopped(false);

        agent.step(0.5);
        assert_eq!(agent.position(), Point3::new(0.0, 0.0, 1.0));
        assert_eq!(agent.velocity(), Vector3::new(0.0, 0.0, 2.0));
        assert!((agent.remaining_distance() - 9.0).abs() < 1.0e-5);
    }

    #[test]
    fn test_stopped_agent_does_not_move() {
        let mut agent = StraightLineAgent::new(Point3::origin());
        agent.set_destination(Point3::new(5.0, 0.0, 0.0));
        agent.set_speed(2.0);
        agent.set_enabled(true);
        agent.set_stopped(true);

        agent.step(1.0);
        assert_eq!(agent.position(), Point3::origin());
        assert_eq!(agent.velocity(), Vector3::zeros());
    }

    #[test]
    fn test_warp_discards_velocity() {
        let mut agent = StraightLineAgent::new(Point3::origin());
        agent.set_destination(Point3::new(5.0, 0.0, 0.0));
        agent.set_speed(2.0);
        agent.set_enabled(true);
        agent.set_stopped(false);
        agent.step(1.0);

        agent.warp(Point3::new(9.0, 0.0, 9.0));
        assert_eq!(agent.position(), Point3::new(9.0, 0.0, 9.0));
        assert_eq!(agent.velocity(), Vector3::zeros());
    }
}
