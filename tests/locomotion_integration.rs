//! End-to-end locomotion tests: a full character (orchestrator + policy +
//! sensor driver) running against real physics geometry. These exercise the
//! tick pipeline as a consumer would, not individual modules.

use nalgebra::{vector, Point3, Vector3};

use locomotor::config::CharacterConfig;
use locomotor::driver::SensorDriver;
use locomotor::locomotion::{CharacterLocomotion, GroundState, LocomotionEvent};
use locomotor::nav::StraightLineAgent;
use locomotor::system::TickHooks;
use locomotor::world::PhysicsWorld;

const DT: f32 = 0.02;

fn world_with_floor() -> PhysicsWorld {
    let mut world = PhysicsWorld::new();
    world.add_block(Point3::new(0.0, -0.5, 0.0), vector![100.0, 1.0, 100.0]);
    world.update_queries();
    world
}

fn spawn(world: &mut PhysicsWorld, position: Point3<f32>) -> CharacterLocomotion {
    let config = CharacterConfig::default();
    let driver = Box::new(SensorDriver::new(config.shape.clone()));
    CharacterLocomotion::new(config, driver, world, position)
}

fn tick(character: &mut CharacterLocomotion, world: &mut PhysicsWorld, steps: usize) {
    let hooks = TickHooks::default();
    for _ in 0..steps {
        character.update(world, &hooks, DT);
        world.step(DT);
        world.update_queries();
    }
}

fn settle(character: &mut CharacterLocomotion, world: &mut PhysicsWorld) {
    tick(character, world, 50);
    assert!(character.is_grounded(), "character should settle onto the floor");
}

/// Planar speed ramps by acceleration*dt per tick and never crosses run speed.
#[test]
fn test_directional_speed_ramp() {
    let mut world = world_with_floor();
    let mut character = spawn(&mut world, Point3::new(0.0, 1.0, 0.0));
    settle(&mut character, &mut world);

    let run_speed = character.config().locomotion.run_speed;
    let acceleration = character.config().locomotion.acceleration;
    character.set_direction(Vector3::new(0.0, 0.0, 1.0));

    tick(&mut character, &mut world, 1);
    let first = character.state().forward_speed.norm();
    assert!(
        (first - acceleration * DT).abs() < 1.0e-3,
        "first tick should add one acceleration increment, got {first}"
    );

    let mut previous = first;
    for _ in 0..60 {
        tick(&mut character, &mut world, 1);
        let speed = character.state().forward_speed.norm();
        assert!(speed <= run_speed + 1.0e-3, "overshoot: {speed}");
        assert!(speed >= previous - 1.0e-3, "ramp should not dip: {speed}");
        previous = speed;
    }
    assert!((previous - run_speed).abs() < 0.05, "should reach run speed, got {previous}");
}

/// Releasing the stick decelerates to rest without ever reversing.
#[test]
fn test_deceleration_stops_without_reversing() {
    let mut world = world_with_floor();
    let mut character = spawn(&mut world, Point3::new(0.0, 1.0, 0.0));
    settle(&mut character, &mut world);

    character.set_direction(Vector3::new(0.0, 0.0, 1.0));
    tick(&mut character, &mut world, 60);
    character.set_direction(Vector3::zeros());

    let mut previous = character.state().forward_speed.norm();
    for _ in 0..80 {
        tick(&mut character, &mut world, 1);
        let velocity_z = character.state().forward_speed.z;
        assert!(velocity_z >= -1.0e-3, "must not reverse, got {velocity_z}");
        let speed = character.state().forward_speed.norm();
        assert!(speed <= previous + 1.0e-3);
        previous = speed;
    }
    assert!(previous < 0.05, "should come to rest, got {previous}");
}

/// One jump produces exactly one GroundLost and one Landed, and the vertical
/// states stay mutually exclusive throughout the flight.
#[test]
fn test_jump_flight_edge_events() {
    let mut world = world_with_floor();
    let mut character = spawn(&mut world, Point3::new(0.0, 1.0, 0.0));
    let events = character.events();
    settle(&mut character, &mut world);
    for _ in events.try_iter() {}

    assert_eq!(character.jump(None), Some(1));

    let mut saw_rising = false;
    let mut saw_falling = false;
    for _ in 0..300 {
        tick(&mut character, &mut world, 1);
        match character.ground_state() {
            GroundState::Rising => {
                saw_rising = true;
                assert!(!saw_falling, "rising must precede falling");
            }
            GroundState::Falling => saw_falling = true,
            GroundState::Grounded => {}
        }
    }
    assert!(saw_rising && saw_falling, "flight should pass through both phases");
    assert_eq!(character.ground_state(), GroundState::Grounded);

    let seen: Vec<_> = events.try_iter().collect();
    let lost = seen.iter().filter(|e| **e == LocomotionEvent::GroundLost).count();
    let landed = seen.iter().filter(|e| **e == LocomotionEvent::Landed).count();
    assert_eq!(lost, 1);
    assert_eq!(landed, 1);
    assert!(seen.contains(&LocomotionEvent::Jumped { chain: 1 }));
}

/// Follow with radii [2, 5] from 10 units out: approach, park inside the
/// band, and stay parked while the target is stationary.
#[test]
fn test_follow_approaches_and_parks() {
    let mut world = world_with_floor();
    let target = world.add_block(Point3::new(0.0, 1.0, 10.0), vector![0.5, 0.5, 0.5]);
    world.update_queries();

    let mut character = spawn(&mut world, Point3::new(0.0, 1.0, 0.0));
    settle(&mut character, &mut world);

    character.follow(target, 2.0, 5.0);
    tick(&mut character, &mut world, 400);

    let position = character.position(&world);
    let distance = (Point3::new(0.0, 1.0, 10.0) - position).norm();
    assert!(distance < 5.0, "should close inside the outer radius, got {distance}");
    assert!(distance > 1.0, "should not crowd the target, got {distance}");

    // Stationary target: parked characters do not creep.
    let before = character.position(&world);
    tick(&mut character, &mut world, 120);
    let after = character.position(&world);
    assert!((after - before).norm() < 0.05, "parked character moved {}", (after - before).norm());
}

/// Follow with navigation enabled hands steering to the attached agent. The
/// character still closes into the band, keeps ground contact the whole way,
/// and never reports a spurious ground loss while the agent drives.
#[test]
fn test_follow_delegates_to_nav_agent() {
    let mut world = world_with_floor();
    let target = world.add_block(Point3::new(0.0, 1.0, 10.0), vector![0.5, 0.5, 0.5]);
    world.update_queries();

    let mut character = spawn(&mut world, Point3::new(0.0, 1.0, 0.0));
    character.set_nav_agent(&world, Box::new(StraightLineAgent::new(Point3::new(0.0, 1.0, 0.0))));
    character.config_mut().locomotion.use_navigation_mesh = true;
    settle(&mut character, &mut world);

    let events = character.events();
    for _ in events.try_iter() {}

    let start = character.position(&world);
    character.follow(target, 2.0, 5.0);
    for _ in 0..400 {
        tick(&mut character, &mut world, 1);
        assert_eq!(
            character.ground_state(),
            GroundState::Grounded,
            "agent-driven movement must keep ground contact"
        );
    }

    let agent = character.nav_agent().expect("agent stays attached");
    assert!(agent.is_enabled(), "steering should be delegated to the agent");

    let position = character.position(&world);
    assert!(position.z > start.z + 1.0, "agent should have moved the character");
    let distance = (Point3::new(0.0, 1.0, 10.0) - position).norm();
    assert!(distance < 5.0, "should close inside the outer radius, got {distance}");
    assert!(distance > 1.0, "should not crowd the target, got {distance}");

    let lost = events
        .try_iter()
        .filter(|e| *e == LocomotionEvent::GroundLost)
        .count();
    assert_eq!(lost, 0, "delegated movement must not drop the ground state");
}

/// A character already inside the follow band never starts moving.
#[test]
fn test_follow_inside_band_stays_put() {
    let mut world = world_with_floor();
    let target = world.add_block(Point3::new(0.0, 1.0, 4.0), vector![0.5, 0.5, 0.5]);
    world.update_queries();

    let mut character = spawn(&mut world, Point3::new(0.0, 1.0, 0.0));
    settle(&mut character, &mut world);

    character.follow(target, 2.0, 5.0);
    let before = character.position(&world);
    tick(&mut character, &mut world, 120);
    let after = character.position(&world);
    assert!((after - before).norm() < 0.05, "inside the band there is nothing to do");
}

/// Dash speed decays monotonically after the hold and the dashing flag drops
/// exactly once.
#[test]
fn test_dash_decays_and_ends_once() {
    let mut world = world_with_floor();
    let mut character = spawn(&mut world, Point3::new(0.0, 1.0, 0.0));
    settle(&mut character, &mut world);

    character.dash(Vector3::new(1.0, 0.0, 0.0), 4.0, 0.1, 10.0);
    tick(&mut character, &mut world, 1);
    assert!(character.state().is_dashing);
    let run_speed = character.config().locomotion.run_speed;
    assert!(character.state().forward_speed.norm() > run_speed, "dash outruns the run speed");

    let mut previous = f32::MAX;
    let mut falling_edges = 0;
    let mut was_dashing = true;
    for _ in 0..200 {
        tick(&mut character, &mut world, 1);
        let dashing = character.state().is_dashing;
        if dashing {
            let speed = character.state().forward_speed.norm();
            assert!(speed <= previous + 1.0e-3, "dash must not re-accelerate");
            previous = speed;
        }
        if was_dashing && !dashing {
            falling_edges += 1;
        }
        was_dashing = dashing;
    }
    assert_eq!(falling_edges, 1);
    assert!(!character.state().is_dashing);
}

/// Standing on a slope past the limit: contact is kept but movement is
/// replaced by a downhill slide.
#[test]
fn test_steep_slope_slides_downhill() {
    let mut world = world_with_floor();
    // 2-wide, 4-tall wedge: ~63 degree slope, past the 45 degree limit.
    // Surface descends toward +x.
    world.add_ramp(Point3::new(0.0, 2.0, 0.0), vector![2.0, 4.0, 2.0]);
    world.update_queries();

    let mut character = spawn(&mut world, Point3::new(0.4, 2.4, 0.0));
    let hooks = TickHooks::default();

    let mut slid = false;
    let start_x = character.position(&world).x;
    for _ in 0..40 {
        character.update(&mut world, &hooks, DT);
        world.step(DT);
        world.update_queries();
        slid |= character.state().is_sliding;
    }

    assert!(slid, "slide state should engage on the steep face");
    assert!(
        character.position(&world).x > start_x + 0.2,
        "should slip downhill, got x={}",
        character.position(&world).x
    );
}
