//! Locomotor simulation CLI - run a character through a demo course.

use clap::{Parser, ValueEnum};
use nalgebra::{vector, Point3, Vector3};
use std::path::PathBuf;

use locomotor::config::CharacterConfig;
use locomotor::driver::{KinematicDriver, LocomotionDriver, RigidBodyDriver, SensorDriver};
use locomotor::locomotion::CharacterLocomotion;
use locomotor::system::TickHooks;
use locomotor::world::{PhysicsWorld, TIMESTEP};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DriverKind {
    Sensor,
    Kinematic,
    RigidBody,
}

#[derive(Parser)]
#[command(name = "locomotor-sim")]
#[command(about = "Run a locomotion character through a demo course", long_about = None)]
struct Cli {
    /// Character config file (TOML). Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Physics backend to drive the character with
    #[arg(short, long, value_enum, default_value_t = DriverKind::Sensor)]
    driver: DriverKind,
    /// Simulation length in seconds
    #[arg(short, long, default_value_t = 10.0)]
    seconds: f32,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match CharacterConfig::from_file(path) {
            Ok(config) => config,
            Err(err) => {
                log::error!("failed to load config: {}", err);
                std::process::exit(1);
            }
        },
        None => CharacterConfig::default(),
    };

    let mut world = PhysicsWorld::new();
    world.add_block(Point3::new(0.0, -0.5, 0.0), vector![60.0, 1.0, 60.0]);
    world.add_ramp(Point3::new(0.0, 0.5, 8.0), vector![4.0, 1.0, 4.0]);
    world.add_block(Point3::new(3.0, 0.1, 4.0), vector![2.0, 0.2, 2.0]);
    world.update_queries();

    let driver: Box<dyn LocomotionDriver> = match cli.driver {
        DriverKind::Sensor => Box::new(SensorDriver::new(config.shape.clone())),
        DriverKind::Kinematic => Box::new(KinematicDriver::new(config.shape.clone())),
        DriverKind::RigidBody => Box::new(RigidBodyDriver::new(config.shape.clone())),
    };

    let mut character =
        CharacterLocomotion::new(config, driver, &mut world, Point3::new(0.0, 1.5, -5.0));
    let events = character.events();
    character.set_direction(Vector3::new(0.0, 0.0, 1.0));

    let hooks = TickHooks::default();
    let ticks = (cli.seconds / TIMESTEP) as usize;
    for tick in 0..ticks {
        // Hop at the two-second mark to show the jump pipeline.
        if tick == (2.0 / TIMESTEP) as usize {
            character.jump(None);
        }

        character.update(&mut world, &hooks, TIMESTEP);
        world.step(TIMESTEP);
        world.update_queries();

        for event in events.try_iter() {
            log::info!("t={:.2}s event {:?}", tick as f32 * TIMESTEP, event);
        }

        if tick % 30 == 0 {
            let position = character.position(&world);
            let state = character.state();
            log::info!(
                "t={:.2}s pos=({:.2}, {:.2}, {:.2}) forward={:.2} vertical={:.2} grounded={} sliding={}",
                tick as f32 * TIMESTEP,
                position.x,
                position.y,
                position.z,
                state.forward_speed.norm(),
                state.vertical_speed,
                state.is_grounded,
                state.is_sliding,
            );
        }
    }

    let position = character.position(&world);
    log::info!(
        "finished at ({:.2}, {:.2}, {:.2})",
        position.x,
        position.y,
        position.z
    );
}
