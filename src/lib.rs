//! Locomotor character movement library
//!
//! Policy-driven character locomotion on top of rapier: interchangeable
//! movement policies steer a physics driver, with jumps, dashes, momentum
//! and a per-tick state snapshot for consumers.

pub mod config;
pub mod driver;
pub mod locomotion;
pub mod math;
pub mod nav;
pub mod state;
pub mod system;
pub mod world;
