//! Character configuration parsing from character.toml files.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Which direction the character should face while moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceDirection {
    /// Face wherever the movement input points.
    MovementDirection,
    /// Face the camera's horizontal forward direction.
    CameraDirection,
    /// Face a target position set on the orchestrator.
    Target,
    /// Face the point where the cursor ray crosses the character's ground plane.
    GroundPlaneCursor,
}

impl Default for FaceDirection {
    fn default() -> Self {
        FaceDirection::MovementDirection
    }
}

/// Tunable locomotion parameters for one character.
#[derive(Debug, Clone, Deserialize)]
pub struct LocomotionConfig {
    #[serde(default = "default_run_speed")]
    pub run_speed: f32,
    #[serde(default = "default_acceleration")]
    pub acceleration: f32,
    #[serde(default = "default_deceleration")]
    pub deceleration: f32,
    /// Turn rate in degrees per second.
    #[serde(default = "default_angular_speed")]
    pub angular_speed: f32,
    /// Downward acceleration, negative (units/s^2).
    #[serde(default = "default_gravity")]
    pub gravity: f32,
    /// Most negative vertical speed allowed while falling.
    #[serde(default = "default_max_fall_speed")]
    pub max_fall_speed: f32,
    #[serde(default = "default_true")]
    pub can_run: bool,
    #[serde(default = "default_true")]
    pub can_jump: bool,
    #[serde(default = "default_jump_force")]
    pub jump_force: f32,
    /// Number of jumps granted before a landing is required (1 = no air jumps).
    #[serde(default = "default_jump_times")]
    pub jump_times: u32,
    /// Minimum seconds between two granted jumps.
    #[serde(default = "default_time_between_jumps")]
    pub time_between_jumps: f32,
    #[serde(default)]
    pub face_direction: FaceDirection,
    /// Higher-priority facing policy; None leaves `face_direction` in charge.
    #[serde(default)]
    pub override_face_direction: Option<FaceDirection>,
    /// Allow Follow to delegate to a navigation agent when one is attached.
    #[serde(default)]
    pub use_navigation_mesh: bool,
}

fn default_run_speed() -> f32 {
    4.0
}
fn default_acceleration() -> f32 {
    10.0
}
fn default_deceleration() -> f32 {
    4.0
}
fn default_angular_speed() -> f32 {
    540.0
}
fn default_gravity() -> f32 {
    -9.81
}
fn default_max_fall_speed() -> f32 {
    -100.0
}
fn default_true() -> bool {
    true
}
fn default_jump_force() -> f32 {
    6.0
}
fn default_jump_times() -> u32 {
    1
}
fn default_time_between_jumps() -> f32 {
    0.5
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            run_speed: default_run_speed(),
            acceleration: default_acceleration(),
            deceleration: default_deceleration(),
            angular_speed: default_angular_speed(),
            gravity: default_gravity(),
            max_fall_speed: default_max_fall_speed(),
            can_run: true,
            can_jump: true,
            jump_force: default_jump_force(),
            jump_times: default_jump_times(),
            time_between_jumps: default_time_between_jumps(),
            face_direction: FaceDirection::default(),
            override_face_direction: None,
            use_navigation_mesh: false,
        }
    }
}

/// Physical dimensions and sensor tuning for one character.
#[derive(Debug, Clone, Deserialize)]
pub struct ShapeConfig {
    #[serde(default = "default_radius")]
    pub radius: f32,
    /// Total capsule height, feet to head.
    #[serde(default = "default_height")]
    pub height: f32,
    #[serde(default = "default_skin_width")]
    pub skin_width: f32,
    /// Steepest walkable slope in degrees.
    #[serde(default = "default_slope_angle_limit")]
    pub slope_angle_limit: f32,
    /// Tallest ledge the character can step onto without jumping.
    #[serde(default = "default_step_height")]
    pub step_height: f32,
    /// Rings of extra ground-sensor rays around the center ray (0 = single ray).
    #[serde(default = "default_sensor_rows")]
    pub sensor_rows: u32,
    /// Vertical offset of sensor ray origins from the capsule center.
    #[serde(default)]
    pub sensor_offset: f32,
}

fn default_radius() -> f32 {
    0.5
}
fn default_height() -> f32 {
    2.0
}
fn default_skin_width() -> f32 {
    0.05
}
fn default_slope_angle_limit() -> f32 {
    45.0
}
fn default_step_height() -> f32 {
    0.3
}
fn default_sensor_rows() -> u32 {
    1
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            radius: default_radius(),
            height: default_height(),
            skin_width: default_skin_width(),
            slope_angle_limit: default_slope_angle_limit(),
            step_height: default_step_height(),
            sensor_rows: default_sensor_rows(),
            sensor_offset: 0.0,
        }
    }
}

/// Character definition from character.toml.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CharacterConfig {
    #[serde(default)]
    pub locomotion: LocomotionConfig,
    #[serde(default)]
    pub shape: ShapeConfig,
}

impl CharacterConfig {
    /// Load a character configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, CharacterConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CharacterConfigError::Io(path.to_path_buf(), e))?;
        toml::from_str(&content).map_err(|e| CharacterConfigError::Parse(path.to_path_buf(), e))
    }
}

/// Errors that can occur when loading a character configuration.
#[derive(Debug, Error)]
pub enum CharacterConfigError {
    #[error("failed to read {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("failed to parse {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
}
