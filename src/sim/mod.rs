//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by insertion, which follows entity ID)
//! - No rendering or platform dependencies

pub mod collision;
pub mod level;
pub mod state;
pub mod tick;

pub use collision::{Aabb, BounceAxis, bounce_axis, circle_overlaps_rect, reflect_velocity};
pub use level::{BrickPlacement, LevelSystem, layout_for_level, speed_multiplier_for};
pub use state::{
    ActivePowerUps, Ball, BallState, Brick, BrickKind, GameEvent, GamePhase, GameSession,
    LaserBolt, MobileState, Paddle, PaddleIntent, PowerUp, PowerUpKind,
};
pub use tick::{TickInput, autopilot_input, tick};
