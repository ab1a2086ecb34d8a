//! Neon Breakout - brick-breaking arcade simulation engine
//!
//! Core modules:
//! - `sim`: Deterministic simulation (entities, collisions, levels, tick loop)
//! - `score`: Combo-weighted scoring and the local high score
//! - `leaderboard`: Shared ranking service client with timeout/fallback
//! - `game`: Scene state machine hosting a session
//! - `persistence`: Best-effort key-value storage
//! - `config`: Data-driven game balance

pub mod config;
pub mod game;
pub mod leaderboard;
pub mod persistence;
pub mod score;
pub mod sim;

pub use config::GameConfig;
pub use game::{Game, Scene, SubmissionState};
pub use leaderboard::{LeaderboardClient, LeaderboardEntry, LeaderboardError};
pub use score::ScoreTracker;

use glam::Vec2;

/// Game configuration constants (defaults for [`GameConfig`])
pub mod consts {
    /// Fixed simulation timestep (120 Hz)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Playfield dimensions
    pub const FIELD_WIDTH: f32 = 800.0;
    pub const FIELD_HEIGHT: f32 = 600.0;

    /// Paddle defaults
    pub const PADDLE_WIDTH: f32 = 80.0;
    pub const PADDLE_HEIGHT: f32 = 12.0;
    pub const PADDLE_SPEED: f32 = 500.0;

    /// Ball defaults
    pub const BALL_RADIUS: f32 = 5.0;
    pub const BALL_SPEED_BASE: f32 = 400.0;

    /// Brick defaults
    pub const BRICK_WIDTH: f32 = 70.0;
    pub const BRICK_HEIGHT: f32 = 12.0;
}

/// Velocity for an angle in degrees, y-up convention on a y-down screen
#[inline]
pub fn velocity_from_angle(angle_deg: f32, speed: f32) -> Vec2 {
    let rad = angle_deg.to_radians();
    Vec2::new(rad.cos() * speed, -rad.sin() * speed)
}

/// Angle in degrees (y-up convention) of a screen-space velocity
#[inline]
pub fn angle_of_velocity(vel: Vec2) -> f32 {
    (-vel.y).atan2(vel.x).to_degrees()
}

/// Piecewise-linear interpolation across evenly spaced knots, `t` in [0, 1]
pub fn interpolate_linear(knots: &[f32], t: f32) -> f32 {
    match knots.len() {
        0 => 0.0,
        1 => knots[0],
        n => {
            let t = t.clamp(0.0, 1.0);
            let scaled = t * (n - 1) as f32;
            let i = (scaled.floor() as usize).min(n - 2);
            let frac = scaled - i as f32;
            knots[i] + (knots[i + 1] - knots[i]) * frac
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_linear_knots() {
        let knots = [150.0, 90.0, 30.0];
        assert_eq!(interpolate_linear(&knots, 0.0), 150.0);
        assert_eq!(interpolate_linear(&knots, 0.5), 90.0);
        assert_eq!(interpolate_linear(&knots, 1.0), 30.0);
        assert!((interpolate_linear(&knots, 0.25) - 120.0).abs() < 0.001);
        assert_eq!(interpolate_linear(&knots, -1.0), 150.0);
    }

    #[test]
    fn test_velocity_angle_round_trip() {
        let v = velocity_from_angle(150.0, 400.0);
        assert!(v.x < 0.0 && v.y < 0.0, "150° points up-left on screen");
        assert!((angle_of_velocity(v) - 150.0).abs() < 0.01);
        assert!((v.length() - 400.0).abs() < 0.01);
    }
}
