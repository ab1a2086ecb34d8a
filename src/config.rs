//! Game configuration
//!
//! Every tuning constant lives here. Persisted as JSON under [`CONFIG_KEY`];
//! missing fields fall back to the defaults below.

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::persistence::{CONFIG_KEY, KeyValueStore};

/// Environment variable that overrides the leaderboard base URL
pub const LEADERBOARD_URL_ENV: &str = "NEON_BREAKOUT_LEADERBOARD_URL";

/// Playfield dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub width: f32,
    pub height: f32,
    /// Balls further than this below the bottom edge are lost
    pub loss_margin: f32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            width: FIELD_WIDTH,
            height: FIELD_HEIGHT,
            loss_margin: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaddleConfig {
    pub width: f32,
    pub height: f32,
    /// Fixed vertical centre
    pub y: f32,
    /// Keyboard movement speed (px/s)
    pub speed: f32,
    pub min_width: f32,
    /// Upper bound for `grow`, as a multiple of `width`
    pub max_width_multiple: f32,
}

impl Default for PaddleConfig {
    fn default() -> Self {
        Self {
            width: PADDLE_WIDTH,
            height: PADDLE_HEIGHT,
            y: FIELD_HEIGHT - 30.0,
            speed: PADDLE_SPEED,
            min_width: 20.0,
            max_width_multiple: 2.0,
        }
    }
}

/// Ball physics tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallConfig {
    pub radius: f32,
    /// Level 1 base speed (px/s)
    pub base_speed: f32,
    /// Speed cap as a multiple of base speed
    pub max_speed_multiple: f32,
    /// Speed factor applied every `acceleration_threshold` brick contacts
    pub acceleration: f32,
    pub acceleration_threshold: u32,
    /// |vy| must stay above this fraction of the speed
    pub min_vertical_ratio: f32,
    /// Launch angles (degrees, y-up) at hit-factor 0, 0.5 and 1
    pub launch_angles: [f32; 3],
    /// Random launch arc (degrees) used when no angle is given
    pub random_launch_arc: (f32, f32),
    /// Mega duration when none is given (ms)
    pub default_mega_ms: f32,
}

impl Default for BallConfig {
    fn default() -> Self {
        Self {
            radius: BALL_RADIUS,
            base_speed: BALL_SPEED_BASE,
            max_speed_multiple: 2.0,
            acceleration: 1.02,
            acceleration_threshold: 5,
            min_vertical_ratio: 0.25,
            launch_angles: [150.0, 90.0, 30.0],
            random_launch_arc: (30.0, 150.0),
            default_mega_ms: 5000.0,
        }
    }
}

/// Brick grid geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrickConfig {
    pub width: f32,
    pub height: f32,
    pub padding_x: f32,
    pub padding_y: f32,
    pub offset_left: f32,
    pub offset_top: f32,
    /// Horizontal speed of mobile bricks (px/s)
    pub mobile_speed: f32,
}

impl Default for BrickConfig {
    fn default() -> Self {
        let columns = 8.0;
        let grid_width = columns * (BRICK_WIDTH + 5.0) - 5.0;
        Self {
            width: BRICK_WIDTH,
            height: BRICK_HEIGHT,
            padding_x: 5.0,
            padding_y: 5.0,
            offset_left: (FIELD_WIDTH - grid_width) / 2.0,
            offset_top: 60.0,
            mobile_speed: 80.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    pub count: u32,
    /// Geometric speed rate per level
    pub speed_rate: f32,
    /// Pause between clearing a level and building the next (ms)
    pub transition_delay_ms: f32,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            count: 5,
            speed_rate: 1.1,
            transition_delay_ms: 200.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerUpConfig {
    pub size: f32,
    pub fall_speed: f32,
    pub spawn_chance: f32,
    /// Duration of sticky, mega and laser (ms)
    pub duration_ms: f32,
    pub laser_enabled: bool,
    /// Balls collect pickups on contact, not only the paddle
    pub ball_collects: bool,
    /// Horizontal offset of multiball spawns
    pub multiball_offset: f32,
    /// Launch angles (degrees) of the two multiball spawns
    pub multiball_angles: [f32; 2],
    pub laser_speed: f32,
    pub laser_cooldown_ms: f32,
}

impl Default for PowerUpConfig {
    fn default() -> Self {
        Self {
            size: 16.0,
            fall_speed: 150.0,
            spawn_chance: 0.15,
            duration_ms: 8000.0,
            laser_enabled: false,
            ball_collects: true,
            multiball_offset: 15.0,
            multiball_angles: [120.0, 60.0],
            laser_speed: 600.0,
            laser_cooldown_ms: 250.0,
        }
    }
}

/// Base points per brick type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub normal: u32,
    pub armored: u32,
    pub indestructible: u32,
    pub mobile: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            normal: 10,
            armored: 25,
            indestructible: 0,
            mobile: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardConfig {
    /// Service root; `/scores` is appended. `None` runs offline.
    pub base_url: Option<String>,
    pub timeout_ms: u64,
    pub max_name_len: usize,
    pub placeholder_name: String,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: 4000,
            max_name_len: 12,
            placeholder_name: "ANONYMOUS".to_string(),
        }
    }
}

/// Complete game configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub field: FieldConfig,
    pub paddle: PaddleConfig,
    pub ball: BallConfig,
    pub bricks: BrickConfig,
    pub levels: LevelConfig,
    pub powerups: PowerUpConfig,
    pub scoring: ScoringConfig,
    pub lives: u8,
    /// Delay before a fresh ball appears after a life is lost (ms)
    pub respawn_delay_ms: f32,
    pub leaderboard: LeaderboardConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            field: FieldConfig::default(),
            paddle: PaddleConfig::default(),
            ball: BallConfig::default(),
            bricks: BrickConfig::default(),
            levels: LevelConfig::default(),
            powerups: PowerUpConfig::default(),
            scoring: ScoringConfig::default(),
            lives: 3,
            respawn_delay_ms: 600.0,
            leaderboard: LeaderboardConfig::default(),
        }
    }
}

impl GameConfig {
    /// Load from the store, falling back to defaults on any failure
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let mut config = match store.get(CONFIG_KEY) {
            Ok(Some(json)) => match serde_json::from_str::<GameConfig>(&json) {
                Ok(config) => {
                    log::info!("Loaded config from storage");
                    config
                }
                Err(err) => {
                    log::warn!("Stored config is malformed ({err}), using defaults");
                    Self::default()
                }
            },
            Ok(None) => {
                log::info!("Using default config");
                Self::default()
            }
            Err(err) => {
                log::warn!("Config storage unavailable ({err}), using defaults");
                Self::default()
            }
        };
        config.apply_env();
        config
    }

    /// Persist to the store (best effort)
    pub fn save(&self, store: &dyn KeyValueStore) {
        match serde_json::to_string(self) {
            Ok(json) => match store.set(CONFIG_KEY, &json) {
                Ok(()) => log::info!("Config saved"),
                Err(err) => log::warn!("Failed to save config: {err}"),
            },
            Err(err) => log::warn!("Failed to encode config: {err}"),
        }
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(LEADERBOARD_URL_ENV) {
            if !url.trim().is_empty() {
                self.leaderboard.base_url = Some(url.trim().to_string());
            }
        }
    }
}
