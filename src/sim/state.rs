//! Game state and core simulation types
//!
//! Entities are plain data with methods; the renderer only reads them.
//! [`GameSession`] owns every entity collection and is the single mutator.

use std::collections::BTreeMap;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::collision::Aabb;
use super::level::{BrickPlacement, LevelSystem};
use crate::config::{BallConfig, GameConfig, PaddleConfig, PowerUpConfig, ScoringConfig};
use crate::score::ScoreTracker;
use crate::{interpolate_linear, velocity_from_angle};

/// Current phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Ball riding the paddle, waiting for launch input
    WaitingToLaunch,
    /// Active gameplay
    Playing,
    /// Level cleared, next level (or victory) pending
    LevelTransition,
    /// All balls drained, respawn pending
    BallLost,
    /// Out of lives
    GameOver,
    /// Last level cleared
    Victory,
}

impl GamePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GamePhase::GameOver | GamePhase::Victory)
    }
}

/// Ball state - riding the paddle or free-moving
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BallState {
    /// Pinned to the paddle at a horizontal offset from its centre
    Stuck { offset: f32 },
    Free,
}

/// Normalised contact position along the paddle, 0 = left edge, 1 = right edge
#[inline]
pub fn hit_factor(ball_x: f32, paddle_x: f32, paddle_width: f32) -> f32 {
    let left = paddle_x - paddle_width / 2.0;
    ((ball_x - left) / paddle_width.max(f32::EPSILON)).clamp(0.0, 1.0)
}

/// A ball entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ball {
    pub id: u32,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub base_speed: f32,
    pub state: BallState,
    /// Remaining mega (pass-through) time in ms, 0 when inactive
    pub mega_ms: f32,
    /// Brick contacts since the last speed escalation
    pub bounce_count: u32,
    /// Bricks the ball currently overlaps (hits register on entry only)
    #[serde(default)]
    pub inside_bricks: Vec<u32>,
    tuning: BallConfig,
}

impl Ball {
    pub fn new(id: u32, pos: Vec2, base_speed: f32, tuning: BallConfig) -> Self {
        Self {
            id,
            pos,
            vel: Vec2::ZERO,
            radius: tuning.radius,
            base_speed,
            state: BallState::Free,
            mega_ms: 0.0,
            bounce_count: 0,
            inside_bricks: Vec::new(),
            tuning,
        }
    }

    pub fn is_stuck(&self) -> bool {
        matches!(self.state, BallState::Stuck { .. })
    }

    pub fn is_mega(&self) -> bool {
        self.mega_ms > 0.0
    }

    pub fn speed(&self) -> f32 {
        self.vel.length()
    }

    pub fn max_speed(&self) -> f32 {
        self.base_speed * self.tuning.max_speed_multiple
    }

    /// Launch at `angle` degrees, or at a random angle inside the launch arc.
    /// No-op while stuck.
    pub fn launch<R: Rng>(&mut self, angle: Option<f32>, rng: &mut R) {
        if self.is_stuck() {
            return;
        }
        let angle = angle.unwrap_or_else(|| {
            let (lo, hi) = self.tuning.random_launch_arc;
            rng.random_range(lo..=hi)
        });
        self.vel = velocity_from_angle(angle, self.base_speed);
    }

    /// Launch at base speed, aimed by where the ball sits along the paddle
    pub fn launch_from_paddle(&mut self, paddle_x: f32, paddle_width: f32) {
        let angle = self.paddle_angle(paddle_x, paddle_width);
        self.vel = velocity_from_angle(angle, self.base_speed);
        self.bounce_count = 0;
    }

    /// Reflect off the paddle. Keeps the current speed, never below base.
    pub fn handle_paddle_collision(&mut self, paddle: &Paddle) {
        if self.is_stuck() {
            return;
        }
        let angle = self.paddle_angle(paddle.x, paddle.width());
        let speed = self.speed().max(self.base_speed).min(self.max_speed());
        self.vel = velocity_from_angle(angle, speed);
        self.bounce_count = 0;
    }

    fn paddle_angle(&self, paddle_x: f32, paddle_width: f32) -> f32 {
        let factor = hit_factor(self.pos.x, paddle_x, paddle_width);
        interpolate_linear(&self.tuning.launch_angles, factor)
    }

    /// Pin to the paddle, keeping the current horizontal offset
    pub fn stick(&mut self, paddle_x: f32) {
        self.state = BallState::Stuck {
            offset: self.pos.x - paddle_x,
        };
        self.vel = Vec2::ZERO;
    }

    /// Release from the paddle and launch
    pub fn unstick(&mut self, paddle_x: f32, paddle_width: f32) {
        if !self.is_stuck() {
            return;
        }
        self.state = BallState::Free;
        self.launch_from_paddle(paddle_x, paddle_width);
    }

    /// Ride on top of the paddle while stuck
    pub fn follow_paddle(&mut self, paddle: &Paddle) {
        if let BallState::Stuck { offset } = self.state {
            let half = paddle.width() / 2.0;
            let offset = offset.clamp(-half, half);
            self.pos = Vec2::new(paddle.x + offset, paddle.top() - self.radius - 1.0);
        }
    }

    /// Enter pass-through mode for `duration_ms`, or the configured default
    pub fn set_mega(&mut self, duration_ms: Option<f32>) {
        let duration_ms = duration_ms.unwrap_or(self.tuning.default_mega_ms);
        self.mega_ms = duration_ms.max(0.0);
    }

    /// Count down mega mode. Returns true on the tick it expires.
    pub fn update_mega(&mut self, dt: f32) -> bool {
        if self.mega_ms > 0.0 {
            self.mega_ms -= dt * 1000.0;
            if self.mega_ms <= 0.0 {
                self.mega_ms = 0.0;
                return true;
            }
        }
        false
    }

    /// Register a bounce; every `acceleration_threshold` bounces speed up by
    /// `factor`, capped at the max speed.
    pub fn accelerate(&mut self, factor: f32) {
        if self.is_stuck() {
            return;
        }
        self.bounce_count += 1;
        if self.bounce_count >= self.tuning.acceleration_threshold {
            let speed = (self.speed() * factor).min(self.max_speed());
            self.vel = self.vel.normalize_or_zero() * speed;
            self.bounce_count = 0;
        }
    }

    /// Clamp speed into [base, max] and keep a minimum vertical component
    pub fn enforce_speed_limits(&mut self) {
        if self.is_stuck() {
            self.vel = Vec2::ZERO;
            return;
        }
        if self.vel.length_squared() < 1e-6 {
            self.vel = velocity_from_angle(90.0, self.base_speed);
        }

        let speed = self.speed().clamp(self.base_speed, self.max_speed());
        let mut vel = self.vel.normalize_or_zero() * speed;

        let min_vy = speed * self.tuning.min_vertical_ratio;
        if vel.y.abs() < min_vy {
            let sign_y = if vel.y > 0.0 { 1.0 } else { -1.0 };
            let sign_x = if vel.x < 0.0 { -1.0 } else { 1.0 };
            let vy = sign_y * min_vy;
            let vx = sign_x * (speed * speed - vy * vy).max(0.0).sqrt();
            vel = Vec2::new(vx, vy);
        }
        self.vel = vel;
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.pos, Vec2::splat(self.radius * 2.0))
    }
}

/// Movement intent sampled from the input layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PaddleIntent {
    pub left: bool,
    pub right: bool,
    /// Absolute pointer x; overrides the keys for this tick
    pub pointer_x: Option<f32>,
}

/// The player's paddle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paddle {
    /// Centre x
    pub x: f32,
    /// Fixed centre y
    pub y: f32,
    pub height: f32,
    pub intent: PaddleIntent,
    width: f32,
    base_width: f32,
    min_width: f32,
    max_width: f32,
    speed: f32,
    field_width: f32,
}

impl Paddle {
    pub fn new(config: &PaddleConfig, field_width: f32) -> Self {
        Self {
            x: field_width / 2.0,
            y: config.y,
            height: config.height,
            intent: PaddleIntent::default(),
            width: config.width,
            base_width: config.width,
            min_width: config.min_width,
            max_width: config.width * config.max_width_multiple,
            speed: config.speed,
            field_width,
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn top(&self) -> f32 {
        self.y - self.height / 2.0
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(Vec2::new(self.x, self.y), Vec2::new(self.width, self.height))
    }

    /// Integrate keyboard intent, then apply the pointer (last writer wins)
    pub fn update(&mut self, dt: f32) {
        if self.intent.left {
            self.x -= self.speed * dt;
        }
        if self.intent.right {
            self.x += self.speed * dt;
        }
        if let Some(pointer_x) = self.intent.pointer_x {
            self.x = pointer_x;
        }
        self.clamp_to_field();
    }

    /// Shrink by a fraction of the current width
    pub fn shrink(&mut self, amount: f32) {
        self.width = (self.width * (1.0 - amount)).max(self.min_width);
        self.clamp_to_field();
    }

    /// Grow by a fraction of the current width
    pub fn grow(&mut self, amount: f32) {
        self.width = (self.width * (1.0 + amount)).min(self.max_width);
        self.clamp_to_field();
    }

    /// Back to centre and base width
    pub fn reset(&mut self) {
        self.x = self.field_width / 2.0;
        self.width = self.base_width;
        self.intent = PaddleIntent::default();
    }

    fn clamp_to_field(&mut self) {
        let half = self.width / 2.0;
        self.x = self.x.clamp(half, (self.field_width - half).max(half));
    }
}

/// Brick types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BrickKind {
    #[default]
    Normal,
    Armored,
    /// Cannot be destroyed, doesn't count for level clear
    Indestructible,
    /// Slides horizontally between the grid margins
    Mobile,
}

impl BrickKind {
    pub fn points(&self, scoring: &ScoringConfig) -> u32 {
        match self {
            BrickKind::Normal => scoring.normal,
            BrickKind::Armored => scoring.armored,
            BrickKind::Indestructible => scoring.indestructible,
            BrickKind::Mobile => scoring.mobile,
        }
    }

    pub fn default_health(&self) -> u8 {
        match self {
            BrickKind::Armored => 2,
            _ => 1,
        }
    }
}

/// Horizontal patrol of a mobile brick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MobileState {
    /// +1 right, -1 left
    pub direction: f32,
    pub speed: f32,
    pub min_x: f32,
    pub max_x: f32,
}

/// A brick entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brick {
    pub id: u32,
    pub kind: BrickKind,
    pub col: u32,
    pub row: u32,
    pub pos: Vec2,
    pub size: Vec2,
    pub color_index: u8,
    pub mobile: Option<MobileState>,
    health: u8,
    max_health: u8,
    points: u32,
}

impl Brick {
    pub fn new(
        id: u32,
        placement: &BrickPlacement,
        size: Vec2,
        points: u32,
        mobile: Option<MobileState>,
    ) -> Self {
        let health = placement.health.max(1);
        Self {
            id,
            kind: placement.kind,
            col: placement.col,
            row: placement.row,
            pos: placement.pos,
            size,
            color_index: placement.color_index,
            mobile: if placement.kind == BrickKind::Mobile {
                mobile
            } else {
                None
            },
            health,
            max_health: health,
            points,
        }
    }

    /// Register a hit. Returns true only when this hit destroys the brick.
    pub fn hit(&mut self) -> bool {
        if self.kind == BrickKind::Indestructible || self.health == 0 {
            return false;
        }
        self.health -= 1;
        self.health == 0
    }

    pub fn health(&self) -> u8 {
        self.health
    }

    pub fn max_health(&self) -> u8 {
        self.max_health
    }

    pub fn points(&self) -> u32 {
        self.points
    }

    pub fn is_destroyed(&self) -> bool {
        self.kind != BrickKind::Indestructible && self.health == 0
    }

    /// Returns true if this brick must be destroyed to clear the level
    pub fn counts_for_clear(&self) -> bool {
        self.kind != BrickKind::Indestructible
    }

    /// Slide mobile bricks, reversing at their bounds
    pub fn update(&mut self, dt: f32) {
        let Some(mobile) = self.mobile.as_mut() else {
            return;
        };
        self.pos.x += mobile.speed * mobile.direction * dt;
        if self.pos.x <= mobile.min_x {
            self.pos.x = mobile.min_x;
            mobile.direction = 1.0;
        } else if self.pos.x >= mobile.max_x {
            self.pos.x = mobile.max_x;
            mobile.direction = -1.0;
        }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.pos, self.size)
    }
}

/// Power-up types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PowerUpKind {
    MultiBall,
    Sticky,
    Mega,
    Laser,
}

impl PowerUpKind {
    /// Types that can drop with the given config
    pub fn enabled(config: &PowerUpConfig) -> Vec<PowerUpKind> {
        let mut kinds = vec![PowerUpKind::MultiBall, PowerUpKind::Sticky, PowerUpKind::Mega];
        if config.laser_enabled {
            kinds.push(PowerUpKind::Laser);
        }
        kinds
    }
}

/// A falling pickup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerUp {
    pub id: u32,
    pub kind: PowerUpKind,
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: f32,
}

impl PowerUp {
    pub fn new(id: u32, kind: PowerUpKind, pos: Vec2, config: &PowerUpConfig) -> Self {
        Self {
            id,
            kind,
            pos,
            vel: Vec2::new(0.0, config.fall_speed),
            size: config.size,
        }
    }

    /// Roll for a drop: `spawn_chance` odds, type uniform among enabled ones
    pub fn create_random<R: Rng>(
        rng: &mut R,
        id: u32,
        pos: Vec2,
        config: &PowerUpConfig,
    ) -> Option<PowerUp> {
        if rng.random::<f32>() >= config.spawn_chance {
            return None;
        }
        let kinds = PowerUpKind::enabled(config);
        let kind = kinds[rng.random_range(0..kinds.len())];
        Some(PowerUp::new(id, kind, pos, config))
    }

    pub fn update(&mut self, dt: f32) {
        self.pos += self.vel * dt;
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.pos, Vec2::splat(self.size))
    }
}

/// Timed power-up effects, remaining ms per type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivePowerUps {
    timers: BTreeMap<PowerUpKind, f32>,
}

impl ActivePowerUps {
    /// Arm (or re-arm) a timed effect
    pub fn insert(&mut self, kind: PowerUpKind, duration_ms: f32) {
        if duration_ms > 0.0 {
            self.timers.insert(kind, duration_ms);
        }
    }

    pub fn contains(&self, kind: PowerUpKind) -> bool {
        self.timers.contains_key(&kind)
    }

    pub fn remaining(&self, kind: PowerUpKind) -> Option<f32> {
        self.timers.get(&kind).copied()
    }

    pub fn remove(&mut self, kind: PowerUpKind) -> bool {
        self.timers.remove(&kind).is_some()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PowerUpKind, f32)> + '_ {
        self.timers.iter().map(|(k, v)| (*k, *v))
    }

    /// Count every timer down; returns the types that expired
    pub fn tick(&mut self, dt_ms: f32) -> Vec<PowerUpKind> {
        let mut expired = Vec::new();
        for (kind, remaining) in self.timers.iter_mut() {
            *remaining -= dt_ms;
            if *remaining <= 0.0 {
                expired.push(*kind);
            }
        }
        for kind in &expired {
            self.timers.remove(kind);
        }
        expired
    }
}

/// Laser bolt size
pub const LASER_SIZE: Vec2 = Vec2::new(3.0, 12.0);

/// A laser bolt fired from the paddle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaserBolt {
    pub id: u32,
    pub pos: Vec2,
    pub vel: Vec2,
}

impl LaserBolt {
    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.pos, LASER_SIZE)
    }
}

/// Discrete events for the rendering/audio layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    BallLaunched { ball_id: u32 },
    BallStuck { ball_id: u32 },
    PaddleBounce { ball_id: u32, hit_factor: f32 },
    BrickHit { brick_id: u32, pos: Vec2, kind: BrickKind, health: u8 },
    BrickDestroyed {
        brick_id: u32,
        pos: Vec2,
        kind: BrickKind,
        color_index: u8,
        points: u64,
        combo: u32,
    },
    PowerUpSpawned { kind: PowerUpKind, pos: Vec2 },
    PowerUpCollected { kind: PowerUpKind },
    PowerUpExpired { kind: PowerUpKind },
    MegaExpired { ball_id: u32 },
    LaserFired,
    BallDrained { ball_id: u32 },
    LifeLost { lives_remaining: u8 },
    LevelComplete { level: u32 },
    LevelStarted { level: u32, speed_multiplier: f32 },
    GameOver { score: u64, high_score: u64 },
    Victory { score: u64, high_score: u64 },
}

/// Complete state of one run
#[derive(Debug, Clone)]
pub struct GameSession {
    pub(crate) config: GameConfig,
    pub(crate) seed: u64,
    pub(crate) rng: Pcg32,
    pub(crate) phase: GamePhase,
    /// Countdown for LevelTransition / BallLost (ms)
    pub(crate) transition_ms: f32,
    pub(crate) lives: u8,
    pub(crate) score: ScoreTracker,
    pub(crate) level: LevelSystem,
    pub(crate) paddle: Paddle,
    pub(crate) balls: Vec<Ball>,
    pub(crate) bricks: Vec<Brick>,
    pub(crate) power_ups: Vec<PowerUp>,
    pub(crate) active: ActivePowerUps,
    pub(crate) lasers: Vec<LaserBolt>,
    pub(crate) laser_cooldown_ms: f32,
    pub(crate) time_ticks: u64,
    pub(crate) events: Vec<GameEvent>,
    next_id: u32,
}

impl GameSession {
    /// Start a run at level 1 with one ball on the paddle
    pub fn new(config: GameConfig, mut score: ScoreTracker, seed: u64) -> Self {
        score.reset();
        let paddle = Paddle::new(&config.paddle, config.field.width);
        let level = LevelSystem::new(&config.levels);
        let mut session = Self {
            rng: Pcg32::seed_from_u64(seed),
            seed,
            phase: GamePhase::WaitingToLaunch,
            transition_ms: 0.0,
            lives: config.lives,
            score,
            level,
            paddle,
            balls: Vec::new(),
            bricks: Vec::new(),
            power_ups: Vec::new(),
            active: ActivePowerUps::default(),
            lasers: Vec::new(),
            laser_cooldown_ms: 0.0,
            time_ticks: 0,
            events: Vec::new(),
            next_id: 1,
            config,
        };
        session.build_bricks();
        session.spawn_ball_stuck();
        log::info!(
            "New session (seed {}), level 1 with {} bricks",
            seed,
            session.bricks.len()
        );
        session
    }

    /// Allocate a new entity ID
    pub(crate) fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn lives(&self) -> u8 {
        self.lives
    }

    pub fn score(&self) -> &ScoreTracker {
        &self.score
    }

    pub fn level(&self) -> &LevelSystem {
        &self.level
    }

    pub fn paddle(&self) -> &Paddle {
        &self.paddle
    }

    pub fn balls(&self) -> &[Ball] {
        &self.balls
    }

    pub fn bricks(&self) -> &[Brick] {
        &self.bricks
    }

    pub fn power_ups(&self) -> &[PowerUp] {
        &self.power_ups
    }

    pub fn active_power_ups(&self) -> &ActivePowerUps {
        &self.active
    }

    pub fn lasers(&self) -> &[LaserBolt] {
        &self.lasers
    }

    pub fn time_ticks(&self) -> u64 {
        self.time_ticks
    }

    /// Take the events emitted since the last call
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Bricks that still have to be destroyed to clear the level
    pub fn remaining_destructible(&self) -> usize {
        self.bricks
            .iter()
            .filter(|b| b.counts_for_clear() && !b.is_destroyed())
            .count()
    }

    /// Base speed for balls spawned at the current level
    pub fn current_base_speed(&self) -> f32 {
        self.config.ball.base_speed * self.level.speed_multiplier()
    }

    pub(crate) fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Replace the brick field with the current level's layout
    pub(crate) fn build_bricks(&mut self) {
        let layout = self.level.layout(&self.config.bricks);
        let size = Vec2::new(self.config.bricks.width, self.config.bricks.height);
        let margin = self.config.bricks.offset_left;
        let mobile = MobileState {
            direction: 1.0,
            speed: self.config.bricks.mobile_speed,
            min_x: margin,
            max_x: self.config.field.width - margin,
        };

        self.bricks.clear();
        for placement in &layout {
            let id = self.next_entity_id();
            let points = placement.kind.points(&self.config.scoring);
            self.bricks
                .push(Brick::new(id, placement, size, points, Some(mobile)));
        }
    }

    /// Spawn a ball riding the centre of the paddle
    pub(crate) fn spawn_ball_stuck(&mut self) {
        let id = self.next_entity_id();
        let mut ball = Ball::new(id, Vec2::ZERO, self.current_base_speed(), self.config.ball);
        ball.state = BallState::Stuck { offset: 0.0 };
        ball.follow_paddle(&self.paddle);
        self.balls.push(ball);
    }

    /// Spawn a free ball and launch it at `angle` degrees
    pub(crate) fn spawn_ball_free(&mut self, pos: Vec2, angle: f32) {
        let id = self.next_entity_id();
        let mut ball = Ball::new(id, pos, self.current_base_speed(), self.config.ball);
        ball.launch(Some(angle), &mut self.rng);
        self.balls.push(ball);
    }
}
