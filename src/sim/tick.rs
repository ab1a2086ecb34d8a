//! Fixed timestep simulation tick
//!
//! Core game loop that advances a session deterministically.

use glam::Vec2;

use super::collision::{bounce_axis, bounce_off_walls, circle_overlaps_rect, reflect_velocity};
use super::state::{
    GameEvent, GamePhase, GameSession, LASER_SIZE, LaserBolt, PaddleIntent, PowerUp, PowerUpKind,
    hit_factor,
};

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickInput {
    /// Keyboard left held
    pub left: bool,
    /// Keyboard right held
    pub right: bool,
    /// Absolute paddle target (mouse/touch x)
    pub pointer_x: Option<f32>,
    /// Launch stuck balls, or fire the laser when none are stuck
    pub launch: bool,
    /// Pause toggle (handled by the scene layer)
    pub pause: bool,
}

/// Advance the session by one fixed timestep
pub fn tick(session: &mut GameSession, input: &TickInput, dt: f32) {
    if session.phase.is_terminal() {
        return;
    }
    session.time_ticks += 1;

    session.paddle.intent = PaddleIntent {
        left: input.left,
        right: input.right,
        pointer_x: input.pointer_x,
    };
    session.paddle.update(dt);

    match session.phase {
        GamePhase::WaitingToLaunch | GamePhase::Playing => {
            pin_stuck_balls(session);
            if input.launch {
                launch_or_fire(session);
            }
            simulate(session, dt);
        }
        GamePhase::LevelTransition => {
            pin_stuck_balls(session);
            if count_down(&mut session.transition_ms, dt) {
                finish_level(session);
            }
        }
        GamePhase::BallLost => {
            if count_down(&mut session.transition_ms, dt) {
                session.spawn_ball_stuck();
                session.phase = GamePhase::WaitingToLaunch;
                log::debug!("Ball respawned, {} lives left", session.lives);
            }
        }
        GamePhase::GameOver | GamePhase::Victory => {}
    }
}

/// Drive the paddle toward the most urgent ball, launching when stuck.
///
/// Used by the headless driver and soak tests; the aim point drifts over time
/// so rallies don't lock into a vertical loop.
pub fn autopilot_input(session: &GameSession) -> TickInput {
    let paddle = session.paddle();
    let waiting = session.balls().iter().any(|b| b.is_stuck());

    let lead = ((session.time_ticks() / 240) % 5) as f32 - 2.0;
    let target = session
        .balls()
        .iter()
        .filter(|b| !b.is_stuck() && b.vel.y > 0.0)
        .max_by(|a, b| a.pos.y.total_cmp(&b.pos.y))
        .map(|b| b.pos.x + lead * paddle.width() * 0.15);

    TickInput {
        pointer_x: target.or(Some(paddle.x)),
        launch: waiting,
        ..TickInput::default()
    }
}

fn count_down(timer_ms: &mut f32, dt: f32) -> bool {
    *timer_ms -= dt * 1000.0;
    *timer_ms <= 0.0
}

fn pin_stuck_balls(session: &mut GameSession) {
    let paddle = &session.paddle;
    for ball in session.balls.iter_mut().filter(|b| b.is_stuck()) {
        ball.follow_paddle(paddle);
    }
}

fn launch_or_fire(session: &mut GameSession) {
    let (paddle_x, paddle_width) = (session.paddle.x, session.paddle.width());
    let mut launched = Vec::new();
    for ball in session.balls.iter_mut().filter(|b| b.is_stuck()) {
        ball.unstick(paddle_x, paddle_width);
        launched.push(ball.id);
    }

    if launched.is_empty() {
        if session.phase == GamePhase::Playing {
            fire_laser(session);
        }
        return;
    }

    session.score.reset_combo();
    session.phase = GamePhase::Playing;
    for ball_id in launched {
        session.emit(GameEvent::BallLaunched { ball_id });
    }
}

fn fire_laser(session: &mut GameSession) {
    if !session.active.contains(PowerUpKind::Laser) || session.laser_cooldown_ms > 0.0 {
        return;
    }
    let x = session.paddle.x;
    let y = session.paddle.top() - LASER_SIZE.y / 2.0;
    let inset = session.paddle.width() / 2.0 - 4.0;
    let vel = Vec2::new(0.0, -session.config.powerups.laser_speed);

    for dx in [-inset, inset] {
        let id = session.next_entity_id();
        session.lasers.push(LaserBolt {
            id,
            pos: Vec2::new(x + dx, y),
            vel,
        });
    }
    session.laser_cooldown_ms = session.config.powerups.laser_cooldown_ms;
    session.emit(GameEvent::LaserFired);
}

fn simulate(session: &mut GameSession, dt: f32) {
    let dt_ms = dt * 1000.0;

    for brick in &mut session.bricks {
        brick.update(dt);
    }

    move_balls(session, dt);
    paddle_contacts(session);
    brick_contacts(session);
    update_lasers(session, dt);
    session.laser_cooldown_ms = (session.laser_cooldown_ms - dt_ms).max(0.0);

    session.bricks.retain(|b| !b.is_destroyed());
    if session.remaining_destructible() == 0 {
        begin_level_transition(session);
        return;
    }

    update_power_ups(session, dt);

    if drain_lost_balls(session) {
        return;
    }

    for kind in session.active.tick(dt_ms) {
        log::debug!("{kind:?} expired");
        session.emit(GameEvent::PowerUpExpired { kind });
    }

    // Every ball caught by sticky: back to waiting for launch
    if session.phase == GamePhase::Playing
        && !session.balls.is_empty()
        && session.balls.iter().all(|b| b.is_stuck())
    {
        session.phase = GamePhase::WaitingToLaunch;
    }
}

fn move_balls(session: &mut GameSession, dt: f32) {
    let field_width = session.config.field.width;
    let paddle = &session.paddle;
    let mut mega_expired = Vec::new();

    for ball in &mut session.balls {
        if ball.is_stuck() {
            ball.follow_paddle(paddle);
            continue;
        }
        ball.pos += ball.vel * dt;
        bounce_off_walls(&mut ball.pos, &mut ball.vel, ball.radius, field_width);
        ball.enforce_speed_limits();
        if ball.update_mega(dt) {
            mega_expired.push(ball.id);
        }
    }

    for ball_id in mega_expired {
        session.emit(GameEvent::MegaExpired { ball_id });
    }
}

fn paddle_contacts(session: &mut GameSession) {
    let paddle = &session.paddle;
    let rect = paddle.bounds();
    let sticky = session.active.contains(PowerUpKind::Sticky);

    let mut stuck = None;
    let mut bounced = Vec::new();
    for ball in &mut session.balls {
        if ball.is_stuck()
            || ball.vel.y <= 0.0
            || !circle_overlaps_rect(ball.pos, ball.radius, &rect)
        {
            continue;
        }

        // Sticky is a single charge
        if sticky && stuck.is_none() {
            ball.stick(paddle.x);
            ball.follow_paddle(paddle);
            stuck = Some(ball.id);
            continue;
        }

        let factor = hit_factor(ball.pos.x, paddle.x, paddle.width());
        ball.handle_paddle_collision(paddle);
        ball.pos.y = rect.top() - ball.radius;
        bounced.push((ball.id, factor));
    }

    if let Some(ball_id) = stuck {
        session.active.remove(PowerUpKind::Sticky);
        session.emit(GameEvent::BallStuck { ball_id });
    }
    if !bounced.is_empty() {
        session.score.reset_combo();
    }
    for (ball_id, hit_factor) in bounced {
        session.emit(GameEvent::PaddleBounce { ball_id, hit_factor });
    }
}

fn brick_contacts(session: &mut GameSession) {
    let acceleration = session.config.ball.acceleration;

    for i in 0..session.balls.len() {
        let hits = {
            let ball = &mut session.balls[i];
            if ball.is_stuck() {
                continue;
            }
            let bricks = &session.bricks;
            let (pos, radius) = (ball.pos, ball.radius);

            // Forget bricks the ball has left
            ball.inside_bricks.retain(|id| {
                bricks.iter().any(|b| {
                    b.id == *id && !b.is_destroyed() && circle_overlaps_rect(pos, radius, &b.bounds())
                })
            });

            let mut hits = Vec::new();
            let mut bounced = false;
            for (idx, brick) in bricks.iter().enumerate() {
                if brick.is_destroyed() || ball.inside_bricks.contains(&brick.id) {
                    continue;
                }
                let rect = brick.bounds();
                if !circle_overlaps_rect(pos, radius, &rect) {
                    continue;
                }
                ball.inside_bricks.push(brick.id);
                if !ball.is_mega() && !bounced {
                    ball.vel = reflect_velocity(ball.vel, bounce_axis(pos, &rect));
                    bounced = true;
                }
                hits.push(idx);
            }
            hits
        };

        for idx in hits {
            damage_brick(session, idx);
            session.balls[i].accelerate(acceleration);
        }
    }
}

/// Apply one hit to a brick, scoring and rolling a drop if it breaks
fn damage_brick(session: &mut GameSession, idx: usize) {
    let brick = &mut session.bricks[idx];
    if brick.is_destroyed() {
        return;
    }
    let destroyed = brick.hit();
    let (brick_id, pos, kind, color_index, points, health) = (
        brick.id,
        brick.pos,
        brick.kind,
        brick.color_index,
        brick.points(),
        brick.health(),
    );

    if !destroyed {
        session.emit(GameEvent::BrickHit {
            brick_id,
            pos,
            kind,
            health,
        });
        return;
    }

    let multiplier = session.level.speed_multiplier();
    let awarded = session.score.add_score(points, multiplier);
    session.emit(GameEvent::BrickDestroyed {
        brick_id,
        pos,
        kind,
        color_index,
        points: awarded,
        combo: session.score.combo(),
    });

    let pickup_id = session.next_entity_id();
    if let Some(pickup) =
        PowerUp::create_random(&mut session.rng, pickup_id, pos, &session.config.powerups)
    {
        session.emit(GameEvent::PowerUpSpawned {
            kind: pickup.kind,
            pos,
        });
        session.power_ups.push(pickup);
    }
}

fn update_lasers(session: &mut GameSession, dt: f32) {
    if session.lasers.is_empty() {
        return;
    }
    let bricks = &session.bricks;
    let mut hits = Vec::new();
    session.lasers.retain_mut(|bolt| {
        bolt.pos += bolt.vel * dt;
        let rect = bolt.bounds();
        if let Some(idx) = bricks
            .iter()
            .position(|b| !b.is_destroyed() && b.bounds().overlaps(&rect))
        {
            hits.push(idx);
            return false;
        }
        bolt.pos.y >= -LASER_SIZE.y
    });

    for idx in hits {
        damage_brick(session, idx);
    }
}

fn update_power_ups(session: &mut GameSession, dt: f32) {
    let paddle_rect = session.paddle.bounds();
    let bottom = session.config.field.height + 30.0;
    let ball_collects = session.config.powerups.ball_collects;
    let balls = &session.balls;

    let mut collected = Vec::new();
    session.power_ups.retain_mut(|pickup| {
        pickup.update(dt);
        let rect = pickup.bounds();
        let caught = rect.overlaps(&paddle_rect)
            || (ball_collects
                && balls
                    .iter()
                    .any(|b| circle_overlaps_rect(b.pos, b.radius, &rect)));
        if caught {
            collected.push(pickup.kind);
            return false;
        }
        pickup.pos.y <= bottom
    });

    for kind in collected {
        apply_power_up(session, kind);
    }
}

/// Apply a collected power-up's effect
pub(crate) fn apply_power_up(session: &mut GameSession, kind: PowerUpKind) {
    let duration = session.config.powerups.duration_ms;
    match kind {
        PowerUpKind::MultiBall => {
            let offset = Vec2::new(session.config.powerups.multiball_offset, 0.0);
            let [left_angle, right_angle] = session.config.powerups.multiball_angles;
            let origins: Vec<Vec2> = session
                .balls
                .iter()
                .filter(|b| !b.is_stuck())
                .map(|b| b.pos)
                .collect();
            for pos in origins {
                session.spawn_ball_free(pos - offset, left_angle);
                session.spawn_ball_free(pos + offset, right_angle);
            }
        }
        PowerUpKind::Sticky => session.active.insert(PowerUpKind::Sticky, duration),
        PowerUpKind::Mega => {
            for ball in &mut session.balls {
                ball.set_mega(Some(duration));
            }
            session.active.insert(PowerUpKind::Mega, duration);
        }
        PowerUpKind::Laser => session.active.insert(PowerUpKind::Laser, duration),
    }
    log::debug!("Collected {kind:?}, {} balls in play", session.balls.len());
    session.emit(GameEvent::PowerUpCollected { kind });
}

/// Remove balls below the field. Returns true if that cost a life.
fn drain_lost_balls(session: &mut GameSession) -> bool {
    let limit = session.config.field.height + session.config.field.loss_margin;
    let mut drained = Vec::new();
    session.balls.retain(|b| {
        if b.pos.y > limit {
            drained.push(b.id);
            false
        } else {
            true
        }
    });
    for ball_id in drained {
        session.emit(GameEvent::BallDrained { ball_id });
    }

    if session.balls.is_empty() {
        lose_life(session);
        return true;
    }
    false
}

fn lose_life(session: &mut GameSession) {
    session.lives = session.lives.saturating_sub(1);
    session.power_ups.clear();
    session.lasers.clear();
    session.active.clear();
    session.emit(GameEvent::LifeLost {
        lives_remaining: session.lives,
    });

    if session.lives == 0 {
        session.phase = GamePhase::GameOver;
        session.score.save_high_score();
        log::info!(
            "Game over on level {} with {} points",
            session.level.current_level(),
            session.score.score()
        );
        session.emit(GameEvent::GameOver {
            score: session.score.score(),
            high_score: session.score.high_score(),
        });
        return;
    }

    log::info!("Life lost, {} remaining", session.lives);
    session.paddle.reset();
    session.phase = GamePhase::BallLost;
    session.transition_ms = session.config.respawn_delay_ms;
}

fn begin_level_transition(session: &mut GameSession) {
    let level = session.level.current_level();
    log::info!("Level {level} cleared");
    session.phase = GamePhase::LevelTransition;
    session.transition_ms = session.config.levels.transition_delay_ms;
    session.emit(GameEvent::LevelComplete { level });
}

fn finish_level(session: &mut GameSession) {
    if session.level.is_last_level() {
        session.phase = GamePhase::Victory;
        session.score.save_high_score();
        log::info!("Victory with {} points", session.score.score());
        session.emit(GameEvent::Victory {
            score: session.score.score(),
            high_score: session.score.high_score(),
        });
        return;
    }

    session.level.next_level();
    session.balls.clear();
    session.power_ups.clear();
    session.lasers.clear();
    session.active.clear();
    session.build_bricks();
    session.spawn_ball_stuck();
    session.phase = GamePhase::WaitingToLaunch;

    let level = session.level.current_level();
    let speed_multiplier = session.level.speed_multiplier();
    log::info!(
        "Starting level {level} ({} bricks, speed x{speed_multiplier:.2})",
        session.bricks.len()
    );
    session.emit(GameEvent::LevelStarted {
        level,
        speed_multiplier,
    });
}
