//! Neon Breakout - headless driver
//!
//! Plays one run on autopilot and logs what happens. Rendering and input
//! wiring live in the frontend; this binary exercises the engine on its own.
//!
//! Usage: `neon-breakout [seed] [player-name]`

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use neon_breakout::config::GameConfig;
use neon_breakout::persistence::{FileStore, SharedStore};
use neon_breakout::sim::{GameEvent, autopilot_input};
use neon_breakout::{Game, Scene, SubmissionState};

/// Ten minutes of 60 fps frames
const MAX_FRAMES: u32 = 60 * 60 * 10;
const FRAME_DT: f32 = 1.0 / 60.0;

fn main() {
    env_logger::init();
    log::info!("Neon Breakout (headless) starting...");

    let mut args = std::env::args().skip(1);
    let seed = args
        .next()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0)
        });
    let player = args.next().unwrap_or_default();

    let file_store = FileStore::default_location();
    log::info!("Storage at {}", file_store.dir().display());
    let store: SharedStore = Arc::new(file_store);
    let config = GameConfig::load(store.as_ref());

    let mut game = Game::new(config, store, seed);
    log::info!("High score on record: {}", game.high_score());
    game.start_game();

    let mut frames = 0;
    while frames < MAX_FRAMES && game.scene() == Scene::Playing {
        let input = match game.session() {
            Some(session) => autopilot_input(session),
            None => break,
        };
        for event in game.update(&input, FRAME_DT) {
            log_event(&event);
        }
        frames += 1;
    }

    let (level, ticks) = game
        .session()
        .map(|s| (s.level().current_level(), s.time_ticks()))
        .unwrap_or((1, 0));
    match game.final_score() {
        Some(score) => println!(
            "{:?} on level {level}: {score} points ({ticks} ticks)",
            game.scene()
        ),
        None => println!("Stopped after {frames} frames on level {level}"),
    }

    // Let the post-run leaderboard refresh land before deciding on submission
    game.leaderboard_mut().wait_idle();
    if game.can_submit_score() {
        if let Some(name) = game.submit_score(&player) {
            game.leaderboard_mut().wait_idle();
            match game.submission_state() {
                SubmissionState::Accepted => println!("Submitted as {name}"),
                _ => println!("Submission failed, try again later"),
            }
        }
    }

    let board = game.leaderboard();
    if board.has_api_error() {
        println!("Leaderboard unavailable");
    }
    for (rank, entry) in board.get_leaderboard().iter().take(3).enumerate() {
        println!("{}. {:<12} {:>8}", rank + 1, entry.name.to_uppercase(), entry.score);
    }
}

fn log_event(event: &GameEvent) {
    match event {
        GameEvent::LevelStarted {
            level,
            speed_multiplier,
        } => log::info!("Level {level} (speed x{speed_multiplier:.2})"),
        GameEvent::LifeLost { lives_remaining } => log::info!("Lives left: {lives_remaining}"),
        GameEvent::PowerUpCollected { kind } => log::info!("Power-up: {kind:?}"),
        GameEvent::BrickDestroyed { points, combo, .. } => {
            log::debug!("+{points} (combo {combo})")
        }
        _ => log::trace!("{event:?}"),
    }
}
