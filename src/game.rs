//! Scene state machine
//!
//! Menu → Playing ⇄ Paused → GameOver / Victory → Menu. Hosts one
//! [`GameSession`] at a time and drives it with a fixed-step accumulator.

use crate::config::GameConfig;
use crate::consts::{MAX_SUBSTEPS, SIM_DT};
use crate::leaderboard::LeaderboardClient;
use crate::persistence::SharedStore;
use crate::score::ScoreTracker;
use crate::sim::{GameEvent, GamePhase, GameSession, TickInput, tick};

/// Top-level scene
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scene {
    Menu,
    Playing,
    Paused,
    GameOver,
    Victory,
}

impl Scene {
    /// A finished run whose score can be submitted
    pub fn is_terminal(&self) -> bool {
        matches!(self, Scene::GameOver | Scene::Victory)
    }
}

/// Where the finished run's leaderboard submission stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    NotSent,
    Pending,
    Accepted,
    /// The service rejected it or never answered; it can be sent again
    Failed,
}

pub struct Game {
    config: GameConfig,
    store: SharedStore,
    scene: Scene,
    session: Option<GameSession>,
    leaderboard: LeaderboardClient,
    seed: u64,
    runs: u64,
    accumulator: f32,
    submission_sent: bool,
}

impl Game {
    /// Game with a leaderboard client built from the config
    pub fn new(config: GameConfig, store: SharedStore, seed: u64) -> Self {
        let leaderboard = LeaderboardClient::new(&config.leaderboard, Some(store.clone()));
        Self::with_leaderboard(config, store, leaderboard, seed)
    }

    pub fn with_leaderboard(
        config: GameConfig,
        store: SharedStore,
        leaderboard: LeaderboardClient,
        seed: u64,
    ) -> Self {
        let mut game = Self {
            config,
            store,
            scene: Scene::Menu,
            session: None,
            leaderboard,
            seed,
            runs: 0,
            accumulator: 0.0,
            submission_sent: false,
        };
        game.refresh_leaderboard();
        game
    }

    pub fn scene(&self) -> Scene {
        self.scene
    }

    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    pub fn leaderboard(&self) -> &LeaderboardClient {
        &self.leaderboard
    }

    pub fn leaderboard_mut(&mut self) -> &mut LeaderboardClient {
        &mut self.leaderboard
    }

    /// Best score on record, including the current run
    pub fn high_score(&self) -> u64 {
        match &self.session {
            Some(session) => session.score().high_score(),
            None => ScoreTracker::new(self.store.clone()).high_score(),
        }
    }

    /// Start a fresh run (from the menu or a finished run)
    pub fn start_game(&mut self) {
        self.runs += 1;
        let seed = self.seed.wrapping_add(self.runs);
        let score = ScoreTracker::new(self.store.clone());
        self.session = Some(GameSession::new(self.config.clone(), score, seed));
        self.scene = Scene::Playing;
        self.accumulator = 0.0;
        self.submission_sent = false;
        log::info!("Run {} started (seed {seed})", self.runs);
    }

    pub fn toggle_pause(&mut self) {
        match self.scene {
            Scene::Playing => {
                self.scene = Scene::Paused;
                log::info!("Paused");
            }
            Scene::Paused => {
                self.scene = Scene::Playing;
                self.accumulator = 0.0;
                log::info!("Resumed");
            }
            _ => {}
        }
    }

    /// Abandon or leave the current run
    pub fn return_to_menu(&mut self) {
        self.session = None;
        self.scene = Scene::Menu;
        self.accumulator = 0.0;
        self.refresh_leaderboard();
    }

    /// Advance by one rendered frame. Returns the events emitted this frame.
    pub fn update(&mut self, input: &TickInput, frame_dt: f32) -> Vec<GameEvent> {
        self.leaderboard.poll();

        if input.pause {
            self.toggle_pause();
        }
        if self.scene != Scene::Playing {
            return Vec::new();
        }
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };

        self.accumulator += frame_dt.min(0.1);
        let mut input = TickInput {
            pause: false,
            ..*input
        };

        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            tick(session, &input, SIM_DT);
            self.accumulator -= SIM_DT;
            substeps += 1;

            // One-shot inputs only apply to the first substep
            input.launch = false;

            if session.phase().is_terminal() {
                break;
            }
        }

        let events = session.drain_events();
        let phase = session.phase();
        let score = session.score().score();
        match phase {
            GamePhase::GameOver => self.finish_run(Scene::GameOver, score),
            GamePhase::Victory => self.finish_run(Scene::Victory, score),
            _ => {}
        }
        events
    }

    fn finish_run(&mut self, scene: Scene, score: u64) {
        self.scene = scene;
        self.accumulator = 0.0;
        log::info!("Run finished: {scene:?} with {score} points");
        self.refresh_leaderboard();
    }

    fn refresh_leaderboard(&mut self) {
        if self.leaderboard.is_online() {
            self.leaderboard.refresh_leaderboard();
        }
    }

    /// Score of the finished run, if there is one
    pub fn final_score(&self) -> Option<u64> {
        if !self.scene.is_terminal() {
            return None;
        }
        self.session.as_ref().map(|s| s.score().score())
    }

    /// State of this run's submission, as last reported by the client
    pub fn submission_state(&self) -> SubmissionState {
        if !self.submission_sent {
            return SubmissionState::NotSent;
        }
        if self.leaderboard.is_submitting() {
            return SubmissionState::Pending;
        }
        match self.leaderboard.last_submission() {
            Some(Ok(())) => SubmissionState::Accepted,
            Some(Err(_)) => SubmissionState::Failed,
            None => SubmissionState::Pending,
        }
    }

    /// Finished run that beats the podium and has no accepted or in-flight
    /// submission. A failed submission can be retried.
    pub fn can_submit_score(&self) -> bool {
        let open = matches!(
            self.submission_state(),
            SubmissionState::NotSent | SubmissionState::Failed
        );
        match self.final_score() {
            Some(score) => {
                score > 0
                    && open
                    && self.leaderboard.is_online()
                    && self.leaderboard.is_top3(score)
            }
            None => false,
        }
    }

    /// Submit the finished run. Returns the sanitised name that was sent.
    pub fn submit_score(&mut self, name: &str) -> Option<String> {
        if !self.can_submit_score() {
            return None;
        }
        let score = self.final_score()?;
        if self.submission_state() == SubmissionState::Failed {
            log::info!("Retrying leaderboard submission");
        }
        self.submission_sent = true;
        Some(self.leaderboard.add_to_leaderboard(name, score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::{LeaderboardEntry, ScoreSubmission};
    use crate::persistence::MemoryStore;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use glam::Vec2;
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn offline_game() -> Game {
        let mut config = GameConfig::default();
        config.powerups.spawn_chance = 0.0;
        let leaderboard = LeaderboardClient::offline(&config.leaderboard, None);
        Game::with_leaderboard(config, MemoryStore::shared(), leaderboard, 3)
    }

    fn idle() -> TickInput {
        TickInput::default()
    }

    fn pause() -> TickInput {
        TickInput {
            pause: true,
            ..TickInput::default()
        }
    }

    #[test]
    fn test_starts_in_menu() {
        let mut game = offline_game();
        assert_eq!(game.scene(), Scene::Menu);
        assert!(game.session().is_none());
        assert!(game.update(&idle(), SIM_DT).is_empty());
        assert!(!game.leaderboard().has_api_error());
    }

    #[test]
    fn test_fixed_steps_per_frame() {
        let mut game = offline_game();
        game.start_game();
        game.update(&idle(), 1.0 / 60.0);
        assert_eq!(game.session().unwrap().time_ticks(), 2);
    }

    #[test]
    fn test_substeps_are_capped() {
        let mut game = offline_game();
        game.start_game();
        game.update(&idle(), 5.0);
        assert_eq!(game.session().unwrap().time_ticks(), MAX_SUBSTEPS as u64);
    }

    #[test]
    fn test_pause_freezes_simulation() {
        let mut game = offline_game();
        game.start_game();
        game.update(&pause(), SIM_DT);
        assert_eq!(game.scene(), Scene::Paused);
        for _ in 0..10 {
            game.update(&idle(), SIM_DT);
        }
        assert_eq!(game.session().unwrap().time_ticks(), 0);

        game.update(&pause(), SIM_DT);
        assert_eq!(game.scene(), Scene::Playing);
        assert_eq!(game.session().unwrap().time_ticks(), 1);
    }

    #[test]
    fn test_pause_ignored_outside_play() {
        let mut game = offline_game();
        game.update(&pause(), SIM_DT);
        assert_eq!(game.scene(), Scene::Menu);
    }

    #[test]
    fn test_launch_applies_once_per_frame() {
        let mut game = offline_game();
        game.start_game();
        let launch = TickInput {
            launch: true,
            ..TickInput::default()
        };
        let events = game.update(&launch, 1.0 / 30.0);
        let launches = events
            .iter()
            .filter(|e| matches!(e, GameEvent::BallLaunched { .. }))
            .count();
        assert_eq!(launches, 1);
        assert_eq!(game.session().unwrap().phase(), GamePhase::Playing);
    }

    /// Play until the last life drains with `score` points on the board
    fn lose_run(game: &mut Game, score: u32) -> Vec<GameEvent> {
        game.start_game();
        game.update(
            &TickInput {
                launch: true,
                ..TickInput::default()
            },
            SIM_DT,
        );

        let session = game.session.as_mut().unwrap();
        session.lives = 1;
        session.score.add_score(score, 1.0);
        session.balls[0].pos = Vec2::new(400.0, 650.0);
        session.balls[0].vel = Vec2::new(0.0, 400.0);

        game.update(&idle(), SIM_DT)
    }

    #[derive(Clone, Default)]
    struct FlakyScores {
        posts: Arc<AtomicUsize>,
        entries: Arc<Mutex<Vec<LeaderboardEntry>>>,
    }

    async fn list_scores(State(scores): State<FlakyScores>) -> Json<Vec<LeaderboardEntry>> {
        Json(scores.entries.lock().unwrap().clone())
    }

    /// Rejects the first submission, accepts the rest
    async fn add_score(
        State(scores): State<FlakyScores>,
        Json(submission): Json<ScoreSubmission>,
    ) -> Response {
        if scores.posts.fetch_add(1, Ordering::SeqCst) == 0 {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        let mut entries = scores.entries.lock().unwrap();
        entries.push(LeaderboardEntry {
            name: submission.name,
            score: submission.score,
            date: String::new(),
        });
        Json(entries.clone()).into_response()
    }

    fn spawn_flaky_service(scores: FlakyScores) -> String {
        let std_listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        std_listener.set_nonblocking(true).expect("nonblocking");
        let addr = std_listener.local_addr().expect("addr");
        std::thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().expect("runtime");
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(std_listener).expect("listener");
                let app = Router::new()
                    .route("/scores", get(list_scores).post(add_score))
                    .with_state(scores);
                let _ = axum::serve(listener, app).await;
            });
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_failed_submission_can_be_retried() {
        let scores = FlakyScores::default();
        let mut config = GameConfig::default();
        config.powerups.spawn_chance = 0.0;
        config.leaderboard.base_url = Some(spawn_flaky_service(scores.clone()));
        let leaderboard = LeaderboardClient::new(&config.leaderboard, None);
        let mut game = Game::with_leaderboard(config, MemoryStore::shared(), leaderboard, 3);

        lose_run(&mut game, 10);
        assert_eq!(game.scene(), Scene::GameOver);
        game.leaderboard_mut().wait_idle();
        assert!(game.can_submit_score());
        assert_eq!(game.submission_state(), SubmissionState::NotSent);

        assert_eq!(game.submit_score("neo").as_deref(), Some("neo"));
        assert_eq!(game.submission_state(), SubmissionState::Pending);
        assert!(!game.can_submit_score(), "one submission in flight at a time");

        game.leaderboard_mut().wait_idle();
        assert_eq!(game.submission_state(), SubmissionState::Failed);
        assert!(game.leaderboard().has_api_error());

        // The next good fetch clears the error and reopens the gate
        game.leaderboard_mut().refresh_leaderboard();
        game.leaderboard_mut().wait_idle();
        assert!(game.can_submit_score());

        assert_eq!(game.submit_score("neo").as_deref(), Some("neo"));
        game.leaderboard_mut().wait_idle();
        assert_eq!(game.submission_state(), SubmissionState::Accepted);
        assert!(!game.can_submit_score());
        assert_eq!(game.submit_score("neo"), None);
        assert_eq!(scores.posts.load(Ordering::SeqCst), 2);
        assert_eq!(game.leaderboard().get_leaderboard()[0].name, "neo");

        // A new run starts with a fresh gate
        game.start_game();
        assert_eq!(game.submission_state(), SubmissionState::NotSent);
    }

    #[test]
    fn test_game_over_scene_and_submission_gate() {
        let mut game = offline_game();
        let events = lose_run(&mut game, 10);
        assert!(events.iter().any(|e| matches!(e, GameEvent::GameOver { .. })));
        assert_eq!(game.scene(), Scene::GameOver);
        assert_eq!(game.final_score(), Some(10));
        assert_eq!(game.high_score(), 10);
        // Offline: nothing to submit to
        assert!(!game.can_submit_score());
        assert_eq!(game.submit_score("neo"), None);

        game.start_game();
        assert_eq!(game.scene(), Scene::Playing);
        assert_eq!(game.final_score(), None);
        assert_eq!(game.high_score(), 10, "high score survives a new run");
    }

    #[test]
    fn test_return_to_menu_drops_session() {
        let mut game = offline_game();
        game.start_game();
        game.update(&idle(), SIM_DT);
        game.return_to_menu();
        assert_eq!(game.scene(), Scene::Menu);
        assert!(game.session().is_none());
    }

    #[test]
    fn test_runs_use_distinct_seeds() {
        let mut game = offline_game();
        game.start_game();
        let first = game.session().unwrap().seed();
        game.start_game();
        assert_ne!(first, game.session().unwrap().seed());
    }
}
