//! Shared leaderboard client
//!
//! Talks to the ranking service through a background worker (see [`http`]).
//! The last good list is cached in memory and in local storage, so a failed
//! call never wipes what the player already saw.

pub mod http;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::{HttpScoreService, LeaderboardReply, LeaderboardRequest, LeaderboardWorker};

use crate::config::LeaderboardConfig;
use crate::persistence::{LEADERBOARD_KEY, SharedStore};

/// Entries shown on the podium
pub const PODIUM_SIZE: usize = 3;

/// A ranked score as returned by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: u64,
    #[serde(default)]
    pub date: String,
}

/// Body of a score submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSubmission {
    pub name: String,
    pub score: u64,
}

#[derive(Debug, Error)]
pub enum LeaderboardError {
    #[error("leaderboard request timed out after {0:?}")]
    Timeout(Duration),
    #[error("leaderboard transport error: {0}")]
    Transport(String),
    #[error("leaderboard returned HTTP {0}")]
    Status(u16),
    #[error("malformed leaderboard payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid leaderboard request: {0}")]
    Request(String),
    #[error("no leaderboard service configured")]
    Offline,
    #[error("leaderboard worker stopped")]
    WorkerGone,
}

/// Remove HTML-like tags and stray angle brackets
fn strip_tags(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find(['<', '>']) {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if tail.starts_with('<') {
            if let Some(end) = tail.find('>') {
                rest = &tail[end + 1..];
                continue;
            }
        }
        rest = &tail[1..];
    }
    out.push_str(rest);
    out
}

/// Clean a player name for submission: strip tags, trim, cap at `max_len`
/// characters, fall back to `placeholder` when nothing is left.
pub fn sanitize_name(raw: &str, max_len: usize, placeholder: &str) -> String {
    let stripped = strip_tags(raw);
    let capped: String = stripped.trim().chars().take(max_len).collect();
    let capped = capped.trim_end();
    if capped.is_empty() {
        placeholder.to_string()
    } else {
        capped.to_string()
    }
}

/// Leaderboard state plus the channel to the request worker
pub struct LeaderboardClient {
    config: LeaderboardConfig,
    entries: Vec<LeaderboardEntry>,
    api_error: bool,
    pending: usize,
    submitting: usize,
    last_submission: Option<Result<(), LeaderboardError>>,
    worker: Option<LeaderboardWorker>,
    store: Option<SharedStore>,
}

impl std::fmt::Debug for LeaderboardClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaderboardClient")
            .field("entries", &self.entries)
            .field("api_error", &self.api_error)
            .field("pending", &self.pending)
            .field("last_submission", &self.last_submission)
            .field("online", &self.worker.is_some())
            .finish()
    }
}

impl LeaderboardClient {
    /// Connect to the configured service, or run offline without a base URL
    pub fn new(config: &LeaderboardConfig, store: Option<SharedStore>) -> Self {
        let worker = config.base_url.as_deref().and_then(|url| {
            match LeaderboardWorker::spawn(url, Duration::from_millis(config.timeout_ms)) {
                Ok(worker) => {
                    log::info!("Leaderboard service at {url}");
                    Some(worker)
                }
                Err(err) => {
                    log::warn!("Could not start leaderboard worker: {err}");
                    None
                }
            }
        });
        Self::with_worker(config, worker, store)
    }

    /// Client that never touches the network
    pub fn offline(config: &LeaderboardConfig, store: Option<SharedStore>) -> Self {
        Self::with_worker(config, None, store)
    }

    fn with_worker(
        config: &LeaderboardConfig,
        worker: Option<LeaderboardWorker>,
        store: Option<SharedStore>,
    ) -> Self {
        let mut client = Self {
            config: config.clone(),
            entries: Vec::new(),
            api_error: false,
            pending: 0,
            submitting: 0,
            last_submission: None,
            worker,
            store,
        };
        client.load_cache();
        client
    }

    pub fn is_online(&self) -> bool {
        self.worker.is_some()
    }

    /// Cached ranking, exactly as the service last returned it
    pub fn get_leaderboard(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    pub fn has_api_error(&self) -> bool {
        self.api_error
    }

    /// Requests sent but not yet answered
    pub fn is_pending(&self) -> bool {
        self.pending > 0
    }

    /// A submission is still waiting for its reply
    pub fn is_submitting(&self) -> bool {
        self.submitting > 0
    }

    /// Outcome of the most recent submission, once it has one
    pub fn last_submission(&self) -> Option<&Result<(), LeaderboardError>> {
        self.last_submission.as_ref()
    }

    /// Would `score` make the podium? Always false after a failed call.
    pub fn is_top3(&self, score: u64) -> bool {
        if self.api_error {
            return false;
        }
        match self.entries.get(PODIUM_SIZE - 1) {
            Some(third) => score > third.score,
            None => true,
        }
    }

    /// Ask the service for the current ranking
    pub fn refresh_leaderboard(&mut self) {
        if let Err(err) = self.dispatch(LeaderboardRequest::Fetch) {
            self.fail(&err);
        }
    }

    /// Submit a score under a sanitised name. Returns the name actually sent.
    pub fn add_to_leaderboard(&mut self, name: &str, score: u64) -> String {
        let name = sanitize_name(name, self.config.max_name_len, &self.config.placeholder_name);
        log::info!("Submitting {score} for {name}");
        self.last_submission = None;
        let request = LeaderboardRequest::Submit(ScoreSubmission {
            name: name.clone(),
            score,
        });
        match self.dispatch(request) {
            Ok(()) => self.submitting += 1,
            Err(err) => {
                self.fail(&err);
                self.last_submission = Some(Err(err));
            }
        }
        name
    }

    fn dispatch(&mut self, request: LeaderboardRequest) -> Result<(), LeaderboardError> {
        let worker = self.worker.as_ref().ok_or(LeaderboardError::Offline)?;
        worker.send(request)?;
        self.pending += 1;
        Ok(())
    }

    /// Apply every reply that has arrived. Returns how many were applied.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let Some(worker) = self.worker.as_mut() else {
                break;
            };
            match worker.try_recv() {
                Ok(Some(reply)) => {
                    self.apply(reply);
                    applied += 1;
                }
                Ok(None) => break,
                Err(err) => {
                    self.worker_lost(err);
                    break;
                }
            }
        }
        applied
    }

    /// Block until every in-flight request has been answered.
    ///
    /// The worker enforces the request timeout, so this always returns.
    pub fn wait_idle(&mut self) {
        while self.pending > 0 {
            let Some(worker) = self.worker.as_mut() else {
                self.pending = 0;
                break;
            };
            match worker.recv_blocking() {
                Ok(reply) => self.apply(reply),
                Err(err) => self.worker_lost(err),
            }
        }
    }

    /// Fold one reply into the cached state
    pub fn apply(&mut self, reply: LeaderboardReply) {
        self.pending = self.pending.saturating_sub(1);
        let submitted = matches!(reply, LeaderboardReply::Submitted(_));
        if submitted {
            self.submitting = self.submitting.saturating_sub(1);
        }
        match reply.into_result() {
            Ok(entries) => {
                log::debug!(
                    "Leaderboard {} ({} entries)",
                    if submitted { "updated" } else { "refreshed" },
                    entries.len()
                );
                self.entries = entries;
                self.api_error = false;
                self.save_cache();
                if submitted {
                    self.last_submission = Some(Ok(()));
                }
            }
            Err(err) => {
                self.fail(&err);
                if submitted {
                    self.last_submission = Some(Err(err));
                }
            }
        }
    }

    /// The worker thread is gone; nothing in flight will ever be answered
    fn worker_lost(&mut self, err: LeaderboardError) {
        self.worker = None;
        self.pending = 0;
        self.fail(&err);
        if self.submitting > 0 {
            self.submitting = 0;
            self.last_submission = Some(Err(err));
        }
    }

    fn fail(&mut self, err: &LeaderboardError) {
        log::warn!("Leaderboard unavailable: {err}");
        self.api_error = true;
    }

    fn load_cache(&mut self) {
        let Some(store) = &self.store else {
            return;
        };
        match store.get(LEADERBOARD_KEY) {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(entries) => self.entries = entries,
                Err(err) => log::warn!("Ignoring malformed leaderboard cache: {err}"),
            },
            Ok(None) => {}
            Err(err) => log::warn!("Leaderboard cache unavailable: {err}"),
        }
    }

    fn save_cache(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let result = serde_json::to_string(&self.entries)
            .map_err(|err| err.to_string())
            .and_then(|json| store.set(LEADERBOARD_KEY, &json).map_err(|err| err.to_string()));
        if let Err(err) = result {
            log::warn!("Failed to cache leaderboard: {err}");
        }
    }
}

impl Default for LeaderboardClient {
    fn default() -> Self {
        Self::offline(&LeaderboardConfig::default(), None)
    }
}
