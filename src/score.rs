//! Score and combo tracking
//!
//! Score grows by `floor(points × speed multiplier × (1 + combo × 0.1))` per
//! brick destroyed. The high score is persisted under [`HIGH_SCORE_KEY`].

use crate::persistence::{HIGH_SCORE_KEY, SharedStore};

/// Bonus fraction added per combo step
pub const COMBO_STEP: f64 = 0.1;

/// Points awarded for a brick at the given combo (pure)
pub fn combo_points(points: u32, speed_multiplier: f32, combo: u32) -> u64 {
    let bonus = 1.0 + combo as f64 * COMBO_STEP;
    let total = points as f64 * speed_multiplier as f64 * bonus;
    total.floor().max(0.0) as u64
}

/// Per-session score, combo and persisted high score
#[derive(Clone)]
pub struct ScoreTracker {
    score: u64,
    combo: u32,
    high_score: u64,
    store: Option<SharedStore>,
}

impl std::fmt::Debug for ScoreTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoreTracker")
            .field("score", &self.score)
            .field("combo", &self.combo)
            .field("high_score", &self.high_score)
            .finish()
    }
}

impl Default for ScoreTracker {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl ScoreTracker {
    /// Tracker backed by the given store; loads the high score immediately
    pub fn new(store: SharedStore) -> Self {
        let mut tracker = Self {
            score: 0,
            combo: 0,
            high_score: 0,
            store: Some(store),
        };
        tracker.load_high_score();
        tracker
    }

    /// Tracker without persistence
    pub fn in_memory() -> Self {
        Self {
            score: 0,
            combo: 0,
            high_score: 0,
            store: None,
        }
    }

    /// Award a destroyed brick. Returns the points actually added.
    pub fn add_score(&mut self, points: u32, speed_multiplier: f32) -> u64 {
        let total = combo_points(points, speed_multiplier, self.combo);
        self.score += total;
        self.combo += 1;

        if self.score > self.high_score {
            self.high_score = self.score;
            self.save_high_score();
        }
        total
    }

    pub fn reset_combo(&mut self) {
        self.combo = 0;
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn high_score(&self) -> u64 {
        self.high_score
    }

    /// True when this run set the stored record
    pub fn is_new_record(&self) -> bool {
        self.score > 0 && self.score == self.high_score
    }

    /// Write the high score to storage (failures are logged, never fatal)
    pub fn save_high_score(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(err) = store.set(HIGH_SCORE_KEY, &self.high_score.to_string()) {
            log::warn!("Failed to persist high score: {err}");
        }
    }

    /// Reload the high score; anything unreadable counts as 0
    pub fn load_high_score(&mut self) {
        let Some(store) = &self.store else {
            self.high_score = 0;
            return;
        };
        self.high_score = match store.get(HIGH_SCORE_KEY) {
            Ok(Some(raw)) => raw.trim().parse().unwrap_or(0),
            Ok(None) => 0,
            Err(err) => {
                log::warn!("High score unavailable ({err}), starting at 0");
                0
            }
        };
    }

    /// Start a new run; the high score is kept
    pub fn reset(&mut self) {
        self.score = 0;
        self.combo = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{KeyValueStore, MemoryStore, StorageError};
    use proptest::prelude::*;
    use std::sync::Arc;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable)
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable)
        }
    }

    #[test]
    fn test_combo_scales_points() {
        let mut tracker = ScoreTracker::in_memory();
        assert_eq!(tracker.add_score(10, 1.0), 10);
        assert_eq!(tracker.add_score(10, 1.0), 11);
        assert_eq!(tracker.add_score(10, 1.0), 12);
        assert_eq!(tracker.score(), 33);
        assert_eq!(tracker.combo(), 3);
    }

    #[test]
    fn test_speed_multiplier_and_floor() {
        let mut tracker = ScoreTracker::in_memory();
        // 25 × 1.21 = 30.25
        assert_eq!(tracker.add_score(25, 1.21), 30);
        // 15 × 1.1 × 1.1 = 18.15
        assert_eq!(tracker.add_score(15, 1.1), 18);
    }

    #[test]
    fn test_floor_is_exact() {
        for combo in 0..12 {
            assert_eq!(combo_points(10, 1.0, combo), 10 + combo as u64);
        }
        // 15 × 1.3 = 19.5
        assert_eq!(combo_points(15, 1.0, 3), 19);
        // 25 × 1.1 = 27.5
        assert_eq!(combo_points(25, 1.0, 1), 27);
    }

    #[test]
    fn test_reset_combo_only_touches_combo() {
        let mut tracker = ScoreTracker::in_memory();
        tracker.add_score(10, 1.0);
        tracker.add_score(10, 1.0);
        tracker.reset_combo();
        assert_eq!(tracker.combo(), 0);
        assert_eq!(tracker.score(), 21);
        assert_eq!(tracker.add_score(10, 1.0), 10);
    }

    #[test]
    fn test_high_score_persists_across_trackers() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let mut first = ScoreTracker::new(store.clone());
        first.add_score(10, 1.0);
        first.add_score(25, 1.0);
        assert_eq!(first.high_score(), 37);
        assert!(first.is_new_record());

        let mut second = ScoreTracker::new(store);
        assert_eq!(second.high_score(), 37);
        second.add_score(10, 1.0);
        assert_eq!(second.high_score(), 37);
        assert!(!second.is_new_record());
    }

    #[test]
    fn test_unreadable_high_score_defaults_to_zero() {
        let store = Arc::new(MemoryStore::new());
        store.set(HIGH_SCORE_KEY, "not-a-number").unwrap();
        let tracker = ScoreTracker::new(store);
        assert_eq!(tracker.high_score(), 0);
    }

    #[test]
    fn test_broken_storage_is_not_fatal() {
        let mut tracker = ScoreTracker::new(Arc::new(BrokenStore));
        assert_eq!(tracker.high_score(), 0);
        tracker.add_score(10, 1.0);
        tracker.save_high_score();
        assert_eq!(tracker.high_score(), 10);
    }

    #[test]
    fn test_reset_keeps_high_score() {
        let mut tracker = ScoreTracker::in_memory();
        tracker.add_score(10, 1.0);
        tracker.reset();
        assert_eq!(tracker.score(), 0);
        assert_eq!(tracker.combo(), 0);
        assert_eq!(tracker.high_score(), 10);
    }

    proptest! {
        #[test]
        fn prop_add_score_is_deterministic(
            points in 0u32..200,
            mult in 1.0f32..2.0,
            combo in 0u32..60,
        ) {
            let mut tracker = ScoreTracker::in_memory();
            tracker.combo = combo;
            let before = tracker.score();
            let awarded = tracker.add_score(points, mult);
            prop_assert_eq!(tracker.score() - before, awarded);
            prop_assert_eq!(awarded, combo_points(points, mult, combo));
            prop_assert_eq!(tracker.combo(), combo + 1);
            let exact = points as f64 * mult as f64 * (1.0 + combo as f64 * 0.1);
            prop_assert!((awarded as f64) <= exact + 1e-6);
            prop_assert!((awarded as f64) > exact - 1.0);
        }
    }
}
