//! Process-wide, TTL-bounded progress tracking for ingestion tasks.
//!
//! Entries expire after a fixed TTL so abandoned tasks do not accumulate.
//! The default read contract deliberately conflates "unknown task",
//! "not started", and "expired" into 0%: the polling caller races task
//! startup, so an unknown id is not an error. Callers that need to tell the
//! cases apart use [`ProgressTracker::try_get`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default entry lifetime: ten minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

#[derive(Clone, Copy, Debug)]
struct Entry {
    percent: u8,
    expires_at: Instant,
}

/// Keyed store of completion percentages with bounded lifetime.
///
/// Cheap to share: wrap in an `Arc` and call from any thread.
#[derive(Debug)]
pub struct ProgressTracker {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ProgressTracker {
    /// Creates a tracker whose entries live for `ttl` past their last update.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Records `percent` (clamped to 100) for `task_id`, restamping its TTL.
    pub fn set(&self, task_id: &str, percent: u8) {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            task_id.to_string(),
            Entry {
                percent: percent.min(100),
                expires_at: now + self.ttl,
            },
        );
    }

    /// Returns the stored percentage, or 0 for absent or expired entries.
    pub fn get(&self, task_id: &str) -> u8 {
        self.try_get(task_id).unwrap_or(0)
    }

    /// Returns the stored percentage, or `None` when the task is unknown or
    /// its entry has expired.
    pub fn try_get(&self, task_id: &str) -> Option<u8> {
        let entries = self.entries.lock();
        entries
            .get(task_id)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.percent)
    }

    /// Percentage after `completed` of `total` units, flooring like the
    /// ingestion loop: reaches exactly 100 only when all units are done.
    pub fn percent_of(completed: usize, total: usize) -> u8 {
        if total == 0 {
            return 100;
        }
        ((completed * 100) / total).min(100) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_task_reads_as_zero() {
        let tracker = ProgressTracker::default();
        assert_eq!(tracker.get("nope"), 0);
        assert_eq!(tracker.try_get("nope"), None);
    }

    #[test]
    fn set_then_get_round_trips() {
        let tracker = ProgressTracker::default();
        tracker.set("task", 37);
        assert_eq!(tracker.get("task"), 37);
        assert_eq!(tracker.try_get("task"), Some(37));
    }

    #[test]
    fn values_clamp_to_one_hundred() {
        let tracker = ProgressTracker::default();
        tracker.set("task", 250);
        assert_eq!(tracker.get("task"), 100);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let tracker = ProgressTracker::new(Duration::from_millis(20));
        tracker.set("task", 55);
        assert_eq!(tracker.get("task"), 55);

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(tracker.get("task"), 0);
        assert_eq!(tracker.try_get("task"), None);
    }

    #[test]
    fn percent_of_floors_and_completes() {
        assert_eq!(ProgressTracker::percent_of(1, 3), 33);
        assert_eq!(ProgressTracker::percent_of(2, 3), 66);
        assert_eq!(ProgressTracker::percent_of(3, 3), 100);
        assert_eq!(ProgressTracker::percent_of(0, 0), 100);
    }
}
