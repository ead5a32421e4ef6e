//! Task Registry
//!
//! Ordered collection of progress-bar tasks owned by the render server.
//! Insertion order is display order.
//!
//! # Lifecycle
//!
//! ```text
//! NewTask ──▶ Active ──(progress == total)──▶ Completing
//!                                                  │ first sweep (unless keep_alive)
//!                                                  ▼
//!                                           PendingRemoval ──(delay elapsed)──▶ removed
//! ```
//!
//! Progress is clamped when it is written ([`TaskRegistry::apply_progress`]),
//! so every reader may rely on `0 <= progress <= total`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use unicode_width::UnicodeWidthStr;

use crate::commands::{TaskKey, TaskSpec};

/// Where a task is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskPhase {
    /// Still making progress
    Active,
    /// Reached its total, removal timer not started (or kept alive)
    Completing,
    /// Removal timer running
    PendingRemoval,
}

/// A tracked unit of progress
#[derive(Clone, Debug)]
pub struct Task {
    spec: TaskSpec,
    progress: u64,
    started_at: Instant,
    ended_at: Option<Instant>,
    frozen_elapsed: Option<Duration>,
    removal_started_at: Option<Instant>,
}

impl Task {
    /// Create a task at progress zero
    #[must_use]
    pub fn new(spec: TaskSpec, now: Instant) -> Self {
        let mut task = Self {
            spec,
            progress: 0,
            started_at: now,
            ended_at: None,
            frozen_elapsed: None,
            removal_started_at: None,
        };
        // A zero total is complete on arrival
        task.observe_completion(now);
        task
    }

    /// Display and lifecycle attributes
    #[must_use]
    pub fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    /// Current iteration count
    #[must_use]
    pub fn progress(&self) -> u64 {
        self.progress
    }

    /// Iteration count at completion, if known
    #[must_use]
    pub fn total(&self) -> Option<u64> {
        self.spec.total
    }

    /// When the task was created
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// When the task first reached its total (only tracked with elapsed display)
    #[must_use]
    pub fn ended_at(&self) -> Option<Instant> {
        self.ended_at
    }

    /// Elapsed time frozen at completion
    #[must_use]
    pub fn frozen_elapsed(&self) -> Option<Duration> {
        self.frozen_elapsed
    }

    /// Whether progress has reached a known total
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.spec.total.is_some_and(|total| self.progress == total)
    }

    /// Current lifecycle phase
    #[must_use]
    pub fn phase(&self) -> TaskPhase {
        match (self.is_complete(), self.removal_started_at) {
            (false, _) => TaskPhase::Active,
            (true, None) => TaskPhase::Completing,
            (true, Some(_)) => TaskPhase::PendingRemoval,
        }
    }

    /// Fraction done in `[0, 1]`, `None` while the total is unknown
    #[must_use]
    pub fn ratio(&self) -> Option<f64> {
        match self.spec.total {
            None => None,
            Some(0) => Some(1.0),
            #[allow(clippy::cast_precision_loss)]
            Some(total) => Some(self.progress as f64 / total as f64),
        }
    }

    /// Elapsed time to display: live while running, frozen once ended
    #[must_use]
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.frozen_elapsed
            .unwrap_or_else(|| now.saturating_duration_since(self.started_at))
    }

    /// Clamp and store a new progress value; returns whether it changed
    pub fn set_progress(&mut self, value: i64, now: Instant) -> bool {
        let floor = u64::try_from(value).unwrap_or(0);
        let clamped = match self.spec.total {
            Some(total) => floor.min(total),
            None => floor,
        };

        let changed = clamped != self.progress;
        self.progress = clamped;
        self.observe_completion(now);
        changed
    }

    fn observe_completion(&mut self, now: Instant) {
        if self.is_complete() && self.spec.display_elapsed && self.ended_at.is_none() {
            self.ended_at = Some(now);
            self.frozen_elapsed = Some(now.saturating_duration_since(self.started_at));
        }
    }

    fn prefix_width(&self) -> usize {
        self.spec.prefix.width()
    }
}

/// Ordered map of tasks keyed by [`TaskKey`]
#[derive(Clone, Debug, Default)]
pub struct TaskRegistry {
    /// All tasks, keyed by id
    tasks: HashMap<TaskKey, Task>,
    /// Creation order, used for display
    order: Vec<TaskKey>,
    /// Display width of the longest prefix
    longest_prefix: usize,
}

impl TaskRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task, or replace the one under `key` keeping its position
    pub fn upsert(&mut self, key: TaskKey, spec: TaskSpec, now: Instant) {
        if self.tasks.insert(key.clone(), Task::new(spec, now)).is_none() {
            self.order.push(key);
        }
        self.recompute_longest_prefix();
    }

    /// Apply a progress update; returns whether anything visible changed
    ///
    /// Unknown keys are ignored.
    pub fn apply_progress(&mut self, key: &TaskKey, value: i64, now: Instant) -> bool {
        match self.tasks.get_mut(key) {
            Some(task) => task.set_progress(value, now),
            None => false,
        }
    }

    /// Advance removal timers and purge expired tasks
    ///
    /// Returns the keys removed by this sweep, in display order.
    pub fn sweep(&mut self, now: Instant, removal_delay: Duration) -> Vec<TaskKey> {
        let mut expired = Vec::new();

        for key in &self.order {
            let Some(task) = self.tasks.get_mut(key) else {
                continue;
            };

            if task.is_complete() && !task.spec.keep_alive {
                let since = *task.removal_started_at.get_or_insert(now);
                if now.saturating_duration_since(since) >= removal_delay {
                    expired.push(key.clone());
                }
            } else {
                task.removal_started_at = None;
            }
        }

        if !expired.is_empty() {
            for key in &expired {
                self.tasks.remove(key);
            }
            self.order.retain(|key| self.tasks.contains_key(key));
            self.recompute_longest_prefix();
        }

        expired
    }

    /// Get a task by key
    #[must_use]
    pub fn get(&self, key: &TaskKey) -> Option<&Task> {
        self.tasks.get(key)
    }

    /// Whether a task exists under `key`
    #[must_use]
    pub fn contains(&self, key: &TaskKey) -> bool {
        self.tasks.contains_key(key)
    }

    /// Tasks in display order
    pub fn iter(&self) -> impl Iterator<Item = (&TaskKey, &Task)> {
        self.order
            .iter()
            .filter_map(|key| self.tasks.get(key).map(|task| (key, task)))
    }

    /// Number of live tasks
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no tasks are live
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Width every prefix is padded to
    #[must_use]
    pub fn longest_prefix_width(&self) -> usize {
        self.longest_prefix
    }

    fn recompute_longest_prefix(&mut self) {
        self.longest_prefix = self
            .order
            .iter()
            .filter_map(|key| self.tasks.get(key))
            .map(Task::prefix_width)
            .max()
            .unwrap_or(0);
    }
}
