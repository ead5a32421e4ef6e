//! Property-based invariant tests for renderer state.
//!
//! 1. Progress stays within `0..=total` under arbitrary updates.
//! 2. Frozen elapsed time is written at most once per task.
//! 3. The message ring holds the most recent entries, oldest first.
//! 4. The exception ring holds the most recent entries, newest first.
//! 5. Shrinking a ring keeps the most recent entries.
//! 6. The scheduler never repaints twice within the interval.

use std::time::{Duration, Instant};

use logdeck_core::{RedrawScheduler, Ring, Task, TaskKey, TaskRegistry, TaskSpec};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

fn total_strategy() -> impl Strategy<Value = Option<u64>> {
    prop_oneof![
        Just(None),
        (0u64..=1_000).prop_map(Some),
        Just(Some(u64::MAX)),
    ]
}

fn update_strategy() -> impl Strategy<Value = i64> {
    prop_oneof![
        -1_000i64..=2_000,
        Just(i64::MIN),
        Just(i64::MAX),
        any::<i64>(),
    ]
}

fn spec_for(total: Option<u64>) -> TaskSpec {
    match total {
        Some(total) => TaskSpec::new(total),
        None => TaskSpec::unbounded(),
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Progress clamp
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn progress_within_bounds(
        total in total_strategy(),
        updates in prop::collection::vec(update_strategy(), 0..64),
    ) {
        let now = Instant::now();
        let key = TaskKey::new("t");
        let mut registry = TaskRegistry::new();
        registry.upsert(key.clone(), spec_for(total), now);

        for value in updates {
            registry.apply_progress(&key, value, now);
            let task = registry.get(&key).unwrap();
            if let Some(total) = total {
                prop_assert!(task.progress() <= total, "progress {} > total {}", task.progress(), total);
            }
            let ratio = task.ratio();
            if let Some(ratio) = ratio {
                prop_assert!((0.0..=1.0).contains(&ratio), "ratio {} out of range", ratio);
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Frozen elapsed time written once
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn frozen_elapsed_set_once(
        total in 1u64..=50,
        updates in prop::collection::vec(0i64..=60, 1..64),
    ) {
        let start = Instant::now();
        let mut task = Task::new(TaskSpec::new(total).with_elapsed(true), start);
        let mut frozen: Option<(Instant, Duration)> = None;

        for (step, value) in updates.into_iter().enumerate() {
            let now = start + Duration::from_secs(step as u64 + 1);
            task.set_progress(value, now);

            match (frozen, task.ended_at(), task.frozen_elapsed()) {
                (None, Some(ended), Some(elapsed)) => frozen = Some((ended, elapsed)),
                (Some(first), Some(ended), Some(elapsed)) => {
                    prop_assert_eq!(first, (ended, elapsed));
                }
                (Some(_), _, _) => prop_assert!(false, "frozen time was cleared"),
                (None, None, None) => {}
                other => prop_assert!(false, "inconsistent completion state {:?}", other),
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Message ring keeps the latest, oldest first
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn fifo_ring_keeps_latest(capacity in 0usize..=16, count in 0usize..=64) {
        let mut ring = Ring::fifo(capacity);
        for n in 0..count {
            ring.push(n);
        }

        let kept: Vec<usize> = ring.iter().copied().collect();
        let expected: Vec<usize> = (count.saturating_sub(capacity)..count).collect();
        prop_assert!(ring.len() <= capacity);
        prop_assert_eq!(kept, expected);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Exception ring keeps the latest, newest first
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn newest_first_ring_keeps_latest(capacity in 0usize..=16, count in 0usize..=64) {
        let mut ring = Ring::newest_first(capacity);
        for n in 0..count {
            ring.push(n);
        }

        let kept: Vec<usize> = ring.iter().copied().collect();
        let expected: Vec<usize> = (count.saturating_sub(capacity)..count).rev().collect();
        prop_assert!(ring.len() <= capacity);
        prop_assert_eq!(kept, expected);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Shrinking keeps the most recent
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn shrink_keeps_most_recent(
        capacity in 1usize..=16,
        count in 0usize..=32,
        shrunk in 0usize..=16,
    ) {
        let mut ring = Ring::fifo(capacity);
        for n in 0..count {
            ring.push(n);
        }
        let before: Vec<usize> = ring.iter().copied().collect();

        ring.resize(shrunk);

        let after: Vec<usize> = ring.iter().copied().collect();
        let skip = before.len().saturating_sub(shrunk);
        prop_assert_eq!(after, before[skip..].to_vec());
        prop_assert_eq!(ring.capacity(), shrunk);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Scheduler spacing
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn repaints_respect_interval(
        interval_ms in 1u64..=500,
        gaps in prop::collection::vec(0u64..=200, 1..100),
    ) {
        let interval = Duration::from_millis(interval_ms);
        let mut scheduler = RedrawScheduler::new(interval);
        let mut now = Instant::now();
        let mut last: Option<Instant> = None;

        for gap in gaps {
            now += Duration::from_millis(gap);
            scheduler.mark_dirty();
            if scheduler.should_redraw(now) {
                if let Some(last) = last {
                    prop_assert!(now - last > interval);
                }
                last = Some(now);
                prop_assert!(!scheduler.is_dirty());
            }
        }
    }
}
