//! Broadcast of synchronized user actions between clock-like widgets.

use crate::clock::{panic_message, same_object};
use crate::time::{ClockZone, TimeSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

pub const MARK_TIME_FORMAT: &str = "%H:%M:%S";

/// A captured instant. Every widget receiving a broadcast gets the same
/// `timestamp_ms`; only `display_time` depends on the widget's zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mark {
    pub display_time: String,
    pub epoch_seconds: i64,
    pub timestamp_ms: i64,
}

impl Mark {
    pub fn capture(instant: DateTime<Utc>, zone: &ClockZone) -> Self {
        Self {
            display_time: zone.format(instant, MARK_TIME_FORMAT),
            epoch_seconds: instant.timestamp(),
            timestamp_ms: instant.timestamp_millis(),
        }
    }
}

/// Capabilities a widget exposes to the bus.
pub trait MarkTarget: Send + Sync {
    fn timezone(&self) -> ClockZone;
    fn add_mark(&self, mark: Mark) -> anyhow::Result<()>;
    fn remove_mark(&self, index: usize) -> anyhow::Result<()>;
    fn clear_marks(&self) -> anyhow::Result<()>;
    /// Mirror a scroll offset of the mark list.
    fn scroll_to(&self, offset: f32) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Registry of mark targets keyed by reference identity.
pub struct SyncBus {
    time: Arc<dyn TimeSource>,
    targets: Mutex<Vec<Arc<dyn MarkTarget>>>,
}

impl SyncBus {
    pub fn new(time: Arc<dyn TimeSource>) -> Self {
        Self {
            time,
            targets: Mutex::new(Vec::new()),
        }
    }

    pub fn register(&self, target: Arc<dyn MarkTarget>) {
        if let Ok(mut targets) = self.targets.lock() {
            let ptr = Arc::as_ptr(&target);
            if !targets.iter().any(|t| same_object(t, ptr)) {
                targets.push(target);
            }
        }
    }

    pub fn unregister(&self, target: &Arc<dyn MarkTarget>) -> bool {
        let Ok(mut targets) = self.targets.lock() else {
            return false;
        };
        let ptr = Arc::as_ptr(target);
        let before = targets.len();
        targets.retain(|t| !same_object(t, ptr));
        targets.len() != before
    }

    pub fn len(&self) -> usize {
        self.targets.lock().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<dyn MarkTarget>> {
        self.targets.lock().map(|t| t.clone()).unwrap_or_default()
    }

    /// Mark the current instant on every registered target.
    pub fn broadcast_mark(&self) -> BroadcastReport {
        self.broadcast_mark_at(self.time.now())
    }

    /// Two phases: every target's mark is computed from `instant` first, then
    /// all marks are applied. No `add_mark` runs before the last mark exists.
    pub fn broadcast_mark_at(&self, instant: DateTime<Utc>) -> BroadcastReport {
        let targets = self.snapshot();
        let marks: Vec<Mark> = targets
            .iter()
            .map(|t| Mark::capture(instant, &t.timezone()))
            .collect();
        tracing::debug!(targets = targets.len(), ts = instant.timestamp_millis(), "broadcasting mark");
        deliver(targets.iter().zip(marks), "add_mark", |t, mark| t.add_mark(mark))
    }

    /// Remove the mark at `index` everywhere. Lists stay index aligned because
    /// marks are only ever added through [`SyncBus::broadcast_mark`].
    pub fn broadcast_remove_mark(&self, index: usize) -> BroadcastReport {
        let targets = self.snapshot();
        deliver(targets.iter().map(|t| (t, ())), "remove_mark", |t, _| {
            t.remove_mark(index)
        })
    }

    pub fn broadcast_clear_marks(&self) -> BroadcastReport {
        let targets = self.snapshot();
        deliver(targets.iter().map(|t| (t, ())), "clear_marks", |t, _| {
            t.clear_marks()
        })
    }

    /// Apply `offset` to every target except `origin`.
    pub fn broadcast_scroll(&self, origin: &dyn MarkTarget, offset: f32) -> BroadcastReport {
        let origin_ptr = origin as *const dyn MarkTarget;
        let targets = self.snapshot();
        deliver(
            targets
                .iter()
                .filter(|t| !same_object(*t, origin_ptr))
                .map(|t| (t, ())),
            "scroll_to",
            |t, _| t.scroll_to(offset),
        )
    }
}

fn deliver<'a, V>(
    items: impl Iterator<Item = (&'a Arc<dyn MarkTarget>, V)>,
    op: &'static str,
    apply: impl Fn(&dyn MarkTarget, V) -> anyhow::Result<()>,
) -> BroadcastReport {
    let mut report = BroadcastReport {
        delivered: 0,
        failed: 0,
    };
    for (target, value) in items {
        match panic::catch_unwind(AssertUnwindSafe(|| apply(&**target, value))) {
            Ok(Ok(())) => report.delivered += 1,
            Ok(Err(err)) => {
                report.failed += 1;
                tracing::error!(op, ?err, "mark target failed");
            }
            Err(payload) => {
                report.failed += 1;
                tracing::error!(
                    op,
                    panic_message = %panic_message(payload.as_ref()),
                    "mark target panicked"
                );
            }
        }
    }
    report
}
