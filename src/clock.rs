//! Process-wide one second tick shared by every time-driven widget.
//!
//! The clock owns no thread. The host event loop calls [`SharedClock::poll`]
//! every frame and uses [`SharedClock::time_until_next_tick`] to schedule its
//! next wake-up, so ticks are delivered on the UI thread.

use crate::time::TimeSource;
use chrono::{DateTime, Duration, Utc};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

pub const TICK_PERIOD_MS: i64 = 1000;
pub const DEFAULT_ALIGN_BUFFER_MS: i64 = 20;

pub trait ClockSubscriber: Send + Sync {
    fn on_tick(&self, now: DateTime<Utc>) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerPhase {
    /// One-shot deadline on the next second boundary.
    Aligning,
    /// Fixed period after the first aligned tick.
    Repeating,
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    phase: TimerPhase,
    due: DateTime<Utc>,
}

#[derive(Default)]
struct ClockState {
    subscribers: Vec<Arc<dyn ClockSubscriber>>,
    timer: Option<Timer>,
    timers_started: u64,
    ticks: u64,
}

/// Result of one delivered tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub sequence: u64,
    pub delivered: usize,
    pub failed: usize,
}

pub struct SharedClock {
    time: Arc<dyn TimeSource>,
    align_buffer: Duration,
    state: Mutex<ClockState>,
}

pub(crate) fn same_object<T: ?Sized, U: ?Sized>(a: &Arc<T>, b: *const U) -> bool {
    Arc::as_ptr(a) as *const () == b as *const ()
}

impl SharedClock {
    pub fn new(time: Arc<dyn TimeSource>) -> Self {
        Self::with_align_buffer(time, DEFAULT_ALIGN_BUFFER_MS)
    }

    pub fn with_align_buffer(time: Arc<dyn TimeSource>, align_buffer_ms: i64) -> Self {
        Self {
            time,
            align_buffer: Duration::milliseconds(align_buffer_ms.max(0)),
            state: Mutex::new(ClockState::default()),
        }
    }

    /// Add a subscriber. The first subscriber starts the timer; subscribing
    /// an already registered reference does nothing.
    pub fn subscribe(&self, subscriber: Arc<dyn ClockSubscriber>) {
        let Ok(mut state) = self.state.lock() else {
            tracing::error!("clock state poisoned; subscribe dropped");
            return;
        };
        let ptr = Arc::as_ptr(&subscriber);
        if state.subscribers.iter().any(|s| same_object(s, ptr)) {
            return;
        }
        state.subscribers.push(subscriber);
        if state.subscribers.len() == 1 {
            let now = self.time.now();
            let due = self.first_deadline(now);
            state.timer = Some(Timer {
                phase: TimerPhase::Aligning,
                due,
            });
            state.timers_started += 1;
            tracing::debug!(%due, "shared clock started");
        }
    }

    /// Remove a subscriber by identity. Removing the last one stops the
    /// timer. Returns whether the subscriber was registered.
    pub fn unsubscribe(&self, subscriber: &Arc<dyn ClockSubscriber>) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        let ptr = Arc::as_ptr(subscriber);
        let before = state.subscribers.len();
        state.subscribers.retain(|s| !same_object(s, ptr));
        let removed = state.subscribers.len() != before;
        if removed && state.subscribers.is_empty() {
            state.timer = None;
            tracing::debug!("shared clock stopped");
        }
        removed
    }

    /// Deliver a tick if one is due. At most one tick is delivered per call;
    /// periods missed while the loop was stalled are coalesced.
    pub fn poll(&self) -> Option<TickReport> {
        let now = self.time.now();
        let (subscribers, sequence) = {
            let mut state = self.state.lock().ok()?;
            let timer = state.timer.as_mut()?;
            if timer.due > now {
                return None;
            }
            let period = Duration::milliseconds(TICK_PERIOD_MS);
            if timer.phase == TimerPhase::Aligning {
                tracing::debug!(late_ms = (now - timer.due).num_milliseconds(), "first aligned tick");
                timer.phase = TimerPhase::Repeating;
            }
            timer.due += period;
            while timer.due <= now {
                timer.due += period;
            }
            state.ticks += 1;
            (state.subscribers.clone(), state.ticks)
        };

        let mut failed = 0;
        for sub in &subscribers {
            match panic::catch_unwind(AssertUnwindSafe(|| sub.on_tick(now))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    failed += 1;
                    tracing::error!(?err, "clock subscriber failed");
                }
                Err(payload) => {
                    failed += 1;
                    tracing::error!(
                        panic_message = %panic_message(payload.as_ref()),
                        "clock subscriber panicked"
                    );
                }
            }
        }
        Some(TickReport {
            sequence,
            delivered: subscribers.len() - failed,
            failed,
        })
    }

    /// Time until the next tick is due, or `None` while stopped.
    pub fn time_until_next_tick(&self) -> Option<std::time::Duration> {
        let due = self.state.lock().ok()?.timer?.due;
        let remaining = due - self.time.now();
        Some(remaining.to_std().unwrap_or(std::time::Duration::ZERO))
    }

    pub fn is_running(&self) -> bool {
        self.state
            .lock()
            .map(|s| s.timer.is_some())
            .unwrap_or(false)
    }

    /// Number of times the timer went from stopped to running.
    pub fn timers_started(&self) -> u64 {
        self.state.lock().map(|s| s.timers_started).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().map(|s| s.subscribers.len()).unwrap_or(0)
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.state.lock().ok()?.timer.map(|t| t.due)
    }

    fn first_deadline(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let into_second = i64::from(now.timestamp_subsec_millis().min(999));
        now + Duration::milliseconds(TICK_PERIOD_MS - into_second) + self.align_buffer
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualTimeSource;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        ticks: AtomicUsize,
    }

    impl ClockSubscriber for Counter {
        fn on_tick(&self, _now: DateTime<Utc>) -> anyhow::Result<()> {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    impl ClockSubscriber for Failing {
        fn on_tick(&self, _now: DateTime<Utc>) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }
    }

    struct Panicking;

    impl ClockSubscriber for Panicking {
        fn on_tick(&self, _now: DateTime<Utc>) -> anyhow::Result<()> {
            panic!("subscriber exploded")
        }
    }

    fn clock_at(ms: u32) -> (Arc<ManualTimeSource>, SharedClock) {
        let start = Utc
            .with_ymd_and_hms(2024, 5, 1, 8, 0, 0)
            .unwrap()
            + Duration::milliseconds(ms as i64);
        let time = Arc::new(ManualTimeSource::new(start));
        let clock = SharedClock::new(time.clone());
        (time, clock)
    }

    #[test]
    fn first_tick_aligns_to_second_boundary_plus_buffer() {
        let (time, clock) = clock_at(300);
        let sub: Arc<dyn ClockSubscriber> = Arc::new(Counter::default());
        clock.subscribe(sub);
        let due = clock.next_due().unwrap();
        assert_eq!(due.timestamp_subsec_millis(), 20);
        assert_eq!(
            clock.time_until_next_tick(),
            Some(std::time::Duration::from_millis(720))
        );
        time.advance(Duration::milliseconds(719));
        assert!(clock.poll().is_none());
        time.advance(Duration::milliseconds(1));
        assert_eq!(clock.poll().unwrap().delivered, 1);
        assert_eq!(
            clock.time_until_next_tick(),
            Some(std::time::Duration::from_millis(1000))
        );
    }

    #[test]
    fn timer_is_reference_counted() {
        let (_time, clock) = clock_at(0);
        let a: Arc<dyn ClockSubscriber> = Arc::new(Counter::default());
        let b: Arc<dyn ClockSubscriber> = Arc::new(Counter::default());
        clock.subscribe(a.clone());
        clock.subscribe(b.clone());
        clock.subscribe(a.clone());
        assert_eq!(clock.timers_started(), 1);
        assert_eq!(clock.subscriber_count(), 2);
        assert!(clock.unsubscribe(&a));
        assert!(clock.is_running());
        assert!(!clock.unsubscribe(&a));
        assert!(clock.unsubscribe(&b));
        assert!(!clock.is_running());
        assert_eq!(clock.time_until_next_tick(), None);
        clock.subscribe(a);
        assert_eq!(clock.timers_started(), 2);
    }

    #[test]
    fn failing_subscribers_do_not_block_others() {
        let (time, clock) = clock_at(0);
        let counter = Arc::new(Counter::default());
        clock.subscribe(Arc::new(Failing));
        clock.subscribe(Arc::new(Panicking));
        clock.subscribe(counter.clone());
        time.advance(Duration::milliseconds(1020));
        let report = clock.poll().unwrap();
        assert_eq!(report.failed, 2);
        assert_eq!(report.delivered, 1);
        assert_eq!(counter.ticks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stalled_loop_coalesces_missed_ticks() {
        let (time, clock) = clock_at(0);
        let counter = Arc::new(Counter::default());
        clock.subscribe(counter.clone());
        time.advance(Duration::milliseconds(5_500));
        assert!(clock.poll().is_some());
        assert!(clock.poll().is_none());
        assert_eq!(counter.ticks.load(Ordering::SeqCst), 1);
        let due = clock.next_due().unwrap();
        assert!(due > time.now());
        assert_eq!(due.timestamp_subsec_millis(), 20);
    }
}
