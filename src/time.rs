use chrono::{DateTime, Duration, FixedOffset, Local, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Source of wall-clock time shared by the clock and the mark bus.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven time, used by tests and headless hosts.
#[derive(Debug)]
pub struct ManualTimeSource {
    now: Mutex<DateTime<Utc>>,
}

impl ManualTimeSource {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = at;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|now| *now).unwrap_or_else(|_| Utc::now())
    }
}

/// Timezone a clock-like widget displays its time in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "zone")]
pub enum ClockZone {
    Local,
    Utc,
    Fixed { offset_minutes: i32 },
}

impl Default for ClockZone {
    fn default() -> Self {
        Self::Local
    }
}

impl ClockZone {
    pub fn label(&self) -> String {
        match self {
            ClockZone::Local => "Local".into(),
            ClockZone::Utc => "UTC".into(),
            ClockZone::Fixed { offset_minutes } => {
                let sign = if *offset_minutes < 0 { '-' } else { '+' };
                let abs = offset_minutes.unsigned_abs();
                format!("UTC{sign}{:02}:{:02}", abs / 60, abs % 60)
            }
        }
    }

    /// Format `instant` with the given strftime pattern in this zone.
    pub fn format(&self, instant: DateTime<Utc>, pattern: &str) -> String {
        match self {
            ClockZone::Local => instant.with_timezone(&Local).format(pattern).to_string(),
            ClockZone::Utc => instant.format(pattern).to_string(),
            ClockZone::Fixed { offset_minutes } => {
                match FixedOffset::east_opt(offset_minutes.saturating_mul(60)) {
                    Some(offset) => instant.with_timezone(&offset).format(pattern).to_string(),
                    None => {
                        tracing::warn!(offset_minutes, "invalid fixed offset; formatting as UTC");
                        instant.format(pattern).to_string()
                    }
                }
            }
        }
    }
}
