// ── Sensor domain types ──

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device-reported state.
///
/// Known states get their own variant; anything else the firmware sends is
/// carried verbatim in [`Other`](Self::Other) rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SensorState {
    Sensing,
    Countdown,
    Alarm,
    Authorized,
    Other(String),
}

impl SensorState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Sensing => "SENSING",
            Self::Countdown => "COUNTDOWN",
            Self::Alarm => "ALARM",
            Self::Authorized => "AUTHORIZED",
            Self::Other(raw) => raw,
        }
    }

    /// Numeric activity level used for trend output:
    /// SENSING 1, AUTHORIZED 2, COUNTDOWN 3, ALARM 5, unknown 0.
    pub fn activity_level(&self) -> u8 {
        match self {
            Self::Sensing => 1,
            Self::Authorized => 2,
            Self::Countdown => 3,
            Self::Alarm => 5,
            Self::Other(_) => 0,
        }
    }
}

impl From<&str> for SensorState {
    fn from(raw: &str) -> Self {
        match raw {
            "SENSING" => Self::Sensing,
            "COUNTDOWN" => Self::Countdown,
            "ALARM" => Self::Alarm,
            "AUTHORIZED" => Self::Authorized,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl From<String> for SensorState {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "SENSING" | "COUNTDOWN" | "ALARM" | "AUTHORIZED" => Self::from(raw.as_str()),
            _ => Self::Other(raw),
        }
    }
}

impl From<SensorState> for String {
    fn from(state: SensorState) -> Self {
        match state {
            SensorState::Other(raw) => raw,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for SensorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One canonical notification from the sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorEvent {
    pub state: SensorState,
    pub message: String,
    /// Seconds left before the alarm fires. Present while counting down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countdown: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid_status: Option<String>,
    /// Client-side arrival time. The client clock orders the log, not the
    /// device clock.
    pub received_at: DateTime<Utc>,
}

impl SensorEvent {
    /// Build an event stamped with the current client clock.
    pub fn new(state: impl Into<SensorState>, message: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            message: message.into(),
            countdown: None,
            uid_status: None,
            received_at: Utc::now(),
        }
    }

    pub fn with_countdown(mut self, countdown: u32) -> Self {
        self.countdown = Some(countdown);
        self
    }

    pub fn with_uid_status(mut self, uid_status: impl Into<String>) -> Self {
        self.uid_status = Some(uid_status.into());
        self
    }

    pub fn stamped_at(mut self, at: DateTime<Utc>) -> Self {
        self.received_at = at;
        self
    }

    /// Countdown progress for this event, if it carries a countdown.
    pub fn countdown_progress(&self) -> Option<u8> {
        self.countdown.map(countdown_progress)
    }
}

/// An edge in the device state: recorded only when `state` changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub state: SensorState,
    pub occurred_at: DateTime<Utc>,
}

/// Percentage of a 10-second countdown that has elapsed.
///
/// `(10 - countdown) * 10`, clamped to `0..=100`.
pub fn countdown_progress(countdown: u32) -> u8 {
    let remaining = i64::from(countdown);
    let pct = ((10 - remaining) * 10).clamp(0, 100);
    u8::try_from(pct).unwrap_or(100)
}
