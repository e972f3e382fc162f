use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use vlm_slo::errors;

/// Power state as the manager reports it. The manager owns this value;
/// nothing local caches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PowerState {
    PoweredOn,
    PoweredOff,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerAction {
    Start,
    Stop,
    Suspend,
    Reset,
}

impl PowerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Suspend => "suspend",
            Self::Reset => "reset",
        }
    }

    /// True when the state already fulfils the intent of the action.
    /// Reset has no resting state, so no state satisfies it.
    pub fn satisfied_by(&self, state: PowerState) -> bool {
        matches!(
            (self, state),
            (Self::Start, PowerState::PoweredOn)
                | (Self::Stop, PowerState::PoweredOff)
                | (Self::Suspend, PowerState::Suspended)
        )
    }

    /// True when the manager accepts the action from the given state.
    pub fn allowed_from(&self, state: PowerState) -> bool {
        match self {
            Self::Start => matches!(
                state,
                PowerState::PoweredOff | PowerState::Suspended
            ),
            Self::Stop => matches!(
                state,
                PowerState::PoweredOn | PowerState::Suspended
            ),
            Self::Suspend | Self::Reset => {
                matches!(state, PowerState::PoweredOn)
            }
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PowerAction {
    type Err = errors::WithBacktrace;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "suspend" => Ok(Self::Suspend),
            "reset" => Ok(Self::Reset),
            other => Err(errors::bad_request(&format!(
                "unknown power action {}",
                other
            ))),
        }
    }
}

/// One virtual disk attached to a VM, keyed by the manager's device key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DiskEntry {
    pub key: String,
    /// MiB.
    pub capacity: i64,
}

/// Live compute snapshot of one VM.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VmResources {
    pub cpu_count: i64,
    pub memory_mib: i64,
    pub disks: Vec<DiskEntry>,
}

/// Wire-level outcome of one power call. The manager answers a refused
/// action and a malformed request with the same status, so the rejection
/// keeps the raw complaint and the caller disambiguates against actual
/// state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerCall {
    Completed,
    ValidationRejected(String),
}
