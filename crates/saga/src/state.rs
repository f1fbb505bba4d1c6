//! Payment settlement state machine.

use serde::{Deserialize, Serialize};

/// State of the current checkout attempt.
///
/// State transitions:
/// ```text
/// Idle ──► IntentRequested ──► IntentReady ──► Authorizing ──┬──► Authorized
///  ▲              │                                  │       ├──► Declined
///  │              └──► Error                         │       └──► Error
///  └─────────────────────────────────────────────────┘ (abandoned)
/// ```
///
/// `Declined` and `Error` allow a fresh attempt. `Authorized` is never
/// re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SettlementState {
    #[default]
    Idle,

    IntentRequested,

    IntentReady,

    /// Waiting on the gateway; may suspend for 3-D Secure.
    Authorizing,

    Authorized,

    Declined,

    Error,
}

impl SettlementState {
    /// Returns true if a new attempt may start from this state.
    pub fn can_start_attempt(&self) -> bool {
        matches!(
            self,
            SettlementState::Idle | SettlementState::Declined | SettlementState::Error
        )
    }

    /// Returns true while an attempt is between intent request and outcome.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            SettlementState::IntentRequested
                | SettlementState::IntentReady
                | SettlementState::Authorizing
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementState::Idle => "idle",
            SettlementState::IntentRequested => "intent_requested",
            SettlementState::IntentReady => "intent_ready",
            SettlementState::Authorizing => "authorizing",
            SettlementState::Authorized => "authorized",
            SettlementState::Declined => "declined",
            SettlementState::Error => "error",
        }
    }
}

impl std::fmt::Display for SettlementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
