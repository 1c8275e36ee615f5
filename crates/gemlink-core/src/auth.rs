//! Authentication status reported by the backend.
//!
//! The status is owned outside this crate. gemlink only parses it, renders
//! it, and reports the user's wish to leave `ManualRequired`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The four authentication states shown by the status panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    Loading,
    Ready,
    Failed,
    ManualRequired,
}

impl AuthStatus {
    /// Returns all states in display order.
    pub fn all() -> &'static [AuthStatus] {
        &[
            AuthStatus::Loading,
            AuthStatus::Ready,
            AuthStatus::Failed,
            AuthStatus::ManualRequired,
        ]
    }

    /// Wire name (`loading | ready | failed | manual_required`).
    pub fn as_str(self) -> &'static str {
        match self {
            AuthStatus::Loading => "loading",
            AuthStatus::Ready => "ready",
            AuthStatus::Failed => "failed",
            AuthStatus::ManualRequired => "manual_required",
        }
    }

    /// Parses a wire value. Unknown values yield `None`, which the panel
    /// renders as nothing.
    pub fn from_wire(value: &str) -> Option<Self> {
        value.parse().ok()
    }

    /// Whether the manual recovery control is offered in this state.
    pub fn allows_recovery(self) -> bool {
        matches!(self, AuthStatus::ManualRequired)
    }
}

impl FromStr for AuthStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "loading" => Ok(Self::Loading),
            "ready" => Ok(Self::Ready),
            "failed" => Ok(Self::Failed),
            "manual_required" => Ok(Self::ManualRequired),
            other => Err(format!("Unknown auth status: {other}")),
        }
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
