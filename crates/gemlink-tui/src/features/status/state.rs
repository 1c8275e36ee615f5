//! Status panel view model.

use gemlink_core::AuthStatus;

/// Visual signal shown next to the panel title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    /// Indeterminate progress (animated spinner).
    Progress,
    Success,
    Warning,
    Error,
}

/// The interactive control offered in `ManualRequired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryControl {
    pub label: &'static str,
    /// Keys that activate the control, for the hint text.
    pub keys: &'static str,
}

pub const RECOVERY_CONTROL: RecoveryControl = RecoveryControl {
    label: "Sign in manually",
    keys: "Enter / r",
};

/// Everything the renderer needs for one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelView {
    pub indicator: Indicator,
    pub title: &'static str,
    pub message: &'static str,
    pub control: Option<RecoveryControl>,
}

/// Maps a status to its view. Unknown statuses (`None`) have no view.
pub fn panel_view(status: Option<AuthStatus>) -> Option<PanelView> {
    let view = match status? {
        AuthStatus::Loading => PanelView {
            indicator: Indicator::Progress,
            title: "Connecting",
            message: "Checking credentials with the backend...",
            control: None,
        },
        AuthStatus::Ready => PanelView {
            indicator: Indicator::Success,
            title: "Connected",
            message: "Requests are authenticated automatically.",
            control: None,
        },
        AuthStatus::ManualRequired => PanelView {
            indicator: Indicator::Warning,
            title: "Sign-in required",
            message: "Automatic authentication did not work. Sign in manually to continue.",
            control: Some(RECOVERY_CONTROL),
        },
        AuthStatus::Failed => PanelView {
            indicator: Indicator::Error,
            title: "Authentication failed",
            message: "The backend could not authenticate this session.",
            control: None,
        },
    };
    Some(view)
}
