//! Authentication status panel.
//!
//! - `state.rs`: view model derived from `AuthStatus`
//! - `render.rs`: ratatui rendering
//! - `update.rs`: recovery control activation

mod render;
mod state;
mod update;

pub use render::{indicator_color, indicator_symbol, render_status_panel, status_panel_lines};
pub use state::{Indicator, PanelView, RECOVERY_CONTROL, RecoveryControl, panel_view};
pub use update::{activate_recovery, handle_key, is_recovery_key};
