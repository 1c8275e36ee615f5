//! Full-screen status panel for gemlink.
//!
//! The panel is a pure function of an externally owned [`AuthStatus`]
//! plus a recovery callback; the runtime only owns the terminal and the
//! event loop around it.
//!
//! [`AuthStatus`]: gemlink_core::AuthStatus

pub mod features;
pub mod runtime;
pub mod terminal;

pub use features::status;
pub use runtime::PanelRuntime;
