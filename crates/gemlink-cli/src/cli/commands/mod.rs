//! CLI command handlers.

pub mod config;
pub mod generate;
pub mod panel;
pub mod relay;
