//! User interface module.
//!
//! This module provides the terminal UI for running a selection session
//! locally.

pub mod tui;

pub use tui::BrowseApp;
