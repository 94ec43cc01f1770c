//! Scopeweave Dialog: timed dialog choices built on scopeweave scopes.
//!
//! A dialog opens a window scope that an external timer closes. Each choice
//! is available while the window is open and it still has asks left. Picks
//! run on the scheduled queue, so availability is judged when a pick actually
//! runs, not when it is requested.

pub mod choice;
pub mod config;
pub mod dialog;
pub mod error;
pub mod transcript;
