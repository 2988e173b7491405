//! Application layer for Storyboard.
//!
//! Coordinates the domain core with the wire and storage collaborators to run
//! generation sessions.

pub mod dispatcher;
pub mod session_controller;

pub use dispatcher::{Completion, DispatchOutcome, ImageDispatcher};
pub use session_controller::{RunSummary, SessionController};
