//! Shared server state.

pub mod sessions;

pub use sessions::{AppState, SessionSummary};
