//! Flight CLI - simulator tools for the flight server.
//!
//! Binaries:
//! - send_mission: fly one simulated vehicle through a mission

pub mod sim;
