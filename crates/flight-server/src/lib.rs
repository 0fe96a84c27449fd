//! Shared library surface for the flight server and its tests.

pub mod api;
pub mod backoff;
pub mod capture;
pub mod classifier;
pub mod config;
pub mod state;
