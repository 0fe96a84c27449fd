//! Vehicle simulation: synthetic terrain and the tick client.

pub mod client;
pub mod terrain;

pub use client::{TickClient, TickPayload};
pub use terrain::{Terrain, NO_GROUND};
