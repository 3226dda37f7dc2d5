//! Game simulation modules

pub mod input;
pub mod interact;
pub mod level;
pub mod physics;
pub mod registry;
pub mod snapshot;
pub mod tuning;
pub mod world;

pub use world::{GameHandle, GameServer, SessionEvent, World};
