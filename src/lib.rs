pub mod car;
pub mod config;
pub mod control;
pub mod debug_builders;
pub mod error;
pub mod logging;
pub mod net;
pub mod physics;
pub mod race;
pub mod spawn;
pub mod state;
