pub mod client;
pub mod config;
pub mod protocol;
pub mod resolver;
pub mod router;
pub mod state;
pub mod telemetry;
pub mod transport;
