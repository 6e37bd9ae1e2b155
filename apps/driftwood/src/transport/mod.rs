use async_trait::async_trait;
use thiserror::Error;

pub mod mock;
pub mod websocket;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("transport failure: {0}")]
    Connection(String),
}

/// Receive side of one live connection. The mirror channel carries no
/// outbound application traffic, so this is the whole surface.
#[async_trait]
pub trait Transport: Send {
    /// Next raw frame. `Err(Closed)` is a clean remote close; any other
    /// error is a transport failure.
    async fn recv(&mut self) -> Result<Vec<u8>, TransportError>;
}

/// Establishes connections. The connection manager dials once per attempt
/// and redials through the same dialer after an error backoff.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self) -> Result<Box<dyn Transport>, TransportError>;
}
