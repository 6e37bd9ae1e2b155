//! In-process transport for deterministic replay in tests: frames, failures
//! and closes are pushed through a channel in the exact order the assertions
//! expect them to be applied.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Dialer, Transport, TransportError};

/// A connected transport plus the handle that feeds it.
pub fn channel_transport() -> (ChannelHandle, ChannelTransport) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelHandle { tx }, ChannelTransport { rx })
}

#[derive(Clone)]
pub struct ChannelHandle {
    tx: mpsc::UnboundedSender<Result<Vec<u8>, TransportError>>,
}

impl ChannelHandle {
    pub fn send_frame(&self, frame: Vec<u8>) {
        let _ = self.tx.send(Ok(frame));
    }

    /// Deliver a transport failure to the receiving side.
    pub fn fail(&self, err: TransportError) {
        let _ = self.tx.send(Err(err));
    }

    /// Deliver a clean remote close.
    pub fn close(&self) {
        let _ = self.tx.send(Err(TransportError::Closed));
    }
}

pub struct ChannelTransport {
    rx: mpsc::UnboundedReceiver<Result<Vec<u8>, TransportError>>,
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        match self.rx.recv().await {
            Some(event) => event,
            // All handles dropped counts as a close.
            None => Err(TransportError::Closed),
        }
    }
}

pub enum DialOutcome {
    Connect(ChannelTransport),
    Fail(TransportError),
}

/// Replays a scripted sequence of dial outcomes and counts attempts. A dial
/// past the end of the script parks forever, so a runaway reconnect loop
/// shows up as a hang (or a dial count) instead of a panic.
pub struct ScriptedDialer {
    script: Mutex<VecDeque<DialOutcome>>,
    dials: AtomicUsize,
}

impl ScriptedDialer {
    pub fn new(script: Vec<DialOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            dials: AtomicUsize::new(0),
        }
    }

    /// How many times `dial` has been called.
    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dialer for ScriptedDialer {
    async fn dial(&self) -> Result<Box<dyn Transport>, TransportError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(DialOutcome::Connect(transport)) => Ok(Box::new(transport)),
            Some(DialOutcome::Fail(err)) => Err(err),
            None => {
                std::future::pending::<Result<Box<dyn Transport>, TransportError>>().await
            }
        }
    }
}
