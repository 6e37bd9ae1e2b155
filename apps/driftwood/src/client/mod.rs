use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::protocol;
use crate::router;
use crate::state::{ConnectionState, Store};
use crate::telemetry;
use crate::transport::{Dialer, Transport, TransportError};

/// Delay before redialing after a transport error.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

/// Owns the mirror connection lifecycle. One live connection per instance,
/// driven by a single run task that dials, pumps frames through
/// decode→route, and schedules at most one reconnect per error.
///
/// The run task is the only writer of the connection slice and the only
/// holder of the transport handle; everything downstream of it is a passive
/// consumer of the store.
pub struct ConnectionManager {
    dialer: Arc<dyn Dialer>,
    store: Arc<Store>,
    backoff: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl ConnectionManager {
    pub fn new(dialer: Arc<dyn Dialer>, store: Arc<Store>) -> Self {
        Self {
            dialer,
            store,
            backoff: DEFAULT_BACKOFF,
            task: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Start the run task. A call while the task is alive (connecting,
    /// connected, or waiting out a backoff) is a no-op, as is any call after
    /// `close()`.
    pub fn open(&self) {
        if self.closed.load(Ordering::SeqCst) {
            warn!(target: "client", "open() after close(), ignoring");
            return;
        }
        let mut task = self.task.lock().unwrap();
        if let Some(handle) = task.as_ref() {
            if !handle.is_finished() {
                debug!(target: "client", "open() while connection is live, ignoring");
                return;
            }
        }
        let dialer = self.dialer.clone();
        let store = self.store.clone();
        let backoff = self.backoff;
        *task = Some(tokio::spawn(run(dialer, store, backoff)));
    }

    /// Deterministic teardown: aborts the run task, which cancels any
    /// pending reconnect sleep and detaches the transport, then pins the
    /// connection slice at Disconnected. The instance cannot be reopened.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(handle) = self.task.lock().unwrap().take() {
            handle.abort();
        }
        self.store.set_connection(ConnectionState::Disconnected);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(handle) = self.task.lock().unwrap().take() {
            handle.abort();
        }
    }
}

enum Disconnect {
    Clean,
    Failed(TransportError),
}

async fn run(dialer: Arc<dyn Dialer>, store: Arc<Store>, backoff: Duration) {
    loop {
        store.set_connection(ConnectionState::Connecting);
        let mut transport = match dialer.dial().await {
            Ok(transport) => transport,
            Err(err) => {
                warn!(target: "client", error = %err, "connect failed");
                store.set_connection(ConnectionState::Error);
                sleep(backoff).await;
                continue;
            }
        };
        info!(target: "client", "connected");
        store.set_connection(ConnectionState::Connected);

        match pump(transport.as_mut(), &store).await {
            Disconnect::Clean => {
                info!(target: "client", "connection closed by remote");
                store.set_connection(ConnectionState::Disconnected);
                // Not terminal: a later open() starts a fresh run task.
                return;
            }
            Disconnect::Failed(err) => {
                warn!(target: "client", error = %err, "connection lost, retrying after backoff");
                store.set_connection(ConnectionState::Error);
                // Exactly one pending retry per error; this sleep is the timer.
                sleep(backoff).await;
            }
        }
    }
}

/// Pump frames off one live connection until it ends. Each frame is decoded
/// and routed in arrival order; a frame that fails to decode is dropped and
/// the connection carries on.
async fn pump(transport: &mut dyn Transport, store: &Store) -> Disconnect {
    loop {
        let frame = match transport.recv().await {
            Ok(frame) => frame,
            Err(TransportError::Closed) => return Disconnect::Clean,
            Err(err) => return Disconnect::Failed(err),
        };
        telemetry::record_bytes("frame_bytes", frame.len());
        let decode_start = Instant::now();
        match protocol::decode_envelope(&frame) {
            Ok(envelope) => {
                telemetry::record_duration("frame_decode", decode_start.elapsed());
                let _guard = telemetry::PerfGuard::new("frame_route");
                router::route(store, &envelope);
            }
            Err(err) => {
                warn!(
                    target: "client::frame",
                    error = %err,
                    len = frame.len(),
                    "dropping undecodable frame"
                );
            }
        }
    }
}
