mod login;
mod sessions;

use tokio::sync::watch;
use tracing::debug;

pub use login::LoginState;
pub use sessions::{ProductId, SessionId, SessionRegistry};

/// Connectivity of the mirror channel itself. Only the connection manager
/// writes this slice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        }
    }
}

/// Consistent view of all four projections at one point in the envelope
/// stream.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub connection: ConnectionState,
    pub login: LoginState,
    pub sessions: SessionRegistry,
    pub connector_linked: bool,
}

/// Local store of everything mirrored from the launcher daemon. All writes
/// come from the connection manager's run task, one envelope at a time, so
/// every published snapshot reflects a prefix of the delivery order.
/// Consumers read snapshots or await changes; they never see the channel.
pub struct Store {
    tx: watch::Sender<Snapshot>,
}

impl Store {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Snapshot::default());
        Self { tx }
    }

    /// Receiver that yields a fresh snapshot after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.tx.borrow().clone()
    }

    pub fn connection(&self) -> ConnectionState {
        self.tx.borrow().connection
    }

    pub fn login(&self) -> LoginState {
        self.tx.borrow().login
    }

    pub fn sessions(&self) -> SessionRegistry {
        self.tx.borrow().sessions.clone()
    }

    pub fn connector_linked(&self) -> bool {
        self.tx.borrow().connector_linked
    }

    pub(crate) fn set_connection(&self, next: ConnectionState) {
        self.tx.send_modify(|snapshot| {
            if snapshot.connection != next {
                debug!(
                    target: "state",
                    from = snapshot.connection.as_str(),
                    to = next.as_str(),
                    "connection state changed"
                );
            }
            snapshot.connection = next;
        });
    }

    // Last write wins: the channel delivers envelopes in order on a single
    // stream, so no guard against stale values is needed.
    pub(crate) fn set_login(&self, next: LoginState) {
        self.tx.send_modify(|snapshot| snapshot.login = next);
    }

    pub(crate) fn set_connector_linked(&self, linked: bool) {
        self.tx.send_modify(|snapshot| snapshot.connector_linked = linked);
    }

    pub(crate) fn with_sessions(&self, apply: impl FnOnce(&mut SessionRegistry)) {
        self.tx.send_modify(|snapshot| apply(&mut snapshot.sessions));
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
