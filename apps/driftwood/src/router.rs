use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::protocol::{self, Envelope};
use crate::state::{LoginState, ProductId, SessionId, Store};

pub const SOURCE_AUTHENTICATION: &str = "AuthenticationManager";
pub const SOURCE_SESSIONS: &str = "SessionsManager";
pub const SOURCE_CONNECTOR: &str = "Connector";

/// The closed set of subsystems the mirror understands. Anything else on the
/// wire is tolerated and ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Authentication,
    Sessions,
    Connector,
}

impl Source {
    pub fn from_wire(source: &str) -> Option<Self> {
        match source {
            SOURCE_AUTHENTICATION => Some(Source::Authentication),
            SOURCE_SESSIONS => Some(Source::Sessions),
            SOURCE_CONNECTOR => Some(Source::Connector),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthView {
    #[serde(rename = "loginStatus")]
    login_status: LoginState,
}

#[derive(Debug, Deserialize)]
struct SessionInfo {
    #[serde(rename = "productId")]
    product_id: ProductId,
}

/// Apply one decoded envelope to the store. Handlers never touch the
/// transport; a malformed payload drops that envelope and nothing else.
pub fn route(store: &Store, envelope: &Envelope) {
    match Source::from_wire(&envelope.source) {
        Some(Source::Authentication) => apply_authentication(store, envelope),
        Some(Source::Sessions) => apply_sessions(store, envelope),
        Some(Source::Connector) => apply_connector(store, envelope),
        None => {
            debug!(target: "router", source = %envelope.source, "envelope from unknown source, ignoring");
        }
    }
}

fn apply_authentication(store: &Store, envelope: &Envelope) {
    if !envelope.is_view_update() {
        debug!(
            target: "router",
            payload_type = ?envelope.payload_type,
            "authentication envelope without a full view, ignoring"
        );
        return;
    }
    let status = envelope
        .view_update()
        .and_then(|view| serde_json::from_value::<AuthView>(view.new_state).map_err(Into::into));
    match status {
        Ok(view) => {
            debug!(target: "router", status = view.login_status.as_str(), "login status updated");
            store.set_login(view.login_status);
        }
        Err(err) => {
            warn!(target: "router", error = %err, "dropping malformed authentication envelope");
        }
    }
}

fn apply_sessions(store: &Store, envelope: &Envelope) {
    match envelope.payload_type.as_deref() {
        Some(protocol::KEY_VIEW_UPDATED) => {
            let update = match envelope.key_view_update() {
                Ok(update) => update,
                Err(err) => {
                    warn!(target: "router", error = %err, "dropping malformed session key update");
                    return;
                }
            };
            let session = SessionId(update.key);
            match update.new_value {
                None => store.with_sessions(|registry| match registry.remove(&session) {
                    Some(product) => {
                        debug!(target: "router", %session, %product, "session ended");
                    }
                    None => {
                        debug!(target: "router", %session, "remove for session not in registry");
                    }
                }),
                Some(value) => match serde_json::from_value::<SessionInfo>(value) {
                    Ok(info) => store.with_sessions(|registry| {
                        if registry.insert(info.product_id.clone(), session.clone()) {
                            debug!(target: "router", %session, product = %info.product_id, "session started");
                        }
                    }),
                    Err(err) => {
                        warn!(target: "router", %session, error = %err, "dropping malformed session value");
                    }
                },
            }
        }
        Some(protocol::VIEW_UPDATED) => {
            let listing = envelope.view_update().and_then(|view| {
                serde_json::from_value::<BTreeMap<SessionId, SessionInfo>>(view.new_state)
                    .map_err(Into::into)
            });
            match listing {
                Ok(sessions) => {
                    debug!(target: "router", count = sessions.len(), "rebuilding session registry");
                    store.with_sessions(|registry| {
                        registry.replace_all(
                            sessions
                                .into_iter()
                                .map(|(session, info)| (session, info.product_id)),
                        );
                    });
                }
                Err(err) => {
                    warn!(target: "router", error = %err, "dropping malformed session listing");
                }
            }
        }
        other => {
            debug!(target: "router", payload_type = ?other, "session envelope with unhandled payload type");
        }
    }
}

// The connector reports reachability as a bare boolean, outside the
// Key/ViewUpdate convention the other sources use.
fn apply_connector(store: &Store, envelope: &Envelope) {
    match envelope.payload.as_bool() {
        Some(linked) => {
            debug!(target: "router", linked, "connector link changed");
            store.set_connector_linked(linked);
        }
        None => {
            warn!(target: "router", payload = %envelope.payload, "connector payload is not a boolean, dropping");
        }
    }
}
