//! Connection registry
//!
//! Maps a credential id to at most one live [`Connection`]. Acquisition is
//! single-flight per key: concurrent `acquire` calls for an unseen id wait on
//! the same slot lock, so only one of them dials and the others reuse the
//! result. A `release` racing an `acquire` retires the slot, which makes the
//! acquirer start over on a fresh slot instead of parking a connection where
//! nobody can close it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::credentials::{CredentialResolver, hosts_from_connection_string};
use crate::error::{
    ConnectionError, DocportError, Result, rewrite_connection_error,
    rewrite_mongodb_connect_error,
};

use super::{Connection, Connector, DialOptions};

#[derive(Default)]
struct SlotState {
    connection: Option<Arc<Connection>>,
    retired: bool,
}

#[derive(Default)]
struct Slot {
    state: Mutex<SlotState>,
}

/// Process-wide cache of live connections keyed by credential id
pub struct ConnectionRegistry {
    resolver: Arc<dyn CredentialResolver>,
    connector: Arc<dyn Connector>,
    config: ConnectionConfig,
    slots: Mutex<HashMap<String, Arc<Slot>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new(
        resolver: Arc<dyn CredentialResolver>,
        connector: Arc<dyn Connector>,
        config: ConnectionConfig,
    ) -> Self {
        Self {
            resolver,
            connector,
            config,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached connection for `credential_id`, dialing if needed.
    ///
    /// A cached handle that reports itself closed is replaced by a fresh dial.
    pub async fn acquire(&self, credential_id: &str) -> Result<Arc<Connection>> {
        loop {
            let slot = {
                let mut slots = self.slots.lock().await;
                Arc::clone(slots.entry(credential_id.to_string()).or_default())
            };

            let mut state = slot.state.lock().await;
            if state.retired {
                // Released while we waited; start over on a fresh slot
                continue;
            }

            if let Some(conn) = &state.connection {
                if !conn.is_closed() {
                    debug!(credential = %credential_id, "Reusing pooled connection");
                    return Ok(Arc::clone(conn));
                }
                info!(credential = %credential_id, "Pooled connection closed, reconnecting");
                state.connection = None;
            }

            return match self.dial(credential_id).await {
                Ok(conn) => {
                    state.connection = Some(Arc::clone(&conn));
                    Ok(conn)
                }
                Err(e) => {
                    state.retired = true;
                    drop(state);
                    self.remove_slot_if_current(credential_id, &slot).await;
                    Err(e)
                }
            };
        }
    }

    /// Close and forget the connection for `credential_id`. No-op if absent.
    pub async fn release(&self, credential_id: &str) {
        let slot = self.slots.lock().await.remove(credential_id);
        let Some(slot) = slot else {
            debug!(credential = %credential_id, "Release of unknown credential ignored");
            return;
        };

        let mut state = slot.state.lock().await;
        state.retired = true;
        if let Some(conn) = state.connection.take() {
            conn.shutdown().await;
            info!(credential = %credential_id, "Released connection");
        }
    }

    /// Release every cached connection
    pub async fn release_all(&self) {
        let ids: Vec<String> = self.slots.lock().await.keys().cloned().collect();
        for id in ids {
            self.release(&id).await;
        }
    }

    /// Whether a live connection is cached for `credential_id`
    pub async fn contains(&self, credential_id: &str) -> bool {
        let slot = self.slots.lock().await.get(credential_id).cloned();
        match slot {
            Some(slot) => slot.state.lock().await.connection.is_some(),
            None => false,
        }
    }

    /// Number of cached connections
    pub async fn len(&self) -> usize {
        let slots: Vec<Arc<Slot>> = self.slots.lock().await.values().cloned().collect();
        let mut count = 0;
        for slot in slots {
            if slot.state.lock().await.connection.is_some() {
                count += 1;
            }
        }
        count
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn dial(&self, credential_id: &str) -> Result<Arc<Connection>> {
        let secret = self.resolver.resolve_connection_secret(credential_id).await?;
        let target = secret.display_target();
        let options = DialOptions {
            timeout: self.config.timeout_for(secret.is_emulator),
            app_name: self.config.app_name.clone(),
        };

        info!(
            credential = %credential_id,
            target = %target,
            emulator = secret.is_emulator,
            timeout_secs = options.timeout.as_secs(),
            "Connecting"
        );

        let store = self
            .connector
            .connect(&secret, &options)
            .await
            .map_err(|e| rewrite_dial_error(e, &target, secret.is_emulator))?;

        let conn = Arc::new(Connection::new(
            credential_id,
            store,
            secret.is_emulator,
            hosts_from_connection_string(&secret.connection_string),
        ));
        conn.spawn_metadata_collection();

        info!(credential = %credential_id, "Connected");
        Ok(conn)
    }

    async fn remove_slot_if_current(&self, credential_id: &str, slot: &Arc<Slot>) {
        let mut slots = self.slots.lock().await;
        if slots.get(credential_id).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            slots.remove(credential_id);
        }
    }
}

/// Substitute actionable messages for known emulator failures
fn rewrite_dial_error(error: DocportError, target: &str, is_emulator: bool) -> DocportError {
    match error {
        DocportError::MongoDb(e) => rewrite_mongodb_connect_error(&e, target, is_emulator).into(),
        DocportError::Connection(ConnectionError::ConnectFailed(msg)) => {
            rewrite_connection_error(&msg, target, is_emulator).into()
        }
        DocportError::Io(e) => rewrite_connection_error(&e.to_string(), target, is_emulator).into(),
        other => other,
    }
}
