//! Pooled connection management
//!
//! This module provides:
//! - [`ConnectionRegistry`]: the process-wide cache of live connections keyed
//!   by credential id, with single-flight creation per key
//! - [`Connection`]: one authenticated link to a cluster, shared via `Arc`
//! - [`DocumentStore`] / [`Connector`]: the seams between the registry and the
//!   MongoDB driver, implemented by [`MongoStore`] / [`MongoConnector`]
//! - Best-effort cluster metadata collected after each successful dial

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::Document;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::credentials::ConnectionSecret;
use crate::cursor::{BatchSource, CursorRequest, StreamingCursor};
use crate::error::Result;

pub mod metadata;
pub mod mongo;
pub mod registry;

pub use metadata::{ClusterMetadata, ServerInfo, Topology};
pub use mongo::{MongoConnector, MongoStore};
pub use registry::ConnectionRegistry;

/// Skip/limit/page-size window for a find
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindWindow {
    /// Documents to skip, `None` when unset
    pub skip: Option<u64>,
    /// Maximum documents to return, `None` when unset
    pub limit: Option<u64>,
    /// Documents requested per server round trip
    pub batch_size: u32,
}

/// Options the registry passes to a [`Connector`]
#[derive(Debug, Clone)]
pub struct DialOptions {
    /// Connect and server-selection timeout
    pub timeout: Duration,
    /// Application name reported to the server
    pub app_name: String,
}

/// The underlying client handle of a [`Connection`]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Open a server-side cursor and expose it page by page
    async fn open_batches(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        window: FindWindow,
    ) -> Result<Box<dyn BatchSource>>;

    /// Run a bounded find and collect the whole page
    async fn find_page(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        window: FindWindow,
    ) -> Result<Vec<Document>>;

    /// Query server version and topology
    async fn server_info(&self) -> Result<ServerInfo>;

    /// Whether the handle has been shut down
    fn is_closed(&self) -> bool;

    /// Close the handle and its sockets
    async fn shutdown(&self);
}

/// Builds a [`DocumentStore`] from a resolved secret
#[async_trait]
pub trait Connector: Send + Sync {
    /// Dial the cluster described by `secret`
    async fn connect(
        &self,
        secret: &ConnectionSecret,
        options: &DialOptions,
    ) -> Result<Arc<dyn DocumentStore>>;
}

/// One live, reusable link to a document database cluster
///
/// Owned by the [`ConnectionRegistry`]; callers only ever hold shared
/// references, so closing is the registry's decision.
pub struct Connection {
    credential_id: String,
    store: Arc<dyn DocumentStore>,
    is_emulator: bool,
    hosts: Vec<(String, Option<u16>)>,
    metadata: OnceLock<ClusterMetadata>,
}

impl Connection {
    /// Wrap a connected store
    pub fn new(
        credential_id: impl Into<String>,
        store: Arc<dyn DocumentStore>,
        is_emulator: bool,
        hosts: Vec<(String, Option<u16>)>,
    ) -> Self {
        Self {
            credential_id: credential_id.into(),
            store,
            is_emulator,
            hosts,
            metadata: OnceLock::new(),
        }
    }

    pub fn credential_id(&self) -> &str {
        &self.credential_id
    }

    pub fn is_emulator(&self) -> bool {
        self.is_emulator
    }

    /// Cluster metadata, once the background collection has finished
    pub fn metadata(&self) -> Option<&ClusterMetadata> {
        self.metadata.get()
    }

    /// Whether the underlying handle reports itself closed
    pub fn is_closed(&self) -> bool {
        self.store.is_closed()
    }

    pub(crate) fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Open a lazy, cancellable sequence over a filtered query
    ///
    /// Blank or unparseable filter text matches every document; skip and
    /// limit values of zero or less are treated as unset.
    pub async fn stream_documents(
        &self,
        database: &str,
        collection: &str,
        cancel: CancellationToken,
        filter: Option<&str>,
        skip: Option<i64>,
        limit: Option<i64>,
    ) -> Result<StreamingCursor> {
        let request = CursorRequest::new(database, collection)
            .filter(filter)
            .skip(skip)
            .limit(limit);
        StreamingCursor::open(self, request, cancel).await
    }

    /// Run the same bounded find the session layer uses
    pub async fn find_page(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        window: FindWindow,
    ) -> Result<Vec<Document>> {
        self.store.find_page(database, collection, filter, window).await
    }

    /// Collect cluster metadata in the background.
    ///
    /// Never blocks the caller; failures are logged and dropped.
    pub(crate) fn spawn_metadata_collection(self: &Arc<Self>) {
        let conn = Arc::clone(self);
        tokio::spawn(async move {
            match conn.store.server_info().await {
                Ok(info) => {
                    let metadata = ClusterMetadata::from_server_info(info, &conn.hosts);
                    debug!(
                        credential = %conn.credential_id,
                        version = ?metadata.server_version,
                        topology = ?metadata.topology,
                        "Collected cluster metadata"
                    );
                    let _ = conn.metadata.set(metadata);
                }
                Err(e) => {
                    debug!(
                        credential = %conn.credential_id,
                        "Cluster metadata collection failed: {}", e
                    );
                }
            }
        });
    }

    pub(crate) async fn shutdown(&self) {
        self.store.shutdown().await;
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("credential_id", &self.credential_id)
            .field("is_emulator", &self.is_emulator)
            .field("hosts", &self.hosts)
            .field("closed", &self.is_closed())
            .finish()
    }
}
