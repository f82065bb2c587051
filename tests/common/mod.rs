//! In-memory stand-ins for the driver seams

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mongodb::bson::{Document, doc};
use tokio_util::sync::CancellationToken;

use docport::config::ConnectionConfig;
use docport::connection::{
    Connection, ConnectionRegistry, Connector, DialOptions, DocumentStore, FindWindow, ServerInfo,
    Topology,
};
use docport::credentials::{ConnectionSecret, CredentialResolver};
use docport::cursor::BatchSource;
use docport::error::{ConnectionError, CursorError, Result};

/// `n` documents shaped like `{ "id": i, "category": "a" | "b" }`
pub fn numbered_documents(n: usize) -> Vec<Document> {
    (0..n)
        .map(|i| {
            let category = if i % 2 == 0 { "a" } else { "b" };
            doc! { "id": i as i64, "category": category }
        })
        .collect()
}

/// Behaviour knobs shared by every cursor a [`MemoryStore`] opens
#[derive(Default)]
pub struct StoreBehaviour {
    /// Fail the fetch that would go past this many documents
    pub fail_after: Option<usize>,
    /// Cancel this token once this many documents have been handed out
    pub cancel_after: Option<(usize, CancellationToken)>,
}

/// A collection held in memory, filtered by top-level equality
pub struct MemoryStore {
    documents: Vec<Document>,
    behaviour: StoreBehaviour,
    pub fetches: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub finds: Mutex<Vec<(Document, FindWindow)>>,
    closed: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    pub fn new(documents: Vec<Document>) -> Self {
        Self::with_behaviour(documents, StoreBehaviour::default())
    }

    pub fn with_behaviour(documents: Vec<Document>, behaviour: StoreBehaviour) -> Self {
        Self {
            documents,
            behaviour,
            fetches: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
            finds: Mutex::new(Vec::new()),
            closed: std::sync::atomic::AtomicBool::new(false),
        }
    }

    fn select(&self, filter: &Document, window: FindWindow) -> Vec<Document> {
        let skip = window.skip.unwrap_or(0) as usize;
        let limit = window.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        self.documents
            .iter()
            .filter(|d| filter.iter().all(|(k, v)| d.get(k) == Some(v)))
            .skip(skip)
            .take(limit)
            .cloned()
            .collect()
    }
}

struct MemorySource {
    namespace: String,
    pending: VecDeque<Document>,
    batch_size: usize,
    handed_out: usize,
    fail_after: Option<usize>,
    cancel_after: Option<(usize, CancellationToken)>,
    fetches: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl BatchSource for MemorySource {
    async fn next_batch(&mut self) -> Result<Option<Vec<Document>>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.pending.is_empty() {
            return Ok(None);
        }
        let take = self.batch_size.min(self.pending.len());
        if let Some(limit) = self.fail_after {
            if self.handed_out + take > limit {
                return Err(
                    CursorError::fetch_failed(&self.namespace, "connection reset by peer").into(),
                );
            }
        }
        let batch: Vec<Document> = self.pending.drain(..take).collect();
        self.handed_out += batch.len();
        if let Some((at, token)) = &self.cancel_after {
            if self.handed_out >= *at {
                token.cancel();
            }
        }
        Ok(Some(batch))
    }

    async fn close(&mut self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn open_batches(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        window: FindWindow,
    ) -> Result<Box<dyn BatchSource>> {
        Ok(Box::new(MemorySource {
            namespace: format!("{database}.{collection}"),
            pending: self.select(&filter, window).into(),
            batch_size: window.batch_size.max(1) as usize,
            handed_out: 0,
            fail_after: self.behaviour.fail_after,
            cancel_after: self.behaviour.cancel_after.clone(),
            fetches: Arc::clone(&self.fetches),
            closes: Arc::clone(&self.closes),
        }))
    }

    async fn find_page(
        &self,
        _database: &str,
        _collection: &str,
        filter: Document,
        window: FindWindow,
    ) -> Result<Vec<Document>> {
        let page = self.select(&filter, window);
        self.finds.lock().unwrap().push((filter, window));
        Ok(page)
    }

    async fn server_info(&self) -> Result<ServerInfo> {
        Ok(ServerInfo {
            version: Some("7.0.2".into()),
            topology: Topology::Standalone,
            host_count: 1,
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Wrap a store in a connection without going through a registry
pub fn connection_over(store: Arc<MemoryStore>) -> Connection {
    Connection::new(
        "test",
        store,
        false,
        vec![("db.example.com".to_string(), Some(27017))],
    )
}

/// Resolves every id except `missing`
pub struct StaticResolver;

#[async_trait]
impl CredentialResolver for StaticResolver {
    async fn resolve_connection_secret(&self, credential_id: &str) -> Result<ConnectionSecret> {
        if credential_id == "missing" {
            return Err(ConnectionError::UnknownCredential(credential_id.to_string()).into());
        }
        Ok(ConnectionSecret::new(format!(
            "mongodb://reader:secret@{credential_id}.example.com:27017/"
        )))
    }
}

/// Hands out a fresh store over the same documents on every dial
pub struct MemoryConnector {
    documents: Vec<Document>,
    pub dials: AtomicUsize,
    pub stores: Mutex<Vec<Arc<MemoryStore>>>,
}

impl MemoryConnector {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            dials: AtomicUsize::new(0),
            stores: Mutex::new(Vec::new()),
        }
    }

    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub fn last_store(&self) -> Arc<MemoryStore> {
        Arc::clone(self.stores.lock().unwrap().last().expect("nothing dialed yet"))
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(
        &self,
        _secret: &ConnectionSecret,
        _options: &DialOptions,
    ) -> Result<Arc<dyn DocumentStore>> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        let store = Arc::new(MemoryStore::new(self.documents.clone()));
        self.stores.lock().unwrap().push(Arc::clone(&store));
        Ok(store)
    }
}

/// Registry over [`StaticResolver`] and a [`MemoryConnector`]
pub fn registry_with(documents: Vec<Document>) -> (Arc<ConnectionRegistry>, Arc<MemoryConnector>) {
    let connector = Arc::new(MemoryConnector::new(documents));
    let registry = ConnectionRegistry::new(
        Arc::new(StaticResolver),
        Arc::clone(&connector) as Arc<dyn Connector>,
        ConnectionConfig::default(),
    );
    (Arc::new(registry), connector)
}
