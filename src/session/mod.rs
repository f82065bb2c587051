//! Per-interaction sessions over pooled connections
//!
//! A session pairs a random id with one registry-owned [`Connection`] and
//! caches state derived from the last query it ran. The cache is keyed by
//! the normalized (trimmed, lower-cased) query text: running a different
//! query discards it before the fetch, running the same one keeps
//! accumulating into it.
//!
//! Closing a session never closes its connection; connections outlive
//! sessions and are released through the registry.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use bson::Document;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::connection::{Connection, ConnectionRegistry, FindWindow};
use crate::cursor::parse_filter;
use crate::error::{Result, SessionError};

/// Shared handle to one open session
pub type SharedSession = Arc<Mutex<Session>>;

/// Field name to the set of BSON type names observed for it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSchema {
    fields: BTreeMap<String, BTreeSet<String>>,
    documents_seen: u64,
}

impl ResultSchema {
    /// Fold a page of documents into the schema
    pub fn observe(&mut self, docs: &[Document]) {
        for doc in docs {
            for (key, value) in doc {
                self.fields
                    .entry(key.clone())
                    .or_default()
                    .insert(format!("{:?}", value.element_type()));
            }
        }
        self.documents_seen += docs.len() as u64;
    }

    pub fn fields(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.fields
    }

    pub fn documents_seen(&self) -> u64 {
        self.documents_seen
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Default)]
struct QueryCache {
    query: Option<String>,
    schema: ResultSchema,
}

/// One page of results from [`SessionManager::run_query_cached`]
#[derive(Debug, Clone)]
pub struct QueryPage {
    pub documents: Vec<Document>,
    pub page: u64,
    pub page_size: u64,
    /// Schema accumulated for the current query, this page included
    pub schema: ResultSchema,
    /// Whether the cached state from a previous call was kept
    pub schema_reused: bool,
}

/// Transient context layered over a pooled connection
pub struct Session {
    id: String,
    connection: Arc<Connection>,
    cache: QueryCache,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Normalized text of the query the cache belongs to
    pub fn cached_query(&self) -> Option<&str> {
        self.cache.query.as_deref()
    }

    pub fn schema(&self) -> &ResultSchema {
        &self.cache.schema
    }

    /// Drop cached state unless it belongs to `normalized`. Returns whether it was kept.
    fn prepare_cache(&mut self, normalized: &str) -> bool {
        if self.cache.query.as_deref() == Some(normalized) {
            return true;
        }
        if self.cache.query.is_some() {
            debug!(session = %self.id, "Query changed, discarding cached results");
        }
        self.cache = QueryCache {
            query: Some(normalized.to_string()),
            schema: ResultSchema::default(),
        };
        false
    }
}

/// Trimmed, case-insensitive form used to compare query texts
pub fn normalize_query(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Owns every open session
pub struct SessionManager {
    registry: Arc<ConnectionRegistry>,
    sessions: RwLock<HashMap<String, SharedSession>>,
}

impl SessionManager {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Acquire a connection for `credential_id` and open a session on it
    pub async fn open(&self, credential_id: &str) -> Result<String> {
        let connection = self.registry.acquire(credential_id).await?;
        let id = Uuid::new_v4().to_string();

        let session = Session {
            id: id.clone(),
            connection,
            cache: QueryCache::default(),
        };
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(session)));

        info!(session = %id, credential = %credential_id, "Opened session");
        Ok(id)
    }

    /// Look up a session. Unknown ids are an error; nothing is created.
    pub async fn get(&self, session_id: &str) -> Result<SharedSession> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()).into())
    }

    /// Forget a session. Its connection stays in the registry.
    pub async fn close(&self, session_id: &str) {
        if self.sessions.write().await.remove(session_id).is_some() {
            info!(session = %session_id, "Closed session");
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Run one page of a query, reusing cached state when the query text is unchanged.
    ///
    /// Pages are 1-based; page 0 is read as page 1.
    pub async fn run_query_cached(
        &self,
        session_id: &str,
        database: &str,
        collection: &str,
        query_text: &str,
        page: u64,
        page_size: u64,
    ) -> Result<QueryPage> {
        if page_size == 0 {
            return Err(SessionError::InvalidPage("page size must be positive".into()).into());
        }
        let page = page.max(1);
        let batch_size = u32::try_from(page_size).map_err(|_| {
            SessionError::InvalidPage(format!("page size {page_size} is too large"))
        })?;

        let shared = self.get(session_id).await?;
        let mut session = shared.lock().await;

        let normalized = normalize_query(query_text);
        let schema_reused = session.prepare_cache(&normalized);

        let skip = (page - 1).saturating_mul(page_size);
        let window = FindWindow {
            skip: (skip > 0).then_some(skip),
            limit: Some(page_size),
            batch_size,
        };

        let documents = session
            .connection
            .find_page(database, collection, parse_filter(Some(query_text)), window)
            .await?;

        session.cache.schema.observe(&documents);
        debug!(
            session = %session_id,
            page,
            returned = documents.len(),
            schema_reused,
            "Ran cached query"
        );

        Ok(QueryPage {
            documents,
            page,
            page_size,
            schema: session.cache.schema.clone(),
            schema_reused,
        })
    }
}

#[cfg(test)]
mod tests;
