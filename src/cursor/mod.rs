//! Lazy, cancellable document sequences
//!
//! A [`StreamingCursor`] pulls fixed-size pages from a [`BatchSource`] and
//! hands documents to its consumer one at a time. Before yielding each
//! document it checks the caller's [`CancellationToken`]; an in-flight page
//! fetch is allowed to complete, and the token is honored on the next step.
//!
//! The native cursor behind the source is released exactly once on every
//! exit path: exhaustion, cancellation, fetch error, explicit `close`, or
//! drop.

use std::collections::VecDeque;

use async_trait::async_trait;
use bson::Document;
use futures::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::{Connection, FindWindow};
use crate::error::Result;

pub mod filter;
pub mod mongo;

pub use filter::{normalize_bound, parse_filter};
pub use mongo::MongoBatchSource;

/// Documents requested from the server per page
pub const DEFAULT_BATCH_SIZE: u32 = 100;

/// Page-at-a-time access to a server-side cursor
#[async_trait]
pub trait BatchSource: Send {
    /// Fetch the next page, or `None` once the result set is exhausted
    async fn next_batch(&mut self) -> Result<Option<Vec<Document>>>;

    /// Release the server-side cursor
    async fn close(&mut self) -> Result<()>;
}

/// What to stream: target namespace, filter text and bounds
#[derive(Debug, Clone)]
pub struct CursorRequest {
    pub database: String,
    pub collection: String,
    pub filter: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub batch_size: u32,
}

impl CursorRequest {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
            filter: None,
            skip: None,
            limit: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn filter(mut self, filter: Option<&str>) -> Self {
        self.filter = filter.map(str::to_string);
        self
    }

    pub fn skip(mut self, skip: Option<i64>) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: Option<i64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn namespace(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }

    /// Skip/limit with non-positive values dropped
    pub fn window(&self) -> FindWindow {
        FindWindow {
            skip: normalize_bound(self.skip),
            limit: normalize_bound(self.limit),
            batch_size: self.batch_size,
        }
    }
}

/// A position within an ordered query result
pub struct StreamingCursor {
    namespace: String,
    source: Option<Box<dyn BatchSource>>,
    buffered: VecDeque<Document>,
    cancel: CancellationToken,
    yielded: u64,
    pages: u64,
    cancelled: bool,
}

impl StreamingCursor {
    /// Wrap an already-open batch source
    pub fn new(
        namespace: impl Into<String>,
        source: Box<dyn BatchSource>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            source: Some(source),
            buffered: VecDeque::new(),
            cancel,
            yielded: 0,
            pages: 0,
            cancelled: false,
        }
    }

    /// Open a cursor for `request` on `connection`
    pub async fn open(
        connection: &Connection,
        request: CursorRequest,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let filter = parse_filter(request.filter.as_deref());
        let window = request.window();
        let namespace = request.namespace();

        debug!(
            "Opening cursor on {} with filter {:?} (skip {:?}, limit {:?}, batch {})",
            namespace, filter, window.skip, window.limit, window.batch_size
        );

        let source = connection
            .store()
            .open_batches(&request.database, &request.collection, filter, window)
            .await?;

        Ok(Self::new(namespace, source, cancel))
    }

    /// Yield the next document.
    ///
    /// Returns `Ok(None)` on exhaustion and on cancellation; the two are told
    /// apart with [`was_cancelled`](Self::was_cancelled). A fetch error closes
    /// the cursor before it is returned.
    pub async fn next(&mut self) -> Result<Option<Document>> {
        loop {
            if self.source.is_none() {
                return Ok(None);
            }

            if self.cancel.is_cancelled() {
                info!(
                    "Cursor on {} cancelled after {} documents",
                    self.namespace, self.yielded
                );
                self.cancelled = true;
                self.release().await;
                return Ok(None);
            }

            if let Some(doc) = self.buffered.pop_front() {
                self.yielded += 1;
                return Ok(Some(doc));
            }

            let fetched = match self.source.as_mut() {
                Some(source) => source.next_batch().await,
                None => return Ok(None),
            };

            match fetched {
                Ok(Some(batch)) if !batch.is_empty() => {
                    self.pages += 1;
                    self.buffered.extend(batch);
                }
                Ok(_) => {
                    debug!(
                        "Cursor on {} exhausted after {} documents in {} pages",
                        self.namespace, self.yielded, self.pages
                    );
                    self.release().await;
                    return Ok(None);
                }
                Err(e) => {
                    self.release().await;
                    return Err(e);
                }
            }
        }
    }

    /// Release the native cursor. Idempotent.
    pub async fn close(&mut self) -> Result<()> {
        self.buffered.clear();
        match self.source.take() {
            Some(mut source) => source.close().await,
            None => Ok(()),
        }
    }

    /// Close on an exit path where a close failure must not mask the outcome
    async fn release(&mut self) {
        if let Err(e) = self.close().await {
            warn!("Failed to close cursor on {}: {}", self.namespace, e);
        }
    }

    /// Documents handed to the consumer so far
    pub fn yielded(&self) -> u64 {
        self.yielded
    }

    /// Non-empty pages fetched so far
    pub fn pages_fetched(&self) -> u64 {
        self.pages
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    /// Whether the cursor stopped because its token was cancelled
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Adapt into a `Stream`; ends after exhaustion, cancellation, or the first error
    pub fn into_stream(self) -> impl Stream<Item = Result<Document>> + Send {
        futures::stream::unfold(Some(self), |state| async move {
            let mut cursor = state?;
            match cursor.next().await {
                Ok(Some(doc)) => Some((Ok(doc), Some(cursor))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

impl Drop for StreamingCursor {
    fn drop(&mut self) {
        if self.source.take().is_some() {
            debug!("StreamingCursor on {} dropped without explicit close", self.namespace);
        }
    }
}
