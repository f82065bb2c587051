//! Batch source over a MongoDB driver cursor

use async_trait::async_trait;
use bson::Document;
use futures::TryStreamExt;
use mongodb::Cursor;
use tracing::{debug, info};

use crate::error::{CursorError, Result};

use super::BatchSource;

/// Pulls fixed-size pages out of a driver cursor.
///
/// Dropping the driver cursor kills it on the server, so releasing the
/// native resource is a matter of taking it out of the `Option`.
pub struct MongoBatchSource {
    cursor: Option<Cursor<Document>>,
    page_size: usize,
    delivered: u64,
    namespace: String,
}

impl MongoBatchSource {
    /// # Arguments
    /// * `cursor` - Driver cursor from a find
    /// * `batch_size` - Documents per page handed to the consumer
    /// * `namespace` - `db.collection`, for logs and errors
    pub fn new(cursor: Cursor<Document>, batch_size: u32, namespace: String) -> Self {
        Self {
            cursor: Some(cursor),
            page_size: batch_size.max(1) as usize,
            delivered: 0,
            namespace,
        }
    }

    /// Read up to one page; a short page means the server has nothing more
    async fn fill_page(
        cursor: &mut Cursor<Document>,
        page_size: usize,
    ) -> std::result::Result<Vec<Document>, mongodb::error::Error> {
        let mut page = Vec::with_capacity(page_size);
        while page.len() < page_size {
            let Some(doc) = cursor.try_next().await? else {
                break;
            };
            page.push(doc);
        }
        Ok(page)
    }
}

#[async_trait]
impl BatchSource for MongoBatchSource {
    async fn next_batch(&mut self) -> Result<Option<Vec<Document>>> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };

        let page = match Self::fill_page(cursor, self.page_size).await {
            Ok(page) => page,
            Err(e) => {
                self.cursor = None;
                return Err(CursorError::from_driver(&self.namespace, e).into());
            }
        };

        if page.is_empty() {
            self.cursor = None;
            debug!("{}: no documents left ({} delivered)", self.namespace, self.delivered);
            return Ok(None);
        }

        self.delivered += page.len() as u64;
        debug!(
            "{}: page of {} ({} delivered)",
            self.namespace,
            page.len(),
            self.delivered
        );
        Ok(Some(page))
    }

    async fn close(&mut self) -> Result<()> {
        if self.cursor.take().is_some() {
            info!(
                "Released server cursor for {} ({} documents delivered)",
                self.namespace, self.delivered
            );
        }
        Ok(())
    }
}
