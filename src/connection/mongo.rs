//! MongoDB driver implementation of the connection seams

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Document, doc};
use mongodb::options::{ClientOptions, FindOptions, Tls};
use mongodb::{Client, Collection};
use tracing::debug;

use crate::credentials::{ConnectionSecret, mask_connection_string};
use crate::cursor::{BatchSource, MongoBatchSource};
use crate::error::{ConnectionError, CursorError, Result};

use super::metadata::{ServerInfo, Topology};
use super::{Connector, DialOptions, DocumentStore, FindWindow};

/// Dials clusters with the official MongoDB driver
#[derive(Debug, Clone, Default)]
pub struct MongoConnector;

#[async_trait]
impl Connector for MongoConnector {
    async fn connect(
        &self,
        secret: &ConnectionSecret,
        options: &DialOptions,
    ) -> Result<Arc<dyn DocumentStore>> {
        let mut client_options = ClientOptions::parse(&secret.connection_string)
            .await
            .map_err(|e| ConnectionError::InvalidConnectionString(e.to_string()))?;

        client_options.connect_timeout = Some(options.timeout);
        client_options.server_selection_timeout = Some(options.timeout);
        client_options.app_name = Some(options.app_name.clone());

        if secret.is_emulator {
            // The emulator ships a self-signed certificate
            if let Some(Tls::Enabled(tls)) = client_options.tls.as_mut() {
                tls.allow_invalid_certificates = Some(true);
            }
        }

        debug!(
            "Creating client for {}",
            mask_connection_string(&secret.connection_string)
        );
        let client = Client::with_options(client_options)?;

        // Surface unreachable hosts and bad credentials at acquire time
        client.database("admin").run_command(doc! { "ping": 1 }).await?;

        Ok(Arc::new(MongoStore::new(client)))
    }
}

/// A connected MongoDB client
pub struct MongoStore {
    client: Client,
    closed: AtomicBool,
}

impl MongoStore {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            closed: AtomicBool::new(false),
        }
    }

    fn collection(&self, database: &str, collection: &str) -> Collection<Document> {
        self.client.database(database).collection(collection)
    }
}

fn find_options(window: FindWindow) -> FindOptions {
    let mut options = FindOptions::default();
    options.batch_size = Some(window.batch_size);
    options.skip = window.skip;
    options.limit = window.limit.map(|l| l.min(i64::MAX as u64) as i64);
    options
}

fn fetch_failed(database: &str, collection: &str, error: mongodb::error::Error) -> CursorError {
    CursorError::from_driver(format!("{database}.{collection}"), error)
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn open_batches(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        window: FindWindow,
    ) -> Result<Box<dyn BatchSource>> {
        let cursor = self
            .collection(database, collection)
            .find(filter)
            .with_options(find_options(window))
            .await
            .map_err(|e| fetch_failed(database, collection, e))?;

        Ok(Box::new(MongoBatchSource::new(
            cursor,
            window.batch_size,
            format!("{database}.{collection}"),
        )))
    }

    async fn find_page(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        window: FindWindow,
    ) -> Result<Vec<Document>> {
        let cursor = self
            .collection(database, collection)
            .find(filter)
            .with_options(find_options(window))
            .await
            .map_err(|e| fetch_failed(database, collection, e))?;

        let docs: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| fetch_failed(database, collection, e))?;
        Ok(docs)
    }

    async fn server_info(&self) -> Result<ServerInfo> {
        let admin = self.client.database("admin");
        let hello = admin.run_command(doc! { "hello": 1 }).await?;

        // buildInfo is not supported by every compatible service
        let version = match admin.run_command(doc! { "buildInfo": 1 }).await {
            Ok(build) => build.get_str("version").ok().map(str::to_string),
            Err(e) => {
                debug!("buildInfo unavailable: {}", e);
                None
            }
        };

        let host_count = hello.get_array("hosts").map(|h| h.len()).unwrap_or(1);

        Ok(ServerInfo {
            version,
            topology: Topology::from_hello(&hello),
            host_count,
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.client.clone().shutdown().immediate(true).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_options_from_window() {
        let options = find_options(FindWindow {
            skip: Some(20),
            limit: None,
            batch_size: 100,
        });
        assert_eq!(options.batch_size, Some(100));
        assert_eq!(options.skip, Some(20));
        assert_eq!(options.limit, None);
    }

    #[test]
    fn test_find_options_clamps_limit() {
        let options = find_options(FindWindow {
            skip: None,
            limit: Some(u64::MAX),
            batch_size: 100,
        });
        assert_eq!(options.limit, Some(i64::MAX));
    }
}
