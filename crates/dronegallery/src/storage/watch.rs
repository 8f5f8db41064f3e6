//! Live subscriptions over a `SQLite` document store.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::{spawn_blocking, JoinError};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::DocumentStore;
use crate::collection::{
    CollectionQuery, DocumentCollection, Snapshot, SnapshotEvent, Subscription, SUBSCRIPTION_BUFFER,
};
use crate::error::{Error, Result};

/// A collection backed by a database file that another process writes.
///
/// Each subscription owns its own read-only connection and polls
/// `PRAGMA data_version` on the blocking pool; a change delivers a fresh full
/// snapshot. A failed open or read is delivered as a subscription error and
/// ends the subscription.
#[derive(Debug, Clone)]
pub struct SqliteCollection {
    path: PathBuf,
    poll_interval: Duration,
}

impl SqliteCollection {
    /// Watch the database at `path`, checking for changes every `poll_interval`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            poll_interval,
        }
    }

    /// Path of the watched database.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Interval between change checks.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// One subscription's read-only view of the database.
#[derive(Debug)]
struct Watch {
    store: DocumentStore,
    query: CollectionQuery,
    last_version: i64,
}

impl Watch {
    /// Open the store read-only and take the initial snapshot.
    fn open(path: &Path, query: CollectionQuery) -> Result<(Self, Snapshot)> {
        let store = DocumentStore::open_read_only(path)?;
        let last_version = store.data_version()?;
        let initial = store.snapshot(&query)?;
        Ok((
            Self {
                store,
                query,
                last_version,
            },
            initial,
        ))
    }

    /// Read a new snapshot if the database changed since the last read.
    fn poll(&mut self) -> Result<Option<Snapshot>> {
        let version = self.store.data_version()?;
        if version == self.last_version {
            return Ok(None);
        }
        self.last_version = version;
        self.store.snapshot(&self.query).map(Some)
    }
}

fn task_failed(e: &JoinError) -> Error {
    Error::internal(format!("database task failed: {e}"))
}

/// Flatten the result of a blocking database call.
fn joined<T>(result: std::result::Result<Result<T>, JoinError>) -> Result<T> {
    result.map_err(|e| task_failed(&e))?
}

/// Deliver a failure as the subscription's last event.
async fn deliver_error(tx: &mpsc::Sender<SnapshotEvent>, collection: &str, error: &Error) {
    warn!("Reading '{}' failed: {}", collection, error);
    let event = SnapshotEvent::Error(Error::subscription(collection, error.to_string()));
    let _ = tx.send(event).await;
}

#[async_trait]
impl DocumentCollection for SqliteCollection {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    /// Never fails: open and read failures arrive as the first event.
    async fn subscribe(&self, query: &CollectionQuery) -> Result<Subscription> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let path = self.path.clone();
        let query = query.clone();
        let collection = query.collection.clone();
        // tokio intervals reject a zero period
        let poll_interval = self.poll_interval.max(Duration::from_millis(1));

        info!(
            "Subscribing to '{}' in {} (polling every {:?})",
            query.collection,
            self.path.display(),
            poll_interval
        );

        let name = collection.clone();
        let task = tokio::spawn(async move {
            let opened = joined(spawn_blocking(move || Watch::open(&path, query)).await);
            let mut watch = match opened {
                Ok((watch, initial)) => {
                    if tx.send(SnapshotEvent::Snapshot(initial)).await.is_err() {
                        return;
                    }
                    watch
                }
                Err(e) => {
                    deliver_error(&tx, &name, &e).await;
                    return;
                }
            };

            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let polled = spawn_blocking(move || {
                    let result = watch.poll();
                    (watch, result)
                })
                .await;
                let result = match polled {
                    Ok((returned, result)) => {
                        watch = returned;
                        result
                    }
                    Err(e) => {
                        deliver_error(&tx, &name, &task_failed(&e)).await;
                        return;
                    }
                };

                let event = match result {
                    Ok(Some(snapshot)) => {
                        debug!(
                            "Collection '{}' changed, {} documents",
                            name,
                            snapshot.len()
                        );
                        SnapshotEvent::Snapshot(snapshot)
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        deliver_error(&tx, &name, &e).await;
                        return;
                    }
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        });

        Ok(Subscription::new(collection, rx, task))
    }
}
