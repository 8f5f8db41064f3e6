//! Document collection abstraction.
//!
//! A collection delivers full snapshots of an ordered query to subscribers.
//! This module defines the trait backends implement, the subscription handle
//! the gallery holds, and an in-process [`MemoryCollection`].

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Number, Value};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::record::{Document, Timestamp, TIMESTAMP_FIELD};

/// Number of undelivered events a subscription buffers.
pub const SUBSCRIPTION_BUFFER: usize = 16;

/// Sort direction of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Oldest first.
    Ascending,
    /// Newest first.
    #[default]
    Descending,
}

/// "All documents of a collection, ordered by one field."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionQuery {
    /// Collection name.
    pub collection: String,
    /// Field the results are ordered by.
    pub order_by: String,
    /// Sort direction.
    pub direction: Direction,
}

impl CollectionQuery {
    /// Query a collection ordered by capture timestamp, newest first.
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            order_by: TIMESTAMP_FIELD.to_string(),
            direction: Direction::Descending,
        }
    }

    /// Change the ordering field and direction.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = field.into();
        self.direction = direction;
        self
    }

    /// Arrange a document set the way a collection must deliver it.
    ///
    /// Documents without the order field are excluded. Values are ranked by
    /// type first (`null`, booleans, numbers, timestamps, strings, arrays,
    /// maps) and by value within a type. Only `{seconds, nanos}` objects count
    /// as timestamps; an RFC 3339 string orders as a string. Ties fall back to
    /// the document id in the same direction.
    #[must_use]
    pub fn arrange(&self, documents: Vec<Document>) -> Vec<Document> {
        let mut docs: Vec<Document> = documents
            .into_iter()
            .filter(|doc| doc.has_field(&self.order_by))
            .collect();

        docs.sort_by(|a, b| {
            let ord = match (a.field(&self.order_by), b.field(&self.order_by)) {
                (Some(x), Some(y)) => compare_values(x, y),
                _ => Ordering::Equal,
            };
            let ord = ord.then_with(|| a.id.cmp(&b.id));
            match self.direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            }
        });
        docs
    }
}

/// Type rank of a field value in query order.
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::Object(_) if Timestamp::from_object(value).is_some() => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

fn compare_numbers(a: &Number, b: &Number) -> Ordering {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => {
            let x = a.as_f64().unwrap_or_default();
            let y = b.as_f64().unwrap_or_default();
            x.total_cmp(&y)
        }
    }
}

/// Total order over field values, rank first.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    type_rank(a).cmp(&type_rank(b)).then_with(|| match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(l, r)| compare_values(l, r))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(_), Value::Object(_)) => {
            match (Timestamp::from_object(a), Timestamp::from_object(b)) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => compare_maps(a, b),
            }
        }
        _ => Ordering::Equal,
    })
}

/// Maps compare entry by entry in key order.
fn compare_maps(a: &Value, b: &Value) -> Ordering {
    fn entries(v: &Value) -> Vec<(&String, &Value)> {
        let mut entries: Vec<(&String, &Value)> =
            v.as_object().map(|m| m.iter().collect()).unwrap_or_default();
        entries.sort_by(|l, r| l.0.cmp(r.0));
        entries
    }
    let (x, y) = (entries(a), entries(b));
    x.iter()
        .zip(&y)
        .map(|((lk, lv), (rk, rv))| lk.cmp(rk).then_with(|| compare_values(lv, rv)))
        .find(|ord| ord.is_ne())
        .unwrap_or_else(|| x.len().cmp(&y.len()))
}

/// A full result set of a query at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Documents in query order.
    pub documents: Vec<Document>,
    /// When the collection produced this snapshot.
    pub read_at: DateTime<Utc>,
}

impl Snapshot {
    /// Create a snapshot read now.
    #[must_use]
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            read_at: Utc::now(),
        }
    }

    /// Number of documents in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Check if the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// One delivery on a subscription.
#[derive(Debug)]
pub enum SnapshotEvent {
    /// The current result set replaced the previous one.
    Snapshot(Snapshot),
    /// The collection failed; no further events follow.
    Error(Error),
}

/// A live subscription to a collection query.
///
/// Events arrive in order through [`Subscription::next`]. The background
/// delivery task is stopped exactly once, by [`Subscription::unsubscribe`] or
/// on drop.
#[derive(Debug)]
pub struct Subscription {
    collection: String,
    events: mpsc::Receiver<SnapshotEvent>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap a delivery task and the channel it feeds.
    #[must_use]
    pub fn new(
        collection: impl Into<String>,
        events: mpsc::Receiver<SnapshotEvent>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            collection: collection.into(),
            events,
            task: Some(task),
        }
    }

    /// Name of the subscribed collection.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Wait for the next event. `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<SnapshotEvent> {
        self.events.recv().await
    }

    /// Check whether the delivery task is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Close the subscription.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.events.close();
            info!("Unsubscribed from '{}'", self.collection);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// A source of live query results.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// Backend name (for logging/debugging).
    fn name(&self) -> &'static str;

    /// Open a subscription to `query`.
    ///
    /// The first event is the current result set; every later change to the
    /// collection delivers a fresh full snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot start delivering.
    async fn subscribe(&self, query: &CollectionQuery) -> Result<Subscription>;
}

/// Change notices broadcast to memory subscribers.
#[derive(Debug, Clone)]
enum Change {
    Updated { collection: String },
    Failed { collection: String, message: String },
}

#[derive(Debug)]
struct MemoryInner {
    collections: Mutex<HashMap<String, Vec<Document>>>,
    changes: broadcast::Sender<Change>,
}

impl MemoryInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Document>>> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self, query: &CollectionQuery) -> Snapshot {
        let documents = self
            .lock()
            .get(&query.collection)
            .cloned()
            .unwrap_or_default();
        Snapshot::new(query.arrange(documents))
    }

    fn notify(&self, change: Change) {
        // No receivers just means nobody is subscribed yet
        let _ = self.changes.send(change);
    }
}

/// An in-process collection.
///
/// Cheap to clone; clones share the same documents. Every mutation pushes a
/// fresh snapshot to the subscribers of the touched collection.
#[derive(Debug, Clone)]
pub struct MemoryCollection {
    inner: Arc<MemoryInner>,
}

impl Default for MemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCollection {
    /// Create an empty memory collection.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(SUBSCRIPTION_BUFFER);
        Self {
            inner: Arc::new(MemoryInner {
                collections: Mutex::new(HashMap::new()),
                changes,
            }),
        }
    }

    /// Insert a document, replacing any document with the same id.
    pub fn insert(&self, collection: &str, document: Document) {
        {
            let mut guard = self.inner.lock();
            let docs = guard.entry(collection.to_string()).or_default();
            match docs.iter_mut().find(|d| d.id == document.id) {
                Some(existing) => *existing = document,
                None => docs.push(document),
            }
        }
        self.inner.notify(Change::Updated {
            collection: collection.to_string(),
        });
    }

    /// Replace the whole content of a collection.
    pub fn replace_all(&self, collection: &str, documents: Vec<Document>) {
        self.inner
            .lock()
            .insert(collection.to_string(), documents);
        self.inner.notify(Change::Updated {
            collection: collection.to_string(),
        });
    }

    /// Remove every document of a collection.
    pub fn clear(&self, collection: &str) {
        self.replace_all(collection, Vec::new());
    }

    /// Report a failure to every subscriber of `collection`.
    ///
    /// The affected subscriptions receive one error event and then end.
    pub fn fail(&self, collection: &str, message: impl Into<String>) {
        self.inner.notify(Change::Failed {
            collection: collection.to_string(),
            message: message.into(),
        });
    }

    /// Number of documents currently stored in `collection`.
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.inner.lock().get(collection).map_or(0, Vec::len)
    }

    /// Check if `collection` holds no documents.
    #[must_use]
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn subscribe(&self, query: &CollectionQuery) -> Result<Subscription> {
        // Listen before reading so no change between the two is missed
        let mut changes = self.inner.changes.subscribe();
        let initial = self.inner.snapshot(query);

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let inner = Arc::clone(&self.inner);
        let query = query.clone();

        info!(
            "Subscribed to memory collection '{}' ordered by {}",
            query.collection, query.order_by
        );

        let collection = query.collection.clone();
        let task = tokio::spawn(async move {
            if tx.send(SnapshotEvent::Snapshot(initial)).await.is_err() {
                return;
            }
            loop {
                let event = match changes.recv().await {
                    Ok(Change::Updated { collection }) if collection == query.collection => {
                        SnapshotEvent::Snapshot(inner.snapshot(&query))
                    }
                    Ok(Change::Failed {
                        collection,
                        message,
                    }) if collection == query.collection => {
                        warn!("Memory collection '{}' failed: {}", collection, message);
                        let _ = tx
                            .send(SnapshotEvent::Error(Error::subscription(collection, message)))
                            .await;
                        return;
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Snapshots are full replacements, so one fresh read covers the gap
                        debug!("Subscriber lagged by {} changes, resending snapshot", skipped);
                        SnapshotEvent::Snapshot(inner.snapshot(&query))
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        });

        Ok(Subscription::new(collection, rx, task))
    }
}
