//! Change events and the in-process change feed.
//!
//! A [`ChangeFeed`] fans events out to every subscriber of a collection.
//! Subscribers receive events in emission order; a subscriber whose
//! receiving end was dropped is removed on the next emit.
//!
//! # Usage
//!
//! ```rust
//! use docmap_store::{ChangeFeed, ChangeStream, OperationType};
//!
//! let feed = ChangeFeed::new();
//! let mut stream = feed.subscribe("users");
//!
//! feed.emit("users", OperationType::Delete, None, None);
//!
//! let event = stream.try_next_event().unwrap().unwrap();
//! assert_eq!(event.operation, OperationType::Delete);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use docmap_codec::{Document, DocumentId};
use parking_lot::RwLock;

use crate::backend::ChangeStream;
use crate::error::StoreResult;

/// Kind of change an event reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationType {
    /// A document was inserted.
    Insert,
    /// Fields of a document were updated in place.
    Update,
    /// A document was replaced as a whole.
    Replace,
    /// A document was deleted.
    Delete,
    /// The collection was dropped.
    Drop,
    /// The collection was renamed.
    Rename,
    /// The database was dropped.
    DropDatabase,
    /// The stream can no longer continue.
    Invalidate,
    /// Any operation this crate does not model.
    Other(String),
}

/// A single change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Feed-wide sequence number, increasing in emission order.
    pub sequence: u64,
    /// What happened.
    pub operation: OperationType,
    /// Identifier of the affected document, when there is one.
    pub document_id: Option<DocumentId>,
    /// Document after the change, when the store provides it.
    pub full_document: Option<Document>,
}

/// Distributes change events to per-collection subscribers.
///
/// The change feed:
/// - Preserves emission order
/// - Supports many subscribers per collection
/// - Is thread-safe
#[derive(Debug, Default)]
pub struct ChangeFeed {
    subscribers: RwLock<HashMap<String, Vec<Sender<ChangeEvent>>>>,
    sequence: AtomicU64,
}

impl ChangeFeed {
    /// Creates a new change feed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to changes of one collection.
    pub fn subscribe(&self, collection: &str) -> FeedStream {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(tx);
        FeedStream { receiver: Some(rx) }
    }

    /// Emits an event to every subscriber of `collection`.
    pub fn emit(
        &self,
        collection: &str,
        operation: OperationType,
        document_id: Option<DocumentId>,
        full_document: Option<Document>,
    ) {
        let mut subscribers = self.subscribers.write();
        let Some(senders) = subscribers.get_mut(collection) else {
            return;
        };
        let event = ChangeEvent {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            operation,
            document_id,
            full_document,
        };
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Ends every stream on `collection` with drop and invalidate events.
    pub fn invalidate(&self, collection: &str) {
        self.emit(collection, OperationType::Drop, None, None);
        self.emit(collection, OperationType::Invalidate, None, None);
        self.subscribers.write().remove(collection);
    }

    /// Returns the number of live subscribers of `collection`.
    pub fn subscriber_count(&self, collection: &str) -> usize {
        self.subscribers
            .read()
            .get(collection)
            .map_or(0, Vec::len)
    }
}

/// Receiving end of a [`ChangeFeed`] subscription.
#[derive(Debug)]
pub struct FeedStream {
    receiver: Option<Receiver<ChangeEvent>>,
}

impl ChangeStream for FeedStream {
    fn next_event(&mut self) -> StoreResult<Option<ChangeEvent>> {
        let Some(rx) = self.receiver.as_ref() else {
            return Ok(None);
        };
        match rx.recv() {
            Ok(event) => Ok(Some(event)),
            Err(_) => {
                self.receiver = None;
                Ok(None)
            }
        }
    }

    fn try_next_event(&mut self) -> StoreResult<Option<ChangeEvent>> {
        let Some(rx) = self.receiver.as_ref() else {
            return Ok(None);
        };
        match rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                self.receiver = None;
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        self.receiver = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_reach_only_their_collection() {
        let feed = ChangeFeed::new();
        let mut users = feed.subscribe("users");
        let mut orders = feed.subscribe("orders");

        feed.emit("users", OperationType::Insert, Some(DocumentId::generate()), None);

        assert!(users.try_next_event().unwrap().is_some());
        assert!(orders.try_next_event().unwrap().is_none());
    }

    #[test]
    fn sequence_increases() {
        let feed = ChangeFeed::new();
        let mut stream = feed.subscribe("c");
        feed.emit("c", OperationType::Insert, None, None);
        feed.emit("c", OperationType::Delete, None, None);

        let first = stream.try_next_event().unwrap().unwrap();
        let second = stream.try_next_event().unwrap().unwrap();
        assert!(first.sequence < second.sequence);
    }

    #[test]
    fn invalidate_ends_streams() {
        let feed = ChangeFeed::new();
        let mut stream = feed.subscribe("c");
        feed.invalidate("c");

        assert_eq!(
            stream.next_event().unwrap().unwrap().operation,
            OperationType::Drop
        );
        assert_eq!(
            stream.next_event().unwrap().unwrap().operation,
            OperationType::Invalidate
        );
        assert!(stream.next_event().unwrap().is_none());
        assert_eq!(feed.subscriber_count("c"), 0);
    }

    #[test]
    fn dropped_subscribers_are_removed() {
        let feed = ChangeFeed::new();
        let stream = feed.subscribe("c");
        assert_eq!(feed.subscriber_count("c"), 1);

        drop(stream);
        feed.emit("c", OperationType::Insert, None, None);
        assert_eq!(feed.subscriber_count("c"), 0);
    }

    #[test]
    fn closed_stream_yields_nothing() {
        let feed = ChangeFeed::new();
        let mut stream = feed.subscribe("c");
        stream.close();
        stream.close();
        feed.emit("c", OperationType::Insert, None, None);
        assert!(stream.try_next_event().unwrap().is_none());
    }
}
