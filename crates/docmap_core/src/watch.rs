//! Change feed consumer.
//!
//! A [`ChangeWatcher`] follows the change stream of one kind and turns
//! accepted events into entities. Every raw event is either accepted
//! (its operation matches the [`WatchMode`]), ignored (deletes, drops,
//! renames and anything else), or invalidating, which closes the watcher
//! for good.

use std::marker::PhantomData;

use docmap_store::{ChangeEvent, ChangeStream, OperationType};
use tracing::{debug, trace, warn};

use crate::codec::decode;
use crate::datastore::Datastore;
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};

/// Operations a [`ChangeWatcher`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchMode {
    /// Inserts only.
    Insert,
    /// Updates and replacements.
    UpdateReplace,
    /// Inserts, updates and replacements.
    All,
}

impl WatchMode {
    /// Returns true if events of `operation` are reported in this mode.
    pub fn accepts(self, operation: &OperationType) -> bool {
        match operation {
            OperationType::Insert => matches!(self, Self::Insert | Self::All),
            OperationType::Update | OperationType::Replace => {
                matches!(self, Self::UpdateReplace | Self::All)
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Closed,
}

/// Typed consumer of a kind's change stream.
pub struct ChangeWatcher<T: Entity> {
    datastore: Datastore,
    kind: String,
    stream: Box<dyn ChangeStream>,
    mode: WatchMode,
    buffered: Option<ChangeEvent>,
    state: State,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> std::fmt::Debug for ChangeWatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeWatcher")
            .field("kind", &self.kind)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("buffered", &self.buffered.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: Entity> ChangeWatcher<T> {
    pub(crate) fn new(
        datastore: Datastore,
        kind: &str,
        stream: Box<dyn ChangeStream>,
        mode: WatchMode,
    ) -> Self {
        Self {
            datastore,
            kind: kind.to_string(),
            stream,
            mode,
            buffered: None,
            state: State::Open,
            _marker: PhantomData,
        }
    }

    /// Mode the watcher was opened with.
    pub fn mode(&self) -> WatchMode {
        self.mode
    }

    /// Waits until an accepted event is buffered.
    ///
    /// Returns false once the watcher is closed, the stream ends or an
    /// invalidating event arrives. The buffered event is not consumed.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn has_next(&mut self) -> CoreResult<bool> {
        if self.buffered.is_some() {
            return Ok(true);
        }
        while self.state == State::Open {
            match self.stream.next_event()? {
                Some(event) => {
                    if self.admit(event) {
                        return Ok(true);
                    }
                }
                None => self.close(),
            }
        }
        Ok(false)
    }

    /// Returns the next changed entity if one is available without
    /// waiting.
    ///
    /// Events whose document no longer exists are skipped.
    ///
    /// # Errors
    ///
    /// Returns a store or decode error.
    pub fn try_next(&mut self) -> CoreResult<Option<T>> {
        loop {
            if !self.peek()? {
                return Ok(None);
            }
            let Some(event) = self.buffered.take() else {
                return Ok(None);
            };
            if let Some(entity) = self.materialize(&event)? {
                return Ok(Some(entity));
            }
        }
    }

    /// Returns the next changed entity.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoSuchElement`] if no accepted event is
    /// available, or a store or decode error.
    pub fn next_entity(&mut self) -> CoreResult<T> {
        self.try_next()?
            .ok_or_else(|| CoreError::no_such_element("no new items exist"))
    }

    /// Stops following the stream. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.state == State::Closed {
            return;
        }
        self.state = State::Closed;
        self.buffered = None;
        self.stream.close();
        debug!(kind = %self.kind, "change watcher closed");
    }

    /// Returns true once the watcher is closed or invalidated.
    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    fn peek(&mut self) -> CoreResult<bool> {
        while self.buffered.is_none() && self.state == State::Open {
            match self.stream.try_next_event()? {
                Some(event) => {
                    self.admit(event);
                }
                None => break,
            }
        }
        Ok(self.buffered.is_some())
    }

    fn admit(&mut self, event: ChangeEvent) -> bool {
        if self.mode.accepts(&event.operation) {
            self.buffered = Some(event);
            return true;
        }
        if event.operation == OperationType::Invalidate {
            debug!(kind = %self.kind, sequence = event.sequence, "change stream invalidated");
            self.close();
        } else {
            trace!(kind = %self.kind, operation = ?event.operation, "change event ignored");
        }
        false
    }

    fn materialize(&self, event: &ChangeEvent) -> CoreResult<Option<T>> {
        let doc = match (&event.full_document, event.document_id) {
            (Some(doc), _) => Some(doc.clone()),
            (None, Some(id)) => self.datastore.fetch_by_id(&self.kind, id)?,
            (None, None) => None,
        };
        match doc {
            Some(doc) => decode::<T>(&doc).map(Some),
            None => {
                warn!(
                    kind = %self.kind,
                    sequence = event.sequence,
                    "changed document no longer exists"
                );
                Ok(None)
            }
        }
    }
}

impl<T: Entity> Drop for ChangeWatcher<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Part;

    #[test]
    fn modes_classify_operations() {
        assert!(WatchMode::Insert.accepts(&OperationType::Insert));
        assert!(!WatchMode::Insert.accepts(&OperationType::Update));
        assert!(WatchMode::UpdateReplace.accepts(&OperationType::Replace));
        assert!(!WatchMode::UpdateReplace.accepts(&OperationType::Insert));
        for op in [
            OperationType::Delete,
            OperationType::Drop,
            OperationType::Rename,
            OperationType::Invalidate,
            OperationType::Other("noop".to_string()),
        ] {
            assert!(!WatchMode::All.accepts(&op));
        }
    }

    #[test]
    fn reports_inserts_and_updates() {
        let ds = Datastore::memory();
        let mut watcher = ds.watch::<Part>(WatchMode::All).unwrap();
        assert!(watcher.try_next().unwrap().is_none());

        let mut part = Part::new("p", 1);
        ds.save(&mut part, false).unwrap();
        part.qty = 2;
        ds.save(&mut part, false).unwrap();

        assert!(watcher.has_next().unwrap());
        let inserted = watcher.next_entity().unwrap();
        assert_eq!((inserted.code.as_str(), inserted.qty), ("p", 1));
        let updated = watcher.next_entity().unwrap();
        assert_eq!(updated.qty, 2);

        let err = watcher.next_entity().unwrap_err();
        assert!(matches!(err, CoreError::NoSuchElement { .. }));
    }

    #[test]
    fn insert_mode_ignores_updates_and_deletes() {
        let ds = Datastore::memory();
        let mut watcher = ds.watch::<Part>(WatchMode::Insert).unwrap();
        let mut part = Part::new("p", 1);
        ds.save(&mut part, false).unwrap();
        part.qty = 5;
        ds.save(&mut part, false).unwrap();
        ds.delete(&mut part, false).unwrap();

        assert_eq!(watcher.try_next().unwrap().unwrap().qty, 1);
        assert!(watcher.try_next().unwrap().is_none());
        assert!(!watcher.is_closed());
    }

    #[test]
    fn vanished_documents_are_skipped() {
        let ds = Datastore::memory();
        let mut watcher = ds.watch::<Part>(WatchMode::UpdateReplace).unwrap();
        let mut part = Part::new("gone", 1);
        ds.save(&mut part, false).unwrap();
        part.qty = 3;
        ds.save(&mut part, false).unwrap();
        ds.delete(&mut part, false).unwrap();

        assert!(watcher.try_next().unwrap().is_none());
    }

    #[test]
    fn drop_invalidates_and_close_is_idempotent() {
        let ds = Datastore::memory();
        let mut watcher = ds.watch::<Part>(WatchMode::All).unwrap();
        ds.drop_collection::<Part>().unwrap();

        assert!(!watcher.has_next().unwrap());
        assert!(watcher.is_closed());
        watcher.close();
        watcher.close();
        assert!(watcher.try_next().unwrap().is_none());
    }
}
