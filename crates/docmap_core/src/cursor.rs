//! Typed result cursors.

use std::marker::PhantomData;

use docmap_codec::Document;
use docmap_store::{DocumentCursor, FindRequest};
use tracing::debug;

use crate::codec::decode;
use crate::datastore::Datastore;
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::query::window;
use crate::schema::registry;

/// Iterates the results of a [`Query`](crate::Query) as entities of `T`.
///
/// Documents are decoded lazily. When the query asked for nested loading,
/// every returned entity has its nested entities loaded before it is
/// handed out. The cursor also implements [`Iterator`].
pub struct Cursor<T: Entity> {
    datastore: Datastore,
    results: Box<dyn DocumentCursor>,
    request: FindRequest,
    load_nested: bool,
    peeked: Option<Document>,
    last: Option<Document>,
    seen: u64,
    closed: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> std::fmt::Debug for Cursor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("seen", &self.seen)
            .field("closed", &self.closed)
            .field("load_nested", &self.load_nested)
            .finish_non_exhaustive()
    }
}

impl<T: Entity> Cursor<T> {
    pub(crate) fn new(
        datastore: Datastore,
        results: Box<dyn DocumentCursor>,
        request: FindRequest,
        load_nested: bool,
    ) -> Self {
        Self {
            datastore,
            results,
            request,
            load_nested,
            peeked: None,
            last: None,
            seen: 0,
            closed: false,
            _marker: PhantomData,
        }
    }

    /// Returns true if another result is available, fetching it if needed.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn has_next(&mut self) -> CoreResult<bool> {
        if self.peeked.is_some() {
            return Ok(true);
        }
        if self.closed {
            return Ok(false);
        }
        self.peeked = self.results.next_document()?;
        Ok(self.peeked.is_some())
    }

    /// Returns the next entity.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoSuchElement`] when the cursor is exhausted,
    /// or a store or decode error.
    pub fn next_entity(&mut self) -> CoreResult<T> {
        if !self.has_next()? {
            return Err(CoreError::no_such_element("cursor is exhausted"));
        }
        let doc = self
            .peeked
            .take()
            .ok_or_else(|| CoreError::no_such_element("cursor is exhausted"))?;
        self.advance(doc)
    }

    /// Returns the next entity if one is available without waiting.
    ///
    /// # Errors
    ///
    /// Returns a store or decode error.
    pub fn try_next(&mut self) -> CoreResult<Option<T>> {
        let doc = match self.peeked.take() {
            Some(doc) => Some(doc),
            None if self.closed => None,
            None => self.results.try_next_document()?,
        };
        doc.map(|doc| self.advance(doc)).transpose()
    }

    /// Returns the next entity, or `None` if the cursor is exhausted.
    ///
    /// # Errors
    ///
    /// Returns a store or decode error.
    pub fn one(&mut self) -> CoreResult<Option<T>> {
        if self.has_next()? {
            self.next_entity().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Decodes the last returned entity again.
    ///
    /// # Errors
    ///
    /// Returns a decode error.
    pub fn current(&self) -> CoreResult<Option<T>> {
        self.last.as_ref().map(|doc| self.materialize(doc)).transpose()
    }

    /// Number of entities returned so far.
    pub fn num_seen(&self) -> u64 {
        self.seen
    }

    /// Number of documents matching the query, ignoring skip and limit.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn total_count(&self) -> CoreResult<u64> {
        let desc = registry::describe::<T>()?;
        Ok(self
            .datastore
            .store()
            .count(desc.kind(), &self.request.filter)?)
    }

    /// Number of results the query yields after skip and limit.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn window_size(&self) -> CoreResult<u64> {
        Ok(window(self.total_count()?, self.request.skip, self.request.limit))
    }

    /// Releases the underlying store cursor. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.peeked = None;
        self.results.close();
        debug!(seen = self.seen, "cursor closed");
    }

    /// Returns true once [`Cursor::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn advance(&mut self, doc: Document) -> CoreResult<T> {
        let entity = self.materialize(&doc)?;
        self.seen += 1;
        self.last = Some(doc);
        Ok(entity)
    }

    fn materialize(&self, doc: &Document) -> CoreResult<T> {
        let mut entity = decode::<T>(doc)?;
        if self.load_nested {
            self.datastore.load_nested(&mut entity)?;
        }
        Ok(entity)
    }
}

impl<T: Entity> Iterator for Cursor<T> {
    type Item = CoreResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.has_next() {
            Ok(true) => Some(self.next_entity()),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl<T: Entity> Drop for Cursor<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::query::SortDirection;
    use crate::test_support::{Owner, Part};

    fn seeded() -> Datastore {
        let ds = Datastore::memory();
        for (code, qty) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
            ds.save(&mut Part::new(code, qty), false).unwrap();
        }
        ds
    }

    #[test]
    fn walks_results_in_order() {
        let ds = seeded();
        let mut cursor = ds
            .query::<Part>()
            .unwrap()
            .sort("qty", SortDirection::Asc)
            .execute(&ds)
            .unwrap();

        assert!(cursor.current().unwrap().is_none());
        assert!(cursor.has_next().unwrap());
        assert!(cursor.has_next().unwrap());
        assert_eq!(cursor.next_entity().unwrap().code, "a");
        assert_eq!(cursor.current().unwrap().unwrap().code, "a");
        assert_eq!(cursor.try_next().unwrap().unwrap().code, "b");
        assert_eq!(cursor.num_seen(), 2);

        let rest: Vec<String> = cursor.by_ref().map(|p| p.unwrap().code).collect();
        assert_eq!(rest, vec!["c", "d"]);
        assert!(!cursor.has_next().unwrap());
        assert!(cursor.one().unwrap().is_none());
        let err = cursor.next_entity().unwrap_err();
        assert!(matches!(err, CoreError::NoSuchElement { .. }));
        assert_eq!(cursor.num_seen(), 4);
    }

    #[test]
    fn count_and_size_follow_paging() {
        let ds = seeded();
        let mut cursor = ds
            .query::<Part>()
            .unwrap()
            .filter(Filter::gt("qty", 1).unwrap())
            .unwrap()
            .skip(1)
            .limit(5)
            .execute(&ds)
            .unwrap();
        assert_eq!(cursor.total_count().unwrap(), 3);
        assert_eq!(cursor.window_size().unwrap(), 2);

        assert_eq!(cursor.by_ref().count(), 2);
        assert_eq!(cursor.total_count().unwrap(), 3);
        assert_eq!(cursor.window_size().unwrap(), 2);
    }

    #[test]
    fn close_is_idempotent() {
        let ds = seeded();
        let mut cursor = ds.query::<Part>().unwrap().execute(&ds).unwrap();
        assert!(cursor.has_next().unwrap());
        cursor.close();
        cursor.close();
        assert!(cursor.is_closed());
        assert!(!cursor.has_next().unwrap());
        assert!(cursor.try_next().unwrap().is_none());
    }

    #[test]
    fn nested_loading_fills_owned_children() {
        let ds = Datastore::memory();
        ds.save(&mut Part::new("p", 9), false).unwrap();
        ds.save(&mut Part::new("l", 7), false).unwrap();
        let mut owner = Owner::new("o");
        owner.plain = Some(Part::new("p", 0));
        owner.linked = Some(Part::new("l", 0));
        ds.save(&mut owner, false).unwrap();

        let shallow = ds.query::<Owner>().unwrap().execute(&ds).unwrap().one().unwrap().unwrap();
        assert_eq!(shallow.plain.as_ref().unwrap().qty, 0);

        let loaded = ds
            .query::<Owner>()
            .unwrap()
            .load_nested(true)
            .execute(&ds)
            .unwrap()
            .one()
            .unwrap()
            .unwrap();
        assert_eq!(loaded.plain.as_ref().unwrap().qty, 9);
        assert_eq!(loaded.linked.as_ref().unwrap().qty, 0);
    }
}
