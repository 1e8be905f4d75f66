//! Typed queries.
//!
//! A [`Query`] collects a filter, a projection, a sort order and paging
//! options for one entity type and turns them into a [`FindRequest`].
//! Filters built through [`Query::create_filter`] or installed with
//! [`Query::filter`] have their field paths checked against the type
//! when they are built, not when the query runs.

use std::marker::PhantomData;
use std::sync::Arc;

use docmap_codec::Document;
use docmap_store::FindRequest;
use tracing::debug;

use crate::cursor::Cursor;
use crate::datastore::Datastore;
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::filter::{validate_path, Combinator, Filter, FilterOperator, Operand};
use crate::schema::{registry, TypeDescriptor};

/// Sort direction of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl SortDirection {
    /// Wire value: 1 or -1.
    pub const fn value(self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Projection {
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

/// Number of results left after skipping `skip` of `total` matches and
/// applying `limit`.
pub(crate) fn window(total: u64, skip: u64, limit: Option<u64>) -> u64 {
    let remaining = total.saturating_sub(skip);
    limit.map_or(remaining, |limit| remaining.min(limit))
}

/// A query over the collection of `T`.
pub struct Query<T: Entity> {
    descriptor: Arc<TypeDescriptor>,
    filter: Option<Filter>,
    projection: Projection,
    keys_only: bool,
    sort: Vec<(String, SortDirection)>,
    skip: u64,
    limit: Option<u64>,
    batch_size: u32,
    load_nested: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            descriptor: Arc::clone(&self.descriptor),
            filter: self.filter.clone(),
            projection: self.projection.clone(),
            keys_only: self.keys_only,
            sort: self.sort.clone(),
            skip: self.skip,
            limit: self.limit,
            batch_size: self.batch_size,
            load_nested: self.load_nested,
            _marker: PhantomData,
        }
    }
}

impl<T: Entity> std::fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("kind", &self.descriptor.kind())
            .field("filter", &self.filter)
            .field("projection", &self.projection)
            .field("keys_only", &self.keys_only)
            .field("sort", &self.sort)
            .field("skip", &self.skip)
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

impl<T: Entity> Query<T> {
    /// Creates an unfiltered query over `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if `T` cannot be registered.
    pub fn new() -> CoreResult<Self> {
        Ok(Self {
            descriptor: registry::describe::<T>()?,
            filter: None,
            projection: Projection::All,
            keys_only: false,
            sort: Vec::new(),
            skip: 0,
            limit: None,
            batch_size: FindRequest::default().batch_size,
            load_nested: false,
            _marker: PhantomData,
        })
    }

    /// Kind queried.
    pub fn kind(&self) -> &str {
        self.descriptor.kind()
    }

    /// Builds a leaf filter after checking `path` against `T`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFieldPath`] if the path does not address
    /// stored data of `T`, or an encode error of the operand.
    pub fn create_filter(
        &self,
        path: &str,
        op: FilterOperator,
        operand: impl Operand,
    ) -> CoreResult<Filter> {
        validate_path(path, &self.descriptor)?;
        Filter::new(path, op, operand)
    }

    /// Combines filters.
    pub fn combine(&self, combinator: Combinator, filters: Vec<Filter>) -> Filter {
        Filter::group(combinator, filters)
    }

    /// Sets the filter.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFieldPath`] if a leaf path does not
    /// address stored data of `T`.
    pub fn filter(mut self, filter: Filter) -> CoreResult<Self> {
        filter.validate(&self.descriptor)?;
        self.filter = Some(filter);
        Ok(self)
    }

    /// Projects results onto the key fields.
    #[must_use]
    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }

    /// Adds fields to the inclusion projection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ProjectionConflict`] if fields are excluded.
    pub fn include<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> CoreResult<Self> {
        match &mut self.projection {
            Projection::Exclude(_) => Err(CoreError::projection_conflict(
                "cannot include fields when fields are excluded",
            )),
            Projection::Include(included) => {
                included.extend(fields.into_iter().map(Into::into));
                Ok(self)
            }
            Projection::All => {
                self.projection = Projection::Include(fields.into_iter().map(Into::into).collect());
                Ok(self)
            }
        }
    }

    /// Adds fields to the exclusion projection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ProjectionConflict`] if fields are included.
    pub fn exclude<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> CoreResult<Self> {
        match &mut self.projection {
            Projection::Include(_) => Err(CoreError::projection_conflict(
                "cannot exclude fields when fields are included",
            )),
            Projection::Exclude(excluded) => {
                excluded.extend(fields.into_iter().map(Into::into));
                Ok(self)
            }
            Projection::All => {
                self.projection = Projection::Exclude(fields.into_iter().map(Into::into).collect());
                Ok(self)
            }
        }
    }

    /// Appends a sort field. Sorting on a field again moves it to the end.
    #[must_use]
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        let field = field.into();
        self.sort.retain(|(f, _)| *f != field);
        self.sort.push((field, direction));
        self
    }

    /// Skips leading results.
    #[must_use]
    pub const fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// Caps the number of results; 0 removes the cap.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = if limit == 0 { None } else { Some(limit) };
        self
    }

    /// Documents fetched per round trip.
    #[must_use]
    pub const fn batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    /// Loads nested entities of every result.
    #[must_use]
    pub const fn load_nested(mut self, value: bool) -> Self {
        self.load_nested = value;
        self
    }

    /// Filter wire document; empty matches everything.
    pub fn filter_document(&self) -> Document {
        self.filter
            .as_ref()
            .map(|f| f.to_document().clone())
            .unwrap_or_default()
    }

    /// Projection wire document, if results are projected.
    ///
    /// # Errors
    ///
    /// Returns an error if the key schema of `T` cannot be built.
    pub fn projection(&self) -> CoreResult<Option<Document>> {
        if self.keys_only {
            return Ok(Some(self.descriptor.key_index_spec()?));
        }
        let (fields, flag) = match &self.projection {
            Projection::All => return Ok(None),
            Projection::Include(fields) => (fields, 1),
            Projection::Exclude(fields) => (fields, 0),
        };
        Ok(Some(fields.iter().map(|f| (f.as_str(), flag)).collect()))
    }

    /// Sort wire document.
    pub fn sort_document(&self) -> Document {
        self.sort
            .iter()
            .map(|(field, direction)| (field.as_str(), direction.value()))
            .collect()
    }

    /// Store request for this query.
    ///
    /// # Errors
    ///
    /// Same as [`Query::projection`].
    pub fn find_request(&self) -> CoreResult<FindRequest> {
        Ok(FindRequest {
            filter: self.filter_document(),
            projection: self.projection()?,
            sort: self.sort_document(),
            skip: self.skip,
            limit: self.limit,
            batch_size: self.batch_size,
        })
    }

    /// Runs the query.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn execute(&self, datastore: &Datastore) -> CoreResult<Cursor<T>> {
        datastore.ensure_collection(&self.descriptor)?;
        let request = self.find_request()?;
        let results = datastore.store().find(self.kind(), &request)?;
        debug!(kind = self.kind(), filter = %self.filter_document_json(), "query executed");
        Ok(Cursor::new(
            datastore.clone(),
            results,
            request,
            self.load_nested,
        ))
    }

    /// Total number of matches, ignoring skip and limit.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn count(&self, datastore: &Datastore) -> CoreResult<u64> {
        datastore.ensure_collection(&self.descriptor)?;
        Ok(datastore.store().count(self.kind(), &self.filter_document())?)
    }

    /// Number of results the query returns after skip and limit.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn size(&self, datastore: &Datastore) -> CoreResult<u64> {
        Ok(window(self.count(datastore)?, self.skip, self.limit))
    }

    fn filter_document_json(&self) -> String {
        self.filter
            .as_ref()
            .map_or_else(|| "{}".to_string(), ToString::to_string)
    }
}
