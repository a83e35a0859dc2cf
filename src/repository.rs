//! Content lookup seam.
//!
//! The [`ContentRepository`] trait is everything the rendering core needs
//! from persistence: GUID lookups with a kind hint, reverse-index edges for a
//! generation, live "who references this GUID" scans, and the photos taken on
//! a given day. The production implementation is
//! [`JsonStore`](crate::store::JsonStore); tests use the same store built from
//! in-memory records, or a counting wrapper.
//!
//! ## Missing vs. failing
//!
//! A lookup that finds nothing returns `Ok(None)`: a dangling reference is a
//! content problem and renders gracefully. `Err` means the repository itself
//! is broken, and callers in the dispatcher let it propagate.
//!
//! ## Request-scoped caching
//!
//! One page render can ask for the same few GUIDs dozens of times (the same
//! photo referenced as a figure and a link, related-content passes over
//! every resolver). [`LookupCache`] memoizes `find_by_content_id` for the
//! lifetime of a single top-level call and is dropped afterwards, so
//! separate calls still see the repository fresh.

use crate::types::{ContentKind, ContentRecord, GenerationVersion};
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Repository unavailable: {0}")]
    Unavailable(String),
}

/// Read access to stored content.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Find a record by GUID. With a kind hint, records of another kind are
    /// not returned.
    async fn find_by_content_id(
        &self,
        content_id: Uuid,
        kind: Option<ContentKind>,
    ) -> Result<Option<ContentRecord>, RepositoryError>;

    /// GUIDs of content whose text referenced `content_id` when generation
    /// `version` was recorded. Edges from other generations are not returned.
    async fn related_content_edges(
        &self,
        content_id: Uuid,
        version: GenerationVersion,
    ) -> Result<Vec<Uuid>, RepositoryError>;

    /// Records whose searchable text contains `content_id`, scanned live.
    async fn content_referencing(
        &self,
        content_id: Uuid,
    ) -> Result<Vec<ContentRecord>, RepositoryError>;

    /// Photos taken on `day`, oldest first.
    async fn photos_on_day(&self, day: NaiveDate) -> Result<Vec<ContentRecord>, RepositoryError>;

    /// Every record, for index building and audits.
    async fn all_content(&self) -> Result<Vec<ContentRecord>, RepositoryError>;
}

type CacheKey = (Uuid, Option<ContentKind>);

/// Memoizing wrapper around another repository for one render call.
///
/// Only GUID lookups are cached (including misses); the other queries pass
/// straight through.
pub struct LookupCache<'a> {
    inner: &'a dyn ContentRepository,
    records: Mutex<HashMap<CacheKey, Option<ContentRecord>>>,
    misses: AtomicUsize,
}

impl<'a> LookupCache<'a> {
    pub fn new(inner: &'a dyn ContentRepository) -> Self {
        Self {
            inner,
            records: Mutex::new(HashMap::new()),
            misses: AtomicUsize::new(0),
        }
    }

    /// Number of lookups that went to the wrapped repository.
    pub fn storage_lookups(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ContentRepository for LookupCache<'_> {
    async fn find_by_content_id(
        &self,
        content_id: Uuid,
        kind: Option<ContentKind>,
    ) -> Result<Option<ContentRecord>, RepositoryError> {
        let key = (content_id, kind);
        let cached = self.records.lock().get(&key).cloned();
        if let Some(cached) = cached {
            return Ok(cached);
        }
        // The lock is not held across the await; two concurrent misses for
        // the same key both hit storage and store the same value.
        self.misses.fetch_add(1, Ordering::Relaxed);
        let found = self.inner.find_by_content_id(content_id, kind).await?;
        self.records.lock().insert(key, found.clone());
        Ok(found)
    }

    async fn related_content_edges(
        &self,
        content_id: Uuid,
        version: GenerationVersion,
    ) -> Result<Vec<Uuid>, RepositoryError> {
        self.inner.related_content_edges(content_id, version).await
    }

    async fn content_referencing(
        &self,
        content_id: Uuid,
    ) -> Result<Vec<ContentRecord>, RepositoryError> {
        self.inner.content_referencing(content_id).await
    }

    async fn photos_on_day(&self, day: NaiveDate) -> Result<Vec<ContentRecord>, RepositoryError> {
        self.inner.photos_on_day(day).await
    }

    async fn all_content(&self) -> Result<Vec<ContentRecord>, RepositoryError> {
        self.inner.all_content().await
    }
}
