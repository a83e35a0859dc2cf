//! File-backed content repository.
//!
//! Content records live as JSON files under the site's content directory,
//! one record per file or an array of records per file:
//!
//! ```text
//! content/
//! ├── points/trailhead.json        { "content_id": "...", "kind": "point", ... }
//! ├── photos/2024-03.json          [ { ... }, { ... } ]
//! └── posts/spring-hike.json
//! ```
//!
//! Files are read in path order so duplicate detection and error messages
//! are deterministic. Non-`.json` files are ignored. A loaded
//! [`RelatedIndex`] can be attached to serve reverse-index edges; without
//! one, every generation lookup returns no edges.

use crate::index::RelatedIndex;
use crate::repository::{ContentRepository, RepositoryError};
use crate::types::{ContentKind, ContentRecord, GenerationVersion};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
    #[error("Invalid content record in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Duplicate content id {id} in {path}")]
    DuplicateId { id: Uuid, path: PathBuf },
    #[error("Content directory not found: {0}")]
    NotFound(PathBuf),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordFile {
    One(Box<ContentRecord>),
    Many(Vec<ContentRecord>),
}

/// In-memory repository over a directory of JSON records.
#[derive(Debug, Default)]
pub struct JsonStore {
    records: HashMap<Uuid, ContentRecord>,
    index: Option<RelatedIndex>,
}

impl JsonStore {
    /// Load every `*.json` record under `dir`.
    pub fn load(dir: &Path) -> Result<Self, StoreError> {
        if !dir.is_dir() {
            return Err(StoreError::NotFound(dir.to_path_buf()));
        }
        let mut store = Self::default();
        for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|source| StoreError::Walk {
                path: source.path().unwrap_or(dir).to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some("json")
            {
                continue;
            }
            let content = std::fs::read_to_string(path)?;
            let parsed: RecordFile =
                serde_json::from_str(&content).map_err(|source| StoreError::Json {
                    path: path.to_path_buf(),
                    source,
                })?;
            let records = match parsed {
                RecordFile::One(record) => vec![*record],
                RecordFile::Many(records) => records,
            };
            for record in records {
                store.insert(record, path)?;
            }
        }
        tracing::debug!(dir = %dir.display(), records = store.len(), "loaded content store");
        Ok(store)
    }

    /// Build a store from records already in memory. Later duplicates
    /// replace earlier ones.
    pub fn from_records(records: impl IntoIterator<Item = ContentRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.content_id, r)).collect(),
            index: None,
        }
    }

    /// Attach a reverse index used by [`ContentRepository::related_content_edges`].
    pub fn with_index(mut self, index: RelatedIndex) -> Self {
        self.index = Some(index);
        self
    }

    fn insert(&mut self, record: ContentRecord, path: &Path) -> Result<(), StoreError> {
        let id = record.content_id;
        if self.records.insert(id, record).is_some() {
            return Err(StoreError::DuplicateId {
                id,
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&ContentRecord> {
        self.records.get(&id)
    }

    /// Records ordered by creation time, then GUID.
    fn sorted(&self) -> Vec<&ContentRecord> {
        let mut records: Vec<&ContentRecord> = self.records.values().collect();
        records.sort_by_key(|r| (r.created_on, r.content_id));
        records
    }
}

#[async_trait]
impl ContentRepository for JsonStore {
    async fn find_by_content_id(
        &self,
        content_id: Uuid,
        kind: Option<ContentKind>,
    ) -> Result<Option<ContentRecord>, RepositoryError> {
        Ok(self
            .records
            .get(&content_id)
            .filter(|r| kind.is_none_or(|k| r.kind == k))
            .cloned())
    }

    async fn related_content_edges(
        &self,
        content_id: Uuid,
        version: GenerationVersion,
    ) -> Result<Vec<Uuid>, RepositoryError> {
        Ok(self
            .index
            .as_ref()
            .filter(|index| index.is_generation(version))
            .map(|index| index.referencing(content_id).to_vec())
            .unwrap_or_default())
    }

    async fn content_referencing(
        &self,
        content_id: Uuid,
    ) -> Result<Vec<ContentRecord>, RepositoryError> {
        let needle = content_id.to_string();
        Ok(self
            .sorted()
            .into_iter()
            .filter(|r| r.content_id != content_id)
            .filter(|r| r.searchable_text().to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn photos_on_day(&self, day: NaiveDate) -> Result<Vec<ContentRecord>, RepositoryError> {
        let mut photos: Vec<ContentRecord> = self
            .records
            .values()
            .filter(|r| r.kind == ContentKind::Photo && r.photo_day() == day)
            .cloned()
            .collect();
        photos.sort_by_key(|p| {
            (
                p.photo.as_ref().and_then(|d| d.photo_created_on).unwrap_or(p.created_on),
                p.content_id,
            )
        });
        Ok(photos)
    }

    async fn all_content(&self) -> Result<Vec<ContentRecord>, RepositoryError> {
        Ok(self.sorted().into_iter().cloned().collect())
    }
}
