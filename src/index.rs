//! Generation-time reverse index of content references.
//!
//! Finding everything that links *to* an item means scanning every other
//! item's text. Doing that live for every page of a generation run is
//! O(N²), so the generator records the reference edges once per generation
//! and page renders read them back as long as the generation version
//! matches.
//!
//! # Design
//!
//! The index stores, per record, the GUIDs its searchable text references
//! (forward edges). The reverse view ("who references X") is derived at
//! load time and never serialized.
//!
//! ## Incremental rebuilds
//!
//! Each entry carries a SHA-256 hash of the record's searchable text. A
//! rebuild reuses an entry from the previous index when the hash still
//! matches and only re-tokenizes changed or new records. Entries keep every
//! reference their text makes, including ones to content that does not
//! exist (yet). Edges are only derived for targets that have an entry of
//! their own, so content that appears or disappears between generations
//! gains or loses its backlinks without re-scanning the referencing text.
//!
//! ## Storage
//!
//! The index is a JSON file at `<root>/.waymark-related.json` (configurable
//! via `paths.index_file`). A file that is missing, unreadable, or written
//! by another format version loads as an empty index.
//!
//! ## Bypassing the cache
//!
//! `waymark index --no-cache` starts from an empty previous index, so every
//! record is re-scanned.

use crate::grammar;
use crate::repository::{ContentRepository, RepositoryError};
use crate::types::{ContentRecord, GenerationVersion};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Version of the index file format. Bump this to invalidate existing
/// index files when the format or hashing changes.
const INDEX_VERSION: u32 = 2;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// One "`content_one`'s text references `content_two`" edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelatedEdge {
    pub content_one: Uuid,
    pub content_two: Uuid,
    pub generation_version: GenerationVersion,
}

/// Outgoing references of one record, whether or not the targets exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub text_hash: String,
    pub references: Vec<Uuid>,
}

/// On-disk reverse index for one generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedIndex {
    pub version: u32,
    pub generation_version: Option<GenerationVersion>,
    pub entries: BTreeMap<Uuid, IndexEntry>,
    /// Runtime reverse map: target → records referencing it, sorted.
    /// Built at load time. Never serialized.
    #[serde(skip)]
    referenced_by: HashMap<Uuid, Vec<Uuid>>,
}

impl RelatedIndex {
    /// Create an empty index (used for `--no-cache` or the first run).
    pub fn empty() -> Self {
        Self {
            version: INDEX_VERSION,
            generation_version: None,
            entries: BTreeMap::new(),
            referenced_by: HashMap::new(),
        }
    }

    fn from_entries(
        generation_version: GenerationVersion,
        entries: BTreeMap<Uuid, IndexEntry>,
    ) -> Self {
        let referenced_by = build_referenced_by(&entries);
        Self {
            version: INDEX_VERSION,
            generation_version: Some(generation_version),
            entries,
            referenced_by,
        }
    }

    /// Load from `path`. Returns an empty index if the file doesn't exist or
    /// can't be parsed (version mismatch, corruption).
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let mut index: Self = match serde_json::from_str(&content) {
            Ok(i) => i,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable related index");
                return Self::empty();
            }
        };
        if index.version != INDEX_VERSION {
            return Self::empty();
        }
        index.referenced_by = build_referenced_by(&index.entries);
        index
    }

    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Whether this index was built for `version`.
    pub fn is_generation(&self, version: GenerationVersion) -> bool {
        self.generation_version == Some(version)
    }

    /// Records whose text references `target`, in GUID order.
    pub fn referencing(&self, target: Uuid) -> &[Uuid] {
        self.referenced_by
            .get(&target)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every edge between indexed records, tagged with the generation it was
    /// recorded under. References to content without an entry are skipped.
    pub fn edges(&self) -> Vec<RelatedEdge> {
        let Some(generation_version) = self.generation_version else {
            return Vec::new();
        };
        resolved_references(&self.entries)
            .map(|(content_one, content_two)| RelatedEdge {
                content_one,
                content_two,
                generation_version,
            })
            .collect()
    }
}

/// `(source, target)` pairs whose target is itself an indexed record, in
/// source GUID order.
fn resolved_references(
    entries: &BTreeMap<Uuid, IndexEntry>,
) -> impl Iterator<Item = (Uuid, Uuid)> + '_ {
    entries.iter().flat_map(move |(source, entry)| {
        entry
            .references
            .iter()
            .filter(move |target| entries.contains_key(*target))
            .map(move |target| (*source, *target))
    })
}

fn build_referenced_by(entries: &BTreeMap<Uuid, IndexEntry>) -> HashMap<Uuid, Vec<Uuid>> {
    let mut map: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for (source, target) in resolved_references(entries) {
        map.entry(target).or_default().push(source);
    }
    map
}

/// SHA-256 hash of a record's searchable text, as a hex string.
pub fn hash_text(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// GUIDs referenced by bracket codes in `text`, in first-seen order.
///
/// Self-references, malformed GUIDs, and special pages are skipped.
pub fn outgoing_references(text: &str, own_id: Uuid) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    grammar::tokenize(text)
        .iter()
        .filter_map(|t| t.content_id())
        .filter(|id| *id != own_id && !id.is_nil())
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Summary of index reuse for one rebuild.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub reused: usize,
    pub scanned: usize,
    pub edges: usize,
}

impl IndexStats {
    pub fn total(&self) -> usize {
        self.reused + self.scanned
    }
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reused > 0 {
            write!(
                f,
                "{} cached, {} scanned ({} total), {} edges",
                self.reused,
                self.scanned,
                self.total(),
                self.edges
            )
        } else {
            write!(f, "{} scanned, {} edges", self.scanned, self.edges)
        }
    }
}

/// Build the reverse index for generation `version` from every record in
/// the repository, reusing unchanged entries from `previous`.
pub async fn build_generation_index(
    repository: &dyn ContentRepository,
    version: GenerationVersion,
    previous: &RelatedIndex,
) -> Result<(RelatedIndex, IndexStats), IndexError> {
    let records = repository.all_content().await?;
    Ok(build_from_records(&records, version, previous))
}

/// Synchronous core of [`build_generation_index`]; scans records in
/// parallel on the rayon pool.
pub fn build_from_records(
    records: &[ContentRecord],
    version: GenerationVersion,
    previous: &RelatedIndex,
) -> (RelatedIndex, IndexStats) {
    let scanned: Vec<(Uuid, IndexEntry, bool)> = records
        .par_iter()
        .map(|record| {
            let text = record.searchable_text();
            let text_hash = hash_text(&text);
            match previous.entries.get(&record.content_id) {
                Some(prev) if prev.text_hash == text_hash => {
                    (record.content_id, prev.clone(), true)
                }
                _ => {
                    let entry = IndexEntry {
                        references: outgoing_references(&text, record.content_id),
                        text_hash,
                    };
                    (record.content_id, entry, false)
                }
            }
        })
        .collect();

    let mut stats = IndexStats::default();
    let mut entries = BTreeMap::new();
    for (id, entry, reused) in scanned {
        if reused {
            stats.reused += 1;
        } else {
            stats.scanned += 1;
        }
        entries.insert(id, entry);
    }
    let index = RelatedIndex::from_entries(version, entries);
    stats.edges = index.edges().len();
    tracing::debug!(%version, %stats, "built related index");

    (index, stats)
}
