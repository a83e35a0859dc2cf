//! Shared test utilities for the waymark test suite.
//!
//! Provides record builders, a fixed URL builder with short predictable
//! URLs, an in-memory store factory, and fixture setup.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let store = store(vec![
//!     point(guid(1), "Trailhead"),
//!     photo(guid(2), "Dawn", at(2024, 3, 2)),
//! ]);
//! let ctx = RenderContext::new(&store, &TestUrls);
//!
//! // TestUrls: /{kind}s/{slug}
//! assert_eq!(TestUrls.page_url(&point(guid(1), "Trailhead")), "/points/trailhead");
//! ```

use std::path::Path;
use tempfile::TempDir;

use crate::details::sanitize_slug;
use crate::store::JsonStore;
use crate::types::{ContentKind, ContentRecord, PhotoDetails, PictureAsset, PictureSize};
use crate::urls::{SitePage, UrlBuilder, tag_slug};
use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

// =========================================================================
// Record builders
// =========================================================================

/// Deterministic GUID: `guid(1)` is `00000000-0000-0000-0000-000000000001`.
pub fn guid(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

/// Midnight on the given day.
pub fn at(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Minimal record; the slug is the lowercased, dashed title.
pub fn record(kind: ContentKind, content_id: Uuid, title: &str) -> ContentRecord {
    ContentRecord {
        content_id,
        kind,
        title: title.to_string(),
        slug: sanitize_slug(&title.to_lowercase()),
        folder: String::new(),
        summary: String::new(),
        body_content: String::new(),
        update_notes: None,
        tags: Vec::new(),
        created_on: at(2024, 1, 1),
        last_updated_on: None,
        main_picture: None,
        picture: None,
        photo: None,
        file: None,
        url: None,
    }
}

pub fn point(content_id: Uuid, title: &str) -> ContentRecord {
    record(ContentKind::Point, content_id, title)
}

/// Photo taken (and created) at `taken`, with sizes 400, 800 and 1200
/// named `{slug}--{width}.jpg`.
pub fn photo(content_id: Uuid, title: &str, taken: NaiveDateTime) -> ContentRecord {
    let mut p = record(ContentKind::Photo, content_id, title);
    p.created_on = taken;
    p.picture = Some(picture_asset(&p.slug, &[400, 800, 1200]));
    p.photo = Some(PhotoDetails {
        photo_created_on: Some(taken),
        ..Default::default()
    });
    p
}

pub fn picture_asset(slug: &str, widths: &[u32]) -> PictureAsset {
    PictureAsset {
        original_file: format!("{slug}.jpg"),
        sizes: widths
            .iter()
            .map(|&width| PictureSize {
                width,
                height: width * 2 / 3,
                file_name: format!("{slug}--{width}.jpg"),
            })
            .collect(),
    }
}

/// In-memory store over `records`, no reverse index.
pub fn store(records: Vec<ContentRecord>) -> JsonStore {
    JsonStore::from_records(records)
}

// =========================================================================
// URLs
// =========================================================================

/// URL builder with short, config-free URLs:
///
/// ```text
/// page      /{kind}s/{slug}
/// picture   /media/{kind}s/{slug}/{file}
/// local     file:///media/{kind}s/{slug}/{file}
/// download  /files/{slug}/{original_file}
/// site page /site/{page}
/// daily     /daily/{YYYY-MM-DD}
/// tag       /tags/{tag-slug}
/// ```
pub struct TestUrls;

impl UrlBuilder for TestUrls {
    fn page_url(&self, record: &ContentRecord) -> String {
        format!("/{}s/{}", record.kind, record.slug)
    }

    fn picture_url(&self, record: &ContentRecord, file_name: &str) -> String {
        format!("/media/{}s/{}/{}", record.kind, record.slug, file_name)
    }

    fn local_picture_url(&self, record: &ContentRecord, file_name: &str) -> String {
        format!("file://{}", self.picture_url(record, file_name))
    }

    fn file_download_url(&self, record: &ContentRecord) -> Option<String> {
        let file = record.file.as_ref().filter(|f| f.public_download)?;
        Some(format!("/files/{}/{}", record.slug, file.original_file))
    }

    fn site_page_url(&self, page: SitePage) -> String {
        format!("/site/{}", format!("{page:?}").to_lowercase())
    }

    fn daily_photos_url(&self, day: NaiveDate) -> String {
        format!("/daily/{}", day.format("%Y-%m-%d"))
    }

    fn tag_url(&self, tag: &str) -> String {
        format!("/tags/{}", tag_slug(tag))
    }
}

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

// =========================================================================
// Lookup helpers
// =========================================================================

/// Find a record by title. Panics with the available titles if missing.
pub fn find_record<'a>(records: &'a [ContentRecord], title: &str) -> &'a ContentRecord {
    records.iter().find(|r| r.title == title).unwrap_or_else(|| {
        let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
        panic!("record '{title}' not found, have: {titles:?}")
    })
}
