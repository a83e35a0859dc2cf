//! Related-content discovery for the sidebar of a content page.
//!
//! Related items come from three places:
//!
//! 1. **Forward references**: every bracket code in the item's searchable
//!    text (body, summary, update notes), across all resolvers.
//! 2. **Backward references**: content whose text references the item.
//!    With a generation version these come from the reverse index built
//!    for that generation; without one the corpus is scanned live.
//! 3. **Daily photo galleries**: when the item is a photo, or a related
//!    item is, the gallery page of that photo's day.
//!
//! Items are merged by GUID (first occurrence wins), the item itself is
//! dropped, and the list is ordered newest first by
//! `last_updated_on ?? created_on`. No items means no block at all.
//!
//! A failing lookup in any phase is logged, reported as
//! [`RenderEvent::RelatedSkipped`], and skipped: a sidebar with partial
//! results beats a failed page. Only cancellation aborts discovery.

use crate::details;
use crate::dispatch::{RenderContext, RenderError, RenderEvent};
use crate::markup;
use crate::picture;
use crate::repository::{ContentRepository, LookupCache, RepositoryError};
use crate::resolver::RESOLVERS;
use crate::types::{ContentKind, ContentRecord, GenerationVersion};
use chrono::{NaiveDate, NaiveDateTime};
use maud::Markup;
use std::cmp::Reverse;
use std::collections::HashSet;
use uuid::Uuid;

/// Identity of a related entry, used for deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelatedKey {
    Content(Uuid),
    DailyPhotos(NaiveDate),
}

/// One row of the related-content block, ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedEntry {
    pub key: RelatedKey,
    /// `None` for daily photo galleries.
    pub kind: Option<ContentKind>,
    pub title: String,
    pub href: String,
    pub summary: String,
    pub thumbnail: Option<String>,
    pub timestamp: NaiveDateTime,
    pub tags: Vec<String>,
}

/// Render the related-content block for `item`, or `None` when nothing is
/// related.
pub async fn build_related_content_block(
    ctx: &RenderContext<'_>,
    item: &ContentRecord,
    generation: Option<GenerationVersion>,
) -> Result<Option<Markup>, RenderError> {
    let entries = related_entries(ctx, item, generation).await?;
    if entries.is_empty() {
        return Ok(None);
    }
    Ok(Some(markup::related_block(
        &ctx.options.related_label,
        &entries,
        ctx.urls,
    )))
}

/// Discover, merge and order the related entries for `item`.
pub async fn related_entries(
    ctx: &RenderContext<'_>,
    item: &ContentRecord,
    generation: Option<GenerationVersion>,
) -> Result<Vec<RelatedEntry>, RenderError> {
    let cache = LookupCache::new(ctx.repository);
    let scoped = ctx.scoped(&cache);

    let mut records = forward_references(&scoped, item).await?;
    scoped.check_cancelled()?;
    records.extend(backward_references(&scoped, item, generation).await);

    let mut seen = HashSet::from([item.content_id]);
    records.retain(|r| seen.insert(r.content_id));

    let mut entries = Vec::with_capacity(records.len());
    for record in &records {
        entries.push(content_entry(&scoped, record).await);
    }

    if ctx.options.include_daily_photos {
        scoped.check_cancelled()?;
        entries.extend(daily_photo_entries(&scoped, item, &records).await);
    }

    entries.sort_by_key(|e| Reverse(e.timestamp));
    if let Some(max) = ctx.options.related_max_items {
        entries.truncate(max);
    }
    tracing::debug!(
        content_id = %item.content_id,
        related = entries.len(),
        lookups = cache.storage_lookups(),
        "discovered related content"
    );
    Ok(entries)
}

fn skipped(ctx: &RenderContext<'_>, phase: &'static str, error: &RepositoryError) {
    tracing::warn!(phase, %error, "skipping related content phase");
    ctx.report(RenderEvent::RelatedSkipped {
        phase,
        error: error.to_string(),
    });
}

async fn forward_references(
    ctx: &RenderContext<'_>,
    item: &ContentRecord,
) -> Result<Vec<ContentRecord>, RenderError> {
    let text = item.searchable_text();
    let mut found = Vec::new();
    for resolver in RESOLVERS {
        ctx.check_cancelled()?;
        match resolver
            .referenced_content(ctx.repository, &text, ctx.progress)
            .await
        {
            Ok(records) => found.extend(records),
            Err(e) => skipped(ctx, resolver.keyword, &e),
        }
    }
    Ok(found)
}

async fn backward_references(
    ctx: &RenderContext<'_>,
    item: &ContentRecord,
    generation: Option<GenerationVersion>,
) -> Vec<ContentRecord> {
    let Some(version) = generation else {
        return match ctx.repository.content_referencing(item.content_id).await {
            Ok(records) => records,
            Err(e) => {
                skipped(ctx, "backlinks", &e);
                Vec::new()
            }
        };
    };

    let ids = match ctx
        .repository
        .related_content_edges(item.content_id, version)
        .await
    {
        Ok(ids) => ids,
        Err(e) => {
            skipped(ctx, "related index", &e);
            return Vec::new();
        }
    };

    let mut found = Vec::with_capacity(ids.len());
    for id in ids {
        match ctx.repository.find_by_content_id(id, None).await {
            Ok(Some(record)) => found.push(record),
            Ok(None) => {}
            Err(e) => skipped(ctx, "related index", &e),
        }
    }
    found
}

/// Smallest picture size of a photo or image, as a site URL.
fn picture_thumbnail(ctx: &RenderContext<'_>, record: &ContentRecord) -> Option<String> {
    let size = picture::smallest(record.picture.as_ref()?)?;
    Some(ctx.urls.picture_url(record, &size.file_name))
}

async fn thumbnail(ctx: &RenderContext<'_>, record: &ContentRecord) -> Option<String> {
    if record.kind.is_picture() {
        return picture_thumbnail(ctx, record);
    }
    let main = record.main_picture?;
    match ctx.repository.find_by_content_id(main, None).await {
        Ok(Some(picture)) => picture_thumbnail(ctx, &picture),
        Ok(None) => None,
        Err(e) => {
            skipped(ctx, "thumbnail", &e);
            None
        }
    }
}

async fn content_entry(ctx: &RenderContext<'_>, record: &ContentRecord) -> RelatedEntry {
    RelatedEntry {
        key: RelatedKey::Content(record.content_id),
        kind: Some(record.kind),
        title: details::plain_text(&record.title).trim().to_string(),
        href: ctx.urls.page_url(record),
        summary: details::plain_text(&record.summary).trim().to_string(),
        thumbnail: thumbnail(ctx, record).await,
        timestamp: record.latest_timestamp(),
        tags: record.tags.clone(),
    }
}

/// Days of the item (if a photo) and of every related photo, first seen first.
fn photo_days(item: &ContentRecord, related: &[ContentRecord]) -> Vec<NaiveDate> {
    let mut seen = HashSet::new();
    std::iter::once(item)
        .chain(related)
        .filter(|r| r.kind == ContentKind::Photo)
        .map(ContentRecord::photo_day)
        .filter(|day| seen.insert(*day))
        .collect()
}

async fn daily_photo_entries(
    ctx: &RenderContext<'_>,
    item: &ContentRecord,
    related: &[ContentRecord],
) -> Vec<RelatedEntry> {
    let mut entries = Vec::new();
    for day in photo_days(item, related) {
        let photos = match ctx.repository.photos_on_day(day).await {
            Ok(photos) => photos,
            Err(e) => {
                skipped(ctx, "daily photos", &e);
                continue;
            }
        };
        let Some(newest) = photos.iter().map(ContentRecord::latest_timestamp).max() else {
            continue;
        };
        let count = photos.len();
        entries.push(RelatedEntry {
            key: RelatedKey::DailyPhotos(day),
            kind: None,
            title: format!("Daily Photos - {}", day.format("%A, %B %-d, %Y")),
            href: ctx.urls.daily_photos_url(day),
            summary: if count == 1 {
                "1 photo".to_string()
            } else {
                format!("{count} photos")
            },
            thumbnail: photos.first().and_then(|p| picture_thumbnail(ctx, p)),
            timestamp: newest,
            tags: Vec::new(),
        });
    }
    entries
}
