//! Channel dispatch: run every resolver over a body of text.
//!
//! Each output channel has a fixed chain of steps, one per keyword, ending
//! with the special pages. Resolvers only match their own keyword and the
//! markup they emit never looks like a bracket code, so a step can't
//! re-match an earlier step's output.
//!
//! | Step | Site / LocalDisplay | Email |
//! |---|---|---|
//! | `filedownloadlink`, `filelink` | render | render |
//! | `geojson` | map embed | stripped |
//! | `geojsonlink`, `image`, `imagelink` | render | render |
//! | `line` | map embed | stripped |
//! | `linelink` | render | render |
//! | `mapComponent` | map embed | stripped |
//! | `notelink`, `photo`, `photolink` | render | render |
//! | `point` | map embed | stripped |
//! | `pointlink`, `post`, special pages | render | render |
//!
//! ## Dependencies
//!
//! Everything a render needs arrives in a [`RenderContext`]: the repository,
//! the URL builder, an optional progress channel, a cancellation token, and
//! the render options. Each top-level call wraps the repository in a fresh
//! [`LookupCache`], so a GUID referenced many times in one text is fetched
//! once, while two calls never share results.
//!
//! ## Errors
//!
//! Malformed and dangling codes are content problems: they are reported as
//! [`RenderEvent`]s and rendered per the resolver's policy. A failing
//! repository aborts the whole call with [`RenderError::Repository`].
//! Cancellation is checked before every step.

use crate::config::SiteConfig;
use crate::grammar::{self, TokenTarget};
use crate::repository::{ContentRepository, LookupCache, RepositoryError};
use crate::resolver::{self, Resolver};
use crate::types::{Channel, ContentRecord};
use crate::urls::UrlBuilder;
use std::collections::HashSet;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Render cancelled")]
    Cancelled,
}

/// Progress reported while rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    /// A token's target was found.
    Resolved {
        keyword: &'static str,
        content_id: Uuid,
        title: String,
    },
    /// Well-formed GUID, no record of the keyword's kind.
    Unresolved {
        keyword: &'static str,
        content_id: Uuid,
    },
    /// The GUID slot did not parse.
    Malformed { keyword: &'static str, raw: String },
    /// Tokens removed because the channel can't show them.
    Stripped { keyword: &'static str, count: usize },
    /// A related-content phase failed and was skipped.
    RelatedSkipped { phase: &'static str, error: String },
}

/// Tunables that shape rendered output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub email_max_image_width: u32,
    pub related_label: String,
    pub related_max_items: Option<usize>,
    pub include_daily_photos: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from(&SiteConfig::default())
    }
}

impl From<&SiteConfig> for RenderOptions {
    fn from(config: &SiteConfig) -> Self {
        Self {
            email_max_image_width: config.email.max_image_width,
            related_label: config.related.label.clone(),
            related_max_items: config.related.max_items,
            include_daily_photos: config.related.include_daily_photos,
        }
    }
}

/// Collaborators and settings for one render call.
#[derive(Clone)]
pub struct RenderContext<'a> {
    pub repository: &'a dyn ContentRepository,
    pub urls: &'a dyn UrlBuilder,
    pub progress: Option<&'a Sender<RenderEvent>>,
    pub cancel: CancellationToken,
    pub options: RenderOptions,
}

impl<'a> RenderContext<'a> {
    pub fn new(repository: &'a dyn ContentRepository, urls: &'a dyn UrlBuilder) -> Self {
        Self {
            repository,
            urls,
            progress: None,
            cancel: CancellationToken::new(),
            options: RenderOptions::default(),
        }
    }

    pub fn with_progress(mut self, progress: &'a Sender<RenderEvent>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn report(&self, event: RenderEvent) {
        if let Some(tx) = self.progress {
            tx.send(event).ok();
        }
    }

    pub fn check_cancelled(&self) -> Result<(), RenderError> {
        if self.cancel.is_cancelled() {
            Err(RenderError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Same context over a different repository (the per-call cache).
    pub(crate) fn scoped<'b>(&'b self, repository: &'b dyn ContentRepository) -> RenderContext<'b> {
        RenderContext {
            repository,
            urls: self.urls,
            progress: self.progress,
            cancel: self.cancel.clone(),
            options: self.options.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Render(&'static Resolver),
    Strip(&'static Resolver),
    SpecialPages,
}

const SITE_CHAIN: &[Step] = &[
    Step::Render(&resolver::FILE_DOWNLOAD_LINK),
    Step::Render(&resolver::FILE_LINK),
    Step::Render(&resolver::GEOJSON),
    Step::Render(&resolver::GEOJSON_LINK),
    Step::Render(&resolver::IMAGE),
    Step::Render(&resolver::IMAGE_LINK),
    Step::Render(&resolver::LINE),
    Step::Render(&resolver::LINE_LINK),
    Step::Render(&resolver::MAP_COMPONENT),
    Step::Render(&resolver::NOTE_LINK),
    Step::Render(&resolver::PHOTO),
    Step::Render(&resolver::PHOTO_LINK),
    Step::Render(&resolver::POINT),
    Step::Render(&resolver::POINT_LINK),
    Step::Render(&resolver::POST),
    Step::SpecialPages,
];

const EMAIL_CHAIN: &[Step] = &[
    Step::Render(&resolver::FILE_DOWNLOAD_LINK),
    Step::Render(&resolver::FILE_LINK),
    Step::Strip(&resolver::GEOJSON),
    Step::Render(&resolver::GEOJSON_LINK),
    Step::Render(&resolver::IMAGE),
    Step::Render(&resolver::IMAGE_LINK),
    Step::Strip(&resolver::LINE),
    Step::Render(&resolver::LINE_LINK),
    Step::Strip(&resolver::MAP_COMPONENT),
    Step::Render(&resolver::NOTE_LINK),
    Step::Render(&resolver::PHOTO),
    Step::Render(&resolver::PHOTO_LINK),
    Step::Strip(&resolver::POINT),
    Step::Render(&resolver::POINT_LINK),
    Step::Render(&resolver::POST),
    Step::SpecialPages,
];

fn chain(channel: Channel) -> &'static [Step] {
    match channel {
        Channel::Site | Channel::LocalDisplay => SITE_CHAIN,
        Channel::Email => EMAIL_CHAIN,
    }
}

/// Resolve every bracket code in `text` for `channel`.
pub async fn process_codes(
    ctx: &RenderContext<'_>,
    text: &str,
    channel: Channel,
) -> Result<String, RenderError> {
    let cache = LookupCache::new(ctx.repository);
    let scoped = ctx.scoped(&cache);

    let mut output = text.to_string();
    for step in chain(channel) {
        scoped.check_cancelled()?;
        output = match *step {
            Step::Render(resolver) => resolver.render(&scoped, &output, channel).await?,
            Step::Strip(resolver) => resolver.strip(&output, scoped.progress),
            Step::SpecialPages => resolver::render_special_pages(&output, scoped.urls),
        };
    }

    tracing::debug!(%channel, lookups = cache.storage_lookups(), "processed bracket codes");
    Ok(output)
}

/// Published-site HTML: maps, responsive figures.
pub async fn process_for_site(ctx: &RenderContext<'_>, text: &str) -> Result<String, RenderError> {
    process_codes(ctx, text, Channel::Site).await
}

/// Email-safe HTML: no maps or scripts, inline-styled figures.
pub async fn process_for_email(ctx: &RenderContext<'_>, text: &str) -> Result<String, RenderError> {
    process_codes(ctx, text, Channel::Email).await
}

/// Editor preview HTML: like the site, pictures from local media.
pub async fn process_for_local_display(
    ctx: &RenderContext<'_>,
    text: &str,
) -> Result<String, RenderError> {
    process_codes(ctx, text, Channel::LocalDisplay).await
}

/// Records referenced by `keyword` tokens in `text`; empty for unknown
/// keywords.
pub async fn referenced_content(
    ctx: &RenderContext<'_>,
    text: &str,
    keyword: &str,
) -> Result<Vec<ContentRecord>, RenderError> {
    let Some(resolver) = resolver::for_keyword(keyword) else {
        return Ok(Vec::new());
    };
    ctx.check_cancelled()?;
    Ok(resolver
        .referenced_content(ctx.repository, text, ctx.progress)
        .await?)
}

/// Why a token can't be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DanglingReason {
    /// No resolver or special page uses the keyword.
    UnknownKeyword,
    /// The GUID slot did not parse.
    MalformedId,
    /// No record of the keyword's kind has the GUID.
    NotFound,
}

/// A bracket code that would not resolve on render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    pub raw: String,
    pub keyword: String,
    pub reason: DanglingReason,
}

/// Every distinct token in `text` that would not resolve, in source order.
pub async fn dangling_references(
    ctx: &RenderContext<'_>,
    text: &str,
) -> Result<Vec<DanglingReference>, RenderError> {
    let cache = LookupCache::new(ctx.repository);
    let mut seen = HashSet::new();
    let mut dangling = Vec::new();

    for token in grammar::tokenize(text) {
        if !seen.insert(token.raw.clone()) {
            continue;
        }
        ctx.check_cancelled()?;
        let reason = match &token.target {
            TokenTarget::Page => resolver::special_page(&token.keyword)
                .is_none()
                .then_some(DanglingReason::UnknownKeyword),
            TokenTarget::Malformed(_) => Some(match resolver::for_keyword(&token.keyword) {
                Some(_) => DanglingReason::MalformedId,
                None => DanglingReason::UnknownKeyword,
            }),
            TokenTarget::Content(id) => match resolver::for_keyword(&token.keyword) {
                None => Some(DanglingReason::UnknownKeyword),
                Some(resolver) => cache
                    .find_by_content_id(*id, Some(resolver.kind))
                    .await?
                    .is_none()
                    .then_some(DanglingReason::NotFound),
            },
        };
        if let Some(reason) = reason {
            dangling.push(DanglingReference {
                raw: token.raw,
                keyword: token.keyword,
                reason,
            });
        }
    }
    Ok(dangling)
}
