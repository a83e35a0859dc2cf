//! Per-keyword bracket-code resolvers.
//!
//! Every content keyword behaves the same way: find its tokens, look up
//! each GUID (restricted to the keyword's content kind), and replace the
//! token with markup. Only three things differ between keywords, so a
//! resolver is a row in a table instead of a type:
//!
//! | Keyword | Kind | Renders as |
//! |---|---|---|
//! | `filedownloadlink` | file | download anchor, page link when not public |
//! | `filelink`, `geojsonlink`, `imagelink`, `linelink`, `notelink`, `photolink`, `pointlink`, `post` | (per keyword) | page link |
//! | `image`, `photo` | image, photo | figure with caption |
//! | `geojson`, `line`, `mapComponent`, `point` | (per keyword) | lazy map embed |
//!
//! Unresolvable tokens (malformed GUID, or no record of that kind) are
//! handled per row by [`UnresolvedPolicy`]. They never fail a render;
//! only repository errors do.
//!
//! GUID-less special page codes (`{{tagspage;}}`) live in the
//! [`SPECIAL_PAGES`] table and resolve without touching the repository.

use crate::details;
use crate::dispatch::{RenderContext, RenderEvent};
use crate::grammar;
use crate::markup::{self, MapEmbed};
use crate::repository::{ContentRepository, RepositoryError};
use crate::types::{Channel, ContentKind, ContentRecord};
use crate::urls::{SitePage, UrlBuilder};
use std::collections::HashSet;
use std::sync::mpsc::Sender;

/// What a resolved token turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStyle {
    /// Anchor to the record's page.
    PageLink,
    /// Direct download anchor when the file is public, page link otherwise.
    FileDownload,
    /// Picture figure; page link when the record has no picture sizes.
    Figure,
    /// Interactive map; removed entirely in email.
    MapEmbed(MapEmbed),
}

/// What happens to a token whose target cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedPolicy {
    /// Leave the raw token text in the output.
    LeaveToken,
    /// Replace the raw token with nothing.
    Remove,
}

/// One bracket-code keyword and how to resolve it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolver {
    pub keyword: &'static str,
    pub kind: ContentKind,
    pub style: RenderStyle,
    pub unresolved: UnresolvedPolicy,
}

const fn row(keyword: &'static str, kind: ContentKind, style: RenderStyle) -> Resolver {
    Resolver {
        keyword,
        kind,
        style,
        unresolved: UnresolvedPolicy::LeaveToken,
    }
}

const fn map(element_prefix: &'static str, css_class: &'static str, init_function: &'static str) -> RenderStyle {
    RenderStyle::MapEmbed(MapEmbed {
        element_prefix,
        css_class,
        init_function,
    })
}

pub const FILE_DOWNLOAD_LINK: Resolver =
    row("filedownloadlink", ContentKind::File, RenderStyle::FileDownload);
pub const FILE_LINK: Resolver = row("filelink", ContentKind::File, RenderStyle::PageLink);
pub const GEOJSON: Resolver = row(
    "geojson",
    ContentKind::GeoJson,
    map("GeoJson", "geojson-container", "singleGeoJsonMapInit"),
);
pub const GEOJSON_LINK: Resolver =
    row("geojsonlink", ContentKind::GeoJson, RenderStyle::PageLink);
pub const IMAGE: Resolver = row("image", ContentKind::Image, RenderStyle::Figure);
pub const IMAGE_LINK: Resolver = row("imagelink", ContentKind::Image, RenderStyle::PageLink);
pub const LINE: Resolver = row(
    "line",
    ContentKind::Line,
    map("Line", "line-container", "singleLineMapInit"),
);
pub const LINE_LINK: Resolver = row("linelink", ContentKind::Line, RenderStyle::PageLink);
pub const MAP_COMPONENT: Resolver = row(
    "mapComponent",
    ContentKind::MapComponent,
    map("MapComponent", "map-container", "mapComponentInit"),
);
pub const NOTE_LINK: Resolver = row("notelink", ContentKind::Note, RenderStyle::PageLink);
pub const PHOTO: Resolver = row("photo", ContentKind::Photo, RenderStyle::Figure);
pub const PHOTO_LINK: Resolver = row("photolink", ContentKind::Photo, RenderStyle::PageLink);
pub const POINT: Resolver = row(
    "point",
    ContentKind::Point,
    map("Point", "point-container", "singlePointMapInit"),
);
pub const POINT_LINK: Resolver = row("pointlink", ContentKind::Point, RenderStyle::PageLink);
pub const POST: Resolver = row("post", ContentKind::Post, RenderStyle::PageLink);

/// Every content resolver, in dispatch order.
pub const RESOLVERS: &[Resolver] = &[
    FILE_DOWNLOAD_LINK,
    FILE_LINK,
    GEOJSON,
    GEOJSON_LINK,
    IMAGE,
    IMAGE_LINK,
    LINE,
    LINE_LINK,
    MAP_COMPONENT,
    NOTE_LINK,
    PHOTO,
    PHOTO_LINK,
    POINT,
    POINT_LINK,
    POST,
];

/// The resolver owning `keyword`, if any.
pub fn for_keyword(keyword: &str) -> Option<&'static Resolver> {
    RESOLVERS.iter().find(|r| r.keyword == keyword)
}

/// Token text can't contain these without ending or splitting the token.
fn token_safe(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '{' | '}')).collect()
}

fn report(progress: Option<&Sender<RenderEvent>>, event: RenderEvent) {
    if let Some(tx) = progress {
        tx.send(event).ok();
    }
}

impl Resolver {
    /// Canonical token for inserting a reference to `record` into other text.
    pub fn create(&self, record: &ContentRecord) -> String {
        format!(
            "{{{{{} {}; {}}}}}",
            self.keyword,
            record.content_id,
            token_safe(&record.title)
        )
    }

    /// Token with a display override.
    pub fn create_with_display(&self, record: &ContentRecord, display_text: &str) -> String {
        let display: String = token_safe(display_text).replace(';', ",");
        format!(
            "{{{{{} {}; text {}; {}}}}}",
            self.keyword,
            record.content_id,
            display.trim(),
            token_safe(&record.title)
        )
    }

    pub fn is_spatial(&self) -> bool {
        matches!(self.style, RenderStyle::MapEmbed(_))
    }

    /// Records referenced by this keyword's tokens in `text`.
    ///
    /// GUIDs are looked up once each in first-seen order; malformed GUIDs
    /// and misses are skipped.
    pub async fn referenced_content(
        &self,
        repository: &dyn ContentRepository,
        text: &str,
        progress: Option<&Sender<RenderEvent>>,
    ) -> Result<Vec<ContentRecord>, RepositoryError> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for token in grammar::match_content_tokens(text, self.keyword) {
            if token.content_id.is_nil() || !seen.insert(token.content_id) {
                continue;
            }
            if let Some(record) = repository
                .find_by_content_id(token.content_id, Some(self.kind))
                .await?
            {
                report(
                    progress,
                    RenderEvent::Resolved {
                        keyword: self.keyword,
                        content_id: record.content_id,
                        title: record.title.clone(),
                    },
                );
                found.push(record);
            }
        }
        Ok(found)
    }

    /// Replace this keyword's tokens in `text` with markup for `channel`.
    ///
    /// Identical raw tokens are resolved once and replaced everywhere.
    pub async fn render(
        &self,
        ctx: &RenderContext<'_>,
        text: &str,
        channel: Channel,
    ) -> Result<String, RepositoryError> {
        if channel == Channel::Email && self.is_spatial() {
            return Ok(self.strip(text, ctx.progress));
        }

        let mut output = text.to_string();
        let mut done = HashSet::new();
        for token in grammar::match_content_tokens(text, self.keyword) {
            if !done.insert(token.raw.clone()) {
                continue;
            }
            if token.content_id.is_nil() {
                tracing::debug!(keyword = self.keyword, raw = %token.raw, "malformed bracket code");
                ctx.report(RenderEvent::Malformed {
                    keyword: self.keyword,
                    raw: token.raw.clone(),
                });
                output = self.apply_unresolved(output, &token.raw);
                continue;
            }

            let record = ctx
                .repository
                .find_by_content_id(token.content_id, Some(self.kind))
                .await?;
            match record {
                Some(record) => {
                    let html = self.markup(ctx, &record, token.display_text.as_deref(), channel);
                    output = output.replace(&token.raw, &html);
                    ctx.report(RenderEvent::Resolved {
                        keyword: self.keyword,
                        content_id: record.content_id,
                        title: record.title,
                    });
                }
                None => {
                    tracing::warn!(keyword = self.keyword, content_id = %token.content_id, "unresolved bracket code");
                    ctx.report(RenderEvent::Unresolved {
                        keyword: self.keyword,
                        content_id: token.content_id,
                    });
                    output = self.apply_unresolved(output, &token.raw);
                }
            }
        }
        Ok(output)
    }

    /// Remove every token of this keyword, resolvable or not.
    pub fn strip(&self, text: &str, progress: Option<&Sender<RenderEvent>>) -> String {
        let tokens = grammar::match_content_tokens(text, self.keyword);
        if tokens.is_empty() {
            return text.to_string();
        }
        let mut output = text.to_string();
        for token in &tokens {
            output = output.replace(&token.raw, "");
        }
        report(
            progress,
            RenderEvent::Stripped {
                keyword: self.keyword,
                count: tokens.len(),
            },
        );
        output
    }

    fn apply_unresolved(&self, output: String, raw: &str) -> String {
        match self.unresolved {
            UnresolvedPolicy::LeaveToken => output,
            UnresolvedPolicy::Remove => output.replace(raw, ""),
        }
    }

    fn markup(
        &self,
        ctx: &RenderContext<'_>,
        record: &ContentRecord,
        display_text: Option<&str>,
        channel: Channel,
    ) -> String {
        let urls = ctx.urls;
        let page_link = || {
            markup::page_link(
                &format!("{}-page-link", record.kind),
                &urls.page_url(record),
                &details::link_text(display_text, record),
            )
        };
        let html = match self.style {
            RenderStyle::PageLink => page_link(),
            RenderStyle::FileDownload => match urls.file_download_url(record) {
                Some(href) => {
                    markup::file_download_link(&href, &details::link_text(display_text, record))
                }
                None => page_link(),
            },
            RenderStyle::Figure => match channel {
                Channel::Site => markup::site_figure(record, display_text, urls),
                Channel::Email => markup::email_figure(
                    record,
                    display_text,
                    urls,
                    ctx.options.email_max_image_width,
                ),
                Channel::LocalDisplay => markup::local_figure(record, display_text, urls),
            }
            .unwrap_or_else(page_link),
            RenderStyle::MapEmbed(embed) => markup::map_embed(&embed, record),
        };
        html.into_string()
    }
}

/// A GUID-less bracket code pointing at a site-wide page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialPage {
    pub keyword: &'static str,
    pub default_text: &'static str,
    pub page: SitePage,
}

const fn page(keyword: &'static str, default_text: &'static str, page: SitePage) -> SpecialPage {
    SpecialPage {
        keyword,
        default_text,
        page,
    }
}

pub const SPECIAL_PAGES: &[SpecialPage] = &[
    page("index", "Main", SitePage::Index),
    page("indexrss", "Main Page RSS Feed", SitePage::IndexRss),
    page("filerss", "Files RSS Feed", SitePage::FileRss),
    page("imagerss", "Images RSS Feed", SitePage::ImageRss),
    page("linkrss", "Links RSS Feed", SitePage::LinkRss),
    page("noterss", "Notes RSS Feed", SitePage::NoteRss),
    page("photorss", "Photo Gallery RSS Feed", SitePage::PhotoRss),
    page("photogallerypage", "Photo Gallery", SitePage::PhotoGallery),
    page("searchpage", "Search Page", SitePage::Search),
    page("tagspage", "Tags", SitePage::Tags),
    page("linklistpage", "Links", SitePage::LinkList),
];

pub fn special_page(keyword: &str) -> Option<&'static SpecialPage> {
    SPECIAL_PAGES.iter().find(|p| p.keyword == keyword)
}

impl SpecialPage {
    pub fn create(&self) -> String {
        format!("{{{{{};}}}}", self.keyword)
    }

    pub fn create_with_display(&self, display_text: &str) -> String {
        let display: String = token_safe(display_text).replace(';', ",");
        format!("{{{{{}; text {};}}}}", self.keyword, display.trim())
    }

    /// Replace this page's tokens with a link; identical on every channel.
    pub fn render(&self, text: &str, urls: &dyn UrlBuilder) -> String {
        let mut output = text.to_string();
        for token in grammar::match_special_page_tokens(text, self.keyword) {
            let label = details::resolve(&[token.display_text.as_deref(), Some(self.default_text)])
                .unwrap_or_default();
            let html = markup::page_link("special-page-link", &urls.site_page_url(self.page), &label);
            output = output.replace(&token.raw, &html.into_string());
        }
        output
    }
}

/// Resolve every special page token in `text`.
pub fn render_special_pages(text: &str, urls: &dyn UrlBuilder) -> String {
    SPECIAL_PAGES
        .iter()
        .fold(text.to_string(), |acc, page| page.render(&acc, urls))
}
