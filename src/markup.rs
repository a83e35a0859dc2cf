//! HTML fragment builders.
//!
//! Every piece of markup a resolved token or a related-content block turns
//! into is built here with maud, so escaping is handled in one place.
//! Fragments are self-contained: they carry their own CSS class hooks and,
//! for email, inline styles, since email clients drop stylesheets.
//!
//! | Builder | Used for |
//! |---|---|
//! | [`page_link`] | `*link` tokens, `post`, special pages, figure fallbacks |
//! | [`file_download_link`] | `filedownloadlink` with a public file |
//! | [`site_figure`] / [`local_figure`] | `photo` and `image` on Site / LocalDisplay |
//! | [`email_figure`] | `photo` and `image` in email |
//! | [`map_embed`] | `point`, `line`, `geojson`, `mapComponent` |
//! | [`related_block`] | the related-content sidebar |

use crate::details;
use crate::picture;
use crate::related::RelatedEntry;
use crate::types::ContentRecord;
use crate::urls::UrlBuilder;
use maud::{Markup, PreEscaped, html};

const FIGURE_SIZES: &str = "(max-width: 800px) 100vw, 800px";

/// How a map-bearing record is embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapEmbed {
    /// Element id prefix; the id is `{prefix}-{guid}`.
    pub element_prefix: &'static str,
    pub css_class: &'static str,
    /// Client-side function that draws the map into the container.
    pub init_function: &'static str,
}

pub fn page_link(css_class: &str, href: &str, text: &str) -> Markup {
    html! {
        a class=(css_class) href=(href) { (text) }
    }
}

pub fn file_download_link(href: &str, text: &str) -> Markup {
    html! {
        a.file-download-link href=(href) download { (text) }
    }
}

/// Published-site figure: responsive `srcset`, caption, linked to the page.
///
/// Returns `None` when the record has no generated picture sizes.
pub fn site_figure(
    record: &ContentRecord,
    display_text: Option<&str>,
    urls: &dyn UrlBuilder,
) -> Option<Markup> {
    let asset = record.picture.as_ref()?;
    let default = picture::best_for_width(asset, 800)?;
    let srcset = picture::srcset(asset, |file| urls.picture_url(record, file));
    let src = urls.picture_url(record, &default.file_name);
    Some(figure(
        record,
        display_text,
        &urls.page_url(record),
        &src,
        Some(&srcset),
    ))
}

/// Editor-preview figure: same shape as the site figure, pictures loaded
/// from the local media root.
pub fn local_figure(
    record: &ContentRecord,
    display_text: Option<&str>,
    urls: &dyn UrlBuilder,
) -> Option<Markup> {
    let asset = record.picture.as_ref()?;
    let default = picture::largest(asset)?;
    let src = urls.local_picture_url(record, &default.file_name);
    Some(figure(
        record,
        display_text,
        &urls.page_url(record),
        &src,
        None,
    ))
}

fn figure(
    record: &ContentRecord,
    display_text: Option<&str>,
    href: &str,
    src: &str,
    srcset: Option<&str>,
) -> Markup {
    let alt = details::alt_text(record);
    let caption = details::caption_lines(display_text, record);
    html! {
        figure class=(format!("single-{}-container", record.kind)) {
            a href=(href) {
                @if let Some(srcset) = srcset {
                    img.single-picture src=(src) srcset=(srcset) sizes=(FIGURE_SIZES) alt=(alt) loading="lazy";
                } @else {
                    img.single-picture src=(src) alt=(alt) loading="lazy";
                }
            }
            figcaption.single-picture-caption {
                @for line in &caption {
                    span.caption-line { (line) }
                }
            }
        }
    }
}

/// Email figure: a presentation table with one fixed-width picture and
/// inline styles.
pub fn email_figure(
    record: &ContentRecord,
    display_text: Option<&str>,
    urls: &dyn UrlBuilder,
    max_width: u32,
) -> Option<Markup> {
    let asset = record.picture.as_ref()?;
    let size = picture::best_for_width(asset, max_width)?;
    let width = size.width.min(max_width);
    let src = urls.picture_url(record, &size.file_name);
    let alt = details::alt_text(record);
    let caption = details::caption_lines(display_text, record).join(" - ");
    Some(html! {
        table role="presentation" width="100%" cellspacing="0" cellpadding="0" border="0" style="margin: 16px 0;" {
            tr {
                td align="center" {
                    a href=(urls.page_url(record)) {
                        img src=(src) width=(width) alt=(alt) style="display: block; max-width: 100%; height: auto; border: 0;";
                    }
                }
            }
            tr {
                td align="center" style="font-family: sans-serif; font-size: 14px; color: #555555; padding-top: 6px;" {
                    (caption)
                }
            }
        }
    })
}

/// Lazy map container plus the script that initializes it once visible.
pub fn map_embed(embed: &MapEmbed, record: &ContentRecord) -> Markup {
    let guid = record.content_id;
    let id = format!("{}-{}", embed.element_prefix, guid);
    let init = format!(
        "lazyInit(document.querySelector('#{id}'), () => {}(document.querySelector('#{id}'), '{guid}'));",
        embed.init_function
    );
    html! {
        div id=(id) class=(format!("leaflet-container leaflet-grab leaflet-touch-drag {}", embed.css_class)) data-content-id=(guid.to_string()) title=(details::plain_text(&record.title)) {}
        script { (PreEscaped(init)) }
    }
}

/// Tag links; empty markup when there are no tags.
pub fn tag_list(tags: &[String], urls: &dyn UrlBuilder) -> Markup {
    html! {
        @if !tags.is_empty() {
            div.tags-container {
                @for tag in tags {
                    a.tag-link href=(urls.tag_url(tag)) { (tag) }
                }
            }
        }
    }
}

/// One related entry: thumbnail, title link, summary, date, tags.
pub fn related_content_div(entry: &RelatedEntry, urls: &dyn UrlBuilder) -> Markup {
    html! {
        div.related-content-container {
            @if let Some(thumb) = &entry.thumbnail {
                div.related-content-image-container {
                    a href=(entry.href) {
                        img.related-content-image src=(thumb) alt=(entry.title) loading="lazy";
                    }
                }
            }
            div.related-content-text-container {
                p.related-content-title {
                    a href=(entry.href) { (entry.title) }
                }
                @if !entry.summary.is_empty() {
                    p.related-content-summary { (entry.summary) }
                }
                p.related-content-date { (entry.timestamp.format("%B %-d, %Y").to_string()) }
                (tag_list(&entry.tags, urls))
            }
        }
    }
}

/// Labelled container around related entries.
pub fn related_block(label: &str, entries: &[RelatedEntry], urls: &dyn UrlBuilder) -> Markup {
    html! {
        div.related-content-list-container {
            div.related-content-label { (label) }
            @for entry in entries {
                (related_content_div(entry, urls))
            }
        }
    }
}
