//! Display text and caption resolution.
//!
//! Every rendered token needs a piece of visible text, and pictures need
//! alt text and a caption on top of that. Each value has several possible
//! sources; the first non-empty one wins:
//!
//! - **Link text**: token display clause → record title
//! - **Alt text**: photo alt text → record summary → record title
//! - **Caption**: link text, then the summary (unless it repeats the link
//!   text), then the camera details line for photos
//!
//! ## Camera details
//!
//! Photos record camera, lens and exposure values as free text. The details
//! line joins whichever are present, in a fixed order:
//!
//! ```text
//! Details: Fujifilm X-T5, XF 16mm, f/8, 1/250, ISO 200, 16mm
//! ```
//!
//! The camera make is dropped when the model already starts with it
//! (`Canon` + `Canon EOS R5` → `Canon EOS R5`).
//!
//! ## Record text
//!
//! Titles, summaries and alt text are stored text and may carry bracket
//! codes of their own. They are reduced with [`plain_text`] before being
//! used anywhere, so a figure never embeds a raw code that a later step of
//! the channel chain would rewrite into markup.

use crate::grammar;
use crate::types::{ContentRecord, PhotoDetails};

/// Resolve a text field from multiple sources.
///
/// Takes a list of optional values in priority order and returns the first
/// non-None, non-empty value, trimmed.
///
/// ```text
/// link text: resolve(&[display_text, title])
/// alt text:  resolve(&[alt_text, summary, title])
/// ```
pub fn resolve(sources: &[Option<&str>]) -> Option<String> {
    sources
        .iter()
        .filter_map(|opt| {
            opt.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
        .next()
}

/// Stored text with every bracket code replaced by its display clause, or
/// removed when it has none.
pub fn plain_text(text: &str) -> String {
    let tokens = grammar::tokenize(text);
    if tokens.is_empty() {
        return text.to_string();
    }
    let mut plain = String::with_capacity(text.len());
    let mut last = 0;
    for token in &tokens {
        plain.push_str(&text[last..token.span.start]);
        if let Some(display) = &token.display_text {
            plain.push_str(display);
        }
        last = token.span.end;
    }
    plain.push_str(&text[last..]);
    plain
}

/// Visible text for a rendered token: the display clause when given,
/// otherwise the record title.
pub fn link_text(display_text: Option<&str>, record: &ContentRecord) -> String {
    resolve(&[display_text, Some(&plain_text(&record.title))]).unwrap_or_default()
}

/// Alt text for a picture.
pub fn alt_text(record: &ContentRecord) -> String {
    let alt = record
        .photo
        .as_ref()
        .and_then(|p| p.alt_text.as_deref())
        .map(plain_text);
    resolve(&[
        alt.as_deref(),
        Some(&plain_text(&record.summary)),
        Some(&plain_text(&record.title)),
    ])
    .unwrap_or_default()
}

/// Caption lines for a figure, in display order.
pub fn caption_lines(display_text: Option<&str>, record: &ContentRecord) -> Vec<String> {
    let heading = link_text(display_text, record);
    let mut lines = vec![heading.clone()];
    if let Some(summary) = resolve(&[Some(&plain_text(&record.summary))])
        && summary != heading
    {
        lines.push(summary);
    }
    if let Some(details) = record.photo.as_ref().and_then(photo_details_line) {
        lines.push(details);
    }
    lines
}

/// `Details: ...` line for a photo, or `None` when no camera value is set.
pub fn photo_details_line(details: &PhotoDetails) -> Option<String> {
    let camera = match (
        resolve(&[details.camera_make.as_deref()]),
        resolve(&[details.camera_model.as_deref()]),
    ) {
        (Some(make), Some(model)) if model.starts_with(&make) => Some(model),
        (Some(make), Some(model)) => Some(format!("{make} {model}")),
        (make, model) => model.or(make),
    };

    let parts: Vec<String> = [
        camera,
        resolve(&[details.lens.as_deref()]),
        resolve(&[details.aperture.as_deref()]),
        resolve(&[details.shutter_speed.as_deref()]),
        details.iso.map(|iso| format!("ISO {iso}")),
        resolve(&[details.focal_length.as_deref()]),
    ]
    .into_iter()
    .flatten()
    .collect();

    if parts.is_empty() {
        None
    } else {
        Some(format!("Details: {}", parts.join(", ")))
    }
}

const MAX_SLUG_LEN: usize = 80;

/// Sanitize text for use in URLs and filenames.
///
/// - Replaces non-alphanumeric characters (except dashes) with dashes
/// - Collapses consecutive dashes into one
/// - Strips leading and trailing dashes
/// - Truncates to `MAX_SLUG_LEN` characters (breaks at last dash before limit)
pub fn sanitize_slug(title: &str) -> String {
    let slug: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();

    let mut collapsed = String::with_capacity(slug.len());
    let mut prev_dash = false;
    for c in slug.chars() {
        if c == '-' {
            if !prev_dash {
                collapsed.push('-');
            }
            prev_dash = true;
        } else {
            collapsed.push(c);
            prev_dash = false;
        }
    }

    let trimmed = collapsed.trim_matches('-');

    if trimmed.len() <= MAX_SLUG_LEN {
        trimmed.to_string()
    } else {
        let truncated = &trimmed[..MAX_SLUG_LEN];
        match truncated.rfind('-') {
            Some(pos) => truncated[..pos].to_string(),
            None => truncated.to_string(),
        }
    }
}
