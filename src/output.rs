//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Output leads with what a user recognizes (titles, keywords, counts) and
//! shows identifiers and URLs as indented secondary lines:
//!
//! ## Render progress
//!
//! ```text
//!     resolved pointlink → Trailhead
//!     unresolved notelink 0b6f…-… (no matching content)
//!     stripped 2 point tokens
//! ```
//!
//! ## Related
//!
//! ```text
//! 001 Spring Hike (post, 2024-03-01)
//!     → https://example.com/Posts/spring-hike/spring-hike.html
//! 002 Daily Photos - Saturday, March 2, 2024 (2024-03-02)
//!     → https://example.com/Photos/Galleries/Daily/DailyPhotos-2024-03-02.html
//! ```
//!
//! ## Check
//!
//! ```text
//! Content
//!     2 photo
//!     1 post
//!
//! Dangling references
//! 001 Spring Hike
//!     Source: 00000000-0000-0000-0000-000000000004
//!     {{pointlink 00000000-0000-0000-0000-000000000062; gone}}: not found
//!
//! Checked 3 records, 1 dangling reference
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::dispatch::{DanglingReason, DanglingReference, RenderEvent};
use crate::index::IndexStats;
use crate::related::{RelatedEntry, RelatedKey};
use crate::types::{ContentKind, ContentRecord};
use std::collections::BTreeMap;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}...", &text[..cut]),
    }
}

/// Collapse a possibly multi-line token onto one line.
fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn plural(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}

// ============================================================================
// Render
// ============================================================================

/// Format a single render progress event as display lines.
pub fn format_render_event(event: &RenderEvent) -> Vec<String> {
    let line = match event {
        RenderEvent::Resolved { keyword, title, .. } => {
            format!("resolved {keyword} \u{2192} {title}")
        }
        RenderEvent::Unresolved {
            keyword,
            content_id,
        } => format!("unresolved {keyword} {content_id} (no matching content)"),
        RenderEvent::Malformed { keyword, raw } => {
            format!("malformed {keyword}: {}", truncate_desc(&one_line(raw), 60))
        }
        RenderEvent::Stripped { keyword, count } => {
            format!("stripped {}", plural(*count, &format!("{keyword} token"), &format!("{keyword} tokens")))
        }
        RenderEvent::RelatedSkipped { phase, error } => {
            format!("skipped related {phase}: {error}")
        }
    };
    vec![format!("{}{}", indent(1), line)]
}

// ============================================================================
// Related
// ============================================================================

/// Format related entries in display order.
pub fn format_related_output(entries: &[RelatedEntry]) -> Vec<String> {
    if entries.is_empty() {
        return vec!["No related content".to_string()];
    }
    let mut lines = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        let detail = match (entry.key, entry.kind) {
            (RelatedKey::DailyPhotos(day), _) => day.format("%Y-%m-%d").to_string(),
            (RelatedKey::Content(_), Some(kind)) => {
                format!("{kind}, {}", entry.timestamp.format("%Y-%m-%d"))
            }
            (RelatedKey::Content(_), None) => entry.timestamp.format("%Y-%m-%d").to_string(),
        };
        lines.push(format!("{} {} ({})", format_index(i + 1), entry.title, detail));
        lines.push(format!("{}\u{2192} {}", indent(1), entry.href));
    }
    lines
}

pub fn print_related_output(entries: &[RelatedEntry]) {
    for line in format_related_output(entries) {
        println!("{}", line);
    }
}

// ============================================================================
// Index
// ============================================================================

/// Format the result of an index rebuild.
pub fn format_index_output(stats: &IndexStats, version: &str, path: &Path) -> Vec<String> {
    vec![
        format!("Generation {version}"),
        format!("{}{}", indent(1), stats),
        format!("{}Saved: {}", indent(1), path.display()),
    ]
}

pub fn print_index_output(stats: &IndexStats, version: &str, path: &Path) {
    for line in format_index_output(stats, version, path) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

fn reason_label(reason: DanglingReason) -> &'static str {
    match reason {
        DanglingReason::UnknownKeyword => "unknown keyword",
        DanglingReason::MalformedId => "malformed id",
        DanglingReason::NotFound => "not found",
    }
}

/// Format the content inventory and every dangling reference found.
///
/// `problems` pairs each record with its dangling references; records
/// without problems may be omitted.
pub fn format_check_output(
    records: &[ContentRecord],
    problems: &[(&ContentRecord, Vec<DanglingReference>)],
) -> Vec<String> {
    let mut lines = vec!["Content".to_string()];
    let mut counts: BTreeMap<ContentKind, usize> = BTreeMap::new();
    for record in records {
        *counts.entry(record.kind).or_default() += 1;
    }
    for (kind, count) in &counts {
        lines.push(format!("{}{} {}", indent(1), count, kind));
    }

    let with_problems: Vec<_> = problems.iter().filter(|(_, d)| !d.is_empty()).collect();
    let total: usize = with_problems.iter().map(|(_, d)| d.len()).sum();

    if !with_problems.is_empty() {
        lines.push(String::new());
        lines.push("Dangling references".to_string());
        for (i, (record, dangling)) in with_problems.iter().enumerate() {
            lines.push(format!("{} {}", format_index(i + 1), record.title));
            lines.push(format!("{}Source: {}", indent(1), record.content_id));
            for d in dangling {
                lines.push(format!(
                    "{}{}: {}",
                    indent(1),
                    truncate_desc(&one_line(&d.raw), 80),
                    reason_label(d.reason)
                ));
            }
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Checked {}, {}",
        plural(records.len(), "record", "records"),
        plural(total, "dangling reference", "dangling references")
    ));
    lines
}

pub fn print_check_output(
    records: &[ContentRecord],
    problems: &[(&ContentRecord, Vec<DanglingReference>)],
) {
    for line in format_check_output(records, problems) {
        println!("{}", line);
    }
}
