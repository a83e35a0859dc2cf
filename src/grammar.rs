//! Bracket-code token grammar.
//!
//! Stored body text embeds references to other content as bracket codes:
//!
//! ```text
//! {{photolink 1c0e5d1a-8b9f-4a57-9d8e-7a1f0b3c2d4e; Morning Fog}}
//! {{pointlink 1c0e5d1a-8b9f-4a57-9d8e-7a1f0b3c2d4e; text the trailhead; Trailhead}}
//! {{tagspage;}}
//! {{searchpage; text search everything;}}
//! ```
//!
//! Three shapes exist:
//!
//! | Shape | Form | Target |
//! |---|---|---|
//! | Named display | `{{keyword GUID; text DISPLAY; ...}}` | content, with display override |
//! | Generic | `{{keyword GUID; ...}}` | content, display from the record |
//! | Special page | `{{keyword;}}` / `{{keyword; text DISPLAY;}}` | a site page, no GUID |
//!
//! Keywords are case-sensitive ASCII letters. The GUID slot accepts
//! `[0-9A-Za-z-]*`; a value that does not parse as a GUID still yields a
//! token (with a malformed target) so callers can decide what to do with it.
//! Nothing inside a token may contain `}`, and a token may span lines.
//!
//! ## Lexing
//!
//! [`tokenize`] is a single forward pass over the text producing tokens in
//! source order. A token either has a display clause or it does not, so a
//! named-display token can never be matched a second time as a generic one.
//! All scanning is linear; there are no nested quantifiers to backtrack on.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;
use uuid::Uuid;

/// Keywords whose tokens need the map library on the page.
pub const SPATIAL_KEYWORDS: &[&str] = &["point", "geojson", "line", "mapComponent"];

/// `text DISPLAY;` at the start of a token body. `[Tt]ext` as stored by the editor.
static DISPLAY_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[Tt]ext (?P<display>[^;]*);").expect("valid regex"));

/// Loose GUID extractor: any keyword, any whitespace, then the GUID slot.
static CONTENT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{[a-zA-Z]*\s(?P<id>[\dA-Za-z-]*);[^}]*\}\}").expect("valid regex")
});

/// What a token points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenTarget {
    /// A parsed content GUID.
    Content(Uuid),
    /// The GUID slot was present but did not parse (kept verbatim, may be empty).
    Malformed(String),
    /// No GUID slot: a special page token.
    Page,
}

/// A bracket code found in text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketToken {
    /// The exact matched substring, used for find/replace.
    pub raw: String,
    pub keyword: String,
    pub target: TokenTarget,
    /// Display override from a `text ...;` clause, trimmed; `None` when absent or blank.
    pub display_text: Option<String>,
    /// Byte range of `raw` within the scanned text.
    pub span: Range<usize>,
}

impl BracketToken {
    /// The content GUID, if the token targets content and the GUID parsed.
    pub fn content_id(&self) -> Option<Uuid> {
        match self.target {
            TokenTarget::Content(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_special_page(&self) -> bool {
        self.target == TokenTarget::Page
    }
}

/// A content token for one keyword: `(rawText, contentGuid, displayText)`.
///
/// `content_id` is [`Uuid::nil`] when the GUID slot did not parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTokenMatch {
    pub raw: String,
    pub content_id: Uuid,
    pub display_text: Option<String>,
}

/// A special page token for one keyword: `(rawText, displayText)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialPageMatch {
    pub raw: String,
    pub display_text: Option<String>,
}

/// Lex every bracket code in `text`, in source order.
pub fn tokenize(text: &str) -> Vec<BracketToken> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    while let Some(offset) = text[pos..].find("{{") {
        let start = pos + offset;
        match lex_token(text, start) {
            Some(token) => {
                pos = token.span.end;
                tokens.push(token);
            }
            // `{` is one byte, so start + 1 is a char boundary
            None => pos = start + 1,
        }
    }
    tokens
}

/// Try to lex a token starting at the `{{` at byte `start`.
fn lex_token(text: &str, start: usize) -> Option<BracketToken> {
    let rest = &text[start + 2..];
    let keyword_len = rest.bytes().take_while(u8::is_ascii_alphabetic).count();
    if keyword_len == 0 {
        return None;
    }
    let keyword = &rest[..keyword_len];
    let after_keyword = &rest[keyword_len..];

    let (target, body_and_close) = if let Some(after) = after_keyword.strip_prefix(';') {
        (TokenTarget::Page, after)
    } else if let Some(after_space) = after_keyword.strip_prefix(' ') {
        let id_len = after_space
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'-')
            .count();
        let id = &after_space[..id_len];
        let after = after_space[id_len..].strip_prefix(';')?;
        let target = match Uuid::parse_str(id) {
            Ok(uuid) => TokenTarget::Content(uuid),
            Err(_) => TokenTarget::Malformed(id.to_string()),
        };
        (target, after)
    } else {
        return None;
    };

    let body_len = body_and_close.find('}')?;
    if !body_and_close[body_len..].starts_with("}}") {
        return None;
    }
    let body = &body_and_close[..body_len];
    let end = text.len() - body_and_close.len() + body_len + 2;

    Some(BracketToken {
        raw: text[start..end].to_string(),
        keyword: keyword.to_string(),
        target,
        display_text: display_clause(body),
        span: start..end,
    })
}

/// Extract the display override from a token body.
///
/// The value is trimmed and one pair of surrounding double quotes is
/// removed, so `text "Custom";` and `text Custom;` display the same.
fn display_clause(body: &str) -> Option<String> {
    let caps = DISPLAY_CLAUSE.captures(body)?;
    let display = caps.name("display")?.as_str().trim();
    let display = display
        .strip_prefix('"')
        .and_then(|d| d.strip_suffix('"'))
        .unwrap_or(display)
        .trim();
    (!display.is_empty()).then(|| display.to_string())
}

/// Every GUID referenced by any bracket code in `text`, deduplicated in
/// first-seen order. Unparseable GUID slots are skipped.
pub fn extract_content_ids(text: &str) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = Vec::new();
    for caps in CONTENT_ID.captures_iter(text) {
        if let Some(id) = caps.name("id").and_then(|m| Uuid::parse_str(m.as_str()).ok())
            && !ids.contains(&id)
        {
            ids.push(id);
        }
    }
    ids
}

/// Content tokens for `keyword` (named-display and generic forms).
pub fn match_content_tokens(text: &str, keyword: &str) -> Vec<ContentTokenMatch> {
    tokenize(text)
        .into_iter()
        .filter(|t| t.keyword == keyword && !t.is_special_page())
        .map(|t| ContentTokenMatch {
            content_id: t.content_id().unwrap_or_else(Uuid::nil),
            raw: t.raw,
            display_text: t.display_text,
        })
        .collect()
}

/// Special page tokens (no GUID) for `keyword`.
pub fn match_special_page_tokens(text: &str, keyword: &str) -> Vec<SpecialPageMatch> {
    tokenize(text)
        .into_iter()
        .filter(|t| t.keyword == keyword && t.is_special_page())
        .map(|t| SpecialPageMatch {
            raw: t.raw,
            display_text: t.display_text,
        })
        .collect()
}

/// True if the text contains a point, geojson, line or map component token.
///
/// Pages without one skip the map library includes entirely.
pub fn has_spatial_tokens(text: &str) -> bool {
    tokenize(text)
        .iter()
        .any(|t| !t.is_special_page() && SPATIAL_KEYWORDS.contains(&t.keyword.as_str()))
}
