//! Shared content types.
//!
//! Content records are owned by the persistence layer; everything in this
//! crate treats them as read-only inputs. A record carries the shared shape
//! every content kind has (identity, title, slug, the searchable text fields)
//! plus optional per-kind payloads used by the renderers.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The typed content entities a bracket code can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    File,
    GeoJson,
    Image,
    Line,
    Link,
    MapComponent,
    Note,
    Photo,
    Point,
    Post,
}

impl ContentKind {
    pub const ALL: [ContentKind; 10] = [
        ContentKind::File,
        ContentKind::GeoJson,
        ContentKind::Image,
        ContentKind::Line,
        ContentKind::Link,
        ContentKind::MapComponent,
        ContentKind::Note,
        ContentKind::Photo,
        ContentKind::Point,
        ContentKind::Post,
    ];

    /// Lowercase name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::File => "file",
            ContentKind::GeoJson => "geojson",
            ContentKind::Image => "image",
            ContentKind::Line => "line",
            ContentKind::Link => "link",
            ContentKind::MapComponent => "mapcomponent",
            ContentKind::Note => "note",
            ContentKind::Photo => "photo",
            ContentKind::Point => "point",
            ContentKind::Post => "post",
        }
    }

    /// Photos and images carry a [`PictureAsset`] and can be shown as thumbnails.
    pub fn is_picture(self) -> bool {
        matches!(self, ContentKind::Photo | ContentKind::Image)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single content item as the rendering core sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub content_id: Uuid,
    pub kind: ContentKind,
    pub title: String,
    pub slug: String,
    /// Site folder the item is published under (may be empty).
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub body_content: String,
    /// Only some kinds track update notes; `None` for the rest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub created_on: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_on: Option<NaiveDateTime>,
    /// Photo or image used as the thumbnail for non-picture content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_picture: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<PictureAsset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<PhotoDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileAsset>,
    /// Target address for link content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ContentRecord {
    /// Body, summary and update notes joined into one string.
    ///
    /// This is the text scanned for outgoing references, both live and when
    /// building the generation index.
    pub fn searchable_text(&self) -> String {
        let mut text = String::with_capacity(
            self.body_content.len()
                + self.summary.len()
                + self.update_notes.as_ref().map_or(0, String::len)
                + 2,
        );
        text.push_str(&self.body_content);
        text.push('\n');
        text.push_str(&self.summary);
        if let Some(notes) = &self.update_notes {
            text.push('\n');
            text.push_str(notes);
        }
        text
    }

    /// Last update, else creation: the recency key for related content.
    pub fn latest_timestamp(&self) -> NaiveDateTime {
        self.last_updated_on.unwrap_or(self.created_on)
    }

    /// Day a photo belongs to for daily galleries: the capture date when
    /// known, otherwise the creation date.
    pub fn photo_day(&self) -> NaiveDate {
        self.photo
            .as_ref()
            .and_then(|p| p.photo_created_on)
            .unwrap_or(self.created_on)
            .date()
    }
}

/// Responsive sizes generated for a photo or image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PictureAsset {
    pub original_file: String,
    #[serde(default)]
    pub sizes: Vec<PictureSize>,
}

/// One generated size; `file_name` is relative to the item's content directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PictureSize {
    pub width: u32,
    pub height: u32,
    pub file_name: String,
}

/// Camera and exposure details recorded for a photo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoDetails {
    pub photo_created_on: Option<NaiveDateTime>,
    pub alt_text: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens: Option<String>,
    pub aperture: Option<String>,
    pub shutter_speed: Option<String>,
    pub iso: Option<u32>,
    pub focal_length: Option<String>,
}

/// The downloadable file behind file content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAsset {
    pub original_file: String,
    #[serde(default)]
    pub public_download: bool,
}

/// Timestamp identifying one site generation run.
///
/// Reverse-index edges are only trusted when they were recorded under the
/// generation version the caller asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationVersion(pub NaiveDateTime);

impl GenerationVersion {
    /// Local wall-clock time, truncated to whole seconds so the version
    /// survives a round trip through its display form.
    pub fn now() -> Self {
        let now = chrono::Local::now().naive_local();
        GenerationVersion(now.with_nanosecond(0).unwrap_or(now))
    }
}

impl fmt::Display for GenerationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S"))
    }
}

impl FromStr for GenerationVersion {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDateTime::from_str(s.trim()).map(GenerationVersion)
    }
}

/// Output mode a body of text is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Published site HTML (maps, responsive figures).
    Site,
    /// Email-safe HTML: no scripts, no maps, inline styles.
    Email,
    /// Editor preview: like the site, but pictures load from local media.
    LocalDisplay,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Channel::Site => "site",
            Channel::Email => "email",
            Channel::LocalDisplay => "local display",
        })
    }
}
