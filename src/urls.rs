//! URL building for rendered links and pictures.
//!
//! Resolvers never format URLs themselves; they ask a [`UrlBuilder`] passed
//! in through the render context. [`SiteUrls`] is the config-driven
//! implementation used by the CLI:
//!
//! ```text
//! {site_url}/{KindFolder}/{folder}/{slug}/{slug}.html     content page
//! {site_url}/{KindFolder}/{folder}/{slug}/{file}          picture size
//! file://{media_root}/{KindFolder}/{folder}/{slug}/{file} local preview
//! {site_url}/Photos/Galleries/Daily/DailyPhotos-2024-03-02.html
//! {site_url}/Tags/{tag-slug}.html
//! ```
//!
//! The `{folder}` segment is omitted when a record has no folder. Link
//! records point at their external URL instead of a page.

use crate::config::{FoldersConfig, SiteConfig};
use crate::details::sanitize_slug;
use crate::types::{ContentKind, ContentRecord};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Site-wide pages reachable through GUID-less bracket codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SitePage {
    Index,
    IndexRss,
    FileRss,
    ImageRss,
    LinkRss,
    NoteRss,
    PhotoRss,
    PhotoGallery,
    Search,
    Tags,
    LinkList,
}

/// Builds every URL the renderers emit.
pub trait UrlBuilder: Send + Sync {
    /// Public page for a record.
    fn page_url(&self, record: &ContentRecord) -> String;

    /// Published URL of one generated picture file belonging to `record`.
    fn picture_url(&self, record: &ContentRecord, file_name: &str) -> String;

    /// Local `file://` URL of a picture file, for editor previews.
    fn local_picture_url(&self, record: &ContentRecord, file_name: &str) -> String;

    /// Direct download URL for a file record, when it allows public download.
    fn file_download_url(&self, record: &ContentRecord) -> Option<String>;

    fn site_page_url(&self, page: SitePage) -> String;

    fn daily_photos_url(&self, day: NaiveDate) -> String;

    fn tag_url(&self, tag: &str) -> String;
}

/// Lowercase slug used in tag page file names.
pub fn tag_slug(tag: &str) -> String {
    sanitize_slug(&tag.to_lowercase())
}

/// [`UrlBuilder`] driven by `config.toml`.
#[derive(Debug, Clone)]
pub struct SiteUrls {
    site_url: String,
    folders: FoldersConfig,
    media_root: PathBuf,
}

impl SiteUrls {
    /// `root` is the site directory `local_media_root` is resolved against.
    pub fn new(config: &SiteConfig, root: &Path) -> Self {
        Self {
            site_url: config.site_url.trim_end_matches('/').to_string(),
            folders: config.folders.clone(),
            media_root: root.join(&config.paths.local_media_root),
        }
    }

    fn folder(&self, kind: ContentKind) -> &str {
        self.folders.folder(kind)
    }

    /// `{KindFolder}/{folder}/{slug}`, without leading slash.
    fn content_dir(&self, record: &ContentRecord) -> String {
        let folder = record.folder.trim_matches('/');
        if folder.is_empty() {
            format!("{}/{}", self.folder(record.kind), record.slug)
        } else {
            format!("{}/{}/{}", self.folder(record.kind), folder, record.slug)
        }
    }
}

impl UrlBuilder for SiteUrls {
    fn page_url(&self, record: &ContentRecord) -> String {
        if record.kind == ContentKind::Link
            && let Some(url) = record.url.as_deref().filter(|u| !u.trim().is_empty())
        {
            return url.trim().to_string();
        }
        format!(
            "{}/{}/{}.html",
            self.site_url,
            self.content_dir(record),
            record.slug
        )
    }

    fn picture_url(&self, record: &ContentRecord, file_name: &str) -> String {
        format!("{}/{}/{}", self.site_url, self.content_dir(record), file_name)
    }

    fn local_picture_url(&self, record: &ContentRecord, file_name: &str) -> String {
        let path = self.media_root.join(self.content_dir(record)).join(file_name);
        let path = path.to_string_lossy().replace('\\', "/");
        if path.starts_with('/') {
            format!("file://{path}")
        } else {
            format!("file:///{path}")
        }
    }

    fn file_download_url(&self, record: &ContentRecord) -> Option<String> {
        let file = record.file.as_ref().filter(|f| f.public_download)?;
        Some(format!(
            "{}/{}/{}",
            self.site_url,
            self.content_dir(record),
            file.original_file
        ))
    }

    fn site_page_url(&self, page: SitePage) -> String {
        let path = match page {
            SitePage::Index => "index.html".to_string(),
            SitePage::IndexRss => "RssIndexFeed.xml".to_string(),
            SitePage::FileRss => format!("{}/FileRss.xml", self.folder(ContentKind::File)),
            SitePage::ImageRss => format!("{}/ImageRss.xml", self.folder(ContentKind::Image)),
            SitePage::LinkRss => format!("{}/LinkRss.xml", self.folder(ContentKind::Link)),
            SitePage::NoteRss => format!("{}/NoteRss.xml", self.folder(ContentKind::Note)),
            SitePage::PhotoRss => format!("{}/PhotoRss.xml", self.folder(ContentKind::Photo)),
            SitePage::PhotoGallery => {
                format!("{}/Galleries/AllPhotos.html", self.folder(ContentKind::Photo))
            }
            SitePage::Search => "AllContentList.html".to_string(),
            SitePage::Tags => "Tags/AllTagsList.html".to_string(),
            SitePage::LinkList => format!("{}/LinkList.html", self.folder(ContentKind::Link)),
        };
        format!("{}/{}", self.site_url, path)
    }

    fn daily_photos_url(&self, day: NaiveDate) -> String {
        format!(
            "{}/{}/Galleries/Daily/DailyPhotos-{}.html",
            self.site_url,
            self.folder(ContentKind::Photo),
            day.format("%Y-%m-%d")
        )
    }

    fn tag_url(&self, tag: &str) -> String {
        format!("{}/Tags/{}.html", self.site_url, tag_slug(tag))
    }
}
