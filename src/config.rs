//! Site configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. The file lives in
//! the site root next to the content directory; stock defaults are the base
//! layer and the user file is merged on top, so a config only needs the keys
//! it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! site_url = "https://example.com"   # Absolute prefix for every generated link
//! site_name = "Waymarks"
//!
//! [paths]
//! content_dir = "content"            # Directory of JSON content records
//! local_media_root = "media"         # Where local previews load pictures from
//! index_file = ".waymark-related.json"
//!
//! [folders]                          # Top-level site folder per content kind
//! photo = "Photos"
//! point = "Points"
//! # ...one entry per kind
//!
//! [related]
//! label = "Related:"
//! include_daily_photos = true
//! # max_items = 12                  # Omit for no limit
//!
//! [email]
//! max_image_width = 900              # Widest picture size used in email
//!
//! [processing]
//! # max_processes = 4                # Index-building threads (omit for auto)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::types::ContentKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute URL prefix for generated links, without a trailing slash.
    pub site_url: String,
    pub site_name: String,
    pub paths: PathsConfig,
    pub folders: FoldersConfig,
    pub related: RelatedConfig,
    pub email: EmailConfig,
    pub processing: ProcessingConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_url: "https://example.com".to_string(),
            site_name: "Waymarks".to_string(),
            paths: PathsConfig::default(),
            folders: FoldersConfig::default(),
            related: RelatedConfig::default(),
            email: EmailConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site_url.trim().is_empty() {
            return Err(ConfigError::Validation("site_url must not be empty".into()));
        }
        if self.site_url.ends_with('/') {
            return Err(ConfigError::Validation(
                "site_url must not end with '/'".into(),
            ));
        }
        if let Some(kind) = ContentKind::ALL
            .into_iter()
            .find(|k| self.folders.folder(*k).trim().is_empty())
        {
            return Err(ConfigError::Validation(format!(
                "folders.{kind} must not be empty"
            )));
        }
        if self.related.label.trim().is_empty() {
            return Err(ConfigError::Validation(
                "related.label must not be empty".into(),
            ));
        }
        if self.related.max_items == Some(0) {
            return Err(ConfigError::Validation(
                "related.max_items must be at least 1 (omit it for no limit)".into(),
            ));
        }
        if self.email.max_image_width == 0 {
            return Err(ConfigError::Validation(
                "email.max_image_width must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Content directory resolved against the site root.
    pub fn content_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.paths.content_dir)
    }

    /// Reverse-index file resolved against the site root.
    pub fn index_path(&self, root: &Path) -> PathBuf {
        root.join(&self.paths.index_file)
    }
}

/// Filesystem locations, relative to the site root unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub content_dir: String,
    pub local_media_root: String,
    pub index_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            content_dir: "content".to_string(),
            local_media_root: "media".to_string(),
            index_file: ".waymark-related.json".to_string(),
        }
    }
}

/// Top-level site folder for each content kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FoldersConfig {
    pub file: String,
    pub geojson: String,
    pub image: String,
    pub line: String,
    pub link: String,
    pub mapcomponent: String,
    pub note: String,
    pub photo: String,
    pub point: String,
    pub post: String,
}

impl FoldersConfig {
    pub fn folder(&self, kind: ContentKind) -> &str {
        match kind {
            ContentKind::File => &self.file,
            ContentKind::GeoJson => &self.geojson,
            ContentKind::Image => &self.image,
            ContentKind::Line => &self.line,
            ContentKind::Link => &self.link,
            ContentKind::MapComponent => &self.mapcomponent,
            ContentKind::Note => &self.note,
            ContentKind::Photo => &self.photo,
            ContentKind::Point => &self.point,
            ContentKind::Post => &self.post,
        }
    }
}

impl Default for FoldersConfig {
    fn default() -> Self {
        Self {
            file: "Files".to_string(),
            geojson: "GeoJson".to_string(),
            image: "Images".to_string(),
            line: "Lines".to_string(),
            link: "Links".to_string(),
            mapcomponent: "Maps".to_string(),
            note: "Notes".to_string(),
            photo: "Photos".to_string(),
            point: "Points".to_string(),
            post: "Posts".to_string(),
        }
    }
}

/// Related-content sidebar settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelatedConfig {
    /// Heading shown above the related entries.
    pub label: String,
    /// Cap on rendered entries; absent means no limit.
    pub max_items: Option<usize>,
    /// Add a daily photo gallery entry for each photo day involved.
    pub include_daily_photos: bool,
}

impl Default for RelatedConfig {
    fn default() -> Self {
        Self {
            label: "Related:".to_string(),
            max_items: None,
            include_daily_photos: true,
        }
    }
}

/// Email rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmailConfig {
    /// Widest generated picture size allowed in an email body.
    pub max_image_width: u32,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            max_image_width: 900,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of threads used to scan content when building the
    /// reverse index. When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the site root.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Waymark Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Absolute URL prefix for every generated link (no trailing slash).
site_url = "https://example.com"
site_name = "Waymarks"

# ---------------------------------------------------------------------------
# Paths (relative to the directory holding this file)
# ---------------------------------------------------------------------------
[paths]
# Directory of JSON content records.
content_dir = "content"

# Where editor previews load pictures from (LocalDisplay channel).
local_media_root = "media"

# Reverse index of content references, written by `waymark index`.
index_file = ".waymark-related.json"

# ---------------------------------------------------------------------------
# Site folders per content kind
# ---------------------------------------------------------------------------
[folders]
file = "Files"
geojson = "GeoJson"
image = "Images"
line = "Lines"
link = "Links"
mapcomponent = "Maps"
note = "Notes"
photo = "Photos"
point = "Points"
post = "Posts"

# ---------------------------------------------------------------------------
# Related content
# ---------------------------------------------------------------------------
[related]
label = "Related:"

# Add a daily photo gallery entry for each photo day involved.
include_daily_photos = true

# Cap on rendered entries. Omit for no limit.
# max_items = 12

# ---------------------------------------------------------------------------
# Email
# ---------------------------------------------------------------------------
[email]
# Widest generated picture size used in email bodies.
max_image_width = 900

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Threads used to scan content when building the reverse index.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = SiteConfig::default();
        assert_eq!(config.site_url, "https://example.com");
        assert_eq!(config.paths.content_dir, "content");
        assert_eq!(config.folders.folder(ContentKind::Photo), "Photos");
        assert_eq!(config.related.label, "Related:");
        assert_eq!(config.related.max_items, None);
        assert!(config.related.include_daily_photos);
        assert_eq!(config.email.max_image_width, 900);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
site_url = "https://waymarks.example"

[folders]
point = "Places"
"#;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.site_url, "https://waymarks.example");
        assert_eq!(config.folders.folder(ContentKind::Point), "Places");
        // Defaults preserved
        assert_eq!(config.folders.folder(ContentKind::Photo), "Photos");
        assert_eq!(config.email.max_image_width, 900);
    }

    #[test]
    fn paths_resolve_against_root() {
        let config = SiteConfig::default();
        let root = Path::new("/site");
        assert_eq!(config.content_dir(root), Path::new("/site/content"));
        assert_eq!(
            config.index_path(root),
            Path::new("/site/.waymark-related.json")
        );
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.site_url, "https://example.com");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"
site_name = "Trail Notes"

[related]
label = "See also:"
max_items = 5
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.site_name, "Trail Notes");
        assert_eq!(config.related.label, "See also:");
        assert_eq!(config.related.max_items, Some(5));
        assert!(config.related.include_daily_photos);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "this is not valid toml [[[").unwrap();
        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"site_url = "https://example.com/""#,
        )
        .unwrap();
        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // Processing
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let config = ProcessingConfig {
            max_processes: None,
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(100_000),
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    // =========================================================================
    // merge_toml
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[related]
label = "Related:"
include_daily_photos = true
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[related]
include_daily_photos = false
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let related = merged.get("related").unwrap();
        assert_eq!(related.get("label").unwrap().as_str(), Some("Related:"));
        assert_eq!(
            related.get("include_daily_photos").unwrap().as_bool(),
            Some(false)
        );
    }

    #[test]
    fn merge_toml_scalar_override() {
        let base = toml::Value::String("a".into());
        let overlay = toml::Value::String("b".into());
        assert_eq!(merge_toml(base, overlay).as_str(), Some("b"));
    }

    // =========================================================================
    // Unknown keys and validation
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<SiteConfig, _> = toml::from_str("[email]\nmax_width = 10\n");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<SiteConfig, _> = toml::from_str("[colors]\nlight = 1\n");
        assert!(result.is_err());
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(SiteConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_folder() {
        let mut config = SiteConfig::default();
        config.folders.note = " ".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("folders.note"));
    }

    #[test]
    fn validate_rejects_zero_max_items() {
        let mut config = SiteConfig::default();
        config.related.max_items = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_email_width() {
        let mut config = SiteConfig::default();
        config.email.max_image_width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn resolve_config_with_overlay() {
        let overlay: toml::Value = toml::from_str("[email]\nmax_image_width = 600\n").unwrap();
        let config = resolve_config(stock_defaults_value(), Some(overlay)).unwrap();
        assert_eq!(config.email.max_image_width, 600);
        assert_eq!(config.related.label, "Related:");
    }

    // =========================================================================
    // stock_config_toml
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: SiteConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = SiteConfig::default();
        assert_eq!(config.site_url, defaults.site_url);
        assert_eq!(config.paths.index_file, defaults.paths.index_file);
        for kind in ContentKind::ALL {
            assert_eq!(config.folders.folder(kind), defaults.folders.folder(kind));
        }
        assert_eq!(config.related.label, defaults.related.label);
        assert_eq!(config.email.max_image_width, defaults.email.max_image_width);
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        for section in ["paths", "folders", "related", "email", "processing"] {
            assert!(val.get(section).is_some(), "missing [{section}]");
        }
    }
}
