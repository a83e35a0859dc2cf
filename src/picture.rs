//! Size selection for generated picture assets.
//!
//! Photos and images are published as a set of pre-generated widths. Site
//! figures list every width in a `srcset`; email and thumbnails need a
//! single file and pick one here.

use crate::types::{PictureAsset, PictureSize};

/// Widest size not wider than `max_width`, falling back to the narrowest
/// size when every size is too wide.
pub fn best_for_width(asset: &PictureAsset, max_width: u32) -> Option<&PictureSize> {
    asset
        .sizes
        .iter()
        .filter(|s| s.width <= max_width)
        .max_by_key(|s| s.width)
        .or_else(|| smallest(asset))
}

pub fn smallest(asset: &PictureAsset) -> Option<&PictureSize> {
    asset.sizes.iter().min_by_key(|s| s.width)
}

pub fn largest(asset: &PictureAsset) -> Option<&PictureSize> {
    asset.sizes.iter().max_by_key(|s| s.width)
}

/// Build a `srcset` attribute value, narrowest first.
///
/// `url_for` maps a size's file name to its URL.
pub fn srcset(asset: &PictureAsset, url_for: impl Fn(&str) -> String) -> String {
    let mut sizes: Vec<&PictureSize> = asset.sizes.iter().collect();
    sizes.sort_by_key(|s| s.width);
    sizes
        .iter()
        .map(|s| format!("{} {}w", url_for(&s.file_name), s.width))
        .collect::<Vec<_>>()
        .join(", ")
}
