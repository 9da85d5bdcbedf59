//! Slide property dictionary and the quickhash fingerprint.
//!
//! Properties are free-form string key/value pairs. Vendor drivers add
//! their namespaced raw metadata (`optra.*`), the standard `tiff.*` tags
//! from the property directory, and a handful of well-known derived keys
//! viewers rely on.

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::FormatError;
use crate::io::RangeReader;
use crate::tiff::{LevelGeometry, TiffFile, TiffTag};

/// Objective magnification, an integer rendered as a string.
pub const PROPERTY_NAME_OBJECTIVE_POWER: &str = "objective-power";

/// Microns per pixel along X.
pub const PROPERTY_NAME_MPP_X: &str = "mpp-x";

/// Microns per pixel along Y.
pub const PROPERTY_NAME_MPP_Y: &str = "mpp-y";

/// Content fingerprint of the slide, when cheap enough to compute.
pub const PROPERTY_NAME_QUICKHASH1: &str = "quickhash-1";

/// Skip the quickhash when the hashed level's tile data exceeds this.
pub const QUICKHASH_SIZE_LIMIT: u64 = 5 * 1024 * 1024;

/// Ordered string key/value properties of an open slide.
#[derive(Debug, Clone, Default)]
pub struct PropertyDict {
    entries: std::collections::BTreeMap<String, String>,
}

impl PropertyDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a property; later inserts for the same key overwrite.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Derive an integer-valued standard property from a raw vendor one.
    ///
    /// The source value must parse as a whole integer; partial or failed
    /// parses leave the dictionary untouched.
    pub fn duplicate_int_prop(&mut self, src: &str, dst: &str) {
        if let Some(value) = self.entries.get(src) {
            if let Ok(parsed) = value.trim().parse::<i64>() {
                self.entries.insert(dst.to_string(), parsed.to_string());
            }
        }
    }

    /// Derive a float-valued standard property from a raw vendor one.
    ///
    /// Same parsing discipline as [`duplicate_int_prop`](Self::duplicate_int_prop).
    pub fn duplicate_double_prop(&mut self, src: &str, dst: &str) {
        if let Some(value) = self.entries.get(src) {
            if let Ok(parsed) = value.trim().parse::<f64>() {
                if parsed.is_finite() {
                    self.entries.insert(dst.to_string(), parsed.to_string());
                }
            }
        }
    }
}

/// Standard TIFF string tags exported as `tiff.<Name>` properties.
const TIFF_STRING_PROPS: [(TiffTag, &str); 5] = [
    (TiffTag::ImageDescription, "tiff.ImageDescription"),
    (TiffTag::Make, "tiff.Make"),
    (TiffTag::Model, "tiff.Model"),
    (TiffTag::Software, "tiff.Software"),
    (TiffTag::DateTime, "tiff.DateTime"),
];

/// Populate the standard `tiff.*` properties from `property_dir` and the
/// quickhash from the smallest level's raw tile data.
///
/// The hash covers the stored (compressed) tile bytes in tile order. When
/// they exceed [`QUICKHASH_SIZE_LIMIT`] the hash is skipped and the
/// property stays absent.
pub async fn init_properties_and_hash<R: RangeReader + ?Sized>(
    props: &mut PropertyDict,
    tiff: &TiffFile,
    reader: &R,
    hash_geometry: &LevelGeometry,
    property_dir: usize,
) -> Result<(), FormatError> {
    for (tag, name) in TIFF_STRING_PROPS {
        if let Some(value) = tiff.get_string(reader, property_dir, tag).await? {
            if !value.is_empty() {
                props.insert(name, value);
            }
        }
    }

    let tile_count = hash_geometry.tiles_across as usize * hash_geometry.tiles_down as usize;

    let mut total: u64 = 0;
    for index in 0..tile_count {
        let (_, len) = hash_geometry.tile_location(index);
        total += len as u64;
    }
    if total > QUICKHASH_SIZE_LIMIT {
        debug!(
            directory = hash_geometry.directory,
            bytes = total,
            "smallest level too large to fingerprint, skipping quickhash"
        );
        return Ok(());
    }

    let mut hasher = Sha256::new();
    for index in 0..tile_count {
        let (offset, len) = hash_geometry.tile_location(index);
        if len == 0 {
            continue;
        }
        let data = reader.read_exact_at(offset, len).await.map_err(FormatError::Io)?;
        hasher.update(&data);
    }

    props.insert(PROPERTY_NAME_QUICKHASH1, hex::encode(hasher.finalize()));
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
