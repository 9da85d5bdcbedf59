//! The open-slide host object.
//!
//! [`Slide::open`] probes the registered format drivers against a file and
//! hands back a [`Slide`]: a property dictionary, an associated-image
//! store, and a boxed [`SlideOps`] implementation that paints regions from
//! the pyramid. All per-format behavior lives behind the trait; this module
//! only hosts it.

pub mod associated;
pub mod properties;

pub use associated::{AssociatedImage, AssociatedImageStore};
pub use properties::{
    PropertyDict, PROPERTY_NAME_MPP_X, PROPERTY_NAME_MPP_Y, PROPERTY_NAME_OBJECTIVE_POWER,
    PROPERTY_NAME_QUICKHASH1,
};

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{FormatError, TileError};
use crate::format::registered_drivers;
use crate::io::HandlePool;
use crate::tiff::TiffFile;
use crate::tile::ImageSurface;

/// Per-format pyramid operations.
///
/// One implementation per vendor driver; a `Slide` dispatches through a
/// boxed instance. Dropping the implementation releases the pyramid, its
/// cache and its handle pool in one ownership pass.
#[async_trait]
pub trait SlideOps: Send + Sync {
    /// Number of resolution levels, highest resolution first.
    fn level_count(&self) -> usize;

    /// Pixel dimensions of a level, or `None` if out of range.
    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)>;

    /// Downsample factor of a level relative to level 0.
    fn level_downsample(&self, level: usize) -> Option<f64>;

    /// The best level to read for a requested downsample: the lowest
    /// resolution whose downsample does not exceed the request.
    fn best_level_for_downsample(&self, downsample: f64) -> usize {
        let mut best = 0;
        for level in 0..self.level_count() {
            if let Some(ds) = self.level_downsample(level) {
                // Slack absorbs float error in stored level ratios
                if ds <= downsample * 1.01 {
                    best = level;
                }
            }
        }
        best
    }

    /// Paint a region into `surface`.
    ///
    /// `(x, y)` is the region origin in level-0 coordinates; `w` and `h`
    /// are the surface dimensions in level pixels.
    async fn paint_region(
        &self,
        surface: &mut ImageSurface,
        x: i64,
        y: i64,
        level: usize,
        w: u32,
        h: u32,
    ) -> Result<(), TileError>;
}

/// A format driver's fully built slide state, handed back from `open`.
pub struct OpenedSlide {
    pub ops: Box<dyn SlideOps>,
    pub properties: PropertyDict,
    pub associated: AssociatedImageStore,
}

/// An open whole-slide image.
pub struct Slide {
    properties: PropertyDict,
    associated: AssociatedImageStore,
    ops: Box<dyn SlideOps>,
    pool: HandlePool,
}

impl std::fmt::Debug for Slide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slide")
            .field("dimensions", &self.dimensions())
            .field("level_count", &self.level_count())
            .field("associated_images", &self.associated_image_names())
            .field("property_count", &self.properties.len())
            .finish()
    }
}

impl Slide {
    /// Open a slide file, probing the registered drivers in order.
    ///
    /// The first driver whose `detect` accepts the file gets to open it; a
    /// detect refusal moves on to the next driver, but once a driver has
    /// claimed the file any open failure is final.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, FormatError> {
        let path = path.as_ref();
        let pool = HandlePool::new(path);
        let handle = pool.checkout().await.map_err(FormatError::Io)?;

        // Non-TIFF files are still offered to detect so drivers can refuse
        // them with a precise error.
        let tiff = TiffFile::parse(&*handle).await.ok();
        let filename = path.display().to_string();

        for driver in registered_drivers() {
            match driver.detect(&filename, tiff.as_ref(), &*handle).await {
                Ok(()) => {
                    let tiff = tiff.as_ref().ok_or(FormatError::NotTiff)?;
                    let opened = driver.open(&filename, tiff, &*handle, pool.clone()).await?;
                    if opened.ops.level_count() == 0 {
                        return Err(FormatError::NoLevels);
                    }
                    debug!(driver = driver.name(), path = %filename, "opened slide");
                    return Ok(Slide {
                        properties: opened.properties,
                        associated: opened.associated,
                        ops: opened.ops,
                        pool,
                    });
                }
                Err(e) => {
                    debug!(driver = driver.name(), path = %filename, error = %e,
                        "driver did not claim file");
                }
            }
        }

        Err(FormatError::UnrecognizedFormat)
    }

    /// Pixel dimensions of the full-resolution level.
    pub fn dimensions(&self) -> (u32, u32) {
        // Open rejects empty pyramids, so level 0 always exists.
        self.ops.level_dimensions(0).unwrap_or((0, 0))
    }

    pub fn level_count(&self) -> usize {
        self.ops.level_count()
    }

    pub fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        self.ops.level_dimensions(level)
    }

    pub fn level_downsample(&self, level: usize) -> Option<f64> {
        self.ops.level_downsample(level)
    }

    pub fn best_level_for_downsample(&self, downsample: f64) -> usize {
        self.ops.best_level_for_downsample(downsample)
    }

    /// The slide's property dictionary.
    pub fn properties(&self) -> &PropertyDict {
        &self.properties
    }

    /// Look up one property value.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key)
    }

    /// Names of the registered associated images, sorted.
    pub fn associated_image_names(&self) -> Vec<&str> {
        self.associated.names()
    }

    /// Dimensions of an associated image, if registered.
    pub fn associated_image_dimensions(&self, name: &str) -> Option<(u32, u32)> {
        self.associated.get(name).map(|img| (img.width, img.height))
    }

    /// Decode an associated image in full.
    ///
    /// Returns `Ok(None)` for names that are not registered.
    pub async fn read_associated_image(
        &self,
        name: &str,
    ) -> Result<Option<ImageSurface>, TileError> {
        let Some(image) = self.associated.get(name) else {
            return Ok(None);
        };
        let handle = self.pool.checkout().await?;
        Ok(Some(image.read(&*handle).await?))
    }

    /// Read a region into a freshly allocated surface.
    ///
    /// `(x, y)` is in level-0 coordinates; the surface is `w` by `h` level
    /// pixels.
    pub async fn read_region(
        &self,
        x: i64,
        y: i64,
        level: usize,
        w: u32,
        h: u32,
    ) -> Result<ImageSurface, TileError> {
        let mut surface = ImageSurface::new(w, h);
        self.ops.paint_region(&mut surface, x, y, level, w, h).await?;
        Ok(surface)
    }
}

// =============================================================================
// Tests
// =============================================================================
