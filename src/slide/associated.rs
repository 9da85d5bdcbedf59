//! Named associated images (label, thumbnail, macro shots).
//!
//! Associated images are whole tiled directories decoded in one go rather
//! than painted region by region. The pyramid builder registers them by
//! name during open; decoding is deferred until a caller asks.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::error::{FormatError, TileError};
use crate::io::RangeReader;
use crate::tiff::{LevelGeometry, TiffFile};
use crate::tile::{ImageSurface, TileView};

/// One registered associated image.
#[derive(Debug, Clone)]
pub struct AssociatedImage {
    /// Directory the image lives in
    pub directory: usize,

    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,

    geometry: LevelGeometry,
}

impl AssociatedImage {
    /// Capture the geometry of a tiled directory as an associated image.
    pub async fn init<R: RangeReader + ?Sized>(
        tiff: &TiffFile,
        reader: &R,
        directory: usize,
    ) -> Result<Self, FormatError> {
        let geometry = LevelGeometry::init(tiff, reader, directory).await?;
        Ok(AssociatedImage {
            directory,
            width: geometry.image_width,
            height: geometry.image_height,
            geometry,
        })
    }

    /// Decode the full image into an RGBA surface.
    pub async fn read<R: RangeReader + ?Sized>(
        &self,
        reader: &R,
    ) -> Result<ImageSurface, TileError> {
        let geom = &self.geometry;
        let mut surface = ImageSurface::new(self.width, self.height);
        let mut tile_buf = vec![0u8; geom.tile_size_bytes()];

        for row in 0..geom.tiles_down {
            for col in 0..geom.tiles_across {
                geom.read_tile(reader, &mut tile_buf, col, row).await?;
                geom.clip_tile(&mut tile_buf, col, row);

                let data = Bytes::copy_from_slice(&tile_buf);
                let tile = TileView::new(&data, geom.tile_width, geom.tile_height)
                    .ok_or_else(|| TileError::Decode("tile buffer size mismatch".into()))?;
                surface.draw(
                    &tile,
                    col as i64 * geom.tile_width as i64,
                    row as i64 * geom.tile_height as i64,
                );
            }
        }

        Ok(surface)
    }
}

/// The slide's associated images, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct AssociatedImageStore {
    images: BTreeMap<String, AssociatedImage>,
}

impl AssociatedImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image under a name; a later registration under the same
    /// name replaces the earlier one.
    pub fn register(&mut self, name: impl Into<String>, image: AssociatedImage) {
        self.images.insert(name.into(), image);
    }

    pub fn get(&self, name: &str) -> Option<&AssociatedImage> {
        self.images.get(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.images.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
