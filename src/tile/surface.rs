//! Pixel surfaces for region painting.
//!
//! [`ImageSurface`] is the caller-visible destination buffer: a packed
//! RGBA8888 image the grid painter composites tiles into. [`TileView`] is a
//! zero-copy view over a decoded tile checkout.

use bytes::Bytes;

use crate::tiff::BYTES_PER_PIXEL;

/// A packed RGBA8888 image buffer with stride `width * 4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSurface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl ImageSurface {
    /// Allocate a zeroed surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * BYTES_PER_PIXEL],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The pixel buffer, row-major RGBA.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// One pixel's RGBA bytes. Panics when out of bounds; test helper and
    /// small-surface use only.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        assert!(x < self.width && y < self.height);
        let start = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        [
            self.data[start],
            self.data[start + 1],
            self.data[start + 2],
            self.data[start + 3],
        ]
    }

    /// Composite a tile into this surface with its top-left corner at
    /// `(dest_x, dest_y)`. Parts of the tile falling outside the surface
    /// are clipped away.
    pub fn draw(&mut self, tile: &TileView<'_>, dest_x: i64, dest_y: i64) {
        let surf_w = self.width as i64;
        let surf_h = self.height as i64;

        // Intersection of the tile rectangle with the surface
        let x_start = dest_x.max(0);
        let y_start = dest_y.max(0);
        let x_end = (dest_x + tile.width as i64).min(surf_w);
        let y_end = (dest_y + tile.height as i64).min(surf_h);
        if x_start >= x_end || y_start >= y_end {
            return;
        }

        let copy_w = (x_end - x_start) as usize * BYTES_PER_PIXEL;
        let tile_stride = tile.width as usize * BYTES_PER_PIXEL;
        let surf_stride = self.width as usize * BYTES_PER_PIXEL;

        for y in y_start..y_end {
            let tile_row = (y - dest_y) as usize;
            let tile_col = (x_start - dest_x) as usize;
            let src_start = tile_row * tile_stride + tile_col * BYTES_PER_PIXEL;

            let dst_start = y as usize * surf_stride + x_start as usize * BYTES_PER_PIXEL;

            self.data[dst_start..dst_start + copy_w]
                .copy_from_slice(&tile.data[src_start..src_start + copy_w]);
        }
    }
}

/// Zero-copy RGBA view over a decoded tile checkout.
pub struct TileView<'a> {
    data: &'a Bytes,
    width: u32,
    height: u32,
}

impl<'a> TileView<'a> {
    /// Wrap a decoded tile buffer.
    ///
    /// Returns `None` when the buffer length does not match the declared
    /// dimensions.
    pub fn new(data: &'a Bytes, width: u32, height: u32) -> Option<Self> {
        if data.len() != width as usize * height as usize * BYTES_PER_PIXEL {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
