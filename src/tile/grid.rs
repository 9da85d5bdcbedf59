//! Viewport-to-tile mapping and region painting.
//!
//! [`TileGrid`] maps a requested region in level pixel coordinates onto the
//! set of tiles that cover it, pulls each tile through a caller-supplied
//! read callback and composites them into the destination surface at the
//! right offsets.

use std::future::Future;

use bytes::Bytes;

use crate::error::TileError;
use crate::tile::surface::{ImageSurface, TileView};

/// The tile layout of one resolution level.
#[derive(Debug, Clone, Copy)]
pub struct TileGrid {
    pub tiles_across: u32,
    pub tiles_down: u32,
    pub tile_width: u32,
    pub tile_height: u32,
}

impl TileGrid {
    pub fn new(tiles_across: u32, tiles_down: u32, tile_width: u32, tile_height: u32) -> Self {
        Self {
            tiles_across,
            tiles_down,
            tile_width,
            tile_height,
        }
    }

    /// Paint the region starting at `(x, y)` in level pixel coordinates,
    /// `w` by `h` pixels, into `surface`.
    ///
    /// `read_tile` is called once per covering tile and returns the decoded
    /// RGBA buffer for `(col, row)`. Tiles outside the grid are skipped, so
    /// regions hanging past the level edge paint what exists and leave the
    /// rest transparent.
    pub async fn paint_region<F, Fut>(
        &self,
        surface: &mut ImageSurface,
        x: i64,
        y: i64,
        w: u32,
        h: u32,
        read_tile: F,
    ) -> Result<(), TileError>
    where
        F: Fn(u32, u32) -> Fut,
        Fut: Future<Output = Result<Bytes, TileError>>,
    {
        if w == 0 || h == 0 {
            return Ok(());
        }

        let tw = self.tile_width as i64;
        let th = self.tile_height as i64;

        // Covering tile range, clamped to the grid
        let col_start = (x.div_euclid(tw)).max(0);
        let row_start = (y.div_euclid(th)).max(0);
        let col_end = ((x + w as i64 - 1).div_euclid(tw)).min(self.tiles_across as i64 - 1);
        let row_end = ((y + h as i64 - 1).div_euclid(th)).min(self.tiles_down as i64 - 1);

        for row in row_start..=row_end {
            for col in col_start..=col_end {
                let checkout = read_tile(col as u32, row as u32).await?;
                let tile = TileView::new(&checkout, self.tile_width, self.tile_height)
                    .ok_or_else(|| {
                        TileError::Decode(format!(
                            "tile ({col}, {row}) buffer is {} bytes, expected {}",
                            checkout.len(),
                            self.tile_width as usize * self.tile_height as usize * 4
                        ))
                    })?;

                surface.draw(&tile, col * tw - x, row * th - y);
                // checkout dropped here, releasing the cache entry
            }
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
