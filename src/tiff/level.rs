//! Per-directory tile geometry and tile decoding.
//!
//! [`LevelGeometry`] captures everything needed to read tiles out of one
//! tiled TIFF directory: image and tile dimensions, the tile offset and
//! byte-count arrays, the compression scheme and the directory's JPEG
//! tables. Both pyramid levels and associated images decode through it.

use bytes::Bytes;
use image::ImageFormat;

use crate::error::{FormatError, TileError};
use crate::io::RangeReader;

use super::file::TiffFile;
use super::jpeg::prepare_tile_jpeg;
use super::tags::{Compression, TiffTag};

/// Bytes per pixel in decoded output (RGBA8888).
pub const BYTES_PER_PIXEL: usize = 4;

/// Tile geometry and data locations for one tiled directory.
#[derive(Debug, Clone)]
pub struct LevelGeometry {
    /// Directory index in the container
    pub directory: usize,

    /// Full image width in pixels
    pub image_width: u32,

    /// Full image height in pixels
    pub image_height: u32,

    /// Tile width in pixels
    pub tile_width: u32,

    /// Tile height in pixels
    pub tile_height: u32,

    /// Number of tile columns
    pub tiles_across: u32,

    /// Number of tile rows
    pub tiles_down: u32,

    /// Compression scheme of the tile data
    pub compression: Compression,

    pub(crate) tile_offsets: Vec<u64>,
    pub(crate) tile_byte_counts: Vec<u64>,
    pub(crate) jpeg_tables: Option<Bytes>,
}

impl LevelGeometry {
    /// Build the geometry for a tiled directory.
    ///
    /// Fails when required fields are missing or the compression scheme
    /// cannot be decoded. The caller has already verified the directory is
    /// tiled.
    pub async fn init<R: RangeReader + ?Sized>(
        tiff: &TiffFile,
        reader: &R,
        directory: usize,
    ) -> Result<Self, FormatError> {
        let image_width = tiff
            .get_u32(reader, directory, TiffTag::ImageWidth)
            .await?
            .ok_or(FormatError::MissingField {
                directory,
                tag: "ImageWidth",
            })?;
        let image_height = tiff
            .get_u32(reader, directory, TiffTag::ImageLength)
            .await?
            .ok_or(FormatError::MissingField {
                directory,
                tag: "ImageLength",
            })?;
        let tile_width = tiff
            .get_u32(reader, directory, TiffTag::TileWidth)
            .await?
            .ok_or(FormatError::MissingField {
                directory,
                tag: "TileWidth",
            })?;
        let tile_height = tiff
            .get_u32(reader, directory, TiffTag::TileLength)
            .await?
            .ok_or(FormatError::MissingField {
                directory,
                tag: "TileLength",
            })?;

        if image_width == 0 || image_height == 0 || tile_width == 0 || tile_height == 0 {
            return Err(FormatError::BadDirectory(directory));
        }

        let compression_raw = tiff
            .get_u32(reader, directory, TiffTag::Compression)
            .await?
            .ok_or(FormatError::MissingField {
                directory,
                tag: "Compression",
            })?;
        let compression = Compression::from_u16(compression_raw as u16)
            .filter(|c| c.is_supported())
            .ok_or(FormatError::UnsupportedCompression {
                directory,
                compression: compression_raw as u16,
            })?;

        let tile_offsets = tiff
            .get_u64_array_required(reader, directory, TiffTag::TileOffsets, "TileOffsets")
            .await?;
        let tile_byte_counts = tiff
            .get_u64_array_required(reader, directory, TiffTag::TileByteCounts, "TileByteCounts")
            .await?;

        let tiles_across = image_width.div_ceil(tile_width);
        let tiles_down = image_height.div_ceil(tile_height);

        let expected = tiles_across as usize * tiles_down as usize;
        if tile_offsets.len() < expected || tile_byte_counts.len() < expected {
            return Err(FormatError::BadDirectory(directory));
        }

        let jpeg_tables = tiff
            .get_buffer(reader, directory, TiffTag::JpegTables)
            .await?;

        Ok(LevelGeometry {
            directory,
            image_width,
            image_height,
            tile_width,
            tile_height,
            tiles_across,
            tiles_down,
            compression,
            tile_offsets,
            tile_byte_counts,
            jpeg_tables,
        })
    }

    /// Size of one decoded tile buffer in bytes.
    #[inline]
    pub fn tile_size_bytes(&self) -> usize {
        self.tile_width as usize * self.tile_height as usize * BYTES_PER_PIXEL
    }

    /// Flat tile index for a (col, row) coordinate.
    pub fn tile_index(&self, col: u32, row: u32) -> Result<usize, TileError> {
        if col >= self.tiles_across || row >= self.tiles_down {
            return Err(TileError::TileOutOfRange {
                col,
                row,
                across: self.tiles_across,
                down: self.tiles_down,
            });
        }
        Ok(row as usize * self.tiles_across as usize + col as usize)
    }

    /// File location (offset, byte count) of a tile's compressed data.
    pub fn tile_location(&self, index: usize) -> (u64, usize) {
        (self.tile_offsets[index], self.tile_byte_counts[index] as usize)
    }

    /// Read one tile and decode it into `dest` as RGBA8888.
    ///
    /// `dest` must be `tile_size_bytes()` long.
    pub async fn read_tile<R: RangeReader + ?Sized>(
        &self,
        reader: &R,
        dest: &mut [u8],
        col: u32,
        row: u32,
    ) -> Result<(), TileError> {
        debug_assert_eq!(dest.len(), self.tile_size_bytes());

        let index = self.tile_index(col, row)?;
        let (offset, len) = self.tile_location(index);

        // Zero-length tiles occur in sparse files; leave the buffer blank.
        if len == 0 {
            dest.fill(0);
            return Ok(());
        }

        let raw = reader.read_exact_at(offset, len).await?;

        match self.compression {
            Compression::Jpeg => {
                let stream = prepare_tile_jpeg(self.jpeg_tables.as_deref(), &raw);
                let decoded = image::load_from_memory_with_format(&stream, ImageFormat::Jpeg)
                    .map_err(|e| TileError::Decode(e.to_string()))?
                    .to_rgba8();

                if decoded.width() != self.tile_width || decoded.height() != self.tile_height {
                    return Err(TileError::Decode(format!(
                        "tile ({col}, {row}) decoded to {}x{}, expected {}x{}",
                        decoded.width(),
                        decoded.height(),
                        self.tile_width,
                        self.tile_height
                    )));
                }

                dest.copy_from_slice(decoded.as_raw());
                Ok(())
            }
            Compression::None => {
                if raw.len() != dest.len() {
                    return Err(TileError::Decode(format!(
                        "uncompressed tile ({col}, {row}) has {} bytes, expected {}",
                        raw.len(),
                        dest.len()
                    )));
                }
                dest.copy_from_slice(&raw);
                Ok(())
            }
            other => Err(TileError::Decode(format!(
                "compression {} not decodable",
                other.name()
            ))),
        }
    }

    /// Zero out the pixels of an edge tile that fall outside the image.
    ///
    /// Tiles on the right and bottom edges extend past the image bounds;
    /// those pixels must not leak stale data into painted regions.
    pub fn clip_tile(&self, dest: &mut [u8], col: u32, row: u32) {
        let x0 = col as u64 * self.tile_width as u64;
        let y0 = row as u64 * self.tile_height as u64;

        let valid_w = (self.image_width as u64).saturating_sub(x0) as usize;
        let valid_h = (self.image_height as u64).saturating_sub(y0) as usize;

        let tw = self.tile_width as usize;
        let th = self.tile_height as usize;
        if valid_w >= tw && valid_h >= th {
            return;
        }

        let stride = tw * BYTES_PER_PIXEL;
        for ty in 0..th {
            let row_start = ty * stride;
            if ty >= valid_h {
                dest[row_start..row_start + stride].fill(0);
            } else if valid_w < tw {
                dest[row_start + valid_w * BYTES_PER_PIXEL..row_start + stride].fill(0);
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
