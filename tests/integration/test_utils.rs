//! Test utilities for integration tests.
//!
//! This module builds synthetic OptraScan containers on disk: little-endian
//! classic TIFF files with a tiled full-resolution directory carrying the
//! ScanInfo packet, reduced pyramid directories and associated images. Tile
//! data is uncompressed RGBA by default so decoded pixels can be checked
//! exactly; JPEG-tiled directories are available for the lossy path.

use std::path::PathBuf;

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

/// Tile edge used by every fixture directory.
pub const TILE: u32 = 64;

pub const BASE_FILL: [u8; 4] = [200, 60, 60, 255];
pub const MID_FILL: [u8; 4] = [60, 200, 60, 255];
pub const SMALL_FILL: [u8; 4] = [60, 60, 200, 255];
pub const LABEL_FILL: [u8; 4] = [230, 230, 40, 255];

const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_UNDEFINED: u16 = 7;

const COMPRESSION_NONE: u16 = 1;
const COMPRESSION_JPEG: u16 = 7;

// =============================================================================
// Directory Specs
// =============================================================================

/// One directory of a synthetic container.
#[derive(Clone)]
pub struct DirSpec {
    pub width: u32,
    pub height: u32,
    pub tiled: bool,
    pub compression: u16,
    pub subfile_type: Option<u32>,
    pub description: Option<String>,
    pub software: Option<String>,
    pub xml_packet: Option<Vec<u8>>,
    pub fill: [u8; 4],
    pub jpeg_tile: Option<Vec<u8>>,
    pub claimed_tile_bytes: Option<u32>,
}

impl DirSpec {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tiled: true,
            compression: COMPRESSION_NONE,
            subfile_type: None,
            description: None,
            software: None,
            xml_packet: None,
            fill: [128, 128, 128, 255],
            jpeg_tile: None,
            claimed_tile_bytes: None,
        }
    }

    /// Directory 0: the full-resolution image, no SubfileType.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(width, height)
    }

    /// A reduced-resolution pyramid directory.
    pub fn reduced(width: u32, height: u32) -> Self {
        let mut spec = Self::new(width, height);
        spec.subfile_type = Some(1);
        spec
    }

    /// An associated image: SubfileType present with the reduced bit clear,
    /// named by its ImageDescription.
    pub fn associated(width: u32, height: u32, name: &str) -> Self {
        let mut spec = Self::new(width, height);
        spec.subfile_type = Some(0);
        spec.description = Some(name.to_string());
        spec
    }

    pub fn with_xml(mut self, packet: Vec<u8>) -> Self {
        self.xml_packet = Some(packet);
        self
    }

    pub fn with_fill(mut self, fill: [u8; 4]) -> Self {
        self.fill = fill;
        self
    }

    pub fn with_software(mut self, software: &str) -> Self {
        self.software = Some(software.to_string());
        self
    }

    pub fn with_compression(mut self, compression: u16) -> Self {
        self.compression = compression;
        self
    }

    /// Strip-organized instead of tiled; such directories are skipped.
    pub fn untiled(mut self) -> Self {
        self.tiled = false;
        self
    }

    /// Drop the ImageDescription from an associated directory.
    pub fn without_description(mut self) -> Self {
        self.description = None;
        self
    }

    /// Store one JPEG blob as every tile's data.
    pub fn with_jpeg_tiles(mut self, jpeg: Vec<u8>) -> Self {
        self.jpeg_tile = Some(jpeg);
        self.compression = COMPRESSION_JPEG;
        self
    }

    /// Lie about the per-tile byte count without storing that much data.
    /// Only safe for directories whose tiles are never actually read.
    pub fn with_claimed_tile_bytes(mut self, bytes: u32) -> Self {
        self.claimed_tile_bytes = Some(bytes);
        self
    }

    fn tile_count(&self) -> u32 {
        self.width.div_ceil(TILE) * self.height.div_ceil(TILE)
    }

    /// The single tile data block all tile offsets point at.
    fn tile_block(&self) -> Vec<u8> {
        if let Some(jpeg) = &self.jpeg_tile {
            return jpeg.clone();
        }
        let mut block = Vec::with_capacity((TILE * TILE * 4) as usize);
        for _ in 0..TILE * TILE {
            block.extend_from_slice(&self.fill);
        }
        block
    }
}

// =============================================================================
// TIFF Serialization
// =============================================================================

enum Val {
    Long(u32),
    Short(u16),
    Blob(u16, Vec<u8>),
    TileOffsets(u32),
    TileByteCounts(u32, u32),
}

fn emit_dir(spec: &DirSpec, base: u32, next_ifd: u32) -> Vec<u8> {
    let mut entries: Vec<(u16, Val)> = Vec::new();

    if let Some(subfile) = spec.subfile_type {
        entries.push((254, Val::Long(subfile)));
    }
    entries.push((256, Val::Long(spec.width)));
    entries.push((257, Val::Long(spec.height)));
    entries.push((259, Val::Short(spec.compression)));
    if let Some(desc) = &spec.description {
        let mut bytes = desc.as_bytes().to_vec();
        bytes.push(0);
        entries.push((270, Val::Blob(TYPE_ASCII, bytes)));
    }
    if let Some(software) = &spec.software {
        let mut bytes = software.as_bytes().to_vec();
        bytes.push(0);
        entries.push((305, Val::Blob(TYPE_ASCII, bytes)));
    }

    let block = if spec.tiled { spec.tile_block() } else { Vec::new() };
    let each = spec.claimed_tile_bytes.unwrap_or(block.len() as u32);

    if spec.tiled {
        let count = spec.tile_count();
        entries.push((322, Val::Long(TILE)));
        entries.push((323, Val::Long(TILE)));
        entries.push((324, Val::TileOffsets(count)));
        entries.push((325, Val::TileByteCounts(count, each)));
    }
    if let Some(packet) = &spec.xml_packet {
        entries.push((700, Val::Blob(TYPE_UNDEFINED, packet.clone())));
    }
    entries.sort_by_key(|(tag, _)| *tag);

    let ifd_size = 2 + entries.len() * 12 + 4;

    // Assign absolute offsets for out-of-line values, then place the tile
    // data block after all of them.
    let mut cursor = base + ifd_size as u32;
    let mut ext_offsets = Vec::with_capacity(entries.len());
    for (_, val) in &entries {
        ext_offsets.push(cursor);
        cursor += match val {
            Val::Blob(_, data) if data.len() > 4 => data.len() as u32,
            Val::TileOffsets(count) | Val::TileByteCounts(count, _) if *count > 1 => 4 * count,
            _ => 0,
        };
    }
    let tile_data_offset = cursor;

    let mut out = Vec::new();
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (i, (tag, val)) in entries.iter().enumerate() {
        out.extend_from_slice(&tag.to_le_bytes());
        match val {
            Val::Long(v) => {
                out.extend_from_slice(&TYPE_LONG.to_le_bytes());
                out.extend_from_slice(&1u32.to_le_bytes());
                out.extend_from_slice(&v.to_le_bytes());
            }
            Val::Short(v) => {
                out.extend_from_slice(&TYPE_SHORT.to_le_bytes());
                out.extend_from_slice(&1u32.to_le_bytes());
                out.extend_from_slice(&v.to_le_bytes());
                out.extend_from_slice(&[0, 0]);
            }
            Val::Blob(field_type, data) => {
                out.extend_from_slice(&field_type.to_le_bytes());
                out.extend_from_slice(&(data.len() as u32).to_le_bytes());
                if data.len() <= 4 {
                    let mut inline = [0u8; 4];
                    inline[..data.len()].copy_from_slice(data);
                    out.extend_from_slice(&inline);
                } else {
                    out.extend_from_slice(&ext_offsets[i].to_le_bytes());
                }
            }
            Val::TileOffsets(count) => {
                out.extend_from_slice(&TYPE_LONG.to_le_bytes());
                out.extend_from_slice(&count.to_le_bytes());
                if *count == 1 {
                    out.extend_from_slice(&tile_data_offset.to_le_bytes());
                } else {
                    out.extend_from_slice(&ext_offsets[i].to_le_bytes());
                }
            }
            Val::TileByteCounts(count, each) => {
                out.extend_from_slice(&TYPE_LONG.to_le_bytes());
                out.extend_from_slice(&count.to_le_bytes());
                if *count == 1 {
                    out.extend_from_slice(&each.to_le_bytes());
                } else {
                    out.extend_from_slice(&ext_offsets[i].to_le_bytes());
                }
            }
        }
    }
    out.extend_from_slice(&next_ifd.to_le_bytes());

    for (i, (_, val)) in entries.iter().enumerate() {
        match val {
            Val::Blob(_, data) if data.len() > 4 => {
                debug_assert_eq!(base + out.len() as u32, ext_offsets[i]);
            }
            Val::TileOffsets(count) | Val::TileByteCounts(count, _) if *count > 1 => {
                debug_assert_eq!(base + out.len() as u32, ext_offsets[i]);
            }
            _ => {}
        }
        match val {
            Val::Blob(_, data) if data.len() > 4 => out.extend_from_slice(data),
            Val::TileOffsets(count) if *count > 1 => {
                for _ in 0..*count {
                    out.extend_from_slice(&tile_data_offset.to_le_bytes());
                }
            }
            Val::TileByteCounts(count, each) if *count > 1 => {
                for _ in 0..*count {
                    out.extend_from_slice(&each.to_le_bytes());
                }
            }
            _ => {}
        }
    }
    out.extend_from_slice(&block);

    out
}

/// Serialize the directories into a little-endian classic TIFF.
pub fn build_tiff(specs: &[DirSpec]) -> Vec<u8> {
    assert!(!specs.is_empty());

    // Chunk lengths do not depend on placement, so size with dummy offsets
    // first, then emit with real ones.
    let mut bases = Vec::with_capacity(specs.len());
    let mut next = 8u32;
    for spec in specs {
        bases.push(next);
        next += emit_dir(spec, 0, 0).len() as u32;
    }

    let mut out = vec![b'I', b'I', 42, 0];
    out.extend_from_slice(&bases[0].to_le_bytes());
    for (i, spec) in specs.iter().enumerate() {
        let next_ifd = if i + 1 < specs.len() { bases[i + 1] } else { 0 };
        out.extend_from_slice(&emit_dir(spec, bases[i], next_ifd));
    }
    out
}

/// Write a fixture container to a unique temp path.
pub fn write_fixture(name: &str, specs: &[DirSpec]) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "optra-wsi-it-{}-{}.tif",
        std::process::id(),
        name
    ));
    std::fs::write(&path, build_tiff(specs)).unwrap();
    path
}

// =============================================================================
// Fixtures
// =============================================================================

/// The standard ScanInfo packet used by most fixtures.
pub fn scaninfo_packet() -> Vec<u8> {
    br#"<?xml version="1.0"?><ScanInfo Magnification="20" PixelResolution="0.25" ScannerModel="OS-15"/>"#
        .to_vec()
}

/// A well-formed three-level pyramid with a label image. Directory 2
/// (640x512) is over the thumbnail minimum on both sides.
pub fn pyramid_specs() -> Vec<DirSpec> {
    vec![
        DirSpec::full(1250, 950)
            .with_xml(scaninfo_packet())
            .with_software("OptraScan ImageViewer 2.1")
            .with_fill(BASE_FILL),
        DirSpec::associated(200, 150, "label").with_fill(LABEL_FILL),
        DirSpec::reduced(640, 512).with_fill(MID_FILL),
        DirSpec::reduced(320, 256).with_fill(SMALL_FILL),
    ]
}

/// Encode one solid-color RGB JPEG tile.
pub fn solid_jpeg_tile(rgb: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(TILE, TILE, Rgb(rgb));
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, 95);
    encoder.encode_image(&img).unwrap();
    buf
}
