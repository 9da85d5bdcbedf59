//! The OptraScan vendor driver.
//!
//! OptraScan slides are tiled (Big)TIFF containers. Directory 0 is the
//! full-resolution image and carries an `XMLPacket` tag holding a
//! `ScanInfo` document whose root attributes are the scanner metadata.
//! Later directories are either reduced-resolution pyramid levels (marked
//! by the SubfileType reduced-image bit) or associated images named by
//! their ImageDescription. The largest reduced directory with both sides
//! over 500 pixels doubles as the `thumbnail` associated image; when
//! several qualify, the last in file order wins.

use async_trait::async_trait;
use bytes::Bytes;
use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use tracing::{debug, warn};

use crate::error::{FormatError, TileError, XmlError};
use crate::io::{FileRangeReader, HandlePool, RangeReader};
use crate::slide::{
    associated::{AssociatedImage, AssociatedImageStore},
    properties::{
        init_properties_and_hash, PropertyDict, PROPERTY_NAME_MPP_X, PROPERTY_NAME_MPP_Y,
        PROPERTY_NAME_OBJECTIVE_POWER,
    },
    OpenedSlide, SlideOps,
};
use crate::tiff::{LevelGeometry, TiffFile, TiffTag, FILETYPE_REDUCED_IMAGE};
use crate::tile::{ImageSurface, TileCache, TileGrid, TileKey};

/// Root element of the embedded metadata document.
const XML_ROOT_TAG: &str = "ScanInfo";

/// Reduced directories larger than this on both sides become thumbnail
/// candidates.
const MIN_THUMBNAIL_DIM: u32 = 500;

/// Prefix for raw metadata properties.
const VENDOR_PREFIX: &str = "optra";

// =============================================================================
// ScanInfo Metadata
// =============================================================================

/// Cheap pre-check: does the packet contain the root tag as a substring?
fn contains_root_marker(packet: &[u8]) -> bool {
    let marker = XML_ROOT_TAG.as_bytes();
    packet.windows(marker.len()).any(|w| w == marker)
}

/// Parse the ScanInfo document and collect its root attributes as
/// `optra.<name>` properties.
///
/// The whole document is drained so malformed trailing content fails even
/// when the root element looks fine. Empty attribute values are skipped;
/// duplicate attribute names keep the last value.
fn parse_scaninfo(packet: &[u8], props: &mut PropertyDict) -> Result<(), FormatError> {
    // XMP packets are frequently nul-padded
    let end = packet.iter().position(|&b| b == 0).unwrap_or(packet.len());
    let text = String::from_utf8_lossy(&packet[..end]);

    let mut reader = XmlReader::from_str(&text);
    reader.config_mut().trim_text(true);

    // Find the root element, skipping the declaration and any prolog
    let root = loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => break e.into_owned(),
            Ok(Event::Empty(e)) => break e.into_owned(),
            Ok(Event::Eof) => return Err(XmlError::MissingRoot.into()),
            Ok(_) => continue,
            Err(e) => return Err(XmlError::Parse(e.to_string()).into()),
        }
    };

    if root.local_name().as_ref() != XML_ROOT_TAG.as_bytes() {
        return Err(FormatError::UnexpectedXmlRoot {
            found: String::from_utf8_lossy(root.local_name().as_ref()).into_owned(),
        });
    }

    for attr in root.attributes() {
        let attr = attr.map_err(|e| XmlError::Parse(e.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::Parse(e.to_string()))?;
        if value.is_empty() {
            continue;
        }
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        props.insert(format!("{VENDOR_PREFIX}.{key}"), value.into_owned());
    }

    // Drain the rest of the document to validate it
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(_) => continue,
            Err(e) => return Err(XmlError::Parse(e.to_string()).into()),
        }
    }

    Ok(())
}

/// Derive the standard viewer properties from the raw scanner metadata.
fn derive_standard_properties(props: &mut PropertyDict) {
    props.duplicate_int_prop(
        &format!("{VENDOR_PREFIX}.Magnification"),
        PROPERTY_NAME_OBJECTIVE_POWER,
    );
    let resolution = format!("{VENDOR_PREFIX}.PixelResolution");
    props.duplicate_double_prop(&resolution, PROPERTY_NAME_MPP_X);
    props.duplicate_double_prop(&resolution, PROPERTY_NAME_MPP_Y);
}

// =============================================================================
// Driver
// =============================================================================

/// The OptraScan format driver.
pub struct OptraDriver;

#[async_trait]
impl super::FormatDriver for OptraDriver {
    fn name(&self) -> &'static str {
        "optrascan"
    }

    fn vendor(&self) -> &'static str {
        VENDOR_PREFIX
    }

    async fn detect(
        &self,
        _filename: &str,
        tiff: Option<&TiffFile>,
        reader: &dyn RangeReader,
    ) -> Result<(), FormatError> {
        let tiff = tiff.ok_or(FormatError::NotTiff)?;

        if !tiff.is_tiled(0)? {
            return Err(FormatError::NotTiled);
        }

        let packet = tiff
            .get_buffer(reader, 0, TiffTag::XmlPacket)
            .await?
            .ok_or(FormatError::MissingMetadata)?;

        if !contains_root_marker(&packet) {
            return Err(FormatError::MarkerNotFound {
                marker: XML_ROOT_TAG,
            });
        }

        // Full parse against a scratch dictionary keeps detect pure
        let mut scratch = PropertyDict::new();
        parse_scaninfo(&packet, &mut scratch)?;

        Ok(())
    }

    async fn open(
        &self,
        filename: &str,
        tiff: &TiffFile,
        reader: &dyn RangeReader,
        pool: HandlePool,
    ) -> Result<OpenedSlide, FormatError> {
        let mut props = PropertyDict::new();
        let packet = tiff
            .get_buffer(reader, 0, TiffTag::XmlPacket)
            .await?
            .ok_or(FormatError::MissingMetadata)?;
        parse_scaninfo(&packet, &mut props)?;

        let mut associated = AssociatedImageStore::new();
        let mut geometries: Vec<LevelGeometry> = Vec::new();

        // Directory 0 opens the candidacy; reduced directories with both
        // sides over the minimum take it over, last one in file order wins.
        let mut thumbnail_dir: usize = 0;

        for dir in 0..tiff.directory_count() {
            if !tiff.is_tiled(dir)? {
                debug!(directory = dir, "skipping non-tiled directory");
                continue;
            }

            if dir > 0 {
                let subfile = match tiff.get_u32(reader, dir, TiffTag::SubfileType).await? {
                    Some(subfile) => subfile,
                    None => {
                        debug!(directory = dir, "skipping directory without SubfileType");
                        continue;
                    }
                };

                if subfile & FILETYPE_REDUCED_IMAGE == 0 {
                    // Not part of the pyramid: an associated image named
                    // by its description
                    let name = tiff
                        .get_string(reader, dir, TiffTag::ImageDescription)
                        .await?
                        .ok_or(FormatError::MissingField {
                            directory: dir,
                            tag: "ImageDescription",
                        })?;
                    let image = AssociatedImage::init(tiff, reader, dir).await?;
                    debug!(directory = dir, name = %name, "registering associated image");
                    associated.register(name, image);
                    continue;
                }

                let width = tiff
                    .get_u32(reader, dir, TiffTag::ImageWidth)
                    .await?
                    .ok_or(FormatError::MissingField {
                        directory: dir,
                        tag: "ImageWidth",
                    })?;
                let height = tiff
                    .get_u32(reader, dir, TiffTag::ImageLength)
                    .await?
                    .ok_or(FormatError::MissingField {
                        directory: dir,
                        tag: "ImageLength",
                    })?;
                if width > MIN_THUMBNAIL_DIM && height > MIN_THUMBNAIL_DIM {
                    thumbnail_dir = dir;
                }
            }

            // Fails hard on missing fields or unsupported compression
            geometries.push(LevelGeometry::init(tiff, reader, dir).await?);
        }

        let thumbnail = AssociatedImage::init(tiff, reader, thumbnail_dir).await?;
        associated.register("thumbnail", thumbnail);

        // Widest first; directory order breaks width ties deterministically
        geometries.sort_by(|a, b| {
            b.image_width
                .cmp(&a.image_width)
                .then(a.directory.cmp(&b.directory))
        });

        if let Some(smallest) = geometries.last() {
            init_properties_and_hash(&mut props, tiff, reader, smallest, 0).await?;
        }
        derive_standard_properties(&mut props);

        let base_width = geometries.first().map(|g| g.image_width).unwrap_or(0);
        let levels: Vec<Level> = geometries
            .into_iter()
            .map(|geometry| {
                let downsample = base_width as f64 / geometry.image_width as f64;
                let grid = TileGrid::new(
                    geometry.tiles_across,
                    geometry.tiles_down,
                    geometry.tile_width,
                    geometry.tile_height,
                );
                Level {
                    geometry,
                    downsample,
                    grid,
                }
            })
            .collect();

        if levels.is_empty() {
            warn!(path = %filename, "container has no pyramid levels");
        }

        let ops = OptraSlide {
            pool,
            levels,
            cache: TileCache::new(),
        };

        Ok(OpenedSlide {
            ops: Box::new(ops),
            properties: props,
            associated,
        })
    }
}

// =============================================================================
// Pyramid Operations
// =============================================================================

struct Level {
    geometry: LevelGeometry,
    downsample: f64,
    grid: TileGrid,
}

/// The per-slide pyramid state behind [`SlideOps`].
///
/// Dropping it releases the levels, the decoded-tile cache and the handle
/// pool together.
struct OptraSlide {
    pool: HandlePool,
    levels: Vec<Level>,
    cache: TileCache,
}

impl OptraSlide {
    /// Fetch a decoded, edge-clipped tile, through the cache.
    async fn read_tile(
        &self,
        reader: &FileRangeReader,
        level_index: usize,
        col: u32,
        row: u32,
    ) -> Result<Bytes, TileError> {
        let key = TileKey::new(level_index, col, row);
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }

        let level = &self.levels[level_index];
        let mut buf = vec![0u8; level.geometry.tile_size_bytes()];
        level.geometry.read_tile(reader, &mut buf, col, row).await?;
        level.geometry.clip_tile(&mut buf, col, row);

        Ok(self.cache.put(key, Bytes::from(buf)).await)
    }
}

#[async_trait]
impl SlideOps for OptraSlide {
    fn level_count(&self) -> usize {
        self.levels.len()
    }

    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        self.levels
            .get(level)
            .map(|l| (l.geometry.image_width, l.geometry.image_height))
    }

    fn level_downsample(&self, level: usize) -> Option<f64> {
        self.levels.get(level).map(|l| l.downsample)
    }

    async fn paint_region(
        &self,
        surface: &mut ImageSurface,
        x: i64,
        y: i64,
        level: usize,
        w: u32,
        h: u32,
    ) -> Result<(), TileError> {
        let lvl = self.levels.get(level).ok_or(TileError::LevelOutOfRange {
            level,
            count: self.levels.len(),
        })?;

        let handle = self.pool.checkout().await?;
        let reader: &FileRangeReader = &handle;

        // Region origin arrives in level-0 coordinates
        let lx = (x as f64 / lvl.downsample) as i64;
        let ly = (y as f64 / lvl.downsample) as i64;

        lvl.grid
            .paint_region(surface, lx, ly, w, h, |col, row| {
                self.read_tile(reader, level, col, row)
            })
            .await
        // handle returns to the pool on every exit path
    }
}

// =============================================================================
// Tests
// =============================================================================
