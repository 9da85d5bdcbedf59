//! # optra-wsi
//!
//! A reader for OptraScan whole-slide images.
//!
//! OptraScan scanners write tiled (Big)TIFF containers: a full-resolution
//! image in directory 0 with an embedded `ScanInfo` XML metadata packet,
//! reduced-resolution pyramid levels, and auxiliary images (label,
//! thumbnail) interleaved with them. This crate detects the format, builds
//! the level pyramid, exposes the scanner metadata as properties, and
//! paints arbitrary regions from any level into RGBA surfaces.
//!
//! ## Example
//!
//! ```no_run
//! use optra_wsi::Slide;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let slide = Slide::open("scan.tif").await?;
//!
//!     let (w, h) = slide.dimensions();
//!     println!("{}x{}, {} levels", w, h, slide.level_count());
//!     println!("mpp-x = {:?}", slide.property("mpp-x"));
//!
//!     // 512x512 region from the top-left of the full-resolution level
//!     let region = slide.read_region(0, 0, 0, 512, 512).await?;
//!     assert_eq!(region.data().len(), 512 * 512 * 4);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`io`] - byte-range reads and the per-slide handle pool
//! - [`tiff`] - TIFF/BigTIFF container parsing and tile decoding
//! - [`tile`] - decoded-tile cache, surfaces and the grid painter
//! - [`slide`] - the host `Slide` object, properties, associated images
//! - [`format`] - the driver registry and the OptraScan driver

pub mod error;
pub mod format;
pub mod io;
pub mod slide;
pub mod tiff;
pub mod tile;

pub use error::{FormatError, IoError, TiffError, TileError, XmlError};
pub use slide::{PropertyDict, Slide, SlideOps};
pub use tile::ImageSurface;
