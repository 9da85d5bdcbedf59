//! Tiled TIFF/BigTIFF container decoding.
//!
//! A hand-written parser covering the subset of TIFF that whole-slide
//! containers use: classic and BigTIFF headers, the IFD chain, tag value
//! reading, tiled-directory geometry and abbreviated-JPEG tile streams.

pub mod file;
pub mod jpeg;
pub mod level;
pub mod parser;
pub mod tags;
pub mod values;

pub use file::{TiffFile, MAX_DIRECTORIES};
pub use level::{LevelGeometry, BYTES_PER_PIXEL};
pub use parser::{ByteOrder, Ifd, IfdEntry, TiffHeader};
pub use tags::{Compression, FieldType, TiffTag, FILETYPE_REDUCED_IMAGE};
pub use values::ValueReader;
