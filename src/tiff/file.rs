//! Whole-file TIFF directory summary.
//!
//! [`TiffFile`] parses the header and walks the IFD chain once, keeping
//! every directory in stored file order. Format detection and the pyramid
//! builder both work from this summary; tag values are fetched lazily
//! through the accessors so parsing the structure stays cheap.

use bytes::Bytes;
use tracing::debug;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{Ifd, TiffHeader, BIGTIFF_HEADER_SIZE};
use super::tags::TiffTag;
use super::values::ValueReader;

/// Cap on the IFD chain walk. Guards against cyclic or degenerate chains;
/// real slides carry at most a few dozen directories.
pub const MAX_DIRECTORIES: usize = 100;

/// A parsed TIFF container: header plus every directory in stored order.
#[derive(Debug, Clone)]
pub struct TiffFile {
    pub header: TiffHeader,
    directories: Vec<Ifd>,
}

impl TiffFile {
    /// Parse the header and the full IFD chain.
    pub async fn parse<R: RangeReader + ?Sized>(reader: &R) -> Result<Self, TiffError> {
        let file_size = reader.size();

        let header_len = (BIGTIFF_HEADER_SIZE as u64).min(file_size) as usize;
        let header_bytes = reader.read_exact_at(0, header_len).await?;
        let header = TiffHeader::parse(&header_bytes, file_size)?;

        let mut directories = Vec::new();
        let mut offset = header.first_ifd_offset;

        while offset != 0 {
            if directories.len() >= MAX_DIRECTORIES {
                debug!(
                    identifier = reader.identifier(),
                    "directory chain exceeds {MAX_DIRECTORIES} entries, stopping walk"
                );
                break;
            }
            if offset >= file_size {
                return Err(TiffError::InvalidIfdOffset(offset));
            }

            let count_bytes = reader
                .read_exact_at(offset, header.ifd_count_size())
                .await?;
            let entry_count = Ifd::read_entry_count(&count_bytes, &header)?;

            let total_size = Ifd::calculate_size(&header, entry_count)?;
            if offset + total_size as u64 > file_size {
                return Err(TiffError::InvalidIfdOffset(offset));
            }

            let ifd_bytes = reader.read_exact_at(offset, total_size).await?;
            let ifd = Ifd::parse(&ifd_bytes, &header)?;
            offset = ifd.next_ifd_offset;
            directories.push(ifd);
        }

        Ok(TiffFile {
            header,
            directories,
        })
    }

    /// Number of directories in the file.
    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }

    /// Access a directory by index.
    pub fn directory(&self, index: usize) -> Result<&Ifd, TiffError> {
        self.directories
            .get(index)
            .ok_or(TiffError::DirectoryOutOfRange(index))
    }

    /// Whether a directory stores its image as tiles.
    pub fn is_tiled(&self, index: usize) -> Result<bool, TiffError> {
        let ifd = self.directory(index)?;
        Ok(ifd.has_tag(TiffTag::TileWidth) && ifd.has_tag(TiffTag::TileLength))
    }

    /// Read a scalar u32 tag from a directory.
    ///
    /// Returns `Ok(None)` when the tag is absent.
    pub async fn get_u32<R: RangeReader + ?Sized>(
        &self,
        reader: &R,
        index: usize,
        tag: TiffTag,
    ) -> Result<Option<u32>, TiffError> {
        let ifd = self.directory(index)?;
        match ifd.get_entry_by_tag(tag) {
            Some(entry) => {
                let values = ValueReader::new(reader, &self.header);
                Ok(Some(values.read_u32(entry).await?))
            }
            None => Ok(None),
        }
    }

    /// Read a string tag from a directory.
    ///
    /// Returns `Ok(None)` when the tag is absent.
    pub async fn get_string<R: RangeReader + ?Sized>(
        &self,
        reader: &R,
        index: usize,
        tag: TiffTag,
    ) -> Result<Option<String>, TiffError> {
        let ifd = self.directory(index)?;
        match ifd.get_entry_by_tag(tag) {
            Some(entry) => {
                let values = ValueReader::new(reader, &self.header);
                Ok(Some(values.read_string(entry).await?))
            }
            None => Ok(None),
        }
    }

    /// Read an opaque buffer tag (XMLPacket, JPEGTables) from a directory.
    ///
    /// Returns `Ok(None)` when the tag is absent.
    pub async fn get_buffer<R: RangeReader + ?Sized>(
        &self,
        reader: &R,
        index: usize,
        tag: TiffTag,
    ) -> Result<Option<Bytes>, TiffError> {
        let ifd = self.directory(index)?;
        match ifd.get_entry_by_tag(tag) {
            Some(entry) => {
                let values = ValueReader::new(reader, &self.header);
                Ok(Some(values.read_raw_bytes(entry).await?))
            }
            None => Ok(None),
        }
    }

    /// Read an array of u64 values (tile offsets/byte counts) from a
    /// directory, or an error if the tag is absent.
    pub async fn get_u64_array_required<R: RangeReader + ?Sized>(
        &self,
        reader: &R,
        index: usize,
        tag: TiffTag,
        tag_name: &'static str,
    ) -> Result<Vec<u64>, TiffError> {
        let ifd = self.directory(index)?;
        let entry = ifd
            .get_entry_by_tag(tag)
            .ok_or(TiffError::MissingTag(tag_name))?;
        let values = ValueReader::new(reader, &self.header);
        values.read_u64_array(entry).await
    }
}

// =============================================================================
// Tests
// =============================================================================
