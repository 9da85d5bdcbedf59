//! TIFF tag value reading.
//!
//! Values are stored either inline in the IFD entry (small values) or at an
//! offset in the file (arrays, strings, the XML packet). For array values
//! like TileOffsets the whole array is fetched in one range request.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{IfdEntry, TiffHeader};
use super::tags::FieldType;

// =============================================================================
// ValueReader
// =============================================================================

/// Reads tag values from a TIFF file.
///
/// Combines a [`RangeReader`] with header information so values are read
/// respecting the file's byte order and offset width.
pub struct ValueReader<'a, R: RangeReader + ?Sized> {
    reader: &'a R,
    header: &'a TiffHeader,
}

impl<'a, R: RangeReader + ?Sized> ValueReader<'a, R> {
    /// Create a new ValueReader.
    pub fn new(reader: &'a R, header: &'a TiffHeader) -> Self {
        Self { reader, header }
    }

    /// Read raw bytes for an IFD entry's value.
    ///
    /// For inline values, returns the bytes from the entry. For offset
    /// values, fetches the bytes from the file.
    pub async fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.is_inline {
            Ok(Bytes::copy_from_slice(
                &entry.value_offset_bytes[..size as usize],
            ))
        } else {
            let offset = entry.value_offset(self.header.byte_order);
            let bytes = self.reader.read_exact_at(offset, size as usize).await?;
            Ok(bytes)
        }
    }

    /// Read a single u32 value from an entry.
    ///
    /// Handles both Short and Long field types, converting as needed.
    pub async fn read_u32(&self, entry: &IfdEntry) -> Result<u32, TiffError> {
        if let Some(value) = entry.inline_u32(self.header.byte_order) {
            return Ok(value);
        }

        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.count != 1 {
            return Err(TiffError::InvalidTagValue {
                tag: "unknown",
                message: format!("expected count 1, got {}", entry.count),
            });
        }

        let bytes = self.read_bytes(entry).await?;
        let byte_order = self.header.byte_order;

        match field_type {
            FieldType::Short => Ok(byte_order.read_u16(&bytes) as u32),
            FieldType::Long => Ok(byte_order.read_u32(&bytes)),
            _ => Err(TiffError::InvalidTagValue {
                tag: "unknown",
                message: format!("expected Short or Long, got {:?}", field_type),
            }),
        }
    }

    /// Read an array of u64 values from an entry.
    ///
    /// This is the primary method for reading TileOffsets and
    /// TileByteCounts. Handles Short, Long, and Long8 field types,
    /// converting all to u64.
    pub async fn read_u64_array(&self, entry: &IfdEntry) -> Result<Vec<u64>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        let count = entry.count as usize;
        if count == 0 {
            return Ok(Vec::new());
        }

        let bytes = self.read_bytes(entry).await?;
        let byte_order = self.header.byte_order;

        let mut values = Vec::with_capacity(count);

        match field_type {
            FieldType::Short => {
                for i in 0..count {
                    values.push(byte_order.read_u16(&bytes[i * 2..]) as u64);
                }
            }
            FieldType::Long => {
                for i in 0..count {
                    values.push(byte_order.read_u32(&bytes[i * 4..]) as u64);
                }
            }
            FieldType::Long8 => {
                for i in 0..count {
                    values.push(byte_order.read_u64(&bytes[i * 8..]));
                }
            }
            _ => {
                return Err(TiffError::InvalidTagValue {
                    tag: "unknown",
                    message: format!(
                        "expected Short, Long, or Long8 for array, got {:?}",
                        field_type
                    ),
                });
            }
        }

        Ok(values)
    }

    /// Read a string value from an entry (ASCII type).
    ///
    /// The string is expected to be null-terminated; the terminator is
    /// stripped from the result.
    pub async fn read_string(&self, entry: &IfdEntry) -> Result<String, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if field_type != FieldType::Ascii {
            return Err(TiffError::InvalidTagValue {
                tag: "unknown",
                message: format!("expected Ascii type for string, got {:?}", field_type),
            });
        }

        let bytes = self.read_bytes(entry).await?;

        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let s = String::from_utf8_lossy(&bytes[..end]).into_owned();

        Ok(s)
    }

    /// Read raw bytes from an entry (for UNDEFINED or opaque data).
    ///
    /// Used for JPEGTables and the XML metadata packet.
    pub async fn read_raw_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        self.read_bytes(entry).await
    }
}

// =============================================================================
// Tests
// =============================================================================
