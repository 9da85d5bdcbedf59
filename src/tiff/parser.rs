//! TIFF header and directory structure parsing.
//!
//! Handles the file header (classic TIFF and BigTIFF) and the raw IFD
//! (Image File Directory) structure: entry counts, 12/20-byte entries and
//! the next-directory link that chains IFDs together.
//!
//! # TIFF Header Structure
//!
//! ## Classic TIFF (8 bytes)
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (42 = 0x002A)
//! Bytes 4-7: Offset to first IFD (4 bytes)
//! ```
//!
//! ## BigTIFF (16 bytes)
//! ```text
//! Bytes 0-1: Byte order
//! Bytes 2-3: Version (43 = 0x002B)
//! Bytes 4-5: Offset byte size (must be 8)
//! Bytes 6-7: Reserved
//! Bytes 8-15: Offset to first IFD (8 bytes)
//! ```

use crate::error::TiffError;
use crate::io::{read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le};

use super::tags::{FieldType, TiffTag};

// =============================================================================
// Constants
// =============================================================================

/// Magic bytes indicating little-endian byte order ("II" for Intel)
const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;

/// Magic bytes indicating big-endian byte order ("MM" for Motorola)
const BYTE_ORDER_BIG_ENDIAN: u16 = 0x4D4D;

/// Version number for classic TIFF
const VERSION_TIFF: u16 = 42;

/// Version number for BigTIFF
const VERSION_BIGTIFF: u16 = 43;

/// Size of classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of BigTIFF header in bytes
pub const BIGTIFF_HEADER_SIZE: usize = 16;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) of a TIFF file.
///
/// Declared in the first two bytes of the header; all multi-byte values in
/// the file must be read respecting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian ("II" = Intel)
    LittleEndian,
    /// Big-endian ("MM" = Motorola)
    BigEndian,
}

impl ByteOrder {
    /// Read a u16 from a byte slice using this byte order.
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => read_u16_le(bytes),
            ByteOrder::BigEndian => read_u16_be(bytes),
        }
    }

    /// Read a u32 from a byte slice using this byte order.
    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => read_u32_le(bytes),
            ByteOrder::BigEndian => read_u32_be(bytes),
        }
    }

    /// Read a u64 from a byte slice using this byte order.
    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        match self {
            ByteOrder::LittleEndian => read_u64_le(bytes),
            ByteOrder::BigEndian => read_u64_be(bytes),
        }
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    /// Byte order for all multi-byte values in the file
    pub byte_order: ByteOrder,

    /// Whether this is a BigTIFF file (64-bit offsets)
    pub is_bigtiff: bool,

    /// Offset to the first IFD in the file
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse a TIFF header from raw bytes.
    ///
    /// The input must contain at least 8 bytes for classic TIFF or 16 bytes
    /// for BigTIFF. `file_size` is used to validate the first IFD offset.
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, TiffError> {
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        // The magic is a byte pattern, so endianness of this read is moot.
        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        let byte_order = match magic {
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            _ => return Err(TiffError::InvalidMagic(magic)),
        };

        let version = byte_order.read_u16(&bytes[2..4]);

        match version {
            VERSION_TIFF => {
                let first_ifd_offset = byte_order.read_u32(&bytes[4..8]) as u64;
                if first_ifd_offset >= file_size {
                    return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
                }
                Ok(TiffHeader {
                    byte_order,
                    is_bigtiff: false,
                    first_ifd_offset,
                })
            }
            VERSION_BIGTIFF => {
                if bytes.len() < BIGTIFF_HEADER_SIZE {
                    return Err(TiffError::FileTooSmall {
                        required: BIGTIFF_HEADER_SIZE as u64,
                        actual: bytes.len() as u64,
                    });
                }

                // Bytes 4-5: offset byte size (must be 8)
                let offset_size = byte_order.read_u16(&bytes[4..6]);
                if offset_size != 8 {
                    return Err(TiffError::InvalidBigTiffOffsetSize(offset_size));
                }

                // Bytes 6-7 are reserved; not strictly validated.
                let first_ifd_offset = byte_order.read_u64(&bytes[8..16]);
                if first_ifd_offset >= file_size {
                    return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
                }
                Ok(TiffHeader {
                    byte_order,
                    is_bigtiff: true,
                    first_ifd_offset,
                })
            }
            _ => Err(TiffError::InvalidVersion(version)),
        }
    }

    /// Size of an IFD entry in bytes.
    ///
    /// Classic TIFF: 12 bytes (2 tag + 2 type + 4 count + 4 value/offset).
    /// BigTIFF: 20 bytes (2 tag + 2 type + 8 count + 8 value/offset).
    #[inline]
    pub const fn ifd_entry_size(&self) -> usize {
        if self.is_bigtiff {
            20
        } else {
            12
        }
    }

    /// Size of the entry count field at the start of an IFD.
    #[inline]
    pub const fn ifd_count_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            2
        }
    }

    /// Size of the next IFD offset field at the end of an IFD.
    #[inline]
    pub const fn ifd_next_offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    /// Size of the value/offset field in an IFD entry.
    #[inline]
    pub const fn value_offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }
}

// =============================================================================
// IfdEntry
// =============================================================================

/// A single parsed IFD entry.
///
/// The value/offset field is kept as raw bytes; interpretation happens in
/// [`ValueReader`](super::values::ValueReader) because large values live at
/// an offset and require a file read.
#[derive(Debug, Clone)]
pub struct IfdEntry {
    /// Numeric tag ID (kept even when the tag is not in our vocabulary)
    pub tag_id: u16,

    /// Decoded field type, or `None` for unknown types
    pub field_type: Option<FieldType>,

    /// Raw field type value for diagnostics
    pub field_type_raw: u16,

    /// Number of values
    pub count: u64,

    /// Raw bytes of the value/offset field (4 for TIFF, 8 for BigTIFF)
    pub value_offset_bytes: Vec<u8>,

    /// Whether the value is stored inline in `value_offset_bytes`
    pub is_inline: bool,
}

impl IfdEntry {
    /// Parse one entry from its raw 12/20 bytes.
    pub fn parse(bytes: &[u8], header: &TiffHeader) -> Result<Self, TiffError> {
        let entry_size = header.ifd_entry_size();
        if bytes.len() < entry_size {
            return Err(TiffError::FileTooSmall {
                required: entry_size as u64,
                actual: bytes.len() as u64,
            });
        }

        let bo = header.byte_order;
        let tag_id = bo.read_u16(&bytes[0..2]);
        let field_type_raw = bo.read_u16(&bytes[2..4]);
        let field_type = FieldType::from_u16(field_type_raw);

        let (count, value_start) = if header.is_bigtiff {
            (bo.read_u64(&bytes[4..12]), 12)
        } else {
            (bo.read_u32(&bytes[4..8]) as u64, 8)
        };

        let value_offset_bytes =
            bytes[value_start..value_start + header.value_offset_size()].to_vec();

        // Unknown field types are carried through as non-inline; reads
        // against them fail with UnknownFieldType at use time.
        let is_inline = field_type
            .map(|ft| ft.fits_inline(count, header.is_bigtiff))
            .unwrap_or(false);

        Ok(IfdEntry {
            tag_id,
            field_type,
            field_type_raw,
            count,
            value_offset_bytes,
            is_inline,
        })
    }

    /// Total byte size of this entry's value, or `None` for unknown types.
    pub fn value_byte_size(&self) -> Option<u64> {
        self.field_type
            .map(|ft| ft.size_in_bytes() as u64 * self.count)
    }

    /// The value/offset field interpreted as a file offset.
    pub fn value_offset(&self, byte_order: ByteOrder) -> u64 {
        if self.value_offset_bytes.len() == 8 {
            byte_order.read_u64(&self.value_offset_bytes)
        } else {
            byte_order.read_u32(&self.value_offset_bytes) as u64
        }
    }

    /// Read an inline Short/Long value as u32, if this entry is inline with
    /// count 1.
    pub fn inline_u32(&self, byte_order: ByteOrder) -> Option<u32> {
        if !self.is_inline || self.count != 1 {
            return None;
        }
        match self.field_type? {
            FieldType::Short => Some(byte_order.read_u16(&self.value_offset_bytes) as u32),
            FieldType::Long => Some(byte_order.read_u32(&self.value_offset_bytes)),
            _ => None,
        }
    }
}

// =============================================================================
// Ifd
// =============================================================================

/// A parsed Image File Directory.
#[derive(Debug, Clone)]
pub struct Ifd {
    /// Entries in stored order
    pub entries: Vec<IfdEntry>,

    /// Offset of the next IFD in the chain, 0 for the last directory
    pub next_ifd_offset: u64,
}

impl Ifd {
    /// Read the entry count from the first bytes of an IFD.
    pub fn read_entry_count(bytes: &[u8], header: &TiffHeader) -> Result<u64, TiffError> {
        let count_size = header.ifd_count_size();
        if bytes.len() < count_size {
            return Err(TiffError::FileTooSmall {
                required: count_size as u64,
                actual: bytes.len() as u64,
            });
        }
        Ok(if header.is_bigtiff {
            header.byte_order.read_u64(&bytes[0..8])
        } else {
            header.byte_order.read_u16(&bytes[0..2]) as u64
        })
    }

    /// Total byte size of an IFD with `entry_count` entries, including the
    /// count field and the next-IFD link.
    ///
    /// The count comes straight from the file, so the arithmetic is checked;
    /// a count no file could hold is `InvalidEntryCount`.
    pub fn calculate_size(header: &TiffHeader, entry_count: u64) -> Result<usize, TiffError> {
        let fixed = (header.ifd_count_size() + header.ifd_next_offset_size()) as u64;
        (header.ifd_entry_size() as u64)
            .checked_mul(entry_count)
            .and_then(|entries| entries.checked_add(fixed))
            .and_then(|total| usize::try_from(total).ok())
            .ok_or(TiffError::InvalidEntryCount(entry_count))
    }

    /// Parse a complete IFD from raw bytes starting at its count field.
    pub fn parse(bytes: &[u8], header: &TiffHeader) -> Result<Self, TiffError> {
        let entry_count = Self::read_entry_count(bytes, header)?;
        let total_size = Self::calculate_size(header, entry_count)?;
        if bytes.len() < total_size {
            return Err(TiffError::FileTooSmall {
                required: total_size as u64,
                actual: bytes.len() as u64,
            });
        }

        let entry_size = header.ifd_entry_size();
        let mut entries = Vec::with_capacity(entry_count as usize);
        let mut pos = header.ifd_count_size();
        for _ in 0..entry_count {
            entries.push(IfdEntry::parse(&bytes[pos..pos + entry_size], header)?);
            pos += entry_size;
        }

        let next_ifd_offset = if header.is_bigtiff {
            header.byte_order.read_u64(&bytes[pos..pos + 8])
        } else {
            header.byte_order.read_u32(&bytes[pos..pos + 4]) as u64
        };

        Ok(Ifd {
            entries,
            next_ifd_offset,
        })
    }

    /// Find the entry for a tag, if present.
    pub fn get_entry_by_tag(&self, tag: TiffTag) -> Option<&IfdEntry> {
        let id = tag.as_u16();
        self.entries.iter().find(|e| e.tag_id == id)
    }

    /// Whether this directory carries a tag.
    pub fn has_tag(&self, tag: TiffTag) -> bool {
        self.get_entry_by_tag(tag).is_some()
    }
}

// =============================================================================
// Tests
// =============================================================================
