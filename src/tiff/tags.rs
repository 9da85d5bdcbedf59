//! TIFF tag and field type vocabulary.
//!
//! Defines the field types, tag IDs and compression values the driver
//! needs. OptraScan containers lean on a small dialect: tiled directories,
//! an `XMLPacket` metadata tag in directory 0, and `SubfileType` to mark
//! reduced-resolution pyramid levels versus associated images.

// =============================================================================
// TIFF Field Types
// =============================================================================

/// TIFF field types that determine how values are encoded.
///
/// Only the types that occur in whole-slide containers are defined; TIFF's
/// RATIONAL/FLOAT/etc. types are not needed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FieldType {
    /// Unsigned 8-bit integer (1 byte)
    Byte = 1,

    /// 8-bit ASCII character (1 byte)
    Ascii = 2,

    /// Unsigned 16-bit integer (2 bytes)
    Short = 3,

    /// Unsigned 32-bit integer (4 bytes)
    Long = 4,

    /// Undefined byte data (1 byte per element)
    Undefined = 7,

    /// Unsigned 64-bit integer (8 bytes), BigTIFF only
    Long8 = 16,
}

impl FieldType {
    /// Size of a single value of this type in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::Undefined => 1,
            FieldType::Short => 2,
            FieldType::Long => 4,
            FieldType::Long8 => 8,
        }
    }

    /// Create a FieldType from its numeric value.
    ///
    /// Returns `None` for unsupported or unknown type values.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FieldType::Byte),
            2 => Some(FieldType::Ascii),
            3 => Some(FieldType::Short),
            4 => Some(FieldType::Long),
            7 => Some(FieldType::Undefined),
            16 => Some(FieldType::Long8),
            _ => None,
        }
    }

    /// Maximum bytes stored inline in a classic TIFF IFD entry.
    pub const INLINE_THRESHOLD_TIFF: usize = 4;

    /// Maximum bytes stored inline in a BigTIFF IFD entry.
    pub const INLINE_THRESHOLD_BIGTIFF: usize = 8;

    /// Check if a value with this type and count fits inline in an entry.
    #[inline]
    pub fn fits_inline(self, count: u64, is_bigtiff: bool) -> bool {
        let total_size = self.size_in_bytes() as u64 * count;
        let threshold = if is_bigtiff {
            Self::INLINE_THRESHOLD_BIGTIFF as u64
        } else {
            Self::INLINE_THRESHOLD_TIFF as u64
        };
        total_size <= threshold
    }
}

// =============================================================================
// TIFF Tags
// =============================================================================

/// TIFF tag IDs relevant to OptraScan slide parsing.
///
/// Tags are 16-bit identifiers that describe the type of metadata in an IFD
/// entry. Tags not listed here are ignored during parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TiffTag {
    // -------------------------------------------------------------------------
    // Directory Classification
    // -------------------------------------------------------------------------
    /// NewSubfileType bit flags. Directories carrying the reduced-image bit
    /// are pyramid levels; tiled directories without it are associated
    /// images named by their description.
    SubfileType = 254,

    // -------------------------------------------------------------------------
    // Basic Image Structure
    // -------------------------------------------------------------------------
    /// Image width in pixels
    ImageWidth = 256,

    /// Image height (length) in pixels
    ImageLength = 257,

    /// Compression scheme used
    Compression = 259,

    /// Description string; names associated images in Optra containers
    ImageDescription = 270,

    /// Scanner manufacturer
    Make = 271,

    /// Scanner model
    Model = 272,

    /// Software that produced the file
    Software = 305,

    /// File creation date/time
    DateTime = 306,

    // -------------------------------------------------------------------------
    // Tile Organization
    // -------------------------------------------------------------------------
    /// Width of each tile in pixels
    TileWidth = 322,

    /// Height (length) of each tile in pixels
    TileLength = 323,

    /// Byte offsets of each tile in the file
    TileOffsets = 324,

    /// Byte counts of each tile
    TileByteCounts = 325,

    // -------------------------------------------------------------------------
    // JPEG Handling
    // -------------------------------------------------------------------------
    /// JPEG quantization and Huffman tables for abbreviated tile streams.
    /// Must be merged with tile data before decoding.
    JpegTables = 347,

    // -------------------------------------------------------------------------
    // Vendor Metadata
    // -------------------------------------------------------------------------
    /// Embedded XML metadata packet (the ScanInfo document lives here)
    XmlPacket = 700,
}

impl TiffTag {
    /// Create a TiffTag from its numeric value.
    ///
    /// Returns `None` for unrecognized tags; unknown tags are simply
    /// ignored during parsing.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            254 => Some(TiffTag::SubfileType),
            256 => Some(TiffTag::ImageWidth),
            257 => Some(TiffTag::ImageLength),
            259 => Some(TiffTag::Compression),
            270 => Some(TiffTag::ImageDescription),
            271 => Some(TiffTag::Make),
            272 => Some(TiffTag::Model),
            305 => Some(TiffTag::Software),
            306 => Some(TiffTag::DateTime),
            322 => Some(TiffTag::TileWidth),
            323 => Some(TiffTag::TileLength),
            324 => Some(TiffTag::TileOffsets),
            325 => Some(TiffTag::TileByteCounts),
            347 => Some(TiffTag::JpegTables),
            700 => Some(TiffTag::XmlPacket),
            _ => None,
        }
    }

    /// Get the numeric tag ID.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

/// SubfileType bit marking a reduced-resolution pyramid image.
pub const FILETYPE_REDUCED_IMAGE: u32 = 0x1;

// =============================================================================
// Compression Values
// =============================================================================

/// TIFF compression scheme identifiers.
///
/// Optra containers use JPEG tiles; some auxiliary directories are stored
/// uncompressed. Any other scheme aborts the open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Compression {
    /// No compression (raw RGBA tiles)
    None = 1,

    /// LZW compression (not supported)
    Lzw = 5,

    /// "Old-style" JPEG (not supported, rarely used)
    OldJpeg = 6,

    /// JPEG compression (supported)
    Jpeg = 7,

    /// Deflate/zlib compression (not supported)
    Deflate = 8,

    /// Adobe Deflate (not supported)
    AdobeDeflate = 32946,

    /// JPEG 2000 (not supported)
    Jpeg2000 = 33003,
}

impl Compression {
    /// Create a Compression from its numeric value.
    ///
    /// Returns `None` for unrecognized compression values.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Compression::None),
            5 => Some(Compression::Lzw),
            6 => Some(Compression::OldJpeg),
            7 => Some(Compression::Jpeg),
            8 => Some(Compression::Deflate),
            32946 => Some(Compression::AdobeDeflate),
            33003 => Some(Compression::Jpeg2000),
            _ => None,
        }
    }

    /// Check if this compression scheme can be decoded.
    #[inline]
    pub const fn is_supported(self) -> bool {
        matches!(self, Compression::Jpeg | Compression::None)
    }

    /// Get a human-readable name for the compression scheme.
    pub const fn name(self) -> &'static str {
        match self {
            Compression::None => "None",
            Compression::Lzw => "LZW",
            Compression::OldJpeg => "Old JPEG",
            Compression::Jpeg => "JPEG",
            Compression::Deflate => "Deflate",
            Compression::AdobeDeflate => "Adobe Deflate",
            Compression::Jpeg2000 => "JPEG 2000",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
