use thiserror::Error;

/// I/O errors raised while reading slide data from disk.
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Opening the slide file failed
    #[error("cannot open file: {0}")]
    Open(String),

    /// A positioned read failed
    #[error("read error: {0}")]
    Read(String),

    /// Requested range exceeds the file bounds
    #[error("range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },
}

/// Errors that can occur when parsing the TIFF container structure.
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("file too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid directory offset (points outside the file)
    #[error("invalid directory offset: {0}")]
    InvalidIfdOffset(u64),

    /// Directory entry count larger than any file could hold
    #[error("implausible IFD entry count: {0}")]
    InvalidEntryCount(u64),

    /// A directory does not exist in the file
    #[error("no such directory: {0}")]
    DirectoryOutOfRange(usize),

    /// Required tag is missing from a directory
    #[error("missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unknown field type in a directory entry
    #[error("unknown field type: {0}")]
    UnknownFieldType(u16),
}

/// Errors from parsing the embedded XML metadata packet.
#[derive(Debug, Clone, Error)]
pub enum XmlError {
    /// Malformed XML document
    #[error("XML parse error: {0}")]
    Parse(String),

    /// Document contains no root element
    #[error("XML document has no root element")]
    MissingRoot,
}

/// Errors raised during format detection and slide opening.
///
/// During detection these are non-fatal: the host tries the next registered
/// driver. Once a driver has claimed a file, any of these aborts the open.
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Error in the TIFF container structure
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// Malformed metadata document
    #[error("metadata error: {0}")]
    Xml(#[from] XmlError),

    /// The file is not a TIFF container at all
    #[error("not a TIFF file")]
    NotTiff,

    /// The first directory is not tiled
    #[error("TIFF is not tiled")]
    NotTiled,

    /// No embedded XML metadata packet in the first directory
    #[error("no XML metadata packet present")]
    MissingMetadata,

    /// The metadata buffer lacks the vendor marker
    #[error("{marker} not found in XML packet")]
    MarkerNotFound { marker: &'static str },

    /// The metadata root element is not the vendor sentinel
    #[error("unrecognized root element in vendor XML: {found}")]
    UnexpectedXmlRoot { found: String },

    /// A directory is missing a field the driver requires
    #[error("directory {directory}: reading {tag} failed")]
    MissingField {
        directory: usize,
        tag: &'static str,
    },

    /// Recognized but undecodable compression scheme. Always fatal.
    #[error("directory {directory}: unsupported TIFF compression: {compression}")]
    UnsupportedCompression { directory: usize, compression: u16 },

    /// Repositioning to a directory failed
    #[error("cannot reposition to directory {0}")]
    BadDirectory(usize),

    /// The container holds no usable resolution levels
    #[error("no usable resolution levels")]
    NoLevels,

    /// No registered driver recognized the file
    #[error("unrecognized slide format")]
    UnrecognizedFormat,
}

/// Errors from the tile read/paint pipeline.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// I/O error while reading tile data
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Error in the TIFF container structure
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// Decompression failed
    #[error("tile decode error: {0}")]
    Decode(String),

    /// Requested level does not exist
    #[error("level {level} out of range (level count {count})")]
    LevelOutOfRange { level: usize, count: usize },

    /// Requested tile coordinate is outside the level's tile grid
    #[error("tile ({col}, {row}) out of range for grid {across}x{down}")]
    TileOutOfRange {
        col: u32,
        row: u32,
        across: u32,
        down: u32,
    },
}
