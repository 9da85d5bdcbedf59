//! JPEG stream handling for abbreviated tile data.
//!
//! Optra containers may store each tile as an abbreviated JPEG stream: the
//! entropy-coded data without the quantization (DQT) and Huffman (DHT)
//! tables, which live once per directory in the TIFF `JPEGTables` tag. Such
//! tiles must be merged with the tables before a standard decoder can read
//! them.
//!
//! Merge shape: strip EOI from the tables, strip SOI from the tile, then
//! concatenate, giving SOI + tables + scan data + EOI.

use bytes::{Bytes, BytesMut};

/// Start Of Image marker
pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// End Of Image marker
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Define Huffman Table marker
pub const DHT: [u8; 2] = [0xFF, 0xC4];

/// Define Quantization Table marker
pub const DQT: [u8; 2] = [0xFF, 0xDB];

/// Start Of Scan marker
pub const SOS: [u8; 2] = [0xFF, 0xDA];

/// Check if JPEG data is an abbreviated stream (missing tables).
///
/// An abbreviated stream starts with SOI and reaches SOS without any DQT or
/// DHT marker in between.
pub fn is_abbreviated_stream(data: &[u8]) -> bool {
    if data.len() < 4 || data[0..2] != SOI {
        return false;
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }

        let marker = [data[pos], data[pos + 1]];
        if marker == DQT || marker == DHT {
            return false;
        }
        if marker == SOS {
            return true;
        }

        // Skip marker segment (marker + 2-byte length + payload); stuffing
        // and SOI/EOI carry no length field.
        if pos + 3 < data.len() && marker[1] != 0x00 && marker[1] != 0xD8 && marker[1] != 0xD9 {
            let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
            pos += 2 + length;
        } else {
            pos += 2;
        }
    }

    // No SOS found, inconclusive
    false
}

/// Check if JPEG data is a complete stream (carries a DQT table).
pub fn is_complete_stream(data: &[u8]) -> bool {
    if data.len() < 4 || data[0..2] != SOI {
        return false;
    }

    data[2..].windows(2).any(|w| w == DQT)
}

/// Merge JPEGTables with abbreviated tile data into a complete stream.
///
/// `tables` and `tile_data` each start with SOI and end with EOI; the result
/// is SOI + tables content + tile content + EOI.
pub fn merge_jpeg_tables(tables: &[u8], tile_data: &[u8]) -> Bytes {
    if tables.is_empty() {
        return Bytes::copy_from_slice(tile_data);
    }
    if tile_data.is_empty() {
        return Bytes::new();
    }

    let tables_end = if tables.len() >= 2 && tables[tables.len() - 2..] == EOI {
        tables.len() - 2
    } else {
        tables.len()
    };

    let tile_start = if tile_data.len() >= 2 && tile_data[0..2] == SOI {
        2
    } else {
        0
    };

    let mut result = BytesMut::with_capacity(tables_end + (tile_data.len() - tile_start));
    result.extend_from_slice(&tables[..tables_end]);
    result.extend_from_slice(&tile_data[tile_start..]);
    result.freeze()
}

/// Prepare tile data for decoding, merging tables if needed.
///
/// Complete streams pass through untouched; abbreviated streams are merged
/// with the directory's tables when available.
pub fn prepare_tile_jpeg(tables: Option<&[u8]>, tile_data: &[u8]) -> Bytes {
    if is_complete_stream(tile_data) {
        return Bytes::copy_from_slice(tile_data);
    }

    if let Some(tables) = tables {
        if is_abbreviated_stream(tile_data) {
            return merge_jpeg_tables(tables, tile_data);
        }
    }

    Bytes::copy_from_slice(tile_data)
}

// =============================================================================
// Tests
// =============================================================================
