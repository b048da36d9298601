//! Hex rendering and parsing for chunk contents.
//!
//! Everything coming from a user passes through here before it reaches
//! [`ChunkStore::write_chunk()`](chunkedit::ChunkStore::write_chunk), so the
//! store never sees malformed input.

use snafu::{Snafu, ensure};
use std::fmt;

/// Number of bytes per row in [`format_grid()`].
pub const GRID_COLUMNS: usize = 8;

/// Errors when parsing hex text.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[non_exhaustive]
pub enum HexError {
    #[snafu(display("invalid hex digit {ch:?} at position {position}"))]
    InvalidDigit { ch: char, position: usize },

    #[snafu(display("odd number of hex digits ({digits})"))]
    OddLength { digits: usize },

    #[snafu(display("empty byte value"))]
    EmptyByte,

    #[snafu(display("byte value {text:?} has more than two hex digits"))]
    ByteTooLong { text: String },
}

/// Encodes `data` as contiguous uppercase hex, two digits per byte.
pub fn encode_raw(data: &[u8]) -> String {
    hex::encode_upper(data)
}

/// Decodes contiguous hex text into bytes.
///
/// ASCII whitespace anywhere in `text` is ignored and both cases are
/// accepted. Positions in errors refer to the original text.
pub fn decode_raw(text: &str) -> Result<Vec<u8>, HexError> {
    let mut digits = Vec::with_capacity(text.len());
    let mut positions = Vec::with_capacity(text.len());

    for (position, ch) in text.char_indices() {
        if ch.is_ascii_whitespace() {
            continue;
        }

        ensure!(ch.is_ascii(), InvalidDigitSnafu { ch, position });
        digits.push(ch as u8);
        positions.push(position);
    }

    hex::decode(&digits).map_err(|e| match e {
        hex::FromHexError::InvalidHexCharacter { c, index } => HexError::InvalidDigit {
            ch: c,
            position: positions.get(index).copied().unwrap_or(index),
        },
        _ => HexError::OddLength {
            digits: digits.len(),
        },
    })
}

/// Parses a single grid cell holding one or two hex digits.
pub fn parse_byte(text: &str) -> Result<u8, HexError> {
    let text = text.trim();

    ensure!(!text.is_empty(), EmptyByteSnafu);
    ensure!(text.len() <= 2, ByteTooLongSnafu { text });

    let mut value = 0u8;

    for (position, ch) in text.char_indices() {
        let digit = ch
            .to_digit(16)
            .ok_or(HexError::InvalidDigit { ch, position })?;
        value = (value << 4) | digit as u8;
    }

    Ok(value)
}

/// Renders `data` as rows of [`GRID_COLUMNS`] uppercase bytes, each row
/// prefixed with the absolute offset of its first byte.
///
/// `base` is the offset of `data[0]` in the file.
pub fn format_grid(data: &[u8], base: u64) -> String {
    let mut out = String::new();

    for (row, bytes) in data.chunks(GRID_COLUMNS).enumerate() {
        let offset = base + (row * GRID_COLUMNS) as u64;
        out.push_str(&format!("{offset:08X}:"));

        for byte in bytes {
            out.push_str(&format!(" {byte:02X}"));
        }

        out.push('\n');
    }

    out
}

/// Position and extent of one chunk, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    pub index: u64,
    /// Absolute offset of the first byte.
    pub start: u64,
    /// Number of bytes currently shown for the chunk.
    pub len: usize,
}

impl ChunkInfo {
    /// Absolute offset of the last byte, or `start` when the chunk is empty.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.start + (self.len as u64).saturating_sub(1)
    }
}

impl fmt::Display for ChunkInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Chunk: {} (Offset: 0x{:X}\u{2013}0x{:X} / {}\u{2013}{} dec)    Chunk Size: {}",
            self.index,
            self.start,
            self.end(),
            self.start,
            self.end(),
            self.len
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_encoding_is_uppercase() {
        assert_eq!(encode_raw(&[0x00, 0xAB, 0x7f]), "00AB7F");
        assert_eq!(encode_raw(&[]), "");
    }

    #[test]
    fn raw_decoding_ignores_whitespace() {
        assert_eq!(decode_raw("de ad\nBE\tef").unwrap(), [0xDEu8, 0xAD, 0xBE, 0xEF]);
        assert_eq!(decode_raw("   ").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn raw_decoding_reports_bad_digit_position() {
        assert_eq!(
            decode_raw("00 1G").unwrap_err(),
            HexError::InvalidDigit { ch: 'G', position: 4 }
        );
    }

    #[test]
    fn raw_decoding_rejects_non_ascii() {
        assert_eq!(
            decode_raw("0\u{e9}").unwrap_err(),
            HexError::InvalidDigit { ch: '\u{e9}', position: 1 }
        );
        assert_eq!(
            decode_raw("zz").unwrap_err(),
            HexError::InvalidDigit { ch: 'z', position: 0 }
        );
    }

    #[test]
    fn raw_decoding_rejects_odd_length() {
        assert_eq!(
            decode_raw("ABC").unwrap_err(),
            HexError::OddLength { digits: 3 }
        );
    }

    #[test]
    fn byte_cells() {
        assert_eq!(parse_byte("ff").unwrap(), 0xFF);
        assert_eq!(parse_byte(" 7 ").unwrap(), 0x07);
        assert_eq!(parse_byte("").unwrap_err(), HexError::EmptyByte);
        assert!(matches!(
            parse_byte("100").unwrap_err(),
            HexError::ByteTooLong { .. }
        ));
        assert!(matches!(
            parse_byte("x1").unwrap_err(),
            HexError::InvalidDigit { ch: 'x', position: 0 }
        ));
    }

    #[test]
    fn grid_rows_carry_offsets() {
        let data: Vec<u8> = (0..10).collect();
        let grid = format_grid(&data, 0x20);

        assert_eq!(
            grid,
            "00000020: 00 01 02 03 04 05 06 07\n00000028: 08 09\n"
        );
    }

    #[test]
    fn chunk_info_label() {
        let info = ChunkInfo {
            index: 2,
            start: 0x80,
            len: 64,
        };

        assert_eq!(
            info.to_string(),
            "Chunk: 2 (Offset: 0x80\u{2013}0xBF / 128\u{2013}191 dec)    Chunk Size: 64"
        );
    }

    #[test]
    fn empty_chunk_info_does_not_underflow() {
        let info = ChunkInfo {
            index: 0,
            start: 0,
            len: 0,
        };

        assert_eq!(info.end(), 0);
    }
}
