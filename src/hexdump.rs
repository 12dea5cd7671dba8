//! Bidirectional `hexdump -C` codec.
//!
//! `marshal` reproduces the canonical `hexdump -C` layout so fixtures can
//! be diffed against the real utility. `unmarshal` is lenient: offsets,
//! ASCII gutters, blank lines and any whitespace pattern between digits
//! (including compact runs) are accepted; only a character that is not a
//! hex digit, whitespace or `|` inside the hex column is an error.

use std::fmt::Write as _;

use crate::error::{Result, TachoError};

const BYTES_PER_LINE: usize = 16;

/// Encode `data` in `hexdump -C` format: 16 bytes per line, an 8-digit
/// lowercase offset, two eight-byte groups, and an ASCII gutter between
/// `|`...`|` starting in the same column on every line.
pub fn marshal(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() / BYTES_PER_LINE + 1) * 79);
    for (line, chunk) in data.chunks(BYTES_PER_LINE).enumerate() {
        let _ = write!(out, "{:08x}  ", line * BYTES_PER_LINE);
        for slot in 0..BYTES_PER_LINE {
            match chunk.get(slot) {
                Some(byte) => {
                    let _ = write!(out, "{byte:02x} ");
                }
                None => out.push_str("   "),
            }
            if slot == 7 {
                out.push(' ');
            }
        }
        out.push(' ');
        out.push('|');
        for &byte in chunk {
            out.push(if (0x20..=0x7e).contains(&byte) {
                byte as char
            } else {
                '.'
            });
        }
        out.push_str("|\n");
    }
    out
}

/// Decode hexdump text back into bytes.
///
/// Per line, everything from the first `|` on is the ASCII gutter and is
/// discarded; the first whitespace-delimited token is the offset and is
/// discarded; the remaining tokens are concatenated and read as hex
/// digit pairs.
pub fn unmarshal(text: &str) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for (index, raw_line) in text.lines().enumerate() {
        let line = match raw_line.find('|') {
            Some(gutter) => &raw_line[..gutter],
            None => raw_line,
        };
        let mut fields = line.split_whitespace();
        if fields.next().is_none() {
            // blank line
            continue;
        }
        let mut digits = String::new();
        for field in fields {
            if let Some(bad) = field.chars().find(|c| !c.is_ascii_hexdigit()) {
                return Err(TachoError::HexdumpSyntax {
                    line: index + 1,
                    detail: format!("{bad:?} in the hex column"),
                });
            }
            digits.push_str(field);
        }
        if digits.len() % 2 != 0 {
            return Err(TachoError::HexdumpSyntax {
                line: index + 1,
                detail: format!("odd number of hex digits ({})", digits.len()),
            });
        }
        out.extend(hex::decode(&digits).map_err(|e| TachoError::HexdumpSyntax {
            line: index + 1,
            detail: e.to_string(),
        })?);
    }
    Ok(out)
}
