//! The "modified UTF-8" text encoding of `CONSTANT_Utf8` entries.
//!
//! It differs from standard UTF-8 in two places: U+0000 is written as the two bytes `C0 80`,
//! and characters outside the Basic Multilingual Plane are written as a UTF-16 surrogate pair,
//! each half encoded on its own in three bytes. Four byte sequences never appear.
//!
//! Decoding is strict (overlong forms other than `C0 80` are rejected), so a decoded entry
//! encodes back to exactly the bytes it was read from.

use crate::Result;

/// Decode modified UTF-8 `bytes`.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for truncated, overlong or four byte sequences, a raw
/// zero byte, or an unpaired surrogate.
pub fn decode(bytes: &[u8]) -> Result<String> {
    // Without NUL and supplementary characters both encodings agree
    if !bytes.iter().any(|&byte| byte == 0 || byte >= 0xF0) {
        if let Ok(text) = std::str::from_utf8(bytes) {
            return Ok(text.to_string());
        }
    }

    let mut units = Vec::with_capacity(bytes.len());
    let mut position = 0;
    while position < bytes.len() {
        let lead = bytes[position];
        let (unit, width) = match lead {
            0x01..=0x7F => (u16::from(lead), 1),
            0xC0..=0xDF => {
                let unit = (u16::from(lead & 0x1F) << 6) | continuation(bytes, position + 1)?;
                if (1..0x80).contains(&unit) {
                    return Err(malformed_error!(
                        "Overlong modified UTF-8 sequence at byte {}",
                        position
                    ));
                }
                (unit, 2)
            }
            0xE0..=0xEF => {
                let unit = (u16::from(lead & 0x0F) << 12)
                    | (continuation(bytes, position + 1)? << 6)
                    | continuation(bytes, position + 2)?;
                if unit < 0x800 {
                    return Err(malformed_error!(
                        "Overlong modified UTF-8 sequence at byte {}",
                        position
                    ));
                }
                (unit, 3)
            }
            _ => {
                return Err(malformed_error!(
                    "Invalid modified UTF-8 byte {:#04x} at {}",
                    lead,
                    position
                ))
            }
        };
        units.push(unit);
        position += width;
    }

    String::from_utf16(&units).map_err(|e| malformed_error!("Unpaired surrogate: {}", e))
}

fn continuation(bytes: &[u8], position: usize) -> Result<u16> {
    match bytes.get(position) {
        Some(&byte) if byte & 0xC0 == 0x80 => Ok(u16::from(byte & 0x3F)),
        Some(&byte) => Err(malformed_error!(
            "Expected a continuation byte at {}, found {:#04x}",
            position,
            byte
        )),
        None => Err(out_of_bounds_error!()),
    }
}

/// Encode `text` as modified UTF-8.
#[must_use]
pub fn encode(text: &str) -> Vec<u8> {
    if !text.bytes().any(|byte| byte == 0 || byte >= 0xF0) {
        return text.as_bytes().to_vec();
    }

    let mut out = Vec::with_capacity(text.len() + 8);
    for unit in text.encode_utf16() {
        match unit {
            0x01..=0x7F => out.push(unit as u8),
            0x00 | 0x80..=0x7FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}
