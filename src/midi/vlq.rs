//! Variable-length quantities.
//!
//! MIDI stores delta times and meta-event lengths as big-endian groups of
//! seven bits, with the high bit of every byte but the last set. Values up to
//! 64 bits are accepted here, beyond the four-byte limit of the MIDI standard.

use super::MidiError;
use crate::stream::ByteReader;
use std::io::Write;

/// Longest encoding of a 64-bit value.
pub const MAX_VLQ_LEN: usize = 10;

/// Encodes `value` into a fixed buffer.
///
/// # Returns
///
/// The buffer and the number of leading bytes in use
fn encode(value: u64) -> ([u8; MAX_VLQ_LEN], usize) {
    let mut groups = [0u8; MAX_VLQ_LEN];
    let mut count = 0;
    let mut temp = value;

    loop {
        groups[count] = (temp & 0x7F) as u8;
        count += 1;
        temp >>= 7;
        if temp == 0 {
            break;
        }
    }

    // Groups were collected least significant first
    let mut encoded = [0u8; MAX_VLQ_LEN];
    for (i, &group) in groups[..count].iter().rev().enumerate() {
        encoded[i] = if i < count - 1 { group | 0x80 } else { group };
    }
    (encoded, count)
}

/// Writes a variable-length quantity.
///
/// # Arguments
///
/// * `value` - The value to encode
/// * `writer` - Destination
///
/// # Errors
///
/// Returns an I/O error if the writer does not accept every byte
pub fn write_vlq<W: Write>(value: u64, writer: &mut W) -> std::io::Result<()> {
    let (bytes, len) = encode(value);
    writer.write_all(&bytes[..len])
}

/// Number of bytes [`write_vlq`] produces for `value`.
pub fn vlq_len(value: u64) -> usize {
    encode(value).1
}

/// Reads a variable-length quantity.
///
/// # Errors
///
/// Fails if the stream ends before a terminating byte, or if the value
/// overflows 64 bits.
pub fn read_vlq(reader: &mut ByteReader<'_>) -> Result<u64, MidiError> {
    let mut value: u64 = 0;
    loop {
        let byte = reader.read_u8()?;
        if value > (u64::MAX >> 7) {
            return Err(MidiError::VlqOverflow);
        }
        value = (value << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
}
