//! RIFF chunk tree parsing.
//!
//! A chunk is a 4-byte ID, a little-endian `u32` length and a payload padded
//! to an even length. `RIFF` and `LIST` chunks start their payload with a
//! 4-byte form type followed by nested chunks.

use super::WavetableError;
use crate::stream::{ByteOrderResolver, ByteReader, Endianness};

/// A parsed chunk borrowing its payload from the file buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub id: [u8; 4],
    /// Form type of `RIFF` and `LIST` chunks.
    pub form_type: Option<[u8; 4]>,
    /// Payload after the form type, if any.
    pub data: &'a [u8],
    pub children: Vec<Chunk<'a>>,
}

impl<'a> Chunk<'a> {
    /// Parses a whole RIFF file.
    ///
    /// # Errors
    ///
    /// Fails if the buffer doesn't start with a `RIFF` chunk or any chunk
    /// runs past the end of its parent
    pub fn parse(data: &'a [u8]) -> Result<Chunk<'a>, WavetableError> {
        let mut reader = ByteReader::new(data);
        let chunk = Self::read(&mut reader)?;
        if &chunk.id != b"RIFF" {
            return Err(WavetableError::UnexpectedChunk {
                expected: "RIFF",
                found: chunk.name(),
            });
        }
        Ok(chunk)
    }

    fn read(reader: &mut ByteReader<'a>) -> Result<Chunk<'a>, WavetableError> {
        let order = ByteOrderResolver::for_stream(Endianness::Little);
        let id = reader.read_array::<4>()?;
        let length = reader.read_u32(order)? as usize;
        let payload = reader.read_bytes(length)?;
        if length % 2 == 1 && reader.can_read() {
            reader.skip(1)?;
        }

        if &id != b"RIFF" && &id != b"LIST" {
            return Ok(Chunk {
                id,
                form_type: None,
                data: payload,
                children: Vec::new(),
            });
        }

        let mut nested = ByteReader::new(payload);
        let form_type = nested.read_array::<4>()?;
        let data = &payload[nested.offset()..];
        let mut children = Vec::new();
        while nested.can_read() {
            children.push(Self::read(&mut nested)?);
        }
        Ok(Chunk {
            id,
            form_type: Some(form_type),
            data,
            children,
        })
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.id).into_owned()
    }

    pub fn form_name(&self) -> Option<String> {
        self.form_type
            .map(|form| String::from_utf8_lossy(&form).into_owned())
    }

    /// Depth-first search for the first chunk with an ID, this one included.
    pub fn find(&self, id: &[u8; 4]) -> Option<&Chunk<'a>> {
        if &self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Depth-first search for the first `LIST` chunk with a form type.
    pub fn find_list(&self, form_type: &[u8; 4]) -> Option<&Chunk<'a>> {
        if &self.id == b"LIST" && self.form_type.as_ref() == Some(form_type) {
            return Some(self);
        }
        self.children
            .iter()
            .find_map(|child| child.find_list(form_type))
    }
}
