//! Sequential byte reading and byte-order resolution.
//!
//! [`ByteReader`] is a single-cursor reader over an in-memory buffer with
//! peek and rewind support. [`ByteOrderResolver`] swaps multi-byte integers
//! when the stream's endianness differs from the host's.

/// Errors raised while reading a byte stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Fewer bytes were available than a read requested.
    #[error("Unexpected end of stream at offset {offset}: needed {requested} byte(s), {available} available.")]
    UnexpectedEnd {
        offset: usize,
        requested: usize,
        available: usize,
    },

    /// A seek landed outside the buffer.
    #[error("Read offset {offset} is beyond the stream length {len}.")]
    OffsetOutOfRange { offset: usize, len: usize },
}

/// Byte order of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    /// The host machine's byte order.
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            Endianness::Little
        } else {
            Endianness::Big
        }
    }
}

/// Integers whose byte order can be reversed.
pub trait Swappable: Copy {
    fn swap(self) -> Self;
}

macro_rules! impl_swappable {
    ($($ty:ty),*) => {
        $(impl Swappable for $ty {
            #[inline]
            fn swap(self) -> Self {
                self.swap_bytes()
            }
        })*
    };
}

impl_swappable!(u16, u32, u64, i16, i32, i64);

/// Conditionally swaps values read in host order into stream order, or back.
///
/// Stateless apart from the single `swaps_needed` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteOrderResolver {
    swaps_needed: bool,
}

impl ByteOrderResolver {
    pub fn new(swaps_needed: bool) -> Self {
        Self { swaps_needed }
    }

    /// Resolver for a stream stored in the given byte order.
    pub fn for_stream(order: Endianness) -> Self {
        Self::new(order != Endianness::native())
    }

    pub fn swaps_needed(&self) -> bool {
        self.swaps_needed
    }

    /// Returns `value` with its bytes reversed if a swap is needed.
    #[inline]
    pub fn resolve<T: Swappable>(&self, value: T) -> T {
        if self.swaps_needed {
            value.swap()
        } else {
            value
        }
    }

    /// Reverses `buffer` in place if a swap is needed.
    pub fn resolve_buffer(&self, buffer: &mut [u8]) {
        if self.swaps_needed {
            buffer.reverse();
        }
    }
}

/// Single-cursor reader over a borrowed byte buffer.
///
/// Every read either returns exactly the requested bytes or fails; there is
/// no partial success.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Current read offset.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Moves the read cursor.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::OffsetOutOfRange`] if `offset` is past the end
    pub fn set_offset(&mut self, offset: usize) -> Result<(), StreamError> {
        if offset > self.data.len() {
            return Err(StreamError::OffsetOutOfRange {
                offset,
                len: self.data.len(),
            });
        }
        self.offset = offset;
        Ok(())
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn can_read(&self) -> bool {
        self.remaining() > 0
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the next byte without consuming it.
    pub fn peek_u8(&self) -> Result<u8, StreamError> {
        self.data
            .get(self.offset)
            .copied()
            .ok_or(StreamError::UnexpectedEnd {
                offset: self.offset,
                requested: 1,
                available: 0,
            })
    }

    pub fn read_u8(&mut self) -> Result<u8, StreamError> {
        let byte = self.peek_u8()?;
        self.offset += 1;
        Ok(byte)
    }

    /// Reads exactly `count` bytes.
    ///
    /// # Arguments
    ///
    /// * `count` - Number of bytes to read
    ///
    /// # Returns
    ///
    /// A slice borrowed from the underlying buffer
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], StreamError> {
        let available = self.remaining();
        if count > available {
            return Err(StreamError::UnexpectedEnd {
                offset: self.offset,
                requested: count,
                available,
            });
        }
        let bytes = &self.data[self.offset..self.offset + count];
        self.offset += count;
        Ok(bytes)
    }

    /// Reads a fixed-size array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], StreamError> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.read_bytes(N)?);
        Ok(array)
    }

    pub fn read_u16(&mut self, order: ByteOrderResolver) -> Result<u16, StreamError> {
        Ok(order.resolve(u16::from_ne_bytes(self.read_array()?)))
    }

    pub fn read_u32(&mut self, order: ByteOrderResolver) -> Result<u32, StreamError> {
        Ok(order.resolve(u32::from_ne_bytes(self.read_array()?)))
    }

    pub fn read_i16(&mut self, order: ByteOrderResolver) -> Result<i16, StreamError> {
        Ok(order.resolve(i16::from_ne_bytes(self.read_array()?)))
    }

    pub fn skip(&mut self, count: usize) -> Result<(), StreamError> {
        self.read_bytes(count).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolver_swaps_when_needed() {
        let swapper = ByteOrderResolver::new(true);
        assert_eq!(swapper.resolve(0x1234u16), 0x3412);
        assert_eq!(swapper.resolve(0x1122_3344u32), 0x4433_2211);
        assert_eq!(swapper.resolve(0x0102i16), 0x0201);
        assert_eq!(
            swapper.resolve(0x0102_0304_0506_0708u64),
            0x0807_0605_0403_0201
        );

        let passthrough = ByteOrderResolver::new(false);
        assert_eq!(passthrough.resolve(0x1234u16), 0x1234);
    }

    #[test]
    fn test_resolve_buffer() {
        let mut buffer = [1, 2, 3, 4];
        ByteOrderResolver::new(true).resolve_buffer(&mut buffer);
        assert_eq!(buffer, [4, 3, 2, 1]);
        ByteOrderResolver::new(false).resolve_buffer(&mut buffer);
        assert_eq!(buffer, [4, 3, 2, 1]);
    }

    #[test]
    fn test_read_big_and_little_endian() {
        let data = [0x00, 0x06, 0x06, 0x00];
        let mut reader = ByteReader::new(&data);
        let big = ByteOrderResolver::for_stream(Endianness::Big);
        let little = ByteOrderResolver::for_stream(Endianness::Little);
        assert_eq!(reader.read_u16(big).unwrap(), 6);
        assert_eq!(reader.read_u16(little).unwrap(), 6);
        assert!(!reader.can_read());
    }

    #[test]
    fn test_short_read_fails_without_consuming() {
        let data = [1, 2, 3];
        let mut reader = ByteReader::new(&data);
        reader.read_u8().unwrap();
        let err = reader.read_bytes(4).unwrap_err();
        assert_eq!(
            err,
            StreamError::UnexpectedEnd {
                offset: 1,
                requested: 4,
                available: 2
            }
        );
        assert_eq!(reader.offset(), 1);
    }

    #[test]
    fn test_peek_and_rewind() {
        let data = [9, 8, 7];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.peek_u8().unwrap(), 9);
        reader.skip(2).unwrap();
        assert_eq!(reader.read_u8().unwrap(), 7);
        reader.set_offset(0).unwrap();
        assert_eq!(reader.read_u8().unwrap(), 9);
        assert!(reader.set_offset(4).is_err());
    }
}
