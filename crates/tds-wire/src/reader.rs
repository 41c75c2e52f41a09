//! Bounds-checked cursor over a borrowed PDU.
//!
//! All token and value decoding goes through [`Reader`], which tracks its own
//! position and reports failures with the absolute offset inside the PDU.

use crate::error::ProtocolError;

/// Byte order for multi-byte token-stream fields.
///
/// TDS 7.x is always little-endian. Legacy (TDS 4.2/5.0) servers on
/// big-endian hosts send token fields big-endian; the frame header is
/// big-endian regardless.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ByteOrder {
    /// Least significant byte first.
    #[default]
    LittleEndian,
    /// Most significant byte first.
    BigEndian,
}

/// A cursor over a byte slice.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
    order: ByteOrder,
}

macro_rules! read_int {
    ($name:ident, $le:ident, $be:ident, $ty:ty) => {
        /// Read a value in the reader's byte order.
        pub fn $name(&mut self) -> Result<$ty, ProtocolError> {
            match self.order {
                ByteOrder::LittleEndian => self.$le(),
                ByteOrder::BigEndian => self.$be(),
            }
        }

        /// Read a little-endian value.
        pub fn $le(&mut self) -> Result<$ty, ProtocolError> {
            let bytes = self.read_array()?;
            Ok(<$ty>::from_le_bytes(bytes))
        }

        /// Read a big-endian value.
        pub fn $be(&mut self) -> Result<$ty, ProtocolError> {
            let bytes = self.read_array()?;
            Ok(<$ty>::from_be_bytes(bytes))
        }
    };
}

impl<'a> Reader<'a> {
    /// Create a little-endian reader over `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
            order: ByteOrder::LittleEndian,
        }
    }

    /// Create a little-endian reader over `data`, which starts at `base`
    /// within the enclosing PDU.
    #[must_use]
    pub fn with_offset(data: &'a [u8], base: usize) -> Self {
        Self {
            base,
            ..Self::new(data)
        }
    }

    /// Set the byte order used by the order-dependent read methods.
    #[must_use]
    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }

    /// Byte order used by the order-dependent read methods.
    #[must_use]
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Absolute offset of the next byte.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Bytes left to read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Whether every byte has been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// The unread part of the input.
    #[must_use]
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn ensure(&self, needed: usize) -> Result<(), ProtocolError> {
        if self.remaining() < needed {
            return Err(ProtocolError::UnexpectedEof {
                offset: self.offset(),
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    /// Look at the next byte without consuming it.
    #[must_use]
    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        let [b] = self.read_array()?;
        Ok(b)
    }

    /// Read one signed byte.
    pub fn read_i8(&mut self) -> Result<i8, ProtocolError> {
        Ok(self.read_u8()? as i8)
    }

    read_int!(read_u16, read_u16_le, read_u16_be, u16);
    read_int!(read_i16, read_i16_le, read_i16_be, i16);
    read_int!(read_u32, read_u32_le, read_u32_be, u32);
    read_int!(read_i32, read_i32_le, read_i32_be, i32);
    read_int!(read_u64, read_u64_le, read_u64_be, u64);
    read_int!(read_i64, read_i64_le, read_i64_be, i64);

    /// Read an IEEE-754 single in the reader's byte order.
    pub fn read_f32(&mut self) -> Result<f32, ProtocolError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Read an IEEE-754 double in the reader's byte order.
    pub fn read_f64(&mut self) -> Result<f64, ProtocolError> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Read an unsigned little-endian integer of 1 to 8 bytes.
    pub fn read_uint_le(&mut self, width: usize) -> Result<u64, ProtocolError> {
        let bytes = self.read_bytes(width.min(8))?;
        Ok(bytes
            .iter()
            .rev()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
    }

    /// Borrow the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        self.ensure(len)?;
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    /// Skip `len` bytes.
    pub fn skip(&mut self, len: usize) -> Result<(), ProtocolError> {
        self.ensure(len)?;
        self.pos += len;
        Ok(())
    }

    /// Split off the next `len` bytes as an independent reader.
    ///
    /// The child keeps reporting absolute offsets and inherits the byte order.
    pub fn sub_reader(&mut self, len: usize) -> Result<Reader<'a>, ProtocolError> {
        let base = self.offset();
        let data = self.read_bytes(len)?;
        Ok(Reader {
            data,
            pos: 0,
            base,
            order: self.order,
        })
    }

    /// Read `char_count` UTF-16LE code units and convert to a `String`.
    pub fn read_utf16(&mut self, char_count: usize) -> Result<String, ProtocolError> {
        let bytes = self.read_bytes(char_count * 2)?;
        decode_utf16le(bytes)
    }

    /// Read a `B_VARCHAR`: a 1-byte character count then UTF-16LE text.
    pub fn read_b_varchar(&mut self) -> Result<String, ProtocolError> {
        let len = self.read_u8()? as usize;
        self.read_utf16(len)
    }

    /// Read a `US_VARCHAR`: a 2-byte character count then UTF-16LE text.
    pub fn read_us_varchar(&mut self) -> Result<String, ProtocolError> {
        let len = self.read_u16()? as usize;
        self.read_utf16(len)
    }
}

/// Decode UTF-16LE bytes into a `String`.
pub fn decode_utf16le(data: &[u8]) -> Result<String, ProtocolError> {
    if data.len() % 2 != 0 {
        return Err(ProtocolError::StringEncoding(
            "UTF-16 data must have even length".to_string(),
        ));
    }

    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
        .collect();

    String::from_utf16(&units).map_err(|e| ProtocolError::StringEncoding(e.to_string()))
}
