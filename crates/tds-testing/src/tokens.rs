//! Token stream builders.
//!
//! [`TokenBuilder`] writes little-endian token bodies in either the pre-7.2
//! layout (4-byte row counts, 2-byte user types) or the 7.2+ layout.

use bytes::{BufMut, Bytes, BytesMut};

use crate::utf16;

/// `DONE` tag.
pub const DONE: u8 = 0xFD;
/// `DONEPROC` tag.
pub const DONE_PROC: u8 = 0xFE;
/// `DONEINPROC` tag.
pub const DONE_IN_PROC: u8 = 0xFF;
/// `COLMETADATA` tag.
pub const COL_METADATA: u8 = 0x81;
/// `ROW` tag.
pub const ROW: u8 = 0xD1;
/// `NBCROW` tag.
pub const NBC_ROW: u8 = 0xD2;
/// `LOGINACK` tag.
pub const LOGIN_ACK: u8 = 0xAD;
/// `ENVCHANGE` tag.
pub const ENV_CHANGE: u8 = 0xE3;
/// `RETURNSTATUS` tag.
pub const RETURN_STATUS: u8 = 0x79;
/// `ALTMETADATA` tag.
pub const ALT_METADATA: u8 = 0x88;
/// `ALTROW` tag.
pub const ALT_ROW: u8 = 0xD3;
/// `RETURNVALUE` tag.
pub const RETURN_VALUE: u8 = 0xAC;

/// Latin1_General_CI_AS.
pub const DEFAULT_COLLATION: [u8; 5] = [0x09, 0x04, 0xD0, 0x00, 0x34];

/// A column description for `COLMETADATA`.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    user_type: u32,
    flags: u16,
    type_info: Vec<u8>,
}

impl Column {
    /// A column with raw `TYPE_INFO` bytes (tag included).
    #[must_use]
    pub fn new(name: impl Into<String>, type_info: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            user_type: 0,
            flags: 0x0001,
            type_info,
        }
    }

    /// `INT`.
    #[must_use]
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, vec![0x38])
    }

    /// Nullable integer of `width` bytes (`INTN`).
    #[must_use]
    pub fn int_n(name: impl Into<String>, width: u8) -> Self {
        Self::new(name, vec![0x26, width])
    }

    /// `NVARCHAR(max_chars)`; `None` for `NVARCHAR(MAX)`.
    #[must_use]
    pub fn nvarchar(name: impl Into<String>, max_chars: Option<u16>) -> Self {
        let max_len = max_chars.map_or(0xFFFF, |n| n * 2);
        let mut info = vec![0xE7];
        info.extend_from_slice(&max_len.to_le_bytes());
        info.extend_from_slice(&DEFAULT_COLLATION);
        Self::new(name, info)
    }

    /// Set the raw flags.
    #[must_use]
    pub fn flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    /// Set the user type.
    #[must_use]
    pub fn user_type(mut self, user_type: u32) -> Self {
        self.user_type = user_type;
        self
    }
}

/// Appends tokens to a buffer.
#[derive(Debug, Clone, Default)]
pub struct TokenBuilder {
    buf: BytesMut,
    wide: bool,
}

impl TokenBuilder {
    /// Builder for the pre-7.2 layout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder for the 7.2+ layout.
    #[must_use]
    pub fn wide() -> Self {
        Self {
            buf: BytesMut::new(),
            wide: true,
        }
    }

    /// Append raw bytes.
    #[must_use]
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.put_slice(bytes);
        self
    }

    /// `DONE` with the given status, command and row count.
    #[must_use]
    pub fn done(self, status: u16, cur_cmd: u16, row_count: u64) -> Self {
        self.done_family(DONE, status, cur_cmd, row_count)
    }

    /// Any `DONE`-family token.
    #[must_use]
    pub fn done_family(mut self, tag: u8, status: u16, cur_cmd: u16, row_count: u64) -> Self {
        self.buf.put_u8(tag);
        self.buf.put_u16_le(status);
        self.buf.put_u16_le(cur_cmd);
        if self.wide {
            self.buf.put_u64_le(row_count);
        } else {
            self.buf.put_u32_le(row_count as u32);
        }
        self
    }

    /// `RETURNSTATUS`.
    #[must_use]
    pub fn return_status(mut self, value: i32) -> Self {
        self.buf.put_u8(RETURN_STATUS);
        self.buf.put_i32_le(value);
        self
    }

    /// `LOGINACK` for a 7.x server announcing `version_code`.
    #[must_use]
    pub fn login_ack(self, version_code: u32, program: &str) -> Self {
        let name = utf16(program);
        let mut body = Vec::with_capacity(10 + name.len());
        body.push(0x01);
        body.extend_from_slice(&version_code.to_be_bytes());
        body.push((name.len() / 2) as u8);
        body.extend_from_slice(&name);
        body.extend_from_slice(&[16, 0, 0x07, 0xD0]);
        self.length_prefixed(LOGIN_ACK, &body)
    }

    /// `ENVCHANGE` of type 1 (database).
    #[must_use]
    pub fn env_change_database(self, new: &str, old: &str) -> Self {
        let mut body = vec![0x01];
        for value in [new, old] {
            let text = utf16(value);
            body.push((text.len() / 2) as u8);
            body.extend_from_slice(&text);
        }
        self.length_prefixed(ENV_CHANGE, &body)
    }

    /// A token with a 2-byte length prefix.
    ///
    /// # Panics
    ///
    /// Panics if `body` does not fit a 16-bit length.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn length_prefixed(mut self, tag: u8, body: &[u8]) -> Self {
        self.buf.put_u8(tag);
        self.buf
            .put_u16_le(u16::try_from(body.len()).expect("token body too large"));
        self.buf.put_slice(body);
        self
    }

    /// `COLMETADATA` describing `columns`.
    #[must_use]
    pub fn col_metadata(mut self, columns: &[Column]) -> Self {
        self.buf.put_u8(COL_METADATA);
        self.buf.put_u16_le(columns.len() as u16);
        for column in columns {
            self.put_column(column);
        }
        self
    }

    /// `ALTMETADATA` for compute clause `id`; each entry is an aggregate
    /// operator, its operand column and the compute column.
    #[must_use]
    pub fn alt_metadata(
        mut self,
        id: u16,
        by_columns: &[u16],
        columns: &[(u8, u16, Column)],
    ) -> Self {
        self.buf.put_u8(ALT_METADATA);
        self.buf.put_u16_le(columns.len() as u16);
        self.buf.put_u16_le(id);
        self.buf.put_u8(by_columns.len() as u8);
        for by in by_columns {
            self.buf.put_u16_le(*by);
        }
        for (op, operand, column) in columns {
            self.buf.put_u8(*op);
            self.buf.put_u16_le(*operand);
            self.put_column(column);
        }
        self
    }

    /// `ALTROW` for compute clause `id` from pre-encoded values.
    #[must_use]
    pub fn alt_row(mut self, id: u16, values: &[Vec<u8>]) -> Self {
        self.buf.put_u8(ALT_ROW);
        self.buf.put_u16_le(id);
        for value in values {
            self.buf.put_slice(value);
        }
        self
    }

    /// `RETURNVALUE` for an output parameter described by `column`.
    ///
    /// `value` is written as given, so a value that disagrees with the type
    /// can be produced.
    #[must_use]
    pub fn return_value(mut self, ordinal: u16, column: &Column, value: &[u8]) -> Self {
        self.buf.put_u8(RETURN_VALUE);
        self.buf.put_u16_le(ordinal);
        let name = utf16(&column.name);
        self.buf.put_u8((name.len() / 2) as u8);
        self.buf.put_slice(&name);
        self.buf.put_u8(0x01);
        self.put_user_type(column.user_type);
        self.buf.put_u16_le(column.flags);
        self.buf.put_slice(&column.type_info);
        self.buf.put_slice(value);
        self
    }

    /// `COLMETADATA` with the no-metadata count.
    #[must_use]
    pub fn no_metadata(mut self) -> Self {
        self.buf.put_u8(COL_METADATA);
        self.buf.put_u16_le(0xFFFF);
        self
    }

    /// `ROW` from pre-encoded values.
    #[must_use]
    pub fn row(mut self, values: &[Vec<u8>]) -> Self {
        self.buf.put_u8(ROW);
        for value in values {
            self.buf.put_slice(value);
        }
        self
    }

    /// `NBCROW` with an explicit bitmap and the values of non-null columns.
    #[must_use]
    pub fn nbc_row(mut self, bitmap: &[u8], values: &[Vec<u8>]) -> Self {
        self.buf.put_u8(NBC_ROW);
        self.buf.put_slice(bitmap);
        for value in values {
            self.buf.put_slice(value);
        }
        self
    }

    /// Finished token stream.
    #[must_use]
    pub fn build(self) -> Bytes {
        self.buf.freeze()
    }

    fn put_user_type(&mut self, user_type: u32) {
        if self.wide {
            self.buf.put_u32_le(user_type);
        } else {
            self.buf.put_u16_le(user_type as u16);
        }
    }

    fn put_column(&mut self, column: &Column) {
        self.put_user_type(column.user_type);
        self.buf.put_u16_le(column.flags);
        self.buf.put_slice(&column.type_info);
        let name = utf16(&column.name);
        self.buf.put_u8((name.len() / 2) as u8);
        self.buf.put_slice(&name);
    }
}

/// Value encoders matching the [`Column`] constructors.
pub mod values {
    /// `INT` value.
    #[must_use]
    pub fn int(value: i32) -> Vec<u8> {
        value.to_le_bytes().to_vec()
    }

    /// `INTN` value of `width` bytes; `None` is NULL.
    #[must_use]
    pub fn int_n(value: Option<i64>, width: u8) -> Vec<u8> {
        match value {
            None => vec![0],
            Some(v) => {
                let mut out = vec![width];
                out.extend_from_slice(&v.to_le_bytes()[..usize::from(width)]);
                out
            }
        }
    }

    /// Sized `NVARCHAR` value; `None` is NULL.
    #[must_use]
    pub fn nvarchar(value: Option<&str>) -> Vec<u8> {
        match value {
            None => vec![0xFF, 0xFF],
            Some(s) => {
                let text = crate::utf16(s);
                let mut out = (text.len() as u16).to_le_bytes().to_vec();
                out.extend_from_slice(&text);
                out
            }
        }
    }

    /// PLP value split into the given chunks; `None` is NULL.
    #[must_use]
    pub fn plp(chunks: Option<&[&[u8]]>) -> Vec<u8> {
        let Some(chunks) = chunks else {
            return u64::MAX.to_le_bytes().to_vec();
        };
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        let mut out = (total as u64).to_le_bytes().to_vec();
        for chunk in chunks {
            out.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
            out.extend_from_slice(chunk);
        }
        out.extend_from_slice(&0u32.to_le_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_done_widths() {
        assert_eq!(TokenBuilder::new().done(0, 0, 5).build().len(), 9);
        assert_eq!(TokenBuilder::wide().done(0, 0, 5).build().len(), 13);
    }

    #[test]
    fn test_col_metadata_layout() {
        let bytes = TokenBuilder::new()
            .col_metadata(&[Column::int("a")])
            .build();
        assert_eq!(
            &bytes[..],
            &[0x81, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x38, 0x01, b'a', 0x00]
        );
    }

    #[test]
    fn test_alt_metadata_layout() {
        let bytes = TokenBuilder::new()
            .alt_metadata(2, &[1], &[(0x4D, 1, Column::int("s"))])
            .build();
        assert_eq!(
            &bytes[..],
            &[
                0x88, 0x01, 0x00, 0x02, 0x00, 0x01, 0x01, 0x00, 0x4D, 0x01, 0x00, 0x00, 0x00,
                0x01, 0x00, 0x38, 0x01, b's', 0x00
            ]
        );
    }
}
