//! TDS data type definitions.
//!
//! This module defines the base types as they appear on the wire and the
//! fixed lookup from a base-type tag to its length encoding.

use crate::version::TdsVersion;

/// TDS data type identifiers.
///
/// These correspond to the type bytes sent in column metadata and parameter definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeId {
    // Fixed-length types (no length prefix)
    /// Null type.
    Null = 0x1F,
    /// 8-bit unsigned integer.
    Int1 = 0x30,
    /// Bit (boolean).
    Bit = 0x32,
    /// 16-bit signed integer.
    Int2 = 0x34,
    /// 32-bit signed integer.
    Int4 = 0x38,
    /// 64-bit signed integer.
    Int8 = 0x7F,
    /// 32-bit floating point.
    Float4 = 0x3B,
    /// 64-bit floating point.
    Float8 = 0x3E,
    /// 8-byte money.
    Money = 0x3C,
    /// 4-byte money.
    Money4 = 0x7A,
    /// 8-byte datetime.
    DateTime = 0x3D,
    /// 4-byte small datetime.
    DateTime4 = 0x3A,

    // Byte-length types
    /// Variable-length GUID.
    Guid = 0x24,
    /// Nullable integer.
    IntN = 0x26,
    /// Legacy decimal.
    Decimal = 0x37,
    /// Legacy numeric.
    Numeric = 0x3F,
    /// Nullable bit.
    BitN = 0x68,
    /// Decimal.
    DecimalN = 0x6A,
    /// Numeric.
    NumericN = 0x6C,
    /// Nullable float.
    FloatN = 0x6D,
    /// Nullable money.
    MoneyN = 0x6E,
    /// Nullable datetime.
    DateTimeN = 0x6F,
    /// Legacy fixed-length character.
    Char = 0x2F,
    /// Legacy variable-length character.
    VarChar = 0x27,
    /// Legacy fixed-length binary.
    Binary = 0x2D,
    /// Legacy variable-length binary.
    VarBinary = 0x25,
    /// Date (3 bytes).
    Date = 0x28,
    /// Time with variable scale.
    Time = 0x29,
    /// DateTime2 with variable scale.
    DateTime2 = 0x2A,
    /// DateTimeOffset with variable scale.
    DateTimeOffset = 0x2B,

    // Unsigned-short-length types
    /// Large variable-length character.
    BigVarChar = 0xA7,
    /// Large variable-length binary.
    BigVarBinary = 0xA5,
    /// Large fixed-length character.
    BigChar = 0xAF,
    /// Large fixed-length binary.
    BigBinary = 0xAD,
    /// Fixed-length Unicode character.
    NChar = 0xEF,
    /// Variable-length Unicode character.
    NVarChar = 0xE7,
    /// CLR user-defined type.
    Udt = 0xF0,
    /// XML.
    Xml = 0xF1,

    // Long-length types
    /// Text.
    Text = 0x23,
    /// Image.
    Image = 0x22,
    /// NText.
    NText = 0x63,
    /// SQL Variant.
    Variant = 0x62,
}

/// How a value of a given type is length-prefixed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    /// Exactly this many bytes, no NULL representation.
    FixedLen(usize),
    /// 1-byte length prefix, `0x00` is NULL.
    ByteLen,
    /// 2-byte length prefix, `0xFFFF` is NULL.
    UShortLen,
    /// 4-byte length prefix, `0xFFFFFFFF` is NULL.
    LongLen,
    /// 8-byte total length followed by zero-terminated chunks.
    StreamingPlp,
}

impl TypeId {
    /// Create a type ID from a raw byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x1F => Some(Self::Null),
            0x30 => Some(Self::Int1),
            0x32 => Some(Self::Bit),
            0x34 => Some(Self::Int2),
            0x38 => Some(Self::Int4),
            0x7F => Some(Self::Int8),
            0x3B => Some(Self::Float4),
            0x3E => Some(Self::Float8),
            0x3C => Some(Self::Money),
            0x7A => Some(Self::Money4),
            0x3D => Some(Self::DateTime),
            0x3A => Some(Self::DateTime4),
            0x24 => Some(Self::Guid),
            0x26 => Some(Self::IntN),
            0x37 => Some(Self::Decimal),
            0x3F => Some(Self::Numeric),
            0x68 => Some(Self::BitN),
            0x6A => Some(Self::DecimalN),
            0x6C => Some(Self::NumericN),
            0x6D => Some(Self::FloatN),
            0x6E => Some(Self::MoneyN),
            0x6F => Some(Self::DateTimeN),
            0x2F => Some(Self::Char),
            0x27 => Some(Self::VarChar),
            0x2D => Some(Self::Binary),
            0x25 => Some(Self::VarBinary),
            0x28 => Some(Self::Date),
            0x29 => Some(Self::Time),
            0x2A => Some(Self::DateTime2),
            0x2B => Some(Self::DateTimeOffset),
            0xA7 => Some(Self::BigVarChar),
            0xA5 => Some(Self::BigVarBinary),
            0xAF => Some(Self::BigChar),
            0xAD => Some(Self::BigBinary),
            0xEF => Some(Self::NChar),
            0xE7 => Some(Self::NVarChar),
            0xF0 => Some(Self::Udt),
            0xF1 => Some(Self::Xml),
            0x23 => Some(Self::Text),
            0x22 => Some(Self::Image),
            0x63 => Some(Self::NText),
            0x62 => Some(Self::Variant),
            _ => None,
        }
    }

    /// Value encoding before any `TYPE_INFO` reclassification.
    ///
    /// `XML` and `UDT` values are always streamed. The variable-length
    /// unsigned-short types start as [`TypeCategory::UShortLen`] and become
    /// [`TypeCategory::StreamingPlp`] when their declared maximum length is
    /// `0xFFFF`.
    #[must_use]
    pub const fn category(self) -> TypeCategory {
        match self {
            Self::Null => TypeCategory::FixedLen(0),
            Self::Int1 | Self::Bit => TypeCategory::FixedLen(1),
            Self::Int2 => TypeCategory::FixedLen(2),
            Self::Int4 | Self::Float4 | Self::Money4 | Self::DateTime4 => {
                TypeCategory::FixedLen(4)
            }
            Self::Int8 | Self::Float8 | Self::Money | Self::DateTime => TypeCategory::FixedLen(8),
            Self::Guid
            | Self::IntN
            | Self::Decimal
            | Self::Numeric
            | Self::BitN
            | Self::DecimalN
            | Self::NumericN
            | Self::FloatN
            | Self::MoneyN
            | Self::DateTimeN
            | Self::Char
            | Self::VarChar
            | Self::Binary
            | Self::VarBinary
            | Self::Date
            | Self::Time
            | Self::DateTime2
            | Self::DateTimeOffset => TypeCategory::ByteLen,
            Self::BigVarChar
            | Self::BigVarBinary
            | Self::BigChar
            | Self::BigBinary
            | Self::NChar
            | Self::NVarChar => TypeCategory::UShortLen,
            Self::Xml | Self::Udt => TypeCategory::StreamingPlp,
            Self::Text | Self::Image | Self::NText | Self::Variant => TypeCategory::LongLen,
        }
    }

    /// Width of the maximum-length field in `TYPE_INFO`.
    #[must_use]
    pub const fn type_info_length_width(self) -> usize {
        match self {
            Self::Date | Self::Time | Self::DateTime2 | Self::DateTimeOffset | Self::Xml => 0,
            Self::Udt => 2,
            _ => match self.category() {
                TypeCategory::FixedLen(_) | TypeCategory::StreamingPlp => 0,
                TypeCategory::ByteLen => 1,
                TypeCategory::UShortLen => 2,
                TypeCategory::LongLen => 4,
            },
        }
    }

    /// Whether the type may switch to PLP encoding with a `0xFFFF` max length.
    #[must_use]
    pub const fn supports_plp(self) -> bool {
        matches!(
            self,
            Self::BigVarChar | Self::BigVarBinary | Self::NVarChar
        )
    }

    /// Whether `TYPE_INFO` carries a 5-byte collation.
    #[must_use]
    pub const fn has_collation(self) -> bool {
        matches!(
            self,
            Self::BigVarChar | Self::BigChar | Self::NChar | Self::NVarChar | Self::Text | Self::NText
        )
    }

    /// Whether `TYPE_INFO` carries precision and scale.
    #[must_use]
    pub const fn has_precision(self) -> bool {
        matches!(
            self,
            Self::Decimal | Self::Numeric | Self::DecimalN | Self::NumericN
        )
    }

    /// Whether `TYPE_INFO` carries a scale only.
    #[must_use]
    pub const fn has_scale_only(self) -> bool {
        matches!(self, Self::Time | Self::DateTime2 | Self::DateTimeOffset)
    }

    /// Whether values use the legacy text-pointer layout.
    #[must_use]
    pub const fn is_text_pointer(self) -> bool {
        matches!(self, Self::Text | Self::Image | Self::NText)
    }

    /// Check if this is a narrow character type.
    #[must_use]
    pub const fn is_narrow_text(self) -> bool {
        matches!(
            self,
            Self::Char | Self::VarChar | Self::BigChar | Self::BigVarChar | Self::Text
        )
    }

    /// Get the fixed size of this type in bytes, if applicable.
    #[must_use]
    pub const fn fixed_size(self) -> Option<usize> {
        match self.category() {
            TypeCategory::FixedLen(n) => Some(n),
            _ => None,
        }
    }

    /// Display name as used in SQL.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int1 => "tinyint",
            Self::Bit | Self::BitN => "bit",
            Self::Int2 => "smallint",
            Self::Int4 => "int",
            Self::Int8 => "bigint",
            Self::IntN => "intn",
            Self::Float4 => "real",
            Self::Float8 => "float",
            Self::FloatN => "floatn",
            Self::Money => "money",
            Self::Money4 => "smallmoney",
            Self::MoneyN => "moneyn",
            Self::DateTime => "datetime",
            Self::DateTime4 => "smalldatetime",
            Self::DateTimeN => "datetimen",
            Self::Guid => "uniqueidentifier",
            Self::Decimal | Self::DecimalN => "decimal",
            Self::Numeric | Self::NumericN => "numeric",
            Self::Char | Self::BigChar => "char",
            Self::VarChar | Self::BigVarChar => "varchar",
            Self::Binary | Self::BigBinary => "binary",
            Self::VarBinary | Self::BigVarBinary => "varbinary",
            Self::NChar => "nchar",
            Self::NVarChar => "nvarchar",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime2 => "datetime2",
            Self::DateTimeOffset => "datetimeoffset",
            Self::Udt => "udt",
            Self::Xml => "xml",
            Self::Text => "text",
            Self::Image => "image",
            Self::NText => "ntext",
            Self::Variant => "sql_variant",
        }
    }
}

/// Column flags from column metadata.
///
/// Bits that the negotiated version does not define are left unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnFlags {
    /// Raw flag word as received.
    pub bits: u16,
    /// Column is nullable.
    pub nullable: bool,
    /// Column allows case-sensitive comparison.
    pub case_sensitive: bool,
    /// Column is updateable.
    pub updateable: Updateable,
    /// Column is an identity column.
    pub identity: bool,
    /// Column is computed (7.2+).
    pub computed: bool,
    /// Column has fixed-length CLR type (7.2+).
    pub fixed_len_clr_type: bool,
    /// Column is a sparse column set (7.3B+).
    pub sparse_column_set: bool,
    /// Column is encrypted (7.4+).
    pub encrypted: bool,
    /// Column is hidden (7.2+).
    pub hidden: bool,
    /// Column is a key column (7.2+).
    pub key: bool,
    /// Column is nullable but unknown at query time (7.2+).
    pub nullable_unknown: bool,
}

/// Update mode for a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Updateable {
    /// Column is read-only.
    #[default]
    ReadOnly,
    /// Column is read-write.
    ReadWrite,
    /// Updateability unknown.
    Unknown,
}

impl ColumnFlags {
    /// Parse the 2-byte flags field as defined for `version`.
    #[must_use]
    pub fn from_bits(bits: u16, version: TdsVersion) -> Self {
        let v72 = version.at_least(TdsVersion::V7_2);
        let v73b = version.at_least(TdsVersion::V7_3B);
        let v74 = version.at_least(TdsVersion::V7_4);
        Self {
            bits,
            nullable: (bits & 0x0001) != 0,
            case_sensitive: (bits & 0x0002) != 0,
            updateable: match (bits >> 2) & 0x03 {
                0 => Updateable::ReadOnly,
                1 => Updateable::ReadWrite,
                _ => Updateable::Unknown,
            },
            identity: (bits & 0x0010) != 0,
            computed: v72 && (bits & 0x0020) != 0,
            fixed_len_clr_type: v72 && (bits & 0x0100) != 0,
            sparse_column_set: v73b && (bits & 0x0200) != 0,
            encrypted: v74 && (bits & 0x0400) != 0,
            hidden: v72 && (bits & 0x2000) != 0,
            key: v72 && (bits & 0x4000) != 0,
            nullable_unknown: v72 && (bits & 0x8000) != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_id_from_u8() {
        assert_eq!(TypeId::from_u8(0x38), Some(TypeId::Int4));
        assert_eq!(TypeId::from_u8(0xE7), Some(TypeId::NVarChar));
        assert_eq!(TypeId::from_u8(0x99), None);
    }

    #[test]
    fn test_categories() {
        assert_eq!(TypeId::Int4.category(), TypeCategory::FixedLen(4));
        assert_eq!(TypeId::IntN.category(), TypeCategory::ByteLen);
        assert_eq!(TypeId::NVarChar.category(), TypeCategory::UShortLen);
        assert_eq!(TypeId::Image.category(), TypeCategory::LongLen);
        assert_eq!(TypeId::Xml.category(), TypeCategory::StreamingPlp);
        assert_eq!(TypeId::Udt.category(), TypeCategory::StreamingPlp);
        assert_eq!(TypeId::Null.fixed_size(), Some(0));
        assert_eq!(TypeId::Date.fixed_size(), None);
    }

    #[test]
    fn test_type_info_length_width() {
        assert_eq!(TypeId::Int8.type_info_length_width(), 0);
        assert_eq!(TypeId::DecimalN.type_info_length_width(), 1);
        assert_eq!(TypeId::Date.type_info_length_width(), 0);
        assert_eq!(TypeId::Time.type_info_length_width(), 0);
        assert_eq!(TypeId::BigVarChar.type_info_length_width(), 2);
        assert_eq!(TypeId::Text.type_info_length_width(), 4);
    }

    #[test]
    fn test_flags_gated_by_version() {
        // computed | sparse | encrypted | key
        let bits = 0x0020 | 0x0200 | 0x0400 | 0x4000 | 0x0001;

        let old = ColumnFlags::from_bits(bits, TdsVersion::V7_1);
        assert!(old.nullable);
        assert!(!old.computed);
        assert!(!old.sparse_column_set);
        assert!(!old.encrypted);
        assert!(!old.key);

        let v73a = ColumnFlags::from_bits(bits, TdsVersion::V7_3A);
        assert!(v73a.computed);
        assert!(v73a.key);
        assert!(!v73a.sparse_column_set);

        let v74 = ColumnFlags::from_bits(bits, TdsVersion::V7_4);
        assert!(v74.sparse_column_set);
        assert!(v74.encrypted);
        assert_eq!(v74.bits, bits);
    }

    #[test]
    fn test_updateable_bits() {
        let flags = ColumnFlags::from_bits(0x0004, TdsVersion::V7_4);
        assert_eq!(flags.updateable, Updateable::ReadWrite);
        let flags = ColumnFlags::from_bits(0x0008, TdsVersion::V7_4);
        assert_eq!(flags.updateable, Updateable::Unknown);
    }
}
