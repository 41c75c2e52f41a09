//! `TYPE_INFO` decoding.

use crate::collation::Collation;
use crate::error::ProtocolError;
use crate::layout::MAX_LEN_PLP;
use crate::reader::Reader;
use crate::types::{TypeCategory, TypeId};

/// Largest scale accepted for `TIME`, `DATETIME2` and `DATETIMEOFFSET`.
pub const MAX_TIME_SCALE: u8 = 7;

/// Largest precision accepted for `DECIMAL`/`NUMERIC`.
pub const MAX_DECIMAL_PRECISION: u8 = 38;

/// Type description read from the wire ahead of a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    /// Base type.
    pub type_id: TypeId,
    /// Value encoding, after PLP reclassification.
    pub category: TypeCategory,
    /// Declared maximum length (0 when the type carries none).
    pub max_length: u32,
    /// Precision for decimal/numeric types.
    pub precision: u8,
    /// Scale for decimal/numeric and time-with-scale types.
    pub scale: u8,
    /// Collation for character types.
    pub collation: Option<Collation>,
    /// Schema binding for `XML` columns.
    pub xml_schema: Option<XmlSchema>,
    /// Type identity for CLR user-defined types.
    pub udt: Option<UdtInfo>,
}

/// Schema collection an `XML` column is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlSchema {
    /// Database name.
    pub database: String,
    /// Owning schema.
    pub owning_schema: String,
    /// XML schema collection.
    pub collection: String,
}

/// Identity of a CLR user-defined type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdtInfo {
    /// Database name.
    pub database: String,
    /// Schema name.
    pub schema: String,
    /// Type name.
    pub type_name: String,
    /// Assembly-qualified CLR type name.
    pub assembly_qualified_name: String,
}

impl TypeInfo {
    /// A bare description of `type_id` with no length, precision or collation.
    #[must_use]
    pub fn new(type_id: TypeId) -> Self {
        Self {
            type_id,
            category: type_id.category(),
            max_length: 0,
            precision: 0,
            scale: 0,
            collation: None,
            xml_schema: None,
            udt: None,
        }
    }

    /// Read a base-type tag and its type-specific fields.
    pub fn decode(src: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let offset = src.offset();
        let tag = src.read_u8()?;
        let type_id =
            TypeId::from_u8(tag).ok_or(ProtocolError::UnknownType { tag, offset })?;
        Self::decode_body(src, type_id)
    }

    /// Read the fields that follow an already-consumed base-type tag.
    pub fn decode_body(src: &mut Reader<'_>, type_id: TypeId) -> Result<Self, ProtocolError> {
        let mut info = Self::new(type_id);

        info.max_length = match type_id.type_info_length_width() {
            0 => 0,
            1 => u32::from(src.read_u8()?),
            2 => u32::from(src.read_u16()?),
            _ => src.read_u32()?,
        };

        if type_id.supports_plp() && info.max_length == u32::from(MAX_LEN_PLP) {
            info.category = TypeCategory::StreamingPlp;
        }

        if type_id.has_precision() {
            let offset = src.offset();
            info.precision = src.read_u8()?;
            info.scale = src.read_u8()?;
            if info.precision > MAX_DECIMAL_PRECISION || info.scale > info.precision {
                return Err(ProtocolError::InvalidValue {
                    offset,
                    reason: format!(
                        "precision {} / scale {} out of range",
                        info.precision, info.scale
                    ),
                });
            }
        } else if type_id.has_scale_only() {
            let offset = src.offset();
            info.scale = src.read_u8()?;
            if info.scale > MAX_TIME_SCALE {
                return Err(ProtocolError::InvalidValue {
                    offset,
                    reason: format!("time scale {} exceeds {MAX_TIME_SCALE}", info.scale),
                });
            }
        }

        if type_id.has_collation() {
            info.collation = Some(Collation::decode(src)?);
        }

        match type_id {
            TypeId::Xml => {
                if src.read_u8()? != 0 {
                    info.xml_schema = Some(XmlSchema {
                        database: src.read_b_varchar()?,
                        owning_schema: src.read_b_varchar()?,
                        collection: src.read_us_varchar()?,
                    });
                }
            }
            TypeId::Udt => {
                info.udt = Some(UdtInfo {
                    database: src.read_b_varchar()?,
                    schema: src.read_b_varchar()?,
                    type_name: src.read_b_varchar()?,
                    assembly_qualified_name: src.read_us_varchar()?,
                });
            }
            _ => {}
        }

        Ok(info)
    }

    /// Whether values are sent with the streaming chunked encoding.
    #[must_use]
    pub fn is_plp(&self) -> bool {
        self.category == TypeCategory::StreamingPlp
    }
}
