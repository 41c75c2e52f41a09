//! Per-conversation decoder state.
//!
//! The token decoder reads the negotiated version and the current column set
//! from [`ConversationState`] and updates them from the tokens it produces.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::reader::ByteOrder;
use crate::token::Token;
use crate::type_info::TypeInfo;
use crate::types::ColumnFlags;
use crate::value::DecodeOptions;
use crate::version::TdsVersion;

/// One column as described by column metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,
    /// User type.
    pub user_type: u32,
    /// Column flags.
    pub flags: ColumnFlags,
    /// Type description used to decode row values.
    pub type_info: TypeInfo,
    /// Table name parts, for text-pointer columns.
    pub table_name: Vec<String>,
}

/// Ordered column descriptors for a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSet {
    /// Columns in wire order.
    pub columns: Vec<ColumnDescriptor>,
}

impl ColumnSet {
    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the set has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Bytes in the null bitmap of an `NBCROW` for this set.
    #[must_use]
    pub fn null_bitmap_len(&self) -> usize {
        self.columns.len().div_ceil(8)
    }
}

/// State carried across the PDUs of one conversation.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    negotiated_version: TdsVersion,
    version_hint: Option<TdsVersion>,
    byte_order: ByteOrder,
    column_set: Option<Arc<ColumnSet>>,
    alt_column_sets: BTreeMap<u16, Arc<ColumnSet>>,
}

impl ConversationState {
    /// Create state with no version and little-endian byte order.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create state seeded from decoder options.
    #[must_use]
    pub fn with_options(options: &DecodeOptions) -> Self {
        Self {
            version_hint: options.version_hint,
            byte_order: options.byte_order,
            ..Self::default()
        }
    }

    /// Version from the login acknowledgement, `Unknown` until one is seen.
    #[must_use]
    pub fn negotiated_version(&self) -> TdsVersion {
        self.negotiated_version
    }

    /// Version used for gated field widths.
    ///
    /// The negotiated version, else the configured hint, else `Unknown`.
    #[must_use]
    pub fn effective_version(&self) -> TdsVersion {
        match (self.negotiated_version, self.version_hint) {
            (TdsVersion::Unknown, Some(hint)) => hint,
            (version, _) => version,
        }
    }

    /// Byte order for token-stream fields.
    ///
    /// TDS 7.x streams are always little-endian; the configured order only
    /// applies to legacy or not-yet-identified conversations.
    #[must_use]
    pub fn byte_order(&self) -> ByteOrder {
        let version = self.effective_version();
        if version == TdsVersion::Unknown || version.is_legacy() {
            self.byte_order
        } else {
            ByteOrder::LittleEndian
        }
    }

    /// Override the negotiated version.
    pub fn set_version(&mut self, version: TdsVersion) {
        self.negotiated_version = version;
    }

    /// The most recent column set, if any.
    #[must_use]
    pub fn column_set(&self) -> Option<&Arc<ColumnSet>> {
        self.column_set.as_ref()
    }

    /// The compute column set registered under `id`.
    #[must_use]
    pub fn alt_column_set(&self, id: u16) -> Option<&Arc<ColumnSet>> {
        self.alt_column_sets.get(&id)
    }

    /// Apply the state changes a token carries.
    pub fn on_token(&mut self, token: &Token) {
        match token {
            Token::LoginAck(ack) => {
                tracing::debug!(
                    version = %ack.version,
                    code = format_args!("0x{:08X}", ack.version_code),
                    "negotiated protocol version"
                );
                self.negotiated_version = ack.version;
            }
            Token::ColMetadata(meta) => {
                if let Some(columns) = &meta.columns {
                    tracing::debug!(columns = columns.len(), "column set replaced");
                    self.column_set = Some(Arc::clone(columns));
                    self.alt_column_sets.clear();
                }
            }
            Token::AltMetadata(alt) => {
                tracing::debug!(id = alt.id, columns = alt.columns.len(), "compute column set replaced");
                self.alt_column_sets.insert(alt.id, Arc::clone(&alt.columns));
            }
            _ => {}
        }
    }

    /// Forget column metadata. The negotiated version is kept.
    pub fn reset(&mut self) {
        self.column_set = None;
        self.alt_column_sets.clear();
    }
}
