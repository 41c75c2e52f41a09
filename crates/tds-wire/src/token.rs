//! Token definitions and per-token body decoding.
//!
//! A response PDU is a sequence of tokens, each introduced by a one-byte tag.
//! How far a token extends is given by its [`SizeRule`]: a fixed size, a
//! length field right after the tag, or only by decoding the whole body
//! (column metadata and rows).
//!
//! The driving loop lives in [`crate::stream`]; this module knows how to
//! read one token body once the tag has been consumed.

use std::sync::Arc;

use bitflags::bitflags;
use bytes::Bytes;

use crate::collation::{CODE_PAGE_DEFAULT, Collation, decode_code_page};
use crate::error::ProtocolError;
use crate::reader::Reader;
use crate::state::{ColumnDescriptor, ColumnSet, ConversationState};
use crate::type_info::TypeInfo;
use crate::types::ColumnFlags;
use crate::value::{DecodeOptions, DecodedValue, decode_value};
use crate::version::TdsVersion;

/// Column count that marks a `COLMETADATA` carrying no columns.
pub const NO_METADATA: u16 = 0xFFFF;

/// Token tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TokenType {
    /// TDS 5 wide parameter format (PARAMFMT2).
    ParamFmt2 = 0x20,
    /// TDS 5 language request (LANGUAGE).
    Language = 0x21,
    /// TDS 5 wide order-by (ORDERBY2).
    OrderBy2 = 0x22,
    /// TDS 5 wide row format (ROWFMT2).
    RowFmt2 = 0x61,
    /// TDS 5 wide dynamic SQL (DYNAMIC2).
    Dynamic2 = 0x62,
    /// Logout acknowledgement (LOGOUT).
    Logout = 0x71,
    /// Offset of a keyword in the SQL text (OFFSET).
    Offset = 0x78,
    /// Return status (RETURNSTATUS).
    ReturnStatus = 0x79,
    /// Procedure ID (PROCID).
    ProcId = 0x7C,
    /// Column metadata (COLMETADATA).
    ColMetadata = 0x81,
    /// Compute column metadata (ALTMETADATA).
    AltMetadata = 0x88,
    /// Legacy column names (COLNAME).
    ColName = 0xA0,
    /// Legacy column formats (COLFMT).
    ColFmt = 0xA1,
    /// Table names (TABNAME).
    TabName = 0xA4,
    /// Column info (COLINFO).
    ColInfo = 0xA5,
    /// Legacy option command (OPTIONCMD).
    OptionCmd = 0xA6,
    /// Legacy compute names (ALTNAME).
    AltName = 0xA7,
    /// Legacy compute formats (ALTFMT).
    AltFmt = 0xA8,
    /// Order (ORDER).
    Order = 0xA9,
    /// Error message (ERROR).
    Error = 0xAA,
    /// Informational message (INFO).
    Info = 0xAB,
    /// Return value (RETURNVALUE).
    ReturnValue = 0xAC,
    /// Login acknowledgment (LOGINACK).
    LoginAck = 0xAD,
    /// Feature extension acknowledgment (FEATUREEXTACK); CONTROL on TDS 5.
    FeatureExtAck = 0xAE,
    /// Row data (ROW).
    Row = 0xD1,
    /// Null bitmap compressed row (NBCROW).
    NbcRow = 0xD2,
    /// Compute row (ALTROW).
    AltRow = 0xD3,
    /// TDS 5 capability (CAPABILITY).
    Capability = 0xE2,
    /// Environment change (ENVCHANGE).
    EnvChange = 0xE3,
    /// Session state (SESSIONSTATE).
    SessionState = 0xE4,
    /// TDS 5 extended error (EED).
    Eed = 0xE5,
    /// TDS 5 dynamic SQL (DYNAMIC).
    Dynamic = 0xE7,
    /// TDS 5 parameter format (PARAMFMT).
    ParamFmt = 0xEC,
    /// SSPI authentication (SSPI).
    Sspi = 0xED,
    /// Federated authentication info (FEDAUTHINFO); ROWFMT on TDS 5.
    FedAuthInfo = 0xEE,
    /// Done (DONE).
    Done = 0xFD,
    /// Done procedure (DONEPROC).
    DoneProc = 0xFE,
    /// Done in procedure (DONEINPROC).
    DoneInProc = 0xFF,
}

/// How the extent of a token is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeRule {
    /// The body is always this many bytes.
    Fixed(usize),
    /// A length field of this many bytes follows the tag.
    Length(usize),
    /// The body has to be decoded to find its end.
    Computed,
}

impl TokenType {
    /// Create a token type from a raw byte.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0x20 => Self::ParamFmt2,
            0x21 => Self::Language,
            0x22 => Self::OrderBy2,
            0x61 => Self::RowFmt2,
            0x62 => Self::Dynamic2,
            0x71 => Self::Logout,
            0x78 => Self::Offset,
            0x79 => Self::ReturnStatus,
            0x7C => Self::ProcId,
            0x81 => Self::ColMetadata,
            0x88 => Self::AltMetadata,
            0xA0 => Self::ColName,
            0xA1 => Self::ColFmt,
            0xA4 => Self::TabName,
            0xA5 => Self::ColInfo,
            0xA6 => Self::OptionCmd,
            0xA7 => Self::AltName,
            0xA8 => Self::AltFmt,
            0xA9 => Self::Order,
            0xAA => Self::Error,
            0xAB => Self::Info,
            0xAC => Self::ReturnValue,
            0xAD => Self::LoginAck,
            0xAE => Self::FeatureExtAck,
            0xD1 => Self::Row,
            0xD2 => Self::NbcRow,
            0xD3 => Self::AltRow,
            0xE2 => Self::Capability,
            0xE3 => Self::EnvChange,
            0xE4 => Self::SessionState,
            0xE5 => Self::Eed,
            0xE7 => Self::Dynamic,
            0xEC => Self::ParamFmt,
            0xED => Self::Sspi,
            0xEE => Self::FedAuthInfo,
            0xFD => Self::Done,
            0xFE => Self::DoneProc,
            0xFF => Self::DoneInProc,
            _ => return None,
        })
    }

    /// Size rule under `version`.
    ///
    /// `DONE`-family tokens grow with the row count at 7.2, and two tags are
    /// length-prefixed TDS 5 tokens on legacy conversations.
    #[must_use]
    pub fn size_rule(self, version: TdsVersion) -> SizeRule {
        match self {
            Self::Done | Self::DoneProc | Self::DoneInProc => {
                SizeRule::Fixed(4 + version.done_row_count_width())
            }
            Self::Offset | Self::ReturnStatus => SizeRule::Fixed(4),
            Self::ProcId => SizeRule::Fixed(8),
            Self::Logout => SizeRule::Fixed(1),
            Self::ColMetadata
            | Self::AltMetadata
            | Self::Row
            | Self::NbcRow
            | Self::AltRow
            | Self::ReturnValue => SizeRule::Computed,
            Self::FeatureExtAck if version.is_legacy() => SizeRule::Length(2),
            Self::FeatureExtAck => SizeRule::Computed,
            Self::FedAuthInfo if version.is_legacy() => SizeRule::Length(2),
            Self::FedAuthInfo
            | Self::SessionState
            | Self::ParamFmt2
            | Self::Language
            | Self::OrderBy2
            | Self::RowFmt2
            | Self::Dynamic2 => SizeRule::Length(4),
            Self::ColName
            | Self::ColFmt
            | Self::TabName
            | Self::ColInfo
            | Self::OptionCmd
            | Self::AltName
            | Self::AltFmt
            | Self::Order
            | Self::Error
            | Self::Info
            | Self::LoginAck
            | Self::Capability
            | Self::EnvChange
            | Self::Eed
            | Self::Dynamic
            | Self::ParamFmt
            | Self::Sspi => SizeRule::Length(2),
        }
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ParamFmt2 => "PARAMFMT2",
            Self::Language => "LANGUAGE",
            Self::OrderBy2 => "ORDERBY2",
            Self::RowFmt2 => "ROWFMT2",
            Self::Dynamic2 => "DYNAMIC2",
            Self::Logout => "LOGOUT",
            Self::Offset => "OFFSET",
            Self::ReturnStatus => "RETURNSTATUS",
            Self::ProcId => "PROCID",
            Self::ColMetadata => "COLMETADATA",
            Self::AltMetadata => "ALTMETADATA",
            Self::ColName => "COLNAME",
            Self::ColFmt => "COLFMT",
            Self::TabName => "TABNAME",
            Self::ColInfo => "COLINFO",
            Self::OptionCmd => "OPTIONCMD",
            Self::AltName => "ALTNAME",
            Self::AltFmt => "ALTFMT",
            Self::Order => "ORDER",
            Self::Error => "ERROR",
            Self::Info => "INFO",
            Self::ReturnValue => "RETURNVALUE",
            Self::LoginAck => "LOGINACK",
            Self::FeatureExtAck => "FEATUREEXTACK",
            Self::Row => "ROW",
            Self::NbcRow => "NBCROW",
            Self::AltRow => "ALTROW",
            Self::Capability => "CAPABILITY",
            Self::EnvChange => "ENVCHANGE",
            Self::SessionState => "SESSIONSTATE",
            Self::Eed => "EED",
            Self::Dynamic => "DYNAMIC",
            Self::ParamFmt => "PARAMFMT",
            Self::Sspi => "SSPI",
            Self::FedAuthInfo => "FEDAUTHINFO",
            Self::Done => "DONE",
            Self::DoneProc => "DONEPROC",
            Self::DoneInProc => "DONEINPROC",
        }
    }
}

/// Decoded token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Completion of a SQL statement.
    Done(Done),
    /// Completion of a stored procedure.
    DoneProc(Done),
    /// Completion within a stored procedure.
    DoneInProc(Done),
    /// Error message from server.
    Error(ServerMessage),
    /// Informational message from server.
    Info(ServerMessage),
    /// Login acknowledgment.
    LoginAck(LoginAck),
    /// Column metadata describing result set structure.
    ColMetadata(ColMetadata),
    /// Compute column metadata.
    AltMetadata(AltMetadata),
    /// Row data.
    Row(Row),
    /// Null bitmap compressed row.
    NbcRow(NbcRow),
    /// Compute row.
    AltRow(AltRow),
    /// Column ordering information.
    Order(Order),
    /// Keyword offset.
    Offset(Offset),
    /// Return status from stored procedure.
    ReturnStatus(i32),
    /// Output parameter or UDF return value.
    ReturnValue(ReturnValue),
    /// Environment change notification.
    EnvChange(EnvChange),
    /// Feature extension acknowledgment.
    FeatureExtAck(FeatureExtAck),
    /// Session state information.
    SessionState(SessionState),
    /// SSPI authentication data.
    Sspi(Bytes),
    /// Federated authentication info.
    FedAuthInfo(FedAuthInfo),
    /// Table names for browse mode.
    TabName(TabName),
    /// Column info for browse mode.
    ColInfo(ColInfo),
    /// Procedure ID.
    ProcId(u64),
    /// Logout acknowledgement.
    Logout(u8),
    /// A token whose extent is known but whose body is not interpreted.
    Unknown {
        /// Tag byte.
        tag: u8,
        /// Body, without the tag or length field.
        data: Bytes,
    },
}

impl Token {
    /// Tag byte this token was read from.
    #[must_use]
    pub fn tag(&self) -> u8 {
        let kind = match self {
            Self::Done(_) => TokenType::Done,
            Self::DoneProc(_) => TokenType::DoneProc,
            Self::DoneInProc(_) => TokenType::DoneInProc,
            Self::Error(_) => TokenType::Error,
            Self::Info(_) => TokenType::Info,
            Self::LoginAck(_) => TokenType::LoginAck,
            Self::ColMetadata(_) => TokenType::ColMetadata,
            Self::AltMetadata(_) => TokenType::AltMetadata,
            Self::Row(_) => TokenType::Row,
            Self::NbcRow(_) => TokenType::NbcRow,
            Self::AltRow(_) => TokenType::AltRow,
            Self::Order(_) => TokenType::Order,
            Self::Offset(_) => TokenType::Offset,
            Self::ReturnStatus(_) => TokenType::ReturnStatus,
            Self::ReturnValue(_) => TokenType::ReturnValue,
            Self::EnvChange(_) => TokenType::EnvChange,
            Self::FeatureExtAck(_) => TokenType::FeatureExtAck,
            Self::SessionState(_) => TokenType::SessionState,
            Self::Sspi(_) => TokenType::Sspi,
            Self::FedAuthInfo(_) => TokenType::FedAuthInfo,
            Self::TabName(_) => TokenType::TabName,
            Self::ColInfo(_) => TokenType::ColInfo,
            Self::ProcId(_) => TokenType::ProcId,
            Self::Logout(_) => TokenType::Logout,
            Self::Unknown { tag, .. } => return *tag,
        };
        kind as u8
    }
}

bitflags! {
    /// Status bits of a `DONE`-family token.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct DoneStatus: u16 {
        /// More results follow.
        const MORE = 0x0001;
        /// Error occurred.
        const ERROR = 0x0002;
        /// Transaction in progress.
        const IN_XACT = 0x0004;
        /// Row count is valid.
        const COUNT = 0x0010;
        /// Attention acknowledgment.
        const ATTENTION = 0x0020;
        /// Server error caused statement termination.
        const SERVER_ERROR = 0x0100;
    }
}

/// `DONE`, `DONEPROC` or `DONEINPROC` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Done {
    /// Status flags, unknown bits retained.
    pub status: DoneStatus,
    /// Current command.
    pub cur_cmd: u16,
    /// Row count (meaningful when [`DoneStatus::COUNT`] is set).
    pub row_count: u64,
}

impl Done {
    /// Decode a `DONE`-family body.
    pub fn decode(src: &mut Reader<'_>, version: TdsVersion) -> Result<Self, ProtocolError> {
        let status = DoneStatus::from_bits_retain(src.read_u16()?);
        let cur_cmd = src.read_u16()?;
        let row_count = if version.done_row_count_width() == 8 {
            src.read_u64()?
        } else {
            u64::from(src.read_u32()?)
        };
        Ok(Self {
            status,
            cur_cmd,
            row_count,
        })
    }

    /// Whether more results follow.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.status.contains(DoneStatus::MORE)
    }
}

/// `ERROR` or `INFO` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerMessage {
    /// Message number.
    pub number: i32,
    /// Message state.
    pub state: u8,
    /// Severity class.
    pub class: u8,
    /// Message text.
    pub message: String,
    /// Server name.
    pub server: String,
    /// Procedure name.
    pub procedure: String,
    /// Line number.
    pub line: u32,
}

impl ServerMessage {
    /// Decode an `ERROR`/`INFO` body.
    pub fn decode(src: &mut Reader<'_>, version: TdsVersion) -> Result<Self, ProtocolError> {
        let narrow = version.is_legacy();
        let number = src.read_i32()?;
        let state = src.read_u8()?;
        let class = src.read_u8()?;
        let message = read_us_string(src, narrow)?;
        let server = read_b_string(src, narrow)?;
        let procedure = read_b_string(src, narrow)?;
        let line = if version.line_number_width() == 4 {
            src.read_u32()?
        } else {
            u32::from(src.read_u16()?)
        };
        Ok(Self {
            number,
            state,
            class,
            message,
            server,
            procedure,
            line,
        })
    }

    /// Check if this is a fatal error (severity >= 20).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        self.class >= 20
    }
}

/// `LOGINACK` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAck {
    /// Interface type (0 = SQL default, 1 = T-SQL).
    pub interface: u8,
    /// Raw version code.
    pub version_code: u32,
    /// Version the code maps to.
    pub version: TdsVersion,
    /// Server program name.
    pub program_name: String,
    /// Program version: major, minor, build high, build low.
    pub program_version: [u8; 4],
}

impl LoginAck {
    /// Decode a `LOGINACK` body.
    ///
    /// The version code is big-endian on the wire. Legacy servers send the
    /// program name as single-byte text.
    pub fn decode(src: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let interface = src.read_u8()?;
        let version_code = src.read_u32_be()?;
        let version = TdsVersion::from_login_ack(version_code);
        let program_name = read_b_string(src, version.is_legacy())?;
        let mut program_version = [0u8; 4];
        program_version.copy_from_slice(src.read_bytes(4)?);
        Ok(Self {
            interface,
            version_code,
            version,
            program_name,
            program_version,
        })
    }
}

/// `COLMETADATA` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColMetadata {
    /// New column set; `None` when the server sent no metadata.
    pub columns: Option<Arc<ColumnSet>>,
}

impl ColMetadata {
    /// Decode a `COLMETADATA` body.
    pub fn decode(src: &mut Reader<'_>, version: TdsVersion) -> Result<Self, ProtocolError> {
        let count = src.read_u16()?;
        if count == NO_METADATA {
            return Ok(Self { columns: None });
        }
        let mut columns = Vec::with_capacity(usize::from(count).min(src.remaining()));
        for _ in 0..count {
            columns.push(decode_column(src, version)?);
        }
        Ok(Self {
            columns: Some(Arc::new(ColumnSet { columns })),
        })
    }
}

fn decode_column(src: &mut Reader<'_>, version: TdsVersion) -> Result<ColumnDescriptor, ProtocolError> {
    let user_type = read_user_type(src, version)?;
    let flags = ColumnFlags::from_bits(src.read_u16()?, version);
    let type_info = TypeInfo::decode(src)?;
    let table_name = if type_info.type_id.is_text_pointer() {
        read_table_name(src, version)?
    } else {
        Vec::new()
    };
    let name = src.read_b_varchar()?;
    Ok(ColumnDescriptor {
        name,
        user_type,
        flags,
        type_info,
        table_name,
    })
}

fn read_user_type(src: &mut Reader<'_>, version: TdsVersion) -> Result<u32, ProtocolError> {
    if version.user_type_width() == 4 {
        src.read_u32()
    } else {
        Ok(u32::from(src.read_u16()?))
    }
}

// 7.2 introduced multi-part names; earlier versions send one US_VARCHAR.
fn read_table_name(src: &mut Reader<'_>, version: TdsVersion) -> Result<Vec<String>, ProtocolError> {
    if !version.at_least(TdsVersion::V7_2) {
        return Ok(vec![src.read_us_varchar()?]);
    }
    let parts = src.read_u8()?;
    (0..parts).map(|_| src.read_us_varchar()).collect()
}

/// One aggregate in an `ALTMETADATA` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AltOperation {
    /// Aggregate operator (`AOPSUM`, `AOPCNT`, ...).
    pub op: u8,
    /// Column the aggregate is computed over.
    pub operand: u16,
}

/// `ALTMETADATA` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AltMetadata {
    /// Compute clause ID.
    pub id: u16,
    /// Columns of the `BY` list.
    pub by_columns: Vec<u16>,
    /// Aggregate per compute column.
    pub operations: Vec<AltOperation>,
    /// Compute column descriptors.
    pub columns: Arc<ColumnSet>,
}

impl AltMetadata {
    /// Decode an `ALTMETADATA` body.
    pub fn decode(src: &mut Reader<'_>, version: TdsVersion) -> Result<Self, ProtocolError> {
        let count = src.read_u16()?;
        let id = src.read_u16()?;
        let by_count = src.read_u8()?;
        let by_columns = (0..by_count)
            .map(|_| src.read_u16())
            .collect::<Result<Vec<_>, _>>()?;

        let mut operations = Vec::new();
        let mut columns = Vec::new();
        for _ in 0..count {
            let op = src.read_u8()?;
            let operand = src.read_u16()?;
            operations.push(AltOperation { op, operand });
            columns.push(decode_column(src, version)?);
        }

        Ok(Self {
            id,
            by_columns,
            operations,
            columns: Arc::new(ColumnSet { columns }),
        })
    }
}

/// `ROW` body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// One value per column, in column order.
    pub values: Vec<DecodedValue>,
}

impl Row {
    /// Decode a `ROW` body against `columns`.
    pub fn decode(
        src: &mut Reader<'_>,
        columns: &ColumnSet,
        options: &DecodeOptions,
    ) -> Result<Self, ProtocolError> {
        let values = decode_values(src, columns, options)?;
        Ok(Self { values })
    }
}

/// `NBCROW` body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NbcRow {
    /// Null bitmap; bit `i` set means column `i` was omitted.
    pub null_bitmap: Bytes,
    /// One value per column; omitted columns are [`DecodedValue::Null`].
    pub values: Vec<DecodedValue>,
}

impl NbcRow {
    /// Decode an `NBCROW` body against `columns`.
    pub fn decode(
        src: &mut Reader<'_>,
        columns: &ColumnSet,
        options: &DecodeOptions,
    ) -> Result<Self, ProtocolError> {
        let bitmap = src.read_bytes(columns.null_bitmap_len())?;
        let mut values = Vec::with_capacity(columns.len());
        for (i, column) in columns.columns.iter().enumerate() {
            if bitmap[i / 8] & (1 << (i % 8)) != 0 {
                values.push(DecodedValue::Null);
            } else {
                values.push(decode_value(src, &column.type_info, options)?);
            }
        }
        Ok(Self {
            null_bitmap: Bytes::copy_from_slice(bitmap),
            values,
        })
    }

    /// Whether column `index` was omitted.
    #[must_use]
    pub fn is_null(&self, index: usize) -> bool {
        self.null_bitmap
            .get(index / 8)
            .is_some_and(|byte| byte & (1 << (index % 8)) != 0)
    }
}

/// `ALTROW` body.
#[derive(Debug, Clone, PartialEq)]
pub struct AltRow {
    /// Compute clause ID.
    pub id: u16,
    /// One value per compute column.
    pub values: Vec<DecodedValue>,
}

fn decode_values(
    src: &mut Reader<'_>,
    columns: &ColumnSet,
    options: &DecodeOptions,
) -> Result<Vec<DecodedValue>, ProtocolError> {
    columns
        .columns
        .iter()
        .map(|column| decode_value(src, &column.type_info, options))
        .collect()
}

/// Column ordering information.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Order {
    /// Ordered column numbers.
    pub columns: Vec<u16>,
}

/// `OFFSET` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset {
    /// Keyword identifier.
    pub identifier: u16,
    /// Position of the keyword in the SQL text.
    pub offset: u16,
}

/// `RETURNVALUE` body.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnValue {
    /// Parameter ordinal.
    pub ordinal: u16,
    /// Parameter name.
    pub name: String,
    /// Status (1 = output parameter, 2 = UDF return value).
    pub status: u8,
    /// User type.
    pub user_type: u32,
    /// Type flags.
    pub flags: ColumnFlags,
    /// Type info.
    pub type_info: TypeInfo,
    /// Decoded value.
    pub value: DecodedValue,
}

impl ReturnValue {
    /// Decode a `RETURNVALUE` body.
    pub fn decode(
        src: &mut Reader<'_>,
        version: TdsVersion,
        options: &DecodeOptions,
    ) -> Result<Self, ProtocolError> {
        let ordinal = src.read_u16()?;
        let name = src.read_b_varchar()?;
        let status = src.read_u8()?;
        let user_type = read_user_type(src, version)?;
        let flags = ColumnFlags::from_bits(src.read_u16()?, version);
        let type_info = TypeInfo::decode(src)?;
        let value = decode_value(src, &type_info, options)?;
        Ok(Self {
            ordinal,
            name,
            status,
            user_type,
            flags,
            type_info,
            value,
        })
    }
}

/// Environment change type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EnvChangeType {
    /// Database changed.
    Database = 1,
    /// Language changed.
    Language = 2,
    /// Character set changed.
    CharacterSet = 3,
    /// Packet size changed.
    PacketSize = 4,
    /// Unicode data sorting locale ID.
    UnicodeSortingLocalId = 5,
    /// Unicode comparison flags.
    UnicodeComparisonFlags = 6,
    /// SQL collation.
    SqlCollation = 7,
    /// Begin transaction.
    BeginTransaction = 8,
    /// Commit transaction.
    CommitTransaction = 9,
    /// Rollback transaction.
    RollbackTransaction = 10,
    /// Enlist DTC transaction.
    EnlistDtcTransaction = 11,
    /// Defect DTC transaction.
    DefectTransaction = 12,
    /// Real-time log shipping.
    RealTimeLogShipping = 13,
    /// Promote transaction.
    PromoteTransaction = 15,
    /// Transaction manager address.
    TransactionManagerAddress = 16,
    /// Transaction ended.
    TransactionEnded = 17,
    /// Reset connection completion acknowledgment.
    ResetConnectionCompletionAck = 18,
    /// User instance started.
    UserInstanceStarted = 19,
    /// Routing information.
    Routing = 20,
}

impl EnvChangeType {
    /// Create from raw byte value.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::Database,
            2 => Self::Language,
            3 => Self::CharacterSet,
            4 => Self::PacketSize,
            5 => Self::UnicodeSortingLocalId,
            6 => Self::UnicodeComparisonFlags,
            7 => Self::SqlCollation,
            8 => Self::BeginTransaction,
            9 => Self::CommitTransaction,
            10 => Self::RollbackTransaction,
            11 => Self::EnlistDtcTransaction,
            12 => Self::DefectTransaction,
            13 => Self::RealTimeLogShipping,
            15 => Self::PromoteTransaction,
            16 => Self::TransactionManagerAddress,
            17 => Self::TransactionEnded,
            18 => Self::ResetConnectionCompletionAck,
            19 => Self::UserInstanceStarted,
            20 => Self::Routing,
            _ => return None,
        })
    }
}

/// Environment change value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvChangeValue {
    /// Zero-length value.
    Empty,
    /// String value.
    Text(String),
    /// Binary value (transaction descriptors and similar).
    Binary(Bytes),
    /// New or old collation.
    Collation(Collation),
    /// Routing information.
    Routing {
        /// Transport protocol (0 = TCP).
        protocol: u8,
        /// Port number.
        port: u16,
        /// Host name.
        host: String,
    },
}

/// `ENVCHANGE` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvChange {
    /// Raw change type.
    pub kind: u8,
    /// New value.
    pub new_value: EnvChangeValue,
    /// Old value.
    pub old_value: EnvChangeValue,
}

impl EnvChange {
    /// Decode an `ENVCHANGE` body.
    pub fn decode(src: &mut Reader<'_>, version: TdsVersion) -> Result<Self, ProtocolError> {
        let kind = src.read_u8()?;
        let narrow = version.is_legacy();

        let (new_value, old_value) = match EnvChangeType::from_u8(kind) {
            Some(EnvChangeType::SqlCollation) => (read_collation(src)?, read_collation(src)?),
            Some(
                EnvChangeType::BeginTransaction
                | EnvChangeType::CommitTransaction
                | EnvChangeType::RollbackTransaction
                | EnvChangeType::EnlistDtcTransaction
                | EnvChangeType::DefectTransaction
                | EnvChangeType::TransactionManagerAddress
                | EnvChangeType::TransactionEnded
                | EnvChangeType::ResetConnectionCompletionAck,
            ) => (read_b_varbyte(src)?, read_b_varbyte(src)?),
            Some(EnvChangeType::PromoteTransaction) => {
                let len = src.read_u32()? as usize;
                let new_value = binary(src.read_bytes(len)?);
                // Old value is a single zero-length byte
                if !src.is_empty() {
                    src.skip(1)?;
                }
                (new_value, EnvChangeValue::Empty)
            }
            Some(EnvChangeType::Routing) => {
                let len = usize::from(src.read_u16()?);
                let mut routing = src.sub_reader(len)?;
                let protocol = routing.read_u8()?;
                let port = routing.read_u16()?;
                let host = routing.read_us_varchar()?;
                if src.remaining() >= 2 {
                    src.skip(2)?;
                }
                (
                    EnvChangeValue::Routing {
                        protocol,
                        port,
                        host,
                    },
                    EnvChangeValue::Empty,
                )
            }
            Some(_) => (
                text(read_b_string(src, narrow)?),
                text(read_b_string(src, narrow)?),
            ),
            None => (binary(src.rest()), EnvChangeValue::Empty),
        };

        Ok(Self {
            kind,
            new_value,
            old_value,
        })
    }

    /// Typed change type, `None` if unrecognized.
    #[must_use]
    pub fn env_type(&self) -> Option<EnvChangeType> {
        EnvChangeType::from_u8(self.kind)
    }

    /// Get routing information if this is a routing change.
    #[must_use]
    pub fn routing_info(&self) -> Option<(&str, u16)> {
        match &self.new_value {
            EnvChangeValue::Routing { host, port, .. } => Some((host, *port)),
            _ => None,
        }
    }
}

fn text(s: String) -> EnvChangeValue {
    if s.is_empty() {
        EnvChangeValue::Empty
    } else {
        EnvChangeValue::Text(s)
    }
}

fn binary(data: &[u8]) -> EnvChangeValue {
    if data.is_empty() {
        EnvChangeValue::Empty
    } else {
        EnvChangeValue::Binary(Bytes::copy_from_slice(data))
    }
}

fn read_b_varbyte(src: &mut Reader<'_>) -> Result<EnvChangeValue, ProtocolError> {
    let len = usize::from(src.read_u8()?);
    Ok(binary(src.read_bytes(len)?))
}

fn read_collation(src: &mut Reader<'_>) -> Result<EnvChangeValue, ProtocolError> {
    let len = usize::from(src.read_u8()?);
    let mut body = src.sub_reader(len)?;
    if len == Collation::SIZE {
        Ok(EnvChangeValue::Collation(Collation::decode(&mut body)?))
    } else {
        Ok(binary(body.rest()))
    }
}

/// One acknowledged feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureAck {
    /// Feature ID.
    pub feature_id: u8,
    /// Feature data.
    pub data: Bytes,
}

/// `FEATUREEXTACK` body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureExtAck {
    /// Acknowledged features.
    pub features: Vec<FeatureAck>,
}

impl FeatureExtAck {
    /// Decode entries up to and including the terminator.
    pub fn decode(src: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let mut features = Vec::new();
        loop {
            let feature_id = src.read_u8()?;
            if feature_id == crate::layout::FEATURE_EXT_TERMINATOR {
                break;
            }
            let len = src.read_u32()? as usize;
            let data = Bytes::copy_from_slice(src.read_bytes(len)?);
            features.push(FeatureAck { feature_id, data });
        }
        Ok(Self { features })
    }
}

/// One session state record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRecord {
    /// State ID.
    pub id: u8,
    /// State value.
    pub data: Bytes,
}

/// `SESSIONSTATE` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Sequence number.
    pub sequence: u32,
    /// Status byte; bit 0 set means the session is recoverable.
    pub status: u8,
    /// State records.
    pub records: Vec<StateRecord>,
}

impl SessionState {
    /// Decode a `SESSIONSTATE` body.
    pub fn decode(src: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let sequence = src.read_u32()?;
        let status = src.read_u8()?;
        let mut records = Vec::new();
        while !src.is_empty() {
            let id = src.read_u8()?;
            let len = match src.read_u8()? {
                0xFF => src.read_u32()? as usize,
                short => usize::from(short),
            };
            let data = Bytes::copy_from_slice(src.read_bytes(len)?);
            records.push(StateRecord { id, data });
        }
        Ok(Self {
            sequence,
            status,
            records,
        })
    }

    /// Whether the server marked the session recoverable.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        self.status & 0x01 != 0
    }
}

/// `FEDAUTHINFO` body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FedAuthInfo {
    /// Security token service URL.
    pub sts_url: Option<String>,
    /// Service principal name.
    pub spn: Option<String>,
}

impl FedAuthInfo {
    const STS_URL: u8 = 0x01;
    const SPN: u8 = 0x02;

    /// Decode a `FEDAUTHINFO` body.
    ///
    /// Option data offsets are relative to the start of the body.
    pub fn decode(src: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let body = src.rest();
        let base = src.offset();
        let count = src.read_u32()?;
        let mut info = Self::default();
        for _ in 0..count {
            let id = src.read_u8()?;
            let len = src.read_u32()? as usize;
            let offset = src.read_u32()? as usize;
            let data = offset
                .checked_add(len)
                .and_then(|end| body.get(offset..end))
                .ok_or(ProtocolError::LengthOverflow {
                    offset: base + offset,
                    declared: len as u64,
                })?;
            let value = crate::reader::decode_utf16le(data)?;
            match id {
                Self::STS_URL => info.sts_url = Some(value),
                Self::SPN => info.spn = Some(value),
                _ => {}
            }
        }
        Ok(info)
    }
}

/// `TABNAME` body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabName {
    /// Table names, each as its name parts.
    pub tables: Vec<Vec<String>>,
}

impl TabName {
    /// Decode a `TABNAME` body.
    pub fn decode(src: &mut Reader<'_>, version: TdsVersion) -> Result<Self, ProtocolError> {
        let mut tables = Vec::new();
        while !src.is_empty() {
            tables.push(read_table_name(src, version)?);
        }
        Ok(Self { tables })
    }
}

/// One `COLINFO` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColInfoEntry {
    /// Column number in the result set.
    pub column: u8,
    /// Table number in the preceding `TABNAME`.
    pub table: u8,
    /// Status bits.
    pub status: u8,
    /// Base column name, when it differs from the result column.
    pub name: Option<String>,
}

impl ColInfoEntry {
    /// Column is an expression.
    pub const EXPRESSION: u8 = 0x04;
    /// Column is part of a key.
    pub const KEY: u8 = 0x08;
    /// Column is hidden.
    pub const HIDDEN: u8 = 0x10;
    /// Column has a different base name.
    pub const DIFFERENT_NAME: u8 = 0x20;
}

/// `COLINFO` body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColInfo {
    /// Entries in wire order.
    pub columns: Vec<ColInfoEntry>,
}

impl ColInfo {
    /// Decode a `COLINFO` body.
    pub fn decode(src: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let mut columns = Vec::new();
        while !src.is_empty() {
            let column = src.read_u8()?;
            let table = src.read_u8()?;
            let status = src.read_u8()?;
            let name = if status & ColInfoEntry::DIFFERENT_NAME != 0 {
                Some(src.read_b_varchar()?)
            } else {
                None
            };
            columns.push(ColInfoEntry {
                column,
                table,
                status,
                name,
            });
        }
        Ok(Self { columns })
    }
}

fn read_b_string(src: &mut Reader<'_>, narrow: bool) -> Result<String, ProtocolError> {
    if narrow {
        let len = usize::from(src.read_u8()?);
        Ok(decode_code_page(CODE_PAGE_DEFAULT, src.read_bytes(len)?))
    } else {
        src.read_b_varchar()
    }
}

fn read_us_string(src: &mut Reader<'_>, narrow: bool) -> Result<String, ProtocolError> {
    if narrow {
        let len = usize::from(src.read_u16()?);
        Ok(decode_code_page(CODE_PAGE_DEFAULT, src.read_bytes(len)?))
    } else {
        src.read_us_varchar()
    }
}

/// Decode the body of a token whose tag has been consumed.
///
/// `src` is bounded to the body for fixed and length-prefixed tokens, and is
/// the PDU reader for computed ones.
pub(crate) fn decode_body(
    kind: TokenType,
    tag_offset: usize,
    src: &mut Reader<'_>,
    state: &ConversationState,
    options: &DecodeOptions,
) -> Result<Token, ProtocolError> {
    let version = state.effective_version();
    let tag = kind as u8;
    let dependent = || ProtocolError::DependentState {
        tag,
        offset: tag_offset,
    };

    let token = match kind {
        TokenType::Done => Token::Done(Done::decode(src, version)?),
        TokenType::DoneProc => Token::DoneProc(Done::decode(src, version)?),
        TokenType::DoneInProc => Token::DoneInProc(Done::decode(src, version)?),
        TokenType::Offset => Token::Offset(Offset {
            identifier: src.read_u16()?,
            offset: src.read_u16()?,
        }),
        TokenType::ReturnStatus => Token::ReturnStatus(src.read_i32()?),
        TokenType::ProcId => Token::ProcId(src.read_u64()?),
        TokenType::Logout => Token::Logout(src.read_u8()?),
        TokenType::ColMetadata => Token::ColMetadata(ColMetadata::decode(src, version)?),
        TokenType::AltMetadata => Token::AltMetadata(AltMetadata::decode(src, version)?),
        TokenType::Row => {
            let columns = state.column_set().ok_or_else(dependent)?;
            Token::Row(Row::decode(src, columns, options)?)
        }
        TokenType::NbcRow => {
            let columns = state.column_set().ok_or_else(dependent)?;
            Token::NbcRow(NbcRow::decode(src, columns, options)?)
        }
        TokenType::AltRow => {
            let id = src.read_u16()?;
            let columns = state.alt_column_set(id).ok_or_else(dependent)?;
            let values = decode_values(src, columns, options)?;
            Token::AltRow(AltRow { id, values })
        }
        TokenType::ReturnValue => {
            Token::ReturnValue(ReturnValue::decode(src, version, options)?)
        }
        TokenType::Error => Token::Error(ServerMessage::decode(src, version)?),
        TokenType::Info => Token::Info(ServerMessage::decode(src, version)?),
        TokenType::LoginAck => Token::LoginAck(LoginAck::decode(src)?),
        TokenType::EnvChange => Token::EnvChange(EnvChange::decode(src, version)?),
        TokenType::Order => {
            let mut columns = Vec::with_capacity(src.remaining() / 2);
            while !src.is_empty() {
                columns.push(src.read_u16()?);
            }
            Token::Order(Order { columns })
        }
        TokenType::TabName => Token::TabName(TabName::decode(src, version)?),
        TokenType::ColInfo => Token::ColInfo(ColInfo::decode(src)?),
        TokenType::Sspi => Token::Sspi(Bytes::copy_from_slice(src.rest())),
        TokenType::SessionState => Token::SessionState(SessionState::decode(src)?),
        TokenType::FeatureExtAck if !version.is_legacy() => {
            Token::FeatureExtAck(FeatureExtAck::decode(src)?)
        }
        TokenType::FedAuthInfo if !version.is_legacy() => {
            Token::FedAuthInfo(FedAuthInfo::decode(src)?)
        }
        _ => Token::Unknown {
            tag,
            data: Bytes::copy_from_slice(src.rest()),
        },
    };
    Ok(token)
}
