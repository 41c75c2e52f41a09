//! # tds-wire
//!
//! IO-agnostic decoder for the TDS (Tabular Data Stream) wire format used by
//! Microsoft SQL Server and Sybase.
//!
//! This crate turns an assembled PDU into typed tokens. It owns the layout
//! tables, the bounds-checked [`Reader`], the type and value decoders, the
//! token stream decoder and the per-conversation state that couples them.
//! Framing and reassembly live in `tds-codec`.
//!
//! ## Features
//!
//! - `encoding` (default): collation-aware decoding of narrow text through
//!   `encoding_rs`. Without it narrow text is read as Latin-1.
//! - `serde`: `Serialize`/`Deserialize` for [`DecodeOptions`], [`TdsVersion`]
//!   and [`ByteOrder`].
//!
//! ## Example
//!
//! ```rust
//! use tds_wire::{ConversationState, DecodeOptions, Token, decode_tokens};
//!
//! // DONE, status 0, curcmd 0, row count 5 (4-byte count before 7.2)
//! let pdu = [0xFD, 0x00, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00];
//! let mut state = ConversationState::new();
//! let stream = decode_tokens(&pdu, &mut state, &DecodeOptions::default());
//!
//! assert!(stream.is_complete());
//! assert!(matches!(&stream.tokens[..], [Token::Done(done)] if done.row_count == 5));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod collation;
pub mod diagnostic;
pub mod error;
pub mod headers;
pub mod layout;
pub mod packet;
pub mod prelogin;
pub mod reader;
pub mod request;
pub mod state;
pub mod stream;
pub mod token;
pub mod type_info;
pub mod types;
pub mod value;
pub mod version;

pub use collation::Collation;
pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use error::{FailureScope, ProtocolError};
pub use headers::{AllHeaders, Header};
pub use packet::{FrameHeader, PacketStatus, PacketType};
pub use prelogin::{EncryptionLevel, PreLogin, PreLoginOption};
pub use reader::{ByteOrder, Reader};
pub use request::{OpaqueRequest, SqlBatch};
pub use state::{ColumnDescriptor, ColumnSet, ConversationState};
pub use stream::{AbortReason, TokenStream, decode_tokens};
pub use token::{
    AltMetadata, AltRow, ColMetadata, Done, DoneStatus, EnvChange, EnvChangeType, EnvChangeValue,
    FeatureExtAck, FedAuthInfo, LoginAck, NbcRow, ReturnValue, Row, ServerMessage, SessionState,
    SizeRule, Token, TokenType,
};
pub use type_info::TypeInfo;
pub use types::{ColumnFlags, TypeCategory, TypeId, Updateable};
pub use value::{AbsoluteTime, DecodeOptions, DecodedValue, Epoch, RelativeTime, decode_value};
pub use version::TdsVersion;
