//! # tds-codec
//!
//! Framing, reassembly and conversation tracking for passively observed TDS
//! traffic.
//!
//! This crate turns the raw bytes of a TCP conversation into complete PDUs
//! and hands them to `tds-wire` for token decoding, keeping per-connection
//! state such as the negotiated version and the active column metadata.
//!
//! ## Architecture
//!
//! ```text
//! segment → decode_frame → Reassembler (per channel) → Pdu → dispatch
//!                                                            ├─ PreLogin
//!                                                            ├─ SqlBatch / RPC
//!                                                            └─ decode_tokens
//! ```
//!
//! [`FrameCodec`] exposes the same frame decoding through `tokio-util`'s
//! [`Decoder`](tokio_util::codec::Decoder) for stream-based consumers.
//!
//! ## Example
//!
//! ```rust
//! use tds_codec::{DecoderConfig, Dissector, Event, MessageBody};
//!
//! // One tabular-result frame holding a pre-7.2 DONE token
//! let segment = [
//!     0x04, 0x01, 0x00, 0x11, 0x00, 0x00, 0x01, 0x00,
//!     0xFD, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00,
//! ];
//!
//! let mut dissector = Dissector::new(DecoderConfig::default());
//! let outcome = dissector.process_segment("client:50000->server:1433", &segment);
//!
//! assert_eq!(outcome.consumed, segment.len());
//! let Some(Event::Message(message)) = outcome.events.first() else { panic!() };
//! assert!(matches!(&message.body, MessageBody::Tokens(stream) if stream.is_complete()));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod codec;
pub mod config;
pub mod error;
pub mod frame;
pub mod heuristic;
pub mod reassembly;
pub mod session;
pub mod tls;

pub use codec::FrameCodec;
pub use config::DecoderConfig;
pub use error::{CodecError, MalformedFraming};
pub use frame::{Frame, FrameKind, FrameResult, OwnedFrame, decode_frame};
pub use heuristic::Heuristic;
pub use reassembly::{Pdu, Reassembler};
pub use session::{
    Conversation, Dissector, Event, Message, MessageBody, Reassembled, SegmentOutcome,
};
pub use tls::is_tls_record;
