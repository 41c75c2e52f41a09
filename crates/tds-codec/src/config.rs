//! Decoder configuration.
//!
//! One [`DecoderConfig`] is shared read-only by every conversation a
//! [`Dissector`](crate::Dissector) tracks.

use tds_wire::value::DEFAULT_MAX_PLP_SIZE;
use tds_wire::{ByteOrder, DecodeOptions, TdsVersion};

/// Ports SQL Server listens on by default (database engine and the
/// legacy dedicated admin port).
pub const DEFAULT_PORTS: [u16; 2] = [1433, 2433];

/// Default upper bound on one reassembled PDU (16 MiB).
pub const DEFAULT_MAX_PDU_SIZE: usize = 16 * 1024 * 1024;

/// Configuration shared by all conversations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct DecoderConfig {
    /// Version assumed until a login acknowledgement is seen.
    pub version_hint: Option<TdsVersion>,
    /// Byte order of token fields on legacy conversations.
    pub byte_order: ByteOrder,
    /// Ports the heuristic treats as likely TDS.
    pub ports: Vec<u16>,
    /// Upper bound on one reassembled PDU.
    pub max_pdu_size: usize,
    /// Upper bound on one accumulated PLP value.
    pub max_plp_size: usize,
    /// Reassemble multi-frame PDUs; when off every frame is its own PDU.
    pub reassemble: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            version_hint: None,
            byte_order: ByteOrder::LittleEndian,
            ports: DEFAULT_PORTS.to_vec(),
            max_pdu_size: DEFAULT_MAX_PDU_SIZE,
            max_plp_size: DEFAULT_MAX_PLP_SIZE,
            reassemble: true,
        }
    }
}

impl DecoderConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the version assumed before negotiation.
    #[must_use]
    pub fn version_hint(mut self, version: TdsVersion) -> Self {
        self.version_hint = Some(version);
        self
    }

    /// Set the byte order for legacy conversations.
    #[must_use]
    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    /// Replace the heuristic port list.
    #[must_use]
    pub fn ports(mut self, ports: impl Into<Vec<u16>>) -> Self {
        self.ports = ports.into();
        self
    }

    /// Set the maximum reassembled PDU size.
    #[must_use]
    pub fn max_pdu_size(mut self, size: usize) -> Self {
        self.max_pdu_size = size;
        self
    }

    /// Set the maximum accumulated PLP value size.
    #[must_use]
    pub fn max_plp_size(mut self, size: usize) -> Self {
        self.max_plp_size = size;
        self
    }

    /// Enable or disable multi-frame reassembly.
    #[must_use]
    pub fn reassemble(mut self, enabled: bool) -> Self {
        self.reassemble = enabled;
        self
    }

    /// Whether `port` is one of the configured TDS ports.
    #[must_use]
    pub fn is_tds_port(&self, port: u16) -> bool {
        self.ports.contains(&port)
    }

    /// The options the token decoder reads.
    #[must_use]
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            max_plp_size: self.max_plp_size,
            byte_order: self.byte_order,
            version_hint: self.version_hint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DecoderConfig::default();
        assert!(config.is_tds_port(1433));
        assert!(config.is_tds_port(2433));
        assert!(!config.is_tds_port(5432));
        assert!(config.reassemble);
        assert_eq!(config.max_pdu_size, DEFAULT_MAX_PDU_SIZE);
    }

    #[test]
    fn test_builder_feeds_decode_options() {
        let config = DecoderConfig::new()
            .version_hint(TdsVersion::V5_0)
            .byte_order(ByteOrder::BigEndian)
            .max_plp_size(1024)
            .ports([4100]);
        let options = config.decode_options();
        assert_eq!(options.version_hint, Some(TdsVersion::V5_0));
        assert_eq!(options.byte_order, ByteOrder::BigEndian);
        assert_eq!(options.max_plp_size, 1024);
        assert!(config.is_tds_port(4100));
        assert!(!config.is_tds_port(1433));
    }
}
