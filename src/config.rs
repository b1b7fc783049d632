//! Sender and receiver settings
//!
//! Both configs deserialize from YAML with every field optional; missing
//! fields take the protocol defaults. Call `validate()` (the loaders do) before
//! handing a config to a socket.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::{DEFAULT_NTP_SERVER, DEFAULT_NTP_TIMEOUT};
use crate::sample::UnitPreferences;
use crate::types::{PayloadFormat, TimeSource};
use crate::wire::{DEFAULT_MAX_PAYLOAD, HEADER_LEN, ReassemblyLimits, Segmentation};
use crate::{ProtocolError, Result};

/// Default UDP port for sample streams.
pub const DEFAULT_PORT: u16 = 55555;

/// Ports a stream may use.
pub const PORT_RANGE: std::ops::RangeInclusive<u16> = 49152..=65535;

/// Source numbers a stream may use; each maps to one multicast group.
pub const SOURCE_NUMBER_RANGE: std::ops::RangeInclusive<u8> = 1..=200;

/// Receive buffer size, one Ethernet MTU.
pub const DEFAULT_MTU: usize = 1500;

/// 24000/1001 Hz, the nominal rate of a 23.976 fps stream.
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 24000.0 / 1001.0;

/// Multicast group `235.135.1.<source_number>`.
pub fn multicast_group(source_number: u8) -> Ipv4Addr {
    Ipv4Addr::new(235, 135, 1, source_number)
}

fn validate_endpoint(source_number: u8, port: u16) -> Result<()> {
    if !SOURCE_NUMBER_RANGE.contains(&source_number) {
        return Err(ProtocolError::config(format!(
            "source number {} outside {}..={}",
            source_number,
            SOURCE_NUMBER_RANGE.start(),
            SOURCE_NUMBER_RANGE.end()
        )));
    }
    if !PORT_RANGE.contains(&port) {
        return Err(ProtocolError::config(format!(
            "port {} outside {}..={}",
            port,
            PORT_RANGE.start(),
            PORT_RANGE.end()
        )));
    }
    Ok(())
}

fn read_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ProtocolError::io(format!("reading {}", path.display()), e))?;
    parse_yaml(&text)
}

fn parse_yaml<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T> {
    serde_yaml_ng::from_str(text).map_err(|e| ProtocolError::config(e.to_string()))
}

/// Settings for [`crate::ReceiverConnection`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    pub source_number: u8,
    pub port: u16,
    /// Local interface used to join the group
    pub interface: Ipv4Addr,
    /// Largest datagram accepted; longer ones are truncated by the socket
    pub buffer_size: usize,
    /// Nominal stream rate, used to decide whether a subscription needs throttling
    pub sample_rate_hz: f64,
    pub reassembly: ReassemblyLimits,
    pub ntp_server: String,
    #[serde(with = "duration_millis")]
    pub ntp_timeout: Duration,
    /// Unit-annotated schema document; without one no unit conversion happens
    pub schema_path: Option<PathBuf>,
    pub preferences: UnitPreferences,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            source_number: 1,
            port: DEFAULT_PORT,
            interface: Ipv4Addr::UNSPECIFIED,
            buffer_size: DEFAULT_MTU,
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            reassembly: ReassemblyLimits::default(),
            ntp_server: DEFAULT_NTP_SERVER.to_string(),
            ntp_timeout: DEFAULT_NTP_TIMEOUT,
            schema_path: None,
            preferences: UnitPreferences::default(),
        }
    }
}

impl ReceiverConfig {
    pub fn for_source(source_number: u8) -> Self {
        Self { source_number, ..Self::default() }
    }

    pub fn multicast_group(&self) -> Ipv4Addr {
        multicast_group(self.source_number)
    }

    pub fn validate(&self) -> Result<()> {
        validate_endpoint(self.source_number, self.port)?;
        if self.buffer_size <= HEADER_LEN {
            return Err(ProtocolError::config(format!(
                "buffer size {} cannot hold a {}-byte header",
                self.buffer_size, HEADER_LEN
            )));
        }
        if !(self.sample_rate_hz.is_finite() && self.sample_rate_hz > 0.0) {
            return Err(ProtocolError::config(format!(
                "sample rate {} Hz must be positive",
                self.sample_rate_hz
            )));
        }
        if self.reassembly.max_pending == 0 {
            return Err(ProtocolError::config("reassembly.max_pending must be at least 1"));
        }
        if self.reassembly.ttl.is_zero() {
            return Err(ProtocolError::config("reassembly.ttl must be non-zero"));
        }
        if self.ntp_server.is_empty() {
            return Err(ProtocolError::config("ntp_server is empty"));
        }
        Ok(())
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = parse_yaml(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = read_yaml(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }
}

/// Settings for [`crate::Sender`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    pub source_number: u8,
    pub port: u16,
    /// Destination group; defaults to the source number's group
    pub group: Option<Ipv4Addr>,
    /// Local interface multicast is sent from
    pub interface: Ipv4Addr,
    pub format: PayloadFormat,
    #[serde(with = "serde_yaml_ng::with::singleton_map")]
    pub segmentation: Segmentation,
    pub multicast_ttl: u32,
    /// Samples per second sent by [`crate::Sender::run`]
    pub sample_rate_hz: f64,
    /// Source declared in, and used to stamp, outgoing samples
    pub time_source: TimeSource,
    /// Queried once when `time_source` is NTP
    pub ntp_server: String,
    #[serde(with = "duration_millis")]
    pub ntp_timeout: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            source_number: 1,
            port: DEFAULT_PORT,
            group: None,
            interface: Ipv4Addr::UNSPECIFIED,
            format: PayloadFormat::Json,
            segmentation: Segmentation::default(),
            multicast_ttl: 2,
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            time_source: TimeSource::Ntp,
            ntp_server: DEFAULT_NTP_SERVER.to_string(),
            ntp_timeout: DEFAULT_NTP_TIMEOUT,
        }
    }
}

impl SenderConfig {
    pub fn for_source(source_number: u8) -> Self {
        Self { source_number, ..Self::default() }
    }

    pub fn destination_group(&self) -> Ipv4Addr {
        self.group.unwrap_or_else(|| multicast_group(self.source_number))
    }

    pub fn validate(&self) -> Result<()> {
        validate_endpoint(self.source_number, self.port)?;
        match self.segmentation {
            Segmentation::MaxPayload(0) => {
                return Err(ProtocolError::config("segmentation max_payload must be at least 1"));
            }
            Segmentation::MaxPayload(max) if max > DEFAULT_MAX_PAYLOAD => {
                return Err(ProtocolError::config(format!(
                    "segmentation max_payload {} exceeds the {}-byte MTU budget",
                    max, DEFAULT_MAX_PAYLOAD
                )));
            }
            Segmentation::FixedCount(0) => {
                return Err(ProtocolError::config("segmentation fixed_count must be at least 1"));
            }
            _ => {}
        }
        if !(self.sample_rate_hz.is_finite() && self.sample_rate_hz > 0.0) {
            return Err(ProtocolError::config(format!(
                "sample rate {} Hz must be positive",
                self.sample_rate_hz
            )));
        }
        if self.time_source.needs_network_offset() && self.ntp_server.is_empty() {
            return Err(ProtocolError::config("ntp_server is empty"));
        }
        Ok(())
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = parse_yaml(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = read_yaml(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }
}

/// Serde adapter writing a [`Duration`] as integer milliseconds.
pub(crate) mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AngleUnit, LengthUnit};
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let receiver = ReceiverConfig::default();
        receiver.validate().unwrap();
        assert_eq!(receiver.multicast_group(), Ipv4Addr::new(235, 135, 1, 1));
        assert_eq!(receiver.port, 55555);
        assert_eq!(receiver.buffer_size, 1500);

        let sender = SenderConfig::default();
        sender.validate().unwrap();
        assert_eq!(sender.multicast_ttl, 2);
        assert_eq!(sender.destination_group(), Ipv4Addr::new(235, 135, 1, 1));
    }

    #[test]
    fn endpoint_bounds_are_enforced() {
        assert!(ReceiverConfig::for_source(0).validate().is_err());
        assert!(ReceiverConfig::for_source(201).validate().is_err());
        ReceiverConfig::for_source(200).validate().unwrap();

        let low_port = ReceiverConfig { port: 49151, ..Default::default() };
        let err = low_port.validate().unwrap_err();
        assert!(matches!(err, ProtocolError::Config { .. }));
        assert!(err.to_string().contains("49151"));
    }

    #[test]
    fn receiver_yaml_fills_missing_fields() {
        let config = ReceiverConfig::from_yaml_str(
            "source_number: 7\n\
             port: 50000\n\
             ntp_timeout: 500\n\
             reassembly:\n  ttl: 250\n\
             preferences:\n  translation: cm\n  rotation: rad\n",
        )
        .unwrap();

        assert_eq!(config.multicast_group(), Ipv4Addr::new(235, 135, 1, 7));
        assert_eq!(config.port, 50000);
        assert_eq!(config.ntp_timeout, Duration::from_millis(500));
        assert_eq!(config.reassembly.ttl, Duration::from_millis(250));
        assert_eq!(config.reassembly.max_pending, 16);
        assert_eq!(config.preferences.translation, LengthUnit::Centimeter);
        assert_eq!(config.preferences.rotation, AngleUnit::Radian);
        assert_eq!(config.ntp_server, DEFAULT_NTP_SERVER);
    }

    #[test]
    fn sender_yaml_selects_format_and_segmentation() {
        let config = SenderConfig::from_yaml_str(
            "format: cbor\nsegmentation:\n  fixed_count: 3\ngroup: 239.1.2.3\n",
        )
        .unwrap();
        assert_eq!(config.format, PayloadFormat::Cbor);
        assert_eq!(config.segmentation, Segmentation::FixedCount(3));
        assert_eq!(config.destination_group(), Ipv4Addr::new(239, 1, 2, 3));

        assert!(SenderConfig::from_yaml_str("segmentation:\n  fixed_count: 0\n").is_err());
        assert!(SenderConfig::from_yaml_str("format: xml\n").is_err());
    }

    #[test]
    fn sender_segments_must_fit_the_mtu() {
        let oversized =
            SenderConfig { segmentation: Segmentation::MaxPayload(4000), ..Default::default() };
        let err = oversized.validate().unwrap_err();
        assert!(err.to_string().contains("4000"));

        let full =
            SenderConfig { segmentation: Segmentation::MaxPayload(1484), ..Default::default() };
        full.validate().unwrap();

        // The segmenter caps a single slice at the MTU budget instead
        SenderConfig { segmentation: Segmentation::FixedCount(1), ..Default::default() }
            .validate()
            .unwrap();
    }

    #[test]
    fn sender_yaml_selects_time_source_and_rate() {
        let config = SenderConfig::from_yaml_str(
            "time_source: genlock\nsample_rate_hz: 50.0\nntp_timeout: 250\n",
        )
        .unwrap();
        assert_eq!(config.time_source, TimeSource::Genlock);
        assert_eq!(config.sample_rate_hz, 50.0);
        assert_eq!(config.ntp_timeout, Duration::from_millis(250));
        assert_eq!(SenderConfig::default().time_source, TimeSource::Ntp);

        assert!(SenderConfig::from_yaml_str("sample_rate_hz: 0\n").is_err());
        assert!(SenderConfig::from_yaml_str("time_source: sundial\n").is_err());
    }

    #[test]
    fn invalid_receiver_settings_are_rejected() {
        let tiny = ReceiverConfig { buffer_size: 16, ..Default::default() };
        assert!(tiny.validate().is_err());

        let mut no_room = ReceiverConfig::default();
        no_room.reassembly.max_pending = 0;
        assert!(no_room.validate().is_err());

        let stalled = ReceiverConfig { sample_rate_hz: 0.0, ..Default::default() };
        assert!(stalled.validate().is_err());
    }

    #[test]
    fn config_loads_from_file() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "source_number: 3\nschema_path: /tmp/schema.json")?;

        let config = ReceiverConfig::from_file(file.path())?;
        assert_eq!(config.source_number, 3);
        assert_eq!(config.schema_path, Some(PathBuf::from("/tmp/schema.json")));

        let missing = ReceiverConfig::from_file("/nonexistent/receiver.yaml").unwrap_err();
        assert!(matches!(missing, ProtocolError::Io { .. }));
        Ok(())
    }

    #[test]
    fn yaml_round_trips_through_serialize() {
        let config = ReceiverConfig::for_source(9);
        let text = serde_yaml_ng::to_string(&config).unwrap();
        assert_eq!(ReceiverConfig::from_yaml_str(&text).unwrap(), config);
    }
}
