//! Configuration for the display bridge.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ecm_core::{DecoderTiming, EcmError, Endpoint, FillMode, LineMap};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// GPIO line assignment.
    pub lines: LinesConfig,
    /// Handshake delays.
    pub timing: TimingConfig,
    /// Framebuffer output.
    pub framebuffer: FramebufferConfig,
    /// TCP relay settings.
    pub network: NetworkConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// GPIO chip and line offsets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinesConfig {
    /// Chip name under /dev, or an absolute path.
    pub chip: String,
    /// Data line offsets, first entry is the least-significant bit.
    pub data: [u32; 4],
    /// Clock input; a rising edge means a nibble is ready.
    pub clock: u32,
    /// Ack output, pulsed after each nibble.
    pub ack: u32,
    /// Start input, held low for the duration of a transaction.
    pub start: u32,
    /// Status outputs carrying the byte index, first entry is the LSB.
    pub status: [u32; 3],
    /// Consumer label attached to every requested line.
    pub consumer: String,
}

/// Handshake delays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Settling delay after a clock edge before sampling, in microseconds.
    pub settle_us: u64,
    /// Ack pulse width in microseconds.
    pub ack_hold_us: u64,
    /// Start-line poll interval while idle, in milliseconds.
    pub idle_poll_ms: u64,
}

/// Framebuffer output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FramebufferConfig {
    /// Framebuffer device path.
    pub device: String,
    /// Zero the whole mapped buffer at startup.
    pub clear_on_start: bool,
    /// Fill region: "whole" (entire mapped buffer) or "visible".
    pub fill_mode: FillMode,
}

/// TCP relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Renderer host the relay connects to.
    pub host: String,
    /// Port the relay connects to and the server listens on.
    pub port: u16,
    /// Address the server binds.
    pub bind: String,
    /// Connect timeout for each relayed packet, in milliseconds.
    pub connect_timeout_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for LinesConfig {
    fn default() -> Self {
        let map = LineMap::default();
        Self {
            chip: map.chip,
            data: map.data,
            clock: map.clock,
            ack: map.ack,
            start: map.start,
            status: map.status,
            consumer: map.consumer,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_us: 10,
            ack_hold_us: 10,
            idle_poll_ms: 1,
        }
    }
}

impl Default for FramebufferConfig {
    fn default() -> Self {
        Self {
            device: "/dev/fb0".into(),
            clear_on_start: true,
            fill_mode: FillMode::Whole,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            bind: "0.0.0.0".into(),
            connect_timeout_ms: 1000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl BridgeConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults. A file that exists but cannot
    /// be read or parsed is an error, so a typo never silently swaps in
    /// the default line assignment.
    pub fn load(path: &Path) -> Result<Self, EcmError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(EcmError::InvalidConfig(format!(
                    "reading {}: {e}",
                    path.display()
                )));
            }
        };
        toml::from_str(&contents)
            .map_err(|e| EcmError::InvalidConfig(format!("parsing {}: {e}", path.display())))
    }

    /// Check everything that would otherwise fail halfway through startup.
    pub fn validate(&self) -> Result<(), EcmError> {
        self.line_map().validate()?;
        if self.network.port == 0 {
            return Err(EcmError::InvalidConfig("network.port must be non-zero".into()));
        }
        if self.network.host.is_empty() {
            return Err(EcmError::InvalidConfig("network.host is empty".into()));
        }
        if self.network.connect_timeout_ms == 0 {
            return Err(EcmError::InvalidConfig(
                "network.connect_timeout_ms must be non-zero".into(),
            ));
        }
        if self.framebuffer.device.is_empty() {
            return Err(EcmError::InvalidConfig("framebuffer.device is empty".into()));
        }
        Ok(())
    }

    /// Convert the `[lines]` section into a `LineMap`.
    pub fn line_map(&self) -> LineMap {
        LineMap {
            chip: self.lines.chip.clone(),
            data: self.lines.data,
            clock: self.lines.clock,
            ack: self.lines.ack,
            start: self.lines.start,
            status: self.lines.status,
            consumer: self.lines.consumer.clone(),
        }
    }

    /// Convert the `[timing]` section into `DecoderTiming`.
    pub fn decoder_timing(&self) -> DecoderTiming {
        DecoderTiming {
            settle: Duration::from_micros(self.timing.settle_us),
            ack_hold: Duration::from_micros(self.timing.ack_hold_us),
            idle_poll: Duration::from_millis(self.timing.idle_poll_ms),
        }
    }

    /// Where the relay sends packets.
    pub fn relay_endpoint(&self) -> Endpoint {
        Endpoint::new(self.network.host.clone(), self.network.port)
    }

    /// Where the server listens.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.network.bind, self.network.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.network.connect_timeout_ms)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = BridgeConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("clock"));
        assert!(text.contains("fill_mode = \"whole\""));
        assert!(text.contains("/dev/fb0"));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = BridgeConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: BridgeConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.port, 5000);
        assert_eq!(parsed.lines.data, [5, 6, 13, 19]);
        assert_eq!(parsed.lines.status, [2, 3, 4]);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let parsed: BridgeConfig = toml::from_str(
            r#"
            [network]
            host = "10.0.0.7"

            [framebuffer]
            fill_mode = "visible"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.network.host, "10.0.0.7");
        assert_eq!(parsed.network.port, 5000);
        assert_eq!(parsed.framebuffer.fill_mode, FillMode::Visible);
        assert_eq!(parsed.lines.clock, 26);
    }

    #[test]
    fn default_config_is_valid() {
        BridgeConfig::default().validate().unwrap();
    }

    #[test]
    fn validate_rejects_shared_lines_and_zero_port() {
        let mut cfg = BridgeConfig::default();
        cfg.lines.status[2] = cfg.lines.data[0];
        assert!(cfg.validate().is_err());

        let mut cfg = BridgeConfig::default();
        cfg.network.port = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn conversions() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.decoder_timing(), DecoderTiming::default());
        assert_eq!(cfg.line_map(), LineMap::default());
        assert_eq!(cfg.relay_endpoint().to_string(), "127.0.0.1:5000");
        assert_eq!(cfg.listen_address(), "0.0.0.0:5000");
        assert_eq!(cfg.connect_timeout(), Duration::from_secs(1));
    }

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let file = format!("ecm-bridge-{}-{name}.toml", std::process::id());
        let path = std::env::temp_dir().join(file);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = BridgeConfig::load(Path::new("/nonexistent/ecm-bridge.toml")).unwrap();
        assert_eq!(cfg.network.port, 5000);
    }

    #[test]
    fn load_reads_existing_file() {
        let path = write_temp("ok", "[lines]\nclock = 20\nack = 21\n");
        let cfg = BridgeConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(cfg.lines.clock, 20);
        assert_eq!(cfg.lines.ack, 21);
        assert_eq!(cfg.lines.start, 9);
    }

    #[test]
    fn malformed_lines_section_is_rejected() {
        let path = write_temp("bad", "[lines]\nclock = \"20\"\nack = 21\n");
        let result = BridgeConfig::load(&path);
        std::fs::remove_file(&path).ok();
        let err = result.unwrap_err();
        assert!(matches!(err, EcmError::InvalidConfig(_)));
        assert!(err.to_string().contains("parsing"));
    }
}
