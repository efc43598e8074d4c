use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

fn empty_path_none<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<PathBuf>::deserialize(deserializer)?;
    Ok(opt.and_then(|path| {
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    }))
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "config io error: {}", err),
            ConfigError::Parse(err) => write!(f, "config parse error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub filter: FilterSettings,
    pub display: DisplayConfig,
    pub stats: StatsConfig,
    pub run: RunConfig,
    pub output: OutputConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(ConfigError::Parse)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Local address to bind; the wildcard address listens on all interfaces.
    pub bind: String,
    pub port: u16,
    /// Receive timeout. Bounds how long a stop request can go unnoticed.
    pub timeout_ms: u64,
    /// Receive buffer size; longer datagrams are truncated by the socket.
    pub buffer_size: usize,
    /// Kernel socket receive buffer (SO_RCVBUF). `None` keeps the OS default.
    pub recv_buffer_bytes: Option<usize>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            bind: "0.0.0.0".into(),
            port: crate::PFCP_PORT,
            timeout_ms: 1000,
            buffer_size: crate::DEFAULT_BUFFER_SIZE,
            recv_buffer_bytes: None,
        }
    }
}

/// Message type as written by the user: either a number or free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageTypeSetting {
    Code(i64),
    Text(String),
}

/// Raw filter settings, as they come from the config file or command line.
/// Turned into a [`crate::filter::FilterConfig`] leniently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub source_ip: Option<String>,
    pub dest_ip: Option<String>,
    pub message_type: Option<MessageTypeSetting>,
    /// 0 = no lower bound.
    pub min_length: usize,
    /// 0 = no upper bound.
    pub max_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// One line per message instead of the detail view.
    pub compact: bool,
    pub show_details: bool,
    pub show_hex: bool,
    pub show_raw: bool,
    /// Suppress per-message output entirely; reports are still printed.
    pub quiet: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            compact: false,
            show_details: true,
            show_hex: true,
            show_raw: true,
            quiet: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Periodic reports. The final report on shutdown is always produced.
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        StatsConfig {
            enabled: true,
            interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Stop after this many accepted messages (0 = unlimited).
    pub count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Append every report as one JSON line to this file.
    #[serde(deserialize_with = "empty_path_none")]
    pub report_jsonl: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.capture.bind, "0.0.0.0");
        assert_eq!(cfg.capture.port, 8805);
        assert_eq!(cfg.capture.buffer_size, 4096);
        assert!(cfg.stats.enabled);
        assert_eq!(cfg.stats.interval_secs, 60);
        assert!(cfg.display.show_hex);
        assert_eq!(cfg.run.count, 0);
        assert!(cfg.output.report_jsonl.is_none());
        assert!(cfg.filter.message_type.is_none());
    }

    #[test]
    fn message_type_accepts_number_or_text() {
        let cfg = Config::from_toml("[filter]\nmessage_type = 7\n").unwrap();
        assert_eq!(cfg.filter.message_type, Some(MessageTypeSetting::Code(7)));

        let cfg = Config::from_toml("[filter]\nmessage_type = \"heartbeat\"\n").unwrap();
        assert_eq!(
            cfg.filter.message_type,
            Some(MessageTypeSetting::Text("heartbeat".into()))
        );
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let raw = r#"
            [capture]
            port = 18805

            [display]
            compact = true

            [output]
            report_jsonl = ""
        "#;
        let cfg = Config::from_toml(raw).unwrap();
        assert_eq!(cfg.capture.port, 18805);
        assert_eq!(cfg.capture.timeout_ms, 1000);
        assert!(cfg.display.compact);
        assert!(cfg.display.show_raw);
        assert!(cfg.output.report_jsonl.is_none());
    }

    #[test]
    fn reject_malformed_toml() {
        assert!(matches!(
            Config::from_toml("[capture\nport = 1"),
            Err(ConfigError::Parse(_))
        ));
    }
}
