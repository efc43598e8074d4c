//! Inclusion filter evaluated against every decoded message.
//!
//! Each configured dimension must hold for a message to be accepted; an
//! unset dimension places no constraint, so the default filter accepts
//! everything.

use std::fmt;
use std::net::IpAddr;

use crate::config::{FilterSettings, MessageTypeSetting};
use crate::protocol::DecodedMessage;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterConfig {
    pub source_ip: Option<IpAddr>,
    pub dest_ip: Option<IpAddr>,
    pub message_type: Option<u8>,
    /// Inclusive lower bound on the datagram size.
    pub min_length: Option<usize>,
    /// Inclusive upper bound on the datagram size.
    pub max_length: Option<usize>,
}

impl FilterConfig {
    /// Build a filter from externally supplied settings.
    ///
    /// Values that cannot be interpreted leave their dimension unconstrained
    /// (with a warning) rather than failing; zero-valued settings mean
    /// "unset".
    pub fn from_settings(settings: &FilterSettings) -> Self {
        FilterConfig {
            source_ip: parse_ip("source_ip", settings.source_ip.as_deref()),
            dest_ip: parse_ip("dest_ip", settings.dest_ip.as_deref()),
            message_type: settings.message_type.as_ref().and_then(parse_message_type),
            min_length: non_zero(settings.min_length),
            max_length: non_zero(settings.max_length),
        }
    }

    /// True when no dimension is configured.
    pub fn is_unconstrained(&self) -> bool {
        *self == FilterConfig::default()
    }

    pub fn accepts(&self, msg: &DecodedMessage) -> bool {
        if let Some(ip) = self.source_ip {
            if msg.source_ip() != ip {
                return false;
            }
        }

        // A message without a resolved destination fails a destination constraint.
        if let Some(ip) = self.dest_ip {
            if msg.dest_ip() != Some(ip) {
                return false;
            }
        }

        if let Some(code) = self.message_type {
            if msg.message_type.code() != code {
                return false;
            }
        }

        let len = msg.len();
        if self.min_length.is_some_and(|min| len < min) {
            return false;
        }
        if self.max_length.is_some_and(|max| len > max) {
            return false;
        }

        true
    }
}

impl fmt::Display for FilterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unconstrained() {
            return f.write_str("none");
        }
        let mut parts = Vec::new();
        if let Some(ip) = self.source_ip {
            parts.push(format!("src={}", ip));
        }
        if let Some(ip) = self.dest_ip {
            parts.push(format!("dst={}", ip));
        }
        if let Some(code) = self.message_type {
            parts.push(format!("type={}", code));
        }
        if self.min_length.is_some() || self.max_length.is_some() {
            let bound = |b: Option<usize>| b.map_or_else(|| "*".to_string(), |v| v.to_string());
            parts.push(format!(
                "len=[{},{}]",
                bound(self.min_length),
                bound(self.max_length)
            ));
        }
        f.write_str(&parts.join(" "))
    }
}

fn non_zero(value: usize) -> Option<usize> {
    (value > 0).then_some(value)
}

fn parse_ip(dimension: &str, raw: Option<&str>) -> Option<IpAddr> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match raw.parse::<IpAddr>() {
        Ok(ip) => Some(ip),
        Err(err) => {
            tracing::warn!(dimension, value = raw, error = %err, "ignoring invalid filter address");
            None
        }
    }
}

fn parse_message_type(setting: &MessageTypeSetting) -> Option<u8> {
    let code = match setting {
        MessageTypeSetting::Code(code) => *code,
        MessageTypeSetting::Text(text) => match text.trim().parse::<i64>() {
            Ok(code) => code,
            Err(_) => {
                tracing::warn!(value = %text, "ignoring non-numeric message type filter");
                return None;
            }
        },
    };
    match u8::try_from(code) {
        Ok(0) => None,
        Ok(code) => Some(code),
        Err(_) => {
            tracing::warn!(value = code, "ignoring out-of-range message type filter");
            None
        }
    }
}
