use crate::coordinator::CoordinatorSettings;
use crate::page::PageSettings;
use serde::Deserialize;
use std::time::Duration;

/// High-level host configuration; deserializable from TOML.
#[derive(Debug, Clone, PartialEq, Deserialize, serde::Serialize)]
pub struct AppConfig {
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
    #[serde(default = "crate::config::defaults::default_framing")]
    pub framing: Framing,
    #[serde(default = "crate::config::defaults::default_rate")]
    pub default_rate: f32,
    #[serde(default = "crate::config::defaults::default_voice")]
    pub default_voice: String,
    #[serde(default = "crate::config::defaults::default_watchdog_timeout_ms")]
    pub watchdog_timeout_ms: u64,
    #[serde(default = "crate::config::defaults::default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "crate::config::defaults::default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "crate::config::defaults::default_chunk_max_chars")]
    pub chunk_max_chars: usize,
    #[serde(default = "crate::config::defaults::default_highlight_prefix_chars")]
    pub highlight_prefix_chars: usize,
    #[serde(default = "crate::config::defaults::default_bubble_idle_ms")]
    pub bubble_idle_ms: u64,
    #[serde(default = "crate::config::defaults::default_bubble_leave_ms")]
    pub bubble_leave_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            log_level: crate::config::defaults::default_log_level(),
            framing: crate::config::defaults::default_framing(),
            default_rate: crate::config::defaults::default_rate(),
            default_voice: crate::config::defaults::default_voice(),
            watchdog_timeout_ms: crate::config::defaults::default_watchdog_timeout_ms(),
            retry_delay_ms: crate::config::defaults::default_retry_delay_ms(),
            max_retries: crate::config::defaults::default_max_retries(),
            chunk_max_chars: crate::config::defaults::default_chunk_max_chars(),
            highlight_prefix_chars: crate::config::defaults::default_highlight_prefix_chars(),
            bubble_idle_ms: crate::config::defaults::default_bubble_idle_ms(),
            bubble_leave_ms: crate::config::defaults::default_bubble_leave_ms(),
        }
    }
}

impl AppConfig {
    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            watchdog_timeout: Duration::from_millis(self.watchdog_timeout_ms.max(1)),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            max_retries: self.max_retries,
            default_rate: self.default_rate,
            default_voice: self.default_voice.clone(),
        }
    }

    pub fn page_settings(&self) -> PageSettings {
        PageSettings {
            chunk_max_chars: self.chunk_max_chars.max(1),
            highlight_prefix_chars: self.highlight_prefix_chars.max(1),
            bubble_idle: Duration::from_millis(self.bubble_idle_ms),
            bubble_leave: Duration::from_millis(self.bubble_leave_ms),
        }
    }
}

/// Wire framing on stdin/stdout.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// Browser native messaging: 4-byte native-endian length prefix.
    Native,
    /// One JSON document per line; handy for manual testing.
    Lines,
}

impl Default for Framing {
    fn default() -> Self {
        Framing::Native
    }
}

impl std::fmt::Display for Framing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Framing::Native => "native",
            Framing::Lines => "lines",
        };
        write!(f, "{}", label)
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
