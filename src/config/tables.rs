use super::defaults;
use super::models::{AppConfig, Framing, LogLevel};
use serde::Deserialize;

/// On-disk layout: the flat `AppConfig` grouped into TOML tables.
#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    host: HostConfig,
    #[serde(default)]
    playback: PlaybackConfig,
    #[serde(default)]
    page: PageConfig,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            log_level: tables.logging.log_level,
            framing: tables.host.framing,
            default_rate: tables.playback.default_rate,
            default_voice: tables.playback.default_voice,
            watchdog_timeout_ms: tables.playback.watchdog_timeout_ms,
            retry_delay_ms: tables.playback.retry_delay_ms,
            max_retries: tables.playback.max_retries,
            chunk_max_chars: tables.page.chunk_max_chars,
            highlight_prefix_chars: tables.page.highlight_prefix_chars,
            bubble_idle_ms: tables.page.bubble_idle_ms,
            bubble_leave_ms: tables.page.bubble_leave_ms,
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct HostConfig {
    #[serde(default = "defaults::default_framing")]
    framing: Framing,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            framing: defaults::default_framing(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct PlaybackConfig {
    #[serde(default = "defaults::default_rate")]
    default_rate: f32,
    #[serde(default = "defaults::default_voice")]
    default_voice: String,
    #[serde(default = "defaults::default_watchdog_timeout_ms")]
    watchdog_timeout_ms: u64,
    #[serde(default = "defaults::default_retry_delay_ms")]
    retry_delay_ms: u64,
    #[serde(default = "defaults::default_max_retries")]
    max_retries: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        PlaybackConfig {
            default_rate: defaults::default_rate(),
            default_voice: defaults::default_voice(),
            watchdog_timeout_ms: defaults::default_watchdog_timeout_ms(),
            retry_delay_ms: defaults::default_retry_delay_ms(),
            max_retries: defaults::default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct PageConfig {
    #[serde(default = "defaults::default_chunk_max_chars")]
    chunk_max_chars: usize,
    #[serde(default = "defaults::default_highlight_prefix_chars")]
    highlight_prefix_chars: usize,
    #[serde(default = "defaults::default_bubble_idle_ms")]
    bubble_idle_ms: u64,
    #[serde(default = "defaults::default_bubble_leave_ms")]
    bubble_leave_ms: u64,
}

impl Default for PageConfig {
    fn default() -> Self {
        PageConfig {
            chunk_max_chars: defaults::default_chunk_max_chars(),
            highlight_prefix_chars: defaults::default_highlight_prefix_chars(),
            bubble_idle_ms: defaults::default_bubble_idle_ms(),
            bubble_leave_ms: defaults::default_bubble_leave_ms(),
        }
    }
}
