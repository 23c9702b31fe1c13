pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Info
}

pub(crate) fn default_framing() -> crate::config::Framing {
    crate::config::Framing::Native
}

pub(crate) fn default_rate() -> f32 {
    1.0
}

pub(crate) fn default_voice() -> String {
    String::new()
}

pub(crate) fn default_watchdog_timeout_ms() -> u64 {
    8_000
}

pub(crate) fn default_retry_delay_ms() -> u64 {
    250
}

pub(crate) fn default_max_retries() -> u32 {
    3
}

pub(crate) fn default_chunk_max_chars() -> usize {
    250
}

pub(crate) fn default_highlight_prefix_chars() -> usize {
    50
}

pub(crate) fn default_bubble_idle_ms() -> u64 {
    20_000
}

pub(crate) fn default_bubble_leave_ms() -> u64 {
    3_000
}
