//! Configuration loading for the reader host.
//!
//! All tunables live in `conf/config.toml` (grouped into `[logging]`, `[host]`,
//! `[playback]` and `[page]` tables). Missing or invalid entries fall back to
//! defaults so the host can always start.

mod defaults;
mod io;
mod models;
mod tables;

pub use io::{load_config, parse_config};
pub use models::{AppConfig, Framing, LogLevel};
