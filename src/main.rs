//! Native-messaging host for the Kindsight reader.
//!
//! The browser launches this binary and speaks the host protocol over
//! stdin/stdout, so every log line goes to stderr.
//! - Parse command-line arguments.
//! - Load configuration from `conf/config.toml` or `--config <path>`.
//! - Run the coordinator bridge until the browser closes the pipe.

use anyhow::{Context, Result, anyhow};
use kindsight_reader::config::load_config;
use kindsight_reader::host::run_host;
use std::env;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

const DEFAULT_CONFIG_PATH: &str = "conf/config.toml";

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let config_path = parse_args()?;
    let config = load_config(&config_path);
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(
        path = %config_path.display(),
        level = %config.log_level,
        framing = %config.framing,
        "Starting reader host"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build the async runtime")?;
    runtime
        .block_on(run_host(&config, tokio::io::stdin(), tokio::io::stdout()))
        .context("Host bridge failed")?;
    info!("Browser closed the channel; exiting");
    Ok(())
}

/// Browsers append their own arguments (the caller origin, a parent window
/// handle), so anything besides `--config` is ignored.
fn parse_args() -> Result<PathBuf> {
    let mut args = env::args().skip(1);
    let mut path = PathBuf::from(DEFAULT_CONFIG_PATH);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            let value = args
                .next()
                .ok_or_else(|| anyhow!("Usage: kindsight-reader [--config <path>]"))?;
            path = PathBuf::from(value);
        } else if let Some(value) = arg.strip_prefix("--config=") {
            path = PathBuf::from(value);
        }
    }
    Ok(path)
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
