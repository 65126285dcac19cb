//! Logging setup
//!
//! Console output goes to stderr so stdout stays free for measurement
//! output. File output is rolling and written from a background worker.

use crate::domain::settings::LogSettings;
use anyhow::Context;
use std::str::FromStr;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

/// Keeps the file writer alive; dropping it flushes pending log lines
pub struct LoggingGuard {
    _file_writer: Option<WorkerGuard>,
}

pub fn init_logger(settings: &LogSettings) -> anyhow::Result<LoggingGuard> {
    let console = settings
        .console_logging_enabled
        .then(|| console_layer(settings));

    let (file, file_writer) = if settings.file_logging_enabled {
        let (layer, guard) = file_layer(settings)?;
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter(&settings.level))
        .with(console)
        .with(file)
        .try_init()
        .context("a global logger is already installed")?;

    tracing::info!("Logging initialized (level {})", settings.level);
    Ok(LoggingGuard {
        _file_writer: file_writer,
    })
}

/// RUST_LOG wins over the configured level
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::from_str(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn console_layer<S>(settings: &LogSettings) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(settings.show_file_line)
        .with_line_number(settings.show_file_line)
        .with_thread_ids(settings.show_thread_ids)
        .with_target(settings.show_target)
        .with_ansi(settings.ansi_colors)
}

fn file_layer<S>(settings: &LogSettings) -> anyhow::Result<(impl Layer<S>, WorkerGuard)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    std::fs::create_dir_all(&settings.log_dir)
        .with_context(|| format!("cannot create log directory '{}'", settings.log_dir))?;

    let appender = RollingFileAppender::new(
        rotation(&settings.rotation),
        &settings.log_dir,
        &settings.file_name_prefix,
    );
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_file(settings.show_file_line)
        .with_line_number(settings.show_file_line)
        .with_thread_ids(settings.show_thread_ids)
        .with_target(settings.show_target);
    Ok((layer, guard))
}

fn rotation(name: &str) -> Rotation {
    match name.to_lowercase().as_str() {
        "minutely" => Rotation::MINUTELY,
        "hourly" => Rotation::HOURLY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}
