//! Logging init: a timestamped log file per run, mirrored to the console.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use time::macros::format_description;
use time::OffsetDateTime;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::progress::suspend_active;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("time formatting failed: {0}")]
    Time(#[from] time::error::Format),
    #[error("subscriber init failed: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
}

#[derive(Clone, Debug)]
pub struct LogOptions {
    pub log_dir: PathBuf,
    pub debug: bool,
    pub use_color: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("."),
            debug: false,
            use_color: true,
        }
    }
}

/// Keeps the file writer alive; drop it last so buffered lines are flushed.
pub struct LogGuard {
    path: PathBuf,
    _guard: WorkerGuard,
}

impl LogGuard {
    /// The log file of this run.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Stderr writer that lifts the progress bar off the terminal while a line is
/// written, so log lines and the bar do not interleave.
#[derive(Clone, Copy, Debug, Default)]
struct ConsoleWriterMake;

impl<'a> MakeWriter<'a> for ConsoleWriterMake {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter
    }
}

struct ConsoleWriter;

impl Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        suspend_active(|| io::stderr().write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        suspend_active(|| io::stderr().write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// `log_<YYYYMMDD_HHMMSS>.txt` for the given instant.
pub fn log_file_name(at: OffsetDateTime) -> Result<String, LogError> {
    let stamp = at.format(format_description!(
        "[year][month][day]_[hour][minute][second]"
    ))?;
    Ok(format!("log_{stamp}.txt"))
}

/// Install the global subscriber.
///
/// The console layer honours `RUST_LOG` and otherwise shows INFO (DEBUG with
/// `debug`); the file layer always records at the same level without colour.
pub fn init_logging(options: &LogOptions) -> Result<LogGuard, LogError> {
    fs::create_dir_all(&options.log_dir)?;

    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let path = options.log_dir.join(log_file_name(now)?);
    let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;

    let (file_writer, guard) = NonBlockingBuilder::default().lossy(false).finish(file);

    let level = if options.debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let console_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(options.use_color)
        .with_writer(ConsoleWriterMake)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(false)
        .with_writer(file_writer)
        .with_filter(level);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(LogGuard {
        path,
        _guard: guard,
    })
}
