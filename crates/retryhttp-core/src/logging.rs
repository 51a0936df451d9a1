//! Logging setup for binaries using the client.
//!
//! The library itself only emits `tracing` events; nothing is printed unless
//! the embedding program installs a subscriber, e.g. with [`init_logging`].

use anyhow::Result;
use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,retryhttp=debug,retryhttp_core=debug";

/// `RUST_LOG` if set and valid, else [`DEFAULT_FILTER`].
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// `$XDG_STATE_HOME/retryhttp/retryhttp.log`.
pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("retryhttp")?;
    Ok(xdg_dirs.get_state_home().join("retryhttp").join("retryhttp.log"))
}

/// Hands out clones of the log file; a failed clone falls back to stderr for
/// that one event rather than dropping it.
struct LogFile(File);

enum LogWriter {
    File(File),
    Stderr,
}

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogWriter::File(f) => f.write(buf),
            LogWriter::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogWriter::File(f) => f.flush(),
            LogWriter::Stderr => io::stderr().lock().flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(LogWriter::File)
            .unwrap_or(LogWriter::Stderr)
    }
}

/// Log to [`log_file_path`], appending.
/// Returns Err if the file cannot be opened so the caller can use [`init_logging_stderr`].
pub fn init_logging() -> Result<()> {
    let path = log_file_path()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(BoxMakeWriter::new(LogFile(file)))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!("retryhttp logging to {}", path.display());
    Ok(())
}

/// Log to stderr only. Does nothing if a subscriber is already installed.
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(io::stderr)
        .with_ansi(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_lives_under_retryhttp_state_dir() {
        let path = log_file_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "retryhttp.log");
        assert!(path.parent().unwrap().ends_with("retryhttp"));
    }

    #[test]
    fn stderr_init_twice_is_harmless() {
        init_logging_stderr();
        init_logging_stderr();
        tracing::debug!("still alive");
    }
}
