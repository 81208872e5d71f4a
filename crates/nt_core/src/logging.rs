use std::fs::File;
use std::path::PathBuf;
use std::sync::{Mutex, Once};

use tracing::Level;

static INIT: Once = Once::new();

/// Where log lines go.
#[derive(Debug, Clone)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
    /// Nothing is installed; used by the full-screen reader without a log file.
    Disabled,
}

/// Installs the global subscriber once per process.
pub fn init_logging(level: Level, target: LogTarget) -> crate::Result<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let mut result = Ok(());
    INIT.call_once(|| {
        result = match target {
            LogTarget::Stderr => {
                tracing_subscriber::fmt()
                    .with_max_level(level)
                    .with_writer(std::io::stderr)
                    .init();
                Ok(())
            }
            LogTarget::File(path) => File::create(&path).map(|file| {
                tracing_subscriber::fmt()
                    .with_max_level(level)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }),
            LogTarget::Disabled => Ok(()),
        }
        .map_err(crate::Error::from);
    });
    result
}

/// Prefixes every line with a context such as `💬 article 42`.
#[derive(Debug, Clone, Default)]
pub struct Logger {
    prefixes: Vec<String>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    fn prefix(&self) -> String {
        self.prefixes.iter().map(|p| format!("{} ", p)).collect()
    }

    pub fn info(&self, message: &str) {
        tracing::info!("{}{}", self.prefix(), message);
    }

    pub fn error(&self, message: &str) {
        tracing::error!("{}{}", self.prefix(), message);
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!("{}{}", self.prefix(), message);
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!("{}{}", self.prefix(), message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_stack() {
        let logger = Logger::new().with_prefix("💬").with_prefix("article 4");
        assert_eq!(logger.prefix(), "💬 article 4 ");
        assert_eq!(Logger::new().prefix(), "");
    }

    #[test]
    fn test_disabled_target_installs_nothing() {
        init_logging(Level::DEBUG, LogTarget::Disabled).unwrap();
        logger_smoke();
    }

    fn logger_smoke() {
        let logger = Logger::new().with_prefix("test");
        logger.info("info");
        logger.warn("warn");
        logger.error("error");
        logger.debug("debug");
    }
}
