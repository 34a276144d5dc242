use std::sync::OnceLock;

use log::LevelFilter;
use simple_logger::SimpleLogger;

use crate::config::LoggingConfig;

static LOGGER_INSTALLED: OnceLock<LevelFilter> = OnceLock::new();

pub struct Logging;

impl Logging {
    /// Install the process-wide logger once. Later calls return the level chosen
    /// by the first call, even if their configuration differs.
    pub fn init(config: &LoggingConfig) -> LevelFilter {
        *LOGGER_INSTALLED.get_or_init(|| {
            let level = config.level_filter();
            // Another logger may already be registered by the host binary.
            if SimpleLogger::new().with_level(level).init().is_err() {
                log::debug!("a logger was already installed; keeping it");
            }
            level
        })
    }

    pub fn installed_level() -> Option<LevelFilter> {
        LOGGER_INSTALLED.get().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn init_is_idempotent() {
        let first = Logging::init(&LoggingConfig {
            level: LogLevel::Warn,
            echo_stdout: Some(true),
        });
        let second = Logging::init(&LoggingConfig {
            level: LogLevel::Trace,
            echo_stdout: Some(true),
        });
        assert_eq!(first, second);
        assert_eq!(Logging::installed_level(), Some(first));
    }
}
