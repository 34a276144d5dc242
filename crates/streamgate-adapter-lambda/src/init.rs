use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use log::LevelFilter;
use serde_json::Value;
use streamgate_core::config::{Config, ConfigError, InvokeMode, RuntimeMode};
use streamgate_core::logging::Logging;

use crate::warmer::WarmInterceptor;

static COLD_START: OnceLock<Arc<ColdStart>> = OnceLock::new();

/// Process-wide state prepared once per execution environment and shared,
/// read-only, by every invocation.
#[derive(Debug)]
pub struct ColdStart {
    config: Arc<Config>,
    app_config: Value,
    mode: RuntimeMode,
    working_dir: Option<PathBuf>,
}

impl ColdStart {
    /// Build cold-start state without touching process globals (logger,
    /// working directory). `initialize` is the entry point for real hosts.
    pub fn prepare(config: Arc<Config>) -> Result<Self, ConfigError> {
        let app_config = config.load_app_config()?;
        Ok(Self {
            mode: config.runtime.mode,
            working_dir: config.working_dir(),
            app_config,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parsed application configuration; `Value::Null` when none was found.
    pub fn app_config(&self) -> &Value {
        &self.app_config
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    pub fn invoke_mode(&self) -> InvokeMode {
        self.config.runtime.invoke_mode
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn warm_interceptor(&self) -> WarmInterceptor {
        WarmInterceptor::new(&self.config.warmer)
    }
}

/// Run cold-start work once per process: install the logger, pin the working
/// directory, record the runtime mode and load the application configuration.
/// Later calls return the first result and ignore their argument.
pub fn initialize(config: Arc<Config>) -> Result<Arc<ColdStart>, ConfigError> {
    if let Some(existing) = COLD_START.get() {
        return Ok(Arc::clone(existing));
    }

    let level = Logging::init(&config.logging);
    if let Some(dir) = config.working_dir() {
        std::env::set_current_dir(&dir).map_err(|source| ConfigError::Io {
            path: dir.clone(),
            source,
        })?;
        log::debug!("working directory pinned to {}", dir.display());
    }

    let prepared = Arc::new(ColdStart::prepare(config)?);
    if level != LevelFilter::Off {
        log::info!(
            "cold start complete (mode {}, invoke {:?})",
            prepared.mode().as_str(),
            prepared.invoke_mode()
        );
    }
    Ok(Arc::clone(COLD_START.get_or_init(|| prepared)))
}
