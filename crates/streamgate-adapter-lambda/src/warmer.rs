use serde_json::Value;
use streamgate_core::config::WarmerConfig;

use crate::context::InvocationContext;

const CONCURRENCY_FIELD: &str = "concurrency";

/// Recognizes scheduled keep-warm pings so they can be answered without
/// touching the handler. Works on the raw event; nothing else is parsed.
#[derive(Clone, Debug)]
pub struct WarmInterceptor {
    enabled: bool,
    marker: String,
    sentinel: String,
}

impl WarmInterceptor {
    pub fn new(config: &WarmerConfig) -> Self {
        Self {
            enabled: config.enabled,
            marker: config.marker.clone(),
            sentinel: config.sentinel.clone(),
        }
    }

    /// True when the event carries the marker field set to boolean `true`.
    pub fn intercept(&self, event: &Value, context: &InvocationContext) -> bool {
        if !self.enabled || event.get(&self.marker) != Some(&Value::Bool(true)) {
            return false;
        }

        match event.get(CONCURRENCY_FIELD).and_then(Value::as_u64) {
            Some(concurrency) => log::info!(
                "[{}] warm invocation (concurrency hint {concurrency})",
                context.request_id
            ),
            None => log::info!("[{}] warm invocation", context.request_id),
        }
        true
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }
}

impl Default for WarmInterceptor {
    fn default() -> Self {
        Self::new(&WarmerConfig::default())
    }
}
