use std::net::IpAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use streamgate_core::http::Request;

/// Invocation metadata attached to each translated request.
#[derive(Clone, Debug, Default)]
pub struct LambdaRequestContext {
    pub source_ip: Option<IpAddr>,
    pub request_id: Option<String>,
}

impl LambdaRequestContext {
    pub fn insert(request: &mut Request, context: LambdaRequestContext) {
        request.extensions_mut().insert(context);
    }

    pub fn get(request: &Request) -> Option<&LambdaRequestContext> {
        request.extensions().get::<LambdaRequestContext>()
    }
}

/// Per-invocation data supplied by the host runtime alongside the event.
#[derive(Clone, Debug, Default)]
pub struct InvocationContext {
    pub request_id: String,
    /// Invocation deadline in milliseconds since the Unix epoch.
    pub deadline_ms: Option<u64>,
}

impl InvocationContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            ..Self::default()
        }
    }

    pub fn with_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }

    /// Time left before the deadline; zero once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        let deadline = UNIX_EPOCH + Duration::from_millis(self.deadline_ms?);
        Some(
            deadline
                .duration_since(SystemTime::now())
                .unwrap_or_default(),
        )
    }
}
