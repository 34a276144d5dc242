use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures::FutureExt;
use serde_json::{json, Value};

use streamgate_core::config::InvokeMode;

use crate::context::InvocationContext;
use crate::encoder::ResponseEncoder;
use crate::event::InboundEvent;
use crate::frame::{decode_frame, FrameError};
use crate::handler::RequestHandler;
use crate::init::ColdStart;
use crate::request::{ensure_content_length, translate};
use crate::sink::{BufferedSink, ResponseSink};
use crate::warmer::WarmInterceptor;

const FAILURE_MESSAGE: &str = "Server failed to respond.";

/// How an invocation was answered.
#[derive(Clone, Debug, PartialEq)]
pub enum Invocation {
    /// Keep-warm ping; the host returns the sentinel as the invocation result.
    Warmed(String),
    /// The response went out through the sink.
    Streamed,
    /// The whole response is the invocation result; the sink was not used.
    Buffered(Value),
}

/// Bridges platform invocations to a [`RequestHandler`].
pub struct LambdaAdapter<H> {
    handler: H,
    cold_start: Arc<ColdStart>,
    warmer: WarmInterceptor,
}

impl<H> LambdaAdapter<H>
where
    H: RequestHandler,
{
    pub fn new(handler: H, cold_start: Arc<ColdStart>) -> Self {
        let warmer = cold_start.warm_interceptor();
        Self {
            handler,
            cold_start,
            warmer,
        }
    }

    pub fn cold_start(&self) -> &ColdStart {
        &self.cold_start
    }

    /// Serve one invocation, streaming the framed response into `sink`.
    ///
    /// Handler failures (errors and panics) never escape: before headers are
    /// sent they become a JSON error body, afterwards the stream is just ended.
    pub async fn handle<S>(&self, event: Value, context: &InvocationContext, sink: S) -> Invocation
    where
        S: ResponseSink + 'static,
    {
        if self.warmer.intercept(&event, context) {
            return Invocation::Warmed(self.warmer.sentinel().to_string());
        }

        let mut request = translate(InboundEvent::from_value(event));
        ensure_content_length(&mut request);
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        if let Some(remaining) = context.remaining() {
            log::debug!(
                "[{}] {method} {path} ({}ms before deadline)",
                context.request_id,
                remaining.as_millis()
            );
        }

        let mut encoder = ResponseEncoder::new(sink);
        let outcome = AssertUnwindSafe(self.handler.call(request, &mut encoder))
            .catch_unwind()
            .await;

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(format!("{err:#}")),
            Err(panic) => Some(panic_message(panic.as_ref())),
        };

        match failure {
            Some(details) => {
                log::error!(
                    "[{}] {method} {path} failed: {details}",
                    context.request_id
                );
                if !encoder.headers_sent() {
                    encoder.set_header("content-type", "application/json");
                    let body = json!({ "message": FAILURE_MESSAGE, "details": details });
                    encoder.write(body.to_string());
                }
                encoder.end();
            }
            None if !encoder.is_closed() => {
                log::debug!("[{}] handler returned without ending the response", context.request_id);
                encoder.end();
            }
            None => {}
        }

        if self.cold_start.mode().is_production() {
            log::debug!("[{}] {method} {path} -> {}", context.request_id, encoder.status());
        } else {
            log::info!("[{}] {method} {path} -> {}", context.request_id, encoder.status());
        }
        Invocation::Streamed
    }

    /// Serve one invocation in the shape chosen by `[runtime] invoke_mode`.
    pub async fn invoke<S>(&self, event: Value, context: &InvocationContext, sink: S) -> Invocation
    where
        S: ResponseSink + 'static,
    {
        match self.cold_start.invoke_mode() {
            InvokeMode::ResponseStream => self.handle(event, context, sink).await,
            InvokeMode::Buffered => self.buffered(event, context).await,
        }
    }

    /// Serve one invocation for hosts that expect the whole response as the
    /// invocation result instead of a stream.
    pub async fn handle_buffered(&self, event: Value, context: &InvocationContext) -> Value {
        match self.buffered(event, context).await {
            Invocation::Warmed(sentinel) => Value::String(sentinel),
            Invocation::Buffered(value) => value,
            Invocation::Streamed => Value::Null,
        }
    }

    async fn buffered(&self, event: Value, context: &InvocationContext) -> Invocation {
        let (sink, output) = BufferedSink::new();
        if let Invocation::Warmed(sentinel) = self.handle(event, context, sink).await {
            return Invocation::Warmed(sentinel);
        }

        let frame = output.bytes();
        let response = match BufferedResponse::from_frame(&frame) {
            Ok(response) => response,
            Err(err) => {
                log::error!("[{}] unreadable response frame: {err}", context.request_id);
                BufferedResponse::failure(&err.to_string())
            }
        };
        Invocation::Buffered(response.into_value())
    }
}

/// Whole-response result shape for buffered invocations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferedResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub cookies: Vec<String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl BufferedResponse {
    /// Decode a complete framed response. Bodies that are not valid UTF-8 are
    /// base64 encoded.
    pub fn from_frame(frame: &[u8]) -> Result<Self, FrameError> {
        let (prelude, body) = decode_frame(frame)?;
        let (body, is_base64_encoded) = match std::str::from_utf8(body) {
            Ok(text) => (text.to_string(), false),
            Err(_) => (BASE64.encode(body), true),
        };
        Ok(Self {
            status_code: prelude.status_code,
            headers: prelude.headers,
            cookies: prelude.cookies.unwrap_or_default(),
            body,
            is_base64_encoded,
        })
    }

    fn failure(details: &str) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Self {
            status_code: 500,
            headers,
            cookies: Vec::new(),
            body: json!({ "message": FAILURE_MESSAGE, "details": details }).to_string(),
            is_base64_encoded: false,
        }
    }

    pub fn into_value(self) -> Value {
        json!({
            "statusCode": self.status_code,
            "headers": self.headers,
            "cookies": self.cookies,
            "body": self.body,
            "isBase64Encoded": self.is_base64_encoded,
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("handler panicked: {message}")
    } else {
        "handler panicked".to_string()
    }
}
