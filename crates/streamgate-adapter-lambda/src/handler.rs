use std::future::Future;

use async_trait::async_trait;
use futures_util::StreamExt;
use streamgate_core::error::HandlerError;
use streamgate_core::http::{Request, Response};

use crate::encoder::ResponseEncoder;

/// The application seam: receives the translated request and writes its
/// response through the encoder, status and headers first, then body chunks.
#[async_trait(?Send)]
pub trait RequestHandler {
    async fn call(&self, request: Request, response: &mut ResponseEncoder) -> anyhow::Result<()>;
}

/// Adapts a function that returns a complete `Response` (buffered or streaming
/// body) onto the encoder. `HandlerError`s become JSON error responses with
/// their own status; only body stream failures reach the invocation adapter.
pub struct ServiceHandler<F> {
    service: F,
}

impl<F, Fut> ServiceHandler<F>
where
    F: Fn(Request) -> Fut,
    Fut: Future<Output = Result<Response, HandlerError>>,
{
    pub fn new(service: F) -> Self {
        Self { service }
    }
}

#[async_trait(?Send)]
impl<F, Fut> RequestHandler for ServiceHandler<F>
where
    F: Fn(Request) -> Fut,
    Fut: Future<Output = Result<Response, HandlerError>>,
{
    async fn call(&self, request: Request, response: &mut ResponseEncoder) -> anyhow::Result<()> {
        let produced = match (self.service)(request).await {
            Ok(produced) => produced,
            Err(err) => {
                log::warn!("handler returned {}: {err}", err.status());
                err.into_response()
            }
        };
        write_response(produced, response).await
    }
}

/// Copy status, headers and body of `response` into the encoder and end it.
/// Body chunks are forwarded as they arrive.
pub async fn write_response(
    response: Response,
    encoder: &mut ResponseEncoder,
) -> anyhow::Result<()> {
    let (parts, body) = response.into_parts();
    encoder.set_status(parts.status);
    encoder.copy_headers(&parts.headers);

    let mut chunks = body.into_stream();
    while let Some(chunk) = chunks.next().await {
        encoder.write(chunk?);
    }
    encoder.end();
    Ok(())
}
