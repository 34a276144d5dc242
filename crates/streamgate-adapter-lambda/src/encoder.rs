use std::fmt;

use bytes::Bytes;
use streamgate_core::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

use crate::frame::{MetadataPrelude, METADATA_PRELUDE_CONTENT_TYPE};
use crate::sink::ResponseSink;

/// Body emitted when a response ends without any content. Some consumers treat
/// a zero-length body as a protocol error.
const EMPTY_BODY_PLACEHOLDER: &[u8] = b"\n";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncoderState {
    /// Status and headers may still change.
    Open,
    /// The prelude has been written; only body bytes may follow.
    HeadersFinalized,
    /// The sink has been closed.
    Closed,
}

/// Response writer handed to the wrapped handler. Status and headers are kept
/// until the first body write (or an explicit flush), at which point the
/// metadata prelude is written to the sink exactly once.
pub struct ResponseEncoder {
    status: StatusCode,
    headers: HeaderMap,
    state: EncoderState,
    has_content: bool,
    sink_failed: bool,
    sink: Box<dyn ResponseSink>,
}

impl ResponseEncoder {
    pub fn new<S>(sink: S) -> Self
    where
        S: ResponseSink + 'static,
    {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            state: EncoderState::Open,
            has_content: false,
            sink_failed: false,
            sink: Box::new(sink),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn state(&self) -> EncoderState {
        self.state
    }

    pub fn headers_sent(&self) -> bool {
        self.state != EncoderState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state == EncoderState::Closed
    }

    pub fn has_content(&self) -> bool {
        self.has_content
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of `name`, if it is valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn set_status(&mut self, status: StatusCode) {
        if self.reject_after_flush("set status") {
            return;
        }
        self.status = status;
    }

    /// Replace every value of `name` with `value`.
    pub fn set_header(&mut self, name: &str, value: impl AsRef<str>) {
        self.set_header_values(name, [value]);
    }

    /// Replace every value of `name` with `values`. Invalid names or values
    /// are dropped with a warning.
    pub fn set_header_values<I, V>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: AsRef<str>,
    {
        if self.reject_after_flush("set header") {
            return;
        }
        let Some(name) = parse_name(name) else {
            return;
        };
        self.headers.remove(&name);
        for value in values {
            if let Some(value) = parse_value(&name, value.as_ref()) {
                self.headers.append(name.clone(), value);
            }
        }
    }

    /// Replace each header present in `headers`, keeping all of its values.
    pub fn copy_headers(&mut self, headers: &HeaderMap) {
        if self.reject_after_flush("copy headers") {
            return;
        }
        for name in headers.keys() {
            self.headers.remove(name);
            for value in headers.get_all(name) {
                self.headers.append(name.clone(), value.clone());
            }
        }
    }

    pub fn append_header(&mut self, name: &str, value: impl AsRef<str>) {
        if self.reject_after_flush("append header") {
            return;
        }
        let Some(name) = parse_name(name) else {
            return;
        };
        if let Some(value) = parse_value(&name, value.as_ref()) {
            self.headers.append(name, value);
        }
    }

    pub fn remove_header(&mut self, name: &str) {
        if self.reject_after_flush("remove header") {
            return;
        }
        self.headers.remove(name);
    }

    /// Write the prelude if it has not been written yet.
    pub fn flush_headers(&mut self) {
        if self.state != EncoderState::Open {
            return;
        }
        self.state = EncoderState::HeadersFinalized;

        let prelude = MetadataPrelude::from_parts(self.status, &self.headers);
        self.sink.set_content_type(METADATA_PRELUDE_CONTENT_TYPE);
        match prelude.encode() {
            Ok(frame) => self.send(frame),
            Err(err) => log::error!("failed to serialize metadata prelude: {err}"),
        }
    }

    pub fn write(&mut self, chunk: impl Into<Bytes>) {
        if self.state == EncoderState::Closed {
            log::warn!("write after end ignored");
            return;
        }
        self.flush_headers();

        let chunk = chunk.into();
        if chunk.is_empty() {
            return;
        }
        self.has_content = true;
        self.send(chunk);
    }

    /// Finish the response. A response that never carried content gets a
    /// single newline so the body is never empty. Repeated calls are no-ops.
    pub fn end(&mut self) {
        if self.state == EncoderState::Closed {
            log::debug!("end called on a closed response");
            return;
        }
        self.flush_headers();
        if !self.has_content {
            self.send(Bytes::from_static(EMPTY_BODY_PLACEHOLDER));
        }
        self.sink.close();
        self.state = EncoderState::Closed;
    }

    pub fn end_with(&mut self, chunk: impl Into<Bytes>) {
        self.write(chunk);
        self.end();
    }

    fn send(&mut self, chunk: Bytes) {
        if self.sink_failed {
            return;
        }
        if let Err(err) = self.sink.write(chunk) {
            log::warn!("response sink failed, dropping remaining output: {err}");
            self.sink_failed = true;
        }
    }

    fn reject_after_flush(&self, operation: &str) -> bool {
        if self.headers_sent() {
            log::warn!("cannot {operation} after headers were sent");
            true
        } else {
            false
        }
    }
}

fn parse_name(name: &str) -> Option<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| log::warn!("ignoring response header with invalid name {name:?}"))
        .ok()
}

fn parse_value(name: &HeaderName, value: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| log::warn!("ignoring invalid value for response header {name}"))
        .ok()
}

impl fmt::Debug for ResponseEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseEncoder")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("state", &self.state)
            .field("has_content", &self.has_content)
            .finish_non_exhaustive()
    }
}
