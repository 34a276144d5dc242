use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use bytes::{Bytes, BytesMut};
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use streamgate_core::body::Body;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("response channel closed")]
    Closed,
    #[error("response channel write failed: {0}")]
    Io(#[from] io::Error),
}

/// Output channel the platform hands to an invocation.
pub trait ResponseSink {
    /// Designate the content type of the transport stream. Called before the
    /// first write.
    fn set_content_type(&mut self, content_type: &str);

    fn write(&mut self, chunk: Bytes) -> Result<(), SinkError>;

    /// Signal end of stream. Calling it more than once has no further effect.
    fn close(&mut self);
}

impl<S> ResponseSink for Box<S>
where
    S: ResponseSink + ?Sized,
{
    fn set_content_type(&mut self, content_type: &str) {
        (**self).set_content_type(content_type)
    }

    fn write(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        (**self).write(chunk)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

#[derive(Debug, Default)]
struct BufferedState {
    content_type: Option<String>,
    bytes: BytesMut,
    closed: bool,
}

/// Collects the whole stream in memory. Used for the buffered invocation shape.
#[derive(Debug)]
pub struct BufferedSink {
    state: Rc<RefCell<BufferedState>>,
}

/// Read side of a [`BufferedSink`].
#[derive(Clone, Debug)]
pub struct BufferedOutput {
    state: Rc<RefCell<BufferedState>>,
}

impl BufferedSink {
    pub fn new() -> (Self, BufferedOutput) {
        let state = Rc::new(RefCell::new(BufferedState::default()));
        (
            Self {
                state: Rc::clone(&state),
            },
            BufferedOutput { state },
        )
    }
}

impl ResponseSink for BufferedSink {
    fn set_content_type(&mut self, content_type: &str) {
        self.state.borrow_mut().content_type = Some(content_type.to_string());
    }

    fn write(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        let mut state = self.state.borrow_mut();
        if state.closed {
            return Err(SinkError::Closed);
        }
        state.bytes.extend_from_slice(&chunk);
        Ok(())
    }

    fn close(&mut self) {
        self.state.borrow_mut().closed = true;
    }
}

impl BufferedOutput {
    pub fn content_type(&self) -> Option<String> {
        self.state.borrow().content_type.clone()
    }

    pub fn bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.state.borrow().bytes)
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }
}

/// Forwards chunks over an unbounded channel so the host can drain the stream
/// while the handler is still producing it.
#[derive(Debug)]
pub struct ChannelSink {
    sender: UnboundedSender<Bytes>,
    content_type: Rc<RefCell<Option<String>>>,
}

/// Receiving end of a [`ChannelSink`].
#[derive(Debug)]
pub struct StreamingResponse {
    receiver: UnboundedReceiver<Bytes>,
    content_type: Rc<RefCell<Option<String>>>,
}

impl ChannelSink {
    pub fn new() -> (Self, StreamingResponse) {
        let (sender, receiver) = unbounded();
        let content_type = Rc::new(RefCell::new(None));
        (
            Self {
                sender,
                content_type: Rc::clone(&content_type),
            },
            StreamingResponse {
                receiver,
                content_type,
            },
        )
    }
}

impl ResponseSink for ChannelSink {
    fn set_content_type(&mut self, content_type: &str) {
        *self.content_type.borrow_mut() = Some(content_type.to_string());
    }

    fn write(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        self.sender
            .unbounded_send(chunk)
            .map_err(|_| SinkError::Closed)
    }

    fn close(&mut self) {
        self.sender.close_channel();
    }
}

impl StreamingResponse {
    /// Content type designated so far. Set before the first chunk is sent.
    pub fn content_type(&self) -> Option<String> {
        self.content_type.borrow().clone()
    }

    pub fn into_body(self) -> Body {
        Body::stream(self.receiver)
    }
}
