//! Runs a streamgate request handler inside a response-streaming serverless
//! function: translates inbound HTTP events and frames the handler's output.

mod adapter;
mod context;
mod encoder;
mod event;
mod frame;
mod handler;
pub mod headers;
mod init;
mod request;
mod sink;
mod warmer;

pub use adapter::{BufferedResponse, Invocation, LambdaAdapter};
pub use context::{InvocationContext, LambdaRequestContext};
pub use encoder::{EncoderState, ResponseEncoder};
pub use event::{HeaderField, HttpDescription, InboundEvent, RequestContext};
pub use frame::{
    decode_frame, FrameError, MetadataPrelude, DELIMITER_LEN, METADATA_PRELUDE_CONTENT_TYPE,
};
pub use handler::{write_response, RequestHandler, ServiceHandler};
pub use init::{initialize, ColdStart};
pub use request::{ensure_content_length, translate};
pub use sink::{
    BufferedOutput, BufferedSink, ChannelSink, ResponseSink, SinkError, StreamingResponse,
};
pub use warmer::WarmInterceptor;
