//! Wire framing for streamed HTTP-integration responses:
//! `<prelude JSON><8 NUL bytes><raw body...>`.

use std::collections::BTreeMap;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use streamgate_core::http::header::SET_COOKIE;
use streamgate_core::http::{HeaderMap, StatusCode};
use thiserror::Error;

use crate::headers::{collapse_header, flatten_cookies, header_values};

/// Content type that tells the platform a metadata prelude precedes the body.
pub const METADATA_PRELUDE_CONTENT_TYPE: &str =
    "application/vnd.awslambda.http-integration-response";
pub const DELIMITER_LEN: usize = 8;
const DELIMITER: [u8; DELIMITER_LEN] = [0; DELIMITER_LEN];

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("response frame has no prelude delimiter")]
    MissingDelimiter,
    #[error("invalid metadata prelude: {0}")]
    InvalidPrelude(#[from] serde_json::Error),
}

/// Status, headers and cookies sent ahead of the body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataPrelude {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Vec<String>>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl MetadataPrelude {
    /// Promote `set-cookie` into `cookies` and collapse every other header to a
    /// single string.
    pub fn from_parts(status: StatusCode, headers: &HeaderMap) -> Self {
        let mut cookies = Vec::new();
        let mut flattened = BTreeMap::new();
        for name in headers.keys() {
            let values = header_values(headers, name);
            if *name == SET_COOKIE {
                cookies.extend(flatten_cookies(&values));
            } else {
                flattened.insert(name.as_str().to_string(), collapse_header(name, &values));
            }
        }

        Self {
            status_code: status.as_u16(),
            cookies: (!cookies.is_empty()).then_some(cookies),
            headers: flattened,
        }
    }

    /// Prelude JSON followed by the delimiter. Header values cannot hold NUL
    /// and JSON escapes control characters, so the prelude never contains a
    /// raw NUL byte.
    pub fn encode(&self) -> Result<Bytes, serde_json::Error> {
        let json = serde_json::to_vec(self)?;
        let mut buf = BytesMut::with_capacity(json.len() + DELIMITER_LEN);
        buf.put_slice(&json);
        buf.put_slice(&DELIMITER);
        Ok(buf.freeze())
    }
}

/// Split a complete frame into its prelude and body.
pub fn decode_frame(frame: &[u8]) -> Result<(MetadataPrelude, &[u8]), FrameError> {
    let start = frame
        .windows(DELIMITER_LEN)
        .position(|window| window == DELIMITER)
        .ok_or(FrameError::MissingDelimiter)?;
    let prelude = serde_json::from_slice(&frame[..start])?;
    Ok((prelude, &frame[start + DELIMITER_LEN..]))
}
