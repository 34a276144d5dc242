use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use serde_json::Value;
use streamgate_core::body::Body;
use streamgate_core::http::header::{CONTENT_LENGTH, COOKIE, HOST};
use streamgate_core::http::{HeaderMap, HeaderValue, Method, Request, Uri};

use crate::context::LambdaRequestContext;
use crate::event::InboundEvent;
use crate::headers::{join_cookies, normalize_headers};

/// Build the request the wrapped handler sees. Never fails: anything the event
/// gets wrong degrades to a default and is logged.
pub fn translate(event: InboundEvent) -> Request {
    let method = parse_method(event.method());
    let uri = parse_uri(event.path(), event.query_string());
    let headers = translate_headers(&event);
    let context = LambdaRequestContext {
        source_ip: event.source_ip().and_then(|ip| ip.parse().ok()),
        request_id: event.request_id().map(str::to_string),
    };
    let body = decode_body(event.body, event.is_base64_encoded);

    let mut request = Request::new(Body::from(body));
    *request.method_mut() = method;
    *request.uri_mut() = uri;
    *request.headers_mut() = headers;
    LambdaRequestContext::insert(&mut request, context);
    request
}

/// Derive `content-length` from a buffered, non-empty body unless the event
/// already supplied one.
pub fn ensure_content_length(request: &mut Request) {
    if request.headers().contains_key(CONTENT_LENGTH) {
        return;
    }
    match request.body().buffered_len() {
        Some(len) if len > 0 => {
            request
                .headers_mut()
                .insert(CONTENT_LENGTH, HeaderValue::from(len));
        }
        _ => {}
    }
}

fn parse_method(raw: &str) -> Method {
    Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes()).unwrap_or_else(|_| {
        log::warn!("invalid request method {raw:?}; defaulting to GET");
        Method::GET
    })
}

fn parse_uri(path: &str, query: &str) -> Uri {
    if !query.is_empty() {
        match format!("{path}?{query}").parse::<Uri>() {
            Ok(uri) => return uri,
            Err(err) => log::warn!("dropping invalid query string {query:?} ({err})"),
        }
    }
    path.parse::<Uri>().unwrap_or_else(|err| {
        log::warn!("invalid request path {path:?} ({err}); defaulting to /");
        Uri::from_static("/")
    })
}

fn translate_headers(event: &InboundEvent) -> HeaderMap {
    let mut headers = normalize_headers(
        event
            .headers
            .iter()
            .map(|(name, field)| (name, field.clone())),
    );

    if !headers.contains_key(HOST) {
        if let Some(domain) = event.domain_name() {
            match HeaderValue::from_str(domain) {
                Ok(value) => {
                    headers.insert(HOST, value);
                }
                Err(_) => log::warn!("ignoring invalid domain name {domain:?}"),
            }
        }
    }

    if let Some(cookie) = event.cookies.as_deref().and_then(join_cookies) {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(_) => log::warn!("dropping cookie list with invalid characters"),
        }
    }

    headers
}

fn decode_body(body: Option<Value>, is_base64_encoded: bool) -> Bytes {
    match body {
        None | Some(Value::Null) => Bytes::new(),
        Some(Value::String(text)) if is_base64_encoded => match BASE64.decode(text.as_bytes()) {
            Ok(bytes) => Bytes::from(bytes),
            Err(err) => {
                log::warn!("body flagged as base64 failed to decode ({err}); passing it through");
                Bytes::from(text)
            }
        },
        Some(Value::String(text)) => Bytes::from(text),
        Some(structured) => serde_json::to_vec(&structured)
            .map(Bytes::from)
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: Value) -> InboundEvent {
        InboundEvent::from_value(value)
    }

    fn header<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
        request.headers().get(name).and_then(|value| value.to_str().ok())
    }

    #[test]
    fn translates_method_uri_and_headers() {
        let request = translate(event(json!({
            "rawPath": "/x",
            "rawQueryString": "a=1&b=2",
            "headers": {"Accept": "text/html"},
            "requestContext": {"http": {"method": "get", "sourceIp": "203.0.113.5"}}
        })));

        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.uri().path(), "/x");
        assert_eq!(request.uri().query(), Some("a=1&b=2"));
        assert_eq!(header(&request, "accept"), Some("text/html"));
        let context = LambdaRequestContext::get(&request).expect("context");
        assert_eq!(context.source_ip, Some("203.0.113.5".parse().unwrap()));
    }

    #[test]
    fn cookie_list_is_joined() {
        let request = translate(event(json!({"cookies": ["a=1", "b=2"]})));
        assert_eq!(header(&request, "cookie"), Some("a=1; b=2"));
    }

    #[test]
    fn cookie_list_overwrites_cookie_header() {
        let request = translate(event(json!({
            "headers": {"Cookie": "stale=1"},
            "cookies": ["fresh=2"]
        })));
        let cookies: Vec<_> = request
            .headers()
            .get_all("cookie")
            .iter()
            .map(|value| value.to_str().unwrap())
            .collect();
        assert_eq!(cookies, vec!["fresh=2"]);
    }

    #[test]
    fn cookie_header_survives_without_cookie_list() {
        let request = translate(event(json!({"headers": {"cookie": "kept=1"}})));
        assert_eq!(header(&request, "cookie"), Some("kept=1"));
    }

    #[test]
    fn list_valued_headers_keep_every_value() {
        let request = translate(event(json!({"headers": {"X-Forwarded-For": ["a", "b"]}})));
        let values: Vec<_> = request
            .headers()
            .get_all("x-forwarded-for")
            .iter()
            .map(|value| value.to_str().unwrap())
            .collect();
        assert_eq!(values, vec!["a", "b"]);
    }

    #[test]
    fn invalid_header_values_are_dropped() {
        let request = translate(event(json!({"headers": {"x-bad": "line\nbreak", "x-ok": "1"}})));
        assert!(request.headers().get("x-bad").is_none());
        assert_eq!(header(&request, "x-ok"), Some("1"));
    }

    #[test]
    fn base64_body_is_decoded() {
        let request = translate(event(json!({
            "body": BASE64.encode([0u8, 159, 146, 150]),
            "isBase64Encoded": true
        })));
        assert_eq!(request.body().as_bytes(), Some(&[0u8, 159, 146, 150][..]));
    }

    #[test]
    fn invalid_base64_passes_text_through() {
        let request = translate(event(json!({"body": "not*base64", "isBase64Encoded": true})));
        assert_eq!(request.body().as_bytes(), Some(&b"not*base64"[..]));
    }

    #[test]
    fn text_body_is_utf8() {
        let request = translate(event(json!({"body": "héllo"})));
        assert_eq!(request.body().as_bytes(), Some("héllo".as_bytes()));
    }

    #[test]
    fn structured_body_is_reserialized() {
        let request = translate(event(json!({"body": {"name": "test"}})));
        assert_eq!(request.body().as_bytes(), Some(&br#"{"name":"test"}"#[..]));
    }

    #[test]
    fn absent_body_is_empty() {
        let request = translate(event(json!({})));
        assert_eq!(request.body().as_bytes(), Some(&b""[..]));
        assert_eq!(request.uri().path(), "/");
    }

    #[test]
    fn unknown_method_defaults_to_get() {
        let request = translate(event(json!({"requestContext": {"http": {"method": "BAD METHOD"}}})));
        assert_eq!(request.method(), Method::GET);
    }

    #[test]
    fn unparsable_path_defaults_to_root() {
        let request = translate(event(json!({"rawPath": "/has space"})));
        assert_eq!(request.uri().path(), "/");
    }

    #[test]
    fn invalid_query_keeps_the_path() {
        for query in ["q=\"x\"", "q=<b>#x"] {
            let request = translate(event(json!({
                "rawPath": "/search",
                "rawQueryString": query
            })));
            assert_eq!(request.uri().path(), "/search");
            assert_eq!(request.uri().query(), None);
        }
    }

    #[test]
    fn invalid_path_defaults_to_root() {
        let request = translate(event(json!({
            "rawPath": "/bad path",
            "rawQueryString": "a=1"
        })));
        assert_eq!(request.uri().path(), "/");
        assert_eq!(request.uri().query(), None);
    }

    #[test]
    fn domain_name_fills_missing_host() {
        let request = translate(event(json!({
            "requestContext": {"domainName": "shop.example.com"}
        })));
        assert_eq!(header(&request, "host"), Some("shop.example.com"));

        let request = translate(event(json!({
            "headers": {"Host": "edge.example.com"},
            "requestContext": {"domainName": "shop.example.com"}
        })));
        assert_eq!(header(&request, "host"), Some("edge.example.com"));
    }

    #[test]
    fn translate_does_not_set_content_length() {
        let request = translate(event(json!({"body": "abc"})));
        assert!(request.headers().get(CONTENT_LENGTH).is_none());
    }

    #[test]
    fn ensure_content_length_uses_byte_length() {
        let mut request = translate(event(json!({"body": "héllo"})));
        ensure_content_length(&mut request);
        assert_eq!(header(&request, "content-length"), Some("6"));
    }

    #[test]
    fn ensure_content_length_keeps_supplied_value() {
        let mut request = translate(event(json!({
            "headers": {"Content-Length": "99"},
            "body": "abc"
        })));
        ensure_content_length(&mut request);
        assert_eq!(header(&request, "content-length"), Some("99"));
    }

    #[test]
    fn ensure_content_length_skips_empty_body() {
        let mut request = translate(event(json!({})));
        ensure_content_length(&mut request);
        assert!(request.headers().get(CONTENT_LENGTH).is_none());
    }
}
