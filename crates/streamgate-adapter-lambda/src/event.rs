use std::collections::BTreeMap;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// HTTP-integration invocation event (payload format 2.0, also used by
/// function URLs). Every field tolerates absence, and a field with the wrong
/// shape falls back to its default without affecting the others.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    #[serde(default, deserialize_with = "lenient")]
    pub raw_path: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub raw_query_string: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub headers: BTreeMap<String, HeaderField>,
    #[serde(default, deserialize_with = "lenient_cookies")]
    pub cookies: Option<Vec<String>>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_base64_encoded: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub request_context: RequestContext,
}

impl InboundEvent {
    /// Parse a raw event. Only a payload that is not an object at all degrades
    /// to the empty event.
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value(value) {
            Ok(event) => event,
            Err(err) => {
                log::warn!("malformed invocation event, using defaults: {err}");
                Self::default()
            }
        }
    }

    pub fn method(&self) -> &str {
        self.request_context.http.method.as_deref().unwrap_or("GET")
    }

    pub fn path(&self) -> &str {
        match self.raw_path.as_deref() {
            Some(path) if !path.is_empty() => path,
            _ => "/",
        }
    }

    pub fn query_string(&self) -> &str {
        self.raw_query_string.as_deref().unwrap_or("")
    }

    pub fn source_ip(&self) -> Option<&str> {
        self.request_context.http.source_ip.as_deref()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_context.request_id.as_deref()
    }

    pub fn domain_name(&self) -> Option<&str> {
        self.request_context.domain_name.as_deref()
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default, deserialize_with = "lenient")]
    pub request_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub domain_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub http: HttpDescription,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpDescription {
    #[serde(default, deserialize_with = "lenient")]
    pub method: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub source_ip: Option<String>,
}

/// A header value as delivered by the platform: a scalar or a list. Anything
/// else (null, numbers) is accepted and contributes no values.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum HeaderField {
    Single(String),
    Multi(Vec<String>),
    Unsupported(IgnoredAny),
}

impl HeaderField {
    pub fn into_values(self) -> Vec<String> {
        match self {
            HeaderField::Single(value) => vec![value],
            HeaderField::Multi(values) => values,
            HeaderField::Unsupported(_) => Vec::new(),
        }
    }
}

/// Deserialize a field, substituting its default when the value has the wrong
/// shape (including `null` for non-optional fields).
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(value).unwrap_or_else(|err| {
        log::warn!("ignoring malformed event field: {err}");
        T::default()
    }))
}

/// Cookie lists keep their string entries; anything else in the list is
/// skipped.
fn lenient_cookies<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(entries) => Ok(Some(
            entries
                .into_iter()
                .filter_map(|entry| match entry {
                    Value::String(cookie) => Some(cookie),
                    other => {
                        log::warn!("ignoring non-string cookie entry {other}");
                        None
                    }
                })
                .collect(),
        )),
        Value::Null => Ok(None),
        other => {
            log::warn!("ignoring malformed cookie list {other}");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_http_integration_event() {
        let event = InboundEvent::from_value(json!({
            "rawPath": "/products",
            "rawQueryString": "page=2",
            "headers": {"accept": "text/html", "x-multi": ["a", "b"]},
            "cookies": ["a=1"],
            "body": "hello",
            "isBase64Encoded": false,
            "requestContext": {
                "requestId": "req-1",
                "domainName": "shop.example.com",
                "http": {"method": "POST", "sourceIp": "203.0.113.9"}
            }
        }));

        assert_eq!(event.method(), "POST");
        assert_eq!(event.path(), "/products");
        assert_eq!(event.query_string(), "page=2");
        assert_eq!(event.source_ip(), Some("203.0.113.9"));
        assert_eq!(event.request_id(), Some("req-1"));
        let multi = event.headers.get("x-multi").cloned().expect("header");
        assert_eq!(multi.into_values(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(event.cookies.as_deref(), Some(&["a=1".to_string()][..]));
    }

    #[test]
    fn absent_fields_take_defaults() {
        let event = InboundEvent::from_value(json!({}));
        assert_eq!(event.method(), "GET");
        assert_eq!(event.path(), "/");
        assert_eq!(event.query_string(), "");
        assert!(event.headers.is_empty());
        assert!(event.cookies.is_none());
        assert!(event.body.is_none());
        assert!(!event.is_base64_encoded);
    }

    #[test]
    fn null_header_value_does_not_discard_event() {
        let event = InboundEvent::from_value(json!({
            "rawPath": "/kept",
            "headers": {"x-null": null, "accept": "*/*"}
        }));
        assert_eq!(event.path(), "/kept");
        let values = event.headers.get("x-null").cloned().expect("header").into_values();
        assert!(values.is_empty());
    }

    #[test]
    fn null_headers_keep_the_rest_of_the_event() {
        let event = InboundEvent::from_value(json!({
            "rawPath": "/admin/delete",
            "headers": null,
            "requestContext": {"http": {"method": "POST"}}
        }));
        assert_eq!(event.method(), "POST");
        assert_eq!(event.path(), "/admin/delete");
        assert!(event.headers.is_empty());
    }

    #[test]
    fn null_cookie_entry_is_skipped() {
        let event = InboundEvent::from_value(json!({
            "rawPath": "/cart",
            "cookies": ["a=1", null, "b=2"]
        }));
        assert_eq!(event.path(), "/cart");
        assert_eq!(
            event.cookies,
            Some(vec!["a=1".to_string(), "b=2".to_string()])
        );
    }

    #[test]
    fn null_base64_flag_reads_as_false() {
        let event = InboundEvent::from_value(json!({
            "rawPath": "/upload",
            "body": "plain",
            "isBase64Encoded": null,
            "requestContext": {"http": {"method": "PUT"}}
        }));
        assert_eq!(event.method(), "PUT");
        assert_eq!(event.path(), "/upload");
        assert!(!event.is_base64_encoded);
    }

    #[test]
    fn mistyped_fields_fall_back_individually() {
        let event = InboundEvent::from_value(json!({
            "rawPath": 42,
            "rawQueryString": "q=1",
            "cookies": "a=1",
            "requestContext": {"requestId": 7, "http": {"method": "DELETE", "sourceIp": false}}
        }));
        assert_eq!(event.path(), "/");
        assert_eq!(event.query_string(), "q=1");
        assert!(event.cookies.is_none());
        assert!(event.request_id().is_none());
        assert!(event.source_ip().is_none());
        assert_eq!(event.method(), "DELETE");
    }

    #[test]
    fn non_object_event_degrades_to_default() {
        let event = InboundEvent::from_value(json!("not an event"));
        assert_eq!(event.path(), "/");
        assert!(event.source_ip().is_none());
    }
}
