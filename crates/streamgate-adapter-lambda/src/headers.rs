//! Header and cookie canonicalization shared by the request and response paths.

use streamgate_core::http::header::{CONTENT_TYPE, LOCATION};
use streamgate_core::http::{HeaderMap, HeaderName, HeaderValue};

use crate::event::HeaderField;

const COOKIE_SEPARATOR: &str = "; ";
const LIST_SEPARATOR: &str = ", ";

/// Build a header map from platform headers. Names are case-insensitive; when
/// two keys collide, the one seen last replaces the earlier values. Names and
/// values that are not valid HTTP are dropped with a warning.
pub fn normalize_headers<I, K>(headers: I) -> HeaderMap
where
    I: IntoIterator<Item = (K, HeaderField)>,
    K: AsRef<str>,
{
    let mut map = HeaderMap::new();
    for (name, field) in headers {
        let name = name.as_ref();
        let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
            log::warn!("dropping header with invalid name {name:?}");
            continue;
        };
        map.remove(&header_name);
        for value in field.into_values() {
            match HeaderValue::from_str(&value) {
                Ok(value) => {
                    map.append(header_name.clone(), value);
                }
                Err(_) => log::warn!("dropping invalid value for header {header_name}"),
            }
        }
    }
    map
}

/// Fold a cookie list into a single `cookie` header value. An empty list
/// carries no cookies.
pub fn join_cookies(cookies: &[String]) -> Option<String> {
    if cookies.is_empty() {
        None
    } else {
        Some(cookies.join(COOKIE_SEPARATOR))
    }
}

/// One entry per cookie for the prelude's `cookies` array.
pub fn flatten_cookies(values: &[String]) -> Vec<String> {
    values
        .iter()
        .filter(|value| !value.is_empty())
        .cloned()
        .collect()
}

/// Every value of `name`, in insertion order. Bytes outside UTF-8 are replaced.
pub fn header_values(headers: &HeaderMap, name: &HeaderName) -> Vec<String> {
    headers
        .get_all(name)
        .iter()
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .collect()
}

/// Reduce a list of values to the single string the prelude carries.
///
/// `location` and `content-type` may only have one meaningful value, so the
/// first wins. Everything else, `link` included, is comma-joined.
pub fn collapse_header(name: &HeaderName, values: &[String]) -> String {
    match values {
        [] => String::new(),
        [single] => single.clone(),
        [first, ..] if *name == LOCATION || *name == CONTENT_TYPE => first.clone(),
        _ => values.join(LIST_SEPARATOR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamgate_core::http::header::{CACHE_CONTROL, LINK};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn values(map: &HeaderMap, name: &str) -> Vec<String> {
        header_values(map, &HeaderName::from_bytes(name.as_bytes()).unwrap())
    }

    #[test]
    fn normalize_is_case_insensitive() {
        let map = normalize_headers(vec![
            ("Accept", HeaderField::Single("text/html".into())),
            ("X-Multi", HeaderField::Multi(strings(&["a", "b"]))),
        ]);
        assert_eq!(values(&map, "accept"), strings(&["text/html"]));
        assert_eq!(values(&map, "x-multi"), strings(&["a", "b"]));
        assert_eq!(map.get("ACCEPT").and_then(|value| value.to_str().ok()), Some("text/html"));
    }

    #[test]
    fn normalize_is_last_write_wins_on_collision() {
        let map = normalize_headers(vec![
            ("X-Trace", HeaderField::Multi(strings(&["first", "extra"]))),
            ("x-trace", HeaderField::Single("second".into())),
        ]);
        assert_eq!(map.keys_len(), 1);
        assert_eq!(values(&map, "x-trace"), strings(&["second"]));
    }

    #[test]
    fn normalize_drops_invalid_names_and_values() {
        let map = normalize_headers(vec![
            ("bad name", HeaderField::Single("1".into())),
            ("x-bad", HeaderField::Single("line\nbreak".into())),
            ("x-ok", HeaderField::Single("1".into())),
        ]);
        assert_eq!(map.keys_len(), 1);
        assert_eq!(values(&map, "x-ok"), strings(&["1"]));
    }

    #[test]
    fn join_cookies_uses_semicolon_space() {
        assert_eq!(
            join_cookies(&strings(&["a=1", "b=2"])).as_deref(),
            Some("a=1; b=2")
        );
        assert_eq!(join_cookies(&[]), None);
    }

    #[test]
    fn flatten_cookies_keeps_each_cookie() {
        let cookies = flatten_cookies(&strings(&["a=1; Path=/", "", "b=2; HttpOnly"]));
        assert_eq!(cookies, strings(&["a=1; Path=/", "b=2; HttpOnly"]));
    }

    #[test]
    fn header_values_are_lossy_utf8() {
        let mut map = HeaderMap::new();
        map.append(LINK, HeaderValue::from_bytes(b"caf\xe9").unwrap());
        assert_eq!(header_values(&map, &LINK), vec!["caf\u{fffd}".to_string()]);
    }

    #[test]
    fn link_values_are_comma_joined() {
        let values = strings(&["</a.css>; rel=preload", "</b.js>; rel=preload"]);
        assert_eq!(
            collapse_header(&LINK, &values),
            "</a.css>; rel=preload, </b.js>; rel=preload"
        );
    }

    #[test]
    fn location_and_content_type_take_first_value() {
        let values = strings(&["/first", "/second"]);
        assert_eq!(collapse_header(&LOCATION, &values), "/first");
        let types = strings(&["text/html", "application/json"]);
        assert_eq!(collapse_header(&CONTENT_TYPE, &types), "text/html");
    }

    #[test]
    fn other_lists_are_comma_joined() {
        let values = strings(&["no-cache", "no-store"]);
        assert_eq!(collapse_header(&CACHE_CONTROL, &values), "no-cache, no-store");
        assert_eq!(collapse_header(&CACHE_CONTROL, &[]), "");
    }
}
