//! The HTTP surface the validator accepts.
//!
//! Any well-formed request object works as long as it can expose a method, an
//! escaped path, a raw query string, case-insensitive headers, and a buffered
//! body. The blanket impls cover `http::Request`/`http::Response` carrying any
//! byte-slice body (`Bytes`, `Vec<u8>`, `String`, …); bodies are buffered, so
//! re-validation never consumes them.

use crate::styles::percent_decode;
use http::{HeaderMap, Method};

/// Read-only view of an HTTP request.
pub trait HttpRequestLike {
    fn method(&self) -> &Method;

    /// The escaped request path, without query or authority.
    fn escaped_path(&self) -> &str;

    /// The raw, still-encoded query string, without the leading `?`.
    fn raw_query(&self) -> Option<&str>;

    fn headers(&self) -> &HeaderMap;

    fn body_bytes(&self) -> &[u8];

    fn content_length(&self) -> usize {
        self.body_bytes().len()
    }

    /// Decoded query pairs in request order, duplicates preserved.
    fn query_pairs(&self) -> Vec<(String, String)> {
        let Some(raw) = self.raw_query() else {
            return Vec::new();
        };
        raw.split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((key, value)) => (percent_decode(key), percent_decode(value)),
                None => (percent_decode(pair), String::new()),
            })
            .collect()
    }

    /// Cookies from the `Cookie` header. Names are case-sensitive, per the
    /// cookie parameter rules.
    fn cookies(&self) -> Vec<(String, String)> {
        let Some(header) = self
            .headers()
            .get(http::header::COOKIE)
            .and_then(|value| value.to_str().ok())
        else {
            return Vec::new();
        };
        header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                Some((name.to_string(), value.to_string()))
            })
            .collect()
    }

    /// The base media type of the `Content-Type` header, parameters stripped.
    fn content_type(&self) -> Option<String> {
        content_type_of(self.headers())
    }
}

/// Read-only view of an HTTP response.
pub trait HttpResponseLike {
    fn status(&self) -> u16;

    fn headers(&self) -> &HeaderMap;

    fn body_bytes(&self) -> &[u8];

    fn content_type(&self) -> Option<String> {
        content_type_of(self.headers())
    }
}

pub(crate) fn content_type_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').find(|segment| segment.contains('/')))
        .map(|media| media.trim().to_string())
}

impl<T: AsRef<[u8]>> HttpRequestLike for http::Request<T> {
    fn method(&self) -> &Method {
        http::Request::method(self)
    }

    fn escaped_path(&self) -> &str {
        self.uri().path()
    }

    fn raw_query(&self) -> Option<&str> {
        self.uri().query()
    }

    fn headers(&self) -> &HeaderMap {
        http::Request::headers(self)
    }

    fn body_bytes(&self) -> &[u8] {
        self.body().as_ref()
    }
}

impl<T: AsRef<[u8]>> HttpResponseLike for http::Response<T> {
    fn status(&self) -> u16 {
        http::Response::status(self).as_u16()
    }

    fn headers(&self) -> &HeaderMap {
        http::Response::headers(self)
    }

    fn body_bytes(&self) -> &[u8] {
        self.body().as_ref()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::Bytes;

    fn request(uri: &str) -> http::Request<Bytes> {
        http::Request::builder()
            .method("GET")
            .uri(uri)
            .header("Cookie", "session=abc123; Theme=dark")
            .header("Content-Type", "application/json; charset=utf-8")
            .body(Bytes::from_static(b"{}"))
            .unwrap()
    }

    #[test]
    fn test_query_pairs_preserve_duplicates_and_order() {
        let request = request("https://example.com/x?fishy=1&fishy=2&empty");
        assert_eq!(
            request.query_pairs(),
            vec![
                ("fishy".to_string(), "1".to_string()),
                ("fishy".to_string(), "2".to_string()),
                ("empty".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_query_pairs_decode_percent_escapes() {
        let request = request("https://example.com/x?q=a%20b");
        assert_eq!(request.query_pairs(), vec![("q".to_string(), "a b".to_string())]);
    }

    #[test]
    fn test_cookie_names_stay_case_sensitive() {
        let request = request("https://example.com/x");
        let cookies = request.cookies();
        assert_eq!(cookies[0], ("session".to_string(), "abc123".to_string()));
        assert_eq!(cookies[1].0, "Theme");
    }

    #[test]
    fn test_content_type_strips_parameters() {
        let request = request("https://example.com/x");
        assert_eq!(
            HttpRequestLike::content_type(&request),
            Some("application/json".to_string())
        );
    }

    #[test]
    fn test_body_is_rereadable() {
        let request = request("https://example.com/x");
        assert_eq!(request.body_bytes(), b"{}");
        assert_eq!(request.body_bytes(), b"{}");
        assert_eq!(request.content_length(), 2);
    }
}
