//! HTTP Request types

use crate::{Error, Result};
use smallvec::SmallVec;
use std::time::Instant;

/// HTTP Methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Connect,
    Trace,
    /// Any other token. Routed like the rest, so it gets 405 on a known
    /// path and 404 elsewhere.
    Extension,
}

impl Method {
    /// Parse a wire token, mapping anything unrecognised to
    /// [`Method::Extension`]
    pub fn from_token(token: &str) -> Self {
        token.parse().unwrap_or(Method::Extension)
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Connect => "CONNECT",
            Method::Trace => "TRACE",
            Method::Extension => "EXTENSION",
        }
    }
}

impl std::str::FromStr for Method {
    type Err = Error;

    /// Method tokens are case-sensitive on the wire, so `get` is rejected.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            "CONNECT" => Ok(Method::Connect),
            "TRACE" => Ok(Method::Trace),
            _ => Err(Error::InvalidMethod(s.to_string())),
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP Request
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Request path (without query string)
    pub path: String,
    /// Query string (without leading ?)
    pub query: Option<String>,
    /// Request headers (stack-allocated for small header counts)
    pub headers: SmallVec<[(String, String); 16]>,
    /// Request body
    pub body: bytes::Bytes,
    /// Correlation id, set by the tracing middleware
    pub request_id: Option<String>,
    /// When the request entered the pipeline
    pub received_at: Instant,
}

impl Request {
    /// Create a new request
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: SmallVec::new(),
            body: bytes::Bytes::new(),
            request_id: None,
            received_at: Instant::now(),
        }
    }

    /// Get a header value (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get the `Origin` header, if the request is cross-origin
    pub fn origin(&self) -> Option<&str> {
        self.header("origin").filter(|o| !o.is_empty())
    }

    /// Whether this is a CORS preflight request
    pub fn is_preflight(&self) -> bool {
        self.method == Method::Options
            && self.origin().is_some()
            && self.header("access-control-request-method").is_some()
    }
}

/// Builder for constructing requests
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    /// Create a new builder
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            request: Request::new(method, path),
        }
    }

    /// Set query string
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.request.query = Some(query.into());
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.push((name.into(), value.into()));
        self
    }

    /// Set body
    pub fn body(mut self, body: impl Into<bytes::Bytes>) -> Self {
        self.request.body = body.into();
        self
    }

    /// Build the request
    pub fn build(self) -> Request {
        self.request
    }
}

/// Percent-decode a request path. Malformed escapes are kept verbatim and
/// invalid UTF-8 is replaced, so the result can only fail to route.
pub fn decode_path(path: &str) -> String {
    if !path.contains('%') {
        return path.to_string();
    }

    let bytes = path.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escaped = bytes
                .get(i + 1..i + 3)
                .filter(|hex| hex.iter().all(u8::is_ascii_hexdigit))
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = escaped {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse() {
        assert_eq!("GET".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("OPTIONS".parse::<Method>().unwrap(), Method::Options);
        assert!("get".parse::<Method>().is_err());
        assert!("BREW".parse::<Method>().is_err());
        assert_eq!(Method::from_token("BREW"), Method::Extension);
        assert_eq!(Method::from_token("PATCH"), Method::Patch);
    }

    #[test]
    fn test_method_display() {
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_request_header() {
        let req = RequestBuilder::new(Method::Get, "/members")
            .header("Content-Type", "application/json")
            .build();

        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(req.header("accept"), None);
    }

    #[test]
    fn test_preflight_detection() {
        let preflight = RequestBuilder::new(Method::Options, "/members")
            .header("Origin", "https://app.example")
            .header("Access-Control-Request-Method", "GET")
            .build();
        assert!(preflight.is_preflight());

        let plain_options = RequestBuilder::new(Method::Options, "/members").build();
        assert!(!plain_options.is_preflight());

        let empty_origin = RequestBuilder::new(Method::Options, "/members")
            .header("Origin", "")
            .header("Access-Control-Request-Method", "GET")
            .build();
        assert!(!empty_origin.is_preflight());
    }

    #[test]
    fn test_decode_path() {
        assert_eq!(decode_path("/members"), "/members");
        assert_eq!(decode_path("/%6Dembers"), "/members");
        assert_eq!(decode_path("/%6dembers"), "/members");
        assert_eq!(decode_path("/a%20b"), "/a b");
        // Plus is literal in a path
        assert_eq!(decode_path("/a+b"), "/a+b");
        assert_eq!(decode_path("/bad%zz"), "/bad%zz");
        assert_eq!(decode_path("/sign%+1"), "/sign%+1");
        assert_eq!(decode_path("/trailing%2"), "/trailing%2");
        assert_eq!(decode_path("/caf%C3%A9"), "/café");
    }
}
