//! CORS (Cross-Origin Resource Sharing) middleware
//!
//! Adds CORS headers to every response. Routing answers the preflight
//! `OPTIONS` itself, so an unknown path stays a 404; a successful preflight
//! is then decorated with the `Access-Control-Allow-*` set.

use super::Middleware;
use crate::{Method, Request, Response, ResponseBuilder, StatusCode};
use smallvec::SmallVec;

/// CORS configuration
#[derive(Clone)]
pub struct CorsConfig {
    /// Allowed origins (empty = all)
    pub origins: SmallVec<[String; 4]>,
    /// Methods advertised to preflight requests
    pub methods: SmallVec<[Method; 8]>,
    /// Request headers advertised to preflight requests (empty = mirror)
    pub headers: SmallVec<[String; 8]>,
    /// Exposed headers
    pub expose_headers: SmallVec<[String; 4]>,
    /// Allow credentials
    pub credentials: bool,
    /// Max age (seconds)
    pub max_age: u32,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: SmallVec::new(),
            methods: smallvec::smallvec![
                Method::Get,
                Method::Head,
                Method::Options,
            ],
            headers: SmallVec::new(),
            expose_headers: SmallVec::new(),
            credentials: false,
            max_age: 86400,
        }
    }
}

impl CorsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.origins.push(origin.into());
        self
    }

    pub fn allow_all_origins(mut self) -> Self {
        self.origins.clear();
        self
    }

    pub fn allow_header(mut self, header: impl Into<String>) -> Self {
        self.headers.push(header.into());
        self
    }

    pub fn expose_header(mut self, header: impl Into<String>) -> Self {
        self.expose_headers.push(header.into());
        self
    }

    pub fn allow_credentials(mut self) -> Self {
        self.credentials = true;
        self
    }

    pub fn max_age(mut self, seconds: u32) -> Self {
        self.max_age = seconds;
        self
    }
}

/// CORS middleware
pub struct Cors {
    config: CorsConfig,
}

impl Cors {
    pub fn new(config: CorsConfig) -> Self {
        Self { config }
    }

    /// Allow every origin to read every response
    pub fn permissive() -> Self {
        Self::new(CorsConfig::default().allow_all_origins())
    }

    fn allows_any_origin(&self) -> bool {
        self.config.origins.is_empty() || self.config.origins.iter().any(|o| o == "*")
    }

    fn is_origin_allowed(&self, origin: &str) -> bool {
        self.allows_any_origin() || self.config.origins.iter().any(|o| o == origin)
    }

    /// Value for `Access-Control-Allow-Origin`, or `None` to send no CORS
    /// headers at all
    fn allow_origin_value(&self, origin: Option<&str>) -> Option<String> {
        // `*` is not honoured by browsers for credentialed requests
        if self.allows_any_origin() && !self.config.credentials {
            return Some("*".to_string());
        }
        origin
            .filter(|o| self.is_origin_allowed(o))
            .map(|o| o.to_string())
    }

    fn methods_string(&self) -> String {
        self.config
            .methods
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn add_preflight_headers(&self, req: &Request, res: &mut Response) {
        res.set_header("Access-Control-Allow-Methods", self.methods_string());
        res.set_header("Access-Control-Max-Age", self.config.max_age.to_string());

        let allow_headers = if self.config.headers.is_empty() {
            req.header("access-control-request-headers")
                .map(|h| h.to_string())
        } else {
            Some(self.config.headers.join(", "))
        };
        if let Some(headers) = allow_headers {
            res.set_header("Access-Control-Allow-Headers", headers);
        }
    }
}

/// Append a token to `Vary` without dropping what is already there
fn add_vary(res: &mut Response, token: &str) {
    let merged = match res.header("vary") {
        Some(existing) if existing.split(',').any(|v| v.trim().eq_ignore_ascii_case(token)) => {
            return;
        }
        Some(existing) => format!("{existing}, {token}"),
        None => token.to_string(),
    };
    res.set_header("Vary", merged);
}

impl Middleware for Cors {
    fn before(&self, req: &mut Request) -> Option<Response> {
        let origin = req.origin()?;

        (!self.is_origin_allowed(origin)).then(|| {
            ResponseBuilder::new(StatusCode::FORBIDDEN)
                .header("content-type", "text/plain; charset=utf-8")
                .body("CORS: Origin not allowed")
                .build()
        })
    }

    fn after(&self, req: &Request, res: &mut Response) {
        let Some(allow_origin) = self.allow_origin_value(req.origin()) else {
            return;
        };

        if req.is_preflight() && res.status.is_success() {
            self.add_preflight_headers(req, res);
        }

        if allow_origin != "*" {
            add_vary(res, "Origin");
        }
        res.set_header("Access-Control-Allow-Origin", allow_origin);

        if !self.config.expose_headers.is_empty() {
            res.set_header(
                "Access-Control-Expose-Headers",
                self.config.expose_headers.join(", "),
            );
        }

        if self.config.credentials {
            res.set_header("Access-Control-Allow-Credentials", "true");
        }
    }
}
