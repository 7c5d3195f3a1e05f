//! Request tracing middleware
//!
//! Attaches a correlation id to every request and logs each exchange
//! through `tracing`.

use super::Middleware;
use crate::{Request, Response};

/// Longest client-supplied request id that is trusted as-is
const MAX_ID_LEN: usize = 128;

/// Tracing configuration
#[derive(Clone)]
pub struct TraceConfig {
    /// Header carrying the request id in both directions
    pub header_name: String,
    /// Generate a request id when the client did not send one
    pub generate_id: bool,
    /// Emit a `debug` event when a request arrives
    pub log_requests: bool,
    /// Emit an `info` event when a response leaves
    pub log_responses: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            header_name: "X-Request-ID".to_string(),
            generate_id: true,
            log_requests: true,
            log_responses: true,
        }
    }
}

impl TraceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    pub fn generate_id(mut self, generate: bool) -> Self {
        self.generate_id = generate;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.log_requests = false;
        self.log_responses = false;
        self
    }
}

/// Generate a request id (UUID v4)
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Client ids are echoed into a response header, so only short printable
/// ASCII is accepted.
fn is_acceptable_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_ID_LEN && id.bytes().all(|b| b.is_ascii_graphic())
}

/// Request tracing middleware
pub struct RequestTrace {
    config: TraceConfig,
}

impl RequestTrace {
    pub fn new(config: TraceConfig) -> Self {
        Self { config }
    }
}

impl Default for RequestTrace {
    fn default() -> Self {
        Self::new(TraceConfig::default())
    }
}

impl Middleware for RequestTrace {
    fn before(&self, req: &mut Request) -> Option<Response> {
        let supplied = req
            .header(&self.config.header_name)
            .filter(|id| is_acceptable_id(id))
            .map(str::to_string);

        req.request_id = supplied.or_else(|| self.config.generate_id.then(generate_request_id));

        if self.config.log_requests {
            tracing::debug!(
                request_id = req.request_id.as_deref().unwrap_or("-"),
                method = %req.method,
                path = %req.path,
                query = req.query.as_deref().unwrap_or(""),
                "request received"
            );
        }

        None
    }

    fn after(&self, req: &Request, res: &mut Response) {
        if let Some(id) = &req.request_id {
            res.set_header(&self.config.header_name, id.clone());
        }

        if self.config.log_responses {
            let elapsed = req.received_at.elapsed();
            tracing::info!(
                request_id = req.request_id.as_deref().unwrap_or("-"),
                method = %req.method,
                path = %req.path,
                status = res.status.as_u16(),
                latency_us = elapsed.as_micros() as u64,
                "request completed"
            );
        }
    }
}
