//! Request dispatch
//!
//! [`App`] owns the route table and the middleware chain. It is immutable
//! once built and is shared across connections behind an `Arc`.

use crate::handlers::members;
use crate::middleware::{Cors, CorsConfig, MiddlewareChain, RequestTrace, TraceConfig};
use crate::{Error, Method, Request, Response, ResponseBuilder, Result, StatusCode};
use roster_router::{Lookup, Router};

/// A route whose response never depends on the request
#[derive(Debug, Clone)]
pub struct StaticRoute {
    pub method: Method,
    pub path: String,
    pub response: Response,
}

/// Application configuration
#[derive(Clone, Default)]
pub struct AppConfig {
    /// Verbose error pages
    pub debug: bool,
    pub cors: CorsConfig,
    pub trace: TraceConfig,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn cors(mut self, cors: CorsConfig) -> Self {
        self.cors = cors;
        self
    }

    pub fn trace(mut self, trace: TraceConfig) -> Self {
        self.trace = trace;
        self
    }
}

/// Route table plus middleware
pub struct App {
    router: Router,
    /// Pre-rendered responses indexed by handler ID
    responses: Vec<Response>,
    middleware: MiddlewareChain,
    debug: bool,
}

impl App {
    /// Build the members service: the `/members` route behind request
    /// tracing and CORS.
    pub fn new(config: AppConfig) -> Result<Self> {
        let mut app = Self::empty(config);
        app.add_static(members::route()?)?;
        Ok(app)
    }

    /// An app with middleware but no routes
    pub fn empty(config: AppConfig) -> Self {
        let middleware = MiddlewareChain::new()
            .with(RequestTrace::new(config.trace))
            .with(Cors::new(config.cors));

        Self {
            router: Router::new(),
            responses: Vec::new(),
            middleware,
            debug: config.debug,
        }
    }

    /// Register a pre-rendered route
    pub fn add_static(&mut self, route: StaticRoute) -> Result<()> {
        if !route.path.starts_with('/') {
            return Err(Error::InvalidPath(route.path));
        }
        if route.method == Method::Extension {
            return Err(Error::InvalidMethod(route.method.to_string()));
        }

        let handler_id = u32::try_from(self.responses.len())
            .map_err(|_| Error::Internal("route table full".to_string()))?;
        match self.router.insert(route.method.as_str(), &route.path, handler_id) {
            // Re-registering keeps the old ID and overwrites its response
            Some(previous) => {
                self.router
                    .insert(route.method.as_str(), &route.path, previous);
                self.responses[previous as usize] = route.response;
            }
            None => self.responses.push(route.response),
        }
        Ok(())
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Run a request through middleware and routing
    pub fn handle(&self, mut req: Request) -> Response {
        let mut res = match self.middleware.run_before(&mut req) {
            Some(early) => early,
            None => self.dispatch(&req),
        };
        self.middleware.run_after(&req, &mut res);
        res
    }

    /// Route a request. Unrecognised method tokens are routed like any
    /// other method that has no handler.
    fn dispatch(&self, req: &Request) -> Response {
        match self.router.lookup(req.method.as_str(), &req.path) {
            Lookup::Found(matched) => match self.responses.get(matched.handler_id as usize) {
                Some(res) => res.clone(),
                None => self.error_response(&Error::Internal(format!(
                    "no response for handler {}",
                    matched.handler_id
                ))),
            },
            Lookup::MethodNotAllowed(mut allow) => {
                if !allow.iter().any(|m| m == "OPTIONS") {
                    allow.push("OPTIONS".to_string());
                    allow.sort();
                }
                if req.method == Method::Options {
                    ResponseBuilder::new(StatusCode::NO_CONTENT)
                        .header("allow", allow.join(", "))
                        .build()
                } else {
                    Response::method_not_allowed(&allow)
                }
            }
            Lookup::NotFound => self.error_response(&Error::NotFound(req.path.clone())),
        }
    }

    /// Render an error. Debug mode names the error in the body; otherwise
    /// only the reason phrase is sent.
    pub fn error_response(&self, err: &Error) -> Response {
        let status = err.status();
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        } else {
            tracing::debug!(error = %err, "request rejected");
        }

        if !self.debug {
            return Response::status_page(status);
        }

        ResponseBuilder::new(status)
            .header("content-type", "text/plain; charset=utf-8")
            .body(format!("{status}\n\n{err}\n"))
            .build()
    }
}
