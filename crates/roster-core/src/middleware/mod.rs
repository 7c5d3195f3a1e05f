//! Middleware implementations
//!
//! Middleware sees every request before routing and every response after
//! it, including responses produced by another middleware's short circuit.

pub mod cors;
pub mod trace;

// Re-exports for convenience
pub use cors::{Cors, CorsConfig};
pub use trace::{RequestTrace, TraceConfig};

use crate::{Request, Response};

/// Middleware trait - process request/response
pub trait Middleware: Send + Sync {
    /// Process request before handler. Returning a response skips routing.
    fn before(&self, req: &mut Request) -> Option<Response>;

    /// Process response after handler
    fn after(&self, req: &Request, res: &mut Response);
}

/// Middleware chain
pub struct MiddlewareChain {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Box::new(middleware));
    }

    /// Builder-style [`add`](Self::add)
    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.add(middleware);
        self
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Run before middlewares, return early response if any
    pub fn run_before(&self, req: &mut Request) -> Option<Response> {
        for m in &self.middlewares {
            if let Some(res) = m.before(req) {
                return Some(res);
            }
        }
        None
    }

    /// Run after middlewares in reverse order
    pub fn run_after(&self, req: &Request, res: &mut Response) {
        for m in self.middlewares.iter().rev() {
            m.after(req, res);
        }
    }
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Method, RequestBuilder, StatusCode};
    use std::sync::{Arc, Mutex};

    struct Record {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        short_circuit: bool,
    }

    impl Middleware for Record {
        fn before(&self, _req: &mut Request) -> Option<Response> {
            self.log.lock().unwrap().push(format!("before:{}", self.name));
            self.short_circuit
                .then(|| Response::status_page(StatusCode::FORBIDDEN))
        }

        fn after(&self, _req: &Request, _res: &mut Response) {
            self.log.lock().unwrap().push(format!("after:{}", self.name));
        }
    }

    fn record(name: &'static str, log: &Arc<Mutex<Vec<String>>>, short_circuit: bool) -> Record {
        Record {
            name,
            log: log.clone(),
            short_circuit,
        }
    }

    #[test]
    fn test_after_runs_in_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = MiddlewareChain::new()
            .with(record("a", &log, false))
            .with(record("b", &log, false));

        let mut req = RequestBuilder::new(Method::Get, "/members").build();
        assert!(chain.run_before(&mut req).is_none());
        let mut res = Response::status_page(StatusCode::NOT_FOUND);
        chain.run_after(&req, &mut res);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["before:a", "before:b", "after:b", "after:a"]
        );
    }

    #[test]
    fn test_before_short_circuits() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = MiddlewareChain::new()
            .with(record("a", &log, true))
            .with(record("b", &log, false));

        let mut req = RequestBuilder::new(Method::Get, "/members").build();
        let res = chain.run_before(&mut req).unwrap();

        assert_eq!(res.status, StatusCode::FORBIDDEN);
        assert_eq!(*log.lock().unwrap(), vec!["before:a"]);
        assert_eq!(chain.len(), 2);
    }
}
