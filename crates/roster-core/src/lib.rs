//! roster-core: the members service
//!
//! Routing, middleware and the single `/members` route, plus the native
//! hyper server that hosts them.
//!
//! ## Features
//! - `native` (default) - Native server with tokio/hyper

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod app;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;

#[cfg(feature = "native")]
pub mod server;

// Re-exports
pub use app::{App, AppConfig, StaticRoute};
pub use error::{Error, Result};
pub use request::{decode_path, Method, Request, RequestBuilder};
pub use response::{Response, ResponseBuilder, StatusCode};

// Middleware re-exports
pub use middleware::{Cors, CorsConfig, Middleware, MiddlewareChain, RequestTrace, TraceConfig};

// Handlers re-exports
pub use handlers::{MembersResponse, MEMBERS, MEMBERS_PATH};

#[cfg(feature = "native")]
pub use server::{
    create_optimized_socket, from_hyper_request, shutdown_signal, to_hyper_response,
    ConnectionTracker, Server, ServerConfig,
};
