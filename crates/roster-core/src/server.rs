//! Native HTTP server implementation
//!
//! hyper HTTP/1.1 on a multi-threaded tokio runtime:
//! - One accept loop, one task per connection
//! - TCP_NODELAY for low latency
//! - Graceful shutdown that drains in-flight connections

use crate::{decode_path, App, Error, Method, Request, Response, Result};
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use socket2::{Domain, Protocol, Socket, Type};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub hostname: String,
    pub workers: usize,
    /// Verbose error pages and debug-level logs
    pub debug: bool,
    /// How long shutdown waits for open connections to finish
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            hostname: "0.0.0.0".to_string(),
            workers: num_cpus::get(),
            debug: false,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Socket address to bind
    pub fn addr(&self) -> Result<SocketAddr> {
        let host = self.hostname.trim_start_matches('[').trim_end_matches(']');
        let candidate = if host.contains(':') {
            format!("[{}]:{}", host, self.port)
        } else {
            format!("{}:{}", host, self.port)
        };
        candidate
            .parse()
            .map_err(|e| Error::InvalidAddress(format!("{candidate}: {e}")))
    }
}

/// Create a TCP socket with optimizations
pub fn create_optimized_socket(addr: &SocketAddr) -> std::io::Result<Socket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    // SO_REUSEADDR - allow binding to address in TIME_WAIT
    socket.set_reuse_address(true)?;

    // TCP_NODELAY - disable Nagle's algorithm for lower latency
    socket.set_nodelay(true)?;

    // tokio drives the socket
    socket.set_nonblocking(true)?;

    socket.bind(&(*addr).into())?;

    socket.listen(1024)?;

    Ok(socket)
}

/// Convert a hyper request to our Request type. The body is not read:
/// no route consumes one.
pub fn from_hyper_request<B>(req: &hyper::Request<B>) -> Request {
    let token = req.method().as_str();
    let method = Method::from_token(token);
    if method == Method::Extension {
        tracing::debug!(method = token, "unrecognised method token");
    }

    let uri = req.uri();
    let mut request = Request::new(method, decode_path(uri.path()));
    request.query = uri.query().map(|s| s.to_string());

    for (name, value) in req.headers() {
        match value.to_str() {
            Ok(v) => request.headers.push((name.to_string(), v.to_string())),
            Err(_) => tracing::debug!(header = %name, "dropping non-visible-ASCII header value"),
        }
    }

    request
}

/// Convert our Response to a hyper Response
pub fn to_hyper_response(res: Response) -> Result<hyper::Response<Full<Bytes>>> {
    let mut builder = hyper::Response::builder().status(res.status.as_u16());

    for (name, value) in &res.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    Ok(builder.body(Full::new(res.body))?)
}

/// Plain 500 used when a response cannot be converted
fn fallback_response() -> hyper::Response<Full<Bytes>> {
    let mut res = hyper::Response::new(Full::new(Bytes::from_static(b"Internal Server Error")));
    *res.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
    let headers = res.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        http::header::ACCESS_CONTROL_ALLOW_ORIGIN,
        http::HeaderValue::from_static("*"),
    );
    res
}

async fn handle_request<B>(
    app: Arc<App>,
    req: hyper::Request<B>,
) -> std::result::Result<hyper::Response<Full<Bytes>>, Infallible> {
    let response = app.handle(from_hyper_request(&req));
    Ok(to_hyper_response(response).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to encode response");
        fallback_response()
    }))
}

// ============================================================================
// Connection Tracking for Graceful Shutdown
// ============================================================================

/// Counts open connections so shutdown can wait for them to drain
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    active: AtomicU64,
}

impl ConnectionTracker {
    /// Create a new connection tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a connection until the returned guard is dropped
    pub fn track(self: &Arc<Self>) -> ConnectionGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            tracker: Arc::clone(self),
        }
    }

    /// Get current active connection count
    #[inline]
    pub fn count(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    /// Wait until no connections remain. Returns `false` on timeout.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let wait = async {
            while self.count() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

/// Decrements the active count on drop
#[derive(Debug)]
pub struct ConnectionGuard {
    tracker: Arc<ConnectionTracker>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.tracker.active.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Server
// ============================================================================

/// A bound listener serving an [`App`]
pub struct Server {
    listener: TcpListener,
    app: Arc<App>,
    tracker: Arc<ConnectionTracker>,
    shutdown_timeout: Duration,
}

impl Server {
    /// Bind the configured address. Must be called inside a tokio runtime.
    pub fn bind(config: &ServerConfig, app: App) -> Result<Self> {
        let addr = config.addr()?;
        let socket = create_optimized_socket(&addr)?;
        let listener = TcpListener::from_std(socket.into())?;

        Ok(Self {
            listener,
            app: Arc::new(app),
            tracker: Arc::new(ConnectionTracker::new()),
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn tracker(&self) -> Arc<ConnectionTracker> {
        Arc::clone(&self.tracker)
    }

    /// Serve until Ctrl-C
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(shutdown_signal()).await
    }

    /// Serve until `signal` resolves, then stop accepting and drain
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Server {
            listener,
            app,
            tracker,
            shutdown_timeout,
        } = self;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::pin!(signal);
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            continue;
                        }
                    };
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(%peer, error = %e, "failed to set TCP_NODELAY");
                    }
                    spawn_connection(stream, peer, app.clone(), tracker.track(), shutdown_rx.clone());
                }
                _ = &mut signal => break,
            }
        }

        drop(listener);
        let _ = shutdown_tx.send(true);
        let open = tracker.count();
        if open > 0 {
            tracing::info!(connections = open, "waiting for connections to close");
        }
        if !tracker.drain(shutdown_timeout).await {
            tracing::warn!(
                connections = tracker.count(),
                "shutdown timed out with connections still open"
            );
        }
        Ok(())
    }
}

fn spawn_connection(
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    app: Arc<App>,
    guard: ConnectionGuard,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let _guard = guard;
        let io = TokioIo::new(stream);
        let service = service_fn(move |req| handle_request(app.clone(), req));

        let conn = http1::Builder::new().serve_connection(io, service);
        tokio::pin!(conn);

        let mut draining = false;
        let result = loop {
            tokio::select! {
                res = conn.as_mut() => break res,
                _ = shutdown_rx.changed(), if !draining => {
                    draining = true;
                    conn.as_mut().graceful_shutdown();
                }
            }
        };

        if let Err(e) = result {
            // Peers hanging up mid-request are routine
            tracing::debug!(%peer, error = %e, "connection error");
        }
    });
}

/// Resolves on Ctrl-C
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppConfig;
    use crate::middleware::TraceConfig;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.addr().unwrap(), "0.0.0.0:5000".parse().unwrap());
        assert!(!config.debug);
        assert!(config.workers >= 1);
    }

    #[test]
    fn test_ipv6_addr() {
        let config = ServerConfig {
            hostname: "::1".to_string(),
            port: 8080,
            ..ServerConfig::default()
        };
        assert_eq!(config.addr().unwrap(), "[::1]:8080".parse().unwrap());

        let bracketed = ServerConfig {
            hostname: "[::1]".to_string(),
            ..config
        };
        assert_eq!(bracketed.addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_invalid_addr() {
        let config = ServerConfig {
            hostname: "not a host".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(config.addr(), Err(Error::InvalidAddress(_))));
    }

    #[test]
    fn test_from_hyper_request() {
        let req = hyper::Request::builder()
            .method("DELETE")
            .uri("/members?limit=2")
            .header("Origin", "http://localhost:3000")
            .body(())
            .unwrap();

        let request = from_hyper_request(&req);
        assert_eq!(request.method, Method::Delete);
        assert_eq!(request.path, "/members");
        assert_eq!(request.query.as_deref(), Some("limit=2"));
        assert_eq!(request.header("origin"), Some("http://localhost:3000"));
    }

    #[test]
    fn test_from_hyper_request_extension_method() {
        let req = hyper::Request::builder()
            .method("BREW")
            .uri("/members")
            .body(())
            .unwrap();
        assert_eq!(from_hyper_request(&req).method, Method::Extension);
    }

    #[test]
    fn test_from_hyper_request_decodes_path() {
        let req = hyper::Request::builder()
            .uri("/%6Dembers?q=%20")
            .body(())
            .unwrap();

        let request = from_hyper_request(&req);
        assert_eq!(request.path, "/members");
        assert_eq!(request.query.as_deref(), Some("q=%20"));
    }

    #[test]
    fn test_to_hyper_response() {
        let res = to_hyper_response(Response::json(r#"{"members":[]}"#)).unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(res.headers()["content-type"], "application/json");
    }

    #[test]
    fn test_to_hyper_response_rejects_bad_header() {
        let mut res = Response::json("{}");
        res.headers.push(("bad header".to_string(), "x".to_string()));
        assert!(matches!(to_hyper_response(res), Err(Error::InvalidHeader(_))));
    }

    #[tokio::test]
    async fn test_tracker_guard() {
        let tracker = Arc::new(ConnectionTracker::new());
        let guard = tracker.track();
        assert_eq!(tracker.count(), 1);
        assert!(!tracker.drain(Duration::from_millis(30)).await);

        drop(guard);
        assert_eq!(tracker.count(), 0);
        assert!(tracker.drain(Duration::from_millis(30)).await);
    }

    #[tokio::test]
    async fn test_serve_members_over_tcp() {
        let config = ServerConfig {
            hostname: "127.0.0.1".to_string(),
            port: 0,
            ..ServerConfig::default()
        };
        let app = App::new(AppConfig::new().trace(TraceConfig::new().quiet())).unwrap();
        let server = Server::bind(&config, app).unwrap();
        let addr = server.local_addr().unwrap();
        let tracker = server.tracker();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve_with_shutdown(async move {
            let _ = stop_rx.await;
        }));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /members HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"));
        let lower = raw.to_ascii_lowercase();
        assert!(lower.contains("access-control-allow-origin: *\r\n"));
        assert!(lower.contains("content-type: application/json\r\n"));
        assert!(raw.ends_with(r#"{"members":["members1","members2","members3"]}"#));

        stop_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
        assert_eq!(tracker.count(), 0);
    }
}
