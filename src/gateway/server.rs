// Copyright (c) 2026 Vela Contributors.
// Licensed under the MIT license.

//! Request and upgrade routing
//!
//! One event-driven accept loop. Every inbound request is classified by
//! the endpoint matcher and dispatched: bare tunnel traffic to its
//! endpoint, everything else to the default application. WebSocket
//! upgrades pass the admission controller before a tunnel ever sees them;
//! rejected or unmatched upgrades are answered and closed, never left
//! hanging. A failure on one connection is logged and contained, the
//! server keeps serving the rest.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{CONNECTION, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY, UPGRADE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioIo, TokioTimer};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::gateway::admission::{Admission, AdmissionController};
use crate::gateway::app::{not_found, StaticApp};
use crate::gateway::config::GatewayConfig;
use crate::gateway::routes::{EndpointMatcher, RouteDecision};
use crate::gateway::tunnel::{GatewayBody, TunnelRegistry};

/// How an upgrade attempt is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpgradePlan {
    /// Forward to the matched tunnel endpoint
    Forward,
    /// Admission rejected the client; close without completing the
    /// handshake
    Throttled,
    /// No tunnel mounted at this path; close the connection
    Unmatched,
}

/// The traffic dispatch gateway
pub struct Gateway {
    config: GatewayConfig,
    matcher: EndpointMatcher,
    admission: Arc<AdmissionController>,
    app: Arc<StaticApp>,
    tunnels: TunnelRegistry,
}

impl Gateway {
    /// Assemble a gateway from its parts
    pub fn new(config: GatewayConfig, tunnels: TunnelRegistry) -> Self {
        let matcher = EndpointMatcher::new(&config);
        let admission = Arc::new(AdmissionController::new(
            config.max_connections_per_client,
            config.window_duration,
            config.block_duration,
        ));
        let app = Arc::new(StaticApp::new(config.static_root.clone()));
        Self {
            config,
            matcher,
            admission,
            app,
            tunnels,
        }
    }

    /// Access the admission controller (shared with the eviction task)
    pub fn admission(&self) -> Arc<AdmissionController> {
        self.admission.clone()
    }

    /// Bind and serve until the process is stopped
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = TcpListener::bind(addr).await?;
        info!("Gateway listening on http://{}", addr);
        info!("  - wisp endpoints: {:?}", self.config.wisp_paths);
        info!("  - bare endpoint:  {}", self.config.bare_prefix);

        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        self.clone().spawn_eviction_task();

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    continue;
                }
            };
            let gateway = self.clone();
            tokio::spawn(async move {
                gateway.serve_connection(stream, peer.ip()).await;
            });
        }
    }

    /// Periodically drop admission state for idle clients
    fn spawn_eviction_task(self: Arc<Self>) {
        let period = self.config.window_duration + self.config.block_duration;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                self.admission.evict_idle();
                debug!(
                    "Admission table swept, {} clients tracked",
                    self.admission.tracked_clients()
                );
            }
        });
    }

    /// Serve one TCP connection
    async fn serve_connection(self: Arc<Self>, stream: tokio::net::TcpStream, peer: IpAddr) {
        let io = TokioIo::new(stream);
        let tracker = IdleTracker::new();
        let gateway = self.clone();
        let activity = tracker.clone();
        let service = service_fn(move |req| {
            activity.touch();
            let gateway = gateway.clone();
            async move {
                let deadline = gateway.config.request_timeout;
                let response = bounded(deadline, gateway.dispatch(req, peer)).await;
                Ok::<_, std::convert::Infallible>(response)
            }
        });

        let connection = http1::Builder::new()
            .timer(TokioTimer::new())
            .keep_alive(true)
            .max_buf_size(self.config.max_header_bytes)
            // The keep-alive budget also bounds header reads; a client
            // that cannot finish its headers in that time is treated the
            // same as one idling between requests
            .header_read_timeout(self.config.keep_alive_timeout)
            .serve_connection(io, service)
            .with_upgrades();
        let mut connection = std::pin::pin!(connection);

        let idle_limit = self.config.keep_alive_timeout;
        loop {
            tokio::select! {
                result = connection.as_mut() => {
                    if let Err(e) = result {
                        // Connection-level failures stay on this connection
                        debug!("Connection from {} ended with error: {}", peer, e);
                    }
                    return;
                }
                _ = tokio::time::sleep(idle_limit) => {
                    if tracker.is_idle(idle_limit) {
                        debug!("Closing idle connection from {}", peer);
                        connection.as_mut().graceful_shutdown();
                        if let Err(e) = connection.as_mut().await {
                            debug!("Connection from {} ended with error: {}", peer, e);
                        }
                        return;
                    }
                }
            }
        }
    }

    /// Route one request or upgrade attempt
    async fn dispatch(&self, req: Request<Incoming>, peer: IpAddr) -> Response<GatewayBody> {
        let path = req.uri().path().to_string();
        if is_upgrade_request(&req) {
            self.route_upgrade(req, &path, peer).await
        } else {
            self.route_request(req, &path).await
        }
    }

    /// Request router: bare tunnel traffic or the default application
    async fn route_request(&self, req: Request<Incoming>, path: &str) -> Response<GatewayBody> {
        let decision = self
            .matcher
            .classify_with_files(path, false, |p| self.app.file_exists(p));

        match decision {
            RouteDecision::BareTunnel => match self.tunnels.bare.handle_request(req).await {
                Ok(response) => response,
                Err(e) => {
                    error!("Bare endpoint failed for {}: {}", path, e);
                    internal_error()
                }
            },
            decision => self.app.respond(path, decision).await,
        }
    }

    /// Upgrade router: admission-gated tunnel dispatch
    async fn route_upgrade(
        &self,
        mut req: Request<Incoming>,
        path: &str,
        peer: IpAddr,
    ) -> Response<GatewayBody> {
        let decision = self.matcher.classify(path, true);
        let plan = plan_upgrade(decision, || self.admission.admit(peer));

        match plan {
            UpgradePlan::Unmatched => {
                debug!("No tunnel mounted at {}, closing upgrade from {}", path, peer);
                closing(not_found())
            }
            UpgradePlan::Throttled => {
                info!("Throttled upgrade from {} on {}", peer, path);
                closing(too_many_requests())
            }
            UpgradePlan::Forward => {
                let Some(key) = req.headers().get(SEC_WEBSOCKET_KEY).cloned() else {
                    return closing(bad_request("Missing Sec-WebSocket-Key"));
                };

                let tunnels = self.tunnels.clone();
                let target_path = path.to_string();
                let on_upgrade = hyper::upgrade::on(&mut req);
                tokio::spawn(async move {
                    let upgraded = match on_upgrade.await {
                        Ok(upgraded) => upgraded,
                        Err(e) => {
                            warn!("Upgrade never completed on {}: {}", target_path, e);
                            return;
                        }
                    };
                    let io = TokioIo::new(upgraded);
                    // From here the endpoint owns the socket
                    let result = match decision {
                        RouteDecision::BareTunnel => {
                            tunnels.bare.handle_upgrade(target_path.clone(), io).await
                        }
                        _ => tunnels.wisp.handle_upgrade(target_path.clone(), io).await,
                    };
                    if let Err(e) = result {
                        // Destroy the connection, keep serving everyone else
                        error!("Tunnel connection on {} failed: {}", target_path, e);
                    }
                });

                switching_protocols(&key)
            }
        }
    }
}

/// Last-activity clock for one connection
///
/// Touched at the start of every dispatched request; the per-connection
/// watchdog shuts the connection down once it has sat untouched for the
/// full keep-alive budget.
struct IdleTracker {
    last_activity: Mutex<Instant>,
}

impl IdleTracker {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            last_activity: Mutex::new(Instant::now()),
        })
    }

    fn touch(&self) {
        self.touch_at(Instant::now());
    }

    fn touch_at(&self, now: Instant) {
        *self.last_activity.lock() = now;
    }

    fn is_idle(&self, limit: Duration) -> bool {
        self.is_idle_at(Instant::now(), limit)
    }

    fn is_idle_at(&self, now: Instant, limit: Duration) -> bool {
        now.duration_since(*self.last_activity.lock()) >= limit
    }
}

/// Run a dispatch future against the request deadline
///
/// A dispatch that outlives the deadline is answered with a 408 and the
/// connection is marked for closure.
async fn bounded<F>(deadline: Duration, dispatch: F) -> Response<GatewayBody>
where
    F: std::future::Future<Output = Response<GatewayBody>>,
{
    match tokio::time::timeout(deadline, dispatch).await {
        Ok(response) => response,
        Err(_) => {
            warn!("Request dispatch exceeded {:?}", deadline);
            closing(request_timed_out())
        }
    }
}

/// Decide what to do with an upgrade attempt
///
/// Admission is only consulted for matched tunnel routes, so unmatched
/// probes never consume a client's allowance.
fn plan_upgrade(decision: RouteDecision, admit: impl FnOnce() -> Admission) -> UpgradePlan {
    if !decision.is_tunnel() {
        return UpgradePlan::Unmatched;
    }
    match admit() {
        Admission::Allow => UpgradePlan::Forward,
        Admission::Reject => UpgradePlan::Throttled,
    }
}

/// Check for a WebSocket upgrade attempt
fn is_upgrade_request<B>(req: &Request<B>) -> bool {
    let wants_upgrade = req
        .headers()
        .get(CONNECTION)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(',')
                .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
        })
        .unwrap_or(false);
    let is_websocket = req
        .headers()
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);
    wants_upgrade && is_websocket
}

/// Build the 101 handshake response for an accepted tunnel upgrade
fn switching_protocols(key: &hyper::header::HeaderValue) -> Response<GatewayBody> {
    let accept = derive_accept_key(key.as_bytes());
    Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(CONNECTION, "Upgrade")
        .header(UPGRADE, "websocket")
        .header(SEC_WEBSOCKET_ACCEPT, accept)
        .body(Full::new(Bytes::new()))
        .unwrap_or_default()
}

/// Mark a refusal response so the connection closes instead of hanging
fn closing(mut response: Response<GatewayBody>) -> Response<GatewayBody> {
    response
        .headers_mut()
        .insert(CONNECTION, hyper::header::HeaderValue::from_static("close"));
    response
}

fn too_many_requests() -> Response<GatewayBody> {
    Response::builder()
        .status(StatusCode::TOO_MANY_REQUESTS)
        .header("content-type", "text/plain")
        .body(Full::new(Bytes::from_static(b"Too Many Requests")))
        .unwrap_or_default()
}

fn request_timed_out() -> Response<GatewayBody> {
    Response::builder()
        .status(StatusCode::REQUEST_TIMEOUT)
        .header("content-type", "text/plain")
        .body(Full::new(Bytes::from_static(b"Request Timeout")))
        .unwrap_or_default()
}

fn bad_request(reason: &'static str) -> Response<GatewayBody> {
    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .header("content-type", "text/plain")
        .body(Full::new(Bytes::from_static(reason.as_bytes())))
        .unwrap_or_default()
}

fn internal_error() -> Response<GatewayBody> {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header("content-type", "text/plain")
        .body(Full::new(Bytes::from_static(b"Internal Server Error")))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upgrade_req(connection: &str, upgrade: &str) -> Request<()> {
        Request::builder()
            .uri("/wisp/")
            .header(CONNECTION, connection)
            .header(UPGRADE, upgrade)
            .body(())
            .unwrap()
    }

    #[test]
    fn test_is_upgrade_request() {
        assert!(is_upgrade_request(&upgrade_req("Upgrade", "websocket")));
        assert!(is_upgrade_request(&upgrade_req(
            "keep-alive, Upgrade",
            "WebSocket"
        )));
        assert!(!is_upgrade_request(&upgrade_req("keep-alive", "websocket")));

        let plain = Request::builder().uri("/wisp/").body(()).unwrap();
        assert!(!is_upgrade_request(&plain));
    }

    #[test]
    fn test_plan_upgrade_skips_admission_for_unmatched_routes() {
        let plan = plan_upgrade(RouteDecision::NotFound, || {
            panic!("admission must not run for unmatched upgrades")
        });
        assert_eq!(plan, UpgradePlan::Unmatched);
    }

    #[test]
    fn test_plan_upgrade_admission_outcomes() {
        assert_eq!(
            plan_upgrade(RouteDecision::WispTunnel, || Admission::Allow),
            UpgradePlan::Forward
        );
        assert_eq!(
            plan_upgrade(RouteDecision::BareTunnel, || Admission::Reject),
            UpgradePlan::Throttled
        );
    }

    #[test]
    fn test_switching_protocols_accept_key() {
        // RFC 6455 sample handshake
        let key = hyper::header::HeaderValue::from_static("dGhlIHNhbXBsZSBub25jZQ==");
        let response = switching_protocols(&key);
        assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
        assert_eq!(
            response.headers()[SEC_WEBSOCKET_ACCEPT],
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_closing_marks_connection_close() {
        let response = closing(too_many_requests());
        assert_eq!(response.headers()[CONNECTION], "close");
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_idle_tracker_counts_from_last_touch() {
        let tracker = IdleTracker::new();
        let limit = Duration::from_secs(65);
        let now = Instant::now();

        assert!(!tracker.is_idle_at(now, limit));
        assert!(tracker.is_idle_at(now + Duration::from_secs(66), limit));

        // A touch restarts the idle clock
        tracker.touch_at(now + Duration::from_secs(60));
        assert!(!tracker.is_idle_at(now + Duration::from_secs(66), limit));
        assert!(tracker.is_idle_at(now + Duration::from_secs(125), limit));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_dispatch_is_answered_with_408() {
        let response = bounded(
            Duration::from_millis(50),
            std::future::pending::<Response<GatewayBody>>(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(response.headers()[CONNECTION], "close");
    }

    #[tokio::test]
    async fn test_fast_dispatch_passes_the_deadline() {
        let response = bounded(Duration::from_secs(1), async { not_found() }).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_idle_keepalive_connection_is_closed() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>app</html>").unwrap();

        let config = GatewayConfig::new()
            .static_root(dir.path())
            .keep_alive_timeout(Duration::from_millis(100));
        let gateway = Arc::new(Gateway::new(config, TunnelRegistry::disconnected()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(gateway.serve(listener));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nhost: localhost\r\n\r\n")
            .await
            .unwrap();

        let mut buf = [0u8; 4096];
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "expected a response before idling");

        // Left idle, the watchdog must close the connection
        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => continue,
                }
            }
        })
        .await;
        assert!(closed.is_ok(), "idle connection was never closed");
    }
}
