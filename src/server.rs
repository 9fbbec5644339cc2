//! HTTP front end for the resolver.
//!
//! Provides two endpoints:
//! - `/ip/{addr}` - JSON location for an IPv4 address
//! - `/health` - readiness check, answers once the feeds are loaded

use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use std::future::{Future, IntoFuture};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::error::ResolveError;
use crate::resolver::Resolver;
use crate::{Location, Result};

/// Deadline for handling a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// How long in-flight requests may drain after a shutdown signal.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Server deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerTimeouts {
    /// Time allowed from routing a request to producing its response
    pub request: Duration,
    /// Upper bound on the graceful drain once shutdown starts
    pub shutdown_grace: Duration,
}

impl Default for ServerTimeouts {
    fn default() -> Self {
        Self {
            request: DEFAULT_REQUEST_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Shared, read-only resolver handed to every request.
pub type SharedResolver = Arc<Resolver>;

/// Body of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocateResponse {
    pub country: String,
    pub subdivision1: String,
    pub subdivision2: String,
    pub city: String,
}

impl From<&Location> for LocateResponse {
    fn from(location: &Location) -> Self {
        Self {
            country: location.country.clone(),
            subdivision1: location.subdivision1.clone(),
            subdivision2: location.subdivision2.clone(),
            city: location.city.clone(),
        }
    }
}

/// Reasons a request is rejected before reaching the resolver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("unsupported ipv6: {0}")]
    Ipv6(String),
}

/// Parse the address segment of a request path.
///
/// IPv4-mapped IPv6 addresses are not unwrapped: only dotted IPv4 input is
/// accepted.
pub fn decode_request(raw: &str) -> std::result::Result<Ipv4Addr, RequestError> {
    match raw.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(addr)) => Ok(addr),
        Ok(IpAddr::V6(_)) => Err(RequestError::Ipv6(raw.to_string())),
        Err(_) => Err(RequestError::Invalid(raw.to_string())),
    }
}

/// Map a lookup to an HTTP response.
pub fn locate(resolver: &Resolver, raw: &str) -> Response {
    let addr = match decode_request(raw) {
        Ok(addr) => addr,
        Err(e) => return bad_request(e),
    };

    match resolver.resolve(addr) {
        Ok(location) => json_response(&LocateResponse::from(location)),
        Err(ResolveError::UnknownLocation(_)) => {
            log::debug!("no location for {}", addr);
            StatusCode::NOT_FOUND.into_response()
        }
        Err(e @ ResolveError::DataInconsistency { .. }) => {
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e)).into_response()
        }
    }
}

fn bad_request(e: RequestError) -> Response {
    (StatusCode::BAD_REQUEST, format!("{}\n", e)).into_response()
}

fn json_response(body: &LocateResponse) -> Response {
    match serde_json::to_string_pretty(body) {
        Ok(json) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
            json,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e)).into_response(),
    }
}

async fn locate_handler(
    State(resolver): State<SharedResolver>,
    Path(raw): Path<String>,
) -> Response {
    locate(&resolver, &raw)
}

async fn fallback_handler(uri: Uri) -> Response {
    let path = uri.path();
    match path.strip_prefix("/ip") {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            bad_request(RequestError::Invalid(rest.trim_start_matches('/').to_string()))
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn request_deadline(State(limit): State<Duration>, req: Request, next: Next) -> Response {
    let uri = req.uri().clone();
    match tokio::time::timeout(limit, next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            log::warn!("request to {} timed out after {:?}", uri, limit);
            StatusCode::REQUEST_TIMEOUT.into_response()
        }
    }
}

/// Answer 408 for any request that takes longer than `limit`.
pub(crate) fn with_request_timeout(router: Router, limit: Duration) -> Router {
    router.layer(middleware::from_fn_with_state(limit, request_deadline))
}

/// Build the router for a resolver.
///
/// Any path under `/ip` that is not a single address segment, including an
/// empty one, is answered with 400.
pub fn router(resolver: SharedResolver, request_timeout: Duration) -> Router {
    let routes = Router::new()
        .route("/ip/:addr", get(locate_handler))
        .route("/health", get(health_handler))
        .fallback(fallback_handler)
        .with_state(resolver);
    with_request_timeout(routes, request_timeout)
}

/// Bind `listen` and serve until Ctrl-C, then drain open connections for at
/// most `timeouts.shutdown_grace`.
pub async fn serve(
    resolver: SharedResolver,
    listen: SocketAddr,
    timeouts: ServerTimeouts,
) -> Result<()> {
    let listener = TcpListener::bind(listen).await?;
    log::info!("listening on {}", listener.local_addr()?);

    let app = router(resolver, timeouts.request);
    run(listener, app, timeouts.shutdown_grace, shutdown_signal()).await?;

    log::info!("server stopped");
    Ok(())
}

/// Serve `app` until `signal` resolves, then wait up to `grace` for open
/// connections. Connections still open after that are left to the runtime
/// shutdown.
pub(crate) async fn run<F>(
    listener: TcpListener,
    app: Router,
    grace: Duration,
    signal: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let stopping = Arc::new(Notify::new());
    let notify = Arc::clone(&stopping);
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.await;
            notify.notify_one();
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return Ok(result?),
        _ = stopping.notified() => {}
    }

    match tokio::time::timeout(grace, server).await {
        Ok(result) => result?,
        Err(_) => log::warn!("connections still open after {:?}, closing them", grace),
    }
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("caught interrupt, shutting down"),
        Err(e) => log::error!("failed to listen for interrupt: {}", e),
    }
}
