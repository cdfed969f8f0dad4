//! Axum middleware that resolves the caller and logs the request.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use http::header;
use http::uri::Authority;

use crate::auth::credentials::RequestCredentials;
use crate::auth::identity::ResolvedIdentity;
use crate::auth::resolver::SessionResolver;

/// Resolve the caller and store a [`ResolvedIdentity`] in the request extensions.
///
/// The request always continues; rejecting anonymous callers is up to the
/// handlers behind this layer.
pub async fn session_middleware(
    State(resolver): State<Arc<SessionResolver>>,
    mut request: Request,
    next: Next,
) -> Response {
    let credentials = RequestCredentials::from_http(request.headers(), request.uri());
    let resolution = resolver.resolve(&credentials).await;

    let identity = resolution.into_identity();
    tracing::debug!(
        department_id = identity.department().map(|d| d.id.as_str()),
        user_id = identity.user().map(|u| u.id.as_str()),
        "Request identity resolved"
    );

    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// Emit one `access_log` event per request once the response is ready.
///
/// Runs inside [`session_middleware`] so the resolved department can be
/// logged through its logging-safe projection.
pub async fn access_log(request: Request, next: Next) -> Response {
    let remote_address = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    let hostname = request_hostname(&request);
    let protocol = request_protocol(&request).to_string();
    let method = request.method().clone();
    let url = request.uri().to_string();
    let http_version = format!("{:?}", request.version());
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let department = request
        .extensions()
        .get::<ResolvedIdentity>()
        .and_then(|identity| identity.department_log())
        .map(|log| log.to_json().to_string());

    let response = next.run(request).await;

    tracing::info!(
        remote_address = remote_address.as_deref(),
        hostname = hostname.as_deref(),
        protocol = %protocol,
        method = %method,
        url = %url,
        http_version = %http_version,
        user_agent = user_agent.as_deref(),
        status = response.status().as_u16(),
        department = department.as_deref(),
        "access_log"
    );

    response
}

/// Host the client addressed, without the port. Prefers the `Host` header
/// and falls back to an absolute request URI.
fn request_hostname(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<Authority>().ok())
        .map(|authority| authority.host().to_string())
        .or_else(|| request.uri().host().map(str::to_string))
}

/// Scheme of the request, `http` unless the URI says otherwise.
fn request_protocol(request: &Request) -> &str {
    request.uri().scheme_str().unwrap_or("http")
}
