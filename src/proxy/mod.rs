//! Credential-holding HTTP proxy in front of the chat-completion API.
//!
//! `POST /openrouter` checks the caller's origin, forces the configured model
//! into the body, attaches the API key and streams the upstream response back.
//! Every response carries CORS headers, added by a middleware layer so error
//! responses get them too.

mod origin;

pub use origin::{allow_origin, is_allowed, is_local};

use crate::config::ProxyConfig;
use crate::generation::{build_http_client, PROXY_PATH};
use anyhow::Context;
use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, HOST, ORIGIN, REFERER,
        },
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::trace::TraceLayer;

/// Sent upstream as `X-Title`.
pub const APP_TITLE: &str = "the-infinite-bitcoin-text";

const ALLOW_HEADERS: &str = "Content-Type, Authorization";
const ALLOW_METHODS: &str = "POST, OPTIONS";

/// Upper bound on one forwarded completion, streaming included.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Forbidden")]
    Forbidden,

    #[error("Missing OPENROUTER_API_KEY")]
    MissingApiKey,

    #[error("Invalid JSON body")]
    InvalidJson,

    #[error("Upstream request failed")]
    Upstream(#[from] reqwest::Error),
}

impl ProxyError {
    fn status(&self) -> StatusCode {
        match self {
            ProxyError::Forbidden => StatusCode::FORBIDDEN,
            ProxyError::MissingApiKey => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::InvalidJson => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Shared state for the proxy handlers.
pub struct ProxyState {
    http: reqwest::Client,
    upstream_url: String,
    model: String,
    allowed_domain: String,
    cors_allow_origin: Option<String>,
    api_key: Option<SecretString>,
}

impl ProxyState {
    /// State from the `[proxy]` config table. The API key comes from the
    /// environment or the file, see [`ProxyConfig::api_key`].
    pub fn new(http: reqwest::Client, config: &ProxyConfig) -> Self {
        Self {
            http,
            upstream_url: config.upstream_url.clone(),
            model: config.model.clone(),
            allowed_domain: config.allowed_domain.clone(),
            cors_allow_origin: config.cors_allow_origin.clone(),
            api_key: config.api_key(),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<SecretString>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Build the proxy router.
pub fn build_router(state: ProxyState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route(PROXY_PATH, post(forward).options(preflight))
        .layer(middleware::from_fn_with_state(state.clone(), cors_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the proxy until Ctrl-C.
pub async fn run(config: &ProxyConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = config
        .bind
        .parse()
        .with_context(|| format!("Invalid proxy bind address '{}'", config.bind))?;
    let http = build_http_client(UPSTREAM_TIMEOUT).context("Failed to create HTTP client")?;

    let state = ProxyState::new(http, config);
    if !state.has_api_key() {
        tracing::warn!("OPENROUTER_API_KEY is not set; every request will fail with 500");
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(
        %addr,
        upstream = %config.upstream_url,
        model = %config.model,
        "Proxy listening"
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
        })
        .await
        .context("Proxy server error")?;

    tracing::info!("Proxy stopped");
    Ok(())
}

fn header_str<'a>(headers: &'a HeaderMap, name: axum::http::HeaderName) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

async fn cors_headers(State(state): State<Arc<ProxyState>>, request: Request, next: Next) -> Response {
    let allow = allow_origin(
        header_str(request.headers(), ORIGIN),
        header_str(request.headers(), HOST),
        state.cors_allow_origin.as_deref(),
    );
    let allow = HeaderValue::from_str(allow).unwrap_or_else(|_| {
        tracing::warn!(value = allow, "cors_allow_origin is not a valid header value, using *");
        HeaderValue::from_static("*")
    });

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, allow);
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
    response
}

async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn forward(
    State(state): State<Arc<ProxyState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let origin = header_str(&headers, ORIGIN);
    let referer = header_str(&headers, REFERER);
    if !is_allowed(origin, referer, &state.allowed_domain) {
        tracing::warn!(origin, referer, "Rejected request from foreign origin");
        return Err(ProxyError::Forbidden);
    }

    let api_key = state.api_key.as_ref().ok_or(ProxyError::MissingApiKey)?;

    let mut payload: Map<String, Value> =
        serde_json::from_slice(&body).map_err(|_| ProxyError::InvalidJson)?;
    payload.insert("model".to_string(), Value::String(state.model.clone()));

    let host = header_str(&headers, HOST);
    let self_origin = if host.is_empty() {
        String::new()
    } else {
        format!("http://{}", host)
    };

    let upstream = state
        .http
        .post(&state.upstream_url)
        .bearer_auth(api_key.expose_secret())
        .header("HTTP-Referer", self_origin)
        .header("X-Title", APP_TITLE)
        .json(&payload)
        .send()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Upstream request failed");
            ProxyError::Upstream(e)
        })?;

    let status = upstream.status();
    tracing::info!(status = status.as_u16(), "Forwarded completion request");

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_statuses() {
        assert_eq!(ProxyError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ProxyError::MissingApiKey.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ProxyError::InvalidJson.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_bodies_are_plain_messages() {
        assert_eq!(ProxyError::Forbidden.to_string(), "Forbidden");
        assert_eq!(ProxyError::MissingApiKey.to_string(), "Missing OPENROUTER_API_KEY");
        assert_eq!(ProxyError::InvalidJson.to_string(), "Invalid JSON body");
    }

    #[test]
    fn test_state_api_key_override() {
        let config = ProxyConfig::default();
        let state = ProxyState::new(reqwest::Client::new(), &config).with_api_key(None);
        assert!(!state.has_api_key());
        let state = state.with_api_key(Some(SecretString::from("sk-test")));
        assert!(state.has_api_key());
    }
}
