//! HTTP surface for the release engine.
//!
//! `POST /process` runs one admission-controlled pass; `GET /health` answers
//! liveness probes. Admission (rate limit, then authorization for forced
//! releases) happens inside the engine; this layer only extracts the caller
//! key, credential and request body and maps outcomes to status codes.

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, ORIGIN},
        HeaderMap, HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use vigil_core::effects::ReleaseEffects;
use vigil_release::{CallerKey, ProcessRequest, ReleaseEngine, ReleaseError, ReleaseReport};

use crate::config::ServerConfig;

/// Header consulted for the caller key behind a trusted proxy.
pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Shared handler state.
pub struct ApiState<E> {
    engine: Arc<ReleaseEngine<E>>,
    trust_forwarded_for: bool,
}

// Manual impl: `E` itself need not be `Clone`.
impl<E> Clone for ApiState<E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            trust_forwarded_for: self.trust_forwarded_for,
        }
    }
}

/// Body of `POST /process`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ProcessBody {
    #[serde(default)]
    pub emergency_release: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub success: bool,
    pub message: String,
    pub overdue_count: usize,
    pub emergency_count: usize,
    pub messages_released: usize,
}

impl From<ReleaseReport> for ProcessResponse {
    fn from(report: ReleaseReport) -> Self {
        Self {
            success: true,
            message: format!(
                "Processed {} overdue configurations",
                report.released_configurations
            ),
            overdue_count: report.released_configurations,
            emergency_count: report.emergency_releases,
            messages_released: report.messages_released,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

/// Errors returned by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid request body: {0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ReleaseError> for ApiError {
    fn from(err: ReleaseError) -> Self {
        match err {
            ReleaseError::RateLimited => Self::RateLimited,
            ReleaseError::Unauthorized(_) => Self::Unauthorized,
            ReleaseError::Fatal(e) => Self::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the router around a shared engine.
pub fn router<E>(engine: Arc<ReleaseEngine<E>>, config: &ServerConfig) -> Router
where
    E: ReleaseEffects + 'static,
{
    let state = ApiState {
        engine,
        trust_forwarded_for: config.trust_forwarded_for,
    };

    Router::new()
        .route("/process", post(process::<E>))
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.allowed_origins)),
        )
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "ignoring unusable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn process<E>(
    State(state): State<ApiState<E>>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ProcessResponse>, ApiError>
where
    E: ReleaseEffects + 'static,
{
    let body = parse_body(&body)?;
    let caller = caller_key(
        &headers,
        connect.map(|ConnectInfo(addr)| addr),
        state.trust_forwarded_for,
    );

    let mut request = if body.emergency_release {
        ProcessRequest::emergency(caller, bearer_credential(&headers))
    } else {
        ProcessRequest::routine(caller)
    };
    if let Some(origin) = headers.get(ORIGIN).and_then(|v| v.to_str().ok()) {
        request = request.with_origin(origin);
    }

    match state.engine.process(request).await {
        Ok(report) => Ok(Json(report.into())),
        Err(err) => {
            if let ReleaseError::Fatal(e) = &err {
                error!(error = %e, "release pass failed");
            }
            Err(err.into())
        }
    }
}

/// An empty body is a routine request.
fn parse_body(raw: &[u8]) -> Result<ProcessBody, ApiError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(ProcessBody::default());
    }
    serde_json::from_slice(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Credential from `Authorization: Bearer <token>`. The scheme is case-insensitive.
pub fn bearer_credential(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim().to_string())
}

/// Caller key: first `X-Forwarded-For` entry when trusted, else the peer address.
pub fn caller_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded: bool) -> CallerKey {
    if trust_forwarded {
        let forwarded = headers
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(first) = forwarded {
            return CallerKey::from(first);
        }
    }
    peer.map_or_else(CallerKey::unknown, |addr| CallerKey::from(addr.ip()))
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve<E, F>(
    engine: Arc<ReleaseEngine<E>>,
    config: &ServerConfig,
    addr: SocketAddr,
    shutdown: F,
) -> std::io::Result<()>
where
    E: ReleaseEffects + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(engine, config);
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "vigil listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_bearer_credential() {
        assert_eq!(
            bearer_credential(&headers(&[("authorization", "Bearer abc")])),
            Some("abc".to_string())
        );
        assert_eq!(
            bearer_credential(&headers(&[("authorization", "bearer  abc ")])),
            Some("abc".to_string())
        );
        assert_eq!(
            bearer_credential(&headers(&[("authorization", "Basic abc")])),
            None
        );
        assert_eq!(bearer_credential(&HeaderMap::new()), None);
    }

    #[test]
    fn test_caller_key_sources() {
        let peer = Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)), 4000));
        let forwarded = headers(&[(FORWARDED_FOR, "203.0.113.7, 10.0.0.1")]);

        assert_eq!(caller_key(&forwarded, peer, true).as_str(), "203.0.113.7");
        assert_eq!(caller_key(&forwarded, peer, false).as_str(), "10.0.0.9");
        assert_eq!(caller_key(&HeaderMap::new(), peer, true).as_str(), "10.0.0.9");
        assert_eq!(caller_key(&HeaderMap::new(), None, false), CallerKey::unknown());
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(b"").unwrap(), ProcessBody::default());
        assert_eq!(parse_body(b"  \n").unwrap(), ProcessBody::default());
        assert_eq!(parse_body(b"{}").unwrap(), ProcessBody::default());
        assert!(parse_body(br#"{"emergency_release":true}"#)
            .unwrap()
            .emergency_release);
        assert!(matches!(
            parse_body(b"{not json"),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(ReleaseError::RateLimited).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::from(ReleaseError::Unauthorized(vigil_release::Denial::Mismatch))
                .status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(ReleaseError::Fatal(vigil_core::VigilError::storage("down")))
                .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
