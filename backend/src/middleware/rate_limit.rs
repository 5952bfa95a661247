use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header::CONTENT_TYPE, HeaderValue, Response, StatusCode},
    middleware::Next,
    response::Response as AxumResponse,
};
use governor::middleware::StateInformationMiddleware;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::PeerIpKeyExtractor, GovernorError,
    GovernorLayer,
};

use crate::{
    config::Config,
    state::AppState,
    utils::request::client_ip,
};

/// Per-IP limiter for public writes: `max_requests` burst, refilled evenly
/// over the configured window.
pub fn create_public_rate_limiter(
    config: &Config,
) -> GovernorLayer<PeerIpKeyExtractor, StateInformationMiddleware, Body> {
    let (burst_size, period) = quota(
        config.rate_limit_public_max_requests,
        config.rate_limit_public_window_seconds,
    );
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .period(period)
            .burst_size(burst_size)
            .key_extractor(PeerIpKeyExtractor)
            .use_headers()
            .finish()
            .expect("rate limiter config should be valid"),
    );

    GovernorLayer::new(governor_conf).error_handler(rate_limit_error_handler)
}

fn quota(max_requests: u32, window_seconds: u64) -> (u32, Duration) {
    let burst_size = max_requests.max(1);
    let window = Duration::from_secs(window_seconds.max(1));
    let period = (window / burst_size).max(Duration::from_millis(1));
    (burst_size, period)
}

/// Rewrites the peer address to the forwarded client when the connection
/// comes from a trusted proxy, so the limiter keys on the real client.
pub async fn resolve_forwarded_peer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> AxumResponse {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    if let Some(peer) = peer {
        let client = client_ip(
            request.headers(),
            Some(peer.ip()),
            &state.config.trusted_proxies,
        );
        if let Some(client) = client.filter(|ip| *ip != peer.ip()) {
            request
                .extensions_mut()
                .insert(ConnectInfo(SocketAddr::new(client, peer.port())));
        }
    }

    next.run(request).await
}

fn rate_limit_error_handler(error: GovernorError) -> Response<Body> {
    match error {
        GovernorError::TooManyRequests { wait_time, headers } => {
            tracing::warn!(wait_time, "Rate limit exceeded");
            let mut response = json_error_response(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests. Please try again later.",
                "TOO_MANY_REQUESTS",
                Some(wait_time),
            );
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
        GovernorError::UnableToExtractKey => {
            tracing::error!("Rate limiter could not determine the peer address");
            json_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Unable to determine request identity.",
                "INTERNAL_SERVER_ERROR",
                None,
            )
        }
        GovernorError::Other { code, msg, headers } => {
            let mut response = json_error_response(
                code,
                &msg.unwrap_or_else(|| "Rate limit error".to_string()),
                "RATE_LIMIT_ERROR",
                None,
            );
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
    }
}

fn json_error_response(
    status: StatusCode,
    message: &str,
    code: &str,
    retry_after: Option<u64>,
) -> Response<Body> {
    let mut body = serde_json::json!({
        "error": message,
        "code": code,
    });
    if let Some(retry_after) = retry_after {
        body["details"] = serde_json::json!({ "retry_after": retry_after });
    }

    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(retry_after) = retry_after {
        if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
            response.headers_mut().insert("retry-after", value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_spreads_the_window_across_the_burst() {
        assert_eq!(quota(20, 900), (20, Duration::from_secs(45)));
        assert_eq!(quota(2, 60), (2, Duration::from_secs(30)));
    }

    #[test]
    fn quota_clamps_zero_values() {
        let (burst, period) = quota(0, 0);
        assert_eq!(burst, 1);
        assert_eq!(period, Duration::from_secs(1));
    }

    #[test]
    fn too_many_requests_body_matches_app_errors() {
        let response = json_error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "slow down",
            "TOO_MANY_REQUESTS",
            Some(7),
        );
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("retry-after").unwrap(), "7");
    }
}
