use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header::CONTENT_LENGTH, Request},
    middleware::Next,
    response::Response,
    Error as AxumError,
};
use std::time::Instant;

use crate::middleware::request_id::RequestId;

const MAX_BUFFERED_BODY_BYTES: usize = 64 * 1024;
const MAX_LOGGED_BODY_BYTES: usize = 2048;

/// Logs 4xx/5xx responses with a preview of the body. The body is buffered
/// and forwarded unchanged.
pub async fn log_error_responses(req: Request<Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let uri = req.uri().to_string();
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let start = Instant::now();

    let response = next.run(req).await;
    let status = response.status();

    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let event = ErrorEvent {
        status: status.as_u16(),
        method: &method,
        uri: &uri,
        request_id: &request_id,
        latency_ms: start.elapsed().as_millis() as u64,
    };
    let (mut parts, body) = response.into_parts();
    match buffer_body(body).await {
        Ok((bytes, preview)) => {
            event.log(&preview);
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(err) => {
            parts.headers.remove(CONTENT_LENGTH);
            event.log_unreadable(&err);
            Response::from_parts(parts, Body::empty())
        }
    }
}

struct ErrorEvent<'a> {
    status: u16,
    method: &'a str,
    uri: &'a str,
    request_id: &'a str,
    latency_ms: u64,
}

impl ErrorEvent<'_> {
    fn log(&self, body: &str) {
        if self.status >= 500 {
            tracing::error!(
                status = self.status,
                method = self.method,
                uri = self.uri,
                request_id = self.request_id,
                latency_ms = self.latency_ms,
                body,
                "Request completed with error status"
            );
        } else {
            tracing::warn!(
                status = self.status,
                method = self.method,
                uri = self.uri,
                request_id = self.request_id,
                latency_ms = self.latency_ms,
                body,
                "Request completed with error status"
            );
        }
    }

    fn log_unreadable(&self, err: &AxumError) {
        tracing::warn!(
            status = self.status,
            method = self.method,
            uri = self.uri,
            request_id = self.request_id,
            latency_ms = self.latency_ms,
            error = ?err,
            "Failed to read error response body"
        );
    }
}

async fn buffer_body(body: Body) -> Result<(Bytes, String), AxumError> {
    let bytes = to_bytes(body, MAX_BUFFERED_BODY_BYTES).await?;
    Ok((bytes.clone(), preview(&bytes)))
}

fn preview(bytes: &[u8]) -> String {
    if bytes.len() > MAX_LOGGED_BODY_BYTES {
        format!(
            "{}... (truncated, {} bytes total)",
            String::from_utf8_lossy(&bytes[..MAX_LOGGED_BODY_BYTES]),
            bytes.len()
        )
    } else {
        String::from_utf8_lossy(bytes).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_long_bodies() {
        let long = vec![b'a'; MAX_LOGGED_BODY_BYTES + 5];
        let text = preview(&long);
        assert!(text.ends_with(&format!("(truncated, {} bytes total)", long.len())));
        assert_eq!(preview(b"{\"error\":\"x\"}"), "{\"error\":\"x\"}");
    }
}
