use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, HeaderValue},
    response::Response,
};
use service_core::error::AppError;

/// Request bodies are buffered before forwarding; uploads beyond this go
/// through the file service's own streaming surface.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Forward a request to `target_base` + `target_path`, overlaying
/// `extra_headers` (tenant id and the internal bearer for authenticated
/// routes) and stripping hop-by-hop headers.
pub async fn forward(
    client: &reqwest::Client,
    target_base: &str,
    target_path: &str,
    req: Request,
    extra_headers: HeaderMap,
) -> Result<Response, AppError> {
    let (parts, body) = req.into_parts();

    let query = parts.uri.query().map(|q| format!("?{}", q)).unwrap_or_default();
    let url = format!("{}{}{}", target_base.trim_end_matches('/'), target_path, query);

    let body_bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read request body: {}", e)))?;

    let mut headers = HeaderMap::new();
    for (name, value) in parts.headers.iter() {
        if is_hop_by_hop(name) {
            continue;
        }
        // The client's bearer never travels past the gateway.
        if name == header::AUTHORIZATION && extra_headers.contains_key(header::AUTHORIZATION) {
            continue;
        }
        headers.insert(name.clone(), value.clone());
    }
    for (name, value) in extra_headers.iter() {
        headers.insert(name.clone(), value.clone());
    }

    let upstream = client
        .request(parts.method.clone(), &url)
        .headers(headers)
        .body(body_bytes)
        .send()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, url = %url, "Upstream request failed");
            AppError::BadGateway(format!("upstream unreachable: {}", e))
        })?;

    let status = upstream.status();
    let mut response_headers = HeaderMap::new();
    for (name, value) in upstream.headers().iter() {
        if !is_hop_by_hop(name) {
            response_headers.insert(name.clone(), value.clone());
        }
    }

    let bytes = upstream.bytes().await.map_err(|e| {
        AppError::BadGateway(format!("failed to read upstream response: {}", e))
    })?;

    let mut response = Response::builder()
        .status(status)
        .body(Body::from(bytes))
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to build response: {}", e)))?;
    *response.headers_mut() = response_headers;

    Ok(response)
}

pub fn bearer_header(token: &str) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Invalid header value: {}", e)))
}

fn is_hop_by_hop(name: &header::HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
            | "host"
            | "content-length"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_by_hop_headers_are_recognized() {
        assert!(is_hop_by_hop(&header::CONNECTION));
        assert!(is_hop_by_hop(&header::HOST));
        assert!(is_hop_by_hop(&header::CONTENT_LENGTH));
        assert!(!is_hop_by_hop(&header::AUTHORIZATION));
        assert!(!is_hop_by_hop(&header::CONTENT_TYPE));
    }

    #[test]
    fn bearer_header_formats() {
        let value = bearer_header("abc123").unwrap();
        assert_eq!(value.to_str().unwrap(), "Bearer abc123");
    }
}
