use axum::body::Bytes;
use axum::http::{header, HeaderMap};
use serde_json::Value;

use crate::error::ApiError;

pub const WRONG_MEDIA_TYPE: &str = "Wrong media type. Use 'Content-Type: application/json' instead.";

/// Reject requests whose content type is not `application/json`
pub fn require_json(headers: &HeaderMap) -> Result<(), ApiError> {
    let media_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::trim);

    match media_type {
        Some(media_type) if media_type.eq_ignore_ascii_case("application/json") => Ok(()),
        _ => Err(ApiError::bad_request(WRONG_MEDIA_TYPE)),
    }
}

pub fn parse_json(body: &Bytes) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::invalid_json(format!("Invalid JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_content_type() {
        let mut headers = HeaderMap::new();
        assert_eq!(require_json(&headers), Err(ApiError::bad_request(WRONG_MEDIA_TYPE)));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert!(require_json(&headers).is_err());

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        assert!(require_json(&headers).is_ok());
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_json(&Bytes::from_static(b"[{")).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.message().starts_with("Invalid JSON"));
    }
}
