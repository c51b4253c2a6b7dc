//! Request body helpers

use axum::body::Body;
use axum::http::{HeaderMap, header};
use http_body_util::{BodyExt, Limited};
use serde::de::DeserializeOwned;

use crate::api::error::ApiError;

/// Accepts `application/json`, with or without parameters
///
/// `application/jsonp`, `application/json-patch+json` and `text/json` are
/// rejected.
pub fn parse_content_type(content_type: &str) -> Result<mime::Mime, ApiError> {
    let media_type: mime::Mime = content_type
        .parse()
        .map_err(|_| ApiError::InvalidPayload(format!("invalid Content-Type: {content_type}")))?;

    if media_type.type_() != mime::APPLICATION || media_type.subtype() != mime::JSON {
        return Err(ApiError::InvalidPayload(format!(
            "Content-Type must be application/json, got: {}/{}",
            media_type.type_(),
            media_type.subtype()
        )));
    }

    Ok(media_type)
}

pub fn validate_body_size(data: &[u8], max_size: usize) -> Result<(), ApiError> {
    if data.len() > max_size {
        return Err(ApiError::PayloadTooLarge(data.len()));
    }
    Ok(())
}

/// Comma separated identifiers, blanks dropped
pub fn split_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}

/// Read and decode a JSON body of at most `max_size` bytes
///
/// Decompression already happened in the `RequestDecompressionLayer`.
pub async fn read_json<T: DeserializeOwned>(headers: &HeaderMap, body: Body, max_size: usize) -> Result<T, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;
    parse_content_type(content_type)?;

    let data = Limited::new(body, max_size.saturating_add(1))
        .collect()
        .await
        .map_err(|_| ApiError::PayloadTooLarge(max_size.saturating_add(1)))?
        .to_bytes();
    validate_body_size(&data, max_size)?;

    Ok(serde_json::from_slice(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::Value;

    #[test]
    fn test_parse_content_type_valid() {
        assert!(parse_content_type("application/json").is_ok());
        assert!(parse_content_type("application/json; charset=UTF-8").is_ok());
    }

    #[test]
    fn test_parse_content_type_invalid() {
        assert!(parse_content_type("application/jsonp").is_err());
        assert!(parse_content_type("application/json-patch+json").is_err());
        assert!(parse_content_type("text/json").is_err());
        assert!(parse_content_type("").is_err());
    }

    #[test]
    fn test_validate_body_size() {
        let data = vec![0u8; 1000];
        assert!(validate_body_size(&data, 1000).is_ok());
        assert!(matches!(validate_body_size(&data, 999), Err(ApiError::PayloadTooLarge(1000))));
    }

    #[test]
    fn test_split_ids() {
        assert_eq!(split_ids(" a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_ids("").is_empty());
    }

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    #[tokio::test]
    async fn test_read_json() {
        let value: Value = read_json(&json_headers(), Body::from(r#"{"ids": []}"#), 64).await.unwrap();
        assert_eq!(value["ids"], Value::Array(vec![]));
    }

    #[tokio::test]
    async fn test_read_json_limits() {
        let big = format!(r#"{{"ids": ["{}"]}}"#, "x".repeat(200));
        let err = read_json::<Value>(&json_headers(), Body::from(big), 64).await.unwrap_err();
        assert!(matches!(err, ApiError::PayloadTooLarge(_)));

        let err = read_json::<Value>(&HeaderMap::new(), Body::from("{}"), 64).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidPayload(_)));
    }
}
