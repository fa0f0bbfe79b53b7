//! Validation utilities for Web API DTOs.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::web::error::ApiError;

/// A JSON extractor that validates the request body.
///
/// This extractor deserializes the request body as JSON and then validates it
/// using the `validator` crate. If validation fails, it returns a detailed
/// error response with field-level error information.
///
/// # Example
///
/// ```ignore
/// use sharegate::web::dto::{RegisterRequest, ValidatedJson};
///
/// async fn register(
///     ValidatedJson(payload): ValidatedJson<RegisterRequest>,
/// ) -> Result<Json<UserInfo>, ApiError> {
///     // payload is already validated
///     // ...
/// }
/// ```
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        // First, extract the JSON body
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e)))?;

        // Then, validate the deserialized value
        value.validate().map_err(ApiError::from_validation_errors)?;

        Ok(ValidatedJson(value))
    }
}

/// Parse an optional JSON body, falling back to `T::default()` when empty.
pub fn parse_optional_json<T>(body: &[u8]) -> Result<T, ApiError>
where
    T: DeserializeOwned + Validate + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    let value: T = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e)))?;
    value.validate().map_err(ApiError::from_validation_errors)?;
    Ok(value)
}

// ============================================================================
// Custom Validators
// ============================================================================

/// Validate that a string does not contain control characters or NULL bytes.
pub fn no_control_chars(value: &str) -> Result<(), validator::ValidationError> {
    if value
        .chars()
        .any(|c| c.is_control() && c != '\n' && c != '\r' && c != '\t')
    {
        return Err(validator::ValidationError::new("no_control_chars")
            .with_message("Must not contain control characters".into()));
    }
    Ok(())
}

/// Sanitize a string by removing control characters except newlines, carriage returns, and tabs.
pub fn sanitize_string(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\r' || *c == '\t')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_control_chars_valid() {
        assert!(no_control_chars("Quarterly report").is_ok());
        assert!(no_control_chars("Line 1\nLine 2").is_ok());
        assert!(no_control_chars("Tab\there").is_ok());
        assert!(no_control_chars("Return\rhere").is_ok());
    }

    #[test]
    fn test_no_control_chars_invalid() {
        assert!(no_control_chars("Hello\x00World").is_err()); // NULL byte
        assert!(no_control_chars("Hello\x07World").is_err()); // Bell
        assert!(no_control_chars("Hello\x1bWorld").is_err()); // Escape
    }

    #[derive(Debug, Default, serde::Deserialize, Validate)]
    struct Limit {
        #[validate(range(min = 1))]
        max: Option<i64>,
    }

    #[test]
    fn test_parse_optional_json_empty_body() {
        let parsed: Limit = parse_optional_json(b"").unwrap();
        assert_eq!(parsed.max, None);
        let parsed: Limit = parse_optional_json(b"  \n").unwrap();
        assert_eq!(parsed.max, None);
    }

    #[test]
    fn test_parse_optional_json_validates() {
        let parsed: Limit = parse_optional_json(br#"{"max": 3}"#).unwrap();
        assert_eq!(parsed.max, Some(3));
        assert!(parse_optional_json::<Limit>(br#"{"max": 0}"#).is_err());
        assert!(parse_optional_json::<Limit>(b"{not json").is_err());
    }

    #[test]
    fn test_sanitize_string() {
        assert_eq!(sanitize_string("Q3 figures"), "Q3 figures");
        assert_eq!(sanitize_string("Draft\nfor review"), "Draft\nfor review");
        assert_eq!(sanitize_string("Draft\x00v2"), "Draftv2");
        assert_eq!(sanitize_string("Draft\x1b[31mv2"), "Draft[31mv2");
    }
}
