//! Response envelope handling.
//!
//! Business responses share one envelope: `{ status, data, message? }`.
//! Listing endpoints put a page object in `data`; the keyword search puts a
//! flat array there. Callers pick the `data` type accordingly.

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::TransportError;

/// Standard response envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope<T> {
    /// Server-side status marker, passed through untouched.
    #[serde(default)]
    pub status: Option<JsonValue>,
    /// Payload.
    pub data: T,
    /// Human-readable message, if the server sent one.
    #[serde(default)]
    pub message: Option<String>,
}

/// A successful response, passed through unchanged.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ApiResponse {
    /// Wraps a raw response.
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Returns the HTTP status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the raw body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_slice(&self.body).map_err(|e| TransportError::Decode {
            reason: e.to_string(),
        })
    }

    /// Decodes the body as an [`Envelope`].
    pub fn envelope<T: DeserializeOwned>(&self) -> Result<Envelope<T>, TransportError> {
        self.json()
    }

    /// Decodes the envelope and returns its payload.
    pub fn data<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        self.envelope().map(|envelope| envelope.data)
    }
}

/// Extracts the envelope `message` from a raw body, if there is one.
pub(crate) fn message_of(body: &[u8]) -> Option<String> {
    let value: JsonValue = serde_json::from_slice(body).ok()?;
    value
        .get("message")
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

/// Extracts per-field validation problems from the envelope `data`, when the
/// server sent them as an object of strings.
pub(crate) fn field_errors_of(body: &[u8]) -> std::collections::BTreeMap<String, String> {
    let Ok(value) = serde_json::from_slice::<JsonValue>(body) else {
        return Default::default();
    };
    value
        .get("data")
        .and_then(JsonValue::as_object)
        .map(|fields| {
            fields
                .iter()
                .filter_map(|(field, problem)| {
                    problem.as_str().map(|p| (field.clone(), p.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(body: JsonValue) -> ApiResponse {
        ApiResponse::new(
            StatusCode::OK,
            HeaderMap::new(),
            serde_json::to_vec(&body).unwrap(),
        )
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Academy {
        id: i64,
        #[serde(rename = "academyName")]
        name: String,
    }

    #[test]
    fn data_decodes_payload() {
        let response = response(json!({
            "status": 200,
            "data": {"id": 1, "academyName": "Engineering"},
        }));
        let academy: Academy = response.data().unwrap();
        assert_eq!(
            academy,
            Academy {
                id: 1,
                name: "Engineering".to_string()
            }
        );
    }

    #[test]
    fn envelope_keeps_message() {
        let response = response(json!({"status": "ok", "data": [], "message": "done"}));
        let envelope: Envelope<Vec<JsonValue>> = response.envelope().unwrap();
        assert_eq!(envelope.message.as_deref(), Some("done"));
        assert_eq!(envelope.status, Some(json!("ok")));
    }

    #[test]
    fn wrong_shape_is_decode_error() {
        let response = response(json!({"data": {"content": []}}));
        let err = response.data::<Vec<JsonValue>>().unwrap_err();
        assert!(matches!(err, TransportError::Decode { .. }));
    }

    #[test]
    fn message_of_ignores_blank_and_non_json() {
        assert_eq!(message_of(br#"{"message": "  "}"#), None);
        assert_eq!(message_of(b"<html>"), None);
        assert_eq!(
            message_of(br#"{"message": "role required"}"#).as_deref(),
            Some("role required")
        );
    }

    #[test]
    fn field_errors_of_reads_string_map() {
        let fields = field_errors_of(br#"{"data": {"email": "taken", "age": 3}}"#);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("email").map(String::as_str), Some("taken"));
    }
}
