use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// JSend envelopes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JSendStatus {
    Error,
    Fail,
    Success,
}

#[derive(Debug, Deserialize)]
pub struct JSend<T> {
    pub data: T,
    pub status: JSendStatus,
}

#[derive(Debug, Deserialize)]
pub struct JSendFail {
    pub data: FailData,
    pub status: JSendStatus,
}

#[derive(Debug, Deserialize)]
pub struct FailData {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct JSendError {
    pub message: String,
    pub status: JSendStatus,
}

// ============================================================================
// Client error taxonomy
// ============================================================================

#[derive(Debug, Error)]
pub enum ApiError {
    /// The configured base URL cannot be used to build requests
    #[error("Invalid API base URL: {0}")]
    BaseUrl(String),
    /// The server answered 2xx but the body did not match the envelope
    #[error("Unexpected response shape: {0}")]
    InvalidResponse(String),
    /// The request never produced an HTTP response (DNS, connect, timeout)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// 4xx: the server understood and refused the request
    #[error("Request rejected ({status}): {message}")]
    Rejected { message: String, status: StatusCode },
    /// 5xx: the server failed
    #[error("Server error ({status}): {message}")]
    Server { message: String, status: StatusCode },
}

impl ApiError {
    /// True when the server answered 401: the presented credential is
    /// no longer accepted, as opposed to the request failing en route.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            ApiError::Rejected {
                status: StatusCode::UNAUTHORIZED,
                ..
            }
        )
    }
}

// ============================================================================
// Envelope parsing
// ============================================================================

/// Unwrap a JSend success envelope into its `data`, mapping non-2xx
/// statuses onto the error taxonomy.
pub(crate) async fn parse_envelope<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    if response.status().is_success() {
        let envelope: JSend<T> = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        return Ok(envelope.data);
    }
    Err(parse_failure(response).await)
}

/// Map a non-2xx response onto [`ApiError`], pulling the message out of
/// the JSend body when there is one.
pub(crate) async fn parse_failure(response: Response) -> ApiError {
    let status = response.status();
    if status.is_client_error() {
        let message = response
            .json::<JSendFail>()
            .await
            .map(|fail| fail.data.message)
            .unwrap_or_else(|_| format!("HTTP {status}"));
        ApiError::Rejected { message, status }
    } else {
        let message = response
            .json::<JSendError>()
            .await
            .map(|error| error.message)
            .unwrap_or_else(|_| format!("HTTP {status}"));
        ApiError::Server { message, status }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::TokenPair;

    #[test]
    fn test_success_envelope_deserializes() {
        let envelope: JSend<TokenPair> = serde_json::from_value(serde_json::json!({
            "status": "success",
            "data": {"accessToken": "a-1", "refreshToken": "r-1"},
        }))
        .unwrap();

        assert_eq!(envelope.status, JSendStatus::Success);
        assert_eq!(envelope.data.access_token, "a-1");
    }

    #[test]
    fn test_fail_envelope_deserializes() {
        let envelope: JSendFail = serde_json::from_value(serde_json::json!({
            "status": "fail",
            "data": {"message": "invalid authorization code"},
        }))
        .unwrap();

        assert_eq!(envelope.status, JSendStatus::Fail);
        assert_eq!(envelope.data.message, "invalid authorization code");
    }

    #[test]
    fn test_error_envelope_deserializes() {
        let envelope: JSendError = serde_json::from_value(serde_json::json!({
            "status": "error",
            "message": "database unavailable",
        }))
        .unwrap();

        assert_eq!(envelope.status, JSendStatus::Error);
        assert_eq!(envelope.message, "database unavailable");
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let result: Result<JSend<serde_json::Value>, _> =
            serde_json::from_value(serde_json::json!({
                "status": "partial",
                "data": null,
            }));

        assert!(result.is_err());
    }

    #[test]
    fn test_is_unauthorized_only_matches_401() {
        let unauthorized = ApiError::Rejected {
            message: "expired".to_string(),
            status: StatusCode::UNAUTHORIZED,
        };
        let forbidden = ApiError::Rejected {
            message: "no".to_string(),
            status: StatusCode::FORBIDDEN,
        };
        let server = ApiError::Server {
            message: "boom".to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        };

        assert!(unauthorized.is_unauthorized());
        assert!(!forbidden.is_unauthorized());
        assert!(!server.is_unauthorized());
    }
}
