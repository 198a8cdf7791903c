use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use chatrelay_core::ValidationError;
use chatrelay_llm::LLMError;
use serde::Serialize;

/// Failure of a chat request, rendered as a single JSON error body
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Upstream(#[from] LLMError),
}

/// `{ "success": false, "error": { "code", "message" } }`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Upstream(e) => upstream_code(e),
        }
    }

    /// Message shown to the caller. Local client failures are not described.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Upstream(e) if e.is_local() => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

/// Stable error code for an upstream failure
pub fn upstream_code(err: &LLMError) -> &'static str {
    match err {
        LLMError::Timeout(_) => "upstream_timeout",
        LLMError::RateLimited { .. } => "upstream_rate_limited",
        LLMError::Config(_) => "internal_error",
        _ => "upstream_error",
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(LLMError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Upstream(LLMError::RateLimited { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream(LLMError::Config(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());
        if let ApiError::Upstream(LLMError::RateLimited { retry_after }) = self {
            response.insert_header((actix_web::http::header::RETRY_AFTER, retry_after.to_string()));
        }
        response.json(ErrorBody {
            success: false,
            error: ErrorDetail {
                code: self.code(),
                message: self.public_message(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::from(ValidationError::EmptyMessages), 400, "validation_error"),
            (ApiError::from(LLMError::Timeout("slow".into())), 504, "upstream_timeout"),
            (ApiError::from(LLMError::RateLimited { retry_after: 3 }), 503, "upstream_rate_limited"),
            (ApiError::from(LLMError::Network("refused".into())), 502, "upstream_error"),
            (
                ApiError::from(LLMError::Api { status: 500, message: "boom".into() }),
                502,
                "upstream_error",
            ),
            (ApiError::from(LLMError::Auth("bad key".into())), 502, "upstream_error"),
            (ApiError::from(LLMError::Config("bad header".into())), 500, "internal_error"),
        ];

        for (err, status, code) in cases {
            assert_eq!(err.status_code().as_u16(), status, "{err}");
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn test_local_errors_are_not_described() {
        let err = ApiError::from(LLMError::Config("Invalid header value".into()));
        assert_eq!(err.public_message(), "internal server error");

        let err = ApiError::from(ValidationError::EmptyMessages);
        assert_eq!(err.public_message(), "message list must not be empty");
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = ApiError::from(LLMError::RateLimited { retry_after: 12 }).error_response();
        assert_eq!(
            response.headers().get("retry-after").and_then(|v| v.to_str().ok()),
            Some("12")
        );
    }
}
