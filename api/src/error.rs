//! Error Handling Module
//!
//! Maps engine and infrastructure failures onto HTTP status codes with stable
//! machine-readable codes. Uses thiserror for the error type and tracing for
//! server-side logging of 5xx responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dsc_engine::{EngineError, ErrorKind};
use serde::Serialize;
use thiserror::Error;

/// API 에러 타입
///
/// 엔진 에러는 `ErrorKind`에 따라 매핑
/// - Validation → 400
/// - Solvency / Transfer → 422
/// - Reentrant → 409
/// - Issuance / 연산 오류 → 500
#[derive(Debug, Error)]
pub enum ApiError {
    // ============ 400 Bad Request ============
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    // ============ 404 Not Found ============
    #[error("Resource not found: {0}")]
    NotFound(String),

    // ============ Engine ============
    #[error(transparent)]
    Engine(#[from] EngineError),

    // ============ 500 Internal Server Error ============
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error")]
    InternalError,

    // ============ 503 Service Unavailable ============
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// API 에러 응답 구조
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            // 4xx 클라이언트 에러
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg.clone(),
                None,
            ),
            ApiError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "Validation failed".to_string(),
                Some(msg.clone()),
            ),
            ApiError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{} not found", resource),
                None,
            ),

            ApiError::Engine(err) => {
                let status = engine_status(err);
                if status.is_server_error() {
                    tracing::error!("Engine error: {:?}", err);
                }
                (status, engine_error_code(err), err.to_string(), None)
            }

            // 5xx 서버 에러
            ApiError::DatabaseError(_) => {
                // 내부 에러는 클라이언트에 상세 정보 노출 안 함
                tracing::error!("Database error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error occurred".to_string(),
                    None,
                )
            }
            ApiError::InternalError => {
                tracing::error!("Internal error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            ApiError::ServiceUnavailable(service) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                format!("{} is currently unavailable", service),
                None,
            ),
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

fn engine_status(err: &EngineError) -> StatusCode {
    match err {
        EngineError::ReentrantCall => StatusCode::CONFLICT,
        _ => match err.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Transfer | ErrorKind::Solvency => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Issuance | ErrorKind::Execution => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

/// 엔진 에러별 고정 코드
pub fn engine_error_code(err: &EngineError) -> &'static str {
    match err {
        EngineError::AmountMustBeMoreThanZero => "AMOUNT_MUST_BE_MORE_THAN_ZERO",
        EngineError::ZeroAddressNotAllowed => "ZERO_ADDRESS_NOT_ALLOWED",
        EngineError::TokenNotAllowed(_) => "TOKEN_NOT_ALLOWED",
        EngineError::ConfigLengthMismatch { .. } => "CONFIG_LENGTH_MISMATCH",
        EngineError::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
        EngineError::InsufficientCollateral { .. } => "INSUFFICIENT_COLLATERAL",
        EngineError::BurnAmountExceedsDebt { .. } => "BURN_AMOUNT_EXCEEDS_DEBT",
        EngineError::TransferFailed { .. } => "TRANSFER_FAILED",
        EngineError::HealthFactorBelowMinimum(_) => "HEALTH_FACTOR_BELOW_MINIMUM",
        EngineError::HealthFactorIsFine => "HEALTH_FACTOR_IS_FINE",
        EngineError::HealthFactorNotImproved => "HEALTH_FACTOR_NOT_IMPROVED",
        EngineError::MintFailed => "MINT_FAILED",
        EngineError::DebtToken(_) => "DEBT_TOKEN_ERROR",
        EngineError::ReentrantCall => "REENTRANT_CALL",
        EngineError::ArithmeticOverflow { .. } => "ARITHMETIC_OVERFLOW",
        EngineError::DivisionByZero => "DIVISION_BY_ZERO",
    }
}

/// SQLx 에러를 ApiError로 변환
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("SQLx error: {:?}", err);
        ApiError::DatabaseError(err.to_string())
    }
}

/// anyhow 에러를 ApiError로 변환
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Anyhow error: {:?}", err);
        ApiError::InternalError
    }
}
