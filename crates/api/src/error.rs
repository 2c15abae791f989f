//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{OrderError, ProcurementError};
use procurement::ServiceError;
use saga::SagaError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Saga execution error.
    Saga(SagaError),
    /// Procurement service error.
    Procurement(ServiceError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Saga(err) => saga_error_to_response(err),
            ApiError::Procurement(err) => procurement_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn saga_error_to_response(err: SagaError) -> (StatusCode, String) {
    match &err {
        SagaError::Order(order_err) => match order_err {
            OrderError::NoLines
            | OrderError::InvalidQuantity { .. }
            | OrderError::NegativePrice { .. }
            | OrderError::Money(_) => (StatusCode::BAD_REQUEST, err.to_string()),
            OrderError::InvalidSagaTransition { .. } => (StatusCode::CONFLICT, err.to_string()),
        },
        SagaError::Store(store_err) => store_error_to_response(store_err, err.to_string()),
    }
}

fn procurement_error_to_response(err: ServiceError) -> (StatusCode, String) {
    match &err {
        ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        ServiceError::Procurement(rule) => match rule {
            ProcurementError::TitleRequired
            | ProcurementError::DescriptionRequired
            | ProcurementError::ZeroBudget
            | ProcurementError::BuyerRequired
            | ProcurementError::ZeroBidAmount
            | ProcurementError::Money(_) => (StatusCode::BAD_REQUEST, err.to_string()),
            ProcurementError::BidNotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
            _ => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        },
        ServiceError::Store(store_err) => store_error_to_response(store_err, err.to_string()),
    }
}

fn store_error_to_response(err: &StoreError, message: String) -> (StatusCode, String) {
    match err {
        StoreError::ConcurrencyConflict { .. } => (StatusCode::CONFLICT, message),
        StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, message),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, message),
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Procurement(err)
    }
}
