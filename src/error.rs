use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::response::ApiResponse;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Your cart is empty. Please add items before checkout.")]
    EmptyCart,

    #[error("Product \"{0}\" is no longer available. Please remove it from your cart and try again.")]
    ProductUnavailable(String),

    #[error("Insufficient stock for \"{product}\". Available: {available}")]
    InsufficientStock { product: String, available: i32 },

    #[error("Payment verification failed: {0}")]
    PaymentVerificationFailed(String),

    #[error("Payment was not successful (gateway status: {0})")]
    PaymentNotSuccessful(String),

    #[error("This order cannot be cancelled (current status: {status})")]
    NotCancellable { status: String },

    #[error("{0}")]
    InvalidStatus(String),

    #[error("Payment reference {0} has already been used for an order")]
    DuplicatePayment(String),

    #[error("Database error")]
    Persistence(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_)
            | AppError::EmptyCart
            | AppError::InsufficientStock { .. }
            | AppError::PaymentVerificationFailed(_)
            | AppError::PaymentNotSuccessful(_)
            | AppError::NotCancellable { .. }
            | AppError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) | AppError::ProductUnavailable(_) => StatusCode::NOT_FOUND,
            AppError::DuplicatePayment(_) => StatusCode::CONFLICT,
            AppError::Persistence(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable kind reported to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::Unauthenticated(_) => "unauthenticated",
            AppError::Forbidden => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::EmptyCart => "empty_cart",
            AppError::ProductUnavailable(_) => "product_unavailable",
            AppError::InsufficientStock { .. } => "insufficient_stock",
            AppError::PaymentVerificationFailed(_) => "payment_verification_failed",
            AppError::PaymentNotSuccessful(_) => "payment_not_successful",
            AppError::NotCancellable { .. } => "not_cancellable",
            AppError::InvalidStatus(_) => "invalid_status",
            AppError::DuplicatePayment(_) => "duplicate_payment",
            AppError::Persistence(_) => "persistence_failure",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::InvalidRequest(message.into())
    }
}

#[derive(Serialize)]
struct ErrorData {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    available: Option<i32>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Persistence(err) => tracing::error!(error = %err, "database error"),
            AppError::Internal(err) => tracing::error!(error = ?err, "internal error"),
            _ => tracing::debug!(kind = self.kind(), error = %self, "request rejected"),
        }

        let data = ErrorData {
            error: self.kind(),
            current_status: match &self {
                AppError::NotCancellable { status } => Some(status.clone()),
                _ => None,
            },
            available: match &self {
                AppError::InsufficientStock { available, .. } => Some(*available),
                _ => None,
            },
        };
        let body = ApiResponse::failure(self.to_string(), data);

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
