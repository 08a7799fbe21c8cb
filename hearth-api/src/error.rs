use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use hearth_booking::changes::ChangeError;
use hearth_booking::manager::BookingError;
use hearth_booking::repository::ReservationStoreError;
use hearth_catalog::plans::QuotaError;
use hearth_catalog::pricing::QuoteError;
use hearth_catalog::property::PropertyError;
use hearth_catalog::repository::PropertyStoreError;
use hearth_core::account::AccountStoreError;
use hearth_core::payment::{CardError, PaymentStoreError};
use hearth_core::CoreError;

#[derive(Debug)]
pub enum AppError {
    Validation(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    TooManyRequests { retry_after_secs: u64 },
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::TooManyRequests { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                format!(
                    "Too many requests. Please try again in {} seconds.",
                    retry_after_secs
                ),
            ),
            AppError::Internal(err) => {
                tracing::error!("Internal Server Error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "status": "error",
            "message": message,
            "errors": null,
        }));

        if let AppError::TooManyRequests { retry_after_secs } = self {
            (
                status,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                body,
            )
                .into_response()
        } else {
            (status, body).into_response()
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<AccountStoreError> for AppError {
    fn from(err: AccountStoreError) -> Self {
        match err {
            AccountStoreError::EmailTaken => {
                AppError::Conflict("email is already registered".into())
            }
            AccountStoreError::NotFound => AppError::NotFound("account not found".into()),
            AccountStoreError::Backend(e) => AppError::Internal(anyhow::anyhow!(e)),
        }
    }
}

impl From<PropertyStoreError> for AppError {
    fn from(err: PropertyStoreError) -> Self {
        match err {
            PropertyStoreError::NotFound => AppError::NotFound("property not found".into()),
            PropertyStoreError::Backend(e) => AppError::Internal(anyhow::anyhow!(e)),
        }
    }
}

impl From<ReservationStoreError> for AppError {
    fn from(err: ReservationStoreError) -> Self {
        match err {
            ReservationStoreError::Unavailable => {
                AppError::Conflict("property is not available for the selected dates".into())
            }
            ReservationStoreError::NotFound => AppError::NotFound("reservation not found".into()),
            ReservationStoreError::Backend(e) => AppError::Internal(anyhow::anyhow!(e)),
        }
    }
}

impl From<PaymentStoreError> for AppError {
    fn from(err: PaymentStoreError) -> Self {
        match err {
            PaymentStoreError::NotFound => AppError::NotFound("payment not found".into()),
            PaymentStoreError::Backend(e) => AppError::Internal(anyhow::anyhow!(e)),
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => AppError::Validation(msg),
            CoreError::IdentityError(msg) => AppError::Unauthorized(msg),
            CoreError::InternalError(msg) => AppError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::DeadlinePassed => {
                AppError::Validation("cancellation deadline has passed".into())
            }
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl From<ChangeError> for AppError {
    fn from(err: ChangeError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<QuoteError> for AppError {
    fn from(err: QuoteError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<PropertyError> for AppError {
    fn from(err: PropertyError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<QuotaError> for AppError {
    fn from(err: QuotaError) -> Self {
        AppError::Forbidden(err.to_string())
    }
}

impl From<CardError> for AppError {
    fn from(err: CardError) -> Self {
        AppError::Validation(err.to_string())
    }
}
