use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::services::{AccountError, ArticleError, CodeError, SmsError};
use crate::stores::VerifyCodeError;

#[derive(Debug)]
pub enum AppError {
    /// Internal errors - logged but return generic 500 to user
    Internal(anyhow::Error),
    /// User-facing errors - message is safe to show
    External(StatusCode, &'static str),
    /// Validation errors - safe to show
    Validation(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Internal(err) => {
                tracing::error!("internal error: {:?}", err);
                sentry::capture_error(
                    err.as_ref() as &(dyn std::error::Error + Send + Sync + 'static)
                );

                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
            AppError::External(status, msg) => (status, msg).into_response(),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}

// Business outcomes get a precise status; dependency failures stay internal.
impl AppError {
    pub fn article(err: ArticleError) -> Self {
        match err {
            ArticleError::NotFound => {
                AppError::External(StatusCode::NOT_FOUND, "Article not found")
            }
            other => AppError::Internal(other.into()),
        }
    }

    pub fn account(err: AccountError) -> Self {
        match err {
            AccountError::PasswordMismatch => {
                AppError::External(StatusCode::BAD_REQUEST, "Passwords do not match")
            }
            AccountError::EmailTaken => {
                AppError::External(StatusCode::CONFLICT, "Email already registered")
            }
            AccountError::InvalidCredentials => {
                AppError::External(StatusCode::UNAUTHORIZED, "Invalid email or password")
            }
            AccountError::NotFound => AppError::External(StatusCode::NOT_FOUND, "User not found"),
            AccountError::Internal(e) => AppError::Internal(e),
        }
    }

    pub fn code(err: CodeError) -> Self {
        match err {
            CodeError::Verify(e) => Self::verify_code(e),
            CodeError::Sms(e) => Self::sms(e),
        }
    }

    pub fn verify_code(err: VerifyCodeError) -> Self {
        match err {
            VerifyCodeError::TooFrequent => AppError::External(
                StatusCode::TOO_MANY_REQUESTS,
                "Code sent too recently, try again later",
            ),
            VerifyCodeError::TooManyAttempts => AppError::External(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many attempts, request a new code",
            ),
            VerifyCodeError::Mismatch => {
                AppError::External(StatusCode::BAD_REQUEST, "Wrong verification code")
            }
            VerifyCodeError::NotFound => AppError::External(
                StatusCode::BAD_REQUEST,
                "Verification code expired or not requested",
            ),
            other => AppError::Internal(other.into()),
        }
    }

    pub fn sms(err: SmsError) -> Self {
        match err {
            SmsError::RateLimited { .. } => AppError::External(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many messages, try again later",
            ),
            SmsError::Rejected(_) => {
                AppError::External(StatusCode::BAD_REQUEST, "Phone number rejected")
            }
            other => AppError::Internal(other.into()),
        }
    }
}
