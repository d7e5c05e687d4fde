use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::{Serialize, Serializer};
use std::convert::Infallible;
use thiserror::Error;
use tracing::warn;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    if let Some(err) = err.find::<ApiErrorCode>() {
        let json = warp::reply::json(&ApiResponse::<()>::err(err.clone(), err.to_string()));
        Ok(warp::reply::with_status(json, err.status()))
    } else {
        let json = warp::reply::json(&ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(ApiError {
                code: ApiErrorCode::InternalError,
                message: format!("Unhandled error: {:?}", err),
            }),
        });
        Ok(warp::reply::with_status(
            json,
            StatusCode::INTERNAL_SERVER_ERROR,
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Error)]
pub enum ApiErrorCode {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Email already registered")]
    EmailTaken,
    /// Generic on the public verify path; carries the named cause when it
    /// comes off the privileged rotation/revocation path.
    #[error("{0}")]
    Unauthorized(String),
    #[error("Invalid user(s): {0}")]
    InvalidUsers(String),
    #[error("Conversation between these users already exists")]
    ConversationExists,
    #[error("User validation service did not respond")]
    UpstreamTimeout,
    #[error("Service temporarily unavailable. Please try again later.")]
    ServiceUnavailable,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn unauthorized() -> ApiErrorCode {
        ApiErrorCode::Unauthorized("Token is not valid".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiErrorCode::EmailTaken => StatusCode::CONFLICT,
            ApiErrorCode::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiErrorCode::InvalidUsers(_) => StatusCode::BAD_REQUEST,
            ApiErrorCode::ConversationExists => StatusCode::CONFLICT,
            ApiErrorCode::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ApiErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code_str(&self) -> &'static str {
        match self {
            ApiErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ApiErrorCode::EmailTaken => "EMAIL_TAKEN",
            ApiErrorCode::Unauthorized(_) => "UNAUTHORIZED",
            ApiErrorCode::InvalidUsers(_) => "INVALID_USERS",
            ApiErrorCode::ConversationExists => "CONVERSATION_EXISTS",
            ApiErrorCode::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            ApiErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ApiErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl Serialize for ApiErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code_str())
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials => ApiErrorCode::InvalidCredentials,
            AuthError::UserExists => ApiErrorCode::EmailTaken,
            AuthError::UserNotFound => ApiErrorCode::unauthorized(),
            // Named causes only surface from the privileged rotation and
            // revocation paths; the public verify path never errors with
            // these.
            cause @ (AuthError::TokenExpired
            | AuthError::SignatureInvalid
            | AuthError::TokenMalformed
            | AuthError::StaleRefresh) => ApiErrorCode::Unauthorized(cause.to_string()),
            AuthError::Store(_) => ApiErrorCode::ServiceUnavailable,
            AuthError::InternalError(e) => ApiErrorCode::internal(e),
        }
    }
}

impl From<ConversationError> for ApiErrorCode {
    fn from(error: ConversationError) -> Self {
        match error {
            ConversationError::InvalidUsers(message) => ApiErrorCode::InvalidUsers(message),
            ConversationError::AlreadyExists => ApiErrorCode::ConversationExists,
            ConversationError::ValidationTimeout => ApiErrorCode::UpstreamTimeout,
            ConversationError::ServiceUnavailable(_) => ApiErrorCode::ServiceUnavailable,
            ConversationError::Store(_) => ApiErrorCode::ServiceUnavailable,
        }
    }
}
