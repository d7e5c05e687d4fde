use super::error::*;
use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::{self, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: UserId,
    pub email: String,
    pub username: String,
    pub tokens: TokenPair,
}

impl From<AuthSession> for SessionResponse {
    fn from(session: AuthSession) -> Self {
        SessionResponse {
            user_id: session.user_id,
            email: session.email,
            username: session.username,
            tokens: session.tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

pub async fn signup(
    body: SignupRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let session = auth_service
        .register(RegisterInput {
            email: body.email,
            username: body.username,
            password: body.password,
        })
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(SessionResponse::from(
        session,
    ))))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    body: LoginRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let session = auth_service
        .login(LoginInput {
            email: body.email,
            password: body.password,
        })
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(SessionResponse::from(
        session,
    ))))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    body: RefreshRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let session = auth_service
        .refresh(&body.refresh_token)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(SessionResponse::from(
        session,
    ))))
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

pub async fn logout(
    body: LogoutRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    auth_service
        .logout(LogoutInput {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
        })
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(())))
}

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub user1_id: UserId,
    pub user2_id: UserId,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub conversation_id: ConversationId,
    pub user1_id: UserId,
    pub user2_id: UserId,
    pub created_at: DateTime<Utc>,
}

pub async fn create_conversation(
    body: CreateConversationRequest,
    conversation_service: Arc<dyn ConversationService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let record = conversation_service
        .create_conversation(body.user1_id, body.user2_id)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let response = ConversationResponse {
        conversation_id: record.conversation_id,
        user1_id: record.user_min,
        user2_id: record.user_max,
        created_at: record.created_at,
    };
    Ok(warp::reply::json(&ApiResponse::ok(response)))
}
