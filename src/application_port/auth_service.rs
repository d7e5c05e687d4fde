use crate::domain_model::UserId;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user already exists")]
    UserExists,
    #[error("user not found")]
    UserNotFound,
    /// Rotation-path causes. The public verify path collapses all of these
    /// to a plain "not valid"; only the privileged refresh rotation may
    /// name the reason.
    #[error("token expired")]
    TokenExpired,
    #[error("token signature invalid")]
    SignatureInvalid,
    #[error("token malformed")]
    TokenMalformed,
    #[error("refresh token superseded or revoked")]
    StaleRefresh,
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LogoutInput {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct RefreshToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Outcome of a successful refresh rotation: the new pair plus the
/// principal the rotated token belonged to.
#[derive(Debug, Clone)]
pub struct RotatedTokens {
    pub principal: String,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: UserId,
    pub email: String,
    pub username: String,
    pub tokens: TokenPair,
}

/// Policy over bearer credentials: minting, verification, rotation and
/// revocation, backed by a TTL key-value store. Holds no credential state
/// in process memory between calls.
#[async_trait::async_trait]
pub trait TokenManager: Send + Sync {
    /// Mint an access/refresh pair for `principal` and persist the refresh
    /// token, overwriting any prior one (single active session per
    /// principal).
    async fn issue(&self, principal: &str) -> Result<TokenPair, AuthError>;

    /// Fails closed: blacklisted, malformed, mis-signed, expired and
    /// wrong-purpose tokens all come back as `Ok(false)`. Only a store
    /// outage is an `Err`.
    async fn verify_access(&self, token: &str) -> Result<bool, AuthError>;

    /// Verify `old_refresh` is well-formed, unexpired and byte-equal to
    /// the stored value for its principal, then issue a new pair and
    /// blacklist the old token for its remaining lifetime.
    async fn rotate_refresh(&self, old_refresh: &str) -> Result<RotatedTokens, AuthError>;

    /// Blacklist the access token and, if given, the refresh token, each
    /// for its remaining lifetime. Idempotent.
    async fn revoke(&self, access_token: &str, refresh_token: Option<&str>)
    -> Result<(), AuthError>;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, request: RegisterInput) -> Result<AuthSession, AuthError>;
    async fn login(&self, request: LoginInput) -> Result<AuthSession, AuthError>;
    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError>;
    async fn logout(&self, request: LogoutInput) -> Result<(), AuthError>;
    async fn verify(&self, access_token: &str) -> Result<bool, AuthError>;
}
