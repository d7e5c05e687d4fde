use crate::application_port::AuthError;

/// Narrow contract over the TTL key-value store that backs refresh tokens
/// and the revocation blacklist. Keys are namespaced by the caller
/// (`refresh_token:<principal>`, `blacklist:<token>`); the store itself is
/// a plain string-to-string map with per-key expiry.
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_ms: u64) -> Result<(), AuthError>;
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError>;
    async fn delete(&self, key: &str) -> Result<(), AuthError>;
    async fn exists(&self, key: &str) -> Result<bool, AuthError>;
}
