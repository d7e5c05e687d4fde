use crate::domain_model::{UserId, UserValidationResponse};

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// No reply arrived within the configured deadline. Distinct from a
    /// transport failure so callers can tell "responder slow or down"
    /// from "broker unreachable".
    #[error("no validation reply within deadline")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Calling side of the existence-check protocol: turns a fire-and-forget
/// publish into a bounded, correlated request/response exchange.
#[async_trait::async_trait]
pub trait UserExistenceValidator: Send + Sync {
    /// Exactly one of three outcomes: the matching reply (`Ok`), a
    /// deadline expiry (`Err(Timeout)`, late replies are dropped), or a
    /// failed send (`Err(Transport)`, nothing left pending).
    async fn check_exist(
        &self,
        correlation_id: &str,
        user_ids: &[UserId],
    ) -> Result<UserValidationResponse, ValidationError>;
}
