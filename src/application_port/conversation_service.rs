use crate::domain_model::*;

#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    /// The responder reported that not every requested user exists. A
    /// client error, never a server one.
    #[error("invalid user(s): {0}")]
    InvalidUsers(String),
    #[error("conversation between these users already exists")]
    AlreadyExists,
    #[error("user validation timed out")]
    ValidationTimeout,
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("store error: {0}")]
    Store(String),
}

#[async_trait::async_trait]
pub trait ConversationService: Send + Sync {
    /// Validate both users with the owning service, then create the
    /// (ordered-pair-unique) conversation.
    async fn create_conversation(
        &self,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<ConversationRecord, ConversationError>;
}
