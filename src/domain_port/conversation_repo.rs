use crate::application_port::ConversationError;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait ConversationRepo: Send + Sync {
    /// `pair` is already ordered; uniqueness is per ordered pair.
    async fn exists_between(&self, pair: &UserPair) -> Result<bool, ConversationError>;

    async fn insert(&self, conversation: &ConversationRecord) -> Result<(), ConversationError>;
}
