use crate::domain_model::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct ConversationId(pub uuid::Uuid);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A direct conversation between two users. The pair is stored ordered
/// (`user_min < user_max`) so uniqueness per unordered pair is a single
/// key lookup.
#[derive(Debug, Clone)]
pub struct ConversationRecord {
    pub conversation_id: ConversationId,
    pub user_min: UserId,
    pub user_max: UserId,
    pub created_at: DateTime<Utc>,
}
