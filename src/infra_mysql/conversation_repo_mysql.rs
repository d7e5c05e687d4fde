use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::MySqlPool;

pub struct MySqlConversationRepo {
    pool: MySqlPool,
}

impl MySqlConversationRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlConversationRepo { pool }
    }
}

#[async_trait::async_trait]
impl ConversationRepo for MySqlConversationRepo {
    async fn exists_between(&self, pair: &UserPair) -> Result<bool, ConversationError> {
        let count: i64 = sqlx::query_scalar(
            r#"
SELECT COUNT(*)
FROM conversation
WHERE user_min = ? AND user_max = ?
"#,
        )
        .bind(pair.min())
        .bind(pair.max())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ConversationError::Store(e.to_string()))?;

        Ok(count > 0)
    }

    async fn insert(&self, conversation: &ConversationRecord) -> Result<(), ConversationError> {
        sqlx::query(
            r#"
INSERT INTO conversation (conversation_id, user_min, user_max, created_at)
VALUES (?, ?, ?, ?)
"#,
        )
        .bind(conversation.conversation_id)
        .bind(conversation.user_min)
        .bind(conversation.user_max)
        .bind(conversation.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| ConversationError::Store(e.to_string()))?;

        Ok(())
    }
}
