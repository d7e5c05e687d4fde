use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::ConversationRepo;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

pub struct RealConversationService {
    validator: Arc<dyn UserExistenceValidator>,
    conversation_repo: Arc<dyn ConversationRepo>,
}

impl RealConversationService {
    pub fn new(
        validator: Arc<dyn UserExistenceValidator>,
        conversation_repo: Arc<dyn ConversationRepo>,
    ) -> Self {
        Self {
            validator,
            conversation_repo,
        }
    }
}

#[async_trait::async_trait]
impl ConversationService for RealConversationService {
    async fn create_conversation(
        &self,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<ConversationRecord, ConversationError> {
        // Fresh per call, never reused: concurrent creations must not
        // cross-talk on the reply topic.
        let correlation_id = Uuid::new_v4().to_string();

        let validation = self
            .validator
            .check_exist(&correlation_id, &[user_a, user_b])
            .await
            .map_err(|e| match e {
                ValidationError::Timeout => ConversationError::ValidationTimeout,
                ValidationError::Transport(msg) => ConversationError::ServiceUnavailable(msg),
            })?;

        if !validation.all_exist {
            return Err(ConversationError::InvalidUsers(validation.message));
        }

        let pair = UserPair::new(user_a, user_b);
        if self.conversation_repo.exists_between(&pair).await? {
            return Err(ConversationError::AlreadyExists);
        }

        let record = ConversationRecord {
            conversation_id: ConversationId(Uuid::new_v4()),
            user_min: pair.min(),
            user_max: pair.max(),
            created_at: Utc::now(),
        };
        self.conversation_repo.insert(&record).await?;

        Ok(record)
    }
}
