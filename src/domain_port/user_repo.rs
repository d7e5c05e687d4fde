use crate::application_port::AuthError;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    async fn create(&self, user: &UserRecord) -> Result<(), AuthError>;

    async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError>;

    async fn email_exists(&self, email: &str) -> Result<bool, AuthError>;

    /// Bulk existence lookup: the subset of `ids` that exist. A pure read,
    /// safe under at-least-once redelivery.
    async fn find_existing_ids(&self, ids: &[UserId]) -> Result<Vec<UserId>, AuthError>;
}
