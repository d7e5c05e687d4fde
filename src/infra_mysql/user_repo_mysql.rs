use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::{MySqlPool, QueryBuilder, Row};

pub struct MySqlUserRepo {
    pool: MySqlPool,
}

impl MySqlUserRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserRepo { pool }
    }
}

#[async_trait::async_trait]
impl UserRepo for MySqlUserRepo {
    async fn create(&self, user: &UserRecord) -> Result<(), AuthError> {
        sqlx::query(
            r#"
INSERT INTO user (user_id, email, username, password_hash, status, created_at)
VALUES (?, ?, ?, ?, ?, ?)
"#,
        )
        .bind(user.user_id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.status)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        let row = sqlx::query(
            r#"
SELECT user_id, email, username, password_hash, status, created_at
FROM user
WHERE email = ?
"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("query user by email: {e}")))?;

        Ok(row.map(|r| UserRecord {
            user_id: r.get("user_id"),
            email: r.get("email"),
            username: r.get("username"),
            password_hash: r.get("password_hash"),
            status: r.get("status"),
            created_at: r.get("created_at"),
        }))
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AuthError> {
        let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM user WHERE email = ?"#)
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(count > 0)
    }

    async fn find_existing_ids(&self, ids: &[UserId]) -> Result<Vec<UserId>, AuthError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::new("SELECT user_id FROM user WHERE user_id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        qb.push(")");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AuthError::Store(format!("bulk existence query: {e}")))?;

        Ok(rows.iter().map(|r| r.get::<UserId, _>("user_id")).collect())
    }
}
