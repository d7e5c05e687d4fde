use crate::application_port::*;
use crate::domain_port::*;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

pub struct RedisTokenStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisTokenStore {
    pub fn new(conn: redis::aio::ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisTokenStore {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait::async_trait]
impl TokenStore for RedisTokenStore {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_ms: u64) -> Result<(), AuthError> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        let _: () = conn
            .pset_ex(&key, value, ttl_ms)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        let val: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        Ok(val)
    }

    async fn delete(&self, key: &str) -> Result<(), AuthError> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(&key)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, AuthError> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        let found: bool = conn
            .exists(&key)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        Ok(found)
    }
}
