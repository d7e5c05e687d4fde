use crate::application_port::*;
use crate::domain_port::*;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// In-process `TokenStore` for the "memory" backend and tests. Expired
/// entries are pruned lazily on read.
#[derive(Default)]
pub struct MemoryTokenStore {
    entries: DashMap<String, (String, Instant)>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(&self, key: &str) -> Option<String> {
        // Shard guard must be released before remove().
        let expired = match self.entries.get(key) {
            Some(entry) if entry.1 > Instant::now() => return Some(entry.0.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_ms: u64) -> Result<(), AuthError> {
        let deadline = Instant::now() + Duration::from_millis(ttl_ms);
        self.entries
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        Ok(self.live(key))
    }

    async fn delete(&self, key: &str) -> Result<(), AuthError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, AuthError> {
        Ok(self.live(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entry_expires_after_ttl() {
        let store = MemoryTokenStore::new();
        store.set_with_ttl("k", "v", 40).await.unwrap();
        assert!(store.exists("k").await.unwrap());
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!store.exists("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_overwrites_value_and_ttl() {
        let store = MemoryTokenStore::new();
        store.set_with_ttl("k", "old", 10_000).await.unwrap();
        store.set_with_ttl("k", "new", 10_000).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("new"));
    }
}
