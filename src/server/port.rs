use std::sync::Arc;

/// Header set attached to a broker message, name to raw bytes. The
/// correlation identifier travels here on both request and reply.
pub type MessageHeaders = Vec<(String, Vec<u8>)>;

pub fn header_str<'a>(headers: &'a MessageHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .and_then(|(_, v)| std::str::from_utf8(v).ok())
}

#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        key: &[u8],
        payload: &[u8],
        headers: &[(&str, &[u8])],
    ) -> anyhow::Result<()>;
}

/// Runs one consumer group over a set of topics, feeding each message to
/// `handler` sequentially within the partition. A handler error is
/// retried a small fixed number of times, then logged and dropped.
#[async_trait::async_trait]
pub trait EventConsumer: Send + Sync {
    async fn run(
        &self,
        consumer_group_id: &str,
        topics: &[&str],
        handler: Arc<dyn EventHandler>,
    ) -> anyhow::Result<()>;
}

#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, payload: &[u8], headers: &MessageHeaders) -> anyhow::Result<()>;
}
