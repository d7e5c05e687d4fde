use crate::server::{EventConsumer, EventHandler, MessageHeaders};
use futures_util::StreamExt;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Headers;
use rdkafka::{ClientConfig, Message};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Redelivery attempts granted to a failing handler before the message is
/// logged and dropped. Keeps a poison message from looping forever.
const MAX_HANDLER_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

pub struct KafkaConsumer {
    bootstrap_server: String,
    client_id: String,
    cancellation_token: CancellationToken,
}

impl KafkaConsumer {
    pub fn new(
        bootstrap_server: &str,
        client_id: &str,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            bootstrap_server: bootstrap_server.to_string(),
            client_id: client_id.to_string(),
            cancellation_token,
        }
    }

    async fn ensure_topics(bootstrap: &str, topics: &[&str]) -> anyhow::Result<()> {
        let admin: AdminClient<_> = ClientConfig::new()
            .set("bootstrap.servers", bootstrap)
            .create()?;

        let new_topics: Vec<_> = topics
            .iter()
            .map(|t| NewTopic::new(t, 1, TopicReplication::Fixed(1)))
            .collect();

        let _ = admin
            .create_topics(&new_topics, &AdminOptions::new())
            .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl EventConsumer for KafkaConsumer {
    async fn run(
        &self,
        consumer_group_id: &str,
        topics: &[&str],
        handler: Arc<dyn EventHandler>,
    ) -> anyhow::Result<()> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.bootstrap_server)
            .set("client.id", &self.client_id)
            .set("group.id", consumer_group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()?;

        Self::ensure_topics(&self.bootstrap_server, topics).await?;
        consumer.subscribe(topics)?;

        let mut stream = consumer.stream();

        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    tracing::info!(group = consumer_group_id, "Kafka consumer shutting down...");
                    break;
                }
                msg = stream.next() => msg,
            };

            let Some(message) = result else {
                tracing::error!("Kafka consumer stream terminated");
                break;
            };

            match message {
                Err(e) => {
                    // broker hiccup
                    tracing::warn!(error = ?e, "consumer poll error");
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                Ok(m) => {
                    let payload = m.payload().unwrap_or(&[]);
                    let headers: MessageHeaders = m
                        .headers()
                        .map(|hs| {
                            hs.iter()
                                .map(|h| {
                                    (h.key.to_string(), h.value.unwrap_or_default().to_vec())
                                })
                                .collect()
                        })
                        .unwrap_or_default();

                    let mut attempts = 0;
                    loop {
                        match handler.handle(payload, &headers).await {
                            Ok(()) => break,
                            Err(e) => {
                                attempts += 1;
                                if attempts >= MAX_HANDLER_ATTEMPTS {
                                    tracing::error!(
                                        error = ?e,
                                        topic = m.topic(),
                                        attempts,
                                        "handler failed, dropping message"
                                    );
                                    break;
                                }
                                tracing::warn!(error = ?e, attempts, "handler error; retrying");
                                tokio::time::sleep(RETRY_BACKOFF).await;
                            }
                        }
                    }

                    // Committed even when dropped: redelivering a message
                    // that failed MAX_HANDLER_ATTEMPTS times would loop.
                    if let Err(e) =
                        consumer.commit_message(&m, rdkafka::consumer::CommitMode::Async)
                    {
                        tracing::warn!(error = ?e, "commit failed but ignored");
                    }
                }
            }
        }

        consumer.unsubscribe();

        Ok(())
    }
}
