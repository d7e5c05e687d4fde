use crate::server::EventPublisher;
use rdkafka::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::time::Duration;

pub struct KafkaPublisher {
    inner: FutureProducer,
}

impl KafkaPublisher {
    pub fn new(bootstrap_server: &str, client_id: &str) -> anyhow::Result<Self> {
        let inner = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_server)
            .set("client.id", client_id)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("max.in.flight.requests.per.connection", "1")
            .set("compression.type", "lz4")
            .create()?;
        Ok(Self { inner })
    }
}

#[async_trait::async_trait]
impl EventPublisher for KafkaPublisher {
    async fn publish(
        &self,
        topic: &str,
        key: &[u8],
        payload: &[u8],
        headers: &[(&str, &[u8])],
    ) -> anyhow::Result<()> {
        let mut rec = FutureRecord::to(topic).key(key).payload(payload);
        if !headers.is_empty() {
            let mut owned = OwnedHeaders::new_with_capacity(headers.len());
            for &(name, value) in headers {
                owned = owned.insert(Header {
                    key: name,
                    value: Some(value),
                });
            }
            rec = rec.headers(owned);
        }
        self.inner
            .send(rec, Duration::from_secs(10))
            .await
            .map(|_delivery_report| ())
            .map_err(|(e, _msg)| anyhow::anyhow!(e))
    }
}
