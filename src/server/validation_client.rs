use crate::application_port::*;
use crate::domain_model::*;
use crate::server::{EventHandler, EventPublisher, MessageHeaders, header_str};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

type PendingMap = Arc<DashMap<String, oneshot::Sender<UserValidationResponse>>>;

/// Calling side of the existence-check protocol. One correlation-keyed
/// table of pending waiters; `ReplyDispatcher` (driven by the response
/// topic consumer) resolves them.
///
/// Resolution is strictly first-wins: both delivery and expiry go through
/// an atomic removal of the waiter entry, so whichever side removes it
/// first decides the exchange. A reply that loses the race is dropped,
/// never double-delivered.
pub struct ValidationClient {
    publisher: Arc<dyn EventPublisher>,
    pending: PendingMap,
    reply_timeout: Duration,
}

impl ValidationClient {
    pub fn new(publisher: Arc<dyn EventPublisher>, reply_timeout: Duration) -> Self {
        Self {
            publisher,
            pending: Arc::new(DashMap::new()),
            reply_timeout,
        }
    }

    /// Handler to hook onto the response-topic consumer. Must run on an
    /// execution context independent of any task parked in
    /// `check_exist`, or replies could never be consumed.
    pub fn reply_dispatcher(&self) -> Arc<dyn EventHandler> {
        Arc::new(ReplyDispatcher {
            pending: self.pending.clone(),
        })
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait::async_trait]
impl UserExistenceValidator for ValidationClient {
    async fn check_exist(
        &self,
        correlation_id: &str,
        user_ids: &[UserId],
    ) -> Result<UserValidationResponse, ValidationError> {
        let (tx, rx) = oneshot::channel();

        // Register before publishing so a fast reply cannot beat the
        // waiter into the table.
        match self.pending.entry(correlation_id.to_string()) {
            Entry::Occupied(_) => {
                return Err(ValidationError::Transport(format!(
                    "correlation id already pending: {correlation_id}"
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(tx);
            }
        }

        let request = UserValidationRequest {
            correlation_id: correlation_id.to_string(),
            user_ids: user_ids.iter().map(|id| id.to_string()).collect(),
        };
        let payload = match serde_json::to_vec(&request) {
            Ok(payload) => payload,
            Err(e) => {
                self.pending.remove(correlation_id);
                return Err(ValidationError::Transport(e.to_string()));
            }
        };

        if let Err(e) = self
            .publisher
            .publish(
                USER_EXISTENCE_REQUEST_TOPIC,
                correlation_id.as_bytes(),
                &payload,
                &[(CORRELATION_HEADER, correlation_id.as_bytes())],
            )
            .await
        {
            // Failed send: no exchange is left pending.
            self.pending.remove(correlation_id);
            return Err(ValidationError::Transport(format!("{e:#}")));
        }

        match tokio::time::timeout(self.reply_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_closed)) => {
                self.pending.remove(correlation_id);
                Err(ValidationError::Transport(
                    "reply channel closed".to_string(),
                ))
            }
            Err(_elapsed) => {
                // Discard the waiter permanently; a reply arriving after
                // this point finds no entry and is dropped.
                self.pending.remove(correlation_id);
                Err(ValidationError::Timeout)
            }
        }
    }
}

pub struct ReplyDispatcher {
    pending: PendingMap,
}

#[async_trait::async_trait]
impl EventHandler for ReplyDispatcher {
    async fn handle(&self, payload: &[u8], headers: &MessageHeaders) -> anyhow::Result<()> {
        let Some(correlation_id) = header_str(headers, CORRELATION_HEADER) else {
            tracing::warn!("validation reply without correlation header, ignoring");
            return Ok(());
        };

        // Malformed replies are not retryable; surface them in the log and
        // let the waiter time out.
        let response: UserValidationResponse = match serde_json::from_slice(payload) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(correlation_id, error = %e, "malformed validation reply");
                return Ok(());
            }
        };

        match self.pending.remove(correlation_id) {
            Some((_, waiter)) => {
                // Send fails if the waiter expired in the same instant;
                // the reply is dropped and the caller observes a timeout.
                let _ = waiter.send(response);
            }
            None => {
                // Late reply or traffic for another exchange.
                tracing::debug!(correlation_id, "no pending waiter for reply, ignoring");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<(String, Vec<u8>)>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(
            &self,
            topic: &str,
            _key: &[u8],
            payload: &[u8],
            _headers: &[(&str, &[u8])],
        ) -> anyhow::Result<()> {
            if self.fail {
                return Err(anyhow::anyhow!("broker unreachable"));
            }
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_vec()));
            Ok(())
        }
    }

    fn reply_message(correlation_id: &str, all_exist: bool, message: &str) -> (Vec<u8>, MessageHeaders) {
        let response = UserValidationResponse {
            correlation_id: correlation_id.to_string(),
            all_exist,
            message: message.to_string(),
        };
        let headers = vec![(
            CORRELATION_HEADER.to_string(),
            correlation_id.as_bytes().to_vec(),
        )];
        (serde_json::to_vec(&response).unwrap(), headers)
    }

    fn some_ids(n: usize) -> Vec<UserId> {
        (0..n).map(|_| UserId(uuid::Uuid::new_v4())).collect()
    }

    #[tokio::test]
    async fn resolves_with_matching_reply() {
        let publisher = Arc::new(RecordingPublisher::default());
        let client = Arc::new(ValidationClient::new(
            publisher.clone(),
            Duration::from_secs(5),
        ));
        let dispatcher = client.reply_dispatcher();

        let waiter = {
            let client = client.clone();
            tokio::spawn(async move { client.check_exist("cid-1", &some_ids(2)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let (payload, headers) = reply_message("cid-1", true, "All users exist");
        dispatcher.handle(&payload, &headers).await.unwrap();

        let response = waiter.await.unwrap().unwrap();
        assert!(response.all_exist);
        assert_eq!(client.pending_len(), 0);
        assert_eq!(
            publisher.published.lock().unwrap()[0].0,
            USER_EXISTENCE_REQUEST_TOPIC
        );
    }

    #[tokio::test]
    async fn concurrent_exchanges_never_cross_deliver() {
        let publisher = Arc::new(RecordingPublisher::default());
        let client = Arc::new(ValidationClient::new(
            publisher.clone(),
            Duration::from_secs(5),
        ));
        let dispatcher = client.reply_dispatcher();

        let first = {
            let client = client.clone();
            tokio::spawn(async move { client.check_exist("cid-a", &some_ids(1)).await })
        };
        let second = {
            let client = client.clone();
            tokio::spawn(async move { client.check_exist("cid-b", &some_ids(1)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Replies land in reversed order; each waiter must still get its
        // own.
        let (payload_b, headers_b) = reply_message("cid-b", false, "Missing users");
        dispatcher.handle(&payload_b, &headers_b).await.unwrap();
        let (payload_a, headers_a) = reply_message("cid-a", true, "All users exist");
        dispatcher.handle(&payload_a, &headers_a).await.unwrap();

        let response_a = first.await.unwrap().unwrap();
        let response_b = second.await.unwrap().unwrap();
        assert_eq!(response_a.correlation_id, "cid-a");
        assert!(response_a.all_exist);
        assert_eq!(response_b.correlation_id, "cid-b");
        assert!(!response_b.all_exist);
    }

    #[tokio::test]
    async fn times_out_and_ignores_late_reply() {
        let publisher = Arc::new(RecordingPublisher::default());
        let client = Arc::new(ValidationClient::new(
            publisher,
            Duration::from_millis(50),
        ));
        let dispatcher = client.reply_dispatcher();

        let err = client.check_exist("cid-late", &some_ids(1)).await.unwrap_err();
        assert!(matches!(err, ValidationError::Timeout));
        assert_eq!(client.pending_len(), 0);

        // The late reply finds no waiter: observably ignored, no panic,
        // no resurrected exchange.
        let (payload, headers) = reply_message("cid-late", true, "All users exist");
        dispatcher.handle(&payload, &headers).await.unwrap();
        assert_eq!(client.pending_len(), 0);
    }

    #[tokio::test]
    async fn failed_send_is_a_transport_error_with_nothing_pending() {
        let publisher = Arc::new(RecordingPublisher {
            fail: true,
            ..Default::default()
        });
        let client = ValidationClient::new(publisher, Duration::from_secs(5));

        let err = client.check_exist("cid-x", &some_ids(1)).await.unwrap_err();
        assert!(matches!(err, ValidationError::Transport(_)));
        assert_eq!(client.pending_len(), 0);
    }

    #[tokio::test]
    async fn duplicate_correlation_id_is_rejected() {
        let publisher = Arc::new(RecordingPublisher::default());
        let client = Arc::new(ValidationClient::new(
            publisher,
            Duration::from_millis(200),
        ));

        let blocked = {
            let client = client.clone();
            tokio::spawn(async move { client.check_exist("cid-dup", &some_ids(1)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = client.check_exist("cid-dup", &some_ids(1)).await.unwrap_err();
        assert!(matches!(err, ValidationError::Transport(_)));

        // The original exchange still times out on its own terms.
        assert!(matches!(
            blocked.await.unwrap().unwrap_err(),
            ValidationError::Timeout
        ));
    }

    #[tokio::test]
    async fn malformed_reply_is_dropped_without_resolving_waiter() {
        let publisher = Arc::new(RecordingPublisher::default());
        let client = Arc::new(ValidationClient::new(
            publisher,
            Duration::from_millis(100),
        ));
        let dispatcher = client.reply_dispatcher();

        let waiter = {
            let client = client.clone();
            tokio::spawn(async move { client.check_exist("cid-bad", &some_ids(1)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let headers = vec![(
            CORRELATION_HEADER.to_string(),
            b"cid-bad".to_vec(),
        )];
        dispatcher.handle(b"{not json", &headers).await.unwrap();

        assert!(matches!(
            waiter.await.unwrap().unwrap_err(),
            ValidationError::Timeout
        ));
    }
}
