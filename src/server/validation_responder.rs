use crate::domain_model::*;
use crate::domain_port::UserRepo;
use crate::server::{EventHandler, EventPublisher, MessageHeaders, header_str};
use std::sync::Arc;

/// Owning side of the existence-check protocol. Consumes the request
/// topic, runs the bulk lookup, and always answers: any processing
/// failure still produces a negative reply carrying the reason, so the
/// caller's waiter resolves or times out instead of hanging on a
/// swallowed error. The lookup is a pure read, so at-least-once
/// redelivery is harmless.
pub struct ExistenceCheckHandler {
    user_repo: Arc<dyn UserRepo>,
    publisher: Arc<dyn EventPublisher>,
}

impl ExistenceCheckHandler {
    pub fn new(user_repo: Arc<dyn UserRepo>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            user_repo,
            publisher,
        }
    }

    async fn check(&self, correlation_id: &str, raw_ids: &[String]) -> UserValidationResponse {
        let mut ids = Vec::with_capacity(raw_ids.len());
        for raw in raw_ids {
            match raw.parse::<UserId>() {
                Ok(id) => ids.push(id),
                Err(e) => {
                    return UserValidationResponse {
                        correlation_id: correlation_id.to_string(),
                        all_exist: false,
                        message: format!("Error: invalid user id {raw}: {e}"),
                    };
                }
            }
        }

        match self.user_repo.find_existing_ids(&ids).await {
            Ok(existing) => {
                let all_exist = existing.len() == ids.len();
                UserValidationResponse {
                    correlation_id: correlation_id.to_string(),
                    all_exist,
                    message: if all_exist {
                        "All users exist".to_string()
                    } else {
                        "Missing users".to_string()
                    },
                }
            }
            Err(e) => UserValidationResponse {
                correlation_id: correlation_id.to_string(),
                all_exist: false,
                message: format!("Error: {e}"),
            },
        }
    }
}

#[async_trait::async_trait]
impl EventHandler for ExistenceCheckHandler {
    async fn handle(&self, payload: &[u8], headers: &MessageHeaders) -> anyhow::Result<()> {
        let Some(correlation_id) = header_str(headers, CORRELATION_HEADER) else {
            // Nothing to correlate a reply with; the caller will time out.
            tracing::warn!("existence request without correlation header, dropping");
            return Ok(());
        };

        tracing::info!(correlation_id, "processing existence check");

        let response = match serde_json::from_slice::<UserValidationRequest>(payload) {
            Ok(request) => self.check(correlation_id, &request.user_ids).await,
            Err(e) => {
                tracing::warn!(correlation_id, error = %e, "malformed existence request");
                UserValidationResponse {
                    correlation_id: correlation_id.to_string(),
                    all_exist: false,
                    message: format!("Error: malformed request: {e}"),
                }
            }
        };

        // A failed publish propagates so the consumer loop retries it a
        // bounded number of times.
        self.publisher
            .publish(
                USER_EXISTENCE_RESPONSE_TOPIC,
                correlation_id.as_bytes(),
                &serde_json::to_vec(&response)?,
                &[(CORRELATION_HEADER, correlation_id.as_bytes())],
            )
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_port::AuthError;
    use std::sync::Mutex;

    struct FakeUserRepo {
        existing: Vec<UserId>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl UserRepo for FakeUserRepo {
        async fn create(&self, _user: &UserRecord) -> Result<(), AuthError> {
            unimplemented!("not used by the responder")
        }

        async fn get_by_email(&self, _email: &str) -> Result<Option<UserRecord>, AuthError> {
            unimplemented!("not used by the responder")
        }

        async fn email_exists(&self, _email: &str) -> Result<bool, AuthError> {
            unimplemented!("not used by the responder")
        }

        async fn find_existing_ids(&self, ids: &[UserId]) -> Result<Vec<UserId>, AuthError> {
            if self.fail {
                return Err(AuthError::Store("connection refused".to_string()));
            }
            Ok(ids
                .iter()
                .filter(|id| self.existing.contains(id))
                .copied()
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<(String, Vec<u8>)>>,
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
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_vec()));
            Ok(())
        }
    }

    fn request_message(correlation_id: &str, ids: &[UserId]) -> (Vec<u8>, MessageHeaders) {
        let request = UserValidationRequest {
            correlation_id: correlation_id.to_string(),
            user_ids: ids.iter().map(|id| id.to_string()).collect(),
        };
        let headers = vec![(
            CORRELATION_HEADER.to_string(),
            correlation_id.as_bytes().to_vec(),
        )];
        (serde_json::to_vec(&request).unwrap(), headers)
    }

    fn only_reply(publisher: &RecordingPublisher) -> UserValidationResponse {
        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, USER_EXISTENCE_RESPONSE_TOPIC);
        serde_json::from_slice(&published[0].1).unwrap()
    }

    #[tokio::test]
    async fn replies_positive_when_all_users_exist() {
        let a = UserId(uuid::Uuid::new_v4());
        let b = UserId(uuid::Uuid::new_v4());
        let publisher = Arc::new(RecordingPublisher::default());
        let handler = ExistenceCheckHandler::new(
            Arc::new(FakeUserRepo {
                existing: vec![a, b],
                fail: false,
            }),
            publisher.clone(),
        );

        let (payload, headers) = request_message("cid-1", &[a, b]);
        handler.handle(&payload, &headers).await.unwrap();

        let reply = only_reply(&publisher);
        assert_eq!(reply.correlation_id, "cid-1");
        assert!(reply.all_exist);
        assert_eq!(reply.message, "All users exist");
    }

    #[tokio::test]
    async fn replies_missing_users_when_one_is_unknown() {
        let a = UserId(uuid::Uuid::new_v4());
        let b = UserId(uuid::Uuid::new_v4());
        let publisher = Arc::new(RecordingPublisher::default());
        let handler = ExistenceCheckHandler::new(
            Arc::new(FakeUserRepo {
                existing: vec![a],
                fail: false,
            }),
            publisher.clone(),
        );

        let (payload, headers) = request_message("cid-2", &[a, b]);
        handler.handle(&payload, &headers).await.unwrap();

        let reply = only_reply(&publisher);
        assert!(!reply.all_exist);
        assert_eq!(reply.message, "Missing users");
    }

    #[tokio::test]
    async fn lookup_failure_still_produces_a_negative_reply() {
        let publisher = Arc::new(RecordingPublisher::default());
        let handler = ExistenceCheckHandler::new(
            Arc::new(FakeUserRepo {
                existing: vec![],
                fail: true,
            }),
            publisher.clone(),
        );

        let (payload, headers) = request_message("cid-3", &[UserId(uuid::Uuid::new_v4())]);
        handler.handle(&payload, &headers).await.unwrap();

        let reply = only_reply(&publisher);
        assert!(!reply.all_exist);
        assert!(reply.message.starts_with("Error:"));
    }

    #[tokio::test]
    async fn malformed_request_with_header_gets_a_negative_reply() {
        let publisher = Arc::new(RecordingPublisher::default());
        let handler = ExistenceCheckHandler::new(
            Arc::new(FakeUserRepo {
                existing: vec![],
                fail: false,
            }),
            publisher.clone(),
        );

        let headers = vec![(CORRELATION_HEADER.to_string(), b"cid-4".to_vec())];
        handler.handle(b"{garbage", &headers).await.unwrap();

        let reply = only_reply(&publisher);
        assert_eq!(reply.correlation_id, "cid-4");
        assert!(!reply.all_exist);
    }

    #[tokio::test]
    async fn request_without_correlation_header_is_dropped() {
        let publisher = Arc::new(RecordingPublisher::default());
        let handler = ExistenceCheckHandler::new(
            Arc::new(FakeUserRepo {
                existing: vec![],
                fail: false,
            }),
            publisher.clone(),
        );

        let (payload, _) = request_message("cid-5", &[UserId(uuid::Uuid::new_v4())]);
        handler.handle(&payload, &Vec::new()).await.unwrap();

        assert!(publisher.published.lock().unwrap().is_empty());
    }
}
