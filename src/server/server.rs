use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::server::*;
use crate::settings::Settings;
use nanoid::nanoid;
use sqlx::{MySql, Pool};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub conversation_service: Arc<dyn ConversationService>,
    responder_handle: Mutex<Option<JoinHandle<()>>>,
    dispatcher_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pool: Pool<MySql>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let alphabet: [char; 16] = [
            '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', 'a', 'b', 'c', 'd', 'e', 'f',
        ];
        let run_id = nanoid!(10, &alphabet);

        let token_store: Arc<dyn TokenStore> = match settings.auth.token_store_backend.as_str() {
            "redis" => {
                let redis_client = redis::Client::open(settings.redis.dsn.as_str())?;
                let redis_manager = redis_client.get_connection_manager().await?;
                Arc::new(RedisTokenStore::new(redis_manager, "antiphon"))
            }
            "memory" => Arc::new(MemoryTokenStore::new()),
            other => return Err(anyhow::anyhow!("Unknown token store backend: {}", other)),
        };

        let pool = Pool::<MySql>::connect(&settings.mysql.dsn).await?;
        let user_repo: Arc<dyn UserRepo> = Arc::new(MySqlUserRepo::new(pool.clone()));
        let conversation_repo: Arc<dyn ConversationRepo> =
            Arc::new(MySqlConversationRepo::new(pool.clone()));

        let key = std::env::var("JWT_SIGNING_KEY")
            .unwrap_or_else(|_| "my-dev-secret-key".to_string())
            .into_bytes();
        let token_manager: Arc<dyn TokenManager> = Arc::new(JwtTokenManager::new(
            JwtConfig {
                issuer: settings.auth.issuer.clone(),
                access_ttl: Duration::from_secs(settings.auth.access_ttl_secs),
                refresh_ttl: Duration::from_secs(settings.auth.refresh_ttl_secs),
                signing_key: key,
            },
            token_store,
        ));

        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher {});
        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            user_repo.clone(),
            credential_hasher,
            token_manager,
        ));

        // region runtime infra

        let cancel = CancellationToken::new();

        let publisher: Arc<dyn EventPublisher> = Arc::new(KafkaPublisher::new(
            &settings.kafka.bootstrap,
            &format!("antiphon-pub-{}", run_id),
        )?);

        let validation_client = Arc::new(ValidationClient::new(
            publisher.clone(),
            Duration::from_millis(settings.validation.reply_timeout_ms),
        ));

        let conversation_service: Arc<dyn ConversationService> = Arc::new(
            RealConversationService::new(validation_client.clone(), conversation_repo),
        );

        // The responder and the reply dispatcher run as independent
        // consumer tasks: a caller parked in check_exist must never be
        // the task that would consume its own reply.

        let responder_handler: Arc<dyn EventHandler> = Arc::new(ExistenceCheckHandler::new(
            user_repo.clone(),
            publisher.clone(),
        ));
        let responder_consumer: Arc<dyn EventConsumer> = Arc::new(KafkaConsumer::new(
            &settings.kafka.bootstrap,
            &format!("antiphon-responder-{}", run_id),
            cancel.clone(),
        ));
        let responder_handle = tokio::spawn(async move {
            // One logical group across all responder instances; the
            // broker shares partitions among them.
            let _ = responder_consumer
                .run(
                    "user-existence-responder",
                    &[crate::domain_model::USER_EXISTENCE_REQUEST_TOPIC],
                    responder_handler,
                )
                .await;
        });

        let dispatcher_handler = validation_client.reply_dispatcher();
        let dispatcher_consumer: Arc<dyn EventConsumer> = Arc::new(KafkaConsumer::new(
            &settings.kafka.bootstrap,
            &format!("antiphon-dispatch-{}", run_id),
            cancel.clone(),
        ));
        let dispatcher_group = format!("existence-replies-{}", run_id);
        let dispatcher_handle = tokio::spawn(async move {
            // Per-instance group: every coordinator instance must see
            // every reply, since only it holds the matching waiter.
            let _ = dispatcher_consumer
                .run(
                    &dispatcher_group,
                    &[crate::domain_model::USER_EXISTENCE_RESPONSE_TOPIC],
                    dispatcher_handler,
                )
                .await;
        });

        // endregion

        info!("server started");

        Ok(Self {
            auth_service,
            conversation_service,
            responder_handle: Mutex::new(Some(responder_handle)),
            dispatcher_handle: Mutex::new(Some(dispatcher_handle)),
            cancel,
            pool,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        if let Ok(mut lock) = self.responder_handle.lock() {
            if let Some(handle) = lock.take() {
                let r = handle.await;
                info!("responder handle dropped: {:?}", r);
            }
        }
        if let Ok(mut lock) = self.dispatcher_handle.lock() {
            if let Some(handle) = lock.take() {
                let r = handle.await;
                info!("dispatcher handle dropped: {:?}", r);
            }
        }

        self.pool.close().await;
    }
}
