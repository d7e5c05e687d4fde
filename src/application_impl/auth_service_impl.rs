use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::UserRepo;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

pub struct Argon2PasswordHasher;

#[async_trait::async_trait]
impl CredentialHasher for Argon2PasswordHasher {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = argon2::password_hash::SaltString::generate(&mut OsRng);
        let argon2 = argon2::Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::InternalError(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    async fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(password_hash)
            .map_err(|e| AuthError::InternalError(format!("invalid PHC hash: {e}")))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::InternalError(format!("verify error: {e}"))),
        }
    }
}

pub struct RealAuthService {
    user_repo: Arc<dyn UserRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_manager: Arc<dyn TokenManager>,
}

impl RealAuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_manager: Arc<dyn TokenManager>,
    ) -> Self {
        Self {
            user_repo,
            credential_hasher,
            token_manager,
        }
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn register(&self, request: RegisterInput) -> Result<AuthSession, AuthError> {
        let RegisterInput {
            email,
            username,
            password,
        } = request;

        if self.user_repo.email_exists(&email).await? {
            return Err(AuthError::UserExists);
        }

        let password_hash = self.credential_hasher.hash_password(&password).await?;
        let user = UserRecord {
            user_id: UserId(Uuid::new_v4()),
            email: email.clone(),
            username,
            password_hash,
            status: "online".to_string(),
            created_at: Utc::now(),
        };
        self.user_repo.create(&user).await?;

        let tokens = self.token_manager.issue(&email).await?;

        Ok(AuthSession {
            user_id: user.user_id,
            email: user.email,
            username: user.username,
            tokens,
        })
    }

    async fn login(&self, request: LoginInput) -> Result<AuthSession, AuthError> {
        let LoginInput { email, password } = request;

        // Unknown email and wrong password are indistinguishable outward.
        let user = self
            .user_repo
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let ok = self
            .credential_hasher
            .verify_password(&password, &user.password_hash)
            .await?;
        if !ok {
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.token_manager.issue(&email).await?;

        Ok(AuthSession {
            user_id: user.user_id,
            email: user.email,
            username: user.username,
            tokens,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let rotated = self.token_manager.rotate_refresh(refresh_token).await?;

        let user = self
            .user_repo
            .get_by_email(&rotated.principal)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(AuthSession {
            user_id: user.user_id,
            email: user.email,
            username: user.username,
            tokens: rotated.tokens,
        })
    }

    async fn logout(&self, request: LogoutInput) -> Result<(), AuthError> {
        self.token_manager
            .revoke(&request.access_token, request.refresh_token.as_deref())
            .await
    }

    async fn verify(&self, access_token: &str) -> Result<bool, AuthError> {
        self.token_manager.verify_access(access_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{JwtConfig, JwtTokenManager};
    use crate::infra_memory::MemoryTokenStore;
    use dashmap::DashMap;
    use std::time::Duration;

    #[derive(Default)]
    struct MemoryUserRepo {
        by_email: DashMap<String, UserRecord>,
    }

    #[async_trait::async_trait]
    impl UserRepo for MemoryUserRepo {
        async fn create(&self, user: &UserRecord) -> Result<(), AuthError> {
            self.by_email.insert(user.email.clone(), user.clone());
            Ok(())
        }

        async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
            Ok(self.by_email.get(email).map(|r| r.clone()))
        }

        async fn email_exists(&self, email: &str) -> Result<bool, AuthError> {
            Ok(self.by_email.contains_key(email))
        }

        async fn find_existing_ids(&self, ids: &[UserId]) -> Result<Vec<UserId>, AuthError> {
            Ok(ids
                .iter()
                .filter(|id| self.by_email.iter().any(|r| r.user_id == **id))
                .copied()
                .collect())
        }
    }

    /// Transparent stand-in so tests don't pay argon2 cost per case.
    struct PlainHasher;

    #[async_trait::async_trait]
    impl CredentialHasher for PlainHasher {
        async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
            Ok(format!("plain:{password}"))
        }

        async fn verify_password(
            &self,
            password: &str,
            password_hash: &str,
        ) -> Result<bool, AuthError> {
            Ok(password_hash == format!("plain:{password}"))
        }
    }

    fn service() -> RealAuthService {
        let token_manager = JwtTokenManager::new(
            JwtConfig {
                issuer: "antiphon.test".to_string(),
                access_ttl: Duration::from_secs(60),
                refresh_ttl: Duration::from_secs(3600),
                signing_key: b"test-signing-key".to_vec(),
            },
            Arc::new(MemoryTokenStore::new()),
        );
        RealAuthService::new(
            Arc::new(MemoryUserRepo::default()),
            Arc::new(PlainHasher),
            Arc::new(token_manager),
        )
    }

    fn register_input() -> RegisterInput {
        RegisterInput {
            email: "alice@example.com".to_string(),
            username: "alice".to_string(),
            password: "hunter22".to_string(),
        }
    }

    #[tokio::test]
    async fn register_then_login_roundtrip() {
        let svc = service();
        let session = svc.register(register_input()).await.unwrap();
        assert!(svc.verify(&session.tokens.access_token.0).await.unwrap());

        let again = svc
            .login(LoginInput {
                email: "alice@example.com".to_string(),
                password: "hunter22".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(again.user_id, session.user_id);
    }

    #[tokio::test]
    async fn duplicate_email_and_bad_password_are_rejected() {
        let svc = service();
        svc.register(register_input()).await.unwrap();

        let err = svc.register(register_input()).await.unwrap_err();
        assert!(matches!(err, AuthError::UserExists));

        let err = svc
            .login(LoginInput {
                email: "alice@example.com".to_string(),
                password: "wrong".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let err = svc
            .login(LoginInput {
                email: "nobody@example.com".to_string(),
                password: "hunter22".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn refresh_rotates_and_old_refresh_is_stale() {
        let svc = service();
        let session = svc.register(register_input()).await.unwrap();
        let old_refresh = session.tokens.refresh_token.0.clone();

        let refreshed = svc.refresh(&old_refresh).await.unwrap();
        assert_eq!(refreshed.user_id, session.user_id);
        assert!(svc.verify(&refreshed.tokens.access_token.0).await.unwrap());

        let err = svc.refresh(&old_refresh).await.unwrap_err();
        assert!(matches!(err, AuthError::StaleRefresh));
    }

    #[tokio::test]
    async fn logout_revokes_and_is_idempotent() {
        let svc = service();
        let session = svc.register(register_input()).await.unwrap();
        let logout = LogoutInput {
            access_token: session.tokens.access_token.0.clone(),
            refresh_token: Some(session.tokens.refresh_token.0.clone()),
        };

        svc.logout(logout.clone()).await.unwrap();
        assert!(!svc.verify(&session.tokens.access_token.0).await.unwrap());

        svc.logout(logout).await.unwrap();
        assert!(!svc.verify(&session.tokens.access_token.0).await.unwrap());

        let err = svc.refresh(&session.tokens.refresh_token.0).await.unwrap_err();
        assert!(matches!(err, AuthError::StaleRefresh));
    }

    #[tokio::test]
    async fn argon2_hasher_verifies_and_rejects() {
        let hasher = Argon2PasswordHasher;
        let hash = hasher.hash_password("hunter22").await.unwrap();
        assert!(hasher.verify_password("hunter22", &hash).await.unwrap());
        assert!(!hasher.verify_password("wrong", &hash).await.unwrap());
    }
}
