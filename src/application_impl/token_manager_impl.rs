use crate::application_port::*;
use crate::domain_port::TokenStore;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub signing_key: Vec<u8>,
}

const PURPOSE_ACCESS: &str = "access";
const PURPOSE_REFRESH: &str = "refresh";

/// One signed-claims shape for both credential kinds; verification
/// branches on the `purpose` tag, never on a separate claims type.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
    iss: String,
    purpose: String,
    // iat/exp have one-second resolution; jti keeps two tokens minted in
    // the same second byte-distinct, which byte-equality rotation needs.
    jti: String,
}

fn encode_claims(
    principal: &str,
    purpose: &str,
    ttl: Duration,
    cfg: &JwtConfig,
) -> Result<(String, DateTime<Utc>), AuthError> {
    let iat_dt = Utc::now();
    let exp_dt = iat_dt + ttl;
    let claims = Claims {
        sub: principal.to_string(),
        iat: iat_dt.timestamp(),
        exp: exp_dt.timestamp(),
        iss: cfg.issuer.clone(),
        purpose: purpose.to_string(),
        jti: uuid::Uuid::new_v4().to_string(),
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(&cfg.signing_key),
    )
    .map_err(|e| AuthError::InternalError(e.to_string()))?;
    Ok((token, exp_dt))
}

fn decode_claims(token: &str, cfg: &JwtConfig, validate_exp: bool) -> Result<Claims, AuthError> {
    let mut v = Validation::new(Algorithm::HS256);
    // Zero leeway: remaining-lifetime arithmetic below relies on exp being
    // enforced exactly.
    v.leeway = 0;
    v.validate_exp = validate_exp;
    v.set_issuer(&[cfg.issuer.clone()]);
    let data = decode::<Claims>(token, &DecodingKey::from_secret(&cfg.signing_key), &v).map_err(
        |e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidSignature => AuthError::SignatureInvalid,
            _ => AuthError::TokenMalformed,
        },
    )?;
    Ok(data.claims)
}

fn refresh_key(principal: &str) -> String {
    format!("refresh_token:{}", principal)
}

fn blacklist_key(token: &str) -> String {
    format!("blacklist:{}", token)
}

pub struct JwtTokenManager {
    cfg: JwtConfig,
    store: Arc<dyn TokenStore>,
}

impl JwtTokenManager {
    pub fn new(cfg: JwtConfig, store: Arc<dyn TokenStore>) -> Self {
        JwtTokenManager { cfg, store }
    }

    fn remaining_ms(exp: i64) -> i64 {
        let exp_dt = Utc.timestamp_opt(exp, 0).single().unwrap_or_else(Utc::now);
        (exp_dt - Utc::now()).num_milliseconds()
    }

    /// Blacklist `token` for its remaining lifetime. Tokens already past
    /// expiry are skipped; the blacklist would outlive their validity
    /// anyway.
    async fn blacklist(&self, token: &str, exp: i64) -> Result<(), AuthError> {
        let remaining = Self::remaining_ms(exp);
        if remaining > 0 {
            self.store
                .set_with_ttl(&blacklist_key(token), "revoked", remaining as u64)
                .await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl TokenManager for JwtTokenManager {
    async fn issue(&self, principal: &str) -> Result<TokenPair, AuthError> {
        let (access, access_exp) =
            encode_claims(principal, PURPOSE_ACCESS, self.cfg.access_ttl, &self.cfg)?;
        let (refresh, refresh_exp) =
            encode_claims(principal, PURPOSE_REFRESH, self.cfg.refresh_ttl, &self.cfg)?;

        // Overwrite any prior value: one active refresh token per
        // principal. The superseded token stops verifying immediately,
        // even before its own TTL elapses.
        self.store
            .set_with_ttl(
                &refresh_key(principal),
                &refresh,
                self.cfg.refresh_ttl.as_millis() as u64,
            )
            .await?;

        Ok(TokenPair {
            access_token: AccessToken(access),
            refresh_token: RefreshToken(refresh),
            access_expires_at: access_exp,
            refresh_expires_at: refresh_exp,
        })
    }

    async fn verify_access(&self, token: &str) -> Result<bool, AuthError> {
        if self.store.exists(&blacklist_key(token)).await? {
            return Ok(false);
        }
        // Expired, mis-signed, malformed and wrong-purpose all collapse to
        // "not valid" so callers cannot distinguish a forged token from a
        // stale one.
        match decode_claims(token, &self.cfg, true) {
            Ok(claims) => Ok(claims.purpose == PURPOSE_ACCESS),
            Err(_) => Ok(false),
        }
    }

    async fn rotate_refresh(&self, old_refresh: &str) -> Result<RotatedTokens, AuthError> {
        let claims = decode_claims(old_refresh, &self.cfg, true)?;
        if claims.purpose != PURPOSE_REFRESH {
            return Err(AuthError::TokenMalformed);
        }

        if self.store.exists(&blacklist_key(old_refresh)).await? {
            return Err(AuthError::StaleRefresh);
        }

        // The presented token must be byte-equal to the single stored
        // value; an older token replayed after rotation fails here even
        // if its own expiry is still in the future.
        match self.store.get(&refresh_key(&claims.sub)).await? {
            Some(stored) if stored == old_refresh => {}
            _ => return Err(AuthError::StaleRefresh),
        }

        let tokens = self.issue(&claims.sub).await?;
        self.blacklist(old_refresh, claims.exp).await?;

        Ok(RotatedTokens {
            principal: claims.sub,
            tokens,
        })
    }

    async fn revoke(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError> {
        // Signature is still enforced, expiry is not: an expired token is
        // revocable as a no-op rather than an error.
        let claims = decode_claims(access_token, &self.cfg, false)?;
        self.blacklist(access_token, claims.exp).await?;

        if let Some(refresh) = refresh_token {
            let claims = decode_claims(refresh, &self.cfg, false)?;
            self.blacklist(refresh, claims.exp).await?;
        }

        Ok(())
    }
}
