use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::fs;
use uuid::Uuid;

use crate::config::JwtConfig;

/// RS256 token issuer and verifier.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    key_id: String,
    access_token_ttl: Duration,
}

/// Claims carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Token ID, fresh per issuance
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// A verified or freshly issued token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub user_id: Uuid,
    pub token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

fn invalid_credential() -> AppError {
    AppError::Unauthorized(anyhow::anyhow!("invalid credential"))
}

impl JwtService {
    /// Load RSA keys from the configured PEM files.
    pub fn new(config: &JwtConfig) -> Result<Self, AppError> {
        let private_key_pem = fs::read_to_string(&config.private_key_path).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Failed to read private key from {}: {}",
                config.private_key_path,
                e
            ))
        })?;

        let public_key_pem = fs::read_to_string(&config.public_key_path).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Failed to read public key from {}: {}",
                config.public_key_path,
                e
            ))
        })?;

        Self::from_pem(
            private_key_pem.as_bytes(),
            public_key_pem.as_bytes(),
            &config.key_id,
            Duration::minutes(config.access_token_expiry_minutes),
        )
    }

    pub fn from_pem(
        private_key_pem: &[u8],
        public_key_pem: &[u8],
        key_id: &str,
        access_token_ttl: Duration,
    ) -> Result<Self, AppError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("Failed to parse private key: {}", e))
        })?;

        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("Failed to parse public key: {}", e))
        })?;

        tracing::info!(kid = %key_id, "JWT service initialized with RS256 keys");

        Ok(Self {
            encoding_key,
            decoding_key,
            key_id: key_id.to_string(),
            access_token_ttl,
        })
    }

    pub fn issue(&self, user_id: Uuid, ttl: Duration) -> Result<Credential, AppError> {
        self.issue_at(user_id, ttl, Utc::now())
    }

    /// Access credential with the configured lifetime.
    pub fn issue_access(&self, user_id: Uuid) -> Result<Credential, AppError> {
        self.issue(user_id, self.access_token_ttl)
    }

    /// Sign a token whose validity window starts at `now`.
    pub fn issue_at(
        &self,
        user_id: Uuid,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Credential, AppError> {
        let expires_at = now + ttl;
        let token_id = Uuid::new_v4();

        let claims = Claims {
            sub: user_id.to_string(),
            jti: token_id.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.key_id.clone());

        let token = encode(&header, &claims, &self.encoding_key).map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to encode token: {}", e))
        })?;

        Ok(Credential {
            token,
            user_id,
            token_id,
            expires_at,
        })
    }

    /// Verify signature, algorithm, key id, time window and claim shape.
    ///
    /// Every failure is reported as the same `Unauthorized` error; the cause
    /// is only logged.
    pub fn validate(&self, token: &str) -> Result<Credential, AppError> {
        let header = decode_header(token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected token with malformed header");
            invalid_credential()
        })?;

        if header.alg != Algorithm::RS256 {
            tracing::debug!(alg = ?header.alg, "Rejected token with unexpected algorithm");
            return Err(invalid_credential());
        }

        if let Some(kid) = header.kid.as_deref() {
            if kid != self.key_id {
                tracing::debug!(kid = %kid, "Rejected token signed with unknown key");
                return Err(invalid_credential());
            }
        }

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "sub"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            tracing::debug!(error = %e, "Rejected token");
            invalid_credential()
        })?;

        let claims = data.claims;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| invalid_credential())?;
        let token_id = Uuid::parse_str(&claims.jti).map_err(|_| invalid_credential())?;
        let expires_at =
            DateTime::<Utc>::from_timestamp(claims.exp, 0).ok_or_else(invalid_credential)?;

        Ok(Credential {
            token: token.to_string(),
            user_id,
            token_id,
            expires_at,
        })
    }
}
