use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims
///
/// Payload of every bearer token. Signed with HS256 under the configured secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the id of the authenticated user.
    pub sub: Uuid,
    /// Issued At (iat), seconds since the Unix epoch.
    pub iat: i64,
    /// Expiration Time (exp), seconds since the Unix epoch. The token is
    /// valid while the current time is strictly before this instant.
    pub exp: i64,
}

/// TokenConfig
///
/// Everything the Token Service needs, passed explicitly at construction.
#[derive(Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub ttl: Duration,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// TokenService
///
/// Issues and validates signed, self-contained bearer tokens. There is no
/// server-side session or revocation list: a token stays valid until `exp`.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(config: &TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked in `validate_at` against an explicit clock.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            ttl: config.ttl,
        }
    }

    /// Issues a token for `subject` using the configured lifetime.
    pub fn issue_default(&self, subject: Uuid) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue(subject, self.ttl)
    }

    /// Issues a token for `subject` expiring `ttl` from now.
    pub fn issue(&self, subject: Uuid, ttl: Duration) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue_at(subject, Utc::now(), ttl)
    }

    /// Issues a token as if the current time were `issued_at`.
    pub fn issue_at(
        &self,
        subject: Uuid,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: subject,
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }

    /// Returns the subject of a valid token, or `None` for any bad signature,
    /// malformed payload or expired token.
    pub fn validate(&self, token: &str) -> Option<Uuid> {
        self.validate_at(token, Utc::now())
    }

    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Option<Uuid> {
        let data = match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!(kind = ?e.kind(), "rejected bearer token");
                return None;
            }
        };

        if now.timestamp() < data.claims.exp {
            Some(data.claims.sub)
        } else {
            tracing::debug!(sub = %data.claims.sub, "rejected expired bearer token");
            None
        }
    }
}
