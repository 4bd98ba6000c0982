//! Signed token issuance, verification and rotation
//!
//! Two token kinds exist, each with its own HMAC-SHA256 secret and lifetime.
//! Every token carries the holder's id and role, a unique id, and its kind.
//! Only HS256 is accepted on verification.

use chrono::Utc;
use evently_core::{AuthConfig, UserRole};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Token kind; each kind has an independent secret and TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }

    fn other(&self) -> TokenKind {
        match self {
            TokenKind::Access => TokenKind::Refresh,
            TokenKind::Refresh => TokenKind::Access,
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TokenKind {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(TokenKind::Access),
            "refresh" => Ok(TokenKind::Refresh),
            other => Err(TokenError::UnknownKind(other.to_string())),
        }
    }
}

/// Identity carried by a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payload {
    pub user_id: Uuid,
    pub role: UserRole,
}

/// Registered and private claims of an Evently token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user ID
    pub sub: String,
    pub role: UserRole,
    pub kind: TokenKind,
    /// Unique token identifier; makes every issued token distinct
    pub jti: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
}

/// Token issuance and verification errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to encode token: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    Expired,

    #[error("Expected a {expected} token")]
    KindMismatch { expected: TokenKind },

    #[error("Unknown token kind '{0}'")]
    UnknownKind(String),
}

/// Result of a refresh: a new access token and either a rotated or the
/// presented refresh token
#[derive(Debug, Clone)]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub rotated: bool,
}

struct KindKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl KindKeys {
    fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }
}

/// Issues and verifies both token kinds.
///
/// Built once at startup from [`AuthConfig`] and shared read-only.
pub struct TokenManager {
    access: KindKeys,
    refresh: KindKeys,
    renewal_threshold_secs: i64,
    validation: Validation,
}

impl TokenManager {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against an injectable clock in `verify_at`
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            access: KindKeys::new(&config.access_secret, config.access_ttl_secs),
            refresh: KindKeys::new(&config.refresh_secret, config.refresh_ttl_secs),
            renewal_threshold_secs: i64::try_from(config.refresh_renewal_threshold_secs)
                .unwrap_or(i64::MAX),
            validation,
        }
    }

    fn keys(&self, kind: TokenKind) -> &KindKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Access token lifetime in seconds
    pub fn access_ttl_secs(&self) -> i64 {
        self.access.ttl_secs
    }

    pub fn issue(&self, payload: Payload, kind: TokenKind) -> Result<String, TokenError> {
        self.issue_at(payload, kind, Utc::now().timestamp())
    }

    pub fn issue_at(&self, payload: Payload, kind: TokenKind, now: i64) -> Result<String, TokenError> {
        let keys = self.keys(kind);
        let claims = Claims {
            sub: payload.user_id.to_string(),
            role: payload.role,
            kind,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now.saturating_add(keys.ttl_secs),
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)?)
    }

    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Payload, TokenError> {
        self.verify_at(token, expected, Utc::now().timestamp())
    }

    pub fn verify_at(&self, token: &str, expected: TokenKind, now: i64) -> Result<Payload, TokenError> {
        let claims = self.decode_claims(token, expected, now)?;
        payload_from(&claims)
    }

    /// Mint a new access token from a refresh token. The refresh token is
    /// only replaced once its remaining life drops below the renewal threshold.
    pub fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, TokenError> {
        self.refresh_at(refresh_token, Utc::now().timestamp())
    }

    pub fn refresh_at(&self, refresh_token: &str, now: i64) -> Result<RefreshedTokens, TokenError> {
        let claims = self.decode_claims(refresh_token, TokenKind::Refresh, now)?;
        let payload = payload_from(&claims)?;

        let access_token = self.issue_at(payload, TokenKind::Access, now)?;

        if claims.exp - now < self.renewal_threshold_secs {
            Ok(RefreshedTokens {
                access_token,
                refresh_token: self.issue_at(payload, TokenKind::Refresh, now)?,
                rotated: true,
            })
        } else {
            Ok(RefreshedTokens {
                access_token,
                refresh_token: refresh_token.to_string(),
                rotated: false,
            })
        }
    }

    fn decode_claims(&self, token: &str, expected: TokenKind, now: i64) -> Result<Claims, TokenError> {
        let claims = match decode::<Claims>(token, &self.keys(expected).decoding, &self.validation) {
            Ok(data) => data.claims,
            Err(e) if matches!(e.kind(), ErrorKind::InvalidSignature) => {
                // A valid token of the other kind is reported as such
                let other = expected.other();
                return match decode::<Claims>(token, &self.keys(other).decoding, &self.validation) {
                    Ok(_) => Err(TokenError::KindMismatch { expected }),
                    Err(_) => Err(TokenError::InvalidToken),
                };
            }
            Err(_) => return Err(TokenError::InvalidToken),
        };

        if claims.kind != expected {
            return Err(TokenError::KindMismatch { expected });
        }
        if now >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

fn payload_from(claims: &Claims) -> Result<Payload, TokenError> {
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| TokenError::InvalidToken)?;
    Ok(Payload {
        user_id,
        role: claims.role,
    })
}
