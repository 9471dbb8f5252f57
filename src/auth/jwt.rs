//! JWT Token Handler
//! Mission: Mint and verify HS256 access/refresh token pairs

use crate::auth::models::{Claims, TokenKind, User};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;
use uuid::Uuid;

/// Token lifetimes
#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: Duration::hours(2),
            refresh: Duration::days(30),
        }
    }
}

/// Signed access token plus the refresh token it was issued (or refreshed) with
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT secret is not configured")]
    MissingSecret,
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("invalid token")]
    InvalidToken,
    #[error("invalid or expired refresh token")]
    InvalidRefreshToken,
}

/// Identity fields copied into every token
struct Identity<'a> {
    sub: &'a str,
    username: &'a str,
    role: &'a str,
    tenant_id: i64,
}

/// JWT Handler for token operations
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetimes: TokenLifetimes,
}

impl JwtHandler {
    /// Create a handler for one symmetric secret. An empty secret is a
    /// configuration fault.
    pub fn new(secret: &str, lifetimes: TokenLifetimes) -> Result<Self, JwtError> {
        if secret.trim().is_empty() {
            return Err(JwtError::MissingSecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetimes,
        })
    }

    /// Issue an access/refresh pair for a verified user
    pub fn issue_token_pair(&self, user: &User) -> Result<TokenPair, JwtError> {
        let sub = user.id.to_string();
        let identity = Identity {
            sub: &sub,
            username: &user.username,
            role: user.role.as_str(),
            tenant_id: user.tenant_id,
        };

        let (access_token, access_expires_at) =
            self.mint(&identity, TokenKind::Access, self.lifetimes.access)?;
        let (refresh_token, _) = self.mint(&identity, TokenKind::Refresh, self.lifetimes.refresh)?;

        debug!(
            "Issued token pair for {} (tenant {}), access expires {}",
            user.username, user.tenant_id, access_expires_at
        );

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
        })
    }

    /// Mint a fresh access token from a refresh token.
    ///
    /// The refresh token is not rotated: the returned pair carries the
    /// exact string that was passed in.
    pub fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenPair, JwtError> {
        let claims = self
            .verify(refresh_token)
            .map_err(|_| JwtError::InvalidRefreshToken)?;
        if claims.typ != TokenKind::Refresh {
            return Err(JwtError::InvalidRefreshToken);
        }

        let identity = Identity {
            sub: &claims.sub,
            username: &claims.username,
            role: &claims.role,
            tenant_id: claims.tenant_id,
        };
        let (access_token, access_expires_at) =
            self.mint(&identity, TokenKind::Access, self.lifetimes.access)?;

        debug!(
            "Refreshed access token for {} (tenant {})",
            claims.username, claims.tenant_id
        );

        Ok(TokenPair {
            access_token,
            refresh_token: refresh_token.to_string(),
            access_expires_at,
        })
    }

    /// Verify signature, expiry and claim structure.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| JwtError::InvalidToken)
    }

    /// Like [`verify`](Self::verify), but only accepts access tokens.
    pub fn verify_access(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.verify(token)?;
        if claims.typ != TokenKind::Access {
            return Err(JwtError::InvalidToken);
        }
        Ok(claims)
    }

    fn mint(
        &self,
        identity: &Identity<'_>,
        typ: TokenKind,
        ttl: Duration,
    ) -> Result<(String, DateTime<Utc>), JwtError> {
        let now = Utc::now();
        let expires_at = now + ttl;

        let claims = Claims {
            sub: identity.sub.to_string(),
            username: identity.username.to_string(),
            role: identity.role.to_string(),
            tenant_id: identity.tenant_id,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
            typ,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok((token, expires_at))
    }
}
