//! Google ID token verification.
//!
//! Signatures are checked against Google's published JWKS, which is fetched
//! over HTTPS and cached. An unknown `kid` forces one refetch, since Google
//! rotates keys.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
const CLOCK_SKEW_LEEWAY: u64 = 30;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("id token is malformed")]
    Malformed,
    #[error("id token rejected: {0}")]
    Rejected(String),
    #[error("id token expired")]
    Expired,
    #[error("email on the id token is not verified")]
    EmailNotVerified,
    #[error("no key in the provider key set matches the token")]
    NoMatchingKey,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

impl IdentityError {
    /// True when the token itself is bad, false when the provider could not be reached.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, IdentityError::Unavailable(_))
    }
}

/// Claims extracted from a verified ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify_id_token(
        &self,
        token: &str,
        expected_audience: &str,
    ) -> Result<VerifiedIdentity, IdentityError>;
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<serde_json::Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

struct CacheEntry {
    jwks: JwkSet,
    fetched_at: Instant,
}

#[derive(Clone)]
pub struct GoogleVerifier {
    jwks_url: String,
    cache_ttl: Duration,
    cache: Arc<RwLock<Option<CacheEntry>>>,
    client: reqwest::Client,
}

impl GoogleVerifier {
    pub fn new(jwks_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            jwks_url: jwks_url.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
            cache: Arc::new(RwLock::new(None)),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    async fn cached_jwks(&self) -> Option<JwkSet> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|e| e.fetched_at.elapsed() < self.cache_ttl)
            .map(|e| e.jwks.clone())
    }

    async fn fetch_jwks(&self) -> Result<JwkSet, IdentityError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdentityError::Unavailable(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        let jwks: JwkSet = response
            .json()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        let mut cache = self.cache.write().await;
        *cache = Some(CacheEntry {
            jwks: jwks.clone(),
            fetched_at: Instant::now(),
        });
        debug!(keys = jwks.keys.len(), "google jwks refreshed");
        Ok(jwks)
    }

    async fn decoding_key(&self, kid: &str) -> Result<(DecodingKey, Algorithm), IdentityError> {
        if let Some(jwks) = self.cached_jwks().await {
            if let Some(jwk) = find_key(&jwks, kid) {
                return jwk_to_decoding_key(jwk);
            }
        }
        let jwks = self.fetch_jwks().await?;
        let jwk = find_key(&jwks, kid).ok_or(IdentityError::NoMatchingKey)?;
        jwk_to_decoding_key(jwk)
    }
}

fn find_key<'a>(jwks: &'a JwkSet, kid: &str) -> Option<&'a Jwk> {
    jwks.keys.iter().find(|k| k.common.key_id.as_deref() == Some(kid))
}

fn jwk_to_decoding_key(jwk: &Jwk) -> Result<(DecodingKey, Algorithm), IdentityError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            let key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(|e| IdentityError::Rejected(format!("bad RSA key in JWKS: {e}")))?;
            Ok((key, Algorithm::RS256))
        }
        _ => Err(IdentityError::NoMatchingKey),
    }
}

fn email_verified(value: &Option<serde_json::Value>) -> bool {
    match value {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

#[async_trait]
impl IdentityVerifier for GoogleVerifier {
    async fn verify_id_token(
        &self,
        token: &str,
        expected_audience: &str,
    ) -> Result<VerifiedIdentity, IdentityError> {
        let header = decode_header(token).map_err(|_| IdentityError::Malformed)?;
        if header.alg != Algorithm::RS256 {
            return Err(IdentityError::Rejected(format!("unexpected alg {:?}", header.alg)));
        }
        let kid = header.kid.ok_or(IdentityError::Malformed)?;
        let (key, alg) = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(alg);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_audience(&[expected_audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let data = decode::<GoogleClaims>(token, &key, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => IdentityError::Expired,
            ErrorKind::InvalidSignature => IdentityError::Rejected("invalid signature".into()),
            ErrorKind::InvalidIssuer => IdentityError::Rejected("invalid issuer".into()),
            ErrorKind::InvalidAudience => IdentityError::Rejected("invalid audience".into()),
            _ => IdentityError::Malformed,
        })?;
        let claims = data.claims;

        let email = claims.email.ok_or(IdentityError::EmailNotVerified)?;
        if !email_verified(&claims.email_verified) {
            warn!(subject = %claims.sub, "google id token with unverified email");
            return Err(IdentityError::EmailNotVerified);
        }

        Ok(VerifiedIdentity {
            subject: claims.sub,
            email,
            name: claims.name,
            picture: claims.picture,
        })
    }
}
