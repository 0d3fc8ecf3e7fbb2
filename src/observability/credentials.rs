//! Access tokens for the managed log sink.
//!
//! # Responsibilities
//! - Read the explicit credentials file, when one is configured
//! - Exchange a signed service-account assertion for an access token
//! - Fall back to the instance metadata server otherwise
//! - Cache tokens until shortly before they expire
//!
//! # Design Decisions
//! - Only `service_account` key files are supported; any other type fails
//!   sink construction so the factory falls back to console logging
//! - The private key is parsed once at startup, never per request

use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::observability::sink::SinkError;

pub const LOGGING_WRITE_SCOPE: &str = "https://www.googleapis.com/auth/logging.write";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_TTL_SECS: i64 = 3600;
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct CredentialsFile {
    #[serde(rename = "type")]
    kind: Option<String>,
    project_id: Option<String>,
    private_key_id: Option<String>,
    private_key: Option<String>,
    client_email: Option<String>,
    token_uri: Option<String>,
}

/// A service-account key able to sign token assertions.
pub struct ServiceAccount {
    pub client_email: String,
    pub token_uri: String,
    key_id: Option<String>,
    key: EncodingKey,
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

/// Where access tokens come from.
#[derive(Debug)]
pub enum TokenSource {
    /// Instance metadata server of the managed runtime.
    Metadata { token_url: String },
    /// JWT-bearer exchange with an explicit service-account key.
    ServiceAccount(ServiceAccount),
}

impl TokenSource {
    pub fn kind(&self) -> &'static str {
        match self {
            TokenSource::Metadata { .. } => "metadata",
            TokenSource::ServiceAccount(_) => "service_account",
        }
    }
}

/// Parsed credentials file.
#[derive(Debug)]
pub struct LoadedCredentials {
    pub source: TokenSource,
    pub project_id: Option<String>,
}

/// Read and validate an explicit credentials file.
pub fn load_credentials(path: &Path) -> Result<LoadedCredentials, SinkError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| SinkError::Init(format!("credentials file {}: {}", path.display(), e)))?;
    parse_credentials(&raw)
}

pub fn parse_credentials(raw: &str) -> Result<LoadedCredentials, SinkError> {
    let file: CredentialsFile = serde_json::from_str(raw)
        .map_err(|e| SinkError::Init(format!("malformed credentials file: {}", e)))?;

    match file.kind.as_deref() {
        Some("service_account") => {}
        Some(other) => {
            return Err(SinkError::Init(format!(
                "unsupported credentials type '{}'",
                other
            )))
        }
        None => return Err(SinkError::Init("credentials file has no type".into())),
    }

    let client_email = file
        .client_email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| SinkError::Init("service account key has no client_email".into()))?;
    let private_key = file
        .private_key
        .ok_or_else(|| SinkError::Init("service account key has no private_key".into()))?;
    let key = EncodingKey::from_rsa_pem(private_key.as_bytes())
        .map_err(|e| SinkError::Init(format!("invalid service account private key: {}", e)))?;

    Ok(LoadedCredentials {
        source: TokenSource::ServiceAccount(ServiceAccount {
            client_email,
            token_uri: file
                .token_uri
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            key_id: file.private_key_id,
            key,
        }),
        project_id: file.project_id.filter(|p| !p.is_empty()),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to sign token assertion: {0}")]
    Sign(#[from] jsonwebtoken::errors::Error),
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Token source plus cache, owned by the sink's writer task.
pub struct TokenProvider {
    source: TokenSource,
    cached: Option<CachedToken>,
}

impl TokenProvider {
    pub fn new(source: TokenSource) -> Self {
        Self {
            source,
            cached: None,
        }
    }

    pub fn source(&self) -> &TokenSource {
        &self.source
    }

    /// A valid bearer token, fetched only when the cached one is near expiry.
    pub async fn access_token(&mut self, client: &reqwest::Client) -> Result<String, TokenError> {
        if let Some(token) = &self.cached {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let response = match &self.source {
            TokenSource::Metadata { token_url } => {
                client
                    .get(token_url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<TokenResponse>()
                    .await?
            }
            TokenSource::ServiceAccount(account) => {
                let assertion = sign_assertion(account)?;
                client
                    .post(&account.token_uri)
                    .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<TokenResponse>()
                    .await?
            }
        };

        let ttl = Duration::from_secs(response.expires_in).saturating_sub(REFRESH_MARGIN);
        self.cached = Some(CachedToken {
            value: response.access_token.clone(),
            expires_at: Instant::now() + ttl,
        });
        tracing::debug!(source = self.source.kind(), ttl = ?ttl, "Cloud logging token refreshed");
        Ok(response.access_token)
    }
}

fn sign_assertion(account: &ServiceAccount) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = AssertionClaims {
        iss: &account.client_email,
        scope: LOGGING_WRITE_SCOPE,
        aud: &account.token_uri,
        iat: now,
        exp: now + ASSERTION_TTL_SECS,
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = account.key_id.clone();
    jsonwebtoken::encode(&header, &claims, &account.key)
}
