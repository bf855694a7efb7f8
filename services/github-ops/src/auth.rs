//! GitHub App Authentication
//!
//! Utilities for authenticating as a GitHub App using JWT and installation tokens.
//! Private keys often arrive through environment variables or CI secrets with
//! their line breaks collapsed; [`normalize_pem`] restores the PEM layout
//! before the key is parsed.

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::client::GitHubClient;
use crate::config::ClientConfig;
use crate::error::{GitHubError, Result};
use crate::repo::RepoRef;

const PEM_BEGIN: &str = "-----BEGIN ";
const PEM_END: &str = "-----END ";
const PEM_DASHES: &str = "-----";
const PEM_LINE_WIDTH: usize = 64;

/// JWT claims for GitHub App authentication
#[derive(Debug, Serialize)]
pub struct GitHubAppClaims {
    /// Issued at time (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issuer (GitHub App ID)
    pub iss: String,
}

/// Response from the installation access token endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallationToken {
    pub token: String,
    pub expires_at: String,
}

#[derive(Debug, Deserialize)]
struct Installation {
    id: u64,
}

/// Where the App private key comes from
#[derive(Debug, Clone)]
pub enum PrivateKeySource {
    File(PathBuf),
    Literal(String),
}

impl PrivateKeySource {
    /// Read the key and normalize it to a well-formed PEM
    pub fn load(&self) -> Result<String> {
        let raw = match self {
            PrivateKeySource::File(path) => fs::read_to_string(path).map_err(|e| {
                GitHubError::Validation(format!("failed to read private key {}: {e}", path.display()))
            })?,
            PrivateKeySource::Literal(value) => value.clone(),
        };
        normalize_pem(&raw)
    }
}

/// App id plus normalized private key
#[derive(Debug, Clone)]
pub struct AppCredentials {
    pub app_id: String,
    pub private_key_pem: String,
}

impl AppCredentials {
    pub fn new(app_id: impl Into<String>, key: &PrivateKeySource) -> Result<Self> {
        let app_id = app_id.into();
        if app_id.trim().is_empty() {
            return Err(GitHubError::Validation("app id must not be empty".to_string()));
        }
        Ok(Self {
            app_id,
            private_key_pem: key.load()?,
        })
    }
}

/// Rebuild a PEM block whose line breaks were lost or escaped
///
/// Handles literal `\n` sequences, CRLF, surrounding quotes and bodies
/// collapsed onto one line. The body is re-wrapped at 64 columns.
pub fn normalize_pem(raw: &str) -> Result<String> {
    let invalid = |msg: &str| GitHubError::Validation(format!("invalid PEM private key: {msg}"));

    let text = raw
        .trim()
        .trim_matches('"')
        .replace("\\n", "\n")
        .replace("\r\n", "\n");

    let begin = text.find(PEM_BEGIN).ok_or_else(|| invalid("missing BEGIN marker"))?;
    let label_start = begin + PEM_BEGIN.len();
    let label_len = text[label_start..]
        .find(PEM_DASHES)
        .ok_or_else(|| invalid("unterminated BEGIN marker"))?;
    let label = text[label_start..label_start + label_len]
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if label.is_empty() {
        return Err(invalid("empty label"));
    }

    let body_start = label_start + label_len + PEM_DASHES.len();
    let body_len = text[body_start..]
        .find(PEM_END)
        .ok_or_else(|| invalid("missing END marker"))?;
    let body: String = text[body_start..body_start + body_len]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if body.is_empty() {
        return Err(invalid("empty body"));
    }
    if !body.is_ascii() {
        return Err(invalid("body is not base64"));
    }

    let mut pem = format!("{PEM_BEGIN}{label}{PEM_DASHES}\n");
    let mut rest = body.as_str();
    while !rest.is_empty() {
        let (line, tail) = rest.split_at(rest.len().min(PEM_LINE_WIDTH));
        pem.push_str(line);
        pem.push('\n');
        rest = tail;
    }
    pem.push_str(&format!("{PEM_END}{label}{PEM_DASHES}\n"));
    Ok(pem)
}

/// Generate a JWT for GitHub App authentication
///
/// # Arguments
/// * `app_id` - The GitHub App ID
/// * `private_key_pem` - The private key in PEM format
///
/// # Returns
/// A JWT string valid for 10 minutes
pub fn generate_jwt(app_id: &str, private_key_pem: &[u8]) -> Result<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| GitHubError::Auth(format!("system clock before epoch: {e}")))?
        .as_secs();

    let claims = GitHubAppClaims {
        iat: now.saturating_sub(60), // 60 seconds ago to account for clock skew
        exp: now + 600,              // Expires in 10 minutes
        iss: app_id.to_string(),
    };

    let encoding_key = EncodingKey::from_rsa_pem(private_key_pem)?;
    let header = Header::new(Algorithm::RS256);

    Ok(encode(&header, &claims, &encoding_key)?)
}

/// Exchange App credentials for an installation token on `repo`
pub async fn mint_installation_token(
    config: &ClientConfig,
    credentials: &AppCredentials,
    repo: &RepoRef,
) -> Result<InstallationToken> {
    let jwt = generate_jwt(&credentials.app_id, credentials.private_key_pem.as_bytes())?;
    let app_client = GitHubClient::new(jwt, config)?;

    let installation: Installation = app_client
        .get_json_optional(&format!("{}/installation", repo.api_path()), &[])
        .await?
        .ok_or_else(|| GitHubError::AppNotInstalled {
            app_id: credentials.app_id.clone(),
            repository: repo.to_string(),
        })?;
    info!(app_id = %credentials.app_id, repo = %repo, installation_id = installation.id, "Found App installation");

    app_client
        .post_json(
            &format!("/app/installations/{}/access_tokens", installation.id),
            &json!({}),
        )
        .await
}
