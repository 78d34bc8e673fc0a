//! OAuth2 credential handling for the Gmail API
//!
//! The token cache is the only state kept between runs. `auth` creates it
//! through the browser consent flow; every other command requires it to
//! exist and lets yup-oauth2 refresh the access token from it.

use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, TriageError};

/// Read/write access without permanent deletion; enough for labels and moves
pub const REQUIRED_SCOPES: &[&str] = &["https://www.googleapis.com/auth/gmail.modify"];

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub =
    Gmail<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>>;

/// Credential structure matching Google's OAuth2 credentials JSON format
#[derive(Debug, Serialize, Deserialize)]
pub struct Credentials {
    pub installed: InstalledApp,
}

/// Installed application credentials (desktop/CLI app)
#[derive(Debug, Serialize, Deserialize)]
pub struct InstalledApp {
    pub client_id: String,
    pub project_id: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub client_secret: String,
    pub redirect_uris: Vec<String>,
}

/// Load OAuth2 client credentials from a JSON file
pub async fn load_credentials(path: &Path) -> Result<Credentials> {
    let content = tokio::fs::read_to_string(path).await?;
    let creds = serde_json::from_str(&content)?;
    Ok(creds)
}

/// Supplies an authorized Gmail hub from the client secret and token cache
#[derive(Debug, Clone)]
pub struct CredentialProvider {
    credentials_path: PathBuf,
    token_cache_path: PathBuf,
}

impl CredentialProvider {
    pub fn new(credentials_path: impl Into<PathBuf>, token_cache_path: impl Into<PathBuf>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            token_cache_path: token_cache_path.into(),
        }
    }

    pub fn token_cache_path(&self) -> &Path {
        &self.token_cache_path
    }

    /// Fail with `MissingCredential` unless a token cache exists
    pub fn ensure_cached(&self) -> Result<()> {
        if self.token_cache_path.exists() {
            Ok(())
        } else {
            Err(TriageError::MissingCredential {
                path: self.token_cache_path.clone(),
            })
        }
    }

    /// Build a hub from the cached token, refreshing it when expired
    pub async fn connect(&self) -> Result<GmailHub> {
        self.ensure_cached()?;
        debug!("Using cached token at {:?}", self.token_cache_path);
        self.build_hub().await
    }

    /// Run the consent flow (or refresh) and persist the token
    ///
    /// With `force`, any cached token is discarded first.
    pub async fn authenticate(&self, force: bool) -> Result<GmailHub> {
        if let Some(parent) = self.token_cache_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        if force && self.token_cache_path.exists() {
            tokio::fs::remove_file(&self.token_cache_path).await?;
            info!("Removed existing token cache");
        }

        let creds = load_credentials(&self.credentials_path).await.map_err(|e| {
            TriageError::AuthError(format!(
                "Cannot read OAuth client secret at {}: {}",
                self.credentials_path.display(),
                e
            ))
        })?;
        info!(
            "Starting consent flow for project {}",
            creds.installed.project_id
        );

        let hub = self.build_hub().await?;
        secure_token_file(&self.token_cache_path).await?;
        info!("Token saved to {:?}", self.token_cache_path);
        Ok(hub)
    }

    async fn build_hub(&self) -> Result<GmailHub> {
        let secret = yup_oauth2::read_application_secret(&self.credentials_path)
            .await
            .map_err(|e| TriageError::AuthError(format!("Failed to read credentials: {}", e)))?;

        // HTTPRedirect opens a browser only when the cache holds no usable token
        let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
            secret,
            yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
        )
        .persist_tokens_to_disk(&self.token_cache_path)
        .build()
        .await
        .map_err(|e| TriageError::AuthError(format!("Failed to build authenticator: {}", e)))?;

        // Obtain the token up front so it is cached with the right scope
        auth.token(REQUIRED_SCOPES)
            .await
            .map_err(|e| TriageError::AuthError(format!("Failed to obtain token: {}", e)))?;

        let client =
            hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
                .build(
                    hyper_rustls::HttpsConnectorBuilder::new()
                        .with_native_roots()
                        .map_err(|e| {
                            TriageError::AuthError(format!("Failed to load TLS roots: {}", e))
                        })?
                        .https_or_http()
                        .enable_http1()
                        .build(),
                );

        Ok(Gmail::new(client, auth))
    }
}

/// Restrict the token file to its owner (0600)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Windows relies on the profile directory ACLs
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}
