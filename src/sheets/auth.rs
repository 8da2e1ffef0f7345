use crate::config::Config;
use crate::error::{AppError, AuthorizationError, Result};
use async_trait::async_trait;
use google_sheets4::api::Scope;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use yup_oauth2::{InstalledFlowAuthenticator, InstalledFlowReturnMethod};

// Read and write access to all of the user's spreadsheets
pub const AUTH_SCOPE: Scope = Scope::Spreadsheet;

/// Opaque credential used to authorize Sheets API calls.
///
/// Wraps the OAuth2 bearer access token. It lands in request payloads as a
/// plain string under [`AUTH_FIELD`](super::AUTH_FIELD).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Authorization(String);

impl Authorization {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Authorization {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

/// Obtains an authorization handle for a set of scopes.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(
        &self,
        scopes: &[&str],
        credentials_path: &Path,
    ) -> std::result::Result<Authorization, AuthorizationError>;
}

/// Authorizer backed by yup-oauth2's installed application flow.
///
/// Tokens are persisted to the cache directory and refreshed by yup-oauth2.
/// The default cache location is only resolved, and created, on the first
/// call to [`Authorizer::authorize`].
#[derive(Debug, Default)]
pub struct GoogleAuthorizer {
    token_cache_path: Option<PathBuf>,
}

impl GoogleAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token_cache(token_cache_path: PathBuf) -> Self {
        Self {
            token_cache_path: Some(token_cache_path),
        }
    }

    fn token_cache_path(&self) -> std::result::Result<PathBuf, AuthorizationError> {
        match &self.token_cache_path {
            Some(path) => Ok(path.clone()),
            None => token_cache_path().map_err(|e| AuthorizationError::TokenCache(e.to_string())),
        }
    }
}

#[async_trait]
impl Authorizer for GoogleAuthorizer {
    async fn authorize(
        &self,
        scopes: &[&str],
        credentials_path: &Path,
    ) -> std::result::Result<Authorization, AuthorizationError> {
        let secret = yup_oauth2::read_application_secret(credentials_path)
            .await
            .map_err(|source| AuthorizationError::Credentials {
                path: credentials_path.to_path_buf(),
                source,
            })?;

        let cache = self.token_cache_path()?;

        // User will copy/paste the authorization code from the browser
        let auth =
            InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::Interactive)
                .persist_tokens_to_disk(cache.clone())
                .build()
                .await
                .map_err(AuthorizationError::Authenticator)?;

        let token = auth
            .token(scopes)
            .await
            .map_err(|e| AuthorizationError::Token(e.to_string()))?;

        let access_token = token.token().ok_or_else(|| {
            AuthorizationError::Token("Token response has no access token".to_string())
        })?;
        debug!(?cache, "Obtained access token");

        Ok(Authorization::new(access_token))
    }
}

/// Clear cached Google tokens by deleting the token cache file
#[instrument(name = "Clearing auth tokens for Google Sheets", skip_all)]
pub fn clear_tokens() -> Result<()> {
    let token_path = token_cache_path()?;

    if !token_path.exists() {
        debug!("No Google Sheets tokens to clear");
        return Ok(());
    }

    fs::remove_file(&token_path).map_err(|e| {
        AppError::Config(format!("Failed to delete tokens file {:?}: {}", token_path, e))
    })?;
    info!("Cleared Google Sheets cached tokens");

    Ok(())
}

fn token_cache_path() -> Result<PathBuf> {
    Config::cache_file("google_tokens.json")
}
