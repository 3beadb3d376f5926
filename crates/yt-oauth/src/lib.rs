//! OAuth 2.0 (PKCE) authorization for the YouTube Data API.
//!
//! The flow is split into a few small pieces:
//! - [`OAuthToken`] and [`TokenCache`] hold and persist the credential,
//! - [`generate_pkce`] / [`generate_auth_url`] build the browser request,
//! - [`CallbackServer`] receives the redirect and trades the code for tokens,
//! - [`OAuthManager`] ties it together and refreshes expired tokens lazily.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

mod callback;

pub use callback::CallbackServer;

/// Default OAuth callback port
pub const OAUTH_CALLBACK_PORT: u16 = 8090;

/// Google authorization endpoint
pub const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google token endpoint (code exchange and refresh)
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Read access to comments plus the scope required by commentThreads.list on some videos
pub const DEFAULT_SCOPES: &str = "https://www.googleapis.com/auth/youtube.readonly https://www.googleapis.com/auth/youtube.force-ssl";

/// File name of the token cache inside the home directory
pub const TOKEN_CACHE_FILE: &str = ".yt.json";

/// Tokens expiring within this many seconds are treated as expired
const EXPIRY_SKEW_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("authorization failed: {0}")]
    Authorization(String),
    #[error("token endpoint returned HTTP {status}: {body}")]
    TokenEndpoint { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token cache error: {0}")]
    Persistence(String),
    #[error("invalid redirect URI '{uri}': {reason}")]
    InvalidRedirectUri { uri: String, reason: String },
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// OAuth 2.0 token information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    /// Access token for API requests
    #[serde(default)]
    pub access_token: String,
    /// Refresh token for getting new access tokens
    #[serde(default)]
    pub refresh_token: String,
    /// Token type (usually "Bearer")
    #[serde(default)]
    pub token_type: String,
    /// Expiry time as Unix timestamp (seconds since epoch)
    #[serde(default)]
    pub expires_at: u64,
}

impl OAuthToken {
    /// Check if the token is expired or will expire soon (within 60 seconds)
    pub fn is_expired(&self) -> bool {
        unix_now() + EXPIRY_SKEW_SECS >= self.expires_at
    }

    /// A cached record is only usable if both tokens are present.
    pub fn is_usable(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }
}

/// Flat on-disk token record.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.yt.json`
    pub fn default_path() -> Result<PathBuf, OAuthError> {
        dirs::home_dir()
            .map(|home| home.join(TOKEN_CACHE_FILE))
            .ok_or_else(|| OAuthError::Persistence("could not determine home directory".into()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached token. A missing file is not an error.
    pub fn load(&self) -> Result<Option<OAuthToken>, OAuthError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(OAuthError::Persistence(format!(
                    "failed to read '{}': {}",
                    self.path.display(),
                    e
                )));
            }
        };
        let token = serde_json::from_str(&content).map_err(|e| {
            OAuthError::Persistence(format!("failed to parse '{}': {}", self.path.display(), e))
        })?;
        Ok(Some(token))
    }

    /// Save token to file with secure permissions
    pub fn save(&self, token: &OAuthToken) -> Result<(), OAuthError> {
        let persistence = |e: std::io::Error| {
            OAuthError::Persistence(format!("failed to write '{}': {}", self.path.display(), e))
        };

        let content = serde_json::to_string_pretty(token)
            .map_err(|e| OAuthError::Persistence(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(persistence)?;
        }
        std::fs::write(&self.path, content).map_err(persistence)?;

        // Owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.path, permissions).map_err(persistence)?;
        }

        Ok(())
    }
}

/// OAuth configuration
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret, empty for public clients
    pub client_secret: String,
    /// Redirect URI for OAuth callback
    pub redirect_uri: String,
    /// Space separated OAuth scopes
    pub scope: String,
    pub auth_url: String,
    pub token_url: String,
}

impl OAuthConfig {
    /// Create new OAuth configuration with YouTube defaults
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri: format!("http://localhost:{}/", OAUTH_CALLBACK_PORT),
            scope: DEFAULT_SCOPES.to_string(),
            auth_url: AUTH_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
        }
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    expires_in: u64,
}

impl TokenResponse {
    fn into_token(self, previous_refresh_token: Option<&str>) -> Result<OAuthToken, OAuthError> {
        let refresh_token = self
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| previous_refresh_token.map(str::to_string))
            .ok_or_else(|| {
                OAuthError::Authorization("missing refresh_token in token response".into())
            })?;

        Ok(OAuthToken {
            access_token: self.access_token,
            refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at: unix_now() + self.expires_in,
        })
    }
}

async fn post_token_form(
    http: &reqwest::Client,
    config: &OAuthConfig,
    params: &[(&str, &str)],
) -> Result<TokenResponse, OAuthError> {
    let mut form: Vec<(&str, &str)> = vec![("client_id", config.client_id.as_str())];
    if !config.client_secret.is_empty() {
        form.push(("client_secret", config.client_secret.as_str()));
    }
    form.extend_from_slice(params);

    let response = http.post(&config.token_url).form(&form).send().await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(OAuthError::TokenEndpoint { status, body });
    }

    Ok(response.json::<TokenResponse>().await?)
}

/// Exchange authorization code for tokens
pub async fn exchange_code(
    http: &reqwest::Client,
    config: &OAuthConfig,
    code: &str,
    verifier: &str,
) -> Result<OAuthToken, OAuthError> {
    tracing::info!("exchanging authorization code for tokens");

    let response = post_token_form(
        http,
        config,
        &[
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", config.redirect_uri.as_str()),
        ],
    )
    .await?;

    let token = response.into_token(None)?;
    tracing::info!("obtained OAuth tokens");
    Ok(token)
}

/// Use the refresh token grant; the old refresh token is kept if none is returned.
pub async fn refresh_token(
    http: &reqwest::Client,
    config: &OAuthConfig,
    current: &OAuthToken,
) -> Result<OAuthToken, OAuthError> {
    let response = post_token_form(
        http,
        config,
        &[
            ("refresh_token", current.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ],
    )
    .await?;

    response.into_token(Some(&current.refresh_token))
}

/// Generate PKCE verifier and challenge
pub fn generate_pkce() -> (String, String) {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use rand::Rng;
    use rand::distributions::Alphanumeric;
    use sha2::{Digest, Sha256};

    // 43-128 characters, from a cryptographically secure RNG
    let verifier: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();

    // base64url(SHA256(verifier))
    let hash = Sha256::digest(verifier.as_bytes());
    let challenge = URL_SAFE_NO_PAD.encode(hash);

    (verifier, challenge)
}

/// Generate authorization URL, returning it together with the PKCE verifier
pub fn generate_auth_url(config: &OAuthConfig) -> (String, String) {
    let (verifier, challenge) = generate_pkce();

    let auth_url = format!(
        "{}?\
        client_id={}&\
        redirect_uri={}&\
        response_type=code&\
        scope={}&\
        code_challenge={}&\
        code_challenge_method=S256&\
        access_type=offline&\
        prompt=consent",
        config.auth_url,
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_uri),
        urlencoding::encode(&config.scope),
        urlencoding::encode(&challenge),
    );

    (auth_url, verifier)
}

/// Run the interactive flow: bind the callback listener, send the user to the
/// consent page and wait for the redirect. The token is written to `cache`
/// by the callback handler before this returns.
pub async fn start_auth_flow(
    config: &OAuthConfig,
    cache: &TokenCache,
) -> Result<OAuthToken, OAuthError> {
    let (auth_url, verifier) = generate_auth_url(config);

    let server = CallbackServer::bind(&config.redirect_uri).await?;

    eprintln!("\n=================================================");
    eprintln!("OAuth 2.0 Authorization Required");
    eprintln!("=================================================");
    eprintln!("\nIf your browser does not open, visit the following URL:\n");
    eprintln!("{}\n", auth_url);
    eprintln!("Waiting for authorization...");
    eprintln!("=================================================\n");

    if let Err(e) = open::that(&auth_url) {
        tracing::warn!("could not open browser: {}", e);
    }

    server
        .wait_for_token(config.clone(), verifier, cache.clone())
        .await
}

/// Shared handle for use as a token provider across tasks
pub type SharedOAuthManager = Arc<tokio::sync::Mutex<OAuthManager>>;

/// OAuth manager handles authorization, token refresh and persistence
pub struct OAuthManager {
    config: OAuthConfig,
    cache: TokenCache,
    token: Option<OAuthToken>,
    http: reqwest::Client,
}

impl OAuthManager {
    /// Create new OAuth manager
    pub fn new(config: OAuthConfig, cache: TokenCache) -> Self {
        Self {
            config,
            cache,
            token: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn into_shared(self) -> SharedOAuthManager {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    pub fn token(&self) -> Option<&OAuthToken> {
        self.token.as_ref()
    }

    /// Load the cached token, running the browser flow if there is no usable one.
    pub async fn load_or_authorize(&mut self) -> Result<(), OAuthError> {
        match self.cache.load()? {
            Some(token) if token.is_usable() => {
                tracing::debug!("using cached token from {}", self.cache.path().display());
                self.token = Some(token);
            }
            _ => {
                tracing::info!("no usable cached token, starting authorization");
                self.token = Some(start_auth_flow(&self.config, &self.cache).await?);
            }
        }
        Ok(())
    }

    /// Get valid access token, refreshing if necessary
    pub async fn access_token(&mut self) -> Result<String, OAuthError> {
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| OAuthError::Authorization("no OAuth token loaded".into()))?;

        if !token.is_expired() {
            return Ok(token.access_token.clone());
        }

        tracing::info!("access token expired, refreshing");
        let refreshed = refresh_token(&self.http, &self.config, token).await?;
        tracing::info!("access token refreshed");

        let access_token = refreshed.access_token.clone();
        self.token = Some(refreshed);
        Ok(access_token)
    }

    /// Save current token to the cache
    pub fn save_token(&self) -> Result<(), OAuthError> {
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| OAuthError::Persistence("no OAuth token to save".into()))?;
        self.cache.save(token)
    }
}
