use super::AuthCredentials;
use crate::error::ApiError;
use async_lock::Mutex;
use reqwest::StatusCode;
use std::fmt;

/// The client ID every password grant is made with.
pub const OAUTH_CLIENT_ID: &str = "testdroid-cloud-api";

/// Similarly, the shared client secret. It is not a secret in any real sense.
pub const OAUTH_CLIENT_SECRET: &str = "qwerty";

/// Relative to the cloud URL, not the API URL.
const TOKEN_ENDPOINT: &str = "/oauth/token";

/// An opaque bearer token, as handed out by the token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Where the session's token slot currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    /// Nothing fetched yet, or the last token was invalidated.
    Unfetched,
    Acquired(AccessToken),
    /// The last acquisition attempt failed, with its reason.
    Failed(String),
}

/// Owns one client's access token: fetches it lazily and forgets it on request.
#[derive(Debug)]
pub struct TokenManager {
    http: reqwest::Client,
    token_url: String,
    credentials: AuthCredentials,
    state: Mutex<TokenState>,
}

impl TokenManager {
    /// `cloud_url` must already be stripped of any trailing slash.
    pub fn new(http: reqwest::Client, cloud_url: &str, credentials: AuthCredentials) -> Self {
        Self {
            http,
            token_url: format!("{cloud_url}{TOKEN_ENDPOINT}"),
            credentials,
            state: Mutex::new(TokenState::Unfetched),
        }
    }

    pub fn credentials(&self) -> &AuthCredentials {
        &self.credentials
    }

    /// Returns the cached token, acquiring one first if necessary.
    ///
    /// A failed acquisition is logged and recorded rather than returned:
    /// the caller goes ahead without a token, and the server's 401 sends
    /// it back here for another try.
    ///
    /// The slot stays locked while acquiring, so concurrent callers wait on a slow token endpoint.
    pub async fn token(&self) -> Option<AccessToken> {
        let mut state = self.state.lock().await;
        if let TokenState::Acquired(token) = &*state {
            return Some(token.clone());
        }

        match self.request_token().await {
            Ok(token) => {
                *state = TokenState::Acquired(token.clone());
                Some(token)
            }
            Err(error) => {
                tracing::warn!(%error, "continuing without an access token");
                *state = TokenState::Failed(error.to_string());
                None
            }
        }
    }

    /// Acquires a fresh token unconditionally, surfacing any failure.
    pub async fn acquire(&self) -> Result<AccessToken, ApiError> {
        let mut state = self.state.lock().await;
        match self.request_token().await {
            Ok(token) => {
                *state = TokenState::Acquired(token.clone());
                Ok(token)
            }
            Err(error) => {
                *state = TokenState::Failed(error.to_string());
                Err(error)
            }
        }
    }

    /// Forgets the cached token; the next call will acquire a new one.
    pub async fn invalidate(&self) {
        *self.state.lock().await = TokenState::Unfetched;
    }

    pub async fn state(&self) -> TokenState {
        self.state.lock().await.clone()
    }

    /// Performs the OAuth2 password grant.
    async fn request_token(&self) -> Result<AccessToken, ApiError> {
        tracing::debug!(username = %self.credentials.username, "requesting access token");

        // The token endpoint takes everything as query parameters on a GET.
        let response = self
            .http
            .get(&self.token_url)
            .query(&[
                ("client_id", OAUTH_CLIENT_ID),
                ("client_secret", OAUTH_CLIENT_SECRET),
                ("grant_type", "password"),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ])
            .send()
            .await
            .map_err(|error| ApiError::TokenAcquisition {
                status: None,
                message: error.to_string(),
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ApiError::TokenAcquisition {
                status: Some(status.as_u16()),
                message: format!("token endpoint answered {status}"),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|error| ApiError::TokenAcquisition {
                status: Some(status.as_u16()),
                message: error.to_string(),
            })?;
        parse_token_response(&body)
    }
}

/// Pulls `access_token` out of the token endpoint's JSON.
/// A missing (or non-string) field gives an empty token, not an error.
fn parse_token_response(body: &str) -> Result<AccessToken, ApiError> {
    let json: serde_json::Value =
        serde_json::from_str(body).map_err(|error| ApiError::TokenAcquisition {
            status: Some(StatusCode::OK.as_u16()),
            message: format!("invalid token response: {error}"),
        })?;
    let Some(object) = json.as_object() else {
        return Err(ApiError::TokenAcquisition {
            status: Some(StatusCode::OK.as_u16()),
            message: "token response is not a JSON object".to_string(),
        });
    };

    let token = object
        .get("access_token")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();
    Ok(AccessToken::new(token))
}
