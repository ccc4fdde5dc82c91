//! Session credential retrieval
//!
//! Each wake fetches a fresh access token from the token service:
//! `GET {base}/api/get-token?participant={id}` answering `{ "token": "..." }`.
//! There is no retry loop; the user retries by waking the assistant again.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Path of the token endpoint below the service base URL
const TOKEN_PATH: &str = "api/get-token";

/// Credentials for one session. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub server_url: String,
    pub access_token: String,
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("server_url", &self.server_url)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Response from the token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
    /// Some deployments also name the room server
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Invalid token service URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Token service returned an empty token")]
    EmptyToken,
}

/// Anything that can produce session credentials
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn fetch(&self) -> Result<SessionCredentials, TokenError>;
}

/// HTTP client for the token service
#[derive(Debug, Clone)]
pub struct TokenClient {
    client: reqwest::Client,
    token_url: Url,
    /// Room server used when the service does not name one
    room_url: String,
    timeout: Duration,
}

impl TokenClient {
    /// Create a client for `base_url` fetching tokens for `participant`
    pub fn new(
        base_url: &str,
        participant: &str,
        room_url: &str,
        timeout: Duration,
    ) -> Result<Self, TokenError> {
        let token_url = build_token_url(base_url, participant)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TokenError::Client(e.to_string()))?;

        Ok(Self {
            client,
            token_url,
            room_url: room_url.to_string(),
            timeout,
        })
    }

    /// Create a client from the session section of the config
    pub fn from_config(config: &crate::config::SessionConfig) -> Result<Self, TokenError> {
        Self::new(
            &config.token_server_url,
            &config.participant_id,
            &config.room_url,
            Duration::from_secs(config.token_timeout_secs),
        )
    }

    pub fn token_url(&self) -> &Url {
        &self.token_url
    }
}

#[async_trait]
impl CredentialSource for TokenClient {
    async fn fetch(&self) -> Result<SessionCredentials, TokenError> {
        tracing::debug!("Requesting session token from {}", self.token_url);

        let response = self
            .client
            .get(self.token_url.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TokenError::Timeout(self.timeout.as_secs())
                } else {
                    TokenError::ConnectionFailed(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TokenError::ServerError { status, message });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| TokenError::ParseError(e.to_string()))?;

        let credentials = credentials_from(body, &self.room_url)?;
        tracing::info!("Session token received for {}", credentials.server_url);
        Ok(credentials)
    }
}

fn build_token_url(base_url: &str, participant: &str) -> Result<Url, TokenError> {
    let mut base = Url::parse(base_url).map_err(|e| TokenError::InvalidUrl(e.to_string()))?;
    if base.cannot_be_a_base() {
        return Err(TokenError::InvalidUrl(base_url.to_string()));
    }
    // Keep any path prefix the service is mounted under
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    let mut url = base
        .join(TOKEN_PATH)
        .map_err(|e| TokenError::InvalidUrl(e.to_string()))?;
    url.query_pairs_mut().append_pair("participant", participant);
    Ok(url)
}

fn credentials_from(body: TokenResponse, fallback_url: &str) -> Result<SessionCredentials, TokenError> {
    if body.token.trim().is_empty() {
        return Err(TokenError::EmptyToken);
    }
    Ok(SessionCredentials {
        server_url: body
            .url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| fallback_url.to_string()),
        access_token: body.token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_url_includes_participant() {
        let url = build_token_url("http://localhost:8000", "android-user").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/get-token?participant=android-user"
        );
    }

    #[test]
    fn test_token_url_keeps_path_prefix_and_escapes() {
        let url = build_token_url("https://example.com/assistant", "me & you").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/assistant/api/get-token?participant=me+%26+you"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(matches!(
            build_token_url("not a url", "x"),
            Err(TokenError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_response_parsing() {
        let body: TokenResponse = serde_json::from_str(r#"{"token":"abc"}"#).unwrap();
        let creds = credentials_from(body, "ws://room").unwrap();
        assert_eq!(creds.access_token, "abc");
        assert_eq!(creds.server_url, "ws://room");

        let body: TokenResponse =
            serde_json::from_str(r#"{"token":"abc","url":"wss://other"}"#).unwrap();
        assert_eq!(credentials_from(body, "ws://room").unwrap().server_url, "wss://other");

        let body: TokenResponse = serde_json::from_str(r#"{"token":"  "}"#).unwrap();
        assert_eq!(credentials_from(body, "ws://room"), Err(TokenError::EmptyToken));
    }

    #[test]
    fn test_debug_redacts_token() {
        let creds = SessionCredentials {
            server_url: "ws://room".to_string(),
            access_token: "secret".to_string(),
        };
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("secret"));
        assert!(printed.contains("ws://room"));
    }

    #[test]
    fn test_client_from_default_config() {
        let client = TokenClient::from_config(&crate::config::SessionConfig::default()).unwrap();
        assert_eq!(client.token_url().path(), "/api/get-token");
    }
}
