use crate::domain::models::Token;
use crate::infrastructure::config::SpotifyCredentials;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::oauth_client::{
    OAuthCodeExchangeRequest, OAuthHttpClient, OAuthTokenResponse,
};
use std::sync::Arc;
use url::Url;

const DEFAULT_TOKEN_ENDPOINT: &str = "https://accounts.spotify.com/api/token";
const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "https://accounts.spotify.com/authorize";

pub const TOKEN_EXCHANGE_FAILED: &str = "token_exchange_failed";

/// Every login asks for the same scopes; nothing is requested incrementally.
pub const SPOTIFY_SCOPES: [&str; 6] = [
    "user-read-private",
    "user-read-email",
    "user-read-playback-state",
    "user-read-currently-playing",
    "user-modify-playback-state",
    "streaming",
];

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub token_endpoint: String,
    pub authorization_endpoint: String,
}

impl OAuthConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scopes: SPOTIFY_SCOPES.iter().map(|scope| scope.to_string()).collect(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            authorization_endpoint: DEFAULT_AUTHORIZATION_ENDPOINT.to_string(),
        }
    }
}

impl From<SpotifyCredentials> for OAuthConfig {
    fn from(credentials: SpotifyCredentials) -> Self {
        Self::new(
            credentials.client_id,
            credentials.client_secret,
            credentials.redirect_uri,
        )
    }
}

pub struct OAuthManager<C>
where
    C: OAuthHttpClient + ?Sized,
{
    config: OAuthConfig,
    oauth_client: Arc<C>,
}

impl<C> OAuthManager<C>
where
    C: OAuthHttpClient + ?Sized,
{
    pub fn new(config: OAuthConfig, oauth_client: Arc<C>) -> Self {
        Self {
            config,
            oauth_client,
        }
    }

    pub fn build_authorization_url(&self) -> Result<String, InfraError> {
        if self.config.scopes.is_empty() {
            return Err(InfraError::OAuth("at least one scope is required".to_string()));
        }

        let mut url = Url::parse(&self.config.authorization_endpoint)
            .map_err(|error| {
                InfraError::OAuth(format!("invalid authorization endpoint: {error}"))
            })?;
        let scope = self.config.scopes.join(" ");

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("scope", &scope)
            .append_pair("redirect_uri", &self.config.redirect_uri);

        Ok(url.to_string())
    }

    /// Exactly one call to the token endpoint per invocation; the caller
    /// decides what a failure looks like to the user.
    pub async fn exchange_code(&self, authorization_code: &str) -> Result<Token, InfraError> {
        if authorization_code.trim().is_empty() {
            return Err(InfraError::OAuth("authorization code must not be empty".to_string()));
        }

        let response = self
            .oauth_client
            .exchange_authorization_code(OAuthCodeExchangeRequest {
                token_endpoint: self.config.token_endpoint.clone(),
                client_id: self.config.client_id.clone(),
                client_secret: self.config.client_secret.clone(),
                redirect_uri: self.config.redirect_uri.clone(),
                authorization_code: authorization_code.to_string(),
            })
            .await?;

        Ok(token_from_response(response))
    }
}

fn token_from_response(response: OAuthTokenResponse) -> Token {
    Token {
        access_token: response.access_token,
        refresh_token: response.refresh_token.unwrap_or_default(),
        expires_in: response.expires_in.max(0),
    }
}

/// Where the browser goes after the callback: the app origin carrying either
/// the three token parameters or an error flag.
pub fn session_redirect_url(
    app_origin: &str,
    outcome: &Result<Token, InfraError>,
) -> Result<String, InfraError> {
    let mut url = Url::parse(app_origin)
        .map_err(|error| InfraError::InvalidConfig(format!("invalid app origin: {error}")))?;
    {
        let mut query = url.query_pairs_mut();
        query.clear();
        match outcome {
            Ok(token) => {
                query
                    .append_pair("accessToken", &token.access_token)
                    .append_pair("refreshToken", &token.refresh_token)
                    .append_pair("expiresIn", &token.expires_in.to_string());
            }
            Err(_) => {
                query.append_pair("error", TOKEN_EXCHANGE_FAILED);
            }
        }
    }
    Ok(url.to_string())
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone)]
    pub enum FakeResponse {
        Success(OAuthTokenResponse),
        OAuthError(String),
    }

    impl Default for FakeResponse {
        fn default() -> Self {
            Self::Success(OAuthTokenResponse {
                access_token: "fake_access".to_string(),
                refresh_token: Some("fake_refresh".to_string()),
                expires_in: 3600,
            })
        }
    }

    #[derive(Debug, Default)]
    pub struct FakeOAuthHttpClient {
        exchange_response: Mutex<FakeResponse>,
        pub exchange_calls: AtomicUsize,
        pub last_request: Mutex<Option<OAuthCodeExchangeRequest>>,
    }

    impl FakeOAuthHttpClient {
        pub fn set_exchange_response(&self, response: FakeResponse) {
            let mut guard = self.exchange_response.lock().expect("exchange mutex poisoned");
            *guard = response;
        }

        pub fn calls(&self) -> usize {
            self.exchange_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OAuthHttpClient for FakeOAuthHttpClient {
        async fn exchange_authorization_code(
            &self,
            request: OAuthCodeExchangeRequest,
        ) -> Result<OAuthTokenResponse, InfraError> {
            self.exchange_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().expect("request mutex poisoned") = Some(request);
            match self
                .exchange_response
                .lock()
                .expect("exchange mutex poisoned")
                .clone()
            {
                FakeResponse::Success(value) => Ok(value),
                FakeResponse::OAuthError(message) => Err(InfraError::OAuth(message)),
            }
        }
    }

    pub fn test_config() -> OAuthConfig {
        OAuthConfig::new(
            "client-id",
            "client-secret",
            "http://127.0.0.1:3000/api/auth/spotify/callback",
        )
    }
}
