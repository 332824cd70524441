use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use std::time::Duration;
use url::Url;

const PLAYER_API_BASE: &str = "https://api.spotify.com/v1/me/player/";

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct CurrentlyPlayingPayload {
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub item: Option<PlayingItemPayload>,
}

/// Tracks carry `album`; episodes do not, so every nested field defaults.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct PlayingItemPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistPayload>,
    #[serde(default)]
    pub album: Option<AlbumPayload>,
    #[serde(default)]
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ArtistPayload {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct AlbumPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub images: Vec<ImagePayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ImagePayload {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurrentlyPlaying {
    Idle,
    Playing(CurrentlyPlayingPayload),
    Unavailable { status: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Play,
    Pause,
    Next,
    Previous,
    Volume(u8),
}

impl PlayerCommand {
    pub fn method(self) -> Method {
        match self {
            Self::Play | Self::Pause | Self::Volume(_) => Method::PUT,
            Self::Next | Self::Previous => Method::POST,
        }
    }

    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Next => "next",
            Self::Previous => "previous",
            Self::Volume(_) => "volume",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Accepted,
    NoActiveDevice,
    Rejected { status: u16 },
}

#[async_trait]
pub trait SpotifyPlayerClient: Send + Sync {
    async fn currently_playing(&self, access_token: &str) -> Result<CurrentlyPlaying, InfraError>;

    async fn send_command(
        &self,
        access_token: &str,
        command: PlayerCommand,
    ) -> Result<CommandStatus, InfraError>;
}

pub fn classify_currently_playing(
    status: StatusCode,
    body: &str,
) -> Result<CurrentlyPlaying, InfraError> {
    if status == StatusCode::NO_CONTENT {
        return Ok(CurrentlyPlaying::Idle);
    }
    if !status.is_success() {
        return Ok(CurrentlyPlaying::Unavailable {
            status: status.as_u16(),
        });
    }
    if body.trim().is_empty() {
        return Ok(CurrentlyPlaying::Idle);
    }

    let payload: CurrentlyPlayingPayload = serde_json::from_str(body).map_err(|error| {
        InfraError::Spotify(format!("invalid currently-playing payload: {error}"))
    })?;
    if payload.item.is_none() {
        return Ok(CurrentlyPlaying::Idle);
    }
    Ok(CurrentlyPlaying::Playing(payload))
}

pub fn classify_command_status(status: StatusCode) -> CommandStatus {
    if status == StatusCode::NOT_FOUND {
        CommandStatus::NoActiveDevice
    } else if status.is_success() {
        CommandStatus::Accepted
    } else {
        CommandStatus::Rejected {
            status: status.as_u16(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestSpotifyClient {
    client: Client,
    api_base: Url,
}

impl ReqwestSpotifyClient {
    pub fn new(timeout: Duration) -> Result<Self, InfraError> {
        Self::with_api_base(PLAYER_API_BASE, timeout)
    }

    pub fn with_api_base(api_base: &str, timeout: Duration) -> Result<Self, InfraError> {
        let api_base = Url::parse(api_base)
            .map_err(|error| InfraError::Spotify(format!("invalid player api base url: {error}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| InfraError::Spotify(format!("failed to build http client: {error}")))?;
        Ok(Self { client, api_base })
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::Spotify(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url, InfraError> {
        self.api_base
            .join(path)
            .map_err(|error| {
                InfraError::Spotify(format!("invalid player endpoint {path}: {error}"))
            })
    }

    fn command_url(&self, command: PlayerCommand) -> Result<Url, InfraError> {
        let mut url = self.endpoint(command.endpoint())?;
        if let PlayerCommand::Volume(percent) = command {
            url.query_pairs_mut()
                .append_pair("volume_percent", &percent.min(100).to_string());
        }
        Ok(url)
    }
}

#[async_trait]
impl SpotifyPlayerClient for ReqwestSpotifyClient {
    async fn currently_playing(&self, access_token: &str) -> Result<CurrentlyPlaying, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let response = self
            .client
            .get(self.endpoint("currently-playing")?)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| {
                InfraError::Spotify(format!("network error while reading playback: {error}"))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| {
                InfraError::Spotify(format!("failed reading playback response: {error}"))
            })?;

        classify_currently_playing(status, &body)
    }

    async fn send_command(
        &self,
        access_token: &str,
        command: PlayerCommand,
    ) -> Result<CommandStatus, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let response = self
            .client
            .request(command.method(), self.command_url(command)?)
            .bearer_auth(access_token)
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(|error| {
                InfraError::Spotify(format!(
                    "network error while sending {}: {error}",
                    command.endpoint()
                ))
            })?;

        Ok(classify_command_status(response.status()))
    }
}
