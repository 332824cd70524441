use crate::domain::models::{PlayerView, Track, format_track_time, percent_of};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::spotify_client::{
    CommandStatus, CurrentlyPlaying, CurrentlyPlayingPayload, PlayerCommand, SpotifyPlayerClient,
};
use crate::infrastructure::token_store::TokenStore;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

pub const IDLE_MESSAGE: &str = "open spotify, play any song once, then come back here";
pub const UNAVAILABLE_MESSAGE: &str = "spotify playback unavailable";
pub const NO_ACTIVE_DEVICE_MESSAGE: &str =
    "no active device. open spotify app and start playback once.";
pub const REJECTED_MESSAGE: &str = "spotify rejected this action";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    NotLoggedIn,
    Idle,
    Unavailable,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    NotLoggedIn,
    Accepted,
    NoActiveDevice,
    Rejected,
}

impl CommandOutcome {
    /// A successful command is followed by a short-delay resync.
    pub fn needs_resync(self) -> bool {
        self == Self::Accepted
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlayerSnapshot {
    pub track: Option<Track>,
    pub is_playing: bool,
    pub progress_seconds: u32,
    pub progress_display: String,
    pub duration_display: Option<String>,
    pub progress_percent: f64,
    pub volume: u8,
    pub message: Option<String>,
}

impl From<PlayerView> for PlayerSnapshot {
    fn from(view: PlayerView) -> Self {
        let duration = view.track.as_ref().map(|track| track.duration_seconds);
        Self {
            progress_display: format_track_time(view.progress_seconds),
            duration_display: duration.map(format_track_time),
            progress_percent: duration
                .map(|total| percent_of(view.progress_seconds, total))
                .unwrap_or(0.0),
            track: view.track,
            is_playing: view.is_playing,
            progress_seconds: view.progress_seconds,
            volume: view.volume,
            message: view.message,
        }
    }
}

/// Mirrors and drives the user's active Spotify device. The view lock is
/// only held between network calls, so a poll and a command can interleave;
/// the later write wins and the next poll settles it. Results of calls that
/// started before a [`reset`] are dropped.
///
/// [`reset`]: PlaybackController::reset
pub struct PlaybackController<S, C>
where
    S: TokenStore + ?Sized,
    C: SpotifyPlayerClient + ?Sized,
{
    token_store: Arc<S>,
    client: Arc<C>,
    placeholder_cover_url: String,
    default_volume: u8,
    view: Mutex<PlayerView>,
    generation: AtomicU64,
}

impl<S, C> PlaybackController<S, C>
where
    S: TokenStore + ?Sized,
    C: SpotifyPlayerClient + ?Sized,
{
    pub fn new(
        token_store: Arc<S>,
        client: Arc<C>,
        placeholder_cover_url: impl Into<String>,
        default_volume: u8,
    ) -> Self {
        Self {
            token_store,
            client,
            placeholder_cover_url: placeholder_cover_url.into(),
            default_volume: default_volume.min(100),
            view: Mutex::new(PlayerView::with_volume(default_volume)),
            generation: AtomicU64::new(0),
        }
    }

    pub fn view(&self) -> Result<PlayerView, InfraError> {
        Ok(self.lock_view()?.clone())
    }

    pub fn snapshot(&self) -> Result<PlayerSnapshot, InfraError> {
        Ok(self.view()?.into())
    }

    pub fn reset(&self) -> Result<(), InfraError> {
        let mut view = self.lock_view()?;
        self.generation.fetch_add(1, Ordering::SeqCst);
        *view = PlayerView::with_volume(self.default_volume);
        Ok(())
    }

    pub async fn fetch_current(&self) -> Result<FetchOutcome, InfraError> {
        let generation = self.generation.load(Ordering::SeqCst);
        let Some(access_token) = self.token_store.access_token()? else {
            let mut view = self.lock_view()?;
            view.track = None;
            view.is_playing = false;
            view.progress_seconds = 0;
            return Ok(FetchOutcome::NotLoggedIn);
        };

        let response = match self.client.currently_playing(&access_token).await {
            Ok(response) => response,
            Err(error) => {
                warn!(command = "fetch_current", %error, "currently-playing request failed");
                CurrentlyPlaying::Unavailable { status: 0 }
            }
        };

        let Some(mut view) = self.lock_view_since(generation)? else {
            debug!(command = "fetch_current", "dropping poll result from before logout");
            return Ok(FetchOutcome::NotLoggedIn);
        };
        match response {
            CurrentlyPlaying::Idle => {
                view.track = None;
                view.message = Some(IDLE_MESSAGE.to_string());
                Ok(FetchOutcome::Idle)
            }
            CurrentlyPlaying::Unavailable { status } => {
                debug!(command = "fetch_current", status, "playback unavailable");
                view.track = None;
                view.message = Some(UNAVAILABLE_MESSAGE.to_string());
                Ok(FetchOutcome::Unavailable)
            }
            CurrentlyPlaying::Playing(payload) => {
                let is_playing = payload.is_playing;
                let progress_seconds = millis_to_seconds(payload.progress_ms.unwrap_or(0));
                match self.track_from_payload(payload) {
                    Some(track) => {
                        view.track = Some(track);
                        view.is_playing = is_playing;
                        view.progress_seconds = progress_seconds;
                        view.message = None;
                        Ok(FetchOutcome::Playing)
                    }
                    None => {
                        view.track = None;
                        view.message = Some(IDLE_MESSAGE.to_string());
                        Ok(FetchOutcome::Idle)
                    }
                }
            }
        }
    }

    pub async fn play_pause(&self) -> Result<CommandOutcome, InfraError> {
        let generation = self.generation.load(Ordering::SeqCst);
        let (has_track, is_playing) = {
            let view = self.lock_view()?;
            (view.track.is_some(), view.is_playing)
        };

        if !has_track {
            return self.command(PlayerCommand::Play).await;
        }

        let (command, playing_after) = if is_playing {
            (PlayerCommand::Pause, false)
        } else {
            (PlayerCommand::Play, true)
        };
        let outcome = self.command(command).await?;
        if outcome == CommandOutcome::Accepted {
            if let Some(mut view) = self.lock_view_since(generation)? {
                view.is_playing = playing_after;
            }
        }
        Ok(outcome)
    }

    pub async fn next(&self) -> Result<CommandOutcome, InfraError> {
        self.command(PlayerCommand::Next).await
    }

    pub async fn previous(&self) -> Result<CommandOutcome, InfraError> {
        self.command(PlayerCommand::Previous).await
    }

    /// Records the level locally and fires the request without looking at
    /// the answer beyond logging it.
    pub async fn set_volume(&self, percent: u8) -> Result<u8, InfraError> {
        let percent = percent.min(100);
        self.lock_view()?.volume = percent;

        let Some(access_token) = self.token_store.access_token()? else {
            return Ok(percent);
        };
        match self
            .client
            .send_command(&access_token, PlayerCommand::Volume(percent))
            .await
        {
            Ok(CommandStatus::Accepted) => {}
            Ok(status) => debug!(command = "set_volume", ?status, "volume change not accepted"),
            Err(error) => warn!(command = "set_volume", %error, "volume request failed"),
        }
        Ok(percent)
    }

    /// Cosmetic one-second progress step between polls.
    pub fn tick_progress(&self) -> Result<(), InfraError> {
        let mut view = self.lock_view()?;
        if !view.is_playing {
            return Ok(());
        }
        let Some(duration) = view.track.as_ref().map(|track| track.duration_seconds) else {
            return Ok(());
        };
        if view.progress_seconds < duration {
            view.progress_seconds += 1;
        }
        Ok(())
    }

    async fn command(&self, command: PlayerCommand) -> Result<CommandOutcome, InfraError> {
        let generation = self.generation.load(Ordering::SeqCst);
        let Some(access_token) = self.token_store.access_token()? else {
            return Ok(CommandOutcome::NotLoggedIn);
        };

        let outcome = match self.client.send_command(&access_token, command).await {
            Ok(CommandStatus::Accepted) => CommandOutcome::Accepted,
            Ok(CommandStatus::NoActiveDevice) => CommandOutcome::NoActiveDevice,
            Ok(CommandStatus::Rejected { status }) => {
                debug!(command = command.endpoint(), status, "spotify rejected command");
                CommandOutcome::Rejected
            }
            Err(error) => {
                warn!(command = command.endpoint(), %error, "player command failed");
                CommandOutcome::Rejected
            }
        };

        let Some(mut view) = self.lock_view_since(generation)? else {
            return Ok(outcome);
        };
        view.message = match outcome {
            CommandOutcome::NoActiveDevice => Some(NO_ACTIVE_DEVICE_MESSAGE.to_string()),
            CommandOutcome::Rejected => Some(REJECTED_MESSAGE.to_string()),
            CommandOutcome::Accepted | CommandOutcome::NotLoggedIn => None,
        };
        Ok(outcome)
    }

    fn track_from_payload(&self, payload: CurrentlyPlayingPayload) -> Option<Track> {
        let item = payload.item?;
        let (album, cover_url) = match item.album {
            Some(album) => {
                let cover = album.images.into_iter().next().map(|image| image.url);
                (album.name, cover)
            }
            None => (String::new(), None),
        };
        Some(Track {
            id: item.id.unwrap_or_default(),
            title: item.name,
            artist: item
                .artists
                .iter()
                .map(|artist| artist.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            album,
            cover_url: cover_url
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| self.placeholder_cover_url.clone()),
            duration_seconds: millis_to_seconds(item.duration_ms),
        })
    }

    /// The view guard, unless a reset happened after `generation` was read.
    fn lock_view_since(
        &self,
        generation: u64,
    ) -> Result<Option<MutexGuard<'_, PlayerView>>, InfraError> {
        let view = self.lock_view()?;
        if self.generation.load(Ordering::SeqCst) != generation {
            return Ok(None);
        }
        Ok(Some(view))
    }

    fn lock_view(&self) -> Result<MutexGuard<'_, PlayerView>, InfraError> {
        self.view
            .lock()
            .map_err(|error| InfraError::Spotify(format!("player view lock poisoned: {error}")))
    }
}

fn millis_to_seconds(millis: u64) -> u32 {
    u32::try_from(millis / 1000).unwrap_or(u32::MAX)
}
