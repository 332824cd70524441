use crate::application::bootstrap::BootstrapResult;
use crate::application::oauth::{OAuthConfig, OAuthManager, session_redirect_url};
use crate::application::playback::{
    CommandOutcome, FetchOutcome, PlaybackController, PlayerSnapshot,
};
use crate::application::tasks::{TaskListStore, TaskListSummary};
use crate::application::timer::{TimerCompletion, TimerEngine, TimerSnapshot};
use crate::domain::models::{TimerMode, Todo, TokenKey};
use crate::infrastructure::clock::{Clock, SystemClock};
use crate::infrastructure::config::{
    AppConfig, TokenStoreKind, load_app_config, load_spotify_credentials_from_env,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::notifier::{DesktopNotifier, Notifier};
use crate::infrastructure::oauth_client::{OAuthHttpClient, ReqwestOAuthClient};
use crate::infrastructure::spotify_client::{ReqwestSpotifyClient, SpotifyPlayerClient};
use crate::infrastructure::token_store::{
    FileTokenStore, InMemoryTokenStore, KeyringTokenStore, TokenStore,
};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const TOKEN_FILE_NAME: &str = "tokens.json";
pub const SPOTIFY_CALLBACK_PATH: &str = "/api/auth/spotify/callback";

pub type SharedPlayback = PlaybackController<dyn TokenStore, dyn SpotifyPlayerClient>;

/// Services the application runs on. Production wiring comes from
/// [`AppState::new`]; tests hand in fakes.
pub struct AppServices {
    pub oauth_config: Option<OAuthConfig>,
    pub oauth_client: Arc<dyn OAuthHttpClient>,
    pub token_store: Arc<dyn TokenStore>,
    pub spotify_client: Arc<dyn SpotifyPlayerClient>,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn Notifier>,
}

pub struct AppState {
    config: AppConfig,
    oauth: Option<OAuthManager<dyn OAuthHttpClient>>,
    token_store: Arc<dyn TokenStore>,
    playback: Arc<SharedPlayback>,
    notifier: Arc<dyn Notifier>,
    timer: Mutex<TimerEngine>,
    tasks: Mutex<TaskListStore>,
}

impl AppState {
    pub fn new(bootstrap: &BootstrapResult) -> Result<Self, InfraError> {
        let config = load_app_config(&bootstrap.config_dir)?;
        let timeout = Duration::from_secs(config.playback.request_timeout_seconds.max(1));

        let oauth_config = match load_spotify_credentials_from_env() {
            Ok(credentials) => Some(OAuthConfig::from(credentials)),
            Err(InfraError::InvalidConfig(message)) => {
                warn!(command = "startup", %message, "spotify login disabled");
                None
            }
            Err(error) => return Err(error),
        };

        let services = AppServices {
            oauth_config,
            oauth_client: Arc::new(ReqwestOAuthClient::with_timeout(timeout)?),
            token_store: token_store_for(config.token_store, &bootstrap.state_dir),
            spotify_client: Arc::new(ReqwestSpotifyClient::new(timeout)?),
            clock: Arc::new(SystemClock),
            notifier: Arc::new(DesktopNotifier::new(
                config.app_name.clone(),
                config.notifications.enabled,
            )),
        };

        Ok(Self::with_services(config, services))
    }

    pub fn with_services(config: AppConfig, services: AppServices) -> Self {
        let oauth = services
            .oauth_config
            .map(|oauth_config| OAuthManager::new(oauth_config, services.oauth_client));
        let playback = Arc::new(PlaybackController::new(
            Arc::clone(&services.token_store),
            services.spotify_client,
            config.playback.placeholder_cover_url.clone(),
            config.playback.default_volume,
        ));
        let timer = TimerEngine::new(
            config.timer_durations(),
            Arc::clone(&services.clock),
            Arc::clone(&services.notifier),
        );
        let tasks = TaskListStore::seeded(services.clock);

        Self {
            config,
            oauth,
            token_store: services.token_store,
            playback,
            notifier: services.notifier,
            timer: Mutex::new(timer),
            tasks: Mutex::new(tasks),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        error!(command, %error, "command failed");
        error.to_string()
    }

    fn oauth(&self) -> Result<&OAuthManager<dyn OAuthHttpClient>, InfraError> {
        self.oauth.as_ref().ok_or_else(|| {
            InfraError::InvalidConfig(
                "spotify login is not configured (set SPOTIFY_CLIENT_ID, SPOTIFY_CLIENT_SECRET, SPOTIFY_REDIRECT_URI)"
                    .to_string(),
            )
        })
    }
}

fn token_store_for(kind: TokenStoreKind, state_dir: &Path) -> Arc<dyn TokenStore> {
    match kind {
        TokenStoreKind::Keyring => Arc::new(KeyringTokenStore::default()),
        TokenStoreKind::File => Arc::new(FileTokenStore::new(state_dir.join(TOKEN_FILE_NAME))),
        TokenStoreKind::Memory => Arc::new(InMemoryTokenStore::default()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    MissingCode,
    Redirect(String),
}

#[derive(Debug, Clone, Default)]
pub struct SessionParams {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionStatusResponse {
    pub logged_in: bool,
    pub auth_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCapture {
    Stored,
    Status(SessionStatusResponse),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaskListResponse {
    pub tasks: Vec<Todo>,
    #[serde(flatten)]
    pub summary: TaskListSummary,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlayerCommandResponse {
    pub accepted: bool,
    pub player: PlayerSnapshot,
}

pub fn authorize_redirect_impl(state: &AppState) -> Result<String, InfraError> {
    let url = state.oauth()?.build_authorization_url()?;
    info!(command = "authorize_redirect", "redirecting to spotify consent page");
    Ok(url)
}

/// A missing code answers without touching the token endpoint. An exchange
/// failure still redirects, carrying an error flag instead of tokens.
pub async fn spotify_callback_impl(
    state: &AppState,
    code: Option<String>,
) -> Result<CallbackOutcome, InfraError> {
    let Some(code) = code
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
    else {
        warn!(command = "spotify_callback", "callback without authorization code");
        return Ok(CallbackOutcome::MissingCode);
    };

    let outcome = state.oauth()?.exchange_code(&code).await;
    match &outcome {
        Ok(token) => info!(
            command = "spotify_callback",
            expires_in = token.expires_in,
            "exchanged authorization code"
        ),
        Err(error) => error!(command = "spotify_callback", %error, "token exchange failed"),
    }

    let redirect = session_redirect_url(&state.config.app_origin, &outcome)?;
    Ok(CallbackOutcome::Redirect(redirect))
}

/// The dashboard's `/callback` hand-off: forwards a non-blank code to the
/// backend callback route.
pub fn forward_callback_impl(code: Option<String>) -> Option<String> {
    let code = code.filter(|value| !value.trim().is_empty())?;
    let encoded: String = url::form_urlencoded::byte_serialize(code.as_bytes()).collect();
    Some(format!("{SPOTIFY_CALLBACK_PATH}?code={encoded}"))
}

pub fn capture_session_impl(
    state: &AppState,
    params: SessionParams,
) -> Result<SessionCapture, InfraError> {
    let access_token = params
        .access_token
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    if let Some(access_token) = access_token {
        state.token_store.set(TokenKey::AccessToken, access_token)?;
        state.token_store.set(
            TokenKey::RefreshToken,
            params.refresh_token.as_deref().unwrap_or_default(),
        )?;
        if let Some(expires_in) = params.expires_in.as_deref() {
            state.token_store.set(TokenKey::ExpiresIn, expires_in)?;
        }
        info!(command = "capture_session", "stored spotify session");
        return Ok(SessionCapture::Stored);
    }

    Ok(SessionCapture::Status(SessionStatusResponse {
        logged_in: state.token_store.access_token()?.is_some(),
        auth_error: params.error.filter(|value| !value.trim().is_empty()),
    }))
}

pub fn session_status_impl(state: &AppState) -> Result<SessionStatusResponse, InfraError> {
    Ok(SessionStatusResponse {
        logged_in: state.token_store.access_token()?.is_some(),
        auth_error: None,
    })
}

pub fn logout_impl(state: &AppState) -> Result<SessionStatusResponse, InfraError> {
    state.token_store.clear()?;
    state.playback.reset()?;
    info!(command = "logout", "cleared spotify session");
    session_status_impl(state)
}

pub fn get_timer_state_impl(state: &AppState) -> Result<TimerSnapshot, InfraError> {
    Ok(lock_timer(state)?.snapshot())
}

pub fn toggle_timer_impl(state: &AppState) -> Result<TimerSnapshot, InfraError> {
    let mut timer = lock_timer(state)?;
    timer.toggle();
    let snapshot = timer.snapshot();
    info!(
        command = "toggle_timer",
        running = snapshot.is_running,
        time_left = snapshot.time_left_seconds,
        "timer toggled"
    );
    Ok(snapshot)
}

pub fn reset_timer_impl(state: &AppState) -> Result<TimerSnapshot, InfraError> {
    let mut timer = lock_timer(state)?;
    timer.reset_timer();
    info!(command = "reset_timer", mode = %timer.state().mode, "timer reset");
    Ok(timer.snapshot())
}

pub fn switch_timer_mode_impl(state: &AppState, mode: String) -> Result<TimerSnapshot, InfraError> {
    let mode = mode.parse::<TimerMode>().map_err(InfraError::InvalidInput)?;
    let mut timer = lock_timer(state)?;
    timer.switch_mode(mode);
    info!(command = "switch_timer_mode", %mode, "timer mode switched");
    Ok(timer.snapshot())
}

pub fn advance_timer_impl(state: &AppState) -> Result<Option<TimerCompletion>, InfraError> {
    let completion = lock_timer(state)?.advance();
    if let Some(notification) = completion.and_then(|done| done.notification) {
        state.notifier.notify(notification.title, notification.body);
    }
    Ok(completion)
}

pub fn list_tasks_impl(state: &AppState) -> Result<TaskListResponse, InfraError> {
    let tasks = lock_tasks(state)?;
    Ok(task_list_response(&tasks))
}

pub fn add_task_impl(state: &AppState, text: String) -> Result<TaskListResponse, InfraError> {
    let mut tasks = lock_tasks(state)?;
    match tasks.add(&text) {
        Some(todo) => info!(command = "add_task", task_id = %todo.id, "created task"),
        None => info!(command = "add_task", "ignored blank task"),
    }
    Ok(task_list_response(&tasks))
}

pub fn toggle_task_impl(state: &AppState, task_id: String) -> Result<TaskListResponse, InfraError> {
    let mut tasks = lock_tasks(state)?;
    let todo = tasks
        .toggle(task_id.trim())
        .ok_or_else(|| InfraError::NotFound(format!("task not found: {}", task_id.trim())))?;
    info!(command = "toggle_task", task_id = %todo.id, completed = todo.completed, "toggled task");
    Ok(task_list_response(&tasks))
}

pub fn delete_task_impl(state: &AppState, task_id: String) -> Result<TaskListResponse, InfraError> {
    let task_id = task_id.trim();
    let mut tasks = lock_tasks(state)?;
    if !tasks.remove(task_id) {
        return Err(InfraError::NotFound(format!("task not found: {task_id}")));
    }
    info!(command = "delete_task", task_id, "deleted task");
    Ok(task_list_response(&tasks))
}

pub fn get_player_impl(state: &AppState) -> Result<PlayerSnapshot, InfraError> {
    state.playback.snapshot()
}

pub async fn refresh_player_impl(state: &AppState) -> Result<PlayerSnapshot, InfraError> {
    let outcome = state.playback.fetch_current().await?;
    if outcome != FetchOutcome::NotLoggedIn {
        debug!(command = "refresh_player", ?outcome, "polled current playback");
    }
    state.playback.snapshot()
}

pub fn tick_player_progress_impl(state: &AppState) -> Result<(), InfraError> {
    state.playback.tick_progress()
}

pub async fn play_pause_impl(state: &AppState) -> Result<PlayerCommandResponse, InfraError> {
    let outcome = state.playback.play_pause().await?;
    command_response(state, "play_pause", outcome)
}

pub async fn next_track_impl(state: &AppState) -> Result<PlayerCommandResponse, InfraError> {
    let outcome = state.playback.next().await?;
    command_response(state, "next_track", outcome)
}

pub async fn previous_track_impl(state: &AppState) -> Result<PlayerCommandResponse, InfraError> {
    let outcome = state.playback.previous().await?;
    command_response(state, "previous_track", outcome)
}

pub async fn set_volume_impl(state: &AppState, percent: u32) -> Result<PlayerSnapshot, InfraError> {
    if percent > 100 {
        return Err(InfraError::InvalidInput(format!(
            "volume must be between 0 and 100, got {percent}"
        )));
    }
    let applied = state.playback.set_volume(percent as u8).await?;
    info!(command = "set_volume", volume = applied, "volume requested");
    state.playback.snapshot()
}

fn command_response(
    state: &AppState,
    command: &str,
    outcome: CommandOutcome,
) -> Result<PlayerCommandResponse, InfraError> {
    info!(command, ?outcome, "player command finished");
    if outcome.needs_resync() {
        schedule_resync(
            Arc::clone(&state.playback),
            Duration::from_millis(state.config.playback.resync_delay_millis),
        );
    }
    Ok(PlayerCommandResponse {
        accepted: outcome == CommandOutcome::Accepted,
        player: state.playback.snapshot()?,
    })
}

fn schedule_resync(playback: Arc<SharedPlayback>, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Err(error) = playback.fetch_current().await {
            warn!(command = "resync_player", %error, "resync after command failed");
        }
    });
}

fn task_list_response(tasks: &TaskListStore) -> TaskListResponse {
    TaskListResponse {
        tasks: tasks.list().to_vec(),
        summary: tasks.summary(),
    }
}

fn lock_timer(state: &AppState) -> Result<MutexGuard<'_, TimerEngine>, InfraError> {
    state
        .timer
        .lock()
        .map_err(|error| InfraError::InvalidConfig(format!("timer lock poisoned: {error}")))
}

fn lock_tasks(state: &AppState) -> Result<MutexGuard<'_, TaskListStore>, InfraError> {
    state
        .tasks
        .lock()
        .map_err(|error| InfraError::InvalidConfig(format!("task list lock poisoned: {error}")))
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::application::oauth::testing::{FakeOAuthHttpClient, test_config};
    use crate::application::playback::testing::ScriptedSpotifyClient;
    use crate::domain::models::NotificationPermission;
    use crate::infrastructure::clock::testing::ManualClock;
    use crate::infrastructure::notifier::testing::RecordingNotifier;

    pub struct TestHarness {
        pub state: Arc<AppState>,
        pub oauth_client: Arc<FakeOAuthHttpClient>,
        pub token_store: Arc<InMemoryTokenStore>,
        pub spotify_client: Arc<ScriptedSpotifyClient>,
        pub clock: Arc<ManualClock>,
        pub notifier: Arc<RecordingNotifier>,
    }

    impl TestHarness {
        pub fn new() -> Self {
            Self::build(true)
        }

        pub fn without_oauth() -> Self {
            Self::build(false)
        }

        fn build(with_oauth: bool) -> Self {
            let oauth_client = Arc::new(FakeOAuthHttpClient::default());
            let token_store = Arc::new(InMemoryTokenStore::default());
            let spotify_client = Arc::new(ScriptedSpotifyClient::default());
            let clock = Arc::new(ManualClock::default());
            let notifier = Arc::new(RecordingNotifier::new(NotificationPermission::Granted));

            let mut config = AppConfig::default();
            config.token_store = TokenStoreKind::Memory;
            config.playback.resync_delay_millis = 0;

            let state = AppState::with_services(
                config,
                AppServices {
                    oauth_config: with_oauth.then(test_config),
                    oauth_client: Arc::clone(&oauth_client) as Arc<dyn OAuthHttpClient>,
                    token_store: Arc::clone(&token_store) as Arc<dyn TokenStore>,
                    spotify_client: Arc::clone(&spotify_client) as Arc<dyn SpotifyPlayerClient>,
                    clock: Arc::clone(&clock) as Arc<dyn Clock>,
                    notifier: Arc::clone(&notifier) as Arc<dyn Notifier>,
                },
            );

            Self {
                state: Arc::new(state),
                oauth_client,
                token_store,
                spotify_client,
                clock,
                notifier,
            }
        }

        pub fn log_in(&self) {
            self.token_store
                .set(TokenKey::AccessToken, "access-1")
                .expect("store access token");
        }
    }
}
