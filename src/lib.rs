mod application;
mod domain;
mod infrastructure;

use application::bootstrap::bootstrap_workspace;
use application::commands::{
    AppState, CallbackOutcome, PlayerCommandResponse, SessionCapture, SessionParams,
    SessionStatusResponse, TaskListResponse, add_task_impl, authorize_redirect_impl,
    capture_session_impl, delete_task_impl, forward_callback_impl, get_player_impl,
    get_timer_state_impl, list_tasks_impl, logout_impl, next_track_impl, play_pause_impl,
    previous_track_impl, refresh_player_impl, reset_timer_impl, session_status_impl,
    set_volume_impl, spotify_callback_impl, switch_timer_mode_impl, toggle_task_impl,
    toggle_timer_impl,
};
use application::playback::PlayerSnapshot;
use application::scheduler::BackgroundTasks;
use application::timer::TimerSnapshot;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post, put};
use infrastructure::error::InfraError;
use infrastructure::logging::init_logging;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

const HOME_ENV: &str = "POMOPLAY_HOME";
const MISSING_CODE_BODY: &str = "no code from spotify";
const PLACEHOLDER_COVER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="300" height="300" viewBox="0 0 300 300"><rect width="300" height="300" fill="#1f2937"/><circle cx="150" cy="150" r="90" fill="#111827"/><circle cx="150" cy="150" r="24" fill="#1db954"/></svg>"##;

type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

struct CommandError {
    status: StatusCode,
    message: String,
}

impl CommandError {
    fn from_infra(state: &AppState, command: &str, error: InfraError) -> Self {
        let status = match &error {
            InfraError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            InfraError::NotFound(_) => StatusCode::NOT_FOUND,
            InfraError::InvalidConfig(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: state.command_error(command, &error),
        }
    }
}

impl IntoResponse for CommandError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

type CommandResult<T> = Result<T, CommandError>;

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionQuery {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CodeQuery {
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewTaskRequest {
    text: String,
}

async fn session_root(
    State(state): State<SharedState>,
    Query(query): Query<SessionQuery>,
) -> CommandResult<Response> {
    let params = SessionParams {
        access_token: query.access_token,
        refresh_token: query.refresh_token,
        expires_in: query.expires_in,
        error: query.error,
    };
    match capture_session_impl(&state, params)
        .map_err(|error| CommandError::from_infra(&state, "capture_session", error))?
    {
        SessionCapture::Stored => Ok(found("/")),
        SessionCapture::Status(status) => Ok(Json(status).into_response()),
    }
}

async fn forward_callback(Query(query): Query<CodeQuery>) -> Response {
    match forward_callback_impl(query.code) {
        Some(location) => found(&location),
        None => (StatusCode::BAD_REQUEST, MISSING_CODE_BODY).into_response(),
    }
}

async fn spotify_login(State(state): State<SharedState>) -> CommandResult<Response> {
    let url = authorize_redirect_impl(&state)
        .map_err(|error| CommandError::from_infra(&state, "authorize_redirect", error))?;
    Ok(found(&url))
}

async fn spotify_callback(
    State(state): State<SharedState>,
    Query(query): Query<CodeQuery>,
) -> CommandResult<Response> {
    match spotify_callback_impl(&state, query.code)
        .await
        .map_err(|error| CommandError::from_infra(&state, "spotify_callback", error))?
    {
        CallbackOutcome::MissingCode => Ok(Json(ErrorBody {
            error: "missing code".to_string(),
        })
        .into_response()),
        CallbackOutcome::Redirect(url) => Ok(found(&url)),
    }
}

async fn session_status(
    State(state): State<SharedState>,
) -> CommandResult<Json<SessionStatusResponse>> {
    session_status_impl(&state)
        .map(Json)
        .map_err(|error| CommandError::from_infra(&state, "session_status", error))
}

async fn logout(State(state): State<SharedState>) -> CommandResult<Json<SessionStatusResponse>> {
    logout_impl(&state)
        .map(Json)
        .map_err(|error| CommandError::from_infra(&state, "logout", error))
}

async fn get_timer_state(State(state): State<SharedState>) -> CommandResult<Json<TimerSnapshot>> {
    get_timer_state_impl(&state)
        .map(Json)
        .map_err(|error| CommandError::from_infra(&state, "get_timer_state", error))
}

async fn toggle_timer(State(state): State<SharedState>) -> CommandResult<Json<TimerSnapshot>> {
    toggle_timer_impl(&state)
        .map(Json)
        .map_err(|error| CommandError::from_infra(&state, "toggle_timer", error))
}

async fn reset_timer(State(state): State<SharedState>) -> CommandResult<Json<TimerSnapshot>> {
    reset_timer_impl(&state)
        .map(Json)
        .map_err(|error| CommandError::from_infra(&state, "reset_timer", error))
}

async fn switch_timer_mode(
    State(state): State<SharedState>,
    Path(mode): Path<String>,
) -> CommandResult<Json<TimerSnapshot>> {
    switch_timer_mode_impl(&state, mode)
        .map(Json)
        .map_err(|error| CommandError::from_infra(&state, "switch_timer_mode", error))
}

async fn list_tasks(State(state): State<SharedState>) -> CommandResult<Json<TaskListResponse>> {
    list_tasks_impl(&state)
        .map(Json)
        .map_err(|error| CommandError::from_infra(&state, "list_tasks", error))
}

async fn add_task(
    State(state): State<SharedState>,
    Json(request): Json<NewTaskRequest>,
) -> CommandResult<Json<TaskListResponse>> {
    add_task_impl(&state, request.text)
        .map(Json)
        .map_err(|error| CommandError::from_infra(&state, "add_task", error))
}

async fn toggle_task(
    State(state): State<SharedState>,
    Path(task_id): Path<String>,
) -> CommandResult<Json<TaskListResponse>> {
    toggle_task_impl(&state, task_id)
        .map(Json)
        .map_err(|error| CommandError::from_infra(&state, "toggle_task", error))
}

async fn delete_task(
    State(state): State<SharedState>,
    Path(task_id): Path<String>,
) -> CommandResult<Json<TaskListResponse>> {
    delete_task_impl(&state, task_id)
        .map(Json)
        .map_err(|error| CommandError::from_infra(&state, "delete_task", error))
}

async fn get_player(State(state): State<SharedState>) -> CommandResult<Json<PlayerSnapshot>> {
    get_player_impl(&state)
        .map(Json)
        .map_err(|error| CommandError::from_infra(&state, "get_player", error))
}

async fn refresh_player(State(state): State<SharedState>) -> CommandResult<Json<PlayerSnapshot>> {
    refresh_player_impl(&state)
        .await
        .map(Json)
        .map_err(|error| CommandError::from_infra(&state, "refresh_player", error))
}

async fn play_pause(
    State(state): State<SharedState>,
) -> CommandResult<Json<PlayerCommandResponse>> {
    play_pause_impl(&state)
        .await
        .map(Json)
        .map_err(|error| CommandError::from_infra(&state, "play_pause", error))
}

async fn next_track(
    State(state): State<SharedState>,
) -> CommandResult<Json<PlayerCommandResponse>> {
    next_track_impl(&state)
        .await
        .map(Json)
        .map_err(|error| CommandError::from_infra(&state, "next_track", error))
}

async fn previous_track(
    State(state): State<SharedState>,
) -> CommandResult<Json<PlayerCommandResponse>> {
    previous_track_impl(&state)
        .await
        .map(Json)
        .map_err(|error| CommandError::from_infra(&state, "previous_track", error))
}

async fn set_volume(
    State(state): State<SharedState>,
    Path(percent): Path<u32>,
) -> CommandResult<Json<PlayerSnapshot>> {
    set_volume_impl(&state, percent)
        .await
        .map(Json)
        .map_err(|error| CommandError::from_infra(&state, "set_volume", error))
}

async fn placeholder_cover() -> Response {
    (
        [(header::CONTENT_TYPE, "image/svg+xml")],
        PLACEHOLDER_COVER_SVG,
    )
        .into_response()
}

fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(session_root))
        .route("/callback", get(forward_callback))
        .route("/api/auth/spotify", get(spotify_login))
        .route("/api/auth/spotify/login", get(spotify_login))
        .route("/api/auth/spotify/callback", get(spotify_callback))
        .route("/api/session", get(session_status))
        .route("/api/session/logout", post(logout))
        .route("/api/timer", get(get_timer_state))
        .route("/api/timer/toggle", post(toggle_timer))
        .route("/api/timer/reset", post(reset_timer))
        .route("/api/timer/mode/:mode", post(switch_timer_mode))
        .route("/api/tasks", get(list_tasks).post(add_task))
        .route("/api/tasks/:id/toggle", post(toggle_task))
        .route("/api/tasks/:id", delete(delete_task))
        .route("/api/player", get(get_player))
        .route("/api/player/refresh", post(refresh_player))
        .route("/api/player/play-pause", post(play_pause))
        .route("/api/player/next", post(next_track))
        .route("/api/player/previous", post(previous_track))
        .route("/api/player/volume/:percent", put(set_volume))
        .route("/assets/placeholder-cover.svg", get(placeholder_cover))
        .with_state(state)
}

fn resolve_workspace_root() -> Result<PathBuf, InfraError> {
    match std::env::var(HOME_ENV) {
        Ok(value) if !value.trim().is_empty() => Ok(PathBuf::from(value.trim())),
        _ => Ok(std::env::current_dir()?),
    }
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(error) = result {
                tracing::warn!(command = "shutdown", %error, "ctrl-c handler failed");
            }
        }
        _ = cancel.cancelled() => {}
    }
    info!(command = "shutdown", "shutdown requested");
}

pub async fn run() -> Result<(), InfraError> {
    let workspace_root = resolve_workspace_root()?;
    let bootstrap = bootstrap_workspace(&workspace_root)?;
    let log_path = init_logging(&bootstrap.logs_dir)?;
    info!(
        command = "startup",
        workspace_root = %bootstrap.workspace_root.display(),
        log_path = %log_path.display(),
        "workspace ready"
    );

    let state = Arc::new(AppState::new(&bootstrap)?);
    let address = format!("{}:{}", state.config().bind_address, state.config().port);
    let listener = TcpListener::bind(&address).await?;
    info!(command = "startup", %address, "listening on http://{address}");

    let background = BackgroundTasks::spawn(Arc::clone(&state));
    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(background.cancellation_token()))
        .await;
    background.shutdown().await;
    served?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use application::commands::testing::TestHarness;
    use application::playback::testing::playing_payload;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use domain::models::TokenKey;
    use infrastructure::token_store::TokenStore;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app(harness: TestHarness) -> (Router, TestHarness) {
        (router(Arc::clone(&harness.state)), harness)
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        router.clone().oneshot(request).await.expect("response")
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn location(response: &Response) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .expect("location header")
            .to_string()
    }

    #[tokio::test]
    async fn login_redirects_to_spotify_consent() {
        let (router, _) = app(TestHarness::new());

        let response = send(&router, "GET", "/api/auth/spotify/login", None).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(location(&response).starts_with("https://accounts.spotify.com/authorize?"));
    }

    #[tokio::test]
    async fn login_without_credentials_is_unavailable() {
        let (router, _) = app(TestHarness::without_oauth());

        let response = send(&router, "GET", "/api/auth/spotify", None).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn callback_without_code_answers_missing_code() {
        let (router, rest) = app(TestHarness::new());

        let response = send(&router, "GET", "/api/auth/spotify/callback", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["error"], "missing code");
        assert_eq!(rest.oauth_client.calls(), 0);
    }

    #[tokio::test]
    async fn callback_then_root_capture_logs_in() {
        let (router, rest) = app(TestHarness::new());

        let response = send(&router, "GET", "/api/auth/spotify/callback?code=abc", None).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        let redirect = location(&response);
        assert!(redirect.contains("accessToken=fake_access"));

        let path_and_query = redirect.trim_start_matches("http://127.0.0.1:3000");
        let response = send(&router, "GET", path_and_query, None).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/");
        assert_eq!(
            rest.token_store.get(TokenKey::RefreshToken).expect("get"),
            Some("fake_refresh".to_string())
        );

        let response = send(&router, "GET", "/", None).await;
        assert_eq!(
            json_body(response).await,
            serde_json::json!({"logged_in": true, "auth_error": null})
        );
    }

    #[tokio::test]
    async fn dashboard_callback_forwards_or_rejects() {
        let (router, _) = app(TestHarness::new());

        let response = send(&router, "GET", "/callback?code=xyz", None).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/api/auth/spotify/callback?code=xyz");

        let response = send(&router, "GET", "/callback", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        assert_eq!(&bytes[..], MISSING_CODE_BODY.as_bytes());
    }

    #[tokio::test]
    async fn logout_clears_session() {
        let (router, rest) = app(TestHarness::new());
        rest.log_in();

        let response = send(&router, "POST", "/api/session/logout", None).await;

        assert_eq!(json_body(response).await["logged_in"], false);
        assert_eq!(rest.token_store.access_token().expect("read"), None);
    }

    #[tokio::test]
    async fn timer_routes_toggle_and_switch() {
        let (router, _) = app(TestHarness::new());

        let body = json_body(send(&router, "POST", "/api/timer/toggle", None).await).await;
        assert_eq!(body["is_running"], true);
        assert_eq!(body["display"], "25:00");

        let body = json_body(send(&router, "POST", "/api/timer/mode/break", None).await).await;
        assert_eq!(body["is_running"], false);
        assert_eq!(body["display"], "05:00");
        assert_eq!(body["label"], "Break Time");

        let response = send(&router, "POST", "/api/timer/mode/nap", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn task_routes_add_toggle_delete() {
        let (router, _) = app(TestHarness::new());

        let body = json_body(
            send(
                &router,
                "POST",
                "/api/tasks",
                Some(serde_json::json!({"text": "Ship it"})),
            )
            .await,
        )
        .await;
        assert_eq!(body["total_count"], 4);
        let id = body["tasks"][3]["id"].as_str().expect("id").to_string();

        let toggle_uri = format!("/api/tasks/{id}/toggle");
        let body = json_body(send(&router, "POST", &toggle_uri, None).await).await;
        assert_eq!(body["completed_count"], 2);

        let response = send(&router, "DELETE", &format!("/api/tasks/{id}"), None).await;
        assert_eq!(json_body(response).await["total_count"], 3);

        let response = send(&router, "DELETE", &format!("/api/tasks/{id}"), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn player_routes_reflect_spotify_state() {
        let (router, rest) = app(TestHarness::new());
        rest.log_in();
        rest.spotify_client.push_playback(Ok(playing_payload(true, 30_000)));

        let body = json_body(send(&router, "POST", "/api/player/refresh", None).await).await;
        assert_eq!(body["track"]["title"], "Midnight City");
        assert_eq!(body["progress_display"], "0:30");

        let body = json_body(send(&router, "PUT", "/api/player/volume/40", None).await).await;
        assert_eq!(body["volume"], 40);

        let response = send(&router, "PUT", "/api/player/volume/400", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn placeholder_cover_is_svg() {
        let (router, _) = app(TestHarness::new());

        let response = send(&router, "GET", "/assets/placeholder-cover.svg", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).expect("content type"),
            "image/svg+xml"
        );
    }
}
