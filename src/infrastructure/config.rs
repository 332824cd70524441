use crate::domain::models::TimerDurations;
use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const DEFAULT_APP_ORIGIN: &str = "http://127.0.0.1:3000";

pub const CLIENT_ID_KEYS: [&str; 2] = ["POMOPLAY_SPOTIFY_CLIENT_ID", "SPOTIFY_CLIENT_ID"];
pub const CLIENT_SECRET_KEYS: [&str; 2] =
    ["POMOPLAY_SPOTIFY_CLIENT_SECRET", "SPOTIFY_CLIENT_SECRET"];
pub const REDIRECT_URI_KEYS: [&str; 2] = ["POMOPLAY_SPOTIFY_REDIRECT_URI", "SPOTIFY_REDIRECT_URI"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenStoreKind {
    Keyring,
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackSettings {
    pub poll_interval_seconds: u64,
    pub resync_delay_millis: u64,
    pub default_volume: u8,
    pub request_timeout_seconds: u64,
    pub placeholder_cover_url: String,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 5,
            resync_delay_millis: 400,
            default_volume: 70,
            request_timeout_seconds: 10,
            placeholder_cover_url: "/assets/placeholder-cover.svg".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerSettings {
    pub work_seconds: u32,
    pub break_seconds: u32,
}

impl Default for TimerSettings {
    fn default() -> Self {
        let durations = TimerDurations::default();
        Self {
            work_seconds: durations.work_seconds,
            break_seconds: durations.break_seconds,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub enabled: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub schema: u8,
    pub app_name: String,
    pub app_origin: String,
    pub bind_address: String,
    pub port: u16,
    pub token_store: TokenStoreKind,
    pub timer: TimerSettings,
    pub playback: PlaybackSettings,
    pub notifications: NotificationSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema: 1,
            app_name: "PomoPlay".to_string(),
            app_origin: DEFAULT_APP_ORIGIN.to_string(),
            bind_address: "127.0.0.1".to_string(),
            port: 3000,
            token_store: TokenStoreKind::File,
            timer: TimerSettings::default(),
            playback: PlaybackSettings::default(),
            notifications: NotificationSettings::default(),
        }
    }
}

impl AppConfig {
    pub fn timer_durations(&self) -> TimerDurations {
        TimerDurations {
            work_seconds: self.timer.work_seconds,
            break_seconds: self.timer.break_seconds,
        }
    }

    pub fn validate(&self) -> Result<(), InfraError> {
        self.timer_durations()
            .validate()
            .map_err(InfraError::InvalidConfig)?;
        url::Url::parse(&self.app_origin)
            .map_err(|error| {
                InfraError::InvalidConfig(format!("appOrigin is not a url: {error}"))
            })?;
        if self.playback.poll_interval_seconds == 0 {
            return Err(InfraError::InvalidConfig(
                "playback.pollIntervalSeconds must be > 0".to_string(),
            ));
        }
        if self.playback.default_volume > 100 {
            return Err(InfraError::InvalidConfig(
                "playback.defaultVolume must be <= 100".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&AppConfig::default())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    let path = config_dir.join(APP_JSON);
    let value = read_config(&path)?;
    let config: AppConfig = serde_json::from_value(value).map_err(|error| {
        InfraError::InvalidConfig(format!("invalid {}: {error}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

pub fn load_spotify_credentials_from_env() -> Result<SpotifyCredentials, InfraError> {
    load_spotify_credentials_from_lookup(|key| std::env::var(key).ok())
}

pub fn load_spotify_credentials_from_lookup<F>(lookup: F) -> Result<SpotifyCredentials, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(SpotifyCredentials {
        client_id: required_lookup_value(&lookup, &CLIENT_ID_KEYS, "spotify client id")?,
        client_secret: required_lookup_value(
            &lookup,
            &CLIENT_SECRET_KEYS,
            "spotify client secret",
        )?,
        redirect_uri: required_lookup_value(&lookup, &REDIRECT_URI_KEYS, "spotify redirect uri")?,
    })
}

fn required_lookup_value<F>(
    lookup: &F,
    keys: &[&str],
    field_name: &str,
) -> Result<String, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    optional_lookup_value(lookup, keys).ok_or_else(|| {
        InfraError::InvalidConfig(format!(
            "missing {} (set one of: {})",
            field_name,
            keys.join(", ")
        ))
    })
}

fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for key in keys {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Some(normalized.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DIR: AtomicUsize = AtomicUsize::new(0);

    struct TempDir {
        path: PathBuf,
    }

    impl TempDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_DIR.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "pomoplay-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp dir");
            Self { path }
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn default_config_is_written_and_loaded() {
        let dir = TempDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");
        let config = load_app_config(&dir.path).expect("load config");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.timer_durations().work_seconds, 1500);
        assert_eq!(config.timer_durations().break_seconds, 300);
    }

    #[test]
    fn existing_config_is_not_overwritten() {
        let dir = TempDir::new();
        fs::write(
            dir.path.join(APP_JSON),
            r#"{"schema":1,"port":4000,"timer":{"workSeconds":60}}"#,
        )
        .expect("write config");
        ensure_default_configs(&dir.path).expect("ensure defaults");
        let config = load_app_config(&dir.path).expect("load config");
        assert_eq!(config.port, 4000);
        assert_eq!(config.timer.work_seconds, 60);
        assert_eq!(config.timer.break_seconds, 300);
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = TempDir::new();
        fs::write(dir.path.join(APP_JSON), r#"{"schema":2}"#).expect("write config");
        match load_app_config(&dir.path) {
            Err(InfraError::InvalidConfig(message)) => {
                assert!(message.contains("unsupported schema"))
            }
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn zero_work_duration_is_rejected() {
        let dir = TempDir::new();
        fs::write(
            dir.path.join(APP_JSON),
            r#"{"schema":1,"timer":{"workSeconds":0}}"#,
        )
        .expect("write config");
        assert!(matches!(
            load_app_config(&dir.path),
            Err(InfraError::InvalidConfig(_))
        ));
    }

    #[test]
    fn credentials_report_missing_client_id() {
        let result = load_spotify_credentials_from_lookup(|key| match key {
            "SPOTIFY_CLIENT_SECRET" => Some("secret".to_string()),
            "SPOTIFY_REDIRECT_URI" => Some("http://127.0.0.1:3000/callback".to_string()),
            _ => None,
        });
        match result {
            Err(InfraError::InvalidConfig(message)) => {
                assert!(message.contains("spotify client id"));
            }
            other => panic!("expected invalid config error, got {other:?}"),
        }
    }

    #[test]
    fn prefixed_credentials_take_precedence() {
        let credentials = load_spotify_credentials_from_lookup(|key| match key {
            "POMOPLAY_SPOTIFY_CLIENT_ID" => Some(" prefixed-id ".to_string()),
            "SPOTIFY_CLIENT_ID" => Some("plain-id".to_string()),
            "SPOTIFY_CLIENT_SECRET" => Some("secret".to_string()),
            "SPOTIFY_REDIRECT_URI" => Some("http://127.0.0.1:3000/callback".to_string()),
            _ => None,
        })
        .expect("credentials");
        assert_eq!(credentials.client_id, "prefixed-id");
        assert_eq!(credentials.client_secret, "secret");
    }
}
