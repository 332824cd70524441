use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const WORK_DURATION_SECONDS: u32 = 25 * 60;
pub const BREAK_DURATION_SECONDS: u32 = 5 * 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TokenKey {
    #[serde(rename = "accessToken")]
    AccessToken,
    #[serde(rename = "refreshToken")]
    RefreshToken,
    #[serde(rename = "expiresIn")]
    ExpiresIn,
}

impl TokenKey {
    pub const ALL: [TokenKey; 3] = [Self::AccessToken, Self::RefreshToken, Self::ExpiresIn];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccessToken => "accessToken",
            Self::RefreshToken => "refreshToken",
            Self::ExpiresIn => "expiresIn",
        }
    }
}

/// Credentials handed back by the authorization-code exchange. Nothing here is
/// validated or enforced: an expired access token is only noticed when Spotify
/// rejects it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub cover_url: String,
    pub duration_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    pub id: String,
    pub text: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimerMode {
    Work,
    Break,
}

impl TimerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Break => "break",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Work => "Focus Time",
            Self::Break => "Break Time",
        }
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "work" | "focus" => Ok(Self::Work),
            "break" => Ok(Self::Break),
            other => Err(format!("unknown timer mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerDurations {
    pub work_seconds: u32,
    pub break_seconds: u32,
}

impl TimerDurations {
    pub fn for_mode(&self, mode: TimerMode) -> u32 {
        match mode {
            TimerMode::Work => self.work_seconds,
            TimerMode::Break => self.break_seconds,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.work_seconds == 0 {
            return Err("timer.work_seconds must be > 0".to_string());
        }
        if self.break_seconds == 0 {
            return Err("timer.break_seconds must be > 0".to_string());
        }
        Ok(())
    }
}

impl Default for TimerDurations {
    fn default() -> Self {
        Self {
            work_seconds: WORK_DURATION_SECONDS,
            break_seconds: BREAK_DURATION_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerState {
    pub mode: TimerMode,
    pub time_left_seconds: u32,
    pub is_running: bool,
    pub sessions_completed: u32,
}

impl TimerState {
    pub fn initial(durations: &TimerDurations) -> Self {
        Self {
            mode: TimerMode::Work,
            time_left_seconds: durations.for_mode(TimerMode::Work),
            is_running: false,
            sessions_completed: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPermission {
    Granted,
    Denied,
}

/// Shared "now playing" state. Poll responses, command outcomes and the local
/// progress tick all write here; whichever lands last wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerView {
    pub track: Option<Track>,
    pub is_playing: bool,
    pub progress_seconds: u32,
    pub volume: u8,
    pub message: Option<String>,
}

impl PlayerView {
    pub fn with_volume(volume: u8) -> Self {
        Self {
            track: None,
            is_playing: false,
            progress_seconds: 0,
            volume: volume.min(100),
            message: None,
        }
    }
}

/// `MM:SS`, both fields zero padded.
pub fn format_clock(total_seconds: u32) -> String {
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// `m:ss`, minutes unpadded.
pub fn format_track_time(total_seconds: u32) -> String {
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

pub fn percent_of(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (f64::from(part.min(whole)) / f64::from(whole)) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn timer_mode_parses_known_names() {
        assert_eq!("work".parse::<TimerMode>(), Ok(TimerMode::Work));
        assert_eq!(" Break ".parse::<TimerMode>(), Ok(TimerMode::Break));
        assert_eq!("focus".parse::<TimerMode>(), Ok(TimerMode::Work));
        assert!("nap".parse::<TimerMode>().is_err());
    }

    #[test]
    fn clock_formats_pad_as_expected() {
        assert_eq!(format_clock(1500), "25:00");
        assert_eq!(format_clock(65), "01:05");
        assert_eq!(format_track_time(65), "1:05");
        assert_eq!(format_track_time(3), "0:03");
    }

    #[test]
    fn token_keys_use_storage_names() {
        let names = TokenKey::ALL.map(TokenKey::as_str);
        assert_eq!(names, ["accessToken", "refreshToken", "expiresIn"]);
        assert_eq!(
            serde_json::to_string(&TokenKey::ExpiresIn).expect("serialize key"),
            "\"expiresIn\""
        );
    }

    #[test]
    fn durations_reject_zero() {
        let durations = TimerDurations {
            work_seconds: 0,
            break_seconds: 300,
        };
        assert!(durations.validate().is_err());
        assert!(TimerDurations::default().validate().is_ok());
    }

    proptest! {
        #[test]
        fn percent_stays_within_bounds(part in 0u32..10_000, whole in 0u32..10_000) {
            let value = percent_of(part, whole);
            prop_assert!((0.0..=100.0).contains(&value));
        }
    }
}
