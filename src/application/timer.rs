use crate::domain::models::{
    NotificationPermission, TimerDurations, TimerMode, TimerState, format_clock, percent_of,
};
use crate::infrastructure::clock::Clock;
use crate::infrastructure::notifier::Notifier;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimerSnapshot {
    pub mode: TimerMode,
    pub time_left_seconds: u32,
    pub is_running: bool,
    pub sessions_completed: u32,
    pub display: String,
    pub label: String,
    pub progress_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerNotification {
    pub title: &'static str,
    pub body: &'static str,
}

/// Set only when notification permission was granted. The caller shows it
/// once the engine is no longer locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerCompletion {
    pub finished: TimerMode,
    pub next: TimerMode,
    pub sessions_completed: u32,
    pub notification: Option<TimerNotification>,
}

/// Work/break countdown. Nothing here sleeps: a scheduler calls [`advance`]
/// and the engine catches up with whatever the clock says has elapsed.
///
/// [`advance`]: TimerEngine::advance
pub struct TimerEngine {
    state: TimerState,
    durations: TimerDurations,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    permission: Option<NotificationPermission>,
    last_tick_at: Option<DateTime<Utc>>,
}

impl TimerEngine {
    pub fn new(
        durations: TimerDurations,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            state: TimerState::initial(&durations),
            durations,
            clock,
            notifier,
            permission: None,
            last_tick_at: None,
        }
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let total = self.durations.for_mode(self.state.mode);
        TimerSnapshot {
            mode: self.state.mode,
            time_left_seconds: self.state.time_left_seconds,
            is_running: self.state.is_running,
            sessions_completed: self.state.sessions_completed,
            display: format_clock(self.state.time_left_seconds),
            label: self.state.mode.label().to_string(),
            progress_percent: percent_of(total.saturating_sub(self.state.time_left_seconds), total),
        }
    }

    pub fn start(&mut self) {
        if self.state.is_running {
            return;
        }
        if self.permission.is_none() {
            self.permission = Some(self.notifier.request_permission());
        }
        self.state.is_running = true;
        self.last_tick_at = Some(self.clock.now());
    }

    pub fn pause(&mut self) {
        self.state.is_running = false;
        self.last_tick_at = None;
    }

    pub fn toggle(&mut self) {
        if self.state.is_running {
            self.pause();
        } else {
            self.start();
        }
    }

    pub fn reset_timer(&mut self) {
        self.pause();
        self.state.time_left_seconds = self.durations.for_mode(self.state.mode);
    }

    pub fn switch_mode(&mut self, mode: TimerMode) {
        self.pause();
        self.state.mode = mode;
        self.state.time_left_seconds = self.durations.for_mode(mode);
    }

    /// One second of countdown. Returns the transition when this tick
    /// reached zero.
    pub fn tick(&mut self) -> Option<TimerCompletion> {
        if !self.state.is_running {
            return None;
        }
        if self.state.time_left_seconds <= 1 {
            self.state.time_left_seconds = 0;
            return Some(self.complete());
        }
        self.state.time_left_seconds -= 1;
        None
    }

    /// Applies every whole second elapsed since the previous tick. A
    /// completion stops the run, so leftover seconds are dropped.
    pub fn advance(&mut self) -> Option<TimerCompletion> {
        let last_tick_at = self.last_tick_at?;
        let now = self.clock.now();
        let elapsed = (now - last_tick_at).num_seconds();
        if elapsed <= 0 {
            return None;
        }

        for _ in 0..elapsed {
            if let Some(completion) = self.tick() {
                return Some(completion);
            }
        }
        self.last_tick_at = Some(last_tick_at + Duration::seconds(elapsed));
        None
    }

    fn complete(&mut self) -> TimerCompletion {
        self.pause();
        let finished = self.state.mode;
        let next = match finished {
            TimerMode::Work => {
                self.state.sessions_completed += 1;
                TimerMode::Break
            }
            TimerMode::Break => TimerMode::Work,
        };
        self.state.mode = next;
        self.state.time_left_seconds = self.durations.for_mode(next);

        info!(
            command = "timer_complete",
            finished = %finished,
            next = %next,
            sessions_completed = self.state.sessions_completed,
            "timer reached zero"
        );

        let notification = (self.permission == Some(NotificationPermission::Granted)).then(|| {
            match finished {
                TimerMode::Work => TimerNotification {
                    title: "Time for a break!",
                    body: "Focus session complete.",
                },
                TimerMode::Break => TimerNotification {
                    title: "Back to work!",
                    body: "Break is over.",
                },
            }
        });

        TimerCompletion {
            finished,
            next,
            sessions_completed: self.state.sessions_completed,
            notification,
        }
    }
}
