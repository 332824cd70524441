use crate::application::commands::{
    AppState, advance_timer_impl, refresh_player_impl, tick_player_progress_impl,
};
use crate::infrastructure::error::InfraError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const TIMER_TICK: Duration = Duration::from_secs(1);
const PROGRESS_TICK: Duration = Duration::from_secs(1);

/// Background loops standing in for the page's interval callbacks. Dropping
/// or shutting down cancels all of them.
pub struct BackgroundTasks {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub fn spawn(state: Arc<AppState>) -> Self {
        let cancel = CancellationToken::new();
        let poll_interval = Duration::from_secs(state.config().playback.poll_interval_seconds);

        let handles = vec![
            spawn_interval("timer_tick", TIMER_TICK, cancel.clone(), {
                let state = Arc::clone(&state);
                move || {
                    let state = Arc::clone(&state);
                    async move {
                        report("timer_tick", advance_timer_impl(&state));
                    }
                }
            }),
            spawn_interval("playback_poll", poll_interval, cancel.clone(), {
                let state = Arc::clone(&state);
                move || {
                    let state = Arc::clone(&state);
                    async move {
                        report("playback_poll", refresh_player_impl(&state).await);
                    }
                }
            }),
            spawn_interval("playback_progress", PROGRESS_TICK, cancel.clone(), {
                let state = Arc::clone(&state);
                move || {
                    let state = Arc::clone(&state);
                    async move {
                        report("playback_progress", tick_player_progress_impl(&state));
                    }
                }
            }),
        ];

        info!(command = "scheduler", loops = handles.len(), "background loops started");
        Self { cancel, handles }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
        info!(command = "scheduler", "background loops stopped");
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Loop bodies keep running after a failure; the error is only logged.
fn report<T>(loop_name: &'static str, result: Result<T, InfraError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(command = "scheduler", loop_name, %error, "background job failed");
            None
        }
    }
}

/// Runs `job` on every tick until cancelled. Each job finishes before the
/// next tick is taken, and ticks missed while it ran are skipped.
fn spawn_interval<F, Fut>(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    mut job: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => job().await,
            }
        }
        debug!(command = "scheduler", loop_name = name, "loop cancelled");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn report_passes_values_through_and_swallows_errors() {
        assert_eq!(report("test", Ok::<_, InfraError>(7)), Some(7));
        assert_eq!(
            report::<()>("test", Err(InfraError::Json(
                serde_json::from_str::<u8>("{").expect_err("invalid json")
            ))),
            None
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failing_job_keeps_its_loop_alive() {
        let runs = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let handle = spawn_interval("failing", Duration::from_secs(1), cancel.clone(), {
            let runs = Arc::clone(&runs);
            move || {
                let runs = Arc::clone(&runs);
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    report::<()>(
                        "failing",
                        Err(InfraError::Credential("token file lock poisoned".to_string())),
                    );
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        cancel.cancel();
        handle.await.expect("loop joins");

        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_runs_until_cancelled() {
        let runs = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let handle = spawn_interval("test", Duration::from_secs(1), cancel.clone(), {
            let runs = Arc::clone(&runs);
            move || {
                let runs = Arc::clone(&runs);
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(3500)).await;
        cancel.cancel();
        handle.await.expect("loop joins");

        let observed = runs.load(Ordering::SeqCst);
        assert_eq!(observed, 4);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(runs.load(Ordering::SeqCst), observed);
    }
}
