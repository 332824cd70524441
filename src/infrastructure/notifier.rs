use crate::domain::models::NotificationPermission;
use notify_rust::Notification;
use tracing::{info, warn};

pub trait Notifier: Send + Sync {
    /// Asked once per timer before the first notification could be shown.
    fn request_permission(&self) -> NotificationPermission;
    fn notify(&self, title: &str, body: &str);
}

#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    app_name: String,
    enabled: bool,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>, enabled: bool) -> Self {
        Self {
            app_name: app_name.into(),
            enabled,
        }
    }
}

impl Notifier for DesktopNotifier {
    fn request_permission(&self) -> NotificationPermission {
        let permission = if self.enabled {
            NotificationPermission::Granted
        } else {
            NotificationPermission::Denied
        };
        info!(
            command = "request_notification_permission",
            ?permission,
            "notification permission resolved"
        );
        permission
    }

    /// `show()` blocks on the notification daemon, so inside a runtime it
    /// runs on the blocking pool.
    fn notify(&self, title: &str, body: &str) {
        let app_name = self.app_name.clone();
        let title = title.to_string();
        let body = body.to_string();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || show_notification(&app_name, &title, &body));
            }
            Err(_) => show_notification(&app_name, &title, &body),
        }
    }
}

fn show_notification(app_name: &str, title: &str, body: &str) {
    let shown = Notification::new()
        .summary(title)
        .body(body)
        .appname(app_name)
        .show()
        .map(|_| ());
    if let Err(error) = shown {
        warn!(command = "notify", %error, "desktop notification failed");
    }
}
