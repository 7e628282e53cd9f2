//! Desktop notifications via `notify-send`

use pomo_host_api::{DesktopNotifier, HostError, HostResult};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use tracing::{debug, info, warn};

const NOTIFY_SEND: &str = "notify-send";
const APP_NAME: &str = "pomodorod";

/// Desktop notifier that shells out to `notify-send` (libnotify).
///
/// Children are not waited on when spawned; finished ones are reaped on the
/// next call.
pub struct NotifySendNotifier {
    available: bool,
    children: Mutex<Vec<Child>>,
}

impl NotifySendNotifier {
    /// Probe for `notify-send` on the PATH
    pub fn detect() -> Self {
        let available = Command::new(NOTIFY_SEND)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);

        if available {
            info!("Desktop notifications via notify-send");
        } else {
            warn!("notify-send not found, desktop notifications disabled");
        }

        Self {
            available,
            children: Mutex::new(Vec::new()),
        }
    }

    fn reap(children: &mut Vec<Child>) {
        children.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    debug!(status = ?status, "notify-send exited with failure");
                }
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!(error = %e, "Error checking notify-send status");
                false
            }
        });
    }
}

/// Arguments passed to `notify-send` for one notification
pub fn notify_send_args(title: &str, body: &str) -> Vec<String> {
    vec![
        format!("--app-name={}", APP_NAME),
        title.to_string(),
        body.to_string(),
    ]
}

impl DesktopNotifier for NotifySendNotifier {
    fn show(&self, title: &str, body: &str) -> HostResult<()> {
        if !self.available {
            return Err(HostError::Unavailable(NOTIFY_SEND.into()));
        }

        let child = Command::new(NOTIFY_SEND)
            .args(notify_send_args(title, body))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| HostError::NotifyFailed(e.to_string()))?;

        let mut children = self
            .children
            .lock()
            .map_err(|_| HostError::Internal("notifier lock poisoned".into()))?;
        Self::reap(&mut children);
        children.push(child);

        debug!(title, "Desktop notification sent");
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.available
    }
}
