use std::sync::Mutex;

use notify_rust::{Notification, Timeout};

use super::{KeepAliveNotifier, NotificationContent, NotificationError};

/// A posted notification that can be taken down again
#[cfg_attr(not(all(unix, not(target_os = "macos"))), allow(dead_code))]
trait Dismiss: Send {
    fn dismiss(self);
}

// Only the freedesktop backend can close a notification it posted
#[cfg(all(unix, not(target_os = "macos")))]
impl Dismiss for notify_rust::NotificationHandle {
    fn dismiss(self) {
        self.close();
    }
}

/// The notification currently on screen, if any
#[cfg_attr(not(all(unix, not(target_os = "macos"))), allow(dead_code))]
struct Posted<H> {
    handle: Mutex<Option<H>>,
}

#[cfg_attr(not(all(unix, not(target_os = "macos"))), allow(dead_code))]
impl<H: Dismiss> Posted<H> {
    fn new() -> Self {
        Self {
            handle: Mutex::new(None),
        }
    }

    /// Track `handle`, dismissing whatever it replaces
    fn replace(&self, handle: H) {
        let previous = match self.handle.lock() {
            Ok(mut slot) => slot.replace(handle),
            Err(poisoned) => poisoned.into_inner().replace(handle),
        };
        if let Some(previous) = previous {
            previous.dismiss();
        }
    }

    fn dismiss(&self) {
        let current = match self.handle.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(current) = current {
            current.dismiss();
        }
    }
}

pub struct DesktopNotifier {
    #[cfg(all(unix, not(target_os = "macos")))]
    posted: Posted<notify_rust::NotificationHandle>,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self {
            #[cfg(all(unix, not(target_os = "macos")))]
            posted: Posted::new(),
        }
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl KeepAliveNotifier for DesktopNotifier {
    fn show(&self, content: &NotificationContent) -> Result<(), NotificationError> {
        let shown = Notification::new()
            .summary(&content.title)
            .body(&content.body)
            .timeout(Timeout::Never)
            .show()
            .map_err(|e| NotificationError::Platform(e.to_string()))?;

        #[cfg(all(unix, not(target_os = "macos")))]
        self.posted.replace(shown);
        #[cfg(not(all(unix, not(target_os = "macos"))))]
        let _ = shown;

        Ok(())
    }

    fn cancel(&self, _content: &NotificationContent) -> Result<(), NotificationError> {
        // Elsewhere the notification center owns it once posted
        #[cfg(all(unix, not(target_os = "macos")))]
        self.posted.dismiss();
        Ok(())
    }
}
