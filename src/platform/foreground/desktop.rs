use super::{ForegroundError, ForegroundKeeper};
use crate::platform::NotificationContent;

pub struct DesktopForeground;

impl DesktopForeground {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DesktopForeground {
    fn default() -> Self {
        Self::new()
    }
}

impl ForegroundKeeper for DesktopForeground {
    fn enter(&self, _content: &NotificationContent) -> Result<(), ForegroundError> {
        Ok(())
    }

    fn leave(&self) -> Result<(), ForegroundError> {
        Ok(())
    }
}
