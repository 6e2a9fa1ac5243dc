use super::{HeldWakeLock, PowerError, PowerManager};

pub struct DesktopPower;

impl DesktopPower {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DesktopPower {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerManager for DesktopPower {
    fn acquire_partial(&self, tag: &str) -> Result<Box<dyn HeldWakeLock>, PowerError> {
        tracing::debug!("Wake lock '{}' is a no-op on desktop", tag);
        Ok(Box::new(NoopWakeLock))
    }
}

struct NoopWakeLock;

impl HeldWakeLock for NoopWakeLock {
    fn release(self: Box<Self>) -> Result<(), PowerError> {
        Ok(())
    }
}
