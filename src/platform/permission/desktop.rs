use super::{PermissionError, SystemPermissions};

/// Desktop hosts have no runtime microphone gate the shell can drive;
/// the OS asks on first device open instead.
pub struct DesktopPermissions;

impl DesktopPermissions {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DesktopPermissions {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemPermissions for DesktopPermissions {
    fn microphone_granted(&self) -> bool {
        true
    }

    fn request_microphone(&self) -> Result<(), PermissionError> {
        Err(PermissionError::NotSupported)
    }
}
