//! Camera permission check.
//!
//! Linux has no permission prompt for V4L2 nodes: access is whatever the
//! device node's mode and the user's groups allow. Opening the node
//! read/write is the same check the capture path will hit.

use std::fmt;
use std::fs::OpenOptions;
use std::io::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraAccess {
    Granted,
    Denied,
    /// No device node (unplugged, wrong path) or an error that says nothing
    /// about permission.
    Undetermined,
}

impl fmt::Display for CameraAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CameraAccess::Granted => "granted",
            CameraAccess::Denied => "denied",
            CameraAccess::Undetermined => "undetermined",
        })
    }
}

/// Check whether the current user may open `device`.
pub fn request_camera_access(device: &str) -> CameraAccess {
    match OpenOptions::new().read(true).write(true).open(device) {
        Ok(_) => CameraAccess::Granted,
        Err(e) => {
            let access = access_for_error(e.kind());
            if access == CameraAccess::Denied {
                tracing::warn!(device, "camera access denied");
            } else {
                tracing::debug!(device, error = %e, "camera access undetermined");
            }
            access
        }
    }
}

/// Map a failed open of the device node to an access state.
pub fn access_for_error(kind: ErrorKind) -> CameraAccess {
    match kind {
        ErrorKind::PermissionDenied => CameraAccess::Denied,
        _ => CameraAccess::Undetermined,
    }
}

/// Instructions for granting camera access, shown when access is denied.
pub fn settings_hint(device: &str) -> String {
    format!(
        "Camera access to {device} was denied. Grant it by adding your user to the \
         'video' group (sudo usermod -aG video $USER, then log in again) or by \
         installing a udev rule that makes {device} accessible."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device_is_undetermined() {
        let path = std::env::temp_dir().join(format!("edutrack-no-video-{}", uuid::Uuid::new_v4()));
        assert_eq!(
            request_camera_access(path.to_str().unwrap()),
            CameraAccess::Undetermined
        );
    }

    #[test]
    fn test_accessible_node_is_granted() {
        let path = std::env::temp_dir().join(format!("edutrack-video-{}", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"").unwrap();
        let access = request_camera_access(path.to_str().unwrap());
        std::fs::remove_file(&path).unwrap();
        assert_eq!(access, CameraAccess::Granted);
    }

    #[test]
    fn test_permission_error_is_denied() {
        assert_eq!(access_for_error(ErrorKind::PermissionDenied), CameraAccess::Denied);
        assert_eq!(access_for_error(ErrorKind::NotFound), CameraAccess::Undetermined);
        assert_eq!(access_for_error(ErrorKind::Other), CameraAccess::Undetermined);
    }

    #[test]
    fn test_settings_hint_names_device() {
        let hint = settings_hint("/dev/video0");
        assert!(hint.contains("/dev/video0"));
        assert!(hint.contains("video"));
    }
}
