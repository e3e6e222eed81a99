//! edutrack-capture — Getting a photo to upload.
//!
//! Probes camera permission, grabs a still from a V4L2 camera as JPEG,
//! or loads an existing image file, and packages it with its MIME type.

pub mod camera;
pub mod frame;
pub mod permission;
pub mod still;

pub use camera::{Camera, CameraError, DeviceInfo};
pub use permission::{request_camera_access, CameraAccess};
pub use still::{CaptureError, CapturedImage};
