//! Generic firmware profile
//!
//! Sends `M420 V` and accepts either report layout. No print status check.

use super::profile::FirmwareProfile;
use crate::mesh::ResponseFormat;
use once_cell::sync::Lazy;

pub static GENERIC_PROFILE: Lazy<FirmwareProfile> = Lazy::new(|| {
    let mut profile = FirmwareProfile::new("generic", "Generic Firmware");
    profile.description = "Any firmware answering M420 V; layout auto-detected".to_string();
    profile.format = ResponseFormat::Auto;
    profile.error_patterns = vec!["Unknown command".to_string(), "Error:".to_string()];
    profile
});
