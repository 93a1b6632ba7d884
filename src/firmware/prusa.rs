//! Prusa firmware profile

use super::profile::FirmwareProfile;
use crate::mesh::ResponseFormat;
use once_cell::sync::Lazy;

/// Prusa MK3 family; `G81` prints the last mesh bed leveling result
pub static PRUSA_PROFILE: Lazy<FirmwareProfile> = Lazy::new(|| FirmwareProfile {
    name: "Prusa Firmware".to_string(),
    id: "prusa".to_string(),
    description: "Prusa mesh bed leveling report via G81".to_string(),
    mesh_command: "G81".to_string(),
    format: ResponseFormat::Grid,
    status_command: Some("M27".to_string()),
    baud_rate: 115200,
    error_patterns: vec![
        "Mesh bed leveling not active".to_string(),
        "Unknown command".to_string(),
    ],
});
