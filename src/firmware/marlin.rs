//! Marlin firmware profiles
//!
//! `M420 V` prints the bilinear leveling grid. Builds patched to emit a
//! single `MESH;...` line use the mesh-line layout instead.

use super::profile::FirmwareProfile;
use crate::mesh::ResponseFormat;
use once_cell::sync::Lazy;

fn marlin_errors() -> Vec<String> {
    vec![
        "Unknown command".to_string(),
        "Invalid mesh".to_string(),
        "Error:".to_string(),
    ]
}

/// Marlin with bilinear leveling
pub static MARLIN_PROFILE: Lazy<FirmwareProfile> = Lazy::new(|| FirmwareProfile {
    name: "Marlin".to_string(),
    id: "marlin".to_string(),
    description: "Marlin bilinear leveling grid via M420 V".to_string(),
    mesh_command: "M420 V".to_string(),
    format: ResponseFormat::Grid,
    status_command: Some("M27".to_string()),
    baud_rate: 115200,
    error_patterns: marlin_errors(),
});

/// Marlin reporting the mesh as one `MESH;` line
pub static MARLIN_MESH_LINE_PROFILE: Lazy<FirmwareProfile> = Lazy::new(|| FirmwareProfile {
    name: "Marlin (mesh line)".to_string(),
    id: "marlin-mesh".to_string(),
    description: "Marlin build that reports the mesh as MESH;v1,v2,...".to_string(),
    mesh_command: "M420 V".to_string(),
    format: ResponseFormat::MeshLine,
    status_command: Some("M27".to_string()),
    baud_rate: 115200,
    error_patterns: marlin_errors(),
});
