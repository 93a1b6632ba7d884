//! Firmware profile definitions
//!
//! Describes how to ask a particular printer firmware for its leveling mesh.

use crate::mesh::ResponseFormat;
use serde::{Deserialize, Serialize};

/// Complete firmware profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmwareProfile {
    /// Firmware name
    pub name: String,
    /// Short identifier (e.g., "marlin")
    pub id: String,
    /// Profile description
    pub description: String,
    /// G-code that prints the leveling mesh
    pub mesh_command: String,
    /// Layout of the mesh report
    pub format: ResponseFormat,
    /// G-code that reports print job progress, if the firmware has one
    pub status_command: Option<String>,
    /// Default baud rate
    pub baud_rate: u32,
    /// Substrings that mark a failed mesh query
    pub error_patterns: Vec<String>,
}

impl FirmwareProfile {
    /// Create a new profile with Marlin-like defaults
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            id: id.to_string(),
            description: String::new(),
            mesh_command: "M420 V".to_string(),
            format: ResponseFormat::Auto,
            status_command: None,
            baud_rate: 115200,
            error_patterns: Vec::new(),
        }
    }

    /// Find the first response line reporting a firmware error
    pub fn match_error<'a, S: AsRef<str>>(&self, lines: &'a [S]) -> Option<&'a str> {
        lines.iter().map(|l| l.as_ref()).find(|line| {
            let lower = line.to_lowercase();
            self.error_patterns
                .iter()
                .any(|p| lower.contains(&p.to_lowercase()))
        })
    }
}
