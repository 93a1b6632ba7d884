//! Tool configuration (mesh-variation.toml)
//!
//! Every field has a default, so an empty or partial file is valid.

use crate::mesh::ResponseFormat;
use crate::transport::DEFAULT_MAX_LINES;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "mesh-variation.toml";

/// Default location of the persisted mesh state
pub const DEFAULT_STATE_FILE: &str = "mesh-variation-state.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSection {
    /// Serial port path (e.g., /dev/ttyACM0, /dev/ttyUSB0)
    pub port: String,
    /// Baud rate; the firmware profile default applies when unset
    pub baud_rate: Option<u32>,
    /// Read timeout; a silent link for this long ends a response
    pub timeout_ms: u64,
    /// Pause after opening, boards often reset when the port opens
    pub startup_delay_ms: u64,
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: None,
            timeout_ms: 1000,
            startup_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshSection {
    /// Firmware profile id
    pub firmware: String,
    /// Override the profile's mesh command
    pub command: Option<String>,
    /// Override the profile's report layout
    pub format: Option<ResponseFormat>,
    /// Skip the query while a print job runs
    pub check_printing: bool,
    /// Upper bound on response lines read per command
    pub max_lines: usize,
}

impl Default for MeshSection {
    fn default() -> Self {
        Self {
            firmware: "marlin".to_string(),
            command: None,
            format: None,
            check_printing: true,
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where the last recorded mesh is kept
    pub state_file: PathBuf,
    pub serial: SerialSection,
    pub mesh: MeshSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            serial: SerialSection::default(),
            mesh: MeshSection::default(),
        }
    }
}

impl AppConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse_content(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse config file content
    pub fn parse_content(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load the explicit config file, else `mesh-variation.toml` in the
    /// working directory if present, else defaults
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.exists() {
            log::debug!("Using config file {}", local.display());
            return Self::load(local);
        }

        Ok(Self::default())
    }

    /// Render a commented default configuration file
    pub fn generate_default() -> String {
        format!(
            r#"# mesh-variation configuration

# Where the last recorded mesh is stored
state_file = "{state}"

[serial]
port = "/dev/ttyACM0"
# baud_rate = 115200    # defaults to the firmware profile's rate
timeout_ms = 1000
startup_delay_ms = 2000

[mesh]
# marlin, marlin-mesh, prusa or generic
firmware = "marlin"
# command = "M420 V"    # override the profile's mesh command
# format = "grid"       # grid, mesh-line or auto
check_printing = true
max_lines = {max_lines}
"#,
            state = DEFAULT_STATE_FILE,
            max_lines = DEFAULT_MAX_LINES,
        )
    }
}
