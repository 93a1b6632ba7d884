//! Firmware profiles for mesh queries
//!
//! Each profile names the G-code that prints the bed leveling mesh, the
//! layout of the report, and how to ask whether a print is running.

pub mod generic;
pub mod marlin;
pub mod profile;
pub mod prusa;

pub use generic::GENERIC_PROFILE;
pub use marlin::{MARLIN_MESH_LINE_PROFILE, MARLIN_PROFILE};
pub use profile::FirmwareProfile;
pub use prusa::PRUSA_PROFILE;

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Registry of built-in firmware profiles
pub static FIRMWARE_PROFILES: Lazy<HashMap<&'static str, &'static FirmwareProfile>> =
    Lazy::new(|| {
        let mut m = HashMap::new();
        m.insert("marlin", &*MARLIN_PROFILE);
        m.insert("marlin-bilinear", &*MARLIN_PROFILE);
        m.insert("marlin-mesh", &*MARLIN_MESH_LINE_PROFILE);
        m.insert("prusa", &*PRUSA_PROFILE);
        m.insert("prusa-mk3", &*PRUSA_PROFILE);
        m.insert("generic", &*GENERIC_PROFILE);
        m.insert("default", &*GENERIC_PROFILE);
        m
    });

/// Get a firmware profile by name
pub fn get_profile(name: &str) -> Option<&'static FirmwareProfile> {
    FIRMWARE_PROFILES.get(name.to_lowercase().as_str()).copied()
}

/// Get profile names only (deduplicated)
pub fn profile_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = vec!["marlin", "marlin-mesh", "prusa", "generic"];
    names.sort();
    names
}
