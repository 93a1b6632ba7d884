//! Persisted mesh state
//!
//! Stores the extremes and variation of the last recorded mesh in a small
//! TOML file so later runs can tell whether the bed mesh changed.

use crate::mesh::MeshStats;
use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Values remembered between runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshState {
    pub last_mesh_min: Option<f64>,
    pub last_mesh_max: Option<f64>,
    pub last_mesh_variation: f64,
    /// RFC 3339 time of the last write
    pub updated_at: Option<String>,
}

/// Mesh state bound to the file it is persisted in
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    state: MeshState,
}

impl StateStore {
    /// Load state from `path`; a missing file yields the defaults
    pub fn open(path: &Path) -> Result<Self> {
        let state = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read state file: {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse state file: {}", path.display()))?
        } else {
            log::debug!("No state file at {}, starting fresh", path.display());
            MeshState::default()
        };

        Ok(Self {
            path: path.to_path_buf(),
            state,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &MeshState {
        &self.state
    }

    /// Last recorded variation (0.0 if nothing was recorded yet)
    pub fn last_variation(&self) -> f64 {
        self.state.last_mesh_variation
    }

    /// Remember a new mesh and write it to disk
    ///
    /// The in-memory state only changes once the file is written.
    pub fn record(&mut self, stats: &MeshStats) -> Result<()> {
        self.replace(MeshState {
            last_mesh_min: Some(stats.min),
            last_mesh_max: Some(stats.max),
            last_mesh_variation: stats.variation,
            updated_at: Some(Local::now().to_rfc3339()),
        })
    }

    /// Forget the recorded mesh
    pub fn reset(&mut self) -> Result<()> {
        self.replace(MeshState::default())
    }

    fn replace(&mut self, state: MeshState) -> Result<()> {
        self.save(&state)?;
        self.state = state;
        Ok(())
    }

    fn save(&self, state: &MeshState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create state directory: {}", parent.display())
                })?;
            }
        }

        let content = toml::to_string_pretty(state).context("Failed to serialize state")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write state file: {}", self.path.display()))?;

        log::debug!("Saved mesh state to {}", self.path.display());
        Ok(())
    }

    /// Print the stored state
    pub fn print_report(&self) {
        println!("{}", "=".repeat(60));
        println!("{}", "Stored Mesh State".cyan().bold());
        println!("{}", "=".repeat(60));

        println!("  File: {}", self.path.display());
        match (self.state.last_mesh_min, self.state.last_mesh_max) {
            (Some(min), Some(max)) => {
                println!("  Min: {:+.3} mm", min);
                println!("  Max: {:+.3} mm", max);
            }
            _ => println!("  {}", "No mesh recorded yet".yellow()),
        }
        println!(
            "  Variation: {}",
            format!("{:.3} mm", self.state.last_mesh_variation).white().bold()
        );
        if let Some(ref at) = self.state.updated_at {
            println!("  Updated: {}", at);
        }

        println!("{}", "=".repeat(60));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_defaults() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(&dir.path().join("state.toml")).unwrap();

        assert_eq!(store.state(), &MeshState::default());
        assert_eq!(store.last_variation(), 0.0);
    }

    #[test]
    fn test_record_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.toml");

        let mut store = StateStore::open(&path).unwrap();
        let stats = MeshStats::from_points(&[-0.1, 0.15]).unwrap();
        store.record(&stats).unwrap();

        let reloaded = StateStore::open(&path).unwrap();
        assert_eq!(reloaded.state().last_mesh_min, Some(-0.1));
        assert_eq!(reloaded.state().last_mesh_max, Some(0.15));
        assert_eq!(reloaded.last_variation(), stats.variation);
        assert!(reloaded.state().updated_at.is_some());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.toml");
        fs::write(&path, "last_mesh_min = -0.2\n").unwrap();

        let store = StateStore::open(&path).unwrap();
        assert_eq!(store.state().last_mesh_min, Some(-0.2));
        assert_eq!(store.state().last_mesh_max, None);
        assert_eq!(store.last_variation(), 0.0);
    }

    #[test]
    fn test_reset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.toml");

        let mut store = StateStore::open(&path).unwrap();
        store
            .record(&MeshStats::from_points(&[0.0, 0.3]).unwrap())
            .unwrap();
        store.reset().unwrap();

        let reloaded = StateStore::open(&path).unwrap();
        assert_eq!(reloaded.state(), &MeshState::default());
    }

    #[test]
    fn test_failed_write_keeps_previous_state() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "").unwrap();

        // Parent "directory" is a regular file, so the write fails
        let mut store = StateStore::open(&blocker.join("state.toml")).unwrap();
        let result = store.record(&MeshStats::from_points(&[0.1, 0.3]).unwrap());

        assert!(result.is_err());
        assert_eq!(store.state(), &MeshState::default());
        assert_eq!(store.last_variation(), 0.0);
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.toml");
        fs::write(&path, "last_mesh_min = \"not a number\"\n").unwrap();

        assert!(StateStore::open(&path).is_err());
    }
}
