//! Startup mesh check
//!
//! Query the firmware for its leveling mesh, compute the variation, and
//! record it when the mesh changed. Every failure short of writing the state
//! file falls back to the last recorded variation.

use crate::firmware::FirmwareProfile;
use crate::mesh::{parse_response, MeshStats};
use crate::printer::parse_print_status;
use crate::state::StateStore;
use crate::transport::{Transport, DEFAULT_MAX_LINES};
use anyhow::Result;
use colored::Colorize;
use std::fmt;

/// How a check run should talk to the firmware
#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub profile: FirmwareProfile,
    pub check_printing: bool,
    pub max_lines: usize,
}

impl CheckOptions {
    pub fn new(profile: FirmwareProfile) -> Self {
        Self {
            profile,
            check_printing: true,
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

/// Where the reported variation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckSource {
    /// A print job was running; stored value returned
    Printing,
    /// The firmware link could not be used; stored value returned
    PortUnavailable,
    /// The response held no usable mesh; stored value returned
    NoMeshData,
    /// Mesh extremes match the stored ones; stored value returned
    Unchanged,
    /// A new mesh was recorded
    Updated,
}

impl fmt::Display for CheckSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckSource::Printing => write!(f, "printer busy"),
            CheckSource::PortUnavailable => write!(f, "printer unreachable"),
            CheckSource::NoMeshData => write!(f, "no mesh data"),
            CheckSource::Unchanged => write!(f, "unchanged"),
            CheckSource::Updated => write!(f, "updated"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub variation: f64,
    pub source: CheckSource,
    /// Statistics of the mesh read this run, if one was read
    pub stats: Option<MeshStats>,
}

impl CheckOutcome {
    fn stored(store: &StateStore, source: CheckSource) -> Self {
        Self {
            variation: store.last_variation(),
            source,
            stats: None,
        }
    }

    pub fn print_report(&self) {
        println!("{}", "=".repeat(60));
        println!("{}", "Bed Mesh Check".cyan().bold());
        println!("{}", "=".repeat(60));

        if let Some(stats) = self.stats {
            println!("  Points: {}", stats.count);
            println!("  Min: {:+.3} mm", stats.min);
            println!("  Max: {:+.3} mm", stats.max);
        }

        let source = match self.source {
            CheckSource::Updated => self.source.to_string().green(),
            CheckSource::Unchanged => self.source.to_string().normal(),
            _ => self.source.to_string().yellow(),
        };
        println!(
            "  Variation: {} ({})",
            format!("{:.3} mm", self.variation).white().bold(),
            source
        );

        println!("{}", "=".repeat(60));
    }
}

/// Run the mesh check.
///
/// `open` connects to the firmware; it is only called once.
pub fn run_check<T, F>(open: F, store: &mut StateStore, options: &CheckOptions) -> Result<CheckOutcome>
where
    T: Transport,
    F: FnOnce() -> Result<T>,
{
    let mut link = match open() {
        Ok(link) => link,
        Err(e) => {
            log::error!(
                "Could not connect to printer: {:#}. Returning last calculated mesh variation.",
                e
            );
            return Ok(CheckOutcome::stored(store, CheckSource::PortUnavailable));
        }
    };

    let profile = &options.profile;

    if options.check_printing {
        if let Some(ref status_command) = profile.status_command {
            match link.query(status_command, options.max_lines) {
                Ok(lines) => {
                    let status = parse_print_status(&lines);
                    log::debug!("Print status: {}", status);
                    if status.is_printing() {
                        log::warn!(
                            "Printer is currently printing. Returning last calculated mesh variation."
                        );
                        return Ok(CheckOutcome::stored(store, CheckSource::Printing));
                    }
                }
                Err(e) => {
                    log::error!(
                        "Print status query failed: {:#}. Returning last calculated mesh variation.",
                        e
                    );
                    return Ok(CheckOutcome::stored(store, CheckSource::PortUnavailable));
                }
            }
        }
    }

    let response = match link.query(&profile.mesh_command, options.max_lines) {
        Ok(lines) => lines,
        Err(e) => {
            log::error!(
                "Mesh query failed: {:#}. Returning last calculated mesh variation.",
                e
            );
            return Ok(CheckOutcome::stored(store, CheckSource::PortUnavailable));
        }
    };

    if let Some(line) = profile.match_error(&response) {
        log::warn!("Firmware reported: {}", line.trim());
    }

    let points = match parse_response(&response, profile.format) {
        Ok(points) => points,
        Err(e) => {
            log::error!("{}. Returning last calculated mesh variation.", e);
            return Ok(CheckOutcome::stored(store, CheckSource::NoMeshData));
        }
    };

    let Some(stats) = MeshStats::from_points(&points) else {
        log::error!("No bed leveling data found. Returning last calculated mesh variation.");
        return Ok(CheckOutcome::stored(store, CheckSource::NoMeshData));
    };

    if stats.matches(store.state()) {
        log::info!(
            "Bed mesh has not changed since last run. Returning last calculated mesh variation: {}",
            store.last_variation()
        );
        return Ok(CheckOutcome {
            variation: store.last_variation(),
            source: CheckSource::Unchanged,
            stats: Some(stats),
        });
    }

    store.record(&stats)?;
    log::info!("Bed mesh variation calculated: {}", stats.variation);

    Ok(CheckOutcome {
        variation: stats.variation,
        source: CheckSource::Updated,
        stats: Some(stats),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::{get_profile, MARLIN_MESH_LINE_PROFILE, MARLIN_PROFILE};
    use crate::mesh::ResponseFormat;
    use crate::transport::mock::ScriptedTransport;
    use anyhow::anyhow;
    use tempfile::{tempdir, TempDir};

    const GRID: &str = "Bilinear Leveling Grid:
      0      1      2
 0 +0.100 -0.050 +0.000
 1 +0.150 +0.020 -0.100
ok";

    fn store() -> (TempDir, StateStore) {
        let dir = tempdir().unwrap();
        let store = StateStore::open(&dir.path().join("state.toml")).unwrap();
        (dir, store)
    }

    fn marlin() -> CheckOptions {
        CheckOptions::new(MARLIN_PROFILE.clone())
    }

    #[test]
    fn test_first_run_records_mesh() {
        let (_dir, mut store) = store();
        let link = ScriptedTransport::new()
            .respond("Not SD printing\nok")
            .respond(GRID);

        let outcome = run_check(|| Ok(link), &mut store, &marlin()).unwrap();

        assert_eq!(outcome.source, CheckSource::Updated);
        assert_eq!(outcome.variation, 0.15 - -0.1);
        assert_eq!(store.state().last_mesh_min, Some(-0.1));
        assert_eq!(store.state().last_mesh_max, Some(0.15));
        assert_eq!(store.last_variation(), outcome.variation);

        // Persisted, not just held in memory
        let reloaded = StateStore::open(store.path()).unwrap();
        assert_eq!(reloaded.state(), store.state());
    }

    #[test]
    fn test_commands_sent_in_order() {
        let (_dir, mut store) = store();
        let link = ScriptedTransport::new()
            .respond("Not SD printing\nok")
            .respond(GRID);
        let mut sent = Vec::new();
        let recorder = RecordingLink {
            inner: link,
            sent: &mut sent,
        };

        run_check(move || Ok(recorder), &mut store, &marlin()).unwrap();

        assert_eq!(sent, vec!["M27", "M420 V"]);
    }

    #[test]
    fn test_unchanged_mesh_keeps_stored_value() {
        let (_dir, mut store) = store();
        store
            .record(&MeshStats::from_points(&[-0.1, 0.15]).unwrap())
            .unwrap();
        let before = store.state().clone();

        let link = ScriptedTransport::new()
            .respond("Not SD printing\nok")
            .respond(GRID);
        let outcome = run_check(|| Ok(link), &mut store, &marlin()).unwrap();

        assert_eq!(outcome.source, CheckSource::Unchanged);
        assert_eq!(outcome.variation, before.last_mesh_variation);
        assert_eq!(store.state(), &before);
    }

    #[test]
    fn test_printing_returns_stored_value() {
        let (_dir, mut store) = store();
        store
            .record(&MeshStats::from_points(&[0.0, 0.4]).unwrap())
            .unwrap();

        let link = ScriptedTransport::new().respond("SD printing byte 10/500\nok");
        let outcome = run_check(|| Ok(link), &mut store, &marlin()).unwrap();

        assert_eq!(outcome.source, CheckSource::Printing);
        assert_eq!(outcome.variation, 0.4);
        assert!(outcome.stats.is_none());
    }

    #[test]
    fn test_print_check_can_be_disabled() {
        let (_dir, mut store) = store();
        let mut options = marlin();
        options.check_printing = false;

        // Only the mesh command is answered
        let link = ScriptedTransport::new().respond(GRID);
        let outcome = run_check(|| Ok(link), &mut store, &options).unwrap();

        assert_eq!(outcome.source, CheckSource::Updated);
    }

    #[test]
    fn test_port_unavailable_defaults_to_zero() {
        let (_dir, mut store) = store();

        let outcome = run_check(
            || -> Result<ScriptedTransport> { Err(anyhow!("No such file or directory")) },
            &mut store,
            &marlin(),
        )
        .unwrap();

        assert_eq!(outcome.source, CheckSource::PortUnavailable);
        assert_eq!(outcome.variation, 0.0);
    }

    #[test]
    fn test_empty_response_returns_stored_value() {
        let (_dir, mut store) = store();
        store
            .record(&MeshStats::from_points(&[0.0, 0.2]).unwrap())
            .unwrap();

        let link = ScriptedTransport::new()
            .respond("Not SD printing\nok")
            .respond("echo:Invalid mesh.\nok");
        let outcome = run_check(|| Ok(link), &mut store, &marlin()).unwrap();

        assert_eq!(outcome.source, CheckSource::NoMeshData);
        assert_eq!(outcome.variation, 0.2);
    }

    #[test]
    fn test_mesh_line_profile() {
        let (_dir, mut store) = store();
        let link = ScriptedTransport::new()
            .respond("Not SD printing\nok")
            .respond("MESH;0.25,-0.05,0.10\nok");
        let options = CheckOptions::new(MARLIN_MESH_LINE_PROFILE.clone());

        let outcome = run_check(|| Ok(link), &mut store, &options).unwrap();

        assert_eq!(outcome.source, CheckSource::Updated);
        assert_eq!(outcome.variation, 0.25 - -0.05);
    }

    #[test]
    fn test_bad_mesh_line_value() {
        let (_dir, mut store) = store();
        let link = ScriptedTransport::new()
            .respond("Not SD printing\nok")
            .respond("MESH;0.25,oops\nok");
        let mut options = CheckOptions::new(MARLIN_PROFILE.clone());
        options.profile.format = ResponseFormat::MeshLine;

        let outcome = run_check(|| Ok(link), &mut store, &options).unwrap();
        assert_eq!(outcome.source, CheckSource::NoMeshData);
    }

    #[test]
    fn test_generic_profile_skips_status_query() {
        let (_dir, mut store) = store();
        let link = ScriptedTransport::new().respond(GRID);
        let options = CheckOptions::new(get_profile("generic").unwrap().clone());

        let outcome = run_check(|| Ok(link), &mut store, &options).unwrap();
        assert_eq!(outcome.source, CheckSource::Updated);
    }

    #[test]
    fn test_dropped_link_during_mesh_query() {
        let (_dir, mut store) = store();
        store
            .record(&MeshStats::from_points(&[0.0, 0.3]).unwrap())
            .unwrap();

        // Status query goes through, the mesh command does not
        let link = ScriptedTransport::new()
            .respond("Not SD printing\nok")
            .respond(GRID)
            .fail_on_write(2);
        let outcome = run_check(|| Ok(link), &mut store, &marlin()).unwrap();

        assert_eq!(outcome.source, CheckSource::PortUnavailable);
        assert_eq!(outcome.variation, 0.3);
        assert!(outcome.stats.is_none());
    }

    #[test]
    fn test_dropped_link_during_status_query() {
        let (_dir, mut store) = store();
        let link = ScriptedTransport::new().respond(GRID).fail_on_write(1);

        let outcome = run_check(|| Ok(link), &mut store, &marlin()).unwrap();
        assert_eq!(outcome.source, CheckSource::PortUnavailable);
        assert_eq!(outcome.variation, 0.0);
    }

    #[test]
    fn test_unwritable_state_is_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        let mut store = StateStore::open(&blocker.join("state.toml")).unwrap();

        let link = ScriptedTransport::new()
            .respond("Not SD printing\nok")
            .respond("MESH;0.1,0.3\nok");
        let options = CheckOptions::new(MARLIN_MESH_LINE_PROFILE.clone());

        assert!(run_check(|| Ok(link), &mut store, &options).is_err());
        assert_eq!(store.last_variation(), 0.0);
    }

    /// Transport wrapper that records the commands written through it
    struct RecordingLink<'a> {
        inner: ScriptedTransport,
        sent: &'a mut Vec<String>,
    }

    impl Transport for RecordingLink<'_> {
        fn write_line(&mut self, line: &str) -> Result<()> {
            self.sent.push(line.to_string());
            self.inner.write_line(line)
        }

        fn read_line(&mut self) -> Result<Option<String>> {
            self.inner.read_line()
        }
    }
}
