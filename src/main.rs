//! Bed Mesh Variation
//!
//! Queries 3D printer firmware for its bed leveling mesh over serial,
//! computes the mesh variation (highest minus lowest point), and remembers it
//! between runs. Meant to run once when the printer host starts.
//!
//! # Features
//!
//! - **Mesh Check**: Query, compare against the stored mesh, persist changes
//!   (requires `serial` feature, on by default)
//! - **Firmware Profiles**: Built-in profiles for Marlin and Prusa firmware
//! - **Offline Parsing**: Analyze a captured `M420 V` / `G81` response
//!
//! # Usage
//!
//! ```bash
//! # Check the mesh on the default port
//! mesh-variation check
//!
//! # Check a Prusa printer and print only the variation
//! mesh-variation check -p /dev/ttyACM1 --firmware prusa --quiet
//!
//! # Parse a captured response
//! mesh-variation parse m420.log --format grid
//!
//! # Show or clear the stored mesh
//! mesh-variation state show
//! mesh-variation state reset
//!
//! # List serial ports (requires serial feature)
//! mesh-variation serial list
//! ```

mod check;
mod config;
mod error;
mod firmware;
mod mesh;
mod printer;
#[cfg(feature = "serial")]
mod serial;
mod state;
mod transport;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

use config::AppConfig;
use error::MeshError;
use firmware::{get_profile, profile_names, FirmwareProfile};
use mesh::{MeshStats, ResponseFormat};
use state::StateStore;

#[cfg(feature = "serial")]
use check::{run_check, CheckOptions};
#[cfg(feature = "serial")]
use serial::{PortConfig, SerialConnection};
#[cfg(feature = "serial")]
use std::time::Duration;

/// Bed Mesh Variation
///
/// Track how uneven a 3D printer's bed leveling mesh is
#[derive(Parser)]
#[command(name = "mesh-variation")]
#[command(author = "Prasanna Gautam")]
#[command(version = "0.1.0")]
#[command(about = "Query printer firmware for the bed leveling mesh and track its variation")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ./mesh-variation.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// State file (overrides config)
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the printer and record the mesh variation if it changed
    #[cfg(feature = "serial")]
    Check {
        /// Serial port path (e.g., /dev/ttyACM0)
        #[arg(short, long)]
        port: Option<String>,

        /// Baud rate (overrides config and firmware profile)
        #[arg(short, long)]
        baud: Option<u32>,

        /// Firmware profile (e.g., marlin, prusa)
        #[arg(short, long)]
        firmware: Option<String>,

        /// Response layout: grid, mesh-line or auto
        #[arg(long)]
        format: Option<String>,

        /// Query the mesh even if a print job is running
        #[arg(long)]
        no_print_check: bool,

        /// Print only the variation value
        #[arg(short, long)]
        quiet: bool,
    },

    /// Parse a captured firmware response file
    Parse {
        /// File holding the response text
        file: PathBuf,

        /// Firmware profile whose layout to use
        #[arg(short, long, default_value = "generic")]
        firmware: String,

        /// Response layout: grid, mesh-line or auto (overrides profile)
        #[arg(long)]
        format: Option<String>,
    },

    /// Stored mesh state operations
    #[command(subcommand)]
    State(StateCommands),

    /// Firmware profile operations
    #[command(subcommand)]
    Firmware(FirmwareCommands),

    /// Serial port operations (requires --features serial)
    #[cfg(feature = "serial")]
    #[command(subcommand)]
    Serial(SerialCommands),

    /// Generate configuration files
    #[command(subcommand)]
    Generate(GenerateCommands),
}

#[derive(Subcommand)]
enum StateCommands {
    /// Show the stored mesh
    Show,

    /// Forget the stored mesh
    Reset,
}

#[derive(Subcommand)]
enum FirmwareCommands {
    /// List all supported firmware profiles
    List,

    /// Show detailed information about a firmware profile
    Show {
        /// Firmware profile name (e.g., marlin, prusa)
        firmware: String,
    },
}

#[cfg(feature = "serial")]
#[derive(Subcommand)]
enum SerialCommands {
    /// List available serial ports
    List,

    /// Find ports that look like printer boards
    Detect,
}

#[derive(Subcommand)]
enum GenerateCommands {
    /// Generate a default mesh-variation.toml
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let mut config = AppConfig::resolve(cli.config.as_deref())?;
    if let Some(state) = cli.state {
        config.state_file = state;
    }

    match cli.command {
        #[cfg(feature = "serial")]
        Commands::Check {
            port,
            baud,
            firmware,
            format,
            no_print_check,
            quiet,
        } => handle_check(
            &config,
            CheckArgs {
                port,
                baud,
                firmware,
                format,
                no_print_check,
                quiet,
            },
        ),
        Commands::Parse {
            file,
            firmware,
            format,
        } => handle_parse(&file, &firmware, format.as_deref()),
        Commands::State(cmd) => handle_state(&config, cmd),
        Commands::Firmware(cmd) => handle_firmware(cmd),
        #[cfg(feature = "serial")]
        Commands::Serial(cmd) => handle_serial(cmd),
        Commands::Generate(cmd) => handle_generate(cmd),
    }
}

/// Look up a profile and apply config and command line overrides
fn resolve_profile(
    name: &str,
    command: Option<&str>,
    format: Option<ResponseFormat>,
) -> Result<FirmwareProfile> {
    let mut profile = get_profile(name)
        .ok_or_else(|| MeshError::UnknownFirmware(name.to_string()))?
        .clone();

    if let Some(command) = command {
        profile.mesh_command = command.to_string();
    }
    if let Some(format) = format {
        profile.format = format;
    }

    Ok(profile)
}

#[cfg(feature = "serial")]
struct CheckArgs {
    port: Option<String>,
    baud: Option<u32>,
    firmware: Option<String>,
    format: Option<String>,
    no_print_check: bool,
    quiet: bool,
}

#[cfg(feature = "serial")]
fn handle_check(config: &AppConfig, args: CheckArgs) -> Result<()> {
    let format = match args.format.as_deref() {
        Some(f) => Some(f.parse::<ResponseFormat>()?),
        None => config.mesh.format,
    };
    let firmware = args.firmware.as_deref().unwrap_or(&config.mesh.firmware);
    let profile = resolve_profile(firmware, config.mesh.command.as_deref(), format)?;

    let baud_rate = args
        .baud
        .or(config.serial.baud_rate)
        .unwrap_or(profile.baud_rate);
    let port_path = args.port.as_deref().unwrap_or(&config.serial.port);

    let port_config = PortConfig::new(port_path)
        .with_baud_rate(baud_rate)
        .with_timeout(Duration::from_millis(config.serial.timeout_ms))
        .with_startup_delay(Duration::from_millis(config.serial.startup_delay_ms));

    let mut options = CheckOptions::new(profile);
    options.check_printing = config.mesh.check_printing && !args.no_print_check;
    options.max_lines = config.mesh.max_lines;

    if !args.quiet {
        println!(
            "{} Querying {} on {} (baud: {}, command: {})",
            "[*]".cyan().bold(),
            options.profile.name.white(),
            port_path.white(),
            baud_rate,
            options.profile.mesh_command
        );
    }

    let mut store = StateStore::open(&config.state_file)?;
    let outcome = run_check(
        || SerialConnection::open(port_config),
        &mut store,
        &options,
    )?;

    if args.quiet {
        println!("{}", outcome.variation);
    } else {
        outcome.print_report();
    }

    Ok(())
}

fn handle_parse(file: &Path, firmware: &str, format: Option<&str>) -> Result<()> {
    let format = format.map(str::parse::<ResponseFormat>).transpose()?;
    let profile = resolve_profile(firmware, None, format)?;

    let text = fs::read_to_string(file)
        .with_context(|| format!("Failed to read response file: {}", file.display()))?;
    let points = mesh::parse_text(&text, profile.format)?;

    println!(
        "{} Parsing {} as {}\n",
        "[*]".cyan().bold(),
        file.display(),
        profile.format
    );

    let Some(stats) = MeshStats::from_points(&points) else {
        eprintln!("{} No bed leveling data found", "[ERROR]".red().bold());
        std::process::exit(1);
    };

    println!("{}", "=".repeat(60));
    println!("{}", "Mesh Statistics".cyan().bold());
    println!("{}", "=".repeat(60));
    println!("  Points: {}", stats.count);
    println!("  Min: {:+.3} mm", stats.min);
    println!("  Max: {:+.3} mm", stats.max);
    println!(
        "  Variation: {}",
        format!("{:.3} mm", stats.variation).white().bold()
    );
    println!("{}", "=".repeat(60));

    Ok(())
}

fn handle_state(config: &AppConfig, cmd: StateCommands) -> Result<()> {
    let mut store = StateStore::open(&config.state_file)?;

    match cmd {
        StateCommands::Show => store.print_report(),
        StateCommands::Reset => {
            store.reset()?;
            println!(
                "{} Cleared stored mesh in {}",
                "[OK]".green().bold(),
                store.path().display()
            );
        }
    }

    Ok(())
}

fn handle_firmware(cmd: FirmwareCommands) -> Result<()> {
    match cmd {
        FirmwareCommands::List => {
            println!("{}", "=".repeat(60));
            println!("{}", "Supported Firmware Profiles".cyan().bold());
            println!("{}", "=".repeat(60));

            for name in profile_names() {
                if let Some(profile) = get_profile(name) {
                    println!("\n  {}: {}", name.white().bold(), profile.description);
                    println!("    Mesh command: {}", profile.mesh_command);
                    println!("    Layout: {}", profile.format);
                }
            }

            println!("\n{}", "=".repeat(60));
            println!(
                "Use {} to see detailed profile information",
                "mesh-variation firmware show <firmware>".cyan()
            );
        }

        FirmwareCommands::Show { firmware } => {
            let profile =
                get_profile(&firmware).ok_or_else(|| MeshError::UnknownFirmware(firmware))?;
            print_firmware_profile(profile);
        }
    }

    Ok(())
}

fn print_firmware_profile(profile: &FirmwareProfile) {
    println!("{}", "=".repeat(70));
    println!("{}", format!("Firmware Profile: {}", profile.name).cyan().bold());
    println!("{}", "=".repeat(70));

    println!("  ID: {}", profile.id);
    println!("  Description: {}", profile.description);
    println!("  Mesh command: {}", profile.mesh_command);
    println!("  Response layout: {}", profile.format);
    println!(
        "  Print status command: {}",
        profile.status_command.as_deref().unwrap_or("none")
    );
    println!("  Default baud rate: {}", profile.baud_rate);

    if !profile.error_patterns.is_empty() {
        println!("\n{}", "Error Patterns:".white().bold());
        for pattern in &profile.error_patterns {
            println!("  {}", pattern.dimmed());
        }
    }

    println!("{}", "=".repeat(70));
}

#[cfg(feature = "serial")]
fn handle_serial(cmd: SerialCommands) -> Result<()> {
    match cmd {
        SerialCommands::List => {
            serial::port::print_ports()?;
        }

        SerialCommands::Detect => {
            println!("{} Detecting printer boards...", "[*]".cyan().bold());

            let ports = serial::port::detect_printer_ports()?;

            if ports.is_empty() {
                println!("{}", "No printer boards detected".yellow());
                println!("\n{}", "Troubleshooting:".white().bold());
                println!("  1. Connect the printer over USB and power it on");
                println!("  2. Check permissions: sudo usermod -aG dialout $USER");
                println!("  3. Check dmesg for connection events");
            } else {
                println!("\n{}", "Detected printer boards:".green().bold());
                for port in &ports {
                    println!("\n  {}", port.path.white().bold());
                    if let Some(vendor) = port.board {
                        println!("    Board: {}", vendor);
                    }
                    if let Some(ref prod) = port.product {
                        println!("    Product: {}", prod);
                    }
                }
                println!("\n{}", "To check the mesh:".cyan());
                println!("  mesh-variation check -p {}", ports[0].path.white());
            }
        }
    }

    Ok(())
}

fn handle_generate(cmd: GenerateCommands) -> Result<()> {
    match cmd {
        GenerateCommands::Config { output } => {
            let config = AppConfig::generate_default();

            if let Some(path) = output {
                fs::write(&path, &config)?;
                println!(
                    "{} Config written to {}",
                    "[OK]".green().bold(),
                    path.display()
                );
            } else {
                println!("{}", config);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_resolve_profile_overrides() {
        let profile = resolve_profile("prusa", Some("G81 V"), Some(ResponseFormat::Auto)).unwrap();
        assert_eq!(profile.id, "prusa");
        assert_eq!(profile.mesh_command, "G81 V");
        assert_eq!(profile.format, ResponseFormat::Auto);
    }

    #[test]
    fn test_resolve_unknown_profile() {
        assert!(resolve_profile("repetier", None, None).is_err());
    }
}
