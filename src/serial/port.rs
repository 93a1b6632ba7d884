//! Serial port configuration and connection management
//!
//! Handles USB serial port discovery and the G-code link to printer boards.

use crate::transport::Transport;
use anyhow::{Context, Result};
use colored::Colorize;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;

/// Default baud rate for Marlin and Prusa boards
pub const DEFAULT_BAUD: u32 = 115200;

/// Link settings for a printer board. Framing is always 8N1 without flow
/// control, which is what Marlin and Prusa firmware expect.
#[derive(Debug, Clone)]
pub struct PortConfig {
    pub port_path: String,
    pub baud_rate: u32,
    /// Silence this long ends a response
    pub timeout: Duration,
    /// Wait after opening before talking to the board
    pub startup_delay: Duration,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            port_path: String::from("/dev/ttyACM0"),
            baud_rate: DEFAULT_BAUD,
            timeout: Duration::from_secs(1),
            startup_delay: Duration::from_secs(2),
        }
    }
}

impl PortConfig {
    /// Create a new configuration with default settings
    pub fn new(port_path: &str) -> Self {
        Self {
            port_path: port_path.to_string(),
            ..Default::default()
        }
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the post-open delay
    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }
}

/// Wrapper around a serial port connection to a printer board
pub struct SerialConnection {
    port: Box<dyn SerialPort>,
    config: PortConfig,
}

impl SerialConnection {
    /// Open the port and let the board settle. Most boards reboot when the
    /// port opens, so whatever they print during the startup delay is
    /// discarded. serialport's builder defaults are already 8N1.
    pub fn open(config: PortConfig) -> Result<Self> {
        let mut port = serialport::new(&config.port_path, config.baud_rate)
            .timeout(config.timeout)
            .open()
            .with_context(|| format!("Failed to open serial port: {}", config.port_path))?;

        if !config.startup_delay.is_zero() {
            log::debug!("Waiting {:?} for the board to reset", config.startup_delay);
            std::thread::sleep(config.startup_delay);
        }
        port.clear(serialport::ClearBuffer::Input)
            .context("Failed to discard boot banner")?;

        log::info!("Connected to {} at {} baud", config.port_path, config.baud_rate);
        Ok(Self { port, config })
    }
}

impl Transport for SerialConnection {
    fn write_line(&mut self, line: &str) -> Result<()> {
        self.port
            .write_all(format!("{}\n", line).as_bytes())
            .and_then(|_| self.port.flush())
            .with_context(|| format!("Failed to send {:?} to {}", line, self.config.port_path))
    }

    /// Bytes up to `\n`, with a trailing `\r` dropped. A timeout before any
    /// byte arrives ends the response.
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            match self.port.read(&mut byte) {
                Ok(0) => break,
                Ok(_) if byte[0] == b'\n' => return Ok(Some(decode_line(line))),
                Ok(_) => line.push(byte[0]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => break,
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to read from {}", self.config.port_path)
                    })
                }
            }
        }

        Ok((!line.is_empty()).then(|| decode_line(line)))
    }
}

fn decode_line(mut line: Vec<u8>) -> String {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8_lossy(&line).into_owned()
}

/// USB vendor IDs seen on printer controller boards
const PRINTER_VENDOR_IDS: &[(u16, &str)] = &[
    (0x2341, "Arduino"),
    (0x2a03, "Arduino"),
    (0x2c99, "Prusa Research"),
    (0x0483, "STMicroelectronics"),
    (0x1d50, "OpenMoko (Marlin/Klipper USB)"),
    (0x1a86, "WCH CH340"),
    (0x0403, "FTDI"),
    (0x10c4, "Silicon Labs CP210x"),
];

/// A serial port as seen from the printer side: USB ids plus the board
/// vendor they map to. Non-USB ports carry no ids and never match a board.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardPort {
    pub path: String,
    pub usb_id: Option<(u16, u16)>,
    /// Product string reported by the USB device
    pub product: Option<String>,
    pub board: Option<&'static str>,
}

impl BoardPort {
    pub fn from_port_info(info: serialport::SerialPortInfo) -> Self {
        match info.port_type {
            serialport::SerialPortType::UsbPort(usb) => Self {
                path: info.port_name,
                usb_id: Some((usb.vid, usb.pid)),
                product: usb.product.or(usb.manufacturer),
                board: board_vendor(usb.vid),
            },
            _ => Self {
                path: info.port_name,
                usb_id: None,
                product: None,
                board: None,
            },
        }
    }

    pub fn is_printer(&self) -> bool {
        self.board.is_some()
    }
}

/// Board vendor for a USB vendor id
pub fn board_vendor(vid: u16) -> Option<&'static str> {
    PRINTER_VENDOR_IDS
        .iter()
        .find(|(v, _)| *v == vid)
        .map(|(_, name)| *name)
}

/// Enumerate serial ports, printer boards first
pub fn list_ports() -> Result<Vec<BoardPort>> {
    let mut ports: Vec<BoardPort> = serialport::available_ports()
        .context("Failed to enumerate serial ports")?
        .into_iter()
        .map(BoardPort::from_port_info)
        .collect();
    ports.sort_by_key(|p| !p.is_printer());
    Ok(ports)
}

/// Ports that look like printer controller boards
pub fn detect_printer_ports() -> Result<Vec<BoardPort>> {
    Ok(list_ports()?.into_iter().filter(BoardPort::is_printer).collect())
}

/// Print one line per serial port with the board it belongs to
pub fn print_ports() -> Result<()> {
    let ports = list_ports()?;

    if ports.is_empty() {
        println!("{}", "No serial ports found".yellow());
        println!("  Is the printer connected over USB and powered on?");
        println!("  Permissions: sudo usermod -aG dialout $USER");
        return Ok(());
    }

    println!("{}", "Serial Ports:".green().bold());
    for port in &ports {
        let id = port
            .usb_id
            .map(|(vid, pid)| format!("{:04x}:{:04x}", vid, pid))
            .unwrap_or_else(|| "-".to_string());
        let board = match port.board {
            Some(board) => board.green(),
            None => "not a printer board".dimmed(),
        };
        println!(
            "  {:<20} {:<10} {} {}",
            port.path.white().bold(),
            id,
            board,
            port.product.as_deref().unwrap_or("").dimmed()
        );
    }

    println!(
        "\n{}",
        "Use: mesh-variation check --port <PORT> to query the bed mesh".yellow()
    );

    Ok(())
}
