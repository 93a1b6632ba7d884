//! Serial port communication with printer boards
//!
//! This module provides functionality for:
//! - Listing available serial ports and spotting printer controllers
//! - Exchanging G-code lines with the firmware

pub mod port;

pub use port::{PortConfig, SerialConnection};
