//! Line oriented link to printer firmware

use anyhow::Result;

/// Upper bound on lines read for a single command
pub const DEFAULT_MAX_LINES: usize = 256;

/// A G-code link that exchanges text lines with the firmware
pub trait Transport {
    /// Write one line; the `\n` terminator is added here
    fn write_line(&mut self, line: &str) -> Result<()>;

    /// Read one line without its terminator, `None` once the read times out
    fn read_line(&mut self) -> Result<Option<String>>;

    /// Send a command and collect its response.
    ///
    /// Stops at a read timeout, after the firmware's `ok` acknowledgement
    /// (kept in the result), or after `max_lines` lines.
    fn query(&mut self, command: &str, max_lines: usize) -> Result<Vec<String>> {
        log::debug!("TX: {}", command);
        self.write_line(command)?;

        let mut lines = Vec::new();
        while lines.len() < max_lines {
            let Some(line) = self.read_line()? else {
                break;
            };
            log::debug!("RX: {}", line);

            let done = line.trim() == "ok";
            lines.push(line);
            if done {
                break;
            }
        }

        Ok(lines)
    }
}
