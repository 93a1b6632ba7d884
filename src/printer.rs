//! Print job status detection
//!
//! Parses the firmware's SD print status report (`M27`) so a mesh query is
//! never sent while a job is running.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintStatus {
    Idle,
    Printing { done: u64, total: u64 },
    Unknown,
}

impl PrintStatus {
    pub fn is_printing(&self) -> bool {
        matches!(self, PrintStatus::Printing { .. })
    }
}

impl fmt::Display for PrintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrintStatus::Idle => write!(f, "idle"),
            PrintStatus::Printing { done, total } => {
                write!(f, "printing ({}/{} bytes)", done, total)
            }
            PrintStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Interpret a print status response.
///
/// Marlin and Prusa report `SD printing byte 1234/56789` while a job runs and
/// `Not SD printing` otherwise.
pub fn parse_print_status<S: AsRef<str>>(lines: &[S]) -> PrintStatus {
    for line in lines {
        let line = line.as_ref().trim();

        if line.contains("Not SD printing") || line.contains("Done printing") {
            return PrintStatus::Idle;
        }

        if let Some(progress) = line.split("SD printing byte").nth(1) {
            if let Some((done, total)) = progress.trim().split_once('/') {
                if let (Ok(done), Ok(total)) = (
                    done.trim().parse::<u64>(),
                    total.trim().parse::<u64>(),
                ) {
                    return if done < total {
                        PrintStatus::Printing { done, total }
                    } else {
                        PrintStatus::Idle
                    };
                }
            }
        }
    }

    PrintStatus::Unknown
}
