//! Domain errors for mesh parsing and profile lookup

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MeshError {
    /// A field in a `MESH;` report could not be parsed as a number
    #[error("invalid mesh value {value:?} on line {line}")]
    InvalidValue { line: usize, value: String },

    #[error("unknown response format: {0} (expected grid, mesh-line or auto)")]
    UnknownFormat(String),

    #[error("unknown firmware profile: {0}. Use 'mesh-variation firmware list' to see available profiles.")]
    UnknownFirmware(String),
}
