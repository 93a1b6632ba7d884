//! Bed leveling mesh handling
//!
//! This module provides functionality for:
//! - Extracting mesh height values from firmware responses
//! - Computing the mesh variation (max minus min height)

pub mod parse;
pub mod stats;

pub use parse::{parse_response, parse_text, ResponseFormat};
pub use stats::MeshStats;
