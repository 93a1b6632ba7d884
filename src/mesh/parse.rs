//! Firmware mesh report parser
//!
//! Understands two report layouts:
//! - Grid: a title line followed by whitespace separated rows, as printed by
//!   Marlin's `M420 V` and Prusa's `G81`
//! - Mesh line: a single `MESH;v1,v2,...` line

use crate::error::MeshError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Layout of the mesh report in a firmware response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseFormat {
    Grid,
    MeshLine,
    /// Mesh line if a `MESH` line is present, grid otherwise
    #[default]
    Auto,
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseFormat::Grid => write!(f, "grid"),
            ResponseFormat::MeshLine => write!(f, "mesh-line"),
            ResponseFormat::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for ResponseFormat {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "grid" => Ok(ResponseFormat::Grid),
            "mesh-line" | "mesh_line" | "mesh" => Ok(ResponseFormat::MeshLine),
            "auto" => Ok(ResponseFormat::Auto),
            other => Err(MeshError::UnknownFormat(other.to_string())),
        }
    }
}

const MESH_PREFIX: &str = "MESH";

/// Parse raw response text (as captured from a terminal or log)
pub fn parse_text(text: &str, format: ResponseFormat) -> Result<Vec<f64>, MeshError> {
    let lines: Vec<&str> = text.lines().collect();
    parse_response(&lines, format)
}

/// Extract mesh height values from the lines of a firmware response.
///
/// An empty result means the response held no mesh data; the caller decides
/// whether that is an error.
pub fn parse_response<S: AsRef<str>>(
    lines: &[S],
    format: ResponseFormat,
) -> Result<Vec<f64>, MeshError> {
    match format {
        ResponseFormat::Grid => Ok(parse_grid(lines)),
        ResponseFormat::MeshLine => parse_mesh_line(lines),
        ResponseFormat::Auto => {
            if lines.iter().any(|l| is_mesh_line(l.as_ref())) {
                parse_mesh_line(lines)
            } else {
                Ok(parse_grid(lines))
            }
        }
    }
}

fn is_mesh_line(line: &str) -> bool {
    line.trim_start().starts_with(MESH_PREFIX)
}

fn parse_grid<S: AsRef<str>>(lines: &[S]) -> Vec<f64> {
    // First line is the report title
    lines
        .iter()
        .skip(1)
        .filter_map(|line| parse_grid_row(line.as_ref()))
        .flatten()
        .collect()
}

/// Parse one grid row, or `None` if the line is not a row of heights
fn parse_grid_row(line: &str) -> Option<Vec<f64>> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    // Column index header
    if tokens.iter().all(|t| is_index(t)) {
        return None;
    }

    let values = if tokens.len() > 1 && is_index(tokens[0]) {
        &tokens[1..]
    } else {
        &tokens[..]
    };

    let mut row = Vec::with_capacity(values.len());
    for token in values {
        if is_unprobed(token) {
            continue;
        }
        match token.parse::<f64>() {
            Ok(v) if v.is_finite() => row.push(v),
            _ => return None,
        }
    }

    Some(row)
}

fn is_index(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

fn is_unprobed(token: &str) -> bool {
    matches!(token, "." | "=") || token.eq_ignore_ascii_case("nan")
}

fn parse_mesh_line<S: AsRef<str>>(lines: &[S]) -> Result<Vec<f64>, MeshError> {
    let Some((index, line)) = lines
        .iter()
        .enumerate()
        .find(|(_, l)| is_mesh_line(l.as_ref()))
    else {
        return Ok(Vec::new());
    };

    // Values live between the first and second ';'
    let Some(data) = line.as_ref().split(';').nth(1).map(str::trim) else {
        return Ok(Vec::new());
    };
    if data.is_empty() {
        return Ok(Vec::new());
    }

    // An empty field is a dropped value, not an unprobed point
    let mut points = Vec::new();
    for field in data.split(',') {
        let field = field.trim();
        if is_unprobed(field) {
            continue;
        }
        let value: f64 = field.parse().map_err(|_| MeshError::InvalidValue {
            line: index + 1,
            value: field.to_string(),
        })?;
        if value.is_finite() {
            points.push(value);
        }
    }

    Ok(points)
}
