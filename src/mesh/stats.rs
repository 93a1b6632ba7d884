//! Mesh variation statistics

use crate::state::MeshState;

/// Summary of one mesh report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshStats {
    pub min: f64,
    pub max: f64,
    /// Always `max - min`
    pub variation: f64,
    pub count: usize,
}

impl MeshStats {
    /// Compute statistics over mesh points, `None` when there are no points
    pub fn from_points(points: &[f64]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &p in points {
            min = min.min(p);
            max = max.max(p);
        }

        Some(Self {
            min,
            max,
            variation: max - min,
            count: points.len(),
        })
    }

    /// Whether the stored extremes are exactly the same as this mesh's
    pub fn matches(&self, state: &MeshState) -> bool {
        state.last_mesh_min == Some(self.min) && state.last_mesh_max == Some(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points() {
        let stats = MeshStats::from_points(&[0.1, -0.25, 0.3, 0.0]).unwrap();
        assert_eq!(stats.min, -0.25);
        assert_eq!(stats.max, 0.3);
        assert_eq!(stats.variation, 0.3 - -0.25);
        assert_eq!(stats.count, 4);
    }

    #[test]
    fn test_single_point_has_no_variation() {
        let stats = MeshStats::from_points(&[0.42]).unwrap();
        assert_eq!(stats.variation, 0.0);
    }

    #[test]
    fn test_empty_points() {
        assert!(MeshStats::from_points(&[]).is_none());
    }

    #[test]
    fn test_matches_state() {
        let stats = MeshStats::from_points(&[0.1, 0.2]).unwrap();

        assert!(!stats.matches(&MeshState::default()));

        let state = MeshState {
            last_mesh_min: Some(0.1),
            last_mesh_max: Some(0.2),
            last_mesh_variation: 0.1,
            updated_at: None,
        };
        assert!(stats.matches(&state));

        let moved = MeshState {
            last_mesh_max: Some(0.25),
            ..state
        };
        assert!(!stats.matches(&moved));
    }
}
