//! R-tree nodes for spatial indexing.
//!
//! Wraps transit entities with geometric data for efficient spatial queries.
//!
//! ## Two-Stage Filtering
//!
//! The spatial queries use a two-stage filtering approach:
//! 1. **R-tree filter**: Uses Euclidean distance for fast approximate filtering
//! 2. **Haversine filter**: Applies accurate geodesic distance on filtered results
//!
//! This approach balances performance (fast Euclidean checks in the R-tree) with
//! accuracy (precise Haversine distance for final results), which is especially
//! important for geographic coordinates where Euclidean distance becomes
//! increasingly inaccurate over larger distances.

use std::sync::Arc;
use geo::Point;
use rstar::{RTreeObject, AABB, PointDistance};

use crate::snapshot::Stop;

// ============================================================================
// Stop Spatial Node
// ============================================================================

#[derive(Clone)]
pub struct StopNode {
    pub stop: Arc<Stop>,
    point: [f64; 2],
}

impl StopNode {
    pub fn new(location: Point, stop: Arc<Stop>) -> Self {
        Self {
            stop,
            point: [location.x(), location.y()],
        }
    }
}

impl RTreeObject for StopNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for StopNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}
