//! Route geometry and progress interpolation.
//!
//! A path is an ordered polyline with cached cumulative haversine distances,
//! so mapping a scalar progress in [0, 1] to a coordinate is a binary search
//! plus one linear interpolation.

use geo::Point;
use headway_transit::models::types::TransitMode;
use headway_transit::spatial::queries::haversine_distance;
use itertools::Itertools;
use tracing::warn;

use crate::routing::RouteProvider;

// ============================================================================
// Route Path
// ============================================================================

#[derive(Clone, Debug)]
pub struct RoutePath {
    points: Vec<Point>,
    /// `cumulative_m[i]` is the distance from the first point to `points[i]`.
    cumulative_m: Vec<f64>,
    length_m: f64,
}

impl RoutePath {
    /// Returns `None` for degenerate input: a path needs at least two points.
    pub fn from_points(points: Vec<Point>) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }
        let mut cumulative_m = Vec::with_capacity(points.len());
        cumulative_m.push(0.0);
        let mut length_m = 0.0;
        for (a, b) in points.iter().tuple_windows() {
            length_m += haversine_distance(*a, *b);
            cumulative_m.push(length_m);
        }
        Some(Self {
            points,
            cumulative_m,
            length_m,
        })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn length_meters(&self) -> f64 {
        self.length_m
    }

    /// The coordinate at a fraction of the path's length.
    ///
    /// Progress 0 is exactly the first point and progress 1 exactly the last;
    /// out-of-range input clamps to those endpoints.
    pub fn point_at_progress(&self, progress: f64) -> Point {
        let progress = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if progress <= 0.0 {
            return self.points[0];
        }
        if progress >= 1.0 {
            return self.points[self.points.len() - 1];
        }

        let target = self.length_m * progress;
        let idx = self.cumulative_m.partition_point(|&d| d < target);
        if idx == 0 {
            // Zero-length path: every fraction is the start
            return self.points[0];
        }
        if idx >= self.points.len() {
            return self.points[self.points.len() - 1];
        }

        let seg_start = self.cumulative_m[idx - 1];
        let seg_len = self.cumulative_m[idx] - seg_start;
        let ratio = if seg_len > 0.0 {
            (target - seg_start) / seg_len
        } else {
            0.0
        };
        let a = self.points[idx - 1];
        let b = self.points[idx];
        Point::new(a.x() + (b.x() - a.x()) * ratio, a.y() + (b.y() - a.y()) * ratio)
    }

    /// Fraction of the path at the vertex closest to `point`.
    ///
    /// Vertex resolution is enough here: callers use it to place stops along
    /// the path, and the path passes through or very near every stop.
    pub fn progress_near(&self, point: Point) -> f64 {
        if self.length_m <= 0.0 {
            return 0.0;
        }
        let mut best_idx = 0;
        let mut best_dist = f64::INFINITY;
        for (idx, vertex) in self.points.iter().enumerate() {
            let dist = haversine_distance(point, *vertex);
            if dist < best_dist {
                best_dist = dist;
                best_idx = idx;
            }
        }
        self.cumulative_m[best_idx] / self.length_m
    }
}

// ============================================================================
// Path Construction
// ============================================================================

/// Build the drawn path for a line's stop coordinates.
///
/// Fixed-guideway modes connect their stops directly. Road modes ask the
/// street router; if that fails for any reason the vehicle still has to move,
/// so the path silently degrades to straight segments.
pub async fn build_path(
    coords: &[Point],
    mode: TransitMode,
    router: &dyn RouteProvider,
) -> Option<RoutePath> {
    if coords.len() < 2 {
        return None;
    }
    if mode.uses_street_routing() {
        match router.street_path(coords).await {
            Ok(routed) if routed.len() >= 2 => return RoutePath::from_points(routed),
            Ok(routed) => {
                warn!(points = routed.len(), "street route too short, using straight segments");
            }
            Err(e) => {
                warn!(error = %e, "street routing unavailable, using straight segments");
            }
        }
    }
    RoutePath::from_points(coords.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{RoutingError, RoutingResult, StraightLineRouter};
    use approx::assert_relative_eq;
    use std::future::Future;
    use std::pin::Pin;

    /// Router double that always errors, as if the service were unreachable.
    struct UnreachableRouter;

    impl RouteProvider for UnreachableRouter {
        fn street_path<'a>(
            &'a self,
            _waypoints: &'a [Point],
        ) -> Pin<Box<dyn Future<Output = RoutingResult<Vec<Point>>> + Send + 'a>> {
            Box::pin(async { Err(RoutingError::Rejected("NoRoute".to_string())) })
        }
    }

    /// Router double that returns a fixed detour regardless of input.
    struct DetourRouter(Vec<Point>);

    impl RouteProvider for DetourRouter {
        fn street_path<'a>(
            &'a self,
            _waypoints: &'a [Point],
        ) -> Pin<Box<dyn Future<Output = RoutingResult<Vec<Point>>> + Send + 'a>> {
            Box::pin(async { Ok(self.0.clone()) })
        }
    }

    fn two_stop_coords() -> Vec<Point> {
        vec![Point::new(0.0, 0.0), Point::new(0.0, 1.0)]
    }

    #[test]
    fn test_endpoints_are_exact() {
        let points = vec![
            Point::new(39.2225, 38.6748),
            Point::new(39.2301, 38.6790),
            Point::new(39.2410, 38.6855),
        ];
        let path = RoutePath::from_points(points.clone()).unwrap();

        assert_eq!(path.point_at_progress(0.0), points[0]);
        assert_eq!(path.point_at_progress(1.0), points[2]);
        // Clamped, not extrapolated
        assert_eq!(path.point_at_progress(-0.5), points[0]);
        assert_eq!(path.point_at_progress(1.5), points[2]);
    }

    #[test]
    fn test_midpoint_interpolation() {
        let path = RoutePath::from_points(two_stop_coords()).unwrap();
        let mid = path.point_at_progress(0.5);
        assert_relative_eq!(mid.x(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(mid.y(), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_length_accumulates_segments() {
        // Two equal-length meridian segments, about 111 km each
        let path = RoutePath::from_points(vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(0.0, 2.0),
        ])
        .unwrap();
        assert_relative_eq!(path.length_meters(), 222_390.0, max_relative = 0.01);
        // A point a quarter in sits halfway up the first segment
        let quarter = path.point_at_progress(0.25);
        assert_relative_eq!(quarter.y(), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_degenerate_path_is_rejected() {
        assert!(RoutePath::from_points(vec![]).is_none());
        assert!(RoutePath::from_points(vec![Point::new(0.0, 0.0)]).is_none());
    }

    #[test]
    fn test_progress_near_vertices() {
        let path = RoutePath::from_points(vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(0.0, 2.0),
        ])
        .unwrap();
        assert_relative_eq!(path.progress_near(Point::new(0.0, 0.0)), 0.0);
        assert_relative_eq!(path.progress_near(Point::new(0.0, 1.0)), 0.5, epsilon = 1e-6);
        assert_relative_eq!(path.progress_near(Point::new(0.0, 2.0)), 1.0);
        // Off-path points resolve to the nearest vertex
        assert_relative_eq!(path.progress_near(Point::new(0.1, 1.05)), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_build_path_straight_for_fixed_guideway() {
        // A tram must ignore the router even when one is wired up
        let detour = DetourRouter(vec![
            Point::new(5.0, 5.0),
            Point::new(6.0, 6.0),
        ]);
        let path = pollster::block_on(build_path(&two_stop_coords(), TransitMode::Tram, &detour))
            .unwrap();
        assert_eq!(path.points(), two_stop_coords().as_slice());
    }

    #[test]
    fn test_build_path_uses_router_for_road() {
        let detour = DetourRouter(vec![
            Point::new(0.0, 0.0),
            Point::new(0.2, 0.5),
            Point::new(0.0, 1.0),
        ]);
        let path = pollster::block_on(build_path(&two_stop_coords(), TransitMode::Bus, &detour))
            .unwrap();
        assert_eq!(path.points().len(), 3);
        assert_eq!(path.points()[1], Point::new(0.2, 0.5));
    }

    #[test]
    fn test_build_path_falls_back_when_routing_fails() {
        let path = pollster::block_on(build_path(
            &two_stop_coords(),
            TransitMode::Bus,
            &UnreachableRouter,
        ))
        .unwrap();
        assert_eq!(path.points(), two_stop_coords().as_slice());
    }

    #[test]
    fn test_build_path_falls_back_on_short_route() {
        let stub = DetourRouter(vec![Point::new(9.0, 9.0)]);
        let path = pollster::block_on(build_path(&two_stop_coords(), TransitMode::Bus, &stub))
            .unwrap();
        assert_eq!(path.points(), two_stop_coords().as_slice());
    }

    #[test]
    fn test_build_path_rejects_degenerate_input() {
        let coords = vec![Point::new(0.0, 0.0)];
        let path = pollster::block_on(build_path(&coords, TransitMode::Bus, &StraightLineRouter));
        assert!(path.is_none());
    }
}
