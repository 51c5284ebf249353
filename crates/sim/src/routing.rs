//! Pluggable street routing.
//!
//! Road vehicles want geometry that follows actual streets. The provider
//! trait keeps the engine independent of where that geometry comes from:
//! an OSRM server, a canned fixture, or plain straight segments.

use std::future::Future;
use std::pin::Pin;

use geo::Point;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("Routing request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Routing service rejected the request: {0}")]
    Rejected(String),

    #[error("Malformed routing response: {0}")]
    Malformed(String),
}

pub type RoutingResult<T> = std::result::Result<T, RoutingError>;

/// Produce street-following geometry through an ordered list of waypoints.
pub trait RouteProvider: Send + Sync {
    fn street_path<'a>(
        &'a self,
        waypoints: &'a [Point],
    ) -> Pin<Box<dyn Future<Output = RoutingResult<Vec<Point>>> + Send + 'a>>;
}

// ============================================================================
// Straight-Line Router
// ============================================================================

/// Connects the waypoints directly. The offline fallback and the test double.
pub struct StraightLineRouter;

impl RouteProvider for StraightLineRouter {
    fn street_path<'a>(
        &'a self,
        waypoints: &'a [Point],
    ) -> Pin<Box<dyn Future<Output = RoutingResult<Vec<Point>>> + Send + 'a>> {
        Box::pin(async move { Ok(waypoints.to_vec()) })
    }
}

// ============================================================================
// OSRM Router
// ============================================================================

/// Routes over an OSRM `route/v1/driving` endpoint.
pub struct OsrmRouter {
    base_url: String,
    client: reqwest::Client,
}

/// The public demo server. Fine for development, not for production traffic.
pub const OSRM_PUBLIC_URL: &str = "https://router.project-osrm.org";

impl OsrmRouter {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn route_url(&self, waypoints: &[Point]) -> String {
        format!(
            "{}/route/v1/driving/{}?overview=full&geometries=geojson",
            self.base_url,
            waypoint_query(waypoints)
        )
    }
}

impl RouteProvider for OsrmRouter {
    fn street_path<'a>(
        &'a self,
        waypoints: &'a [Point],
    ) -> Pin<Box<dyn Future<Output = RoutingResult<Vec<Point>>> + Send + 'a>> {
        Box::pin(async move {
            let url = self.route_url(waypoints);
            let response: OsrmResponse = self.client.get(&url).send().await?.json().await?;
            decode_response(response)
        })
    }
}

/// OSRM wants "lon,lat;lon,lat;..." path segments.
fn waypoint_query(waypoints: &[Point]) -> String {
    waypoints
        .iter()
        .map(|p| format!("{},{}", p.x(), p.y()))
        .collect::<Vec<_>>()
        .join(";")
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

fn decode_response(response: OsrmResponse) -> RoutingResult<Vec<Point>> {
    if response.code != "Ok" {
        return Err(RoutingError::Rejected(response.code));
    }
    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| RoutingError::Malformed("no routes in response".to_string()))?;
    Ok(route
        .geometry
        .coordinates
        .into_iter()
        .map(|[lon, lat]| Point::new(lon, lat))
        .collect())
}
