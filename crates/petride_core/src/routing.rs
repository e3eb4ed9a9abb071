//! Pluggable route providers and the rider-side route query.
//!
//! - **`StraightLineRouteProvider`**: haversine distance at city speed. No dependencies.
//! - **`OsrmRouteProvider`** (feature `osrm`): calls an OSRM HTTP endpoint,
//!   by default the public demo server.
//! - **`CachedRouteProvider`**: LRU cache in front of any provider.
//!
//! [RouteQuery] resolves lookups through the clock, so a lookup superseded by
//! a newer origin/destination pair never overwrites the newer result.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use bevy_ecs::prelude::Resource;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{EventKind, EventSubject, SimulationClock};
use crate::error::RouteError;
use crate::geo::Coordinate;

/// Average city speed used when no road network is available.
const CITY_SPEED_KMH: f64 = 40.0;

pub const DEFAULT_OSRM_ENDPOINT: &str = "https://router.project-osrm.org";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    /// Geometry from origin to destination.
    pub coordinates: Vec<Coordinate>,
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

impl RouteResult {
    pub fn distance_km(&self) -> f64 {
        self.distance_meters / 1000.0
    }
}

/// Which routing backend to use.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RouteProviderKind {
    #[default]
    StraightLine,
    #[cfg(feature = "osrm")]
    Osrm { endpoint: String },
}

/// Trait for routing backends. `Ok(None)` means the backend answered but
/// found no route.
pub trait RouteProvider: Send + Sync {
    fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<Option<RouteResult>, RouteError>;
}

#[derive(Resource)]
pub struct RouteProviderResource(pub Box<dyn RouteProvider>);

pub struct StraightLineRouteProvider;

impl RouteProvider for StraightLineRouteProvider {
    fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<Option<RouteResult>, RouteError> {
        let distance_km = origin.distance_km(destination);
        Ok(Some(RouteResult {
            coordinates: vec![origin, destination],
            distance_meters: distance_km * 1000.0,
            duration_seconds: distance_km / CITY_SPEED_KMH * 3600.0,
        }))
    }
}

#[cfg(feature = "osrm")]
pub mod osrm {
    use super::*;
    use reqwest::blocking::Client;
    use std::time::Duration;

    pub struct OsrmRouteProvider {
        client: Client,
        endpoint: String,
    }

    impl OsrmRouteProvider {
        pub fn new(endpoint: &str) -> Result<Self, RouteError> {
            let client = Client::builder().timeout(Duration::from_secs(5)).build()?;
            Ok(Self {
                client,
                endpoint: endpoint.trim_end_matches('/').to_string(),
            })
        }
    }

    #[derive(Deserialize)]
    struct OsrmResponse {
        code: String,
        routes: Option<Vec<OsrmRoute>>,
    }

    #[derive(Deserialize)]
    struct OsrmRoute {
        distance: f64, // metres
        duration: f64, // seconds
        geometry: OsrmGeometry,
    }

    #[derive(Deserialize)]
    struct OsrmGeometry {
        coordinates: Vec<[f64; 2]>, // [lng, lat]
    }

    impl RouteProvider for OsrmRouteProvider {
        fn route(
            &self,
            origin: Coordinate,
            destination: Coordinate,
        ) -> Result<Option<RouteResult>, RouteError> {
            let url = format!(
                "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
                self.endpoint, origin.lng, origin.lat, destination.lng, destination.lat,
            );

            let response = self.client.get(&url).send()?;
            if !response.status().is_success() {
                return Err(RouteError::Api(format!("HTTP {}", response.status())));
            }
            let body: OsrmResponse = response.json()?;
            if body.code != "Ok" {
                return Ok(None);
            }
            let Some(route) = body.routes.and_then(|r| r.into_iter().next()) else {
                return Ok(None);
            };

            Ok(Some(RouteResult {
                coordinates: route
                    .geometry
                    .coordinates
                    .iter()
                    .map(|[lng, lat]| Coordinate::new(*lat, *lng))
                    .collect(),
                distance_meters: route.distance,
                duration_seconds: route.duration,
            }))
        }
    }
}

/// LRU-cached wrapper around any [`RouteProvider`]. Only successful lookups
/// are cached.
pub struct CachedRouteProvider {
    inner: Box<dyn RouteProvider>,
    cache: Mutex<LruCache<CacheKey, RouteResult>>,
}

/// Coordinates quantised to ~1 m so float noise does not defeat the cache.
type CacheKey = (i64, i64, i64, i64);

fn cache_key(origin: Coordinate, destination: Coordinate) -> CacheKey {
    let q = |v: f64| (v * 100_000.0).round() as i64;
    (q(origin.lat), q(origin.lng), q(destination.lat), q(destination.lng))
}

impl CachedRouteProvider {
    pub fn new(inner: Box<dyn RouteProvider>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl RouteProvider for CachedRouteProvider {
    fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<Option<RouteResult>, RouteError> {
        let key = cache_key(origin, destination);
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(cached) = cache.get(&key) {
                return Ok(Some(cached.clone()));
            }
        }

        let result = self.inner.route(origin, destination)?;
        if let Some(ref route) = result {
            if let Ok(mut cache) = self.cache.lock() {
                cache.put(key, route.clone());
            }
        }
        Ok(result)
    }
}

#[cfg(feature = "osrm")]
const DEFAULT_ROUTE_CACHE_CAPACITY: usize = 256;

/// Construct a boxed [`RouteProvider`] from a [`RouteProviderKind`] descriptor.
pub fn build_route_provider(kind: &RouteProviderKind) -> Result<Box<dyn RouteProvider>, RouteError> {
    match kind {
        RouteProviderKind::StraightLine => Ok(Box::new(StraightLineRouteProvider)),
        #[cfg(feature = "osrm")]
        RouteProviderKind::Osrm { endpoint } => {
            let inner = Box::new(osrm::OsrmRouteProvider::new(endpoint)?);
            Ok(Box::new(CachedRouteProvider::new(
                inner,
                DEFAULT_ROUTE_CACHE_CAPACITY,
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum RouteState {
    #[default]
    Idle,
    Loading {
        token: u64,
        origin: Coordinate,
        destination: Coordinate,
    },
    Ready(RouteResult),
    Failed(String),
}

#[derive(Debug, Default, Resource)]
pub struct RouteQuery {
    state: RouteState,
    token: u64,
    latency_ms: u64,
}

impl RouteQuery {
    pub fn new(latency_ms: u64) -> Self {
        Self {
            latency_ms,
            ..Self::default()
        }
    }

    pub fn state(&self) -> &RouteState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, RouteState::Loading { .. })
    }

    pub fn route(&self) -> Option<&RouteResult> {
        match &self.state {
            RouteState::Ready(route) => Some(route),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            RouteState::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn formatted_distance(&self) -> Option<String> {
        self.route().map(|r| format_distance(r.distance_meters))
    }

    pub fn formatted_duration(&self) -> Option<String> {
        self.route().map(|r| format_duration(r.duration_seconds))
    }

    /// Starts a lookup for the pair, superseding any lookup in flight. A
    /// missing endpoint clears the query instead.
    pub fn request(
        &mut self,
        clock: &mut SimulationClock,
        origin: Option<Coordinate>,
        destination: Option<Coordinate>,
    ) -> Option<u64> {
        self.token += 1;
        let (Some(origin), Some(destination)) = (origin, destination) else {
            self.state = RouteState::Idle;
            return None;
        };
        debug!(token = self.token, "route lookup requested");
        self.state = RouteState::Loading {
            token: self.token,
            origin,
            destination,
        };
        clock.schedule_in(
            self.latency_ms,
            EventKind::RouteResolved,
            Some(EventSubject::Route(self.token)),
        );
        Some(self.token)
    }

    /// Forgets the current lookup; a pending resolution will be ignored.
    pub fn clear(&mut self, clock: &mut SimulationClock) {
        self.token += 1;
        clock.cancel_where(|e| matches!(e.subject, Some(EventSubject::Route(_))));
        self.state = RouteState::Idle;
    }

    /// Endpoints of the lookup if `token` is still current.
    pub(crate) fn pending(&self, token: u64) -> Option<(Coordinate, Coordinate)> {
        match self.state {
            RouteState::Loading {
                token: pending,
                origin,
                destination,
            } if pending == token && token == self.token => Some((origin, destination)),
            _ => None,
        }
    }

    pub(crate) fn settle(&mut self, outcome: Result<RouteResult, String>) {
        self.state = match outcome {
            Ok(route) => RouteState::Ready(route),
            Err(message) => RouteState::Failed(message),
        };
    }
}

pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{} m", meters.round() as i64)
    } else {
        format!("{:.1} km", meters / 1000.0)
    }
}

pub fn format_duration(seconds: f64) -> String {
    let minutes = (seconds / 60.0).round() as i64;
    if minutes < 60 {
        format!("{minutes} min")
    } else {
        format!("{}h {}min", minutes / 60, minutes % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingProvider(Arc<AtomicUsize>);

    impl RouteProvider for CountingProvider {
        fn route(
            &self,
            origin: Coordinate,
            destination: Coordinate,
        ) -> Result<Option<RouteResult>, RouteError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            StraightLineRouteProvider.route(origin, destination)
        }
    }

    #[test]
    fn straight_line_route_uses_haversine() {
        let a = Coordinate::new(-23.5505, -46.6333);
        let b = Coordinate::new(-23.5614, -46.6559);
        let route = StraightLineRouteProvider
            .route(a, b)
            .expect("provider")
            .expect("route");
        assert!((route.distance_km() - a.distance_km(b)).abs() < 1e-9);
        assert_eq!(route.coordinates, vec![a, b]);
        assert!(route.duration_seconds > 0.0);
    }

    #[test]
    fn cache_serves_repeated_lookups() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = CachedRouteProvider::new(Box::new(CountingProvider(calls.clone())), 8);
        let a = Coordinate::new(1.0, 1.0);
        let b = Coordinate::new(1.01, 1.01);
        provider.route(a, b).expect("first");
        provider.route(a, b).expect("second");
        provider.route(b, a).expect("reverse");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn query_without_endpoint_clears() {
        let mut clock = SimulationClock::default();
        let mut query = RouteQuery::new(0);
        assert_eq!(query.request(&mut clock, Some(Coordinate::new(0.0, 0.0)), None), None);
        assert_eq!(query.state(), &RouteState::Idle);
        assert!(clock.is_empty());
    }

    #[test]
    fn newer_request_makes_older_token_stale() {
        let mut clock = SimulationClock::default();
        let mut query = RouteQuery::new(100);
        let a = Some(Coordinate::new(0.0, 0.0));
        let b = Some(Coordinate::new(0.0, 0.1));
        let first = query.request(&mut clock, a, b).expect("token");
        let second = query.request(&mut clock, b, a).expect("token");
        assert!(query.pending(first).is_none());
        assert!(query.pending(second).is_some());
    }

    #[test]
    fn formats_distance_and_duration() {
        assert_eq!(format_distance(850.4), "850 m");
        assert_eq!(format_distance(2_430.0), "2.4 km");
        assert_eq!(format_duration(720.0), "12 min");
        assert_eq!(format_duration(3_900.0), "1h 5min");
    }
}
