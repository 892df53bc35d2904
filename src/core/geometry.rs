// core/geometry.rs

// Coordinate types and the distance/bearing math shared by the planner, the
// estimator and the tracker. Planar coordinates are meters in a local map frame
// (x east, y north); geodetic coordinates are WGS84 degrees. Headings and
// bearings are degrees clockwise from north.

// Dependencies
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Planar map position in meters (x east, y north)
pub type PlanarPoint = Vector2<f64>;

/// Mean Earth radius used by the haversine formula (meters)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude in the flat-Earth approximation
pub const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Absolute position in degrees
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        GeoPoint { latitude, longitude }
    }

    /// True when both components are finite and inside the valid degree ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude.abs() <= 90.0
            && self.longitude.abs() <= 180.0
    }
}

/// Which coordinate space a graph, route or navigation session works in.
/// A session never mixes the two.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateMode {
    Planar,
    Geodetic,
}

/// A position that may be known in planar and/or geodetic form
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub planar: Option<PlanarPoint>,
    pub geodetic: Option<GeoPoint>,
}

impl Coordinates {
    pub fn planar(x: f64, y: f64) -> Self {
        Coordinates {
            planar: Some(PlanarPoint::new(x, y)),
            geodetic: None,
        }
    }

    pub fn geodetic(latitude: f64, longitude: f64) -> Self {
        Coordinates {
            planar: None,
            geodetic: Some(GeoPoint::new(latitude, longitude)),
        }
    }

    /// Whether usable coordinates exist for the given mode
    pub fn supports(&self, mode: CoordinateMode) -> bool {
        match mode {
            CoordinateMode::Planar => self
                .planar
                .map(|p| p.x.is_finite() && p.y.is_finite())
                .unwrap_or(false),
            CoordinateMode::Geodetic => self.geodetic.map(|g| g.is_valid()).unwrap_or(false),
        }
    }
}

impl CoordinateMode {
    /// Straight-line distance in meters between two positions in this mode.
    /// Returns `None` when either side lacks coordinates for the mode.
    pub fn distance(self, from: &Coordinates, to: &Coordinates) -> Option<f64> {
        match self {
            CoordinateMode::Planar => Some(planar_distance(&from.planar?, &to.planar?)),
            CoordinateMode::Geodetic => Some(haversine_distance(from.geodetic?, to.geodetic?)),
        }
    }

    /// Bearing in degrees [0, 360) from `from` toward `to` in this mode
    pub fn bearing(self, from: &Coordinates, to: &Coordinates) -> Option<f64> {
        match self {
            CoordinateMode::Planar => Some(planar_bearing(&from.planar?, &to.planar?)),
            CoordinateMode::Geodetic => Some(initial_bearing(from.geodetic?, to.geodetic?)),
        }
    }
}

/// Pick the coordinate mode covering the most positions. Planar wins when every
/// position has planar coordinates, or on a tie.
pub fn dominant_mode<'a, I>(positions: I) -> CoordinateMode
where
    I: IntoIterator<Item = &'a Coordinates>,
{
    let (mut planar, mut geodetic) = (0usize, 0usize);
    for position in positions {
        if position.supports(CoordinateMode::Planar) {
            planar += 1;
        }
        if position.supports(CoordinateMode::Geodetic) {
            geodetic += 1;
        }
    }
    if geodetic > planar {
        CoordinateMode::Geodetic
    } else {
        CoordinateMode::Planar
    }
}

/// Euclidean distance between two planar points
pub fn planar_distance(a: &PlanarPoint, b: &PlanarPoint) -> f64 {
    (b - a).norm()
}

/// Compass bearing from `from` to `to` on the planar map (0 = +y, 90 = +x)
pub fn planar_bearing(from: &PlanarPoint, to: &PlanarPoint) -> f64 {
    let d = to - from;
    normalize_heading(d.x.atan2(d.y).to_degrees())
}

/// Great-circle distance in meters
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Initial great-circle bearing from `a` to `b`, degrees [0, 360)
pub fn initial_bearing(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    normalize_heading(y.atan2(x).to_degrees())
}

/// Wrap an angle in degrees to [0, 360)
#[inline]
pub fn normalize_heading(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Wrap an angle in degrees to (-180, 180]
#[inline]
pub fn normalize_relative(degrees: f64) -> f64 {
    let wrapped = normalize_heading(degrees);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Signed shortest rotation taking `from` onto `to`, degrees (-180, 180]
#[inline]
pub fn shortest_angle_diff(from: f64, to: f64) -> f64 {
    normalize_relative(to - from)
}

/// Local flat-Earth mapping between geodetic and planar coordinates,
/// pinned at a single anchor point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalProjection {
    origin_geo: GeoPoint,
    origin_planar: PlanarPoint,
    meters_per_degree_lon: f64,
}

impl LocalProjection {
    pub fn new(anchor: GeoPoint, planar: PlanarPoint) -> Self {
        LocalProjection {
            origin_geo: anchor,
            origin_planar: planar,
            meters_per_degree_lon: METERS_PER_DEGREE_LAT * anchor.latitude.to_radians().cos(),
        }
    }

    pub fn anchor(&self) -> GeoPoint {
        self.origin_geo
    }

    /// Project an absolute position into the planar frame
    pub fn to_planar(&self, point: GeoPoint) -> PlanarPoint {
        let east = (point.longitude - self.origin_geo.longitude) * self.meters_per_degree_lon;
        let north = (point.latitude - self.origin_geo.latitude) * METERS_PER_DEGREE_LAT;
        self.origin_planar + PlanarPoint::new(east, north)
    }

    /// Inverse of [`to_planar`](Self::to_planar)
    pub fn to_geo(&self, point: &PlanarPoint) -> GeoPoint {
        let offset = point - self.origin_planar;
        let longitude = if self.meters_per_degree_lon.abs() > f64::EPSILON {
            self.origin_geo.longitude + offset.x / self.meters_per_degree_lon
        } else {
            self.origin_geo.longitude
        };
        GeoPoint::new(
            self.origin_geo.latitude + offset.y / METERS_PER_DEGREE_LAT,
            longitude,
        )
    }
}
