//! Great-circle nearest-neighbour search over grid points.
//!
//! Points are stored in an R-tree as unit vectors on the sphere. The chord
//! between two unit vectors grows monotonically with the great-circle angle,
//! so the Euclidean nearest neighbour is also the haversine nearest
//! neighbour.

use rstar::RTree;
use rstar::primitives::GeomWithData;

type IndexedPoint = GeomWithData<[f64; 3], usize>;

/// Unit vector of a (latitude, longitude) pair in degrees
pub fn unit_vector(latitude: f64, longitude: f64) -> [f64; 3] {
    let (lat, lon) = (latitude.to_radians(), longitude.to_radians());
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

/// Haversine angle (radians) between two points given in degrees
pub fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = phi2 - phi1;
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * a.sqrt().min(1.0).asin()
}

/// 1-nearest-neighbour index over (latitude, longitude) points
pub struct NearestNeighborIndex {
    tree: RTree<IndexedPoint>,
    latitude: Vec<f64>,
    longitude: Vec<f64>,
}

impl NearestNeighborIndex {
    /// Index every point; points with a NaN coordinate are never returned
    pub fn new(latitude: &[f64], longitude: &[f64]) -> Self {
        let points = latitude
            .iter()
            .zip(longitude)
            .enumerate()
            .filter(|(_, (lat, lon))| lat.is_finite() && lon.is_finite())
            .map(|(i, (&lat, &lon))| GeomWithData::new(unit_vector(lat, lon), i))
            .collect();
        Self {
            tree: RTree::bulk_load(points),
            latitude: latitude.to_vec(),
            longitude: longitude.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Closest point and its haversine distance in radians
    pub fn query(&self, latitude: f64, longitude: f64) -> Option<(usize, f64)> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }
        let nearest = self
            .tree
            .nearest_neighbor(&unit_vector(latitude, longitude))?;
        let index = nearest.data;
        let distance = haversine(
            latitude,
            longitude,
            self.latitude[index],
            self.longitude[index],
        );
        Some((index, distance))
    }

    /// [`NearestNeighborIndex::query`] for every point of a set
    pub fn query_all(&self, latitude: &[f64], longitude: &[f64]) -> Vec<Option<(usize, f64)>> {
        latitude
            .iter()
            .zip(longitude)
            .map(|(&lat, &lon)| self.query(lat, lon))
            .collect()
    }
}

impl std::fmt::Debug for NearestNeighborIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NearestNeighborIndex")
            .field("points", &self.tree.size())
            .finish()
    }
}
