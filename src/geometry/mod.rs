//! Local geometry: vector helpers and the Delaunay/Voronoi kernel.

pub mod delaunay;
pub mod kernel;
pub mod metrics;
