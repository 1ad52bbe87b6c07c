//! Geometry algorithms.

pub mod extrema;
pub mod grid;
pub mod line_merge;
pub mod min_rect;
pub mod shadow;

pub use extrema::{extrema, Band};
pub use grid::{Grid, GridCell};
pub use line_merge::line_merge;
pub use min_rect::minimum_rectangle;
pub use shadow::{geometry_shadow, shadow_offset};

use crate::geometry::{Coord, Geometry, LinearRing, Polygon};

fn to_geo_line(coords: &[Coord]) -> geo::LineString<f64> {
    geo::LineString(coords.iter().map(|c| geo::Coord { x: c.x, y: c.y }).collect())
}

pub(crate) fn to_geo_polygon(polygon: &Polygon) -> geo::Polygon<f64> {
    geo::Polygon::new(
        to_geo_line(polygon.exterior().coords()),
        polygon
            .interiors()
            .iter()
            .map(|ring| to_geo_line(ring.coords()))
            .collect(),
    )
}

fn from_geo_ring(ring: &geo::LineString<f64>, z: f64) -> Option<LinearRing> {
    let coords = ring.0.iter().map(|c| Coord::xyz(c.x, c.y, z)).collect();
    LinearRing::new(coords).ok()
}

/// Polygons of a geo multipolygon with every z set to `z`. Degenerate rings are dropped.
pub(crate) fn from_geo_multi_polygon(multi: &geo::MultiPolygon<f64>, z: f64) -> Vec<Polygon> {
    multi
        .0
        .iter()
        .filter_map(|polygon| {
            let exterior = from_geo_ring(polygon.exterior(), z)?;
            let interiors = polygon
                .interiors()
                .iter()
                .filter_map(|ring| from_geo_ring(ring, z))
                .collect();
            Some(Polygon::new(exterior, interiors))
        })
        .collect()
}

/// `Polygon` for a single polygon, `MultiPolygon` otherwise.
pub(crate) fn polygonal(mut polygons: Vec<Polygon>) -> Geometry {
    if polygons.len() == 1 {
        if let Some(polygon) = polygons.pop() {
            return Geometry::Polygon(polygon);
        }
    }
    Geometry::MultiPolygon(polygons)
}

pub(crate) fn geo_points(geometry: &Geometry) -> geo::MultiPoint<f64> {
    let mut points = Vec::with_capacity(geometry.coord_count());
    geometry.for_each_coord(&mut |c| points.push(geo::Point::new(c.x, c.y)));
    geo::MultiPoint(points)
}
