//! Minimum rotated rectangle enclosing a geometry.

use super::geo_points;
use crate::error::Result;
use crate::geometry::{Coord, Geometry, LineString, LinearRing, Polygon};
use geo::MinimumRotatedRect;

/// Minimum-area rectangle enclosing `geometry`, possibly rotated.
///
/// Collapses to the segment between the extreme points when all coordinates
/// are collinear, and to a point when they coincide. Empty input gives `None`.
pub fn minimum_rectangle(geometry: &Geometry) -> Result<Option<Geometry>> {
    let mut coords = Vec::with_capacity(geometry.coord_count());
    geometry.for_each_coord(&mut |c| coords.push(Coord::xy(c.x, c.y)));
    let Some(&origin) = coords.first() else {
        return Ok(None);
    };
    let Some(far) = coords
        .iter()
        .copied()
        .max_by(|a, b| origin.distance_2d(a).total_cmp(&origin.distance_2d(b)))
        .filter(|far| !far.equals_2d(&origin))
    else {
        return Ok(Some(Geometry::Point(origin)));
    };
    let (ux, uy) = (far.x - origin.x, far.y - origin.y);
    let span = ux.hypot(uy);
    let collinear = coords
        .iter()
        .all(|c| ((c.x - origin.x) * uy - (c.y - origin.y) * ux).abs() <= 1e-12 * span * span);
    if collinear {
        let along = |c: &Coord| (c.x - origin.x) * ux + (c.y - origin.y) * uy;
        let low = coords.iter().min_by(|a, b| along(a).total_cmp(&along(b)));
        let high = coords.iter().max_by(|a, b| along(a).total_cmp(&along(b)));
        if let (Some(low), Some(high)) = (low, high) {
            return Ok(Some(Geometry::LineString(LineString(vec![*low, *high]))));
        }
    }
    let Some(rect) = geo_points(geometry).minimum_rotated_rect() else {
        return Ok(None);
    };
    let ring = LinearRing::new(
        rect.exterior()
            .0
            .iter()
            .map(|c| Coord::xy(c.x, c.y))
            .collect(),
    )?;
    Ok(Some(Geometry::Polygon(Polygon::new(ring, vec![]))))
}
