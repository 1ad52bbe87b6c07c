//! Shadow footprint of a geometry lit by the sun.

use super::{from_geo_multi_polygon, polygonal, to_geo_polygon};
use crate::error::{Error, Result};
use crate::geometry::{Coord, Geometry, LineString, LinearRing, Polygon};
use geo::BooleanOps;

/// Offsets shorter than this leave a point unchanged.
const POINT_SHADOW_TOLERANCE: f64 = 1e-2;

/// Horizontal displacement of the shadow cast by a facade of `height`.
///
/// `azimuth` is measured clockwise from north, `altitude` above the horizon,
/// both in radians.
pub fn shadow_offset(azimuth: f64, altitude: f64, height: f64) -> (f64, f64) {
    let spread = 1.0 / altitude.tan();
    (
        -height * spread * azimuth.sin(),
        -height * spread * azimuth.cos(),
    )
}

fn moved(c: &Coord, (dx, dy): (f64, f64)) -> Coord {
    Coord::xyz(c.x + dx, c.y + dy, 0.0)
}

fn flat(c: &Coord) -> Coord {
    Coord::xyz(c.x, c.y, 0.0)
}

/// One quadrilateral per edge swept along the offset, skipping flat ones.
fn edge_shadows(coords: &[Coord], offset: (f64, f64), shadows: &mut Vec<Polygon>) {
    for edge in coords.windows(2) {
        let (start, end) = (&edge[0], &edge[1]);
        let cross = (end.x - start.x) * offset.1 - (end.y - start.y) * offset.0;
        let scale = start.distance_2d(end) * offset.0.hypot(offset.1);
        if cross.abs() <= 1e-12 * scale {
            continue;
        }
        let quad = vec![
            flat(start),
            flat(end),
            moved(end, offset),
            moved(start, offset),
            flat(start),
        ];
        if let Ok(ring) = LinearRing::new(quad) {
            shadows.push(Polygon::new(ring, vec![]));
        }
    }
}

fn union_all(parts: impl Iterator<Item = geo::MultiPolygon<f64>>) -> geo::MultiPolygon<f64> {
    parts.fold(geo::MultiPolygon::new(vec![]), |acc, part| acc.union(&part))
}

/// Shadow of a point, line or polygon.
///
/// Points give the point itself or a segment. Lines and polygons give one
/// quadrilateral per edge, merged into a single footprint when `union` is set;
/// a polygon's own area is then cut out. Output z is 0.
pub fn geometry_shadow(
    geometry: &Geometry,
    azimuth: f64,
    altitude: f64,
    height: f64,
    union: bool,
) -> Result<Geometry> {
    if height <= 0.0 || height.is_nan() {
        return Err(Error::InvalidArgument(
            "the height of the geometry must be greater than 0".to_string(),
        ));
    }
    let offset = shadow_offset(azimuth, altitude, height);
    let mut shadows = Vec::new();
    match geometry {
        Geometry::Point(c) => {
            let end = moved(c, offset);
            return Ok(if c.distance_2d(&end) < POINT_SHADOW_TOLERANCE {
                geometry.clone()
            } else {
                Geometry::LineString(LineString(vec![flat(c), end]))
            });
        }
        Geometry::LineString(LineString(coords)) => {
            edge_shadows(coords, offset, &mut shadows);
            if union {
                let merged = union_all(
                    shadows
                        .iter()
                        .map(|s| geo::MultiPolygon::new(vec![to_geo_polygon(s)])),
                );
                return Ok(polygonal(from_geo_multi_polygon(&merged, 0.0)));
            }
        }
        Geometry::Polygon(polygon) => {
            for ring in polygon.rings() {
                edge_shadows(ring.coords(), offset, &mut shadows);
            }
            if union {
                let footprint = to_geo_polygon(polygon);
                let merged = union_all(
                    shadows
                        .iter()
                        .map(|s| to_geo_polygon(s).difference(&footprint)),
                );
                return Ok(polygonal(from_geo_multi_polygon(&merged, 0.0)));
            }
        }
        other => {
            return Err(Error::UnsupportedGeometryType(format!(
                "shadows are computed for single points, lines or polygons, not {}",
                other.kind_name()
            )))
        }
    }
    Ok(Geometry::MultiPolygon(shadows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    fn square() -> Geometry {
        let ring = LinearRing::new(vec![
            Coord::xy(0.0, 0.0),
            Coord::xy(0.0, 10.0),
            Coord::xy(10.0, 10.0),
            Coord::xy(10.0, 0.0),
            Coord::xy(0.0, 0.0),
        ])
        .unwrap();
        Geometry::Polygon(Polygon::new(ring, vec![]))
    }

    #[test]
    fn offset_direction() {
        // sun in the south at 45 degrees casts shadows northwards
        let (dx, dy) = shadow_offset(PI, FRAC_PI_4, 10.0);
        assert!(dx.abs() < 1e-9);
        assert!((dy - 10.0).abs() < 1e-9);
    }

    #[test]
    fn point_at_zenith() -> Result<()> {
        let point = Geometry::Point(Coord::xy(3.0, 4.0));
        assert_eq!(geometry_shadow(&point, 0.3, FRAC_PI_2, 10.0, true)?, point);
        let low = geometry_shadow(&point, PI, FRAC_PI_4, 2.0, true)?;
        match low {
            Geometry::LineString(LineString(coords)) => {
                assert_eq!(coords.len(), 2);
                assert_eq!(coords[1].z, 0.0);
                assert!((coords[1].y - 6.0).abs() < 1e-9);
            }
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn line_shadow() -> Result<()> {
        let line = Geometry::LineString(LineString(vec![
            Coord::xy(0.0, 0.0),
            Coord::xy(10.0, 0.0),
            Coord::xy(20.0, 0.0),
        ]));
        let separate = geometry_shadow(&line, PI, FRAC_PI_4, 5.0, false)?;
        assert!(matches!(&separate, Geometry::MultiPolygon(p) if p.len() == 2));
        assert!((separate.area() - 100.0).abs() < 1e-6);
        let merged = geometry_shadow(&line, PI, FRAC_PI_4, 5.0, true)?;
        assert!((merged.area() - 100.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn polygon_shadow_excludes_footprint() -> Result<()> {
        let shadow = geometry_shadow(&square(), PI, FRAC_PI_4, 5.0, true)?;
        // only the 10 x 5 strip north of the square remains
        assert!((shadow.area() - 50.0).abs() < 1e-6);
        let envelope = shadow.envelope().unwrap();
        assert!((envelope.min_y - 10.0).abs() < 1e-9);
        assert!((envelope.max_y - 15.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn invalid_inputs() {
        let point = Geometry::Point(Coord::xy(0.0, 0.0));
        assert!(matches!(
            geometry_shadow(&point, 0.0, 1.0, 0.0, true),
            Err(Error::InvalidArgument(_))
        ));
        let multi = Geometry::MultiPoint(vec![Coord::xy(0.0, 0.0)]);
        assert!(matches!(
            geometry_shadow(&multi, 0.0, 1.0, 1.0, true),
            Err(Error::UnsupportedGeometryType(_))
        ));
    }
}
