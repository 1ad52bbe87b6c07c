use crate::geometry::{Coord, Geometry, LineString, Polygon};
use geozero::error::Result;
use geozero::{CoordDimensions, GeomProcessor, GeozeroGeometry};

impl GeozeroGeometry for Geometry {
    fn process_geom<P: GeomProcessor>(&self, processor: &mut P) -> Result<()> {
        process_geometry(self, 0, processor)
    }
    fn dims(&self) -> CoordDimensions {
        CoordDimensions {
            z: self.has_z(),
            m: self.has_m(),
            t: false,
            tm: false,
        }
    }
}

/// Drive a geozero processor with a geometry. Collection members are tagged.
pub fn process_geometry<P: GeomProcessor>(
    geometry: &Geometry,
    idx: usize,
    processor: &mut P,
) -> Result<()> {
    match geometry {
        Geometry::Point(c) => {
            processor.point_begin(idx)?;
            process_coord(c, 0, processor)?;
            processor.point_end(idx)
        }
        Geometry::LineString(ls) => process_linestring(ls.coords(), true, idx, processor),
        Geometry::Polygon(poly) => process_polygon(poly, true, idx, processor),
        Geometry::MultiPoint(points) => {
            processor.multipoint_begin(points.len(), idx)?;
            for (i, c) in points.iter().enumerate() {
                process_coord(c, i, processor)?;
            }
            processor.multipoint_end(idx)
        }
        Geometry::MultiLineString(lines) => {
            processor.multilinestring_begin(lines.len(), idx)?;
            for (i, LineString(coords)) in lines.iter().enumerate() {
                process_linestring(coords, false, i, processor)?;
            }
            processor.multilinestring_end(idx)
        }
        Geometry::MultiPolygon(polys) => {
            processor.multipolygon_begin(polys.len(), idx)?;
            for (i, poly) in polys.iter().enumerate() {
                process_polygon(poly, false, i, processor)?;
            }
            processor.multipolygon_end(idx)
        }
        Geometry::GeometryCollection(geoms) => {
            processor.geometrycollection_begin(geoms.len(), idx)?;
            for (i, g) in geoms.iter().enumerate() {
                process_geometry(g, i, processor)?;
            }
            processor.geometrycollection_end(idx)
        }
    }
}

fn process_coord<P: GeomProcessor>(c: &Coord, idx: usize, processor: &mut P) -> Result<()> {
    if processor.multi_dim() {
        let dims = processor.dimensions();
        let z = if dims.z && c.has_z() { Some(c.z) } else { None };
        let m = if dims.m && c.has_m() { Some(c.m) } else { None };
        processor.coordinate(c.x, c.y, z, m, None, None, idx)
    } else {
        processor.xy(c.x, c.y, idx)
    }
}

fn process_linestring<P: GeomProcessor>(
    coords: &[Coord],
    tagged: bool,
    idx: usize,
    processor: &mut P,
) -> Result<()> {
    processor.linestring_begin(tagged, coords.len(), idx)?;
    for (i, c) in coords.iter().enumerate() {
        process_coord(c, i, processor)?;
    }
    processor.linestring_end(tagged, idx)
}

fn process_polygon<P: GeomProcessor>(
    poly: &Polygon,
    tagged: bool,
    idx: usize,
    processor: &mut P,
) -> Result<()> {
    processor.polygon_begin(tagged, poly.ring_count(), idx)?;
    for (i, ring) in poly.rings().enumerate() {
        process_linestring(ring.coords(), false, i, processor)?;
    }
    processor.polygon_end(tagged, idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::LinearRing;
    use geozero::ToWkt;

    #[test]
    fn wkt_output() -> Result<()> {
        let point = Geometry::Point(Coord::xy(1.5, -2.0));
        assert_eq!(point.to_wkt()?, "POINT(1.5 -2)");

        let lines = Geometry::MultiLineString(vec![
            LineString(vec![Coord::xy(0.0, 0.0), Coord::xy(1.0, 1.0)]),
            LineString(vec![Coord::xy(2.0, 2.0), Coord::xy(3.0, 3.0)]),
        ]);
        assert_eq!(lines.to_wkt()?, "MULTILINESTRING((0 0,1 1),(2 2,3 3))");
        Ok(())
    }

    #[test]
    fn wkt_polygon_rings() -> Result<()> {
        let ring = LinearRing::new(vec![
            Coord::xy(0.0, 0.0),
            Coord::xy(1.0, 0.0),
            Coord::xy(1.0, 1.0),
            Coord::xy(0.0, 0.0),
        ])
        .unwrap();
        let poly = Geometry::Polygon(Polygon::new(ring, vec![]));
        assert_eq!(poly.to_wkt()?, "POLYGON((0 0,1 0,1 1,0 0))");
        Ok(())
    }
}
