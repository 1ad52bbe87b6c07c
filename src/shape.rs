//! Shape record payloads and their mapping to [`Geometry`].

use crate::error::{Error, Result};
use crate::geometry::{Coord, Geometry, LineString, LinearRing, Polygon};
use crate::shp_header::{BoundingBox, ShapeKind, ShapeType, NO_DATA};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// Value written for absent measures.
const NO_DATA_OUT: f64 = -1.0e39;

#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Null,
    Point(Coord),
    MultiPoint {
        bbox: BoundingBox,
        points: Vec<Coord>,
    },
    PolyLine {
        bbox: BoundingBox,
        parts: Vec<Vec<Coord>>,
    },
    Polygon {
        bbox: BoundingBox,
        rings: Vec<Vec<Coord>>,
    },
}

/// One `.shp` record.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeRecord {
    /// 1-based record number
    pub number: u32,
    pub shape: Shape,
}

fn bbox_of<'a>(coords: impl Iterator<Item = &'a Coord>) -> BoundingBox {
    let mut bbox = BoundingBox::default();
    for c in coords {
        bbox.expand(c.x, c.y, c.z, c.m);
    }
    bbox
}

impl Shape {
    pub fn multipoint(points: Vec<Coord>) -> Self {
        Shape::MultiPoint {
            bbox: bbox_of(points.iter()),
            points,
        }
    }
    pub fn polyline(parts: Vec<Vec<Coord>>) -> Self {
        Shape::PolyLine {
            bbox: bbox_of(parts.iter().flatten()),
            parts,
        }
    }
    pub fn polygon(rings: Vec<Vec<Coord>>) -> Self {
        Shape::Polygon {
            bbox: bbox_of(rings.iter().flatten()),
            rings,
        }
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Null => ShapeKind::Null,
            Shape::Point(_) => ShapeKind::Point,
            Shape::MultiPoint { .. } => ShapeKind::MultiPoint,
            Shape::PolyLine { .. } => ShapeKind::PolyLine,
            Shape::Polygon { .. } => ShapeKind::Polygon,
        }
    }

    fn coords(&self) -> Box<dyn Iterator<Item = &Coord> + '_> {
        match self {
            Shape::Null => Box::new(std::iter::empty()),
            Shape::Point(c) => Box::new(std::iter::once(c)),
            Shape::MultiPoint { points, .. } => Box::new(points.iter()),
            Shape::PolyLine { parts, .. } => Box::new(parts.iter().flatten()),
            Shape::Polygon { rings, .. } => Box::new(rings.iter().flatten()),
        }
    }

    /// Extent computed from the coordinates.
    pub fn bbox(&self) -> BoundingBox {
        bbox_of(self.coords())
    }

    fn parts(&self) -> &[Vec<Coord>] {
        match self {
            Shape::PolyLine { parts, .. } => parts,
            Shape::Polygon { rings, .. } => rings,
            _ => &[],
        }
    }

    /// Geometry of the shape, `None` for null shapes.
    ///
    /// PolyLines map to MultiLineString and Polygons to MultiPolygon.
    pub fn to_geometry(&self) -> Result<Option<Geometry>> {
        Ok(Some(match self {
            Shape::Null => return Ok(None),
            Shape::Point(c) => Geometry::Point(*c),
            Shape::MultiPoint { points, .. } => Geometry::MultiPoint(points.clone()),
            Shape::PolyLine { parts, .. } => Geometry::MultiLineString(
                parts.iter().map(|p| LineString(p.clone())).collect(),
            ),
            Shape::Polygon { rings, .. } => Geometry::MultiPolygon(assemble_polygons(rings)?),
        }))
    }

    /// Shape storing `geometry` in a file of type `shape_type`.
    pub fn from_geometry(geometry: Option<&Geometry>, shape_type: ShapeType) -> Result<Shape> {
        let Some(geometry) = geometry else {
            return Ok(Shape::Null);
        };
        let incompatible = || {
            Error::UnsupportedGeometryType(format!(
                "{} in a {:?} shapefile",
                geometry.kind_name(),
                shape_type
            ))
        };
        match (shape_type.kind(), geometry) {
            (ShapeKind::Point, Geometry::Point(c)) => Ok(Shape::Point(*c)),
            (ShapeKind::MultiPoint, Geometry::Point(c)) => Ok(Shape::multipoint(vec![*c])),
            (ShapeKind::MultiPoint, Geometry::MultiPoint(points)) => {
                Ok(Shape::multipoint(points.clone()))
            }
            (ShapeKind::PolyLine, Geometry::LineString(ls)) => {
                Ok(Shape::polyline(non_empty_parts([ls])))
            }
            (ShapeKind::PolyLine, Geometry::MultiLineString(lines)) => {
                Ok(Shape::polyline(non_empty_parts(lines)))
            }
            (ShapeKind::Polygon, Geometry::Polygon(poly)) => {
                Ok(Shape::polygon(oriented_rings(std::slice::from_ref(poly))))
            }
            (ShapeKind::Polygon, Geometry::MultiPolygon(polys)) => {
                Ok(Shape::polygon(oriented_rings(polys)))
            }
            _ => Err(incompatible()),
        }
    }
}

fn non_empty_parts<'a>(lines: impl IntoIterator<Item = &'a LineString>) -> Vec<Vec<Coord>> {
    lines
        .into_iter()
        .filter(|l| !l.0.is_empty())
        .map(|l| l.0.clone())
        .collect()
}

/// Shells clockwise, holes counter-clockwise.
fn oriented_rings(polys: &[Polygon]) -> Vec<Vec<Coord>> {
    let mut rings = Vec::new();
    for poly in polys {
        let exterior = poly.exterior();
        rings.push(if exterior.is_clockwise() {
            exterior.coords().to_vec()
        } else {
            exterior.reversed().into_inner()
        });
        for hole in poly.interiors() {
            rings.push(if hole.is_clockwise() {
                hole.reversed().into_inner()
            } else {
                hole.coords().to_vec()
            });
        }
    }
    rings
}

fn closed_ring(coords: &[Coord]) -> Result<LinearRing> {
    let mut coords = coords.to_vec();
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last()) {
        if !first.equals_2d(last) {
            coords.push(first);
        }
    }
    LinearRing::new(coords)
}

/// Rebuild polygons from rings: clockwise rings are shells, the others holes
/// of the smallest shell containing them. Holes without a shell become shells.
fn assemble_polygons(rings: &[Vec<Coord>]) -> Result<Vec<Polygon>> {
    let rings = rings
        .iter()
        .map(|r| closed_ring(r))
        .collect::<Result<Vec<_>>>()?;
    let all_ccw = rings.iter().all(|r| !r.is_clockwise());
    let mut shells: Vec<(LinearRing, Vec<LinearRing>)> = Vec::new();
    let mut holes = Vec::new();
    for ring in rings {
        if ring.is_clockwise() || all_ccw {
            shells.push((ring, Vec::new()));
        } else {
            holes.push(ring);
        }
    }
    for hole in holes {
        let probe = hole.coords()[0];
        let owner = shells
            .iter()
            .enumerate()
            .filter(|(_, (shell, _))| shell.contains(&probe))
            .min_by(|(_, (a, _)), (_, (b, _))| {
                a.signed_area().abs().total_cmp(&b.signed_area().abs())
            })
            .map(|(i, _)| i);
        match owner {
            Some(i) => shells[i].1.push(hole),
            None => shells.push((hole.reversed(), Vec::new())),
        }
    }
    Ok(shells
        .into_iter()
        .map(|(shell, holes)| Polygon::new(shell, holes))
        .collect())
}

fn corrupt(record: u64, reason: impl Into<String>) -> Error {
    Error::CorruptRecord {
        record,
        reason: reason.into(),
    }
}

fn measure(m: f64) -> f64 {
    if m < NO_DATA {
        f64::NAN
    } else {
        m
    }
}

/// Decode the content of record `record` (0-based) of a `file_type` file.
pub fn decode_shape(content: &[u8], file_type: ShapeType, record: u64) -> Result<Shape> {
    let mut cur = content;
    let tag = cur
        .read_i32::<LittleEndian>()
        .map_err(|_| corrupt(record, "record shorter than its shape type"))?;
    let shape_type = ShapeType::from_code(tag)?;
    if shape_type == ShapeType::Null {
        return Ok(Shape::Null);
    }
    if shape_type != file_type {
        return Err(Error::StructuralMismatch(format!(
            "record {record} is a {shape_type:?} in a {file_type:?} shapefile"
        )));
    }
    let z = shape_type.has_z();
    let measured = shape_type.is_measured();

    if shape_type.kind() == ShapeKind::Point {
        let vals = content.len() - 4;
        let (has_z, has_m) = match (z, measured, vals) {
            (false, false, 16) => (false, false),
            (false, true, 24) => (false, true),
            (true, _, 24) => (true, false),
            (true, _, 32) => (true, true),
            _ => {
                return Err(corrupt(
                    record,
                    format!("{vals} bytes of point payload for {shape_type:?}"),
                ))
            }
        };
        let x = cur.read_f64::<LittleEndian>()?;
        let y = cur.read_f64::<LittleEndian>()?;
        let zv = if has_z { cur.read_f64::<LittleEndian>()? } else { f64::NAN };
        let mv = if has_m { measure(cur.read_f64::<LittleEndian>()?) } else { f64::NAN };
        return Ok(Shape::Point(Coord::xyzm(x, y, zv, mv)));
    }

    let multipoint = shape_type.kind() == ShapeKind::MultiPoint;
    let fixed = if multipoint { 4 + 32 + 4 } else { 4 + 32 + 8 };
    if content.len() < fixed {
        return Err(corrupt(record, "record shorter than its fixed fields"));
    }
    let mut bounds = [0f64; 4];
    cur.read_f64_into::<LittleEndian>(&mut bounds)?;
    let num_parts = if multipoint {
        0
    } else {
        cur.read_i32::<LittleEndian>()?
    };
    let num_points = cur.read_i32::<LittleEndian>()?;
    if num_parts < 0 || num_points < 0 {
        return Err(corrupt(
            record,
            format!("negative counts ({num_parts} parts, {num_points} points)"),
        ));
    }
    let (np, n) = (num_parts as usize, num_points as usize);
    let base = fixed + 4 * np + 16 * n;
    let block = 16 + 8 * n;
    let (has_z, has_m) = match content.len() {
        len if !z && !measured && len == base => (false, false),
        len if measured && len == base => (false, false),
        len if measured && len == base + block => (false, true),
        len if z && len == base + block => (true, false),
        len if z && len == base + 2 * block => (true, true),
        len => {
            return Err(corrupt(
                record,
                format!("content of {len} bytes disagrees with {np} parts and {n} points"),
            ))
        }
    };

    let mut parts = Vec::with_capacity(np);
    for _ in 0..np {
        parts.push(cur.read_i32::<LittleEndian>()?);
    }
    if np == 0 && n > 0 && !multipoint {
        return Err(corrupt(record, "points without parts"));
    }
    for (i, &start) in parts.iter().enumerate() {
        let prev = if i == 0 { -1 } else { parts[i - 1] };
        if (i == 0 && start != 0) || start <= prev || start as usize >= n.max(1) {
            return Err(corrupt(record, format!("part offset {start} out of order or range")));
        }
    }

    let mut coords = Vec::with_capacity(n);
    for _ in 0..n {
        let x = cur.read_f64::<LittleEndian>()?;
        let y = cur.read_f64::<LittleEndian>()?;
        coords.push(Coord::xy(x, y));
    }
    let mut bbox = BoundingBox {
        xy: crate::geometry::Envelope::new(bounds[0], bounds[1], bounds[2], bounds[3]),
        ..Default::default()
    };
    if has_z {
        bbox.z = (cur.read_f64::<LittleEndian>()?, cur.read_f64::<LittleEndian>()?);
        for c in coords.iter_mut() {
            c.z = cur.read_f64::<LittleEndian>()?;
        }
    }
    if has_m {
        bbox.m = (cur.read_f64::<LittleEndian>()?, cur.read_f64::<LittleEndian>()?);
        for c in coords.iter_mut() {
            c.m = measure(cur.read_f64::<LittleEndian>()?);
        }
    }

    if multipoint {
        return Ok(Shape::MultiPoint {
            bbox,
            points: coords,
        });
    }
    let mut split = Vec::with_capacity(np);
    for (i, &start) in parts.iter().enumerate() {
        let end = parts.get(i + 1).map_or(n, |e| *e as usize);
        split.push(coords[start as usize..end].to_vec());
    }
    Ok(match shape_type.kind() {
        ShapeKind::Polygon => Shape::Polygon { bbox, rings: split },
        _ => Shape::PolyLine { bbox, parts: split },
    })
}

/// Encode `shape` as record content for a `shape_type` file.
pub fn encode_shape(shape: &Shape, shape_type: ShapeType, out: &mut Vec<u8>) -> Result<()> {
    out.clear();
    if let Shape::Null = shape {
        out.write_i32::<LittleEndian>(ShapeType::Null.code())?;
        return Ok(());
    }
    if shape.kind() != shape_type.kind() {
        return Err(Error::StructuralMismatch(format!(
            "{:?} shape in a {shape_type:?} shapefile",
            shape.kind()
        )));
    }
    let z = shape_type.has_z();
    let m = shape_type.is_measured() || (z && shape.coords().any(|c| c.has_m()));
    out.write_i32::<LittleEndian>(shape_type.code())?;

    if let Shape::Point(c) = shape {
        out.write_f64::<LittleEndian>(c.x)?;
        out.write_f64::<LittleEndian>(c.y)?;
        if z {
            out.write_f64::<LittleEndian>(if c.has_z() { c.z } else { 0.0 })?;
        }
        if z || m {
            out.write_f64::<LittleEndian>(if c.has_m() { c.m } else { NO_DATA_OUT })?;
        }
        return Ok(());
    }

    let bbox = shape.bbox().normalized();
    for v in [bbox.xy.min_x, bbox.xy.min_y, bbox.xy.max_x, bbox.xy.max_y] {
        out.write_f64::<LittleEndian>(v)?;
    }
    let coords: Vec<&Coord> = shape.coords().collect();
    let num_points = i32::try_from(coords.len())
        .map_err(|_| Error::InvalidArgument("too many points in one shape".to_string()))?;
    if let Shape::MultiPoint { .. } = shape {
        out.write_i32::<LittleEndian>(num_points)?;
    } else {
        let parts = shape.parts();
        out.write_i32::<LittleEndian>(parts.len() as i32)?;
        out.write_i32::<LittleEndian>(num_points)?;
        let mut start = 0i32;
        for part in parts {
            out.write_i32::<LittleEndian>(start)?;
            start += part.len() as i32;
        }
    }
    for c in &coords {
        out.write_f64::<LittleEndian>(c.x)?;
        out.write_f64::<LittleEndian>(c.y)?;
    }
    if z {
        out.write_f64::<LittleEndian>(bbox.z.0)?;
        out.write_f64::<LittleEndian>(bbox.z.1)?;
        for c in &coords {
            out.write_f64::<LittleEndian>(if c.has_z() { c.z } else { 0.0 })?;
        }
    }
    if m {
        out.write_f64::<LittleEndian>(bbox.m.0)?;
        out.write_f64::<LittleEndian>(bbox.m.1)?;
        for c in &coords {
            out.write_f64::<LittleEndian>(if c.has_m() { c.m } else { NO_DATA_OUT })?;
        }
    }
    Ok(())
}
