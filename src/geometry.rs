use crate::error::{Error, Result};
use std::fmt;

/// Coordinate with optional z and m ordinates (`NaN` when absent).
#[derive(Clone, Copy, Debug)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub m: f64,
}

impl Coord {
    pub fn xy(x: f64, y: f64) -> Self {
        Coord {
            x,
            y,
            z: f64::NAN,
            m: f64::NAN,
        }
    }
    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Coord {
            x,
            y,
            z,
            m: f64::NAN,
        }
    }
    pub fn xym(x: f64, y: f64, m: f64) -> Self {
        Coord {
            x,
            y,
            z: f64::NAN,
            m,
        }
    }
    pub fn xyzm(x: f64, y: f64, z: f64, m: f64) -> Self {
        Coord { x, y, z, m }
    }
    pub fn has_z(&self) -> bool {
        !self.z.is_nan()
    }
    pub fn has_m(&self) -> bool {
        !self.m.is_nan()
    }
    /// Planar distance, ignoring z.
    pub fn distance_2d(&self, other: &Coord) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
    pub fn equals_2d(&self, other: &Coord) -> bool {
        self.x == other.x && self.y == other.y
    }
}

fn same_ordinate(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

impl PartialEq for Coord {
    fn eq(&self, other: &Self) -> bool {
        same_ordinate(self.x, other.x)
            && same_ordinate(self.y, other.y)
            && same_ordinate(self.z, other.z)
            && same_ordinate(self.m, other.m)
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct LineString(pub Vec<Coord>);

impl LineString {
    pub fn coords(&self) -> &[Coord] {
        &self.0
    }
    pub fn length(&self) -> f64 {
        self.0.windows(2).map(|w| w[0].distance_2d(&w[1])).sum()
    }
    pub fn is_closed(&self) -> bool {
        match (self.0.first(), self.0.last()) {
            (Some(first), Some(last)) => self.0.len() > 1 && first.equals_2d(last),
            _ => false,
        }
    }
}

/// Closed ring of at least four coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearRing(Vec<Coord>);

impl LinearRing {
    pub fn new(coords: Vec<Coord>) -> Result<Self> {
        if coords.len() < 4 {
            return Err(Error::InvalidGeometry(format!(
                "linear ring needs at least 4 coordinates, got {}",
                coords.len()
            )));
        }
        if !coords[0].equals_2d(&coords[coords.len() - 1]) {
            return Err(Error::InvalidGeometry(
                "linear ring is not closed".to_string(),
            ));
        }
        Ok(LinearRing(coords))
    }
    pub fn coords(&self) -> &[Coord] {
        &self.0
    }
    pub fn into_inner(self) -> Vec<Coord> {
        self.0
    }
    /// Shoelace area, positive for counter-clockwise rings.
    pub fn signed_area(&self) -> f64 {
        let sum: f64 = self
            .0
            .windows(2)
            .map(|w| w[0].x * w[1].y - w[1].x * w[0].y)
            .sum();
        sum / 2.0
    }
    pub fn is_clockwise(&self) -> bool {
        self.signed_area() < 0.0
    }
    pub fn reversed(&self) -> LinearRing {
        let mut coords = self.0.clone();
        coords.reverse();
        LinearRing(coords)
    }
    pub fn length(&self) -> f64 {
        self.0.windows(2).map(|w| w[0].distance_2d(&w[1])).sum()
    }
    /// Even-odd point in ring test. Points on the boundary may fall either way.
    pub fn contains(&self, p: &Coord) -> bool {
        let mut inside = false;
        for w in self.0.windows(2) {
            let (a, b) = (&w[0], &w[1]);
            if (a.y > p.y) != (b.y > p.y) {
                let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    exterior: LinearRing,
    interiors: Vec<LinearRing>,
}

impl Polygon {
    pub fn new(exterior: LinearRing, interiors: Vec<LinearRing>) -> Self {
        Polygon {
            exterior,
            interiors,
        }
    }
    pub fn exterior(&self) -> &LinearRing {
        &self.exterior
    }
    pub fn interiors(&self) -> &[LinearRing] {
        &self.interiors
    }
    /// Exterior first, then holes.
    pub fn rings(&self) -> impl Iterator<Item = &LinearRing> {
        std::iter::once(&self.exterior).chain(self.interiors.iter())
    }
    pub fn ring_count(&self) -> usize {
        1 + self.interiors.len()
    }
    pub fn area(&self) -> f64 {
        self.exterior.signed_area().abs()
            - self
                .interiors
                .iter()
                .map(|r| r.signed_area().abs())
                .sum::<f64>()
    }
}

/// Closed set of simple feature geometries.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Point(Coord),
    LineString(LineString),
    Polygon(Polygon),
    MultiPoint(Vec<Coord>),
    MultiLineString(Vec<LineString>),
    MultiPolygon(Vec<Polygon>),
    GeometryCollection(Vec<Geometry>),
}

impl Geometry {
    /// GeoJSON / OGC type name.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::LineString(_) => "LineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::MultiPolygon(_) => "MultiPolygon",
            Geometry::GeometryCollection(_) => "GeometryCollection",
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Point(_) => false,
            Geometry::LineString(ls) => ls.0.is_empty(),
            Geometry::Polygon(_) => false,
            Geometry::MultiPoint(pts) => pts.is_empty(),
            Geometry::MultiLineString(lines) => lines.iter().all(|l| l.0.is_empty()),
            Geometry::MultiPolygon(polys) => polys.is_empty(),
            Geometry::GeometryCollection(geoms) => geoms.iter().all(|g| g.is_empty()),
        }
    }

    /// Topological dimension: 0 for points, 1 for lines, 2 for areas.
    /// Collections report their highest member dimension, -1 when empty.
    pub fn dimension(&self) -> i32 {
        match self {
            Geometry::Point(_) | Geometry::MultiPoint(_) => 0,
            Geometry::LineString(_) | Geometry::MultiLineString(_) => 1,
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) => 2,
            Geometry::GeometryCollection(geoms) => {
                geoms.iter().map(|g| g.dimension()).max().unwrap_or(-1)
            }
        }
    }

    /// Visit every coordinate in storage order.
    pub fn for_each_coord<F: FnMut(&Coord)>(&self, f: &mut F) {
        match self {
            Geometry::Point(c) => f(c),
            Geometry::LineString(ls) => ls.0.iter().for_each(f),
            Geometry::Polygon(poly) => poly.rings().flat_map(|r| r.0.iter()).for_each(f),
            Geometry::MultiPoint(pts) => pts.iter().for_each(f),
            Geometry::MultiLineString(lines) => lines.iter().flat_map(|l| l.0.iter()).for_each(f),
            Geometry::MultiPolygon(polys) => polys
                .iter()
                .flat_map(|p| p.rings())
                .flat_map(|r| r.0.iter())
                .for_each(f),
            Geometry::GeometryCollection(geoms) => geoms.iter().for_each(|g| g.for_each_coord(&mut *f)),
        }
    }

    /// Rewrite every coordinate in place.
    pub fn map_coords<F: FnMut(&mut Coord)>(&mut self, f: &mut F) {
        match self {
            Geometry::Point(c) => f(c),
            Geometry::LineString(ls) => ls.0.iter_mut().for_each(f),
            Geometry::Polygon(poly) => map_polygon(poly, f),
            Geometry::MultiPoint(pts) => pts.iter_mut().for_each(f),
            Geometry::MultiLineString(lines) => {
                lines.iter_mut().flat_map(|l| l.0.iter_mut()).for_each(f)
            }
            Geometry::MultiPolygon(polys) => polys.iter_mut().for_each(|p| map_polygon(p, f)),
            Geometry::GeometryCollection(geoms) => {
                geoms.iter_mut().for_each(|g| g.map_coords(&mut *f))
            }
        }
    }

    pub fn has_z(&self) -> bool {
        let mut z = false;
        self.for_each_coord(&mut |c| z |= c.has_z());
        z
    }

    pub fn has_m(&self) -> bool {
        let mut m = false;
        self.for_each_coord(&mut |c| m |= c.has_m());
        m
    }

    pub fn coord_count(&self) -> usize {
        let mut n = 0;
        self.for_each_coord(&mut |_| n += 1);
        n
    }

    /// 2D bounding box, `None` for empty geometries.
    pub fn envelope(&self) -> Option<Envelope> {
        let mut env = Envelope::EMPTY;
        self.for_each_coord(&mut |c| env.expand_to(c.x, c.y));
        if env.is_empty() {
            None
        } else {
            Some(env)
        }
    }

    /// Planar length of linear components, perimeter for areas.
    pub fn length(&self) -> f64 {
        match self {
            Geometry::Point(_) | Geometry::MultiPoint(_) => 0.0,
            Geometry::LineString(ls) => ls.length(),
            Geometry::Polygon(poly) => poly.rings().map(|r| r.length()).sum(),
            Geometry::MultiLineString(lines) => lines.iter().map(|l| l.length()).sum(),
            Geometry::MultiPolygon(polys) => polys
                .iter()
                .flat_map(|p| p.rings())
                .map(|r| r.length())
                .sum(),
            Geometry::GeometryCollection(geoms) => geoms.iter().map(|g| g.length()).sum(),
        }
    }

    pub fn area(&self) -> f64 {
        match self {
            Geometry::Polygon(poly) => poly.area(),
            Geometry::MultiPolygon(polys) => polys.iter().map(|p| p.area()).sum(),
            Geometry::GeometryCollection(geoms) => geoms.iter().map(|g| g.area()).sum(),
            _ => 0.0,
        }
    }
}

fn map_polygon<F: FnMut(&mut Coord)>(poly: &mut Polygon, f: &mut F) {
    poly.exterior.0.iter_mut().for_each(&mut *f);
    for ring in poly.interiors.iter_mut() {
        ring.0.iter_mut().for_each(&mut *f);
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use geozero::ToWkt;
        match self.to_wkt() {
            Ok(wkt) => f.write_str(&wkt),
            Err(_) => f.write_str(self.kind_name()),
        }
    }
}

/// Axis aligned 2D extent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    pub const EMPTY: Envelope = Envelope {
        min_x: f64::INFINITY,
        min_y: f64::INFINITY,
        max_x: f64::NEG_INFINITY,
        max_y: f64::NEG_INFINITY,
    };

    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Envelope {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }
    pub fn is_empty(&self) -> bool {
        !(self.min_x <= self.max_x && self.min_y <= self.max_y)
    }
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
    pub fn expand_to(&mut self, x: f64, y: f64) {
        if x.is_nan() || y.is_nan() {
            return;
        }
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }
    pub fn expand(&mut self, other: &Envelope) {
        if other.is_empty() {
            return;
        }
        self.expand_to(other.min_x, other.min_y);
        self.expand_to(other.max_x, other.max_y);
    }
}
