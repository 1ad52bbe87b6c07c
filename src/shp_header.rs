use crate::error::{Error, Result};
use crate::geometry::Envelope;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use log::warn;
use std::io::{Read, Write};

pub const FILE_CODE: i32 = 9994;
pub const VERSION: i32 = 1000;
pub const HEADER_SIZE: usize = 100;
/// Measures below this value mean "no data".
pub const NO_DATA: f64 = -1.0e38;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeType {
    Null,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
    PointZ,
    PolyLineZ,
    PolygonZ,
    MultiPointZ,
    PointM,
    PolyLineM,
    PolygonM,
    MultiPointM,
}

/// Shape type without dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeKind {
    Null,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
}

impl ShapeType {
    pub fn from_code(code: i32) -> Result<Self> {
        Ok(match code {
            0 => ShapeType::Null,
            1 => ShapeType::Point,
            3 => ShapeType::PolyLine,
            5 => ShapeType::Polygon,
            8 => ShapeType::MultiPoint,
            11 => ShapeType::PointZ,
            13 => ShapeType::PolyLineZ,
            15 => ShapeType::PolygonZ,
            18 => ShapeType::MultiPointZ,
            21 => ShapeType::PointM,
            23 => ShapeType::PolyLineM,
            25 => ShapeType::PolygonM,
            28 => ShapeType::MultiPointM,
            other => return Err(Error::UnsupportedShapeType(other)),
        })
    }

    pub fn code(self) -> i32 {
        match self {
            ShapeType::Null => 0,
            ShapeType::Point => 1,
            ShapeType::PolyLine => 3,
            ShapeType::Polygon => 5,
            ShapeType::MultiPoint => 8,
            ShapeType::PointZ => 11,
            ShapeType::PolyLineZ => 13,
            ShapeType::PolygonZ => 15,
            ShapeType::MultiPointZ => 18,
            ShapeType::PointM => 21,
            ShapeType::PolyLineM => 23,
            ShapeType::PolygonM => 25,
            ShapeType::MultiPointM => 28,
        }
    }

    pub fn kind(self) -> ShapeKind {
        match self {
            ShapeType::Null => ShapeKind::Null,
            ShapeType::Point | ShapeType::PointZ | ShapeType::PointM => ShapeKind::Point,
            ShapeType::PolyLine | ShapeType::PolyLineZ | ShapeType::PolyLineM => {
                ShapeKind::PolyLine
            }
            ShapeType::Polygon | ShapeType::PolygonZ | ShapeType::PolygonM => ShapeKind::Polygon,
            ShapeType::MultiPoint | ShapeType::MultiPointZ | ShapeType::MultiPointM => {
                ShapeKind::MultiPoint
            }
        }
    }

    /// Z variants store z and optionally m.
    pub fn has_z(self) -> bool {
        matches!(
            self,
            ShapeType::PointZ | ShapeType::PolyLineZ | ShapeType::PolygonZ | ShapeType::MultiPointZ
        )
    }

    /// M variants store m only.
    pub fn is_measured(self) -> bool {
        matches!(
            self,
            ShapeType::PointM | ShapeType::PolyLineM | ShapeType::PolygonM | ShapeType::MultiPointM
        )
    }

    pub fn from_kind(kind: ShapeKind, z: bool, m: bool) -> Self {
        match (kind, z, m) {
            (ShapeKind::Null, _, _) => ShapeType::Null,
            (ShapeKind::Point, true, _) => ShapeType::PointZ,
            (ShapeKind::Point, false, true) => ShapeType::PointM,
            (ShapeKind::Point, false, false) => ShapeType::Point,
            (ShapeKind::PolyLine, true, _) => ShapeType::PolyLineZ,
            (ShapeKind::PolyLine, false, true) => ShapeType::PolyLineM,
            (ShapeKind::PolyLine, false, false) => ShapeType::PolyLine,
            (ShapeKind::Polygon, true, _) => ShapeType::PolygonZ,
            (ShapeKind::Polygon, false, true) => ShapeType::PolygonM,
            (ShapeKind::Polygon, false, false) => ShapeType::Polygon,
            (ShapeKind::MultiPoint, true, _) => ShapeType::MultiPointZ,
            (ShapeKind::MultiPoint, false, true) => ShapeType::MultiPointM,
            (ShapeKind::MultiPoint, false, false) => ShapeType::MultiPoint,
        }
    }
}

/// Extent of all coordinates, z and m ranges included.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub xy: Envelope,
    pub z: (f64, f64),
    pub m: (f64, f64),
}

impl Default for BoundingBox {
    fn default() -> Self {
        BoundingBox {
            xy: Envelope::EMPTY,
            z: (f64::INFINITY, f64::NEG_INFINITY),
            m: (f64::INFINITY, f64::NEG_INFINITY),
        }
    }
}

fn expand_range(range: &mut (f64, f64), v: f64) {
    if !v.is_nan() {
        range.0 = range.0.min(v);
        range.1 = range.1.max(v);
    }
}

fn finite_range(range: (f64, f64)) -> (f64, f64) {
    if range.0 <= range.1 {
        range
    } else {
        (0.0, 0.0)
    }
}

impl BoundingBox {
    pub fn expand(&mut self, x: f64, y: f64, z: f64, m: f64) {
        self.xy.expand_to(x, y);
        expand_range(&mut self.z, z);
        expand_range(&mut self.m, m);
    }
    pub fn merge(&mut self, other: &BoundingBox) {
        self.xy.expand(&other.xy);
        expand_range(&mut self.z, other.z.0);
        expand_range(&mut self.z, other.z.1);
        expand_range(&mut self.m, other.m.0);
        expand_range(&mut self.m, other.m.1);
    }
    /// Zero for ranges without values, as files store them.
    pub fn normalized(&self) -> BoundingBox {
        let xy = if self.xy.is_empty() {
            Envelope::new(0.0, 0.0, 0.0, 0.0)
        } else {
            self.xy
        };
        BoundingBox {
            xy,
            z: finite_range(self.z),
            m: finite_range(self.m),
        }
    }
}

/// Main file and index header.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapefileHeader {
    /// Total file length in 16-bit words
    pub file_length: u32,
    pub version: i32,
    pub shape_type: ShapeType,
    pub bbox: BoundingBox,
}

impl ShapefileHeader {
    pub fn new(shape_type: ShapeType) -> Self {
        ShapefileHeader {
            file_length: (HEADER_SIZE / 2) as u32,
            version: VERSION,
            shape_type,
            bbox: BoundingBox::default(),
        }
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        reader
            .read_exact(&mut buf)
            .map_err(|_| Error::CorruptHeader("file shorter than the shapefile header".to_string()))?;
        let mut head = &buf[..];
        let file_code = head.read_i32::<BigEndian>()?;
        if file_code != FILE_CODE {
            return Err(Error::CorruptHeader(format!(
                "file code {file_code}, expected {FILE_CODE}"
            )));
        }
        let mut head = &buf[24..];
        let file_length = head.read_i32::<BigEndian>()?;
        if file_length < (HEADER_SIZE / 2) as i32 {
            return Err(Error::CorruptHeader(format!(
                "file length of {file_length} words"
            )));
        }
        let version = head.read_i32::<LittleEndian>()?;
        if version != VERSION {
            warn!("unexpected shapefile version {version}");
        }
        let shape_type = ShapeType::from_code(head.read_i32::<LittleEndian>()?)?;
        let mut bounds = [0f64; 8];
        head.read_f64_into::<LittleEndian>(&mut bounds)?;
        Ok(ShapefileHeader {
            file_length: file_length as u32,
            version,
            shape_type,
            bbox: BoundingBox {
                xy: Envelope::new(bounds[0], bounds[1], bounds[2], bounds[3]),
                z: (bounds[4], bounds[5]),
                m: (bounds[6], bounds[7]),
            },
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_i32::<BigEndian>(FILE_CODE)?;
        writer.write_all(&[0u8; 20])?;
        writer.write_i32::<BigEndian>(self.file_length as i32)?;
        writer.write_i32::<LittleEndian>(self.version)?;
        writer.write_i32::<LittleEndian>(self.shape_type.code())?;
        let b = self.bbox.normalized();
        for v in [
            b.xy.min_x, b.xy.min_y, b.xy.max_x, b.xy.max_y, b.z.0, b.z.1, b.m.0, b.m.1,
        ] {
            writer.write_f64::<LittleEndian>(v)?;
        }
        Ok(())
    }
}
