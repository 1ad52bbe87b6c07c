//! GeoJSON 1.0 output.

use crate::cursor::TableScan;
use crate::error::{Error, Result};
use crate::geometry::{Coord, Geometry, LineString, Polygon};
use crate::table::{Column, TableRow, TableSource};
use crate::value::Value;
use fallible_streaming_iterator::FallibleStreamingIterator;
use std::io::Write;

#[derive(Clone, Copy, Debug)]
pub struct GeoJsonWriterOptions {
    /// Decimal places kept for each ordinate
    pub max_decimal_digits: u8,
}

impl Default for GeoJsonWriterOptions {
    fn default() -> Self {
        GeoJsonWriterOptions {
            max_decimal_digits: 9,
        }
    }
}

/// Round half up to `digits` decimal places.
pub fn round_ordinate(value: f64, digits: u8) -> f64 {
    let scale = 10f64.powi(digits as i32);
    let scaled = value * scale;
    // beyond 2^52 every f64 is already an integer
    if !scaled.is_finite() || scaled.abs() >= 4_503_599_627_370_496.0 {
        return value;
    }
    (scaled + 0.5).floor() / scale
}

fn write_number<W: Write>(out: &mut W, value: f64) -> Result<()> {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        write!(out, "{value:.1}")?;
    } else {
        write!(out, "{value}")?;
    }
    Ok(())
}

fn write_position<W: Write>(out: &mut W, c: &Coord, digits: u8) -> Result<()> {
    if !c.x.is_finite() || !c.y.is_finite() {
        return Err(Error::InvalidGeometry(format!(
            "coordinate ({}, {}) cannot be written as GeoJSON",
            c.x, c.y
        )));
    }
    out.write_all(b"[")?;
    write_number(out, round_ordinate(c.x, digits))?;
    out.write_all(b",")?;
    write_number(out, round_ordinate(c.y, digits))?;
    for ordinate in [c.z, c.m] {
        if !ordinate.is_nan() {
            out.write_all(b",")?;
            write_number(out, round_ordinate(ordinate, digits))?;
        }
    }
    out.write_all(b"]")?;
    Ok(())
}

fn write_positions<W: Write>(out: &mut W, coords: &[Coord], digits: u8) -> Result<()> {
    out.write_all(b"[")?;
    for (i, c) in coords.iter().enumerate() {
        if i > 0 {
            out.write_all(b",")?;
        }
        write_position(out, c, digits)?;
    }
    out.write_all(b"]")?;
    Ok(())
}

fn write_rings<W: Write>(out: &mut W, polygon: &Polygon, digits: u8) -> Result<()> {
    out.write_all(b"[")?;
    for (i, ring) in polygon.rings().enumerate() {
        if i > 0 {
            out.write_all(b",")?;
        }
        write_positions(out, ring.coords(), digits)?;
    }
    out.write_all(b"]")?;
    Ok(())
}

/// Write the GeoJSON object of `geometry`.
pub fn write_geometry<W: Write>(
    geometry: &Geometry,
    options: &GeoJsonWriterOptions,
    out: &mut W,
) -> Result<()> {
    let digits = options.max_decimal_digits;
    write!(out, r#"{{"type":"{}","#, geometry.kind_name())?;
    match geometry {
        Geometry::Point(c) => {
            out.write_all(br#""coordinates":"#)?;
            write_position(out, c, digits)?;
        }
        Geometry::LineString(LineString(coords)) | Geometry::MultiPoint(coords) => {
            out.write_all(br#""coordinates":"#)?;
            write_positions(out, coords, digits)?;
        }
        Geometry::Polygon(polygon) => {
            out.write_all(br#""coordinates":"#)?;
            write_rings(out, polygon, digits)?;
        }
        Geometry::MultiLineString(lines) => {
            out.write_all(br#""coordinates":["#)?;
            for (i, LineString(coords)) in lines.iter().enumerate() {
                if i > 0 {
                    out.write_all(b",")?;
                }
                write_positions(out, coords, digits)?;
            }
            out.write_all(b"]")?;
        }
        Geometry::MultiPolygon(polygons) => {
            out.write_all(br#""coordinates":["#)?;
            for (i, polygon) in polygons.iter().enumerate() {
                if i > 0 {
                    out.write_all(b",")?;
                }
                write_rings(out, polygon, digits)?;
            }
            out.write_all(b"]")?;
        }
        Geometry::GeometryCollection(members) => {
            out.write_all(br#""geometries":["#)?;
            for (i, member) in members.iter().enumerate() {
                if i > 0 {
                    out.write_all(b",")?;
                }
                write_geometry(member, options, out)?;
            }
            out.write_all(b"]")?;
        }
    }
    out.write_all(b"}")?;
    Ok(())
}

/// GeoJSON text of `geometry`.
pub fn to_geojson(geometry: &Geometry, max_decimal_digits: u8) -> Result<String> {
    let mut out = Vec::new();
    let options = GeoJsonWriterOptions { max_decimal_digits };
    write_geometry(geometry, &options, &mut out)?;
    String::from_utf8(out).map_err(|e| Error::InvalidGeometry(e.to_string()))
}

fn property_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null | Value::Geometry(_) => serde_json::Value::Null,
        Value::Bool(v) => (*v).into(),
        Value::Int(v) => (*v).into(),
        // NaN and infinities become null
        Value::Double(v) => serde_json::Number::from_f64(*v)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        Value::Text(v) => v.as_str().into(),
        Value::Date(_) => value.to_string().into(),
    }
}

/// Streaming `FeatureCollection` writer.
pub struct FeatureCollectionWriter<W: Write> {
    out: W,
    options: GeoJsonWriterOptions,
    features: u64,
}

impl<W: Write> FeatureCollectionWriter<W> {
    /// Write the collection header. `srid` 0 omits the `crs` member.
    pub fn create(
        mut out: W,
        name: Option<&str>,
        srid: i32,
        options: GeoJsonWriterOptions,
    ) -> Result<Self> {
        out.write_all(br#"{"type":"FeatureCollection""#)?;
        if let Some(name) = name {
            write!(out, r#","name":{}"#, serde_json::to_string(name)?)?;
        }
        if srid != 0 {
            write!(
                out,
                r#","crs":{{"type":"name","properties":{{"name":"urn:ogc:def:crs:EPSG::{srid}"}}}}"#
            )?;
        }
        out.write_all(br#","features":["#)?;
        Ok(FeatureCollectionWriter {
            out,
            options,
            features: 0,
        })
    }

    pub fn features_written(&self) -> u64 {
        self.features
    }

    pub fn write_feature(
        &mut self,
        columns: &[Column],
        row: &TableRow,
        geometry_column: Option<usize>,
    ) -> Result<()> {
        if self.features > 0 {
            self.out.write_all(b",")?;
        }
        self.out.write_all(br#"{"type":"Feature","geometry":"#)?;
        match geometry_column.and_then(|i| row.geometry(i)) {
            Some(geometry) => write_geometry(geometry, &self.options, &mut self.out)?,
            None => self.out.write_all(b"null")?,
        }
        let properties: serde_json::Map<String, serde_json::Value> = columns
            .iter()
            .zip(&row.values)
            .enumerate()
            .filter(|(i, _)| Some(*i) != geometry_column)
            .map(|(_, (column, value))| (column.name.clone(), property_value(value)))
            .collect();
        self.out.write_all(br#","properties":"#)?;
        serde_json::to_writer(&mut self.out, &properties)?;
        self.out.write_all(b"}")?;
        self.features += 1;
        Ok(())
    }

    /// Close the collection and hand back the output.
    pub fn finish(mut self) -> Result<W> {
        self.out.write_all(b"]}")?;
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Write all rows of `source` as a `FeatureCollection`. Returns the feature count.
pub fn write_table<W: Write>(
    source: &mut dyn TableSource,
    name: Option<&str>,
    srid: i32,
    options: GeoJsonWriterOptions,
    out: W,
) -> Result<(W, u64)> {
    let columns = source.columns().to_vec();
    let geometry_column = source.geometry_column();
    let mut writer = FeatureCollectionWriter::create(out, name, srid, options)?;
    let mut scan = TableScan::new(source);
    while let Some(row) = scan.next()? {
        writer
            .write_feature(&columns, row, geometry_column)
            .map_err(|e| e.at_record(row.key))?;
    }
    let count = writer.features_written();
    Ok((writer.finish()?, count))
}
