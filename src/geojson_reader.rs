//! GeoJSON input: geometries, features and feature collections.

use crate::error::{Error, Result, ResultExt};
use crate::geometry::{Coord, Geometry, LineString, LinearRing, Polygon};
use crate::table::{row_index, Column, ColumnType, TableOptions, TableRow, TableSource, GEOMETRY_COLUMN};
use crate::value::Value;
use log::debug;
use serde_json::{Map, Value as Json};
use std::path::Path;

fn malformed(reason: impl Into<String>) -> Error {
    Error::MalformedGeoJson(reason.into())
}

fn member<'a>(object: &'a Map<String, Json>, name: &str) -> Result<&'a Json> {
    object
        .get(name)
        .ok_or_else(|| malformed(format!("missing `{name}` member")))
}

fn array<'a>(json: &'a Json, what: &str) -> Result<&'a Vec<Json>> {
    json.as_array()
        .ok_or_else(|| malformed(format!("{what} must be an array")))
}

fn position(json: &Json) -> Result<Coord> {
    let ordinates = array(json, "position")?;
    let mut values = ordinates.iter().map(|o| {
        o.as_f64()
            .ok_or_else(|| malformed(format!("ordinate `{o}` is not a number")))
    });
    let (Some(x), Some(y)) = (values.next(), values.next()) else {
        return Err(malformed("position needs at least two ordinates"));
    };
    let z = values.next().transpose()?.unwrap_or(f64::NAN);
    let m = values.next().transpose()?.unwrap_or(f64::NAN);
    Ok(Coord { x: x?, y: y?, z, m })
}

fn positions(json: &Json) -> Result<Vec<Coord>> {
    array(json, "coordinates")?.iter().map(position).collect()
}

fn polygon(json: &Json) -> Result<Polygon> {
    let mut rings = array(json, "polygon coordinates")?
        .iter()
        .map(|ring| LinearRing::new(positions(ring)?));
    let exterior = rings
        .next()
        .ok_or_else(|| Error::InvalidGeometry("polygon without exterior ring".to_string()))??;
    Ok(Polygon::new(exterior, rings.collect::<Result<_>>()?))
}

/// Geometry of a GeoJSON geometry object. Type names are matched case-insensitively.
pub fn parse_geometry(json: &Json) -> Result<Geometry> {
    let object = json
        .as_object()
        .ok_or_else(|| malformed("geometry must be an object"))?;
    let kind = member(object, "type")?
        .as_str()
        .ok_or_else(|| malformed("`type` must be a string"))?;
    let coordinates = || member(object, "coordinates");
    let geometry = match kind.to_ascii_lowercase().as_str() {
        "point" => Geometry::Point(position(coordinates()?)?),
        "linestring" => Geometry::LineString(LineString(positions(coordinates()?)?)),
        "polygon" => Geometry::Polygon(polygon(coordinates()?)?),
        "multipoint" => Geometry::MultiPoint(positions(coordinates()?)?),
        "multilinestring" => Geometry::MultiLineString(
            array(coordinates()?, "coordinates")?
                .iter()
                .map(|line| positions(line).map(LineString))
                .collect::<Result<_>>()?,
        ),
        "multipolygon" => Geometry::MultiPolygon(
            array(coordinates()?, "coordinates")?
                .iter()
                .map(polygon)
                .collect::<Result<_>>()?,
        ),
        "geometrycollection" => Geometry::GeometryCollection(
            array(member(object, "geometries")?, "geometries")?
                .iter()
                .map(parse_geometry)
                .collect::<Result<_>>()?,
        ),
        _ => return Err(Error::UnsupportedGeometryType(kind.to_string())),
    };
    Ok(geometry)
}

/// Geometry of a GeoJSON text.
pub fn from_geojson(text: &str) -> Result<Geometry> {
    let json: Json = serde_json::from_str(text).map_err(|e| malformed(e.to_string()))?;
    parse_geometry(&json)
}

/// SRID named by a legacy `crs` member.
pub fn crs_srid(object: &Map<String, Json>) -> Option<i32> {
    let name = object
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()?;
    let lower = name.to_ascii_lowercase();
    if lower.ends_with("crs84") {
        return Some(4326);
    }
    lower.rsplit(':').next()?.parse().ok()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Null,
    Bool,
    Int,
    Double,
    Text,
}

impl Kind {
    fn of(json: &Json) -> Kind {
        match json {
            Json::Null => Kind::Null,
            Json::Bool(_) => Kind::Bool,
            Json::Number(n) if n.is_i64() => Kind::Int,
            Json::Number(_) => Kind::Double,
            _ => Kind::Text,
        }
    }

    fn merge(self, other: Kind) -> Kind {
        match (self, other) {
            (a, b) if a == b => a,
            (Kind::Null, k) | (k, Kind::Null) => k,
            (Kind::Int, Kind::Double) | (Kind::Double, Kind::Int) => Kind::Double,
            _ => Kind::Text,
        }
    }
}

struct PropertyColumn {
    name: String,
    kind: Kind,
    /// Longest value in UTF-8 bytes
    width: usize,
}

fn text_of(json: &Json) -> String {
    match json {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn cell(json: Option<&Json>, kind: Kind) -> Value {
    let Some(json) = json.filter(|j| !j.is_null()) else {
        return Value::Null;
    };
    match kind {
        Kind::Null => Value::Null,
        Kind::Bool => json.as_bool().map_or(Value::Null, Value::Bool),
        Kind::Int => json.as_i64().map_or(Value::Null, Value::Int),
        Kind::Double => json.as_f64().map_or(Value::Null, Value::Double),
        Kind::Text => Value::Text(text_of(json)),
    }
}

/// GeoJSON file loaded in memory and exposed as a table.
///
/// Columns are the geometry followed by the union of feature properties in
/// order of first appearance.
pub struct GeoJsonTable {
    name: Option<String>,
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
    srid: i32,
    options: TableOptions,
}

impl GeoJsonTable {
    pub fn open(path: &Path, options: TableOptions) -> Result<Self> {
        let bytes = std::fs::read(path).in_file(path)?;
        let text = match &options.encoding {
            Some(label) => {
                let encoding = crate::dbf_header::encoding_from_label(label).in_file(path)?;
                encoding.decode_with_bom_removal(&bytes).0.into_owned()
            }
            None => String::from_utf8(bytes)
                .map_err(|e| malformed(e.to_string()))
                .in_file(path)?,
        };
        let table = Self::parse(&text, options).in_file(path)?;
        debug!(
            "geojson table {} with {} rows, srid {}",
            path.display(),
            table.rows.len(),
            table.srid
        );
        Ok(table)
    }

    /// Parse a `FeatureCollection`, a single `Feature` or a bare geometry.
    pub fn parse(text: &str, options: TableOptions) -> Result<Self> {
        let json: Json = serde_json::from_str(text).map_err(|e| malformed(e.to_string()))?;
        let object = json
            .as_object()
            .ok_or_else(|| malformed("top level value must be an object"))?;
        let kind = member(object, "type")?.as_str().unwrap_or_default();
        let features: Vec<&Json> = match kind {
            "FeatureCollection" => array(member(object, "features")?, "features")?.iter().collect(),
            "Feature" => vec![&json],
            _ => vec![],
        };
        let name = object.get("name").and_then(Json::as_str).map(str::to_string);
        let srid = crs_srid(object).unwrap_or(0);

        if features.is_empty() && kind != "FeatureCollection" {
            let geometry = parse_geometry(&json)?;
            return Ok(Self::from_parts(name, vec![], vec![(Some(geometry), Map::new())], srid, options));
        }

        let mut parsed = Vec::with_capacity(features.len());
        for (i, feature) in features.into_iter().enumerate() {
            let object = feature
                .as_object()
                .ok_or_else(|| malformed(format!("feature {i} must be an object")))?;
            let geometry = match object.get("geometry") {
                None | Some(Json::Null) => None,
                Some(g) => Some(parse_geometry(g)?),
            };
            let properties = match object.get("properties") {
                Some(Json::Object(p)) => p.clone(),
                None | Some(Json::Null) => Map::new(),
                Some(_) => return Err(malformed(format!("properties of feature {i} must be an object"))),
            };
            parsed.push((geometry, properties));
        }

        let mut properties: Vec<PropertyColumn> = Vec::new();
        for (_, props) in &parsed {
            for (key, value) in props {
                let width = match value {
                    Json::Null => 0,
                    other => text_of(other).len(),
                };
                match properties.iter_mut().find(|c| &c.name == key) {
                    Some(column) => {
                        column.kind = column.kind.merge(Kind::of(value));
                        column.width = column.width.max(width);
                    }
                    None => properties.push(PropertyColumn {
                        name: key.clone(),
                        kind: Kind::of(value),
                        width,
                    }),
                }
            }
        }
        Ok(Self::from_parts(name, properties, parsed, srid, options))
    }

    fn from_parts(
        name: Option<String>,
        properties: Vec<PropertyColumn>,
        features: Vec<(Option<Geometry>, Map<String, Json>)>,
        srid: i32,
        options: TableOptions,
    ) -> Self {
        let mut columns: Vec<Column> = properties
            .iter()
            .map(|p| {
                let column_type = match p.kind {
                    Kind::Bool => ColumnType::Bool,
                    Kind::Int => ColumnType::Int {
                        length: p.width.clamp(1, 20) as u8,
                    },
                    Kind::Double => ColumnType::Double {
                        length: 24,
                        decimals: 15,
                    },
                    Kind::Null | Kind::Text => ColumnType::Text {
                        length: p.width.clamp(1, 254) as u8,
                    },
                };
                Column::new(&p.name, column_type)
            })
            .collect();
        let at = options.geometry_column.min(columns.len());
        columns.insert(at, Column::geometry(GEOMETRY_COLUMN));
        let rows = features
            .into_iter()
            .map(|(geometry, props)| {
                let mut values: Vec<Value> = properties
                    .iter()
                    .map(|p| {
                        let kind = if p.kind == Kind::Null { Kind::Text } else { p.kind };
                        cell(props.get(&p.name), kind)
                    })
                    .collect();
                values.insert(at, Value::from(geometry));
                values
            })
            .collect();
        GeoJsonTable {
            name,
            columns,
            rows,
            srid,
            options,
        }
    }

    /// `name` member of the collection.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl TableSource for GeoJsonTable {
    fn columns(&self) -> &[Column] {
        &self.columns
    }
    fn row_count(&self) -> u64 {
        self.rows.len() as u64
    }
    fn key_origin(&self) -> u64 {
        self.options.key_origin
    }
    fn get_row(&mut self, key: u64) -> Result<TableRow> {
        let index = row_index(key, self.options.key_origin, self.row_count())?;
        Ok(TableRow {
            key,
            values: self.rows[index as usize].clone(),
        })
    }
    fn srid(&self) -> i32 {
        self.srid
    }
    fn geometry_column(&self) -> Option<usize> {
        Some(self.options.geometry_column.min(self.columns.len() - 1))
    }
}
