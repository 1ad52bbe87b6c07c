//! Geometry algorithms exposed as host callable scalar functions.
//!
//! A `NULL` geometry argument always gives a `NULL` result.

use crate::error::{Error, Result};
use crate::geojson_reader::from_geojson;
use crate::geojson_writer::{to_geojson, GeoJsonWriterOptions};
use crate::geometry::Geometry;
use crate::ops::{geometry_shadow, line_merge, minimum_rectangle};
use crate::value::Value;

pub trait ScalarFunction {
    fn name(&self) -> &'static str;
    /// Argument list as shown to users, optional arguments in brackets.
    fn signature(&self) -> &'static str;
    fn remarks(&self) -> &'static str;
    fn invoke(&self, args: &[Value]) -> Result<Value>;
}

/// All functions of this crate.
pub fn builtin_functions() -> Vec<Box<dyn ScalarFunction>> {
    vec![
        Box::new(AsGeoJson),
        Box::new(GeomFromGeoJson),
        Box::new(GeometryShadow),
        Box::new(LineMerge),
        Box::new(MinimumRectangle),
    ]
}

/// Function named `name`, ignoring case.
pub fn find_function(name: &str) -> Option<Box<dyn ScalarFunction>> {
    builtin_functions()
        .into_iter()
        .find(|f| f.name().eq_ignore_ascii_case(name))
}

fn arity(function: &dyn ScalarFunction, args: &[Value], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        return Err(Error::InvalidArgument(format!(
            "{} expects {}, got {} arguments",
            function.name(),
            function.signature(),
            args.len()
        )));
    }
    Ok(())
}

fn geometry_arg<'a>(name: &str, args: &'a [Value], i: usize) -> Result<Option<&'a Geometry>> {
    match &args[i] {
        Value::Null => Ok(None),
        Value::Geometry(g) => Ok(Some(g)),
        other => Err(Error::InvalidArgument(format!(
            "{name}: argument {} must be a geometry, not {}",
            i + 1,
            other.type_name()
        ))),
    }
}

fn number_arg(name: &str, args: &[Value], i: usize) -> Result<f64> {
    args[i].as_f64().ok_or_else(|| {
        Error::InvalidArgument(format!(
            "{name}: argument {} must be a number, not {}",
            i + 1,
            args[i].type_name()
        ))
    })
}

pub struct AsGeoJson;

impl ScalarFunction for AsGeoJson {
    fn name(&self) -> &'static str {
        "ST_AsGeoJSON"
    }
    fn signature(&self) -> &'static str {
        "ST_AsGeoJSON(geometry [, maxdecimaldigits])"
    }
    fn remarks(&self) -> &'static str {
        "Return the geometry as a GeoJSON 1.0 geometry object. Ordinates are \
         rounded to at most maxdecimaldigits decimals, 9 by default."
    }
    fn invoke(&self, args: &[Value]) -> Result<Value> {
        arity(self, args, 1, 2)?;
        let Some(geometry) = geometry_arg(self.name(), args, 0)? else {
            return Ok(Value::Null);
        };
        let digits = match args.get(1) {
            None | Some(Value::Null) => GeoJsonWriterOptions::default().max_decimal_digits,
            Some(Value::Int(d)) => u8::try_from(*d).map_err(|_| {
                Error::InvalidArgument(format!("{}: invalid maxdecimaldigits {d}", self.name()))
            })?,
            Some(other) => {
                return Err(Error::InvalidArgument(format!(
                    "{}: maxdecimaldigits must be an integer, not {}",
                    self.name(),
                    other.type_name()
                )))
            }
        };
        Ok(Value::Text(to_geojson(geometry, digits)?))
    }
}

pub struct GeomFromGeoJson;

impl ScalarFunction for GeomFromGeoJson {
    fn name(&self) -> &'static str {
        "ST_GeomFromGeoJSON"
    }
    fn signature(&self) -> &'static str {
        "ST_GeomFromGeoJSON(text)"
    }
    fn remarks(&self) -> &'static str {
        "Parse a GeoJSON 1.0 geometry object."
    }
    fn invoke(&self, args: &[Value]) -> Result<Value> {
        arity(self, args, 1, 1)?;
        match &args[0] {
            Value::Null => Ok(Value::Null),
            Value::Text(text) => Ok(Value::Geometry(from_geojson(text)?)),
            other => Err(Error::InvalidArgument(format!(
                "{}: argument must be text, not {}",
                self.name(),
                other.type_name()
            ))),
        }
    }
}

pub struct GeometryShadow;

impl ScalarFunction for GeometryShadow {
    fn name(&self) -> &'static str {
        "ST_GeometryShadow"
    }
    fn signature(&self) -> &'static str {
        "ST_GeometryShadow(geometry, azimuth, altitude, height [, union])"
    }
    fn remarks(&self) -> &'static str {
        "Shadow footprint of a point, line or polygon extruded to height, for a \
         sun at azimuth (clockwise from north) and altitude, both in radians. \
         Shadows of single edges are merged unless union is false."
    }
    fn invoke(&self, args: &[Value]) -> Result<Value> {
        arity(self, args, 4, 5)?;
        let Some(geometry) = geometry_arg(self.name(), args, 0)? else {
            return Ok(Value::Null);
        };
        let azimuth = number_arg(self.name(), args, 1)?;
        let altitude = number_arg(self.name(), args, 2)?;
        let height = number_arg(self.name(), args, 3)?;
        let union = match args.get(4) {
            None | Some(Value::Null) => true,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                return Err(Error::InvalidArgument(format!(
                    "{}: union must be a boolean, not {}",
                    self.name(),
                    other.type_name()
                )))
            }
        };
        geometry_shadow(geometry, azimuth, altitude, height, union).map(Value::Geometry)
    }
}

pub struct LineMerge;

impl ScalarFunction for LineMerge {
    fn name(&self) -> &'static str {
        "ST_LineMerge"
    }
    fn signature(&self) -> &'static str {
        "ST_LineMerge(geometry)"
    }
    fn remarks(&self) -> &'static str {
        "Merge the linestrings of a geometry into maximal linestrings joined \
         at their endpoints."
    }
    fn invoke(&self, args: &[Value]) -> Result<Value> {
        arity(self, args, 1, 1)?;
        Ok(match geometry_arg(self.name(), args, 0)? {
            Some(geometry) => Value::Geometry(line_merge(geometry)),
            None => Value::Null,
        })
    }
}

pub struct MinimumRectangle;

impl ScalarFunction for MinimumRectangle {
    fn name(&self) -> &'static str {
        "ST_MinimumRectangle"
    }
    fn signature(&self) -> &'static str {
        "ST_MinimumRectangle(geometry)"
    }
    fn remarks(&self) -> &'static str {
        "Gets the minimum rectangular polygon which encloses the input geometry."
    }
    fn invoke(&self, args: &[Value]) -> Result<Value> {
        arity(self, args, 1, 1)?;
        let Some(geometry) = geometry_arg(self.name(), args, 0)? else {
            return Ok(Value::Null);
        };
        Ok(minimum_rectangle(geometry)?.map_or(Value::Null, Value::Geometry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Coord, LineString};

    fn call(name: &str, args: &[Value]) -> Result<Value> {
        find_function(name).unwrap().invoke(args)
    }

    #[test]
    fn registry() {
        let names: Vec<_> = builtin_functions().iter().map(|f| f.name()).collect();
        assert_eq!(names.len(), 5);
        assert!(find_function("st_linemerge").is_some());
        assert!(find_function("ST_Buffer").is_none());
        for function in builtin_functions() {
            assert!(function.signature().starts_with(function.name()));
            assert!(!function.remarks().is_empty());
        }
    }

    #[test]
    fn geojson_functions() -> Result<()> {
        let point = Value::Geometry(Geometry::Point(Coord::xy(1.123456, 2.0)));
        assert_eq!(
            call("ST_AsGeoJSON", &[point.clone(), Value::Int(2)])?,
            Value::from(r#"{"type":"Point","coordinates":[1.12,2.0]}"#)
        );
        let text = call("ST_AsGeoJSON", &[point.clone()])?;
        assert_eq!(call("ST_GeomFromGeoJSON", &[text])?, point);
        assert_eq!(call("ST_AsGeoJSON", &[Value::Null])?, Value::Null);
        assert!(call("ST_AsGeoJSON", &[Value::Int(1)]).is_err());
        assert!(call("ST_AsGeoJSON", &[point, Value::Int(-1)]).is_err());
        Ok(())
    }

    #[test]
    fn shadow_arguments() -> Result<()> {
        let point = Value::Geometry(Geometry::Point(Coord::xy(0.0, 0.0)));
        let zenith = std::f64::consts::FRAC_PI_2;
        let args = [point.clone(), Value::Double(0.0), Value::Double(zenith), Value::Int(10)];
        assert_eq!(call("ST_GeometryShadow", &args)?, point);
        assert!(call("ST_GeometryShadow", &args[..3]).is_err());
        let negative = [point, Value::Double(0.0), Value::Double(zenith), Value::Int(-1)];
        assert!(matches!(
            call("ST_GeometryShadow", &negative),
            Err(Error::InvalidArgument(_))
        ));
        Ok(())
    }

    #[test]
    fn merge_and_rectangle() -> Result<()> {
        let lines = Value::Geometry(Geometry::MultiLineString(vec![
            LineString(vec![Coord::xy(0.0, 0.0), Coord::xy(1.0, 0.0)]),
            LineString(vec![Coord::xy(1.0, 0.0), Coord::xy(2.0, 0.0)]),
        ]));
        let merged = call("ST_LineMerge", &[lines.clone()])?;
        assert_eq!(
            merged,
            Value::Geometry(Geometry::MultiLineString(vec![LineString(vec![
                Coord::xy(0.0, 0.0),
                Coord::xy(1.0, 0.0),
                Coord::xy(2.0, 0.0)
            ])]))
        );
        assert_eq!(
            call("ST_MinimumRectangle", &[lines])?,
            Value::Geometry(Geometry::LineString(LineString(vec![
                Coord::xy(0.0, 0.0),
                Coord::xy(2.0, 0.0)
            ])))
        );
        assert_eq!(call("ST_MinimumRectangle", &[Value::Null])?, Value::Null);
        Ok(())
    }
}
