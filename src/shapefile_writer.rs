use crate::dbf_header::DbaseHeader;
use crate::dbf_writer::DbfWriter;
use crate::error::{Error, Result, ResultExt};
use crate::field_codec::{FieldDescriptor, FieldType};
use crate::files::{commit, sidecar, stage, write_cpg, StagedWriter};
use crate::prj::write_prj;
use crate::shp_header::{ShapeKind, ShapeType};
use crate::shp_writer::ShpWriter;
use crate::table::{Column, ColumnType, TableRow};
use crate::value::Value;
use crate::geometry::Geometry;
use encoding_rs::Encoding;
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// dBase field storing values of a table column.
pub fn field_for_column(column: &Column) -> Result<FieldDescriptor> {
    let mut name: String = column.name.chars().filter(|c| c.is_ascii()).take(10).collect();
    if name.is_empty() {
        name = "FIELD".to_string();
    }
    match &column.column_type {
        ColumnType::Text { length } => FieldDescriptor::character(&name, (*length).max(1)),
        ColumnType::Int { length } => {
            FieldDescriptor::numeric(&name, (*length).clamp(1, 20), 0)
        }
        ColumnType::Double { length, decimals } => {
            let length = (*length).clamp(3, 33);
            let decimals = (*decimals).min(length.saturating_sub(2));
            FieldDescriptor::new(&name, FieldType::Numeric, length, decimals)
        }
        ColumnType::Bool => FieldDescriptor::logical(&name),
        ColumnType::Date => FieldDescriptor::date(&name),
        ColumnType::Geometry => Err(Error::InvalidArgument(format!(
            "geometry column `{}` has no dBase field",
            column.name
        ))),
    }
}

/// dBase header for every non geometry column.
pub fn dbase_header_for(columns: &[Column], encoding: &'static Encoding) -> Result<DbaseHeader> {
    let mut header = DbaseHeader::new(encoding);
    for column in columns.iter().filter(|c| c.column_type != ColumnType::Geometry) {
        header.add_field(field_for_column(column)?)?;
    }
    Ok(header)
}

/// Shape type able to store `geometry`.
pub fn shape_type_for(geometry: &Geometry) -> Result<ShapeType> {
    let kind = match geometry {
        Geometry::Point(_) => ShapeKind::Point,
        Geometry::MultiPoint(_) => ShapeKind::MultiPoint,
        Geometry::LineString(_) | Geometry::MultiLineString(_) => ShapeKind::PolyLine,
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) => ShapeKind::Polygon,
        Geometry::GeometryCollection(_) => {
            return Err(Error::UnsupportedGeometryType(
                "GeometryCollection cannot be stored in a shapefile".to_string(),
            ))
        }
    };
    Ok(ShapeType::from_kind(kind, geometry.has_z(), geometry.has_m()))
}

struct Staged {
    shp: ShpWriter<StagedWriter>,
    dbf: DbfWriter<StagedWriter>,
}

/// Writes a complete shapefile: `.shp`, `.shx`, `.dbf`, `.cpg` and optionally `.prj`.
///
/// Output goes to temporary files renamed into place by [`close`](Self::close);
/// dropping the writer before that leaves no file behind.
pub struct ShapefileWriter {
    path: PathBuf,
    geometry_column: usize,
    encoding: &'static Encoding,
    prj: Option<String>,
    staged: Option<Staged>,
}

impl ShapefileWriter {
    /// `geometry_column` is the position of the geometry in written rows,
    /// the other values follow the fields of `header`.
    pub fn create(
        path: &Path,
        shape_type: ShapeType,
        header: DbaseHeader,
        geometry_column: usize,
    ) -> Result<Self> {
        let encoding = header.encoding();
        let shp = ShpWriter::create(
            stage(path)?,
            stage(&sidecar(path, "shx"))?,
            shape_type,
        )
        .in_file(path)?;
        let dbf_path = sidecar(path, "dbf");
        let dbf = DbfWriter::create(stage(&dbf_path)?, header).in_file(&dbf_path)?;
        debug!("writing {} ({shape_type:?})", path.display());
        Ok(ShapefileWriter {
            path: path.to_path_buf(),
            geometry_column,
            encoding,
            prj: None,
            staged: Some(Staged { shp, dbf }),
        })
    }

    /// WKT written to the `.prj` sidecar on close.
    pub fn with_prj(mut self, wkt: impl Into<String>) -> Self {
        self.prj = Some(wkt.into());
        self
    }

    pub fn records_written(&self) -> u32 {
        self.staged.as_ref().map_or(0, |s| s.shp.record_count())
    }

    pub fn write_values(&mut self, values: &[Value]) -> Result<()> {
        let staged = self
            .staged
            .as_mut()
            .ok_or(Error::UnsupportedOperation("write to a closed shapefile writer"))?;
        if self.geometry_column >= values.len() {
            return Err(Error::StructuralMismatch(format!(
                "row of {} values has no geometry at position {}",
                values.len(),
                self.geometry_column
            )));
        }
        let geometry = match &values[self.geometry_column] {
            Value::Null => None,
            Value::Geometry(g) => Some(g),
            other => {
                return Err(Error::InvalidArgument(format!(
                    "expected a geometry, got a {} value",
                    other.type_name()
                )))
            }
        };
        let attributes: Vec<Value> = values
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != self.geometry_column)
            .map(|(_, v)| v.clone())
            .collect();
        // attributes are encoded first so a rejected row writes nothing
        staged.dbf.encode_record(&attributes).in_file(&self.path)?;
        let record = staged.shp.record_count() as u64;
        staged
            .shp
            .write_geometry(geometry)
            .map_err(|e| e.at_record(record))
            .in_file(&self.path)?;
        staged.dbf.write_record().in_file(&self.path)
    }

    pub fn write_row(&mut self, row: &TableRow) -> Result<()> {
        self.write_values(&row.values)
    }

    /// Finish all files and move them into place. Returns the written paths.
    pub fn close(mut self) -> Result<Vec<PathBuf>> {
        let Some(staged) = self.staged.take() else {
            return Ok(Vec::new());
        };
        let shp_path = self.path.clone();
        let shx_path = sidecar(&shp_path, "shx");
        let dbf_path = sidecar(&shp_path, "dbf");
        let cpg_path = sidecar(&shp_path, "cpg");
        let count = staged.shp.record_count();
        if count != staged.dbf.records_written() {
            return Err(Error::StructuralMismatch(format!(
                "{count} shapes for {} dBase records",
                staged.dbf.records_written()
            ))
            .in_file(&self.path));
        }
        let (shp, shx) = staged.shp.close().in_file(&shp_path)?;
        let dbf = staged.dbf.close().in_file(&dbf_path)?;
        commit(shp, &shp_path)?;
        commit(shx, &shx_path)?;
        commit(dbf, &dbf_path)?;
        let mut written = vec![shp_path, shx_path, dbf_path];
        let sidecars = (|| -> Result<()> {
            write_cpg(&cpg_path, self.encoding)?;
            written.push(cpg_path.clone());
            if let Some(wkt) = &self.prj {
                let prj_path = sidecar(&self.path, "prj");
                write_prj(&prj_path, wkt)?;
                written.push(prj_path);
            }
            Ok(())
        })();
        if let Err(e) = sidecars {
            remove_all(&written);
            return Err(e);
        }
        debug!("closed {} with {count} records", self.path.display());
        Ok(written)
    }
}

pub(crate) fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("could not remove {}: {e}", path.display());
        }
    }
}

impl Drop for ShapefileWriter {
    fn drop(&mut self) {
        if self.staged.is_some() {
            warn!(
                "shapefile writer for {} dropped before close, output discarded",
                self.path.display()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Coord, LineString};
    use crate::shp_table::ShapefileTable;
    use crate::table::{TableOptions, TableSource};

    fn columns() -> Vec<Column> {
        vec![
            Column::geometry("THE_GEOM"),
            Column::new("NAME", ColumnType::Text { length: 20 }),
            Column::new("GID", ColumnType::Int { length: 18 }),
        ]
    }

    fn line(x: f64) -> Value {
        Value::Geometry(Geometry::LineString(LineString(vec![
            Coord::xy(x, 0.0),
            Coord::xy(x + 1.0, 1.0),
        ])))
    }

    #[test]
    fn writes_all_sidecars() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("rivers.shp");
        let header = dbase_header_for(&columns(), encoding_rs::UTF_8)?;
        let mut writer = ShapefileWriter::create(&path, ShapeType::PolyLine, header, 0)?
            .with_prj("LOCAL_CS[\"test\"]");
        writer.write_values(&[line(0.0), Value::from("river"), Value::Int(1)])?;
        writer.write_values(&[Value::Null, Value::from("dry"), Value::Int(2)])?;
        assert_eq!(writer.records_written(), 2);
        let written = writer.close()?;
        assert_eq!(written.len(), 5);
        assert!(written.iter().all(|p| p.exists()));

        let mut table = ShapefileTable::open(&path, TableOptions::default())?;
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.get_row(2)?.values[0], Value::Null);
        assert_eq!(table.prj(), Some("LOCAL_CS[\"test\"]"));
        Ok(())
    }

    #[test]
    fn dropped_writer_leaves_nothing() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("rivers.shp");
        let header = dbase_header_for(&columns(), encoding_rs::UTF_8)?;
        let mut writer = ShapefileWriter::create(&path, ShapeType::PolyLine, header, 0)?;
        writer.write_values(&[line(0.0), Value::from("river"), Value::Int(1)])?;
        let point = Value::Geometry(Geometry::Point(Coord::xy(0.0, 0.0)));
        assert!(writer
            .write_values(&[point, Value::from("x"), Value::Int(2)])
            .is_err());
        drop(writer);
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn rejected_attributes_write_no_shape() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("codes.shp");
        let columns = vec![
            Column::geometry("THE_GEOM"),
            Column::new("CODE", ColumnType::Text { length: 2 }),
        ];
        let header = dbase_header_for(&columns, encoding_rs::UTF_8)?;
        let mut writer = ShapefileWriter::create(&path, ShapeType::PolyLine, header, 0)?;
        writer.write_values(&[line(0.0), Value::from("ok")])?;
        let err = writer
            .write_values(&[line(1.0), Value::from("too long")])
            .unwrap_err();
        assert!(matches!(err.root(), Error::MalformedField { .. }));
        assert_eq!(writer.records_written(), 1);
        writer.write_values(&[line(2.0), Value::from("ok")])?;
        assert_eq!(writer.records_written(), 2);
        writer.close()?;

        let mut table = ShapefileTable::open(&path, TableOptions::default())?;
        assert_eq!(table.row_count(), 2);
        let row = table.get_row(2)?;
        assert_eq!(row.values[1], Value::from("ok"));
        let length = row.values[0].as_geometry().unwrap().length();
        assert!((length - 2f64.sqrt()).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn shape_types_for_geometries() -> Result<()> {
        let z_point = Geometry::Point(Coord::xyz(1.0, 2.0, 3.0));
        assert_eq!(shape_type_for(&z_point)?, ShapeType::PointZ);
        let lines = Geometry::MultiLineString(vec![]);
        assert_eq!(shape_type_for(&lines)?, ShapeType::PolyLine);
        assert!(shape_type_for(&Geometry::GeometryCollection(vec![])).is_err());
        Ok(())
    }

    #[test]
    fn fields_for_columns() -> Result<()> {
        let header = dbase_header_for(&columns(), encoding_rs::UTF_8)?;
        assert_eq!(header.num_fields(), 2);
        assert_eq!(header.fields()[1].length(), 18);
        let long_name = Column::new("a_very_long_name", ColumnType::Bool);
        assert_eq!(field_for_column(&long_name)?.name(), "a_very_lon");
        Ok(())
    }
}
