use crate::cursor::TableCursor;
use crate::dbf_header::{encoding_from_label, DbaseHeader};
use crate::dbf_reader::reader_state::Ready;
use crate::dbf_reader::DbfReader;
use crate::dbf_writer::DbfWriter;
use crate::error::{Error, Result, ResultExt};
use crate::files::sidecar;
use crate::prj::{read_prj, srid_from_wkt, BuiltinCrsRegistry, CrsRegistry};
use crate::shp_header::{ShapeType, ShapefileHeader};
use crate::shp_reader::ShpReader;
use crate::shp_writer::ShpWriter;
use crate::table::{row_index, Column, ColumnType, TableOptions, TableRow, TableSource, GEOMETRY_COLUMN};
use crate::value::Value;
use log::{debug, warn};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

pub(crate) fn open_dbf(path: &Path, options: &TableOptions) -> Result<DbfReader<BufReader<File>, Ready>> {
    let mut reader = DbfReader::from_path(path)?;
    if let Some(label) = &options.encoding {
        reader = reader.with_encoding(encoding_from_label(label).in_file(path)?);
    }
    Ok(reader.select_all())
}

pub(crate) fn dbf_columns(header: &DbaseHeader) -> Vec<Column> {
    header
        .fields()
        .iter()
        .map(|f| Column::new(f.name(), f.column_type()))
        .collect()
}

/// Shapefile exposed as a table: the geometry column plus the `.dbf` fields.
pub struct ShapefileTable {
    path: PathBuf,
    shp: ShpReader<BufReader<File>>,
    dbf: DbfReader<BufReader<File>, Ready>,
    columns: Vec<Column>,
    options: TableOptions,
    prj: Option<String>,
    srid: i32,
}

impl ShapefileTable {
    pub fn open(path: &Path, options: TableOptions) -> Result<Self> {
        Self::open_with_registry(path, options, &BuiltinCrsRegistry)
    }

    pub fn open_with_registry(
        path: &Path,
        options: TableOptions,
        registry: &dyn CrsRegistry,
    ) -> Result<Self> {
        let shp = ShpReader::from_path(path)?;
        let dbf = open_dbf(&sidecar(path, "dbf"), &options)?;
        if shp.shape_count() != dbf.row_count() {
            return Err(Error::StructuralMismatch(format!(
                "{} index entries for {} dBase records",
                shp.shape_count(),
                dbf.row_count()
            ))
            .in_file(path));
        }
        let prj = read_prj(&sidecar(path, "prj"))?;
        let srid = prj.as_deref().map_or(0, |wkt| srid_from_wkt(registry, wkt));
        let mut columns = dbf_columns(dbf.header());
        let at = options.geometry_column.min(columns.len());
        columns.insert(at, Column::geometry(GEOMETRY_COLUMN));
        debug!(
            "shapefile table {} with {} rows, srid {srid}",
            path.display(),
            dbf.row_count()
        );
        Ok(ShapefileTable {
            path: path.to_path_buf(),
            shp,
            dbf,
            columns,
            options,
            prj,
            srid,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
    pub fn shape_type(&self) -> ShapeType {
        self.shp.shape_type()
    }
    pub fn shapefile_header(&self) -> &ShapefileHeader {
        self.shp.header()
    }
    pub fn dbase_header(&self) -> &DbaseHeader {
        self.dbf.header()
    }
    /// WKT of the `.prj` sidecar.
    pub fn prj(&self) -> Option<&str> {
        self.prj.as_deref()
    }

    pub fn cursor(&mut self) -> TableCursor<'_> {
        TableCursor::new(self)
    }

    pub fn insert_row(&mut self, _values: Vec<Value>) -> Result<()> {
        Err(Error::UnsupportedOperation("insert into a shapefile table"))
    }

    pub fn remove_row(&mut self, _key: u64) -> Result<()> {
        Err(Error::UnsupportedOperation("row removal from a shapefile table"))
    }

    /// Replace the backing files by empty ones with the same schema.
    pub fn truncate(&mut self) -> Result<()> {
        let path = self.path.clone();
        let shx_path = sidecar(&path, "shx");
        let dbf_path = sidecar(&path, "dbf");
        let header = self.dbf.header().emptied();
        let shape_type = self.shape_type();

        let shp = BufWriter::new(File::create(&path).in_file(&path)?);
        let shx = BufWriter::new(File::create(&shx_path).in_file(&shx_path)?);
        ShpWriter::create(shp, shx, shape_type)?.close().in_file(&path)?;
        let dbf = BufWriter::new(File::create(&dbf_path).in_file(&dbf_path)?);
        DbfWriter::create(dbf, header)?.close().in_file(&dbf_path)?;

        self.shp = ShpReader::from_path(&path)?;
        self.dbf = open_dbf(&dbf_path, &self.options)?;
        debug!("truncated {}", path.display());
        Ok(())
    }
}

impl TableSource for ShapefileTable {
    fn columns(&self) -> &[Column] {
        &self.columns
    }
    fn row_count(&self) -> u64 {
        self.dbf.row_count() as u64
    }
    fn key_origin(&self) -> u64 {
        self.options.key_origin
    }
    fn get_row(&mut self, key: u64) -> Result<TableRow> {
        let index = row_index(key, self.options.key_origin, self.row_count())? as u32;
        let path = &self.path;
        let geometry = self.shp.read_geometry(index).in_file(path)?;
        if self.dbf.is_deleted(index)? {
            warn!("{}: record {index} is flagged as deleted", path.display());
        }
        let mut values = self.dbf.read_row(index).in_file(path)?;
        let at = self.options.geometry_column.min(values.len());
        values.insert(at, Value::from(geometry));
        Ok(TableRow { key, values })
    }
    fn srid(&self) -> i32 {
        self.srid
    }
    fn geometry_column(&self) -> Option<usize> {
        Some(self.options.geometry_column.min(self.columns.len() - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_codec::FieldDescriptor;
    use crate::geometry::{Coord, Geometry};

    fn write_points(path: &Path, count: usize, extra_dbf_rows: usize) -> Result<()> {
        let shp = BufWriter::new(File::create(path)?);
        let shx = BufWriter::new(File::create(path.with_extension("shx"))?);
        let mut writer = ShpWriter::create(shp, shx, ShapeType::Point)?;
        for i in 0..count {
            writer.write_geometry(Some(&Geometry::Point(Coord::xy(i as f64, -(i as f64)))))?;
        }
        writer.close()?;
        let header = DbaseHeader::with_fields(
            vec![FieldDescriptor::numeric("ID", 9, 0)?],
            encoding_rs::WINDOWS_1252,
        )?;
        let mut dbf = DbfWriter::create_path(&path.with_extension("dbf"), header)?;
        for i in 0..count + extra_dbf_rows {
            dbf.append_row(&[Value::Int(i as i64)])?;
        }
        dbf.close()?;
        Ok(())
    }

    #[test]
    fn rows_combine_geometry_and_attributes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("points.shp");
        write_points(&path, 3, 0)?;
        let mut table = ShapefileTable::open(&path, TableOptions::default())?;
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.columns()[0], Column::geometry(GEOMETRY_COLUMN));
        assert_eq!(table.columns()[1].name, "ID");
        let row = table.get_row(2)?;
        assert_eq!(row.key, 2);
        assert_eq!(
            row.values,
            vec![Value::Geometry(Geometry::Point(Coord::xy(1.0, -1.0))), Value::Int(1)]
        );
        assert_eq!(table.srid(), 0);
        Ok(())
    }

    #[test]
    fn geometry_column_position_and_origin() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("points.shp");
        write_points(&path, 2, 0)?;
        let options = TableOptions {
            key_origin: 0,
            geometry_column: 5,
            ..Default::default()
        };
        let mut table = ShapefileTable::open(&path, options)?;
        assert_eq!(table.geometry_column(), Some(1));
        let row = table.get_row(0)?;
        assert_eq!(row.values[0], Value::Int(0));
        assert!(row.geometry(1).is_some());
        assert!(table.get_row(2).is_err());
        Ok(())
    }

    #[test]
    fn count_mismatch_fails_at_open() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("points.shp");
        write_points(&path, 2, 1)?;
        let err = ShapefileTable::open(&path, TableOptions::default())
            .err()
            .expect("open must fail");
        assert!(matches!(err.root(), Error::StructuralMismatch(_)));
        Ok(())
    }

    #[test]
    fn mutations() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("points.shp");
        write_points(&path, 4, 0)?;
        let mut table = ShapefileTable::open(&path, TableOptions::default())?;
        assert!(matches!(
            table.insert_row(vec![]),
            Err(Error::UnsupportedOperation(_))
        ));
        assert!(matches!(
            table.remove_row(1),
            Err(Error::UnsupportedOperation(_))
        ));
        table.truncate()?;
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.shape_type(), ShapeType::Point);
        assert_eq!(table.dbase_header().num_fields(), 1);

        let reopened = ShapefileTable::open(&path, TableOptions::default())?;
        assert_eq!(reopened.row_count(), 0);
        Ok(())
    }

    #[test]
    fn cursor_walks_rows() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("points.shp");
        write_points(&path, 3, 0)?;
        let mut table = ShapefileTable::open(&path, TableOptions::default())?;
        let mut cursor = table.cursor();
        let mut ids = Vec::new();
        while cursor.next() {
            ids.push(cursor.get()?.values[1].clone());
        }
        assert_eq!(ids, vec![Value::Int(0), Value::Int(1), Value::Int(2)]);
        assert!(cursor.previous());
        assert_eq!(cursor.key(), Some(2));
        Ok(())
    }
}
