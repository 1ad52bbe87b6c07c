//! File format drivers: import into a [`Catalog`], export any [`TableSource`].

use crate::cursor::TableScan;
use crate::dbf_header::encoding_from_label;
use crate::dbf_table::DbfTable;
use crate::dbf_writer::DbfWriter;
use crate::error::{Error, Result, ResultExt};
use crate::files::{commit, extension, prepare_targets, sidecar, stage, write_cpg};
use crate::geojson_reader::GeoJsonTable;
use crate::geojson_writer::{write_table, GeoJsonWriterOptions};
use crate::prj::{BuiltinCrsRegistry, CrsRegistry};
use crate::shapefile_writer::{dbase_header_for, remove_all, shape_type_for, ShapefileWriter};
use crate::shp_header::ShapeType;
use crate::shp_table::ShapefileTable;
use crate::table::{Catalog, Column, ColumnType, TableOptions, TableRow, TableSource};
use crate::value::Value;
use encoding_rs::Encoding;
use fallible_streaming_iterator::FallibleStreamingIterator;
use log::{debug, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct ImportOptions {
    /// Encoding label overriding the one declared by the file
    pub encoding: Option<String>,
    /// Replace an existing destination table
    pub delete_existing: bool,
    pub key_origin: u64,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            encoding: None,
            delete_existing: false,
            key_origin: 1,
        }
    }
}

impl ImportOptions {
    fn table_options(&self) -> TableOptions {
        TableOptions {
            encoding: self.encoding.clone(),
            key_origin: self.key_origin,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExportOptions {
    /// Text encoding of the written attributes, UTF-8 when unset
    pub encoding: Option<String>,
    /// Replace existing files
    pub delete_existing: bool,
    /// GeoJSON only
    pub max_decimal_digits: u8,
    /// Overrides the SRID of the source
    pub srid: Option<i32>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            encoding: None,
            delete_existing: false,
            max_decimal_digits: GeoJsonWriterOptions::default().max_decimal_digits,
            srid: None,
        }
    }
}

impl ExportOptions {
    fn encoding(&self) -> Result<&'static Encoding> {
        match &self.encoding {
            Some(label) => encoding_from_label(label),
            None => Ok(encoding_rs::UTF_8),
        }
    }
}

/// A file format able to import and export tables.
pub trait DriverFunction {
    fn import_formats(&self) -> &'static [&'static str];
    fn export_formats(&self) -> &'static [&'static str];
    /// Human readable name of the format of `extension`, empty when unknown.
    fn format_description(&self, extension: &str) -> &'static str;
    fn is_spatial_format(&self, extension: &str) -> bool;
    fn open_table(&self, path: &Path, options: TableOptions) -> Result<Box<dyn TableSource>>;

    /// Copy the file into a new catalog table. Returns the number of rows.
    fn import_file(
        &self,
        catalog: &mut dyn Catalog,
        table: &str,
        path: &Path,
        options: &ImportOptions,
    ) -> Result<u64> {
        prepare_destination(catalog, table, options.delete_existing)?;
        let mut source = self.open_table(path, options.table_options())?;
        let rows = import_rows(catalog, table, source.as_mut())
            .map_err(|e| e.in_file(path))?;
        info!("imported {rows} rows from {} into {table}", path.display());
        Ok(rows)
    }

    /// Write `source` to `path`. Returns the written files.
    fn export_table(
        &self,
        source: &mut dyn TableSource,
        path: &Path,
        options: &ExportOptions,
    ) -> Result<Vec<PathBuf>>;
}

fn prepare_destination(catalog: &mut dyn Catalog, table: &str, delete_existing: bool) -> Result<()> {
    if !catalog.contains(table) {
        return Ok(());
    }
    if !delete_existing {
        return Err(Error::InvalidArgument(format!(
            "table `{table}` already exists"
        )));
    }
    debug!("dropping existing table {table}");
    catalog.drop_table(table)?;
    Ok(())
}

/// Create `table` and fill it; the table is dropped again on failure.
pub fn import_rows(catalog: &mut dyn Catalog, table: &str, source: &mut dyn TableSource) -> Result<u64> {
    catalog.create_table(table, source.columns().to_vec(), source.srid())?;
    let copy = (|| -> Result<u64> {
        let mut rows = 0;
        let mut scan = TableScan::new(&mut *source);
        while let Some(row) = scan.next()? {
            catalog.insert(table, row.values.clone())?;
            rows += 1;
        }
        Ok(rows)
    })();
    let closed = source.close();
    match copy.and_then(|rows| closed.map(|_| rows)) {
        Ok(rows) => Ok(rows),
        Err(e) => {
            if let Err(drop_error) = catalog.drop_table(table) {
                warn!("could not drop {table} after a failed import: {drop_error}");
            }
            Err(e)
        }
    }
}

/// Remove whatever part of an export was written.
fn discard(targets: &[PathBuf]) {
    let written: Vec<PathBuf> = targets.iter().filter(|t| t.exists()).cloned().collect();
    remove_all(&written);
}

fn with_cleanup<T>(targets: &[PathBuf], export: impl FnOnce() -> Result<T>) -> Result<T> {
    let result = export();
    if result.is_err() {
        discard(targets);
    }
    result
}

fn attribute_indices(columns: &[Column]) -> Vec<usize> {
    columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.column_type != ColumnType::Geometry)
        .map(|(i, _)| i)
        .collect()
}

fn attribute_columns(columns: &[Column]) -> Vec<Column> {
    columns
        .iter()
        .filter(|c| c.column_type != ColumnType::Geometry)
        .cloned()
        .collect()
}

/// Widest text a character field can hold.
const MAX_TEXT_WIDTH: usize = 254;

/// What an export needs to know before writing the first row.
struct Survey {
    /// Source columns, text widths grown to the longest encoded value
    columns: Vec<Column>,
    /// Shape type of the first geometry
    shape_type: Option<ShapeType>,
}

/// First pass over `source`, measuring text in the output `encoding`.
fn survey(
    source: &mut dyn TableSource,
    encoding: &'static Encoding,
    geometry_column: Option<usize>,
) -> Result<Survey> {
    let mut columns = source.columns().to_vec();
    let mut shape_type = None;
    let mut scan = TableScan::new(&mut *source);
    while let Some(row) = scan.next()? {
        if shape_type.is_none() {
            if let Some(geometry) = geometry_column.and_then(|i| row.geometry(i)) {
                shape_type = Some(shape_type_for(geometry)?);
            }
        }
        for (column, value) in columns.iter_mut().zip(&row.values) {
            if let ColumnType::Text { length } = &mut column.column_type {
                let width = encoded_width(value, encoding).min(MAX_TEXT_WIDTH) as u8;
                *length = (*length).max(width);
            }
        }
    }
    Ok(Survey {
        columns,
        shape_type,
    })
}

fn encoded_width(value: &Value, encoding: &'static Encoding) -> usize {
    match value {
        Value::Null | Value::Geometry(_) => 0,
        Value::Text(text) => encoding.encode(text).0.len(),
        other => encoding.encode(&other.to_string()).0.len(),
    }
}

/// ESRI shapefiles: `.shp`, `.shx`, `.dbf` and their `.prj`, `.cpg` sidecars.
pub struct ShpDriver {
    registry: Box<dyn CrsRegistry>,
}

impl Default for ShpDriver {
    fn default() -> Self {
        ShpDriver {
            registry: Box::new(BuiltinCrsRegistry),
        }
    }
}

impl ShpDriver {
    pub fn with_registry(registry: Box<dyn CrsRegistry>) -> Self {
        ShpDriver { registry }
    }

    fn create_writer(
        &self,
        path: &Path,
        shape_type: ShapeType,
        columns: &[Column],
        encoding: &'static Encoding,
        srid: i32,
    ) -> Result<ShapefileWriter> {
        let header = dbase_header_for(columns, encoding)?;
        let writer = ShapefileWriter::create(path, shape_type, header, 0)?;
        Ok(match self.registry.wkt_for_srid(srid) {
            Some(wkt) if srid != 0 => writer.with_prj(wkt.into_owned()),
            _ => writer,
        })
    }
}

impl DriverFunction for ShpDriver {
    fn import_formats(&self) -> &'static [&'static str] {
        &["shp"]
    }
    fn export_formats(&self) -> &'static [&'static str] {
        &["shp"]
    }
    fn format_description(&self, extension: &str) -> &'static str {
        if extension.eq_ignore_ascii_case("shp") {
            "ESRI shapefile"
        } else {
            ""
        }
    }
    fn is_spatial_format(&self, extension: &str) -> bool {
        extension.eq_ignore_ascii_case("shp")
    }
    fn open_table(&self, path: &Path, options: TableOptions) -> Result<Box<dyn TableSource>> {
        Ok(Box::new(ShapefileTable::open_with_registry(
            path,
            options,
            self.registry.as_ref(),
        )?))
    }

    fn export_table(
        &self,
        source: &mut dyn TableSource,
        path: &Path,
        options: &ExportOptions,
    ) -> Result<Vec<PathBuf>> {
        let targets: Vec<PathBuf> = ["shp", "shx", "dbf", "cpg", "prj"]
            .iter()
            .map(|ext| sidecar(path, ext))
            .collect();
        prepare_targets(&targets, options.delete_existing)?;
        let encoding = options.encoding()?;
        let geometry_column = source.geometry_column().ok_or_else(|| {
            Error::InvalidArgument("a shapefile needs a geometry column".to_string())
        })?;
        let srid = options.srid.unwrap_or_else(|| source.srid());
        let columns = source.columns().to_vec();
        let attributes = attribute_indices(&columns);
        if columns.len() - attributes.len() > 1 {
            warn!("only the geometry column {geometry_column} is written to {}", path.display());
        }
        // geometry first, then the attributes
        let project = |row: &TableRow| -> Vec<Value> {
            std::iter::once(row.values[geometry_column].clone())
                .chain(attributes.iter().map(|&i| row.values[i].clone()))
                .collect()
        };

        with_cleanup(&targets, || {
            let survey = survey(&mut *source, encoding, Some(geometry_column))?;
            let shape_type = survey.shape_type.unwrap_or(ShapeType::Null);
            let mut writer = self.create_writer(
                path,
                shape_type,
                &attribute_columns(&survey.columns),
                encoding,
                srid,
            )?;
            let mut scan = TableScan::new(&mut *source);
            while let Some(row) = scan.next()? {
                if row.values.len() != columns.len() {
                    return Err(Error::StructuralMismatch(format!(
                        "row {} has {} values for {} columns",
                        row.key,
                        row.values.len(),
                        columns.len()
                    )));
                }
                writer.write_values(&project(row))?;
            }
            let count = writer.records_written();
            let written = writer.close()?;
            info!("exported {count} rows to {}", path.display());
            Ok(written)
        })
    }
}

/// Lone dBase files, without geometry.
#[derive(Clone, Copy, Debug, Default)]
pub struct DbfDriver;

impl DriverFunction for DbfDriver {
    fn import_formats(&self) -> &'static [&'static str] {
        &["dbf"]
    }
    fn export_formats(&self) -> &'static [&'static str] {
        &["dbf"]
    }
    fn format_description(&self, extension: &str) -> &'static str {
        if extension.eq_ignore_ascii_case("dbf") {
            "DBase 3 file"
        } else {
            ""
        }
    }
    fn is_spatial_format(&self, _extension: &str) -> bool {
        false
    }
    fn open_table(&self, path: &Path, options: TableOptions) -> Result<Box<dyn TableSource>> {
        Ok(Box::new(DbfTable::open(path, options)?))
    }

    fn export_table(
        &self,
        source: &mut dyn TableSource,
        path: &Path,
        options: &ExportOptions,
    ) -> Result<Vec<PathBuf>> {
        let cpg = sidecar(path, "cpg");
        let targets = vec![path.to_path_buf(), cpg.clone()];
        prepare_targets(&targets, options.delete_existing)?;
        let encoding = options.encoding()?;
        let attributes = attribute_indices(source.columns());

        with_cleanup(&targets, || {
            let survey = survey(&mut *source, encoding, None)?;
            let header = dbase_header_for(&survey.columns, encoding)?;
            let mut writer = DbfWriter::create(stage(path)?, header).in_file(path)?;
            let mut scan = TableScan::new(&mut *source);
            while let Some(row) = scan.next()? {
                let values: Vec<Value> = attributes
                    .iter()
                    .map(|&i| row.values.get(i).cloned().unwrap_or(Value::Null))
                    .collect();
                writer.append_row(&values).in_file(path)?;
            }
            let count = writer.records_written();
            commit(writer.close().in_file(path)?, path)?;
            write_cpg(&cpg, encoding)?;
            info!("exported {count} rows to {}", path.display());
            Ok(targets.clone())
        })
    }
}

/// GeoJSON feature collections.
#[derive(Clone, Copy, Debug, Default)]
pub struct GeoJsonDriver;

impl DriverFunction for GeoJsonDriver {
    fn import_formats(&self) -> &'static [&'static str] {
        &["geojson", "json"]
    }
    fn export_formats(&self) -> &'static [&'static str] {
        &["geojson", "json"]
    }
    fn format_description(&self, extension: &str) -> &'static str {
        if self.import_formats().iter().any(|f| f.eq_ignore_ascii_case(extension)) {
            "GeoJSON 1.0"
        } else {
            ""
        }
    }
    fn is_spatial_format(&self, extension: &str) -> bool {
        self.import_formats().iter().any(|f| f.eq_ignore_ascii_case(extension))
    }
    fn open_table(&self, path: &Path, options: TableOptions) -> Result<Box<dyn TableSource>> {
        Ok(Box::new(GeoJsonTable::open(path, options)?))
    }

    fn export_table(
        &self,
        source: &mut dyn TableSource,
        path: &Path,
        options: &ExportOptions,
    ) -> Result<Vec<PathBuf>> {
        let targets = vec![path.to_path_buf()];
        prepare_targets(&targets, options.delete_existing)?;
        let encoding = options.encoding()?;
        let srid = options.srid.unwrap_or_else(|| source.srid());
        let name = path.file_stem().map(|s| s.to_string_lossy().into_owned());
        let writer_options = GeoJsonWriterOptions {
            max_decimal_digits: options.max_decimal_digits,
        };

        with_cleanup(&targets, || {
            let staged = stage(path)?;
            let (staged, count) = if encoding == encoding_rs::UTF_8 {
                write_table(source, name.as_deref(), srid, writer_options, staged)
                    .in_file(path)?
            } else {
                let (utf8, count) =
                    write_table(source, name.as_deref(), srid, writer_options, Vec::new())
                        .in_file(path)?;
                let text = String::from_utf8(utf8)
                    .map_err(|e| Error::Encoding(e.to_string()))
                    .in_file(path)?;
                let (bytes, _, unmappable) = encoding.encode(&text);
                if unmappable {
                    return Err(Error::Encoding(format!(
                        "text cannot be represented in {}",
                        encoding.name()
                    ))
                    .in_file(path));
                }
                let mut staged = staged;
                staged.write_all(&bytes).in_file(path)?;
                (staged, count)
            };
            commit(staged, path)?;
            info!("exported {count} features to {}", path.display());
            Ok(targets.clone())
        })
    }
}

/// Drivers selected by file extension.
pub struct DriverManager {
    drivers: Vec<Box<dyn DriverFunction>>,
}

impl Default for DriverManager {
    fn default() -> Self {
        DriverManager {
            drivers: vec![
                Box::new(ShpDriver::default()),
                Box::new(DbfDriver),
                Box::new(GeoJsonDriver),
            ],
        }
    }
}

impl DriverManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a driver, taking precedence over the ones already registered.
    pub fn register(&mut self, driver: Box<dyn DriverFunction>) {
        self.drivers.insert(0, driver);
    }

    pub fn import_formats(&self) -> Vec<&'static str> {
        self.drivers.iter().flat_map(|d| d.import_formats().iter().copied()).collect()
    }

    pub fn export_formats(&self) -> Vec<&'static str> {
        self.drivers.iter().flat_map(|d| d.export_formats().iter().copied()).collect()
    }

    pub fn format_description(&self, extension: &str) -> &'static str {
        self.drivers
            .iter()
            .map(|d| d.format_description(extension))
            .find(|d| !d.is_empty())
            .unwrap_or("")
    }

    pub fn is_spatial_format(&self, extension: &str) -> bool {
        self.drivers.iter().any(|d| d.is_spatial_format(extension))
    }

    fn driver(&self, path: &Path, import: bool) -> Result<&dyn DriverFunction> {
        let ext = extension(path).unwrap_or_default();
        self.drivers
            .iter()
            .find(|d| {
                let formats = if import {
                    d.import_formats()
                } else {
                    d.export_formats()
                };
                formats.iter().any(|f| f.eq_ignore_ascii_case(&ext))
            })
            .map(|d| d.as_ref())
            .ok_or_else(|| {
                Error::InvalidArgument(format!("no driver is available for the `{ext}` file format"))
                    .in_file(path)
            })
    }

    pub fn open_table(&self, path: &Path, options: TableOptions) -> Result<Box<dyn TableSource>> {
        self.driver(path, true)?.open_table(path, options)
    }

    pub fn import_file(
        &self,
        catalog: &mut dyn Catalog,
        table: &str,
        path: &Path,
        options: &ImportOptions,
    ) -> Result<u64> {
        self.driver(path, true)?
            .import_file(catalog, table, path, options)
    }

    pub fn export_table(
        &self,
        source: &mut dyn TableSource,
        path: &Path,
        options: &ExportOptions,
    ) -> Result<Vec<PathBuf>> {
        self.driver(path, false)?.export_table(source, path, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Coord, Geometry, LineString};
    use crate::table::{MemoryCatalog, MemoryTable};

    fn roads() -> MemoryTable {
        let mut table = MemoryTable::new(
            vec![
                Column::new("NAME", ColumnType::Text { length: 16 }),
                Column::geometry("THE_GEOM"),
                Column::new("LANES", ColumnType::Int { length: 4 }),
            ],
            4326,
        );
        table
            .push(vec![Value::from("ring road"), Value::Null, Value::Int(2)])
            .unwrap();
        for i in 0..3 {
            let x = i as f64;
            table
                .push(vec![
                    Value::from(format!("road {i}")),
                    Value::Geometry(Geometry::LineString(LineString(vec![
                        Coord::xy(x, 0.0),
                        Coord::xy(x + 0.5, 1.0),
                    ]))),
                    Value::Int(i),
                ])
                .unwrap();
        }
        table
    }

    #[test]
    fn descriptions() {
        let manager = DriverManager::new();
        assert_eq!(manager.format_description("shp"), "ESRI shapefile");
        assert_eq!(manager.format_description("DBF"), "DBase 3 file");
        assert_eq!(manager.format_description("geojson"), "GeoJSON 1.0");
        assert_eq!(manager.format_description("gpx"), "");
        assert!(manager.is_spatial_format("shp"));
        assert!(manager.is_spatial_format("geojson"));
        assert!(!manager.is_spatial_format("dbf"));
        assert!(manager.import_formats().contains(&"dbf"));
    }

    #[test]
    fn shapefile_export_and_import() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("roads.shp");
        let manager = DriverManager::new();
        let written = manager.export_table(&mut roads(), &path, &ExportOptions::default())?;
        assert_eq!(written.len(), 5);
        assert!(sidecar(&path, "prj").exists());

        let mut catalog = MemoryCatalog::new();
        let rows = manager.import_file(&mut catalog, "roads", &path, &ImportOptions::default())?;
        assert_eq!(rows, 4);
        let table = catalog.table("ROADS").unwrap();
        assert_eq!(table.srid(), 4326);
        assert_eq!(table.columns()[0].column_type, ColumnType::Geometry);
        assert_eq!(table.rows()[0][0], Value::Null);
        assert_eq!(table.rows()[0][1], Value::from("ring road"));
        assert_eq!(table.rows()[3][2], Value::Int(2));
        assert!(table.rows()[2][0].as_geometry().is_some());
        Ok(())
    }

    #[test]
    fn existing_targets() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("roads.shp");
        let manager = DriverManager::new();
        manager.export_table(&mut roads(), &path, &ExportOptions::default())?;
        assert!(manager
            .export_table(&mut roads(), &path, &ExportOptions::default())
            .is_err());
        let replace = ExportOptions {
            delete_existing: true,
            srid: Some(0),
            ..Default::default()
        };
        manager.export_table(&mut roads(), &path, &replace)?;
        assert!(!sidecar(&path, "prj").exists());

        let mut catalog = MemoryCatalog::new();
        manager.import_file(&mut catalog, "roads", &path, &ImportOptions::default())?;
        assert!(manager
            .import_file(&mut catalog, "roads", &path, &ImportOptions::default())
            .is_err());
        let again = ImportOptions {
            delete_existing: true,
            ..Default::default()
        };
        assert_eq!(manager.import_file(&mut catalog, "roads", &path, &again)?, 4);
        Ok(())
    }

    #[test]
    fn failed_export_leaves_no_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("mixed.shp");
        let mut table = roads();
        table.push(vec![
            Value::from("junction"),
            Value::Geometry(Geometry::Point(Coord::xy(0.0, 0.0))),
            Value::Int(0),
        ])?;
        assert!(DriverManager::new()
            .export_table(&mut table, &path, &ExportOptions::default())
            .is_err());
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn null_geometries_only() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("empty.shp");
        let mut table = MemoryTable::new(vec![Column::geometry("THE_GEOM")], 0);
        table.push(vec![Value::Null])?;
        DriverManager::new().export_table(&mut table, &path, &ExportOptions::default())?;
        let reopened = ShapefileTable::open(&path, TableOptions::default())?;
        assert_eq!(reopened.shape_type(), ShapeType::Null);
        assert_eq!(reopened.row_count(), 1);
        Ok(())
    }

    #[test]
    fn dbf_and_geojson() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let manager = DriverManager::new();
        let dbf = dir.path().join("roads.dbf");
        manager.export_table(&mut roads(), &dbf, &ExportOptions::default())?;
        let mut table = manager.open_table(&dbf, TableOptions::default())?;
        assert_eq!(table.columns().len(), 2);
        assert_eq!(table.get_row(4)?.values, vec![Value::from("road 2"), Value::Int(2)]);

        let json = dir.path().join("roads.geojson");
        manager.export_table(&mut roads(), &json, &ExportOptions::default())?;
        let mut catalog = MemoryCatalog::new();
        assert_eq!(
            manager.import_file(&mut catalog, "roads", &json, &ImportOptions::default())?,
            4
        );
        let imported = catalog.table("roads").unwrap();
        assert_eq!(imported.srid(), 4326);
        assert_eq!(imported.rows()[1][1], Value::from("road 0"));
        Ok(())
    }

    #[test]
    fn text_fields_fit_encoded_values() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let manager = DriverManager::new();
        let json = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [4.5, 45.2]},
             "properties": {"NAME": "Écluse"}}]}"#;
        let mut locks = GeoJsonTable::parse(json, TableOptions::default())?;
        let path = dir.path().join("locks.shp");
        manager.export_table(&mut locks, &path, &ExportOptions::default())?;
        let mut table = ShapefileTable::open(&path, TableOptions::default())?;
        assert_eq!(table.dbase_header().fields()[0].length(), 7);
        assert_eq!(table.get_row(1)?.values[1], Value::from("Écluse"));

        // declared width counts characters
        let mut names = MemoryTable::new(
            vec![
                Column::geometry("THE_GEOM"),
                Column::new("NAME", ColumnType::Text { length: 6 }),
            ],
            0,
        );
        names.push(vec![Value::Null, Value::from("Écluse")])?;
        names.push(vec![Value::Null, Value::from("Île")])?;
        let path = dir.path().join("names.shp");
        manager.export_table(&mut names, &path, &ExportOptions::default())?;
        let mut table = ShapefileTable::open(&path, TableOptions::default())?;
        assert_eq!(table.dbase_header().fields()[0].length(), 7);
        assert_eq!(table.get_row(2)?.values[1], Value::from("Île"));
        Ok(())
    }

    #[test]
    fn leading_null_geometries() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("wells.shp");
        let mut wells = MemoryTable::new(
            vec![Column::geometry("THE_GEOM"), Column::new("ID", ColumnType::Int { length: 4 })],
            0,
        );
        for id in 0..50 {
            wells.push(vec![Value::Null, Value::Int(id)])?;
        }
        wells.push(vec![Value::Geometry(Geometry::Point(Coord::xy(1.0, 2.0))), Value::Int(50)])?;
        DriverManager::new().export_table(&mut wells, &path, &ExportOptions::default())?;
        let mut table = ShapefileTable::open(&path, TableOptions::default())?;
        assert_eq!(table.shape_type(), ShapeType::Point);
        assert_eq!(table.row_count(), 51);
        assert_eq!(table.get_row(1)?.values, vec![Value::Null, Value::Int(0)]);
        assert_eq!(
            table.get_row(51)?.values[0],
            Value::Geometry(Geometry::Point(Coord::xy(1.0, 2.0)))
        );
        Ok(())
    }

    struct Failing;

    impl TableSource for Failing {
        fn columns(&self) -> &[Column] {
            &[]
        }
        fn row_count(&self) -> u64 {
            2
        }
        fn get_row(&mut self, key: u64) -> Result<TableRow> {
            match key {
                1 => Ok(TableRow { key, values: vec![] }),
                _ => Err(Error::CorruptRecord {
                    record: key,
                    reason: "broken".to_string(),
                }),
            }
        }
    }

    #[test]
    fn failed_import_drops_table() {
        let mut catalog = MemoryCatalog::new();
        assert!(import_rows(&mut catalog, "broken", &mut Failing).is_err());
        assert!(!catalog.contains("broken"));
    }

    #[test]
    fn unknown_extension() {
        let err = DriverManager::new()
            .open_table(Path::new("data.gpx"), TableOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err.root(), Error::InvalidArgument(_)));
    }
}
