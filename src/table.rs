//! Table schema and the host facing table capabilities.

use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::value::Value;
use std::collections::HashMap;

/// Name of the geometry column of file backed tables.
pub const GEOMETRY_COLUMN: &str = "THE_GEOM";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Geometry,
    Text { length: u8 },
    Int { length: u8 },
    Double { length: u8, decimals: u8 },
    Bool,
    Date,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Column {
            name: name.to_string(),
            column_type,
        }
    }
    pub fn geometry(name: &str) -> Self {
        Column::new(name, ColumnType::Geometry)
    }
}

/// One row of a table, keyed from the table's key origin.
#[derive(Clone, Debug, PartialEq)]
pub struct TableRow {
    pub key: u64,
    pub values: Vec<Value>,
}

impl TableRow {
    pub fn geometry(&self, column: usize) -> Option<&Geometry> {
        self.values.get(column).and_then(Value::as_geometry)
    }
}

/// Options of file backed tables.
#[derive(Clone, Debug)]
pub struct TableOptions {
    /// Encoding label overriding `.cpg` and the dBase language driver
    pub encoding: Option<String>,
    /// Key of the first row, usually 0 or 1
    pub key_origin: u64,
    /// Position of the geometry among the columns
    pub geometry_column: usize,
}

impl Default for TableOptions {
    fn default() -> Self {
        TableOptions {
            encoding: None,
            key_origin: 1,
            geometry_column: 0,
        }
    }
}

/// Readable table.
pub trait TableSource {
    fn columns(&self) -> &[Column];
    fn row_count(&self) -> u64;
    fn key_origin(&self) -> u64 {
        1
    }
    fn get_row(&mut self, key: u64) -> Result<TableRow>;
    /// Spatial reference id, 0 when unknown.
    fn srid(&self) -> i32 {
        0
    }
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
    fn geometry_column(&self) -> Option<usize> {
        self.columns()
            .iter()
            .position(|c| c.column_type == ColumnType::Geometry)
    }
}

/// Zero-based row index of `key`, or [`Error::OutOfRange`].
pub(crate) fn row_index(key: u64, origin: u64, count: u64) -> Result<u64> {
    match key.checked_sub(origin) {
        Some(index) if index < count => Ok(index),
        _ => Err(Error::OutOfRange { index: key, count }),
    }
}

/// Destination of imports.
pub trait Catalog {
    fn contains(&self, table: &str) -> bool;
    fn create_table(&mut self, table: &str, columns: Vec<Column>, srid: i32) -> Result<()>;
    /// Returns whether the table existed.
    fn drop_table(&mut self, table: &str) -> Result<bool>;
    fn insert(&mut self, table: &str, values: Vec<Value>) -> Result<()>;
}

/// Rows held in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryTable {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
    srid: i32,
    key_origin: u64,
}

impl MemoryTable {
    pub fn new(columns: Vec<Column>, srid: i32) -> Self {
        MemoryTable {
            columns,
            rows: Vec::new(),
            srid,
            key_origin: 1,
        }
    }
    pub fn with_key_origin(mut self, key_origin: u64) -> Self {
        self.key_origin = key_origin;
        self
    }
    pub fn push(&mut self, values: Vec<Value>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(Error::StructuralMismatch(format!(
                "{} values for {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        self.rows.push(values);
        Ok(())
    }
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }
    pub fn set_srid(&mut self, srid: i32) {
        self.srid = srid;
    }
}

impl TableSource for MemoryTable {
    fn columns(&self) -> &[Column] {
        &self.columns
    }
    fn row_count(&self) -> u64 {
        self.rows.len() as u64
    }
    fn key_origin(&self) -> u64 {
        self.key_origin
    }
    fn get_row(&mut self, key: u64) -> Result<TableRow> {
        let index = row_index(key, self.key_origin, self.row_count())?;
        Ok(TableRow {
            key,
            values: self.rows[index as usize].clone(),
        })
    }
    fn srid(&self) -> i32 {
        self.srid
    }
}

/// Tables by case-insensitive name.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    tables: HashMap<String, MemoryTable>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn table(&self, name: &str) -> Option<&MemoryTable> {
        self.tables.get(&name.to_uppercase())
    }
    pub fn table_mut(&mut self, name: &str) -> Option<&mut MemoryTable> {
        self.tables.get_mut(&name.to_uppercase())
    }
}

impl Catalog for MemoryCatalog {
    fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(&table.to_uppercase())
    }
    fn create_table(&mut self, table: &str, columns: Vec<Column>, srid: i32) -> Result<()> {
        if self.contains(table) {
            return Err(Error::InvalidArgument(format!(
                "table `{table}` already exists"
            )));
        }
        self.tables
            .insert(table.to_uppercase(), MemoryTable::new(columns, srid));
        Ok(())
    }
    fn drop_table(&mut self, table: &str) -> Result<bool> {
        Ok(self.tables.remove(&table.to_uppercase()).is_some())
    }
    fn insert(&mut self, table: &str, values: Vec<Value>) -> Result<()> {
        self.table_mut(table)
            .ok_or_else(|| Error::InvalidArgument(format!("table `{table}` does not exist")))?
            .push(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_table_keys() -> Result<()> {
        let mut table = MemoryTable::new(vec![Column::new("ID", ColumnType::Int { length: 9 })], 0);
        table.push(vec![Value::Int(10)])?;
        table.push(vec![Value::Int(20)])?;
        assert_eq!(table.get_row(2)?.values, vec![Value::Int(20)]);
        assert!(matches!(
            table.get_row(0),
            Err(Error::OutOfRange { index: 0, count: 2 })
        ));
        let mut zero_based = table.with_key_origin(0);
        assert_eq!(zero_based.get_row(0)?.values, vec![Value::Int(10)]);
        assert!(zero_based.push(vec![]).is_err());
        Ok(())
    }

    #[test]
    fn catalog_names_ignore_case() -> Result<()> {
        let mut catalog = MemoryCatalog::new();
        catalog.create_table("rivers", vec![Column::geometry(GEOMETRY_COLUMN)], 4326)?;
        assert!(catalog.contains("RIVERS"));
        assert!(catalog.create_table("Rivers", vec![], 0).is_err());
        catalog.insert("rivers", vec![Value::Null])?;
        assert_eq!(catalog.table("rivers").map(|t| t.row_count()), Some(1));
        assert!(catalog.drop_table("RiVeRs")?);
        assert!(!catalog.drop_table("rivers")?);
        Ok(())
    }
}
