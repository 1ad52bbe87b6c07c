use crate::cursor::TableCursor;
use crate::dbf_header::DbaseHeader;
use crate::dbf_reader::reader_state::Ready;
use crate::dbf_reader::DbfReader;
use crate::dbf_writer::DbfWriter;
use crate::error::{Error, Result, ResultExt};
use crate::shp_table::{dbf_columns, open_dbf};
use crate::table::{row_index, Column, TableOptions, TableRow, TableSource};
use crate::value::Value;
use log::{debug, warn};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Lone `.dbf` file exposed as a table without geometry.
pub struct DbfTable {
    path: PathBuf,
    dbf: DbfReader<BufReader<File>, Ready>,
    columns: Vec<Column>,
    options: TableOptions,
}

impl DbfTable {
    pub fn open(path: &Path, options: TableOptions) -> Result<Self> {
        let dbf = open_dbf(path, &options)?;
        let columns = dbf_columns(dbf.header());
        Ok(DbfTable {
            path: path.to_path_buf(),
            dbf,
            columns,
            options,
        })
    }

    pub fn header(&self) -> &DbaseHeader {
        self.dbf.header()
    }

    pub fn cursor(&mut self) -> TableCursor<'_> {
        TableCursor::new(self)
    }

    pub fn insert_row(&mut self, _values: Vec<Value>) -> Result<()> {
        Err(Error::UnsupportedOperation("insert into a dBase table"))
    }

    pub fn remove_row(&mut self, _key: u64) -> Result<()> {
        Err(Error::UnsupportedOperation("row removal from a dBase table"))
    }

    /// Replace the file by an empty one with the same fields.
    pub fn truncate(&mut self) -> Result<()> {
        let header = self.dbf.header().emptied();
        let file = BufWriter::new(File::create(&self.path).in_file(&self.path)?);
        DbfWriter::create(file, header)?.close().in_file(&self.path)?;
        self.dbf = open_dbf(&self.path, &self.options)?;
        debug!("truncated {}", self.path.display());
        Ok(())
    }
}

impl TableSource for DbfTable {
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
        if self.dbf.is_deleted(index)? {
            warn!("{}: record {index} is flagged as deleted", self.path.display());
        }
        let values = self.dbf.read_row(index).in_file(&self.path)?;
        Ok(TableRow { key, values })
    }
    fn geometry_column(&self) -> Option<usize> {
        None
    }
}
