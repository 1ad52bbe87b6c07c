//! Regular grid over an envelope.

use crate::cursor::TableScan;
use crate::error::{Error, Result};
use crate::geometry::{Coord, Envelope, Geometry, LinearRing, Polygon};
use crate::table::{row_index, Column, ColumnType, TableRow, TableSource, GEOMETRY_COLUMN};
use crate::value::Value;
use fallible_streaming_iterator::FallibleStreamingIterator;
use log::debug;

/// One grid cell. `col` and `row` are zero-based, `row` grows northwards.
#[derive(Clone, Debug, PartialEq)]
pub struct GridCell {
    pub id: u64,
    pub col: u64,
    pub row: u64,
    pub geometry: Geometry,
}

/// `ceil(width / dx)` by `ceil(height / dy)` cells anchored at the lower left
/// corner of an envelope, numbered row by row from 0.
#[derive(Clone, Debug)]
pub struct Grid {
    envelope: Envelope,
    dx: f64,
    dy: f64,
    cols: u64,
    rows: u64,
    center_cell: bool,
    srid: i32,
    columns: Vec<Column>,
}

impl Grid {
    pub fn new(envelope: Envelope, dx: f64, dy: f64) -> Result<Self> {
        if dx.is_nan() || dy.is_nan() || dx <= 0.0 || dy <= 0.0 {
            return Err(Error::InvalidArgument(format!(
                "grid cell size must be positive, got {dx} x {dy}"
            )));
        }
        if envelope.is_empty() {
            return Err(Error::InvalidArgument(
                "cannot build a grid over an empty envelope".to_string(),
            ));
        }
        let cols = (envelope.width() / dx).ceil() as u64;
        let rows = (envelope.height() / dy).ceil() as u64;
        Ok(Grid {
            envelope,
            dx,
            dy,
            cols,
            rows,
            center_cell: false,
            srid: 0,
            columns: vec![
                Column::geometry(GEOMETRY_COLUMN),
                Column::new("ID", ColumnType::Int { length: 10 }),
                Column::new("ID_COL", ColumnType::Int { length: 10 }),
                Column::new("ID_ROW", ColumnType::Int { length: 10 }),
            ],
        })
    }

    pub fn from_geometry(geometry: &Geometry, dx: f64, dy: f64) -> Result<Self> {
        let envelope = geometry.envelope().unwrap_or(Envelope::EMPTY);
        Self::new(envelope, dx, dy)
    }

    /// Grid over the aggregate extent of the geometry column of `source`.
    pub fn from_table(source: &mut dyn TableSource, dx: f64, dy: f64) -> Result<Self> {
        let column = source.geometry_column().ok_or_else(|| {
            Error::InvalidArgument("table has no geometry column".to_string())
        })?;
        let srid = source.srid();
        let mut envelope = Envelope::EMPTY;
        let mut scan = TableScan::new(source);
        while let Some(row) = scan.next()? {
            if let Some(extent) = row.geometry(column).and_then(Geometry::envelope) {
                envelope.expand(&extent);
            }
        }
        debug!("grid extent {envelope:?} with srid {srid}");
        Ok(Self::new(envelope, dx, dy)?.with_srid(srid))
    }

    /// Produce cell centroids instead of cell polygons.
    pub fn with_center_cell(mut self, center_cell: bool) -> Self {
        self.center_cell = center_cell;
        self
    }

    pub fn with_srid(mut self, srid: i32) -> Self {
        self.srid = srid;
        self
    }

    pub fn cols(&self) -> u64 {
        self.cols
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn cell_count(&self) -> u64 {
        self.cols * self.rows
    }

    /// Cell with the given id.
    pub fn cell(&self, id: u64) -> Result<GridCell> {
        if id >= self.cell_count() {
            return Err(Error::OutOfRange {
                index: id,
                count: self.cell_count(),
            });
        }
        let (col, row) = (id % self.cols, id / self.cols);
        let x1 = self.envelope.min_x + col as f64 * self.dx;
        let y1 = self.envelope.min_y + row as f64 * self.dy;
        let geometry = if self.center_cell {
            Geometry::Point(Coord::xy(x1 + self.dx / 2.0, y1 + self.dy / 2.0))
        } else {
            let x2 = self.envelope.min_x + (col + 1) as f64 * self.dx;
            let y2 = self.envelope.min_y + (row + 1) as f64 * self.dy;
            let ring = LinearRing::new(vec![
                Coord::xy(x1, y1),
                Coord::xy(x2, y1),
                Coord::xy(x2, y2),
                Coord::xy(x1, y2),
                Coord::xy(x1, y1),
            ])?;
            Geometry::Polygon(Polygon::new(ring, vec![]))
        };
        Ok(GridCell {
            id,
            col,
            row,
            geometry,
        })
    }

    /// Iterator over all cells; each call starts from the first cell.
    pub fn cells(&self) -> GridCells<'_> {
        GridCells { grid: self, next: 0 }
    }
}

pub struct GridCells<'a> {
    grid: &'a Grid,
    next: u64,
}

impl Iterator for GridCells<'_> {
    type Item = GridCell;

    fn next(&mut self) -> Option<GridCell> {
        let cell = self.grid.cell(self.next).ok()?;
        self.next += 1;
        Some(cell)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.grid.cell_count().saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl TableSource for Grid {
    fn columns(&self) -> &[Column] {
        &self.columns
    }
    fn row_count(&self) -> u64 {
        self.cell_count()
    }
    fn get_row(&mut self, key: u64) -> Result<TableRow> {
        let index = row_index(key, self.key_origin(), self.cell_count())?;
        let cell = self.cell(index)?;
        Ok(TableRow {
            key,
            values: vec![
                Value::Geometry(cell.geometry),
                Value::Int(cell.id as i64),
                Value::Int(cell.col as i64),
                Value::Int(cell.row as i64),
            ],
        })
    }
    fn srid(&self) -> i32 {
        self.srid
    }
}
