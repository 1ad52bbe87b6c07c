use crate::error::{Error, Result};
use crate::table::{TableRow, TableSource};
use fallible_streaming_iterator::FallibleStreamingIterator;

/// Bidirectional cursor over a table.
///
/// Starts before the first row. Moves that would leave the table return
/// `false` and keep the current position.
pub struct TableCursor<'a> {
    source: &'a mut dyn TableSource,
    /// Zero-based position, `None` before the first move
    position: Option<u64>,
}

impl<'a> TableCursor<'a> {
    pub fn new(source: &'a mut dyn TableSource) -> Self {
        TableCursor {
            source,
            position: None,
        }
    }

    fn count(&self) -> u64 {
        self.source.row_count()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        let target = self.position.map_or(0, |p| p + 1);
        if target < self.count() {
            self.position = Some(target);
            true
        } else {
            false
        }
    }

    pub fn previous(&mut self) -> bool {
        match self.position {
            Some(p) if p > 0 => {
                self.position = Some(p - 1);
                true
            }
            _ => false,
        }
    }

    pub fn first(&mut self) -> bool {
        if self.count() == 0 {
            return false;
        }
        self.position = Some(0);
        true
    }

    pub fn last(&mut self) -> bool {
        match self.count() {
            0 => false,
            n => {
                self.position = Some(n - 1);
                true
            }
        }
    }

    /// Move to the row with `key`.
    pub fn seek(&mut self, key: u64) -> bool {
        match key.checked_sub(self.source.key_origin()) {
            Some(index) if index < self.count() => {
                self.position = Some(index);
                true
            }
            _ => false,
        }
    }

    /// Key of the current row.
    pub fn key(&self) -> Option<u64> {
        self.position.map(|p| p + self.source.key_origin())
    }

    /// Decode the current row.
    pub fn get(&mut self) -> Result<TableRow> {
        match self.key() {
            Some(key) => self.source.get_row(key),
            None => Err(Error::OutOfRange {
                index: 0,
                count: self.count(),
            }),
        }
    }
}

/// Forward scan over all rows of a table.
pub struct TableScan<'a> {
    source: &'a mut dyn TableSource,
    next_index: u64,
    count: u64,
    current: Option<TableRow>,
}

impl<'a> TableScan<'a> {
    pub fn new(source: &'a mut dyn TableSource) -> Self {
        let count = source.row_count();
        TableScan {
            source,
            next_index: 0,
            count,
            current: None,
        }
    }
}

impl FallibleStreamingIterator for TableScan<'_> {
    type Item = TableRow;
    type Error = Error;

    fn advance(&mut self) -> Result<()> {
        if self.next_index < self.count {
            let key = self.source.key_origin() + self.next_index;
            self.current = Some(self.source.get_row(key)?);
            self.next_index += 1;
        } else {
            self.current = None;
        }
        Ok(())
    }

    fn get(&self) -> Option<&TableRow> {
        self.current.as_ref()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.count - self.next_index) as usize;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, ColumnType, MemoryTable};
    use crate::value::Value;

    fn table(rows: i64) -> MemoryTable {
        let mut t = MemoryTable::new(vec![Column::new("ID", ColumnType::Int { length: 9 })], 0);
        for i in 0..rows {
            t.push(vec![Value::Int(i * 10)]).unwrap();
        }
        t
    }

    #[test]
    fn saturating_moves() -> Result<()> {
        let mut t = table(3);
        let mut cursor = TableCursor::new(&mut t);
        assert!(!cursor.previous());
        assert_eq!(cursor.key(), None);
        assert!(cursor.next());
        assert_eq!(cursor.key(), Some(1));
        assert!(!cursor.previous());
        assert_eq!(cursor.key(), Some(1));
        assert!(cursor.next() && cursor.next());
        assert!(!cursor.next());
        assert_eq!(cursor.key(), Some(3));
        assert_eq!(cursor.get()?.values, vec![Value::Int(20)]);
        assert!(cursor.previous());
        assert_eq!(cursor.get()?.key, 2);
        Ok(())
    }

    #[test]
    fn first_last_seek() -> Result<()> {
        let mut t = table(5).with_key_origin(0);
        let mut cursor = TableCursor::new(&mut t);
        assert!(cursor.get().is_err());
        assert!(cursor.last());
        assert_eq!(cursor.key(), Some(4));
        assert!(cursor.first());
        assert_eq!(cursor.key(), Some(0));
        assert!(cursor.seek(3));
        assert_eq!(cursor.get()?.values, vec![Value::Int(30)]);
        assert!(!cursor.seek(5));
        assert_eq!(cursor.key(), Some(3));
        Ok(())
    }

    #[test]
    fn empty_table() {
        let mut t = table(0);
        let mut cursor = TableCursor::new(&mut t);
        assert!(!cursor.next());
        assert!(!cursor.first());
        assert!(!cursor.last());
    }

    #[test]
    fn scan_all_rows() -> Result<()> {
        let mut t = table(4);
        let mut scan = TableScan::new(&mut t);
        assert_eq!(scan.size_hint(), (4, Some(4)));
        let mut keys = Vec::new();
        while let Some(row) = scan.next()? {
            keys.push(row.key);
        }
        assert_eq!(keys, vec![1, 2, 3, 4]);
        Ok(())
    }
}
