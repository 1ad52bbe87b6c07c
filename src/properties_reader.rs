use crate::cursor::TableScan;
use crate::table::{Column, TableRow, TableSource};
use crate::value::Value;
use fallible_streaming_iterator::FallibleStreamingIterator;
use geozero::error::Result;
use geozero::{
    ColumnValue, FeatureAccess, FeatureProcessor, FeatureProperties, GeomProcessor,
    GeozeroGeometry, PropertyProcessor,
};

/// Table row seen as a geozero feature.
pub struct RowFeature<'a> {
    columns: &'a [Column],
    row: &'a TableRow,
    geometry_column: Option<usize>,
}

impl<'a> RowFeature<'a> {
    pub fn new(columns: &'a [Column], row: &'a TableRow, geometry_column: Option<usize>) -> Self {
        RowFeature {
            columns,
            row,
            geometry_column,
        }
    }

    pub fn has_geometry(&self) -> bool {
        self.geometry_column
            .and_then(|i| self.row.geometry(i))
            .is_some()
    }
}

impl FeatureAccess for RowFeature<'_> {}

impl GeozeroGeometry for RowFeature<'_> {
    fn process_geom<P: GeomProcessor>(&self, processor: &mut P) -> Result<()> {
        match self.geometry_column.and_then(|i| self.row.geometry(i)) {
            Some(geometry) => geometry.process_geom(processor),
            None => Ok(()),
        }
    }
}

impl FeatureProperties for RowFeature<'_> {
    /// Null cells and geometry columns are skipped.
    fn process_properties<P: PropertyProcessor>(&self, reader: &mut P) -> Result<bool> {
        let mut idx = 0;
        for (i, (column, value)) in self.columns.iter().zip(&self.row.values).enumerate() {
            if Some(i) == self.geometry_column {
                continue;
            }
            let date;
            let column_value = match value {
                Value::Null | Value::Geometry(_) => continue,
                Value::Bool(v) => ColumnValue::Bool(*v),
                Value::Int(v) => ColumnValue::Long(*v),
                Value::Double(v) => ColumnValue::Double(*v),
                Value::Text(v) => ColumnValue::String(v),
                Value::Date(v) => {
                    date = v.format("%Y-%m-%d").to_string();
                    ColumnValue::DateTime(&date)
                }
            };
            if reader.property(idx, &column.name, &column_value)? {
                return Ok(true);
            }
            idx += 1;
        }
        Ok(false)
    }
}

/// Feed every row of `source` to a geozero feature processor.
///
/// Rows without geometry produce features without a geometry member.
pub fn process_table<P: FeatureProcessor>(
    source: &mut dyn TableSource,
    name: Option<&str>,
    processor: &mut P,
) -> Result<()> {
    let columns = source.columns().to_vec();
    let geometry_column = source.geometry_column();
    processor.dataset_begin(name)?;
    let mut scan = TableScan::new(source);
    let mut idx = 0;
    while let Some(row) = scan.next()? {
        let feature = RowFeature::new(&columns, row, geometry_column);
        processor.feature_begin(idx)?;
        processor.properties_begin()?;
        feature.process_properties(processor)?;
        processor.properties_end()?;
        if feature.has_geometry() {
            processor.geometry_begin()?;
            feature.process_geom(processor)?;
            processor.geometry_end()?;
        }
        processor.feature_end(idx)?;
        idx += 1;
    }
    processor.dataset_end()
}
