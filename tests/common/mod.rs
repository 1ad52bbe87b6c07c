use geoflat::*;

pub const NETWORK_ROWS: usize = 382;

const AXES: [&str; 3] = ["branche", "principal", "feeder"];

/// Pipe network with the row count of `tests/data/network.shp`, three
/// segments of length 3-4-5 plus 2 per row.
pub fn network(rows: usize) -> MemoryTable {
    let mut table = MemoryTable::new(
        vec![
            Column::geometry(GEOMETRY_COLUMN),
            Column::new("GID", ColumnType::Int { length: 9 }),
            Column::new("TYPE_AXE", ColumnType::Text { length: 20 }),
            Column::new(
                "LENGTH",
                ColumnType::Double {
                    length: 14,
                    decimals: 3,
                },
            ),
        ],
        2154,
    );
    for i in 0..rows {
        let x = (i % 20) as f64 * 10.5 + 650000.0;
        let y = (i / 20) as f64 * 7.25 + 6860000.0;
        let pipe = Geometry::MultiLineString(vec![LineString(vec![
            Coord::xy(x, y),
            Coord::xy(x + 3.0, y + 4.0),
            Coord::xy(x + 3.0, y + 6.0),
        ])]);
        table
            .push(vec![
                Value::Geometry(pipe),
                Value::Int(i as i64 + 1),
                Value::from(AXES[i % AXES.len()]),
                Value::Double(7.0),
            ])
            .unwrap();
    }
    table
}
