//! Shapefile, dBase and GeoJSON files as row-oriented tables.
//!
//! Files open as [`TableSource`]s whose rows hold attribute [`Value`]s and one
//! geometry column. The [`DriverManager`] imports files into a [`Catalog`] and
//! exports any table source back to a file. Rows can be fed to geozero
//! processors with [`process_table`].

mod cursor;
mod dbf_header;
mod dbf_reader;
mod dbf_table;
mod dbf_writer;
mod driver;
mod error;
mod field_codec;
mod files;
pub mod functions;
mod geojson_reader;
mod geojson_writer;
mod geometry;
mod geometry_reader;
pub mod ops;
mod prj;
mod properties_reader;
mod shape;
mod shapefile_writer;
mod shp_header;
mod shp_reader;
mod shp_table;
mod shp_writer;
mod table;
mod value;

pub use cursor::*;
pub use dbf_header::*;
pub use dbf_reader::*;
pub use dbf_table::*;
pub use dbf_writer::*;
pub use driver::*;
pub use error::*;
pub use field_codec::*;
pub use files::{extension, read_cpg, sidecar, write_cpg};
pub use geojson_reader::*;
pub use geojson_writer::*;
pub use geometry::*;
pub use geometry_reader::*;
pub use prj::*;
pub use properties_reader::*;
pub use shape::*;
pub use shapefile_writer::*;
pub use shp_header::*;
pub use shp_reader::*;
pub use shp_table::*;
pub use shp_writer::*;
pub use table::*;
pub use value::*;
