use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::shape::{encode_shape, Shape};
use crate::shp_header::{BoundingBox, ShapeType, ShapefileHeader, HEADER_SIZE};
use byteorder::{BigEndian, WriteBytesExt};
use std::io::{Seek, SeekFrom, Write};

/// `.shp` + `.shx` writer.
///
/// Each shape appends one record and one index entry, so both files always
/// hold the same number of records. Headers are patched on [`close`](ShpWriter::close).
pub struct ShpWriter<W: Write + Seek> {
    shp: W,
    shx: W,
    header: ShapefileHeader,
    bbox: BoundingBox,
    /// Next record offset in words
    offset: u32,
    record_count: u32,
    content_buf: Vec<u8>,
}

impl<W: Write + Seek> ShpWriter<W> {
    pub fn create(mut shp: W, mut shx: W, shape_type: ShapeType) -> Result<Self> {
        let header = ShapefileHeader::new(shape_type);
        header.write(&mut shp)?;
        header.write(&mut shx)?;
        Ok(ShpWriter {
            shp,
            shx,
            header,
            bbox: BoundingBox::default(),
            offset: (HEADER_SIZE / 2) as u32,
            record_count: 0,
            content_buf: Vec::new(),
        })
    }

    pub fn shape_type(&self) -> ShapeType {
        self.header.shape_type
    }

    pub fn record_count(&self) -> u32 {
        self.record_count
    }

    /// Append a shape, returning its 1-based record number.
    pub fn write_shape(&mut self, shape: &Shape) -> Result<u32> {
        encode_shape(shape, self.header.shape_type, &mut self.content_buf)?;
        let content_words = (self.content_buf.len() / 2) as u32;
        let next = self.offset as u64 + 4 + content_words as u64;
        if next > i32::MAX as u64 {
            return Err(Error::InvalidArgument(
                "shapefile would exceed the format's size limit".to_string(),
            ));
        }
        let number = self.record_count + 1;
        self.shp.write_i32::<BigEndian>(number as i32)?;
        self.shp.write_i32::<BigEndian>(content_words as i32)?;
        self.shp.write_all(&self.content_buf)?;
        self.shx.write_i32::<BigEndian>(self.offset as i32)?;
        self.shx.write_i32::<BigEndian>(content_words as i32)?;
        self.bbox.merge(&shape.bbox());
        self.offset = next as u32;
        self.record_count = number;
        Ok(number)
    }

    /// Append a geometry, `None` being stored as a null shape.
    pub fn write_geometry(&mut self, geometry: Option<&Geometry>) -> Result<u32> {
        let shape = Shape::from_geometry(geometry, self.header.shape_type)?;
        self.write_shape(&shape)
    }

    /// Patch both headers and hand back the writers.
    pub fn close(mut self) -> Result<(W, W)> {
        self.header.bbox = self.bbox;
        self.header.file_length = self.offset;
        self.shp.seek(SeekFrom::Start(0))?;
        self.header.write(&mut self.shp)?;
        self.shp.seek(SeekFrom::End(0))?;
        self.shp.flush()?;

        self.header.file_length = (HEADER_SIZE / 2) as u32 + 4 * self.record_count;
        self.shx.seek(SeekFrom::Start(0))?;
        self.header.write(&mut self.shx)?;
        self.shx.seek(SeekFrom::End(0))?;
        self.shx.flush()?;
        Ok((self.shp, self.shx))
    }
}
