use crate::error::{Error, Result, ResultExt};
use crate::files::sidecar;
use crate::geometry::Geometry;
use crate::shape::{decode_shape, ShapeRecord};
use crate::shp_header::{ShapeType, ShapefileHeader, HEADER_SIZE};
use byteorder::{BigEndian, ReadBytesExt};
use log::debug;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// `.shx` entry, in 16-bit words.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub offset: u32,
    pub length: u32,
}

/// Random access `.shp` reader driven by its `.shx` index.
pub struct ShpReader<R: Read + Seek> {
    shp: R,
    shx: R,
    header: ShapefileHeader,
    shape_count: u32,
    /// Actual `.shp` size in bytes
    shp_len: u64,
    content_buf: Vec<u8>,
}

impl<R: Read + Seek> ShpReader<R> {
    pub fn open(mut shp: R, mut shx: R) -> Result<Self> {
        let header = ShapefileHeader::read(&mut shp)?;
        let index_header = ShapefileHeader::read(&mut shx)?;
        if index_header.shape_type != header.shape_type {
            return Err(Error::StructuralMismatch(format!(
                "index shape type {:?} differs from {:?}",
                index_header.shape_type, header.shape_type
            )));
        }
        let index_bytes = index_header.file_length as u64 * 2 - HEADER_SIZE as u64;
        if index_bytes % 8 != 0 {
            return Err(Error::CorruptHeader(format!(
                "index length of {index_bytes} bytes is not a multiple of 8"
            )));
        }
        let shape_count = u32::try_from(index_bytes / 8)
            .map_err(|_| Error::CorruptHeader("index declares too many records".to_string()))?;
        let shp_len = shp.seek(SeekFrom::End(0))?;
        Ok(ShpReader {
            shp,
            shx,
            header,
            shape_count,
            shp_len,
            content_buf: Vec::new(),
        })
    }

    pub fn header(&self) -> &ShapefileHeader {
        &self.header
    }

    pub fn shape_type(&self) -> ShapeType {
        self.header.shape_type
    }

    /// Number of records listed in the index.
    pub fn shape_count(&self) -> u32 {
        self.shape_count
    }

    fn check_index(&self, index: u32) -> Result<()> {
        if index >= self.shape_count {
            return Err(Error::OutOfRange {
                index: index as u64,
                count: self.shape_count as u64,
            });
        }
        Ok(())
    }

    /// Index entry of record `index` (0-based).
    pub fn index_entry(&mut self, index: u32) -> Result<IndexEntry> {
        self.check_index(index)?;
        self.shx
            .seek(SeekFrom::Start(HEADER_SIZE as u64 + index as u64 * 8))?;
        let offset = self.shx.read_i32::<BigEndian>()?;
        let length = self.shx.read_i32::<BigEndian>()?;
        if offset < (HEADER_SIZE / 2) as i32 || length < 2 {
            return Err(Error::CorruptRecord {
                record: index as u64,
                reason: format!("index entry ({offset}, {length}) is invalid"),
            });
        }
        Ok(IndexEntry {
            offset: offset as u32,
            length: length as u32,
        })
    }

    /// Read and decode record `index` (0-based).
    pub fn read_record(&mut self, index: u32) -> Result<ShapeRecord> {
        let entry = self.index_entry(index)?;
        let corrupt = |reason: String| Error::CorruptRecord {
            record: index as u64,
            reason,
        };
        let end = entry.offset as u64 + 4 + entry.length as u64;
        if end > self.header.file_length as u64 || end * 2 > self.shp_len {
            return Err(corrupt(format!(
                "record at word {} of {} words runs past the end of the file",
                entry.offset, entry.length
            )));
        }
        self.shp.seek(SeekFrom::Start(entry.offset as u64 * 2))?;
        let number = self.shp.read_i32::<BigEndian>()?;
        let content_length = self.shp.read_i32::<BigEndian>()?;
        if number as i64 != index as i64 + 1 {
            return Err(corrupt(format!(
                "record number {number} where {} was expected",
                index + 1
            )));
        }
        if content_length as i64 != entry.length as i64 {
            return Err(corrupt(format!(
                "content length {content_length} disagrees with the index ({})",
                entry.length
            )));
        }
        self.content_buf.resize(entry.length as usize * 2, 0);
        self.shp.read_exact(&mut self.content_buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                corrupt("truncated record content".to_string())
            } else {
                Error::IO(e)
            }
        })?;
        let shape = decode_shape(&self.content_buf, self.header.shape_type, index as u64)?;
        Ok(ShapeRecord {
            number: number as u32,
            shape,
        })
    }

    /// Geometry of record `index`, `None` for null shapes.
    pub fn read_geometry(&mut self, index: u32) -> Result<Option<Geometry>> {
        let record = self.read_record(index)?;
        record.shape.to_geometry().map_err(|e| match e {
            Error::InvalidGeometry(reason) => Error::CorruptRecord {
                record: index as u64,
                reason,
            },
            other => other,
        })
    }

    pub fn into_inner(self) -> (R, R) {
        (self.shp, self.shx)
    }
}

impl ShpReader<BufReader<File>> {
    /// Open a `.shp` file and the `.shx` index next to it.
    pub fn from_path(path: &Path) -> Result<Self> {
        let shx_path = sidecar(path, "shx");
        let shp = File::open(path).in_file(path)?;
        let shx = File::open(&shx_path).in_file(&shx_path)?;
        let reader = ShpReader::open(BufReader::new(shp), BufReader::new(shx)).in_file(path)?;
        debug!(
            "opened {} ({:?}, {} shapes)",
            path.display(),
            reader.shape_type(),
            reader.shape_count()
        );
        Ok(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Coord, LineString};
    use crate::shp_writer::ShpWriter;
    use std::io::Cursor;

    fn lines() -> Vec<Option<Geometry>> {
        vec![
            Some(Geometry::LineString(LineString(vec![
                Coord::xy(183299.71875, 2425074.75),
                Coord::xy(183304.828125, 2425066.75),
            ]))),
            None,
            Some(Geometry::MultiLineString(vec![
                LineString(vec![Coord::xy(0.0, 0.0), Coord::xy(1.0, 0.0)]),
                LineString(vec![Coord::xy(2.0, 0.0), Coord::xy(3.0, 0.0)]),
            ])),
        ]
    }

    fn sample() -> Result<(Vec<u8>, Vec<u8>)> {
        let mut writer = ShpWriter::create(
            Cursor::new(Vec::new()),
            Cursor::new(Vec::new()),
            ShapeType::PolyLine,
        )?;
        for geom in lines() {
            writer.write_geometry(geom.as_ref())?;
        }
        let (shp, shx) = writer.close()?;
        Ok((shp.into_inner(), shx.into_inner()))
    }

    #[test]
    fn random_access() -> Result<()> {
        let (shp, shx) = sample()?;
        let mut reader = ShpReader::open(Cursor::new(shp), Cursor::new(shx))?;
        assert_eq!(reader.shape_count(), 3);
        assert_eq!(reader.shape_type(), ShapeType::PolyLine);
        assert_eq!(reader.read_record(2)?.number, 3);
        assert_eq!(reader.read_geometry(1)?, None);
        match reader.read_geometry(0)? {
            Some(Geometry::MultiLineString(parts)) => {
                assert_eq!(parts.len(), 1);
                assert_eq!(parts[0].0[0], Coord::xy(183299.71875, 2425074.75));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(reader.read_geometry(2)?.map(|g| g.length()), Some(2.0));
        assert!(matches!(
            reader.read_record(3),
            Err(Error::OutOfRange { index: 3, count: 3 })
        ));
        Ok(())
    }

    #[test]
    fn header_bbox_covers_records() -> Result<()> {
        let (shp, shx) = sample()?;
        let reader = ShpReader::open(Cursor::new(shp.clone()), Cursor::new(shx))?;
        let bbox = reader.header().bbox.xy;
        assert_eq!((bbox.min_x, bbox.min_y), (0.0, 0.0));
        assert_eq!((bbox.max_x, bbox.max_y), (183304.828125, 2425074.75));
        assert_eq!(reader.header().file_length as usize * 2, shp.len());
        Ok(())
    }

    #[test]
    fn record_number_mismatch() -> Result<()> {
        let (mut shp, shx) = sample()?;
        shp[100..104].copy_from_slice(&7i32.to_be_bytes());
        let mut reader = ShpReader::open(Cursor::new(shp), Cursor::new(shx))?;
        assert!(matches!(
            reader.read_record(0),
            Err(Error::CorruptRecord { record: 0, .. })
        ));
        Ok(())
    }

    #[test]
    fn record_longer_than_file() -> Result<()> {
        let (mut shp, mut shx) = sample()?;
        let words = 0x3fff_ffffi32.to_be_bytes();
        // header, record and index all agree on a length the file does not have
        shp[24..28].copy_from_slice(&i32::MAX.to_be_bytes());
        shp[104..108].copy_from_slice(&words);
        shx[104..108].copy_from_slice(&words);
        let mut reader = ShpReader::open(Cursor::new(shp), Cursor::new(shx))?;
        assert!(matches!(
            reader.read_record(0),
            Err(Error::CorruptRecord { record: 0, .. })
        ));
        assert_eq!(reader.read_geometry(1)?, None);
        Ok(())
    }

    #[test]
    fn index_shape_type_mismatch() -> Result<()> {
        let (shp, mut shx) = sample()?;
        shx[32..36].copy_from_slice(&5i32.to_le_bytes());
        assert!(matches!(
            ShpReader::open(Cursor::new(shp), Cursor::new(shx)),
            Err(Error::StructuralMismatch(_))
        ));
        Ok(())
    }
}
