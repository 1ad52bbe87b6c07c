use crate::dbf_header::{DbaseHeader, END_OF_FILE};
use crate::error::{Error, Result, ResultExt};
use crate::field_codec;
use crate::files::{sidecar, write_cpg};
use crate::value::Value;
use byteorder::{LittleEndian, WriteBytesExt};
use log::debug;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

/// dBase table writer.
///
/// The header is written on creation with the declared record count and
/// patched by [`close`](DbfWriter::close).
pub struct DbfWriter<W: Write + Seek> {
    writer: W,
    header: DbaseHeader,
    record_buf: Vec<u8>,
    written: u32,
}

impl<W: Write + Seek> DbfWriter<W> {
    pub fn create(mut writer: W, header: DbaseHeader) -> Result<Self> {
        header.write(&mut writer)?;
        let record_buf = vec![b' '; header.record_length() as usize];
        Ok(DbfWriter {
            writer,
            header,
            record_buf,
            written: 0,
        })
    }

    pub fn header(&self) -> &DbaseHeader {
        &self.header
    }

    pub fn records_written(&self) -> u32 {
        self.written
    }

    /// Encode and append one record. `values` follow the field order.
    pub fn append_row(&mut self, values: &[Value]) -> Result<()> {
        self.encode_record(values)?;
        self.write_record()
    }

    /// Encode a record without writing it; nothing is written on failure.
    pub(crate) fn encode_record(&mut self, values: &[Value]) -> Result<()> {
        if values.len() != self.header.num_fields() {
            return Err(Error::StructuralMismatch(format!(
                "{} values for {} fields",
                values.len(),
                self.header.num_fields()
            )));
        }
        if self.written == u32::MAX {
            return Err(Error::InvalidArgument(
                "dBase record count limit reached".to_string(),
            ));
        }
        self.record_buf[0] = b' ';
        for (i, (value, field)) in values.iter().zip(self.header.fields()).enumerate() {
            let range = self.header.field_range(i);
            field_codec::encode(
                value,
                field,
                self.header.encoding(),
                &mut self.record_buf[range],
            )
            .map_err(|e| e.at_record(self.written as u64))?;
        }
        Ok(())
    }

    /// Append the record prepared by [`encode_record`](Self::encode_record).
    pub(crate) fn write_record(&mut self) -> Result<()> {
        self.writer.write_all(&self.record_buf)?;
        self.written += 1;
        Ok(())
    }

    /// Write the end of file marker, patch the header and hand back the writer.
    pub fn close(mut self) -> Result<W> {
        self.writer.write_u8(END_OF_FILE)?;
        let end = self.writer.stream_position()?;
        self.header.set_record_count(self.written);
        self.header.set_last_update(chrono::Local::now().date_naive());
        self.writer.seek(SeekFrom::Start(1))?;
        self.writer.write_all(&last_update_bytes(&self.header))?;
        self.writer.write_u32::<LittleEndian>(self.written)?;
        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

fn last_update_bytes(header: &DbaseHeader) -> [u8; 3] {
    use chrono::Datelike;
    let date = header.last_update();
    [
        (date.year() - 1900).clamp(0, 255) as u8,
        date.month() as u8,
        date.day() as u8,
    ]
}

impl DbfWriter<BufWriter<File>> {
    /// Create a `.dbf` file and its `.cpg` sidecar naming the encoding.
    pub fn create_path(path: &Path, header: DbaseHeader) -> Result<Self> {
        write_cpg(&sidecar(path, "cpg"), header.encoding())?;
        let file = File::create(path).in_file(path)?;
        debug!("creating {}", path.display());
        DbfWriter::create(BufWriter::new(file), header).in_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbf_reader::DbfReader;
    use crate::field_codec::FieldDescriptor;
    use std::io::Cursor;

    fn header() -> Result<DbaseHeader> {
        DbaseHeader::with_fields(
            vec![
                FieldDescriptor::character("NAME", 16)?,
                FieldDescriptor::numeric("LENGTH", 12, 4)?,
                FieldDescriptor::logical("NAVIGABLE")?,
            ],
            encoding_rs::UTF_8,
        )
    }

    #[test]
    fn record_count_is_patched() -> Result<()> {
        let mut writer = DbfWriter::create(Cursor::new(Vec::new()), header()?)?;
        for i in 0..5 {
            writer.append_row(&[
                Value::from(format!("reach {i}")),
                Value::Double(i as f64 * 1.5),
                Value::Bool(i % 2 == 0),
            ])?;
        }
        assert_eq!(writer.records_written(), 5);
        let bytes = writer.close()?.into_inner();
        let h = DbaseHeader::read(&mut Cursor::new(&bytes))?;
        assert_eq!(h.record_count(), 5);
        assert_eq!(
            bytes.len(),
            h.header_length() as usize + 5 * h.record_length() as usize + 1
        );
        assert_eq!(bytes.last(), Some(&END_OF_FILE));
        Ok(())
    }

    #[test]
    fn written_rows_read_back() -> Result<()> {
        let mut writer = DbfWriter::create(Cursor::new(Vec::new()), header()?)?;
        writer.append_row(&[Value::from("Écluse"), Value::Double(12.25), Value::Null])?;
        let bytes = writer.close()?.into_inner();
        let mut reader = DbfReader::open(Cursor::new(bytes))?
            .with_encoding(encoding_rs::UTF_8)
            .select_all();
        assert_eq!(
            reader.read_row(0)?,
            vec![Value::from("Écluse"), Value::Double(12.25), Value::Null]
        );
        Ok(())
    }

    #[test]
    fn wrong_arity() -> Result<()> {
        let mut writer = DbfWriter::create(Cursor::new(Vec::new()), header()?)?;
        assert!(matches!(
            writer.append_row(&[Value::Null]),
            Err(Error::StructuralMismatch(_))
        ));
        Ok(())
    }

    #[test]
    fn overflow_is_rejected() -> Result<()> {
        let mut writer = DbfWriter::create(Cursor::new(Vec::new()), header()?)?;
        let err = writer
            .append_row(&[
                Value::from("a name longer than sixteen bytes"),
                Value::Null,
                Value::Null,
            ])
            .unwrap_err();
        assert!(matches!(err, Error::MalformedField { record: Some(0), .. }));
        Ok(())
    }

    #[test]
    fn create_path_writes_cpg() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("names.dbf");
        let mut header = header()?;
        header.set_encoding(encoding_rs::BIG5);
        let mut writer = DbfWriter::create_path(&path, header)?;
        writer.append_row(&[Value::from("松柏坑溪"), Value::Null, Value::Null])?;
        writer.close()?;
        assert_eq!(std::fs::read_to_string(dir.path().join("names.cpg"))?, "Big5");
        let mut reader = DbfReader::from_path(&path)?.select_all();
        assert_eq!(reader.read_row(0)?[0], Value::from("松柏坑溪"));
        Ok(())
    }
}
