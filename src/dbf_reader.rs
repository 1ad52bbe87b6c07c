use crate::dbf_header::{encoding_from_label, DbaseHeader};
use crate::dbf_reader::reader_state::*;
use crate::error::{Error, Result, ResultExt};
use crate::field_codec;
use crate::files::{read_cpg, sidecar};
use crate::value::Value;
use encoding_rs::Encoding;
use log::debug;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::marker::PhantomData;
use std::path::Path;

/// dBase table reader
pub struct DbfReader<R: Read + Seek, State = Closed> {
    reader: R,
    header: DbaseHeader,
    /// Current record, deletion flag included
    record_buf: Vec<u8>,
    /// Record held in `record_buf`
    loaded: Option<u32>,
    /// Stream position, to avoid seeks when reading sequentially
    pos: u64,
    state: PhantomData<State>,
}

// Reader states for ensuring correct read API usage at compile-time
pub(crate) mod reader_state {
    pub struct Closed;
    pub struct HeaderParsed;
    pub struct Ready;
}

impl<R: Read + Seek> DbfReader<R, Closed> {
    /// Open table by reading the header and field descriptors.
    pub fn open(mut reader: R) -> Result<DbfReader<R, HeaderParsed>> {
        reader.seek(SeekFrom::Start(0))?;
        let header = DbaseHeader::read(&mut reader)?;
        let pos = reader.stream_position()?;
        Ok(DbfReader {
            reader,
            header,
            record_buf: Vec::new(),
            loaded: None,
            pos,
            state: PhantomData::<HeaderParsed>,
        })
    }
}

impl DbfReader<BufReader<File>, Closed> {
    /// Open a `.dbf` file, taking its `.cpg` sidecar into account.
    pub fn from_path(path: &Path) -> Result<DbfReader<BufReader<File>, HeaderParsed>> {
        let file = File::open(path).in_file(path)?;
        let mut reader = DbfReader::open(BufReader::new(file)).in_file(path)?;
        if let Some(encoding) = read_cpg(&sidecar(path, "cpg"))? {
            reader = reader.with_encoding(encoding);
        }
        debug!(
            "opened {} ({} records, {})",
            path.display(),
            reader.header.record_count(),
            reader.header.encoding().name()
        );
        Ok(reader)
    }
}

impl<R: Read + Seek> DbfReader<R, HeaderParsed> {
    pub fn header(&self) -> &DbaseHeader {
        &self.header
    }
    /// Decode character fields with `encoding` instead of the one found in the header.
    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.header.set_encoding(encoding);
        self
    }
    /// Like [`with_encoding`](Self::with_encoding), from an encoding label.
    pub fn with_encoding_label(self, label: &str) -> Result<Self> {
        Ok(self.with_encoding(encoding_from_label(label)?))
    }
    /// Select all records.
    pub fn select_all(self) -> DbfReader<R, Ready> {
        let record_buf = vec![0; self.header.record_length() as usize];
        DbfReader {
            reader: self.reader,
            header: self.header,
            record_buf,
            loaded: None,
            pos: self.pos,
            state: PhantomData::<Ready>,
        }
    }
}

impl<R: Read + Seek> DbfReader<R, Ready> {
    pub fn header(&self) -> &DbaseHeader {
        &self.header
    }
    /// Number of records declared by the header.
    pub fn row_count(&self) -> u32 {
        self.header.record_count()
    }

    fn load_record(&mut self, index: u32) -> Result<()> {
        if index >= self.header.record_count() {
            return Err(Error::OutOfRange {
                index: index as u64,
                count: self.header.record_count() as u64,
            });
        }
        if self.loaded == Some(index) {
            return Ok(());
        }
        let record_length = self.header.record_length() as u64;
        let offset = self.header.header_length() as u64 + index as u64 * record_length;
        self.loaded = None;
        if offset != self.pos {
            self.reader.seek(SeekFrom::Start(offset))?;
        }
        // unknown until the read succeeds
        self.pos = u64::MAX;
        self.reader.read_exact(&mut self.record_buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::CorruptRecord {
                    record: index as u64,
                    reason: "file ends before the declared record count".to_string(),
                }
            } else {
                Error::IO(e)
            }
        })?;
        self.pos = offset + record_length;
        self.loaded = Some(index);
        Ok(())
    }

    /// All field values of a record, deleted records included.
    pub fn read_row(&mut self, index: u32) -> Result<Vec<Value>> {
        self.load_record(index)?;
        (0..self.header.num_fields())
            .map(|i| self.decode_field(index, i))
            .collect()
    }

    /// One field value of a record.
    pub fn read_field(&mut self, index: u32, field: usize) -> Result<Value> {
        if field >= self.header.num_fields() {
            return Err(Error::InvalidArgument(format!(
                "field {field} out of range ({} fields)",
                self.header.num_fields()
            )));
        }
        self.load_record(index)?;
        self.decode_field(index, field)
    }

    fn decode_field(&self, index: u32, field: usize) -> Result<Value> {
        let range = self.header.field_range(field);
        field_codec::decode(
            &self.record_buf[range],
            &self.header.fields()[field],
            self.header.encoding(),
        )
        .map_err(|e| e.at_record(index as u64))
    }

    /// Whether the record carries the `*` deletion flag.
    pub fn is_deleted(&mut self, index: u32) -> Result<bool> {
        self.load_record(index)?;
        Ok(self.record_buf[0] == b'*')
    }

    /// Release the reader.
    pub fn close(self) -> R {
        self.reader
    }
}
