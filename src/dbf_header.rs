use crate::error::{Error, Result};
use crate::field_codec::{FieldDescriptor, FieldType};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{Datelike, NaiveDate};
use encoding_rs::Encoding;
use std::io::{Read, Write};
use std::ops::Range;

/// dBase III without memo
pub const DBF_VERSION: u8 = 0x03;
pub const HEADER_TERMINATOR: u8 = 0x0D;
pub const END_OF_FILE: u8 = 0x1A;
pub(crate) const HEADER_SIZE: usize = 32;
pub(crate) const DESCRIPTOR_SIZE: usize = 32;
const MAX_FIELDS: usize = (u16::MAX as usize - HEADER_SIZE - 1) / DESCRIPTOR_SIZE;

/// Encoding used when neither options, `.cpg` nor the language driver name one.
pub static DEFAULT_ENCODING: &Encoding = &encoding_rs::WINDOWS_1252_INIT;

#[derive(Clone, Debug)]
pub struct DbaseHeader {
    version: u8,
    last_update: NaiveDate,
    record_count: u32,
    header_length: u16,
    record_length: u16,
    fields: Vec<FieldDescriptor>,
    /// Start of each field in a record, after the deletion flag
    offsets: Vec<usize>,
    encoding: &'static Encoding,
    language_driver: u8,
}

impl DbaseHeader {
    /// Header for a new file without fields.
    pub fn new(encoding: &'static Encoding) -> Self {
        DbaseHeader {
            version: DBF_VERSION,
            last_update: chrono::Local::now().date_naive(),
            record_count: 0,
            header_length: (HEADER_SIZE + 1) as u16,
            record_length: 1,
            fields: Vec::new(),
            offsets: Vec::new(),
            encoding,
            language_driver: language_driver_for(encoding),
        }
    }

    pub fn with_fields(fields: Vec<FieldDescriptor>, encoding: &'static Encoding) -> Result<Self> {
        let mut header = DbaseHeader::new(encoding);
        for field in fields {
            header.add_field(field)?;
        }
        Ok(header)
    }

    pub fn add_field(&mut self, field: FieldDescriptor) -> Result<()> {
        if self.field_index(field.name()).is_some() {
            return Err(Error::InvalidArgument(format!(
                "duplicate field name `{}`",
                field.name()
            )));
        }
        if self.fields.len() >= MAX_FIELDS {
            return Err(Error::InvalidArgument(format!(
                "a dBase file holds at most {MAX_FIELDS} fields"
            )));
        }
        let record_length = self.record_length as usize + field.length() as usize;
        if record_length > u16::MAX as usize {
            return Err(Error::InvalidArgument(format!(
                "record length {record_length} exceeds the dBase limit"
            )));
        }
        self.offsets.push(self.record_length as usize);
        self.record_length = record_length as u16;
        self.header_length += DESCRIPTOR_SIZE as u16;
        self.fields.push(field);
        Ok(())
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        reader
            .read_exact(&mut buf)
            .map_err(|_| Error::CorruptHeader("file shorter than the dBase header".to_string()))?;
        let mut head = &buf[..];
        let version = head.read_u8()?;
        let (yy, mm, dd) = (head.read_u8()?, head.read_u8()?, head.read_u8()?);
        let last_update = NaiveDate::from_ymd_opt(1900 + yy as i32, mm as u32, dd as u32)
            .unwrap_or_default();
        let record_count = head.read_u32::<LittleEndian>()?;
        let header_length = head.read_u16::<LittleEndian>()?;
        let record_length = head.read_u16::<LittleEndian>()?;
        let language_driver = buf[29];

        let mut fields = Vec::new();
        let mut offsets = Vec::new();
        let mut offset = 1usize;
        loop {
            let mut first = [0u8; 1];
            reader.read_exact(&mut first).map_err(|_| {
                Error::CorruptHeader("missing field descriptor terminator".to_string())
            })?;
            if first[0] == HEADER_TERMINATOR {
                break;
            }
            if fields.len() >= MAX_FIELDS {
                return Err(Error::CorruptHeader("too many field descriptors".to_string()));
            }
            let mut desc = [0u8; DESCRIPTOR_SIZE];
            desc[0] = first[0];
            reader
                .read_exact(&mut desc[1..])
                .map_err(|_| Error::CorruptHeader("truncated field descriptor".to_string()))?;
            let field = read_descriptor(&desc)?;
            offsets.push(offset);
            offset += field.length() as usize;
            fields.push(field);
        }

        let expected_header = HEADER_SIZE + DESCRIPTOR_SIZE * fields.len() + 1;
        if header_length as usize != expected_header {
            return Err(Error::CorruptHeader(format!(
                "declared header length {header_length}, descriptors need {expected_header}"
            )));
        }
        if record_length as usize != offset {
            return Err(Error::CorruptHeader(format!(
                "declared record length {record_length}, fields need {offset}"
            )));
        }

        Ok(DbaseHeader {
            version,
            last_update,
            record_count,
            header_length,
            record_length,
            fields,
            offsets,
            encoding: encoding_for_language_driver(language_driver).unwrap_or(DEFAULT_ENCODING),
            language_driver,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.version)?;
        writer.write_u8((self.last_update.year() - 1900).clamp(0, 255) as u8)?;
        writer.write_u8(self.last_update.month() as u8)?;
        writer.write_u8(self.last_update.day() as u8)?;
        writer.write_u32::<LittleEndian>(self.record_count)?;
        writer.write_u16::<LittleEndian>(self.header_length)?;
        writer.write_u16::<LittleEndian>(self.record_length)?;
        let mut reserved = [0u8; 20];
        reserved[17] = self.language_driver;
        writer.write_all(&reserved)?;
        for field in &self.fields {
            let mut desc = [0u8; DESCRIPTOR_SIZE];
            desc[..field.name().len()].copy_from_slice(field.name().as_bytes());
            desc[11] = field.field_type().code();
            desc[16] = field.length();
            desc[17] = field.decimal_count();
            writer.write_all(&desc)?;
        }
        writer.write_u8(HEADER_TERMINATOR)?;
        Ok(())
    }

    pub fn version(&self) -> u8 {
        self.version
    }
    pub fn last_update(&self) -> NaiveDate {
        self.last_update
    }
    pub fn record_count(&self) -> u32 {
        self.record_count
    }
    pub(crate) fn set_record_count(&mut self, count: u32) {
        self.record_count = count;
    }
    pub(crate) fn set_last_update(&mut self, date: NaiveDate) {
        self.last_update = date;
    }
    pub fn header_length(&self) -> u16 {
        self.header_length
    }
    pub fn record_length(&self) -> u16 {
        self.record_length
    }
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
    pub fn field(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }
    /// Case-insensitive lookup by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name().eq_ignore_ascii_case(name))
    }
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }
    pub fn set_encoding(&mut self, encoding: &'static Encoding) {
        self.encoding = encoding;
        self.language_driver = language_driver_for(encoding);
    }
    pub fn language_driver(&self) -> u8 {
        self.language_driver
    }
    /// Byte range of a field within a record buffer.
    pub(crate) fn field_range(&self, index: usize) -> Range<usize> {
        let start = self.offsets[index];
        start..start + self.fields[index].length() as usize
    }
    /// Same schema and encoding, no records.
    pub fn emptied(&self) -> Self {
        DbaseHeader {
            record_count: 0,
            last_update: chrono::Local::now().date_naive(),
            ..self.clone()
        }
    }
}

fn read_descriptor(desc: &[u8; DESCRIPTOR_SIZE]) -> Result<FieldDescriptor> {
    let name_end = desc[..11].iter().position(|b| *b == 0).unwrap_or(11);
    let name = String::from_utf8_lossy(&desc[..name_end]).trim().to_string();
    let field_type = FieldType::from_code(desc[11]).ok_or_else(|| {
        Error::CorruptHeader(format!(
            "field `{name}` has unsupported type '{}'",
            desc[11].escape_ascii()
        ))
    })?;
    let length = desc[16];
    if length == 0 {
        return Err(Error::CorruptHeader(format!("field `{name}` has zero length")));
    }
    Ok(FieldDescriptor {
        name,
        field_type,
        length,
        decimal_count: desc[17],
    })
}

pub fn encoding_for_language_driver(id: u8) -> Option<&'static Encoding> {
    use encoding_rs::*;
    match id {
        0x01 | 0x64 | 0x65 => Some(IBM866),
        0x03 | 0x57 | 0x58 | 0x59 => Some(WINDOWS_1252),
        0x4D => Some(GBK),
        0x4E => Some(EUC_KR),
        0x4F => Some(BIG5),
        0x7B => Some(SHIFT_JIS),
        0x7C => Some(WINDOWS_874),
        0x7D => Some(WINDOWS_1255),
        0x7E => Some(WINDOWS_1256),
        0x87 | 0xC8 => Some(WINDOWS_1250),
        0xC9 => Some(WINDOWS_1251),
        0xCA => Some(WINDOWS_1254),
        0xCB => Some(WINDOWS_1253),
        0x88 | 0xCC => Some(WINDOWS_1257),
        _ => None,
    }
}

/// Language driver id for an encoding, 0 when there is none.
pub fn language_driver_for(encoding: &'static Encoding) -> u8 {
    use encoding_rs::*;
    [
        (0x57, WINDOWS_1252),
        (0x65, IBM866),
        (0x4D, GBK),
        (0x4E, EUC_KR),
        (0x4F, BIG5),
        (0x7B, SHIFT_JIS),
        (0x7C, WINDOWS_874),
        (0x7D, WINDOWS_1255),
        (0x7E, WINDOWS_1256),
        (0xC8, WINDOWS_1250),
        (0xC9, WINDOWS_1251),
        (0xCA, WINDOWS_1254),
        (0xCB, WINDOWS_1253),
        (0xCC, WINDOWS_1257),
    ]
    .into_iter()
    .find(|(_, e)| *e == encoding)
    .map_or(0, |(ldid, _)| ldid)
}

/// Resolve an encoding label as found in `.cpg` files or user options.
pub fn encoding_from_label(label: &str) -> Result<&'static Encoding> {
    let trimmed = label.trim();
    let code_page = trimmed
        .strip_prefix("ANSI ")
        .or_else(|| trimmed.strip_prefix("CP"))
        .or_else(|| trimmed.strip_prefix("cp"))
        .unwrap_or(trimmed)
        .trim();
    let alias = match code_page {
        "65001" | "UTF8" | "utf8" => Some("utf-8"),
        "936" => Some("gbk"),
        "950" => Some("big5"),
        "932" => Some("shift_jis"),
        "949" => Some("euc-kr"),
        "866" => Some("ibm866"),
        "874" => Some("windows-874"),
        _ => None,
    };
    let windows = format!("windows-{code_page}");
    let candidates = [alias.unwrap_or(trimmed), windows.as_str(), trimmed];
    candidates
        .iter()
        .find_map(|c| Encoding::for_label(c.as_bytes()))
        .ok_or_else(|| Error::Encoding(format!("unknown encoding `{trimmed}`")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_header() -> Result<DbaseHeader> {
        DbaseHeader::with_fields(
            vec![
                FieldDescriptor::character("TYPE_AXE", 254)?,
                FieldDescriptor::numeric("GID", 18, 0)?,
                FieldDescriptor::numeric("LENGTH", 20, 15)?,
            ],
            encoding_rs::WINDOWS_1252,
        )
    }

    #[test]
    fn lengths_follow_fields() -> Result<()> {
        let header = sample_header()?;
        assert_eq!(header.record_length(), 1 + 254 + 18 + 20);
        assert_eq!(header.header_length() as usize, 32 + 3 * 32 + 1);
        assert_eq!(header.field_range(1), 255..273);
        assert_eq!(header.field_index("gid"), Some(1));
        Ok(())
    }

    #[test]
    fn write_then_read() -> Result<()> {
        let mut header = sample_header()?;
        header.set_record_count(382);
        let mut buf = Vec::new();
        header.write(&mut buf)?;
        assert_eq!(buf.len(), header.header_length() as usize);
        assert_eq!(buf[29], 0x57);

        let read = DbaseHeader::read(&mut Cursor::new(&buf))?;
        assert_eq!(read.record_count(), 382);
        assert_eq!(read.fields(), header.fields());
        assert_eq!(read.last_update(), header.last_update());
        assert_eq!(read.encoding(), encoding_rs::WINDOWS_1252);
        Ok(())
    }

    #[test]
    fn missing_terminator() -> Result<()> {
        let mut buf = Vec::new();
        sample_header()?.write(&mut buf)?;
        buf.pop();
        assert!(matches!(
            DbaseHeader::read(&mut Cursor::new(&buf)),
            Err(Error::CorruptHeader(_))
        ));
        Ok(())
    }

    #[test]
    fn inconsistent_record_length() -> Result<()> {
        let mut buf = Vec::new();
        sample_header()?.write(&mut buf)?;
        buf[10] = buf[10].wrapping_add(1);
        assert!(matches!(
            DbaseHeader::read(&mut Cursor::new(&buf)),
            Err(Error::CorruptHeader(_))
        ));
        Ok(())
    }

    #[test]
    fn duplicate_field_names() -> Result<()> {
        let mut header = sample_header()?;
        assert!(header.add_field(FieldDescriptor::logical("gid")?).is_err());
        Ok(())
    }

    #[test]
    fn encoding_labels() -> Result<()> {
        assert_eq!(encoding_from_label("UTF-8")?, encoding_rs::UTF_8);
        assert_eq!(encoding_from_label("utf8")?, encoding_rs::UTF_8);
        assert_eq!(encoding_from_label("1252")?, encoding_rs::WINDOWS_1252);
        assert_eq!(encoding_from_label("ANSI 1251\r\n")?, encoding_rs::WINDOWS_1251);
        assert_eq!(encoding_from_label("big5")?, encoding_rs::BIG5);
        assert_eq!(encoding_from_label("CP936")?, encoding_rs::GBK);
        assert_eq!(encoding_from_label("ISO-8859-1")?, encoding_rs::WINDOWS_1252);
        assert!(encoding_from_label("klingon").is_err());
        Ok(())
    }

    #[test]
    fn language_drivers() {
        assert_eq!(encoding_for_language_driver(0x4F), Some(encoding_rs::BIG5));
        assert_eq!(encoding_for_language_driver(0x00), None);
        assert_eq!(language_driver_for(encoding_rs::BIG5), 0x4F);
        assert_eq!(language_driver_for(encoding_rs::UTF_8), 0);
    }
}
