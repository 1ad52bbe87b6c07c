//! Fixed width dBase field values.

use crate::error::{Error, Result};
use crate::table::ColumnType;
use crate::value::Value;
use byteorder::{ByteOrder, LittleEndian};
use chrono::{Datelike, NaiveDate};
use encoding_rs::Encoding;

/// Longest numeric field decoded as an integer.
const MAX_INTEGER_DIGITS: u8 = 18;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    Character,
    Numeric,
    Float,
    Date,
    Logical,
    /// 4-byte little endian integer ('I')
    Integer,
    /// 4-byte little endian integer ('+', autoincrement)
    Long,
    /// 8-byte little endian double ('O')
    Double,
}

impl FieldType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'C' => Some(FieldType::Character),
            b'N' => Some(FieldType::Numeric),
            b'F' => Some(FieldType::Float),
            b'D' => Some(FieldType::Date),
            b'L' => Some(FieldType::Logical),
            b'I' => Some(FieldType::Integer),
            b'+' => Some(FieldType::Long),
            b'O' => Some(FieldType::Double),
            _ => None,
        }
    }
    pub fn code(self) -> u8 {
        match self {
            FieldType::Character => b'C',
            FieldType::Numeric => b'N',
            FieldType::Float => b'F',
            FieldType::Date => b'D',
            FieldType::Logical => b'L',
            FieldType::Integer => b'I',
            FieldType::Long => b'+',
            FieldType::Double => b'O',
        }
    }
    /// Length imposed by the type, if any.
    fn fixed_length(self) -> Option<u8> {
        match self {
            FieldType::Date => Some(8),
            FieldType::Logical => Some(1),
            FieldType::Integer | FieldType::Long => Some(4),
            FieldType::Double => Some(8),
            _ => None,
        }
    }
}

/// Column declaration of a dBase file.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    pub(crate) name: String,
    pub(crate) field_type: FieldType,
    pub(crate) length: u8,
    pub(crate) decimal_count: u8,
}

impl FieldDescriptor {
    pub fn new(name: &str, field_type: FieldType, length: u8, decimal_count: u8) -> Result<Self> {
        if name.is_empty() || name.len() > 10 || !name.is_ascii() {
            return Err(Error::InvalidArgument(format!(
                "field name `{name}` must be 1 to 10 ASCII characters"
            )));
        }
        if let Some(fixed) = field_type.fixed_length() {
            if length != fixed {
                return Err(Error::InvalidArgument(format!(
                    "field `{name}` of type '{}' must be {fixed} bytes long",
                    field_type.code() as char
                )));
            }
        }
        if length == 0 {
            return Err(Error::InvalidArgument(format!(
                "field `{name}` has zero length"
            )));
        }
        if decimal_count > 0 && decimal_count as usize + 2 > length as usize {
            return Err(Error::InvalidArgument(format!(
                "field `{name}`: {decimal_count} decimals do not fit in {length} bytes"
            )));
        }
        Ok(FieldDescriptor {
            name: name.to_string(),
            field_type,
            length,
            decimal_count,
        })
    }
    pub fn character(name: &str, length: u8) -> Result<Self> {
        Self::new(name, FieldType::Character, length, 0)
    }
    pub fn numeric(name: &str, length: u8, decimal_count: u8) -> Result<Self> {
        Self::new(name, FieldType::Numeric, length, decimal_count)
    }
    pub fn date(name: &str) -> Result<Self> {
        Self::new(name, FieldType::Date, 8, 0)
    }
    pub fn logical(name: &str) -> Result<Self> {
        Self::new(name, FieldType::Logical, 1, 0)
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }
    pub fn length(&self) -> u8 {
        self.length
    }
    pub fn decimal_count(&self) -> u8 {
        self.decimal_count
    }

    /// Table column type values of this field decode to.
    pub fn column_type(&self) -> ColumnType {
        match self.field_type {
            FieldType::Character => ColumnType::Text {
                length: self.length,
            },
            FieldType::Numeric if self.decimal_count == 0 && self.length <= MAX_INTEGER_DIGITS => {
                ColumnType::Int {
                    length: self.length,
                }
            }
            FieldType::Numeric | FieldType::Float => ColumnType::Double {
                length: self.length,
                decimals: self.decimal_count,
            },
            FieldType::Date => ColumnType::Date,
            FieldType::Logical => ColumnType::Bool,
            FieldType::Integer | FieldType::Long => ColumnType::Int { length: 4 },
            FieldType::Double => ColumnType::Double {
                length: 8,
                decimals: 0,
            },
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> Error {
        Error::MalformedField {
            field: self.name.clone(),
            record: None,
            reason: reason.into(),
        }
    }
}

fn trim_padding(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| *b != b' ' && *b != 0)
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| *b != b' ' && *b != 0)
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

fn trim_trailing(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| *b != b' ' && *b != 0)
        .map_or(0, |i| i + 1);
    &bytes[..end]
}

/// Decode one field of a record. `bytes` spans exactly the field.
pub fn decode(bytes: &[u8], field: &FieldDescriptor, encoding: &'static Encoding) -> Result<Value> {
    match field.field_type {
        FieldType::Character => {
            let raw = trim_trailing(bytes);
            let text = encoding
                .decode_without_bom_handling_and_without_replacement(raw)
                .ok_or_else(|| {
                    Error::Encoding(format!(
                        "field `{}` is not valid {}",
                        field.name,
                        encoding.name()
                    ))
                })?;
            Ok(Value::Text(text.into_owned()))
        }
        FieldType::Numeric | FieldType::Float => {
            let raw = trim_padding(bytes);
            if raw.is_empty() {
                return Ok(Value::Null);
            }
            let text = std::str::from_utf8(raw)
                .map_err(|_| field.malformed("numeric field is not ASCII"))?;
            // `parse` also accepts "NaN" and "inf"
            if !text
                .bytes()
                .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
            {
                return Err(field.malformed(format!("`{text}` is not a number")));
            }
            if matches!(field.column_type(), ColumnType::Int { .. }) {
                if let Ok(v) = text.parse::<i64>() {
                    return Ok(Value::Int(v));
                }
                // some writers emit "12.0" in integer columns
                match text.parse::<f64>() {
                    Ok(v) if v.fract() == 0.0 && v.abs() < 1e18 => Ok(Value::Int(v as i64)),
                    _ => Err(field.malformed(format!("`{text}` is not an integer"))),
                }
            } else {
                text.parse::<f64>()
                    .map(Value::Double)
                    .map_err(|_| field.malformed(format!("`{text}` is not a number")))
            }
        }
        FieldType::Date => {
            let raw = trim_padding(bytes);
            if raw.is_empty() || raw.iter().all(|b| *b == b'0') {
                return Ok(Value::Null);
            }
            let text =
                std::str::from_utf8(raw).map_err(|_| field.malformed("date field is not ASCII"))?;
            if text.len() != 8 || !text.bytes().all(|b| b.is_ascii_digit()) {
                return Err(field.malformed(format!("`{text}` is not a YYYYMMDD date")));
            }
            NaiveDate::parse_from_str(text, "%Y%m%d")
                .map(Value::Date)
                .map_err(|_| field.malformed(format!("`{text}` is not a valid date")))
        }
        FieldType::Logical => match bytes.first().copied().unwrap_or(b' ') {
            b'T' | b't' | b'Y' | b'y' => Ok(Value::Bool(true)),
            b'F' | b'f' | b'N' | b'n' => Ok(Value::Bool(false)),
            b'?' | b' ' | 0 => Ok(Value::Null),
            other => Err(field.malformed(format!(
                "`{}` is not a logical value",
                other.escape_ascii()
            ))),
        },
        FieldType::Integer | FieldType::Long => {
            if bytes.len() != 4 {
                return Err(field.malformed("binary integer must be 4 bytes"));
            }
            Ok(Value::Int(LittleEndian::read_i32(bytes) as i64))
        }
        FieldType::Double => {
            if bytes.len() != 8 {
                return Err(field.malformed("binary double must be 8 bytes"));
            }
            Ok(Value::Double(LittleEndian::read_f64(bytes)))
        }
    }
}

fn write_right_justified(field: &FieldDescriptor, text: &str, out: &mut [u8]) -> Result<()> {
    if text.len() > out.len() {
        return Err(field.malformed(format!(
            "`{text}` does not fit in {} bytes",
            out.len()
        )));
    }
    let pad = out.len() - text.len();
    out[..pad].fill(b' ');
    out[pad..].copy_from_slice(text.as_bytes());
    Ok(())
}

fn format_number(field: &FieldDescriptor, value: &Value) -> Result<Option<String>> {
    let decimals = field.decimal_count as usize;
    match value {
        Value::Null => Ok(None),
        Value::Int(v) if decimals == 0 => Ok(Some(v.to_string())),
        Value::Int(v) => Ok(Some(format!("{v}.{}", "0".repeat(decimals)))),
        Value::Double(v) if !v.is_finite() => {
            Err(field.malformed(format!("{v} cannot be stored in a numeric field")))
        }
        Value::Double(v) => Ok(Some(format!("{v:.decimals$}"))),
        Value::Bool(v) => Ok(Some(if *v { "1" } else { "0" }.to_string())),
        other => Err(field.malformed(format!(
            "cannot store a {} value in a numeric field",
            other.type_name()
        ))),
    }
}

/// Encode `value` into `out`, which spans exactly the field.
pub fn encode(
    value: &Value,
    field: &FieldDescriptor,
    encoding: &'static Encoding,
    out: &mut [u8],
) -> Result<()> {
    debug_assert_eq!(out.len(), field.length as usize);
    match field.field_type {
        FieldType::Character => {
            let text = match value {
                Value::Null => {
                    out.fill(b' ');
                    return Ok(());
                }
                Value::Text(s) => std::borrow::Cow::Borrowed(s.as_str()),
                Value::Geometry(_) => {
                    return Err(field.malformed("cannot store a geometry in a character field"))
                }
                other => std::borrow::Cow::Owned(other.to_string()),
            };
            let (bytes, _, had_errors) = encoding.encode(&text);
            if had_errors {
                return Err(Error::Encoding(format!(
                    "`{text}` cannot be represented in {} (field `{}`)",
                    encoding.name(),
                    field.name
                )));
            }
            if bytes.len() > out.len() {
                return Err(field.malformed(format!(
                    "text of {} bytes does not fit in {} bytes",
                    bytes.len(),
                    out.len()
                )));
            }
            out[..bytes.len()].copy_from_slice(&bytes);
            out[bytes.len()..].fill(b' ');
            Ok(())
        }
        FieldType::Numeric | FieldType::Float => match format_number(field, value)? {
            Some(text) => write_right_justified(field, &text, out),
            None => {
                out.fill(b' ');
                Ok(())
            }
        },
        FieldType::Date => match value {
            Value::Null => {
                out.fill(b' ');
                Ok(())
            }
            Value::Date(d) if (0..=9999).contains(&d.year()) => {
                out.copy_from_slice(d.format("%Y%m%d").to_string().as_bytes());
                Ok(())
            }
            Value::Date(d) => Err(field.malformed(format!("{d} is out of the dBase date range"))),
            other => Err(field.malformed(format!(
                "cannot store a {} value in a date field",
                other.type_name()
            ))),
        },
        FieldType::Logical => {
            out[0] = match value {
                Value::Null => b'?',
                Value::Bool(true) => b'T',
                Value::Bool(false) => b'F',
                other => {
                    return Err(field.malformed(format!(
                        "cannot store a {} value in a logical field",
                        other.type_name()
                    )))
                }
            };
            Ok(())
        }
        FieldType::Integer | FieldType::Long => {
            let v = match value {
                Value::Null => 0,
                Value::Int(v) => i32::try_from(*v)
                    .map_err(|_| field.malformed(format!("{v} overflows a 4-byte integer")))?,
                other => {
                    return Err(field.malformed(format!(
                        "cannot store a {} value in an integer field",
                        other.type_name()
                    )))
                }
            };
            LittleEndian::write_i32(out, v);
            Ok(())
        }
        FieldType::Double => {
            let v = match value {
                Value::Null => 0.0,
                Value::Int(v) => *v as f64,
                Value::Double(v) => *v,
                other => {
                    return Err(field.malformed(format!(
                        "cannot store a {} value in a double field",
                        other.type_name()
                    )))
                }
            };
            LittleEndian::write_f64(out, v);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{BIG5, UTF_8, WINDOWS_1252};

    fn encoded(value: &Value, field: &FieldDescriptor) -> Result<Vec<u8>> {
        let mut out = vec![0u8; field.length() as usize];
        encode(value, field, WINDOWS_1252, &mut out)?;
        Ok(out)
    }

    #[test]
    fn numeric_integer() -> Result<()> {
        let field = FieldDescriptor::numeric("GID", 18, 0)?;
        assert_eq!(field.column_type(), ColumnType::Int { length: 18 });
        let bytes = encoded(&Value::Int(-42), &field)?;
        assert_eq!(&bytes, b"               -42");
        assert_eq!(decode(&bytes, &field, WINDOWS_1252)?, Value::Int(-42));
        Ok(())
    }

    #[test]
    fn numeric_decimals_zero_padded() -> Result<()> {
        let field = FieldDescriptor::numeric("LENGTH", 10, 3)?;
        assert_eq!(&encoded(&Value::Double(3.5), &field)?, b"     3.500");
        assert_eq!(&encoded(&Value::Int(7), &field)?, b"     7.000");
        assert_eq!(
            decode(b"  -12.250 ", &field, WINDOWS_1252)?,
            Value::Double(-12.25)
        );
        Ok(())
    }

    #[test]
    fn wide_numeric_is_double() -> Result<()> {
        let field = FieldDescriptor::numeric("BIG", 20, 0)?;
        assert!(matches!(field.column_type(), ColumnType::Double { .. }));
        assert_eq!(
            decode(b"                  12", &field, WINDOWS_1252)?,
            Value::Double(12.0)
        );
        Ok(())
    }

    #[test]
    fn numeric_overflow_rejected() -> Result<()> {
        let field = FieldDescriptor::numeric("N", 4, 0)?;
        assert!(matches!(
            encoded(&Value::Int(123456), &field),
            Err(Error::MalformedField { .. })
        ));
        assert!(matches!(
            encoded(&Value::Double(f64::NAN), &field),
            Err(Error::MalformedField { .. })
        ));
        Ok(())
    }

    #[test]
    fn numeric_blank_and_garbage() -> Result<()> {
        let field = FieldDescriptor::numeric("N", 5, 0)?;
        assert_eq!(decode(b"     ", &field, WINDOWS_1252)?, Value::Null);
        assert_eq!(encoded(&Value::Null, &field)?, b"     ");
        assert!(matches!(
            decode(b"  1x2", &field, WINDOWS_1252),
            Err(Error::MalformedField { .. })
        ));
        Ok(())
    }

    #[test]
    fn non_finite_text_rejected() -> Result<()> {
        let double = FieldDescriptor::numeric("LENGTH", 10, 3)?;
        let float = FieldDescriptor::new("RATIO", FieldType::Float, 10, 2)?;
        for text in [b"       NaN", b"       inf", b"  infinity", b"      -Inf"] {
            assert!(matches!(
                decode(text, &double, WINDOWS_1252),
                Err(Error::MalformedField { .. })
            ));
            assert!(decode(text, &float, WINDOWS_1252).is_err());
        }
        let integer = FieldDescriptor::numeric("GID", 10, 0)?;
        assert!(decode(b"       NaN", &integer, WINDOWS_1252).is_err());
        assert_eq!(decode(b"   1.5e+02", &double, WINDOWS_1252)?, Value::Double(150.0));
        Ok(())
    }

    #[test]
    fn character_padding() -> Result<()> {
        let field = FieldDescriptor::character("TYPE_AXE", 8)?;
        let bytes = encoded(&Value::from("river"), &field)?;
        assert_eq!(&bytes, b"river   ");
        assert_eq!(decode(&bytes, &field, WINDOWS_1252)?, Value::from("river"));
        assert_eq!(decode(b"        ", &field, WINDOWS_1252)?, Value::from(""));
        assert!(matches!(
            encoded(&Value::from("too long text"), &field),
            Err(Error::MalformedField { .. })
        ));
        Ok(())
    }

    #[test]
    fn character_encodings() -> Result<()> {
        let field = FieldDescriptor::character("NAME", 12)?;
        let mut out = vec![0u8; 12];
        encode(&Value::from("松柏坑溪"), &field, BIG5, &mut out)?;
        assert_eq!(&out[8..], b"    ");
        assert_eq!(decode(&out, &field, BIG5)?, Value::from("松柏坑溪"));

        assert!(matches!(
            encode(&Value::from("松柏"), &field, WINDOWS_1252, &mut out),
            Err(Error::Encoding(_))
        ));
        assert!(matches!(
            decode(b"\xff\xfe        ", &field, UTF_8),
            Err(Error::Encoding(_))
        ));
        Ok(())
    }

    #[test]
    fn dates() -> Result<()> {
        let field = FieldDescriptor::date("DAY")?;
        let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let bytes = encoded(&Value::Date(day), &field)?;
        assert_eq!(&bytes, b"20240229");
        assert_eq!(decode(&bytes, &field, WINDOWS_1252)?, Value::Date(day));
        assert_eq!(decode(b"00000000", &field, WINDOWS_1252)?, Value::Null);
        assert_eq!(decode(b"        ", &field, WINDOWS_1252)?, Value::Null);
        assert!(decode(b"20230230", &field, WINDOWS_1252).is_err());
        Ok(())
    }

    #[test]
    fn logicals() -> Result<()> {
        let field = FieldDescriptor::logical("OK")?;
        for (byte, expected) in [
            (b'T', Value::Bool(true)),
            (b'y', Value::Bool(true)),
            (b'f', Value::Bool(false)),
            (b'N', Value::Bool(false)),
            (b'?', Value::Null),
            (b' ', Value::Null),
        ] {
            assert_eq!(decode(&[byte], &field, WINDOWS_1252)?, expected);
        }
        assert!(decode(b"x", &field, WINDOWS_1252).is_err());
        assert_eq!(encoded(&Value::Null, &field)?, b"?");
        assert_eq!(encoded(&Value::Bool(true), &field)?, b"T");
        Ok(())
    }

    #[test]
    fn binary_fields() -> Result<()> {
        let int = FieldDescriptor::new("ID", FieldType::Integer, 4, 0)?;
        let bytes = encoded(&Value::Int(-7), &int)?;
        assert_eq!(bytes, (-7i32).to_le_bytes());
        assert_eq!(decode(&bytes, &int, WINDOWS_1252)?, Value::Int(-7));
        assert!(encoded(&Value::Int(i64::MAX), &int).is_err());

        let double = FieldDescriptor::new("VAL", FieldType::Double, 8, 0)?;
        let bytes = encoded(&Value::Double(0.1), &double)?;
        assert_eq!(decode(&bytes, &double, WINDOWS_1252)?, Value::Double(0.1));
        Ok(())
    }

    #[test]
    fn descriptor_validation() {
        assert!(FieldDescriptor::character("ELEVENCHARS", 10).is_err());
        assert!(FieldDescriptor::new("D", FieldType::Date, 10, 0).is_err());
        assert!(FieldDescriptor::numeric("N", 3, 2).is_err());
        assert!(FieldDescriptor::character("EMPTY", 0).is_err());
    }
}
