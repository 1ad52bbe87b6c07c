use geozero::error::GeozeroError;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum Error {
    CorruptHeader(String),
    MalformedField {
        field: String,
        record: Option<u64>,
        reason: String,
    },
    Encoding(String),
    OutOfRange {
        index: u64,
        count: u64,
    },
    UnsupportedShapeType(i32),
    StructuralMismatch(String),
    CorruptRecord {
        record: u64,
        reason: String,
    },
    UnsupportedGeometryType(String),
    InvalidGeometry(String),
    MalformedGeoJson(String),
    UnsupportedOperation(&'static str),
    InvalidArgument(String),
    /// Wraps an error with the file it was raised for.
    File {
        path: PathBuf,
        source: Box<Error>,
    },
    IO(std::io::Error),
    Json(serde_json::Error),
    Geozero(GeozeroError),
}
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Attach the path of the file being processed, keeping the innermost path.
    pub fn in_file(self, path: impl AsRef<Path>) -> Self {
        match self {
            Error::File { .. } => self,
            other => Error::File {
                path: path.as_ref().to_path_buf(),
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn at_record(self, index: u64) -> Self {
        match self {
            Error::MalformedField { field, reason, .. } => Error::MalformedField {
                field,
                record: Some(index),
                reason,
            },
            Error::Encoding(msg) => Error::Encoding(format!("{msg} (record {index})")),
            other => other,
        }
    }

    /// Error without file context.
    pub fn root(&self) -> &Error {
        match self {
            Error::File { source, .. } => source.root(),
            other => other,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::CorruptHeader(msg) => write!(f, "Corrupt header: {msg}"),
            Error::MalformedField {
                field,
                record: Some(record),
                reason,
            } => write!(f, "Malformed field `{field}` in record {record}: {reason}"),
            Error::MalformedField {
                field,
                record: None,
                reason,
            } => write!(f, "Malformed field `{field}`: {reason}"),
            Error::Encoding(msg) => write!(f, "Encoding error: {msg}"),
            Error::OutOfRange { index, count } => {
                write!(f, "Row {index} out of range (row count {count})")
            }
            Error::UnsupportedShapeType(tag) => write!(f, "Unsupported shape type {tag}"),
            Error::StructuralMismatch(msg) => write!(f, "Structural mismatch: {msg}"),
            Error::CorruptRecord { record, reason } => {
                write!(f, "Corrupt record {record}: {reason}")
            }
            Error::UnsupportedGeometryType(kind) => write!(f, "Unsupported geometry type `{kind}`"),
            Error::InvalidGeometry(msg) => write!(f, "Invalid geometry: {msg}"),
            Error::MalformedGeoJson(msg) => write!(f, "Malformed GeoJSON: {msg}"),
            Error::UnsupportedOperation(op) => write!(f, "Unsupported operation: {op}"),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            Error::File { path, source } => write!(f, "{}: {source}", path.display()),
            Error::IO(io) => io.fmt(f),
            Error::Json(json) => json.fmt(f),
            Error::Geozero(geozero) => geozero.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::File { source, .. } => Some(source.as_ref()),
            Error::IO(io) => Some(io),
            Error::Json(json) => Some(json),
            Error::Geozero(geozero) => Some(geozero),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::IO(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Json(value)
    }
}

impl From<GeozeroError> for Error {
    fn from(value: GeozeroError) -> Self {
        Error::Geozero(value)
    }
}

impl From<Error> for GeozeroError {
    fn from(value: Error) -> Self {
        match value {
            Error::IO(io) => GeozeroError::from(io),
            Error::Geozero(geozero) => geozero,
            other => GeozeroError::Feature(other.to_string()),
        }
    }
}

pub(crate) trait ResultExt<T> {
    fn in_file(self, path: &Path) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn in_file(self, path: &Path) -> Result<T> {
        self.map_err(|e| e.in_file(path))
    }
}

impl<T> ResultExt<T> for std::io::Result<T> {
    fn in_file(self, path: &Path) -> Result<T> {
        self.map_err(|e| Error::IO(e).in_file(path))
    }
}
