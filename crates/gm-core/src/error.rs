use std::fmt;

/// Which coordinate component violated the single-byte bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Row,
    Column,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Row => f.write_str("row"),
            Axis::Column => f.write_str("column"),
        }
    }
}

#[derive(Debug)]
pub enum CoreError {
    InvalidNamespace,
    CoordinateOutOfRange { axis: Axis, value: u32 },
    InvalidGridShape { rows: u32, columns: u32 },
    Mnemonic(bip39::Error),
    Cancelled,
    UnknownAnnotation(String),
    ReadOnlyAnnotation(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::InvalidNamespace => write!(f, "namespace must not be empty or blank"),
            CoreError::CoordinateOutOfRange { axis, value } => {
                write!(f, "{axis} {value} outside [0, 255]")
            }
            CoreError::InvalidGridShape { rows, columns } => {
                write!(f, "grid shape {rows}x{columns} must be within 1..=256 on each axis")
            }
            CoreError::Mnemonic(e) => write!(f, "mnemonic error: {e}"),
            CoreError::Cancelled => write!(f, "correlation cancelled"),
            CoreError::UnknownAnnotation(id) => write!(f, "no annotation with id {id}"),
            CoreError::ReadOnlyAnnotation(id) => write!(f, "annotation {id} is read-only"),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoreError::Mnemonic(e) => Some(e),
            _ => None,
        }
    }
}

impl From<bip39::Error> for CoreError {
    fn from(e: bip39::Error) -> Self {
        CoreError::Mnemonic(e)
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
