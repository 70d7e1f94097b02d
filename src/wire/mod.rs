//! Line-oriented topology format
//!
//! ```text
//! POETSGraph
//! <kind-tag>
//! BeginHeader
//! <kind-tag>
//! <deviceCount> <channelCount>
//! <graph properties>
//! EndHeader
//! BeginNodes
//! <device properties>            (deviceCount lines)
//! EndNodes
//! BeginEdges
//! <dst> <src> <delay> <channel>  (channelCount lines)
//! EndEdges
//! ```
//!
//! Kind-specific rows are whitespace-separated fields handled through
//! [`WireFields`]. Booleans are `0`/`1`.

use std::fmt;
use std::str::{FromStr, SplitWhitespace};

pub mod loader;
pub mod writer;

pub use loader::{GraphReader, Header};
pub use writer::GraphWriter;

pub const MAGIC: &str = "POETSGraph";
pub const BEGIN_HEADER: &str = "BeginHeader";
pub const END_HEADER: &str = "EndHeader";
pub const BEGIN_NODES: &str = "BeginNodes";
pub const END_NODES: &str = "EndNodes";
pub const BEGIN_EDGES: &str = "BeginEdges";
pub const END_EDGES: &str = "EndEdges";

/// Error decoding the fields of a single row
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("missing field '{0}'")]
    Missing(&'static str),

    #[error("invalid value '{value}' for field '{name}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("unexpected trailing field '{0}'")]
    Trailing(String),

    #[error("field '{name}' must be a single non-empty token, got '{value}'")]
    NotAToken { name: &'static str, value: String },
}

/// A value that occupies a fixed sequence of fields on one row
pub trait WireFields: Sized {
    fn read_fields(fields: &mut Fields<'_>) -> Result<Self, FieldError>;

    fn write_fields(&self, out: &mut FieldWriter);
}

/// Cursor over the whitespace-separated fields of a row
pub struct Fields<'a> {
    tokens: SplitWhitespace<'a>,
}

impl<'a> Fields<'a> {
    pub fn new(line: &'a str) -> Self {
        Self {
            tokens: line.split_whitespace(),
        }
    }

    /// Parse the next field
    pub fn next<T>(&mut self, name: &'static str) -> Result<T, FieldError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let token = self.tokens.next().ok_or(FieldError::Missing(name))?;
        token.parse().map_err(|e: T::Err| FieldError::Invalid {
            name,
            value: token.to_string(),
            reason: e.to_string(),
        })
    }

    /// Parse the next field as a `0`/`1` flag
    pub fn next_flag(&mut self, name: &'static str) -> Result<bool, FieldError> {
        let token = self.tokens.next().ok_or(FieldError::Missing(name))?;
        match token {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(FieldError::Invalid {
                name,
                value: other.to_string(),
                reason: "expected 0 or 1".to_string(),
            }),
        }
    }

    /// Fail if anything is left on the row
    pub fn finish(mut self) -> Result<(), FieldError> {
        match self.tokens.next() {
            Some(extra) => Err(FieldError::Trailing(extra.to_string())),
            None => Ok(()),
        }
    }
}

/// Accumulates fields for one row, space separated
#[derive(Debug, Default)]
pub struct FieldWriter {
    line: String,
    error: Option<FieldError>,
}

impl FieldWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: impl fmt::Display) {
        use std::fmt::Write;

        if !self.line.is_empty() {
            self.line.push(' ');
        }
        // Writing into a String cannot fail
        let _ = write!(self.line, "{}", value);
    }

    pub fn flag(&mut self, value: bool) {
        self.push(u8::from(value));
    }

    /// Push a free-text field. It must read back as exactly one field.
    pub fn word(&mut self, name: &'static str, value: &str) {
        if (value.is_empty() || value.contains(char::is_whitespace)) && self.error.is_none() {
            self.error = Some(FieldError::NotAToken {
                name,
                value: value.to_string(),
            });
        }
        self.push(value);
    }

    /// The finished row, or the first field that could not be written
    pub fn into_line(self) -> Result<String, FieldError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.line),
        }
    }
}

/// Decode a whole row, rejecting leftover fields
pub fn parse_row<T: WireFields>(line: &str) -> Result<T, FieldError> {
    let mut fields = Fields::new(line);
    let value = T::read_fields(&mut fields)?;
    fields.finish()?;
    Ok(value)
}

/// Encode a value as a row
pub fn format_row<T: WireFields>(value: &T) -> Result<String, FieldError> {
    let mut out = FieldWriter::new();
    value.write_fields(&mut out);
    out.into_line()
}

/// Kinds with no data for a role use `()`
impl WireFields for () {
    fn read_fields(_fields: &mut Fields<'_>) -> Result<Self, FieldError> {
        Ok(())
    }

    fn write_fields(&self, _out: &mut FieldWriter) {}
}

macro_rules! scalar_wire_fields {
    ($($ty:ty),*) => {
        $(
            impl WireFields for $ty {
                fn read_fields(fields: &mut Fields<'_>) -> Result<Self, FieldError> {
                    fields.next(stringify!($ty))
                }

                fn write_fields(&self, out: &mut FieldWriter) {
                    out.push(self);
                }
            }
        )*
    };
}

scalar_wire_fields!(u16, u32, u64, i32, i64);
