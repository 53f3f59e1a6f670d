use std::error;
use std::fmt;
use std::io;
use std::result;

use rowcsv_core::Malformed;

use crate::byte_row::{ByteRow, Position};

/// A type alias for `Result<T, rowcsv::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// An error that can occur when processing CSV data.
///
/// This error can happen when writing or reading CSV data.
///
/// Note that a reader with the default lenient quoting reading rows as raw
/// byte strings can only fail with `Error::Io`.
#[derive(Debug)]
pub enum Error {
    /// An I/O error that occurred while reading or writing CSV data.
    ///
    /// I/O errors are never retried.
    Io(io::Error),
    /// A UTF-8 decoding error that occured while reading CSV data into Rust
    /// `String`s.
    Utf8 {
        /// The position of the row in which this error occurred, if
        /// available.
        pos: Option<Position>,
        /// The corresponding UTF-8 error.
        err: Utf8Error,
    },
    /// A row broke the quoting rules. This only occurs when the reader was
    /// built with `Quoting::Strict`.
    ///
    /// The whole offending row has been consumed when this is returned, so
    /// the next read starts at the following row.
    Malformed {
        /// The position of the offending row.
        pos: Position,
        /// Which rule was broken.
        kind: Malformed,
    },
    /// A cell could not be converted to text while writing a row.
    ///
    /// Nothing of the row has been written when this is returned.
    ValueConversion {
        /// The index of the offending cell in its row.
        field: usize,
        /// Why the conversion failed.
        msg: String,
    },
}

impl Error {
    /// Returns true if this is an I/O error.
    pub fn is_io_error(&self) -> bool {
        match *self {
            Error::Io(_) => true,
            _ => false,
        }
    }

    /// Return the position of the row in which this error occurred, if
    /// available.
    pub fn position(&self) -> Option<&Position> {
        match *self {
            Error::Utf8 { pos: Some(ref pos), .. } => Some(pos),
            Error::Malformed { ref pos, .. } => Some(pos),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        match err {
            Error::Io(err) => err,
            err => io::Error::new(io::ErrorKind::Other, err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            Error::Utf8 { ref err, .. } => Some(err),
            Error::Malformed { .. } => None,
            Error::ValueConversion { .. } => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Io(ref err) => err.fmt(f),
            Error::Utf8 { pos: None, ref err } => {
                write!(f, "CSV parse error: field {}: {}", err.field(), err)
            }
            Error::Utf8 { pos: Some(ref pos), ref err } => write!(
                f,
                "CSV parse error: row {} \
                 (byte {}, line {}, field: {}): {}",
                pos.row(),
                pos.byte(),
                pos.line(),
                err.field(),
                err
            ),
            Error::Malformed { ref pos, kind } => write!(
                f,
                "CSV parse error: row {} (byte {}, line {}): {}",
                pos.row(),
                pos.byte(),
                pos.line(),
                kind
            ),
            Error::ValueConversion { field, ref msg } => write!(
                f,
                "CSV write error: cannot convert cell {} to text: {}",
                field, msg
            ),
        }
    }
}

/// A UTF-8 validation error that occurs when attempting to convert a
/// `ByteRow` into a `Row`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FromUtf8Error {
    row: ByteRow,
    err: Utf8Error,
}

impl FromUtf8Error {
    /// Create a new FromUtf8Error.
    pub(crate) fn new(row: ByteRow, err: Utf8Error) -> FromUtf8Error {
        FromUtf8Error { row, err }
    }

    /// Access the underlying `ByteRow` that failed UTF-8 validation.
    pub fn into_byte_row(self) -> ByteRow {
        self.row
    }

    /// Access the underlying UTF-8 validation error.
    pub fn utf8_error(&self) -> &Utf8Error {
        &self.err
    }
}

impl fmt::Display for FromUtf8Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.err.fmt(f)
    }
}

impl error::Error for FromUtf8Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.err)
    }
}

/// A UTF-8 validation error.
///
/// The error includes the index of the field that failed validation, and the
/// last byte at which valid UTF-8 was verified.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Utf8Error {
    /// The field index of a byte row in which UTF-8 validation failed.
    field: usize,
    /// The index into the given field up to which valid UTF-8 was verified.
    valid_up_to: usize,
}

impl Utf8Error {
    /// Create a new UTF-8 error.
    pub(crate) fn new(field: usize, valid_up_to: usize) -> Utf8Error {
        Utf8Error { field, valid_up_to }
    }

    /// The field index of a byte row in which UTF-8 validation failed.
    pub fn field(&self) -> usize {
        self.field
    }

    /// The index into the given field up to which valid UTF-8 was verified.
    pub fn valid_up_to(&self) -> usize {
        self.valid_up_to
    }
}

impl error::Error for Utf8Error {}

impl fmt::Display for Utf8Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid utf-8: invalid UTF-8 in field {} near byte index {}",
            self.field, self.valid_up_to
        )
    }
}

/// `IntoInnerError` occurs when consuming a `Writer` fails.
///
/// Consuming the `Writer` causes a flush to happen. If the flush fails, then
/// this error is returned, which contains both the original `Writer` and
/// the error that occurred.
///
/// The type parameter `W` is the unconsumed writer.
pub struct IntoInnerError<W> {
    wtr: W,
    err: io::Error,
}

impl<W> IntoInnerError<W> {
    /// Creates a new `IntoInnerError`.
    pub(crate) fn new(wtr: W, err: io::Error) -> IntoInnerError<W> {
        IntoInnerError { wtr, err }
    }

    /// Returns the error which caused the call to `into_inner` to fail.
    ///
    /// This error was returned when attempting to flush the internal buffer.
    pub fn error(&self) -> &io::Error {
        &self.err
    }

    /// Returns the underlying writer which generated the error.
    ///
    /// The returned value can be used for error recovery, such as
    /// re-inspecting the buffer.
    pub fn into_inner(self) -> W {
        self.wtr
    }
}

impl<W> From<IntoInnerError<W>> for Error {
    fn from(err: IntoInnerError<W>) -> Error {
        Error::Io(err.err)
    }
}

impl<W: std::any::Any> error::Error for IntoInnerError<W> {}

impl<W> fmt::Display for IntoInnerError<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.err.fmt(f)
    }
}

impl<W> fmt::Debug for IntoInnerError<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.err.fmt(f)
    }
}
