use std::io::{self, BufRead};

use rowcsv_core::{
    Malformed, Quoting, ReadRecordResult, Reader as CoreReader,
    ReaderBuilder as CoreReaderBuilder, Terminator,
};

use crate::byte_row::{ByteRow, Position};
use crate::error::{Error, Result};
use crate::row::Row;
use crate::scope::{Close, Scope, Scoped};

/// Builds a CSV reader with various configuration knobs.
///
/// This builder can be used to tweak the line ending and quoting rules of
/// a reader. The delimiter is always `,` and the quote is always `"`.
#[derive(Debug)]
pub struct ReaderBuilder {
    capacity: usize,
    builder: CoreReaderBuilder,
}

impl Default for ReaderBuilder {
    fn default() -> ReaderBuilder {
        ReaderBuilder {
            capacity: 8 * (1 << 10),
            builder: CoreReaderBuilder::default(),
        }
    }
}

impl ReaderBuilder {
    /// Create a new builder for configuring CSV parsing.
    ///
    /// To convert a builder into a reader, call one of the methods starting
    /// with `from_` or `scoped`.
    ///
    /// # Example
    ///
    /// ```
    /// use rowcsv::ReaderBuilder;
    ///
    /// # fn example() -> rowcsv::Result<()> {
    /// let data = "\
    /// city,country,pop
    /// Boston,United States,4628910
    /// ";
    /// let mut rdr = ReaderBuilder::new().from_reader(data.as_bytes());
    ///
    /// let row = rdr.next_row()?.unwrap();
    /// assert_eq!(row, vec!["city", "country", "pop"]);
    /// let row = rdr.next_row()?.unwrap();
    /// assert_eq!(row, vec!["Boston", "United States", "4628910"]);
    /// assert!(rdr.next_row()?.is_none());
    /// # Ok(()) }
    /// # example().unwrap();
    /// ```
    pub fn new() -> ReaderBuilder {
        ReaderBuilder::default()
    }

    /// Build a CSV reader from this configuration that reads data from
    /// `rdr`.
    ///
    /// Note that the CSV reader is buffered automatically, so you should
    /// not wrap `rdr` in a buffered reader like `io::BufReader`.
    ///
    /// The reader does not own `rdr`: it never closes it.
    pub fn from_reader<R: io::Read>(&self, rdr: R) -> Reader<R> {
        Reader::new(self, rdr)
    }

    /// Build a CSV reader from this configuration that owns `rdr`, wrapped
    /// in a guard that closes `rdr` when the guard goes out of scope.
    ///
    /// # Example
    ///
    /// ```
    /// use rowcsv::ReaderBuilder;
    ///
    /// # fn example() -> rowcsv::Result<()> {
    /// let mut data: &[u8] = b"a,b\n";
    /// {
    ///     let mut rdr = ReaderBuilder::new().scoped(&mut data);
    ///     assert!(rdr.owns_stream());
    ///     assert_eq!(rdr.next_row()?.unwrap(), vec!["a", "b"]);
    /// }
    /// # Ok(()) }
    /// # example().unwrap();
    /// ```
    pub fn scoped<R: io::Read + Close>(&self, rdr: R) -> Scoped<Reader<R>> {
        self.from_reader(rdr).enter()
    }

    /// The record terminator to use when parsing CSV.
    ///
    /// The default is `Terminator::Universal`, which treats any occurrence
    /// of `\r`, `\n` or `\r\n` outside of quotes as a single row
    /// terminator.
    ///
    /// # Example: `\r\n` only
    ///
    /// ```
    /// use rowcsv::{ReaderBuilder, Terminator};
    ///
    /// # fn example() -> rowcsv::Result<()> {
    /// let data = "a\nb\r\nc";
    /// let mut rdr = ReaderBuilder::new()
    ///     .terminator(Terminator::CRLF)
    ///     .from_reader(data.as_bytes());
    ///
    /// assert_eq!(rdr.next_row()?.unwrap(), vec!["a\nb"]);
    /// assert_eq!(rdr.next_row()?.unwrap(), vec!["c"]);
    /// # Ok(()) }
    /// # example().unwrap();
    /// ```
    pub fn terminator(&mut self, term: Terminator) -> &mut ReaderBuilder {
        self.builder.terminator(term);
        self
    }

    /// How to treat input that breaks the quoting rules.
    ///
    /// By default this is `Quoting::Lenient`, which always finds a parse.
    /// With `Quoting::Strict`, a row that breaks the rules is consumed and
    /// reported as `Error::Malformed`.
    ///
    /// # Example
    ///
    /// ```
    /// use rowcsv::{Error, Malformed, Quoting, ReaderBuilder};
    ///
    /// let data = "\"a\"b,c\nd,e\n";
    /// let mut rdr = ReaderBuilder::new()
    ///     .quoting(Quoting::Strict)
    ///     .from_reader(data.as_bytes());
    ///
    /// match rdr.next_row() {
    ///     Err(Error::Malformed { kind, .. }) => {
    ///         assert_eq!(kind, Malformed::TextAfterQuote);
    ///     }
    ///     wat => panic!("expected a malformed row, got {:?}", wat),
    /// }
    /// // Reading continues with the next row.
    /// assert_eq!(rdr.next_row().unwrap().unwrap(), vec!["d", "e"]);
    /// ```
    pub fn quoting(&mut self, quoting: Quoting) -> &mut ReaderBuilder {
        self.builder.quoting(quoting);
        self
    }

    /// Set the capacity (in bytes) of the buffer used in the CSV reader.
    ///
    /// A capacity of `0` is treated as `1`.
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut ReaderBuilder {
        self.capacity = capacity;
        self
    }
}

/// A lazy, forward-only reader of CSV rows.
///
/// The reader pulls data from its stream only as rows are requested, and
/// is itself an iterator over `Result<Row>`. Once the end of the input is
/// reached, it keeps reporting the end of the input.
///
/// # Example
///
/// ```
/// use rowcsv::Reader;
///
/// # fn example() -> rowcsv::Result<()> {
/// let data = "\
/// abc,def,ghi,jkl
/// mno,,pqr,stu,vw
/// xyz
/// ";
/// let rows = Reader::from_reader(data.as_bytes())
///     .collect::<rowcsv::Result<Vec<_>>>()?;
/// assert_eq!(rows, vec![
///     vec!["abc", "def", "ghi", "jkl"],
///     vec!["mno", "", "pqr", "stu", "vw"],
///     vec!["xyz"],
/// ]);
/// # Ok(()) }
/// # example().unwrap();
/// ```
#[derive(Debug)]
pub struct Reader<R> {
    /// The underlying CSV parser.
    core: CoreReader,
    /// The underlying reader.
    rdr: io::BufReader<R>,
    /// Various state tracking.
    state: ReaderState,
}

#[derive(Debug)]
struct ReaderState {
    /// The current position of the parser.
    ///
    /// Note that this position is only observable by callers at the start
    /// of a row. More granular positions are not supported.
    cur_pos: Position,
    /// Whether the reader has been exhausted or hit an I/O error.
    eof: ReaderEofState,
    /// Whether this reader closes its stream when leaving a scope.
    owns_stream: bool,
}

/// Whether EOF of the underlying reader has been reached or not.
///
/// IO errors on the underlying reader will be considered as an EOF for
/// subsequent read attempts, as it would be incorrect to keep on trying
/// to read when the underlying reader has broken.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ReaderEofState {
    NotEof,
    Eof,
    IOError,
}

impl Reader<std::fs::File> {
    /// Create a new CSV reader with a default configuration for the given
    /// file path.
    ///
    /// If there was a problem opening the file, then an error is returned.
    pub fn from_path<P: AsRef<std::path::Path>>(
        path: P,
    ) -> Result<Reader<std::fs::File>> {
        Ok(Reader::from_reader(std::fs::File::open(path)?))
    }
}

impl<R: io::Read> Reader<R> {
    /// Create a new CSV reader given a builder and a source of underlying
    /// bytes.
    fn new(builder: &ReaderBuilder, rdr: R) -> Reader<R> {
        Reader {
            core: builder.builder.build(),
            rdr: io::BufReader::with_capacity(
                builder.capacity.max(1),
                rdr,
            ),
            state: ReaderState {
                cur_pos: Position::new(),
                eof: ReaderEofState::NotEof,
                owns_stream: false,
            },
        }
    }

    /// Create a new CSV reader with a default configuration for the given
    /// reader.
    ///
    /// The reader does not own `rdr`: it never closes it. To create a
    /// reader that closes its stream, use `Reader::scoped` or `enter`.
    pub fn from_reader(rdr: R) -> Reader<R> {
        ReaderBuilder::new().from_reader(rdr)
    }

    /// Read a single row into the given `Row`, reusing its allocation.
    ///
    /// Returns `false` once the end of the input has been reached, and
    /// keeps returning `false` after that.
    ///
    /// If the row is not valid UTF-8, an error is returned and the row is
    /// cleared. Use `read_byte_row` to read rows that aren't UTF-8.
    ///
    /// # Example
    ///
    /// ```
    /// use rowcsv::{Reader, Row};
    ///
    /// # fn example() -> rowcsv::Result<()> {
    /// let mut rdr = Reader::from_reader("a,b\n\nc".as_bytes());
    /// let mut row = Row::new();
    ///
    /// assert!(rdr.read_row(&mut row)?);
    /// assert_eq!(row, vec!["a", "b"]);
    /// // An empty line is a row with one empty field.
    /// assert!(rdr.read_row(&mut row)?);
    /// assert_eq!(row, vec![""]);
    /// assert!(rdr.read_row(&mut row)?);
    /// assert_eq!(row, vec!["c"]);
    /// assert!(!rdr.read_row(&mut row)?);
    /// # Ok(()) }
    /// # example().unwrap();
    /// ```
    pub fn read_row(&mut self, row: &mut Row) -> Result<bool> {
        let pos = self.state.cur_pos.clone();
        let byte_row = row.as_byte_row_mut();
        let read_res = self.read_byte_row(byte_row);
        let utf8_res = match byte_row.validate() {
            Ok(()) => Ok(()),
            Err(err) => {
                // If this row isn't valid UTF-8, then completely wipe it.
                byte_row.clear();
                Err(err)
            }
        };
        match (read_res, utf8_res) {
            (Err(err), _) => Err(err),
            (Ok(_), Err(err)) => Err(Error::Utf8 { pos: Some(pos), err }),
            (Ok(more), Ok(())) => Ok(more),
        }
    }

    /// Read a single row into the given `ByteRow`, reusing its allocation.
    ///
    /// Returns `false` once the end of the input has been reached, and
    /// keeps returning `false` after that.
    ///
    /// # Example
    ///
    /// ```
    /// use rowcsv::{ByteRow, Reader};
    ///
    /// # fn example() -> rowcsv::Result<()> {
    /// let mut rdr = Reader::from_reader(&b"caf\xE9,ok\r\n"[..]);
    /// let mut row = ByteRow::new();
    ///
    /// assert!(rdr.read_byte_row(&mut row)?);
    /// assert_eq!(row, vec![&b"caf\xE9"[..], &b"ok"[..]]);
    /// assert!(!rdr.read_byte_row(&mut row)?);
    /// # Ok(()) }
    /// # example().unwrap();
    /// ```
    pub fn read_byte_row(&mut self, row: &mut ByteRow) -> Result<bool> {
        let pos = self.state.cur_pos.clone();
        row.set_position(Some(pos.clone()));
        row.set_len(0);
        if self.state.eof != ReaderEofState::NotEof {
            return Ok(false);
        }
        let (mut outlen, mut endlen) = (0, 0);
        let mut malformed: Option<Malformed> = None;
        loop {
            let (res, nin, nout, nend) = {
                let input_res = self.rdr.fill_buf();
                if input_res.is_err() {
                    self.state.eof = ReaderEofState::IOError;
                }
                let input = input_res?;
                let (fields, ends) = row.as_parts();
                self.core.read_record(
                    input,
                    &mut fields[outlen..],
                    &mut ends[endlen..],
                )
            };
            self.rdr.consume(nin);
            let byte = self.state.cur_pos.byte();
            self.state
                .cur_pos
                .set_byte(byte + nin as u64)
                .set_line(self.core.line());
            outlen += nout;
            endlen += nend;
            match res {
                ReadRecordResult::InputEmpty => continue,
                ReadRecordResult::OutputFull => {
                    row.expand_fields();
                    continue;
                }
                ReadRecordResult::OutputEndsFull => {
                    row.expand_ends();
                    continue;
                }
                ReadRecordResult::Malformed(kind) => {
                    // Keep going so that the rest of the offending row is
                    // consumed. Only the first violation is reported.
                    malformed = malformed.or(Some(kind));
                    continue;
                }
                ReadRecordResult::Record => {
                    row.set_len(endlen);
                    self.state.next_row();
                    tracing::trace!(
                        row = pos.row(),
                        line = pos.line(),
                        fields = endlen,
                        "read row"
                    );
                    return match malformed {
                        None => Ok(true),
                        Some(kind) => {
                            row.set_len(0);
                            Err(Error::Malformed { pos, kind })
                        }
                    };
                }
                ReadRecordResult::End => {
                    self.state.eof = ReaderEofState::Eof;
                    tracing::trace!(rows = pos.row(), "reached end of input");
                    return match malformed {
                        None => Ok(false),
                        Some(kind) => {
                            self.state.next_row();
                            Err(Error::Malformed { pos, kind })
                        }
                    };
                }
            }
        }
    }

    /// Read the next row.
    ///
    /// Returns `None` once the end of the input has been reached, and keeps
    /// returning `None` after that.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        let mut row = Row::new();
        if self.read_row(&mut row)? {
            Ok(Some(row))
        } else {
            Ok(None)
        }
    }

    /// Return the current position of this CSV reader.
    ///
    /// The byte offset in the position returned can be used to `seek` the
    /// underlying stream to the start of the next row.
    ///
    /// # Example
    ///
    /// ```
    /// use rowcsv::Reader;
    ///
    /// # fn example() -> rowcsv::Result<()> {
    /// let mut rdr = Reader::from_reader("\"a\nb\",c\nd\n".as_bytes());
    /// rdr.next_row()?;
    ///
    /// let pos = rdr.position();
    /// assert_eq!(pos.byte(), 8);
    /// assert_eq!(pos.line(), 3);
    /// assert_eq!(pos.row(), 1);
    /// # Ok(()) }
    /// # example().unwrap();
    /// ```
    #[inline]
    pub fn position(&self) -> &Position {
        &self.state.cur_pos
    }

    /// Returns true if and only if this reader has been exhausted.
    ///
    /// When this returns true, no more rows can be read from this reader.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.state.eof != ReaderEofState::NotEof
    }

    /// Returns true if and only if this reader closes its stream when it
    /// leaves a scope.
    #[inline]
    pub fn owns_stream(&self) -> bool {
        self.state.owns_stream
    }

    /// Returns a reference to the underlying reader.
    #[inline]
    pub fn get_ref(&self) -> &R {
        self.rdr.get_ref()
    }

    /// Returns a mutable reference to the underlying reader.
    ///
    /// Note that reading from the underlying stream directly skips over
    /// whatever this reader has buffered.
    #[inline]
    pub fn get_mut(&mut self) -> &mut R {
        self.rdr.get_mut()
    }

    /// Unwraps this CSV reader, returning the underlying reader.
    ///
    /// Note that any leftover data inside this reader's internal buffer is
    /// lost.
    #[inline]
    pub fn into_inner(self) -> R {
        self.rdr.into_inner()
    }
}

impl<R: io::Read + Close> Reader<R> {
    /// Create a new CSV reader with a default configuration that owns
    /// `rdr`, wrapped in a guard that closes `rdr` when the guard goes out
    /// of scope.
    pub fn scoped(rdr: R) -> Scoped<Reader<R>> {
        ReaderBuilder::new().scoped(rdr)
    }

    /// Take ownership of the stream and enter a scope.
    ///
    /// The returned guard derefs to this reader and closes the stream when
    /// it goes out of scope. A reader built without entering a scope never
    /// closes its stream.
    pub fn enter(mut self) -> Scoped<Reader<R>> {
        self.state.owns_stream = true;
        Scoped::new(self)
    }
}

impl<R: io::Read + Close> Scope for Reader<R> {
    fn exit(&mut self) -> Result<()> {
        if !self.state.owns_stream {
            return Ok(());
        }
        tracing::debug!(
            rows = self.state.cur_pos.row(),
            "closing reader stream"
        );
        self.rdr.get_mut().close()?;
        Ok(())
    }
}

impl<R: io::Read> Iterator for Reader<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Result<Row>> {
        match self.next_row() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

impl ReaderState {
    fn next_row(&mut self) {
        let row = self.cur_pos.row();
        self.cur_pos.set_row(row + 1);
    }
}
