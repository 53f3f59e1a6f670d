use std::fmt;
use std::fs::File;
use std::io;
use std::mem;
use std::path::Path;
use std::result;

use bstr::ByteSlice;
use rowcsv_core::{WriteResult, Writer as CoreWriter};
use serde::Serialize;

use crate::byte_row::ByteRow;
use crate::error::{Error, IntoInnerError, Result};
use crate::scope::{Close, Scope, Scoped};
use crate::serializer::serialize_cell;

/// Builds a CSV writer with various configuration knobs.
///
/// Fields are always quoted and always separated by `,`. Only the row
/// terminator and the size of the internal buffer can be changed.
#[derive(Debug)]
pub struct WriterBuilder {
    capacity: usize,
    terminator: Vec<u8>,
}

impl Default for WriterBuilder {
    fn default() -> WriterBuilder {
        WriterBuilder {
            capacity: 8 * (1 << 10),
            terminator: b"\r\n".to_vec(),
        }
    }
}

impl WriterBuilder {
    /// Create a new builder for configuring CSV writing.
    ///
    /// To convert a builder into a writer, call one of the methods starting
    /// with `from_` or `scoped`.
    ///
    /// # Example
    ///
    /// ```
    /// use rowcsv::WriterBuilder;
    ///
    /// # fn example() -> rowcsv::Result<()> {
    /// let mut wtr = WriterBuilder::new().from_writer(vec![]);
    /// wtr.write_row(&["a", "b\"c"])?;
    /// wtr.write_row(&[1, 2])?;
    ///
    /// let data = String::from_utf8(wtr.into_inner()?).unwrap();
    /// assert_eq!(data, "\"a\",\"b\"\"c\"\r\n\"1\",\"2\"\r\n");
    /// # Ok(()) }
    /// # example().unwrap();
    /// ```
    pub fn new() -> WriterBuilder {
        WriterBuilder::default()
    }

    /// Build a CSV writer from this configuration that writes data to `wtr`.
    ///
    /// Note that the CSV writer is buffered automatically, so you should
    /// not wrap `wtr` in a buffered writer like `io::BufWriter`.
    ///
    /// The writer does not own `wtr`: it flushes it but never closes it.
    pub fn from_writer<W: io::Write>(&self, wtr: W) -> Writer<W> {
        Writer::new(self, wtr)
    }

    /// Build a CSV writer from this configuration that owns `wtr`, wrapped
    /// in a guard that flushes and closes `wtr` when the guard goes out of
    /// scope.
    pub fn scoped<W: io::Write + Close>(&self, wtr: W) -> Scoped<Writer<W>> {
        self.from_writer(wtr).enter()
    }

    /// The string written after every row.
    ///
    /// The default is `"\r\n"`. Any string is accepted, including the
    /// empty string.
    ///
    /// # Example
    ///
    /// ```
    /// use rowcsv::WriterBuilder;
    ///
    /// # fn example() -> rowcsv::Result<()> {
    /// let mut wtr = WriterBuilder::new().terminator("\n").from_writer(vec![]);
    /// wtr.write_row(&["x"])?;
    /// wtr.write_row(&["y"])?;
    ///
    /// let data = String::from_utf8(wtr.into_inner()?).unwrap();
    /// assert_eq!(data, "\"x\"\n\"y\"\n");
    /// # Ok(()) }
    /// # example().unwrap();
    /// ```
    pub fn terminator(&mut self, term: &str) -> &mut WriterBuilder {
        self.terminator = term.as_bytes().to_vec();
        self
    }

    /// Set the capacity (in bytes) of the internal buffer used in the CSV
    /// writer.
    ///
    /// Capacities smaller than 4 bytes are rounded up to 4.
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut WriterBuilder {
        self.capacity = capacity;
        self
    }
}

/// A buffered CSV writer.
///
/// Every field is wrapped in quotes and every quote inside a field is
/// doubled. Rows may have any number of fields.
///
/// Output is buffered: nothing is guaranteed to reach the underlying stream
/// until `flush` is called, the writer leaves a scope or the writer is
/// dropped. Errors that happen while flushing on drop are ignored, so call
/// `flush` explicitly to observe them.
///
/// # Example
///
/// ```
/// use rowcsv::Writer;
///
/// # fn example() -> rowcsv::Result<()> {
/// let mut wtr = Writer::from_writer(vec![]);
/// wtr.write_rows(vec![vec!["abc", "def"], vec!["xyz"]])?;
///
/// let data = String::from_utf8(wtr.into_inner()?).unwrap();
/// assert_eq!(data, "\"abc\",\"def\"\r\n\"xyz\"\r\n");
/// # Ok(()) }
/// # example().unwrap();
/// ```
pub struct Writer<W: io::Write> {
    core: CoreWriter,
    wtr: Option<W>,
    buf: Buffer,
    state: WriterState,
    terminator: Vec<u8>,
    /// Scratch space for the text form of the cells of one row.
    cells: ByteRow,
}

#[derive(Debug)]
struct WriterState {
    /// Whether the underlying writer panicked while the buffer was being
    /// written to it. If so, the buffer must not be written again on drop.
    panicked: bool,
    /// Whether this writer closes its stream when leaving a scope.
    owns_stream: bool,
    /// The number of rows written so far.
    rows: u64,
}

/// A simple internal buffer for buffering writes.
///
/// We need this because the `BufWriter` in std doesn't appear to give us
/// convenient access to the underlying buffer for the core writer to fill.
#[derive(Debug)]
struct Buffer {
    /// The contents of the buffer.
    buf: Vec<u8>,
    /// The number of bytes written to the buffer.
    len: usize,
}

impl Writer<File> {
    /// Build a CSV writer with a default configuration that writes data to
    /// the given file path. The file is truncated if it already exists.
    ///
    /// If there was a problem opening the file, then an error is returned.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Writer<File>> {
        Ok(Writer::from_writer(File::create(path)?))
    }
}

impl<W: io::Write> Writer<W> {
    fn new(builder: &WriterBuilder, wtr: W) -> Writer<W> {
        Writer {
            core: CoreWriter::new(),
            wtr: Some(wtr),
            buf: Buffer { buf: vec![0; builder.capacity.max(4)], len: 0 },
            state: WriterState {
                panicked: false,
                owns_stream: false,
                rows: 0,
            },
            terminator: builder.terminator.clone(),
            cells: ByteRow::new(),
        }
    }

    /// Build a CSV writer with a default configuration that writes data to
    /// `wtr`.
    ///
    /// The writer does not own `wtr`: it flushes it but never closes it. To
    /// create a writer that closes its stream, use `Writer::scoped` or
    /// `enter`.
    pub fn from_writer(wtr: W) -> Writer<W> {
        WriterBuilder::new().from_writer(wtr)
    }

    /// Write a single row.
    ///
    /// Each cell is converted to text first: strings as they are, numbers
    /// and booleans in their usual form, and `None` as the empty string.
    /// If any cell cannot be converted, an `Error::ValueConversion` is
    /// returned and nothing of this row is written.
    ///
    /// A row without cells writes just the terminator.
    ///
    /// # Example
    ///
    /// ```
    /// use rowcsv::Writer;
    ///
    /// # fn example() -> rowcsv::Result<()> {
    /// let mut wtr = Writer::from_writer(vec![]);
    /// wtr.write_row(vec![Some(1.5), None])?;
    /// wtr.write_row(&["a\"b"])?;
    ///
    /// let data = String::from_utf8(wtr.into_inner()?).unwrap();
    /// assert_eq!(data, "\"1.5\",\"\"\r\n\"a\"\"b\"\r\n");
    /// # Ok(()) }
    /// # example().unwrap();
    /// ```
    pub fn write_row<I, T>(&mut self, row: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        let mut cells = mem::take(&mut self.cells);
        cells.clear();
        let res = self.write_cells(&mut cells, row);
        if res.is_err() {
            // A failed write may leave the core in the middle of a row.
            self.core = CoreWriter::new();
        }
        self.cells = cells;
        res
    }

    /// Write every row yielded by `rows`, in order.
    ///
    /// Writing stops at the first error. Rows written before the error stay
    /// written.
    pub fn write_rows<I, R, T>(&mut self, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = T>,
        T: Serialize,
    {
        for row in rows {
            self.write_row(row)?;
        }
        Ok(())
    }

    /// Flush the contents of the internal buffer to the underlying writer,
    /// and then flush the underlying writer itself.
    ///
    /// If there was a problem writing to the underlying writer, then an
    /// error is returned.
    pub fn flush(&mut self) -> io::Result<()> {
        self.flush_buf()?;
        if let Some(wtr) = self.wtr.as_mut() {
            wtr.flush()?;
        }
        tracing::debug!(rows = self.state.rows, "flushed writer");
        Ok(())
    }

    /// Returns true if and only if this writer closes its stream when it
    /// leaves a scope.
    #[inline]
    pub fn owns_stream(&self) -> bool {
        self.state.owns_stream
    }

    /// Returns a reference to the underlying writer.
    ///
    /// Bytes still held in the internal buffer are not visible through it.
    pub fn get_ref(&self) -> &W {
        self.wtr.as_ref().expect("stream is present until into_inner")
    }

    /// Returns a mutable reference to the underlying writer.
    ///
    /// Writing to the underlying writer directly interleaves with whatever
    /// this writer has buffered.
    pub fn get_mut(&mut self) -> &mut W {
        self.wtr.as_mut().expect("stream is present until into_inner")
    }

    /// Flush the internal buffer and return the underlying writer.
    ///
    /// If flushing fails, the error is returned together with this writer
    /// so that nothing buffered is lost.
    pub fn into_inner(
        mut self,
    ) -> result::Result<W, IntoInnerError<Writer<W>>> {
        match self.flush() {
            Ok(()) => Ok(self
                .wtr
                .take()
                .expect("stream is present until into_inner")),
            Err(err) => Err(IntoInnerError::new(self, err)),
        }
    }

    fn write_cells<I, T>(&mut self, cells: &mut ByteRow, row: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        for (field, value) in row.into_iter().enumerate() {
            serialize_cell(&value, cells)
                .map_err(|msg| Error::ValueConversion { field, msg })?;
        }
        for (i, field) in cells.iter().enumerate() {
            if i > 0 {
                self.write_delimiter()?;
            }
            self.write_field(field)?;
        }
        self.write_finish()?;
        self.write_terminator()?;
        self.state.rows += 1;
        tracing::trace!(
            row = self.state.rows - 1,
            fields = cells.len(),
            "wrote row"
        );
        Ok(())
    }

    fn write_field(&mut self, mut field: &[u8]) -> Result<()> {
        loop {
            let (res, nin, nout) = self.core.field(field, self.buf.writable());
            field = &field[nin..];
            self.buf.written(nout);
            match res {
                WriteResult::InputEmpty => return Ok(()),
                WriteResult::OutputFull => self.flush_buf()?,
            }
        }
    }

    fn write_delimiter(&mut self) -> Result<()> {
        loop {
            let (res, nout) = self.core.delimiter(self.buf.writable());
            self.buf.written(nout);
            match res {
                WriteResult::InputEmpty => return Ok(()),
                WriteResult::OutputFull => self.flush_buf()?,
            }
        }
    }

    fn write_finish(&mut self) -> Result<()> {
        loop {
            let (res, nout) = self.core.finish(self.buf.writable());
            self.buf.written(nout);
            match res {
                WriteResult::InputEmpty => return Ok(()),
                WriteResult::OutputFull => self.flush_buf()?,
            }
        }
    }

    fn write_terminator(&mut self) -> Result<()> {
        let mut start = 0;
        while start < self.terminator.len() {
            if self.buf.writable().is_empty() {
                self.flush_buf()?;
            }
            let out = self.buf.writable();
            let term = &self.terminator[start..];
            let n = out.len().min(term.len());
            out[..n].copy_from_slice(&term[..n]);
            self.buf.written(n);
            start += n;
        }
        Ok(())
    }

    /// Write the contents of the internal buffer to the underlying writer,
    /// without flushing the underlying writer.
    fn flush_buf(&mut self) -> io::Result<()> {
        let wtr = match self.wtr.as_mut() {
            Some(wtr) => wtr,
            None => return Ok(()),
        };
        self.state.panicked = true;
        let result = wtr.write_all(self.buf.readable());
        self.state.panicked = false;
        result?;
        self.buf.clear();
        Ok(())
    }
}

impl<W: io::Write + Close> Writer<W> {
    /// Build a CSV writer with a default configuration that owns `wtr`,
    /// wrapped in a guard that flushes and closes `wtr` when the guard goes
    /// out of scope.
    pub fn scoped(wtr: W) -> Scoped<Writer<W>> {
        WriterBuilder::new().scoped(wtr)
    }

    /// Take ownership of the stream and enter a scope.
    ///
    /// The returned guard derefs to this writer. When it goes out of scope
    /// the writer is flushed and its stream closed. A writer built without
    /// entering a scope only ever flushes its stream.
    pub fn enter(mut self) -> Scoped<Writer<W>> {
        self.state.owns_stream = true;
        Scoped::new(self)
    }
}

impl<W: io::Write + Close> Scope for Writer<W> {
    fn exit(&mut self) -> Result<()> {
        let flushed = self.flush();
        if !self.state.owns_stream {
            return Ok(flushed?);
        }
        tracing::debug!(rows = self.state.rows, "closing writer stream");
        // The stream is closed even if the flush failed. The first error
        // wins.
        let closed = match self.wtr.as_mut() {
            Some(wtr) => wtr.close(),
            None => Ok(()),
        };
        flushed?;
        Ok(closed?)
    }
}

impl<W: io::Write> Drop for Writer<W> {
    fn drop(&mut self) {
        if self.wtr.is_some() && !self.state.panicked {
            let _ = self.flush();
        }
    }
}

impl<W: io::Write + fmt::Debug> fmt::Debug for Writer<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer")
            .field("core", &self.core)
            .field("wtr", &self.wtr)
            .field("buf", &self.buf)
            .field("state", &self.state)
            .field("terminator", &self.terminator.as_bstr())
            .finish()
    }
}

impl Buffer {
    /// Returns a slice of the buffer's current contents.
    ///
    /// The slice returned may be empty.
    #[inline]
    fn readable(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Returns a mutable slice of the remaining space in this buffer.
    ///
    /// The slice returned may be empty.
    #[inline]
    fn writable(&mut self) -> &mut [u8] {
        &mut self.buf[self.len..]
    }

    /// Indicates that `n` bytes have been written to this buffer.
    #[inline]
    fn written(&mut self, n: usize) {
        self.len += n;
    }

    /// Clear the buffer.
    #[inline]
    fn clear(&mut self) {
        self.len = 0;
    }
}
