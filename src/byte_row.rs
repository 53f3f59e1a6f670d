use std::cmp;
use std::fmt;
use std::iter::FromIterator;
use std::ops::{self, Range};
use std::result;

use bstr::{BString, ByteSlice};

use crate::error::Utf8Error;
use crate::row::Row;

/// A single CSV row stored as raw bytes.
///
/// A byte row permits reading or writing CSV rows that are not UTF-8.
/// In general, you should only use this when you know you need it. A
/// [`Row`](struct.Row.html) is usually more convenient.
///
/// All fields are stored in one contiguous buffer, followed by the end
/// offset of each field.
#[derive(Clone, Eq)]
pub struct ByteRow {
    /// All fields in this row, stored contiguously.
    fields: Vec<u8>,
    /// The number of and location of each field in this row.
    bounds: Bounds,
    /// The position of this row, if it was read from a stream.
    pos: Option<Position>,
}

impl PartialEq for ByteRow {
    fn eq(&self, other: &ByteRow) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter().zip(other.iter()).all(|e| e.0 == e.1)
    }
}

impl<T: AsRef<[u8]>> PartialEq<Vec<T>> for ByteRow {
    fn eq(&self, other: &Vec<T>) -> bool {
        self.iter_eq(other)
    }
}

impl<'a, T: AsRef<[u8]>> PartialEq<Vec<T>> for &'a ByteRow {
    fn eq(&self, other: &Vec<T>) -> bool {
        self.iter_eq(other)
    }
}

impl<T: AsRef<[u8]>> PartialEq<[T]> for ByteRow {
    fn eq(&self, other: &[T]) -> bool {
        self.iter_eq(other)
    }
}

impl<'a, T: AsRef<[u8]>> PartialEq<[T]> for &'a ByteRow {
    fn eq(&self, other: &[T]) -> bool {
        self.iter_eq(other)
    }
}

impl fmt::Debug for ByteRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields = vec![];
        for field in self {
            fields.push(BString::from(field.to_vec()));
        }
        write!(f, "ByteRow({:?})", fields)
    }
}

impl Default for ByteRow {
    #[inline]
    fn default() -> ByteRow {
        ByteRow::new()
    }
}

impl ByteRow {
    /// Create a new empty `ByteRow`.
    ///
    /// Note that you may find the `ByteRow::from` constructor more
    /// convenient, which is provided by an impl on the `From` trait.
    ///
    /// # Example: create an empty row
    ///
    /// ```
    /// use rowcsv::ByteRow;
    ///
    /// let row = ByteRow::new();
    /// assert_eq!(row.len(), 0);
    /// ```
    ///
    /// # Example: initialize a row from a `Vec`
    ///
    /// ```
    /// use rowcsv::ByteRow;
    ///
    /// let row = ByteRow::from(vec!["a", "b", "c"]);
    /// assert_eq!(row.len(), 3);
    /// ```
    #[inline]
    pub fn new() -> ByteRow {
        ByteRow::with_capacity(0, 0)
    }

    /// Create a new empty `ByteRow` with the given capacity settings.
    ///
    /// `buffer` refers to the capacity of the buffer used to store the
    /// actual row contents. `fields` refers to the number of fields one
    /// might expect to store.
    #[inline]
    pub fn with_capacity(buffer: usize, fields: usize) -> ByteRow {
        ByteRow {
            fields: vec![0; buffer],
            bounds: Bounds::with_capacity(fields),
            pos: None,
        }
    }

    /// Returns an iterator over all fields in this row.
    ///
    /// # Example
    ///
    /// ```
    /// use rowcsv::ByteRow;
    ///
    /// let row = ByteRow::from(vec!["a", "b", "c"]);
    /// for field in row.iter() {
    ///     assert!(field == b"a" || field == b"b" || field == b"c");
    /// }
    /// ```
    #[inline]
    pub fn iter(&self) -> ByteRowIter<'_> {
        self.into_iter()
    }

    /// Return the field at index `i`.
    ///
    /// If no field at index `i` exists, then this returns `None`.
    ///
    /// # Example
    ///
    /// ```
    /// use rowcsv::ByteRow;
    ///
    /// let row = ByteRow::from(vec!["a", "b", "c"]);
    /// assert_eq!(row.get(1), Some(&b"b"[..]));
    /// assert_eq!(row.get(3), None);
    /// ```
    #[inline]
    pub fn get(&self, i: usize) -> Option<&[u8]> {
        self.bounds.get(i).map(|range| &self.fields[range])
    }

    /// Returns true if and only if this row is empty.
    ///
    /// A row read from a stream is never empty: an empty line is a row
    /// with one empty field.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of fields in this row.
    #[inline]
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    /// Clear this row so that it has zero fields.
    ///
    /// This also clears the position associated with this row.
    ///
    /// Note that it is not necessary to clear the row to reuse it with
    /// the CSV reader.
    #[inline]
    pub fn clear(&mut self) {
        self.bounds.clear();
        self.pos = None;
    }

    /// Add a new field to this row.
    ///
    /// # Example
    ///
    /// ```
    /// use rowcsv::ByteRow;
    ///
    /// let mut row = ByteRow::new();
    /// row.push_field(b"foo");
    /// row.push_field(b"");
    /// assert_eq!(row, vec!["foo", ""]);
    /// ```
    #[inline]
    pub fn push_field(&mut self, field: &[u8]) {
        let (s, e) = (self.bounds.end(), self.bounds.end() + field.len());
        while e > self.fields.len() {
            self.expand_fields();
        }
        self.fields[s..e].copy_from_slice(field);
        self.bounds.add(e);
    }

    /// Return the position of this row, if available.
    #[inline]
    pub fn position(&self) -> Option<&Position> {
        self.pos.as_ref()
    }

    /// Set the position of this row.
    #[inline]
    pub fn set_position(&mut self, pos: Option<Position>) {
        self.pos = pos;
    }

    /// Return the start and end position of a field in this row.
    ///
    /// If no such field exists at the given index, then return `None`.
    #[inline]
    pub fn range(&self, i: usize) -> Option<Range<usize>> {
        self.bounds.get(i)
    }

    /// Return the entire row as a single byte string. The slice returned
    /// stores all fields contiguously. The boundaries of each field can be
    /// determined via the `range` method.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.fields[..self.bounds.end()]
    }

    /// Retrieve the underlying parts of a byte row.
    #[inline]
    pub(crate) fn as_parts(&mut self) -> (&mut Vec<u8>, &mut Vec<usize>) {
        (&mut self.fields, &mut self.bounds.ends)
    }

    /// Set the number of fields in the given row.
    #[inline]
    pub(crate) fn set_len(&mut self, len: usize) {
        self.bounds.len = len;
    }

    /// Expand the capacity for storing fields.
    #[inline]
    pub(crate) fn expand_fields(&mut self) {
        let new_len = self.fields.len().saturating_mul(2);
        self.fields.resize(cmp::max(4, new_len), 0);
    }

    /// Expand the capacity for storing field ending positions.
    #[inline]
    pub(crate) fn expand_ends(&mut self) {
        self.bounds.expand();
    }

    /// Validate the given row as UTF-8.
    ///
    /// If it's not UTF-8, return an error.
    #[inline]
    pub(crate) fn validate(&self) -> result::Result<(), Utf8Error> {
        // If the entire buffer is ASCII, then we have nothing to fear.
        if self.fields[..self.bounds.end()].is_ascii() {
            return Ok(());
        }
        // Otherwise, we must check each field individually to ensure that
        // it's valid UTF-8.
        for (i, field) in self.iter().enumerate() {
            if let Err(err) = field.to_str() {
                return Err(Utf8Error::new(i, err.valid_up_to()));
            }
        }
        Ok(())
    }

    /// Compare the given byte row with the iterator of fields for
    /// equality.
    pub(crate) fn iter_eq<I, T>(&self, other: I) -> bool
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut it_row = self.iter();
        let mut it_other = other.into_iter();
        loop {
            match (it_row.next(), it_other.next()) {
                (None, None) => return true,
                (None, Some(_)) | (Some(_), None) => return false,
                (Some(x), Some(y)) => {
                    if x != y.as_ref() {
                        return false;
                    }
                }
            }
        }
    }
}

/// A position in CSV data.
///
/// A position is used to report errors in CSV data. All positions include
/// the byte offset, line number and row index.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Position {
    byte: u64,
    line: u64,
    row: u64,
}

impl Default for Position {
    fn default() -> Position {
        Position::new()
    }
}

impl Position {
    /// Returns a new position initialized to the start value.
    #[inline]
    pub fn new() -> Position {
        Position { byte: 0, line: 1, row: 0 }
    }

    /// The byte offset, starting at `0`, of this position.
    #[inline]
    pub fn byte(&self) -> u64 {
        self.byte
    }

    /// The line number, starting at `1`, of this position.
    ///
    /// Lines are counted by `\n`, so a quoted field spanning several lines
    /// advances the line number of the rows after it.
    #[inline]
    pub fn line(&self) -> u64 {
        self.line
    }

    /// The row index, starting with the first row at `0`.
    #[inline]
    pub fn row(&self) -> u64 {
        self.row
    }

    /// Set the byte offset of this position.
    #[inline]
    pub fn set_byte(&mut self, byte: u64) -> &mut Position {
        self.byte = byte;
        self
    }

    /// Set the line number of this position.
    ///
    /// If the line number is less than `1`, then this method panics.
    #[inline]
    pub fn set_line(&mut self, line: u64) -> &mut Position {
        assert!(line > 0);
        self.line = line;
        self
    }

    /// Set the row index of this position.
    #[inline]
    pub fn set_row(&mut self, row: u64) -> &mut Position {
        self.row = row;
        self
    }
}

/// The bounds of fields in a single row.
#[derive(Clone, Debug, Eq, PartialEq)]
struct Bounds {
    /// The ending index of each field.
    ends: Vec<usize>,
    /// The number of fields in this row.
    ///
    /// `ends.len()` is a capacity, not a count: the core tokenizer writes
    /// into the whole vector.
    len: usize,
}

impl Default for Bounds {
    #[inline]
    fn default() -> Bounds {
        Bounds::with_capacity(0)
    }
}

impl Bounds {
    /// Create a new set of bounds with the given capacity for storing the
    /// ends of fields.
    #[inline]
    fn with_capacity(capacity: usize) -> Bounds {
        Bounds { ends: vec![0; capacity], len: 0 }
    }

    /// Returns the bounds of field `i`.
    #[inline]
    fn get(&self, i: usize) -> Option<Range<usize>> {
        if i >= self.len {
            return None;
        }
        let end = match self.ends.get(i) {
            None => return None,
            Some(&end) => end,
        };
        let start = match i.checked_sub(1).and_then(|i| self.ends.get(i)) {
            None => 0,
            Some(&start) => start,
        };
        Some(ops::Range { start, end })
    }

    /// Returns a slice of ending positions of all fields.
    #[inline]
    fn ends(&self) -> &[usize] {
        &self.ends[..self.len]
    }

    /// Return the last position of the last field.
    ///
    /// If there are no fields, this returns `0`.
    #[inline]
    fn end(&self) -> usize {
        self.ends().last().copied().unwrap_or(0)
    }

    /// Returns the number of fields in these bounds.
    #[inline]
    fn len(&self) -> usize {
        self.len
    }

    /// Expand the capacity for storing field ending positions.
    #[inline]
    fn expand(&mut self) {
        let new_len = self.ends.len().saturating_mul(2);
        self.ends.resize(cmp::max(4, new_len), 0);
    }

    /// Clear all field boundaries.
    #[inline]
    fn clear(&mut self) {
        self.len = 0;
    }

    /// Add a new field with the given ending position.
    #[inline]
    fn add(&mut self, pos: usize) {
        if self.len >= self.ends.len() {
            self.expand();
        }
        self.ends[self.len] = pos;
        self.len += 1;
    }
}

impl ops::Index<usize> for ByteRow {
    type Output = [u8];
    #[inline]
    fn index(&self, i: usize) -> &[u8] {
        match self.get(i) {
            Some(field) => field,
            None => panic!(
                "field index {} out of bounds for row of length {}",
                i,
                self.len()
            ),
        }
    }
}

impl From<Row> for ByteRow {
    #[inline]
    fn from(row: Row) -> ByteRow {
        row.into_byte_row()
    }
}

impl<T: AsRef<[u8]>> From<Vec<T>> for ByteRow {
    #[inline]
    fn from(xs: Vec<T>) -> ByteRow {
        ByteRow::from_iter(&xs)
    }
}

impl<'a, T: AsRef<[u8]>> From<&'a [T]> for ByteRow {
    #[inline]
    fn from(xs: &'a [T]) -> ByteRow {
        ByteRow::from_iter(xs)
    }
}

impl<T: AsRef<[u8]>> FromIterator<T> for ByteRow {
    #[inline]
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> ByteRow {
        let mut row = ByteRow::new();
        row.extend(iter);
        row
    }
}

impl<T: AsRef<[u8]>> Extend<T> for ByteRow {
    #[inline]
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for x in iter {
            self.push_field(x.as_ref());
        }
    }
}

/// A double-ended iterator over the fields in a byte row.
///
/// The `'r` lifetime variable refers to the lifetime of the `ByteRow` that
/// is being iterated over.
#[derive(Clone)]
pub struct ByteRowIter<'r> {
    /// The row we are iterating over.
    r: &'r ByteRow,
    /// The starting index of the previous field. (For reverse iteration.)
    last_start: usize,
    /// The ending index of the previous field. (For forward iteration.)
    last_end: usize,
    /// The index of forward iteration.
    i_forward: usize,
    /// The index of reverse iteration.
    i_reverse: usize,
}

impl<'r> IntoIterator for &'r ByteRow {
    type IntoIter = ByteRowIter<'r>;
    type Item = &'r [u8];

    #[inline]
    fn into_iter(self) -> ByteRowIter<'r> {
        ByteRowIter {
            r: self,
            last_start: self.as_slice().len(),
            last_end: 0,
            i_forward: 0,
            i_reverse: self.len(),
        }
    }
}

impl<'r> ExactSizeIterator for ByteRowIter<'r> {}

impl<'r> Iterator for ByteRowIter<'r> {
    type Item = &'r [u8];

    #[inline]
    fn next(&mut self) -> Option<&'r [u8]> {
        if self.i_forward == self.i_reverse {
            None
        } else {
            let start = self.last_end;
            let end = self.r.bounds.ends()[self.i_forward];
            self.i_forward += 1;
            self.last_end = end;
            Some(&self.r.fields[start..end])
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let x = self.i_reverse - self.i_forward;
        (x, Some(x))
    }

    #[inline]
    fn count(self) -> usize {
        self.len()
    }
}

impl<'r> DoubleEndedIterator for ByteRowIter<'r> {
    #[inline]
    fn next_back(&mut self) -> Option<&'r [u8]> {
        if self.i_forward == self.i_reverse {
            None
        } else {
            self.i_reverse -= 1;
            let start = self
                .i_reverse
                .checked_sub(1)
                .map(|i| self.r.bounds.ends()[i])
                .unwrap_or(0);
            let end = self.last_start;
            self.last_start = start;
            Some(&self.r.fields[start..end])
        }
    }
}
