use std::fmt;
use std::iter::FromIterator;
use std::ops::{self, Range};
use std::result;
use std::str;

use crate::byte_row::{ByteRow, ByteRowIter, Position};
use crate::error::FromUtf8Error;

/// A single CSV row stored as valid UTF-8 bytes.
///
/// A row is an ordered sequence of text fields. Order is significant,
/// duplicate and empty fields are preserved and rows of a single CSV stream
/// may have different lengths.
///
/// If you need to read CSV data that is not UTF-8, use a
/// [`ByteRow`](struct.ByteRow.html) instead.
#[derive(Clone, Eq)]
pub struct Row(ByteRow);

impl PartialEq for Row {
    fn eq(&self, other: &Row) -> bool {
        self.0.iter_eq(&other.0)
    }
}

impl<T: AsRef<[u8]>> PartialEq<Vec<T>> for Row {
    fn eq(&self, other: &Vec<T>) -> bool {
        self.0.iter_eq(other)
    }
}

impl<'a, T: AsRef<[u8]>> PartialEq<Vec<T>> for &'a Row {
    fn eq(&self, other: &Vec<T>) -> bool {
        self.0.iter_eq(other)
    }
}

impl<T: AsRef<[u8]>> PartialEq<[T]> for Row {
    fn eq(&self, other: &[T]) -> bool {
        self.0.iter_eq(other)
    }
}

impl<'a, T: AsRef<[u8]>> PartialEq<[T]> for &'a Row {
    fn eq(&self, other: &[T]) -> bool {
        self.0.iter_eq(other)
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.iter().collect();
        write!(f, "Row({:?})", fields)
    }
}

impl Default for Row {
    #[inline]
    fn default() -> Row {
        Row::new()
    }
}

impl Row {
    /// Create a new empty `Row`.
    ///
    /// # Example
    ///
    /// ```
    /// use rowcsv::Row;
    ///
    /// let row = Row::new();
    /// assert_eq!(row.len(), 0);
    /// ```
    #[inline]
    pub fn new() -> Row {
        Row(ByteRow::new())
    }

    /// Create a new empty `Row` with the given capacity.
    ///
    /// `buffer` refers to the capacity of the buffer used to store the
    /// actual row contents. `fields` refers to the number of fields one
    /// might expect to store.
    #[inline]
    pub fn with_capacity(buffer: usize, fields: usize) -> Row {
        Row(ByteRow::with_capacity(buffer, fields))
    }

    /// Create a new `Row` from a `ByteRow`.
    ///
    /// Note that this does UTF-8 validation. If the given `ByteRow` does
    /// not contain valid UTF-8, then this returns an error. The error
    /// includes the UTF-8 error and the original `ByteRow`.
    ///
    /// # Example
    ///
    /// ```
    /// use rowcsv::{ByteRow, Row};
    ///
    /// let byte_row = ByteRow::from(vec!["a", "b", "c"]);
    /// let row = Row::from_byte_row(byte_row).unwrap();
    /// assert_eq!(row, vec!["a", "b", "c"]);
    ///
    /// let byte_row = ByteRow::from(vec![&b"quux"[..], &b"foo\xFFbar"[..]]);
    /// let err = Row::from_byte_row(byte_row).unwrap_err();
    /// assert_eq!(err.utf8_error().field(), 1);
    /// assert_eq!(err.utf8_error().valid_up_to(), 3);
    /// ```
    #[inline]
    pub fn from_byte_row(
        row: ByteRow,
    ) -> result::Result<Row, FromUtf8Error> {
        match row.validate() {
            Ok(()) => Ok(Row(row)),
            Err(err) => Err(FromUtf8Error::new(row, err)),
        }
    }

    /// Lossily create a new `Row` from a `ByteRow`.
    ///
    /// Invalid UTF-8 sequences are replaced with the Unicode replacement
    /// character `U+FFFD`.
    #[inline]
    pub fn from_byte_row_lossy(row: ByteRow) -> Row {
        if let Ok(()) = row.validate() {
            return Row(row);
        }
        let mut str_row = Row::with_capacity(row.as_slice().len(), row.len());
        for field in &row {
            str_row.push_field(&String::from_utf8_lossy(field));
        }
        str_row.set_position(row.position().cloned());
        str_row
    }

    /// Returns an iterator over all fields in this row.
    #[inline]
    pub fn iter(&self) -> RowIter<'_> {
        self.into_iter()
    }

    /// Return the field at index `i`.
    ///
    /// If no field at index `i` exists, then this returns `None`.
    ///
    /// # Example
    ///
    /// ```
    /// use rowcsv::Row;
    ///
    /// let row = Row::from(vec!["a", "b", "c"]);
    /// assert_eq!(row.get(1), Some("b"));
    /// assert_eq!(row.get(3), None);
    /// ```
    #[inline]
    pub fn get(&self, i: usize) -> Option<&str> {
        self.0.get(i).map(|bytes| {
            // This is safe because every `Row` holds a valid UTF-8 buffer
            // and each field was validated on its own.
            unsafe { str::from_utf8_unchecked(bytes) }
        })
    }

    /// Returns true if and only if this row is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of fields in this row.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Clear this row so that it has zero fields.
    ///
    /// Note that it is not necessary to clear the row to reuse it with
    /// the CSV reader.
    #[inline]
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Add a new field to this row.
    ///
    /// # Example
    ///
    /// ```
    /// use rowcsv::Row;
    ///
    /// let mut row = Row::new();
    /// row.push_field("foo");
    /// row.push_field("");
    /// assert_eq!(row, vec!["foo", ""]);
    /// ```
    #[inline]
    pub fn push_field(&mut self, field: &str) {
        self.0.push_field(field.as_bytes());
    }

    /// Return the position of this row, if available.
    #[inline]
    pub fn position(&self) -> Option<&Position> {
        self.0.position()
    }

    /// Set the position of this row.
    #[inline]
    pub fn set_position(&mut self, pos: Option<Position>) {
        self.0.set_position(pos);
    }

    /// Return the start and end position of a field in this row.
    #[inline]
    pub fn range(&self, i: usize) -> Option<Range<usize>> {
        self.0.range(i)
    }

    /// Return the entire row as a single string. The boundaries of each
    /// field can be determined via the `range` method.
    #[inline]
    pub fn as_slice(&self) -> &str {
        // See Row::get for the safety argument.
        unsafe { str::from_utf8_unchecked(self.0.as_slice()) }
    }

    /// Return a reference to this row's raw `ByteRow`.
    #[inline]
    pub fn as_byte_row(&self) -> &ByteRow {
        &self.0
    }

    /// Convert this `Row` into a `ByteRow`.
    #[inline]
    pub fn into_byte_row(self) -> ByteRow {
        self.0
    }

    /// Collect the fields of this row into owned strings.
    #[inline]
    pub fn to_vec(&self) -> Vec<String> {
        self.iter().map(|field| field.to_string()).collect()
    }

    /// Borrow the raw row for the reader to fill.
    ///
    /// The caller must validate the row (or clear it) before it is handed
    /// back out, since every other method assumes valid UTF-8.
    #[inline]
    pub(crate) fn as_byte_row_mut(&mut self) -> &mut ByteRow {
        &mut self.0
    }
}

impl ops::Index<usize> for Row {
    type Output = str;
    #[inline]
    fn index(&self, i: usize) -> &str {
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

impl<T: AsRef<str>> From<Vec<T>> for Row {
    #[inline]
    fn from(xs: Vec<T>) -> Row {
        Row::from_iter(xs.into_iter())
    }
}

impl<'a, T: AsRef<str>> From<&'a [T]> for Row {
    #[inline]
    fn from(xs: &'a [T]) -> Row {
        Row::from_iter(xs)
    }
}

impl<T: AsRef<str>> FromIterator<T> for Row {
    #[inline]
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Row {
        let mut row = Row::new();
        row.extend(iter);
        row
    }
}

impl<T: AsRef<str>> Extend<T> for Row {
    #[inline]
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for x in iter {
            self.push_field(x.as_ref());
        }
    }
}

impl<'a> IntoIterator for &'a Row {
    type IntoIter = RowIter<'a>;
    type Item = &'a str;

    #[inline]
    fn into_iter(self) -> RowIter<'a> {
        RowIter { it: self.0.iter() }
    }
}

/// An iterator over the fields in a row.
///
/// The `'r` lifetime variable refers to the lifetime of the `Row` that is
/// being iterated over.
#[derive(Clone)]
pub struct RowIter<'r> {
    it: ByteRowIter<'r>,
}

impl<'r> Iterator for RowIter<'r> {
    type Item = &'r str;

    #[inline]
    fn next(&mut self) -> Option<&'r str> {
        self.it.next().map(|bytes| {
            // See Row::get for the safety argument.
            unsafe { str::from_utf8_unchecked(bytes) }
        })
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }

    #[inline]
    fn count(self) -> usize {
        self.it.len()
    }
}

impl<'r> DoubleEndedIterator for RowIter<'r> {
    #[inline]
    fn next_back(&mut self) -> Option<&'r str> {
        self.it.next_back().map(|bytes| {
            // See Row::get for the safety argument.
            unsafe { str::from_utf8_unchecked(bytes) }
        })
    }
}
