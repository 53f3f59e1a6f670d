/*!
`rowcsv` reads and writes rows of CSV data.

A [`Reader`](struct.Reader.html) turns a byte stream into rows of text
fields. It accepts `\r`, `\n` and `\r\n` as row terminators by default,
keeps line endings inside quoted fields intact and never needs to see the
whole input at once. A [`Writer`](struct.Writer.html) turns rows of cell
values back into CSV, quoting every field, so that reading its output gives
back exactly the rows that were written.

Both can be entered as a [`Scoped`](struct.Scoped.html) guard, which flushes
and closes the underlying stream when the guard goes out of scope.

# Example

```
use rowcsv::{Reader, Writer};

# fn example() -> rowcsv::Result<()> {
let mut wtr = Writer::from_writer(vec![]);
wtr.write_row(&["name", "quote"])?;
wtr.write_row(&["Ada", "say \"hi\",\nthen leave"])?;
let data = wtr.into_inner()?;

let rows = Reader::from_reader(&data[..])
    .collect::<rowcsv::Result<Vec<_>>>()?;
assert_eq!(rows, vec![
    vec!["name", "quote"],
    vec!["Ada", "say \"hi\",\nthen leave"],
]);
# Ok(()) }
# example().unwrap();
```
*/

#![deny(missing_docs)]

pub use rowcsv_core::{Malformed, Quoting, Terminator};

pub use crate::byte_row::{ByteRow, ByteRowIter, Position};
pub use crate::error::{
    Error, FromUtf8Error, IntoInnerError, Result, Utf8Error,
};
pub use crate::newline::UniversalNewlines;
pub use crate::reader::{Reader, ReaderBuilder};
pub use crate::row::{Row, RowIter};
pub use crate::scope::{Close, Scope, Scoped};
pub use crate::writer::{Writer, WriterBuilder};

mod byte_row;
mod error;
mod newline;
mod reader;
mod row;
mod scope;
mod serializer;
mod writer;
