/*!
`rowcsv-core` provides the two state machines behind `rowcsv`: a push based
row tokenizer and a quoting field serializer.

Neither performs any I/O or allocation. Callers hand in a buffer of input
bytes and a buffer to write into, and get back how much of each was used.
This makes it possible to drive them from any kind of stream, including
ones where a `\r\n` pair is split across two reads.

The dialect is fixed: fields are separated by `,` and quoted with `"`. A
quote inside a quoted field is escaped by doubling it.

# Example: reading

```
use rowcsv_core::{ReadRecordResult, Reader};

let data = "foo,\"bar,baz\"\nquux";
let mut rdr = Reader::new();
let (mut out, mut ends) = ([0; 64], [0; 8]);

let (res, nin, nout, nend) = rdr.read_record(data.as_bytes(), &mut out, &mut ends);
assert_eq!(res, ReadRecordResult::Record);
assert_eq!(&out[..nout], b"foobar,baz");
assert_eq!(&ends[..nend], &[3, 10]);

// The second record isn't terminated, so an empty input is needed to
// signal the end of the stream.
let (res, _, nout, _) = rdr.read_record(&data.as_bytes()[nin..], &mut out, &mut ends);
assert_eq!(res, ReadRecordResult::InputEmpty);
assert_eq!(&out[..nout], b"quux");
let (res, _, _, nend) = rdr.read_record(&[], &mut out, &mut ends);
assert_eq!(res, ReadRecordResult::Record);
assert_eq!(&ends[..nend], &[4]);
assert_eq!(rdr.read_record(&[], &mut out, &mut ends).0, ReadRecordResult::End);
```

# Example: writing

```
use rowcsv_core::{WriteResult, Writer};

let mut wtr = Writer::new();
let mut out = [0; 64];
let mut n = 0;

let (res, _, nout) = wtr.field(b"say \"hi\"", &mut out[n..]);
assert_eq!(res, WriteResult::InputEmpty);
n += nout;
n += wtr.delimiter(&mut out[n..]).1;
n += wtr.field(b"x", &mut out[n..]).2;
n += wtr.finish(&mut out[n..]).1;
assert_eq!(&out[..n], &b"\"say \"\"hi\"\"\",\"x\""[..]);
```
*/

#![deny(missing_docs)]
#![cfg_attr(not(test), no_std)]

pub use crate::reader::{
    Malformed, Quoting, ReadRecordResult, Reader, ReaderBuilder, Terminator,
};
pub use crate::writer::{WriteResult, Writer};

mod reader;
mod writer;
