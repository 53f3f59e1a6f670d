use memchr::memchr;

/// The result of writing CSV data.
///
/// A value of this type is returned from every write operation. It
/// indicates whether all of the input was consumed or whether the output
/// buffer ran out of room first.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WriteResult {
    /// This result occurs when all of the caller's input was successfully
    /// written.
    InputEmpty,
    /// This result occurs when the caller's output buffer was too small to
    /// contain all of the input. The caller should flush the output buffer
    /// and call the same method again with the unconsumed input.
    OutputFull,
}

/// A quoting field serializer for CSV data.
///
/// Every field is wrapped in quotes and every quote inside a field is
/// doubled, so any field survives a round trip through a `Reader`
/// regardless of what it contains.
///
/// The writer does not write record terminators. The caller writes
/// whatever line ending it wants after calling `finish`.
#[derive(Clone, Debug, Default)]
pub struct Writer {
    state: WriterState,
}

#[derive(Clone, Debug, Default)]
struct WriterState {
    /// Whether the opening quote of the current field has been written.
    in_field: bool,
    /// Whether anything at all has been written for the current record.
    in_record: bool,
}

impl Writer {
    /// Creates a new CSV writer.
    pub fn new() -> Writer {
        Writer::default()
    }

    /// Write a field to the output buffer.
    ///
    /// The opening quote is written the first time this is called for a
    /// field. A field may be written in pieces by calling this method
    /// repeatedly; it is closed by `delimiter` or `finish`.
    ///
    /// The number of bytes consumed from `input` and written to `output`
    /// are returned. If `OutputFull` is returned, the caller should call
    /// this again with the rest of `input` once room has been made.
    pub fn field(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> (WriteResult, usize, usize) {
        let (mut nin, mut nout) = (0, 0);
        if !self.state.in_field {
            if output.is_empty() {
                return (WriteResult::OutputFull, 0, 0);
            }
            output[0] = b'"';
            nout += 1;
            self.state.in_field = true;
            self.state.in_record = true;
        }
        loop {
            let avail = output.len() - nout;
            let rest = &input[nin..];
            let n = core::cmp::min(avail, rest.len());
            let run = memchr(b'"', &rest[..n]).unwrap_or(n);
            output[nout..nout + run].copy_from_slice(&rest[..run]);
            nin += run;
            nout += run;
            if nin >= input.len() {
                return (WriteResult::InputEmpty, nin, nout);
            }
            if input[nin] != b'"' || output.len() - nout < 2 {
                return (WriteResult::OutputFull, nin, nout);
            }
            output[nout] = b'"';
            output[nout + 1] = b'"';
            nin += 1;
            nout += 2;
        }
    }

    /// Close the current field and write a delimiter.
    ///
    /// If no field has been started since the last delimiter, an empty
    /// quoted field is written first.
    ///
    /// Nothing is written unless the output has room for all of it.
    pub fn delimiter(&mut self, output: &mut [u8]) -> (WriteResult, usize) {
        let (res, nout) = if self.state.in_field {
            write(b"\",", output)
        } else {
            write(b"\"\",", output)
        };
        if nout > 0 {
            self.state.in_field = false;
            self.state.in_record = true;
        }
        (res, nout)
    }

    /// Close the last field of the current record.
    ///
    /// A record with no fields at all writes nothing. Once this returns
    /// `InputEmpty`, the writer is ready for the next record.
    pub fn finish(&mut self, output: &mut [u8]) -> (WriteResult, usize) {
        let (res, nout) = if self.state.in_field {
            write(b"\"", output)
        } else if self.state.in_record {
            write(b"\"\"", output)
        } else {
            (WriteResult::InputEmpty, 0)
        };
        if res == WriteResult::InputEmpty {
            self.state = WriterState::default();
        }
        (res, nout)
    }
}

/// Copy all of `data` to `output`, or nothing at all if it doesn't fit.
fn write(data: &[u8], output: &mut [u8]) -> (WriteResult, usize) {
    if data.len() > output.len() {
        (WriteResult::OutputFull, 0)
    } else {
        output[..data.len()].copy_from_slice(data);
        (WriteResult::InputEmpty, data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::{WriteResult, Writer};

    fn b(s: &str) -> &[u8] {
        s.as_bytes()
    }

    fn s(b: &[u8]) -> &str {
        ::core::str::from_utf8(b).unwrap()
    }

    macro_rules! assert_field {
        (
            $wtr:expr, $inp:expr, $out:expr,
            $expect_in:expr, $expect_out:expr,
            $expect_res:expr, $expect_data:expr
        ) => {{
            let (res, i, o) = $wtr.field($inp, $out);
            assert_eq!($expect_res, res, "result");
            assert_eq!($expect_in, i, "input");
            assert_eq!($expect_out, o, "output");
            assert_eq!($expect_data, s(&$out[..o]), "data");
        }};
    }

    macro_rules! assert_write {
        (
            $wtr:expr, $which:ident, $out:expr,
            $expect_out:expr, $expect_res:expr, $expect_data:expr
        ) => {{
            let (res, o) = $wtr.$which($out);
            assert_eq!($expect_res, res, "result");
            assert_eq!($expect_out, o, "output");
            assert_eq!($expect_data, s(&$out[..o]), "data");
        }};
    }

    /// Write a whole record with plenty of room.
    fn record(fields: &[&str]) -> String {
        let mut wtr = Writer::new();
        let mut out = [0; 1024];
        let mut n = 0;
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                n += wtr.delimiter(&mut out[n..]).1;
            }
            let (res, nin, nout) = wtr.field(b(field), &mut out[n..]);
            assert_eq!(WriteResult::InputEmpty, res);
            assert_eq!(field.len(), nin);
            n += nout;
        }
        n += wtr.finish(&mut out[n..]).1;
        s(&out[..n]).to_string()
    }

    #[test]
    fn quotes_every_field() {
        assert_eq!(record(&["abc", "def"]), "\"abc\",\"def\"");
        assert_eq!(record(&["a,b", "c\nd", "e\r\nf"]), "\"a,b\",\"c\nd\",\"e\r\nf\"");
    }

    #[test]
    fn doubles_quotes() {
        assert_eq!(record(&["a\"b"]), "\"a\"\"b\"");
        assert_eq!(record(&["\""]), "\"\"\"\"");
        assert_eq!(record(&["\"\"x\""]), "\"\"\"\"\"x\"\"\"");
    }

    #[test]
    fn empty_fields() {
        assert_eq!(record(&[""]), "\"\"");
        assert_eq!(record(&["", ""]), "\"\",\"\"");
        assert_eq!(record(&["a", ""]), "\"a\",\"\"");
        assert_eq!(record(&[]), "");
    }

    #[test]
    fn delimiter_without_field() {
        let mut wtr = Writer::new();
        let out = &mut [0; 10];
        assert_write!(wtr, delimiter, out, 3, WriteResult::InputEmpty, "\"\",");
        assert_write!(wtr, finish, out, 2, WriteResult::InputEmpty, "\"\"");
    }

    #[test]
    fn field_no_room_for_open_quote() {
        let mut wtr = Writer::new();
        assert_field!(wtr, b("abc"), &mut [0u8; 0], 0, 0, WriteResult::OutputFull, "");
        let out = &mut [0; 10];
        assert_field!(wtr, b("abc"), out, 3, 4, WriteResult::InputEmpty, "\"abc");
    }

    #[test]
    fn field_in_pieces() {
        let mut wtr = Writer::new();
        let out = &mut [0; 2];
        assert_field!(wtr, b("abc"), out, 1, 2, WriteResult::OutputFull, "\"a");
        assert_field!(wtr, b("bc"), out, 2, 2, WriteResult::InputEmpty, "bc");
        assert_write!(wtr, finish, out, 1, WriteResult::InputEmpty, "\"");
    }

    // A doubled quote is never split across two output buffers.
    #[test]
    fn field_escaped_quote_needs_two_bytes() {
        let mut wtr = Writer::new();
        let out = &mut [0; 2];
        assert_field!(wtr, b("a\"b"), out, 1, 2, WriteResult::OutputFull, "\"a");
        assert_field!(wtr, b("\"b"), &mut out[..1], 0, 0, WriteResult::OutputFull, "");
        assert_field!(wtr, b("\"b"), out, 1, 2, WriteResult::OutputFull, "\"\"");
        assert_field!(wtr, b("b"), out, 1, 1, WriteResult::InputEmpty, "b");
    }

    #[test]
    fn delimiter_and_finish_are_atomic() {
        let mut wtr = Writer::new();
        let out = &mut [0; 10];
        assert_field!(wtr, b("a"), out, 1, 2, WriteResult::InputEmpty, "\"a");
        assert_write!(wtr, delimiter, &mut out[..1], 0, WriteResult::OutputFull, "");
        assert_write!(wtr, delimiter, out, 2, WriteResult::InputEmpty, "\",");
        assert_field!(wtr, b("b"), out, 1, 2, WriteResult::InputEmpty, "\"b");
        assert_write!(wtr, finish, &mut [0u8; 0], 0, WriteResult::OutputFull, "");
        assert_write!(wtr, finish, out, 1, WriteResult::InputEmpty, "\"");
        // The writer is ready for the next record.
        assert_write!(wtr, finish, out, 0, WriteResult::InputEmpty, "");
    }
}
