use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::{self, Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use rowcsv::{
    Close, Error, Malformed, Quoting, Reader, ReaderBuilder, Row,
    Terminator, UniversalNewlines, Writer, WriterBuilder,
};

/// A stream that remembers whether it was closed.
///
/// Reads come from `input`. Writes go straight to a shared buffer so that
/// the test can look at them after the stream has been moved away.
struct Tracked {
    input: io::Cursor<Vec<u8>>,
    output: Rc<RefCell<Vec<u8>>>,
    closed: Rc<Cell<bool>>,
}

impl Tracked {
    fn new(input: &str) -> Tracked {
        Tracked {
            input: io::Cursor::new(input.as_bytes().to_vec()),
            output: Rc::new(RefCell::new(vec![])),
            closed: Rc::new(Cell::new(false)),
        }
    }

    fn output(&self) -> Rc<RefCell<Vec<u8>>> {
        self.output.clone()
    }

    fn closed(&self) -> Rc<Cell<bool>> {
        self.closed.clone()
    }
}

impl Read for Tracked {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for Tracked {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Close for Tracked {
    fn close(&mut self) -> io::Result<()> {
        self.closed.set(true);
        Ok(())
    }
}

/// A stream whose writes always fail, and which remembers whether it was
/// closed.
struct FailingSink {
    closed: Rc<Cell<bool>>,
}

impl Write for FailingSink {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "disk full"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Close for FailingSink {
    fn close(&mut self) -> io::Result<()> {
        self.closed.set(true);
        Ok(())
    }
}

fn read_all<R: Read>(rdr: Reader<R>) -> Vec<Vec<String>> {
    rdr.map(|row| row.unwrap().to_vec()).collect()
}

fn rows(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(|field| field.to_string()).collect())
        .collect()
}

#[test]
fn reads_unquoted_rows() {
    let data = "abc,def,ghi,jkl\nmno,,pqr,stu,vw\nxyz\n";
    assert_eq!(
        read_all(Reader::from_reader(data.as_bytes())),
        rows(&[
            &["abc", "def", "ghi", "jkl"],
            &["mno", "", "pqr", "stu", "vw"],
            &["xyz"],
        ])
    );
}

#[test]
fn reads_quoted_rows() {
    let data = "\"abc\",\"def,ghi\",\"jk\nl\"\n\
                \"mno\"\"\",\"\",\"pqr\",\"stu\",\"vw\"\n\
                \"xyz\"\n";
    assert_eq!(
        read_all(Reader::from_reader(data.as_bytes())),
        rows(&[
            &["abc", "def,ghi", "jk\nl"],
            &["mno\"", "", "pqr", "stu", "vw"],
            &["xyz"],
        ])
    );
}

#[test]
fn trailing_terminator_adds_no_row() {
    for data in &["a\n", "a\r", "a\r\n", "a"] {
        assert_eq!(
            read_all(Reader::from_reader(data.as_bytes())),
            rows(&[&["a"]]),
            "input {:?}",
            data
        );
    }
    assert!(read_all(Reader::from_reader(&b""[..])).is_empty());
}

const NEWLINE_INPUTS: &[&str] = &[
    "\"ab\r\ncd\"\r\nef\r\n",
    "\"ab\ncd\"\r\nef\r\n",
    "\"ab\rcd\"\r\nef\r\n",
    "\"ab\r\ncd\"\ref\r",
    "\"ab\ncd\"\ref\r",
    "\"ab\rcd\"\ref\r",
    "\"ab\r\ncd\"\nef\n",
    "\"ab\ncd\"\nef\n",
    "\"ab\rcd\"\nef\n",
];

#[test]
fn newlines_translated_by_stream() {
    for &capacity in &[1, 2, 8 * (1 << 10)] {
        for data in NEWLINE_INPUTS {
            let rdr = ReaderBuilder::new()
                .buffer_capacity(capacity)
                .from_reader(UniversalNewlines::new(data.as_bytes()));
            assert_eq!(
                read_all(rdr),
                rows(&[&["ab\ncd"], &["ef"]]),
                "input {:?}, capacity {}",
                data,
                capacity
            );
        }
    }
}

#[test]
fn newlines_preserved_without_translation() {
    let expected = ["ab\r\ncd", "ab\ncd", "ab\rcd"];
    for &capacity in &[1, 2, 8 * (1 << 10)] {
        for (i, data) in NEWLINE_INPUTS.iter().enumerate() {
            let rdr = ReaderBuilder::new()
                .buffer_capacity(capacity)
                .from_reader(data.as_bytes());
            assert_eq!(
                read_all(rdr),
                rows(&[&[expected[i % 3]], &["ef"]]),
                "input {:?}, capacity {}",
                data,
                capacity
            );
        }
    }
}

#[test]
fn single_terminator_modes() {
    let data = "a\r\nb\nc\rd";
    let read = |term| {
        read_all(ReaderBuilder::new().terminator(term).from_reader(
            data.as_bytes(),
        ))
    };
    assert_eq!(
        read(Terminator::Universal),
        rows(&[&["a"], &["b"], &["c"], &["d"]])
    );
    assert_eq!(read(Terminator::LF), rows(&[&["a\r"], &["b"], &["c\rd"]]));
    assert_eq!(read(Terminator::CR), rows(&[&["a"], &["\nb\nc"], &["d"]]));
    assert_eq!(read(Terminator::CRLF), rows(&[&["a"], &["b\nc\rd"]]));
}

#[test]
fn ragged_rows() {
    let data = "a\nb,c,d\n\ne,f\n";
    assert_eq!(
        read_all(Reader::from_reader(data.as_bytes())),
        rows(&[&["a"], &["b", "c", "d"], &[""], &["e", "f"]])
    );
}

#[test]
fn lenient_quoting_recovers() {
    let data = "\"a\"b,c\nd\"e\n\"open";
    assert_eq!(
        read_all(Reader::from_reader(data.as_bytes())),
        rows(&[&["ab", "c"], &["d\"e"], &["open"]])
    );
}

#[test]
fn strict_quoting_rejects_rows() {
    let data = "\"a\"b,c\nok\nd\"e\n\"open";
    let mut rdr = ReaderBuilder::new()
        .quoting(Quoting::Strict)
        .from_reader(data.as_bytes());

    let mut kinds = vec![];
    let mut good = vec![];
    for result in &mut rdr {
        match result {
            Ok(row) => good.push(row.to_vec()),
            Err(Error::Malformed { pos, kind }) => {
                kinds.push((pos.row(), kind))
            }
            Err(err) => panic!("unexpected error: {}", err),
        }
    }
    assert_eq!(good, rows(&[&["ok"]]));
    assert_eq!(
        kinds,
        vec![
            (0, Malformed::TextAfterQuote),
            (2, Malformed::QuoteInUnquotedField),
            (3, Malformed::UnclosedQuote),
        ]
    );
}

#[test]
fn scoped_reader_closes_stream() {
    let stream = Tracked::new("a,b\nc\n");
    let closed = stream.closed();
    {
        let mut rdr = Reader::scoped(stream);
        assert!(rdr.owns_stream());
        assert_eq!(rdr.next_row().unwrap().unwrap(), vec!["a", "b"]);
        assert!(!closed.get());
    }
    assert!(closed.get());
}

#[test]
fn scoped_reader_closes_on_explicit_exit() {
    let stream = Tracked::new("");
    let closed = stream.closed();
    let mut rdr = Reader::scoped(stream);
    assert!(rdr.next_row().unwrap().is_none());
    rdr.exit().unwrap();
    assert!(closed.get());
}

#[test]
fn unscoped_reader_leaves_stream_open() {
    let stream = Tracked::new("a\n");
    let closed = stream.closed();
    {
        let rdr = Reader::from_reader(stream);
        assert!(!rdr.owns_stream());
        assert_eq!(read_all(rdr), rows(&[&["a"]]));
    }
    assert!(!closed.get());
}

#[test]
fn writes_rows() {
    let mut wtr = Writer::from_writer(vec![]);
    wtr.write_rows(vec![vec!["abc", "def"], vec!["xyz"]]).unwrap();
    let data = wtr.into_inner().unwrap();
    assert_eq!(data, b"\"abc\",\"def\"\r\n\"xyz\"\r\n");
}

#[test]
fn scoped_writer_flushes_and_closes() {
    let stream = Tracked::new("");
    let (output, closed) = (stream.output(), stream.closed());
    {
        let mut wtr = Writer::scoped(stream);
        wtr.write_rows(vec![
            vec!["abc", "def", "ghi", "jkl"],
            vec!["mno", "", "pqr", "stu", "vw"],
            vec!["xyz"],
        ])
        .unwrap();
        assert!(output.borrow().is_empty());
    }
    assert!(closed.get());
    assert_eq!(
        String::from_utf8(output.borrow().clone()).unwrap(),
        "\"abc\",\"def\",\"ghi\",\"jkl\"\r\n\
         \"mno\",\"\",\"pqr\",\"stu\",\"vw\"\r\n\
         \"xyz\"\r\n"
    );
}

#[test]
fn scoped_writer_exits_when_unwinding() {
    let stream = Tracked::new("");
    let (output, closed) = (stream.output(), stream.closed());
    let result = panic::catch_unwind(AssertUnwindSafe(move || {
        let mut wtr = WriterBuilder::new().terminator("\n").scoped(stream);
        wtr.write_row(&["before"]).unwrap();
        panic!("failure while writing");
    }));
    assert!(result.is_err());
    assert!(closed.get());
    assert_eq!(&*output.borrow(), b"\"before\"\n");
}

#[test]
fn unscoped_writer_flushes_but_leaves_stream_open() {
    let stream = Tracked::new("");
    let (output, closed) = (stream.output(), stream.closed());
    {
        let mut wtr = Writer::from_writer(stream);
        assert!(!wtr.owns_stream());
        wtr.write_row(&["a"]).unwrap();
    }
    assert!(!closed.get());
    assert_eq!(&*output.borrow(), b"\"a\"\r\n");
}

#[test]
fn output_visible_only_after_flush() {
    let stream = Tracked::new("");
    let output = stream.output();
    let mut wtr = Writer::from_writer(stream);
    wtr.write_row(&["a", "b"]).unwrap();
    assert!(output.borrow().is_empty());
    wtr.flush().unwrap();
    assert_eq!(&*output.borrow(), b"\"a\",\"b\"\r\n");
}

#[test]
fn absent_cell_is_empty_field() {
    let mut wtr = Writer::from_writer(vec![]);
    wtr.write_row(vec![None::<&str>]).unwrap();
    assert_eq!(wtr.into_inner().unwrap(), b"\"\"\r\n");
}

#[test]
fn failed_conversion_writes_nothing() {
    let mut wtr = Writer::from_writer(vec![]);
    let err = wtr.write_row(vec![vec![1], vec![2, 3]]).unwrap_err();
    match err {
        Error::ValueConversion { field, ref msg } => {
            assert_eq!(field, 0);
            assert!(msg.contains("sequence"), "{}", msg);
        }
        ref err => panic!("expected a conversion error, got {:?}", err),
    }
    assert!(err.to_string().starts_with("CSV write error"));
    assert!(wtr.into_inner().unwrap().is_empty());
}

#[test]
fn round_trip() {
    let original = rows(&[
        &["plain", "with,comma", "with \"quotes\""],
        &["", "line\nbreak", "crlf\r\ninside", "cr\ronly"],
        &["\"", "\"\"", ",", ""],
        &["unicode ☃ ☄"],
    ]);
    let mut wtr = WriterBuilder::new().buffer_capacity(5).from_writer(vec![]);
    wtr.write_rows(&original).unwrap();
    let data = wtr.into_inner().unwrap();

    let rdr = ReaderBuilder::new().buffer_capacity(3).from_reader(&data[..]);
    assert_eq!(read_all(rdr), original);
}

#[test]
fn round_trip_mixed_cells() {
    let mut wtr = Writer::from_writer(vec![]);
    wtr.write_row(vec![Some(1.25), None, Some(-3.0)]).unwrap();
    wtr.write_row(&[true]).unwrap();
    wtr.write_row(&['"']).unwrap();
    let data = wtr.into_inner().unwrap();

    let got: Vec<Row> = Reader::from_reader(&data[..])
        .collect::<rowcsv::Result<_>>()
        .unwrap();
    assert_eq!(got[0], vec!["1.25", "", "-3.0"]);
    assert_eq!(got[1], vec!["true"]);
    assert_eq!(got[2], vec!["\""]);
}

#[test]
fn file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rows.csv");

    {
        let mut wtr = Writer::scoped(File::create(&path).unwrap());
        wtr.write_row(&["id", "name"]).unwrap();
        wtr.write_row(&["1", "multi\r\nline"]).unwrap();
        wtr.exit().unwrap();
    }

    let rdr = Reader::from_path(&path).unwrap();
    assert_eq!(
        read_all(rdr),
        rows(&[&["id", "name"], &["1", "multi\r\nline"]])
    );

    let rdr = Reader::from_reader(UniversalNewlines::new(
        File::open(&path).unwrap(),
    ));
    assert_eq!(read_all(rdr), rows(&[&["id", "name"], &["1", "multi\nline"]]));
}

#[test]
fn positions_follow_rows() {
    let data = "a,\"b\r\nc\"\r\nd\r\n";
    let mut rdr = Reader::from_reader(data.as_bytes());
    let first = rdr.next_row().unwrap().unwrap();
    let pos = first.position().unwrap();
    assert_eq!((pos.byte(), pos.line(), pos.row()), (0, 1, 0));

    let second = rdr.next_row().unwrap().unwrap();
    let pos = second.position().unwrap();
    assert_eq!((pos.byte(), pos.line(), pos.row()), (10, 3, 1));
    assert!(rdr.next_row().unwrap().is_none());
    assert!(rdr.is_done());
}

#[test]
fn scoped_writer_closes_after_failed_flush() {
    let closed = Rc::new(Cell::new(false));
    let mut wtr = Writer::scoped(FailingSink { closed: closed.clone() });
    wtr.write_row(&["a"]).unwrap();
    let err = wtr.exit().unwrap_err();
    assert!(err.is_io_error());
    assert_eq!(err.to_string(), "disk full");
    assert!(closed.get());
}

#[test]
fn scoped_writer_drop_closes_after_failed_flush() {
    let closed = Rc::new(Cell::new(false));
    {
        let mut wtr = Writer::scoped(FailingSink { closed: closed.clone() });
        wtr.write_row(&["a"]).unwrap();
    }
    assert!(closed.get());
}

#[test]
fn writes_single_pass_iterators() {
    let mut wtr = Writer::from_writer(vec![]);
    wtr.write_rows((0..3).map(|i| (0..i).map(|j| j * 10))).unwrap();
    wtr.write_row("x,y".split(',')).unwrap();
    let data = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
    assert_eq!(data, "\r\n\"0\"\r\n\"0\",\"10\"\r\n\"x\",\"y\"\r\n");
}
