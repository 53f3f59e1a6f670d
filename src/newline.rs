use std::io;

use crate::scope::Close;

/// A reader that translates every line ending into `\n`.
///
/// `\r\n` and a lone `\r` both become a single `\n`, including inside
/// quoted CSV fields. A `\r\n` pair split across two reads of the
/// underlying stream is still translated into one `\n`.
///
/// This is the stream-side half of universal newline handling. The CSV
/// `Reader` itself never rewrites bytes inside quoted fields, so put this
/// adapter in front of it when embedded line endings should be normalized
/// as well.
///
/// # Example
///
/// ```
/// use rowcsv::{Reader, UniversalNewlines};
///
/// # fn example() -> rowcsv::Result<()> {
/// let data = "\"ab\r\ncd\"\r\nef\r\n";
/// let rdr = Reader::from_reader(UniversalNewlines::new(data.as_bytes()));
/// let rows = rdr.collect::<rowcsv::Result<Vec<_>>>()?;
/// assert_eq!(rows, vec![vec!["ab\ncd"], vec!["ef"]]);
/// # Ok(()) }
/// # example().unwrap();
/// ```
#[derive(Debug)]
pub struct UniversalNewlines<R> {
    rdr: R,
    /// Whether the last byte handed out was a translated `\r`, so that a
    /// `\n` right after it must be dropped.
    after_cr: bool,
}

impl<R: io::Read> UniversalNewlines<R> {
    /// Wrap the given reader.
    pub fn new(rdr: R) -> UniversalNewlines<R> {
        UniversalNewlines { rdr, after_cr: false }
    }

    /// Return a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.rdr
    }

    /// Return a mutable reference to the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.rdr
    }

    /// Unwrap this adapter, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.rdr
    }
}

impl<R: io::Read> io::Read for UniversalNewlines<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let n = self.rdr.read(buf)?;
            if n == 0 {
                return Ok(0);
            }
            let mut w = 0;
            for r in 0..n {
                let b = buf[r];
                if self.after_cr && b == b'\n' {
                    self.after_cr = false;
                    continue;
                }
                self.after_cr = b == b'\r';
                buf[w] = if b == b'\r' { b'\n' } else { b };
                w += 1;
            }
            // A read consisting of nothing but the `\n` of a split `\r\n`
            // translates to nothing, which must not look like end of input.
            if w > 0 {
                return Ok(w);
            }
        }
    }
}

impl<R: Close> Close for UniversalNewlines<R> {
    fn close(&mut self) -> io::Result<()> {
        self.rdr.close()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Read};

    use super::UniversalNewlines;

    /// A reader that hands out its data in fixed size pieces.
    struct Chunked<'a> {
        data: &'a [u8],
        size: usize,
    }

    impl<'a> Read for Chunked<'a> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.size.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    fn translate(data: &str, size: usize) -> String {
        let mut rdr =
            UniversalNewlines::new(Chunked { data: data.as_bytes(), size });
        let mut out = String::new();
        rdr.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn translates_all_endings() {
        for &size in &[1, 2, 3, 64] {
            assert_eq!(translate("a\r\nb\rc\nd", size), "a\nb\nc\nd");
            assert_eq!(translate("\r\r\n\n", size), "\n\n\n");
            assert_eq!(translate("\n\r", size), "\n\n");
            assert_eq!(translate("no endings", size), "no endings");
        }
    }

    #[test]
    fn split_crlf_is_one_newline() {
        assert_eq!(translate("ab\r\ncd\r\n", 3), "ab\ncd\n");
        assert_eq!(translate("\r\n", 1), "\n");
    }
}
