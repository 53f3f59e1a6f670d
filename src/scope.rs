use std::fmt;
use std::fs;
use std::io;
use std::ops;

use crate::error::Result;

/// A stream that can be closed.
///
/// Closing releases whatever the stream holds on to: it flushes writers
/// down to the operating system and marks custom streams as finished. The
/// operating system handle itself is released when the stream is dropped,
/// which a [`Scoped`](struct.Scoped.html) guard does right after closing.
///
/// A reader or writer only ever calls `close` when it owns its stream,
/// that is, when it was opened with `scoped` or `enter`.
pub trait Close {
    /// Close this stream.
    fn close(&mut self) -> io::Result<()>;
}

impl<'a, C: Close + ?Sized> Close for &'a mut C {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<C: Close + ?Sized> Close for Box<C> {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl Close for fs::File {
    fn close(&mut self) -> io::Result<()> {
        io::Write::flush(self)
    }
}

impl Close for Vec<u8> {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Closing a byte slice empties it, so later reads see end of input.
impl<'a> Close for &'a [u8] {
    fn close(&mut self) -> io::Result<()> {
        *self = &[];
        Ok(())
    }
}

impl<T> Close for io::Cursor<T> {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Close for io::Stdout {
    fn close(&mut self) -> io::Result<()> {
        io::Write::flush(self)
    }
}

impl Close for io::Stderr {
    fn close(&mut self) -> io::Result<()> {
        io::Write::flush(self)
    }
}

impl Close for io::Stdin {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Close for io::Sink {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Close for io::Empty {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<R: Close> Close for io::BufReader<R> {
    fn close(&mut self) -> io::Result<()> {
        self.get_mut().close()
    }
}

impl<W: io::Write + Close> Close for io::BufWriter<W> {
    fn close(&mut self) -> io::Result<()> {
        io::Write::flush(self)?;
        self.get_mut().close()
    }
}

/// What happens when a component leaves a scope.
///
/// Both `Reader` and `Writer` implement this: a writer flushes its buffer,
/// and either one closes its stream if and only if it owns it.
pub trait Scope {
    /// Run the exit actions of this component.
    fn exit(&mut self) -> Result<()>;
}

/// A guard that runs a component's exit actions when it goes out of scope.
///
/// A `Scoped` derefs to the component it guards, so it can be used exactly
/// like the component itself. Exiting happens either explicitly through
/// [`exit`](#method.exit), which reports any error, or implicitly on drop
/// (including while unwinding from a panic), which can only log the error.
///
/// A component can be entered only once: the guard takes it by value and
/// drops it after exiting.
///
/// # Example
///
/// ```
/// use rowcsv::Writer;
///
/// # fn example() -> rowcsv::Result<()> {
/// let mut out = vec![];
/// {
///     let mut wtr = Writer::scoped(&mut out);
///     wtr.write_row(&["a", "b"])?;
///     wtr.exit()?;
/// }
/// assert_eq!(out, b"\"a\",\"b\"\r\n");
/// # Ok(()) }
/// # example().unwrap();
/// ```
pub struct Scoped<S: Scope> {
    inner: S,
    exited: bool,
}

impl<S: Scope> Scoped<S> {
    pub(crate) fn new(inner: S) -> Scoped<S> {
        tracing::debug!("entered scope");
        Scoped { inner, exited: false }
    }

    /// Exit the scope now and report whether the exit actions succeeded.
    ///
    /// The component is dropped afterwards either way.
    pub fn exit(mut self) -> Result<()> {
        self.exited = true;
        let res = self.inner.exit();
        tracing::debug!(ok = res.is_ok(), "exited scope");
        res
    }
}

impl<S: Scope> ops::Deref for Scoped<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.inner
    }
}

impl<S: Scope> ops::DerefMut for Scoped<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

impl<S: Scope> Drop for Scoped<S> {
    fn drop(&mut self) {
        if self.exited {
            return;
        }
        self.exited = true;
        if let Err(err) = self.inner.exit() {
            tracing::warn!(error = %err, "failed to exit scope");
        }
    }
}

impl<S: Scope + fmt::Debug> fmt::Debug for Scoped<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scoped")
            .field("inner", &self.inner)
            .field("exited", &self.exited)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::io::{self, Read};
    use std::rc::Rc;

    use crate::error::{Error, Result};

    use super::{Close, Scope, Scoped};

    struct Counter {
        exits: Rc<Cell<u32>>,
        fail: bool,
    }

    impl Scope for Counter {
        fn exit(&mut self) -> Result<()> {
            self.exits.set(self.exits.get() + 1);
            if self.fail {
                Err(Error::Io(io::Error::new(io::ErrorKind::Other, "nope")))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn exit_runs_once() {
        let exits = Rc::new(Cell::new(0));
        let scoped = Scoped::new(Counter { exits: exits.clone(), fail: false });
        scoped.exit().unwrap();
        assert_eq!(exits.get(), 1);
    }

    #[test]
    fn drop_runs_exit() {
        let exits = Rc::new(Cell::new(0));
        {
            let _scoped =
                Scoped::new(Counter { exits: exits.clone(), fail: false });
        }
        assert_eq!(exits.get(), 1);
    }

    #[test]
    fn drop_swallows_exit_error() {
        let exits = Rc::new(Cell::new(0));
        {
            let _scoped =
                Scoped::new(Counter { exits: exits.clone(), fail: true });
        }
        assert_eq!(exits.get(), 1);
    }

    #[test]
    fn explicit_exit_reports_error() {
        let exits = Rc::new(Cell::new(0));
        let scoped = Scoped::new(Counter { exits: exits.clone(), fail: true });
        assert!(scoped.exit().is_err());
        assert_eq!(exits.get(), 1);
    }

    #[test]
    fn unwinding_runs_exit() {
        let exits = Rc::new(Cell::new(0));
        let counter = Counter { exits: exits.clone(), fail: false };
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(
            move || {
                let _scoped = Scoped::new(counter);
                panic!("boom");
            },
        ));
        assert!(res.is_err());
        assert_eq!(exits.get(), 1);
    }

    #[test]
    fn closed_slice_reads_nothing() {
        let mut data: &[u8] = b"abc";
        data.close().unwrap();
        let mut buf = vec![];
        data.read_to_end(&mut buf).unwrap();
        assert!(buf.is_empty());
    }
}
