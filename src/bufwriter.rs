use std::{io, mem, ptr};

/// A [`BufWriter`](io::BufWriter)-like type that exposes its unfilled capacity as a slice so that
/// a codec can write transcoded bytes straight into it.
#[derive(Debug)]
pub(crate) struct BufferedWriter<W: io::Write> {
    buffer: Box<[u8]>,
    filled: usize,
    panicked: bool,
    inner: W,
}

impl<W: io::Write> BufferedWriter<W> {
    pub fn with_capacity(capacity: usize, inner: W) -> Self {
        Self {
            buffer: vec![0; capacity].into_boxed_slice(),
            filled: 0,
            panicked: false,
            inner,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Returns the buffered bytes not yet written to the underlying writer.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer[..self.filled]
    }

    /// Returns the unfilled buffer capacity as a slice.
    ///
    /// The caller must [`advance`](Self::advance) the cursor after writing data into it.
    pub fn unfilled(&mut self) -> &mut [u8] {
        &mut self.buffer[self.filled..]
    }

    /// Marks the first `n` bytes of the unfilled buffer as filled.
    pub fn advance(&mut self, n: usize) {
        assert!(self.filled + n <= self.buffer.len());
        self.filled += n;
    }

    /// Makes sure the unfilled buffer is at least `minimum` bytes in length, flushing the
    /// buffered data if necessary.
    pub fn try_reserve(&mut self, minimum: usize) -> io::Result<()> {
        if self.buffer.len() - self.filled < minimum {
            self.flush_buffer()?;
            if self.buffer.len() - self.filled < minimum {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    "failed to reserve minimum buffer capacity",
                ));
            }
        }
        Ok(())
    }

    /// Writes all the buffered data and flushes the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer()?;
        self.inner.flush()
    }

    /// Disassembles `self` into the underlying writer and the data not yet written to it,
    /// without flushing.
    pub fn into_parts(self) -> (W, Vec<u8>) {
        let remainder = self.buffer().to_vec();
        // destruct `self`, moving out the writer and dropping the rest without running `Drop`
        let mut m = mem::ManuallyDrop::new(self);
        // SAFETY: `inner` is read exactly once and `m` is never dropped as a whole; `buffer` is
        // dropped in place because it is not moved out
        unsafe {
            ptr::drop_in_place(&mut m.buffer);
            (ptr::read(&m.inner), remainder)
        }
    }

    /// Writes the buffered data into the underlying writer without flushing it.
    pub fn flush_buffer(&mut self) -> io::Result<()> {
        // A guard struct to make sure to remove consumed bytes from the buffer when dropped.
        struct PanicGuard<'a> {
            consumed: usize,
            filled: &'a mut usize,
            buffer: &'a mut [u8],
        }

        impl Drop for PanicGuard<'_> {
            fn drop(&mut self) {
                if self.consumed < *self.filled {
                    self.buffer.copy_within(self.consumed..*self.filled, 0);
                    *self.filled -= self.consumed;
                } else {
                    *self.filled = 0;
                }
            }
        }

        let mut g = PanicGuard {
            consumed: 0,
            filled: &mut self.filled,
            buffer: &mut self.buffer,
        };

        while g.consumed < *g.filled {
            self.panicked = true;
            let ret = self.inner.write(&g.buffer[g.consumed..*g.filled]);
            self.panicked = false;

            match ret {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write buffered data to writer",
                    ));
                }
                Ok(n) => g.consumed += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }
}

impl<W: io::Write> Drop for BufferedWriter<W> {
    fn drop(&mut self) {
        // don't double-flush the buffer when the inner writer panicked in a call to write
        if !self.panicked {
            let _ = self.flush_buffer();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::BufferedWriter;

    /// A writer that accepts at most two bytes per call and fails every third call.
    struct Choppy {
        out: Vec<u8>,
        calls: usize,
    }

    impl io::Write for Choppy {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            if self.calls % 3 == 0 {
                return Err(io::ErrorKind::Interrupted.into());
            }
            let n = buf.len().min(2);
            self.out.extend(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn reserve_flushes_and_keeps_order() {
        let mut w = BufferedWriter::with_capacity(
            8,
            Choppy {
                out: Vec::new(),
                calls: 0,
            },
        );
        w.unfilled()[..5].copy_from_slice(b"hello");
        w.advance(5);
        assert_eq!(w.buffer(), b"hello");

        w.try_reserve(3).unwrap();
        assert_eq!(w.buffer(), b"hello");
        w.try_reserve(4).unwrap();
        assert!(w.buffer().is_empty());
        assert_eq!(w.get_ref().out, b"hello");

        assert!(w.try_reserve(9).is_err());

        w.unfilled()[..2].copy_from_slice(b", ");
        w.advance(2);
        w.flush().unwrap();
        assert_eq!(w.get_ref().out, b"hello, ");
    }

    #[test]
    fn into_parts_does_not_flush() {
        let mut w = BufferedWriter::with_capacity(8, Vec::new());
        w.unfilled()[..3].copy_from_slice(b"abc");
        w.advance(3);
        let (inner, rest) = w.into_parts();
        assert!(inner.is_empty());
        assert_eq!(rest, b"abc");
    }

    #[test]
    fn drop_flushes() {
        let mut out = Vec::new();
        {
            let mut w = BufferedWriter::with_capacity(8, &mut out);
            w.unfilled()[..3].copy_from_slice(b"xyz");
            w.advance(3);
        }
        assert_eq!(out, b"xyz");
    }
}
