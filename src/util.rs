use std::str;

/// A `Vec`-like struct that handles a tiny stack-allocated byte array.
///
/// Large enough for one UTF-8 character plus the bytes needed to decide that a fragment is
/// invalid.
#[derive(Clone, Debug, Default)]
pub(crate) struct MiniBuffer {
    len: u8,
    buf: [u8; 7],
}

impl AsRef<[u8]> for MiniBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.buf[..self.len()]
    }
}

impl MiniBuffer {
    pub const CAPACITY: usize = 7;

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len.into()
    }

    pub fn advance(&mut self, n: usize) {
        debug_assert!(self.len() + n <= self.buf.len());
        self.len = self.buf.len().min(self.len() + n) as u8;
    }

    pub fn remove_front(&mut self, count: usize) {
        debug_assert!(count <= self.len());
        let len = self.len();
        if count < len {
            self.buf.copy_within(count..len, 0);
            self.len -= count as u8;
        } else {
            self.len = 0;
        };
    }

    pub fn unfilled(&mut self) -> &mut [u8] {
        &mut self.buf[self.len.into()..]
    }

    /// Reads bytes from the internal buffer to fill the specified buffer, returning the number of
    /// bytes read.
    pub fn read_to_slice(&mut self, buf: &mut [u8]) -> usize {
        let n = self.len().min(buf.len());
        buf[..n].copy_from_slice(&self.buf[..n]);
        self.remove_front(n);
        n
    }

    /// Writes as many bytes as possible copied from a slice into the spare capacity, returning the
    /// number of bytes consumed.
    pub fn fill_from_slice(&mut self, buf: &[u8]) -> usize {
        let n = self.unfilled().len().min(buf.len());
        self.unfilled()[..n].copy_from_slice(&buf[..n]);
        self.advance(n);
        n
    }
}

/// Returns the longest valid UTF-8 prefix of `v` if it is not empty.
///
/// Otherwise, returns the length of the invalid sequence at the beginning of `v`, or `None` if
/// `v` is an incomplete character fragment that may be completed by subsequent bytes.
pub(crate) fn str_from_utf8_up_to_error(v: &[u8]) -> Result<&str, Option<usize>> {
    match str::from_utf8(v) {
        Ok(s) => Ok(s),
        Err(e) if e.valid_up_to() > 0 => {
            // SAFETY: `valid_up_to` marks the end of a valid UTF-8 prefix
            Ok(unsafe { str::from_utf8_unchecked(&v[..e.valid_up_to()]) })
        }
        Err(e) => Err(e.error_len()),
    }
}
