use std::{io, str};

use encoding_rs::Decoder;

use super::codec::{TextDecoder, TextEncoder};
use super::util::{str_from_utf8_up_to_error, MiniBuffer};
use super::{MalformedError, UnmappableError};

/// A reader wrapper that decodes an input byte stream into UTF-8.
///
/// This wrapper reads bytes from the underlying reader, decodes them using the specified decoder,
/// and allows callers to access the decoded string through [`std::io::Read`] methods.
///
/// The byte sequence read from this reader is generally valid UTF-8, but that is _not_ always so,
/// especially when the output buffer is less than four bytes in length, in order not to return
/// `Ok(0)` by filling the buffer with a character fragment. When this reader reaches EOF or
/// returns `Err`, the byte sequence read so far, as a whole from the beginning, is guaranteed to
/// be valid UTF-8.
///
/// By default this reader reports [`MalformedError`] when it encounters a malformed byte sequence
/// in the input. This error is non-fatal, and the reader can continue to decode the subsequent
/// bytes by calling any read methods. A reader switched by [`replacing`](Self::replacing)
/// writes the replacement character (U+FFFD) instead.
///
/// This wrapper returns `Ok(0)` when the underlying reader indicates EOF. In the default mode it
/// does not terminate the internal decoder, staying ready for another byte that the underlying
/// reader might produce; call [`finish`](DecodingReader::finish) to learn about a malformed
/// sequence dangling at the end of the stream. In replace mode, EOF terminates the decoder,
/// turning a dangling sequence into U+FFFD, and a fresh decoder takes over for any later input.
///
/// # Examples
///
/// ```rust
/// use std::io::Read as _;
///
/// use charset_rw::{Charset, DecodingReader};
///
/// let src: &[u8] = &[0xc7, 0xd1, 0xb1, 0xb9, 0xbe, 0xee];
/// let mut reader = DecodingReader::new(src, Charset::EucKr.new_decoder().unwrap());
///
/// let mut dst = String::new();
/// reader.read_to_string(&mut dst)?;
/// assert_eq!(dst, "한국어");
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug)]
pub struct DecodingReader<R> {
    reader: R,
    decoder: TextDecoder,
    replace: bool,
    /// A tiny backup buffer used when the buffer supplied by the caller is so small that the
    /// decoder might be unable to write a single UTF-8 character.
    fallback_buf: MiniBuffer,
    /// Storage to carry an error from one read call to the next, used to tentatively return `Ok`
    /// (as per the contract) after writing some bytes up to an error and report the error at the
    /// beginning of the subsequent call.
    deferred_error: Option<MalformedError>,
}

impl<R: io::BufRead> DecodingReader<R> {
    /// Creates a new decoding reader from a buffered reader and a decoder.
    pub fn new(reader: R, decoder: Decoder) -> Self {
        Self {
            reader,
            decoder: decoder.into(),
            replace: false,
            fallback_buf: Default::default(),
            deferred_error: None,
        }
    }

    /// Switches this reader to replace malformed byte sequences with U+FFFD instead of reporting
    /// [`MalformedError`].
    ///
    /// ```rust
    /// use std::io::Read as _;
    ///
    /// use charset_rw::{Charset, DecodingReader};
    ///
    /// // "日本" in Shift_JIS with a stray 0xa0 and a dangling lead byte at the end
    /// let src: &[u8] = &[0x93, 0xfa, 0xa0, 0x96, 0x7b, 0xe0];
    /// let mut reader = DecodingReader::new(src, Charset::ShiftJis.new_decoder().unwrap()).replacing();
    ///
    /// let mut dst = String::new();
    /// reader.read_to_string(&mut dst)?;
    /// assert_eq!(dst, "日\u{fffd}本\u{fffd}");
    /// # Ok::<(), std::io::Error>(())
    /// ```
    pub fn replacing(mut self) -> Self {
        self.replace = true;
        self
    }

    /// Returns `true` if this reader replaces malformed byte sequences.
    pub fn is_replacing(&self) -> bool {
        self.replace
    }

    /// Returns a reference to the underlying reader.
    pub fn reader_ref(&self) -> &R {
        &self.reader
    }

    /// Returns a reference to the underlying decoder.
    pub fn decoder_ref(&self) -> &Decoder {
        &self.decoder
    }

    /// Notifies the underlying decoder of the end of input stream, dropping it and returning the
    /// underlying reader, any unread bytes left in `self`, and any error reported at the end of
    /// input byte sequence.
    pub fn finish(mut self) -> (R, Vec<u8>, io::Result<()>) {
        let mut remainder = self.fallback_buf.as_ref().to_vec();
        let mut tail = vec![
            0u8;
            self.decoder
                .max_utf8_buffer_length(0)
                .unwrap_or(MiniBuffer::CAPACITY)
        ];
        let (malformed, _, written) = self.decoder.decode(&[], &mut tail, true, self.replace);
        remainder.extend(&tail[..written]);

        let result = match self.deferred_error.take() {
            Some(e) => Err(e.wrap()),
            None if malformed => Err(MalformedError::new().wrap()),
            None => Ok(()),
        };
        (self.reader, remainder, result)
    }

    fn read_inner(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        debug_assert!(!buf.is_empty());
        debug_assert!(self.fallback_buf.is_empty());
        debug_assert!(self.deferred_error.is_none());

        loop {
            let src = self.reader.fill_buf()?;
            if src.is_empty() {
                return Ok(if self.replace { self.terminate(buf) } else { 0 });
            }

            // use fallback buffer if `buf` may be too small to hold a character
            let use_fallback = buf.len() < MiniBuffer::CAPACITY;
            let (malformed, consumed, mut written) = {
                let dst = if use_fallback {
                    self.fallback_buf.unfilled()
                } else {
                    &mut *buf
                };
                self.decoder.decode(src, dst, false, self.replace)
            };
            self.reader.consume(consumed);
            if use_fallback && written > 0 {
                self.fallback_buf.advance(written);
                written = self.fallback_buf.read_to_slice(buf);
            }

            if malformed {
                self.deferred_error = Some(MalformedError::new());
            }
            if malformed || written > 0 {
                debug_assert!(self.check_utf8_guarantee(&buf[..written]).is_ok());
                return Ok(written);
            }
            if consumed == 0 {
                debug_assert!(false, "unreachable");
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    "decoder made no progress unexpectedly",
                ));
            }
            // only the leading part of a multi-byte sequence was consumed; read further
        }
    }

    /// Flushes the decoder at EOF in replace mode and starts over with a fresh decoder.
    fn terminate(&mut self, buf: &mut [u8]) -> usize {
        let (_, _, written) = self
            .decoder
            .decode(&[], self.fallback_buf.unfilled(), true, true);
        self.decoder.reset();
        self.fallback_buf.advance(written);
        self.fallback_buf.read_to_slice(buf)
    }

    /// Asserts the UTF-8 guarantee of this reader: the byte sequence read, followed by any
    /// fallback buffer content left in this reader, is a valid UTF-8 sequence.
    fn check_utf8_guarantee(&self, buf_written: &[u8]) -> Result<(), str::Utf8Error> {
        if self.fallback_buf.is_empty() {
            str::from_utf8(buf_written).and(Ok(()))
        } else {
            let mut v = Vec::with_capacity(buf_written.len() + self.fallback_buf.len());
            v.extend(buf_written);
            v.extend(self.fallback_buf.as_ref());
            str::from_utf8(&v).and(Ok(()))
        }
    }
}

impl<R: io::BufRead> io::Read for DecodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // ensure preconditions
        if buf.is_empty() {
            // `io::Read` may return `Ok(0)` if output buffer is 0 bytes in length
            return Ok(0);
        } else if !self.fallback_buf.is_empty() {
            // flush internal buffer if it contains leftovers from previous call; return early to
            // keep this cold path simple even if `buf` has remaining space to read more bytes
            return Ok(self.fallback_buf.read_to_slice(buf));
        } else if let Some(e) = self.deferred_error.take() {
            // report the error that has been deferred until all the decoded bytes (including those
            // left in the fallback buffer) are written
            return Err(e.wrap());
        }
        match self.read_inner(buf) {
            Ok(0) => match self.deferred_error.take() {
                None => Ok(0),
                Some(e) => Err(e.wrap()),
            },
            ret => ret,
        }
    }
}

/// A reader wrapper that encodes a UTF-8 input byte stream into the specified encoding.
///
/// This is the pull-side counterpart of [`EncodingWriter`](crate::EncodingWriter): each read
/// call pulls UTF-8 bytes from the underlying reader, encodes them, and hands out the encoded
/// bytes. A UTF-8 character split across two chunks of the underlying reader is carried over
/// until its remaining bytes arrive.
///
/// By default this reader reports [`MalformedError`] for invalid UTF-8 input and
/// [`UnmappableError`] for a character the destination encoding cannot represent, after handing
/// out the bytes encoded before it. Both errors are non-fatal. A reader switched by
/// [`replacing`](Self::replacing) encodes U+FFFD in place of invalid UTF-8 and writes unmappable
/// characters as HTML numeric character references.
///
/// # Examples
///
/// ```rust
/// use std::io::Read as _;
///
/// use charset_rw::{Charset, EncodingReader};
///
/// let src = "Hello 世界".as_bytes();
/// let mut reader = EncodingReader::new(src, Charset::Big5.new_encoder().unwrap());
///
/// let mut dst = Vec::new();
/// reader.read_to_end(&mut dst)?;
/// assert_eq!(dst, b"Hello \xa5\x40\xac\xc9");
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug)]
pub struct EncodingReader<R> {
    reader: R,
    encoder: TextEncoder,
    replace: bool,
    /// An incomplete UTF-8 character waiting for its following bytes.
    carry: MiniBuffer,
    output: Box<[u8]>,
    pos: usize,
    filled: usize,
    deferred_error: Option<DefErr>,
}

const MIN_BUF_SIZE: usize = 32;

impl<R: io::BufRead> EncodingReader<R> {
    /// Creates a new encoding reader from a buffered reader and an encoder.
    pub fn new(reader: R, encoder: impl Into<TextEncoder>) -> Self {
        Self::with_capacity(8 * 1024, reader, encoder)
    }

    /// Creates a new encoding reader with an internal output buffer of at least the specified
    /// capacity.
    pub fn with_capacity(capacity: usize, reader: R, encoder: impl Into<TextEncoder>) -> Self {
        Self {
            reader,
            encoder: encoder.into(),
            replace: false,
            carry: Default::default(),
            output: vec![0; capacity.max(MIN_BUF_SIZE)].into_boxed_slice(),
            pos: 0,
            filled: 0,
            deferred_error: None,
        }
    }

    /// Switches this reader to substitute invalid and unmappable input instead of reporting
    /// errors.
    pub fn replacing(mut self) -> Self {
        self.replace = true;
        self
    }

    /// Returns `true` if this reader substitutes invalid and unmappable input.
    pub fn is_replacing(&self) -> bool {
        self.replace
    }

    /// Returns a reference to the underlying reader.
    pub fn reader_ref(&self) -> &R {
        &self.reader
    }

    /// Returns a reference to the underlying encoder.
    pub fn encoder_ref(&self) -> &TextEncoder {
        &self.encoder
    }

    /// Notifies the underlying encoder of the end of input stream, dropping it and returning the
    /// underlying reader, any encoded bytes not yet read from `self`, and any error reported at
    /// the end of input byte sequence.
    pub fn finish(mut self) -> (R, Vec<u8>, io::Result<()>) {
        let mut remainder = self.output[self.pos..self.filled].to_vec();
        let mut result = match self.deferred_error.take() {
            Some(e) => Err(e.wrap()),
            None => Ok(()),
        };

        let mut tail = vec![0; MIN_BUF_SIZE + self.encoder.max_tail_length()];
        let mut written = 0;
        if !self.carry.is_empty() {
            if self.replace {
                let (_, _, n) = self.encoder.encode("\u{fffd}", &mut tail, false, true);
                written += n;
            } else if result.is_ok() {
                result = Err(MalformedError::new().wrap());
            }
        }
        let (_, _, n) = self
            .encoder
            .encode("", &mut tail[written..], true, self.replace);
        remainder.extend(&tail[..written + n]);

        (self.reader, remainder, result)
    }

    /// Encodes the next chunk of input into the output buffer, returning `false` at EOF.
    fn fill_output(&mut self) -> io::Result<bool> {
        debug_assert!(self.pos == self.filled);
        debug_assert!(self.deferred_error.is_none());
        self.pos = 0;
        self.filled = 0;

        let src = self.reader.fill_buf()?;
        if src.is_empty() {
            if self.carry.is_empty() || !self.replace {
                return Ok(false);
            }
            // the dangling fragment can never be completed now
            self.carry = MiniBuffer::default();
            let (_, _, written) = self.encoder.encode("\u{fffd}", &mut self.output, false, true);
            self.filled = written;
            return Ok(true);
        }

        let (consumed, step) = if self.carry.is_empty() {
            let step = encode_utf8(&mut self.encoder, self.replace, src, &mut self.output);
            if step.incomplete {
                (self.carry.fill_from_slice(src), step)
            } else {
                (step.consumed, step)
            }
        } else {
            let carried = self.carry.len();
            let mut joined = self.carry.clone();
            joined.fill_from_slice(src);
            let step = encode_utf8(
                &mut self.encoder,
                self.replace,
                joined.as_ref(),
                &mut self.output,
            );
            if step.incomplete {
                let taken = joined.len() - carried;
                self.carry = joined;
                (taken, step)
            } else if step.consumed >= carried {
                self.carry = MiniBuffer::default();
                (step.consumed - carried, step)
            } else {
                // the invalid sequence ended within the carried bytes
                self.carry.remove_front(step.consumed);
                (0, step)
            }
        };
        self.reader.consume(consumed);
        self.filled = step.written;
        self.deferred_error = step.error;
        Ok(true)
    }
}

impl<R: io::BufRead> io::Read for EncodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.pos < self.filled {
                let n = buf.len().min(self.filled - self.pos);
                buf[..n].copy_from_slice(&self.output[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            if let Some(e) = self.deferred_error.take() {
                return Err(e.wrap());
            }
            if !self.fill_output()? {
                return Ok(0);
            }
        }
    }
}

#[derive(Debug)]
enum DefErr {
    Unmappable(UnmappableError),
    Malformed(MalformedError),
}

impl DefErr {
    fn wrap(self) -> io::Error {
        match self {
            DefErr::Unmappable(e) => e.wrap(),
            DefErr::Malformed(e) => e.wrap(),
        }
    }
}

/// The result of encoding the leading part of a UTF-8 byte slice.
struct Step {
    consumed: usize,
    written: usize,
    error: Option<DefErr>,
    /// `src` is an incomplete character fragment; nothing was consumed.
    incomplete: bool,
}

fn encode_utf8(encoder: &mut TextEncoder, replace: bool, src: &[u8], dst: &mut [u8]) -> Step {
    match str_from_utf8_up_to_error(src) {
        Ok(s) => {
            let (unmappable, consumed, written) = encoder.encode(s, dst, false, replace);
            Step {
                consumed,
                written,
                error: unmappable.map(|c| DefErr::Unmappable(UnmappableError::new(c))),
                incomplete: false,
            }
        }
        Err(Some(error_len)) if replace => {
            let (_, _, written) = encoder.encode("\u{fffd}", dst, false, true);
            log::trace!("replaced invalid UTF-8 input with U+FFFD");
            Step {
                consumed: error_len,
                written,
                error: None,
                incomplete: false,
            }
        }
        Err(Some(error_len)) => Step {
            consumed: error_len,
            written: 0,
            error: Some(DefErr::Malformed(MalformedError::new())),
            incomplete: false,
        },
        Err(None) => Step {
            consumed: 0,
            written: 0,
            error: None,
            incomplete: true,
        },
    }
}
