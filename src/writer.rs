use std::{fmt, io};

use encoding_rs::Decoder;

use super::bufwriter::BufferedWriter;
use super::codec::{TextDecoder, TextEncoder};
use super::util::{str_from_utf8_up_to_error, MiniBuffer};
use super::{MalformedError, UnmappableError};

/// Minimum free space kept in the internal buffer before each codec call; enough for any single
/// character and for an HTML numeric character reference.
const MIN_BUF_SIZE: usize = 32;

// As of Rust 1.73.0: https://github.com/rust-lang/rust/blob/1.73.0/library/std/src/sys_common/io.rs#L3
const DEFAULT_BUF_SIZE: usize = if cfg!(target_os = "espidf") {
    512
} else {
    8 * 1024
};

/// A writer wrapper that encodes an input UTF-8 byte stream into the specified encoding.
///
/// This wrapper accepts bytes through [`std::io::Write`] methods, encodes them using the specified
/// encoder, and writes the encoded bytes into the underlying writer. Like [`BufWriter`], this type
/// stores the encoded bytes in its internal buffer and writes them into the underlying writer when
/// dropped or when the buffer becomes full.
///
/// By default this writer reports [`UnmappableError`] when it encounters a character that is not
/// mappable in the destination encoding and [`MalformedError`] when the input byte sequence
/// contains invalid UTF-8 bytes. These errors are non-fatal, and the writer can continue to encode
/// the subsequent bytes. A writer switched by [`replacing`](Self::replacing) writes unmappable
/// characters as HTML numeric character references and encodes U+FFFD in place of invalid UTF-8.
///
/// To meet the requirements of [`std::io::Write`], this writer often _defers_ an error from one
/// write call to the next. A call to `write` consumes an unmappable character and returns `Ok(n)`,
/// where `n` includes the length of the unmappable character bytes, and the immediately subsequent
/// call to a writer method returns `Err` reporting that unmappable character. Call [`flush`] and
/// [`finish`] at the end of the input to handle such a trailing error explicitly.
///
/// A UTF-8 character split across two `write` calls is held until the rest arrives.
///
/// [`BufWriter`]: io::BufWriter
/// [`flush`]: io::Write::flush
/// [`finish`]: Self::finish
///
/// # Examples
///
/// ```rust
/// use std::io::Write as _;
///
/// use charset_rw::{Charset, EncodingWriter};
///
/// let mut writer = EncodingWriter::new(Vec::new(), Charset::Gb18030.new_encoder().unwrap());
///
/// write!(writer, "天坛")?;
/// writer.write_all("公园".as_bytes())?;
/// writer.flush()?;
/// assert_eq!(
///     writer.writer_ref(),
///     &[204, 236, 204, 179, 185, 171, 212, 176]
/// );
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug)]
pub struct EncodingWriter<W: io::Write> {
    writer: BufferedWriter<W>,
    encoder: TextEncoder,
    replace: bool,
    /// Storage to carry an error from one write call to the next, used to tentatively return `Ok`
    /// (as per the contract) after consuming erroneous input and report the error at the beginning
    /// of the subsequent call.
    deferred_error: Option<DefErr>,
}

impl<W: io::Write> EncodingWriter<W> {
    /// Creates a new encoding writer from a writer and an encoder.
    pub fn new(writer: W, encoder: impl Into<TextEncoder>) -> Self {
        Self::with_capacity(DEFAULT_BUF_SIZE, writer, encoder)
    }

    /// Creates a new encoding writer with an internal buffer of at least the specified capacity.
    pub fn with_capacity(capacity: usize, writer: W, encoder: impl Into<TextEncoder>) -> Self {
        Self {
            writer: BufferedWriter::with_capacity(capacity.max(MIN_BUF_SIZE), writer),
            encoder: encoder.into(),
            replace: false,
            deferred_error: None,
        }
    }

    /// Switches this writer to substitute unmappable characters and invalid UTF-8 instead of
    /// reporting errors.
    ///
    /// ```rust
    /// use std::io::Write as _;
    ///
    /// use charset_rw::{Charset, EncodingWriter};
    ///
    /// let encoder = Charset::ShiftJis.new_encoder().unwrap();
    /// let mut writer = EncodingWriter::new(Vec::new(), encoder).replacing();
    /// write!(writer, "Boo!👻")?;
    /// writer.flush()?;
    /// assert_eq!(writer.writer_ref(), b"Boo!&#128123;");
    /// # Ok::<(), std::io::Error>(())
    /// ```
    pub fn replacing(mut self) -> Self {
        self.replace = true;
        self
    }

    /// Returns `true` if this writer substitutes unmappable characters and invalid UTF-8.
    pub fn is_replacing(&self) -> bool {
        self.replace
    }

    /// Returns a reference to the underlying writer.
    pub fn writer_ref(&self) -> &W {
        self.writer.get_ref()
    }

    /// Returns a reference to the underlying encoder.
    pub fn encoder_ref(&self) -> &TextEncoder {
        &self.encoder
    }

    /// Writes the encoded bytes held in the internal buffer into the underlying writer, without
    /// flushing the underlying writer or reporting a deferred error.
    pub fn write_buffered(&mut self) -> io::Result<()> {
        self.writer.flush_buffer()
    }

    /// Notifies the underlying encoder of the end of input stream, dropping it and returning the
    /// underlying writer, the internal buffer content not yet written to the underlying writer,
    /// and any error reported at the end of input byte sequence.
    ///
    /// It is recommended to call `flush` first because this method does not flush the internal
    /// buffer.
    pub fn finish(mut self) -> (W, Vec<u8>, io::Result<()>) {
        let result = self
            .writer
            .try_reserve(MIN_BUF_SIZE)
            .and_then(|_| self.realize_any_deferred_error());

        let mut tail = vec![0; MIN_BUF_SIZE + self.encoder.max_tail_length()];
        let (_, _, written) = self.encoder.encode("", &mut tail, true, self.replace);
        tail.truncate(written);

        let (writer, mut buffer) = self.writer.into_parts();
        buffer.extend(tail);
        (writer, buffer, result)
    }

    /// Writes a string slice into this writer, returning how many input bytes were consumed.
    ///
    /// This is an equivalent of [`write`](std::io::Write::write) but takes a string slice as the
    /// argument instead of a byte slice, eliminating the UTF-8 validation of the input.
    ///
    /// See the type-level documentation for the error semantics.
    pub fn write_str(&mut self, buf: &str) -> io::Result<usize> {
        if buf.is_empty() {
            // report confirmed error if any or return `Ok(0)` otherwise because `io::Write`
            // implementer may do so if input buffer is 0 bytes in length
            self.realize_deferred_error_except_incomplete_utf8()?;
            return Ok(0);
        }
        self.writer.try_reserve(MIN_BUF_SIZE)?;
        // report any error including `IncompleteUtf8`, which cannot be completed by a `&str`
        self.realize_any_deferred_error()?;
        self.writer.try_reserve(MIN_BUF_SIZE)?;
        Ok(self.write_str_inner(buf))
    }

    fn write_str_inner(&mut self, buf: &str) -> usize {
        debug_assert!(!buf.is_empty());
        debug_assert!(self.deferred_error.is_none());
        debug_assert!(self.writer.unfilled().len() >= MIN_BUF_SIZE);

        let (unmappable, consumed, written) =
            self.encoder
                .encode(buf, self.writer.unfilled(), false, self.replace);
        self.writer.advance(written);
        debug_assert_ne!(consumed, 0);
        debug_assert!(buf.is_char_boundary(consumed), "encoder broke contract");

        if let Some(c) = unmappable {
            // defer error until subsequent call because some bytes were consumed successfully
            self.deferred_error = Some(DefErr::Unmappable(UnmappableError::new(c)));
        }

        consumed
    }

    /// Consumes `self.deferred_error` and reports the corresponding `io::Error` (if applicable).
    ///
    /// In replace mode an `IncompleteUtf8` fragment is encoded as U+FFFD, which requires
    /// `MIN_BUF_SIZE` bytes of free buffer space.
    fn realize_any_deferred_error(&mut self) -> io::Result<()> {
        match self.deferred_error.take() {
            None => Ok(()),
            Some(DefErr::Unmappable(e)) => Err(e.wrap()),
            Some(DefErr::MalformedUtf8(e)) => Err(e.wrap()),
            // `IncompleteUtf8` represents `MalformedError` before writing another `&str` or at EOF,
            // whereas this state can be recovered when writing `&[u8]` containing the subsequent
            // UTF-8 character fragment.
            Some(DefErr::IncompleteUtf8(..)) if self.replace => {
                self.write_str_inner("\u{fffd}");
                Ok(())
            }
            Some(DefErr::IncompleteUtf8(..)) => Err(MalformedError::new().wrap()),
        }
    }

    /// Invokes `realize_any_deferred_error` if `self.deferred_error` represents an error other
    /// than `IncompleteUtf8`.
    ///
    /// `IncompleteUtf8` is treated differently because it only can be fixed by a later `write`
    /// call.
    fn realize_deferred_error_except_incomplete_utf8(&mut self) -> io::Result<()> {
        match self.deferred_error {
            None | Some(DefErr::IncompleteUtf8(..)) => Ok(()),
            _ => self.realize_any_deferred_error(),
        }
    }

    /// Handles invalid UTF-8 bytes at the beginning of the input, returning the number of bytes
    /// consumed.
    fn consume_malformed(&mut self, error_len: usize) -> usize {
        if self.replace {
            log::trace!("replaced invalid UTF-8 input with U+FFFD");
            self.write_str_inner("\u{fffd}");
        } else {
            // defer `MalformedError` until subsequent call
            self.deferred_error = Some(DefErr::MalformedUtf8(MalformedError::new()));
        }
        error_len
    }
}

impl<W: io::Write> io::Write for EncodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // recover from IncompleteUtf8 later; otherwise, report any deferred error
        self.realize_deferred_error_except_incomplete_utf8()?;
        if buf.is_empty() {
            return Ok(0);
        }
        self.writer.try_reserve(MIN_BUF_SIZE)?;

        Ok(match self.deferred_error.take() {
            None => match str_from_utf8_up_to_error(buf) {
                // encode `buf` if it starts with valid UTF-8 of at least one byte in length
                //
                // This path doesn't consume any invalid bytes following the valid sequence because
                // it's not sure if `write_str_inner` encodes the entire argument. Accordingly, the
                // other match arms consume invalid UTF-8 bytes only.
                Ok(s) => self.write_str_inner(s),
                Err(Some(error_len)) => self.consume_malformed(error_len),
                // consume and save incomplete character fragment, waiting for the following bytes
                Err(None) => {
                    let mut bs = MiniBuffer::default();
                    let len = bs.fill_from_slice(buf);
                    assert!(len < 4 && len == buf.len());
                    self.deferred_error = Some(DefErr::IncompleteUtf8(bs));
                    len
                }
            },
            Some(DefErr::IncompleteUtf8(mut bs)) => {
                let old_len = bs.len();
                let new_len = old_len + bs.fill_from_slice(buf);
                debug_assert!(old_len < new_len && new_len == bs.len());
                match str_from_utf8_up_to_error(bs.as_ref()) {
                    Ok(s) => {
                        // bytes carried over from the previous call were reported as consumed then
                        let consumed = self.write_str_inner(s);
                        assert!(old_len < consumed);
                        consumed - old_len
                    }
                    // the carried fragment and the leading bytes of `buf` form one invalid
                    // sequence, replaced with a single U+FFFD
                    Err(Some(error_len)) if self.replace && error_len > old_len => {
                        self.consume_malformed(error_len);
                        error_len - old_len
                    }
                    // incomplete fragment turned out to be invalid UTF-8 without taking any byte
                    // from `buf`
                    Err(Some(_)) if self.replace => {
                        self.consume_malformed(old_len);
                        return self.write(buf);
                    }
                    Err(Some(_)) => return Err(MalformedError::new().wrap()),
                    // still incomplete
                    Err(None) => {
                        assert!(new_len < 4 && new_len == old_len + buf.len());
                        self.deferred_error = Some(DefErr::IncompleteUtf8(bs));
                        new_len - old_len
                    }
                }
            }
            Some(_) => unreachable!(),
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.replace {
            // a dangling fragment may still be completed by a later write
            self.realize_deferred_error_except_incomplete_utf8()?;
        } else {
            self.realize_any_deferred_error()?;
        }
        self.writer.flush()
    }

    fn write_fmt(&mut self, f: fmt::Arguments<'_>) -> io::Result<()> {
        self.realize_deferred_error_except_incomplete_utf8()?;
        write_fmt_impl(self, f)
    }
}

#[derive(Debug)]
enum DefErr {
    Unmappable(UnmappableError),
    MalformedUtf8(MalformedError),
    IncompleteUtf8(MiniBuffer),
}

/// Implements [`std::io::Write::write_fmt`].
///
/// This function essentially combines the default `write_all` and `write_fmt` implementations of
/// `std::io::Write`, while using `write_str` to eliminate the UTF-8 validation.
fn write_fmt_impl<W: io::Write>(
    writer: &mut EncodingWriter<W>,
    f: fmt::Arguments<'_>,
) -> io::Result<()> {
    struct FmtWriter<'a, W: io::Write> {
        inner: &'a mut EncodingWriter<W>,
        io_error: io::Result<()>,
    }

    impl<W: io::Write> fmt::Write for FmtWriter<'_, W> {
        fn write_str(&mut self, mut s: &str) -> fmt::Result {
            while !s.is_empty() {
                match self.inner.write_str(s) {
                    Ok(0) => {
                        self.io_error = Err(io::Error::new(
                            io::ErrorKind::WriteZero,
                            "failed to write whole buffer",
                        ));
                        return Err(fmt::Error);
                    }
                    Ok(n) => match s.get(n..) {
                        Some(t) => s = t,
                        None => {
                            self.io_error = Err(io::Error::new(
                                io::ErrorKind::Other,
                                "encoder returned invalid string index",
                            ));
                            return Err(fmt::Error);
                        }
                    },
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => {
                        self.io_error = Err(e);
                        return Err(fmt::Error);
                    }
                }
            }
            Ok(())
        }
    }

    let mut output = FmtWriter {
        inner: writer,
        io_error: Ok(()),
    };
    match fmt::write(&mut output, f) {
        Ok(_) => Ok(()),
        Err(_) if output.io_error.is_err() => output.io_error,
        Err(_) => Err(io::Error::new(io::ErrorKind::Other, "formatter error")),
    }
}

/// A writer wrapper that decodes an input byte stream in the specified encoding into UTF-8.
///
/// Every write of source-encoded bytes is decoded and the resulting UTF-8 is buffered for the
/// underlying writer, which receives it when the buffer fills up, on [`flush`](io::Write::flush),
/// or when this writer is dropped. A multi-byte sequence split across writes is held by the
/// decoder until the rest arrives, so the underlying writer only ever sees whole characters.
///
/// By default a malformed byte sequence is reported as [`MalformedError`] by the call following
/// the one that consumed it. A writer switched by [`replacing`](Self::replacing) writes U+FFFD
/// instead. Call [`finish`](Self::finish) at the end of the input to learn about a sequence left
/// incomplete.
///
/// # Examples
///
/// ```rust
/// use std::io::Write as _;
///
/// use charset_rw::{Charset, DecodingWriter};
///
/// let mut writer = DecodingWriter::new(Vec::new(), Charset::Big5.new_decoder().unwrap());
/// writer.write_all(&[0xa4, 0xa4])?;
/// writer.write_all(&[0xa4])?;
/// writer.write_all(&[0xe5])?;
/// writer.flush()?;
/// assert_eq!(writer.writer_ref(), "中文".as_bytes());
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug)]
pub struct DecodingWriter<W: io::Write> {
    writer: BufferedWriter<W>,
    decoder: TextDecoder,
    replace: bool,
    deferred_error: Option<MalformedError>,
}

impl<W: io::Write> DecodingWriter<W> {
    /// Creates a new decoding writer from a writer and a decoder.
    pub fn new(writer: W, decoder: Decoder) -> Self {
        Self::with_capacity(DEFAULT_BUF_SIZE, writer, decoder)
    }

    /// Creates a new decoding writer with an internal buffer of at least the specified capacity.
    pub fn with_capacity(capacity: usize, writer: W, decoder: Decoder) -> Self {
        Self {
            writer: BufferedWriter::with_capacity(capacity.max(MIN_BUF_SIZE), writer),
            decoder: decoder.into(),
            replace: false,
            deferred_error: None,
        }
    }

    /// Switches this writer to replace malformed byte sequences with U+FFFD instead of reporting
    /// [`MalformedError`].
    pub fn replacing(mut self) -> Self {
        self.replace = true;
        self
    }

    /// Returns `true` if this writer replaces malformed byte sequences.
    pub fn is_replacing(&self) -> bool {
        self.replace
    }

    /// Returns a reference to the underlying writer.
    pub fn writer_ref(&self) -> &W {
        self.writer.get_ref()
    }

    /// Returns a reference to the underlying decoder.
    pub fn decoder_ref(&self) -> &Decoder {
        &self.decoder
    }

    /// Writes the decoded bytes held in the internal buffer into the underlying writer, without
    /// flushing the underlying writer or reporting a deferred error.
    pub fn write_buffered(&mut self) -> io::Result<()> {
        self.writer.flush_buffer()
    }

    /// Notifies the underlying decoder of the end of input stream, dropping it and returning the
    /// underlying writer, the internal buffer content not yet written to the underlying writer,
    /// and any error reported at the end of input byte sequence.
    ///
    /// It is recommended to call `flush` first because this method does not flush the internal
    /// buffer.
    pub fn finish(mut self) -> (W, Vec<u8>, io::Result<()>) {
        let mut tail = vec![
            0;
            self.decoder
                .max_utf8_buffer_length(0)
                .unwrap_or(MiniBuffer::CAPACITY)
        ];
        let (malformed, _, written) = self.decoder.decode(&[], &mut tail, true, self.replace);
        tail.truncate(written);

        let result = match self.deferred_error.take() {
            Some(e) => Err(e.wrap()),
            None if malformed => Err(MalformedError::new().wrap()),
            None => Ok(()),
        };

        let (writer, mut buffer) = self.writer.into_parts();
        buffer.extend(tail);
        (writer, buffer, result)
    }
}

impl<W: io::Write> io::Write for DecodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(e) = self.deferred_error.take() {
            return Err(e.wrap());
        }
        if buf.is_empty() {
            return Ok(0);
        }
        self.writer.try_reserve(MIN_BUF_SIZE)?;

        let (malformed, consumed, written) =
            self.decoder
                .decode(buf, self.writer.unfilled(), false, self.replace);
        self.writer.advance(written);
        debug_assert_ne!(consumed, 0);

        if malformed {
            // defer error until subsequent call because the malformed bytes were consumed
            self.deferred_error = Some(MalformedError::new());
        }
        Ok(consumed)
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(e) = self.deferred_error.take() {
            return Err(e.wrap());
        }
        self.writer.flush()
    }
}
