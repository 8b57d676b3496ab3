use std::io::{self, BufReader};

use super::{Charset, DecodingReader, DecodingWriter, EncodingReader, EncodingWriter};

/// Wraps a reader of `charset` bytes so that it produces UTF-8.
///
/// A passthrough charset returns the reader itself. Otherwise malformed sequences are replaced
/// with U+FFFD.
///
/// # Examples
///
/// ```rust
/// use std::io::Read as _;
///
/// use charset_rw::{decoding_reader, Charset};
///
/// let gbk: &[u8] = &[0xd6, 0xd0, 0xce, 0xc4];
/// let mut dst = String::new();
/// decoding_reader(Charset::Gbk, gbk).read_to_string(&mut dst)?;
/// assert_eq!(dst, "中文");
/// # Ok::<(), std::io::Error>(())
/// ```
pub fn decoding_reader<R: io::Read>(charset: Charset, reader: R) -> CharsetReader<R> {
    match charset.new_decoder() {
        None => CharsetReader::Passthrough(reader),
        Some(decoder) => {
            log::trace!("decoding {} input into UTF-8", charset);
            CharsetReader::Decoding(
                charset,
                DecodingReader::new(BufReader::new(reader), decoder).replacing(),
            )
        }
    }
}

/// Wraps a writer so that `charset` bytes written to it reach the writer as UTF-8.
///
/// A passthrough charset returns the writer itself. Otherwise malformed sequences are replaced
/// with U+FFFD.
pub fn decoding_writer<W: io::Write>(charset: Charset, writer: W) -> CharsetWriter<W> {
    match charset.new_decoder() {
        None => CharsetWriter::Passthrough(writer),
        Some(decoder) => {
            log::trace!("decoding {} output into UTF-8", charset);
            CharsetWriter::Decoding(charset, DecodingWriter::new(writer, decoder).replacing())
        }
    }
}

/// Wraps a reader of UTF-8 bytes so that it produces `charset` bytes.
///
/// A passthrough charset returns the reader itself. Otherwise invalid UTF-8 is encoded as
/// U+FFFD and characters `charset` cannot represent become HTML numeric character references.
pub fn encoding_reader<R: io::Read>(charset: Charset, reader: R) -> CharsetReader<R> {
    match charset.new_encoder() {
        None => CharsetReader::Passthrough(reader),
        Some(encoder) => {
            log::trace!("encoding UTF-8 input into {}", charset);
            CharsetReader::Encoding(
                charset,
                EncodingReader::new(BufReader::new(reader), encoder).replacing(),
            )
        }
    }
}

/// Wraps a writer so that UTF-8 text written to it reaches the writer as `charset` bytes.
///
/// A passthrough charset returns the writer itself. Otherwise invalid UTF-8 is encoded as
/// U+FFFD and characters `charset` cannot represent become HTML numeric character references.
///
/// # Examples
///
/// ```rust
/// use std::io::Write as _;
///
/// use charset_rw::{encoding_writer, Charset};
///
/// let mut writer = encoding_writer(Charset::ShiftJis, Vec::new());
/// write!(writer, "日本語 한")?;
/// let sjis = writer.finish()?;
/// assert_eq!(sjis, b"\x93\xfa\x96\x7b\x8c\xea &#54620;");
/// # Ok::<(), std::io::Error>(())
/// ```
pub fn encoding_writer<W: io::Write>(charset: Charset, writer: W) -> CharsetWriter<W> {
    match charset.new_encoder() {
        None => CharsetWriter::Passthrough(writer),
        Some(encoder) => {
            log::trace!("encoding UTF-8 output into {}", charset);
            CharsetWriter::Encoding(charset, EncodingWriter::new(writer, encoder).replacing())
        }
    }
}

/// The reader returned by [`decoding_reader`] and [`encoding_reader`].
///
/// The `Passthrough` variant holds the caller's reader untouched; reading from it is reading
/// from the original reader.
#[derive(Debug)]
pub enum CharsetReader<R> {
    Passthrough(R),
    Decoding(Charset, DecodingReader<BufReader<R>>),
    Encoding(Charset, EncodingReader<BufReader<R>>),
}

impl<R: io::Read> CharsetReader<R> {
    /// Returns `true` if no transcoding takes place.
    pub fn is_passthrough(&self) -> bool {
        matches!(self, CharsetReader::Passthrough(_))
    }

    /// Returns the charset transcoded from or into, or `None` for a passthrough reader.
    pub fn charset(&self) -> Option<Charset> {
        match self {
            CharsetReader::Passthrough(_) => None,
            CharsetReader::Decoding(c, _) | CharsetReader::Encoding(c, _) => Some(*c),
        }
    }

    /// Returns a reference to the reader supplied by the caller.
    pub fn get_ref(&self) -> &R {
        match self {
            CharsetReader::Passthrough(r) => r,
            CharsetReader::Decoding(_, r) => r.reader_ref().get_ref(),
            CharsetReader::Encoding(_, r) => r.reader_ref().get_ref(),
        }
    }
}

impl<R: io::Read> io::Read for CharsetReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            CharsetReader::Passthrough(r) => r.read(buf),
            CharsetReader::Decoding(_, r) => r.read(buf),
            CharsetReader::Encoding(_, r) => r.read(buf),
        }
    }
}

/// The writer returned by [`decoding_writer`] and [`encoding_writer`].
///
/// The `Passthrough` variant holds the caller's writer untouched. The transcoding variants hand
/// the output of each write to the underlying writer before returning, except for a character
/// still split across writes, without flushing the underlying writer. Call
/// [`finish`](Self::finish) at the end of the stream to write out such a fragment.
#[derive(Debug)]
pub enum CharsetWriter<W: io::Write> {
    Passthrough(W),
    Decoding(Charset, DecodingWriter<W>),
    Encoding(Charset, EncodingWriter<W>),
}

impl<W: io::Write> CharsetWriter<W> {
    /// Returns `true` if no transcoding takes place.
    pub fn is_passthrough(&self) -> bool {
        matches!(self, CharsetWriter::Passthrough(_))
    }

    /// Returns the charset transcoded from or into, or `None` for a passthrough writer.
    pub fn charset(&self) -> Option<Charset> {
        match self {
            CharsetWriter::Passthrough(_) => None,
            CharsetWriter::Decoding(c, _) | CharsetWriter::Encoding(c, _) => Some(*c),
        }
    }

    /// Returns a reference to the writer supplied by the caller.
    pub fn get_ref(&self) -> &W {
        match self {
            CharsetWriter::Passthrough(w) => w,
            CharsetWriter::Decoding(_, w) => w.writer_ref(),
            CharsetWriter::Encoding(_, w) => w.writer_ref(),
        }
    }

    /// Flushes all buffered data, terminates the codec at the end of input, and returns the
    /// underlying writer.
    pub fn finish(self) -> io::Result<W> {
        let (mut writer, remainder, result) = match self {
            CharsetWriter::Passthrough(mut w) => {
                w.flush()?;
                return Ok(w);
            }
            CharsetWriter::Decoding(_, mut w) => {
                io::Write::flush(&mut w)?;
                w.finish()
            }
            CharsetWriter::Encoding(_, mut w) => {
                io::Write::flush(&mut w)?;
                w.finish()
            }
        };
        writer.write_all(&remainder)?;
        writer.flush()?;
        result.map(|_| writer)
    }
}

impl<W: io::Write> CharsetWriter<W> {
    /// Hands the transcoded bytes held in the adapter's buffer to the underlying writer.
    fn write_buffered(&mut self) -> io::Result<()> {
        match self {
            CharsetWriter::Passthrough(_) => Ok(()),
            CharsetWriter::Decoding(_, w) => w.write_buffered(),
            CharsetWriter::Encoding(_, w) => w.write_buffered(),
        }
    }
}

impl<W: io::Write> io::Write for CharsetWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // report a failure to deliver earlier output before consuming more input
        self.write_buffered()?;
        let n = match self {
            CharsetWriter::Passthrough(w) => return w.write(buf),
            CharsetWriter::Decoding(_, w) => w.write(buf)?,
            CharsetWriter::Encoding(_, w) => w.write(buf)?,
        };
        // `buf[..n]` is consumed either way; bytes left in the buffer go out with the next call
        if let Err(e) = self.write_buffered() {
            log::trace!("deferred transcoded output: {}", e);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            CharsetWriter::Passthrough(w) => w.flush(),
            CharsetWriter::Decoding(_, w) => w.flush(),
            CharsetWriter::Encoding(_, w) => w.flush(),
        }
    }

    fn write_fmt(&mut self, f: std::fmt::Arguments<'_>) -> io::Result<()> {
        self.write_buffered()?;
        let result = match self {
            CharsetWriter::Passthrough(w) => w.write_fmt(f),
            CharsetWriter::Decoding(_, w) => w.write_fmt(f),
            CharsetWriter::Encoding(_, w) => w.write_fmt(f),
        };
        result.and_then(|_| self.write_buffered())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Read, Write};

    use super::{decoding_reader, decoding_writer, encoding_reader, encoding_writer};
    use crate::Charset;

    #[test]
    fn passthrough_keeps_the_stream() {
        for charset in [Charset::Auto, Charset::Utf8] {
            let mut src = io::Cursor::new(b"\xff raw bytes".to_vec());
            let src_ptr: *const io::Cursor<Vec<u8>> = &src;

            {
                let reader = decoding_reader(charset, &mut src);
                assert!(reader.is_passthrough());
                assert_eq!(reader.charset(), None);
                assert!(std::ptr::eq(&**reader.get_ref(), src_ptr));
            }

            let mut dst = Vec::new();
            encoding_reader(charset, &mut src)
                .read_to_end(&mut dst)
                .unwrap();
            // bytes pass through without validation
            assert_eq!(dst, b"\xff raw bytes");

            let mut out = Vec::new();
            let out_ptr: *const Vec<u8> = &out;
            let mut writer = decoding_writer(charset, &mut out);
            assert!(std::ptr::eq(&**writer.get_ref(), out_ptr));
            writer.write_all(b"\xfe").unwrap();
            // unbuffered: visible before any flush
            assert_eq!(writer.get_ref().as_slice(), b"\xfe");
            let writer = encoding_writer(charset, writer.finish().unwrap());
            assert!(writer.is_passthrough());
            assert_eq!(writer.finish().unwrap().as_slice(), b"\xfe");
        }
    }

    #[test]
    fn writes_reach_the_writer_without_flush() {
        let mut out = Vec::new();
        let mut writer = decoding_writer(Charset::Gbk, &mut out);
        writer.write_all(&[0xd6, 0xd0, 0xce]).unwrap();
        // the dangling lead byte waits for its trail byte
        assert_eq!(writer.get_ref().as_slice(), "中".as_bytes());
        writer.write_all(&[0xc4]).unwrap();
        assert_eq!(writer.get_ref().as_slice(), "中文".as_bytes());

        let mut writer = encoding_writer(Charset::ShiftJis, Vec::new());
        writer.write_all("日本".as_bytes()).unwrap();
        assert_eq!(writer.get_ref(), &[0x93, 0xfa, 0x96, 0x7b]);
        write!(writer, "{}", "語").unwrap();
        assert_eq!(writer.get_ref(), &[0x93, 0xfa, 0x96, 0x7b, 0x8c, 0xea]);

        // io::copy never flushes its destination
        let mut writer = encoding_writer(Charset::Utf16Be, Vec::new());
        io::copy(&mut "ab".as_bytes(), &mut writer).unwrap();
        assert_eq!(writer.get_ref(), &[0x00, 0x61, 0x00, 0x62]);
    }

    #[test]
    fn gbk_scenario() {
        let mut reader = decoding_reader(Charset::from_name("gbk"), &b"\xd6\xd0\xce\xc4"[..]);
        assert_eq!(reader.charset(), Some(Charset::Gbk));
        let mut dst = String::new();
        reader.read_to_string(&mut dst).unwrap();
        assert_eq!(dst.chars().collect::<Vec<_>>(), ['\u{4e2d}', '\u{6587}']);
    }

    #[test]
    fn unmappable_characters_are_substituted() {
        let mut writer = encoding_writer(Charset::ShiftJis, Vec::new());
        writer.write_all("ok 👻 中".as_bytes()).unwrap();
        assert_eq!(writer.finish().unwrap(), b"ok &#128123; \x92\x86");

        let mut reader = encoding_reader(Charset::EucKr, "ok 👻".as_bytes());
        let mut dst = Vec::new();
        reader.read_to_end(&mut dst).unwrap();
        assert_eq!(dst, b"ok &#128123;");
    }

    #[test]
    fn malformed_input_is_substituted() {
        let mut reader = decoding_reader(Charset::Big5, &b"a\xffb\xa4"[..]);
        let mut dst = String::new();
        reader.read_to_string(&mut dst).unwrap();
        assert_eq!(dst, "a\u{fffd}b\u{fffd}");

        let mut writer = decoding_writer(Charset::ShiftJis, Vec::new());
        writer.write_all(b"a\xa0b\x93").unwrap();
        assert_eq!(writer.finish().unwrap(), "a\u{fffd}b\u{fffd}".as_bytes());

        let mut writer = encoding_writer(Charset::Gb18030, Vec::new());
        writer.write_all(b"a\xffb\xe4").unwrap();
        assert_eq!(
            writer.finish().unwrap(),
            b"a\x84\x31\xa4\x37b\x84\x31\xa4\x37"
        );
    }

    #[test]
    fn writer_errors_propagate() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::ErrorKind::BrokenPipe.into())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut writer = decoding_writer(Charset::Gbk, Broken);
        // the input is consumed; the output stays buffered
        writer.write_all(b"abc").unwrap();
        let e = writer.write(b"d").unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::BrokenPipe);
        let e = writer.flush().unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::BrokenPipe);

        let mut writer = encoding_writer(Charset::Utf8, Broken);
        let e = writer.write(b"x").unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn reader_errors_propagate() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::ErrorKind::ConnectionReset.into())
            }
        }

        for charset in Charset::ALL {
            let mut buf = [0u8; 16];
            let e = decoding_reader(charset, Broken).read(&mut buf).unwrap_err();
            assert_eq!(e.kind(), io::ErrorKind::ConnectionReset);
            let e = encoding_reader(charset, Broken).read(&mut buf).unwrap_err();
            assert_eq!(e.kind(), io::ErrorKind::ConnectionReset);
        }
    }
}
