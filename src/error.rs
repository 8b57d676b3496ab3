use std::io;

/// The error type reported by the transcoding adapters when they encounter a malformed byte
/// sequence.
///
/// [`DecodingReader`] and [`DecodingWriter`] report this error when the decoder meets a byte
/// sequence that is invalid in the source encoding. [`EncodingReader`] and [`EncodingWriter`]
/// report it when their UTF-8 input is invalid.
///
/// The [`Read`] and [`Write`] implementations report this error in the form of
/// [`std::io::Error`] wrapping an instance of this type. Use [`MalformedError::wrapped_in`] to
/// recover it. Adapters switched to replace mode (and every adapter created by the wrap
/// functions such as [`decoding_reader`]) substitute U+FFFD instead and never report it.
///
/// [`DecodingReader`]: crate::DecodingReader
/// [`DecodingWriter`]: crate::DecodingWriter
/// [`EncodingReader`]: crate::EncodingReader
/// [`EncodingWriter`]: crate::EncodingWriter
/// [`decoding_reader`]: crate::decoding_reader
/// [`Read`]: std::io::Read
/// [`Write`]: std::io::Write
///
/// # Examples
///
/// ```rust
/// use std::io::Read as _;
///
/// use charset_rw::{Charset, DecodingReader, MalformedError};
///
/// // "中" in GBK, a stray 0xff, then "文"
/// let src: &[u8] = &[0xd6, 0xd0, 0xff, 0xce, 0xc4];
/// let decoder = Charset::Gbk.new_decoder().unwrap();
/// let mut reader = DecodingReader::new(src, decoder);
///
/// let mut dst = String::new();
/// while let Err(io_error) = reader.read_to_string(&mut dst) {
///     if MalformedError::wrapped_in(&io_error).is_some() {
///         dst.push('?');
///     } else {
///         panic!("found other error than MalformedError: {}", io_error);
///     }
/// }
///
/// assert_eq!(dst, "中?文");
/// ```
#[derive(Debug, thiserror::Error)]
#[error("encountered a malformed byte sequence")]
pub struct MalformedError(());

impl MalformedError {
    pub(crate) fn new() -> Self {
        Self(())
    }

    /// Wraps `self` in a [`std::io::Error`].
    pub(crate) fn wrap(self) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, self)
    }

    /// Returns a reference to the `MalformedError` value wrapped by a [`std::io::Error`] if it
    /// contains an inner error whose type is `MalformedError`, or returns `None` otherwise.
    #[inline]
    pub fn wrapped_in(io_error: &io::Error) -> Option<&Self> {
        io_error.get_ref().and_then(|e| e.downcast_ref::<Self>())
    }
}

/// The error type reported by [`EncodingReader`] and [`EncodingWriter`] when the destination
/// encoding cannot represent a character.
///
/// Like [`MalformedError`], it travels inside a [`std::io::Error`] of kind `InvalidData`, and
/// [`UnmappableError::wrapped_in`] recovers it. In replace mode the character is written as an
/// HTML numeric character reference (`&#128123;`) instead.
///
/// [`EncodingReader`]: crate::EncodingReader
/// [`EncodingWriter`]: crate::EncodingWriter
///
/// # Examples
///
/// ```rust
/// use std::io::Write as _;
///
/// use charset_rw::{Charset, EncodingWriter, UnmappableError};
///
/// let encoder = Charset::ShiftJis.new_encoder().unwrap();
/// let mut writer = EncodingWriter::new(Vec::new(), encoder);
///
/// let mut src = "猫🐈犬";
/// while !src.is_empty() {
///     match writer.write_str(src) {
///         Ok(n) => src = &src[n..],
///         Err(io_error) => match UnmappableError::wrapped_in(&io_error) {
///             Some(e) => assert_eq!(e.value(), '🐈'),
///             None => return Err(io_error),
///         },
///     }
/// }
/// writer.flush()?;
///
/// assert_eq!(writer.writer_ref(), &[0x94, 0x4c, 0x8c, 0xa2]);
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug, thiserror::Error)]
#[error("encountered an unmappable character: {0:?}")]
pub struct UnmappableError(char);

impl UnmappableError {
    pub(crate) fn new(unmappable_character: char) -> Self {
        Self(unmappable_character)
    }

    /// Wraps `self` in a [`std::io::Error`].
    pub(crate) fn wrap(self) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, self)
    }

    /// Returns the unmappable character value.
    #[inline]
    pub fn value(&self) -> char {
        self.0
    }

    /// Returns a reference to the `UnmappableError` value wrapped by a [`std::io::Error`] if it
    /// contains an inner error whose type is `UnmappableError`, or returns `None` otherwise.
    #[inline]
    pub fn wrapped_in(io_error: &io::Error) -> Option<&Self> {
        io_error.get_ref().and_then(|e| e.downcast_ref::<Self>())
    }
}
