use std::{fmt, ops};

use encoding_rs::{Decoder, DecoderResult, Encoder, EncoderResult, Encoding};
use encoding_rs::{UTF_16BE, UTF_16LE};

/// An encoder from UTF-8 into a destination encoding.
///
/// This is a thin wrapper of [`encoding_rs::Encoder`] that can also encode into UTF-16LE and
/// UTF-16BE. Per the Encoding Standard, `encoding_rs` only decodes UTF-16, and
/// `UTF_16LE.new_encoder()` returns an encoder whose output encoding is UTF-8. Use
/// [`TextEncoder::for_encoding`] or [`Charset::new_encoder`](crate::Charset::new_encoder) to get
/// a real UTF-16 encoder.
///
/// # Examples
///
/// ```rust
/// use std::io::Write as _;
///
/// use charset_rw::{EncodingWriter, TextEncoder};
///
/// let mut writer = EncodingWriter::new(Vec::new(), TextEncoder::for_encoding(encoding_rs::UTF_16BE));
/// write!(writer, "中😂")?;
/// writer.flush()?;
/// assert_eq!(writer.writer_ref(), &[0x4e, 0x2d, 0xd8, 0x3d, 0xde, 0x02]);
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct TextEncoder(Inner);

enum Inner {
    Standard(Encoder),
    Utf16 { big_endian: bool },
}

impl TextEncoder {
    /// Creates an encoder into the specified encoding.
    pub fn for_encoding(encoding: &'static Encoding) -> Self {
        if encoding == UTF_16LE {
            Self(Inner::Utf16 { big_endian: false })
        } else if encoding == UTF_16BE {
            Self(Inner::Utf16 { big_endian: true })
        } else {
            Self(Inner::Standard(encoding.new_encoder()))
        }
    }

    /// Returns the destination encoding.
    pub fn encoding(&self) -> &'static Encoding {
        match &self.0 {
            Inner::Standard(e) => e.encoding(),
            Inner::Utf16 { big_endian: false } => UTF_16LE,
            Inner::Utf16 { big_endian: true } => UTF_16BE,
        }
    }

    /// Encodes a prefix of `src` into `dst`, returning the unmappable character that stopped the
    /// encoder (if any), the number of bytes read, and the number of bytes written.
    ///
    /// With `replace`, unmappable characters are written as HTML numeric character references
    /// and `None` is always returned; `dst` should then have room for at least ten bytes.
    pub(crate) fn encode(
        &mut self,
        src: &str,
        dst: &mut [u8],
        last: bool,
        replace: bool,
    ) -> (Option<char>, usize, usize) {
        match &mut self.0 {
            Inner::Standard(encoder) if replace => {
                let (_, read, written, had_unmappables) =
                    encoder.encode_from_utf8(src, dst, last);
                if had_unmappables {
                    log::trace!(
                        "replaced characters unmappable in {} with numeric character references",
                        encoder.encoding().name()
                    );
                }
                (None, read, written)
            }
            Inner::Standard(encoder) => {
                let (result, read, written) =
                    encoder.encode_from_utf8_without_replacement(src, dst, last);
                match result {
                    EncoderResult::Unmappable(c) => (Some(c), read, written),
                    EncoderResult::InputEmpty | EncoderResult::OutputFull => (None, read, written),
                }
            }
            Inner::Utf16 { big_endian } => {
                let (read, written) = encode_utf16(src, dst, *big_endian);
                (None, read, written)
            }
        }
    }

    /// Returns the maximum number of bytes written by a call to `encode` with empty input.
    pub(crate) fn max_tail_length(&self) -> usize {
        match &self.0 {
            Inner::Standard(e) => e
                .max_buffer_length_from_utf8_without_replacement(0)
                .unwrap_or(0),
            Inner::Utf16 { .. } => 0,
        }
    }
}

impl From<Encoder> for TextEncoder {
    fn from(value: Encoder) -> Self {
        Self(Inner::Standard(value))
    }
}

impl fmt::Debug for TextEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextEncoder")
            .field("encoding()", self.encoding())
            .finish()
    }
}

fn encode_utf16(src: &str, dst: &mut [u8], big_endian: bool) -> (usize, usize) {
    let (mut read, mut written) = (0, 0);
    for c in src.chars() {
        let mut units = [0u16; 2];
        let units = c.encode_utf16(&mut units);
        if dst.len() - written < units.len() * 2 {
            break;
        }
        for u in units.iter() {
            let bytes = if big_endian {
                u.to_be_bytes()
            } else {
                u.to_le_bytes()
            };
            dst[written..written + 2].copy_from_slice(&bytes);
            written += 2;
        }
        read += c.len_utf8();
    }
    (read, written)
}

/// Implements `Debug` for `encoding_rs::Decoder` and adds a single decode step used by the
/// decoding adapters.
pub(crate) struct TextDecoder(Decoder);

impl TextDecoder {
    /// Decodes a prefix of `src` into `dst`, returning whether the decoder stopped at a malformed
    /// sequence, the number of bytes read, and the number of bytes written.
    ///
    /// With `replace`, malformed sequences are written as U+FFFD and `false` is always returned.
    pub fn decode(
        &mut self,
        src: &[u8],
        dst: &mut [u8],
        last: bool,
        replace: bool,
    ) -> (bool, usize, usize) {
        if replace {
            let (_, read, written, had_errors) = self.0.decode_to_utf8(src, dst, last);
            if had_errors {
                log::trace!(
                    "replaced malformed {} input with U+FFFD",
                    self.0.encoding().name()
                );
            }
            (false, read, written)
        } else {
            let (result, read, written) =
                self.0.decode_to_utf8_without_replacement(src, dst, last);
            (
                matches!(result, DecoderResult::Malformed(..)),
                read,
                written,
            )
        }
    }

    /// Replaces the decoder with a fresh one for the same encoding.
    pub fn reset(&mut self) {
        self.0 = self.0.encoding().new_decoder_without_bom_handling();
    }
}

impl fmt::Debug for TextDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("encoding()", self.0.encoding())
            .finish()
    }
}

impl From<Decoder> for TextDecoder {
    fn from(value: Decoder) -> Self {
        Self(value)
    }
}

impl ops::Deref for TextDecoder {
    type Target = Decoder;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
