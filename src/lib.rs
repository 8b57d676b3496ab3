//! Charset labels, code pages, and std::io::{Read, Write} transcoders for terminal streams
//!
//! This crate maps the charset labels a terminal session can be configured with to a
//! [`Charset`], resolves the numeric code page of each charset, and transcodes byte streams
//! between the charset and UTF-8 through [`std::io::Read`] and [`std::io::Write`] adapters
//! built on [`encoding_rs`].
//!
//! ```rust
//! use std::io::prelude::*;
//!
//! use charset_rw::{decoding_reader, encoding_writer, Charset};
//!
//! let charset = Charset::from_name("gbk");
//! assert_eq!(charset.code_page(), "936");
//!
//! // terminal output, GBK bytes decoded into UTF-8
//! let pty_out: &[u8] = &[0xd6, 0xd0, 0xce, 0xc4];
//! let mut utf8 = String::new();
//! decoding_reader(charset, pty_out).read_to_string(&mut utf8)?;
//! assert_eq!(utf8, "中文");
//!
//! // client input, UTF-8 encoded into GBK
//! let mut pty_in = encoding_writer(charset, Vec::new());
//! write!(pty_in, "{}", utf8)?;
//! assert_eq!(pty_in.finish()?, [0xd6, 0xd0, 0xce, 0xc4]);
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! The wrap functions substitute invalid input: malformed byte sequences become U+FFFD and
//! characters the charset cannot represent become HTML numeric character references. A UTF-8
//! charset ([`Charset::Utf8`] or [`Charset::Auto`]) returns the stream itself, unbuffered.
//!
//! The adapter types can also be used directly. By default they report invalid input as
//! non-fatal [`std::io::Error`]s wrapping [`MalformedError`] or [`UnmappableError`] after
//! delivering the bytes that precede it.
//!
//! ```rust
//! use std::io::prelude::*;
//!
//! use charset_rw::{Charset, EncodingWriter, UnmappableError};
//!
//! let mut writer = EncodingWriter::new(Vec::new(), Charset::EucKr.new_encoder().unwrap());
//! write!(writer, "한국어 😀")?;
//! let e = writer.flush().unwrap_err();
//! assert_eq!(UnmappableError::wrapped_in(&e).map(|e| e.value()), Some('😀'));
//! # Ok::<(), std::io::Error>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

mod adapter;
mod charset;
mod codec;
mod error;
mod reader;
mod writer;

mod bufwriter;
mod util;

pub use adapter::{
    decoding_reader, decoding_writer, encoding_reader, encoding_writer, CharsetReader,
    CharsetWriter,
};
pub use charset::{Charset, UTF8_CODE_PAGE};
pub use codec::TextEncoder;
pub use error::{MalformedError, UnmappableError};
pub use reader::{DecodingReader, EncodingReader};
pub use writer::{DecodingWriter, EncodingWriter};

#[cfg(test)]
mod tests;
