use std::io::{self, prelude::*};

use crate::{
    decoding_reader, decoding_writer, encoding_reader, encoding_writer, Charset, DecodingReader,
    DecodingWriter, EncodingReader, EncodingWriter, MalformedError, UnmappableError,
};

/// Tests the decoding reader returned by the wrap function.
#[test]
fn decoding_reader_high_level_api() {
    TEST_CASES.with(|cs| {
        for c in cs {
            let mut reader = decoding_reader(c.charset, c.encoded());
            assert_eq!(reader.charset(), Some(c.charset));
            let mut dst = String::new();
            reader.read_to_string(&mut dst).unwrap();
            assert_eq!(dst, c.decoded, "{}", c.charset);
        }
    });
}

/// Tests the encoding writer returned by the wrap function.
#[test]
fn encoding_writer_high_level_api() {
    TEST_CASES.with(|cs| {
        for c in cs {
            let mut writer = encoding_writer(c.charset, Vec::new());
            write!(writer, "{}", c.decoded).unwrap();
            assert_eq!(writer.finish().unwrap(), c.encoded(), "{}", c.charset);
        }
    });
}

/// Tests the encoding reader returned by the wrap function.
#[test]
fn encoding_reader_high_level_api() {
    TEST_CASES.with(|cs| {
        for c in cs {
            let mut reader = encoding_reader(c.charset, c.decoded.as_bytes());
            let mut dst = Vec::new();
            reader.read_to_end(&mut dst).unwrap();
            assert_eq!(dst, c.encoded(), "{}", c.charset);
        }
    });
}

/// Tests the decoding writer returned by the wrap function.
#[test]
fn decoding_writer_high_level_api() {
    TEST_CASES.with(|cs| {
        for c in cs {
            let mut writer = decoding_writer(c.charset, Vec::new());
            writer.write_all(c.encoded()).unwrap();
            let dst = writer.finish().unwrap();
            assert_eq!(String::from_utf8(dst).unwrap(), c.decoded, "{}", c.charset);
        }
    });
}

/// Tests the readers for byte-by-byte streaming.
#[test]
fn readers_byte_by_byte() {
    TEST_CASES.with(|cs| {
        for c in cs {
            let reader = decoding_reader(c.charset, OneByte(c.encoded()));
            let dst = read_byte_by_byte(reader);
            assert_eq!(String::from_utf8(dst).unwrap(), c.decoded, "{}", c.charset);

            let reader = encoding_reader(c.charset, OneByte(c.decoded.as_bytes()));
            assert_eq!(read_byte_by_byte(reader), c.encoded(), "{}", c.charset);
        }
    });
}

/// Tests the writers for byte-by-byte streaming.
#[test]
fn writers_byte_by_byte() {
    TEST_CASES.with(|cs| {
        for c in cs {
            // every complete character reaches the underlying writer before `finish`
            let writer = write_byte_by_byte(decoding_writer(c.charset, Vec::new()), c.encoded());
            assert_eq!(writer.get_ref(), c.decoded.as_bytes(), "{}", c.charset);
            let dst = writer.finish().unwrap();
            assert_eq!(String::from_utf8(dst).unwrap(), c.decoded, "{}", c.charset);

            let writer = encoding_writer(c.charset, Vec::new());
            let writer = write_byte_by_byte(writer, c.decoded.as_bytes());
            assert_eq!(writer.get_ref(), c.encoded(), "{}", c.charset);
            assert_eq!(writer.finish().unwrap(), c.encoded(), "{}", c.charset);
        }
    });
}

/// Tests the adapter types in report mode on valid input.
#[test]
fn reporting_adapters_accept_valid_input() {
    TEST_CASES.with(|cs| {
        for c in cs {
            let decoder = c.charset.new_decoder().unwrap();
            let mut reader = DecodingReader::new(io::BufReader::new(c.encoded()), decoder);
            let mut dst = String::new();
            reader.read_to_string(&mut dst).unwrap();
            assert_eq!(dst, c.decoded);
            assert!(matches!(reader.finish(), (_, v, Ok(())) if v.is_empty()));

            let encoder = c.charset.new_encoder().unwrap();
            let mut reader = EncodingReader::new(c.decoded.as_bytes(), encoder);
            let mut dst = Vec::new();
            reader.read_to_end(&mut dst).unwrap();
            assert_eq!(dst, c.encoded());
            assert!(matches!(reader.finish(), (_, v, Ok(())) if v.is_empty()));

            let encoder = c.charset.new_encoder().unwrap();
            let mut writer = EncodingWriter::new(Vec::new(), encoder);
            writer.write_all(c.decoded.as_bytes()).unwrap();
            writer.flush().unwrap();
            assert_eq!(writer.writer_ref(), c.encoded());
            assert!(matches!(writer.finish(), (_, v, Ok(())) if v.is_empty()));

            let decoder = c.charset.new_decoder().unwrap();
            let mut writer = DecodingWriter::new(Vec::new(), decoder);
            writer.write_all(c.encoded()).unwrap();
            writer.flush().unwrap();
            assert_eq!(writer.writer_ref(), c.decoded.as_bytes());
            assert!(matches!(writer.finish(), (_, v, Ok(())) if v.is_empty()));
        }
    });
}

/// Tests the bytes of well-known text against literal values.
#[test]
fn known_byte_sequences() {
    let cases: [(Charset, &str, &[u8]); 8] = [
        (Charset::Gbk, "中文", &[0xd6, 0xd0, 0xce, 0xc4]),
        (Charset::Gb18030, "中文", &[0xd6, 0xd0, 0xce, 0xc4]),
        (Charset::Big5, "中文", &[0xa4, 0xa4, 0xa4, 0xe5]),
        (Charset::ShiftJis, "日本", &[0x93, 0xfa, 0x96, 0x7b]),
        (Charset::EucKr, "한국어", &[0xc7, 0xd1, 0xb1, 0xb9, 0xbe, 0xee]),
        (Charset::Utf16Le, "中A", &[0x2d, 0x4e, 0x41, 0x00]),
        (Charset::Utf16Be, "中A", &[0x4e, 0x2d, 0x00, 0x41]),
        (Charset::Gb18030, "😀", &[0x94, 0x39, 0xfc, 0x36]),
    ];
    for (charset, text, bytes) in cases {
        let mut decoded = String::new();
        decoding_reader(charset, bytes)
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, text, "{}", charset);

        let mut writer = encoding_writer(charset, Vec::new());
        writer.write_all(text.as_bytes()).unwrap();
        assert_eq!(writer.finish().unwrap(), bytes, "{}", charset);
    }
}

#[test]
fn byte_order_mark_is_kept() {
    let mut dst = String::new();
    decoding_reader(Charset::Utf16Le, &[0xff, 0xfe, 0x41, 0x00][..])
        .read_to_string(&mut dst)
        .unwrap();
    assert_eq!(dst, "\u{feff}A");

    let mut writer = decoding_writer(Charset::Utf16Be, Vec::new());
    writer.write_all(&[0xfe, 0xff, 0x00, 0x41]).unwrap();
    assert_eq!(writer.finish().unwrap(), "\u{feff}A".as_bytes());

    let mut writer = encoding_writer(Charset::Utf16Le, Vec::new());
    writer.write_all("\u{feff}A".as_bytes()).unwrap();
    assert_eq!(writer.finish().unwrap(), [0xff, 0xfe, 0x41, 0x00]);
}

/// Tests that errors are reported only after the bytes preceding them are delivered.
#[test]
fn errors_follow_preceding_bytes() {
    let decoder = Charset::Gbk.new_decoder().unwrap();
    let mut reader = DecodingReader::new(&b"ab\xff\xd6\xd0"[..], decoder);
    let mut buf = [0u8; 16];
    assert_eq!(reader.read(&mut buf).unwrap(), 2);
    assert_eq!(&buf[..2], b"ab");
    let e = reader.read(&mut buf).unwrap_err();
    assert_eq!(e.kind(), io::ErrorKind::InvalidData);
    assert!(MalformedError::wrapped_in(&e).is_some());
    assert_eq!(reader.read(&mut buf).unwrap(), 3);
    assert_eq!(&buf[..3], "中".as_bytes());
    assert_eq!(reader.read(&mut buf).unwrap(), 0);

    let encoder = Charset::Big5.new_encoder().unwrap();
    let mut writer = EncodingWriter::new(Vec::new(), encoder);
    // the unmappable character is consumed along with the preceding bytes
    assert_eq!(writer.write("ab😀c".as_bytes()).unwrap(), 6);
    let e = writer.write(b"c").unwrap_err();
    assert_eq!(UnmappableError::wrapped_in(&e).unwrap().value(), '😀');
    assert_eq!(writer.write(b"c").unwrap(), 1);
    writer.flush().unwrap();
    assert_eq!(writer.writer_ref(), b"abc");
}

#[test]
fn passthrough_for_utf8_charsets() {
    for charset in [Charset::Auto, Charset::Utf8] {
        let src: &[u8] = b"not \xff UTF-8 \xe4";

        let mut dst = Vec::new();
        decoding_reader(charset, src).read_to_end(&mut dst).unwrap();
        assert_eq!(dst, src);

        let mut dst = Vec::new();
        encoding_reader(charset, src).read_to_end(&mut dst).unwrap();
        assert_eq!(dst, src);

        for mut writer in [
            decoding_writer(charset, Vec::new()),
            encoding_writer(charset, Vec::new()),
        ] {
            assert!(writer.is_passthrough());
            writer.write_all(src).unwrap();
            assert_eq!(writer.get_ref(), src);
        }
    }
}

#[test]
fn unknown_labels_resolve_to_utf8() {
    let charset = Charset::from_name("unknown-label");
    assert_eq!(charset, Charset::Utf8);
    assert_eq!(charset.code_page(), "65001");
    assert!(decoding_reader(charset, io::empty()).is_passthrough());

    let charset = Charset::from_name("gb2312");
    assert_eq!(charset, Charset::Gb18030);
    assert_eq!(charset.code_page(), "54936");
}

fn read_byte_by_byte(mut reader: impl Read) -> Vec<u8> {
    let mut dst = Vec::new();
    let mut buf = [0u8; 1];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => dst.extend(&buf[..n]),
            ret => panic!("assertion failed: {:?}", ret),
        }
    }
    dst
}

fn write_byte_by_byte<W: Write>(mut writer: W, mut src: &[u8]) -> W {
    while !src.is_empty() {
        match writer.write(&src[..1]) {
            Ok(1) => src = &src[1..],
            ret => panic!("assertion failed: {:?}", ret),
        }
    }
    writer
}

/// A reader that yields at most one byte per call.
struct OneByte<'a>(&'a [u8]);

impl Read for OneByte<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.0.len().min(buf.len()).min(1);
        buf[..n].copy_from_slice(&self.0[..n]);
        self.0 = &self.0[n..];
        Ok(n)
    }
}

thread_local! {
    static TEST_CASES: Vec<TestCase> = {
        const SAMPLES: &[(Charset, &str)] = &[
            (Charset::Gbk, "$ dir\r\n中文 测试 GBK 终端\r\n"),
            (Charset::Gb18030, "天坛公园 ✓ 😀 €\n"),
            (Charset::Big5, "Hello 世界 繁體中文\n"),
            (Charset::ShiftJis, "日本語のテキスト ｶﾀｶﾅ\n"),
            (Charset::EucKr, "한국어 텍스트\n"),
            (Charset::Utf16Le, "UTF-16 中文 😀\n"),
            (Charset::Utf16Be, "UTF-16 中文 😀\n"),
        ];

        let mut cases: Vec<TestCase> = SAMPLES
            .iter()
            .map(|&(charset, text)| TestCase::new(charset, text.to_owned()))
            .collect();
        // longer than the internal buffers
        cases.extend(
            SAMPLES
                .iter()
                .map(|&(charset, text)| TestCase::new(charset, text.repeat(500))),
        );
        cases
    };
}

struct TestCase {
    charset: Charset,
    decoded: String,
    encoded_bytes: Vec<u8>,
}

impl TestCase {
    fn new(charset: Charset, decoded: String) -> Self {
        let encoded_bytes = match charset {
            Charset::Utf16Le => decoded.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Charset::Utf16Be => decoded.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            _ => {
                let encoding = charset.encoding().unwrap();
                let (bytes, _, replaced) = encoding.encode(&decoded);
                assert!(!replaced, "{} cannot represent {:?}", charset, decoded);
                bytes.into_owned()
            }
        };
        Self {
            charset,
            decoded,
            encoded_bytes,
        }
    }

    fn encoded(&self) -> &[u8] {
        &self.encoded_bytes
    }
}
