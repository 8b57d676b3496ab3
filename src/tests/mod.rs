mod cases;

#[test]
fn ex_pty_session() -> std::io::Result<()> {
    use std::io::prelude::*;

    use super::{decoding_reader, encoding_writer, Charset};

    let charset: Charset = "ShiftJIS".parse().unwrap();
    assert_eq!(charset.code_page(), "932");

    // "Hello 世界" as printed by a Shift_JIS console
    let sjis: &[u8] = &[72, 101, 108, 108, 111, 32, 144, 162, 138, 69];

    let mut reader = decoding_reader(charset, sjis);
    let mut utf8 = String::new();
    reader.read_to_string(&mut utf8)?;
    assert_eq!(utf8, "Hello 世界");

    let mut writer = encoding_writer(charset, Vec::new());
    write!(writer, "{}", utf8)?;
    assert_eq!(writer.finish()?, sjis);

    Ok(())
}
