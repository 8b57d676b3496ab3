use std::{convert::Infallible, fmt, str};

use encoding_rs::{Decoder, Encoding};

use super::codec::TextEncoder;

/// The code page of UTF-8, reported for any charset without an entry of its own.
pub const UTF8_CODE_PAGE: &str = "65001";

/// A text encoding a terminal session can be configured with.
///
/// The set is closed. [`Charset::Auto`] is not a detection mode: it behaves exactly like
/// [`Charset::Utf8`] but stays a distinct value so that configuration can tell the two apart.
///
/// # Examples
///
/// ```rust
/// use charset_rw::Charset;
///
/// let charset = Charset::from_name("gb2312");
/// assert_eq!(charset, Charset::Gb18030);
/// assert_eq!(charset.code_page(), "54936");
///
/// let charset: Charset = "unknown-label".parse().unwrap();
/// assert_eq!(charset, Charset::Utf8);
/// assert_eq!(charset.code_page(), "65001");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "String", into = "&'static str"))]
pub enum Charset {
    Auto,
    #[default]
    Utf8,
    Gbk,
    Big5,
    ShiftJis,
    EucKr,
    Gb18030,
    Utf16Le,
    Utf16Be,
}

const CODE_PAGES: &[(Charset, &str)] = &[
    (Charset::Utf8, "65001"),
    (Charset::Auto, "65001"),
    (Charset::Utf16Le, "1200"),
    (Charset::Utf16Be, "1200"),
    (Charset::Gbk, "936"),
    (Charset::Gb18030, "54936"),
    (Charset::Big5, "950"),
    (Charset::EucKr, "949"),
    (Charset::ShiftJis, "932"),
];

/// Upper-case labels accepted by [`Charset::from_name`].
const ALIASES: &[(&str, Charset)] = &[
    ("GBK", Charset::Gbk),
    ("BIG5", Charset::Big5),
    ("BIG5-HKSCS", Charset::Big5),
    ("SHIFTJIS", Charset::ShiftJis),
    ("KS_C_5601", Charset::EucKr),
    ("GB18030", Charset::Gb18030),
    ("GB2312", Charset::Gb18030),
    ("UTF-16", Charset::Utf16Le),
    ("UTF-16-L", Charset::Utf16Le),
    ("UTF-16-B", Charset::Utf16Be),
    ("AUTO", Charset::Auto),
];

impl Charset {
    /// Every charset, in declaration order.
    pub const ALL: [Charset; 9] = [
        Charset::Auto,
        Charset::Utf8,
        Charset::Gbk,
        Charset::Big5,
        Charset::ShiftJis,
        Charset::EucKr,
        Charset::Gb18030,
        Charset::Utf16Le,
        Charset::Utf16Be,
    ];

    /// Resolves a case-insensitive label.
    ///
    /// Labels not recognized fall back to [`Charset::Utf8`], so this never fails.
    pub fn from_name(name: &str) -> Self {
        let upper = name.to_uppercase();
        match ALIASES.iter().find(|(label, _)| *label == upper) {
            Some(&(_, charset)) => charset,
            None => {
                log::debug!("unrecognized charset label {:?}, using UTF-8", name);
                Charset::Utf8
            }
        }
    }

    /// Returns the canonical label, which [`from_name`](Self::from_name) maps back to `self`.
    pub fn label(self) -> &'static str {
        match self {
            Charset::Auto => "AUTO",
            Charset::Utf8 => "UTF-8",
            Charset::Gbk => "GBK",
            Charset::Big5 => "BIG5",
            Charset::ShiftJis => "SHIFTJIS",
            Charset::EucKr => "KS_C_5601",
            Charset::Gb18030 => "GB18030",
            Charset::Utf16Le => "UTF-16-L",
            Charset::Utf16Be => "UTF-16-B",
        }
    }

    /// Returns the numeric code page used to configure a terminal for this charset, e.g. with
    /// `chcp`.
    pub fn code_page(self) -> &'static str {
        CODE_PAGES
            .iter()
            .find(|(charset, _)| *charset == self)
            .map_or(UTF8_CODE_PAGE, |&(_, code_page)| code_page)
    }

    /// Returns the encoding to transcode from and to, or `None` if the stream is UTF-8 already.
    pub fn encoding(self) -> Option<&'static Encoding> {
        match self {
            Charset::Auto | Charset::Utf8 => None,
            Charset::Gbk => Some(encoding_rs::GBK),
            Charset::Big5 => Some(encoding_rs::BIG5),
            Charset::ShiftJis => Some(encoding_rs::SHIFT_JIS),
            Charset::EucKr => Some(encoding_rs::EUC_KR),
            Charset::Gb18030 => Some(encoding_rs::GB18030),
            Charset::Utf16Le => Some(encoding_rs::UTF_16LE),
            Charset::Utf16Be => Some(encoding_rs::UTF_16BE),
        }
    }

    /// Returns `true` if streams in this charset need no transcoding.
    pub fn is_passthrough(self) -> bool {
        self.encoding().is_none()
    }

    /// Creates a decoder into UTF-8, or returns `None` for a passthrough charset.
    ///
    /// The decoder does not sniff a byte order mark; a BOM is decoded as U+FEFF.
    pub fn new_decoder(self) -> Option<Decoder> {
        self.encoding()
            .map(Encoding::new_decoder_without_bom_handling)
    }

    /// Creates an encoder from UTF-8, or returns `None` for a passthrough charset.
    pub fn new_encoder(self) -> Option<TextEncoder> {
        self.encoding().map(TextEncoder::for_encoding)
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl str::FromStr for Charset {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl From<String> for Charset {
    fn from(value: String) -> Self {
        Self::from_name(&value)
    }
}

impl From<Charset> for &'static str {
    fn from(value: Charset) -> Self {
        value.label()
    }
}
