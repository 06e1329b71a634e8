//! Provide the charset name table.
//!
//! Declared charset names are compared case-insensitively.

use std::{collections::BTreeMap, sync::LazyLock};

use encoding_rs::Encoding;

use crate::error::{XmlError, XmlErrorDomain, XmlParserErrors};

use super::XmlCharEncoding;

const CHARSET_NAMES: &[(&str, XmlCharEncoding)] = &[
    ("UTF-8", XmlCharEncoding::UTF8),
    ("UTF8", XmlCharEncoding::UTF8),
    ("US-ASCII", XmlCharEncoding::ASCII),
    ("ASCII", XmlCharEncoding::ASCII),
    ("ANSI_X3.4-1968", XmlCharEncoding::ASCII),
    ("ISO646-US", XmlCharEncoding::ASCII),
    ("IBM367", XmlCharEncoding::ASCII),
    ("CP367", XmlCharEncoding::ASCII),
    ("CSASCII", XmlCharEncoding::ASCII),
    ("UTF-16", XmlCharEncoding::UTF16),
    ("UTF16", XmlCharEncoding::UTF16),
    ("UTF-16BE", XmlCharEncoding::UTF16BE),
    ("UTF-16LE", XmlCharEncoding::UTF16LE),
    ("ISO-10646-UCS-2", XmlCharEncoding::UCS2),
    ("UCS-2", XmlCharEncoding::UCS2),
    ("UCS2", XmlCharEncoding::UCS2),
    ("CSUNICODE", XmlCharEncoding::UCS2),
    ("ISO-10646-UCS-4", XmlCharEncoding::UCS4),
    ("UCS-4", XmlCharEncoding::UCS4),
    ("UCS4", XmlCharEncoding::UCS4),
    ("CSUCS4", XmlCharEncoding::UCS4),
    ("UCS-4BE", XmlCharEncoding::UCS4BE),
    ("UCS-4LE", XmlCharEncoding::UCS4LE),
    ("EBCDIC-CP-US", XmlCharEncoding::EBCDIC),
    ("EBCDIC-CP-CA", XmlCharEncoding::EBCDIC),
    ("EBCDIC-CP-WT", XmlCharEncoding::EBCDIC),
    ("EBCDIC-CP-NL", XmlCharEncoding::EBCDIC),
    ("IBM037", XmlCharEncoding::EBCDIC),
    ("CP037", XmlCharEncoding::EBCDIC),
    ("CSIBM037", XmlCharEncoding::EBCDIC),
    ("ISO-8859-1", XmlCharEncoding::ISO8859_1),
    ("ISO_8859-1", XmlCharEncoding::ISO8859_1),
    ("ISO-LATIN-1", XmlCharEncoding::ISO8859_1),
    ("LATIN1", XmlCharEncoding::ISO8859_1),
    ("L1", XmlCharEncoding::ISO8859_1),
    ("IBM819", XmlCharEncoding::ISO8859_1),
    ("CP819", XmlCharEncoding::ISO8859_1),
    ("CSISOLATIN1", XmlCharEncoding::ISO8859_1),
    ("ISO-8859-2", XmlCharEncoding::ISO8859_2),
    ("ISO_8859-2", XmlCharEncoding::ISO8859_2),
    ("ISO-LATIN-2", XmlCharEncoding::ISO8859_2),
    ("LATIN2", XmlCharEncoding::ISO8859_2),
    ("L2", XmlCharEncoding::ISO8859_2),
    ("ISO-8859-3", XmlCharEncoding::ISO8859_3),
    ("LATIN3", XmlCharEncoding::ISO8859_3),
    ("ISO-8859-4", XmlCharEncoding::ISO8859_4),
    ("LATIN4", XmlCharEncoding::ISO8859_4),
    ("ISO-8859-5", XmlCharEncoding::ISO8859_5),
    ("CYRILLIC", XmlCharEncoding::ISO8859_5),
    ("ISO-8859-6", XmlCharEncoding::ISO8859_6),
    ("ARABIC", XmlCharEncoding::ISO8859_6),
    ("ISO-8859-7", XmlCharEncoding::ISO8859_7),
    ("GREEK", XmlCharEncoding::ISO8859_7),
    ("ISO-8859-8", XmlCharEncoding::ISO8859_8),
    ("HEBREW", XmlCharEncoding::ISO8859_8),
    ("ISO-8859-9", XmlCharEncoding::ISO8859_9),
    ("LATIN5", XmlCharEncoding::ISO8859_9),
    ("ISO-8859-10", XmlCharEncoding::ISO8859_10),
    ("LATIN6", XmlCharEncoding::ISO8859_10),
    ("ISO-8859-13", XmlCharEncoding::ISO8859_13),
    ("ISO-8859-14", XmlCharEncoding::ISO8859_14),
    ("ISO-8859-15", XmlCharEncoding::ISO8859_15),
    ("LATIN-9", XmlCharEncoding::ISO8859_15),
    ("ISO-8859-16", XmlCharEncoding::ISO8859_16),
    ("WINDOWS-1250", XmlCharEncoding::Windows1250),
    ("CP1250", XmlCharEncoding::Windows1250),
    ("WINDOWS-1251", XmlCharEncoding::Windows1251),
    ("CP1251", XmlCharEncoding::Windows1251),
    ("WINDOWS-1252", XmlCharEncoding::Windows1252),
    ("CP1252", XmlCharEncoding::Windows1252),
    ("ISO-2022-JP", XmlCharEncoding::ISO2022JP),
    ("CSISO2022JP", XmlCharEncoding::ISO2022JP),
    ("SHIFT_JIS", XmlCharEncoding::ShiftJIS),
    ("SJIS", XmlCharEncoding::ShiftJIS),
    ("MS_KANJI", XmlCharEncoding::ShiftJIS),
    ("CSSHIFTJIS", XmlCharEncoding::ShiftJIS),
    ("EUC-JP", XmlCharEncoding::EUCJP),
    ("EUCJP", XmlCharEncoding::EUCJP),
    ("CSEUCPKDFMTJAPANESE", XmlCharEncoding::EUCJP),
];

static CHARSET_TABLE: LazyLock<BTreeMap<&'static str, XmlCharEncoding>> =
    LazyLock::new(|| CHARSET_NAMES.iter().copied().collect());

/// The result of mapping a declared charset name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlCharset {
    /// The name maps to a canonical decoder.
    Canonical(XmlCharEncoding),
    /// The name is unknown to the table, but the platform decoding
    /// primitive accepts it as is.
    PassThrough(&'static Encoding),
}

impl XmlCharset {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Canonical(enc) => enc.get_name(),
            Self::PassThrough(enc) => enc.name(),
        }
    }

    /// Check if the charset has 16 or 32-bit code units.
    pub fn is_ucs_family(&self) -> bool {
        match self {
            Self::Canonical(enc) => enc.is_ucs_family(),
            Self::PassThrough(enc) => {
                *enc == encoding_rs::UTF_16LE || *enc == encoding_rs::UTF_16BE
            }
        }
    }
}

/// Check if `name` matches the `EncName` production.
///
/// `EncName ::= [A-Za-z] ([A-Za-z0-9._] | '-')*`
pub fn is_valid_encoding_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    bytes.next().is_some_and(|b| b.is_ascii_alphabetic())
        && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

/// Map the declared charset `name` to its canonical decoder id.
///
/// If `name` is unknown, it is rejected unless `allow_pass_through` is set
/// and the platform decoding primitive recognizes it.
pub fn convert_charset_name(name: &str, allow_pass_through: bool) -> Result<XmlCharset, XmlError> {
    if !is_valid_encoding_name(name) {
        return Err(XmlError::fatal(
            XmlErrorDomain::XmlFromI18N,
            XmlParserErrors::XmlErrEncodingName,
            format!("Invalid encoding name \"{name}\"\n"),
        )
        .with_str1(name.to_owned()));
    }
    if let Some(&enc) = CHARSET_TABLE.get(name.to_ascii_uppercase().as_str()) {
        return Ok(XmlCharset::Canonical(enc));
    }
    if allow_pass_through {
        if let Some(enc) = Encoding::for_label(name.as_bytes()) {
            return Ok(XmlCharset::PassThrough(enc));
        }
    }
    Err(XmlError::fatal(
        XmlErrorDomain::XmlFromI18N,
        XmlParserErrors::XmlErrUnsupportedEncoding,
        format!("Unsupported encoding {name}\n"),
    )
    .with_str1(name.to_owned()))
}

/// Return the preferred name of `enc`.
///
/// The returned name maps to `enc` again through [`convert_charset_name`].
pub fn reverse_charset_name(enc: XmlCharEncoding) -> &'static str {
    enc.get_name()
}

/// Return every charset name the table accepts.
pub fn charset_names() -> impl Iterator<Item = &'static str> {
    CHARSET_NAMES.iter().map(|&(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_round_trips() {
        for name in charset_names() {
            let Ok(XmlCharset::Canonical(enc)) = convert_charset_name(name, false) else {
                panic!("{name} is not accepted");
            };
            let reversed = reverse_charset_name(enc);
            assert_eq!(
                convert_charset_name(reversed, false).ok(),
                Some(XmlCharset::Canonical(enc)),
                "{name} -> {reversed}"
            );
        }
    }

    #[test]
    fn names_are_case_insensitive() {
        assert_eq!(
            convert_charset_name("utf-8", false).ok(),
            Some(XmlCharset::Canonical(XmlCharEncoding::UTF8))
        );
        assert_eq!(
            convert_charset_name("Iso-8859-1", false).ok(),
            Some(XmlCharset::Canonical(XmlCharEncoding::ISO8859_1))
        );
    }

    #[test]
    fn unknown_names_are_fatal() {
        let err = convert_charset_name("x-mac-cyrillic", false).unwrap_err();
        assert_eq!(err.code, XmlParserErrors::XmlErrUnsupportedEncoding);
        assert!(err.is_fatal());

        let err = convert_charset_name("1nvalid name", false).unwrap_err();
        assert_eq!(err.code, XmlParserErrors::XmlErrEncodingName);
    }

    #[test]
    fn pass_through_uses_platform_labels() {
        let charset = convert_charset_name("x-mac-cyrillic", true).unwrap();
        assert_eq!(charset, XmlCharset::PassThrough(encoding_rs::X_MAC_CYRILLIC));
        assert!(convert_charset_name("no-such-charset", true).is_err());
    }
}
