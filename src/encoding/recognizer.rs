//! Provide the encoding sniffers used when a byte stream has no declared encoding.
//!
//! Recognizers are tried from the most recently registered one. The first one
//! claiming the leading bytes builds the decoder. If none claims them, the
//! stream is read as UTF-8.

use std::io::Cursor;

use crate::{
    error::{XmlError, XmlErrorDomain, XmlParserErrors},
    generic_error,
    globals::get_parser_debug_entities,
    io::XmlRewindableInput,
};

use super::{
    XmlCharChunk, XmlCharEncoding, XmlCharset, XmlStreamDecoder, convert_charset_name,
    new_charset_decoder, new_decoder,
};

/// The number of leading bytes a recognizer may inspect to claim a stream.
pub const RECOGNIZER_HEAD_SIZE: usize = 4;
/// The number of leading bytes read for the declaration prescan.
const DECL_PRESCAN_SIZE: usize = 1024;

/// An encoding sniffer.
pub trait XmlRecognizer {
    /// Check whether this recognizer claims a stream starting with `head`.
    ///
    /// `head` holds at most [`RECOGNIZER_HEAD_SIZE`] bytes.
    fn claims(&self, head: &[u8]) -> bool;

    /// Build the decoder of a claimed stream.
    ///
    /// If `xml_decl_expected` is set, the recognizer may prescan a declaration
    /// to find the declared encoding. `input` is always read from its first byte.
    fn create_decoder(
        &self,
        input: XmlRewindableInput,
        xml_decl_expected: bool,
        allow_pass_through: bool,
    ) -> Result<Box<dyn XmlStreamDecoder>, XmlError>;
}

/// Return the value of the `encoding` pseudo-attribute of an XML or text declaration.
pub fn scan_declared_encoding(decl: &str) -> Option<&str> {
    let is_blank = |c: char| matches!(c, ' ' | '\t' | '\r' | '\n');
    let rest = decl.strip_prefix("<?xml")?;
    if !rest.starts_with(is_blank) {
        return None;
    }
    let mut rest = &rest[..rest.find("?>").unwrap_or(rest.len())];
    loop {
        rest = rest.trim_start_matches(is_blank);
        let (name, value) = rest.split_once('=')?;
        let name = name.trim_end_matches(is_blank);
        let value = value.trim_start_matches(is_blank);
        let quote = value.chars().next().filter(|&c| c == '"' || c == '\'')?;
        let close = value[1..].find(quote)? + 1;
        if name == "encoding" {
            return Some(&value[1..close]);
        }
        rest = &value[close + 1..];
    }
}

/// Decode the declaration at the head of `input` with a throwaway decoder.
fn prescan_declaration(
    input: &mut XmlRewindableInput,
    enc: XmlCharEncoding,
) -> Result<Option<String>, XmlError> {
    let head = input.peek(DECL_PRESCAN_SIZE)?.to_vec();
    let mut decoder = new_decoder(enc, Box::new(Cursor::new(head)));
    let mut chunk = XmlCharChunk::new();
    decoder.refill(&mut chunk, DECL_PRESCAN_SIZE)?;
    let text = String::from_utf16_lossy(chunk.units());
    Ok(scan_declared_encoding(&text).map(|name| name.to_owned()))
}

/// Map the declared encoding of an 8-bit family stream.
///
/// A 16/32-bit UCS encoding cannot be declared in an 8-bit stream.
fn map_declared_encoding(
    declared: &str,
    family: XmlCharEncoding,
    allow_pass_through: bool,
) -> Result<XmlCharset, XmlError> {
    let charset = convert_charset_name(declared, allow_pass_through)?;
    if charset.is_ucs_family() {
        return Err(XmlError::fatal(
            XmlErrorDomain::XmlFromI18N,
            XmlParserErrors::XmlErrMismatchedEncoding,
            format!(
                "Document labelled {declared} but has {} content\n",
                family.get_name()
            ),
        )
        .with_str1(declared.to_owned()));
    }
    Ok(charset)
}

fn create_declared_decoder(
    mut input: XmlRewindableInput,
    family: XmlCharEncoding,
    xml_decl_expected: bool,
    allow_pass_through: bool,
) -> Result<Box<dyn XmlStreamDecoder>, XmlError> {
    let declared = if xml_decl_expected {
        prescan_declaration(&mut input, family)?
    } else {
        None
    };
    let charset = match declared.as_deref() {
        Some(declared) => map_declared_encoding(declared, family, allow_pass_through)?,
        None => XmlCharset::Canonical(family),
    };
    if get_parser_debug_entities() {
        generic_error!(
            "Recognized {} stream, decoding as {}\n",
            family.get_name(),
            charset.name()
        );
    }
    Ok(new_charset_decoder(charset, input.rewind()))
}

/// Recognize UTF-8 and ASCII compatible streams starting with `<?xml` or a UTF-8 BOM.
pub struct XmlUtf8Recognizer;

impl XmlRecognizer for XmlUtf8Recognizer {
    fn claims(&self, head: &[u8]) -> bool {
        head.starts_with(b"<?xm") || head.starts_with(&[0xEF, 0xBB, 0xBF])
    }

    fn create_decoder(
        &self,
        input: XmlRewindableInput,
        xml_decl_expected: bool,
        allow_pass_through: bool,
    ) -> Result<Box<dyn XmlStreamDecoder>, XmlError> {
        create_declared_decoder(
            input,
            XmlCharEncoding::UTF8,
            xml_decl_expected,
            allow_pass_through,
        )
    }
}

/// Recognize UTF-16 and UCS-4 streams from a BOM or from the encoding of `<`.
pub struct XmlUcsRecognizer;

impl XmlUcsRecognizer {
    fn detect(head: &[u8]) -> Option<XmlCharEncoding> {
        match head {
            [0x00, 0x00, 0xFE, 0xFF, ..] | [0xFF, 0xFE, 0x00, 0x00, ..] => {
                Some(XmlCharEncoding::UCS4)
            }
            [0x00, 0x00, 0x00, 0x3C, ..] => Some(XmlCharEncoding::UCS4BE),
            [0x3C, 0x00, 0x00, 0x00, ..] => Some(XmlCharEncoding::UCS4LE),
            [0xFE, 0xFF, ..] | [0xFF, 0xFE, ..] => Some(XmlCharEncoding::UTF16),
            [0x00, 0x3C, 0x00, 0x3F, ..] => Some(XmlCharEncoding::UTF16BE),
            [0x3C, 0x00, 0x3F, 0x00, ..] => Some(XmlCharEncoding::UTF16LE),
            _ => None,
        }
    }
}

impl XmlRecognizer for XmlUcsRecognizer {
    fn claims(&self, head: &[u8]) -> bool {
        Self::detect(head).is_some()
    }

    fn create_decoder(
        &self,
        mut input: XmlRewindableInput,
        _xml_decl_expected: bool,
        _allow_pass_through: bool,
    ) -> Result<Box<dyn XmlStreamDecoder>, XmlError> {
        let enc =
            Self::detect(input.peek(RECOGNIZER_HEAD_SIZE)?).unwrap_or(XmlCharEncoding::UTF16);
        if get_parser_debug_entities() {
            generic_error!("Recognized {} stream\n", enc.get_name());
        }
        Ok(new_decoder(enc, input.rewind()))
    }
}

/// Recognize EBCDIC streams starting with `<?xm`.
pub struct XmlEbcdicRecognizer;

impl XmlRecognizer for XmlEbcdicRecognizer {
    fn claims(&self, head: &[u8]) -> bool {
        head.starts_with(&[0x4C, 0x6F, 0xA7, 0x94])
    }

    fn create_decoder(
        &self,
        input: XmlRewindableInput,
        xml_decl_expected: bool,
        allow_pass_through: bool,
    ) -> Result<Box<dyn XmlStreamDecoder>, XmlError> {
        create_declared_decoder(
            input,
            XmlCharEncoding::EBCDIC,
            xml_decl_expected,
            allow_pass_through,
        )
    }
}

/// The ordered recognizer chain.
pub struct XmlRecognizerChain {
    recognizers: Vec<Box<dyn XmlRecognizer>>,
}

impl XmlRecognizerChain {
    /// Create a chain holding the built-in recognizers.
    pub fn new() -> Self {
        let mut chain = Self::empty();
        chain.register(Box::new(XmlEbcdicRecognizer));
        chain.register(Box::new(XmlUcsRecognizer));
        chain.register(Box::new(XmlUtf8Recognizer));
        chain
    }

    /// Create a chain without any recognizer.
    pub fn empty() -> Self {
        Self {
            recognizers: vec![],
        }
    }

    /// Register `recognizer`. It is tried before every recognizer registered earlier.
    pub fn register(&mut self, recognizer: Box<dyn XmlRecognizer>) {
        self.recognizers.push(recognizer);
    }

    pub fn len(&self) -> usize {
        self.recognizers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recognizers.is_empty()
    }

    /// Build the decoder of `input`.
    pub fn recognize(
        &self,
        mut input: XmlRewindableInput,
        xml_decl_expected: bool,
        allow_pass_through: bool,
    ) -> Result<Box<dyn XmlStreamDecoder>, XmlError> {
        let head = input.peek(RECOGNIZER_HEAD_SIZE)?.to_vec();
        match self.recognizers.iter().rev().find(|r| r.claims(&head)) {
            Some(recognizer) => {
                recognizer.create_decoder(input, xml_decl_expected, allow_pass_through)
            }
            None => Ok(new_decoder(XmlCharEncoding::UTF8, input.rewind())),
        }
    }
}

impl Default for XmlRecognizerChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(chain: &XmlRecognizerChain, bytes: &[u8]) -> Result<(String, String), XmlError> {
        decode_with(chain, bytes, false)
    }

    fn decode_with(
        chain: &XmlRecognizerChain,
        bytes: &[u8],
        allow_pass_through: bool,
    ) -> Result<(String, String), XmlError> {
        let input = XmlRewindableInput::new(Box::new(Cursor::new(bytes.to_vec())));
        let mut decoder = chain.recognize(input, true, allow_pass_through)?;
        let mut chunk = XmlCharChunk::new();
        let mut text = vec![];
        while !chunk.is_terminated() {
            decoder.refill(&mut chunk, 16)?;
            text.extend_from_slice(chunk.units());
        }
        Ok((
            decoder.encoding_name().to_owned(),
            String::from_utf16_lossy(&text),
        ))
    }

    #[test]
    fn scan_encoding_declarations() {
        assert_eq!(
            scan_declared_encoding("<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><doc/>"),
            Some("ISO-8859-1")
        );
        assert_eq!(
            scan_declared_encoding("<?xml encoding = 'UTF-8' ?>"),
            Some("UTF-8")
        );
        assert_eq!(scan_declared_encoding("<?xml version='1.0'?>"), None);
        assert_eq!(scan_declared_encoding("<?xml-stylesheet href='a'?>"), None);
        assert_eq!(scan_declared_encoding("<doc/>"), None);
    }

    #[test]
    fn declared_latin1() {
        let chain = XmlRecognizerChain::new();
        let (name, text) = decode(
            &chain,
            b"<?xml version='1.0' encoding='ISO-8859-1'?><d>\xE9</d>",
        )
        .unwrap();
        assert_eq!(name, "ISO-8859-1");
        assert!(text.ends_with("<d>\u{e9}</d>"));
    }

    #[test]
    fn undeclared_defaults_to_utf8() {
        let chain = XmlRecognizerChain::new();
        let (name, text) = decode(&chain, "<d>\u{3042}</d>".as_bytes()).unwrap();
        assert_eq!(name, "UTF-8");
        assert_eq!(text, "<d>\u{3042}</d>");
    }

    #[test]
    fn ucs_patterns() {
        let chain = XmlRecognizerChain::new();
        let (name, text) = decode(&chain, &[0x00, 0x3C, 0x00, 0x3F, 0x00, 0x78]).unwrap();
        assert_eq!((name.as_str(), text.as_str()), ("UTF-16BE", "<?x"));
        let (name, text) = decode(&chain, &[0xFF, 0xFE, 0x3C, 0x00]).unwrap();
        assert_eq!((name.as_str(), text.as_str()), ("UTF-16", "<"));
        let (name, _) = decode(&chain, &[0x3C, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(name, "UCS-4LE");
    }

    #[test]
    fn ebcdic_with_declaration() {
        let chain = XmlRecognizerChain::new();
        // <?xml?>
        let (name, text) = decode(&chain, &[0x4C, 0x6F, 0xA7, 0x94, 0x93, 0x6F, 0x6E]).unwrap();
        assert_eq!(name, "EBCDIC-CP-US");
        assert_eq!(text, "<?xml?>");
    }

    #[test]
    fn ucs_declared_in_utf8_stream_is_mismatch() {
        let chain = XmlRecognizerChain::new();
        let err = decode(&chain, b"<?xml version='1.0' encoding='UTF-16'?><d/>").unwrap_err();
        assert_eq!(err.code, XmlParserErrors::XmlErrMismatchedEncoding);
        assert!(err.is_fatal());
        let err = decode(&chain, b"<?xml version='1.0' encoding='ISO-10646-UCS-4'?>").unwrap_err();
        assert_eq!(err.code, XmlParserErrors::XmlErrMismatchedEncoding);
    }

    #[test]
    fn ucs_label_known_only_to_the_platform_is_mismatch() {
        let chain = XmlRecognizerChain::new();
        let bytes = b"<?xml version='1.0' encoding='unicodefffe'?><d/>";
        let err = decode_with(&chain, bytes, true).unwrap_err();
        assert_eq!(err.code, XmlParserErrors::XmlErrMismatchedEncoding);
        assert_eq!(err.str1.as_deref(), Some("unicodefffe"));
        // without pass-through the label is not even accepted
        let err = decode_with(&chain, bytes, false).unwrap_err();
        assert_eq!(err.code, XmlParserErrors::XmlErrUnsupportedEncoding);
    }

    /// Encode ASCII text as IBM037.
    fn ebcdic(text: &str) -> Vec<u8> {
        text.bytes()
            .map(|b| match b {
                b' ' => 0x40,
                b'<' => 0x4C,
                b'?' => 0x6F,
                b'>' => 0x6E,
                b'=' => 0x7E,
                b'\'' => 0x7D,
                b'-' => 0x60,
                b'/' => 0x61,
                b'.' => 0x4B,
                b'0'..=b'9' => 0xF0 + (b - b'0'),
                b'a'..=b'i' => 0x81 + (b - b'a'),
                b'j'..=b'r' => 0x91 + (b - b'j'),
                b's'..=b'z' => 0xA2 + (b - b's'),
                b'A'..=b'I' => 0xC1 + (b - b'A'),
                b'J'..=b'R' => 0xD1 + (b - b'J'),
                b'S'..=b'Z' => 0xE2 + (b - b'S'),
                _ => panic!("no IBM037 mapping for {b:#x}"),
            })
            .collect()
    }

    #[test]
    fn ucs_declared_in_ebcdic_stream_is_mismatch() {
        let chain = XmlRecognizerChain::new();
        let (name, text) = decode(&chain, &ebcdic("<?xml version='1.0'?><d/>")).unwrap();
        assert_eq!(name, "EBCDIC-CP-US");
        assert_eq!(text, "<?xml version='1.0'?><d/>");

        let bytes = ebcdic("<?xml version='1.0' encoding='UTF-16'?><d/>");
        let err = decode(&chain, &bytes).unwrap_err();
        assert_eq!(err.code, XmlParserErrors::XmlErrMismatchedEncoding);
        assert!(err.is_fatal());
        assert!(
            err.message
                .as_deref()
                .unwrap()
                .contains("labelled UTF-16 but has EBCDIC-CP-US content")
        );
    }

    #[test]
    fn unsupported_declared_encoding() {
        let chain = XmlRecognizerChain::new();
        let err = decode(&chain, b"<?xml version='1.0' encoding='x-unknown'?>").unwrap_err();
        assert_eq!(err.code, XmlParserErrors::XmlErrUnsupportedEncoding);
    }

    struct Latin1Everything;

    impl XmlRecognizer for Latin1Everything {
        fn claims(&self, _head: &[u8]) -> bool {
            true
        }

        fn create_decoder(
            &self,
            input: XmlRewindableInput,
            _xml_decl_expected: bool,
            _allow_pass_through: bool,
        ) -> Result<Box<dyn XmlStreamDecoder>, XmlError> {
            Ok(new_decoder(XmlCharEncoding::ISO8859_1, input.rewind()))
        }
    }

    #[test]
    fn last_registered_wins() {
        let mut chain = XmlRecognizerChain::new();
        chain.register(Box::new(Latin1Everything));
        assert_eq!(chain.len(), 4);
        let (name, _) = decode(&chain, b"<?xml version='1.0'?>").unwrap();
        assert_eq!(name, "ISO-8859-1");
    }
}
