//! Provide the cursor over decoded character data and the reader factory.
//!
//! An [`XmlReader`] owns one streaming decoder and hands out its code units.
//! Malformed input found by the decoder is kept aside as deferred diagnostics
//! and surfaced only when the cursor reaches the offset they are tied to.

use std::{collections::VecDeque, rc::Rc};

use crate::{
    encoding::{
        XmlCharChunk, XmlCharStreamDecoder, XmlDeferredError, XmlRecognizer,
        XmlRecognizerChain, XmlStreamDecoder, convert_charset_name, new_charset_decoder,
    },
    error::{XmlError, XmlErrorDomain, XmlParserErrors},
    generic_error,
    globals::{get_default_chunk_size, get_parser_debug_entities},
    io::{XmlInputSource, XmlRewindableInput, open_system_id},
};

const LF: u16 = 0x0A;

fn is_high_surrogate(unit: u16) -> bool {
    (0xD800..0xDC00).contains(&unit)
}

fn is_low_surrogate(unit: u16) -> bool {
    (0xDC00..0xE000).contains(&unit)
}

/// A cursor over the decoded character data of one input.
pub struct XmlReader {
    id: u32,
    system_id: Option<String>,
    decoder: Box<dyn XmlStreamDecoder>,
    chunk: XmlCharChunk,
    cursor: usize,
    chunk_size: usize,
    line: usize,
    column: usize,
    consumed: usize,
    errors: VecDeque<XmlDeferredError>,
    reached: Vec<XmlError>,
    exhausted: bool,
}

impl XmlReader {
    fn new(id: u32, system_id: Option<String>, decoder: Box<dyn XmlStreamDecoder>) -> Self {
        Self {
            id,
            system_id,
            decoder,
            chunk: XmlCharChunk::new(),
            cursor: 0,
            chunk_size: get_default_chunk_size(),
            line: 1,
            column: 1,
            consumed: 0,
            errors: VecDeque::new(),
            reached: vec![],
            exhausted: false,
        }
    }

    /// Return the id of this reader. Ids are unique within one factory.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn system_id(&self) -> Option<&str> {
        self.system_id.as_deref()
    }

    pub fn encoding_name(&self) -> &str {
        self.decoder.encoding_name()
    }

    /// Return the current line, starting from 1.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Return the current column, starting from 1.
    pub fn column(&self) -> usize {
        self.column
    }

    /// Return the number of code units consumed so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Set the maximum number of units decoded by one refill.
    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size = size.max(1);
    }

    /// Make sure the current chunk has an unread unit or its terminator.
    ///
    /// Return `false` if the input is exhausted.
    fn fill(&mut self) -> bool {
        while !self.exhausted && self.cursor >= self.chunk.len() {
            if self.chunk.is_terminated() {
                self.exhausted = true;
                break;
            }
            if let Err(mut err) = self.decoder.refill(&mut self.chunk, self.chunk_size) {
                self.locate(&mut err);
                self.reached.push(err);
                self.chunk.clear();
                self.decoder.close();
                self.exhausted = true;
                break;
            }
            self.cursor = 0;
            self.errors.extend(self.chunk.take_errors());
        }
        !self.exhausted
    }

    fn locate(&self, error: &mut XmlError) {
        if error.file.is_none() {
            error.file = self.system_id.clone().map(Into::into);
        }
        error.line = self.line;
        error.int2 = self.column as i32;
    }

    /// Return the next code unit without consuming it.
    pub fn peek_unit(&mut self) -> Option<u16> {
        self.fill().then(|| self.chunk.units()[self.cursor])
    }

    /// Consume the next code unit.
    pub fn next_unit(&mut self) -> Option<u16> {
        let unit = self.peek_unit()?;
        while self.errors.front().is_some_and(|e| e.offset <= self.cursor) {
            if let Some(XmlDeferredError { mut error, .. }) = self.errors.pop_front() {
                self.locate(&mut error);
                self.reached.push(error);
            }
        }
        self.cursor += 1;
        self.consumed += 1;
        if unit == LF {
            self.line += 1;
            self.column = 1;
        } else if !is_low_surrogate(unit) {
            self.column += 1;
        }
        Some(unit)
    }

    /// Consume the next character. A lone surrogate is read as U+FFFD.
    pub fn next_char(&mut self) -> Option<char> {
        let unit = self.next_unit()?;
        if is_high_surrogate(unit) {
            if let Some(low) = self.peek_unit().filter(|&low| is_low_surrogate(low)) {
                self.next_unit();
                let cp = 0x10000 + (((unit as u32) - 0xD800) << 10) + ((low as u32) - 0xDC00);
                return char::from_u32(cp);
            }
        }
        Some(char::from_u32(unit as u32).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    /// Consume the rest of the input.
    pub fn read_to_string(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.next_char() {
            s.push(c);
        }
        s
    }

    /// Return the unread units of the current chunk, refilling it first if it is used up.
    ///
    /// The returned slice ends with [`XML_CHUNK_TERMINATOR`](crate::encoding::XML_CHUNK_TERMINATOR)
    /// if it is the last chunk of the input.
    pub fn remaining_chunk(&mut self) -> &[u16] {
        if !self.fill() {
            return &[];
        }
        &self.chunk.as_slice()[self.cursor..]
    }

    /// Consume the unread units of the current chunk, excluding the terminator.
    pub fn take_chunk(&mut self) -> Vec<u16> {
        let mut units = vec![];
        if self.fill() {
            let end = self.chunk.len();
            units.reserve(end - self.cursor);
            while self.cursor < end {
                if let Some(unit) = self.next_unit() {
                    units.push(unit);
                }
            }
        }
        units
    }

    /// Check if the cursor has reached the end of the current chunk.
    pub fn at_chunk_end(&self) -> bool {
        self.cursor >= self.chunk.len()
    }

    /// Check if every unit has been consumed.
    pub fn is_exhausted(&mut self) -> bool {
        !self.fill()
    }

    /// Return the diagnostics whose offset has been reached.
    pub fn take_diagnostics(&mut self) -> Vec<XmlError> {
        std::mem::take(&mut self.reached)
    }

    /// Release the underlying stream.
    pub fn close(&mut self) {
        self.decoder.close();
        self.exhausted = true;
    }
}

/// The top-level entry point building readers from input sources.
pub struct XmlReaderFactory {
    recognizers: XmlRecognizerChain,
    allow_pass_through: bool,
    next_reader_id: u32,
}

impl XmlReaderFactory {
    pub fn new() -> Self {
        Self {
            recognizers: XmlRecognizerChain::new(),
            allow_pass_through: false,
            next_reader_id: 1,
        }
    }

    /// Allow charset names unknown to the table to reach the platform decoders.
    pub fn set_allow_pass_through(&mut self, allow: bool) {
        self.allow_pass_through = allow;
    }

    /// Register `recognizer`. It is tried before the recognizers registered earlier.
    pub fn register_recognizer(&mut self, recognizer: Box<dyn XmlRecognizer>) {
        self.recognizers.register(recognizer);
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_reader_id;
        self.next_reader_id += 1;
        id
    }

    /// Build a reader for `source`.
    ///
    /// `system_id` is the expanded identifier of the input. It is opened
    /// directly if `source` carries no stream.
    #[doc(alias = "xmlNewInputFromFile")]
    pub fn create_reader(
        &mut self,
        mut source: XmlInputSource,
        system_id: Option<&str>,
        xml_decl_expected: bool,
    ) -> Result<XmlReader, XmlError> {
        let system_id = system_id.or(source.system_id()).map(|s| s.to_owned());
        let decoder: Box<dyn XmlStreamDecoder> = if let Some(chars) = source.take_char_stream() {
            Box::new(XmlCharStreamDecoder::new(chars))
        } else {
            let bytes = match source.take_byte_stream() {
                Some(bytes) => bytes,
                None => {
                    let Some(id) = system_id.as_deref() else {
                        return Err(XmlError::fatal(
                            XmlErrorDomain::XmlFromIO,
                            XmlParserErrors::XmlIOLoadError,
                            "no input stream nor system identifier\n",
                        ));
                    };
                    open_system_id(id)?
                }
            };
            match source.encoding() {
                Some(name) => {
                    let charset = convert_charset_name(name, self.allow_pass_through)?;
                    new_charset_decoder(charset, bytes)
                }
                None => self.recognizers.recognize(
                    XmlRewindableInput::new(bytes),
                    xml_decl_expected,
                    self.allow_pass_through,
                )?,
            }
        };
        let id = self.next_id();
        if get_parser_debug_entities() {
            generic_error!(
                "Reader {id} created for {} ({})\n",
                system_id.as_deref().unwrap_or("(null)"),
                decoder.encoding_name()
            );
        }
        Ok(XmlReader::new(id, system_id, decoder))
    }

    /// Build a reader over an already decoded replacement text.
    pub fn create_text_reader(&mut self, text: Rc<str>, system_id: Option<&str>) -> XmlReader {
        let id = self.next_id();
        XmlReader::new(
            id,
            system_id.map(|s| s.to_owned()),
            Box::new(XmlCharStreamDecoder::from_text(text)),
        )
    }
}

impl Default for XmlReaderFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::XML_CHUNK_TERMINATOR;

    #[test]
    fn location_tracking() {
        let mut factory = XmlReaderFactory::new();
        let mut reader = factory
            .create_reader(XmlInputSource::from_bytes("ab\r\nc\u{10000}d"), Some("t.xml"), true)
            .unwrap();
        assert_eq!(reader.read_to_string(), "ab\nc\u{10000}d");
        assert_eq!(reader.line(), 2);
        assert_eq!(reader.column(), 4);
        // the CRLF pair is one unit, the supplementary character two
        assert_eq!(reader.consumed(), 7);
        assert!(reader.is_exhausted());
        assert_eq!(reader.next_char(), None);
    }

    #[test]
    fn diagnostics_surface_at_their_offset() {
        let mut factory = XmlReaderFactory::new();
        let mut reader = factory
            .create_reader(XmlInputSource::from_bytes(b"ab\xFFcd".to_vec()), Some("bad.xml"), true)
            .unwrap();
        assert_eq!(reader.next_char(), Some('a'));
        assert_eq!(reader.next_char(), Some('b'));
        assert!(reader.take_diagnostics().is_empty());
        assert_eq!(reader.next_char(), Some('\u{FFFD}'));
        let diags = reader.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, XmlParserErrors::XmlErrInvalidEncoding);
        assert_eq!(diags[0].file.as_deref(), Some("bad.xml"));
        assert_eq!(diags[0].int2, 3);
        assert_eq!(reader.read_to_string(), "cd");
    }

    #[test]
    fn small_chunks_end_with_terminator() {
        let mut factory = XmlReaderFactory::new();
        let mut reader = factory.create_text_reader(Rc::from("abcde"), None);
        reader.set_chunk_size(2);
        assert_eq!(reader.take_chunk(), [b'a' as u16, b'b' as u16]);
        assert!(reader.at_chunk_end());
        assert_eq!(reader.take_chunk(), [b'c' as u16, b'd' as u16]);
        assert_eq!(reader.remaining_chunk(), [b'e' as u16, XML_CHUNK_TERMINATOR]);
        assert_eq!(reader.take_chunk(), [b'e' as u16]);
        assert!(reader.is_exhausted());
        assert!(reader.remaining_chunk().is_empty());
    }

    #[test]
    fn surrogate_pair_across_chunks() {
        let mut factory = XmlReaderFactory::new();
        let mut reader = factory.create_text_reader(Rc::from("a\u{1F600}b"), None);
        reader.set_chunk_size(2);
        assert_eq!(reader.read_to_string(), "a\u{1F600}b");
    }

    #[test]
    fn explicit_encoding_is_used() {
        let mut factory = XmlReaderFactory::new();
        let source = XmlInputSource::from_bytes(b"\xE9t\xE9".to_vec()).with_encoding("latin1");
        let mut reader = factory.create_reader(source, None, true).unwrap();
        assert_eq!(reader.encoding_name(), "ISO-8859-1");
        assert_eq!(reader.read_to_string(), "\u{e9}t\u{e9}");

        let source = XmlInputSource::from_bytes(b"abc".to_vec()).with_encoding("x-no-such");
        let err = factory.create_reader(source, None, true).err().unwrap();
        assert_eq!(err.code, XmlParserErrors::XmlErrUnsupportedEncoding);
    }

    #[test]
    fn char_stream_wins_over_bytes() {
        let mut factory = XmlReaderFactory::new();
        let mut reader = factory
            .create_reader(XmlInputSource::from_text("x\r\ny"), None, true)
            .unwrap();
        assert_eq!(reader.read_to_string(), "x\ny");
    }

    #[test]
    fn reader_ids_increase() {
        let mut factory = XmlReaderFactory::new();
        let a = factory.create_text_reader(Rc::from(""), None);
        let b = factory.create_text_reader(Rc::from(""), None);
        assert!(b.id() > a.id());
    }

    #[test]
    fn no_stream_and_no_system_id() {
        let mut factory = XmlReaderFactory::new();
        let err = factory
            .create_reader(XmlInputSource::default(), None, true)
            .err()
            .unwrap();
        assert_eq!(err.code, XmlParserErrors::XmlIOLoadError);
    }
}
