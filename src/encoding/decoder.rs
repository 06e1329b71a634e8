//! Provide the streaming decoders.
//!
//! A decoder converts a byte source into chunks of UTF-16 code units.
//! While decoding, CR and CRLF are folded to a single LF.
//!
//! Every piece of state that may straddle a refill boundary (an incomplete
//! multi-byte sequence, a CR waiting for its LF, units that did not fit into
//! the previous chunk) is kept in the decoder, so splitting a byte stream
//! arbitrarily never changes the decoded output.

use std::{
    borrow::Cow,
    collections::VecDeque,
    io::{ErrorKind, Read},
    rc::Rc,
};

use encoding_rs::{
    Decoder, DecoderResult, EUC_JP, Encoding, ISO_2022_JP, ISO_8859_2, ISO_8859_3, ISO_8859_4,
    ISO_8859_5, ISO_8859_6, ISO_8859_7, ISO_8859_8, ISO_8859_10, ISO_8859_13, ISO_8859_14,
    ISO_8859_15, ISO_8859_16, SHIFT_JIS, WINDOWS_1250, WINDOWS_1251, WINDOWS_1252, WINDOWS_1254,
};

use crate::{
    error::{XmlError, XmlErrorDomain, XmlErrorLevel, XmlParserErrors},
    globals::get_default_raw_buffer_size,
};

use super::{XmlCharEncoding, XmlCharset};

/// The unit appended to the last chunk of a stream.
///
/// It is only meaningful at the position recorded by [`XmlCharChunk::is_terminated`].
/// The same value may legitimately appear inside decoded data.
pub const XML_CHUNK_TERMINATOR: u16 = 0xFFFF;
/// The unit substituted for a malformed byte sequence.
pub const XML_REPLACEMENT_CHAR: u16 = 0xFFFD;

const LF: u16 = 0x0A;
const CR: u16 = 0x0D;
const MIN_RAW_BUFFER_SIZE: usize = 8;
const PLATFORM_STAGE_SIZE: usize = 64;

/// A diagnostic tied to an offset of a decoded chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDeferredError {
    /// The offset of the placeholder unit in the chunk
    pub offset: usize,
    pub error: XmlError,
}

/// A chunk of decoded code units.
#[derive(Debug, Default)]
pub struct XmlCharChunk {
    data: Vec<u16>,
    terminated: bool,
    errors: Vec<XmlDeferredError>,
}

impl XmlCharChunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.terminated = false;
        self.errors.clear();
    }

    /// Return the decoded units, excluding the terminator.
    pub fn units(&self) -> &[u16] {
        if self.terminated {
            &self.data[..self.data.len() - 1]
        } else {
            &self.data
        }
    }

    /// Return the decoded units, including the terminator if any.
    pub fn as_slice(&self) -> &[u16] {
        &self.data
    }

    /// Return the number of decoded units, excluding the terminator.
    pub fn len(&self) -> usize {
        self.data.len() - self.terminated as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if this chunk is the last one of its stream.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn errors(&self) -> &[XmlDeferredError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<XmlDeferredError> {
        std::mem::take(&mut self.errors)
    }

    fn push(&mut self, unit: u16, error: Option<XmlError>) {
        if let Some(error) = error {
            self.errors.push(XmlDeferredError {
                offset: self.data.len(),
                error,
            });
        }
        self.data.push(unit);
    }

    fn terminate(&mut self) {
        if !self.terminated {
            self.data.push(XML_CHUNK_TERMINATOR);
            self.terminated = true;
        }
    }
}

/// A streaming decoder producing chunks of UTF-16 code units.
pub trait XmlStreamDecoder {
    /// Return the name of the encoding this decoder reads.
    fn encoding_name(&self) -> &str;

    /// Decode at most `max` units into `chunk`. The previous content of `chunk` is discarded.
    ///
    /// When the source is exhausted and every unit has been delivered,
    /// [`XML_CHUNK_TERMINATOR`] is appended and the chunk is flagged as terminated.
    fn refill(&mut self, chunk: &mut XmlCharChunk, max: usize) -> Result<(), XmlError>;

    /// Check if the terminator has already been delivered.
    fn is_finished(&self) -> bool;

    /// Release the underlying source.
    fn close(&mut self);
}

/// Fold CR and CRLF into LF.
fn normalize_line_end(skip_lf: &mut bool, unit: u16) -> Option<u16> {
    match unit {
        CR => {
            *skip_lf = true;
            Some(LF)
        }
        LF if std::mem::take(skip_lf) => None,
        unit => {
            *skip_lf = false;
            Some(unit)
        }
    }
}

fn push_code_point(out: &mut Vec<u16>, cp: u32) {
    if cp >= 0x10000 {
        let cp = cp - 0x10000;
        out.push(0xD800 + (cp >> 10) as u16);
        out.push(0xDC00 + (cp & 0x3FF) as u16);
    } else {
        out.push(cp as u16);
    }
}

pub(crate) enum XmlDecodeStep {
    /// `n` bytes were consumed.
    Decoded(usize),
    /// `n` bytes form a malformed sequence.
    Malformed(usize),
    /// The input ends in the middle of a sequence.
    Incomplete,
}

/// Decode one step of an encoding family.
pub(crate) trait XmlUnitDecoder {
    /// Decode from the head of `raw` into `out`.
    ///
    /// `raw` is empty only for the final flush, which is requested once with `last` set.
    fn decode(&mut self, raw: &[u8], last: bool, out: &mut Vec<u16>) -> XmlDecodeStep;
}

pub(crate) struct Utf8Units {
    at_start: bool,
}

impl XmlUnitDecoder for Utf8Units {
    fn decode(&mut self, raw: &[u8], last: bool, out: &mut Vec<u16>) -> XmlDecodeStep {
        let Some(&lead) = raw.first() else {
            return XmlDecodeStep::Decoded(0);
        };
        if self.at_start {
            const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
            if raw.len() < BOM.len() && BOM.starts_with(raw) && !last {
                return XmlDecodeStep::Incomplete;
            }
            self.at_start = false;
            if raw.starts_with(BOM) {
                return XmlDecodeStep::Decoded(BOM.len());
            }
        }
        if lead < 0x80 {
            out.push(lead as u16);
            return XmlDecodeStep::Decoded(1);
        }
        let (need, mut cp, lower, upper) = match lead {
            0xC2..=0xDF => (1, (lead & 0x1F) as u32, 0x80, 0xBF),
            0xE0 => (2, (lead & 0x0F) as u32, 0xA0, 0xBF),
            0xE1..=0xEC | 0xEE..=0xEF => (2, (lead & 0x0F) as u32, 0x80, 0xBF),
            0xED => (2, (lead & 0x0F) as u32, 0x80, 0x9F),
            0xF0 => (3, (lead & 0x07) as u32, 0x90, 0xBF),
            0xF1..=0xF3 => (3, (lead & 0x07) as u32, 0x80, 0xBF),
            0xF4 => (3, (lead & 0x07) as u32, 0x80, 0x8F),
            _ => return XmlDecodeStep::Malformed(1),
        };
        for i in 1..=need {
            let Some(&b) = raw.get(i) else {
                return XmlDecodeStep::Incomplete;
            };
            let (lo, hi) = if i == 1 { (lower, upper) } else { (0x80, 0xBF) };
            if !(lo..=hi).contains(&b) {
                return XmlDecodeStep::Malformed(i);
            }
            cp = (cp << 6) | (b & 0x3F) as u32;
        }
        push_code_point(out, cp);
        XmlDecodeStep::Decoded(need + 1)
    }
}

pub(crate) enum SingleByteUnits {
    Ascii,
    Latin1,
    Ebcdic,
}

impl XmlUnitDecoder for SingleByteUnits {
    fn decode(&mut self, raw: &[u8], _last: bool, out: &mut Vec<u16>) -> XmlDecodeStep {
        let Some(&b) = raw.first() else {
            return XmlDecodeStep::Decoded(0);
        };
        match self {
            Self::Ascii if b >= 0x80 => return XmlDecodeStep::Malformed(1),
            Self::Ascii | Self::Latin1 => out.push(b as u16),
            Self::Ebcdic => out.push(IBM037_TO_UNICODE[b as usize]),
        }
        XmlDecodeStep::Decoded(1)
    }
}

pub(crate) struct Utf16Units {
    big_endian: bool,
    /// If set, a BOM may switch the byte order
    detect: bool,
    at_start: bool,
    /// UCS-2 does not have surrogate pairs
    surrogates: bool,
}

impl Utf16Units {
    fn unit(&self, bytes: &[u8]) -> u16 {
        if self.big_endian {
            u16::from_be_bytes([bytes[0], bytes[1]])
        } else {
            u16::from_le_bytes([bytes[0], bytes[1]])
        }
    }
}

impl XmlUnitDecoder for Utf16Units {
    fn decode(&mut self, raw: &[u8], _last: bool, out: &mut Vec<u16>) -> XmlDecodeStep {
        if raw.is_empty() {
            return XmlDecodeStep::Decoded(0);
        }
        if raw.len() < 2 {
            return XmlDecodeStep::Incomplete;
        }
        if std::mem::take(&mut self.at_start) {
            match raw[..2] {
                [0xFE, 0xFF] if self.detect || self.big_endian => {
                    self.big_endian = true;
                    return XmlDecodeStep::Decoded(2);
                }
                [0xFF, 0xFE] if self.detect || !self.big_endian => {
                    self.big_endian = false;
                    return XmlDecodeStep::Decoded(2);
                }
                _ => {}
            }
        }
        let unit = self.unit(raw);
        match unit {
            0xD800..=0xDBFF if self.surrogates => {
                if raw.len() < 4 {
                    return XmlDecodeStep::Incomplete;
                }
                let low = self.unit(&raw[2..]);
                if !(0xDC00..=0xDFFF).contains(&low) {
                    return XmlDecodeStep::Malformed(2);
                }
                out.push(unit);
                out.push(low);
                XmlDecodeStep::Decoded(4)
            }
            0xD800..=0xDFFF => XmlDecodeStep::Malformed(2),
            unit => {
                out.push(unit);
                XmlDecodeStep::Decoded(2)
            }
        }
    }
}

pub(crate) struct Ucs4Units {
    big_endian: bool,
    detect: bool,
    at_start: bool,
}

impl XmlUnitDecoder for Ucs4Units {
    fn decode(&mut self, raw: &[u8], _last: bool, out: &mut Vec<u16>) -> XmlDecodeStep {
        if raw.is_empty() {
            return XmlDecodeStep::Decoded(0);
        }
        if raw.len() < 4 {
            return XmlDecodeStep::Incomplete;
        }
        let bytes = [raw[0], raw[1], raw[2], raw[3]];
        if std::mem::take(&mut self.at_start) {
            match bytes {
                [0x00, 0x00, 0xFE, 0xFF] if self.detect || self.big_endian => {
                    self.big_endian = true;
                    return XmlDecodeStep::Decoded(4);
                }
                [0xFF, 0xFE, 0x00, 0x00] if self.detect || !self.big_endian => {
                    self.big_endian = false;
                    return XmlDecodeStep::Decoded(4);
                }
                _ => {}
            }
        }
        let cp = if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        };
        if char::from_u32(cp).is_none() {
            return XmlDecodeStep::Malformed(4);
        }
        push_code_point(out, cp);
        XmlDecodeStep::Decoded(4)
    }
}

pub(crate) struct PlatformUnits {
    decoder: Decoder,
    flushed: bool,
}

impl XmlUnitDecoder for PlatformUnits {
    fn decode(&mut self, raw: &[u8], last: bool, out: &mut Vec<u16>) -> XmlDecodeStep {
        // `last` may only be passed once, with nothing left to decode.
        let last = last && raw.is_empty();
        if self.flushed {
            return XmlDecodeStep::Decoded(raw.len());
        }
        self.flushed = last;
        let mut stage = [0u16; PLATFORM_STAGE_SIZE];
        let (res, read, written) = self
            .decoder
            .decode_to_utf16_without_replacement(raw, &mut stage, last);
        out.extend_from_slice(&stage[..written]);
        match res {
            DecoderResult::InputEmpty | DecoderResult::OutputFull => XmlDecodeStep::Decoded(read),
            DecoderResult::Malformed(_, _) => XmlDecodeStep::Malformed(read),
        }
    }
}

/// A decoder reading a byte source through a fixed-capacity raw buffer.
pub(crate) struct XmlByteDecoder<D> {
    name: Cow<'static, str>,
    units: D,
    source: Option<Box<dyn Read>>,
    raw: Box<[u8]>,
    start: usize,
    end: usize,
    eof: bool,
    flushed: bool,
    skip_lf: bool,
    stage: Vec<u16>,
    pending: VecDeque<(u16, Option<XmlError>)>,
    finished: bool,
}

impl<D: XmlUnitDecoder> XmlByteDecoder<D> {
    fn new(name: impl Into<Cow<'static, str>>, units: D, source: Box<dyn Read>) -> Self {
        let capacity = get_default_raw_buffer_size().max(MIN_RAW_BUFFER_SIZE);
        Self {
            name: name.into(),
            units,
            source: Some(source),
            raw: vec![0; capacity].into_boxed_slice(),
            start: 0,
            end: 0,
            eof: false,
            flushed: false,
            skip_lf: false,
            stage: Vec::with_capacity(PLATFORM_STAGE_SIZE),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Move leftover bytes to the front of the raw buffer, then read more bytes.
    fn fill_raw(&mut self) -> Result<(), XmlError> {
        if self.start > 0 {
            self.raw.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        let Some(source) = self.source.as_mut() else {
            self.eof = true;
            return Ok(());
        };
        loop {
            match source.read(&mut self.raw[self.end..]) {
                Ok(0) => {
                    self.eof = true;
                    // close the source as soon as it is exhausted
                    self.source = None;
                    return Ok(());
                }
                Ok(read) => {
                    self.end += read;
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(XmlError::fatal(
                        XmlErrorDomain::XmlFromIO,
                        XmlParserErrors::XmlIOEIO,
                        format!("{e}\n"),
                    ));
                }
            }
        }
    }

    fn put(&mut self, chunk: &mut XmlCharChunk, max: usize, unit: u16, error: Option<XmlError>) {
        if chunk.len() < max && self.pending.is_empty() {
            chunk.push(unit, error);
        } else {
            self.pending.push_back((unit, error));
        }
    }

    fn emit_stage(&mut self, chunk: &mut XmlCharChunk, max: usize) {
        let mut stage = std::mem::take(&mut self.stage);
        for unit in stage.drain(..) {
            if let Some(unit) = normalize_line_end(&mut self.skip_lf, unit) {
                self.put(chunk, max, unit, None);
            }
        }
        self.stage = stage;
    }

    fn malformed(&mut self, chunk: &mut XmlCharChunk, max: usize, len: usize) {
        let bytes = &self.raw[self.start..self.start + len];
        let hex = bytes
            .iter()
            .map(|b| format!("0x{b:02X}"))
            .collect::<Vec<_>>()
            .join(" ");
        let message = if self.eof && self.start + len == self.end {
            format!("Input is not proper {}, premature end of data\nBytes: {hex}\n", self.name)
        } else {
            format!("Input is not proper {}, indicate encoding !\nBytes: {hex}\n", self.name)
        };
        let error = XmlError::new(
            XmlErrorDomain::XmlFromI18N,
            XmlParserErrors::XmlErrInvalidEncoding,
            XmlErrorLevel::XmlErrFatal,
            message,
        )
        .with_str1(self.name.clone().into_owned())
        .with_minor(bytes.first().copied().unwrap_or(0) as i32);
        self.start += len;
        self.emit_stage(chunk, max);
        self.skip_lf = false;
        self.put(chunk, max, XML_REPLACEMENT_CHAR, Some(error));
    }

    fn apply(&mut self, step: XmlDecodeStep, chunk: &mut XmlCharChunk, max: usize) {
        match step {
            XmlDecodeStep::Decoded(read) => {
                self.start += read;
                self.emit_stage(chunk, max);
            }
            XmlDecodeStep::Malformed(len) => {
                self.malformed(chunk, max, len.min(self.end - self.start))
            }
            XmlDecodeStep::Incomplete => self.malformed(chunk, max, self.end - self.start),
        }
    }
}

impl<D: XmlUnitDecoder> XmlStreamDecoder for XmlByteDecoder<D> {
    fn encoding_name(&self) -> &str {
        &self.name
    }

    fn refill(&mut self, chunk: &mut XmlCharChunk, max: usize) -> Result<(), XmlError> {
        chunk.clear();
        let max = max.max(1);
        if self.finished {
            chunk.terminate();
            return Ok(());
        }
        while chunk.len() < max {
            let Some((unit, error)) = self.pending.pop_front() else {
                break;
            };
            chunk.push(unit, error);
        }
        loop {
            if self.pending.is_empty() && self.start == self.end && self.eof && self.flushed {
                chunk.terminate();
                self.finished = true;
                return Ok(());
            }
            if chunk.len() >= max {
                return Ok(());
            }
            if self.start == self.end {
                if !self.eof {
                    self.fill_raw()?;
                    continue;
                }
                self.flushed = true;
                let step = self.units.decode(&[], true, &mut self.stage);
                self.apply(step, chunk, max);
                continue;
            }
            let step = self
                .units
                .decode(&self.raw[self.start..self.end], self.eof, &mut self.stage);
            match step {
                XmlDecodeStep::Incomplete
                    if !self.eof && (self.start > 0 || self.end < self.raw.len()) =>
                {
                    self.fill_raw()?;
                }
                step => self.apply(step, chunk, max),
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn close(&mut self) {
        self.source = None;
        self.start = 0;
        self.end = 0;
        self.eof = true;
    }
}

/// Iterate over the characters of a shared string.
struct SharedChars {
    text: Rc<str>,
    pos: usize,
}

impl Iterator for SharedChars {
    type Item = char;

    fn next(&mut self) -> Option<Self::Item> {
        let c = self.text[self.pos..].chars().next()?;
        self.pos += c.len_utf8();
        Some(c)
    }
}

/// A decoder over an already decoded character stream.
pub struct XmlCharStreamDecoder {
    name: Cow<'static, str>,
    chars: Option<Box<dyn Iterator<Item = char>>>,
    normalize: bool,
    skip_lf: bool,
    pending: Option<u16>,
    finished: bool,
}

impl XmlCharStreamDecoder {
    /// Wrap a character stream. Line ends are normalized.
    pub fn new(chars: Box<dyn Iterator<Item = char>>) -> Self {
        Self {
            name: Cow::Borrowed("UTF-16"),
            chars: Some(chars),
            normalize: true,
            skip_lf: false,
            pending: None,
            finished: false,
        }
    }

    /// Read an interned replacement text as is.
    pub fn from_text(text: Rc<str>) -> Self {
        Self {
            normalize: false,
            ..Self::new(Box::new(SharedChars { text, pos: 0 }))
        }
    }
}

impl XmlStreamDecoder for XmlCharStreamDecoder {
    fn encoding_name(&self) -> &str {
        &self.name
    }

    fn refill(&mut self, chunk: &mut XmlCharChunk, max: usize) -> Result<(), XmlError> {
        chunk.clear();
        let max = max.max(1);
        if self.finished {
            chunk.terminate();
            return Ok(());
        }
        if let Some(low) = self.pending.take() {
            chunk.push(low, None);
        }
        while chunk.len() < max {
            let Some(c) = self.chars.as_mut().and_then(|chars| chars.next()) else {
                self.chars = None;
                self.finished = true;
                chunk.terminate();
                return Ok(());
            };
            let mut buf = [0; 2];
            for &unit in c.encode_utf16(&mut buf).iter() {
                let unit = if self.normalize {
                    match normalize_line_end(&mut self.skip_lf, unit) {
                        Some(unit) => unit,
                        None => continue,
                    }
                } else {
                    unit
                };
                if chunk.len() < max {
                    chunk.push(unit, None);
                } else {
                    self.pending = Some(unit);
                }
            }
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn close(&mut self) {
        self.chars = None;
        self.pending = None;
    }
}

fn platform_encoding(enc: XmlCharEncoding) -> Option<&'static Encoding> {
    match enc {
        XmlCharEncoding::ISO8859_2 => Some(ISO_8859_2),
        XmlCharEncoding::ISO8859_3 => Some(ISO_8859_3),
        XmlCharEncoding::ISO8859_4 => Some(ISO_8859_4),
        XmlCharEncoding::ISO8859_5 => Some(ISO_8859_5),
        XmlCharEncoding::ISO8859_6 => Some(ISO_8859_6),
        XmlCharEncoding::ISO8859_7 => Some(ISO_8859_7),
        XmlCharEncoding::ISO8859_8 => Some(ISO_8859_8),
        // encoding_rs treats ISO-8859-9 as Windows-1254.
        XmlCharEncoding::ISO8859_9 => Some(WINDOWS_1254),
        XmlCharEncoding::ISO8859_10 => Some(ISO_8859_10),
        XmlCharEncoding::ISO8859_13 => Some(ISO_8859_13),
        XmlCharEncoding::ISO8859_14 => Some(ISO_8859_14),
        XmlCharEncoding::ISO8859_15 => Some(ISO_8859_15),
        XmlCharEncoding::ISO8859_16 => Some(ISO_8859_16),
        XmlCharEncoding::Windows1250 => Some(WINDOWS_1250),
        XmlCharEncoding::Windows1251 => Some(WINDOWS_1251),
        XmlCharEncoding::Windows1252 => Some(WINDOWS_1252),
        XmlCharEncoding::ISO2022JP => Some(ISO_2022_JP),
        XmlCharEncoding::ShiftJIS => Some(SHIFT_JIS),
        XmlCharEncoding::EUCJP => Some(EUC_JP),
        _ => None,
    }
}

/// Create a decoder reading `source` as `enc`.
///
/// For `UTF-16`, `UCS-2` and `UCS-4`, a leading BOM decides the byte order;
/// big-endian is assumed otherwise.
pub fn new_decoder(enc: XmlCharEncoding, source: Box<dyn Read>) -> Box<dyn XmlStreamDecoder> {
    let name = enc.get_name();
    let utf16 = |big_endian, detect, surrogates| Utf16Units {
        big_endian,
        detect,
        at_start: true,
        surrogates,
    };
    let ucs4 = |big_endian, detect| Ucs4Units {
        big_endian,
        detect,
        at_start: true,
    };
    match enc {
        XmlCharEncoding::UTF8 => Box::new(XmlByteDecoder::new(
            name,
            Utf8Units { at_start: true },
            source,
        )),
        XmlCharEncoding::ASCII => {
            Box::new(XmlByteDecoder::new(name, SingleByteUnits::Ascii, source))
        }
        XmlCharEncoding::ISO8859_1 => {
            Box::new(XmlByteDecoder::new(name, SingleByteUnits::Latin1, source))
        }
        XmlCharEncoding::EBCDIC => {
            Box::new(XmlByteDecoder::new(name, SingleByteUnits::Ebcdic, source))
        }
        XmlCharEncoding::UTF16 => {
            Box::new(XmlByteDecoder::new(name, utf16(true, true, true), source))
        }
        XmlCharEncoding::UTF16BE => {
            Box::new(XmlByteDecoder::new(name, utf16(true, false, true), source))
        }
        XmlCharEncoding::UTF16LE => {
            Box::new(XmlByteDecoder::new(name, utf16(false, false, true), source))
        }
        XmlCharEncoding::UCS2 => {
            Box::new(XmlByteDecoder::new(name, utf16(true, true, false), source))
        }
        XmlCharEncoding::UCS4 => Box::new(XmlByteDecoder::new(name, ucs4(true, true), source)),
        XmlCharEncoding::UCS4BE => Box::new(XmlByteDecoder::new(name, ucs4(true, false), source)),
        XmlCharEncoding::UCS4LE => {
            Box::new(XmlByteDecoder::new(name, ucs4(false, false), source))
        }
        enc => match platform_encoding(enc) {
            Some(platform) => Box::new(XmlByteDecoder::new(
                name,
                PlatformUnits {
                    decoder: platform.new_decoder_without_bom_handling(),
                    flushed: false,
                },
                source,
            )),
            None => Box::new(XmlByteDecoder::new(
                name,
                Utf8Units { at_start: true },
                source,
            )),
        },
    }
}

/// Create a decoder reading `source` through the platform decoding primitive.
pub fn new_platform_decoder(
    enc: &'static Encoding,
    source: Box<dyn Read>,
) -> Box<dyn XmlStreamDecoder> {
    Box::new(XmlByteDecoder::new(
        enc.name(),
        PlatformUnits {
            decoder: enc.new_decoder_without_bom_handling(),
            flushed: false,
        },
        source,
    ))
}

/// Create a decoder for the result of a charset name mapping.
pub fn new_charset_decoder(
    charset: XmlCharset,
    source: Box<dyn Read>,
) -> Box<dyn XmlStreamDecoder> {
    match charset {
        XmlCharset::Canonical(enc) => new_decoder(enc, source),
        XmlCharset::PassThrough(enc) => new_platform_decoder(enc, source),
    }
}

/// IBM037 (EBCDIC-US) to Unicode.
#[rustfmt::skip]
static IBM037_TO_UNICODE: [u16; 256] = [
    0x0000, 0x0001, 0x0002, 0x0003, 0x009C, 0x0009, 0x0086, 0x007F,
    0x0097, 0x008D, 0x008E, 0x000B, 0x000C, 0x000D, 0x000E, 0x000F,
    0x0010, 0x0011, 0x0012, 0x0013, 0x009D, 0x0085, 0x0008, 0x0087,
    0x0018, 0x0019, 0x0092, 0x008F, 0x001C, 0x001D, 0x001E, 0x001F,
    0x0080, 0x0081, 0x0082, 0x0083, 0x0084, 0x000A, 0x0017, 0x001B,
    0x0088, 0x0089, 0x008A, 0x008B, 0x008C, 0x0005, 0x0006, 0x0007,
    0x0090, 0x0091, 0x0016, 0x0093, 0x0094, 0x0095, 0x0096, 0x0004,
    0x0098, 0x0099, 0x009A, 0x009B, 0x0014, 0x0015, 0x009E, 0x001A,
    0x0020, 0x00A0, 0x00E2, 0x00E4, 0x00E0, 0x00E1, 0x00E3, 0x00E5,
    0x00E7, 0x00F1, 0x00A2, 0x002E, 0x003C, 0x0028, 0x002B, 0x007C,
    0x0026, 0x00E9, 0x00EA, 0x00EB, 0x00E8, 0x00ED, 0x00EE, 0x00EF,
    0x00EC, 0x00DF, 0x0021, 0x0024, 0x002A, 0x0029, 0x003B, 0x00AC,
    0x002D, 0x002F, 0x00C2, 0x00C4, 0x00C0, 0x00C1, 0x00C3, 0x00C5,
    0x00C7, 0x00D1, 0x00A6, 0x002C, 0x0025, 0x005F, 0x003E, 0x003F,
    0x00F8, 0x00C9, 0x00CA, 0x00CB, 0x00C8, 0x00CD, 0x00CE, 0x00CF,
    0x00CC, 0x0060, 0x003A, 0x0023, 0x0040, 0x0027, 0x003D, 0x0022,
    0x00D8, 0x0061, 0x0062, 0x0063, 0x0064, 0x0065, 0x0066, 0x0067,
    0x0068, 0x0069, 0x00AB, 0x00BB, 0x00F0, 0x00FD, 0x00FE, 0x00B1,
    0x00B0, 0x006A, 0x006B, 0x006C, 0x006D, 0x006E, 0x006F, 0x0070,
    0x0071, 0x0072, 0x00AA, 0x00BA, 0x00E6, 0x00B8, 0x00C6, 0x00A4,
    0x00B5, 0x007E, 0x0073, 0x0074, 0x0075, 0x0076, 0x0077, 0x0078,
    0x0079, 0x007A, 0x00A1, 0x00BF, 0x00D0, 0x00DD, 0x00DE, 0x00AE,
    0x005E, 0x00A3, 0x00A5, 0x00B7, 0x00A9, 0x00A7, 0x00B6, 0x00BC,
    0x00BD, 0x00BE, 0x005B, 0x005D, 0x00AF, 0x00A8, 0x00B4, 0x00D7,
    0x007B, 0x0041, 0x0042, 0x0043, 0x0044, 0x0045, 0x0046, 0x0047,
    0x0048, 0x0049, 0x00AD, 0x00F4, 0x00F6, 0x00F2, 0x00F3, 0x00F5,
    0x007D, 0x004A, 0x004B, 0x004C, 0x004D, 0x004E, 0x004F, 0x0050,
    0x0051, 0x0052, 0x00B9, 0x00FB, 0x00FC, 0x00F9, 0x00FA, 0x00FF,
    0x005C, 0x00F7, 0x0053, 0x0054, 0x0055, 0x0056, 0x0057, 0x0058,
    0x0059, 0x005A, 0x00B2, 0x00D4, 0x00D6, 0x00D2, 0x00D3, 0x00D5,
    0x0030, 0x0031, 0x0032, 0x0033, 0x0034, 0x0035, 0x0036, 0x0037,
    0x0038, 0x0039, 0x00B3, 0x00DB, 0x00DC, 0x00D9, 0x00DA, 0x009F,
];
