//! Provide input sources, the entity resolver collaborator and the default
//! system identifier loader.

use std::{
    borrow::Cow,
    fs::{File, metadata},
    io::{self, Cursor, ErrorKind, Read, stdin},
    path::Path,
};

use crate::{
    error::{XmlError, XmlErrorDomain, XmlParserErrors},
    uri::{has_scheme, uri_to_path},
};

/// An input source for a document or an external entity.
///
/// If a character stream is set, it is read as is. Otherwise the byte stream is
/// decoded with the declared `encoding`, or with an encoding detected from its
/// leading bytes. If neither stream is set, the system identifier is opened.
#[derive(Default)]
pub struct XmlInputSource {
    public_id: Option<String>,
    system_id: Option<String>,
    encoding: Option<String>,
    byte_stream: Option<Box<dyn Read>>,
    char_stream: Option<Box<dyn Iterator<Item = char>>>,
}

impl XmlInputSource {
    /// Create an input source reading nothing but `system_id`.
    pub fn new(system_id: impl Into<String>) -> Self {
        Self {
            system_id: Some(system_id.into()),
            ..Default::default()
        }
    }

    pub fn from_reader(reader: impl Read + 'static) -> Self {
        Self {
            byte_stream: Some(Box::new(reader)),
            ..Default::default()
        }
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::from_reader(Cursor::new(bytes.into()))
    }

    pub fn from_chars(chars: impl Iterator<Item = char> + 'static) -> Self {
        Self {
            char_stream: Some(Box::new(chars)),
            ..Default::default()
        }
    }

    pub fn from_text(text: &str) -> Self {
        Self::from_chars(text.chars().collect::<Vec<_>>().into_iter())
    }

    pub fn with_public_id(mut self, public_id: impl Into<String>) -> Self {
        self.public_id = Some(public_id.into());
        self
    }

    pub fn with_system_id(mut self, system_id: impl Into<String>) -> Self {
        self.system_id = Some(system_id.into());
        self
    }

    /// Declare the encoding of the byte stream.
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn public_id(&self) -> Option<&str> {
        self.public_id.as_deref()
    }

    pub fn system_id(&self) -> Option<&str> {
        self.system_id.as_deref()
    }

    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    pub fn has_byte_stream(&self) -> bool {
        self.byte_stream.is_some()
    }

    pub fn has_char_stream(&self) -> bool {
        self.char_stream.is_some()
    }

    pub(crate) fn take_byte_stream(&mut self) -> Option<Box<dyn Read>> {
        self.byte_stream.take()
    }

    pub(crate) fn take_char_stream(&mut self) -> Option<Box<dyn Iterator<Item = char>>> {
        self.char_stream.take()
    }
}

/// The resolver collaborator.
///
/// Returning `None` means "no opinion", and the system identifier is opened directly.
pub trait XmlEntityResolver {
    fn resolve_entity(
        &mut self,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Option<XmlInputSource>;
}

impl<F> XmlEntityResolver for F
where
    F: FnMut(Option<&str>, Option<&str>) -> Option<XmlInputSource>,
{
    fn resolve_entity(
        &mut self,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Option<XmlInputSource> {
        self(public_id, system_id)
    }
}

/// A byte stream whose leading bytes can be inspected without consuming them.
pub struct XmlRewindableInput {
    head: Vec<u8>,
    inner: Box<dyn Read>,
    eof: bool,
}

impl XmlRewindableInput {
    pub fn new(inner: Box<dyn Read>) -> Self {
        Self {
            head: vec![],
            inner,
            eof: false,
        }
    }

    /// Return at least `len` leading bytes, or fewer if the stream is shorter.
    pub fn peek(&mut self, len: usize) -> Result<&[u8], XmlError> {
        let mut buf = [0; 512];
        while self.head.len() < len && !self.eof {
            let want = (len - self.head.len()).min(buf.len());
            match self.inner.read(&mut buf[..want]) {
                Ok(0) => self.eof = true,
                Ok(read) => self.head.extend_from_slice(&buf[..read]),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(io_error(e)),
            }
        }
        Ok(&self.head[..len.min(self.head.len())])
    }

    /// Return the whole stream, starting again from the first byte.
    pub fn rewind(self) -> Box<dyn Read> {
        if self.head.is_empty() {
            self.inner
        } else {
            Box::new(Cursor::new(self.head).chain(self.inner))
        }
    }
}

fn io_error(e: io::Error) -> XmlError {
    XmlError::fatal(
        XmlErrorDomain::XmlFromIO,
        XmlParserErrors::XmlIOEIO,
        format!("{e}\n"),
    )
}

fn load_error(system_id: &str) -> XmlError {
    XmlError::fatal(
        XmlErrorDomain::XmlFromIO,
        XmlParserErrors::XmlIOLoadError,
        format!("failed to load external entity \"{system_id}\"\n"),
    )
    .with_str1(system_id.to_owned())
}

/// Open `system_id` directly.
///
/// `file:` URIs and plain paths are supported. `-` reads the standard input.
#[doc(alias = "xmlDefaultExternalEntityLoader")]
pub fn open_system_id(system_id: &str) -> Result<Box<dyn Read>, XmlError> {
    if system_id == "-" {
        return Ok(Box::new(stdin()));
    }
    let path = if has_scheme(system_id) {
        match uri_to_path(system_id) {
            Some(path) => Cow::Owned(path),
            None => return Err(load_error(system_id)),
        }
    } else {
        Cow::Borrowed(Path::new(system_id))
    };
    if metadata(&path).is_ok_and(|meta| meta.is_dir()) {
        return Err(load_error(system_id));
    }
    File::open(&path)
        .map(|file| Box::new(file) as Box<dyn Read>)
        .map_err(|_| load_error(system_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_does_not_consume() {
        let mut input = XmlRewindableInput::new(Box::new(Cursor::new(b"<?xml?><doc/>".to_vec())));
        assert_eq!(input.peek(4).unwrap(), b"<?xm");
        assert_eq!(input.peek(2).unwrap(), b"<?");
        assert_eq!(input.peek(100).unwrap().len(), 13);
        let mut all = vec![];
        input.rewind().read_to_end(&mut all).unwrap();
        assert_eq!(all, b"<?xml?><doc/>");
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let err = open_system_id("file:///nonexistent/exent/missing.ent").err().unwrap();
        assert_eq!(err.code, XmlParserErrors::XmlIOLoadError);
        assert!(err.is_fatal());
        assert!(open_system_id("http://example.com/a.dtd").is_err());
    }
}
