//! Provide methods and data structures for error handling.
//!
//! Every diagnostic raised by the entity manager, the reader factory and the
//! streaming decoders is described by an [`XmlError`].
//! The core only classifies the severity of a diagnostic. Whether it is surfaced
//! is decided by the installed [`XmlErrorReporter`], or by the global structured
//! and generic error handlers when no reporter is installed.

use std::{
    borrow::Cow,
    fmt::Display,
    io::Write,
};

use crate::globals::GLOBAL_STATE;

macro_rules! impl_xml_parser_errors {
    ( $( $variant:ident $( = $default:literal )? ),* ) => {
        #[repr(C)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum XmlParserErrors {
            $(
                $variant $( = $default )?
            ),*
        }

        impl TryFrom<i32> for XmlParserErrors {
            type Error = anyhow::Error;
            fn try_from(value: i32) -> Result<Self, Self::Error> {
                $(
                    if value == Self:: $variant as i32 {
                        return Ok(Self:: $variant);
                    }
                )*
                Err(anyhow::anyhow!(
                    "Invalid convert from value '{value}' to {}",
                    std::any::type_name::<Self>()
                ))
            }
        }

        impl Default for XmlParserErrors {
            fn default() -> Self {
                Self::XmlErrOK
            }
        }
    };
}
impl_xml_parser_errors!(
    XmlErrOK = 0,
    XmlErrUndeclaredEntity = 26,
    XmlWarUndeclaredEntity = 27,
    XmlErrUnparsedEntity = 28,
    XmlErrEntityIsExternal = 29,
    XmlErrUnsupportedEncoding = 32,
    XmlErrEncodingName = 79,
    XmlErrInvalidEncoding = 81,
    XmlErrExtEntityStandalone = 82,
    XmlErrEntityLoop = 89,
    XmlErrInvalidURI = 91,
    XmlErrMismatchedEncoding = 113,
    XmlDTDUnknownNotation = 531,
    XmlDTDNotationRedefined = 532,
    XmlIOEIO = 1501,
    XmlIOLoadError = 1549
);

impl XmlParserErrors {
    pub fn is_ok(&self) -> bool {
        *self == Self::XmlErrOK
    }

    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }
}

/// The subsystem a diagnostic originates from.
#[doc(alias = "xmlErrorDomain")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XmlErrorDomain {
    #[default]
    XmlFromNone,
    /// The XML parser, entity references in particular
    XmlFromParser,
    /// The DTD, notations and declarations
    XmlFromDTD,
    /// The validity checks
    XmlFromValid,
    /// The input/output stack
    XmlFromIO,
    /// The encoding detection and conversion
    XmlFromI18N,
}

impl Display for XmlErrorDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::XmlFromNone => Ok(()),
            Self::XmlFromParser => write!(f, "parser "),
            Self::XmlFromDTD => write!(f, "parser "),
            Self::XmlFromValid => write!(f, "validity "),
            Self::XmlFromIO => write!(f, "I/O "),
            Self::XmlFromI18N => write!(f, "encoding "),
        }
    }
}

/// Indicates the level of an error.
///
/// `XmlErrWarning` and `XmlErrError` are recoverable, parsing continues.
/// `XmlErrFatal` abandons the reader of the enclosing entity.
#[doc(alias = "xmlErrorLevel")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum XmlErrorLevel {
    #[default]
    XmlErrNone = 0,
    /// A simple warning
    XmlErrWarning = 1,
    /// A recoverable error
    XmlErrError = 2,
    /// A fatal error
    XmlErrFatal = 3,
}

impl Display for XmlErrorLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::XmlErrNone => Ok(()),
            Self::XmlErrWarning => write!(f, "warning"),
            Self::XmlErrError => write!(f, "error"),
            Self::XmlErrFatal => write!(f, "error"),
        }
    }
}

/// An XML error instance.
#[doc(alias = "xmlError")]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlError {
    /// What part of the library raised this error
    pub domain: XmlErrorDomain,
    /// The error code, e.g. an XmlParserError
    pub code: XmlParserErrors,
    /// human-readable informative error message
    pub message: Option<Cow<'static, str>>,
    /// how consequent is the error
    pub level: XmlErrorLevel,
    /// the filename
    pub file: Option<Cow<'static, str>>,
    /// the line number if available
    pub line: usize,
    /// extra string information
    pub str1: Option<Cow<'static, str>>,
    /// extra string information
    pub str2: Option<Cow<'static, str>>,
    /// extra string information
    pub str3: Option<Cow<'static, str>>,
    /// minor code
    pub int1: i32,
    /// error column
    pub int2: i32,
}

impl XmlError {
    pub fn new(
        domain: XmlErrorDomain,
        code: XmlParserErrors,
        level: XmlErrorLevel,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            domain,
            code,
            message: Some(message.into()),
            level,
            ..Default::default()
        }
    }

    /// Create a fatal error.
    pub fn fatal(
        domain: XmlErrorDomain,
        code: XmlParserErrors,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::new(domain, code, XmlErrorLevel::XmlErrFatal, message)
    }

    /// Attach the first string argument.
    pub fn with_str1(mut self, str1: impl Into<Cow<'static, str>>) -> Self {
        self.str1 = Some(str1.into());
        self
    }

    /// Attach the second string argument.
    pub fn with_str2(mut self, str2: impl Into<Cow<'static, str>>) -> Self {
        self.str2 = Some(str2.into());
        self
    }

    /// Attach the minor code.
    pub fn with_minor(mut self, minor: i32) -> Self {
        self.int1 = minor;
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.level == XmlErrorLevel::XmlErrFatal
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.level,
            XmlErrorLevel::XmlErrWarning | XmlErrorLevel::XmlErrError
        )
    }

    /// Cleanup the error.
    #[doc(alias = "xmlResetError")]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Display for XmlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(file) = self.file.as_deref() {
            write!(f, "{file}:{}: ", self.line)?;
        } else if self.line != 0 {
            write!(f, "Entity: line {}: ", self.line)?;
        }
        write!(f, "{}{} : ", self.domain, self.level)?;
        match self.message.as_deref() {
            Some(msg) => write!(f, "{}", msg.trim_end()),
            None => write!(f, "No error message provided"),
        }
    }
}

impl std::error::Error for XmlError {}

/// The error-reporting collaborator.
///
/// Implementors decide whether and how a diagnostic is surfaced.
pub trait XmlErrorReporter {
    fn report(&mut self, error: &XmlError);
}

impl<F: FnMut(&XmlError)> XmlErrorReporter for F {
    fn report(&mut self, error: &XmlError) {
        self(error)
    }
}

/// Default generic error function.
///
/// If `out` is `None`, the message is written to the standard error.
pub fn generic_error_default(out: Option<&mut (dyn Write + 'static)>, msg: &str) {
    if let Some(out) = out {
        write!(out, "{msg}").ok();
    } else {
        eprint!("{msg}");
    }
}

/// Write a formatted message through the generic error channel.
#[macro_export]
macro_rules! generic_error {
    ( $( $args:tt )* ) => {
        $crate::globals::GLOBAL_STATE.with_borrow_mut(|state| {
            let msg = format!($( $args )*);
            (state.generic_error)(state.generic_error_context.as_deref_mut(), &msg);
        })
    };
}

/// Update the last error, then forward `error` to `reporter`.
///
/// If `reporter` is `None`, the global structured error handler is used.
/// If it is not set either, the error is formatted and written through
/// the generic error channel.
#[doc(alias = "__xmlRaiseError")]
pub fn raise_error(reporter: Option<&mut (dyn XmlErrorReporter + '_)>, error: XmlError) {
    if error.code.is_ok() {
        return;
    }
    let structured = GLOBAL_STATE.with_borrow_mut(|state| {
        state.last_error = error.clone();
        state.structured_error
    });
    if let Some(reporter) = reporter {
        reporter.report(&error);
        return;
    }
    if let Some(structured) = structured {
        structured(&error);
        return;
    }
    GLOBAL_STATE.with_borrow_mut(|state| {
        let msg = format!("{error}\n");
        (state.generic_error)(state.generic_error_context.as_deref_mut(), &msg);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_errors_try_from() {
        assert_eq!(
            XmlParserErrors::try_from(89).unwrap(),
            XmlParserErrors::XmlErrEntityLoop
        );
        assert!(XmlParserErrors::try_from(-5).is_err());
        // codes nothing raises are not part of the enum
        for code in [1, 9, 31, 6003] {
            assert!(XmlParserErrors::try_from(code).is_err());
        }
    }

    #[test]
    fn error_display_contains_location() {
        let mut err = XmlError::fatal(
            XmlErrorDomain::XmlFromIO,
            XmlParserErrors::XmlIOLoadError,
            "failed to load external entity \"missing.ent\"\n",
        );
        err.file = Some("file:///tmp/doc.xml".into());
        err.line = 3;
        let s = err.to_string();
        assert!(s.starts_with("file:///tmp/doc.xml:3: I/O error : "));
        assert!(s.ends_with("\"missing.ent\""));
        assert!(err.is_fatal());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn raise_error_prefers_reporter() {
        let mut seen = vec![];
        let mut reporter = |err: &XmlError| seen.push(err.code);
        raise_error(
            Some(&mut reporter),
            XmlError::new(
                XmlErrorDomain::XmlFromDTD,
                XmlParserErrors::XmlDTDUnknownNotation,
                XmlErrorLevel::XmlErrError,
                "unknown notation",
            ),
        );
        assert_eq!(seen, vec![XmlParserErrors::XmlDTDUnknownNotation]);
        let last = GLOBAL_STATE.with_borrow(|state| state.last_error.code);
        assert_eq!(last, XmlParserErrors::XmlDTDUnknownNotation);
    }
}
