//! Provide the per-thread global state.
//!
//! The core is single-threaded, so every knob that the classic parser keeps in
//! process-wide globals lives in a thread-local [`XmlGlobalState`].

use std::{borrow::Cow, cell::RefCell, io::Write};

use const_format::concatcp;

use crate::error::{XmlError, generic_error_default};

pub type GenericError = for<'a> fn(Option<&mut (dyn Write + 'static)>, &str);
pub type StructuredError = fn(&XmlError);

/// The default number of decoded characters in one chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;
/// The default capacity of the raw byte buffer of a decoder.
pub const DEFAULT_RAW_BUFFER_SIZE: usize = 8192;

const VERSION_STRING: &str = concatcp!(
    "{:0>2}{:0>2}{:0>2}",
    env!("CARGO_PKG_VERSION_MAJOR"),
    env!("CARGO_PKG_VERSION_MINOR"),
    env!("CARGO_PKG_VERSION_PATCH")
);

pub struct XmlGlobalState {
    parser_version: Cow<'static, str>,
    pub(crate) generic_error: GenericError,
    pub(crate) generic_error_context: Option<Box<dyn Write>>,
    pub(crate) structured_error: Option<StructuredError>,
    parser_debug_entities: bool,
    pub(crate) default_chunk_size: usize,
    pub(crate) default_raw_buffer_size: usize,
    pub(crate) last_error: XmlError,
}

impl XmlGlobalState {
    fn new() -> Self {
        Self {
            parser_version: Cow::Borrowed(VERSION_STRING),
            generic_error: generic_error_default,
            generic_error_context: None,
            structured_error: None,
            parser_debug_entities: false,
            default_chunk_size: DEFAULT_CHUNK_SIZE,
            default_raw_buffer_size: DEFAULT_RAW_BUFFER_SIZE,
            last_error: XmlError::default(),
        }
    }
}

thread_local! {
    pub static GLOBAL_STATE: RefCell<XmlGlobalState> = RefCell::new(XmlGlobalState::new());
}

/// Return the version string of this library, e.g. `"000100"` for `0.1.0`.
pub fn parser_version() -> String {
    GLOBAL_STATE.with_borrow(|state| state.parser_version.to_string())
}

/// Set new generic error function and generic error context.
///
/// If `func` is `None`, set `generic_error_default`.
/// If `context` is `None`, current context is clear and no context is set.
pub fn set_generic_error(func: Option<GenericError>, context: Option<impl Write + 'static>) {
    GLOBAL_STATE.with_borrow_mut(|state| {
        state.generic_error = func.unwrap_or(generic_error_default);
        state.generic_error_context = context.map(|context| {
            let boxed: Box<dyn Write + 'static> = Box::new(context);
            boxed
        });
    });
}

/// Set new structured error function.
///
/// If `func` is `None`, errors are written through the generic error function.
pub fn set_structured_error(func: Option<StructuredError>) {
    GLOBAL_STATE.with_borrow_mut(|state| state.structured_error = func);
}

/// Check whether entity debugging traces are enabled.
pub fn get_parser_debug_entities() -> bool {
    GLOBAL_STATE.with_borrow(|state| state.parser_debug_entities)
}

/// Enable or disable entity debugging traces.
///
/// Return the previous setting.
pub fn set_parser_debug_entities(debug: bool) -> bool {
    GLOBAL_STATE.with_borrow_mut(|state| std::mem::replace(&mut state.parser_debug_entities, debug))
}

/// Get the number of decoded characters a decoder produces per chunk by default.
pub fn get_default_chunk_size() -> usize {
    GLOBAL_STATE.with_borrow(|state| state.default_chunk_size)
}

/// Set the number of decoded characters a decoder produces per chunk by default.
///
/// `0` is treated as `1`.
pub fn set_default_chunk_size(size: usize) -> usize {
    GLOBAL_STATE.with_borrow_mut(|state| {
        std::mem::replace(&mut state.default_chunk_size, size.max(1))
    })
}

/// Get the default capacity of the raw byte buffer of a decoder.
pub fn get_default_raw_buffer_size() -> usize {
    GLOBAL_STATE.with_borrow(|state| state.default_raw_buffer_size)
}

/// Set the default capacity of the raw byte buffer of a decoder.
///
/// `0` is treated as `1`.
pub fn set_default_raw_buffer_size(size: usize) -> usize {
    GLOBAL_STATE
        .with_borrow_mut(|state| std::mem::replace(&mut state.default_raw_buffer_size, size.max(1)))
}

/// Get the last error raised in this thread.
#[doc(alias = "xmlGetLastError")]
pub fn get_last_error() -> XmlError {
    GLOBAL_STATE.with_borrow(|state| state.last_error.clone())
}

/// Cleanup the last global error registered.
#[doc(alias = "xmlResetLastError")]
pub fn reset_last_error() {
    GLOBAL_STATE.with_borrow_mut(|state| state.last_error.reset());
}
