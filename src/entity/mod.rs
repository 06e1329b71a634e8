//! Provide the entity declarations store and the entity manager.
//!
//! - [`table`] stores entity and notation declarations.
//! - [`state`] stores the frames of the open inputs.
//! - [`manager`] opens and closes entities and keeps both stacks in sync.

pub mod manager;
pub mod state;
pub mod table;

pub use manager::*;
pub use state::*;
pub use table::*;

use crate::dict::XmlSymbol;

/// The options of an entity manager. They are combined as bit flags.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlEntityOption {
    /// Report undeclared entities referenced from declarations as validity warnings
    Validate = 1 << 0,
    /// Pass charset names unknown to the table to the platform decoders
    AllowPassThroughEncodings = 1 << 1,
    /// Surround internal expansions in literals with a space
    PadLiteralExpansions = 1 << 2,
    /// Relax the nesting limit
    Huge = 1 << 3,
    /// Do not seed the predefined entities
    NoPredefined = 1 << 4,
}

/// An opaque handle to a declaration of an [`XmlEntityTable`].
///
/// A handle remembers whether it was issued by a parameter entity table, so a
/// table never answers for the handles of another kind of table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct XmlEntityHandle {
    pub(crate) id: u32,
    pub(crate) parameter: bool,
}

impl XmlEntityHandle {
    /// Return the record index in the issuing table.
    pub fn id(self) -> u32 {
        self.id
    }

    /// Check if the handle was issued by a parameter entity table.
    pub fn is_parameter(self) -> bool {
        self.parameter
    }
}

/// Where an entity reference has been found.
///
/// Contexts greater than [`XmlEntityContext::InContent`] refer to parameter entities.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum XmlEntityContext {
    InAttValue = 0,
    InDefaultAttValue = 1,
    InContent = 2,
    InDTD = 3,
    InMarkupDecl = 4,
    InEntityValue = 5,
}

impl XmlEntityContext {
    /// Check if a reference in this context names a parameter entity.
    pub fn is_parameter(self) -> bool {
        self > Self::InContent
    }

    /// Check if this context is an attribute value, where external entities are forbidden.
    pub fn is_attribute_value(self) -> bool {
        matches!(self, Self::InAttValue | Self::InDefaultAttValue)
    }

    /// Check if this context is a literal whose expansions may be padded.
    pub fn is_literal(self) -> bool {
        matches!(self, Self::InAttValue | Self::InEntityValue)
    }
}

/// The event-handler collaborator.
///
/// All methods do nothing by default.
pub trait XmlEntityHandler {
    /// Called when the expansion of an entity begins.
    fn start_entity(&mut self, name: &str, is_parameter: bool) {
        let _ = (name, is_parameter);
    }

    /// Called when the expansion of an entity ends.
    fn end_entity(&mut self, name: &str, is_parameter: bool) {
        let _ = (name, is_parameter);
    }

    /// Called when the active input is exhausted.
    ///
    /// `entities_remain_open` is `false` only at the bottom of the stack.
    fn end_of_input(&mut self, entities_remain_open: bool) {
        let _ = entities_remain_open;
    }

    /// Called whenever the active reader changes.
    fn reader_changed(&mut self, reader_id: u32) {
        let _ = reader_id;
    }
}

/// The character-data collaborator.
pub trait XmlCharDataSink {
    /// Receive decoded text.
    fn characters(&mut self, text: &str);

    /// Receive decoded text as an interned symbol.
    ///
    /// Called instead of [`XmlCharDataSink::characters`] if
    /// [`XmlCharDataSink::wants_symbols`] returns `true`.
    fn symbol(&mut self, symbol: XmlSymbol) {
        let _ = symbol;
    }

    fn wants_symbols(&self) -> bool {
        false
    }
}

impl XmlCharDataSink for String {
    fn characters(&mut self, text: &str) {
        self.push_str(text);
    }
}
