//! Provide the frames of the open inputs.
//!
//! Frames live in an arena and are addressed by index. Released slots are kept
//! on a free list and reused by the next push.

use crate::{dict::XmlSymbol, reader::XmlReader};

use super::XmlEntityContext;

/// The kind of an open input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlInputKind {
    Document,
    ExternalSubset,
    GeneralEntity,
    ParameterEntity,
}

/// A snapshot of one open input context.
pub struct XmlReaderState {
    pub(crate) reader: Option<XmlReader>,
    pub(crate) public_id: Option<XmlSymbol>,
    pub(crate) system_id: Option<XmlSymbol>,
    pub(crate) entity_name: Option<XmlSymbol>,
    pub(crate) kind: XmlInputKind,
    pub(crate) context: XmlEntityContext,
    pub(crate) reader_id: u32,
    pub(crate) depth: usize,
    pub(crate) is_external: bool,
}

impl XmlReaderState {
    pub(crate) fn new(kind: XmlInputKind, context: XmlEntityContext, depth: usize) -> Self {
        Self {
            reader: None,
            public_id: None,
            system_id: None,
            entity_name: None,
            kind,
            context,
            reader_id: 0,
            depth,
            is_external: false,
        }
    }

    pub fn reader(&self) -> Option<&XmlReader> {
        self.reader.as_ref()
    }

    pub fn public_id(&self) -> Option<XmlSymbol> {
        self.public_id
    }

    /// Return the expanded system identifier of this input.
    pub fn system_id(&self) -> Option<XmlSymbol> {
        self.system_id
    }

    pub fn entity_name(&self) -> Option<XmlSymbol> {
        self.entity_name
    }

    pub fn kind(&self) -> XmlInputKind {
        self.kind
    }

    pub fn context(&self) -> XmlEntityContext {
        self.context
    }

    pub fn reader_id(&self) -> u32 {
        self.reader_id
    }

    /// Return the reader depth given by the caller when this input was opened.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Check if this input is read from an external resource.
    pub fn is_external(&self) -> bool {
        self.is_external
    }
}

#[derive(Default)]
pub(crate) struct XmlReaderStateArena {
    states: Vec<Option<XmlReaderState>>,
    free: Vec<usize>,
}

impl XmlReaderStateArena {
    pub(crate) fn alloc(&mut self, state: XmlReaderState) -> usize {
        if let Some(index) = self.free.pop() {
            self.states[index] = Some(state);
            index
        } else {
            self.states.push(Some(state));
            self.states.len() - 1
        }
    }

    /// Release the slot at `index` and return its frame.
    pub(crate) fn release(&mut self, index: usize) -> Option<XmlReaderState> {
        let state = self.states.get_mut(index)?.take()?;
        self.free.push(index);
        Some(state)
    }

    pub(crate) fn get(&self, index: usize) -> Option<&XmlReaderState> {
        self.states.get(index)?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut XmlReaderState> {
        self.states.get_mut(index)?.as_mut()
    }

    /// Return the number of slots ever allocated.
    pub(crate) fn capacity(&self) -> usize {
        self.states.len()
    }

    pub(crate) fn clear(&mut self) {
        self.free.clear();
        for (index, state) in self.states.iter_mut().enumerate() {
            if let Some(mut state) = state.take() {
                if let Some(reader) = state.reader.as_mut() {
                    reader.close();
                }
            }
            self.free.push(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_slots_are_reused() {
        let mut arena = XmlReaderStateArena::default();
        let frame =
            || XmlReaderState::new(XmlInputKind::GeneralEntity, XmlEntityContext::InContent, 0);
        let a = arena.alloc(frame());
        let b = arena.alloc(frame());
        assert_ne!(a, b);
        assert!(arena.release(a).is_some());
        assert!(arena.get(a).is_none());
        assert!(arena.release(a).is_none());
        let c = arena.alloc(frame());
        assert_eq!(a, c);
        assert_eq!(arena.capacity(), 2);
        arena.get_mut(c).unwrap().depth = 3;
        assert_eq!(arena.get(c).unwrap().depth(), 3);

        arena.clear();
        assert!(arena.get(b).is_none());
        arena.alloc(frame());
        arena.alloc(frame());
        assert_eq!(arena.capacity(), 2);
    }
}
