//! Provide the store of entity and notation declarations.
//!
//! Records are kept in chunks of 32 with one array per column, and are
//! addressed by stable integer handles. A record is a notation iff it has no
//! entity name. Notations are chained into a singly linked list through the
//! `next` column.

use std::collections::HashMap;

use crate::dict::{XmlDict, XmlSymbol};

use super::XmlEntityHandle;

const CHUNK_SHIFT: u32 = 5;
const CHUNK_SIZE: usize = 1 << CHUNK_SHIFT;
const CHUNK_MASK: u32 = CHUNK_SIZE as u32 - 1;

const FLAG_EXTERNAL: u8 = 1 << 0;
const FLAG_DECLARED_EXTERNALLY: u8 = 1 << 1;

/// The predefined entities and their replacement texts.
pub const PREDEFINED_ENTITIES: [(&str, &str); 5] = [
    ("lt", "<"),
    ("gt", ">"),
    ("amp", "&"),
    ("apos", "'"),
    ("quot", "\""),
];

/// The kind of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlEntityType {
    Internal,
    External,
    Unparsed,
    Notation,
}

#[derive(Default)]
struct XmlEntityChunk {
    name: [Option<XmlSymbol>; CHUNK_SIZE],
    value: [Option<XmlSymbol>; CHUNK_SIZE],
    public_id: [Option<XmlSymbol>; CHUNK_SIZE],
    system_id: [Option<XmlSymbol>; CHUNK_SIZE],
    base_system_id: [Option<XmlSymbol>; CHUNK_SIZE],
    notation_name: [Option<XmlSymbol>; CHUNK_SIZE],
    flags: [u8; CHUNK_SIZE],
    next: [Option<u32>; CHUNK_SIZE],
}

/// A chunked store of declarations.
#[derive(Default)]
pub struct XmlEntityTable {
    parameter: bool,
    chunks: Vec<Box<XmlEntityChunk>>,
    count: u32,
    names: HashMap<XmlSymbol, u32>,
    notation_head: Option<u32>,
    notation_count: usize,
    predefined_count: u32,
}

impl XmlEntityTable {
    /// Create a table of general entities and notations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table of parameter entities.
    pub fn new_parameter() -> Self {
        Self {
            parameter: true,
            ..Self::default()
        }
    }

    pub fn is_parameter(&self) -> bool {
        self.parameter
    }

    fn handle(&self, id: u32) -> XmlEntityHandle {
        XmlEntityHandle {
            id,
            parameter: self.parameter,
        }
    }

    /// Return the record of `handle`, or `None` if it was issued by another kind of table.
    fn slot(&self, handle: XmlEntityHandle) -> Option<(&XmlEntityChunk, usize)> {
        (handle.parameter == self.parameter && handle.id < self.count).then(|| {
            (
                self.chunks[(handle.id >> CHUNK_SHIFT) as usize].as_ref(),
                (handle.id & CHUNK_MASK) as usize,
            )
        })
    }

    /// Append an empty record and return its handle.
    fn create_record(&mut self) -> (XmlEntityHandle, &mut XmlEntityChunk, usize) {
        let id = self.count;
        let chunk = (id >> CHUNK_SHIFT) as usize;
        if chunk == self.chunks.len() {
            self.chunks.push(Box::default());
        }
        self.count += 1;
        let index = (id & CHUNK_MASK) as usize;
        let handle = self.handle(id);
        let c = self.chunks[chunk].as_mut();
        c.name[index] = None;
        c.value[index] = None;
        c.public_id[index] = None;
        c.system_id[index] = None;
        c.base_system_id[index] = None;
        c.notation_name[index] = None;
        c.flags[index] = 0;
        c.next[index] = None;
        (handle, c, index)
    }

    /// Add an entity record named `name`.
    ///
    /// If `name` is already declared, the table is unchanged and the handle of
    /// the first declaration is returned as the error.
    fn add_entity(
        &mut self,
        name: XmlSymbol,
        fill: impl FnOnce(&mut XmlEntityChunk, usize),
    ) -> Result<XmlEntityHandle, XmlEntityHandle> {
        if let Some(&id) = self.names.get(&name) {
            return Err(self.handle(id));
        }
        let (handle, chunk, index) = self.create_record();
        chunk.name[index] = Some(name);
        fill(chunk, index);
        self.names.insert(name, handle.id);
        Ok(handle)
    }

    #[doc(alias = "addInternalEntityDecl")]
    pub fn add_internal(
        &mut self,
        name: XmlSymbol,
        value: XmlSymbol,
        declared_externally: bool,
    ) -> Result<XmlEntityHandle, XmlEntityHandle> {
        self.add_entity(name, |chunk, index| {
            chunk.value[index] = Some(value);
            if declared_externally {
                chunk.flags[index] |= FLAG_DECLARED_EXTERNALLY;
            }
        })
    }

    #[doc(alias = "addExternalEntityDecl")]
    pub fn add_external(
        &mut self,
        name: XmlSymbol,
        public_id: Option<XmlSymbol>,
        system_id: Option<XmlSymbol>,
        base_system_id: Option<XmlSymbol>,
        declared_externally: bool,
    ) -> Result<XmlEntityHandle, XmlEntityHandle> {
        self.add_entity(name, |chunk, index| {
            chunk.public_id[index] = public_id;
            chunk.system_id[index] = system_id;
            chunk.base_system_id[index] = base_system_id;
            chunk.flags[index] |= FLAG_EXTERNAL;
            if declared_externally {
                chunk.flags[index] |= FLAG_DECLARED_EXTERNALLY;
            }
        })
    }

    #[doc(alias = "addUnparsedEntityDecl")]
    pub fn add_unparsed(
        &mut self,
        name: XmlSymbol,
        public_id: Option<XmlSymbol>,
        system_id: Option<XmlSymbol>,
        base_system_id: Option<XmlSymbol>,
        notation: XmlSymbol,
        declared_externally: bool,
    ) -> Result<XmlEntityHandle, XmlEntityHandle> {
        self.add_entity(name, |chunk, index| {
            chunk.public_id[index] = public_id;
            chunk.system_id[index] = system_id;
            chunk.base_system_id[index] = base_system_id;
            chunk.notation_name[index] = Some(notation);
            chunk.flags[index] |= FLAG_EXTERNAL;
            if declared_externally {
                chunk.flags[index] |= FLAG_DECLARED_EXTERNALLY;
            }
        })
    }

    /// Add a notation record.
    ///
    /// If `name` is already declared as a notation, the table is unchanged and
    /// the handle of the first declaration is returned as the error.
    #[doc(alias = "addNotationDecl")]
    pub fn add_notation(
        &mut self,
        name: XmlSymbol,
        public_id: Option<XmlSymbol>,
        system_id: Option<XmlSymbol>,
        base_system_id: Option<XmlSymbol>,
    ) -> Result<XmlEntityHandle, XmlEntityHandle> {
        if let Some(existing) = self.find_notation(name) {
            return Err(existing);
        }
        let head = self.notation_head;
        let (handle, chunk, index) = self.create_record();
        // the notation name lives in the value column, the name column stays empty
        chunk.value[index] = Some(name);
        chunk.public_id[index] = public_id;
        chunk.system_id[index] = system_id;
        chunk.base_system_id[index] = base_system_id;
        chunk.next[index] = head;
        self.notation_head = Some(handle.id);
        self.notation_count += 1;
        Ok(handle)
    }

    /// Return the entity declared as `name`.
    pub fn find_entity(&self, name: XmlSymbol) -> Option<XmlEntityHandle> {
        self.names.get(&name).map(|&id| self.handle(id))
    }

    /// Return the notation declared as `name`.
    pub fn find_notation(&self, name: XmlSymbol) -> Option<XmlEntityHandle> {
        self.notations()
            .find(|&handle| self.notation_name_of(handle) == Some(name))
    }

    fn notation_name_of(&self, handle: XmlEntityHandle) -> Option<XmlSymbol> {
        let (chunk, index) = self.slot(handle)?;
        chunk.name[index].is_none().then_some(chunk.value[index]).flatten()
    }

    /// Iterate over the notations, the most recent first.
    pub fn notations(&self) -> impl Iterator<Item = XmlEntityHandle> + '_ {
        std::iter::successors(self.notation_head.map(|id| self.handle(id)), |&handle| {
            self.slot(handle)
                .and_then(|(chunk, index)| chunk.next[index])
                .map(|id| self.handle(id))
        })
    }

    /// Return the kind of the record at `handle`.
    pub fn entity_type(&self, handle: XmlEntityHandle) -> Option<XmlEntityType> {
        let (chunk, index) = self.slot(handle)?;
        Some(if chunk.name[index].is_none() {
            XmlEntityType::Notation
        } else if chunk.notation_name[index].is_some() {
            XmlEntityType::Unparsed
        } else if chunk.flags[index] & FLAG_EXTERNAL != 0 {
            XmlEntityType::External
        } else {
            XmlEntityType::Internal
        })
    }

    /// Return the name of an entity or a notation.
    pub fn name(&self, handle: XmlEntityHandle) -> Option<XmlSymbol> {
        let (chunk, index) = self.slot(handle)?;
        chunk.name[index].or_else(|| self.notation_name_of(handle))
    }

    /// Return the replacement text of an internal entity.
    pub fn value(&self, handle: XmlEntityHandle) -> Option<XmlSymbol> {
        let (chunk, index) = self.slot(handle)?;
        chunk.name[index].and(chunk.value[index])
    }

    pub fn public_id(&self, handle: XmlEntityHandle) -> Option<XmlSymbol> {
        self.slot(handle).and_then(|(chunk, index)| chunk.public_id[index])
    }

    pub fn system_id(&self, handle: XmlEntityHandle) -> Option<XmlSymbol> {
        self.slot(handle).and_then(|(chunk, index)| chunk.system_id[index])
    }

    pub fn base_system_id(&self, handle: XmlEntityHandle) -> Option<XmlSymbol> {
        self.slot(handle)
            .and_then(|(chunk, index)| chunk.base_system_id[index])
    }

    pub fn notation_name(&self, handle: XmlEntityHandle) -> Option<XmlSymbol> {
        self.slot(handle)
            .and_then(|(chunk, index)| chunk.notation_name[index])
    }

    /// Check if the record is an external or unparsed entity.
    pub fn is_external(&self, handle: XmlEntityHandle) -> bool {
        self.slot(handle)
            .is_some_and(|(chunk, index)| chunk.flags[index] & FLAG_EXTERNAL != 0)
    }

    pub fn is_unparsed(&self, handle: XmlEntityHandle) -> bool {
        self.entity_type(handle) == Some(XmlEntityType::Unparsed)
    }

    /// Check if the record was declared while reading an external entity or subset.
    pub fn is_declared_externally(&self, handle: XmlEntityHandle) -> bool {
        self.slot(handle)
            .is_some_and(|(chunk, index)| chunk.flags[index] & FLAG_DECLARED_EXTERNALLY != 0)
    }

    /// Check if the record is one of the predefined entities.
    pub fn is_predefined(&self, handle: XmlEntityHandle) -> bool {
        self.slot(handle).is_some() && handle.id < self.predefined_count
    }

    /// Return the number of records, notations included.
    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn notation_count(&self) -> usize {
        self.notation_count
    }

    /// Forget every record. Allocated chunks are kept.
    ///
    /// If `predefined` is set, the predefined entities are declared again.
    pub fn reset(&mut self, dict: &mut XmlDict, predefined: bool) {
        self.count = 0;
        self.names.clear();
        self.notation_head = None;
        self.notation_count = 0;
        self.predefined_count = 0;
        if predefined {
            for (name, value) in PREDEFINED_ENTITIES {
                let name = dict.intern(name);
                let value = dict.intern(value);
                self.add_internal(name, value, false).ok();
            }
            self.predefined_count = self.count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_span_chunks() {
        let mut dict = XmlDict::new();
        let mut table = XmlEntityTable::new();
        let value = dict.intern("v");
        let handles = (0..100)
            .map(|i| {
                let name = dict.intern(&format!("e{i}"));
                table.add_internal(name, value, false).unwrap()
            })
            .collect::<Vec<_>>();
        assert_eq!(table.len(), 100);
        assert_eq!(table.chunks.len(), 4);
        for (i, handle) in handles.into_iter().enumerate() {
            let name = table.name(handle).unwrap();
            assert_eq!(dict.get(name), Some(format!("e{i}").as_str()));
            assert_eq!(table.entity_type(handle), Some(XmlEntityType::Internal));
        }
    }

    #[test]
    fn first_declaration_wins() {
        let mut dict = XmlDict::new();
        let mut table = XmlEntityTable::new();
        let name = dict.intern("a");
        let first = table.add_internal(name, dict.intern("1"), false).unwrap();
        let second = table.add_internal(name, dict.intern("2"), false);
        assert_eq!(second, Err(first));
        assert_eq!(table.len(), 1);
        assert_eq!(table.value(first), dict.lookup("1"));
    }

    #[test]
    fn duplicate_notation() {
        let mut dict = XmlDict::new();
        let mut table = XmlEntityTable::new();
        let gif = dict.intern("gif");
        let png = dict.intern("png");
        let sys = Some(dict.intern("image/gif"));
        let first = table.add_notation(gif, None, sys, None).unwrap();
        table.add_notation(png, None, None, None).unwrap();
        assert_eq!(table.notation_count(), 2);
        assert_eq!(table.add_notation(gif, None, None, None), Err(first));
        assert_eq!(table.notation_count(), 2);
        assert_eq!(table.len(), 2);
        assert_eq!(table.find_notation(gif), Some(first));
        assert_eq!(table.system_id(first), sys);
        assert_eq!(table.entity_type(first), Some(XmlEntityType::Notation));
        // notations are not entities
        assert_eq!(table.find_entity(gif), None);
        assert_eq!(table.value(first), None);
    }

    #[test]
    fn notation_and_entity_share_a_name() {
        let mut dict = XmlDict::new();
        let mut table = XmlEntityTable::new();
        let name = dict.intern("x");
        let notation = table.add_notation(name, None, None, None).unwrap();
        let entity = table.add_internal(name, dict.intern("v"), false).unwrap();
        assert_ne!(notation, entity);
        assert_eq!(table.find_notation(name), Some(notation));
        assert_eq!(table.find_entity(name), Some(entity));
    }

    #[test]
    fn reset_seeds_predefined() {
        let mut dict = XmlDict::new();
        let mut table = XmlEntityTable::new();
        table.reset(&mut dict, true);
        assert_eq!(table.len(), 5);
        let amp = table.find_entity(dict.lookup("amp").unwrap()).unwrap();
        assert!(table.is_predefined(amp));
        assert_eq!(dict.get(table.value(amp).unwrap()), Some("&"));

        let name = dict.intern("mine");
        let mine = table.add_external(name, None, None, None, true).unwrap();
        assert!(!table.is_predefined(mine));
        assert!(table.is_external(mine));
        assert!(table.is_declared_externally(mine));

        table.reset(&mut dict, false);
        assert!(table.is_empty());
        assert_eq!(table.find_entity(name), None);
        assert!(!table.is_predefined(amp));
    }

    #[test]
    fn handles_belong_to_their_table() {
        let mut dict = XmlDict::new();
        let mut general = XmlEntityTable::new();
        let mut parameter = XmlEntityTable::new_parameter();
        general.reset(&mut dict, true);
        parameter.reset(&mut dict, false);
        let name = dict.intern("p");
        let pe = parameter.add_internal(name, dict.intern("v"), false).unwrap();
        let lt = general.find_entity(dict.lookup("lt").unwrap()).unwrap();
        assert_eq!(pe.id(), lt.id());
        assert!(pe.is_parameter());
        assert!(!lt.is_parameter());

        assert!(!general.is_predefined(pe));
        assert!(!parameter.is_predefined(pe));
        assert_eq!(general.name(pe), None);
        assert_eq!(general.entity_type(pe), None);
        assert_eq!(parameter.name(lt), None);
        assert_eq!(parameter.name(pe), Some(name));
    }
}
