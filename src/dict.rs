//! Provide the symbol table used to intern every name, literal value and identifier.
//!
//! Entity and notation records never hold raw text. They hold [`XmlSymbol`]s,
//! and two symbols of the same dictionary are equal iff their texts are equal.

use std::{
    collections::HashMap,
    hash::{BuildHasher, Hasher},
    num::NonZeroU32,
    rc::Rc,
};

/// An interned string.
///
/// Symbols are only meaningful for the [`XmlDict`] that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct XmlSymbol(NonZeroU32);

impl XmlSymbol {
    /// Return the integer id of this symbol. Ids start from `1`.
    pub fn id(self) -> u32 {
        self.0.get()
    }

    fn index(self) -> usize {
        self.0.get() as usize - 1
    }
}

#[derive(Clone, Copy)]
pub struct XmlDictHashBuilder {
    seed: u64,
}

impl BuildHasher for XmlDictHashBuilder {
    type Hasher = XmlDictHasher;

    fn build_hasher(&self) -> Self::Hasher {
        XmlDictHasher { value: self.seed }
    }
}

pub struct XmlDictHasher {
    value: u64,
}

impl Hasher for XmlDictHasher {
    fn finish(&self) -> u64 {
        self.value ^ self.value.wrapping_shl(5).wrapping_add(self.value.wrapping_shr(3))
    }

    fn write(&mut self, bytes: &[u8]) {
        if let Some(&first) = bytes.first() {
            self.value = self.value.wrapping_add(30 * first as u64);
        }
        for &ch in bytes {
            self.value ^= self
                .value
                .wrapping_shl(5)
                .wrapping_add(self.value.wrapping_shr(3))
                .wrapping_add(ch as u64);
        }
    }
}

/// The dictionary, interning strings to [`XmlSymbol`]s.
#[doc(alias = "xmlDict")]
pub struct XmlDict {
    strings: Vec<Rc<str>>,
    index: HashMap<Rc<str>, XmlSymbol, XmlDictHashBuilder>,
}

impl XmlDict {
    /// Create a new dictionary.
    #[doc(alias = "xmlDictCreate")]
    pub fn new() -> Self {
        Self {
            strings: vec![],
            index: HashMap::with_hasher(XmlDictHashBuilder {
                seed: rand::random(),
            }),
        }
    }

    /// Add `name` to the dictionary if it is not present yet.
    ///
    /// Returns the symbol of `name`.
    #[doc(alias = "xmlDictLookup")]
    pub fn intern(&mut self, name: &str) -> XmlSymbol {
        if let Some(&symbol) = self.index.get(name) {
            return symbol;
        }
        self.strings.push(Rc::from(name));
        // `strings` is never empty here, so the id is never zero.
        let symbol = XmlSymbol(NonZeroU32::MIN.saturating_add(self.strings.len() as u32 - 1));
        self.index.insert(self.strings[symbol.index()].clone(), symbol);
        symbol
    }

    /// Check if `name` exists in the dictionary.
    #[doc(alias = "xmlDictExists")]
    pub fn lookup(&self, name: &str) -> Option<XmlSymbol> {
        self.index.get(name).copied()
    }

    /// Return the text of `symbol`.
    pub fn get(&self, symbol: XmlSymbol) -> Option<&str> {
        self.strings.get(symbol.index()).map(|s| s.as_ref())
    }

    /// Return the shared text of `symbol`.
    pub fn get_shared(&self, symbol: XmlSymbol) -> Option<Rc<str>> {
        self.strings.get(symbol.index()).cloned()
    }

    /// Return the number of interned strings.
    #[doc(alias = "xmlDictSize")]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Forget every binding. Symbols issued before are invalidated.
    pub fn clear(&mut self) {
        self.strings.clear();
        self.index.clear();
    }
}

impl Default for XmlDict {
    fn default() -> Self {
        Self::new()
    }
}
