//! Symbols are named locations in the program image. They are created unresolved, handed out by
//! `SymbolId`, and given an address exactly once, by the linker.

use std::fmt::{Display, Formatter};
use std::ops::{Index, IndexMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use string_cache::DefaultAtom;

/// A byte offset into the program image.
pub type Address = u64;
/// The number of bytes an address occupies in encoded code.
pub const ADDRESS_SIZE: usize = std::mem::size_of::<Address>();

static NEXT_BUILDER: AtomicUsize = AtomicUsize::new(0);

/// Identifies the builder whose arena a function's symbols live in.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct BuilderId(usize);

impl BuilderId {
  /// A fresh id, distinct from every other id handed out in this process.
  pub fn next() -> BuilderId {
    BuilderId(NEXT_BUILDER.fetch_add(1, Ordering::Relaxed))
  }
}

/// An index into a `Symbols` arena. Clones are cheap, and ids stay valid as the arena grows.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct SymbolId(usize);

impl SymbolId {
  pub fn from_index(index: usize) -> SymbolId {
    SymbolId(index)
  }

  pub fn idx(&self) -> usize {
    self.0
  }
}

impl Display for SymbolId {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "#{}", self.0)
  }
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Symbol {
  name    : DefaultAtom,
  address : Option<Address>,
  size    : usize,
}

impl Symbol {
  pub fn new(name: DefaultAtom) -> Symbol {
    Symbol {
      name,
      address : None,
      size    : 0
    }
  }

  pub fn name(&self) -> &DefaultAtom {
    &self.name
  }

  /// `None` until the owning function has been linked.
  pub fn address(&self) -> Option<Address> {
    self.address
  }

  pub fn size(&self) -> usize {
    self.size
  }

  pub fn is_resolved(&self) -> bool {
    self.address.is_some()
  }

  pub(crate) fn resolve(&mut self, address: Address, size: usize) {
    debug_assert!(self.address.is_none(), "symbol `{}` resolved twice", self.name);
    self.address = Some(address);
    self.size    = size;
  }
}

impl Display for Symbol {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self.address {
      Some(address) => write!(f, "{}@{:#06x}[{}]", self.name, address, self.size),
      None          => write!(f, "{}@?", self.name)
    }
  }
}

/// The arena every `SymbolId` indexes into.
#[derive(Clone, Default, Debug)]
pub struct Symbols {
  symbols: Vec<Symbol>
}

impl Symbols {
  pub fn new() -> Symbols {
    Symbols::default()
  }

  pub fn insert(&mut self, name: DefaultAtom) -> SymbolId {
    self.symbols.push(Symbol::new(name));
    SymbolId(self.symbols.len() - 1)
  }

  pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
    self.symbols.get(id.0)
  }

  pub fn len(&self) -> usize {
    self.symbols.len()
  }

  pub fn is_empty(&self) -> bool {
    self.symbols.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
    self.symbols.iter().enumerate().map(|(i, symbol)| (SymbolId(i), symbol))
  }
}

impl Index<SymbolId> for Symbols {
  type Output = Symbol;

  fn index(&self, id: SymbolId) -> &Symbol {
    &self.symbols[id.0]
  }
}

impl IndexMut<SymbolId> for Symbols {
  fn index_mut(&mut self, id: SymbolId) -> &mut Symbol {
    &mut self.symbols[id.0]
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn symbols_start_unresolved() {
    let mut symbols = Symbols::new();
    let main = symbols.insert(DefaultAtom::from("main"));
    assert!(!symbols[main].is_resolved());
    assert_eq!(symbols[main].address(), None);
    assert_eq!(symbols[main].to_string(), "main@?");
  }

  #[test]
  fn resolve_sets_address_and_size() {
    let mut symbols = Symbols::new();
    let _first = symbols.insert(DefaultAtom::from("first"));
    let second = symbols.insert(DefaultAtom::from("second"));
    assert_eq!(second.idx(), 1);

    symbols[second].resolve(0, 12);
    assert_eq!(symbols[second].address(), Some(0));
    assert_eq!(symbols[second].size(), 12);
    assert_eq!(symbols[second].to_string(), "second@0x0000[12]");
  }

  #[test]
  fn builder_ids_are_distinct() {
    assert_ne!(BuilderId::next(), BuilderId::next());
  }

  #[test]
  fn iteration_pairs_ids() {
    let mut symbols = Symbols::new();
    let a = symbols.insert(DefaultAtom::from("a"));
    let b = symbols.insert(DefaultAtom::from("b"));
    let ids: Vec<SymbolId> = symbols.iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![a, b]);
    assert!(symbols.get(SymbolId::from_index(2)).is_none());
  }
}
