use bimap::BiMap;
use string_cache::DefaultAtom;

use crate::error::BuildError;
use crate::program::SymbolId;

/**
  A mapping between names and their symbols. Names are unique within one table.
  A symbol table is really just a convenience wrapper around a BiMap.
*/
pub struct SymbolTable {
  table: BiMap<DefaultAtom, SymbolId>
}

impl SymbolTable {

  pub fn new() -> SymbolTable {
    SymbolTable {
      table: BiMap::new()
    }
  }

  pub fn get_symbol(&self, name: &DefaultAtom) -> Option<SymbolId> {
    self.table.get_by_left(name).cloned()
  }

  pub fn get_name(&self, symbol: SymbolId) -> Option<&DefaultAtom> {
    self.table.get_by_right(&symbol)
  }

  pub fn contains(&self, name: &DefaultAtom) -> bool {
    self.table.contains_left(name)
  }

  pub fn insert(&mut self, name: DefaultAtom, symbol: SymbolId) -> Result<(), BuildError> {
    self.table
        .insert_no_overwrite(name, symbol)
        .map_err(|(name, _symbol)| BuildError::DuplicateSymbol(name))
  }

  pub fn len(&self) -> usize {
    self.table.len()
  }

  pub fn is_empty(&self) -> bool {
    self.table.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&DefaultAtom, &SymbolId)> {
    self.table.iter()
  }
}

impl Default for SymbolTable {
  fn default() -> Self {
    SymbolTable::new()
  }
}
