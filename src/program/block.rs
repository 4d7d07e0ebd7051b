use std::fmt::{Display, Formatter};

use crate::bytecode::{encode_instruction, write_instruction, Instruction};
use crate::error::BuildError;
use super::symbol::{Address, BuilderId, SymbolId, Symbols, ADDRESS_SIZE};

/**
  A deferred write of `symbol`'s address into the 8 bytes at `offset`.

  While recorded in a `Block`, `offset` is relative to the start of the block's code. Once the
  block is in the image, an unresolved fixup is relocated so `offset` is an image address.
*/
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct Fixup {
  pub symbol : SymbolId,
  pub offset : usize,
}

impl Fixup {
  pub fn new(symbol: SymbolId, offset: usize) -> Fixup {
    Fixup { symbol, offset }
  }

  /// Overwrites the placeholder with `address`, little-endian.
  pub fn apply(&self, address: Address, code: &mut [u8]) {
    code[self.offset..self.offset + ADDRESS_SIZE].copy_from_slice(&address.to_le_bytes());
  }

  pub fn relocated(&self, base: Address) -> Fixup {
    Fixup::new(self.symbol, self.offset + base as usize)
  }
}

impl Display for Fixup {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} at +{:#x}", self.symbol, self.offset)
  }
}

/// A cheap handle to a block of a particular function, usable as a jump target before linking.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct BlockRef {
  pub(crate) builder  : BuilderId,
  pub(crate) function : SymbolId,
  pub(crate) index    : usize,
  pub(crate) symbol   : SymbolId,
}

impl BlockRef {
  pub fn symbol(&self) -> SymbolId {
    self.symbol
  }

  pub fn function(&self) -> SymbolId {
    self.function
  }

  pub fn index(&self) -> usize {
    self.index
  }
}

/// A run of encoded instructions plus the fixups recorded while encoding them.
#[derive(Clone, Debug)]
pub struct Block {
  symbol : SymbolId,
  code   : Vec<u8>,
  fixups : Vec<Fixup>,
}

impl Block {
  pub(crate) fn new(symbol: SymbolId) -> Block {
    Block {
      symbol,
      code   : Vec::new(),
      fixups : Vec::new()
    }
  }

  pub fn symbol(&self) -> SymbolId {
    self.symbol
  }

  pub fn code(&self) -> &[u8] {
    &self.code
  }

  pub fn fixups(&self) -> &[Fixup] {
    &self.fixups
  }

  pub fn len(&self) -> usize {
    self.code.len()
  }

  pub fn is_empty(&self) -> bool {
    self.code.is_empty()
  }

  /**
    Encodes an arbitrary instruction. Fails without writing anything if the instruction's form
    does not match its operation's shape.
  */
  pub fn emit(&mut self, instruction: &Instruction) -> Result<(), BuildError> {
    if let Some(fixup) = encode_instruction(&mut self.code, instruction)? {
      self.fixups.push(fixup);
    }
    Ok(())
  }

  // The per-operation entry points construct well-shaped instructions by construction.
  pub(crate) fn append(&mut self, instruction: Instruction) {
    if let Some(fixup) = write_instruction(&mut self.code, &instruction) {
      self.fixups.push(fixup);
    }
  }

  /**
    Writes the address of every fixup target that has one. Returns the fixups whose target is
    still unresolved, with block-relative offsets.
  */
  pub(crate) fn patch(&mut self, symbols: &Symbols) -> Vec<Fixup> {
    let mut unresolved = Vec::new();
    for fixup in &self.fixups {
      match symbols[fixup.symbol].address() {
        Some(address) => fixup.apply(address, &mut self.code),
        None          => unresolved.push(*fixup)
      }
    }
    unresolved
  }
}
