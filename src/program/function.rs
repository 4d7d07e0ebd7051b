use string_cache::DefaultAtom;

use crate::error::BuildError;
use super::block::{Block, BlockRef};
use super::symbol::{BuilderId, SymbolId};

/**
  An ordered list of blocks that is linked into the image as one contiguous unit.

  Functions are created by `ByteCodeBuilder::new_function`, which registers the name and hands
  out the function's symbol. Once linked, the block layout is frozen.
*/
#[derive(Clone, Debug)]
pub struct Function {
  name    : DefaultAtom,
  symbol  : SymbolId,
  builder : BuilderId,
  blocks  : Vec<Block>,
  linked  : bool,
}

impl Function {
  pub(crate) fn new(name: DefaultAtom, symbol: SymbolId, builder: BuilderId) -> Function {
    Function {
      name,
      symbol,
      builder,
      blocks : Vec::new(),
      linked : false
    }
  }

  pub fn name(&self) -> &DefaultAtom {
    &self.name
  }

  pub fn symbol(&self) -> SymbolId {
    self.symbol
  }

  /// The builder that created this function and owns its symbols.
  pub fn builder(&self) -> BuilderId {
    self.builder
  }

  pub fn blocks(&self) -> &[Block] {
    &self.blocks
  }

  pub fn is_linked(&self) -> bool {
    self.linked
  }

  /// The total encoded size of all blocks.
  pub fn len(&self) -> usize {
    self.blocks.iter().map(Block::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn block(&self, block: BlockRef) -> Option<&Block> {
    if !self.owns(block) {
      return None;
    }
    self.blocks.get(block.index)
  }

  /// Access a block for encoding. Fails once the function is linked, or if `block` is foreign.
  pub fn block_mut(&mut self, block: BlockRef) -> Result<&mut Block, BuildError> {
    if self.linked {
      return Err(BuildError::AlreadyLinked(self.name.clone()));
    }
    if !self.owns(block) {
      return Err(BuildError::UnknownBlock(block.symbol, self.name.clone()));
    }
    let name = &self.name;
    self.blocks
        .get_mut(block.index)
        .ok_or_else(|| BuildError::UnknownBlock(block.symbol, name.clone()))
  }

  fn owns(&self, block: BlockRef) -> bool {
    block.builder == self.builder && block.function == self.symbol
  }

  pub(crate) fn push_block(&mut self, symbol: SymbolId) -> BlockRef {
    self.blocks.push(Block::new(symbol));
    BlockRef {
      builder  : self.builder,
      function : self.symbol,
      index    : self.blocks.len() - 1,
      symbol
    }
  }

  pub(crate) fn blocks_mut(&mut self) -> &mut [Block] {
    &mut self.blocks
  }

  pub(crate) fn mark_linked(&mut self) {
    self.linked = true;
  }
}

/// A named, free-standing byte container for data or code outside any function.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Global {
  name         : DefaultAtom,
  instructions : Vec<u8>,
}

impl Global {
  pub fn new(name: &str) -> Global {
    Global {
      name         : DefaultAtom::from(name),
      instructions : Vec::new()
    }
  }

  pub fn name(&self) -> &DefaultAtom {
    &self.name
  }

  pub fn instructions(&self) -> &[u8] {
    &self.instructions
  }

  /// Encode into a global with `encode_instruction(global.instructions_mut(), ..)`.
  pub fn instructions_mut(&mut self) -> &mut Vec<u8> {
    &mut self.instructions
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::{encode_instruction, Instruction, Operation};

  fn function() -> Function {
    Function::new(DefaultAtom::from("main"), SymbolId::from_index(0), BuilderId::next())
  }

  #[test]
  fn blocks_are_ordered() {
    let mut f = function();
    assert!(f.blocks().is_empty());
    let a = f.push_block(SymbolId::from_index(1));
    let b = f.push_block(SymbolId::from_index(2));
    assert_eq!((a.index(), b.index()), (0, 1));
    assert_eq!(b.function(), f.symbol());

    f.block_mut(a).unwrap().stop();
    f.block_mut(b).unwrap().jmp();
    f.block_mut(b).unwrap().dump();
    assert_eq!(f.len(), 3);
    assert_eq!(f.block(b).map(Block::len), Some(2));
  }

  #[test]
  fn linked_functions_are_frozen() {
    let mut f = function();
    let a = f.push_block(SymbolId::from_index(1));
    f.mark_linked();
    assert_eq!(f.block_mut(a).err(), Some(BuildError::AlreadyLinked(DefaultAtom::from("main"))));
    assert!(f.block(a).is_some());
  }

  #[test]
  fn foreign_blocks_are_rejected() {
    let mut f = function();
    let mut other = Function::new(DefaultAtom::from("other"), SymbolId::from_index(5), f.builder());
    let foreign = other.push_block(SymbolId::from_index(6));
    assert!(f.block(foreign).is_none());
    assert_eq!(
      f.block_mut(foreign).err(),
      Some(BuildError::UnknownBlock(SymbolId::from_index(6), DefaultAtom::from("main")))
    );
  }

  #[test]
  fn blocks_from_another_builder_are_rejected() {
    let mut f = function();
    f.push_block(SymbolId::from_index(1));
    // Same symbol ids, different arena.
    let mut twin = function();
    let twin_block = twin.push_block(SymbolId::from_index(1));
    assert!(f.block(twin_block).is_none());
    assert!(f.block_mut(twin_block).is_err());
  }

  #[test]
  fn globals_accept_encoded_code() {
    let mut global = Global::new("table");
    encode_instruction(global.instructions_mut(), &Instruction::Nullary(Operation::Xchg)).unwrap();
    assert_eq!(global.instructions(), &[0x2A][..]);
    assert_eq!(global.name(), &DefaultAtom::from("table"));
  }
}
