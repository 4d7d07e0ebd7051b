/*!
  The linker owns the program image. Functions are built independently, referring to each other
  and to their own blocks by symbol, and are then linked one at a time: each is appended to the
  end of the image, its symbols receive their final addresses, and every recorded fixup whose
  target is known is patched.

  A fixup whose target belongs to a function that has not been linked yet stays pending at the
  image level and is patched as soon as that function is linked. `ByteCodeBuilder::finish`
  refuses to produce a `ProgramImage` while any reference is still pending.

  Linking mutates the image without synchronization. A builder must be driven by one thread at a
  time; wrap it in a `Mutex` to share it.
*/

use std::fmt::{Display, Formatter};

use log::{debug, trace};
use string_cache::DefaultAtom;

use crate::bytecode::{disassemble, listing, Instruction};
use crate::error::{BuildError, UnresolvedReference};
use crate::program::{
  Address, BlockRef, BuilderId, Fixup, Function, Global, Symbol, SymbolId, Symbols
};
use crate::symboltable::SymbolTable;

/// Bytes reserved for the image up front by `ByteCodeBuilder::new`.
pub const INITIAL_IMAGE_CAPACITY: usize = 0x100;

/**
  Function names and block labels live in separate tables, so a function named like another
  function's block (`f.0`) never blocks that function from growing. Name lookups try functions
  first.
*/
fn lookup_name(functions: &SymbolTable, labels: &SymbolTable, name: &str) -> Option<SymbolId> {
  let name = DefaultAtom::from(name);
  functions.get_symbol(&name).or_else(|| labels.get_symbol(&name))
}

pub struct ByteCodeBuilder {
  id        : BuilderId,
  code      : Vec<u8>,
  symbols   : Symbols,
  functions : SymbolTable,
  labels    : SymbolTable,
  /// Unpatched fixups with image-relative offsets.
  pending   : Vec<Fixup>,
  globals   : Vec<Global>,
}

impl ByteCodeBuilder {
  pub fn new() -> ByteCodeBuilder {
    ByteCodeBuilder::with_capacity(INITIAL_IMAGE_CAPACITY)
  }

  pub fn with_capacity(capacity: usize) -> ByteCodeBuilder {
    ByteCodeBuilder {
      id        : BuilderId::next(),
      code      : Vec::with_capacity(capacity),
      symbols   : Symbols::new(),
      functions : SymbolTable::new(),
      labels    : SymbolTable::new(),
      pending   : Vec::new(),
      globals   : Vec::new()
    }
  }

  /// The image linked so far. Pending references still hold zero placeholders.
  pub fn code(&self) -> &[u8] {
    &self.code
  }

  pub fn symbols(&self) -> &Symbols {
    &self.symbols
  }

  pub fn symbol(&self, symbol: SymbolId) -> &Symbol {
    &self.symbols[symbol]
  }

  pub fn id(&self) -> BuilderId {
    self.id
  }

  /// A function by name, or failing that a block by label.
  pub fn lookup(&self, name: &str) -> Option<SymbolId> {
    lookup_name(&self.functions, &self.labels, name)
  }

  /// Creates an empty function whose symbol can be referenced right away.
  pub fn new_function(&mut self, name: &str) -> Result<Function, BuildError> {
    let name = DefaultAtom::from(name);
    if self.functions.contains(&name) {
      return Err(BuildError::DuplicateSymbol(name));
    }
    let symbol = self.symbols.insert(name.clone());
    self.functions.insert(name.clone(), symbol)?;
    Ok(Function::new(name, symbol, self.id))
  }

  // Every later index into `symbols` with the function's ids relies on this check.
  fn check_unlinked(&self, function: &Function) -> Result<(), BuildError> {
    if function.builder() != self.id {
      return Err(BuildError::ForeignFunction(function.name().clone()));
    }
    if function.is_linked() || self.symbols[function.symbol()].is_resolved() {
      return Err(BuildError::AlreadyLinked(function.name().clone()));
    }
    Ok(())
  }

  /**
    Appends a new, empty block to `function`. The block's label is `<function>.<index>`. Fails if
    the function has already been linked or was created by another builder.
  */
  pub fn append_block(&mut self, function: &mut Function) -> Result<BlockRef, BuildError> {
    self.check_unlinked(function)?;
    let label  = DefaultAtom::from(format!("{}.{}", function.name(), function.blocks().len()));
    let symbol = self.symbols.insert(label.clone());
    // Labels are unique because function names are and indices contain no `.`.
    self.labels.insert(label, symbol)?;
    Ok(function.push_block(symbol))
  }

  /**
    Appends the function's blocks to the image in order, assigns the function and each block
    their final address and size, and patches every fixup whose target is now known, including
    references to this function left pending by functions linked earlier.
  */
  pub fn link_function(&mut self, function: &mut Function) -> Result<SymbolId, BuildError> {
    self.check_unlinked(function)?;
    for block in function.blocks() {
      if let Some(fixup) = block.fixups().iter().find(|f| self.symbols.get(f.symbol).is_none()) {
        return Err(BuildError::UnknownSymbol(fixup.symbol));
      }
    }

    let name       = function.name().clone();
    let base       = self.code.len() as Address;
    let mut cursor = base;
    for block in function.blocks() {
      self.symbols[block.symbol()].resolve(cursor, block.len());
      cursor += block.len() as Address;
    }
    let size = (cursor - base) as usize;
    self.symbols[function.symbol()].resolve(base, size);
    self.code.reserve(size);

    for block in function.blocks_mut() {
      let block_base = self.code.len() as Address;
      for fixup in block.patch(&self.symbols) {
        debug!("`{}` refers to unlinked `{}`; deferring", name, self.symbols[fixup.symbol].name());
        self.pending.push(fixup.relocated(block_base));
      }
      self.code.extend_from_slice(block.code());
    }
    function.mark_linked();

    debug!(
      "linked `{}` at {:#06x}, {} bytes in {} blocks",
      name, base, size, function.blocks().len()
    );
    self.apply_pending();

    Ok(function.symbol())
  }

  fn apply_pending(&mut self) {
    let symbols = &self.symbols;
    let code    = &mut self.code;
    self.pending.retain(|fixup| {
      match symbols[fixup.symbol].address() {
        Some(address) => {
          trace!("patching {} with {:#06x}", fixup, address);
          fixup.apply(address, code);
          false
        }
        None => true
      }
    });
  }

  /// References in the image whose target has not been linked yet.
  pub fn unresolved_references(&self) -> Vec<UnresolvedReference> {
    self.pending
        .iter()
        .map(|fixup| UnresolvedReference {
          symbol : self.symbols[fixup.symbol].name().clone(),
          offset : fixup.offset as Address
        })
        .collect()
  }

  pub fn add_global(&mut self, name: &str) -> Result<&mut Global, BuildError> {
    if self.global(name).is_some() {
      return Err(BuildError::DuplicateSymbol(DefaultAtom::from(name)));
    }
    self.globals.push(Global::new(name));
    let index = self.globals.len() - 1;
    Ok(&mut self.globals[index])
  }

  pub fn global(&self, name: &str) -> Option<&Global> {
    let name = DefaultAtom::from(name);
    self.globals.iter().find(|global| *global.name() == name)
  }

  pub fn global_mut(&mut self, name: &str) -> Option<&mut Global> {
    let name = DefaultAtom::from(name);
    self.globals.iter_mut().find(|global| *global.name() == name)
  }

  /// Consumes the builder. Fails if any reference in the image is still unresolved.
  pub fn finish(self) -> Result<ProgramImage, BuildError> {
    let unresolved = self.unresolved_references();
    if !unresolved.is_empty() {
      return Err(BuildError::UnresolvedReferences(unresolved));
    }
    debug!("finished image: {} bytes, {} symbols", self.code.len(), self.symbols.len());

    Ok(ProgramImage {
      code      : self.code,
      symbols   : self.symbols,
      functions : self.functions,
      labels    : self.labels,
      globals   : self.globals
    })
  }
}

impl Default for ByteCodeBuilder {
  fn default() -> Self {
    ByteCodeBuilder::new()
  }
}

/// A fully linked program image together with the symbols that describe it.
pub struct ProgramImage {
  code      : Vec<u8>,
  symbols   : Symbols,
  functions : SymbolTable,
  labels    : SymbolTable,
  globals   : Vec<Global>,
}

impl ProgramImage {
  pub fn code(&self) -> &[u8] {
    &self.code
  }

  pub fn into_code(self) -> Vec<u8> {
    self.code
  }

  pub fn symbols(&self) -> &Symbols {
    &self.symbols
  }

  /// A function by name, or failing that a block by label.
  pub fn symbol(&self, name: &str) -> Option<&Symbol> {
    lookup_name(&self.functions, &self.labels, name).map(|symbol| &self.symbols[symbol])
  }

  /// `None` for unknown names and for functions that were created but never linked.
  pub fn address_of(&self, name: &str) -> Option<Address> {
    self.symbol(name).and_then(Symbol::address)
  }

  /// Names of the functions and blocks that start at `address`, functions first.
  pub fn labels_at(&self, address: Address) -> Vec<&DefaultAtom> {
    self.symbols
        .iter()
        .filter(|(_, symbol)| symbol.address() == Some(address))
        .map(|(_, symbol)| symbol.name())
        .collect()
  }

  pub fn disassemble(&self) -> Result<Vec<(Address, Instruction)>, BuildError> {
    disassemble(&self.code)
  }

  pub fn globals(&self) -> &[Global] {
    &self.globals
  }

  pub fn global(&self, name: &str) -> Option<&Global> {
    let name = DefaultAtom::from(name);
    self.globals.iter().find(|global| *global.name() == name)
  }
}

impl Display for ProgramImage {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match listing(self) {
      Ok(table)  => write!(f, "{}", table),
      Err(error) => write!(f, "{}", error)
    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;
  use crate::bytecode::{read_address, Operation};

  #[test]
  fn functions_are_contiguous() {
    let mut builder = ByteCodeBuilder::new();

    let mut first = builder.new_function("first").unwrap();
    let a = builder.append_block(&mut first).unwrap();
    first.block_mut(a).unwrap().add_imm(1u8);
    first.block_mut(a).unwrap().stop();
    let first_symbol = builder.link_function(&mut first).unwrap();

    let mut second = builder.new_function("second").unwrap();
    let b = builder.append_block(&mut second).unwrap();
    second.block_mut(b).unwrap().dump();
    let second_symbol = builder.link_function(&mut second).unwrap();

    let first  = builder.symbol(first_symbol).clone();
    let second = builder.symbol(second_symbol).clone();
    assert_eq!(first.address(), Some(0));
    assert_eq!(first.size(), 3);
    assert_eq!(second.address(), Some(first.address().unwrap() + first.size() as Address));
    assert_eq!(builder.code(), &[0x44, 0x01, 0x00, 0x3D][..]);
  }

  #[test]
  fn jump_to_following_block_is_patched() {
    let mut builder = ByteCodeBuilder::new();

    let mut prelude = builder.new_function("prelude").unwrap();
    let p = builder.append_block(&mut prelude).unwrap();
    prelude.block_mut(p).unwrap().xchg();
    builder.link_function(&mut prelude).unwrap();

    let mut f = builder.new_function("f").unwrap();
    let a = builder.append_block(&mut f).unwrap();
    let b = builder.append_block(&mut f).unwrap();
    f.block_mut(a).unwrap().cmp();
    f.block_mut(a).unwrap().jeq_imm(b);
    f.block_mut(b).unwrap().stop();
    let k = f.block(a).unwrap().fixups()[0].offset;
    let size_of_a = f.block(a).unwrap().len() as Address;
    assert_eq!(k, 2);

    let symbol = builder.link_function(&mut f).unwrap();
    let base = builder.symbol(symbol).address().unwrap();
    assert_eq!(base, 1);

    let offset = (base as usize) + k;
    assert_eq!(read_address(&builder.code()[offset..]), Some(base + size_of_a));
    assert_eq!(builder.symbol(b.symbol()).address(), Some(base + size_of_a));
    assert!(builder.unresolved_references().is_empty());
  }

  #[test]
  fn backward_reference_to_earlier_function() {
    let mut builder = ByteCodeBuilder::new();

    let mut pad = builder.new_function("pad").unwrap();
    let p = builder.append_block(&mut pad).unwrap();
    pad.block_mut(p).unwrap().dump();
    builder.link_function(&mut pad).unwrap();

    let mut callee = builder.new_function("callee").unwrap();
    let c = builder.append_block(&mut callee).unwrap();
    callee.block_mut(c).unwrap().push_imm(0u8);
    builder.link_function(&mut callee).unwrap();

    let mut caller = builder.new_function("caller").unwrap();
    let d = builder.append_block(&mut caller).unwrap();
    caller.block_mut(d).unwrap().stop();
    caller.block_mut(d).unwrap().call_imm(&callee);
    builder.link_function(&mut caller).unwrap();

    // callee occupies [1, 3); the call placeholder sits at 3 + 1 + 1.
    assert_eq!(read_address(&builder.code()[5..]), Some(1));
    assert_eq!(builder.code()[4], 0x72);
  }

  #[test]
  fn forward_reference_to_later_function() {
    let mut builder = ByteCodeBuilder::new();
    let mut caller = builder.new_function("caller").unwrap();
    let mut callee = builder.new_function("callee").unwrap();

    let a = builder.append_block(&mut caller).unwrap();
    caller.block_mut(a).unwrap().call_imm(&callee);
    caller.block_mut(a).unwrap().stop();
    builder.link_function(&mut caller).unwrap();

    let pending = builder.unresolved_references();
    assert_eq!(pending, vec![UnresolvedReference { symbol: DefaultAtom::from("callee"), offset: 1 }]);
    assert_eq!(read_address(&builder.code()[1..]), Some(0));

    let b = builder.append_block(&mut callee).unwrap();
    callee.block_mut(b).unwrap().stop();
    builder.link_function(&mut callee).unwrap();

    assert!(builder.unresolved_references().is_empty());
    assert_eq!(read_address(&builder.code()[1..]), Some(10));

    let image = builder.finish().unwrap();
    assert_eq!(image.address_of("callee"), Some(10));
  }

  #[test]
  fn finish_reports_unresolved_references() {
    let mut builder = ByteCodeBuilder::new();
    let mut f = builder.new_function("f").unwrap();
    let never = builder.new_function("never").unwrap();
    let a = builder.append_block(&mut f).unwrap();
    f.block_mut(a).unwrap().jmp_imm(&never);
    builder.link_function(&mut f).unwrap();

    match builder.finish() {
      Err(BuildError::UnresolvedReferences(references)) => {
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].symbol, DefaultAtom::from("never"));
        assert_eq!(references[0].offset, 1);
      }
      _ => panic!("expected unresolved references")
    }
  }

  #[test]
  fn linked_functions_are_frozen() {
    let mut builder = ByteCodeBuilder::new();
    let mut f = builder.new_function("f").unwrap();
    let a = builder.append_block(&mut f).unwrap();
    builder.link_function(&mut f).unwrap();

    let expected = Some(BuildError::AlreadyLinked(DefaultAtom::from("f")));
    assert_eq!(builder.append_block(&mut f).err(), expected);
    assert_eq!(builder.link_function(&mut f).err(), expected);
    assert!(f.block_mut(a).is_err());
  }

  #[test]
  fn clones_of_linked_functions_are_rejected() {
    let mut builder = ByteCodeBuilder::new();
    let mut f = builder.new_function("f").unwrap();
    let mut copy = f.clone();
    builder.link_function(&mut f).unwrap();
    assert!(builder.link_function(&mut copy).is_err());
    assert!(builder.append_block(&mut copy).is_err());
  }

  #[test]
  fn function_at_offset_zero_is_resolved() {
    let mut builder = ByteCodeBuilder::new();
    let mut empty = builder.new_function("empty").unwrap();
    let symbol = builder.link_function(&mut empty).unwrap();
    assert_eq!(builder.symbol(symbol).address(), Some(0));
    assert_eq!(builder.symbol(symbol).size(), 0);
    assert!(builder.code().is_empty());
  }

  #[test]
  fn duplicate_names_are_rejected() {
    let mut builder = ByteCodeBuilder::default();
    builder.new_function("f").unwrap();
    assert_eq!(
      builder.new_function("f").err(),
      Some(BuildError::DuplicateSymbol(DefaultAtom::from("f")))
    );

    builder.add_global("data").unwrap();
    assert!(builder.add_global("data").is_err());
  }

  #[test]
  fn block_labels() {
    let mut builder = ByteCodeBuilder::with_capacity(0);
    let mut f = builder.new_function("main").unwrap();
    let a = builder.append_block(&mut f).unwrap();
    let b = builder.append_block(&mut f).unwrap();
    f.block_mut(a).unwrap().stop();
    f.block_mut(b).unwrap().stop();
    builder.link_function(&mut f).unwrap();
    assert_eq!(builder.lookup("main.1"), Some(b.symbol()));

    let image = builder.finish().unwrap();
    assert_eq!(image.address_of("main.0"), Some(0));
    assert_eq!(image.address_of("main.1"), Some(1));
    assert_eq!(image.address_of("missing"), None);
    assert_eq!(image.labels_at(0), vec![&DefaultAtom::from("main"), &DefaultAtom::from("main.0")]);
    assert_eq!(image.labels_at(1), vec![&DefaultAtom::from("main.1")]);
  }

  #[test]
  fn image_disassembles() {
    let mut builder = ByteCodeBuilder::new();
    let mut f = builder.new_function("loop").unwrap();
    let a = builder.append_block(&mut f).unwrap();
    f.block_mut(a).unwrap().sub_imm(1u8);
    f.block_mut(a).unwrap().jne_imm(a);
    builder.link_function(&mut f).unwrap();

    let image = builder.finish().unwrap();
    let instructions = image.disassemble().unwrap();
    assert_eq!(instructions.len(), 2);
    assert_eq!(instructions[1].0, 2);
    assert_eq!(instructions[1].1.operation(), Operation::Jne);
    // A jump to address 0 is indistinguishable from the zero-target form once decoded.
    assert_eq!(instructions[1].1.to_string(), "jne 0x0000000000000000");
  }

  #[test]
  fn globals_survive_finish() {
    let mut builder = ByteCodeBuilder::new();
    builder.add_global("table").unwrap().instructions_mut().extend_from_slice(&[1, 2, 3]);
    builder.global_mut("table").unwrap().instructions_mut().push(4);
    let image = builder.finish().unwrap();
    assert_eq!(image.global("table").map(Global::instructions), Some(&[1u8, 2, 3, 4][..]));
    assert_eq!(image.globals().len(), 1);
  }

  #[test]
  fn backward_jump_from_second_block() {
    let mut builder = ByteCodeBuilder::new();

    let mut prelude = builder.new_function("prelude").unwrap();
    let p = builder.append_block(&mut prelude).unwrap();
    prelude.block_mut(p).unwrap().dump();
    prelude.block_mut(p).unwrap().dump();
    builder.link_function(&mut prelude).unwrap();

    let mut f = builder.new_function("f").unwrap();
    let a = builder.append_block(&mut f).unwrap();
    let b = builder.append_block(&mut f).unwrap();
    f.block_mut(a).unwrap().cmp();
    f.block_mut(a).unwrap().stop();
    f.block_mut(b).unwrap().xchg();
    f.block_mut(b).unwrap().jmp_imm(a);
    let size_of_a = f.block(a).unwrap().len();
    let k_b = f.block(b).unwrap().fixups()[0].offset;
    assert_eq!(k_b, 2);

    let symbol = builder.link_function(&mut f).unwrap();
    let base = builder.symbol(symbol).address().unwrap();
    assert_eq!(base, 2);

    let offset = base as usize + size_of_a + k_b;
    assert_eq!(read_address(&builder.code()[offset..]), Some(base));
    assert_eq!(builder.symbol(a.symbol()).address(), Some(base));
  }

  proptest! {
    #[test]
    fn every_block_fixup_is_patched(pad in 0usize..8, sizes in prop::collection::vec(0usize..12, 1..6)) {
      let mut builder = ByteCodeBuilder::new();

      let mut prelude = builder.new_function("prelude").unwrap();
      let p = builder.append_block(&mut prelude).unwrap();
      for _ in 0..pad {
        prelude.block_mut(p).unwrap().dump();
      }
      builder.link_function(&mut prelude).unwrap();

      // Each block jumps to the next, and the last one back to the first.
      let mut f = builder.new_function("f").unwrap();
      let mut blocks = Vec::new();
      for _ in &sizes {
        blocks.push(builder.append_block(&mut f).unwrap());
      }
      for (i, size) in sizes.iter().enumerate() {
        let block = f.block_mut(blocks[i]).unwrap();
        for _ in 0..*size {
          block.xchg();
        }
        block.jmp_imm(blocks[(i + 1) % blocks.len()]);
      }
      builder.link_function(&mut f).unwrap();

      for (i, size) in sizes.iter().enumerate() {
        let start  = builder.symbol(blocks[i].symbol()).address().unwrap();
        let target = builder.symbol(blocks[(i + 1) % blocks.len()].symbol()).address().unwrap();
        let offset = start as usize + size + 1;
        prop_assert_eq!(read_address(&builder.code()[offset..]), Some(target));
      }
    }
  }

  #[test]
  fn function_named_like_a_block_label() {
    let mut builder = ByteCodeBuilder::new();
    let mut f     = builder.new_function("f").unwrap();
    let mut other = builder.new_function("f.0").unwrap();

    let a = builder.append_block(&mut f).unwrap();
    let b = builder.append_block(&mut other).unwrap();
    f.block_mut(a).unwrap().stop();
    other.block_mut(b).unwrap().dump();
    builder.link_function(&mut f).unwrap();
    builder.link_function(&mut other).unwrap();

    assert_eq!(builder.lookup("f.0"), Some(other.symbol()));
    assert_eq!(builder.lookup("f.0.0"), Some(b.symbol()));

    let image = builder.finish().unwrap();
    assert_eq!(image.address_of("f.0"), Some(1));
    assert_eq!(image.labels_at(0), vec![&DefaultAtom::from("f"), &DefaultAtom::from("f.0")]);
  }

  #[test]
  fn functions_from_another_builder_are_rejected() {
    let mut builder = ByteCodeBuilder::new();
    let mut other   = ByteCodeBuilder::new();
    builder.new_function("main").unwrap();
    let mut stranger = other.new_function("stranger").unwrap();

    let expected = Some(BuildError::ForeignFunction(DefaultAtom::from("stranger")));
    assert_eq!(builder.append_block(&mut stranger).err(), expected);
    assert_eq!(builder.link_function(&mut stranger).err(), expected);
    assert!(!builder.symbol(builder.lookup("main").unwrap()).is_resolved());
  }

  #[test]
  fn references_to_missing_symbols_are_rejected() {
    let mut builder = ByteCodeBuilder::new();
    let mut f = builder.new_function("f").unwrap();
    let a = builder.append_block(&mut f).unwrap();
    f.block_mut(a).unwrap().call_imm(SymbolId::from_index(99));

    assert_eq!(
      builder.link_function(&mut f).err(),
      Some(BuildError::UnknownSymbol(SymbolId::from_index(99)))
    );
    assert!(!f.is_linked());
    assert!(builder.code().is_empty());
  }

  #[test]
  fn linked_jump_targets_disassemble_cleanly() {
    let mut builder = ByteCodeBuilder::new();
    let mut f = builder.new_function("f").unwrap();
    let a = builder.append_block(&mut f).unwrap();
    f.block_mut(a).unwrap().jg_imm(3u64);
    for _ in 0..8 {
      f.block_mut(a).unwrap().stop();
    }
    builder.link_function(&mut f).unwrap();

    let instructions = builder.finish().unwrap().disassemble().unwrap();
    assert_eq!(instructions.len(), 9);
    assert_eq!(instructions[0].1.to_string(), "jg 0x0000000000000003");
    assert_eq!(instructions[8], (16, Instruction::Nullary(Operation::Stop)));
  }
}
