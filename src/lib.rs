/*!
  An encoder and linker for a small bytecode instruction set.

  Client code creates functions through a `ByteCodeBuilder`, appends blocks to them, and encodes
  operations into the blocks. Blocks and functions can refer to one another by symbol before their
  addresses are known. Linking a function appends its blocks to the shared program image and
  patches every reference whose target has been linked.

  ```
  use bytelink::ByteCodeBuilder;

  let mut builder = ByteCodeBuilder::new();
  let mut main    = builder.new_function("main")?;
  let entry       = builder.append_block(&mut main)?;
  let exit        = builder.append_block(&mut main)?;

  main.block_mut(entry)?.cmp_imm(0u8);
  main.block_mut(entry)?.jeq_imm(exit);
  main.block_mut(exit)?.stop();
  builder.link_function(&mut main)?;

  let image = builder.finish()?;
  assert_eq!(image.address_of("main.1"), Some(11));
  # Ok::<(), bytelink::BuildError>(())
  ```
*/

#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;

pub mod bytecode;
pub mod error;
pub mod linker;
pub mod program;
pub mod symboltable;
pub mod vm;

pub use error::{BuildError, UnresolvedReference};
pub use linker::{ByteCodeBuilder, ProgramImage, INITIAL_IMAGE_CAPACITY};
pub use program::{Address, Block, BlockRef, Function, Global, Symbol, SymbolId};
pub use vm::Machine;
