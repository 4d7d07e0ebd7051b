/*!
  Build-time program structure: symbols, the blocks instructions are encoded into, and the
  functions that group blocks into linkable units.
*/

mod block;
mod function;
mod operations;
mod symbol;

pub use block::{Block, BlockRef, Fixup};
pub use function::{Function, Global};
pub use symbol::{Address, BuilderId, Symbol, SymbolId, Symbols, ADDRESS_SIZE};
