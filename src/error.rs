use std::fmt::{Display, Formatter};

use string_cache::DefaultAtom;
use thiserror::Error;

use crate::bytecode::{OperandSource, Operation, PrefixShape, Width};
use crate::program::{Address, SymbolId};

#[derive(Error, Clone, PartialEq, Debug)]
pub enum BuildError {
  #[error("function `{0}` is already linked")]
  AlreadyLinked(DefaultAtom),

  #[error("block {0} does not belong to function `{1}`")]
  UnknownBlock(SymbolId, DefaultAtom),

  #[error("the name `{0}` is already defined")]
  DuplicateSymbol(DefaultAtom),

  #[error("function `{0}` was created by a different builder")]
  ForeignFunction(DefaultAtom),

  #[error("symbol {0} does not exist in this builder")]
  UnknownSymbol(SymbolId),

  #[error("`{operation}` is {expected}-shaped but was given a {found}-shaped encoding")]
  ShapeMismatch {
    operation : Operation,
    expected  : PrefixShape,
    found     : PrefixShape,
  },

  #[error("`{operation}` was given the immediate descriptor `{descriptor}` without a value")]
  ImmediateOperand {
    operation  : Operation,
    descriptor : OperandSource,
  },

  #[error("`{operation}` needs an 8-byte target but was given an {width} immediate")]
  NarrowWordTarget {
    operation : Operation,
    width     : Width,
  },

  #[error("malformed instruction at {offset:#06x}")]
  MalformedInstruction {
    offset: Address
  },

  #[error("unresolved references: {}", list_references(.0))]
  UnresolvedReferences(Vec<UnresolvedReference>),
}

/// A placeholder in the image that still waits for the address of `symbol`.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct UnresolvedReference {
  pub symbol : DefaultAtom,
  pub offset : Address,
}

impl Display for UnresolvedReference {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "`{}` at {:#06x}", self.symbol, self.offset)
  }
}

fn list_references(references: &[UnresolvedReference]) -> String {
  references.iter()
            .map(UnresolvedReference::to_string)
            .collect::<Vec<String>>()
            .join(", ")
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn messages() {
    let error = BuildError::ShapeMismatch {
      operation : Operation::Jmp,
      expected  : PrefixShape::Word,
      found     : PrefixShape::Register
    };
    assert_eq!(error.to_string(), "`jmp` is Word-shaped but was given a Register-shaped encoding");

    let error = BuildError::UnresolvedReferences(vec![
      UnresolvedReference { symbol: DefaultAtom::from("f"), offset: 0x12 },
      UnresolvedReference { symbol: DefaultAtom::from("g.0"), offset: 0x20 },
    ]);
    assert_eq!(error.to_string(), "unresolved references: `f` at 0x0012, `g.0` at 0x0020");

    let error = BuildError::MalformedInstruction { offset: 3 };
    assert_eq!(error.to_string(), "malformed instruction at 0x0003");
  }
}
