/*!
  Immediate values and their raw byte representation.

  Only fixed-width values of 1, 2, 4, or 8 bytes, plus references to symbols whose address is not
  known yet, can be turned into an `Immediate`; there is no `From` impl for anything else, so
  unsupported widths are rejected by the type checker. All immediates are little-endian.
*/

use std::fmt::{Display, Formatter};

use strum_macros::{Display as StrumDisplay, EnumIter};
use num_enum::{TryFromPrimitive, IntoPrimitive};

use crate::program::{Address, BlockRef, Function, SymbolId};

/// Byte width of an immediate. The discriminant is the width in bytes.
#[derive(
  StrumDisplay, EnumIter, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,     Eq,               PartialEq,     Ord, PartialOrd, Debug, Hash
)]
#[repr(u8)]
pub enum Width {
  #[strum(serialize = "i8")]  Bits8  = 1,
  #[strum(serialize = "i16")] Bits16 = 2,
  #[strum(serialize = "i32")] Bits32 = 4,
  #[strum(serialize = "i64")] Bits64 = 8,
}

/// One-based index of the highest set bit, or 0 if `n == 0`.
pub fn find_last_set(n: usize) -> u32 {
  (std::mem::size_of::<usize>() * 8) as u32 - n.leading_zeros()
}

impl Width {
  pub fn bytes(&self) -> usize {
    Into::<u8>::into(*self) as usize
  }

  /// The 2-bit size tag, `log2(bytes)`: 0, 1, 2, 3 for 1, 2, 4, 8 bytes.
  pub fn tag(&self) -> u8 {
    (find_last_set(self.bytes()) - 1) as u8
  }

  /// Inverse of `tag`. Only the low two bits of `tag` are considered.
  pub fn from_tag(tag: u8) -> Width {
    match tag & 0b11 {
      0 => Width::Bits8,
      1 => Width::Bits16,
      2 => Width::Bits32,
      _ => Width::Bits64,
    }
  }
}

/**
  A value that can be appended to an instruction as its immediate operand.

  `bits` holds the value zero-extended to 64 bits; only the low `width` bytes are ever
  emitted. A `Symbol` always occupies 8 bytes, the size of an `Address`.
*/
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Immediate {
  Integer {
    width : Width,
    bits  : u64
  },
  Float {
    width : Width,
    bits  : u64
  },
  Symbol(SymbolId),
}

impl Immediate {
  pub fn width(&self) -> Width {
    match self {
      | Immediate::Integer { width, .. }
      | Immediate::Float   { width, .. } => *width,
      Immediate::Symbol(_)               => Width::Bits64,
    }
  }

  /// True for integer zero and for both signed floating point zeros. Symbols are never zero.
  pub fn is_zero(&self) -> bool {
    match self {
      Immediate::Integer { bits, .. }                  => *bits == 0,
      Immediate::Float { width: Width::Bits32, bits }  => f32::from_bits(*bits as u32) == 0.0,
      Immediate::Float { bits, .. }                    => f64::from_bits(*bits) == 0.0,
      Immediate::Symbol(_)                             => false,
    }
  }

  /**
    Appends the raw little-endian bytes of the value. A symbol is written as an all-zero address
    placeholder and returned, so the caller can record where it must be patched.
  */
  pub fn append_bytes(&self, code: &mut Vec<u8>) -> Option<SymbolId> {
    let bits: u64 =
      match self {
        | Immediate::Integer { bits, .. }
        | Immediate::Float   { bits, .. } => *bits,
        Immediate::Symbol(_)              => 0,
      };
    code.extend_from_slice(&bits.to_le_bytes()[..self.width().bytes()]);

    match self {
      Immediate::Symbol(symbol) => Some(*symbol),
      _                         => None
    }
  }
}

impl Display for Immediate {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Immediate::Integer { width, bits } => {
        write!(f, "{:#0digits$x}", bits, digits = 2 + 2 * width.bytes())
      }
      Immediate::Float { width: Width::Bits32, bits } => {
        write!(f, "{:?}", f32::from_bits(*bits as u32))
      }
      Immediate::Float { bits, .. } => {
        write!(f, "{:?}", f64::from_bits(*bits))
      }
      Immediate::Symbol(symbol) => {
        write!(f, "@{}", symbol)
      }
    }
  }
}

macro_rules! integer_immediates {
  ( $( $source:ty as $unsigned:ty => $width:ident ),* ) => {
    $(
      impl From<$source> for Immediate {
        fn from(value: $source) -> Immediate {
          Immediate::Integer { width: Width::$width, bits: value as $unsigned as u64 }
        }
      }
    )*
  };
}

integer_immediates!(
  u8  as u8  => Bits8,
  i8  as u8  => Bits8,
  u16 as u16 => Bits16,
  i16 as u16 => Bits16,
  u32 as u32 => Bits32,
  i32 as u32 => Bits32,
  u64 as u64 => Bits64,
  i64 as u64 => Bits64
);

impl From<f32> for Immediate {
  fn from(value: f32) -> Immediate {
    Immediate::Float { width: Width::Bits32, bits: value.to_bits() as u64 }
  }
}

impl From<f64> for Immediate {
  fn from(value: f64) -> Immediate {
    Immediate::Float { width: Width::Bits64, bits: value.to_bits() }
  }
}

impl From<SymbolId> for Immediate {
  fn from(symbol: SymbolId) -> Immediate {
    Immediate::Symbol(symbol)
  }
}

impl From<BlockRef> for Immediate {
  fn from(block: BlockRef) -> Immediate {
    Immediate::Symbol(block.symbol())
  }
}

impl From<&Function> for Immediate {
  fn from(function: &Function) -> Immediate {
    Immediate::Symbol(function.symbol())
  }
}

/**
  Values accepted as the immediate target of a control transfer. A `HasImmediate` target is
  always decoded as a full address, so only 8-byte values qualify.
*/
pub trait WordTarget: Into<Immediate> {}

impl WordTarget for u64 {}
impl WordTarget for i64 {}
impl WordTarget for f64 {}
impl WordTarget for SymbolId {}
impl WordTarget for BlockRef {}
impl<'a> WordTarget for &'a Function {}

/// Reads an address back from the 8 bytes a symbol placeholder occupies.
pub fn read_address(bytes: &[u8]) -> Option<Address> {
  let mut raw = [0u8; 8];
  if bytes.len() < raw.len() {
    return None;
  }
  raw.copy_from_slice(&bytes[..8]);
  Some(Address::from_le_bytes(raw))
}
