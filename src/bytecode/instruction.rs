use std::fmt::{Display, Formatter};

use strum_macros::{Display as StrumDisplay, EnumIter, EnumString, IntoStaticStr};
use num_enum::{TryFromPrimitive, IntoPrimitive};

use super::immediate::{Immediate, Width};

/// The prefix occupies bits 7-6 of the opcode byte.
pub const PREFIX_SHIFT: u8 = 6;
/// The operation code occupies bits 5-0 of the opcode byte.
pub const OPCODE_MASK: u8 = 0x3F;

/// The class of 2-bit variable field an operation's encoding uses.
#[derive(StrumDisplay, Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum PrefixShape {
  Argument,
  Register,
  Size,
  Word,
  None,
}

/**
  Declares `Operation` and its shape table in one place so the two can never disagree. Each
  group names the prefix shape shared by every operation listed in it.
*/
macro_rules! operations {
  (
    $(
      $shape:ident {
        $( $variant:ident = $code:literal, $mnemonic:literal; )*
      }
    )*
  ) => {
    /**
      Operation codes of the instruction set. The discriminant is the 6-bit code stored in the
      low bits of the opcode byte; the `strum` serialization is the assembly mnemonic.
    */
    #[derive(
      StrumDisplay, IntoStaticStr, EnumString, EnumIter, TryFromPrimitive, IntoPrimitive,
      Clone,        Copy,          Eq,         PartialEq, Debug,            Hash
    )]
    #[repr(u8)]
    pub enum Operation {
      $( $( #[strum(serialize = $mnemonic)] $variant = $code, )* )*
    }

    impl Operation {
      /// The prefix shape that determines every legal encoding of this operation.
      pub fn shape(&self) -> PrefixShape {
        match self {
          $( $( Operation::$variant => PrefixShape::$shape, )* )*
        }
      }
    }
  };
}

operations! {
  Argument {
    Or     = 0x02, "or";
    And    = 0x03, "and";
    Add    = 0x04, "add";
    Sub    = 0x05, "sub";
    Mul    = 0x06, "mul";
    Div    = 0x07, "div";
    MulS   = 0x08, "muls";
    DivS   = 0x09, "divs";
    AddF   = 0x0A, "addf";
    SubF   = 0x0B, "subf";
    MulF   = 0x0C, "mulf";
    DivF   = 0x0D, "divf";
    Shr    = 0x0E, "shr";
    Shl    = 0x0F, "shl";
    Cmp    = 0x10, "cmp";
    CmpF   = 0x11, "cmpf";
    FToI   = 0x12, "ftoi";
    IToF   = 0x13, "itof";
    Load8  = 0x20, "load8";
    Load16 = 0x21, "load16";
    Load32 = 0x22, "load32";
    Load64 = 0x23, "load64";
    Stor8  = 0x26, "stor8";
    Stor16 = 0x27, "stor16";
    Stor32 = 0x28, "stor32";
    Stor64 = 0x29, "stor64";
    Push   = 0x33, "push";
    Pop    = 0x38, "pop";
  }

  Register {
    Neg      = 0x01, "neg";
    Sx8To16  = 0x14, "sx8to16";
    Sx8To32  = 0x15, "sx8to32";
    Sx8To64  = 0x16, "sx8to64";
    Sx16To32 = 0x17, "sx16to32";
    Sx16To64 = 0x18, "sx16to64";
    Sx32To64 = 0x19, "sx32to64";
    F32To64  = 0x1A, "f32to64";
    F64To32  = 0x1B, "f64to32";
    Push8    = 0x34, "push8";
    Push16   = 0x35, "push16";
    Push32   = 0x36, "push32";
    Push64   = 0x37, "push64";
    Pop8     = 0x39, "pop8";
    Pop16    = 0x3A, "pop16";
    Pop32    = 0x3B, "pop32";
    Pop64    = 0x3C, "pop64";
  }

  Size {
    LoadIL = 0x24, "loadil";
    LoadIR = 0x25, "loadir";
  }

  Word {
    Jmp   = 0x2B, "jmp";
    Jeq   = 0x2C, "jeq";
    Jne   = 0x2D, "jne";
    Jl    = 0x2E, "jl";
    Jle   = 0x2F, "jle";
    Jg    = 0x30, "jg";
    Jge   = 0x31, "jge";
    Call  = 0x32, "call";
    CCall = 0x3E, "ccall";
  }

  None {
    Stop = 0x00, "stop";
    Xchg = 0x2A, "xchg";
    Dump = 0x3D, "dump";
  }
}

impl Operation {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }
}


// region Prefixes

/// Prefix values of `Argument`-shaped operations.
#[derive(TryFromPrimitive, IntoPrimitive, Clone, Copy, Eq, PartialEq, Debug, Hash)]
#[repr(u8)]
pub enum ArgumentPrefix {
  /// Operation is between L & R
  Implicit        = 0b00,
  /// Operation is between L & an 8 bit immediate
  ByteImmediate   = 0b01,
  /// Operation is between L & a 64 bit immediate
  WordImmediate   = 0b10,
  /// Operation is defined by an operand descriptor byte
  ExplicitOperand = 0b11,
}

/// Prefix values of `Register`-shaped operations.
#[derive(
  StrumDisplay, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,             Eq, PartialEq, Debug, Hash
)]
#[repr(u8)]
pub enum RegisterPrefix {
  #[strum(serialize = "r")]
  UsesRight = 0b01,
  #[strum(serialize = "l")]
  UsesLeft  = 0b10,
}

impl Default for RegisterPrefix {
  fn default() -> Self {
    RegisterPrefix::UsesLeft
  }
}

/// Prefix values of `Word`-shaped (control transfer) operations.
#[derive(TryFromPrimitive, IntoPrimitive, Clone, Copy, Eq, PartialEq, Debug, Hash)]
#[repr(u8)]
pub enum WordPrefix {
  /// Target is taken from L
  UsesLeft      = 0b00,
  HasImmediate  = 0b01,
  /// Target is the zero value; no payload follows
  ZeroImmediate = 0b10,
}

// endregion


// region Operand descriptors
// All descriptors are 4 bits wide and are stored in the low bits of their byte.

/// General operand table of the machine. `Argument` instructions encode an `OperandSource`.
#[derive(
  StrumDisplay, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,             Eq, PartialEq, Debug, Hash
)]
#[repr(u8)]
pub enum Operand {
  #[strum(serialize = "r8")]  R8   = 0o00,
  #[strum(serialize = "r16")] R16  = 0o01,
  #[strum(serialize = "r32")] R32  = 0o02,
  #[strum(serialize = "r64")] R64  = 0o03,
  #[strum(serialize = "i8")]  I8   = 0o04,
  #[strum(serialize = "i16")] I16  = 0o05,
  #[strum(serialize = "i32")] I32  = 0o06,
  #[strum(serialize = "i64")] I64  = 0o07,
  #[strum(serialize = "0")]   Zero = 0o10,
  #[strum(serialize = "sp")]  Sp   = 0o11,
  #[strum(serialize = "bp")]  Bp   = 0o12,
  #[strum(serialize = "ip")]  Ip   = 0o13,
  #[strum(serialize = "flg")] Flg  = 0o14,
  /* 0o15 */
  /* 0o16 */
  /* 0o17 */
}

/// Register operand: the subset of `Operand` naming storage the machine can write through.
#[derive(
  StrumDisplay, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,             Eq, PartialEq, Debug, Hash
)]
#[repr(u8)]
pub enum OperandReg {
  #[strum(serialize = "r8")]  R8  = 0o00,
  #[strum(serialize = "r16")] R16 = 0o01,
  #[strum(serialize = "r32")] R32 = 0o02,
  #[strum(serialize = "r64")] R64 = 0o03,
  #[strum(serialize = "sp")]  Sp  = 0o11,
  #[strum(serialize = "bp")]  Bp  = 0o12,
  #[strum(serialize = "ip")]  Ip  = 0o13,
  #[strum(serialize = "flg")] Flg = 0o14,
}

impl From<OperandReg> for Operand {
  fn from(register: OperandReg) -> Operand {
    match register {
      OperandReg::R8  => Operand::R8,
      OperandReg::R16 => Operand::R16,
      OperandReg::R32 => Operand::R32,
      OperandReg::R64 => Operand::R64,
      OperandReg::Sp  => Operand::Sp,
      OperandReg::Bp  => Operand::Bp,
      OperandReg::Ip  => Operand::Ip,
      OperandReg::Flg => Operand::Flg,
    }
  }
}

/// Source operand of an `Argument`-shaped instruction with an `ExplicitOperand` prefix.
#[derive(
  StrumDisplay, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,             Eq, PartialEq, Debug, Hash
)]
#[repr(u8)]
pub enum OperandSource {
  #[strum(serialize = "r8")]  R8   = 0o00,
  #[strum(serialize = "r16")] R16  = 0o01,
  #[strum(serialize = "r32")] R32  = 0o02,
  #[strum(serialize = "r64")] R64  = 0o03,
  #[strum(serialize = "l8")]  L8   = 0o04,
  #[strum(serialize = "l16")] L16  = 0o05,
  #[strum(serialize = "l32")] L32  = 0o06,
  #[strum(serialize = "l64")] L64  = 0o07,
  #[strum(serialize = "i8")]  I8   = 0o10,
  #[strum(serialize = "i16")] I16  = 0o11,
  #[strum(serialize = "i32")] I32  = 0o12,
  #[strum(serialize = "i64")] I64  = 0o13,
  /// Special value indicating the source is 0
  #[strum(serialize = "0")]   Zero = 0o14,
  #[strum(serialize = "sp")]  Sp   = 0o15,
  #[strum(serialize = "bp")]  Bp   = 0o16,
  #[strum(serialize = "ip")]  Ip   = 0o17,
}

impl OperandSource {
  /// The descriptor announcing an immediate payload of the given width.
  pub fn for_immediate(width: Width) -> OperandSource {
    match width {
      Width::Bits8  => OperandSource::I8,
      Width::Bits16 => OperandSource::I16,
      Width::Bits32 => OperandSource::I32,
      Width::Bits64 => OperandSource::I64,
    }
  }

  pub fn immediate_width(&self) -> Option<Width> {
    match self {
      OperandSource::I8  => Some(Width::Bits8),
      OperandSource::I16 => Some(Width::Bits16),
      OperandSource::I32 => Some(Width::Bits32),
      OperandSource::I64 => Some(Width::Bits64),
      _                  => None
    }
  }

  pub fn is_immediate(&self) -> bool {
    self.immediate_width().is_some()
  }

  /**
    Panics if the descriptor is an immediate class. Immediates are encoded from their value,
    never from a bare descriptor, because the descriptor alone would carry no payload.
  */
  pub fn require_explicit(&self) {
    if self.is_immediate() {
      panic!(
        "Error: An immediate descriptor was given when an explicit operand was required: {}",
        self
      );
    }
  }
}

/// Destination operand: registers and locals only.
#[derive(
  StrumDisplay, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,             Eq, PartialEq, Debug, Hash
)]
#[repr(u8)]
pub enum OperandDest {
  #[strum(serialize = "r8")]  R8  = 0o00,
  #[strum(serialize = "r16")] R16 = 0o01,
  #[strum(serialize = "r32")] R32 = 0o02,
  #[strum(serialize = "r64")] R64 = 0o03,
  #[strum(serialize = "l8")]  L8  = 0o04,
  #[strum(serialize = "l16")] L16 = 0o05,
  #[strum(serialize = "l32")] L32 = 0o06,
  #[strum(serialize = "l64")] L64 = 0o07,
}

// Every destination is also a legal source with the same code.
impl From<OperandDest> for OperandSource {
  fn from(dest: OperandDest) -> OperandSource {
    match dest {
      OperandDest::R8  => OperandSource::R8,
      OperandDest::R16 => OperandSource::R16,
      OperandDest::R32 => OperandSource::R32,
      OperandDest::R64 => OperandSource::R64,
      OperandDest::L8  => OperandSource::L8,
      OperandDest::L16 => OperandSource::L16,
      OperandDest::L32 => OperandSource::L32,
      OperandDest::L64 => OperandSource::L64,
    }
  }
}

/// Rounding mode operand.
#[derive(
  StrumDisplay, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,             Eq, PartialEq, Debug, Hash
)]
#[repr(u8)]
pub enum OperandRound {
  #[strum(serialize = "nearest_even")] NearestEven = 0o00,
  #[strum(serialize = "down")]         Down        = 0o01,
  #[strum(serialize = "up")]           Up          = 0o02,
  #[strum(serialize = "zero")]         Zero        = 0o03,
}

// endregion


/// The operand of an `Argument`-shaped instruction.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Argument {
  /// Operates on L & R.
  Implicit,
  Immediate(Immediate),
  Operand(OperandSource),
}

/// Holds the unencoded components of an instruction, one variant per prefix shape.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Instruction {
  /// [OpCode:8]
  Nullary(Operation),
  /// [Prefix:2|OpCode:6] ( [Operand:8] )? ( [Immediate:8..64] )?
  Argument {
    operation : Operation,
    argument  : Argument
  },
  /// [Prefix:2|OpCode:6]
  Register {
    operation : Operation,
    register  : RegisterPrefix
  },
  /// [Width:2|OpCode:6]
  Size {
    operation : Operation,
    width     : Width
  },
  /// [Prefix:2|OpCode:6] ( [Immediate:8..64] )?
  Word {
    operation : Operation,
    target    : Option<Immediate>
  },
}

impl Instruction {
  pub fn operation(&self) -> Operation {
    match self {
      | Instruction::Nullary(operation)
      | Instruction::Argument { operation, .. }
      | Instruction::Register { operation, .. }
      | Instruction::Size     { operation, .. }
      | Instruction::Word     { operation, .. } => *operation
    }
  }

  /// The prefix shape this form encodes, which need not match `operation().shape()`.
  pub fn shape(&self) -> PrefixShape {
    match self {
      Instruction::Nullary(_)         => PrefixShape::None,
      Instruction::Argument { .. }    => PrefixShape::Argument,
      Instruction::Register { .. }    => PrefixShape::Register,
      Instruction::Size     { .. }    => PrefixShape::Size,
      Instruction::Word     { .. }    => PrefixShape::Word,
    }
  }
}

impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {

      Instruction::Nullary(operation) => {
        write!(f, "{}", operation)
      }

      Instruction::Argument { operation, argument } => {
        match argument {
          Argument::Implicit             => write!(f, "{}", operation),
          Argument::Immediate(immediate) => write!(f, "{} {} {}", operation, immediate.width(), immediate),
          Argument::Operand(source)      => write!(f, "{} {}", operation, source),
        }
      }

      Instruction::Register { operation, register } => {
        write!(f, "{} {}", operation, register)
      }

      Instruction::Size { operation, width } => {
        write!(f, "{} {}", operation, width)
      }

      Instruction::Word { operation, target } => {
        match target {
          Some(immediate) => write!(f, "{} {}", operation, immediate),
          None            => write!(f, "{} {}", operation, RegisterPrefix::UsesLeft),
        }
      }

    }
  }
}
