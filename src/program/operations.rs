/*!
  One encoding entry point per operation, generated on `Block`.

  Each method is tied to its operation's prefix shape, so the instructions they build are well
  formed by construction and never go through the shape check of `Block::emit`.

  | Shape      | Methods                                                        |
  |------------|----------------------------------------------------------------|
  | `Argument` | `add()` (L op R), `add_imm(value)`, `add_source(descriptor)`   |
  | `Register` | `neg()` (uses L), `neg_using(register)`                        |
  | `Size`     | `load_il(value)` (width of `value`), `load_il_width(width)`    |
  | `Word`     | `jmp()` (target in L), `jmp_imm(target)` (8-byte targets only) |
  | `None`     | `stop()`                                                       |
*/

use crate::bytecode::{
  Argument, Immediate, Instruction, OperandSource, Operation, RegisterPrefix, Width, WordTarget
};
use super::block::Block;

macro_rules! argument_operations {
  ( $( $operation:ident => $bare:ident, $immediate:ident, $source:ident; )* ) => {
    impl Block {
      $(
        pub fn $bare(&mut self) {
          self.append(Instruction::Argument {
            operation : Operation::$operation,
            argument  : Argument::Implicit
          });
        }

        pub fn $immediate<I: Into<Immediate>>(&mut self, value: I) {
          self.append(Instruction::Argument {
            operation : Operation::$operation,
            argument  : Argument::Immediate(value.into())
          });
        }

        /// Panics if `source` is one of the immediate descriptors.
        pub fn $source<S: Into<OperandSource>>(&mut self, source: S) {
          let source = source.into();
          source.require_explicit();
          self.append(Instruction::Argument {
            operation : Operation::$operation,
            argument  : Argument::Operand(source)
          });
        }
      )*
    }
  };
}

macro_rules! register_operations {
  ( $( $operation:ident => $bare:ident, $using:ident; )* ) => {
    impl Block {
      $(
        pub fn $bare(&mut self) {
          self.$using(RegisterPrefix::default());
        }

        pub fn $using(&mut self, register: RegisterPrefix) {
          self.append(Instruction::Register { operation: Operation::$operation, register });
        }
      )*
    }
  };
}

macro_rules! size_operations {
  ( $( $operation:ident => $from_value:ident, $from_width:ident; )* ) => {
    impl Block {
      $(
        /// Only the width of `value` is encoded; its bytes are not.
        pub fn $from_value<I: Into<Immediate>>(&mut self, value: I) {
          self.$from_width(value.into().width());
        }

        pub fn $from_width(&mut self, width: Width) {
          self.append(Instruction::Size { operation: Operation::$operation, width });
        }
      )*
    }
  };
}

macro_rules! word_operations {
  ( $( $operation:ident => $bare:ident, $immediate:ident; )* ) => {
    impl Block {
      $(
        pub fn $bare(&mut self) {
          self.append(Instruction::Word { operation: Operation::$operation, target: None });
        }

        pub fn $immediate<T: WordTarget>(&mut self, target: T) {
          self.append(Instruction::Word {
            operation : Operation::$operation,
            target    : Some(target.into())
          });
        }
      )*
    }
  };
}

macro_rules! nullary_operations {
  ( $( $operation:ident => $bare:ident; )* ) => {
    impl Block {
      $(
        pub fn $bare(&mut self) {
          self.append(Instruction::Nullary(Operation::$operation));
        }
      )*
    }
  };
}

argument_operations! {
  Or     => or,     or_imm,     or_source;
  And    => and,    and_imm,    and_source;
  Add    => add,    add_imm,    add_source;
  Sub    => sub,    sub_imm,    sub_source;
  Mul    => mul,    mul_imm,    mul_source;
  Div    => div,    div_imm,    div_source;
  MulS   => muls,   muls_imm,   muls_source;
  DivS   => divs,   divs_imm,   divs_source;
  AddF   => addf,   addf_imm,   addf_source;
  SubF   => subf,   subf_imm,   subf_source;
  MulF   => mulf,   mulf_imm,   mulf_source;
  DivF   => divf,   divf_imm,   divf_source;
  Shr    => shr,    shr_imm,    shr_source;
  Shl    => shl,    shl_imm,    shl_source;
  Cmp    => cmp,    cmp_imm,    cmp_source;
  CmpF   => cmpf,   cmpf_imm,   cmpf_source;
  FToI   => ftoi,   ftoi_imm,   ftoi_source;
  IToF   => itof,   itof_imm,   itof_source;
  Load8  => load8,  load8_imm,  load8_source;
  Load16 => load16, load16_imm, load16_source;
  Load32 => load32, load32_imm, load32_source;
  Load64 => load64, load64_imm, load64_source;
  Stor8  => stor8,  stor8_imm,  stor8_source;
  Stor16 => stor16, stor16_imm, stor16_source;
  Stor32 => stor32, stor32_imm, stor32_source;
  Stor64 => stor64, stor64_imm, stor64_source;
  Push   => push,   push_imm,   push_source;
  Pop    => pop,    pop_imm,    pop_source;
}

register_operations! {
  Neg      => neg,      neg_using;
  Sx8To16  => sx8to16,  sx8to16_using;
  Sx8To32  => sx8to32,  sx8to32_using;
  Sx8To64  => sx8to64,  sx8to64_using;
  Sx16To32 => sx16to32, sx16to32_using;
  Sx16To64 => sx16to64, sx16to64_using;
  Sx32To64 => sx32to64, sx32to64_using;
  F32To64  => f32to64,  f32to64_using;
  F64To32  => f64to32,  f64to32_using;
  Push8    => push8,    push8_using;
  Push16   => push16,   push16_using;
  Push32   => push32,   push32_using;
  Push64   => push64,   push64_using;
  Pop8     => pop8,     pop8_using;
  Pop16    => pop16,    pop16_using;
  Pop32    => pop32,    pop32_using;
  Pop64    => pop64,    pop64_using;
}

size_operations! {
  LoadIL => load_il, load_il_width;
  LoadIR => load_ir, load_ir_width;
}

word_operations! {
  Jmp   => jmp,   jmp_imm;
  Jeq   => jeq,   jeq_imm;
  Jne   => jne,   jne_imm;
  Jl    => jl,    jl_imm;
  Jle   => jle,   jle_imm;
  Jg    => jg,    jg_imm;
  Jge   => jge,   jge_imm;
  Call  => call,  call_imm;
  CCall => ccall, ccall_imm;
}

nullary_operations! {
  Stop => stop;
  Xchg => xchg;
  Dump => dump;
}
