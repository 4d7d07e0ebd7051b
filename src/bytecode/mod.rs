/*!

  Instructions are variable width and decoded bytewise. Every instruction starts with an opcode
  byte whose low 6 bits hold the `Operation` code and whose high 2 bits hold a prefix. What the
  prefix means depends on the operation's `PrefixShape`:

    Argument:  [Prefix:2|OpCode:6] ( [Operand:8] )? ( [Immediate:8..64] )?
               00 L op R, 01 L op imm8, 10 L op imm64, 11 L op operand
    Register:  [Prefix:2|OpCode:6]        01 uses R, 10 uses L
    Size:      [Width:2|OpCode:6]         log2 of the operand width in bytes
    Word:      [Prefix:2|OpCode:6] ( [Immediate:8..64] )?
               00 target in L, 01 immediate target follows, 10 zero target
    None:      [OpCode:8]

  An explicit operand byte holds a 4-bit descriptor. 16 and 32 bit immediates are announced by
  the `i16`/`i32` descriptors, while 8 and 64 bit immediates use their own prefixes and need no
  descriptor, which keeps the two most common immediate sizes one byte shorter.

  Immediates and addresses are little-endian. Addresses are byte offsets into the program image.

*/

mod assembly;
mod binary;
mod immediate;
mod instruction;

pub use assembly::listing;
pub(crate) use assembly::TABLE_DISPLAY_FORMAT;
pub use binary::{encode_instruction, decode_instruction, disassemble, instruction_size};
pub(crate) use binary::write_instruction;
pub use immediate::{find_last_set, read_address, Immediate, Width, WordTarget};
pub use instruction::{
  Argument, ArgumentPrefix, Instruction, Operand, OperandDest, OperandReg, OperandRound,
  OperandSource, Operation, PrefixShape, RegisterPrefix, WordPrefix, OPCODE_MASK, PREFIX_SHIFT
};
