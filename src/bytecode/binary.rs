/*!
  This module is responsible for the encoding and decoding of binary instructions.

  Encoding appends to a caller-owned byte buffer, so blocks and globals share one encoder.
  Decoding is the exact inverse and is used for disassembly.
*/
use std::convert::TryFrom;

use nom::{
  IResult,
  error::ErrorKind,
  number::complete::{le_u8, le_u16, le_u32, le_u64}
};
#[cfg(feature = "trace_encoding")]
use log::trace;

use super::immediate::{Immediate, Width};
use super::instruction::*;
use crate::error::BuildError;
use crate::program::{Address, Fixup};

fn opcode_byte<P: Into<u8>>(operation: Operation, prefix: P) -> u8 {
  operation.code() | (prefix.into() << PREFIX_SHIFT)
}

/**
  Encodes the instruction onto the end of `code`, checking that the instruction's form matches
  the prefix shape of its operation. If an immediate refers to a symbol, the returned `Fixup`
  locates the placeholder that must be patched once the symbol has an address.
*/
pub fn encode_instruction(code: &mut Vec<u8>, instruction: &Instruction)
  -> Result<Option<Fixup>, BuildError>
{
  let operation = instruction.operation();
  let expected  = operation.shape();
  let found     = instruction.shape();

  if expected != found {
    return Err(BuildError::ShapeMismatch { operation, expected, found });
  }
  match instruction {
    Instruction::Argument { argument: Argument::Operand(descriptor), .. } if descriptor.is_immediate() => {
      return Err(BuildError::ImmediateOperand { operation, descriptor: *descriptor });
    }
    // A nonzero target is decoded as a full address, so it must be written as one.
    Instruction::Word { target: Some(target), .. }
      if !target.is_zero() && target.width() != Width::Bits64 => {
      return Err(BuildError::NarrowWordTarget { operation, width: target.width() });
    }
    _ => {}
  }

  Ok(write_instruction(code, instruction))
}

/// Encodes without validating the instruction form. Callers guarantee the shape matches.
pub(crate) fn write_instruction(code: &mut Vec<u8>, instruction: &Instruction) -> Option<Fixup> {
  #[cfg(feature = "trace_encoding")]
  let start = code.len();

  let fixup =
    match *instruction {

      Instruction::Nullary(operation) => {
        // [OpCode:8]
        code.push(operation.code());
        None
      }

      Instruction::Argument { operation, argument } => {
        write_argument(code, operation, argument)
      }

      Instruction::Register { operation, register } => {
        // [Register:2|OpCode:6]
        code.push(opcode_byte(operation, register));
        None
      }

      Instruction::Size { operation, width } => {
        // [Width:2|OpCode:6]
        code.push(opcode_byte(operation, width.tag()));
        None
      }

      Instruction::Word { operation, target } => {
        write_word(code, operation, target)
      }

    };

  #[cfg(feature = "trace_encoding")]
  trace!("{:<28} {:02x?}", instruction.to_string(), &code[start..]);

  fixup
}

/*
  The 1 and 8 byte immediates have dedicated prefixes and need no descriptor byte. The 2 and 4
  byte immediates fall back to an explicit `i16`/`i32` descriptor ahead of the payload.
*/
fn write_argument(code: &mut Vec<u8>, operation: Operation, argument: Argument) -> Option<Fixup> {
  match argument {

    Argument::Implicit => {
      code.push(opcode_byte(operation, ArgumentPrefix::Implicit));
      None
    }

    Argument::Operand(source) => {
      code.push(opcode_byte(operation, ArgumentPrefix::ExplicitOperand));
      code.push(source.into());
      None
    }

    Argument::Immediate(immediate) => {
      match immediate.width() {
        Width::Bits8  => code.push(opcode_byte(operation, ArgumentPrefix::ByteImmediate)),
        Width::Bits64 => code.push(opcode_byte(operation, ArgumentPrefix::WordImmediate)),
        width         => {
          code.push(opcode_byte(operation, ArgumentPrefix::ExplicitOperand));
          code.push(OperandSource::for_immediate(width).into());
        }
      }
      append_immediate(code, &immediate)
    }

  }
}

fn write_word(code: &mut Vec<u8>, operation: Operation, target: Option<Immediate>) -> Option<Fixup> {
  match target {

    None => {
      code.push(opcode_byte(operation, WordPrefix::UsesLeft));
      None
    }

    Some(immediate) if immediate.is_zero() => {
      code.push(opcode_byte(operation, WordPrefix::ZeroImmediate));
      None
    }

    Some(immediate) => {
      code.push(opcode_byte(operation, WordPrefix::HasImmediate));
      append_immediate(code, &immediate)
    }

  }
}

fn append_immediate(code: &mut Vec<u8>, immediate: &Immediate) -> Option<Fixup> {
  let offset = code.len();
  immediate.append_bytes(code).map(|symbol| Fixup::new(symbol, offset))
}

/// Returns the size in BYTES of the encoded instruction.
pub fn instruction_size(instruction: &Instruction) -> usize {
  match instruction {

    | Instruction::Nullary(_)
    | Instruction::Register { .. }
    | Instruction::Size     { .. } => 1,

    Instruction::Argument { argument, .. } => {
      match argument {
        Argument::Implicit             => 1,
        Argument::Operand(_)           => 2,
        Argument::Immediate(immediate) => {
          match immediate.width() {
            | Width::Bits8
            | Width::Bits64 => 1 + immediate.width().bytes(),
            width           => 2 + width.bytes()
          }
        }
      }
    }

    Instruction::Word { target, .. } => {
      match target {
        Some(immediate) if !immediate.is_zero() => 1 + immediate.width().bytes(),
        _                                       => 1
      }
    }

  }
}


// region Decoding

// Typed wrappers fix nom's error parameter to its default.
fn read_u8(input: &[u8]) -> IResult<&[u8], u8> {
  le_u8(input)
}

fn read_payload(input: &[u8], width: Width) -> IResult<&[u8], u64> {
  match width {
    Width::Bits8  => le_u8(input).map(|(rest, value)| (rest, value as u64)),
    Width::Bits16 => le_u16(input).map(|(rest, value)| (rest, value as u64)),
    Width::Bits32 => le_u32(input).map(|(rest, value)| (rest, value as u64)),
    Width::Bits64 => le_u64(input),
  }
}

fn read_immediate(input: &[u8], width: Width) -> IResult<&[u8], Immediate> {
  let (rest, bits) = read_payload(input, width)?;
  Ok((rest, Immediate::Integer { width, bits }))
}

fn malformed<T>(input: &[u8]) -> IResult<&[u8], T> {
  Err(nom::Err::Error((input, ErrorKind::Verify)))
}

/**
  Decodes a single instruction from the front of `input`, returning the remaining bytes.

  Immediates come back as `Immediate::Integer`, since the bytes do not record whether a value
  was an integer, a float, or a patched symbol address. A `Word` immediate is always read as
  8 bytes, the width of the addresses control transfers carry.
*/
pub fn decode_instruction(input: &[u8]) -> IResult<&[u8], Instruction> {
  let (rest, head) = read_u8(input)?;
  let prefix = head >> PREFIX_SHIFT;
  let operation =
    match Operation::try_from(head & OPCODE_MASK) {
      Ok(operation) => operation,
      Err(_e)       => return malformed(input)
    };

  match operation.shape() {

    PrefixShape::None => {
      match prefix {
        0 => Ok((rest, Instruction::Nullary(operation))),
        _ => malformed(input)
      }
    }

    PrefixShape::Register => {
      match RegisterPrefix::try_from(prefix) {
        Ok(register) => Ok((rest, Instruction::Register { operation, register })),
        Err(_e)      => malformed(input)
      }
    }

    PrefixShape::Size => {
      Ok((rest, Instruction::Size { operation, width: Width::from_tag(prefix) }))
    }

    PrefixShape::Word => {
      match WordPrefix::try_from(prefix) {
        Ok(WordPrefix::UsesLeft) => {
          Ok((rest, Instruction::Word { operation, target: None }))
        }
        Ok(WordPrefix::ZeroImmediate) => {
          let target = Immediate::Integer { width: Width::Bits64, bits: 0 };
          Ok((rest, Instruction::Word { operation, target: Some(target) }))
        }
        Ok(WordPrefix::HasImmediate) => {
          let (rest, target) = read_immediate(rest, Width::Bits64)?;
          Ok((rest, Instruction::Word { operation, target: Some(target) }))
        }
        Err(_e) => malformed(input)
      }
    }

    PrefixShape::Argument => {
      let (rest, argument) =
        match ArgumentPrefix::try_from(prefix) {
          Ok(ArgumentPrefix::Implicit)        => (rest, Argument::Implicit),
          Ok(ArgumentPrefix::ByteImmediate)   => {
            let (rest, immediate) = read_immediate(rest, Width::Bits8)?;
            (rest, Argument::Immediate(immediate))
          }
          Ok(ArgumentPrefix::WordImmediate)   => {
            let (rest, immediate) = read_immediate(rest, Width::Bits64)?;
            (rest, Argument::Immediate(immediate))
          }
          Ok(ArgumentPrefix::ExplicitOperand) => {
            let (rest, descriptor) = read_u8(rest)?;
            let source =
              match OperandSource::try_from(descriptor) {
                Ok(source) => source,
                Err(_e)    => return malformed(input)
              };
            match source.immediate_width() {
              | Some(width @ Width::Bits16)
              | Some(width @ Width::Bits32) => {
                let (rest, immediate) = read_immediate(rest, width)?;
                (rest, Argument::Immediate(immediate))
              }
              // 1 and 8 byte immediates always use their dedicated prefixes.
              Some(_) => return malformed(input),
              None    => (rest, Argument::Operand(source))
            }
          }
          Err(_e) => return malformed(input)
        };
      Ok((rest, Instruction::Argument { operation, argument }))
    }

  }
}

/// Decodes a whole image, pairing every instruction with its byte address.
pub fn disassemble(code: &[u8]) -> Result<Vec<(Address, Instruction)>, BuildError> {
  let mut instructions = Vec::new();
  let mut rest = code;

  while !rest.is_empty() {
    let offset = (code.len() - rest.len()) as Address;
    match decode_instruction(rest) {
      Ok((remaining, instruction)) => {
        instructions.push((offset, instruction));
        rest = remaining;
      }
      Err(_e) => return Err(BuildError::MalformedInstruction { offset })
    }
  }

  Ok(instructions)
}

// endregion
