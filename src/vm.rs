//! Storage of the machine that consumes program images. Only the layout is modeled here; fetching,
//! decoding, and executing instructions is not.

use std::fmt::{Display, Formatter};

use prettytable::Table;

use crate::bytecode::TABLE_DISPLAY_FORMAT;
use crate::linker::ProgramImage;
use crate::program::Address;

pub struct Machine {

  // Registers //
  pub l     : u64,     // Left data register
  pub r     : u64,     // Right data register
  pub ip    : Address, // Instruction pointer into `code`
  pub bp    : Address, // Base pointer into `stack`
  pub sp    : Address, // Stack pointer into `stack`
  pub flags : u64,

  // Memory Stores
  code  : Vec<u8>, // The program image, read only
  stack : Vec<u8>,
  heap  : Vec<u8>,

}

impl Machine {

  pub fn new(code: Vec<u8>) -> Machine {
    Machine {
      l     : 0,
      r     : 0,
      ip    : 0,
      bp    : 0,
      sp    : 0,
      flags : 0,
      code,
      stack : vec![],
      heap  : vec![],
    }
  }

  pub fn from_image(image: ProgramImage) -> Machine {
    Machine::new(image.into_code())
  }

  pub fn code(&self) -> &[u8] {
    &self.code
  }

  pub fn stack(&self) -> &Vec<u8> {
    &self.stack
  }

  pub fn stack_mut(&mut self) -> &mut Vec<u8> {
    &mut self.stack
  }

  pub fn heap(&self) -> &Vec<u8> {
    &self.heap
  }

  pub fn heap_mut(&mut self) -> &mut Vec<u8> {
    &mut self.heap
  }

  fn make_register_table(&self) -> Table {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Register", ubl->"Contents"]);

    for (name, value) in &[
      ("L", self.l), ("R", self.r), ("IP", self.ip), ("BP", self.bp), ("SP", self.sp), ("FLG", self.flags)
    ] {
      table.add_row(row![r->format!("{} =", name), format!("{:#018x}", value)]);
    }
    table
  }

  fn make_memory_table(&self) -> Table {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Store", ubl->"Bytes"]);
    table.add_row(row![r->"code =",  self.code.len()]);
    table.add_row(row![r->"stack =", self.stack.len()]);
    table.add_row(row![r->"heap =",  self.heap.len()]);
    table
  }

}

impl Display for Machine {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let mut combined_table = table!([self.make_register_table(), self.make_memory_table()]);

    combined_table.set_titles(row![ub->"Registers", ub->"Memory"]);
    combined_table.set_format(*TABLE_DISPLAY_FORMAT);

    write!(f, "{}", combined_table)
  }
}
