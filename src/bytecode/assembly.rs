/*!
  The human readable textual form of bytecode is called assembly. A listing pairs every decoded
  instruction of an image with its address, its raw bytes, and the labels of the functions and
  blocks that start there.
*/

use prettytable::{format as TableFormat, Table};

use super::binary::{disassemble, instruction_size};
use crate::error::BuildError;
use crate::linker::ProgramImage;

lazy_static! {
  pub(crate) static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

fn hex_bytes(bytes: &[u8]) -> String {
  bytes.iter()
       .map(|byte| format!("{:02x}", byte))
       .collect::<Vec<String>>()
       .join(" ")
}

/// Fails if the image contains bytes that do not decode.
pub fn listing(image: &ProgramImage) -> Result<Table, BuildError> {
  let code         = image.code();
  let instructions = disassemble(code)?;

  let mut table = Table::new();
  table.set_format(*TABLE_DISPLAY_FORMAT);
  table.set_titles(row![ubr->"Address", ubl->"Bytes", ubl->"Instruction", ubl->"Labels"]);

  for (address, instruction) in instructions {
    let start  = address as usize;
    let end    = start + instruction_size(&instruction);
    let labels =
      image.labels_at(address)
           .iter()
           .map(|label| label.to_string())
           .collect::<Vec<String>>()
           .join(", ");

    table.add_row(
      row![r->format!("{:#06x}", address), hex_bytes(&code[start..end]), instruction, labels]
    );
  }

  Ok(table)
}
