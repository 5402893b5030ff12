//! Memory listing that annotates every cell.
//!
//! Cells are walked from address 0. A cell holding a known opcode starts an
//! instruction and the following cells are annotated with that instruction's
//! operand shapes; everything else is a plain value. When a
//! [`DebugDatabase`] is given, cells from `code_end` on are reported as data
//! and labels are attached to the cells and to address operands.

use std::collections::VecDeque;
use std::fmt;

use crate::debug::DebugDatabase;
use crate::isa::{IsaRegistry, OperandShape};
use crate::Word;

/// What a memory cell holds.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CellRole {
    /// The opcode of an instruction.
    Opcode {
        /// Lower-case mnemonic.
        mnemonic: String,
    },
    /// An operand word of the preceding instruction.
    Operand {
        /// Operand shape.
        shape: OperandShape,
        /// Label at the operand's value, for address operands.
        target: Option<String>,
    },
    /// A word of a data region.
    Data {
        /// Region name when the cell lies inside a known region.
        buffer: Option<String>,
    },
    /// Anything else.
    Value,
}

/// One annotated memory cell.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DisassemblyRow {
    /// Cell address.
    pub address: usize,
    /// Cell value.
    pub value: Word,
    /// Label declared at this address.
    pub label: Option<String>,
    /// Interpretation of the cell.
    pub role: CellRole,
}

impl fmt::Display for DisassemblyRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}: {:>5}", self.address, self.value)?;
        if let Some(label) = &self.label {
            write!(f, "  {label}")?;
        }
        match &self.role {
            CellRole::Opcode { mnemonic } => write!(f, " ; {}", mnemonic.to_ascii_uppercase()),
            CellRole::Operand { shape, target } => {
                write!(f, " ;   {shape}")?;
                match target {
                    Some(target) => write!(f, " -> {target}"),
                    None => Ok(()),
                }
            }
            CellRole::Data { buffer: Some(name) } => write!(f, " ; data {name}"),
            CellRole::Data { buffer: None } => f.write_str(" ; data"),
            CellRole::Value => Ok(()),
        }
    }
}

/// Annotates every cell of `memory`.
#[must_use]
pub fn disassemble(
    memory: &[Word],
    isa: &IsaRegistry,
    debug: Option<&DebugDatabase>,
) -> Vec<DisassemblyRow> {
    let code_end = debug.map_or(memory.len(), |debug| usize::from(debug.code_end));
    let mut pending: VecDeque<OperandShape> = VecDeque::new();

    memory
        .iter()
        .enumerate()
        .map(|(address, &value)| {
            let key = Word::try_from(address).ok();
            let label = debug
                .zip(key)
                .and_then(|(debug, key)| debug.label_at(key))
                .map(str::to_string);

            let role = if address >= code_end {
                pending.clear();
                CellRole::Data {
                    buffer: debug
                        .zip(key)
                        .and_then(|(debug, key)| debug.buffer_containing(key))
                        .map(|(_, info)| info.name.clone()),
                }
            } else if let Some(shape) = pending.pop_front() {
                let target = match shape {
                    OperandShape::Address => debug
                        .and_then(|debug| debug.label_at(value))
                        .map(str::to_string),
                    OperandShape::Immediate => None,
                };
                CellRole::Operand { shape, target }
            } else if let Some(def) = isa.by_opcode(value) {
                pending.extend(def.operands.iter().copied());
                CellRole::Opcode {
                    mnemonic: def.name.clone(),
                }
            } else {
                CellRole::Value
            };

            DisassemblyRow {
                address,
                value,
                label,
                role,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{disassemble, CellRole};
    use crate::debug::DebugDatabase;
    use crate::isa::{IsaRegistry, OperandShape};

    #[test]
    fn operands_follow_their_opcode() {
        let isa = IsaRegistry::standard().unwrap();
        let rows = disassemble(&[0, 34, 2, 9, 2], &isa, None);

        assert_eq!(
            rows[1].role,
            CellRole::Opcode {
                mnemonic: "movcm".to_string()
            }
        );
        assert_eq!(
            rows[2].role,
            CellRole::Operand {
                shape: OperandShape::Immediate,
                target: None
            }
        );
        assert_eq!(
            rows[3].role,
            CellRole::Operand {
                shape: OperandShape::Address,
                target: None
            }
        );
        assert_eq!(
            rows[4].role,
            CellRole::Opcode {
                mnemonic: "hlt".to_string()
            }
        );
    }

    #[test]
    fn labels_annotate_cells_and_targets() {
        let isa = IsaRegistry::standard().unwrap();
        let mut debug = DebugDatabase {
            code_end: 3,
            ..DebugDatabase::default()
        };
        debug.points.insert(1, ":loop".to_string());

        let rows = disassemble(&[0, 1, 1, 7], &isa, Some(&debug));

        assert_eq!(rows[1].label.as_deref(), Some(":loop"));
        assert_eq!(
            rows[2].role,
            CellRole::Operand {
                shape: OperandShape::Address,
                target: Some(":loop".to_string())
            }
        );
        assert_eq!(rows[3].role, CellRole::Data { buffer: None });
        assert_eq!(rows[1].to_string(), "0001:     1  :loop ; JMP");
    }

    #[test]
    fn unknown_values_are_plain() {
        let isa = IsaRegistry::standard().unwrap();
        let rows = disassemble(&[200], &isa, None);
        assert_eq!(rows[0].role, CellRole::Value);
        assert_eq!(rows[0].to_string(), "0000:   200");
    }
}
