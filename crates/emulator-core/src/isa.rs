//! Instruction set registry.
//!
//! The registry is built once from a declarative instruction list and is
//! shared read-only by the controller, the assembler and the disassembler.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::{ConfigError, Word};

/// Kind of value an instruction operand word holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum OperandShape {
    /// A literal value (`#value`).
    Immediate,
    /// A memory address, usually a label reference (`$target`).
    Address,
}

impl fmt::Display for OperandShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => f.write_str("#value"),
            Self::Address => f.write_str("$address"),
        }
    }
}

/// Declarative instruction list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionSpec {
    /// Lower-case mnemonic.
    pub name: &'static str,
    /// Opcode stored in memory.
    pub opcode: Word,
    /// Operand words following the opcode, in order.
    pub operands: &'static [OperandShape],
    /// One-line description for listings.
    pub summary: &'static str,
}

impl InstructionSpec {
    /// An instruction without operand words.
    #[must_use]
    pub const fn bare(name: &'static str, opcode: Word, summary: &'static str) -> Self {
        Self {
            name,
            opcode,
            operands: &[],
            summary,
        }
    }

    /// An instruction followed by the given operand words.
    #[must_use]
    pub const fn with_operands(
        name: &'static str,
        opcode: Word,
        operands: &'static [OperandShape],
        summary: &'static str,
    ) -> Self {
        Self {
            name,
            opcode,
            operands,
            summary,
        }
    }
}

/// A registered instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct InstructionDef {
    /// Opcode stored in memory.
    pub opcode: Word,
    /// Lower-case mnemonic.
    pub name: String,
    /// Operand words following the opcode.
    pub operands: Vec<OperandShape>,
    /// One-line description.
    pub summary: String,
}

impl InstructionDef {
    /// Number of memory words occupied by the instruction and its operands.
    #[must_use]
    pub fn len_words(&self) -> usize {
        1 + self.operands.len()
    }
}

/// Opcode and mnemonic lookup tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsaRegistry {
    by_opcode: BTreeMap<Word, InstructionDef>,
    by_name: HashMap<String, Word>,
}

impl IsaRegistry {
    /// Builds the registry from a declarative list.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateOpcode`] when two entries share an
    /// opcode and [`ConfigError::DuplicateMnemonic`] when two entries share a
    /// name (compared case-insensitively).
    pub fn build(specs: &[InstructionSpec]) -> Result<Self, ConfigError> {
        let mut by_opcode = BTreeMap::new();
        let mut by_name = HashMap::new();

        for spec in specs {
            if let Some(existing) = by_opcode.get(&spec.opcode) {
                let existing: &InstructionDef = existing;
                return Err(ConfigError::DuplicateOpcode {
                    opcode: spec.opcode,
                    first: existing.name.clone(),
                    second: spec.name.to_string(),
                });
            }
            let key = spec.name.to_ascii_lowercase();
            if by_name.insert(key.clone(), spec.opcode).is_some() {
                return Err(ConfigError::DuplicateMnemonic(key));
            }
            by_opcode.insert(
                spec.opcode,
                InstructionDef {
                    opcode: spec.opcode,
                    name: key,
                    operands: spec.operands.to_vec(),
                    summary: spec.summary.to_string(),
                },
            );
        }

        Ok(Self { by_opcode, by_name })
    }

    /// Builds the registry for [`INSTRUCTION_SET`].
    ///
    /// # Errors
    ///
    /// Propagates [`IsaRegistry::build`] errors; the standard table has none.
    pub fn standard() -> Result<Self, ConfigError> {
        Self::build(INSTRUCTION_SET)
    }

    /// Looks up an instruction by opcode.
    #[must_use]
    pub fn by_opcode(&self, opcode: Word) -> Option<&InstructionDef> {
        self.by_opcode.get(&opcode)
    }

    /// Looks up an instruction by mnemonic, ignoring ASCII case.
    #[must_use]
    pub fn by_mnemonic(&self, name: &str) -> Option<&InstructionDef> {
        let opcode = self.by_name.get(&name.to_ascii_lowercase())?;
        self.by_opcode.get(opcode)
    }

    /// Iterates instructions in opcode order.
    pub fn iter(&self) -> impl Iterator<Item = &InstructionDef> {
        self.by_opcode.values()
    }

    /// Number of registered instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_opcode.len()
    }

    /// Returns `true` when no instruction is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_opcode.is_empty()
    }
}

use OperandShape::{Address, Immediate};

/// The standard instruction set of the bus machine.
pub const INSTRUCTION_SET: &[InstructionSpec] = &[
    // flow control
    InstructionSpec::bare("nop", 0, "does nothing"),
    InstructionSpec::with_operands("jmp", 1, &[Address], "jumps to $target"),
    InstructionSpec::bare("hlt", 2, "stops the clock"),
    // I/O
    InstructionSpec::with_operands("cout", 3, &[Immediate], "outputs #value"),
    InstructionSpec::bare("aout", 4, "outputs A"),
    InstructionSpec::bare("inp", 32, "inputs A"),
    InstructionSpec::with_operands("iot", 38, &[Immediate], "selects I/O port #value"),
    // register moves
    InstructionSpec::bare("atb", 5, "B = A"),
    InstructionSpec::bare("bta", 6, "A = B"),
    InstructionSpec::bare("atx", 7, "X = A"),
    InstructionSpec::bare("aty", 8, "Y = A"),
    InstructionSpec::bare("xta", 9, "A = X"),
    InstructionSpec::bare("yta", 10, "A = Y"),
    InstructionSpec::bare("btx", 11, "X = B"),
    InstructionSpec::bare("bty", 12, "Y = B"),
    InstructionSpec::bare("xtb", 13, "B = X"),
    InstructionSpec::bare("ytb", 14, "B = Y"),
    InstructionSpec::bare("xty", 15, "Y = X"),
    InstructionSpec::bare("ytx", 16, "X = Y"),
    InstructionSpec::with_operands("loa", 17, &[Immediate], "A = #value"),
    InstructionSpec::with_operands("lob", 18, &[Immediate], "B = #value"),
    InstructionSpec::with_operands("lox", 19, &[Immediate], "X = #value"),
    InstructionSpec::with_operands("loy", 20, &[Immediate], "Y = #value"),
    InstructionSpec::bare("rsb", 23, "B = 0"),
    // arithmetic
    InstructionSpec::bare("sum", 21, "A = A + B"),
    InstructionSpec::bare("sub", 36, "A = A - B"),
    InstructionSpec::with_operands("add", 22, &[Immediate], "A += #value"),
    InstructionSpec::with_operands("rem", 37, &[Immediate], "A -= #value"),
    // conditional flow control
    InstructionSpec::with_operands("jpz", 24, &[Address], "jumps to $target if zero"),
    InstructionSpec::with_operands("jnz", 25, &[Address], "jumps to $target if not zero"),
    InstructionSpec::with_operands("jpc", 26, &[Address], "jumps to $target if carry"),
    InstructionSpec::with_operands("jnc", 27, &[Address], "jumps to $target if not carry"),
    InstructionSpec::bare("jpa", 33, "jumps to A"),
    // memory
    InstructionSpec::with_operands("movma", 28, &[Address], "A = *$address"),
    InstructionSpec::with_operands("movam", 29, &[Address], "*$address = A"),
    InstructionSpec::bare("movpa", 30, "A = *B"),
    InstructionSpec::bare("movap", 31, "*B = A"),
    InstructionSpec::with_operands("movcm", 34, &[Immediate, Address], "*$address = #value"),
    InstructionSpec::with_operands("movmm", 35, &[Address, Address], "*$target = *$source"),
    // stack
    InstructionSpec::with_operands("movsx", 39, &[Address], "X = *(stack_ptr - $offset)"),
    InstructionSpec::with_operands("movxs", 40, &[Address], "*(stack_ptr - $offset) = X"),
    InstructionSpec::with_operands("pushc", 41, &[Immediate], "*(--stack_ptr) = #value"),
    InstructionSpec::bare("pushx", 42, "*(--stack_ptr) = X"),
    InstructionSpec::bare("pop", 43, "X = *(stack_ptr++)"),
    // subroutines
    InstructionSpec::with_operands("call", 44, &[Address], "pushes the return point, jumps to $func"),
    InstructionSpec::bare("ret", 45, "returns past the last call"),
];
