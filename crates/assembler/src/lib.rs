//! Bus8 assembler library.
//!
//! Turns Bus8 assembly text into a memory image plus a [`DebugDatabase`],
//! and runs the inline `bus8test` blocks of literate sources against the
//! assembled program.
//!
//! ```
//! use assembler::assembler::{compile, AssembleOptions};
//! use emulator_core::{Architecture, Machine};
//!
//! let mut machine = Machine::new(Architecture::standard().unwrap());
//! let debug = compile(&mut machine, "::top loa 7 hlt", &AssembleOptions::default()).unwrap();
//! assert_eq!(debug.address_of(":top"), Some(1));
//! ```
//!
//! [`DebugDatabase`]: emulator_core::DebugDatabase

use env_logger as _;
#[cfg(test)]
use tempfile as _;

/// Top-level assembly pipeline.
pub mod assembler;
/// Structured assembly error types.
pub mod errors;
/// Source tokenizer.
pub mod lexer;
/// Numeric, character and memory-cell literals.
pub mod literal;
/// Token parser producing code nodes and data regions.
pub mod parser;
/// Source loading and literate Markdown extraction.
pub mod source;
/// Symbol table and label resolution.
pub mod symbols;
/// Inline test assertion syntax.
pub mod test_format;
/// HALT-driven inline test execution.
pub mod test_runner;

pub use literal::parse_cell_value;
