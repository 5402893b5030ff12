//! Top-level assembler pipeline.
//!
//! 1. **Tokenize**: split the text into words and strings (`lexer`).
//! 2. **Parse**: build code nodes and data regions (`parser`).
//! 3. **Pass 1**: assign addresses to labels (`symbols`).
//! 4. **Pass 2**: resolve references into the final image.
//!
//! [`assemble`] produces an image and its [`DebugDatabase`]; [`compile`]
//! additionally loads the image into a [`Machine`].

use emulator_core::{DebugDatabase, IsaRegistry, Machine, MachineError, Word};

use crate::errors::{AssembleError, AssembleErrorKind};
use crate::lexer::tokenize;
use crate::parser::parse;
use crate::symbols::SymbolTable;

/// Assembler switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssembleOptions {
    /// Reject unrecognized tokens instead of dropping them.
    pub strict: bool,
}

/// An assembled image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// Memory contents from address 0; word 0 is always 0.
    pub image: Vec<Word>,
    /// Labels and data regions of the image.
    pub debug: DebugDatabase,
}

/// Assembles `source` for a machine with word modulus `word_size` and
/// `memory_size` words of memory.
///
/// # Errors
///
/// Returns the first [`AssembleError`] encountered: an undefined label, an
/// address that does not fit in a word, an image larger than memory, or an
/// unknown token in strict mode.
pub fn assemble(
    source: &str,
    isa: &IsaRegistry,
    word_size: u32,
    memory_size: usize,
    options: &AssembleOptions,
) -> Result<Program, AssembleError> {
    let tokens = tokenize(source);
    let parsed = parse(&tokens, isa, word_size, options.strict)?;
    let table = SymbolTable::assign(&parsed);

    if table.image_len() > memory_size {
        return Err(AssembleError::new(AssembleErrorKind::ProgramTooLarge {
            len: table.image_len(),
            size: memory_size,
        }));
    }

    let image = table.resolve(&parsed, word_size)?;
    let debug = table.debug_database();
    log::debug!(
        "assembled {} tokens into {} words ({} code, {} data regions)",
        tokens.len(),
        image.len(),
        parsed.code.len(),
        parsed.data.len()
    );
    Ok(Program { image, debug })
}

/// Assembles `source` against `machine`'s architecture and loads the image.
/// Registers, flags and the clock are left as they are.
///
/// # Errors
///
/// Returns an [`AssembleError`] when assembly fails; memory is untouched in
/// that case.
pub fn compile(
    machine: &mut Machine,
    source: &str,
    options: &AssembleOptions,
) -> Result<DebugDatabase, AssembleError> {
    let arch = machine.architecture();
    let config = arch.config();
    let program = assemble(
        source,
        arch.isa(),
        config.word_size,
        config.memory_size,
        options,
    )?;

    machine.load_image(&program.image).map_err(|error| match error {
        MachineError::ImageTooLarge { len, size } => {
            AssembleError::new(AssembleErrorKind::ProgramTooLarge { len, size })
        }
        other => AssembleError::new(AssembleErrorKind::Load(other)),
    })?;
    Ok(program.debug)
}
