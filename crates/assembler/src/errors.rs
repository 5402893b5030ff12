//! Structured assembler errors.
//!
//! Every error carries the source position of the token that caused it when
//! one exists. The CLI prints them as
//!
//! ```text
//! program.b8:3:7: error: undefined label ':loop'
//! ```

use std::fmt;

use emulator_core::MachineError;

/// 1-indexed position of a token in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourcePos {
    /// Line number.
    pub line: usize,
    /// Column number, counted in characters.
    pub column: usize,
}

impl SourcePos {
    /// Creates a position.
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// An assembly failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembleError {
    /// What went wrong.
    pub kind: AssembleErrorKind,
    /// Where it went wrong, when attributable to a token.
    pub position: Option<SourcePos>,
}

impl AssembleError {
    /// Creates an error without a position.
    #[must_use]
    pub const fn new(kind: AssembleErrorKind) -> Self {
        Self {
            kind,
            position: None,
        }
    }

    /// Creates an error at `position`.
    #[must_use]
    pub const fn at(kind: AssembleErrorKind, position: SourcePos) -> Self {
        Self {
            kind,
            position: Some(position),
        }
    }

    /// Formats the error the way the CLI reports it, prefixed with `file`.
    #[must_use]
    pub fn format_for_stderr(&self, file: &str) -> String {
        self.position.map_or_else(
            || format!("{file}: error: {}", self.kind),
            |pos| format!("{file}:{pos}: error: {}", self.kind),
        )
    }
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "{pos}: {}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for AssembleError {}

/// Classification of assembly failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembleErrorKind {
    /// A reference names a label that is never declared.
    UndefinedLabel(String),
    /// The image does not fit in memory.
    ProgramTooLarge {
        /// Image length in words, including the reserved word 0.
        len: usize,
        /// Memory size in words.
        size: usize,
    },
    /// A label resolves to an address that does not fit in one word.
    AddressOverflow {
        /// Label name.
        label: String,
        /// Resolved address.
        address: usize,
    },
    /// A token is neither a mnemonic, a literal nor a label form (strict
    /// mode only).
    UnknownToken(String),
    /// The machine refused the image.
    Load(MachineError),
}

impl fmt::Display for AssembleErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UndefinedLabel(label) => write!(f, "undefined label '{label}'"),
            Self::ProgramTooLarge { len, size } => {
                write!(f, "program of {len} words does not fit in {size} words of memory")
            }
            Self::AddressOverflow { label, address } => {
                write!(f, "label '{label}' resolves to address {address}, which does not fit in a word")
            }
            Self::UnknownToken(token) => write!(f, "unknown token '{token}'"),
            Self::Load(error) => write!(f, "failed to load image: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AssembleError, AssembleErrorKind, SourcePos};

    #[test]
    fn stderr_format_includes_file_and_position() {
        let error = AssembleError::at(
            AssembleErrorKind::UndefinedLabel(":loop".to_string()),
            SourcePos::new(3, 7),
        );
        assert_eq!(
            error.format_for_stderr("program.b8"),
            "program.b8:3:7: error: undefined label ':loop'"
        );
    }

    #[test]
    fn positionless_errors_name_only_the_file() {
        let error = AssembleError::new(AssembleErrorKind::ProgramTooLarge {
            len: 300,
            size: 256,
        });
        assert_eq!(
            error.to_string(),
            "program of 300 words does not fit in 256 words of memory"
        );
        assert!(error.format_for_stderr("big.b8").starts_with("big.b8: error:"));
    }
}
