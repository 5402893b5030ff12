//! Turns tokens into code nodes and data regions.
//!
//! | Token            | Effect                                                  |
//! |------------------|---------------------------------------------------------|
//! | `::name`         | tags the next emitted node with `:name`                 |
//! | `:name`          | emits a reference to `:name`                            |
//! | `'c`, `'c'`      | emits the character code                                |
//! | `$name[size]`    | declares a zero buffer once, emits a reference to it    |
//! | `"text"`         | declares a string region `sN`, emits a reference to it  |
//! | mnemonic         | emits the opcode (case-insensitive)                     |
//! | integer prefix   | emits the leading number, clamped into the word         |
//!
//! Any other token is dropped, or rejected in strict mode.

use std::collections::HashSet;
use std::fmt;

use emulator_core::{IsaRegistry, Word};

use crate::errors::{AssembleError, AssembleErrorKind, SourcePos};
use crate::lexer::{Token, TokenKind};
use crate::literal::{char_word, clamp_word, parse_char_literal, parse_leading_integer};

/// A label name, kept in separate namespaces per origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
    /// Declared with `::name`; displayed as `:name`.
    User(String),
    /// The `n`-th string literal; displayed as `sN`.
    Str(usize),
    /// Declared with `$name`; displayed as `$name`.
    Buffer(String),
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(name) => write!(f, ":{name}"),
            Self::Str(index) => write!(f, "s{index}"),
            Self::Buffer(name) => write!(f, "${name}"),
        }
    }
}

/// Content of one code word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeValue {
    /// A literal word.
    Word(Word),
    /// The address of a symbol, filled in during resolution.
    Ref(Symbol),
}

/// One word of the code region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Word content.
    pub value: NodeValue,
    /// Label declared at this word.
    pub label: Option<Symbol>,
    /// Position of the token that produced the word.
    pub pos: SourcePos,
}

/// A string or buffer placed after the code region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRegion {
    /// Region name.
    pub symbol: Symbol,
    /// Initial contents.
    pub words: Vec<Word>,
    /// Position of the declaring token.
    pub pos: SourcePos,
}

/// Parser output: code in source order, data in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedProgram {
    /// Code words.
    pub code: Vec<Node>,
    /// Data regions.
    pub data: Vec<DataRegion>,
}

struct Parser<'a> {
    isa: &'a IsaRegistry,
    word_size: u32,
    strict: bool,
    pending_label: Option<Symbol>,
    buffers: HashSet<String>,
    strings: usize,
    program: ParsedProgram,
}

impl Parser<'_> {
    fn emit(&mut self, value: NodeValue, pos: SourcePos) {
        let label = self.pending_label.take();
        self.program.code.push(Node { value, label, pos });
    }

    fn string(&mut self, codes: &[u32], terminated: bool, pos: SourcePos) {
        let symbol = Symbol::Str(self.strings);
        self.strings += 1;
        let mut words: Vec<Word> = codes
            .iter()
            .map(|&code| clamp_word(i64::from(code), self.word_size))
            .collect();
        if terminated {
            words.push(0);
        }
        self.program.data.push(DataRegion {
            symbol: symbol.clone(),
            words,
            pos,
        });
        self.emit(NodeValue::Ref(symbol), pos);
    }

    fn buffer(&mut self, declaration: &str, pos: SourcePos) {
        let (name, size) = match declaration.split_once('[') {
            Some((name, size)) => (name, buffer_size(size, self.word_size)),
            None => (declaration, 1),
        };
        if self.buffers.insert(name.to_string()) {
            self.program.data.push(DataRegion {
                symbol: Symbol::Buffer(name.to_string()),
                words: vec![0; size],
                pos,
            });
        }
        self.emit(NodeValue::Ref(Symbol::Buffer(name.to_string())), pos);
    }

    fn word(&mut self, word: &str, pos: SourcePos) -> Result<(), AssembleError> {
        if let Some(name) = word.strip_prefix("::") {
            self.pending_label = Some(Symbol::User(name.to_string()));
        } else if let Some(name) = word.strip_prefix(':') {
            self.emit(NodeValue::Ref(Symbol::User(name.to_string())), pos);
        } else if let Some(c) = parse_char_literal(word) {
            self.emit(NodeValue::Word(char_word(c, self.word_size)), pos);
        } else if let Some(declaration) = word.strip_prefix('$') {
            self.buffer(declaration, pos);
        } else if let Some(def) = self.isa.by_mnemonic(word) {
            self.emit(NodeValue::Word(def.opcode), pos);
        } else if let Some(value) = parse_leading_integer(word) {
            self.emit(NodeValue::Word(clamp_word(value, self.word_size)), pos);
        } else if self.strict {
            return Err(AssembleError::at(
                AssembleErrorKind::UnknownToken(word.to_string()),
                pos,
            ));
        } else {
            log::debug!("{pos}: dropping unknown token '{word}'");
        }
        Ok(())
    }
}

/// Size of `$name[size]`: leading digits of `size`, clamped to `[0, W]`.
fn buffer_size(text: &str, word_size: u32) -> usize {
    let digits: String = text.chars().take_while(char::is_ascii_digit).collect();
    let size = digits.parse::<u64>().unwrap_or(if digits.is_empty() { 0 } else { u64::MAX });
    usize::try_from(size.min(u64::from(word_size))).unwrap_or(usize::MAX)
}

/// Parses `tokens` against `isa` for a machine with word modulus
/// `word_size`.
///
/// # Errors
///
/// Returns [`AssembleErrorKind::UnknownToken`] for an unrecognized word when
/// `strict` is set; otherwise parsing cannot fail.
pub fn parse(
    tokens: &[Token],
    isa: &IsaRegistry,
    word_size: u32,
    strict: bool,
) -> Result<ParsedProgram, AssembleError> {
    let mut parser = Parser {
        isa,
        word_size,
        strict,
        pending_label: None,
        buffers: HashSet::new(),
        strings: 0,
        program: ParsedProgram::default(),
    };

    for token in tokens {
        match &token.kind {
            TokenKind::Word(word) => parser.word(word, token.pos)?,
            TokenKind::Str { codes, terminated } => {
                parser.string(codes, *terminated, token.pos);
            }
        }
    }

    if let Some(label) = parser.pending_label {
        log::debug!("label {label} is not followed by any word");
    }
    Ok(parser.program)
}
