//! Parsing for inline test assertion syntax.
//!
//! This module parses `bus8test` block content into structured assertions.
//!
//! ## Supported Syntax
//!
//! - Component assertions: `a == 42`, `pc != 0`; any component or wide
//!   register of the machine can be named
//! - Memory assertions: `[0x40] == 'A`, `[$buf] != 0`, `[:end] == 2`
//! - Comments: `;` to end of line
//! - Values: decimal, `0x` hex, `'c` characters, and labels (`:name`,
//!   `$name`, `sN`) which stand for their address

use std::fmt;

use crate::literal::{parse_char_literal, parse_integer};

/// A number or a label address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// A literal value.
    Literal(i64),
    /// A label, resolved against the program's debug database.
    Label(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Label(label) => f.write_str(label),
        }
    }
}

/// What an assertion inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A component or wide register, by name.
    Component(String),
    /// A memory cell.
    Memory(Operand),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Component(name) => f.write_str(name),
            Self::Memory(address) => write!(f, "[{address}]"),
        }
    }
}

/// Comparison operator for assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    /// Assert equality (`==`).
    Equal,
    /// Assert inequality (`!=`).
    NotEqual,
}

impl ComparisonOp {
    /// Applies the comparison.
    #[must_use]
    pub const fn holds(self, actual: i64, expected: i64) -> bool {
        match self {
            Self::Equal => actual == expected,
            Self::NotEqual => actual != expected,
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "=="),
            Self::NotEqual => write!(f, "!="),
        }
    }
}

/// A parsed assertion from a `bus8test` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    /// The inspected state.
    pub target: Target,
    /// The comparison operator.
    pub operator: ComparisonOp,
    /// The expected value.
    pub expected: Operand,
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.target, self.operator, self.expected)
    }
}

/// A parsed test block with its assertions and source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTestBlock {
    /// The parsed assertions in order.
    pub assertions: Vec<Assertion>,
    /// 1-indexed line number where the block starts.
    pub start_line: usize,
    /// 1-indexed line number where the block ends.
    pub end_line: usize,
}

/// Error parsing an assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAssertionError {
    /// The line number (1-indexed) within the test block where the error occurred.
    pub line_in_block: usize,
    /// The problematic text.
    pub text: String,
    /// Description of the error.
    pub message: String,
}

impl fmt::Display for ParseAssertionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: {} (in '{}')",
            self.line_in_block, self.message, self.text
        )
    }
}

impl std::error::Error for ParseAssertionError {}

/// Parses a test block's content into structured assertions.
///
/// Each non-empty, non-comment line is parsed as an assertion.
///
/// # Errors
///
/// Returns `ParseAssertionError` for the first line with invalid syntax.
pub fn parse_test_block(
    content: &str,
    start_line: usize,
    end_line: usize,
) -> Result<ParsedTestBlock, ParseAssertionError> {
    let mut assertions = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let stripped = strip_comment(line).trim();
        if stripped.is_empty() {
            continue;
        }

        let assertion = parse_assertion(stripped).map_err(|message| ParseAssertionError {
            line_in_block: idx + 1,
            text: stripped.to_string(),
            message,
        })?;
        assertions.push(assertion);
    }

    Ok(ParsedTestBlock {
        assertions,
        start_line,
        end_line,
    })
}

/// Strips a comment from a line (everything from `;` to end of line).
fn strip_comment(line: &str) -> &str {
    line.split_once(';').map_or(line, |(code, _)| code)
}

/// Parses a single assertion line.
fn parse_assertion(text: &str) -> Result<Assertion, String> {
    let (left, operator, right) = split_comparison(text)?;

    let target = if let Some(inner) = left.strip_prefix('[') {
        let inner = inner
            .strip_suffix(']')
            .ok_or_else(|| "expected ']' after address".to_string())?;
        Target::Memory(parse_operand(inner.trim())?)
    } else if is_name(left) {
        Target::Component(left.to_string())
    } else {
        return Err(format!("invalid component name '{left}'"));
    };

    Ok(Assertion {
        target,
        operator,
        expected: parse_operand(right)?,
    })
}

fn split_comparison(text: &str) -> Result<(&str, ComparisonOp, &str), String> {
    let (index, operator) = text
        .find("==")
        .map(|index| (index, ComparisonOp::Equal))
        .or_else(|| text.find("!=").map(|index| (index, ComparisonOp::NotEqual)))
        .ok_or_else(|| "expected '==' or '!='".to_string())?;

    let left = text[..index].trim();
    let right = text[index + 2..].trim();
    if left.is_empty() {
        return Err("expected a component or [address]".to_string());
    }
    if right.is_empty() {
        return Err("expected a value".to_string());
    }
    Ok((left, operator, right))
}

fn is_name(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_label(text: &str) -> bool {
    text.starts_with(':')
        || text.starts_with('$')
        || text
            .strip_prefix('s')
            .is_some_and(|index| !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()))
}

/// Parses a value: integer, `'c` character or label.
fn parse_operand(text: &str) -> Result<Operand, String> {
    if let Some(value) = parse_integer(text) {
        return Ok(Operand::Literal(value));
    }
    if let Some(c) = parse_char_literal(text) {
        return Ok(Operand::Literal(i64::from(u32::from(c))));
    }
    if is_label(text) {
        return Ok(Operand::Label(text.to_string()));
    }
    Err(format!("invalid value '{text}'"))
}
