//! Splits source text into word and string tokens.
//!
//! Whitespace (space, tab, carriage return, newline) separates tokens. A `/`
//! at the start of a token opens a comment that runs to the next `/`. A `"`
//! at the start of a token opens a string that runs to the next unescaped
//! `"`; inside it `\HH` is one byte given by two hex digits. Everything else
//! is a word that ends at the next whitespace.

use std::str::Chars;

use crate::errors::SourcePos;

/// A lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// A whitespace-delimited word.
    Word(String),
    /// A string literal.
    Str {
        /// Character codes and escaped bytes, in order.
        codes: Vec<u32>,
        /// The closing quote was found.
        terminated: bool,
    },
}

/// A token and the position of its first character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token payload.
    pub kind: TokenKind,
    /// Source position.
    pub pos: SourcePos,
}

struct Cursor<'a> {
    chars: std::iter::Peekable<Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    const fn pos(&self) -> SourcePos {
        SourcePos::new(self.line, self.column)
    }
}

const fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn hex_digit(c: Option<char>) -> u32 {
    c.and_then(|c| c.to_digit(16)).unwrap_or(0)
}

/// Tokenizes `source`. Never fails; malformed input degrades into words.
#[must_use]
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut cursor = Cursor::new(source);
    let mut tokens = Vec::new();

    while let Some(c) = cursor.peek() {
        if is_separator(c) {
            cursor.bump();
            continue;
        }

        let pos = cursor.pos();
        match c {
            '/' => {
                cursor.bump();
                while let Some(c) = cursor.bump() {
                    if c == '/' {
                        break;
                    }
                }
            }
            '"' => {
                cursor.bump();
                let mut codes = Vec::new();
                let mut terminated = false;
                while let Some(c) = cursor.bump() {
                    match c {
                        '"' => {
                            terminated = true;
                            break;
                        }
                        '\\' => {
                            let high = hex_digit(cursor.bump());
                            let low = hex_digit(cursor.bump());
                            codes.push((high << 4) | low);
                        }
                        other => codes.push(u32::from(other)),
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Str { codes, terminated },
                    pos,
                });
            }
            _ => {
                let mut word = String::new();
                while let Some(c) = cursor.peek() {
                    if is_separator(c) {
                        break;
                    }
                    word.push(c);
                    cursor.bump();
                }
                tokens.push(Token {
                    kind: TokenKind::Word(word),
                    pos,
                });
            }
        }
    }

    tokens
}
