//! Numeric and character literals, clamped into the machine word.

use std::num::IntErrorKind;

use emulator_core::{IsaRegistry, Word};

/// Parses a whole token as a decimal or `0x` hexadecimal integer with an
/// optional leading `-`. Values too large for `i64` saturate.
#[must_use]
pub fn parse_integer(text: &str) -> Option<i64> {
    let (negative, radix, digits) = split_sign_and_radix(text);
    if !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    from_digits(negative, radix, digits)
}

/// Parses the longest integer prefix of a token, so `12ab` reads as 12.
/// Accepts a leading `-` or `+` and the `0x` prefix like
/// [`parse_integer`]; `None` when no digit follows them.
#[must_use]
pub fn parse_leading_integer(text: &str) -> Option<i64> {
    let (negative, radix, digits) = match text.strip_prefix('+') {
        Some(rest) if !rest.starts_with(['-', '+']) => split_sign_and_radix(rest),
        Some(_) => return None,
        None => split_sign_and_radix(text),
    };
    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    from_digits(negative, radix, &digits[..end])
}

fn split_sign_and_radix(text: &str) -> (bool, u32, &str) {
    let (negative, digits) = text
        .strip_prefix('-')
        .map_or((false, text), |rest| (true, rest));
    let (radix, digits) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .map_or((10, digits), |hex| (16, hex));
    (negative, radix, digits)
}

fn from_digits(negative: bool, radix: u32, digits: &str) -> Option<i64> {
    if digits.is_empty() {
        return None;
    }
    let magnitude = match i64::from_str_radix(digits, radix) {
        Ok(value) => value,
        Err(error) if *error.kind() == IntErrorKind::PosOverflow => i64::MAX,
        Err(_) => return None,
    };
    Some(if negative { -magnitude } else { magnitude })
}

/// Clamps `value` into `[0, W)`.
#[must_use]
pub fn clamp_word(value: i64, word_size: u32) -> Word {
    let max = i64::from(word_size) - 1;
    Word::try_from(value.clamp(0, max)).unwrap_or(Word::MAX)
}

/// Character code of `c`, clamped into `[0, W)`.
#[must_use]
pub fn char_word(c: char, word_size: u32) -> Word {
    clamp_word(i64::from(u32::from(c)), word_size)
}

/// Recognizes the `'c` and `'c'` character literal forms.
#[must_use]
pub fn parse_char_literal(token: &str) -> Option<char> {
    let mut chars = token.chars();
    if chars.next() != Some('\'') {
        return None;
    }
    let c = chars.next()?;
    match (chars.next(), chars.next()) {
        (None, _) | (Some('\''), None) => Some(c),
        _ => None,
    }
}

/// Interprets text typed into a memory cell: a mnemonic, a `'c` character or
/// an integer prefix (clamped). Returns `None` for anything else.
#[must_use]
pub fn parse_cell_value(text: &str, isa: &IsaRegistry, word_size: u32) -> Option<Word> {
    let text = text.trim();
    if let Some(def) = isa.by_mnemonic(text) {
        return Some(def.opcode);
    }
    if let Some(c) = parse_char_literal(text) {
        return Some(char_word(c, word_size));
    }
    parse_leading_integer(text).map(|value| clamp_word(value, word_size))
}
