//! Combinational arithmetic used by the adder and subtractor components.
//!
//! Both operations are pure: the virtual components call them from their
//! `out` handler, write the returned flags into the datapath and drive
//! `value` onto the bus.

use crate::Word;

/// Result of one ALU evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AluResult {
    /// Result reduced into `[0, W)`.
    pub value: Word,
    /// The mathematical result left `[0, W)`.
    pub carry: bool,
    /// `value == 0`.
    pub zero: bool,
}

/// Computes `(a + b) mod W` with carry and zero flags.
#[must_use]
pub fn add(a: Word, b: Word, word_size: u32) -> AluResult {
    let sum = u32::from(a) + u32::from(b);
    let value = wrap(sum, word_size);
    AluResult {
        value,
        carry: sum >= word_size,
        zero: value == 0,
    }
}

/// Computes `a - b` wrapped into `[0, W)`; carry signals a borrow.
#[must_use]
pub fn sub(a: Word, b: Word, word_size: u32) -> AluResult {
    let difference = i64::from(a) - i64::from(b);
    let (wrapped, carry) = if difference < 0 {
        (difference + i64::from(word_size), true)
    } else {
        (difference, false)
    };
    let value = wrap(u32::try_from(wrapped).unwrap_or(0), word_size);
    AluResult {
        value,
        carry,
        zero: value == 0,
    }
}

/// Reduces `value` into `[0, W)`.
#[allow(clippy::cast_possible_truncation)]
pub(crate) const fn wrap(value: u32, word_size: u32) -> Word {
    (value % word_size) as Word
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::{add, sub, AluResult};

    #[rstest]
    #[case(1, 2, AluResult { value: 3, carry: false, zero: false })]
    #[case(255, 1, AluResult { value: 0, carry: true, zero: true })]
    #[case(200, 100, AluResult { value: 44, carry: true, zero: false })]
    #[case(0, 0, AluResult { value: 0, carry: false, zero: true })]
    fn add_cases(#[case] a: u16, #[case] b: u16, #[case] expected: AluResult) {
        assert_eq!(add(a, b, 256), expected);
    }

    #[rstest]
    #[case(5, 3, AluResult { value: 2, carry: false, zero: false })]
    #[case(3, 3, AluResult { value: 0, carry: false, zero: true })]
    #[case(0, 1, AluResult { value: 255, carry: true, zero: false })]
    #[case(10, 200, AluResult { value: 66, carry: true, zero: false })]
    fn sub_cases(#[case] a: u16, #[case] b: u16, #[case] expected: AluResult) {
        assert_eq!(sub(a, b, 256), expected);
    }

    proptest! {
        #[test]
        fn add_agrees_with_modular_arithmetic(
            word_size in 2_u32..=65_536,
            a_seed in any::<u32>(),
            b_seed in any::<u32>(),
        ) {
            let a = u16::try_from(a_seed % word_size).unwrap();
            let b = u16::try_from(b_seed % word_size).unwrap();
            let result = add(a, b, word_size);
            let exact = u32::from(a) + u32::from(b);

            prop_assert_eq!(u32::from(result.value), exact % word_size);
            prop_assert_eq!(result.carry, exact >= word_size);
            prop_assert_eq!(result.zero, result.value == 0);
        }

        #[test]
        fn sub_agrees_with_modular_arithmetic(
            word_size in 2_u32..=65_536,
            a_seed in any::<u32>(),
            b_seed in any::<u32>(),
        ) {
            let a = u16::try_from(a_seed % word_size).unwrap();
            let b = u16::try_from(b_seed % word_size).unwrap();
            let result = sub(a, b, word_size);
            let exact = i64::from(a) - i64::from(b);

            prop_assert_eq!(
                i64::from(result.value),
                exact.rem_euclid(i64::from(word_size))
            );
            prop_assert_eq!(result.carry, exact < 0);
            prop_assert_eq!(result.zero, result.value == 0);
        }

        #[test]
        fn add_then_sub_restores_operand(a in 0_u16..256, b in 0_u16..256) {
            let sum = add(a, b, 256);
            prop_assert_eq!(sub(sum.value, b, 256).value, a);
        }
    }
}
