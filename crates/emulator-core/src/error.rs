use thiserror::Error;

use crate::Word;

/// Errors raised while building the architecture tables (schema, ISA,
/// controller) or validating a machine configuration.
///
/// These are fatal to the build call that raised them and leave any
/// previously built architecture untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Two instruction definitions share an opcode.
    #[error("instruction '{second}' reuses opcode {opcode} already assigned to '{first}'")]
    DuplicateOpcode {
        /// The clashing opcode.
        opcode: Word,
        /// Mnemonic registered first.
        first: String,
        /// Mnemonic that attempted to reuse the opcode.
        second: String,
    },
    /// Two instruction definitions share a mnemonic.
    #[error("mnemonic '{0}' is defined more than once")]
    DuplicateMnemonic(String),
    /// An opcode does not fit in one machine word.
    #[error("opcode {opcode} of '{name}' does not fit in a {word_size}-value word")]
    OpcodeOutOfRange {
        /// Offending mnemonic.
        name: String,
        /// Offending opcode.
        opcode: Word,
        /// Configured word size.
        word_size: u32,
    },
    /// Two components share a name.
    #[error("component '{0}' is declared more than once")]
    DuplicateComponent(String),
    /// A schema or microcode entry names a component that does not exist.
    #[error("unknown component '{0}'")]
    UnknownComponent(String),
    /// A microcode entry asserts a line the component does not support.
    #[error("component '{component}' has no '{signal}' line")]
    UnsupportedSignal {
        /// Component name.
        component: String,
        /// Requested line name.
        signal: String,
    },
    /// A microcode entry refers to a mnemonic missing from the ISA.
    #[error("microcode refers to unknown instruction '{0}'")]
    UnknownInstruction(String),
    /// An ISA instruction has no microcode entry.
    #[error("instruction '{0}' has no microcode")]
    MissingMicrocode(String),
    /// More than one entry of an opcode family matches the same flag state.
    #[error("microcode for '{name}' is ambiguous when carry={carry}, zero={zero}")]
    OverlappingMicrocode {
        /// Mnemonic of the family.
        name: String,
        /// Carry flag of the ambiguous state.
        carry: bool,
        /// Zero flag of the ambiguous state.
        zero: bool,
    },
    /// No entry of an opcode family matches a flag state.
    #[error("microcode for '{name}' does not cover carry={carry}, zero={zero}")]
    IncompleteMicrocode {
        /// Mnemonic of the family.
        name: String,
        /// Carry flag of the uncovered state.
        carry: bool,
        /// Zero flag of the uncovered state.
        zero: bool,
    },
    /// An architecture role component (`tick`, `instruction`) is missing.
    #[error("schema is missing the '{0}' component required by the controller")]
    MissingRole(&'static str),
    /// Word size outside the supported range.
    #[error("word size {0} is outside the supported range 2..=65536")]
    InvalidWordSize(u32),
    /// Memory size smaller than the word size or larger than the address space.
    #[error("memory size {memory_size} must be within {word_size}..=65536")]
    InvalidMemorySize {
        /// Configured memory size.
        memory_size: usize,
        /// Configured word size.
        word_size: u32,
    },
    /// Clock period that is not a positive finite number.
    #[error("clock period must be positive and finite")]
    InvalidClockPeriod,
}

/// Errors raised by the textual datapath control surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    /// Name resolves to neither a component nor a wide register.
    #[error("unknown component '{0}'")]
    UnknownComponent(String),
    /// The component does not support the requested line, or the line name
    /// is not recognized.
    #[error("component '{component}' does not accept signal '{signal}'")]
    UnknownSignal {
        /// Component name as given by the caller.
        component: String,
        /// Signal name as given by the caller.
        signal: String,
    },
    /// Memory access outside the configured memory.
    #[error("address {address} is outside memory of {size} words")]
    AddressOutOfRange {
        /// Requested address.
        address: usize,
        /// Memory size in words.
        size: usize,
    },
    /// A program image does not fit in memory.
    #[error("image of {len} words does not fit in memory of {size} words")]
    ImageTooLarge {
        /// Image length in words.
        len: usize,
        /// Memory size in words.
        size: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, MachineError};

    #[test]
    fn duplicate_opcode_message_names_both_mnemonics() {
        let error = ConfigError::DuplicateOpcode {
            opcode: 3,
            first: "cout".to_string(),
            second: "beep".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "instruction 'beep' reuses opcode 3 already assigned to 'cout'"
        );
    }

    #[test]
    fn unknown_signal_message_reports_component_and_line() {
        let error = MachineError::UnknownSignal {
            component: "sum".to_string(),
            signal: "in".to_string(),
        };
        assert_eq!(error.to_string(), "component 'sum' does not accept signal 'in'");
    }
}
