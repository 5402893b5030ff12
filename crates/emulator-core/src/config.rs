//! Machine configuration shared by hosts and the assembler.

use crate::ConfigError;

/// Default word modulus: an 8-bit machine.
pub const DEFAULT_WORD_SIZE: u32 = 256;

/// Default memory size in words (one word of address space).
pub const DEFAULT_MEMORY_SIZE: usize = 256;

/// Default clock period, in the host's time units per tick.
pub const DEFAULT_CLOCK_PERIOD: f64 = 10.0;

/// Largest supported word modulus and memory size.
pub const MAX_ADDRESS_SPACE: usize = 1 << 16;

/// Top-level immutable configuration for a machine instance.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MachineConfig {
    /// Modulus `W` of every register, bus and memory value.
    pub word_size: u32,
    /// Number of memory words `M`; must satisfy `M >= W`.
    pub memory_size: usize,
    /// Clock period, in the same units the host passes to `advance`.
    pub clock_period: f64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            word_size: DEFAULT_WORD_SIZE,
            memory_size: DEFAULT_MEMORY_SIZE,
            clock_period: DEFAULT_CLOCK_PERIOD,
        }
    }
}

impl MachineConfig {
    /// Configuration for a machine with a 16-bit address space built from
    /// two-word registers.
    #[must_use]
    pub fn wide() -> Self {
        Self {
            memory_size: MAX_ADDRESS_SPACE,
            ..Self::default()
        }
    }

    /// Checks the numeric invariants of the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidWordSize`] when `W` is outside
    /// `2..=65536`, [`ConfigError::InvalidMemorySize`] when `M < W` or
    /// `M > 65536`, and [`ConfigError::InvalidClockPeriod`] for a
    /// non-positive or non-finite period.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=MAX_ADDRESS_SPACE as u32).contains(&self.word_size) {
            return Err(ConfigError::InvalidWordSize(self.word_size));
        }
        if self.memory_size < self.word_size as usize || self.memory_size > MAX_ADDRESS_SPACE {
            return Err(ConfigError::InvalidMemorySize {
                memory_size: self.memory_size,
                word_size: self.word_size,
            });
        }
        if !(self.clock_period.is_finite() && self.clock_period > 0.0) {
            return Err(ConfigError::InvalidClockPeriod);
        }
        Ok(())
    }
}
