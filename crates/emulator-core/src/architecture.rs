//! Immutable tables shared by every machine of one architecture.

use std::sync::{Arc, OnceLock};

use crate::datapath::schema::{standard_components, ComponentSpec, Schema};
use crate::isa::{InstructionSpec, IsaRegistry, INSTRUCTION_SET};
use crate::microcode::{standard_microcode, Controller, MicrocodeEntry};
use crate::{ConfigError, MachineConfig};

/// Configuration, component schema, instruction set and controller.
#[derive(Debug, Clone, PartialEq)]
pub struct Architecture {
    config: MachineConfig,
    schema: Arc<Schema>,
    isa: IsaRegistry,
    controller: Controller,
}

impl Architecture {
    /// Validates and builds every table.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found in the configuration, the
    /// component list, the instruction list or the microcode.
    pub fn build(
        config: MachineConfig,
        components: &[ComponentSpec],
        instructions: &[InstructionSpec],
        microcode: &[MicrocodeEntry],
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let schema = Schema::build(components)?;
        let isa = IsaRegistry::build(instructions)?;
        if let Some(def) = isa
            .iter()
            .find(|def| u32::from(def.opcode) >= config.word_size)
        {
            return Err(ConfigError::OpcodeOutOfRange {
                name: def.name.clone(),
                opcode: def.opcode,
                word_size: config.word_size,
            });
        }
        let controller = Controller::build(&schema, &isa, microcode)?;

        log::debug!(
            "architecture built: W={} M={} components={} instructions={}",
            config.word_size,
            config.memory_size,
            schema.len(),
            isa.len()
        );
        Ok(Self {
            config,
            schema: Arc::new(schema),
            isa,
            controller,
        })
    }

    /// The standard machine under `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `config` is invalid or too narrow for the
    /// standard opcodes.
    pub fn with_config(config: MachineConfig) -> Result<Self, ConfigError> {
        Self::build(
            config,
            &standard_components(),
            INSTRUCTION_SET,
            &standard_microcode(),
        )
    }

    /// The standard 8-bit machine, built once per process.
    ///
    /// # Errors
    ///
    /// Returns the build error of the standard tables; there is none unless
    /// the tables themselves are inconsistent.
    pub fn standard() -> Result<Arc<Self>, ConfigError> {
        static STANDARD: OnceLock<Result<Arc<Architecture>, ConfigError>> = OnceLock::new();
        STANDARD
            .get_or_init(|| Self::with_config(MachineConfig::default()).map(Arc::new))
            .clone()
    }

    /// Machine configuration.
    #[must_use]
    pub const fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Resolved component schema.
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Instruction set.
    #[must_use]
    pub const fn isa(&self) -> &IsaRegistry {
        &self.isa
    }

    /// Microcode controller.
    #[must_use]
    pub const fn controller(&self) -> &Controller {
        &self.controller
    }
}
