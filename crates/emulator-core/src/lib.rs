//! Core crate for Bus8, a microcoded bus machine.
//!
//! Registers, memory, I/O and the arithmetic units are components on one
//! shared bus. Every clock tick the microcode controller asserts the control
//! lines of the current instruction step and the datapath settles them in a
//! fixed phase order. The tables describing the machine are validated once
//! and shared by every [`Machine`] through an [`Architecture`].

/// Machine word; every value lives in `[0, W)` for the configured `W`.
pub type Word = u16;

/// Adder and subtractor arithmetic.
pub mod alu;

/// Validated architecture tables.
pub mod architecture;
pub use architecture::Architecture;

/// Catch-up clock.
pub mod clock;
pub use clock::Clock;

/// Machine configuration.
pub mod config;
pub use config::{
    MachineConfig, DEFAULT_CLOCK_PERIOD, DEFAULT_MEMORY_SIZE, DEFAULT_WORD_SIZE, MAX_ADDRESS_SPACE,
};

/// Components, bus, flags, memory and I/O ports.
pub mod datapath;
pub use datapath::io::{BufferPort, IoPort, IoRegistry};
pub use datapath::lines::{LineSet, Signal};
pub use datapath::schema::{
    standard_components, Binding, ComponentId, ComponentKind, ComponentSpec, Schema, Width,
};
pub use datapath::{ComponentView, Datapath, Flags, MicroOp, PSEUDO_COMPONENT};

/// Assembler symbol tables.
pub mod debug;
pub use debug::{BufferInfo, DebugDatabase};

/// Annotated memory listings.
pub mod disasm;
pub use disasm::{disassemble, CellRole, DisassemblyRow};

mod error;
pub use error::{ConfigError, MachineError};

/// Instruction set registry.
pub mod isa;
pub use isa::{InstructionDef, InstructionSpec, IsaRegistry, OperandShape, INSTRUCTION_SET};

/// Simulation instances.
pub mod machine;
pub use machine::{Machine, RunOutcome};

/// Microcode tables and controller.
pub mod microcode;
pub use microcode::{standard_microcode, Condition, Controller, MicrocodeEntry, Op, Program, TickReport};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
