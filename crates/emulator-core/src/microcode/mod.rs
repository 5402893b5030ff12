//! Table-driven microcode controller.
//!
//! Each instruction is implemented by one or more [`MicrocodeEntry`]s keyed
//! by mnemonic. Entries of one opcode form a family whose [`Condition`]s must
//! select exactly one entry for every flag state; [`Controller::build`]
//! checks this together with every component and line the programs name, so
//! [`Controller::tick`] cannot fail.

/// Microcode of the standard instruction set.
pub mod table;

use std::collections::BTreeMap;

use crate::datapath::lines::Signal;
use crate::datapath::schema::{Binding, ComponentId, Schema};
use crate::datapath::{Datapath, Flags, MicroOp};
use crate::isa::IsaRegistry;
use crate::{ConfigError, Word};

pub use table::standard_microcode;

/// Flag predicate selecting one entry of an opcode family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Condition {
    /// Matches every flag state.
    Always,
    /// `zero` is set.
    Zero,
    /// `zero` is clear.
    NotZero,
    /// `carry` is set.
    Carry,
    /// `carry` is clear.
    NotCarry,
}

impl Condition {
    /// Evaluates the predicate.
    #[must_use]
    pub const fn matches(self, flags: Flags) -> bool {
        match self {
            Self::Always => true,
            Self::Zero => flags.zero,
            Self::NotZero => !flags.zero,
            Self::Carry => flags.carry,
            Self::NotCarry => !flags.carry,
        }
    }
}

/// Unresolved micro-operation naming its component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Assert `signal` on the named component or wide register.
    Line(String, Signal),
    /// Stop the clock.
    Halt,
    /// Inject a constant onto the bus.
    Literal(Word),
}

/// Ordered micro-step program; step `t` runs when the tick counter is `t`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    steps: Vec<Vec<Op>>,
}

impl Program {
    /// Creates an empty program.
    #[must_use]
    pub const fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Appends one micro-step.
    #[must_use]
    pub fn step(mut self, ops: impl IntoIterator<Item = Op>) -> Self {
        self.steps.push(ops.into_iter().collect());
        self
    }

    /// Micro-steps in order.
    #[must_use]
    pub fn steps(&self) -> &[Vec<Op>] {
        &self.steps
    }

    /// Number of micro-steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` for a program without steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// One instruction variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicrocodeEntry {
    /// Mnemonic the entry implements.
    pub instruction: String,
    /// Flag predicate.
    pub condition: Condition,
    /// Micro-steps.
    pub program: Program,
}

impl MicrocodeEntry {
    /// An unconditional entry.
    #[must_use]
    pub fn new(instruction: &str, program: Program) -> Self {
        Self::when(instruction, Condition::Always, program)
    }

    /// An entry selected by `condition`.
    #[must_use]
    pub fn when(instruction: &str, condition: Condition, program: Program) -> Self {
        Self {
            instruction: instruction.to_string(),
            condition,
            program,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedEntry {
    condition: Condition,
    steps: Vec<Vec<MicroOp>>,
}

/// Outcome of one controller tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Opcode held by the instruction register during the tick.
    pub opcode: Word,
    /// Micro-step index the tick executed.
    pub step: Word,
    /// A `halt` was asserted.
    pub halted: bool,
}

/// Validated opcode to micro-step mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controller {
    tick: ComponentId,
    instruction: ComponentId,
    families: BTreeMap<Word, Vec<ResolvedEntry>>,
}

const FLAG_STATES: [Flags; 4] = [
    Flags { carry: false, zero: false },
    Flags { carry: false, zero: true },
    Flags { carry: true, zero: false },
    Flags { carry: true, zero: true },
];

impl Controller {
    /// Resolves and validates `entries` against `schema` and `isa`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a role register is missing, an entry
    /// names an unknown component, line or instruction, an instruction has no
    /// microcode, or an opcode family is ambiguous or incomplete for some
    /// flag state.
    pub fn build(
        schema: &Schema,
        isa: &IsaRegistry,
        entries: &[MicrocodeEntry],
    ) -> Result<Self, ConfigError> {
        let tick = schema
            .component_id("tick")
            .ok_or(ConfigError::MissingRole("tick"))?;
        let instruction = schema
            .component_id("instruction")
            .ok_or(ConfigError::MissingRole("instruction"))?;
        require_line(schema, tick, Signal::Incr)?;

        let mut families: BTreeMap<Word, Vec<ResolvedEntry>> = BTreeMap::new();
        for entry in entries {
            let def = isa
                .by_mnemonic(&entry.instruction)
                .ok_or_else(|| ConfigError::UnknownInstruction(entry.instruction.clone()))?;
            let steps = entry
                .program
                .steps()
                .iter()
                .map(|step| resolve_step(schema, step))
                .collect::<Result<Vec<_>, _>>()?;
            families.entry(def.opcode).or_default().push(ResolvedEntry {
                condition: entry.condition,
                steps,
            });
        }

        for def in isa.iter() {
            let family = families
                .get(&def.opcode)
                .ok_or_else(|| ConfigError::MissingMicrocode(def.name.clone()))?;
            for flags in FLAG_STATES {
                let matching = family
                    .iter()
                    .filter(|entry| entry.condition.matches(flags))
                    .count();
                if matching == 0 {
                    return Err(ConfigError::IncompleteMicrocode {
                        name: def.name.clone(),
                        carry: flags.carry,
                        zero: flags.zero,
                    });
                }
                if matching > 1 {
                    return Err(ConfigError::OverlappingMicrocode {
                        name: def.name.clone(),
                        carry: flags.carry,
                        zero: flags.zero,
                    });
                }
            }
        }

        log::debug!(
            "controller built: {} opcodes, {} entries",
            families.len(),
            entries.len()
        );
        Ok(Self {
            tick,
            instruction,
            families,
        })
    }

    /// Runs one microcycle on `datapath`.
    pub fn tick(&self, datapath: &mut Datapath) -> TickReport {
        let step = datapath.value(self.tick);
        let opcode = datapath.value(self.instruction);
        datapath.clear_lines();

        let flags = datapath.flags();
        match self.families.get(&opcode) {
            Some(family) => {
                for entry in family.iter().filter(|entry| entry.condition.matches(flags)) {
                    if let Some(ops) = entry.steps.get(usize::from(step)) {
                        for op in ops {
                            log::trace!("opcode {opcode} step {step}: {op:?}");
                            datapath.apply(*op);
                        }
                    }
                }
            }
            None if step == 0 => log::warn!("no microcode for opcode {opcode}"),
            None => {}
        }

        datapath.apply(MicroOp::Line(self.tick, Signal::Incr));
        datapath.settle();

        let halted = datapath.halt_requested();
        if halted {
            log::info!("halt asserted by opcode {opcode}");
        }
        TickReport {
            opcode,
            step,
            halted,
        }
    }

    /// Number of micro-steps of the entry that would run for `opcode` under
    /// `flags`.
    #[must_use]
    pub fn program_len(&self, opcode: Word, flags: Flags) -> Option<usize> {
        self.families
            .get(&opcode)?
            .iter()
            .find(|entry| entry.condition.matches(flags))
            .map(|entry| entry.steps.len())
    }
}

fn require_line(schema: &Schema, id: ComponentId, signal: Signal) -> Result<(), ConfigError> {
    if schema.lines(id).contains(signal) {
        Ok(())
    } else {
        Err(ConfigError::UnsupportedSignal {
            component: schema.name(id).to_string(),
            signal: signal.name().to_string(),
        })
    }
}

fn resolve_step(schema: &Schema, step: &[Op]) -> Result<Vec<MicroOp>, ConfigError> {
    let mut resolved = Vec::with_capacity(step.len());
    for op in step {
        match op {
            Op::Halt => resolved.push(MicroOp::Halt),
            Op::Literal(value) => resolved.push(MicroOp::Literal(*value)),
            Op::Line(name, signal) => {
                let binding = schema
                    .binding(name)
                    .ok_or_else(|| ConfigError::UnknownComponent(name.clone()))?;
                let ids = match binding {
                    Binding::Narrow(id) => vec![id],
                    Binding::Wide { low, .. } if *signal == Signal::Incr => vec![low],
                    Binding::Wide { low, high } => vec![low, high],
                };
                for id in ids {
                    require_line(schema, id, *signal)?;
                    resolved.push(MicroOp::Line(id, *signal));
                }
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::table::{fetch, inp, out};
    use super::{Condition, Controller, MicrocodeEntry, Op, Program};
    use crate::datapath::lines::Signal;
    use crate::datapath::schema::Schema;
    use crate::datapath::Flags;
    use crate::isa::{InstructionSpec, IsaRegistry};
    use crate::ConfigError;

    fn schema() -> Schema {
        Schema::standard().unwrap()
    }

    fn isa(specs: &[InstructionSpec]) -> IsaRegistry {
        IsaRegistry::build(specs).unwrap()
    }

    #[rstest]
    #[case(Condition::Always, Flags { carry: true, zero: false }, true)]
    #[case(Condition::Zero, Flags { carry: false, zero: true }, true)]
    #[case(Condition::Zero, Flags { carry: true, zero: false }, false)]
    #[case(Condition::NotZero, Flags { carry: false, zero: false }, true)]
    #[case(Condition::Carry, Flags { carry: true, zero: true }, true)]
    #[case(Condition::NotCarry, Flags { carry: true, zero: false }, false)]
    fn conditions_read_flags(
        #[case] condition: Condition,
        #[case] flags: Flags,
        #[case] expected: bool,
    ) {
        assert_eq!(condition.matches(flags), expected);
    }

    #[test]
    fn instruction_without_microcode_is_rejected() {
        let isa = isa(&[InstructionSpec::bare("nop", 0, "")]);
        assert_eq!(
            Controller::build(&schema(), &isa, &[]),
            Err(ConfigError::MissingMicrocode("nop".to_string()))
        );
    }

    #[test]
    fn microcode_for_unknown_instruction_is_rejected() {
        let isa = isa(&[InstructionSpec::bare("nop", 0, "")]);
        let entries = [
            MicrocodeEntry::new("nop", fetch()),
            MicrocodeEntry::new("zap", fetch()),
        ];
        assert_eq!(
            Controller::build(&schema(), &isa, &entries),
            Err(ConfigError::UnknownInstruction("zap".to_string()))
        );
    }

    #[test]
    fn unknown_component_is_rejected() {
        let isa = isa(&[InstructionSpec::bare("nop", 0, "")]);
        let entries = [MicrocodeEntry::new(
            "nop",
            Program::new().step([out("z"), inp("a")]),
        )];
        assert_eq!(
            Controller::build(&schema(), &isa, &entries),
            Err(ConfigError::UnknownComponent("z".to_string()))
        );
    }

    #[test]
    fn unsupported_line_is_rejected() {
        let isa = isa(&[InstructionSpec::bare("nop", 0, "")]);
        let entries = [MicrocodeEntry::new(
            "nop",
            Program::new().step([Op::Line("sum".to_string(), Signal::In)]),
        )];
        assert_eq!(
            Controller::build(&schema(), &isa, &entries),
            Err(ConfigError::UnsupportedSignal {
                component: "sum".to_string(),
                signal: "in".to_string(),
            })
        );
    }

    #[test]
    fn family_must_cover_every_flag_state() {
        let isa = isa(&[InstructionSpec::bare("skip", 0, "")]);
        let entries = [MicrocodeEntry::when("skip", Condition::Zero, fetch())];
        assert_eq!(
            Controller::build(&schema(), &isa, &entries),
            Err(ConfigError::IncompleteMicrocode {
                name: "skip".to_string(),
                carry: false,
                zero: false,
            })
        );
    }

    #[test]
    fn family_must_not_overlap() {
        let isa = isa(&[InstructionSpec::bare("skip", 0, "")]);
        let entries = [
            MicrocodeEntry::when("skip", Condition::NotZero, fetch()),
            MicrocodeEntry::when("skip", Condition::NotCarry, fetch()),
        ];
        assert!(matches!(
            Controller::build(&schema(), &isa, &entries),
            Err(ConfigError::OverlappingMicrocode { .. } | ConfigError::IncompleteMicrocode { .. })
        ));
    }

    #[test]
    fn missing_tick_register_is_a_role_error() {
        let schema = Schema::build(&[]).unwrap();
        assert_eq!(
            Controller::build(&schema, &isa(&[]), &[]),
            Err(ConfigError::MissingRole("tick"))
        );
    }
}
