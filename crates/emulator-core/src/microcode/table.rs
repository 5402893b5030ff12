use crate::datapath::lines::Signal;
use crate::Word;

use super::{Condition, MicrocodeEntry, Op, Program};

/// `out` on `component`.
#[must_use]
pub fn out(component: &str) -> Op {
    Op::Line(component.to_string(), Signal::Out)
}

/// `in` on `component`.
#[must_use]
pub fn inp(component: &str) -> Op {
    Op::Line(component.to_string(), Signal::In)
}

/// `incr` on `component`.
#[must_use]
pub fn incr(component: &str) -> Op {
    Op::Line(component.to_string(), Signal::Incr)
}

/// `reset` on `component`.
#[must_use]
pub fn reset(component: &str) -> Op {
    Op::Line(component.to_string(), Signal::Reset)
}

/// Constant onto the bus.
#[must_use]
pub const fn lit(value: Word) -> Op {
    Op::Literal(value)
}

impl Program {
    /// Advances `pc` and points `address` at the next word.
    #[must_use]
    pub fn operand(self) -> Self {
        self.step([incr("pc")]).step([out("pc"), inp("address")])
    }

    /// Loads the instruction at `pc` and restarts the tick counter.
    #[must_use]
    pub fn dispatch(self) -> Self {
        self.step([out("pc"), inp("address")])
            .step([out("memory"), inp("instruction"), reset("tick")])
    }

    /// Advances `pc` past the current word and dispatches the next
    /// instruction.
    #[must_use]
    pub fn fetch_next(self) -> Self {
        self.step([incr("pc")]).dispatch()
    }
}

/// A program that only fetches the next instruction.
#[must_use]
pub fn fetch() -> Program {
    Program::new().fetch_next()
}

fn transfer(instruction: &str, from: &str, to: &str) -> MicrocodeEntry {
    MicrocodeEntry::new(
        instruction,
        Program::new().step([out(from), inp(to)]).fetch_next(),
    )
}

fn load_immediate(instruction: &str, register: &str) -> MicrocodeEntry {
    MicrocodeEntry::new(
        instruction,
        Program::new()
            .operand()
            .step([out("memory"), inp(register)])
            .fetch_next(),
    )
}

fn jump() -> Program {
    Program::new()
        .operand()
        .step([out("memory"), inp("pc")])
        .dispatch()
}

fn branch(instruction: &str, taken: Condition, skipped: Condition) -> [MicrocodeEntry; 2] {
    [
        MicrocodeEntry::when(instruction, taken, jump()),
        MicrocodeEntry::when(instruction, skipped, Program::new().operand().fetch_next()),
    ]
}

/// Decrements `stack_ptr` through the subtractor, clobbering `a` and `b`.
fn push_frame(program: Program) -> Program {
    program
        .step([out("stack_ptr"), inp("a")])
        .step([lit(1), inp("b")])
        .step([out("sub"), inp("stack_ptr")])
}

fn stack_offset(instruction: &str, access: [Op; 2]) -> MicrocodeEntry {
    MicrocodeEntry::new(
        instruction,
        Program::new()
            .operand()
            .step([out("memory"), inp("b")])
            .step([out("stack_ptr"), inp("a")])
            .step([out("sub"), inp("address")])
            .step(access)
            .fetch_next(),
    )
}

/// Microcode for every instruction of [`crate::isa::INSTRUCTION_SET`] on the
/// standard component schema.
#[must_use]
pub fn standard_microcode() -> Vec<MicrocodeEntry> {
    let mut entries = vec![
        MicrocodeEntry::new("nop", fetch()),
        MicrocodeEntry::new("jmp", jump()),
        MicrocodeEntry::new("hlt", Program::new().step([Op::Halt]).fetch_next()),
        MicrocodeEntry::new(
            "cout",
            Program::new()
                .operand()
                .step([out("memory"), inp("io")])
                .fetch_next(),
        ),
        transfer("aout", "a", "io"),
        transfer("inp", "io", "a"),
        load_immediate("iot", "io_target"),
        transfer("atb", "a", "b"),
        transfer("bta", "b", "a"),
        transfer("atx", "a", "x"),
        transfer("aty", "a", "y"),
        transfer("xta", "x", "a"),
        transfer("yta", "y", "a"),
        transfer("btx", "b", "x"),
        transfer("bty", "b", "y"),
        transfer("xtb", "x", "b"),
        transfer("ytb", "y", "b"),
        transfer("xty", "x", "y"),
        transfer("ytx", "y", "x"),
        load_immediate("loa", "a"),
        load_immediate("lob", "b"),
        load_immediate("lox", "x"),
        load_immediate("loy", "y"),
        // An empty bus latches 0.
        MicrocodeEntry::new("rsb", Program::new().step([inp("b")]).fetch_next()),
        transfer("sum", "sum", "a"),
        transfer("sub", "sub", "a"),
        MicrocodeEntry::new(
            "add",
            Program::new()
                .operand()
                .step([out("memory"), inp("b")])
                .step([out("sum"), inp("a")])
                .fetch_next(),
        ),
        MicrocodeEntry::new(
            "rem",
            Program::new()
                .operand()
                .step([out("memory"), inp("b")])
                .step([out("sub"), inp("a")])
                .fetch_next(),
        ),
        MicrocodeEntry::new(
            "jpa",
            Program::new().step([out("a"), inp("pc")]).dispatch(),
        ),
        MicrocodeEntry::new(
            "movma",
            Program::new()
                .operand()
                .step([out("memory"), inp("address")])
                .step([out("memory"), inp("a")])
                .fetch_next(),
        ),
        MicrocodeEntry::new(
            "movam",
            Program::new()
                .operand()
                .step([out("memory"), inp("address")])
                .step([inp("memory"), out("a")])
                .fetch_next(),
        ),
        MicrocodeEntry::new(
            "movpa",
            Program::new()
                .step([out("b"), inp("address")])
                .step([out("memory"), inp("a")])
                .fetch_next(),
        ),
        MicrocodeEntry::new(
            "movap",
            Program::new()
                .step([out("b"), inp("address")])
                .step([inp("memory"), out("a")])
                .fetch_next(),
        ),
        MicrocodeEntry::new(
            "movcm",
            Program::new()
                .operand()
                .step([out("memory"), inp("a")])
                .operand()
                .step([out("memory"), inp("address")])
                .step([inp("memory"), out("a")])
                .fetch_next(),
        ),
        MicrocodeEntry::new(
            "movmm",
            Program::new()
                .operand()
                .step([out("memory"), inp("address")])
                .step([out("memory"), inp("a")])
                .operand()
                .step([out("memory"), inp("address")])
                .step([inp("memory"), out("a")])
                .fetch_next(),
        ),
        stack_offset("movsx", [out("memory"), inp("x")]),
        stack_offset("movxs", [inp("memory"), out("x")]),
        MicrocodeEntry::new(
            "pushc",
            push_frame(Program::new().operand())
                .step([out("memory"), inp("a")])
                .step([out("stack_ptr"), inp("address")])
                .step([out("a"), inp("memory")])
                .fetch_next(),
        ),
        MicrocodeEntry::new(
            "pushx",
            push_frame(Program::new())
                .step([out("stack_ptr"), inp("address")])
                .step([out("x"), inp("memory")])
                .fetch_next(),
        ),
        MicrocodeEntry::new(
            "pop",
            Program::new()
                .step([out("stack_ptr"), inp("address")])
                .step([inp("x"), out("memory")])
                .step([out("stack_ptr"), inp("a")])
                .step([lit(1), inp("b")])
                .step([out("sum"), inp("stack_ptr")])
                .fetch_next(),
        ),
        // The pushed return point is the address of the call opcode.
        MicrocodeEntry::new(
            "call",
            push_frame(Program::new())
                .step([out("stack_ptr"), inp("address")])
                .step([out("pc"), inp("memory")])
                .operand()
                .step([out("memory"), inp("pc")])
                .dispatch(),
        ),
        // Skips the call opcode and its operand while popping.
        MicrocodeEntry::new(
            "ret",
            Program::new()
                .step([out("stack_ptr"), inp("address")])
                .step([inp("pc"), out("memory")])
                .step([out("stack_ptr"), inp("a"), incr("pc")])
                .step([lit(1), inp("b"), incr("pc")])
                .step([out("sum"), inp("stack_ptr")])
                .dispatch(),
        ),
    ];
    entries.extend(branch("jpz", Condition::Zero, Condition::NotZero));
    entries.extend(branch("jnz", Condition::NotZero, Condition::Zero));
    entries.extend(branch("jpc", Condition::Carry, Condition::NotCarry));
    entries.extend(branch("jnc", Condition::NotCarry, Condition::Carry));
    entries
}

#[cfg(test)]
mod tests {
    use super::{fetch, standard_microcode};
    use crate::datapath::schema::Schema;
    use crate::datapath::Flags;
    use crate::isa::IsaRegistry;
    use crate::microcode::{Condition, Controller};

    #[test]
    fn standard_microcode_validates() {
        let schema = Schema::standard().unwrap();
        let isa = IsaRegistry::standard().unwrap();
        assert!(Controller::build(&schema, &isa, &standard_microcode()).is_ok());
    }

    #[test]
    fn fetch_is_three_steps() {
        assert_eq!(fetch().len(), 3);
    }

    #[test]
    fn branches_skip_the_operand_when_not_taken() {
        let schema = Schema::standard().unwrap();
        let isa = IsaRegistry::standard().unwrap();
        let controller = Controller::build(&schema, &isa, &standard_microcode()).unwrap();
        let clear = Flags::default();
        let zero = Flags {
            carry: false,
            zero: true,
        };

        // jpz taken: operand (2), load pc (1), dispatch (2).
        assert_eq!(controller.program_len(24, zero), Some(5));
        // jpz skipped: operand (2), fetch (3).
        assert_eq!(controller.program_len(24, clear), Some(5));
        assert_eq!(controller.program_len(1, clear), Some(5));
    }

    #[test]
    fn every_conditional_family_has_two_entries() {
        let entries = standard_microcode();
        for name in ["jpz", "jnz", "jpc", "jnc"] {
            let family: Vec<_> = entries
                .iter()
                .filter(|entry| entry.instruction == name)
                .collect();
            assert_eq!(family.len(), 2);
            assert!(family
                .iter()
                .all(|entry| entry.condition != Condition::Always));
        }
    }
}
