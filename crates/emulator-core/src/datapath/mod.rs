//! Machine state: components, bus, flags, memory and I/O ports.
//!
//! A microcycle is driven in three calls: [`Datapath::clear_lines`] empties
//! the bus and every control line, [`Datapath::signal`] (or the controller's
//! resolved [`MicroOp`]s) asserts lines, and [`Datapath::settle`] runs the
//! three phases:
//!
//! * phase A, in component order: `incr`, then `out`;
//! * phase B: `in`;
//! * phase C: `reset`.
//!
//! Outputs and their side effects (flags, memory reads, port reads) are
//! resolved before any input latches, and resets land last so a value can be
//! read and cleared in the same cycle.

/// I/O port trait and registry.
pub mod io;
/// Control line names and sets.
pub mod lines;
/// Component declarations and resolved schema.
pub mod schema;

use std::sync::Arc;

use crate::alu;
use crate::{MachineConfig, MachineError, Word};

use self::io::{IoPort, IoRegistry};
use self::lines::{LineSet, Signal};
use self::schema::{Behavior, Binding, ComponentId, Schema};

/// Name of the pseudo-component that accepts `halt` and literal values.
pub const PSEUDO_COMPONENT: &str = "_";

/// Status flags written by the adder and subtractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Flags {
    /// Last arithmetic result left `[0, W)`.
    pub carry: bool,
    /// Last arithmetic result was 0.
    pub zero: bool,
}

/// One resolved control action for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicroOp {
    /// Assert a line of a single-word component.
    Line(ComponentId, Signal),
    /// Stop the clock after this cycle.
    Halt,
    /// OR a constant directly onto the bus.
    Literal(Word),
}

/// Read-only view of one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentView<'a> {
    /// Component name.
    pub name: &'a str,
    /// Current value.
    pub value: Word,
    /// Supported lines.
    pub lines: LineSet,
    /// Lines asserted in the current (or last) cycle.
    pub active: LineSet,
}

/// Mutable machine state of one simulation instance.
#[derive(Debug)]
pub struct Datapath {
    schema: Arc<Schema>,
    word_size: u32,
    values: Vec<Word>,
    active: Vec<LineSet>,
    bus: Word,
    flags: Flags,
    memory: Box<[Word]>,
    io: IoRegistry,
    halt_requested: bool,
}

impl Datapath {
    /// Creates a zeroed datapath over `schema`.
    #[must_use]
    pub fn new(schema: Arc<Schema>, config: &MachineConfig) -> Self {
        let len = schema.len();
        Self {
            schema,
            word_size: config.word_size,
            values: vec![0; len],
            active: vec![LineSet::EMPTY; len],
            bus: 0,
            flags: Flags::default(),
            memory: vec![0; config.memory_size].into_boxed_slice(),
            io: IoRegistry::new(),
            halt_requested: false,
        }
    }

    /// The schema this datapath was built from.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Word modulus `W`.
    #[must_use]
    pub const fn word_size(&self) -> u32 {
        self.word_size
    }

    /// Value of a component, or the combined `low + high * W` value of a
    /// wide register.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::UnknownComponent`] for an unknown name.
    pub fn get(&self, name: &str) -> Result<u32, MachineError> {
        self.schema
            .binding(name)
            .map(|binding| self.binding_value(binding))
            .ok_or_else(|| MachineError::UnknownComponent(name.to_string()))
    }

    /// Value of a single-word component.
    #[must_use]
    pub fn value(&self, id: ComponentId) -> Word {
        self.values[id.index()]
    }

    /// Asserts one control line by name for the current cycle.
    ///
    /// Wide base names route to both halves, except `incr`, which routes to
    /// the low half and carries into the high half. The `_` target takes
    /// `halt` or a numeric literal that is OR'ed onto the bus.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::UnknownComponent`] for an unknown component
    /// and [`MachineError::UnknownSignal`] for a line the component lacks.
    pub fn signal(&mut self, component: &str, signal: &str) -> Result<(), MachineError> {
        let unknown_signal = || MachineError::UnknownSignal {
            component: component.to_string(),
            signal: signal.to_string(),
        };

        if component == PSEUDO_COMPONENT {
            if signal.eq_ignore_ascii_case("halt") {
                self.apply(MicroOp::Halt);
                return Ok(());
            }
            let literal = signal.trim().parse::<Word>().map_err(|_| unknown_signal())?;
            self.apply(MicroOp::Literal(literal));
            return Ok(());
        }

        let binding = self
            .schema
            .binding(component)
            .ok_or_else(|| MachineError::UnknownComponent(component.to_string()))?;
        let line = Signal::from_name(signal).ok_or_else(unknown_signal)?;
        let targets = match binding {
            Binding::Narrow(id) => vec![id],
            Binding::Wide { low, .. } if line == Signal::Incr => vec![low],
            Binding::Wide { low, high } => vec![low, high],
        };
        if targets
            .iter()
            .any(|id| !self.schema.lines(*id).contains(line))
        {
            return Err(unknown_signal());
        }
        for id in targets {
            self.apply(MicroOp::Line(id, line));
        }
        Ok(())
    }

    /// Clears the bus, every control line and any pending halt request.
    pub fn clear_lines(&mut self) {
        self.bus = 0;
        self.active.fill(LineSet::EMPTY);
        self.halt_requested = false;
    }

    /// Applies a resolved micro-op. Lines must be supported by the target;
    /// the controller validates this when it is built.
    pub(crate) fn apply(&mut self, op: MicroOp) {
        match op {
            MicroOp::Line(id, signal) => {
                let active = &mut self.active[id.index()];
                *active = active.with(signal);
            }
            MicroOp::Halt => self.halt_requested = true,
            MicroOp::Literal(value) => self.bus |= value,
        }
    }

    /// Runs phases A, B and C over the asserted lines.
    pub fn settle(&mut self) {
        let schema = Arc::clone(&self.schema);

        for id in schema.ids() {
            let active = self.active[id.index()];
            if active.contains(Signal::Incr) {
                self.increment(id, schema.slot(id).carry_into);
            }
            if active.contains(Signal::Out) {
                let value = self.output(id, schema.slot(id).behavior);
                self.bus |= value;
            }
        }

        let latched = self.reduce(u32::from(self.bus));
        for id in schema.ids() {
            if self.active[id.index()].contains(Signal::In) {
                self.input(id, schema.slot(id).behavior, latched);
            }
        }

        for id in schema.ids() {
            if self.active[id.index()].contains(Signal::Reset) {
                self.values[id.index()] = 0;
            }
        }
    }

    fn increment(&mut self, id: ComponentId, carry_into: Option<ComponentId>) {
        let next = self.reduce(u32::from(self.values[id.index()]) + 1);
        self.values[id.index()] = next;
        if next == 0 {
            if let Some(high) = carry_into {
                self.values[high.index()] = self.reduce(u32::from(self.values[high.index()]) + 1);
            }
        }
    }

    fn output(&mut self, id: ComponentId, behavior: Behavior) -> Word {
        let value = match behavior {
            Behavior::Register => return self.values[id.index()],
            Behavior::Memory { address } => self.memory[self.memory_index(address)],
            Behavior::Io { target } => {
                let port = self.port(target);
                let raw = self.io.read(port);
                self.reduce(u32::from(raw))
            }
            Behavior::Adder { lhs, rhs } => {
                self.arithmetic(alu::add(self.value(lhs), self.value(rhs), self.word_size))
            }
            Behavior::Subtractor { lhs, rhs } => {
                self.arithmetic(alu::sub(self.value(lhs), self.value(rhs), self.word_size))
            }
        };
        self.values[id.index()] = value;
        value
    }

    fn arithmetic(&mut self, result: alu::AluResult) -> Word {
        self.flags = Flags {
            carry: result.carry,
            zero: result.zero,
        };
        result.value
    }

    fn input(&mut self, id: ComponentId, behavior: Behavior, latched: Word) {
        match behavior {
            Behavior::Register => {}
            Behavior::Memory { address } => {
                let index = self.memory_index(address);
                self.memory[index] = latched;
            }
            Behavior::Io { target } => {
                let port = self.port(target);
                self.io.write(port, latched);
            }
            // Rejected when the schema is built.
            Behavior::Adder { .. } | Behavior::Subtractor { .. } => return,
        }
        self.values[id.index()] = latched;
    }

    fn binding_value(&self, binding: Binding) -> u32 {
        match binding {
            Binding::Narrow(id) => u32::from(self.value(id)),
            Binding::Wide { low, high } => {
                u32::from(self.value(low)) + u32::from(self.value(high)) * self.word_size
            }
        }
    }

    fn memory_index(&self, address: Binding) -> usize {
        self.binding_value(address) as usize % self.memory.len()
    }

    fn port(&self, target: Binding) -> Word {
        self.reduce(self.binding_value(target) % self.word_size)
    }

    const fn reduce(&self, value: u32) -> Word {
        alu::wrap(value, self.word_size)
    }

    /// Zeroes every component, line, the bus and the flags. Memory and I/O
    /// bindings are kept.
    pub fn reset(&mut self) {
        self.values.fill(0);
        self.clear_lines();
        self.flags = Flags::default();
    }

    /// Current bus value.
    #[must_use]
    pub const fn bus(&self) -> Word {
        self.bus
    }

    /// Current flags.
    #[must_use]
    pub const fn flags(&self) -> Flags {
        self.flags
    }

    /// Returns `true` when a `halt` was asserted since the last
    /// [`Datapath::clear_lines`].
    #[must_use]
    pub const fn halt_requested(&self) -> bool {
        self.halt_requested
    }

    /// Main memory.
    #[must_use]
    pub fn memory(&self) -> &[Word] {
        &self.memory
    }

    /// Writes one memory word, reduced into `[0, W)`.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::AddressOutOfRange`] past the end of memory.
    pub fn write_memory(&mut self, address: usize, value: Word) -> Result<(), MachineError> {
        let size = self.memory.len();
        let reduced = self.reduce(u32::from(value));
        let cell = self
            .memory
            .get_mut(address)
            .ok_or(MachineError::AddressOutOfRange { address, size })?;
        *cell = reduced;
        Ok(())
    }

    /// Replaces memory with `image` followed by zeros.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::ImageTooLarge`] when `image` does not fit;
    /// memory is left untouched in that case.
    pub fn load_image(&mut self, image: &[Word]) -> Result<(), MachineError> {
        if image.len() > self.memory.len() {
            return Err(MachineError::ImageTooLarge {
                len: image.len(),
                size: self.memory.len(),
            });
        }
        let word_size = self.word_size;
        self.memory.fill(0);
        for (cell, &word) in self.memory.iter_mut().zip(image) {
            *cell = alu::wrap(u32::from(word), word_size);
        }
        Ok(())
    }

    /// Components in iteration order.
    pub fn components(&self) -> impl Iterator<Item = ComponentView<'_>> {
        self.schema.ids().map(move |id| ComponentView {
            name: self.schema.name(id),
            value: self.value(id),
            lines: self.schema.lines(id),
            active: self.active[id.index()],
        })
    }

    /// Binds an I/O port.
    pub fn register_port(&mut self, port: Word, device: Box<dyn IoPort>) -> Option<Box<dyn IoPort>> {
        self.io.register(port, device)
    }

    /// Unbinds an I/O port.
    pub fn unregister_port(&mut self, port: Word) -> Option<Box<dyn IoPort>> {
        self.io.unregister(port)
    }

    /// The I/O port registry.
    pub fn io_mut(&mut self) -> &mut IoRegistry {
        &mut self.io
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    use proptest::prelude::*;
    use rstest::rstest;

    use super::io::BufferPort;
    use super::lines::LineSet;
    use super::schema::{ComponentSpec, Schema};
    use super::{Datapath, Flags};
    use crate::{MachineConfig, MachineError};

    fn standard() -> Datapath {
        Datapath::new(Arc::new(Schema::standard().unwrap()), &MachineConfig::default())
    }

    fn cycle(datapath: &mut Datapath, lines: &[(&str, &str)]) {
        datapath.clear_lines();
        for (component, signal) in lines {
            datapath.signal(component, signal).unwrap();
        }
        datapath.settle();
    }

    fn load(datapath: &mut Datapath, register: &str, value: u16) {
        let literal = value.to_string();
        cycle(datapath, &[("_", literal.as_str()), (register, "in")]);
    }

    #[test]
    fn outputs_combine_on_the_bus_by_or() {
        let mut datapath = standard();
        load(&mut datapath, "a", 0b0110);
        load(&mut datapath, "b", 0b1001);

        cycle(&mut datapath, &[("a", "out"), ("b", "out"), ("x", "in")]);

        assert_eq!(datapath.bus(), 0b1111);
        assert_eq!(datapath.get("x"), Ok(0b1111));
    }

    #[test]
    fn adder_output_sets_flags_before_latching() {
        let mut datapath = standard();
        load(&mut datapath, "a", 200);
        load(&mut datapath, "b", 56);

        cycle(&mut datapath, &[("sum", "out"), ("a", "in"), ("b", "reset")]);

        assert_eq!(datapath.get("a"), Ok(0));
        assert_eq!(datapath.get("b"), Ok(0));
        assert_eq!(datapath.flags(), Flags { carry: true, zero: true });
    }

    #[test]
    fn reset_lands_after_the_value_was_read() {
        let mut datapath = standard();
        load(&mut datapath, "a", 9);

        cycle(&mut datapath, &[("a", "out"), ("a", "reset"), ("y", "in")]);

        assert_eq!(datapath.get("y"), Ok(9));
        assert_eq!(datapath.get("a"), Ok(0));
    }

    #[test]
    fn memory_is_addressed_by_the_address_register() {
        let mut datapath = standard();
        datapath.write_memory(40, 77).unwrap();
        load(&mut datapath, "address", 40);

        cycle(&mut datapath, &[("memory", "out"), ("a", "in")]);
        assert_eq!(datapath.get("a"), Ok(77));

        load(&mut datapath, "b", 5);
        cycle(&mut datapath, &[("b", "out"), ("memory", "in")]);
        assert_eq!(datapath.memory()[40], 5);
    }

    #[test]
    fn io_cell_reads_and_writes_the_selected_port() {
        let mut datapath = standard();
        let port = Rc::new(RefCell::new(BufferPort::with_input([65])));
        datapath.register_port(2, Box::new(Rc::clone(&port)));
        load(&mut datapath, "io_target", 2);

        cycle(&mut datapath, &[("io", "out"), ("a", "in")]);
        cycle(&mut datapath, &[("a", "out"), ("io", "in")]);

        assert_eq!(datapath.get("a"), Ok(65));
        assert_eq!(port.borrow().output, [65]);
    }

    #[rstest]
    #[case("nothing", "in", MachineError::UnknownComponent("nothing".to_string()))]
    #[case("sum", "in", MachineError::UnknownSignal { component: "sum".to_string(), signal: "in".to_string() })]
    #[case("a", "incr", MachineError::UnknownSignal { component: "a".to_string(), signal: "incr".to_string() })]
    #[case("a", "flip", MachineError::UnknownSignal { component: "a".to_string(), signal: "flip".to_string() })]
    #[case("_", "jump", MachineError::UnknownSignal { component: "_".to_string(), signal: "jump".to_string() })]
    fn bad_signals_are_rejected(
        #[case] component: &str,
        #[case] signal: &str,
        #[case] expected: MachineError,
    ) {
        let mut datapath = standard();
        assert_eq!(datapath.signal(component, signal), Err(expected));
    }

    #[test]
    fn halt_is_reported_until_lines_clear() {
        let mut datapath = standard();
        datapath.signal("_", "halt").unwrap();
        assert!(datapath.halt_requested());

        datapath.clear_lines();
        assert!(!datapath.halt_requested());
    }

    #[test]
    fn wide_register_carries_and_combines() {
        let schema = Schema::build(&[ComponentSpec::register("pc", LineSet::ALL).wide()]).unwrap();
        let mut datapath = Datapath::new(Arc::new(schema), &MachineConfig::wide());
        cycle(&mut datapath, &[("_", "255"), ("pc_l", "in")]);

        cycle(&mut datapath, &[("pc", "incr")]);

        assert_eq!(datapath.get("pc_l"), Ok(0));
        assert_eq!(datapath.get("pc_h"), Ok(1));
        assert_eq!(datapath.get("pc"), Ok(256));
    }

    #[test]
    fn reset_keeps_memory() {
        let mut datapath = standard();
        datapath.write_memory(3, 3).unwrap();
        load(&mut datapath, "a", 1);

        datapath.reset();

        assert_eq!(datapath.get("a"), Ok(0));
        assert_eq!(datapath.memory()[3], 3);
    }

    #[test]
    fn memory_writes_are_bounds_checked() {
        let mut datapath = standard();
        assert_eq!(
            datapath.write_memory(256, 1),
            Err(MachineError::AddressOutOfRange {
                address: 256,
                size: 256,
            })
        );
        datapath.write_memory(255, 300).unwrap();
        assert_eq!(datapath.memory()[255], 44);
    }

    proptest! {
        #[test]
        fn incrementing_word_size_times_wraps_to_start(start in 0_u16..256) {
            let mut datapath = standard();
            load(&mut datapath, "pc", start);

            for _ in 0..256 {
                cycle(&mut datapath, &[("pc", "incr")]);
            }

            prop_assert_eq!(datapath.get("pc"), Ok(u32::from(start)));
        }
    }
}
