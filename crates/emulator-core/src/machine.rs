//! A simulation instance: shared architecture, owned datapath and clock.

use std::sync::Arc;

use crate::architecture::Architecture;
use crate::clock::Clock;
use crate::datapath::io::IoPort;
use crate::datapath::Datapath;
use crate::microcode::TickReport;
use crate::{MachineError, Word};

/// Why [`Machine::run_until_halt`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A `halt` was asserted after `ticks` ticks.
    Halted {
        /// Ticks executed, including the halting one.
        ticks: u64,
    },
    /// The tick budget ran out first.
    BudgetExhausted,
}

/// One machine: exclusively owned state over a shared [`Architecture`].
#[derive(Debug)]
pub struct Machine {
    arch: Arc<Architecture>,
    datapath: Datapath,
    clock: Clock,
    ticks: u64,
}

impl Machine {
    /// Creates a zeroed machine with an inactive clock.
    #[must_use]
    pub fn new(arch: Arc<Architecture>) -> Self {
        let datapath = Datapath::new(Arc::clone(arch.schema()), arch.config());
        let clock = Clock::new(arch.config().clock_period);
        Self {
            arch,
            datapath,
            clock,
            ticks: 0,
        }
    }

    /// The shared architecture.
    #[must_use]
    pub fn architecture(&self) -> &Arc<Architecture> {
        &self.arch
    }

    /// Machine state.
    #[must_use]
    pub const fn datapath(&self) -> &Datapath {
        &self.datapath
    }

    /// Mutable machine state, for direct signal driving and memory edits.
    pub fn datapath_mut(&mut self) -> &mut Datapath {
        &mut self.datapath
    }

    /// The clock.
    #[must_use]
    pub const fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Ticks executed since creation or the last reset.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Runs exactly one microcycle whether or not the clock is active. A
    /// halting tick stops the clock.
    pub fn tick(&mut self) -> TickReport {
        self.ticks += 1;
        let report = self.arch.controller().tick(&mut self.datapath);
        if report.halted {
            self.clock.stop();
        }
        report
    }

    /// Feeds host time into the clock; see [`Clock::advance`].
    pub fn advance(&mut self, dt: f64) -> bool {
        let Self {
            arch,
            datapath,
            clock,
            ticks,
        } = self;
        clock.advance(dt, || {
            *ticks += 1;
            arch.controller().tick(datapath).halted
        })
    }

    /// Ticks until the tick counter returns to 0, i.e. the next instruction
    /// was dispatched, or a halt was asserted. Returns the ticks executed.
    pub fn step_instruction(&mut self, max_ticks: u64) -> u64 {
        let mut executed = 0;
        while executed < max_ticks {
            let report = self.tick();
            executed += 1;
            if report.halted || self.tick_counter() == 0 {
                break;
            }
        }
        executed
    }

    /// Ticks until a halt, at most `max_ticks` times.
    pub fn run_until_halt(&mut self, max_ticks: u64) -> RunOutcome {
        for executed in 1..=max_ticks {
            if self.tick().halted {
                return RunOutcome::Halted { ticks: executed };
            }
        }
        RunOutcome::BudgetExhausted
    }

    fn tick_counter(&self) -> Word {
        self.arch
            .schema()
            .component_id("tick")
            .map_or(0, |id| self.datapath.value(id))
    }

    /// Starts the clock.
    pub fn start(&mut self) {
        self.clock.start();
    }

    /// Stops the clock.
    pub fn stop(&mut self) {
        self.clock.stop();
    }

    /// Zeroes registers, bus, flags and the tick count and stops the clock.
    /// Memory and I/O bindings are kept.
    pub fn reset(&mut self) {
        self.datapath.reset();
        self.clock = Clock::new(self.arch.config().clock_period);
        self.ticks = 0;
    }

    /// Replaces memory with `image` followed by zeros.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::ImageTooLarge`] when the image does not fit.
    pub fn load_image(&mut self, image: &[Word]) -> Result<(), MachineError> {
        self.datapath.load_image(image)
    }

    /// Binds an I/O port.
    pub fn register_port(&mut self, port: Word, device: Box<dyn IoPort>) {
        self.datapath.register_port(port, device);
    }

    /// Unbinds an I/O port.
    pub fn unregister_port(&mut self, port: Word) {
        self.datapath.unregister_port(port);
    }
}
