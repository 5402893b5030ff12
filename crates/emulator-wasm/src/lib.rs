use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use assembler::assembler::{compile, AssembleOptions};
use assembler::literal::char_word;
use assembler::parse_cell_value;
use emulator_core::{
    disassemble, Architecture, DebugDatabase, Flags, IoPort, Machine, Signal, Word,
};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

/// Forwards `log` records to the browser console.
struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let text = JsValue::from_str(&format!("[{}] {}", record.target(), record.args()));
        match record.level() {
            log::Level::Error => web_sys::console::error_1(&text),
            log::Level::Warn => web_sys::console::warn_1(&text),
            _ => web_sys::console::log_1(&text),
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

/// Terminal port: output is collected into lines handed to `sink`, input is
/// queued from the page.
struct ConsolePort<F> {
    input: VecDeque<Word>,
    line: String,
    sink: F,
}

impl<F: FnMut(&str)> ConsolePort<F> {
    const fn new(sink: F) -> Self {
        Self {
            input: VecDeque::new(),
            line: String::new(),
            sink,
        }
    }
}

impl<F: FnMut(&str)> IoPort for ConsolePort<F> {
    fn read(&mut self) -> Word {
        self.input.pop_front().unwrap_or(0)
    }

    fn write(&mut self, value: Word) {
        match char::from_u32(u32::from(value)) {
            Some('\n') => {
                (self.sink)(&self.line);
                self.line.clear();
            }
            Some(c) => self.line.push(c),
            None => self.line.push(char::REPLACEMENT_CHARACTER),
        }
    }
}

fn console_line(line: &str) {
    web_sys::console::log_1(&JsValue::from_str(line));
}

type SharedConsole = Rc<RefCell<ConsolePort<fn(&str)>>>;

/// JS-compatible view of one component.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentState {
    pub name: String,
    pub value: Word,
    pub lines: Vec<String>,
    pub active: Vec<String>,
}

/// JS-compatible snapshot of the whole machine except memory.
#[derive(Debug, Serialize, Deserialize)]
pub struct MachineSnapshot {
    pub components: Vec<ComponentState>,
    pub bus: Word,
    pub flags: Flags,
    pub ticks: u64,
    pub running: bool,
}

fn signal_names(lines: impl Iterator<Item = Signal>) -> Vec<String> {
    lines.map(|signal| signal.name().to_string()).collect()
}

fn snapshot(machine: &Machine) -> MachineSnapshot {
    let datapath = machine.datapath();
    MachineSnapshot {
        components: datapath
            .components()
            .map(|view| ComponentState {
                name: view.name.to_string(),
                value: view.value,
                lines: signal_names(view.lines.iter()),
                active: signal_names(view.active.iter()),
            })
            .collect(),
        bus: datapath.bus(),
        flags: datapath.flags(),
        ticks: machine.ticks(),
        running: machine.clock().is_active(),
    }
}

fn edit_cell(machine: &mut Machine, address: usize, text: &str) -> Option<Word> {
    let arch = machine.architecture();
    let value = parse_cell_value(text, arch.isa(), arch.config().word_size)?;
    machine
        .datapath_mut()
        .write_memory(address, value)
        .ok()
        .map(|()| value)
}

#[wasm_bindgen]
pub struct WasmMachine {
    machine: Machine,
    debug: DebugDatabase,
    console: SharedConsole,
}

#[wasm_bindgen]
impl WasmMachine {
    /// Creates a machine on the standard architecture with the page console
    /// bound to port 0.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<Self, JsError> {
        console_error_panic_hook::set_once();
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(log::LevelFilter::Info);
        }

        let mut machine = Machine::new(Architecture::standard()?);
        let sink: fn(&str) = console_line;
        let console: SharedConsole = Rc::new(RefCell::new(ConsolePort::new(sink)));
        machine.register_port(0, Box::new(Rc::clone(&console)));
        Ok(Self {
            machine,
            debug: DebugDatabase::default(),
            console,
        })
    }

    /// Assembles `source` into memory and returns the debug database.
    pub fn compile(&mut self, source: &str, strict: bool) -> Result<JsValue, JsError> {
        let debug = compile(&mut self.machine, source, &AssembleOptions { strict })?;
        log::info!(
            "compiled {} labels, code ends at {}",
            debug.points.len(),
            debug.code_end
        );
        self.debug = debug;
        Ok(serde_wasm_bindgen::to_value(&self.debug)?)
    }

    /// Feeds `dt` time units into the clock. Returns true if any tick ran.
    pub fn advance(&mut self, dt: f64) -> bool {
        self.machine.advance(dt)
    }

    /// Runs one microcycle regardless of the clock.
    pub fn tick(&mut self) -> bool {
        self.machine.tick().halted
    }

    pub fn start(&mut self) {
        self.machine.start();
    }

    pub fn stop(&mut self) {
        self.machine.stop();
    }

    /// Zeroes registers and stops the clock; memory is kept.
    pub fn reset(&mut self) {
        self.machine.reset();
    }

    pub fn is_running(&self) -> bool {
        self.machine.clock().is_active()
    }

    /// Queues text for the program to read from port 0.
    pub fn push_input(&mut self, text: &str) {
        let mut console = self.console.borrow_mut();
        let word_size = self.machine.architecture().config().word_size;
        console
            .input
            .extend(text.chars().map(|c| char_word(c, word_size)));
    }

    /// Returns components, bus, flags and clock state as a JSON object.
    pub fn get_state(&self) -> Result<JsValue, JsError> {
        Ok(serde_wasm_bindgen::to_value(&snapshot(&self.machine))?)
    }

    /// Returns a copy of memory.
    pub fn get_memory(&self) -> js_sys::Uint16Array {
        js_sys::Uint16Array::from(self.machine.datapath().memory())
    }

    /// Returns the annotated memory listing.
    pub fn disassemble(&self) -> Result<JsValue, JsError> {
        let rows = disassemble(
            self.machine.datapath().memory(),
            self.machine.architecture().isa(),
            Some(&self.debug),
        );
        Ok(serde_wasm_bindgen::to_value(&rows)?)
    }

    /// Writes a mnemonic, `'c` character or number into one memory cell.
    /// Returns false when the text is not a valid cell value or the address
    /// is outside memory.
    pub fn set_memory_cell(&mut self, address: usize, text: &str) -> bool {
        edit_cell(&mut self.machine, address, text).is_some()
    }
}
