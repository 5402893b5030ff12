//! Host-supplied I/O ports addressed by the `io_target` register.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use crate::Word;

/// A device bound to one I/O port number.
///
/// Values crossing the port are raw words; the datapath reduces reads into
/// `[0, W)` before they reach the bus.
pub trait IoPort {
    /// Produces the next input word (the `io out` line).
    fn read(&mut self) -> Word;

    /// Consumes one output word (the `io in` line).
    fn write(&mut self, value: Word);
}

impl<T: IoPort + ?Sized> IoPort for Rc<RefCell<T>> {
    fn read(&mut self) -> Word {
        self.borrow_mut().read()
    }

    fn write(&mut self, value: Word) {
        self.borrow_mut().write(value);
    }
}

impl<T: IoPort + ?Sized> IoPort for Box<T> {
    fn read(&mut self) -> Word {
        (**self).read()
    }

    fn write(&mut self, value: Word) {
        (**self).write(value);
    }
}

/// In-memory port: reads drain a queue, writes append to a log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferPort {
    /// Words returned by successive reads; an empty queue reads 0.
    pub input: VecDeque<Word>,
    /// Every word written so far.
    pub output: Vec<Word>,
}

impl BufferPort {
    /// Creates a port with the given pending input.
    #[must_use]
    pub fn with_input(input: impl IntoIterator<Item = Word>) -> Self {
        Self {
            input: input.into_iter().collect(),
            output: Vec::new(),
        }
    }

    /// Output interpreted as text, one character per word.
    #[must_use]
    pub fn output_text(&self) -> String {
        self.output
            .iter()
            .map(|&word| char::from_u32(u32::from(word)).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }
}

impl IoPort for BufferPort {
    fn read(&mut self) -> Word {
        self.input.pop_front().unwrap_or(0)
    }

    fn write(&mut self, value: Word) {
        self.output.push(value);
    }
}

/// Port number to device map owned by one datapath.
#[derive(Default)]
pub struct IoRegistry {
    ports: BTreeMap<Word, Box<dyn IoPort>>,
}

impl IoRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `port`, returning the device previously bound there.
    pub fn register(&mut self, port: Word, device: Box<dyn IoPort>) -> Option<Box<dyn IoPort>> {
        log::debug!("binding I/O port {port}");
        self.ports.insert(port, device)
    }

    /// Unbinds `port`, returning its device.
    pub fn unregister(&mut self, port: Word) -> Option<Box<dyn IoPort>> {
        self.ports.remove(&port)
    }

    /// Returns `true` when a device is bound to `port`.
    #[must_use]
    pub fn is_bound(&self, port: Word) -> bool {
        self.ports.contains_key(&port)
    }

    /// Reads from `port`; unbound ports read 0.
    pub fn read(&mut self, port: Word) -> Word {
        self.ports.get_mut(&port).map_or(0, |device| device.read())
    }

    /// Writes to `port`; writes to unbound ports are dropped.
    pub fn write(&mut self, port: Word, value: Word) {
        if let Some(device) = self.ports.get_mut(&port) {
            device.write(value);
        } else {
            log::trace!("dropped write of {value} to unbound port {port}");
        }
    }
}

impl fmt::Debug for IoRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoRegistry")
            .field("ports", &self.ports.keys().collect::<Vec<_>>())
            .finish()
    }
}
