//! Declarative component list and its resolved, index-based form.

use std::collections::HashMap;

use crate::datapath::lines::{LineSet, Signal};
use crate::ConfigError;

/// What a component does when its lines fire.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ComponentKind {
    /// Plain storage: `out` drives the value, `in` latches the bus.
    Register,
    /// Main memory cell selected by the named address register.
    Memory {
        /// Register holding the address.
        address: String,
    },
    /// I/O cell selected by the named port register.
    Io {
        /// Register holding the port number.
        target: String,
    },
    /// Combinational `lhs + rhs`, updating the flags when read.
    Adder {
        /// Left operand register.
        lhs: String,
        /// Right operand register.
        rhs: String,
    },
    /// Combinational `lhs - rhs`, updating the flags when read.
    Subtractor {
        /// Left operand register.
        lhs: String,
        /// Right operand register.
        rhs: String,
    },
}

/// Storage width of a logical register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Width {
    /// One word.
    #[default]
    Narrow,
    /// Two words, `name_l` and `name_h`, read as `low + high * W`.
    Wide,
}

/// One entry of a declarative component list.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ComponentSpec {
    /// Component name; wide registers use it as the base name.
    pub name: String,
    /// Behavior on `in`/`out`.
    pub kind: ComponentKind,
    /// Supported control lines.
    pub lines: LineSet,
    /// Register width.
    pub width: Width,
}

impl ComponentSpec {
    /// A narrow register supporting `lines`.
    #[must_use]
    pub fn register(name: &str, lines: LineSet) -> Self {
        Self {
            name: name.to_string(),
            kind: ComponentKind::Register,
            lines,
            width: Width::Narrow,
        }
    }

    /// The memory cell addressed by `address`.
    #[must_use]
    pub fn memory(name: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ComponentKind::Memory {
                address: address.to_string(),
            },
            lines: LineSet::IN_OUT,
            width: Width::Narrow,
        }
    }

    /// The I/O cell addressed by `target`.
    #[must_use]
    pub fn io(name: &str, target: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ComponentKind::Io {
                target: target.to_string(),
            },
            lines: LineSet::IN_OUT,
            width: Width::Narrow,
        }
    }

    /// The adder over `lhs` and `rhs`.
    #[must_use]
    pub fn adder(name: &str, lhs: &str, rhs: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ComponentKind::Adder {
                lhs: lhs.to_string(),
                rhs: rhs.to_string(),
            },
            lines: LineSet::OUT,
            width: Width::Narrow,
        }
    }

    /// The subtractor over `lhs` and `rhs`.
    #[must_use]
    pub fn subtractor(name: &str, lhs: &str, rhs: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ComponentKind::Subtractor {
                lhs: lhs.to_string(),
                rhs: rhs.to_string(),
            },
            lines: LineSet::OUT,
            width: Width::Narrow,
        }
    }

    /// Marks the register as two words wide.
    #[must_use]
    pub fn wide(mut self) -> Self {
        self.width = Width::Wide;
        self
    }
}

/// Component list of the standard machine, in phase iteration order.
#[must_use]
pub fn standard_components() -> Vec<ComponentSpec> {
    let storage = LineSet::IN_OUT.with(Signal::Reset);
    vec![
        ComponentSpec::register("instruction", LineSet::IN_OUT),
        ComponentSpec::register("tick", LineSet::IN.with(Signal::Incr).with(Signal::Reset)),
        ComponentSpec::register("pc", LineSet::ALL),
        ComponentSpec::register("address", LineSet::IN_OUT),
        ComponentSpec::register("a", storage),
        ComponentSpec::register("b", storage),
        ComponentSpec::register("x", storage),
        ComponentSpec::register("y", storage),
        ComponentSpec::register("stack_ptr", storage),
        ComponentSpec::register("io_target", LineSet::IN_OUT),
        ComponentSpec::memory("memory", "address"),
        ComponentSpec::io("io", "io_target"),
        ComponentSpec::adder("sum", "a", "b"),
        ComponentSpec::subtractor("sub", "a", "b"),
    ]
}

/// Index of a single-word component in phase iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) usize);

impl ComponentId {
    /// Position in iteration order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// How a name maps onto stored words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// One component.
    Narrow(ComponentId),
    /// Two components combined as `low + high * W`.
    Wide {
        /// Low half (`name_l`).
        low: ComponentId,
        /// High half (`name_h`).
        high: ComponentId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behavior {
    Register,
    Memory { address: Binding },
    Io { target: Binding },
    Adder { lhs: ComponentId, rhs: ComponentId },
    Subtractor { lhs: ComponentId, rhs: ComponentId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Slot {
    pub(crate) name: String,
    pub(crate) behavior: Behavior,
    pub(crate) lines: LineSet,
    pub(crate) carry_into: Option<ComponentId>,
}

/// Resolved component table shared by every datapath of an architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    slots: Vec<Slot>,
    names: HashMap<String, Binding>,
}

impl Schema {
    /// Resolves a declarative component list.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateComponent`] when two names collide
    /// (including generated `_l`/`_h` names), [`ConfigError::UnknownComponent`]
    /// when a virtual component refers to a missing register, and
    /// [`ConfigError::UnsupportedSignal`] when a virtual or wide component
    /// declares a line it cannot honor.
    pub fn build(specs: &[ComponentSpec]) -> Result<Self, ConfigError> {
        let mut slots = Vec::new();
        let mut names = HashMap::new();

        for spec in specs {
            match spec.width {
                Width::Narrow => {
                    let id = ComponentId(slots.len());
                    insert_name(&mut names, &spec.name, Binding::Narrow(id))?;
                    slots.push(Slot {
                        name: spec.name.clone(),
                        behavior: Behavior::Register,
                        lines: spec.lines,
                        carry_into: None,
                    });
                }
                Width::Wide => {
                    if spec.kind != ComponentKind::Register {
                        return Err(ConfigError::UnsupportedSignal {
                            component: spec.name.clone(),
                            signal: "wide".to_string(),
                        });
                    }
                    let low = ComponentId(slots.len());
                    let high = ComponentId(slots.len() + 1);
                    let low_name = format!("{}_l", spec.name);
                    let high_name = format!("{}_h", spec.name);
                    insert_name(&mut names, &spec.name, Binding::Wide { low, high })?;
                    insert_name(&mut names, &low_name, Binding::Narrow(low))?;
                    insert_name(&mut names, &high_name, Binding::Narrow(high))?;
                    slots.push(Slot {
                        name: low_name,
                        behavior: Behavior::Register,
                        lines: spec.lines,
                        carry_into: Some(high),
                    });
                    slots.push(Slot {
                        name: high_name,
                        behavior: Behavior::Register,
                        lines: spec.lines,
                        carry_into: None,
                    });
                }
            }
        }

        // Virtual components may refer to registers declared after them.
        let mut slot_index = 0;
        for spec in specs {
            if spec.width == Width::Wide {
                slot_index += 2;
                continue;
            }
            let allowed = match spec.kind {
                ComponentKind::Register => LineSet::ALL,
                ComponentKind::Memory { .. } | ComponentKind::Io { .. } => LineSet::IN_OUT,
                ComponentKind::Adder { .. } | ComponentKind::Subtractor { .. } => LineSet::OUT,
            };
            if let Some(signal) = spec.lines.iter().find(|signal| !allowed.contains(*signal)) {
                return Err(ConfigError::UnsupportedSignal {
                    component: spec.name.clone(),
                    signal: signal.name().to_string(),
                });
            }
            let behavior = match &spec.kind {
                ComponentKind::Register => Behavior::Register,
                ComponentKind::Memory { address } => Behavior::Memory {
                    address: lookup(&names, address)?,
                },
                ComponentKind::Io { target } => Behavior::Io {
                    target: lookup(&names, target)?,
                },
                ComponentKind::Adder { lhs, rhs } => Behavior::Adder {
                    lhs: lookup_narrow(&names, lhs)?,
                    rhs: lookup_narrow(&names, rhs)?,
                },
                ComponentKind::Subtractor { lhs, rhs } => Behavior::Subtractor {
                    lhs: lookup_narrow(&names, lhs)?,
                    rhs: lookup_narrow(&names, rhs)?,
                },
            };
            slots[slot_index].behavior = behavior;
            slot_index += 1;
        }

        Ok(Self { slots, names })
    }

    /// Resolves [`standard_components`].
    ///
    /// # Errors
    ///
    /// Propagates [`Schema::build`] errors; the standard list has none.
    pub fn standard() -> Result<Self, ConfigError> {
        Self::build(&standard_components())
    }

    /// Looks up a component or wide register name.
    #[must_use]
    pub fn binding(&self, name: &str) -> Option<Binding> {
        self.names.get(name).copied()
    }

    /// Looks up a single-word component.
    #[must_use]
    pub fn component_id(&self, name: &str) -> Option<ComponentId> {
        match self.binding(name)? {
            Binding::Narrow(id) => Some(id),
            Binding::Wide { .. } => None,
        }
    }

    /// Supported lines of a component.
    #[must_use]
    pub fn lines(&self, id: ComponentId) -> LineSet {
        self.slots[id.0].lines
    }

    /// Name of a component.
    #[must_use]
    pub fn name(&self, id: ComponentId) -> &str {
        &self.slots[id.0].name
    }

    /// Number of single-word components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` for an empty schema.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Component ids in iteration order.
    pub fn ids(&self) -> impl Iterator<Item = ComponentId> {
        (0..self.slots.len()).map(ComponentId)
    }

    pub(crate) fn slot(&self, id: ComponentId) -> &Slot {
        &self.slots[id.0]
    }
}

fn insert_name(
    names: &mut HashMap<String, Binding>,
    name: &str,
    binding: Binding,
) -> Result<(), ConfigError> {
    if name == "_" || names.insert(name.to_string(), binding).is_some() {
        return Err(ConfigError::DuplicateComponent(name.to_string()));
    }
    Ok(())
}

fn lookup(names: &HashMap<String, Binding>, name: &str) -> Result<Binding, ConfigError> {
    names
        .get(name)
        .copied()
        .ok_or_else(|| ConfigError::UnknownComponent(name.to_string()))
}

fn lookup_narrow(names: &HashMap<String, Binding>, name: &str) -> Result<ComponentId, ConfigError> {
    match lookup(names, name)? {
        Binding::Narrow(id) => Ok(id),
        Binding::Wide { .. } => Err(ConfigError::UnknownComponent(name.to_string())),
    }
}
