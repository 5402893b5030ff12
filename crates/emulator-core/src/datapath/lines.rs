//! Control lines carried by datapath components.

use std::fmt;
use std::ops::BitOr;

/// One of the four boolean control lines a component may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Signal {
    /// Latch the bus into the component (phase B).
    In,
    /// Drive the component value onto the bus (phase A).
    Out,
    /// Increment the stored value (phase A, before `Out`).
    Incr,
    /// Clear the stored value (phase C).
    Reset,
}

impl Signal {
    /// All lines in canonical order.
    pub const ALL: [Self; 4] = [Self::In, Self::Out, Self::Incr, Self::Reset];

    /// Returns the line name used by textual signal requests.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
            Self::Incr => "incr",
            Self::Reset => "reset",
        }
    }

    /// Parses a line name (`in`, `out`, `incr`, `reset`).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|signal| signal.name().eq_ignore_ascii_case(name))
    }

    const fn bit(self) -> u8 {
        match self {
            Self::In => 1 << 0,
            Self::Out => 1 << 1,
            Self::Incr => 1 << 2,
            Self::Reset => 1 << 3,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compact set of control lines, used both for the lines a component
/// supports and for the lines asserted during the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct LineSet(u8);

impl LineSet {
    /// No lines.
    pub const EMPTY: Self = Self(0);
    /// Only `in`.
    pub const IN: Self = Self(Signal::In.bit());
    /// Only `out`.
    pub const OUT: Self = Self(Signal::Out.bit());
    /// Only `incr`.
    pub const INCR: Self = Self(Signal::Incr.bit());
    /// Only `reset`.
    pub const RESET: Self = Self(Signal::Reset.bit());
    /// `in` and `out`.
    pub const IN_OUT: Self = Self(Self::IN.0 | Self::OUT.0);
    /// All four lines.
    pub const ALL: Self = Self(Self::IN.0 | Self::OUT.0 | Self::INCR.0 | Self::RESET.0);

    /// Returns `true` when `signal` is a member.
    #[must_use]
    pub const fn contains(self, signal: Signal) -> bool {
        (self.0 & signal.bit()) != 0
    }

    /// Returns a copy with `signal` added.
    #[must_use]
    pub const fn with(self, signal: Signal) -> Self {
        Self(self.0 | signal.bit())
    }

    /// Returns `true` when no line is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Set union.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Iterates the members in canonical order.
    pub fn iter(self) -> impl Iterator<Item = Signal> {
        Signal::ALL
            .into_iter()
            .filter(move |signal| self.contains(*signal))
    }
}

impl BitOr for LineSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl FromIterator<Signal> for LineSet {
    fn from_iter<I: IntoIterator<Item = Signal>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

impl fmt::Display for LineSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Signal::name).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}
