//! Converts host time into discrete ticks.

/// Catch-up clock driven by [`Clock::advance`].
#[derive(Debug, Clone, PartialEq)]
pub struct Clock {
    period: f64,
    active: bool,
    countdown: f64,
}

impl Clock {
    /// Creates an inactive clock.
    #[must_use]
    pub const fn new(period: f64) -> Self {
        Self {
            period,
            active: false,
            countdown: period,
        }
    }

    /// Tick period in host time units.
    #[must_use]
    pub const fn period(&self) -> f64 {
        self.period
    }

    /// Returns `true` while the clock is running.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Starts the clock.
    pub fn start(&mut self) {
        self.active = true;
    }

    /// Stops the clock; pending time is kept.
    pub fn stop(&mut self) {
        self.active = false;
    }

    /// Consumes `dt` time units, calling `tick` once per elapsed period.
    ///
    /// `tick` returns `true` when the machine halted, which stops the clock
    /// before the next tick. Returns whether at least one tick ran.
    pub fn advance(&mut self, dt: f64, mut tick: impl FnMut() -> bool) -> bool {
        if !self.active {
            return false;
        }
        self.countdown = self.countdown.min(self.period) - dt;

        let mut ticked = false;
        while self.countdown < 0.0 && self.active {
            self.countdown += self.period;
            ticked = true;
            if tick() {
                self.active = false;
            }
        }
        ticked
    }
}
