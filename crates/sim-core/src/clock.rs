//! Pulse distribution: a single clock drives every registered
//! component once per tick, in registration order.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Contract for hardware that acts on a clock pulse.
pub trait PulseListener {
    /// Called once per tick, in registration order.
    fn pulse(&mut self);
}

/// Cloneable run/halt flag shared by the clock, the CPU's halt opcode,
/// and the keyboard's control byte.
///
/// Handed out at construction; there is no process-wide status.
/// Halting is permanent: the clock never resumes after the flag
/// clears.
#[derive(Debug, Clone)]
pub struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    /// Creates a flag in the running state.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Clears the flag, requesting an orderly shutdown.
    pub fn halt(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Returns `true` while no halt has been requested.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to a listener in the clock registry.
pub type SharedListener = Rc<RefCell<dyn PulseListener>>;

/// Process-wide pulse source.
///
/// Listener registration order is significant: it is the intra-tick
/// execution order, and the CPU must be registered before memory so a
/// register write flagged during the CPU's stage is committed by the
/// memory pulse of the same tick. A listener that panics unwinds
/// through the pulse loop; there is no per-listener fault isolation.
pub struct Clock {
    listeners: Vec<SharedListener>,
    interval: Duration,
    run: RunFlag,
    ticks: u64,
}

impl Clock {
    /// Creates a clock with a fixed inter-tick interval.
    #[must_use]
    pub const fn new(interval: Duration, run: RunFlag) -> Self {
        Self {
            listeners: Vec::new(),
            interval,
            run,
            ticks: 0,
        }
    }

    /// Appends a listener to the registry. No de-duplication, no removal.
    pub fn register_listener(&mut self, listener: SharedListener) {
        self.listeners.push(listener);
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Returns the number of completed ticks.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Runs one tick: every listener is pulsed in registration order.
    pub fn pulse_all(&mut self) {
        for listener in &self.listeners {
            listener.borrow_mut().pulse();
        }
        self.ticks += 1;
    }

    /// Pulses on the configured interval until the run flag clears.
    ///
    /// The flag is checked after each tick; once it is observed clear
    /// no further pulse is delivered to any listener.
    pub fn start_pulse(&mut self) {
        while self.run.is_running() {
            self.pulse_all();
            if !self.run.is_running() {
                break;
            }
            spin_sleep::sleep(self.interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, PulseListener, RunFlag};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    struct OrderProbe {
        tag: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl PulseListener for OrderProbe {
        fn pulse(&mut self) {
            self.log.borrow_mut().push(self.tag);
        }
    }

    struct HaltAfter {
        remaining: u32,
        run: RunFlag,
        pulses: Rc<RefCell<u32>>,
    }

    impl PulseListener for HaltAfter {
        fn pulse(&mut self) {
            *self.pulses.borrow_mut() += 1;
            if self.remaining == 0 {
                self.run.halt();
            } else {
                self.remaining -= 1;
            }
        }
    }

    #[test]
    fn run_flag_defaults_to_running_and_halts_permanently() {
        let flag = RunFlag::new();
        assert!(flag.is_running());

        let alias = flag.clone();
        alias.halt();
        assert!(!flag.is_running());
    }

    #[test]
    fn listeners_are_pulsed_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let run = RunFlag::new();
        let mut clock = Clock::new(Duration::ZERO, run);

        clock.register_listener(Rc::new(RefCell::new(OrderProbe {
            tag: "cpu",
            log: Rc::clone(&log),
        })));
        clock.register_listener(Rc::new(RefCell::new(OrderProbe {
            tag: "ram",
            log: Rc::clone(&log),
        })));

        clock.pulse_all();
        clock.pulse_all();

        assert_eq!(*log.borrow(), vec!["cpu", "ram", "cpu", "ram"]);
        assert_eq!(clock.ticks(), 2);
    }

    #[test]
    fn clock_stops_once_run_flag_clears_and_never_pulses_again() {
        let run = RunFlag::new();
        let pulses = Rc::new(RefCell::new(0));
        let mut clock = Clock::new(Duration::ZERO, run.clone());
        clock.register_listener(Rc::new(RefCell::new(HaltAfter {
            remaining: 2,
            run,
            pulses: Rc::clone(&pulses),
        })));

        clock.start_pulse();

        // Ticks 1 and 2 decrement, tick 3 halts; no tick 4 is delivered.
        assert_eq!(*pulses.borrow(), 3);
        assert_eq!(clock.ticks(), 3);
    }

    #[test]
    fn halted_clock_ignores_start_pulse() {
        let run = RunFlag::new();
        run.halt();
        let pulses = Rc::new(RefCell::new(0));
        let mut clock = Clock::new(Duration::ZERO, run.clone());
        clock.register_listener(Rc::new(RefCell::new(HaltAfter {
            remaining: 0,
            run,
            pulses: Rc::clone(&pulses),
        })));

        clock.start_pulse();
        assert_eq!(*pulses.borrow(), 0);
    }
}
