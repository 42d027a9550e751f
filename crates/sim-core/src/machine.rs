//! Top-level machine harness: constructs and wires every component.
//!
//! Registration order on the clock is the load-bearing detail here:
//! the CPU pulses before memory, so a write flagged during a CPU stage
//! is physically committed by the memory pulse of the same tick.

use std::cell::{Ref, RefCell, RefMut};
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

use crate::clock::{Clock, RunFlag, SharedListener};
use crate::cpu::Cpu;
use crate::interrupts::{shared_interrupts, SharedInterrupts};
use crate::keyboard::KeyboardDevice;
use crate::memory::Memory;
use crate::mmu::Mmu;
use crate::trace::{StderrTrace, TraceSink};

/// Default inter-tick interval for interactive runs.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Construction-time knobs for a [`Machine`].
#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// Wall-clock delay between ticks when free-running.
    pub tick_interval: Duration,
    /// Emit the per-tick register report to stderr.
    pub trace_ticks: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            trace_ticks: false,
        }
    }
}

impl MachineConfig {
    /// Config suited to tests: no inter-tick delay, no tracing.
    #[must_use]
    pub const fn instant() -> Self {
        Self {
            tick_interval: Duration::ZERO,
            trace_ticks: false,
        }
    }
}

/// A fully wired machine: clock, CPU, mediation unit, memory,
/// interrupt controller, and keyboard.
pub struct Machine {
    clock: Clock,
    cpu: Rc<RefCell<Cpu>>,
    memory: Rc<RefCell<Memory>>,
    interrupts: SharedInterrupts,
    keyboard: KeyboardDevice,
    run: RunFlag,
}

impl Machine {
    /// Builds and wires a machine from the given configuration.
    #[must_use]
    pub fn new(config: &MachineConfig) -> Self {
        let run = RunFlag::new();
        let memory = Rc::new(RefCell::new(Memory::new()));
        let interrupts = shared_interrupts();
        let keyboard = KeyboardDevice::new(interrupts.clone(), run.clone());

        let mut cpu = Cpu::new(
            Mmu::new(Rc::clone(&memory)),
            interrupts.clone(),
            run.clone(),
        );
        if config.trace_ticks {
            cpu.set_trace_sink(Box::new(StderrTrace));
            cpu.set_tick_trace(true);
        }
        let cpu = Rc::new(RefCell::new(cpu));

        let mut clock = Clock::new(config.tick_interval, run.clone());
        clock.register_listener(Rc::clone(&cpu) as SharedListener);
        clock.register_listener(Rc::clone(&memory) as SharedListener);

        Self {
            clock,
            cpu,
            memory,
            interrupts,
            keyboard,
            run,
        }
    }

    /// Writes a program image into memory starting at `start`.
    pub fn flash(&mut self, start: u16, program: &[u8]) {
        self.cpu.borrow_mut().flash(start, program);
    }

    /// Runs exactly one tick.
    pub fn tick(&mut self) {
        self.clock.pulse_all();
    }

    /// Pulses on the configured interval until the run flag clears.
    pub fn run(&mut self) {
        self.clock.start_pulse();
    }

    /// Ticks until the run flag clears or `limit` ticks elapse, with no
    /// inter-tick delay. Returns the ticks consumed.
    pub fn run_until_halt(&mut self, limit: u64) -> u64 {
        let mut consumed = 0;
        while self.run.is_running() && consumed < limit {
            self.tick();
            consumed += 1;
        }
        consumed
    }

    /// Returns a keyboard handle for feeding input events.
    #[must_use]
    pub fn keyboard(&self) -> KeyboardDevice {
        self.keyboard.clone()
    }

    /// Returns the shared run flag.
    #[must_use]
    pub fn run_flag(&self) -> RunFlag {
        self.run.clone()
    }

    /// Returns the shared interrupt-controller handle.
    #[must_use]
    pub fn interrupts(&self) -> SharedInterrupts {
        self.interrupts.clone()
    }

    /// Borrows the CPU for register inspection.
    ///
    /// # Panics
    ///
    /// Panics if called while a tick is in flight.
    #[must_use]
    pub fn cpu(&self) -> Ref<'_, Cpu> {
        self.cpu.borrow()
    }

    /// Mutably borrows the CPU, e.g. to inject a trace or output sink.
    ///
    /// # Panics
    ///
    /// Panics if called while a tick is in flight.
    #[must_use]
    pub fn cpu_mut(&self) -> RefMut<'_, Cpu> {
        self.cpu.borrow_mut()
    }

    /// Redirects program output away from stdout.
    pub fn set_output(&self, output: Box<dyn Write>) {
        self.cpu.borrow_mut().set_output(output);
    }

    /// Replaces the CPU's trace sink.
    pub fn set_trace_sink(&self, sink: Box<dyn TraceSink>) {
        self.cpu.borrow_mut().set_trace_sink(sink);
    }

    /// Reads one memory cell directly. Inspection only; moves the MAR.
    #[must_use]
    pub fn read_byte(&self, address: u16) -> u8 {
        let mut memory = self.memory.borrow_mut();
        memory.set_mar(address);
        memory.read()
    }

    /// Produces a memory listing for the half-open range `[from, to)`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::fault::Fault::AddressOutOfRange`] on a bound
    /// outside the addressable space or an inverted range.
    pub fn dump_memory(&self, from: u32, to: u32) -> Result<Vec<String>, crate::fault::Fault> {
        self.memory.borrow().dump(from, to)
    }

    /// Completed clock ticks.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.clock.ticks()
    }
}
