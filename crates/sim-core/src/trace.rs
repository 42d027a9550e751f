//! Trace surface for per-tick diagnostics and fault reporting.
//!
//! The CPU emits [`TraceEvent`] values through a [`TraceSink`] at stage
//! boundaries. Tick reports are gated by a debug flag and suppressed
//! while the print-string syscall is streaming; fault, interrupt, and
//! halt reports are always emitted.

use crate::cpu::Stage;
use crate::fault::Fault;

/// Formats a byte register as fixed-width uppercase hex (`0x0A`).
#[must_use]
pub fn hex_byte(value: u8) -> String {
    format!("0x{value:02X}")
}

/// Formats a word register as fixed-width uppercase hex (`0x001A`).
#[must_use]
pub fn hex_word(value: u16) -> String {
    format!("0x{value:04X}")
}

/// A single observable emitted by the machine at a stage boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TraceEvent {
    /// Per-tick register report, emitted before the stage runs.
    Tick {
        /// Ticks observed by the CPU so far, this one included.
        tick: u64,
        /// Accumulator value.
        acc: u8,
        /// Index-X value.
        x: u8,
        /// Index-Y value.
        y: u8,
        /// Zero flag.
        z: bool,
        /// Program counter.
        pc: u16,
        /// Instruction register.
        ir: u8,
        /// Stage about to execute.
        stage: Stage,
    },
    /// A contained pipeline or memory fault.
    Fault {
        /// Program counter when the fault was observed.
        pc: u16,
        /// The fault itself.
        fault: Fault,
    },
    /// The interrupt-check stage consumed a pending interrupt.
    InterruptServiced {
        /// Name of the originating device.
        device: String,
        /// IRQ number of the originating device.
        irq: u8,
        /// First buffered output item.
        payload: u8,
    },
    /// The halt opcode cleared the run flag.
    Halted {
        /// Tick on which the halt retired.
        tick: u64,
    },
}

/// Sink trait for trace hooks, in emission order.
pub trait TraceSink {
    /// Records an event.
    fn on_event(&mut self, event: &TraceEvent);
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTrace;

impl TraceSink for NullTrace {
    fn on_event(&mut self, _event: &TraceEvent) {}
}

/// Sink that writes human-readable lines to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrTrace;

impl TraceSink for StderrTrace {
    fn on_event(&mut self, event: &TraceEvent) {
        match event {
            TraceEvent::Tick {
                tick,
                acc,
                x,
                y,
                z,
                pc,
                ir,
                stage,
            } => {
                eprintln!(
                    "[CPU] tick: {tick} | Acc: {} | X: {} | Y: {} | Z: {} | PC: {} | IR: {} | step: {}",
                    hex_byte(*acc),
                    hex_byte(*x),
                    hex_byte(*y),
                    u8::from(*z),
                    hex_word(*pc),
                    hex_byte(*ir),
                    stage.name(),
                );
            }
            TraceEvent::Fault { pc, fault } => {
                eprintln!("[CPU] fault at PC {}: {fault}", hex_word(*pc));
            }
            TraceEvent::InterruptServiced {
                device,
                irq,
                payload,
            } => {
                eprintln!(
                    "[IRC] serviced irq {irq} from {device}: {}",
                    hex_byte(*payload)
                );
            }
            TraceEvent::Halted { tick } => {
                eprintln!("[CPU] program complete on tick {tick} - clock pulse stopped");
            }
        }
    }
}
