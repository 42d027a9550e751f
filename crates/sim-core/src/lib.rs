//! Cycle-driven core for a simplified 6502-class machine.

/// Pulse distribution, listener contract, and the shared run flag.
pub mod clock;
pub use clock::{Clock, PulseListener, RunFlag, SharedListener};

/// Flat byte-addressable memory with flag-driven deferred access.
pub mod memory;
pub use memory::{Memory, ADDRESS_SPACE_BYTES};

/// Memory-mediation unit with little-endian address assembly.
pub mod mmu;
pub use mmu::Mmu;

/// Deterministic opcode classification and operand-count table.
pub mod opcodes;
pub use opcodes::{classify_opcode, operand_count, Opcode, OPCODE_TABLE};

/// Instruction pipeline and architectural registers.
pub mod cpu;
pub use cpu::{twos_complement, Cpu, Stage};

/// Interrupt record and priority-ordered controller queue.
pub mod interrupts;
pub use interrupts::{
    lock_interrupts, shared_interrupts, Interrupt, InterruptController, SharedInterrupts,
};

/// Asynchronous keyboard device.
pub mod keyboard;
pub use keyboard::{KeyboardDevice, END_OF_TEXT, KEYBOARD_IRQ, KEYBOARD_NAME, KEYBOARD_PRIORITY};

/// Printable-glyph and control-name tables for the 7-bit code space.
pub mod ascii;
pub use ascii::{code_to_glyph, glyph_to_code};

/// Fault taxonomy for contained pipeline and memory faults.
pub mod fault;
pub use fault::{Fault, FaultClass};

/// Trace events and sinks for per-tick diagnostics.
pub mod trace;
pub use trace::{hex_byte, hex_word, NullTrace, StderrTrace, TraceEvent, TraceSink};

/// Top-level machine harness wiring every component to one clock.
pub mod machine;
pub use machine::{Machine, MachineConfig, DEFAULT_TICK_INTERVAL};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
