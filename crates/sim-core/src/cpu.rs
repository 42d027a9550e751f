//! Central processing unit: the per-tick instruction pipeline.
//!
//! Exactly one pipeline stage runs per clock pulse. The stages are
//! fetch, up to two decode sub-steps, up to two execute sub-steps, an
//! optional write-back, and an interrupt check, after which the cycle
//! restarts at fetch. All memory traffic goes through the mediation
//! unit; writes issued by an execute or write-back stage are flagged
//! and physically committed by the memory's own pulse later in the
//! same tick.

#![allow(clippy::missing_const_for_fn)]

use std::io::{self, Write};

use crate::ascii;
use crate::clock::{PulseListener, RunFlag};
use crate::fault::Fault;
use crate::interrupts::{lock_interrupts, SharedInterrupts};
use crate::mmu::Mmu;
use crate::opcodes::{classify_opcode, operand_count, Opcode};
use crate::trace::{NullTrace, TraceEvent, TraceSink};

/// Discrete pipeline stages, advanced at most once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Stage {
    /// Load the next opcode byte into the instruction register.
    #[default]
    Fetch,
    /// First decode sub-step.
    Decode1,
    /// Second decode sub-step (two-operand instructions only).
    Decode2,
    /// First execute sub-step.
    Execute1,
    /// Second execute sub-step (increment only).
    Execute2,
    /// Flag the accumulator for a deferred memory write.
    WriteBack,
    /// Service the highest-priority pending interrupt.
    InterruptCheck,
}

impl Stage {
    /// Short stage name for trace lines.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Decode1 => "decode1",
            Self::Decode2 => "decode2",
            Self::Execute1 => "execute1",
            Self::Execute2 => "execute2",
            Self::WriteBack => "writeBack",
            Self::InterruptCheck => "interruptCheck",
        }
    }
}

/// Decodes an 8-bit two's-complement magnitude: invert all bits, add 1.
///
/// Used by the relative branch to walk the program counter backward.
#[must_use]
pub const fn twos_complement(value: u8) -> u8 {
    (!value).wrapping_add(1)
}

/// The pipeline state machine with its architectural registers.
pub struct Cpu {
    mmu: Mmu,
    interrupts: SharedInterrupts,
    run: RunFlag,
    trace: Box<dyn TraceSink>,
    output: Box<dyn Write>,
    trace_ticks: bool,
    streaming: bool,
    tick_count: u64,
    acc: u8,
    x: u8,
    y: u8,
    z: bool,
    pc: u16,
    ir: u8,
    stage: Stage,
}

impl Cpu {
    /// Creates a CPU wired to its mediation unit, interrupt controller,
    /// and run flag. Tracing starts disabled; program output goes to
    /// stdout until a sink is injected.
    #[must_use]
    pub fn new(mmu: Mmu, interrupts: SharedInterrupts, run: RunFlag) -> Self {
        Self {
            mmu,
            interrupts,
            run,
            trace: Box::new(NullTrace),
            output: Box::new(io::stdout()),
            trace_ticks: false,
            streaming: false,
            tick_count: 0,
            acc: 0x00,
            x: 0x00,
            y: 0x00,
            z: false,
            pc: 0x0000,
            ir: 0x00,
            stage: Stage::Fetch,
        }
    }

    /// Replaces the trace sink.
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.trace = sink;
    }

    /// Enables or disables the per-tick register report.
    pub fn set_tick_trace(&mut self, enabled: bool) {
        self.trace_ticks = enabled;
    }

    /// Replaces the program-output sink (stdout by default).
    pub fn set_output(&mut self, output: Box<dyn Write>) {
        self.output = output;
    }

    /// Accumulator value.
    #[must_use]
    pub fn acc(&self) -> u8 {
        self.acc
    }

    /// Index-X register value.
    #[must_use]
    pub fn x_reg(&self) -> u8 {
        self.x
    }

    /// Index-Y register value.
    #[must_use]
    pub fn y_reg(&self) -> u8 {
        self.y
    }

    /// Zero flag. Set by the compare opcode, never cleared.
    #[must_use]
    pub fn z_flag(&self) -> bool {
        self.z
    }

    /// Program counter.
    #[must_use]
    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Moves the program counter, e.g. to run a program flashed above
    /// the default entry address.
    pub fn set_pc(&mut self, address: u16) {
        self.pc = address;
    }

    /// Instruction register: the opcode currently in the pipeline.
    #[must_use]
    pub fn ir(&self) -> u8 {
        self.ir
    }

    /// Stage the next pulse will run.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Pulses observed so far.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Writes a byte sequence into memory starting at `start`.
    ///
    /// Initial program load only; bypasses the flag protocol.
    pub fn flash(&mut self, start: u16, program: &[u8]) {
        let mut address = start;
        for byte in program {
            self.mmu.write_immediate(address, *byte);
            address = address.wrapping_add(1);
        }
    }

    fn report_fault(&mut self, fault: Fault) {
        self.trace
            .on_event(&TraceEvent::Fault { pc: self.pc, fault });
    }

    /// Fetch: MAR takes the program counter (post-increment), the byte
    /// read there becomes the instruction register.
    fn fetch(&mut self) {
        self.mmu.set_mar(self.pc);
        self.pc = self.pc.wrapping_add(1);
        self.ir = self.mmu.read_immediate();
        self.stage = Stage::Decode1;
    }

    /// Decode: resolve operand count and load operands.
    ///
    /// Two-operand instructions take both decode sub-steps: the first
    /// stores the low-order byte, the second stores the high-order
    /// byte, commits the assembled little-endian address, and preloads
    /// the data register from it. The one irregular path is the
    /// syscall opcode, which skips operand decoding entirely when the
    /// live index-X register is 1.
    fn decode(&mut self) {
        let Some(count) = operand_count(self.ir) else {
            self.report_fault(Fault::UnknownOpcode(self.ir));
            self.stage = Stage::InterruptCheck;
            return;
        };

        match count {
            0 => self.stage = Stage::Execute1,
            1 => {
                self.mmu.set_mar(self.pc);
                self.pc = self.pc.wrapping_add(1);
                let operand = self.mmu.read_immediate();
                self.mmu.set_mdr(operand);
                self.stage = Stage::Execute1;
            }
            _ => {
                if classify_opcode(self.ir) == Some(Opcode::Sys) && self.x == 1 {
                    // Runtime-arity override: print-integer mode has no
                    // address to decode.
                    self.stage = Stage::Execute1;
                    return;
                }

                self.mmu.set_mar(self.pc);
                self.pc = self.pc.wrapping_add(1);
                let operand = self.mmu.read_immediate();
                self.mmu.set_mdr(operand);

                if self.stage == Stage::Decode1 {
                    self.mmu.set_low_order(operand);
                    self.stage = Stage::Decode2;
                } else {
                    self.mmu.set_high_order(operand);
                    let address = self.mmu.little_endian();
                    self.mmu.set_mar(address);
                    let value = self.mmu.read_immediate();
                    self.mmu.set_mdr(value);
                    self.stage = Stage::Execute1;
                }
            }
        }
    }

    /// Execute: dispatch on the instruction register. Operands and
    /// effective addresses are already in the MDR/MAR.
    fn execute(&mut self) {
        let Some(opcode) = classify_opcode(self.ir) else {
            self.report_fault(Fault::UnknownOpcode(self.ir));
            self.stage = Stage::InterruptCheck;
            return;
        };

        match opcode {
            Opcode::Txa => self.acc = self.x,
            Opcode::Tya => self.acc = self.y,
            Opcode::Tax => self.x = self.acc,
            Opcode::Tay => self.y = self.acc,
            Opcode::Nop => {}
            Opcode::Brk => {
                self.run.halt();
                self.trace.on_event(&TraceEvent::Halted {
                    tick: self.tick_count,
                });
            }
            Opcode::LdaImm | Opcode::LdaAbs => self.acc = self.mmu.mdr(),
            Opcode::LdxImm | Opcode::LdxAbs => self.x = self.mmu.mdr(),
            Opcode::LdyImm | Opcode::LdyAbs => self.y = self.mmu.mdr(),
            Opcode::BneRel => {
                if !self.z {
                    let offset = u16::from(twos_complement(self.mmu.mdr()));
                    self.pc = self.pc.wrapping_sub(offset);
                }
            }
            Opcode::StaAbs => {
                self.mmu.set_mdr(self.acc);
                self.mmu.set_write_flag(true);
            }
            Opcode::AdcAbs => {
                // No carry flag exists; the add is a plain wrapping add.
                self.acc = self.acc.wrapping_add(self.mmu.mdr());
            }
            Opcode::CpxAbs => {
                // One-way latch: the zero flag is set here and cleared
                // nowhere.
                if self.mmu.mdr() == self.x {
                    self.z = true;
                }
            }
            Opcode::IncAbs => {
                self.execute_increment();
                return;
            }
            Opcode::Sys => {
                self.execute_syscall();
                return;
            }
        }

        self.stage = Stage::InterruptCheck;
    }

    /// Increment spans both execute sub-steps: load the cell value into
    /// the accumulator, then bump it and head to write-back.
    fn execute_increment(&mut self) {
        if self.stage == Stage::Execute1 {
            self.acc = self.mmu.mdr();
            self.stage = Stage::Execute2;
        } else {
            self.acc = self.acc.wrapping_add(1);
            self.stage = Stage::WriteBack;
        }
    }

    /// Syscall sub-modes selected by index-X.
    ///
    /// Mode 1 prints index-Y as a decimal integer in one tick. Mode 3
    /// streams a zero-terminated string from the address in the MAR,
    /// one decoded glyph per tick, staying in execute until the
    /// terminator; the per-tick register report is suppressed while
    /// the stream is live. Mode 2 is recognized but deliberately inert.
    fn execute_syscall(&mut self) {
        match self.x {
            1 => {
                let _ = writeln!(self.output, "{}", self.y);
            }
            3 => {
                let code = self.mmu.read_immediate();
                if code == 0x00 {
                    self.streaming = false;
                    self.stage = Stage::InterruptCheck;
                    return;
                }
                if let Some(glyph) = ascii::code_to_glyph(code) {
                    let _ = write!(self.output, "{glyph}");
                }
                let next = self.mmu.mar().wrapping_add(1);
                self.mmu.set_mar(next);
                self.streaming = true;
                return;
            }
            2 => self.report_fault(Fault::UnimplementedSyscall(2)),
            _ => {}
        }
        self.stage = Stage::InterruptCheck;
    }

    /// Write-back: the accumulator goes to the data register and the
    /// write flag is raised; memory commits it on its own pulse.
    fn write_back(&mut self) {
        self.mmu.set_mdr(self.acc);
        self.mmu.set_write_flag(true);
        self.stage = Stage::InterruptCheck;
    }

    /// Interrupt check: peek the most urgent pending interrupt; when it
    /// has buffered output, report the first item and clear the queue.
    fn interrupt_check(&mut self) {
        let serviced = {
            let mut controller = lock_interrupts(&self.interrupts);
            let serviced = controller.highest_priority().and_then(|interrupt| {
                interrupt
                    .first_output()
                    .map(|payload| (interrupt.device.clone(), interrupt.irq, payload))
            });
            if serviced.is_some() {
                controller.clear_output_buffer();
            }
            serviced
        };

        if let Some((device, irq, payload)) = serviced {
            self.trace.on_event(&TraceEvent::InterruptServiced {
                device,
                irq,
                payload,
            });
        }

        self.stage = Stage::Fetch;
    }
}

impl PulseListener for Cpu {
    fn pulse(&mut self) {
        self.tick_count += 1;

        if self.trace_ticks && !self.streaming {
            self.trace.on_event(&TraceEvent::Tick {
                tick: self.tick_count,
                acc: self.acc,
                x: self.x,
                y: self.y,
                z: self.z,
                pc: self.pc,
                ir: self.ir,
                stage: self.stage,
            });
        }

        match self.stage {
            Stage::Fetch => self.fetch(),
            Stage::Decode1 | Stage::Decode2 => self.decode(),
            Stage::Execute1 | Stage::Execute2 => self.execute(),
            Stage::WriteBack => self.write_back(),
            Stage::InterruptCheck => self.interrupt_check(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{twos_complement, Cpu, Stage};
    use crate::clock::{PulseListener, RunFlag};
    use crate::interrupts::{lock_interrupts, shared_interrupts, Interrupt, SharedInterrupts};
    use crate::memory::Memory;
    use crate::mmu::Mmu;
    use crate::trace::{TraceEvent, TraceSink};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Bench {
        cpu: Cpu,
        memory: Rc<RefCell<Memory>>,
        interrupts: SharedInterrupts,
        run: RunFlag,
    }

    impl Bench {
        fn with_program(program: &[u8]) -> Self {
            let memory = Rc::new(RefCell::new(Memory::new()));
            let interrupts = shared_interrupts();
            let run = RunFlag::new();
            let mut cpu = Cpu::new(
                Mmu::new(Rc::clone(&memory)),
                interrupts.clone(),
                run.clone(),
            );
            cpu.flash(0x0000, program);
            Self {
                cpu,
                memory,
                interrupts,
                run,
            }
        }

        /// One full tick: CPU stage first, then the memory pulse, the
        /// same order the clock registry uses.
        fn tick(&mut self) {
            self.cpu.pulse();
            self.memory.borrow_mut().pulse();
        }

        fn tick_n(&mut self, count: usize) {
            for _ in 0..count {
                self.tick();
            }
        }

        fn peek(&self, address: u16) -> u8 {
            let mut memory = self.memory.borrow_mut();
            memory.set_mar(address);
            memory.read()
        }
    }

    struct CaptureTrace(Rc<RefCell<Vec<TraceEvent>>>);

    impl TraceSink for CaptureTrace {
        fn on_event(&mut self, event: &TraceEvent) {
            self.0.borrow_mut().push(event.clone());
        }
    }

    #[test]
    fn twos_complement_decodes_branch_offsets() {
        assert_eq!(twos_complement(0xFE), 2);
        assert_eq!(twos_complement(0xE8), 24);
        assert_eq!(twos_complement(0xF4), 12);
    }

    #[test]
    fn zero_operand_instruction_takes_three_ticks_to_interrupt_check() {
        let mut bench = Bench::with_program(&[0xEA]);

        bench.tick();
        assert_eq!(bench.cpu.stage(), Stage::Decode1);
        bench.tick();
        assert_eq!(bench.cpu.stage(), Stage::Execute1);
        bench.tick();
        assert_eq!(bench.cpu.stage(), Stage::InterruptCheck);
        assert_eq!(bench.cpu.pc(), 1);
    }

    #[test]
    fn one_operand_instruction_takes_three_ticks_and_two_bytes() {
        let mut bench = Bench::with_program(&[0xA9, 0x2A]);

        bench.tick_n(3);
        assert_eq!(bench.cpu.stage(), Stage::InterruptCheck);
        assert_eq!(bench.cpu.pc(), 2);
        assert_eq!(bench.cpu.acc(), 0x2A);
    }

    #[test]
    fn two_operand_instruction_takes_four_ticks_and_three_bytes() {
        let mut bench = Bench::with_program(&[0xAD, 0x34, 0x12]);
        bench.cpu.flash(0x1234, &[0x99]);

        bench.tick_n(4);
        assert_eq!(bench.cpu.stage(), Stage::InterruptCheck);
        assert_eq!(bench.cpu.pc(), 3);
        assert_eq!(bench.cpu.acc(), 0x99);
    }

    #[test]
    fn instruction_register_is_stable_across_the_traversal() {
        let mut bench = Bench::with_program(&[0xAD, 0x34, 0x12]);

        bench.tick();
        assert_eq!(bench.cpu.ir(), 0xAD);
        bench.tick_n(3);
        assert_eq!(bench.cpu.ir(), 0xAD);
    }

    #[test]
    fn syscall_with_x_one_skips_operand_decode() {
        // LDX #1 then SYS: the syscall reaches execute on its third
        // tick with the program counter untouched past the opcode.
        let mut bench = Bench::with_program(&[0xA2, 0x01, 0xFF, 0x00]);
        bench.cpu.set_output(Box::new(Vec::new()));

        bench.tick_n(4); // LDX #1 retires through interrupt check
        assert_eq!(bench.cpu.x_reg(), 1);

        bench.tick(); // fetch SYS
        bench.tick(); // decode: override, no operand reads
        assert_eq!(bench.cpu.stage(), Stage::Execute1);
        assert_eq!(bench.cpu.pc(), 3);

        bench.tick(); // execute: print integer
        assert_eq!(bench.cpu.stage(), Stage::InterruptCheck);
    }

    #[test]
    fn store_commits_on_the_same_ticks_memory_pulse() {
        // LDA #0x42, STA 0x4000
        let mut bench = Bench::with_program(&[0xA9, 0x42, 0x8D, 0x00, 0x40]);

        bench.tick_n(4); // LDA retires
        bench.tick_n(3); // STA fetch, decode1, decode2
        assert_eq!(bench.peek(0x4000), 0x00);

        bench.tick(); // STA execute flags the write; memory commits it
        assert_eq!(bench.peek(0x4000), 0x42);
    }

    #[test]
    fn increment_uses_both_execute_steps_and_write_back() {
        // INC 0x0020 with the cell preloaded to 5.
        let mut bench = Bench::with_program(&[0xEE, 0x20, 0x00]);
        bench.cpu.flash(0x0020, &[0x05]);

        bench.tick_n(3); // fetch, decode1, decode2
        bench.tick();
        assert_eq!(bench.cpu.stage(), Stage::Execute2);
        bench.tick();
        assert_eq!(bench.cpu.stage(), Stage::WriteBack);
        bench.tick(); // write-back flags the write; memory commits it
        assert_eq!(bench.cpu.stage(), Stage::InterruptCheck);
        assert_eq!(bench.peek(0x0020), 0x06);
        assert_eq!(bench.cpu.acc(), 0x06);
    }

    #[test]
    fn branch_walks_backward_while_zero_flag_clear() {
        // BNE -2 at 0x0000 loops back onto itself forever.
        let mut bench = Bench::with_program(&[0xD0, 0xFE]);

        bench.tick_n(3);
        assert_eq!(bench.cpu.pc(), 0x0000);
    }

    #[test]
    fn compare_latches_zero_flag_and_branch_falls_through() {
        // LDX #7, CPX 0x0010 (cell holds 7), BNE -5
        let mut bench = Bench::with_program(&[0xA2, 0x07, 0xEC, 0x10, 0x00, 0xD0, 0xFB]);
        bench.cpu.flash(0x0010, &[0x07]);

        bench.tick_n(4); // LDX
        bench.tick_n(5); // CPX
        assert!(bench.cpu.z_flag());

        bench.tick_n(3); // BNE does not take the branch
        assert_eq!(bench.cpu.pc(), 7);
    }

    #[test]
    fn halt_clears_run_flag() {
        let mut bench = Bench::with_program(&[0x00]);

        assert!(bench.run.is_running());
        bench.tick_n(3);
        assert!(!bench.run.is_running());
    }

    #[test]
    fn unknown_opcode_faults_and_advances_without_mutation() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut bench = Bench::with_program(&[0x6C, 0xEA]);
        bench
            .cpu
            .set_trace_sink(Box::new(CaptureTrace(Rc::clone(&events))));

        bench.tick(); // fetch 0x6C
        bench.tick(); // decode faults
        assert_eq!(bench.cpu.stage(), Stage::InterruptCheck);
        assert_eq!(bench.cpu.acc(), 0);
        assert_eq!(bench.cpu.pc(), 1);

        let faults = events
            .borrow()
            .iter()
            .filter(|event| matches!(event, TraceEvent::Fault { .. }))
            .count();
        assert_eq!(faults, 1);

        // The pipeline keeps going: the next instruction fetches fine.
        bench.tick();
        bench.tick();
        assert_eq!(bench.cpu.ir(), 0xEA);
    }

    #[test]
    fn interrupt_check_reports_and_clears_pending_output() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut bench = Bench::with_program(&[0xEA]);
        bench
            .cpu
            .set_trace_sink(Box::new(CaptureTrace(Rc::clone(&events))));

        lock_interrupts(&bench.interrupts)
            .accept_interrupt(Interrupt::new(0, 0, "VKB").with_output(b'k'));

        bench.tick_n(4); // NOP retires, interrupt check services the queue

        assert_eq!(lock_interrupts(&bench.interrupts).pending(), 0);
        assert!(events.borrow().iter().any(|event| matches!(
            event,
            TraceEvent::InterruptServiced { payload: b'k', .. }
        )));
    }

    #[test]
    fn string_syscall_streams_one_glyph_per_tick() {
        // LDX #3, SYS 0x0008 where "Hi\n\0" lives at 0x0008.
        let output = Rc::new(RefCell::new(Vec::new()));
        struct SharedOut(Rc<RefCell<Vec<u8>>>);
        impl std::io::Write for SharedOut {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.borrow_mut().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut bench = Bench::with_program(&[0xA2, 0x03, 0xFF, 0x08, 0x00]);
        bench.cpu.flash(0x0008, &[0x48, 0x69, 0x0A, 0x00]);
        bench.cpu.set_output(Box::new(SharedOut(Rc::clone(&output))));

        bench.tick_n(4); // LDX #3
        bench.tick_n(3); // SYS fetch, decode1, decode2

        bench.tick(); // 'H'
        assert_eq!(bench.cpu.stage(), Stage::Execute1);
        assert_eq!(*output.borrow(), b"H");

        bench.tick(); // 'i'
        bench.tick(); // '\n'
        bench.tick(); // terminator
        assert_eq!(bench.cpu.stage(), Stage::InterruptCheck);
        assert_eq!(*output.borrow(), b"Hi\n");
    }
}
