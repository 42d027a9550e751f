//! Interrupt path suite: keyboard events travelling through the
//! controller into the CPU's interrupt-check stage.

#![allow(clippy::pedantic, clippy::nursery)]

use std::cell::RefCell;
use std::rc::Rc;

use proptest as _;
use rstest as _;
use sim_core::{
    lock_interrupts, Interrupt, Machine, MachineConfig, TraceEvent, TraceSink, END_OF_TEXT,
    KEYBOARD_NAME,
};
#[cfg(feature = "serde")]
use serde as _;
use spin_sleep as _;
use thiserror as _;

struct CaptureTrace(Rc<RefCell<Vec<TraceEvent>>>);

impl TraceSink for CaptureTrace {
    fn on_event(&mut self, event: &TraceEvent) {
        self.0.borrow_mut().push(event.clone());
    }
}

fn traced_machine(program: &[u8]) -> (Machine, Rc<RefCell<Vec<TraceEvent>>>) {
    let mut machine = Machine::new(&MachineConfig::instant());
    let events = Rc::new(RefCell::new(Vec::new()));
    machine.set_trace_sink(Box::new(CaptureTrace(Rc::clone(&events))));
    machine.set_output(Box::new(std::io::sink()));
    machine.flash(0x0000, program);
    (machine, events)
}

fn serviced_payloads(events: &Rc<RefCell<Vec<TraceEvent>>>) -> Vec<u8> {
    events
        .borrow()
        .iter()
        .filter_map(|event| match event {
            TraceEvent::InterruptServiced { payload, .. } => Some(*payload),
            _ => None,
        })
        .collect()
}

#[test]
fn typed_key_is_serviced_at_the_next_interrupt_check() {
    let (mut machine, events) = traced_machine(&[0xEA, 0xEA]);

    machine.keyboard().key_event(b'q');
    for _ in 0..4 {
        machine.tick();
    }

    assert_eq!(serviced_payloads(&events), [b'q']);
    assert_eq!(lock_interrupts(&machine.interrupts()).pending(), 0);
}

#[test]
fn servicing_clears_every_queued_interrupt() {
    // Two keys arrive before the first interrupt check; only the first
    // is reported, and the clear takes the second with it.
    let (mut machine, events) = traced_machine(&[0xEA, 0xEA]);

    machine.keyboard().key_event(b'a');
    machine.keyboard().key_event(b'b');
    for _ in 0..8 {
        machine.tick();
    }

    assert_eq!(serviced_payloads(&events), [b'a']);
    assert_eq!(lock_interrupts(&machine.interrupts()).pending(), 0);
}

#[test]
fn lower_priority_value_wins_the_service_slot() {
    let (mut machine, events) = traced_machine(&[0xEA]);

    {
        let interrupts = machine.interrupts();
        let mut controller = lock_interrupts(&interrupts);
        controller.accept_interrupt(Interrupt::new(7, 5, "AUX").with_output(0xBB));
        controller.accept_interrupt(Interrupt::new(1, 0, "VKB").with_output(0xAA));
    }
    for _ in 0..4 {
        machine.tick();
    }

    assert_eq!(serviced_payloads(&events), [0xAA]);
    let devices: Vec<_> = events
        .borrow()
        .iter()
        .filter_map(|event| match event {
            TraceEvent::InterruptServiced { device, .. } => Some(device.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(devices, [KEYBOARD_NAME]);
}

#[test]
fn control_byte_halts_the_run_without_queueing() {
    let (mut machine, events) = traced_machine(&[0xEA, 0xD0, 0xFD]);

    machine.keyboard().key_event(END_OF_TEXT);

    let consumed = machine.run_until_halt(1_000);
    assert_eq!(consumed, 0);
    assert!(serviced_payloads(&events).is_empty());
}

#[test]
fn keys_typed_from_another_thread_reach_the_pipeline() {
    let (mut machine, events) = traced_machine(&[0xEA, 0xD0, 0xFD]);
    let keyboard = machine.keyboard();

    let typist = std::thread::spawn(move || {
        keyboard.key_event(b'x');
    });
    typist.join().expect("typist thread");

    for _ in 0..4 {
        machine.tick();
    }
    assert_eq!(serviced_payloads(&events), [b'x']);
}

#[test]
fn quiet_machine_reports_no_interrupts() {
    let (mut machine, events) = traced_machine(&[0xEA, 0xEA, 0xEA]);

    for _ in 0..12 {
        machine.tick();
    }
    assert!(serviced_payloads(&events).is_empty());
}
