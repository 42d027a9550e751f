//! Keyboard device: asynchronous input source posting interrupts.
//!
//! The device is host-independent: whatever reads the real terminal
//! (the CLI's crossterm thread, a test) feeds byte events into
//! [`KeyboardDevice::key_event`]. Input arrival is asynchronous
//! relative to the pipeline; the buffer-append and interrupt-post
//! happen as one unit under the controller lock, so the CPU's
//! interrupt-check stage never observes a torn queue.

use crate::clock::RunFlag;
use crate::interrupts::{lock_interrupts, Interrupt, SharedInterrupts};

/// IRQ number assigned to the keyboard.
pub const KEYBOARD_IRQ: u8 = 0;

/// Servicing priority assigned to the keyboard (most urgent).
pub const KEYBOARD_PRIORITY: u8 = 0;

/// Device name reported in interrupts and the controller registry.
pub const KEYBOARD_NAME: &str = "VKB";

/// Control byte (ETX, Ctrl-C) that requests orderly termination
/// instead of being buffered.
pub const END_OF_TEXT: u8 = 0x03;

/// Cloneable keyboard handle; clones share the controller and run flag.
#[derive(Debug, Clone)]
pub struct KeyboardDevice {
    interrupts: SharedInterrupts,
    run: RunFlag,
}

impl KeyboardDevice {
    /// Creates the device and registers it with the controller.
    #[must_use]
    pub fn new(interrupts: SharedInterrupts, run: RunFlag) -> Self {
        lock_interrupts(&interrupts).register_device(KEYBOARD_NAME);
        Self { interrupts, run }
    }

    /// Handles one external input event.
    ///
    /// The control byte halts the machine; any other byte is buffered
    /// into a fresh interrupt record and posted to the controller in a
    /// single critical section.
    pub fn key_event(&self, code: u8) {
        if code == END_OF_TEXT {
            self.run.halt();
            return;
        }

        let interrupt =
            Interrupt::new(KEYBOARD_IRQ, KEYBOARD_PRIORITY, KEYBOARD_NAME).with_output(code);
        lock_interrupts(&self.interrupts).accept_interrupt(interrupt);
    }

    /// Returns the run flag shared with the rest of the machine.
    #[must_use]
    pub fn run_flag(&self) -> RunFlag {
        self.run.clone()
    }
}
