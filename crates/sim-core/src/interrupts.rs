//! Interrupt record and priority-ordered controller queue.
//!
//! The controller's queue is the one genuinely shared resource in the
//! machine: the keyboard thread produces into it and the CPU's
//! interrupt-check stage consumes from it, so it travels behind a
//! mutex ([`SharedInterrupts`]) and is never observed in a torn state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An asynchronous event record posted by a device.
///
/// Created and populated by the originating device, submitted by value;
/// the controller owns it only while it sits in the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Interrupt {
    /// IRQ number of the originating device.
    pub irq: u8,
    /// Servicing priority; lower is more urgent.
    pub priority: u8,
    /// Human-readable device name.
    pub device: String,
    /// Pending output items, in arrival order.
    pub output: Vec<u8>,
}

impl Interrupt {
    /// Creates an interrupt with an empty output buffer.
    #[must_use]
    pub fn new(irq: u8, priority: u8, device: impl Into<String>) -> Self {
        Self {
            irq,
            priority,
            device: device.into(),
            output: Vec::new(),
        }
    }

    /// Appends one output item, builder-style.
    #[must_use]
    pub fn with_output(mut self, item: u8) -> Self {
        self.output.push(item);
        self
    }

    /// Returns the first buffered output item, if any.
    #[must_use]
    pub fn first_output(&self) -> Option<u8> {
        self.output.first().copied()
    }
}

/// Registers interrupt-capable devices and queues their interrupts by
/// priority.
#[derive(Debug, Default)]
pub struct InterruptController {
    devices: Vec<String>,
    queue: Vec<Interrupt>,
}

impl InterruptController {
    /// Creates an empty controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an interrupt-capable device. Append-only, informational.
    pub fn register_device(&mut self, name: impl Into<String>) {
        self.devices.push(name.into());
    }

    /// Returns the names of registered devices in registration order.
    #[must_use]
    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    /// Appends an interrupt and re-sorts the queue ascending by
    /// priority. The sort is stable: equal priorities keep insertion
    /// order.
    pub fn accept_interrupt(&mut self, interrupt: Interrupt) {
        self.queue.push(interrupt);
        self.sort_by_priority();
    }

    /// Re-sorts the queue ascending by priority.
    pub fn sort_by_priority(&mut self) {
        self.queue.sort_by_key(|interrupt| interrupt.priority);
    }

    /// Re-sorts, then returns the most urgent pending interrupt
    /// without removing it.
    pub fn highest_priority(&mut self) -> Option<&Interrupt> {
        self.sort_by_priority();
        self.queue.first()
    }

    /// Empties the queue. Called by the CPU once the visible output of
    /// the highest-priority entry has been consumed.
    pub fn clear_output_buffer(&mut self) {
        self.queue.clear();
    }

    /// Returns the number of pending interrupts.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

/// Shared, mutually exclusive handle to the controller.
pub type SharedInterrupts = Arc<Mutex<InterruptController>>;

/// Creates a fresh shared controller handle.
#[must_use]
pub fn shared_interrupts() -> SharedInterrupts {
    Arc::new(Mutex::new(InterruptController::new()))
}

/// Locks the controller, recovering from a poisoned mutex.
///
/// A producer that panicked mid-post left at worst a fully appended
/// entry, so the queue is still structurally sound.
pub fn lock_interrupts(shared: &SharedInterrupts) -> MutexGuard<'_, InterruptController> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
