//! Memory-mediation unit: the CPU's only channel to memory.
//!
//! A thin protocol adapter over the memory's registers plus the
//! low/high-order scratch bytes used for two-byte address assembly.
//! The scratch pair is meaningful only between the first and second
//! decode sub-steps of a single instruction; decode sequences must not
//! interleave.

use std::cell::RefCell;
use std::rc::Rc;

use crate::memory::Memory;

/// Pass-through register interface with little-endian address assembly.
pub struct Mmu {
    memory: Rc<RefCell<Memory>>,
    lob: u8,
    hob: u8,
}

impl Mmu {
    /// Creates a mediation unit over a shared memory.
    #[must_use]
    pub const fn new(memory: Rc<RefCell<Memory>>) -> Self {
        Self {
            memory,
            lob: 0,
            hob: 0,
        }
    }

    /// Forwards a read: cell at the MAR into the MDR, returned.
    pub fn read(&mut self) -> u8 {
        self.memory.borrow_mut().read()
    }

    /// Forwards a write: MDR into the cell at the MAR.
    pub fn write(&mut self) {
        self.memory.borrow_mut().write();
    }

    /// Reads the memory address register.
    #[must_use]
    pub fn mar(&self) -> u16 {
        self.memory.borrow().mar()
    }

    /// Writes the memory address register.
    pub fn set_mar(&mut self, address: u16) {
        self.memory.borrow_mut().set_mar(address);
    }

    /// Stores a (low, high) byte pair and commits the assembled
    /// little-endian address to the MAR.
    pub fn set_mar_bytes(&mut self, low: u8, high: u8) {
        self.lob = low;
        self.hob = high;
        let address = self.little_endian();
        self.memory.borrow_mut().set_mar(address);
    }

    /// Reads the memory data register.
    #[must_use]
    pub fn mdr(&self) -> u8 {
        self.memory.borrow().mdr()
    }

    /// Writes the memory data register.
    pub fn set_mdr(&mut self, value: u8) {
        self.memory.borrow_mut().set_mdr(value);
    }

    /// Reads the low-order scratch byte.
    #[must_use]
    pub const fn low_order(&self) -> u8 {
        self.lob
    }

    /// Stores the low-order scratch byte.
    pub fn set_low_order(&mut self, value: u8) {
        self.lob = value;
    }

    /// Reads the high-order scratch byte.
    #[must_use]
    pub const fn high_order(&self) -> u8 {
        self.hob
    }

    /// Stores the high-order scratch byte.
    pub fn set_high_order(&mut self, value: u8) {
        self.hob = value;
    }

    /// Returns the pending-read flag.
    #[must_use]
    pub fn read_flag(&self) -> bool {
        self.memory.borrow().read_flag()
    }

    /// Sets or clears the pending-read flag.
    pub fn set_read_flag(&mut self, pending: bool) {
        self.memory.borrow_mut().set_read_flag(pending);
    }

    /// Returns the pending-write flag.
    #[must_use]
    pub fn write_flag(&self) -> bool {
        self.memory.borrow().write_flag()
    }

    /// Sets or clears the pending-write flag.
    pub fn set_write_flag(&mut self, pending: bool) {
        self.memory.borrow_mut().set_write_flag(pending);
    }

    /// Assembles the scratch pair into a 16-bit address:
    /// `(high << 8) | low`.
    #[must_use]
    pub const fn little_endian(&self) -> u16 {
        (self.hob as u16) << 8 | self.lob as u16
    }

    /// Performs an immediate read at the current MAR.
    pub fn read_immediate(&mut self) -> u8 {
        self.memory.borrow_mut().read()
    }

    /// Performs an address-set-then-write in one call.
    ///
    /// Used only for program flashing, never by the per-tick pipeline.
    pub fn write_immediate(&mut self, address: u16, value: u8) {
        let mut memory = self.memory.borrow_mut();
        memory.set_mar(address);
        memory.set_mdr(value);
        memory.write();
    }
}
