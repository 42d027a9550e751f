//! Flat byte-addressable store with deferred, flag-driven access.
//!
//! The memory owns its address and data registers; reads and writes
//! flagged during a CPU stage are physically applied on the memory's
//! own pulse later in the same tick (write before read, fixed order).

use crate::clock::PulseListener;
use crate::fault::Fault;
use crate::trace::{hex_byte, hex_word};

/// Size of the addressable space in bytes.
pub const ADDRESS_SPACE_BYTES: usize = 0x1_0000;

/// Flat 64 KiB memory with MAR/MDR registers and one-shot access flags.
pub struct Memory {
    cells: Box<[u8]>,
    mar: u16,
    mdr: u8,
    read_flag: bool,
    write_flag: bool,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    /// Creates a zero-initialized memory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cells: vec![0; ADDRESS_SPACE_BYTES].into_boxed_slice(),
            mar: 0x0000,
            mdr: 0x00,
            read_flag: false,
            write_flag: false,
        }
    }

    /// Reads the memory address register.
    #[must_use]
    pub const fn mar(&self) -> u16 {
        self.mar
    }

    /// Writes the memory address register.
    pub fn set_mar(&mut self, address: u16) {
        self.mar = address;
    }

    /// Reads the memory data register.
    #[must_use]
    pub const fn mdr(&self) -> u8 {
        self.mdr
    }

    /// Writes the memory data register.
    pub fn set_mdr(&mut self, value: u8) {
        self.mdr = value;
    }

    /// Returns the pending-read flag.
    #[must_use]
    pub const fn read_flag(&self) -> bool {
        self.read_flag
    }

    /// Sets or clears the pending-read flag.
    pub fn set_read_flag(&mut self, pending: bool) {
        self.read_flag = pending;
    }

    /// Returns the pending-write flag.
    #[must_use]
    pub const fn write_flag(&self) -> bool {
        self.write_flag
    }

    /// Sets or clears the pending-write flag.
    pub fn set_write_flag(&mut self, pending: bool) {
        self.write_flag = pending;
    }

    /// Copies the cell addressed by the MAR into the MDR and returns it.
    pub fn read(&mut self) -> u8 {
        self.mdr = self.cells[usize::from(self.mar)];
        self.mdr
    }

    /// Copies the MDR into the cell addressed by the MAR.
    pub fn write(&mut self) {
        self.cells[usize::from(self.mar)] = self.mdr;
    }

    /// Zeroes every cell. Registers and flags are left alone.
    pub fn reset(&mut self) {
        self.cells.fill(0);
    }

    /// Produces a per-address listing for the half-open range `[from, to)`.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::AddressOutOfRange`] when a bound leaves the
    /// addressable space or the range is inverted; a bad dump index
    /// never terminates the process.
    #[allow(clippy::cast_possible_truncation)]
    pub fn dump(&self, from: u32, to: u32) -> Result<Vec<String>, Fault> {
        let limit = u32::try_from(ADDRESS_SPACE_BYTES).unwrap_or(u32::MAX);
        if to > limit || from > to {
            return Err(Fault::AddressOutOfRange(to.max(from)));
        }

        let mut lines = Vec::with_capacity((to - from) as usize);
        for address in from..to {
            let cell = self.cells[address as usize];
            lines.push(format!(
                "Addr {} : | {}",
                hex_word((address & 0xFFFF) as u16),
                hex_byte(cell)
            ));
        }
        Ok(lines)
    }
}

impl PulseListener for Memory {
    /// Applies any flagged access: write first, then read, each
    /// clearing its flag once honored.
    fn pulse(&mut self) {
        if self.write_flag {
            self.write();
            self.write_flag = false;
        }
        if self.read_flag {
            self.read();
            self.read_flag = false;
        }
    }
}
