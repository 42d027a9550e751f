//! Non-fatal fault taxonomy shared by the pipeline and memory.

use thiserror::Error;

/// Fault classes used for diagnostics aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FaultClass {
    /// Opcode lookup rejected an instruction byte.
    Decode,
    /// An address or dump bound left the 16-bit space.
    Memory,
    /// A syscall sub-mode with no implemented behavior.
    Syscall,
}

/// Non-fatal fault taxonomy for the pipeline and memory surfaces.
///
/// Faults are contained within the tick that raised them: they are
/// reported through the trace sink and the pipeline moves on to the
/// interrupt-check stage. Halting is not a fault; it travels through
/// the run flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Fault {
    /// Opcode byte absent from the operand-count table.
    #[error("opcode 0x{0:02X} not recognized")]
    UnknownOpcode(u8),
    /// Address or dump bound outside `[0, 0xFFFF]`.
    #[error("address 0x{0:04X} outside addressable space")]
    AddressOutOfRange(u32),
    /// Syscall sub-mode that is recognized but deliberately inert.
    #[error("syscall mode {0} is recognized but not implemented")]
    UnimplementedSyscall(u8),
}

impl Fault {
    /// Returns the diagnostics class for this fault.
    #[must_use]
    pub const fn class(self) -> FaultClass {
        match self {
            Self::UnknownOpcode(_) => FaultClass::Decode,
            Self::AddressOutOfRange(_) => FaultClass::Memory,
            Self::UnimplementedSyscall(_) => FaultClass::Syscall,
        }
    }
}
