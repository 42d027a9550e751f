//! Deterministic opcode classification and operand-count table.

/// Mnemonics for the implemented 6502 subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum Opcode {
    LdaImm,
    LdaAbs,
    StaAbs,
    Txa,
    Tya,
    AdcAbs,
    LdxImm,
    LdxAbs,
    Tax,
    LdyImm,
    LdyAbs,
    Tay,
    Nop,
    Brk,
    CpxAbs,
    BneRel,
    IncAbs,
    Sys,
}

/// Single source-of-truth opcode table: `(byte, mnemonic, operand count)`.
///
/// Any byte not present here is an unknown opcode by definition. The
/// `Sys` entry is the one irregular row: its static operand count is 2,
/// but at decode time it behaves as a 0-operand instruction when the
/// live index-X register equals 1 (print integer from Y).
pub const OPCODE_TABLE: &[(u8, Opcode, u8)] = &[
    (0xA9, Opcode::LdaImm, 1),
    (0xAD, Opcode::LdaAbs, 2),
    (0x8D, Opcode::StaAbs, 2),
    (0x8A, Opcode::Txa, 0),
    (0x98, Opcode::Tya, 0),
    (0x6D, Opcode::AdcAbs, 2),
    (0xA2, Opcode::LdxImm, 1),
    (0xAE, Opcode::LdxAbs, 2),
    (0xAA, Opcode::Tax, 0),
    (0xA0, Opcode::LdyImm, 1),
    (0xAC, Opcode::LdyAbs, 2),
    (0xA8, Opcode::Tay, 0),
    (0xEA, Opcode::Nop, 0),
    (0x00, Opcode::Brk, 0),
    (0xEC, Opcode::CpxAbs, 2),
    (0xD0, Opcode::BneRel, 1),
    (0xEE, Opcode::IncAbs, 2),
    (0xFF, Opcode::Sys, 2),
];

/// Returns the mnemonic for an opcode byte, or `None` when unassigned.
#[must_use]
pub fn classify_opcode(byte: u8) -> Option<Opcode> {
    OPCODE_TABLE
        .iter()
        .find_map(|(entry, opcode, _)| (*entry == byte).then_some(*opcode))
}

/// Returns the static operand count for an opcode byte.
///
/// `None` means unknown opcode. The runtime-arity override for `Sys`
/// is a decode-time decision and is not reflected here.
#[must_use]
pub fn operand_count(byte: u8) -> Option<u8> {
    OPCODE_TABLE
        .iter()
        .find_map(|(entry, _, count)| (*entry == byte).then_some(*count))
}
