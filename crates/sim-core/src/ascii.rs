//! Bidirectional mapping between byte codes and printable glyphs.
//!
//! Total over the fixed `0..=127` domain: printable codes map to
//! themselves, control codes map to their conventional names except
//! for tab, line feed, and carriage return, which map to the real
//! character so the print-string syscall renders them.

/// Names for the control range `0x00..=0x1F`, indexed by code.
const CONTROL_NAMES: [&str; 32] = [
    "NUL", "SOH", "STX", "ETX", "EOT", "ENQ", "ACK", "BEL", "BS", "\t", "\n", "VT", "FF", "\r",
    "SO", "SI", "DLE", "DC1", "DC2", "DC3", "DC4", "NAK", "SYN", "ETB", "CAN", "EM", "SUB", "ESC",
    "FS", "GS", "RS", "US",
];

/// The printable range `0x20..=0x7E` in code order.
const PRINTABLE: &str =
    " !\"#$%&'()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`abcdefghijklmnopqrstuvwxyz{|}~";

/// Returns the glyph for a byte code, or `None` above the 7-bit domain.
#[must_use]
pub fn code_to_glyph(code: u8) -> Option<&'static str> {
    match code {
        0x00..=0x1F => Some(CONTROL_NAMES[usize::from(code)]),
        0x20..=0x7E => {
            let index = usize::from(code - 0x20);
            Some(&PRINTABLE[index..=index])
        }
        0x7F => Some("DEL"),
        _ => None,
    }
}

/// Returns the byte code for a glyph, or `None` when it is not in the table.
#[must_use]
pub fn glyph_to_code(glyph: &str) -> Option<u8> {
    if glyph.len() == 1 {
        let byte = glyph.as_bytes()[0];
        if (0x20..=0x7E).contains(&byte) {
            return Some(byte);
        }
    }
    if glyph == "DEL" {
        return Some(0x7F);
    }
    CONTROL_NAMES
        .iter()
        .position(|name| *name == glyph)
        .and_then(|index| u8::try_from(index).ok())
}
