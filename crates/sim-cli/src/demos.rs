//! Built-in demonstration program images.
//!
//! Flat binaries for the default load address 0x0000, assembled by
//! hand from the implemented instruction set.

/// Streams "Hello World!" through the print-string syscall, then halts.
pub const HELLO: &[u8] = &[
    0xA2, 0x03, 0xFF, 0x06, 0x00, 0x00, 0x48, 0x65, 0x6C, 0x6C, 0x6F, 0x20, 0x57, 0x6F, 0x72,
    0x6C, 0x64, 0x21, 0x0A, 0x00,
];

/// Stores 1, increments the cell in place, prints the result, halts.
pub const INCREMENT: &[u8] = &[
    0xA9, 0x01, 0x8D, 0x20, 0x00, 0xEE, 0x20, 0x00, 0xAC, 0x20, 0x00, 0xA2, 0x01, 0xFF, 0x00,
];

/// Prints the first ten triangle numbers, halting on a latched compare.
pub const TRIANGLE: &[u8] = &[
    0xA9, 0x0B, 0x8D, 0x40, 0x00, 0xA9, 0x01, 0x8D, 0x41, 0x00, 0xA8, 0xA2, 0x01, 0xFF, 0xA9,
    0x01, 0x6D, 0x41, 0x00, 0x8D, 0x41, 0x00, 0x98, 0x6D, 0x41, 0x00, 0xAE, 0x40, 0x00, 0xEC,
    0x41, 0x00, 0xD0, 0xE8, 0x00,
];

/// Prints powers of two, wrapping to zero and looping until a key
/// event halts the machine.
pub const POWERS: &[u8] = &[
    0xA9, 0x00, 0x8D, 0x40, 0x00, 0xA9, 0x01, 0x6D, 0x40, 0x00, 0x8D, 0x40, 0x00, 0xA8, 0xA2,
    0x01, 0xFF, 0xD0, 0xF4, 0x00,
];

/// Demo names accepted on the command line, in listing order.
pub const NAMES: [&str; 4] = ["hello", "increment", "triangle", "powers"];

/// Resolves a demo name to its program image.
pub fn by_name(name: &str) -> Option<&'static [u8]> {
    match name {
        "hello" => Some(HELLO),
        "increment" => Some(INCREMENT),
        "triangle" => Some(TRIANGLE),
        "powers" => Some(POWERS),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{by_name, NAMES};

    #[test]
    fn every_listed_name_resolves() {
        for name in NAMES {
            let image = by_name(name).expect("listed demo resolves");
            assert!(!image.is_empty());
            assert!(image.len() <= sim_core::ADDRESS_SPACE_BYTES);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert!(by_name("fibonacci").is_none());
        assert!(by_name("").is_none());
    }

    #[test]
    fn images_contain_only_classifiable_opcodes_at_the_entry_point() {
        for name in NAMES {
            let image = by_name(name).expect("listed demo resolves");
            assert!(sim_core::classify_opcode(image[0]).is_some(), "demo {name}");
        }
    }
}
