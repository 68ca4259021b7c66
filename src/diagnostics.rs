//! Diagnostics registry (§7): tracks every undefined opcode the decoder
//! has hit so a host application can surface "this ROM used opcode 0xD3 at
//! 0x4102" without the core needing its own logging sink, just
//! [`log`]'s facade, the same ambient pattern the rest of the crate uses.

use std::collections::BTreeMap;

use log::debug;

/// One undefined-opcode sighting: how many times, and the first address it
/// was seen at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndefinedOpcodeSighting {
    pub first_address: u16,
    pub count: u64,
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    undefined_opcodes: BTreeMap<u8, UndefinedOpcodeSighting>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a decode that landed on `opcode` (an entry whose mnemonic is
    /// `crate::opcodes`'s `"OP_0xNN"` placeholder) at `address`.
    pub fn record_undefined(&mut self, opcode: u8, address: u16) {
        self.undefined_opcodes
            .entry(opcode)
            .and_modify(|sighting| sighting.count += 1)
            .or_insert_with(|| {
                debug!("undefined opcode 0x{opcode:02X} first seen at 0x{address:04X}");
                UndefinedOpcodeSighting { first_address: address, count: 1 }
            });
    }

    pub fn undefined_opcodes(&self) -> impl Iterator<Item = (u8, UndefinedOpcodeSighting)> + '_ {
        self.undefined_opcodes.iter().map(|(&op, &sighting)| (op, sighting))
    }

    pub fn is_empty(&self) -> bool {
        self.undefined_opcodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting_is_recorded_with_its_address() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.record_undefined(0xD3, 0x4102);
        let (_, sighting) = diagnostics.undefined_opcodes().next().unwrap();
        assert_eq!(sighting.first_address, 0x4102);
        assert_eq!(sighting.count, 1);
    }

    #[test]
    fn repeat_sightings_increment_count_but_keep_first_address() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.record_undefined(0xD3, 0x4102);
        diagnostics.record_undefined(0xD3, 0x9000);
        let (_, sighting) = diagnostics.undefined_opcodes().next().unwrap();
        assert_eq!(sighting.first_address, 0x4102);
        assert_eq!(sighting.count, 2);
    }
}
