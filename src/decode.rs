//! Instruction decoding (§4.1).
//!
//! Decoding never executes anything and never fails: an undefined opcode
//! decodes to a one-byte, 4-cycle placeholder and is treated as a `NOP` by
//! [`crate::exec`] (§4.1 "Undefined opcodes"). This is what lets the
//! analyzer walk arbitrary bytes, including data that happens to sit in
//! code space, without the decoder itself needing a fallible return type.

use crate::bus::Bus;
use crate::opcodes::{cb_opcode_info, Cycles, MAIN_OPCODES};

pub const CB_PREFIX: u8 = 0xCB;

/// A single decoded instruction (§3 "Instruction").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// 0x00-0xFF for a plain opcode, 0xCB00-0xCBFF for a CB-prefixed one
    /// (high byte 0xCB, low byte the second opcode byte).
    pub opcode: u16,
    pub mnemonic: &'static str,
    pub length: u8,
    pub cycles: Cycles,
    pub address: u16,
}

impl Instruction {
    /// True for either unconditional control transfer or a conditional one
    ///, i.e. anything the analyzer must treat as ending a basic block
    /// (§4.2 exit-type rules look at the specific mnemonic family, but all
    /// of them are control-flow instructions first).
    pub fn is_control_flow(&self) -> bool {
        is_control_flow_mnemonic(self.mnemonic)
    }

    pub fn is_halt(&self) -> bool {
        self.mnemonic == "HALT"
    }

    /// True if this was decoded from a `0xCB`-prefixed byte pair.
    pub fn is_cb(&self) -> bool {
        self.opcode > 0xFF
    }

    /// The raw opcode byte dispatch switches on, the second byte for a
    /// CB-prefixed instruction, the only byte otherwise.
    pub fn raw_byte(&self) -> u8 {
        (self.opcode & 0xFF) as u8
    }
}

fn is_control_flow_mnemonic(mnemonic: &str) -> bool {
    mnemonic.starts_with("JP")
        || mnemonic.starts_with("JR")
        || mnemonic.starts_with("CALL")
        || mnemonic.starts_with("RET")
        || mnemonic.starts_with("RST")
        || mnemonic == "HALT"
}

/// Decode the instruction at `address`. Always succeeds (§4.1).
pub fn decode(bus: &dyn Bus, address: u16) -> Instruction {
    let first = bus.read8(address);
    if first == CB_PREFIX {
        let cb_byte = bus.read8(address.wrapping_add(1));
        let info = cb_opcode_info(cb_byte);
        return Instruction {
            opcode: 0xCB00 | cb_byte as u16,
            mnemonic: info.mnemonic,
            length: info.length,
            cycles: info.cycles,
            address,
        };
    }

    let info = MAIN_OPCODES[first as usize];
    Instruction {
        opcode: first as u16,
        mnemonic: info.mnemonic,
        length: info.length,
        cycles: info.cycles,
        address,
    }
}
