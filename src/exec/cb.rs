//! CB-prefixed opcode execution (§4.4), mirroring the bit-field
//! decomposition [`crate::opcodes::cb_opcode_info`] uses for metadata:
//! bits 6-7 select the category, bits 3-5 the bit index or rotate/shift
//! variant, bits 0-2 the register operand.

use crate::bus::Bus;
use crate::cpu::alu;
use crate::cpu::CpuState;

use super::{reg8_read, reg8_write};

/// Execute one CB-prefixed opcode. Never branches, so callers don't need a
/// `StepEffect` back.
pub fn execute(state: &mut CpuState, bus: &mut dyn Bus, cb_opcode: u8, live_mask: u8) {
    let reg = cb_opcode & 0x07;
    let sub = (cb_opcode >> 3) & 0x07;
    let category = cb_opcode >> 6;
    let value = reg8_read(reg, state, bus);

    match category {
        0 => {
            let carry_in = state.get_flag(crate::cpu::constants::FLAG_C);
            let (result, effect) = match sub {
                0 => alu::rlc(value),
                1 => alu::rrc(value),
                2 => alu::rl(value, carry_in),
                3 => alu::rr(value, carry_in),
                4 => alu::sla(value),
                5 => alu::sra(value),
                6 => alu::swap(value),
                7 => alu::srl(value),
                _ => unreachable!("3-bit rotate/shift selector"),
            };
            effect.apply_masked(state, live_mask);
            reg8_write(reg, state, bus, result);
        }
        1 => {
            let effect = alu::bit(sub, value);
            effect.apply_masked(state, live_mask);
        }
        2 => {
            let result = alu::res(sub, value);
            reg8_write(reg, state, bus, result);
        }
        3 => {
            let result = alu::set(sub, value);
            reg8_write(reg, state, bus, result);
        }
        _ => unreachable!("2-bit category"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::constants::FLAG_Z;
    use crate::flat_bus::FlatBus;

    #[test]
    fn bit_7_h_sets_zero_when_bit_clear() {
        let mut state = CpuState::new();
        state.h = 0x00;
        let mut bus = FlatBus::new_rom(vec![]);
        execute(&mut state, &mut bus, 0x7C, 0xFF); // BIT 7, H
        assert!(state.get_flag(FLAG_Z));
    }

    #[test]
    fn res_0_a_clears_bit_without_touching_flags() {
        let mut state = CpuState::new();
        state.a = 0xFF;
        state.set_flag(crate::cpu::constants::FLAG_C, true);
        let mut bus = FlatBus::new_rom(vec![]);
        execute(&mut state, &mut bus, 0x87, 0xFF); // RES 0, A
        assert_eq!(state.a, 0xFE);
        assert!(state.get_flag(crate::cpu::constants::FLAG_C));
    }

    #[test]
    fn swap_b_exchanges_nibbles() {
        let mut state = CpuState::new();
        state.b = 0x12;
        let mut bus = FlatBus::new_rom(vec![]);
        execute(&mut state, &mut bus, 0x30, 0xFF); // SWAP B
        assert_eq!(state.b, 0x21);
    }
}
