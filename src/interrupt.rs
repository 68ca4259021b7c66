//! Interrupt servicing (§5).
//!
//! Serviced only between blocks, never mid-block (§4.6), the engine
//! calls [`service`] right after a block returns control, before fetching
//! the next one.

use crate::bus::{Bus, IE_ADDR, IF_ADDR};
use crate::config::EngineConfig;
use crate::cpu::constants::*;
use crate::cpu::CpuState;

const VECTORS: [(u8, u16); 5] = [
    (VBLANK_INTERRUPT_BIT, VBLANK_VECTOR),
    (LCD_STAT_INTERRUPT_BIT, LCD_STAT_VECTOR),
    (TIMER_INTERRUPT_BIT, TIMER_VECTOR),
    (SERIAL_INTERRUPT_BIT, SERIAL_VECTOR),
    (JOYPAD_INTERRUPT_BIT, JOYPAD_VECTOR),
];

fn pending_mask(bus: &dyn Bus) -> u8 {
    bus.read8(IF_ADDR) & bus.read8(IE_ADDR) & 0x1F
}

/// `HALT` wakes the CPU the instant an enabled interrupt becomes pending,
/// regardless of `IME` (§5), only *servicing* it requires `IME` to be set.
pub fn wake_if_pending(state: &mut CpuState, bus: &dyn Bus) {
    if state.halted && pending_mask(bus) != 0 {
        state.halted = false;
    }
}

/// Service at most one pending, enabled interrupt: push `PC`, clear `IME`
/// and the serviced bit in `IF`, jump to its vector. Returns the cycle
/// cost charged (§4.10 `interrupt_service_cycles`), or `0` if nothing was
/// serviced.
pub fn service(state: &mut CpuState, bus: &mut dyn Bus, config: &EngineConfig) -> u32 {
    wake_if_pending(state, bus);

    if !state.ime {
        return 0;
    }
    let pending = pending_mask(bus);
    if pending == 0 {
        return 0;
    }

    // `pending` is masked to bits 0-4 (§5), exactly the bits `VECTORS`
    // covers, so this always finds an entry; the `0` fallback is only
    // ever a defensive no-op, never actually taken.
    let Some((bit, vector)) = VECTORS.iter().copied().find(|&(bit, _)| pending & (1 << bit) != 0) else {
        return 0;
    };

    bus.write8(IF_ADDR, bus.read8(IF_ADDR) & !(1 << bit));
    state.ime = false;
    state.sp = state.sp.wrapping_sub(2);
    bus.write16(state.sp, state.pc);
    state.pc = vector;

    config.interrupt_service_cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flat_bus::FlatBus;

    #[test]
    fn services_highest_priority_pending_interrupt() {
        let mut bus = FlatBus::new_rom(vec![]);
        bus.write8(IE_ADDR, 0x1F);
        bus.set_interrupt_flag(TIMER_INTERRUPT_BIT, true);
        bus.set_interrupt_flag(VBLANK_INTERRUPT_BIT, true);
        let mut state = CpuState::new();
        state.ime = true;
        state.pc = 0x0150;
        state.sp = 0xFFFE;
        let config = EngineConfig::default();

        let cost = service(&mut state, &mut bus, &config);
        assert_eq!(cost, config.interrupt_service_cycles);
        assert_eq!(state.pc, VBLANK_VECTOR);
        assert!(!state.ime);
        assert_eq!(bus.read16(state.sp), 0x0150);
    }

    #[test]
    fn does_not_service_with_ime_clear() {
        let mut bus = FlatBus::new_rom(vec![]);
        bus.write8(IE_ADDR, 0x01);
        bus.set_interrupt_flag(VBLANK_INTERRUPT_BIT, true);
        let mut state = CpuState::new();
        state.ime = false;
        let config = EngineConfig::default();
        assert_eq!(service(&mut state, &mut bus, &config), 0);
    }

    #[test]
    fn halt_wakes_without_servicing_when_ime_clear() {
        let mut bus = FlatBus::new_rom(vec![]);
        bus.write8(IE_ADDR, 0x01);
        bus.set_interrupt_flag(VBLANK_INTERRUPT_BIT, true);
        let mut state = CpuState::new();
        state.halted = true;
        state.ime = false;
        let config = EngineConfig::default();
        service(&mut state, &mut bus, &config);
        assert!(!state.halted);
        assert!(!state.ime);
    }
}
