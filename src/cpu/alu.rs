//! Pure ALU primitives (§2 "ALU primitives", §4.4 per-opcode semantics).
//!
//! Each primitive is a pure function from operands to a result plus the
//! flag effect the real hardware produces. Primitives never touch
//! `CpuState` directly, the liveness-aware [`crate::exec`] dispatch layer
//! decides which of the reported flag writes are actually live (§4.3) and
//! applies them via [`FlagEffect::apply_masked`]. This split is what lets
//! the transpiler elide a dead flag write without duplicating the carry
//! and half-carry math for a "flags don't matter" variant of every op.

use super::constants::*;
use super::CpuState;

/// The flag effect of one ALU operation. `None` means "this flag is not
/// touched by this operation" (e.g. `INC`/`DEC` never touch C, 16-bit
/// `ADD HL` never touches Z).
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagEffect {
    pub z: Option<bool>,
    pub n: Option<bool>,
    pub h: Option<bool>,
    pub c: Option<bool>,
}

impl FlagEffect {
    const fn new(z: Option<bool>, n: Option<bool>, h: Option<bool>, c: Option<bool>) -> Self {
        FlagEffect { z, n, h, c }
    }

    /// Apply every reported flag write unconditionally, the conservative
    /// "all live" default (§3, §4.3).
    pub fn apply(&self, state: &mut CpuState) {
        self.apply_masked(state, FLAG_Z | FLAG_N | FLAG_H | FLAG_C);
    }

    /// Apply only the flag writes whose bit is set in `live_mask`. Used by
    /// the transpiler when liveness analysis proves a write is dead
    /// (§4.3, §4.4 "Dead writes become `// elided`").
    pub fn apply_masked(&self, state: &mut CpuState, live_mask: u8) {
        if live_mask & FLAG_Z != 0 {
            if let Some(z) = self.z {
                state.set_flag(FLAG_Z, z);
            }
        }
        if live_mask & FLAG_N != 0 {
            if let Some(n) = self.n {
                state.set_flag(FLAG_N, n);
            }
        }
        if live_mask & FLAG_H != 0 {
            if let Some(h) = self.h {
                state.set_flag(FLAG_H, h);
            }
        }
        if live_mask & FLAG_C != 0 {
            if let Some(c) = self.c {
                state.set_flag(FLAG_C, c);
            }
        }
    }
}

/// `ADD A, r` / `ADC A, r`.
pub fn add8(a: u8, value: u8, carry_in: bool) -> (u8, FlagEffect) {
    let cin = carry_in as u8;
    let (res1, c1) = a.overflowing_add(value);
    let (result, c2) = res1.overflowing_add(cin);
    let half_carry = (a & 0x0F) + (value & 0x0F) + cin > 0x0F;
    (
        result,
        FlagEffect::new(Some(result == 0), Some(false), Some(half_carry), Some(c1 || c2)),
    )
}

/// `SUB A, r` / `SBC A, r` / `CP A, r` (caller discards the value for `CP`).
pub fn sub8(a: u8, value: u8, carry_in: bool) -> (u8, FlagEffect) {
    let cin = carry_in as u8;
    let (res1, b1) = a.overflowing_sub(value);
    let (result, b2) = res1.overflowing_sub(cin);
    let half_borrow = (a & 0x0F) < (value & 0x0F) + cin;
    (
        result,
        FlagEffect::new(Some(result == 0), Some(true), Some(half_borrow), Some(b1 || b2)),
    )
}

pub fn and8(a: u8, value: u8) -> (u8, FlagEffect) {
    let result = a & value;
    (
        result,
        FlagEffect::new(Some(result == 0), Some(false), Some(true), Some(false)),
    )
}

pub fn or8(a: u8, value: u8) -> (u8, FlagEffect) {
    let result = a | value;
    (
        result,
        FlagEffect::new(Some(result == 0), Some(false), Some(false), Some(false)),
    )
}

pub fn xor8(a: u8, value: u8) -> (u8, FlagEffect) {
    let result = a ^ value;
    (
        result,
        FlagEffect::new(Some(result == 0), Some(false), Some(false), Some(false)),
    )
}

/// `INC r` (8-bit). Carry is never touched.
pub fn inc8(value: u8) -> (u8, FlagEffect) {
    let result = value.wrapping_add(1);
    (
        result,
        FlagEffect::new(Some(result == 0), Some(false), Some((value & 0x0F) == 0x0F), None),
    )
}

/// `DEC r` (8-bit). Carry is never touched.
pub fn dec8(value: u8) -> (u8, FlagEffect) {
    let result = value.wrapping_sub(1);
    (
        result,
        FlagEffect::new(Some(result == 0), Some(true), Some((value & 0x0F) == 0x00), None),
    )
}

/// `ADD HL, rr`. Z is never touched.
pub fn add_hl(hl: u16, value: u16) -> (u16, FlagEffect) {
    let (result, carry) = hl.overflowing_add(value);
    let half_carry = (hl & 0x0FFF) + (value & 0x0FFF) > 0x0FFF;
    (result, FlagEffect::new(None, Some(false), Some(half_carry), Some(carry)))
}

/// `ADD SP, r8` / `LD HL, SP+r8`. Both halves of SP/HL are computed the
/// same way: 8-bit unsigned addition of the low byte of SP with the
/// offset byte, carries/half-carries measured on that 8-bit addition.
pub fn add_sp_r8(sp: u16, offset: i8) -> (u16, FlagEffect) {
    let offset16 = offset as i16 as u16;
    let result = sp.wrapping_add(offset16);
    let sp_lo = (sp & 0xFF) as u8;
    let off_lo = (offset16 & 0xFF) as u8;
    let half_carry = (sp_lo & 0x0F) + (off_lo & 0x0F) > 0x0F;
    let carry = (sp_lo as u16) + (off_lo as u16) > 0xFF;
    (
        result,
        FlagEffect::new(Some(false), Some(false), Some(half_carry), Some(carry)),
    )
}

/// BCD correction following an ADD/ADC or SUB/SBC chain (§4.4 `DAA`). H is
/// always cleared; N is left untouched by the primitive (the caller never
/// changes it, since DAA doesn't alter the operation sense).
pub fn daa(a: u8, n_flag: bool, h_flag: bool, c_flag: bool) -> (u8, FlagEffect) {
    let mut adjustment: u8 = 0;
    let mut set_carry = false;
    let result = if !n_flag {
        if c_flag || a > 0x99 {
            adjustment |= 0x60;
            set_carry = true;
        }
        if h_flag || (a & 0x0F) > 0x09 {
            adjustment |= 0x06;
        }
        a.wrapping_add(adjustment)
    } else {
        if c_flag {
            adjustment |= 0x60;
            set_carry = true;
        }
        if h_flag {
            adjustment |= 0x06;
        }
        a.wrapping_sub(adjustment)
    };
    (result, FlagEffect::new(Some(result == 0), None, Some(false), Some(set_carry)))
}

/// `RLCA`/CB `RLC r`. Callers differ only in whether they force Z to 0
/// (`RLCA`) or keep the computed Z (`RLC`), see §4.4.
pub fn rlc(value: u8) -> (u8, FlagEffect) {
    let carry = (value >> 7) & 1;
    let result = value.rotate_left(1);
    (result, FlagEffect::new(Some(result == 0), Some(false), Some(false), Some(carry != 0)))
}

pub fn rrc(value: u8) -> (u8, FlagEffect) {
    let carry = value & 1;
    let result = value.rotate_right(1);
    (result, FlagEffect::new(Some(result == 0), Some(false), Some(false), Some(carry != 0)))
}

pub fn rl(value: u8, carry_in: bool) -> (u8, FlagEffect) {
    let new_carry = (value >> 7) & 1;
    let result = (value << 1) | (carry_in as u8);
    (result, FlagEffect::new(Some(result == 0), Some(false), Some(false), Some(new_carry != 0)))
}

pub fn rr(value: u8, carry_in: bool) -> (u8, FlagEffect) {
    let new_carry = value & 1;
    let result = (value >> 1) | ((carry_in as u8) << 7);
    (result, FlagEffect::new(Some(result == 0), Some(false), Some(false), Some(new_carry != 0)))
}

pub fn sla(value: u8) -> (u8, FlagEffect) {
    let carry = (value >> 7) & 1;
    let result = value << 1;
    (result, FlagEffect::new(Some(result == 0), Some(false), Some(false), Some(carry != 0)))
}

pub fn sra(value: u8) -> (u8, FlagEffect) {
    let carry = value & 1;
    let result = (value >> 1) | (value & 0x80);
    (result, FlagEffect::new(Some(result == 0), Some(false), Some(false), Some(carry != 0)))
}

pub fn srl(value: u8) -> (u8, FlagEffect) {
    let carry = value & 1;
    let result = value >> 1;
    (result, FlagEffect::new(Some(result == 0), Some(false), Some(false), Some(carry != 0)))
}

pub fn swap(value: u8) -> (u8, FlagEffect) {
    let result = value.rotate_left(4);
    (result, FlagEffect::new(Some(result == 0), Some(false), Some(false), Some(false)))
}

/// CB `BIT b, r`. The operand is unchanged; only the flag effect matters.
pub fn bit(index: u8, value: u8) -> FlagEffect {
    let is_zero = (value >> index) & 1 == 0;
    FlagEffect::new(Some(is_zero), Some(false), Some(true), None)
}

/// CB `RES b, r`. No flags.
pub fn res(index: u8, value: u8) -> u8 {
    value & !(1 << index)
}

/// CB `SET b, r`. No flags.
pub fn set(index: u8, value: u8) -> u8 {
    value | (1 << index)
}
