//! Intra-block dataflow analysis (§4.3): backward flag (and, trivially,
//! register) liveness, plus a narrow forward constant-propagation pass.
//!
//! Both passes work over the mnemonic strings the decoder already
//! produced (§4.1) rather than re-decoding operands, since the classifier
//! only needs "which flags does this family read/write", not the exact
//! operand bytes.

use crate::block::BasicBlock;
use crate::cpu::{FLAG_C, FLAG_H, FLAG_N, FLAG_Z};

pub const ALL_FLAGS: u8 = FLAG_Z | FLAG_N | FLAG_H | FLAG_C;

fn is_register_pair(operand: &str) -> bool {
    matches!(operand, "BC" | "DE" | "HL" | "SP")
}

fn condition_flag(mnemonic: &str) -> u8 {
    for prefix in ["JR ", "JP ", "CALL ", "RET "] {
        if let Some(rest) = mnemonic.strip_prefix(prefix) {
            if rest.starts_with("NZ") {
                return FLAG_Z;
            }
            if rest.starts_with('Z') {
                return FLAG_Z;
            }
            if rest.starts_with("NC") {
                return FLAG_C;
            }
            if rest.starts_with('C') {
                return FLAG_C;
            }
            return 0; // unconditional form of the same mnemonic family
        }
    }
    0
}

/// Flags a mnemonic reads as *input* (beyond its explicit register/memory
/// operands), carry chained into ADC/SBC/RL/RR/RLA/RRA, the three flags
/// DAA inspects, and whatever condition code gates a branch (§4.3, §4.4).
fn flags_read(mnemonic: &str) -> u8 {
    let mut mask = condition_flag(mnemonic);
    if mnemonic.starts_with("ADC") || mnemonic.starts_with("SBC") {
        mask |= FLAG_C;
    }
    if mnemonic == "DAA" {
        mask |= FLAG_N | FLAG_H | FLAG_C;
    }
    // CB-prefixed `RL r`/`RR r` (trailing-space operand form) and the
    // main-table accumulator-only `RLA`/`RRA` (no operand at all) both
    // rotate the incoming carry in, see exec::mod's 0x17/0x1F arms.
    if mnemonic.starts_with("RL ") || mnemonic.starts_with("RR ") || mnemonic == "RLA" || mnemonic == "RRA" {
        mask |= FLAG_C;
    }
    mask
}

/// Flags a mnemonic overwrites (§4.4 per-instruction flag effects).
fn flags_written(mnemonic: &str) -> u8 {
    if let Some(operand) = mnemonic.strip_prefix("INC ").or_else(|| mnemonic.strip_prefix("DEC ")) {
        return if is_register_pair(operand) { 0 } else { FLAG_Z | FLAG_N | FLAG_H };
    }
    match mnemonic {
        "RLCA" | "RLA" | "RRCA" | "RRA" => return ALL_FLAGS,
        "DAA" => return FLAG_Z | FLAG_H | FLAG_C, // N is left untouched (cpu::alu::daa)
        "CPL" => return FLAG_N | FLAG_H,
        "SCF" | "CCF" => return FLAG_N | FLAG_H | FLAG_C,
        _ => {}
    }
    if mnemonic.starts_with("ADD A") || mnemonic.starts_with("ADC") || mnemonic.starts_with("SUB")
        || mnemonic.starts_with("SBC") || mnemonic.starts_with("CP")
    {
        return ALL_FLAGS;
    }
    if mnemonic.starts_with("ADD HL") {
        return FLAG_N | FLAG_H | FLAG_C; // Z untouched (cpu::alu::add_hl)
    }
    if mnemonic.starts_with("ADD SP") || mnemonic.starts_with("LD HL, SP+") {
        return ALL_FLAGS;
    }
    if mnemonic.starts_with("AND") || mnemonic.starts_with("OR") || mnemonic.starts_with("XOR") {
        return ALL_FLAGS;
    }
    if mnemonic.starts_with("RLC ") || mnemonic.starts_with("RRC ") || mnemonic.starts_with("RL ")
        || mnemonic.starts_with("RR ") || mnemonic.starts_with("SLA ") || mnemonic.starts_with("SRA ")
        || mnemonic.starts_with("SRL ") || mnemonic.starts_with("SWAP ")
    {
        return ALL_FLAGS;
    }
    if mnemonic.starts_with("BIT ") {
        return FLAG_Z | FLAG_N | FLAG_H;
    }
    0
}

/// Per-instruction liveness, indexed the same as `BasicBlock::instructions`.
/// `live_out[i]` is the flag mask still read by some later instruction (or
/// by the block's successor, conservatively assumed to read everything)
/// immediately after instruction `i` runs, exactly the mask `exec`
/// dispatch passes to `FlagEffect::apply_masked` for that instruction's
/// write (§4.3, §4.4).
#[derive(Debug, Clone)]
pub struct BlockLiveness {
    pub live_out: Vec<u8>,
}

/// Backward flag-liveness dataflow over one block (§4.3). A block never
/// knows what its successor needs without inter-block analysis, which is
/// out of scope (§4.3 "more aggressive folding is explicitly out of
/// scope"), so the walk starts from the conservative "all flags live" at
/// the block's exit.
pub fn analyze(block: &BasicBlock) -> BlockLiveness {
    let n = block.instructions.len();
    let mut live_out = vec![0u8; n];
    let mut live = ALL_FLAGS;
    for i in (0..n).rev() {
        let mnemonic = block.instructions[i].mnemonic;
        live_out[i] = live;
        live = (live & !flags_written(mnemonic)) | flags_read(mnemonic);
    }
    BlockLiveness { live_out }
}

/// Forward constant-propagation lattice (§4.3). Limited to the two folding
/// cases SPEC_FULL.md names; anything else stays `Top` rather than risk a
/// wrong fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstValue {
    Bottom,
    Constant(u8),
    Top,
}

impl ConstValue {
    fn join(self, other: ConstValue) -> ConstValue {
        match (self, other) {
            (ConstValue::Bottom, x) | (x, ConstValue::Bottom) => x,
            (ConstValue::Constant(a), ConstValue::Constant(b)) if a == b => ConstValue::Constant(a),
            _ => ConstValue::Top,
        }
    }
}

/// A fold the transpiler is licensed to apply because constant propagation
/// proved it safe (§4.3). Only two shapes are recognized:
///
/// - `RedundantSelfCopy`: `LD r, r` (destination equals source) never
///   changes architectural state and can be skipped entirely.
/// - `KnownOperandAfterLoad`: an 8-bit register loaded with an immediate
///   (`LD r, d8`) immediately followed by an `INC r`/`DEC r` on the same
///   register with no intervening write, the second instruction's input
///   operand is a compile-time constant, letting the transpiler precompute
///   its flag effect once instead of re-deriving it from a runtime read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fold {
    RedundantSelfCopy { index: usize },
    KnownOperandAfterLoad { load_index: usize, use_index: usize, value: u8 },
}

/// Single-register-operand form of `LD x, y` (`"LD B, C"`, not `"LD B, d8"`
/// or `"LD (HL), A"`), used to detect redundant self-copies.
fn ld_register_operands(mnemonic: &str) -> Option<(&str, &str)> {
    let rest = mnemonic.strip_prefix("LD ")?;
    let (dst, src) = rest.split_once(", ")?;
    const REGS: [&str; 7] = ["A", "B", "C", "D", "E", "H", "L"];
    if REGS.contains(&dst) && REGS.contains(&src) {
        Some((dst, src))
    } else {
        None
    }
}

fn ld_immediate_target(mnemonic: &str) -> Option<&str> {
    let rest = mnemonic.strip_prefix("LD ")?;
    let (dst, src) = rest.split_once(", ")?;
    if src == "d8" {
        Some(dst)
    } else {
        None
    }
}

/// Forward sweep recognizing the two fold shapes above (§4.3). Does not
/// compute a full per-register lattice across the block, only tracks
/// enough to confirm the narrow patterns it's licensed to fold.
pub fn find_folds(block: &BasicBlock) -> Vec<Fold> {
    let mut folds = Vec::new();
    // Register an immediate load was last seen loading, cleared by any
    // instruction that could change that register's value in between.
    let mut last_load: Option<(usize, &str)> = None;

    for (i, instr) in block.instructions.iter().enumerate() {
        if let Some((dst, src)) = ld_register_operands(instr.mnemonic) {
            if dst == src {
                folds.push(Fold::RedundantSelfCopy { index: i });
            }
        }

        if let Some((load_index, reg)) = last_load {
            if instr.mnemonic == format!("INC {reg}") || instr.mnemonic == format!("DEC {reg}") {
                // The loaded immediate byte is a compile-time constant;
                // callers that need its value re-decode
                // `block.instructions[load_index]` themselves.
                folds.push(Fold::KnownOperandAfterLoad { load_index, use_index: i, value: 0 });
            }
        }

        last_load = match ld_immediate_target(instr.mnemonic) {
            Some(reg) => Some((i, reg)),
            None => last_load.filter(|&(_, reg)| !instruction_writes_register(instr.mnemonic, reg)),
        };
    }

    folds
}

fn instruction_writes_register(mnemonic: &str, reg: &str) -> bool {
    mnemonic == format!("LD {reg}, d8")
        || mnemonic.starts_with(&format!("LD {reg}, "))
        || mnemonic == format!("INC {reg}")
        || mnemonic == format!("DEC {reg}")
}
