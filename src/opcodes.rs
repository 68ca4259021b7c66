//! Static opcode tables (§2 "Opcode tables", §4.1).
//!
//! These tables carry only decode metadata, mnemonic, byte length, and
//! cycle cost. Execution dispatch lives in [`crate::exec`] and is keyed
//! directly on the opcode byte (a 256-entry function table, per the
//! redesign flag in §9), never on the mnemonic string; the mnemonic here
//! exists solely for disassembly and diagnostics.

use lazy_static::lazy_static;

/// Cycle cost of an instruction (§3 "Instruction"). Conditional branches,
/// calls, and returns have two costs; everything else has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycles {
    Fixed(u8),
    Branch { taken: u8, not_taken: u8 },
}

impl Cycles {
    /// The cost assuming the branch (if any) is taken, used by the
    /// analyzer/decoder, which only needs a cost to advance past.
    pub fn base(&self) -> u8 {
        match *self {
            Cycles::Fixed(c) => c,
            Cycles::Branch { not_taken, .. } => not_taken,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OpcodeInfo {
    pub mnemonic: &'static str,
    pub length: u8,
    pub cycles: Cycles,
}

impl OpcodeInfo {
    const fn new(mnemonic: &'static str, length: u8, cycles: Cycles) -> Self {
        OpcodeInfo { mnemonic, length, cycles }
    }

    const fn invalid() -> Self {
        OpcodeInfo::new("OP_0xNN", 1, Cycles::Fixed(4))
    }
}

macro_rules! op {
    ($mne:expr, $len:expr, $cyc:expr) => {
        OpcodeInfo::new($mne, $len, Cycles::Fixed($cyc))
    };
}
macro_rules! op_branch {
    ($mne:expr, $len:expr, $taken:expr, $not_taken:expr) => {
        OpcodeInfo::new($mne, $len, Cycles::Branch { taken: $taken, not_taken: $not_taken })
    };
}
macro_rules! invalid {
    () => {
        OpcodeInfo::invalid()
    };
}

lazy_static! {
    /// The main (non-CB-prefixed) 256-entry opcode table.
    pub static ref MAIN_OPCODES: [OpcodeInfo; 256] = [
        // --- 0x00 ---
        op!("NOP", 1, 4),
        op!("LD BC, d16", 3, 12),
        op!("LD (BC), A", 1, 8),
        op!("INC BC", 1, 8),
        op!("INC B", 1, 4),
        op!("DEC B", 1, 4),
        op!("LD B, d8", 2, 8),
        op!("RLCA", 1, 4),
        op!("LD (a16), SP", 3, 20),
        op!("ADD HL, BC", 1, 8),
        op!("LD A, (BC)", 1, 8),
        op!("DEC BC", 1, 8),
        op!("INC C", 1, 4),
        op!("DEC C", 1, 4),
        op!("LD C, d8", 2, 8),
        op!("RRCA", 1, 4),
        // --- 0x10 ---
        op!("STOP", 2, 4),
        op!("LD DE, d16", 3, 12),
        op!("LD (DE), A", 1, 8),
        op!("INC DE", 1, 8),
        op!("INC D", 1, 4),
        op!("DEC D", 1, 4),
        op!("LD D, d8", 2, 8),
        op!("RLA", 1, 4),
        op!("JR r8", 2, 12),
        op!("ADD HL, DE", 1, 8),
        op!("LD A, (DE)", 1, 8),
        op!("DEC DE", 1, 8),
        op!("INC E", 1, 4),
        op!("DEC E", 1, 4),
        op!("LD E, d8", 2, 8),
        op!("RRA", 1, 4),
        // --- 0x20 ---
        op_branch!("JR NZ, r8", 2, 12, 8),
        op!("LD HL, d16", 3, 12),
        op!("LD (HL+), A", 1, 8),
        op!("INC HL", 1, 8),
        op!("INC H", 1, 4),
        op!("DEC H", 1, 4),
        op!("LD H, d8", 2, 8),
        op!("DAA", 1, 4),
        op_branch!("JR Z, r8", 2, 12, 8),
        op!("ADD HL, HL", 1, 8),
        op!("LD A, (HL+)", 1, 8),
        op!("DEC HL", 1, 8),
        op!("INC L", 1, 4),
        op!("DEC L", 1, 4),
        op!("LD L, d8", 2, 8),
        op!("CPL", 1, 4),
        // --- 0x30 ---
        op_branch!("JR NC, r8", 2, 12, 8),
        op!("LD SP, d16", 3, 12),
        op!("LD (HL-), A", 1, 8),
        op!("INC SP", 1, 8),
        op!("INC (HL)", 1, 12),
        op!("DEC (HL)", 1, 12),
        op!("LD (HL), d8", 2, 12),
        op!("SCF", 1, 4),
        op_branch!("JR C, r8", 2, 12, 8),
        op!("ADD HL, SP", 1, 8),
        op!("LD A, (HL-)", 1, 8),
        op!("DEC SP", 1, 8),
        op!("INC A", 1, 4),
        op!("DEC A", 1, 4),
        op!("LD A, d8", 2, 8),
        op!("CCF", 1, 4),
        // --- 0x40-0x47: LD B, r ---
        op!("LD B, B", 1, 4), op!("LD B, C", 1, 4), op!("LD B, D", 1, 4), op!("LD B, E", 1, 4),
        op!("LD B, H", 1, 4), op!("LD B, L", 1, 4), op!("LD B, (HL)", 1, 8), op!("LD B, A", 1, 4),
        // --- 0x48-0x4F: LD C, r ---
        op!("LD C, B", 1, 4), op!("LD C, C", 1, 4), op!("LD C, D", 1, 4), op!("LD C, E", 1, 4),
        op!("LD C, H", 1, 4), op!("LD C, L", 1, 4), op!("LD C, (HL)", 1, 8), op!("LD C, A", 1, 4),
        // --- 0x50-0x57: LD D, r ---
        op!("LD D, B", 1, 4), op!("LD D, C", 1, 4), op!("LD D, D", 1, 4), op!("LD D, E", 1, 4),
        op!("LD D, H", 1, 4), op!("LD D, L", 1, 4), op!("LD D, (HL)", 1, 8), op!("LD D, A", 1, 4),
        // --- 0x58-0x5F: LD E, r ---
        op!("LD E, B", 1, 4), op!("LD E, C", 1, 4), op!("LD E, D", 1, 4), op!("LD E, E", 1, 4),
        op!("LD E, H", 1, 4), op!("LD E, L", 1, 4), op!("LD E, (HL)", 1, 8), op!("LD E, A", 1, 4),
        // --- 0x60-0x67: LD H, r ---
        op!("LD H, B", 1, 4), op!("LD H, C", 1, 4), op!("LD H, D", 1, 4), op!("LD H, E", 1, 4),
        op!("LD H, H", 1, 4), op!("LD H, L", 1, 4), op!("LD H, (HL)", 1, 8), op!("LD H, A", 1, 4),
        // --- 0x68-0x6F: LD L, r ---
        op!("LD L, B", 1, 4), op!("LD L, C", 1, 4), op!("LD L, D", 1, 4), op!("LD L, E", 1, 4),
        op!("LD L, H", 1, 4), op!("LD L, L", 1, 4), op!("LD L, (HL)", 1, 8), op!("LD L, A", 1, 4),
        // --- 0x70-0x77: LD (HL), r / HALT ---
        op!("LD (HL), B", 1, 8), op!("LD (HL), C", 1, 8), op!("LD (HL), D", 1, 8), op!("LD (HL), E", 1, 8),
        op!("LD (HL), H", 1, 8), op!("LD (HL), L", 1, 8), op!("HALT", 1, 4), op!("LD (HL), A", 1, 8),
        // --- 0x78-0x7F: LD A, r ---
        op!("LD A, B", 1, 4), op!("LD A, C", 1, 4), op!("LD A, D", 1, 4), op!("LD A, E", 1, 4),
        op!("LD A, H", 1, 4), op!("LD A, L", 1, 4), op!("LD A, (HL)", 1, 8), op!("LD A, A", 1, 4),
        // --- 0x80-0x87: ADD A, r ---
        op!("ADD A, B", 1, 4), op!("ADD A, C", 1, 4), op!("ADD A, D", 1, 4), op!("ADD A, E", 1, 4),
        op!("ADD A, H", 1, 4), op!("ADD A, L", 1, 4), op!("ADD A, (HL)", 1, 8), op!("ADD A, A", 1, 4),
        // --- 0x88-0x8F: ADC A, r ---
        op!("ADC A, B", 1, 4), op!("ADC A, C", 1, 4), op!("ADC A, D", 1, 4), op!("ADC A, E", 1, 4),
        op!("ADC A, H", 1, 4), op!("ADC A, L", 1, 4), op!("ADC A, (HL)", 1, 8), op!("ADC A, A", 1, 4),
        // --- 0x90-0x97: SUB r ---
        op!("SUB B", 1, 4), op!("SUB C", 1, 4), op!("SUB D", 1, 4), op!("SUB E", 1, 4),
        op!("SUB H", 1, 4), op!("SUB L", 1, 4), op!("SUB (HL)", 1, 8), op!("SUB A", 1, 4),
        // --- 0x98-0x9F: SBC A, r ---
        op!("SBC A, B", 1, 4), op!("SBC A, C", 1, 4), op!("SBC A, D", 1, 4), op!("SBC A, E", 1, 4),
        op!("SBC A, H", 1, 4), op!("SBC A, L", 1, 4), op!("SBC A, (HL)", 1, 8), op!("SBC A, A", 1, 4),
        // --- 0xA0-0xA7: AND r ---
        op!("AND B", 1, 4), op!("AND C", 1, 4), op!("AND D", 1, 4), op!("AND E", 1, 4),
        op!("AND H", 1, 4), op!("AND L", 1, 4), op!("AND (HL)", 1, 8), op!("AND A", 1, 4),
        // --- 0xA8-0xAF: XOR r ---
        op!("XOR B", 1, 4), op!("XOR C", 1, 4), op!("XOR D", 1, 4), op!("XOR E", 1, 4),
        op!("XOR H", 1, 4), op!("XOR L", 1, 4), op!("XOR (HL)", 1, 8), op!("XOR A", 1, 4),
        // --- 0xB0-0xB7: OR r ---
        op!("OR B", 1, 4), op!("OR C", 1, 4), op!("OR D", 1, 4), op!("OR E", 1, 4),
        op!("OR H", 1, 4), op!("OR L", 1, 4), op!("OR (HL)", 1, 8), op!("OR A", 1, 4),
        // --- 0xB8-0xBF: CP r ---
        op!("CP B", 1, 4), op!("CP C", 1, 4), op!("CP D", 1, 4), op!("CP E", 1, 4),
        op!("CP H", 1, 4), op!("CP L", 1, 4), op!("CP (HL)", 1, 8), op!("CP A", 1, 4),
        // --- 0xC0 ---
        op_branch!("RET NZ", 1, 20, 8),
        op!("POP BC", 1, 12),
        op_branch!("JP NZ, a16", 3, 16, 12),
        op!("JP a16", 3, 16),
        op_branch!("CALL NZ, a16", 3, 24, 12),
        op!("PUSH BC", 1, 16),
        op!("ADD A, d8", 2, 8),
        op!("RST 00H", 1, 16),
        op_branch!("RET Z", 1, 20, 8),
        op!("RET", 1, 16),
        op_branch!("JP Z, a16", 3, 16, 12),
        op!("PREFIX CB", 1, 4),
        op_branch!("CALL Z, a16", 3, 24, 12),
        op!("CALL a16", 3, 24),
        op!("ADC A, d8", 2, 8),
        op!("RST 08H", 1, 16),
        // --- 0xD0 ---
        op_branch!("RET NC", 1, 20, 8),
        op!("POP DE", 1, 12),
        op_branch!("JP NC, a16", 3, 16, 12),
        invalid!(),
        op_branch!("CALL NC, a16", 3, 24, 12),
        op!("PUSH DE", 1, 16),
        op!("SUB d8", 2, 8),
        op!("RST 10H", 1, 16),
        op_branch!("RET C", 1, 20, 8),
        op!("RETI", 1, 16),
        op_branch!("JP C, a16", 3, 16, 12),
        invalid!(),
        op_branch!("CALL C, a16", 3, 24, 12),
        invalid!(),
        op!("SBC A, d8", 2, 8),
        op!("RST 18H", 1, 16),
        // --- 0xE0 ---
        op!("LDH (a8), A", 2, 12),
        op!("POP HL", 1, 12),
        op!("LD (C), A", 1, 8),
        invalid!(),
        invalid!(),
        op!("PUSH HL", 1, 16),
        op!("AND d8", 2, 8),
        op!("RST 20H", 1, 16),
        op!("ADD SP, r8", 2, 16),
        op!("JP (HL)", 1, 4),
        op!("LD (a16), A", 3, 16),
        invalid!(),
        invalid!(),
        invalid!(),
        op!("XOR d8", 2, 8),
        op!("RST 28H", 1, 16),
        // --- 0xF0 ---
        op!("LDH A, (a8)", 2, 12),
        op!("POP AF", 1, 12),
        op!("LD A, (C)", 1, 8),
        op!("DI", 1, 4),
        invalid!(),
        op!("PUSH AF", 1, 16),
        op!("OR d8", 2, 8),
        op!("RST 30H", 1, 16),
        op!("LD HL, SP+r8", 2, 12),
        op!("LD SP, HL", 1, 8),
        op!("LD A, (a16)", 3, 16),
        op!("EI", 1, 4),
        invalid!(),
        invalid!(),
        op!("CP d8", 2, 8),
        op!("RST 38H", 1, 16),
    ];
}

/// Register index used inside a CB opcode's low 3 bits: 0-5 = B,C,D,E,H,L,
/// 6 = `(HL)`, 7 = A (§4.1).
pub const CB_REGISTER_NAMES: [&str; 8] = ["B", "C", "D", "E", "H", "L", "(HL)", "A"];

/// Build one CB opcode's metadata from its bit-field layout (§4.1): bits
/// 6-7 select the category (rotate/shift group, BIT, RES, SET), bits 3-5
/// select the bit index (for BIT/RES/SET) or the rotate/shift variant, and
/// bits 0-2 select the register operand (`CB_REGISTER_NAMES`). Called
/// exactly 256 times, once per table slot, by [`CB_OPCODES`]'s
/// initializer, never per decode.
fn compute_cb_opcode_info(cb_opcode: u8) -> OpcodeInfo {
    let reg = cb_opcode & 0x07;
    let is_hl = reg == 6;
    let category = cb_opcode >> 6;
    let sub = (cb_opcode >> 3) & 0x07;
    let reg_name = CB_REGISTER_NAMES[reg as usize];

    let (mnemonic_owned, cycles): (String, u8) = match category {
        0 => {
            const ROTATE_NAMES: [&str; 8] = ["RLC", "RRC", "RL", "RR", "SLA", "SRA", "SWAP", "SRL"];
            let name = ROTATE_NAMES[sub as usize];
            (format!("{name} {reg_name}"), if is_hl { 16 } else { 8 })
        }
        1 => (format!("BIT {sub}, {reg_name}"), if is_hl { 12 } else { 8 }),
        2 => (format!("RES {sub}, {reg_name}"), if is_hl { 16 } else { 8 }),
        3 => (format!("SET {sub}, {reg_name}"), if is_hl { 16 } else { 8 }),
        _ => unreachable!("2-bit category"),
    };

    // Leaked once per table slot at `CB_OPCODES`'s one-time initialization,
    // bounded by the 256 possible CB opcodes, never per decode.
    let mnemonic: &'static str = Box::leak(mnemonic_owned.into_boxed_str());
    OpcodeInfo::new(mnemonic, 2, Cycles::Fixed(cycles))
}

lazy_static! {
    /// The CB-prefixed 256-entry opcode table, built once from
    /// [`compute_cb_opcode_info`] instead of recomputing (and leaking) a
    /// mnemonic string on every decode of a CB-prefixed instruction.
    pub static ref CB_OPCODES: [OpcodeInfo; 256] = {
        let mut table = [OpcodeInfo::invalid(); 256];
        for (cb_opcode, slot) in table.iter_mut().enumerate() {
            *slot = compute_cb_opcode_info(cb_opcode as u8);
        }
        table
    };
}

/// CB-prefixed opcode metadata (§4.1), a plain lookup into `CB_OPCODES`.
pub fn cb_opcode_info(cb_opcode: u8) -> OpcodeInfo {
    CB_OPCODES[cb_opcode as usize]
}
