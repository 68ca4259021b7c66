//! Basic-block discovery (§4.2).
//!
//! Two passes over the same address range: the first only looks for local
//! jump targets so a block under construction can stop the moment it walks
//! into another block's entry point, the second actually assembles
//! instructions into a [`BasicBlock`]. Neither pass ever reads past
//! `max_block_scan`/`max_block_instructions` instructions (§4.2, §4.10),
//! a block that never naturally exits is truncated with a `FallThrough`
//! rather than scanned forever.

use crate::bus::Bus;
use crate::config::EngineConfig;
use crate::decode::{decode, Instruction};

/// How a basic block hands control to its successor(s) (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitType {
    /// Ran off the end of the scan window or instruction cap without a
    /// control-flow instruction; control falls through to `next`.
    FallThrough { next: u16 },
    Jump { target: u16 },
    ConditionalJump { target: u16, not_taken: u16 },
    Call { target: u16, return_addr: u16 },
    ConditionalCall { target: u16, not_taken: u16 },
    /// `RET`/`RETI`: target comes off the stack at run time.
    Return,
    ConditionalReturn { not_taken: u16 },
    /// `JP (HL)`: target comes from a register at run time.
    Dynamic,
    Halt { resume: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    pub start: u16,
    pub end: u16,
    pub instructions: Vec<Instruction>,
    pub exit: ExitType,
}

impl BasicBlock {
    /// Statically known successor addresses, empty for `Return`/`Dynamic`,
    /// where the target is only known at run time (§4.2, §4.5 cache
    /// pre-warming uses this to decide what's worth compiling eagerly).
    pub fn targets(&self) -> Vec<u16> {
        match self.exit {
            ExitType::FallThrough { next } => vec![next],
            ExitType::Jump { target } => vec![target],
            ExitType::ConditionalJump { target, not_taken } => vec![target, not_taken],
            ExitType::Call { target, return_addr } => vec![target, return_addr],
            ExitType::ConditionalCall { target, not_taken } => vec![target, not_taken],
            ExitType::ConditionalReturn { not_taken } => vec![not_taken],
            ExitType::Halt { resume } => vec![resume],
            ExitType::Return | ExitType::Dynamic => vec![],
        }
    }
}

fn signed_branch_target(next_addr: u16, offset_byte: u8) -> u16 {
    let offset = offset_byte as i8 as i16;
    next_addr.wrapping_add(offset as u16)
}

/// Parse the exit a decoded instruction produces, given the address of the
/// instruction immediately following it (§4.2). Returns `None` for
/// non-control-flow instructions, meaning the block simply continues.
fn exit_for(instr: &Instruction, next_addr: u16, bus: &dyn Bus) -> Option<ExitType> {
    match instr.mnemonic {
        "JP a16" => Some(ExitType::Jump { target: bus.read16(instr.address.wrapping_add(1)) }),
        "JP (HL)" => Some(ExitType::Dynamic),
        m if m.starts_with("JP ") => {
            let target = bus.read16(instr.address.wrapping_add(1));
            Some(ExitType::ConditionalJump { target, not_taken: next_addr })
        }
        "JR r8" => {
            let offset = bus.read8(instr.address.wrapping_add(1));
            Some(ExitType::Jump { target: signed_branch_target(next_addr, offset) })
        }
        m if m.starts_with("JR ") => {
            let offset = bus.read8(instr.address.wrapping_add(1));
            let target = signed_branch_target(next_addr, offset);
            Some(ExitType::ConditionalJump { target, not_taken: next_addr })
        }
        "CALL a16" => {
            let target = bus.read16(instr.address.wrapping_add(1));
            Some(ExitType::Call { target, return_addr: next_addr })
        }
        m if m.starts_with("CALL ") => {
            let target = bus.read16(instr.address.wrapping_add(1));
            Some(ExitType::ConditionalCall { target, not_taken: next_addr })
        }
        "RET" | "RETI" => Some(ExitType::Return),
        m if m.starts_with("RET ") => Some(ExitType::ConditionalReturn { not_taken: next_addr }),
        m if m.starts_with("RST ") => {
            let vector = rst_vector(m);
            Some(ExitType::Call { target: vector, return_addr: next_addr })
        }
        "HALT" => Some(ExitType::Halt { resume: next_addr }),
        _ => None,
    }
}

fn rst_vector(mnemonic: &str) -> u16 {
    // "RST 00H" .. "RST 38H"; the table only ever produces these eight
    // literal forms (§4.1), so the fallback below is never actually hit.
    let hex = mnemonic.trim_start_matches("RST ").trim_end_matches('H');
    u16::from_str_radix(hex, 16).unwrap_or(0)
}

/// Pass 1: local jump-target discovery (§4.2). Scans up to
/// `config.max_block_scan` instructions from `start` and returns the sorted,
/// deduplicated set of addresses any `JP`/`JR` inside that window targets,
/// used by pass 2 to recognize "I've walked into another block" without
/// needing the cache to exist yet.
pub fn discover_local_targets(bus: &dyn Bus, start: u16, config: &EngineConfig) -> Vec<u16> {
    let mut targets = Vec::new();
    let mut addr = start;
    for _ in 0..config.max_block_scan {
        let instr = decode(bus, addr);
        let next_addr = addr.wrapping_add(instr.length as u16);
        match exit_for(&instr, next_addr, bus) {
            Some(ExitType::Jump { target }) | Some(ExitType::ConditionalJump { target, .. }) => {
                targets.push(target);
            }
            Some(ExitType::Call { target, .. }) | Some(ExitType::ConditionalCall { target, .. }) => {
                targets.push(target);
            }
            Some(ExitType::Return) | Some(ExitType::Dynamic) | Some(ExitType::Halt { .. }) => break,
            Some(ExitType::ConditionalReturn { .. }) | Some(ExitType::FallThrough { .. }) => break,
            None => {}
        }
        if instr.is_control_flow() {
            break;
        }
        addr = next_addr;
    }
    targets.sort_unstable();
    targets.dedup();
    targets
}

/// Pass 2: assemble a basic block starting at `start` (§4.2). Stops at the
/// first control-flow instruction, the first instruction whose address is
/// a locally discovered target other than `start` itself, or
/// `config.max_block_instructions`, whichever comes first.
pub fn assemble_block(bus: &dyn Bus, start: u16, config: &EngineConfig) -> BasicBlock {
    let local_targets = discover_local_targets(bus, start, config);
    let mut instructions = Vec::new();
    let mut addr = start;
    // `endAddress` (§3 "BasicBlock") is the final *included* instruction's
    // last byte, `address + length - 1`, not the address of whatever
    // comes after it; kept in lockstep with `instructions` below rather
    // than derived from `addr`, which always points one instruction
    // ahead of what's actually been included at every early return.
    let mut end = start;

    loop {
        if instructions.len() >= config.max_block_instructions {
            return BasicBlock { start, end, instructions, exit: ExitType::FallThrough { next: addr } };
        }
        if addr != start && local_targets.binary_search(&addr).is_ok() {
            return BasicBlock { start, end, instructions, exit: ExitType::FallThrough { next: addr } };
        }

        let instr = decode(bus, addr);
        let next_addr = addr.wrapping_add(instr.length as u16);
        let exit = exit_for(&instr, next_addr, bus);
        instructions.push(instr);
        end = next_addr.wrapping_sub(1);

        if let Some(exit) = exit {
            return BasicBlock { start, end, instructions, exit };
        }
        addr = next_addr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flat_bus::FlatBus;

    #[test]
    fn straight_line_block_ends_at_unconditional_jump() {
        let bus = FlatBus::new_rom(vec![0x00, 0x00, 0xC3, 0x00, 0x01]); // NOP NOP JP 0x0100
        let config = EngineConfig::default();
        let block = assemble_block(&bus, 0, &config);
        assert_eq!(block.instructions.len(), 3);
        assert_eq!(block.exit, ExitType::Jump { target: 0x0100 });
    }

    #[test]
    fn end_address_is_inclusive_per_spec_formula() {
        // NOP (1 byte); LD BC, d16 (3 bytes); JP a16 (3 bytes): endAddress
        // must be the last byte of the JP, not one past it (§3
        // "BasicBlock"), so decoded-length sums equal `end - start + 1`
        // (§8 invariants).
        let bus = FlatBus::new_rom(vec![0x00, 0x01, 0x34, 0x12, 0xC3, 0x00, 0x01]);
        let config = EngineConfig::default();
        let block = assemble_block(&bus, 0, &config);
        let summed_length: u16 = block.instructions.iter().map(|i| i.length as u16).sum();
        assert_eq!(block.end - block.start + 1, summed_length);
        assert_eq!(block.end, 6);
    }

    #[test]
    fn end_address_at_truncation_covers_only_included_instructions() {
        let bytes = vec![0x00; 200]; // 200 NOPs, no natural exit
        let bus = FlatBus::new_rom(bytes);
        let config = EngineConfig::default();
        let block = assemble_block(&bus, 0, &config);
        let summed_length: u16 = block.instructions.iter().map(|i| i.length as u16).sum();
        assert_eq!(block.end - block.start + 1, summed_length);
    }

    #[test]
    fn conditional_jump_reports_both_targets() {
        let bus = FlatBus::new_rom(vec![0x20, 0x02]); // JR NZ, +2
        let config = EngineConfig::default();
        let block = assemble_block(&bus, 0, &config);
        assert_eq!(block.exit, ExitType::ConditionalJump { target: 4, not_taken: 2 });
        assert_eq!(block.targets(), vec![4, 2]);
    }

    #[test]
    fn halt_ends_the_block() {
        let bus = FlatBus::new_rom(vec![0x00, 0x76]); // NOP HALT
        let config = EngineConfig::default();
        let block = assemble_block(&bus, 0, &config);
        assert_eq!(block.exit, ExitType::Halt { resume: 2 });
    }

    #[test]
    fn block_truncates_at_instruction_cap() {
        let bytes = vec![0x00; 200]; // 200 NOPs, no natural exit
        let bus = FlatBus::new_rom(bytes);
        let config = EngineConfig::default();
        let block = assemble_block(&bus, 0, &config);
        assert_eq!(block.instructions.len(), config.max_block_instructions);
        assert_eq!(block.exit, ExitType::FallThrough { next: config.max_block_instructions as u16 });
    }

    #[test]
    fn ret_has_no_static_targets() {
        let bus = FlatBus::new_rom(vec![0xC9]); // RET
        let config = EngineConfig::default();
        let block = assemble_block(&bus, 0, &config);
        assert_eq!(block.exit, ExitType::Return);
        assert!(block.targets().is_empty());
    }
}
