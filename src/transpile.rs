//! Block transpilation (§4.4): compiling a [`BasicBlock`] plus its
//! liveness results into a [`CompiledBlock`] the engine can run directly,
//! without re-analyzing anything on every pass through it.

use crate::block::{assemble_block, BasicBlock, ExitType};
use crate::bus::Bus;
use crate::config::EngineConfig;
use crate::cpu::CpuState;
use crate::decode::{decode, Instruction};
use crate::exec::{self, StepEffect};
use crate::liveness::{analyze, find_folds, Fold, ALL_FLAGS};
use crate::opcodes::Cycles;

/// The three shapes a compiled block can hand back to its caller (§4.4/§6):
/// straight back into the dispatch loop, into a halted CPU, or into a
/// stopped one. Every exit a block can have resolves to exactly one of
/// these once its final instruction has actually run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    Continue { next_pc: u16, cycles: u32 },
    Halted { resume_pc: u16, cycles: u32 },
    Stopped { cycles: u32 },
}

#[derive(Debug, Clone)]
pub struct CompiledBlock {
    pub start: u16,
    pub instructions: Vec<Instruction>,
    pub live_masks: Vec<u8>,
    pub exit: ExitType,
    /// Per-instruction: `true` where `find_folds` proved the instruction a
    /// redundant self-copy (§4.3), `run` skips dispatch entirely for it,
    /// since `LD r, r` never changes architectural state.
    elided: Vec<bool>,
    emulate_halt_bug: bool,
}

fn taken_extra_cycles(cycles: Cycles) -> u32 {
    match cycles {
        Cycles::Fixed(_) => 0,
        Cycles::Branch { taken, not_taken } => (taken as u32).saturating_sub(not_taken as u32),
    }
}

impl CompiledBlock {
    /// Assemble a `CompiledBlock` from its parts. `elided` and
    /// `emulate_halt_bug` are private, this is the one constructor both
    /// `transpile::compile` (the cached ROM path, §4.4/§4.5) and
    /// `jit::compile_uncached` (the uncached WRAM/HRAM path, §4.7) go
    /// through, so the two compile paths can never disagree about the
    /// block's shape.
    pub(crate) fn from_parts(
        start: u16,
        instructions: Vec<Instruction>,
        live_masks: Vec<u8>,
        exit: ExitType,
        elided: Vec<bool>,
        emulate_halt_bug: bool,
    ) -> Self {
        CompiledBlock { start, instructions, live_masks, exit, elided, emulate_halt_bug }
    }

    /// One past the last byte this block's instruction stream covers,
    /// used by the cache's reverse invalidation index (§4.5).
    pub fn end(&self) -> u16 {
        self.instructions.last().map(|i| i.address.wrapping_add(i.length as u16)).unwrap_or(self.start)
    }

    /// Interpret every instruction in sequence, then resolve the block's
    /// exit against whatever the final instruction's [`StepEffect`] turned
    /// out to be at run time (§4.2, §4.4).
    pub fn run(&self, state: &mut CpuState, bus: &mut dyn Bus) -> BlockOutcome {
        let mut cycles = 0u32;
        let mut effect = StepEffect::None;

        for (i, instr) in self.instructions.iter().enumerate() {
            if self.elided[i] {
                // `LD r, r`: proven a no-op by constant analysis (§4.3);
                // not even dispatched, just charged its base cycles.
                cycles += instr.cycles.base() as u32;
                continue;
            }
            effect = exec::execute(state, bus, instr, self.live_masks[i], self.emulate_halt_bug);
            cycles += instr.cycles.base() as u32;
        }

        let last_cycles = self.instructions.last().map(|i| i.cycles).unwrap_or(Cycles::Fixed(0));

        match self.exit {
            ExitType::FallThrough { next } => BlockOutcome::Continue { next_pc: next, cycles },
            ExitType::Jump { target } => BlockOutcome::Continue { next_pc: target, cycles },
            ExitType::ConditionalJump { target, not_taken } => match effect {
                StepEffect::Taken => {
                    BlockOutcome::Continue { next_pc: target, cycles: cycles + taken_extra_cycles(last_cycles) }
                }
                StepEffect::NotTaken => BlockOutcome::Continue { next_pc: not_taken, cycles },
                _ => unreachable!("conditional jump always reports Taken or NotTaken"),
            },
            ExitType::Call { target, .. } => BlockOutcome::Continue { next_pc: target, cycles },
            ExitType::ConditionalCall { target, not_taken } => match effect {
                StepEffect::Taken => {
                    BlockOutcome::Continue { next_pc: target, cycles: cycles + taken_extra_cycles(last_cycles) }
                }
                StepEffect::NotTaken => BlockOutcome::Continue { next_pc: not_taken, cycles },
                _ => unreachable!("conditional call always reports Taken or NotTaken"),
            },
            ExitType::Return | ExitType::Dynamic => match effect {
                StepEffect::Dynamic(target) => BlockOutcome::Continue { next_pc: target, cycles },
                _ => unreachable!("RET/RETI/JP (HL) always resolve to a dynamic target"),
            },
            ExitType::ConditionalReturn { not_taken } => match effect {
                StepEffect::Dynamic(target) => {
                    BlockOutcome::Continue { next_pc: target, cycles: cycles + taken_extra_cycles(last_cycles) }
                }
                StepEffect::NotTaken => BlockOutcome::Continue { next_pc: not_taken, cycles },
                _ => unreachable!("conditional return always reports Dynamic or NotTaken"),
            },
            ExitType::Halt { resume } => {
                if state.stopped {
                    BlockOutcome::Stopped { cycles }
                } else if state.halted {
                    BlockOutcome::Halted { resume_pc: resume, cycles }
                } else {
                    // Halt bug triggered (`exec::execute` left `halted`
                    // false): real hardware re-reads the opcode at `resume`
                    // without having advanced PC past it, so it runs twice
                    // before execution continues normally (§9). We can't
                    // just hand the engine `resume` and let the *next*
                    // block repeat it, that block may contain more than
                    // the one duplicated instruction, so the duplicate
                    // fetch is executed here, once, inline.
                    log::trace!("HALT bug triggered at {resume:#06X}, re-running its successor inline");
                    let dup = decode(bus, resume);
                    exec::execute(state, bus, &dup, ALL_FLAGS, self.emulate_halt_bug);
                    cycles += dup.cycles.base() as u32;
                    BlockOutcome::Continue { next_pc: resume, cycles }
                }
            }
        }
    }
}

/// Redundant-self-copy indices from `find_folds`, as a per-instruction mask
/// parallel to `block.instructions` (§4.3, §4.4 "dead writes become
/// `// elided`" generalized to this one whole-instruction fold).
pub(crate) fn elision_mask(block: &BasicBlock) -> Vec<bool> {
    let mut elided = vec![false; block.instructions.len()];
    for fold in find_folds(block) {
        if let Fold::RedundantSelfCopy { index } = fold {
            elided[index] = true;
        }
    }
    elided
}

/// Full analyzer + liveness + compile path, used for blocks whose start
/// address is backed by immutable ROM (§4.4, §4.5).
pub fn compile(bus: &dyn Bus, start: u16, config: &EngineConfig) -> CompiledBlock {
    let block: BasicBlock = assemble_block(bus, start, config);
    let liveness = analyze(&block);
    let elided = elision_mask(&block);
    CompiledBlock::from_parts(block.start, block.instructions, liveness.live_out, block.exit, elided, config.emulate_halt_bug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flat_bus::FlatBus;

    #[test]
    fn straight_line_block_reports_jump_target() {
        let bus = FlatBus::new_rom(vec![0x00, 0xC3, 0x00, 0x01]); // NOP; JP 0x0100
        let config = EngineConfig::default();
        let compiled = compile(&bus, 0, &config);
        let mut state = CpuState::new();
        let mut bus2 = FlatBus::new_rom(vec![0x00, 0xC3, 0x00, 0x01]);
        let outcome = compiled.run(&mut state, &mut bus2);
        assert_eq!(outcome, BlockOutcome::Continue { next_pc: 0x0100, cycles: 4 + 16 });
    }

    #[test]
    fn taken_conditional_jump_charges_extra_cycles() {
        let mut rom = vec![0x00; 0x20];
        rom[0] = 0x28; // JR Z, +2
        rom[1] = 0x02;
        let config = EngineConfig::default();
        let compiled = compile(&FlatBus::new_rom(rom.clone()), 0, &config);
        let mut state = CpuState::new();
        state.set_flag(crate::cpu::constants::FLAG_Z, true);
        let mut bus = FlatBus::new_rom(rom);
        let outcome = compiled.run(&mut state, &mut bus);
        assert_eq!(outcome, BlockOutcome::Continue { next_pc: 4, cycles: 12 });
    }

    #[test]
    fn halt_reports_halted_outcome() {
        let config = EngineConfig::default();
        let compiled = compile(&FlatBus::new_rom(vec![0x76]), 0, &config);
        let mut state = CpuState::new();
        let mut bus = FlatBus::new_rom(vec![0x76]);
        let outcome = compiled.run(&mut state, &mut bus);
        assert_eq!(outcome, BlockOutcome::Halted { resume_pc: 1, cycles: 4 });
        assert!(state.halted);
    }

    #[test]
    fn halt_bug_runs_the_following_instruction_twice() {
        let config = EngineConfig { emulate_halt_bug: true, ..EngineConfig::default() };
        let rom = vec![0x76, 0x3C]; // HALT; INC A
        let compiled = compile(&FlatBus::new_rom(rom.clone()), 0, &config);
        let mut state = CpuState::new(); // ime = false
        let mut bus = FlatBus::new_rom(rom);
        bus.write8(crate::bus::IE_ADDR, 0x01);
        bus.write8(crate::bus::IF_ADDR, 0x01);
        let outcome = compiled.run(&mut state, &mut bus);
        assert_eq!(outcome, BlockOutcome::Continue { next_pc: 1, cycles: 4 + 4 });
        assert!(!state.halted);
        // The duplicate fetch already ran `INC A` once, inline, within this
        // block; the engine's next iteration re-fetches address 1 and runs
        // it again for real, incrementing A a second time.
        assert_eq!(state.a, 1);
    }

    #[test]
    fn redundant_self_copy_is_elided_but_still_charged_its_cycles() {
        let config = EngineConfig::default();
        let compiled = compile(&FlatBus::new_rom(vec![0x7F, 0xC9]), 0, &config); // LD A, A; RET
        assert!(compiled.elided[0]);
        let mut state = CpuState::new();
        state.a = 0x42;
        state.sp = 0xFFFE;
        let mut bus = FlatBus::new_rom(vec![0x7F, 0xC9]);
        let outcome = compiled.run(&mut state, &mut bus);
        assert_eq!(state.a, 0x42);
        assert_eq!(outcome, BlockOutcome::Continue { next_pc: 0, cycles: 4 + 16 });
    }

    #[test]
    fn scf_then_rla_propagates_the_carry_scf_just_set() {
        // SCF sets C=1; RLA must rotate that carry into A's bit 0, not a
        // dead/stale carry value liveness wrongly elided because it
        // failed to recognize `RLA` (no trailing-space operand, unlike
        // CB `RL r`) as a carry-reading instruction.
        let config = EngineConfig::default();
        let rom = vec![0x37, 0x17, 0xC9]; // SCF; RLA; RET
        let compiled = compile(&FlatBus::new_rom(rom.clone()), 0, &config);
        let mut state = CpuState::new();
        state.a = 0x00;
        state.sp = 0xFFFE;
        let mut bus = FlatBus::new_rom(rom);
        compiled.run(&mut state, &mut bus);
        assert_eq!(state.a, 0x01);
    }
}
