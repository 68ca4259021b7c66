//! The recompiler engine (§4.6): fetch-or-compile at `PC`, run the block,
//! route its exit, service interrupts between blocks, repeat until the
//! cycle budget for this call is spent.

use std::rc::Rc;

use crate::bus::Bus;
use crate::cache::BlockCache;
use crate::config::EngineConfig;
use crate::cpu::CpuState;
use crate::diagnostics::Diagnostics;
use crate::error::{RecompilerError, RecompilerResult};
use crate::interrupt;
use crate::jit;
use crate::transpile::{BlockOutcome, CompiledBlock};

pub struct RecompilerEngine {
    pub state: CpuState,
    config: EngineConfig,
    cache: BlockCache,
    diagnostics: Diagnostics,
}

impl RecompilerEngine {
    pub fn new(config: EngineConfig) -> Self {
        RecompilerEngine { state: CpuState::new(), config, cache: BlockCache::new(), diagnostics: Diagnostics::new() }
    }

    pub fn with_state(state: CpuState, config: EngineConfig) -> Self {
        RecompilerEngine { state, config, cache: BlockCache::new(), diagnostics: Diagnostics::new() }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn cached_block_count(&self) -> usize {
        self.cache.len()
    }

    /// Fetch or compile the block at `PC` (§4.5/§4.7), rejecting a start
    /// address that falls in a region that can never hold code (§7 "Invalid
    /// memory region for code"). The cache is only ever consulted for an
    /// immutable (ROM) start address; anything else writable goes through
    /// the uncached JIT path, and anything neither goes through the cache
    /// nor is writable memory (I/O registers, `IE`) is rejected outright.
    fn fetch(&mut self, bus: &dyn Bus) -> RecompilerResult<Rc<CompiledBlock>> {
        let addr = self.state.pc;
        let kind = bus.kind(addr);
        if !kind.is_valid_code_region() {
            log::error!("PC={addr:#06X} fell into a non-code region ({kind:?}), halting");
            return Err(RecompilerError::InvalidCodeRegion { addr, kind });
        }
        let block = if kind.is_immutable_code_source() {
            self.cache.get_or_compile(bus, addr, &self.config)
        } else {
            Rc::new(jit::compile_uncached(bus, addr, &self.config))
        };
        for instr in &block.instructions {
            if instr.mnemonic == "OP_0xNN" {
                self.diagnostics.record_undefined(instr.raw_byte(), instr.address);
            }
        }
        Ok(block)
    }

    /// Run until at least `cycle_budget` cycles have elapsed; returns the
    /// number actually run (it can overshoot by up to one block's cost,
    /// since a block is never interrupted mid-execution, §4.6).
    pub fn run(&mut self, bus: &mut dyn Bus, cycle_budget: u32) -> RecompilerResult<u32> {
        let mut cycles_run = 0u32;

        while cycles_run < cycle_budget {
            // Servicing (which also wakes a halted CPU on a pending,
            // enabled interrupt, §5) always happens before the next
            // block is fetched, so a freshly woken CPU runs its ISR
            // first rather than falling through to `resume_pc` (§4.6).
            let serviced = interrupt::service(&mut self.state, bus, &self.config);
            if serviced > 0 {
                cycles_run += serviced;
                continue;
            }

            if self.state.stopped {
                break;
            }
            if self.state.halted {
                cycles_run += 4;
                continue;
            }

            let block = self.fetch(bus)?;
            let outcome = block.run(&mut self.state, bus);
            cycles_run += match outcome {
                BlockOutcome::Continue { next_pc, cycles } => {
                    self.state.pc = next_pc;
                    cycles
                }
                BlockOutcome::Halted { resume_pc, cycles } => {
                    self.state.pc = resume_pc;
                    cycles
                }
                BlockOutcome::Stopped { cycles } => cycles,
            };

            // EI's one-instruction delay is approximated at block
            // granularity: IME becomes live once the block containing the
            // instruction after EI has finished (§4.4 `EI`, §9).
            if self.state.ime_scheduled {
                self.state.ime = true;
                self.state.ime_scheduled = false;
            }
        }

        Ok(cycles_run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flat_bus::FlatBus;

    #[test]
    fn runs_a_tight_loop_and_reuses_the_cached_block() {
        // 0x0100: JR 0x0100 (infinite loop)
        let mut bus = FlatBus::new_rom(vec![0x00; 0x100]);
        bus.rom_mut().extend_from_slice(&[0x18, 0xFE]);
        let mut engine = RecompilerEngine::with_state(CpuState::post_boot_dmg(), EngineConfig::default());
        engine.run(&mut bus, 1000).unwrap();
        assert_eq!(engine.cached_block_count(), 1);
        assert_eq!(engine.state.pc, 0x0100);
    }

    #[test]
    fn halted_cpu_wakes_on_pending_enabled_interrupt() {
        let mut bus = FlatBus::new_rom(vec![0x76]); // HALT
        bus.write8(crate::bus::IE_ADDR, 0x01);
        let mut state = CpuState::new();
        state.ime = true;
        let mut engine = RecompilerEngine::with_state(state, EngineConfig::default());
        engine.run(&mut bus, 8).unwrap();
        assert!(engine.state.halted);
        bus.set_interrupt_flag(crate::cpu::constants::VBLANK_INTERRUPT_BIT, true);
        // Exactly enough budget to wake the CPU and service the interrupt,
        // not enough to run a block at the vector address afterward.
        engine.run(&mut bus, EngineConfig::default().interrupt_service_cycles).unwrap();
        assert!(!engine.state.halted);
        assert_eq!(engine.state.pc, crate::cpu::constants::VBLANK_VECTOR);
    }

    #[test]
    fn undefined_opcode_is_recorded_in_diagnostics() {
        let mut bus = FlatBus::new_rom(vec![0xD3]); // invalid, executes as NOP
        let mut engine = RecompilerEngine::new(EngineConfig::default());
        engine.run(&mut bus, 8).unwrap();
        assert!(!engine.diagnostics().is_empty());
    }

    #[test]
    fn pc_landing_in_io_space_is_reported_and_halts() {
        let mut bus = FlatBus::new_rom(vec![]);
        let mut state = CpuState::new();
        state.pc = 0xFF10; // an I/O register, never valid code
        let mut engine = RecompilerEngine::with_state(state, EngineConfig::default());
        let err = engine.run(&mut bus, 8).unwrap_err();
        assert!(matches!(err, RecompilerError::InvalidCodeRegion { addr: 0xFF10, .. }));
    }
}
