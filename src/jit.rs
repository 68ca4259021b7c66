//! Embedded JIT fallback (§4.7).
//!
//! A block whose start address sits in a writable memory region (WRAM,
//! HRAM, echo space, anything `Bus::kind` doesn't mark as
//! `is_immutable_code_source`) is a self-modifying-code candidate: the
//! bytes the analyzer would see right now might not be the bytes that are
//! there next time. Rather than track every write that could stale a
//! cached block, this path simply never caches: it recompiles the block
//! from scratch on every visit, using a smaller scan budget so the cost of
//! doing that stays bounded.

use crate::block::assemble_block;
use crate::bus::Bus;
use crate::config::EngineConfig;
use crate::liveness::analyze;
use crate::transpile::{elision_mask, CompiledBlock};

/// Scan/instruction caps used for blocks starting in writable memory,
/// intentionally smaller than `EngineConfig`'s defaults, since a block here
/// is thrown away the moment it's run once.
pub fn trimmed_config(config: &EngineConfig) -> EngineConfig {
    EngineConfig {
        max_block_scan: config.max_block_scan.min(16),
        max_block_instructions: config.max_block_instructions.min(32),
        ..*config
    }
}

/// Compile (never cache) the block starting at `addr`, which the caller
/// has already established is not backed by immutable ROM (§4.7).
pub fn compile_uncached(bus: &dyn Bus, addr: u16, config: &EngineConfig) -> CompiledBlock {
    let trimmed = trimmed_config(config);
    let block = assemble_block(bus, addr, &trimmed);
    let liveness = analyze(&block);
    let elided = elision_mask(&block);
    CompiledBlock::from_parts(block.start, block.instructions, liveness.live_out, block.exit, elided, config.emulate_halt_bug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flat_bus::FlatBus;

    #[test]
    fn trimmed_config_never_exceeds_caller_limits() {
        let config = EngineConfig::default();
        let trimmed = trimmed_config(&config);
        assert!(trimmed.max_block_scan <= config.max_block_scan);
        assert!(trimmed.max_block_instructions <= config.max_block_instructions);
    }

    #[test]
    fn compiles_code_living_in_wram() {
        let mut bus = FlatBus::new_rom(vec![]);
        bus.write8(0xC000, 0x00); // NOP
        bus.write8(0xC001, 0xC9); // RET
        let config = EngineConfig::default();
        let compiled = compile_uncached(&bus, 0xC000, &config);
        assert_eq!(compiled.instructions.len(), 2);
    }
}
