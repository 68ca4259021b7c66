//! Block cache (§4.5).
//!
//! Only blocks whose start address is backed by immutable ROM are ever
//! cached (`Bus::kind(start).is_immutable_code_source()`). A block starting
//! anywhere else, WRAM, HRAM, echo space, is a self-modifying-code
//! candidate and is instead recompiled fresh on every visit by
//! [`crate::jit`], which sidesteps invalidation tracking entirely rather
//! than chasing every write that could stale a cached entry. The reverse
//! index below still exists for the one case that needs it: an explicit,
//! caller-driven invalidation (e.g. a debugger forcing a recompile), kept
//! so the cache's contract doesn't silently assume ROM never needs it.

use std::collections::HashMap;
use std::rc::Rc;

use crate::bus::Bus;
use crate::config::EngineConfig;
use crate::transpile::{compile, CompiledBlock};

pub struct BlockCache {
    by_start: HashMap<u16, Rc<CompiledBlock>>,
    /// Every address a cached block's instruction stream covers, mapped
    /// back to the block start(s) that cover it (§4.5).
    covers: HashMap<u16, Vec<u16>>,
}

impl Default for BlockCache {
    fn default() -> Self {
        BlockCache { by_start: HashMap::new(), covers: HashMap::new() }
    }
}

impl BlockCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_start.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_start.is_empty()
    }

    /// Fetch a cached block, or compile, cache, and index it if this is
    /// the first visit (§4.5). Callers are responsible for only calling
    /// this when `bus.kind(addr).is_immutable_code_source()`, writable
    /// regions go through [`crate::jit`] instead.
    pub fn get_or_compile(&mut self, bus: &dyn Bus, addr: u16, config: &EngineConfig) -> Rc<CompiledBlock> {
        if let Some(block) = self.by_start.get(&addr) {
            return Rc::clone(block);
        }
        let block = Rc::new(compile(bus, addr, config));
        for offset in 0..(block.end().saturating_sub(block.start)) {
            self.covers.entry(block.start.wrapping_add(offset)).or_default().push(block.start);
        }
        self.by_start.insert(addr, Rc::clone(&block));
        block
    }

    /// Evict every block whose instruction stream covers `addr` (§4.5).
    pub fn invalidate(&mut self, addr: u16) {
        if let Some(starts) = self.covers.remove(&addr) {
            for start in starts {
                log::trace!("invalidating cached block at {start:#06X} (write hit {addr:#06X})");
                self.by_start.remove(&start);
            }
        }
    }

    pub fn clear(&mut self) {
        self.by_start.clear();
        self.covers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flat_bus::FlatBus;

    #[test]
    fn second_fetch_reuses_the_cached_block() {
        let bus = FlatBus::new_rom(vec![0x00, 0xC9]); // NOP; RET
        let config = EngineConfig::default();
        let mut cache = BlockCache::new();
        let first = cache.get_or_compile(&bus, 0, &config);
        let second = cache.get_or_compile(&bus, 0, &config);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalidate_evicts_blocks_covering_the_address() {
        let bus = FlatBus::new_rom(vec![0x00, 0x00, 0xC9]); // NOP; NOP; RET
        let config = EngineConfig::default();
        let mut cache = BlockCache::new();
        cache.get_or_compile(&bus, 0, &config);
        cache.invalidate(1);
        assert!(cache.is_empty());
    }
}
