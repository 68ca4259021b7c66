//! Engine configuration (SPEC_FULL §4.10).
//!
//! Every tunable that the analyzer, transpiler, and engine consult is a
//! field here, constructed explicitly by the caller, never a global or an
//! environment variable, so two engines in the same process can run with
//! different limits (e.g. one strict, one permissive for a conformance
//! test) without interfering.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Instructions scanned per block during local jump-target discovery
    /// before giving up on finding more local labels (§4.2 pass 1).
    pub max_block_scan: usize,
    /// Hard cap on instructions assembled into a single block (§4.2 pass 2).
    pub max_block_instructions: usize,
    /// Whether to reproduce the DMG's `HALT` bug, the next instruction
    /// byte is fetched but `PC` fails to advance, when `IME` is clear and
    /// an interrupt is already pending at the moment `HALT` executes (§9
    /// open question).
    pub emulate_halt_bug: bool,
    /// Cycles charged for servicing one interrupt between blocks (§5).
    pub interrupt_service_cycles: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_block_scan: 50,
            max_block_instructions: 100,
            emulate_halt_bug: false,
            interrupt_service_cycles: 20,
        }
    }
}
