//! Crate-wide error type for the recompiler's engine boundary.
//!
//! Per-instruction failures (unknown opcodes) are never represented here,
//! they are not errors (see [`crate::diagnostics`]). This type covers only
//! the handful of cases where the engine cannot proceed at all.

use crate::bus::MemoryRegion;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecompilerError {
    /// Reserved for a future decoder/analyzer that can itself fail to
    /// read a block's source bytes (e.g. a `Bus` backed by a mapped file
    /// that can report I/O errors). `decode` never fails on this crate's
    /// own `Bus` contract (§4.1 "every byte is a valid opcode"), so
    /// nothing in this crate constructs this variant today; it exists so
    /// the engine's `run` signature doesn't need to change the day a host
    /// `Bus` implementation does need it.
    #[error("failed to compile block at PC={pc:#06X}: {reason}")]
    CompileFailure { pc: u16, reason: String },

    /// A block's start address falls in a region the cache refuses to
    /// treat as code (§7 "Invalid memory region for code"). Constructed by
    /// [`crate::engine::RecompilerEngine::run`].
    #[error("address {addr:#06X} ({kind:?}) is not a valid code region")]
    InvalidCodeRegion { addr: u16, kind: MemoryRegion },
}

pub type RecompilerResult<T> = Result<T, RecompilerError>;
