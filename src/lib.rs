//! A static/dynamic binary recompiler for the Sharp LR35902/SM83 CPU.
//!
//! The core never touches cartridge, video, audio, or input hardware,
//! those live on the other side of [`bus::Bus`]. Given a `Bus`
//! implementation and an [`engine::RecompilerEngine`], this crate:
//!
//! - decodes instructions and discovers basic blocks (`decode`, `block`),
//! - analyzes each block's flag liveness and a narrow set of constant
//!   folds (`liveness`),
//! - compiles blocks into a dispatch-table-backed interpreted form
//!   (`transpile`, `exec`),
//! - caches compiled ROM-resident blocks and recompiles writable-memory
//!   ones fresh every time (`cache`, `jit`),
//! - and drives all of it with a fetch/run/service loop (`engine`,
//!   `interrupt`).

pub mod block;
pub mod bus;
pub mod cache;
pub mod config;
pub mod cpu;
pub mod decode;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod exec;
pub mod flat_bus;
pub mod interrupt;
pub mod jit;
pub mod liveness;
pub mod opcodes;
pub mod transpile;

pub use bus::Bus;
pub use config::EngineConfig;
pub use cpu::CpuState;
pub use engine::RecompilerEngine;
pub use error::{RecompilerError, RecompilerResult};
