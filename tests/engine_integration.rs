//! End-to-end coverage: decode -> block discovery -> liveness -> transpile
//! -> engine, run against small hand-assembled programs on `FlatBus`.

use sm83_recompiler::bus::Bus;
use sm83_recompiler::flat_bus::FlatBus;
use sm83_recompiler::{CpuState, EngineConfig, RecompilerEngine};

#[test]
fn fibonacci_like_loop_converges_on_expected_register_state() {
    // LD B, 10 ; LD C, 0 ; loop: INC C ; DEC B ; JR NZ, loop ; HALT
    let program = vec![
        0x06, 0x0A, // LD B, 10
        0x0E, 0x00, // LD C, 0
        0x0C, // INC C
        0x05, // DEC B
        0x20, 0xFC, // JR NZ, -4 (back to INC C)
        0x76, // HALT
    ];
    let mut bus = FlatBus::new_rom(program);
    let mut engine = RecompilerEngine::new(EngineConfig::default());
    engine.run(&mut bus, 10_000).unwrap();

    assert!(engine.state.halted);
    assert_eq!(engine.state.b, 0);
    assert_eq!(engine.state.c, 10);
}

#[test]
fn call_and_return_round_trip_the_stack() {
    // LD SP, 0xFFFE ; CALL set_a ; HALT ; set_a: LD A, 0x7A ; RET
    let program = vec![
        0x31, 0xFE, 0xFF, // LD SP, 0xFFFE
        0xCD, 0x07, 0x00, // CALL 0x0007
        0x76, // HALT
        0x3E, 0x7A, // set_a: LD A, 0x7A
        0xC9, // RET
    ];
    let mut bus = FlatBus::new_rom(program);
    let mut engine = RecompilerEngine::new(EngineConfig::default());
    engine.run(&mut bus, 10_000).unwrap();

    assert!(engine.state.halted);
    assert_eq!(engine.state.a, 0x7A);
    assert_eq!(engine.state.sp, 0xFFFE);
}

#[test]
fn self_modifying_code_in_wram_is_never_stale() {
    let mut bus = FlatBus::new_rom(vec![]);
    // A tiny program living in WRAM: NOP; HALT — then rewritten to
    // NOP; NOP; HALT before a second pass picks up the rewrite.
    bus.write8(0xC000, 0x00);
    bus.write8(0xC001, 0x76);

    let mut engine = RecompilerEngine::new(EngineConfig::default());
    let mut state = CpuState::new();
    state.pc = 0xC000;
    engine.state = state;
    engine.run(&mut bus, 100).unwrap();
    assert!(engine.state.halted);

    // No block cache entry exists for WRAM code (§4.5/§4.7): the JIT
    // fallback recompiles fresh every time, so rewriting the bytes and
    // running again picks up the new instruction stream immediately.
    assert_eq!(engine.cached_block_count(), 0);

    bus.write8(0xC001, 0x00); // turn the HALT into a second NOP
    bus.write8(0xC002, 0x76); // and append a new HALT
    let mut state = CpuState::new();
    state.pc = 0xC000;
    engine.state = state;
    engine.run(&mut bus, 100).unwrap();
    assert_eq!(engine.state.pc, 0xC003);
}

#[test]
fn interrupt_is_serviced_between_blocks_not_mid_block() {
    // A block that is several NOPs long; the interrupt becomes pending
    // partway through what would be "mid-block" in a naive implementation,
    // but service() only ever runs between blocks, so PC always lands
    // exactly on a block boundary when it's serviced (§4.6).
    let program = vec![0x00, 0x00, 0x00, 0x00, 0x76]; // NOP x4; HALT
    let mut bus = FlatBus::new_rom(program);
    bus.write8(sm83_recompiler::bus::IE_ADDR, 0x01);
    bus.set_interrupt_flag(0, true);

    let mut state = CpuState::new();
    state.ime = true;
    let mut engine = RecompilerEngine::with_state(state, EngineConfig::default());
    engine.run(&mut bus, EngineConfig::default().interrupt_service_cycles).unwrap();

    assert_eq!(engine.state.pc, sm83_recompiler::cpu::constants::VBLANK_VECTOR);
    // The return address pushed is the block's start (0x0000), not some
    // address partway through its NOPs.
    assert_eq!(bus.read16(engine.state.sp), 0x0000);
}
