// Drives the recompiler engine over a raw ROM image with no PPU/APU/input
// attached — useful for checking a block trace or a final register dump
// against a known-good interpreter run.
use std::env;
use std::fs;

use sm83_recompiler::flat_bus::FlatBus;
use sm83_recompiler::{CpuState, EngineConfig, RecompilerEngine};

pub fn main() -> Result<(), String> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <rom_path> [cycle_budget]", args[0]);
        std::process::exit(1);
    }

    let rom_path = &args[1];
    let cycle_budget: u32 = args.get(2).map(|s| s.parse()).transpose().map_err(|e| format!("{e}"))?.unwrap_or(4_194_304);

    println!("Loading ROM: {rom_path}...");
    let rom = fs::read(rom_path).map_err(|e| format!("failed to read '{rom_path}': {e}"))?;

    let mut bus = FlatBus::new_rom(rom);
    let mut engine = RecompilerEngine::with_state(CpuState::post_boot_dmg(), EngineConfig::default());

    let cycles_run = engine.run(&mut bus, cycle_budget).map_err(|e| e.to_string())?;

    println!("Ran {cycles_run} cycles ({} blocks cached).", engine.cached_block_count());
    println!(
        "PC={:#06X} SP={:#06X} AF={:#06X} BC={:#06X} DE={:#06X} HL={:#06X}",
        engine.state.pc,
        engine.state.sp,
        engine.state.get_af(),
        engine.state.get_bc(),
        engine.state.get_de(),
        engine.state.get_hl(),
    );

    for (opcode, sighting) in engine.diagnostics().undefined_opcodes() {
        println!("undefined opcode {opcode:#04X}: seen {} time(s), first at {:#06X}", sighting.count, sighting.first_address);
    }

    Ok(())
}
