//! Integration tests driving the CPU against the full `Bus`, rather than
//! the bare harness used by the per-module unit tests.

use crate::gb::AddressSpace;
use crate::gb::bus::Bus;
use crate::gb::cartridge::Cartridge;
use crate::gb::constants::*;
use crate::gb::cpu::CPU;
use crate::gb::interrupt::InterruptFlags;

const TITLE_BEGIN: usize = 0x0134;

fn rom_with_entrypoint(program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; ROM_BANK_SIZE * 2];
    rom[TITLE_BEGIN..TITLE_BEGIN + 4].copy_from_slice(b"TEST");
    rom[0x0148] = 0x00; // 32KB, no banking
    rom[0x0149] = 0x00; // no RAM
    rom[0x0100..0x0100 + program.len()].copy_from_slice(program);
    rom
}

fn run(program: &[u8], steps: usize) -> (CPU, Bus) {
    let cartridge = Cartridge::from_bytes(rom_with_entrypoint(program)).unwrap();
    let mut cpu = CPU::default();
    cpu.reset();
    let mut bus = Bus::default();
    bus.cartridge = Some(cartridge);
    for _ in 0..steps {
        let cycles = cpu.step(&mut bus);
        bus.step(cycles as u8);
    }
    (cpu, bus)
}

#[test]
fn load_immediate_then_halt_stops_the_cpu() {
    let program = [0x3E, 0x42, 0x76]; // LD A,0x42 ; HALT
    let (cpu, _bus) = run(&program, 2);
    assert_eq!(cpu.r.a, 0x42);
    assert!(cpu.is_halted);
}

#[test]
fn a_timer_overflow_is_serviced_through_the_full_bus() {
    let program = [0x00]; // NOP, just needs somewhere to sit
    let (mut cpu, mut bus) = run(&program, 0);
    cpu.ime = true;
    bus.interrupt_enable = InterruptFlags::TIMER;
    bus.write(TIMER_CONTROL, 0b101); // enabled, fastest clock select
    bus.write(TIMER_COUNTER, 0xFF);

    // Drive enough cycles for TIMA to overflow and be reloaded.
    for _ in 0..32 {
        bus.step(4);
    }
    assert!(bus.interrupt_flag.contains(InterruptFlags::TIMER));

    let pending = bus.pending_interrupt().unwrap();
    assert_eq!(pending.1, InterruptFlags::VECTOR_TIMER);
    let pc_before = cpu.pc;
    let cost = cpu.service_interrupt(&mut bus, pending.1);
    assert_eq!(cost, 20);
    assert_eq!(cpu.pc, InterruptFlags::VECTOR_TIMER);
    assert!(!cpu.ime, "servicing an interrupt clears IME");
    // the return address pushed to the stack is the PC we interrupted at
    let lo = bus.read(cpu.sp) as u16;
    let hi = bus.read(cpu.sp + 1) as u16;
    assert_eq!((hi << 8) | lo, pc_before);
}

#[test]
fn oam_dma_is_reachable_through_the_full_bus() {
    let program = [0x00];
    let (_cpu, mut bus) = run(&program, 0);
    for i in 0..0xA0u16 {
        bus.write(WRAM_BEGIN + i, i as u8 ^ 0xFF);
    }
    bus.write(PPU_DMA, 0xC0);
    assert_eq!(bus.read(OAM_BEGIN), 0xFF);
    assert_eq!(bus.read(OAM_BEGIN + 1), 0xFE);
}
