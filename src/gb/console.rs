use std::path::Path;

use crate::gb::AddressSpace;
use crate::gb::bus::Bus;
use crate::gb::cartridge::Cartridge;
use crate::gb::cpu::CPU;
use crate::gb::interrupt::InterruptFlags;
pub use crate::gb::joypad::Button;
use crate::gb::{CYCLES_PER_FRAME, SCREEN_HEIGHT, SCREEN_WIDTH};

/// A runaway frame (stuck in an infinite non-yielding loop) is aborted
/// rather than allowed to hang the host.
const MAX_INSTRUCTIONS_PER_FRAME: u32 = 100_000;

/// Top-level emulator: owns the CPU and the bus, and is the only type the
/// host needs to drive a DMG session.
pub struct Console {
    cpu: CPU,
    bus: Bus,
}

impl Default for Console {
    fn default() -> Self {
        let mut console = Self {
            cpu: CPU::default(),
            bus: Bus::default(),
        };
        console.reset();
        console
    }
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the ROM at `path`, parses its header, and attaches it to the
    /// bus. Returns false (and logs) on any failure; the console keeps
    /// whatever cartridge, if any, was previously loaded.
    pub fn load_cartridge(&mut self, path: &Path) -> bool {
        match Cartridge::from_path(path) {
            Ok(cartridge) => {
                self.bus.cartridge = Some(cartridge);
                self.reset();
                true
            }
            Err(err) => {
                log::error!("failed to load cartridge {}: {err}", path.display());
                false
            }
        }
    }

    /// Restores post-boot-ROM power-on state across every subsystem. The
    /// attached cartridge, if any, survives the reset.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.reset();
    }

    /// Runs one full frame (70224 T-cycles). Returns true on completion,
    /// false if the frame was aborted as runaway.
    pub fn step(&mut self) -> bool {
        let mut cycles_run = 0u32;
        let mut instructions = 0u32;

        while cycles_run < CYCLES_PER_FRAME {
            if instructions >= MAX_INSTRUCTIONS_PER_FRAME {
                log::error!("runaway frame aborted after {instructions} instructions");
                return false;
            }
            instructions += 1;
            cycles_run += u32::from(self.advance_one_step());
        }
        true
    }

    fn advance_one_step(&mut self) -> u16 {
        if let Some((flag, vector)) = self.bus.pending_interrupt() {
            if self.cpu.ime {
                self.bus.clear_interrupt(flag);
                let cost = self.cpu.service_interrupt(&mut self.bus, vector);
                self.bus.step(cost as u8);
                return cost;
            }
            // HALT exits on a pending-and-enabled interrupt even with
            // IME=0; execution resumes without servicing the handler.
            self.cpu.is_halted = false;
        }

        let cycles = self.cpu.step(&mut self.bus);
        self.bus.step(cycles as u8);
        cycles
    }

    pub fn framebuffer(&self) -> &[u32] {
        self.bus.ppu.framebuffer()
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        let pressed_edge = self.bus.joypad.set_button(button, pressed);
        if pressed_edge {
            self.bus.request_interrupt(InterruptFlags::JOYPAD);
            if self.cpu.is_stopped {
                self.cpu.resume_from_stop();
            }
        }
    }

    pub fn set_audio_enabled(&mut self, enabled: bool) {
        self.bus.apu.set_audio_enabled(enabled);
    }

    pub fn set_classic_green(&mut self, enabled: bool) {
        self.bus.ppu.set_classic_green(enabled);
    }

    /// Pulls up to `out.len()` interleaved stereo float samples. Returns
    /// the number actually written.
    pub fn audio_read(&self, out: &mut [f32]) -> usize {
        self.bus.apu.sample_ring().read(out)
    }

    pub fn cartridge_info(&self) -> String {
        self.bus
            .cartridge
            .as_ref()
            .map_or_else(|| "no cartridge loaded".to_string(), Cartridge::info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_console_framebuffer_is_correctly_sized() {
        let console = Console::default();
        assert_eq!(console.framebuffer().len(), SCREEN_WIDTH * SCREEN_HEIGHT);
    }

    #[test]
    fn loading_a_missing_rom_reports_failure() {
        let mut console = Console::default();
        assert!(!console.load_cartridge(Path::new("/nonexistent/rom.gb")));
    }

    #[test]
    fn button_press_raises_joypad_interrupt() {
        let mut console = Console::default();
        console.bus.interrupt_enable = InterruptFlags::all();
        console.set_button(Button::Start, true);
        assert!(console.bus.interrupt_flag.contains(InterruptFlags::JOYPAD));
    }

    #[test]
    fn cartridge_info_reports_placeholder_when_unloaded() {
        let console = Console::default();
        assert_eq!(console.cartridge_info(), "no cartridge loaded");
    }

    #[test]
    fn a_frame_with_no_cartridge_completes_without_hanging() {
        let mut console = Console::default();
        assert!(console.step());
    }
}
