use crate::gb::AddressSpace;
use crate::gb::audio::Apu;
use crate::gb::cartridge::Cartridge;
use crate::gb::constants::*;
use crate::gb::interrupt::InterruptFlags;
use crate::gb::joypad::Joypad;
use crate::gb::oam::OamDma;
use crate::gb::ppu::Ppu;
use crate::gb::serial::Serial;
use crate::gb::timer::Timer;

/// The full DMG memory map. Owns VRAM/WRAM/OAM/HRAM directly and routes
/// everything else to the subsystem that owns that range.
pub struct Bus {
    pub cartridge: Option<Cartridge>,
    vram: [u8; VRAM_SIZE],
    wram: [u8; WRAM_SIZE],
    oam: [u8; OAM_SIZE],
    hram: [u8; HRAM_SIZE],

    pub ppu: Ppu,
    pub apu: Apu,
    pub timer: Timer,
    pub joypad: Joypad,
    pub serial: Serial,

    pub interrupt_flag: InterruptFlags,
    pub interrupt_enable: InterruptFlags,

    dma: OamDma,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            cartridge: None,
            vram: [0; VRAM_SIZE],
            wram: [0; WRAM_SIZE],
            oam: [0; OAM_SIZE],
            hram: [0; HRAM_SIZE],
            ppu: Ppu::default(),
            apu: Apu::default(),
            timer: Timer::default(),
            joypad: Joypad::default(),
            serial: Serial::default(),
            interrupt_flag: InterruptFlags::empty(),
            interrupt_enable: InterruptFlags::empty(),
            dma: OamDma::default(),
        }
    }
}

impl Bus {
    pub fn reset(&mut self) {
        let cartridge = self.cartridge.take();
        *self = Self::default();
        self.cartridge = cartridge;
    }

    pub fn request_interrupt(&mut self, flag: InterruptFlags) {
        self.interrupt_flag.insert(flag);
    }

    pub fn pending_interrupt(&self) -> Option<(InterruptFlags, u16)> {
        InterruptFlags::highest_priority(self.interrupt_flag, self.interrupt_enable)
    }

    pub fn clear_interrupt(&mut self, flag: InterruptFlags) {
        self.interrupt_flag.remove(flag);
    }

    /// Advances every subsystem that ticks on the CPU clock by `cycles`
    /// T-cycles and raises whatever interrupt flags fall out of it.
    pub fn step(&mut self, cycles: u8) {
        if self.timer.step(u16::from(cycles)) {
            self.request_interrupt(InterruptFlags::TIMER);
        }

        let events = self.ppu.step(cycles, &self.vram, &self.oam);
        if events.vblank_irq {
            self.request_interrupt(InterruptFlags::VBLANK);
        }
        if events.stat_irq {
            self.request_interrupt(InterruptFlags::LCD_STAT);
        }

        self.apu.step(cycles);
    }

    fn run_oam_dma(&mut self, source_register: u8) {
        self.dma.start(source_register);
        let source = OamDma::source_base(source_register);
        for i in 0..crate::gb::oam::OAM_DMA_LENGTH {
            let byte = self.read(source + i);
            self.oam[i as usize] = byte;
        }
    }
}

impl AddressSpace for Bus {
    fn read(&self, address: u16) -> u8 {
        match address {
            ROM_BANK_0_BEGIN..=ROM_BANK_0_END | ROM_BANK_N_BEGIN..=ROM_BANK_N_END | CRAM_BEGIN..=CRAM_END => {
                self.cartridge.as_ref().map_or(UNDEFINED_READ, |c| c.read(address))
            }
            VRAM_BEGIN..=VRAM_END => self.vram[(address - VRAM_BEGIN) as usize],
            WRAM_BEGIN..=WRAM_END => self.wram[(address - WRAM_BEGIN) as usize],
            ECHO_BEGIN..=ECHO_END => self.wram[(address - ECHO_BEGIN) as usize],
            OAM_BEGIN..=OAM_END => self.oam[(address - OAM_BEGIN) as usize],
            UNUSABLE_BEGIN..=UNUSABLE_END => UNDEFINED_READ,
            JOYPAD => self.joypad.read(),
            SERIAL_DATA => self.serial.read_sb(),
            SERIAL_CONTROL => self.serial.read_sc(),
            TIMER_DIVIDER => self.timer.read_div(),
            TIMER_COUNTER => self.timer.read_tima(),
            TIMER_MODULO => self.timer.read_tma(),
            TIMER_CONTROL => self.timer.read_tac(),
            INTERRUPT_FLAG => 0xE0 | self.interrupt_flag.bits(),
            PPU_DMA => self.dma.last_source(),
            PPU_LCDC..=PPU_WX => self.ppu.read(address),
            AUDIO_BEGIN..=AUDIO_END | WAVE_RAM_BEGIN..=WAVE_RAM_END => self.apu.read(address),
            HRAM_BEGIN..=HRAM_END => self.hram[(address - HRAM_BEGIN) as usize],
            INTERRUPT_ENABLE => self.interrupt_enable.bits(),
            _ => UNDEFINED_READ,
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            ROM_BANK_0_BEGIN..=ROM_BANK_0_END | ROM_BANK_N_BEGIN..=ROM_BANK_N_END | CRAM_BEGIN..=CRAM_END => {
                if let Some(cartridge) = self.cartridge.as_mut() {
                    cartridge.write(address, value);
                }
            }
            VRAM_BEGIN..=VRAM_END => self.vram[(address - VRAM_BEGIN) as usize] = value,
            WRAM_BEGIN..=WRAM_END => self.wram[(address - WRAM_BEGIN) as usize] = value,
            ECHO_BEGIN..=ECHO_END => self.wram[(address - ECHO_BEGIN) as usize] = value,
            OAM_BEGIN..=OAM_END => self.oam[(address - OAM_BEGIN) as usize] = value,
            UNUSABLE_BEGIN..=UNUSABLE_END => {}
            JOYPAD => self.joypad.write(value),
            SERIAL_DATA => self.serial.write_sb(value),
            SERIAL_CONTROL => self.serial.write_sc(value),
            TIMER_DIVIDER => {
                if self.timer.write_div() {
                    self.request_interrupt(InterruptFlags::TIMER);
                }
            }
            TIMER_COUNTER => self.timer.write_tima(value),
            TIMER_MODULO => self.timer.write_tma(value),
            TIMER_CONTROL => self.timer.write_tac(value),
            INTERRUPT_FLAG => self.interrupt_flag = InterruptFlags::from_bits_truncate(value),
            PPU_DMA => self.run_oam_dma(value),
            PPU_LCDC..=PPU_WX => self.ppu.write(address, value),
            AUDIO_BEGIN..=AUDIO_END | WAVE_RAM_BEGIN..=WAVE_RAM_END => self.apu.write(address, value),
            HRAM_BEGIN..=HRAM_END => self.hram[(address - HRAM_BEGIN) as usize] = value,
            INTERRUPT_ENABLE => self.interrupt_enable = InterruptFlags::from_bits_truncate(value),
            _ => {}
        }
    }
}
