use crate::gb::cartridge::controller::BankController;
use crate::gb::cartridge::{CartridgeConfig, bank_mask};
use crate::gb::constants::*;
use std::sync::Arc;

/// MBC2 has a built-in 512x4 bit RAM, always present regardless of the
/// cartridge RAM-size header byte.
const INTERNAL_RAM_SIZE: usize = 0x200;

/// Within 0x0000-0x3FFF, address bit 8 distinguishes the RAM-enable write
/// (bit clear) from the ROM-bank-select write (bit set); both ranges share
/// the same 0x0000-0x3FFF window the real hardware exposes.
const CONTROL_BEGIN: u16 = 0x0000;
const CONTROL_END: u16 = 0x3FFF;
const BANK_SELECT_BIT: u16 = 0x0100;

pub struct MBC2 {
    config: CartridgeConfig,
    rom: Arc<[u8]>,
    ram: [u8; INTERNAL_RAM_SIZE],
    ram_enabled: bool,
    rom_bank: u8,
}

impl MBC2 {
    pub fn new(config: CartridgeConfig, rom: Arc<[u8]>) -> Self {
        Self {
            config,
            rom,
            ram: [0; INTERNAL_RAM_SIZE],
            ram_enabled: false,
            rom_bank: 1,
        }
    }

    fn rom_offset(&self) -> usize {
        self.rom_bank as usize * ROM_BANK_SIZE
    }
}

impl BankController for MBC2 {
    fn read(&self, address: u16) -> u8 {
        match address {
            ROM_BANK_0_BEGIN..=ROM_BANK_0_END => self.rom[address as usize],
            ROM_BANK_N_BEGIN..=ROM_BANK_N_END => {
                self.rom[self.rom_offset() + (address - ROM_BANK_N_BEGIN) as usize]
            }
            CRAM_BEGIN..=CRAM_END => {
                if !self.ram_enabled {
                    return UNDEFINED_READ;
                }
                let index = (address - CRAM_BEGIN) as usize % INTERNAL_RAM_SIZE;
                self.ram[index] | 0xF0
            }
            _ => UNDEFINED_READ,
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            CONTROL_BEGIN..=CONTROL_END => {
                if address & BANK_SELECT_BIT == 0 {
                    self.ram_enabled = value & 0x0F == 0x0A;
                } else {
                    let bank = value & 0x0F;
                    self.rom_bank = bank.max(1) & bank_mask(self.config.rom_banks) as u8;
                }
            }
            CRAM_BEGIN..=CRAM_END => {
                if self.ram_enabled {
                    let index = (address - CRAM_BEGIN) as usize % INTERNAL_RAM_SIZE;
                    self.ram[index] = value & 0x0F;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gb::cartridge::ControllerType;

    fn banked_rom(banks: usize) -> Arc<[u8]> {
        (0u8..banks as u8)
            .flat_map(|i| vec![i; ROM_BANK_SIZE])
            .collect()
    }

    #[test]
    fn bit_8_selects_enable_vs_bank_write() {
        let config = CartridgeConfig::new(ControllerType::MBC2, 0x00, 0x00).unwrap();
        let mut ctrl = MBC2::new(config, banked_rom(4));

        ctrl.write(0x0000, 0x0A); // bit 8 clear -> RAM enable
        assert!(ctrl.ram_enabled);

        ctrl.write(0x0100, 0x03); // bit 8 set -> ROM bank select
        assert_eq!(ctrl.rom_bank, 3);
        assert_eq!(ctrl.read(ROM_BANK_N_BEGIN), 3);
    }

    #[test]
    fn rom_bank_zero_promoted_to_one() {
        let config = CartridgeConfig::new(ControllerType::MBC2, 0x00, 0x00).unwrap();
        let mut ctrl = MBC2::new(config, banked_rom(4));
        ctrl.write(0x0100, 0x00);
        assert_eq!(ctrl.rom_bank, 1);
    }

    #[test]
    fn internal_ram_reads_mask_high_nibble() {
        let config = CartridgeConfig::new(ControllerType::MBC2, 0x00, 0x00).unwrap();
        let mut ctrl = MBC2::new(config, banked_rom(4));
        ctrl.write(0x0000, 0x0A);
        ctrl.write(CRAM_BEGIN, 0xFF);
        assert_eq!(ctrl.read(CRAM_BEGIN), 0xFF);
        ctrl.write(CRAM_BEGIN, 0x03);
        assert_eq!(ctrl.read(CRAM_BEGIN), 0xF3);
    }

    #[test]
    fn ram_disabled_reads_undefined() {
        let config = CartridgeConfig::new(ControllerType::MBC2, 0x00, 0x00).unwrap();
        let ctrl = MBC2::new(config, banked_rom(4));
        assert_eq!(ctrl.read(CRAM_BEGIN), UNDEFINED_READ);
    }
}
