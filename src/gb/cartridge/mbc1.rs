use crate::gb::cartridge::controller::BankController;
use crate::gb::cartridge::{CartridgeConfig, bank_mask};
use crate::gb::constants::*;
use std::sync::Arc;

const RAM_ENABLE_BEGIN: u16 = 0x0000;
const RAM_ENABLE_END: u16 = 0x1FFF;
const ROM_BANK_LOW_BEGIN: u16 = 0x2000;
const ROM_BANK_LOW_END: u16 = 0x3FFF;
const BANK_HIGH_BEGIN: u16 = 0x4000;
const BANK_HIGH_END: u16 = 0x5FFF;
const MODE_SELECT_BEGIN: u16 = 0x6000;
const MODE_SELECT_END: u16 = 0x7FFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BankingMode {
    /// Upper 2 bits affect the ROM bank selected for 0x4000-0x7FFF only.
    Simple,
    /// Upper 2 bits select the RAM bank, and also apply to ROM reads in
    /// 0x0000-0x3FFF (large-ROM carts only, not modeled further here).
    Advanced,
}

/// Up to 2 MiB ROM (125 usable banks) and 32 KiB RAM (4 banks).
pub struct MBC1 {
    config: CartridgeConfig,
    rom: Arc<[u8]>,
    ram: Vec<u8>,
    ram_enabled: bool,
    bank_low: u8,
    bank_high: u8,
    mode: BankingMode,
    low_rom_bank_offset: usize,
    high_rom_bank_offset: usize,
    ram_bank_offset: usize,
}

impl MBC1 {
    pub fn new(config: CartridgeConfig, rom: Arc<[u8]>) -> Self {
        let mut mbc = Self {
            ram: vec![0; config.ram_size()],
            rom,
            config,
            ram_enabled: false,
            bank_low: 1,
            bank_high: 0,
            mode: BankingMode::Simple,
            low_rom_bank_offset: 0,
            high_rom_bank_offset: ROM_BANK_SIZE,
            ram_bank_offset: 0,
        };
        mbc.update_rom_offsets();
        mbc.update_ram_offset();
        mbc
    }

    fn rom_bank_number(&self) -> u16 {
        let bank = (u16::from(self.bank_high) << 5) | u16::from(self.bank_low);
        bank & bank_mask(self.config.rom_banks)
    }

    fn update_rom_offsets(&mut self) {
        let high_bank = self.rom_bank_number().max(1);
        self.high_rom_bank_offset = high_bank as usize * ROM_BANK_SIZE;
        self.low_rom_bank_offset = match self.mode {
            BankingMode::Simple => 0,
            BankingMode::Advanced => {
                let low_bank = (u16::from(self.bank_high) << 5) & bank_mask(self.config.rom_banks);
                low_bank as usize * ROM_BANK_SIZE
            }
        };
    }

    fn update_ram_offset(&mut self) {
        let bank = match self.mode {
            BankingMode::Simple => 0,
            BankingMode::Advanced => self.bank_high,
        };
        self.ram_bank_offset = bank as usize * RAM_BANK_SIZE;
    }
}

impl BankController for MBC1 {
    fn read(&self, address: u16) -> u8 {
        match address {
            ROM_BANK_0_BEGIN..=ROM_BANK_0_END => {
                self.rom[self.low_rom_bank_offset + address as usize]
            }
            ROM_BANK_N_BEGIN..=ROM_BANK_N_END => {
                self.rom[self.high_rom_bank_offset + (address - ROM_BANK_N_BEGIN) as usize]
            }
            CRAM_BEGIN..=CRAM_END => {
                if !self.ram_enabled || self.ram.is_empty() {
                    return UNDEFINED_READ;
                }
                self.ram[self.ram_bank_offset + (address - CRAM_BEGIN) as usize]
            }
            _ => UNDEFINED_READ,
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            RAM_ENABLE_BEGIN..=RAM_ENABLE_END => {
                self.ram_enabled = value & 0x0F == 0x0A;
            }
            ROM_BANK_LOW_BEGIN..=ROM_BANK_LOW_END => {
                let bank = value & 0b0001_1111;
                self.bank_low = if bank == 0 { 1 } else { bank };
                self.update_rom_offsets();
            }
            BANK_HIGH_BEGIN..=BANK_HIGH_END => {
                self.bank_high = value & 0b11;
                self.update_rom_offsets();
                self.update_ram_offset();
            }
            MODE_SELECT_BEGIN..=MODE_SELECT_END => {
                self.mode = if value & 1 == 0 {
                    BankingMode::Simple
                } else {
                    BankingMode::Advanced
                };
                self.update_rom_offsets();
                self.update_ram_offset();
            }
            CRAM_BEGIN..=CRAM_END => {
                if self.ram_enabled && !self.ram.is_empty() {
                    self.ram[self.ram_bank_offset + (address - CRAM_BEGIN) as usize] = value;
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
    fn ram_enable_requires_lower_nibble_0a() {
        let config = CartridgeConfig::new(ControllerType::MBC1, 0x00, 0x02).unwrap();
        let mut ctrl = MBC1::new(config, banked_rom(2));
        ctrl.write(CRAM_BEGIN, 0x11);
        assert_eq!(ctrl.read(CRAM_BEGIN), UNDEFINED_READ, "RAM is disabled");

        ctrl.write(RAM_ENABLE_BEGIN, 0x0A);
        ctrl.write(CRAM_BEGIN, 0x11);
        assert_eq!(ctrl.read(CRAM_BEGIN), 0x11, "RAM is enabled");

        ctrl.write(RAM_ENABLE_BEGIN, 0x00);
        assert_eq!(ctrl.read(CRAM_BEGIN), UNDEFINED_READ, "RAM is disabled again");
    }

    #[test]
    fn rom_bank_zero_is_promoted_to_one() {
        let config = CartridgeConfig::new(ControllerType::MBC1, 0x05, 0x00).unwrap(); // 32 banks
        let mut ctrl = MBC1::new(config, banked_rom(32));
        ctrl.write(ROM_BANK_LOW_BEGIN, 0x00);
        assert_eq!(ctrl.read(ROM_BANK_N_BEGIN), 1);
    }

    #[test]
    fn rom_bank_switches_across_full_range_in_simple_mode() {
        let config = CartridgeConfig::new(ControllerType::MBC1, 0x05, 0x00).unwrap(); // 32 banks
        let mut ctrl = MBC1::new(config, banked_rom(32));
        for bank in 1u8..32 {
            let low = bank & 0b0001_1111;
            ctrl.write(ROM_BANK_LOW_BEGIN, low);
            ctrl.write(BANK_HIGH_BEGIN, (bank >> 5) & 0b11);
            assert_eq!(ctrl.read(ROM_BANK_N_BEGIN), bank);
        }
    }

    #[test]
    fn masked_rom_banking_on_small_cart() {
        // 4 banks total -> only the low 2 bits of the bank number matter.
        let config = CartridgeConfig::new(ControllerType::MBC1, 0x01, 0x00).unwrap();
        let mut ctrl = MBC1::new(config, banked_rom(4));
        ctrl.write(ROM_BANK_LOW_BEGIN, 0b0000_0101); // bank 5 masked down to 1
        assert_eq!(ctrl.read(ROM_BANK_N_BEGIN), 1);
    }

    #[test]
    fn ram_banking_across_all_four_banks() {
        let config = CartridgeConfig::new(ControllerType::MBC1, 0x00, 0x03).unwrap(); // 4 RAM banks
        let mut ctrl = MBC1::new(config, banked_rom(2));
        ctrl.write(RAM_ENABLE_BEGIN, 0x0A);
        ctrl.write(MODE_SELECT_BEGIN, 0x01); // advanced mode routes bank_high to RAM

        for bank in 0u8..4 {
            ctrl.write(BANK_HIGH_BEGIN, bank);
            ctrl.write(CRAM_BEGIN, bank + 1);
        }
        for bank in 0u8..4 {
            ctrl.write(BANK_HIGH_BEGIN, bank);
            assert_eq!(ctrl.read(CRAM_BEGIN), bank + 1);
        }
    }
}
