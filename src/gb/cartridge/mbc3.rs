use crate::gb::cartridge::controller::BankController;
use crate::gb::cartridge::{CartridgeConfig, bank_mask};
use crate::gb::constants::*;
use std::sync::Arc;

const RAM_ENABLE_BEGIN: u16 = 0x0000;
const RAM_ENABLE_END: u16 = 0x1FFF;
const ROM_BANK_NUMBER_BEGIN: u16 = 0x2000;
const ROM_BANK_NUMBER_END: u16 = 0x3FFF;
const RAM_BANK_NUMBER_BEGIN: u16 = 0x4000;
const RAM_BANK_NUMBER_END: u16 = 0x5FFF;
const LATCH_CLOCK_DATA_BEGIN: u16 = 0x6000;
const LATCH_CLOCK_DATA_END: u16 = 0x7FFF;

/// Up to 2 MiB ROM (128 banks) and 32 KiB RAM (4 banks). The RTC and its
/// latch are a cartridge non-goal: writes to the latch register and to RTC
/// register indices (0x08-0x0C) are accepted but inert.
pub struct MBC3 {
    config: CartridgeConfig,
    rom: Arc<[u8]>,
    ram: Vec<u8>,
    ram_enabled: bool,
    rom_bank: u8,
    ram_bank: u8,
}

impl MBC3 {
    pub fn new(config: CartridgeConfig, rom: Arc<[u8]>) -> Self {
        Self {
            ram: vec![0; config.ram_size()],
            rom,
            config,
            ram_enabled: false,
            rom_bank: 1,
            ram_bank: 0,
        }
    }
}

impl BankController for MBC3 {
    fn read(&self, address: u16) -> u8 {
        match address {
            ROM_BANK_0_BEGIN..=ROM_BANK_0_END => self.rom[address as usize],
            ROM_BANK_N_BEGIN..=ROM_BANK_N_END => {
                let offset = self.rom_bank as usize * ROM_BANK_SIZE;
                self.rom[offset + (address - ROM_BANK_N_BEGIN) as usize]
            }
            CRAM_BEGIN..=CRAM_END => {
                if !self.ram_enabled || self.ram.is_empty() || self.ram_bank > 0x03 {
                    return UNDEFINED_READ;
                }
                let offset = self.ram_bank as usize * RAM_BANK_SIZE;
                self.ram[offset + (address - CRAM_BEGIN) as usize]
            }
            _ => UNDEFINED_READ,
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            RAM_ENABLE_BEGIN..=RAM_ENABLE_END => {
                self.ram_enabled = value & 0x0F == 0x0A;
            }
            ROM_BANK_NUMBER_BEGIN..=ROM_BANK_NUMBER_END => {
                let bank = value & 0b0111_1111;
                self.rom_bank = bank.max(1) & bank_mask(self.config.rom_banks) as u8;
            }
            RAM_BANK_NUMBER_BEGIN..=RAM_BANK_NUMBER_END => {
                self.ram_bank = value;
            }
            LATCH_CLOCK_DATA_BEGIN..=LATCH_CLOCK_DATA_END => {
                // RTC latch: a non-goal, accepted and ignored.
            }
            CRAM_BEGIN..=CRAM_END => {
                if self.ram_enabled && !self.ram.is_empty() && self.ram_bank <= 0x03 {
                    let offset = self.ram_bank as usize * RAM_BANK_SIZE;
                    self.ram[offset + (address - CRAM_BEGIN) as usize] = value;
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

    #[test]
    fn ram_enable_toggle() {
        let config = CartridgeConfig::new(ControllerType::MBC3, 0x00, 0x02).unwrap();
        let mut ctrl = MBC3::new(config, Arc::from(vec![0u8; ROM_BANK_SIZE * 2]));

        ctrl.write(CRAM_BEGIN, 0x42);
        assert_eq!(ctrl.read(CRAM_BEGIN), UNDEFINED_READ, "RAM disabled");

        ctrl.write(RAM_ENABLE_BEGIN, 0x0A);
        ctrl.write(CRAM_BEGIN, 0x42);
        assert_eq!(ctrl.read(CRAM_BEGIN), 0x42);

        ctrl.write(RAM_ENABLE_BEGIN, 0xFF);
        assert_eq!(ctrl.read(CRAM_BEGIN), UNDEFINED_READ, "RAM disabled again");
    }

    #[test]
    fn rom_bank_is_seven_bits_with_zero_promotion() {
        let config = CartridgeConfig::new(ControllerType::MBC3, 0x08, 0x00).unwrap(); // 512 banks
        let mut ctrl = MBC3::new(config, Arc::from(vec![0u8; ROM_BANK_SIZE * 2]));
        ctrl.write(ROM_BANK_NUMBER_BEGIN, 0x00);
        assert_eq!(ctrl.rom_bank, 1);
        ctrl.write(ROM_BANK_NUMBER_BEGIN, 0xFF);
        assert_eq!(ctrl.rom_bank, 0x7F);
    }

    #[test]
    fn ram_banking_across_four_banks() {
        let config = CartridgeConfig::new(ControllerType::MBC3, 0x00, 0x03).unwrap();
        let mut ctrl = MBC3::new(config, Arc::from(vec![0u8; ROM_BANK_SIZE * 2]));
        ctrl.write(RAM_ENABLE_BEGIN, 0x0A);

        for bank in 0u8..4 {
            ctrl.write(RAM_BANK_NUMBER_BEGIN, bank);
            ctrl.write(CRAM_BEGIN, bank + 1);
        }
        for bank in 0u8..4 {
            ctrl.write(RAM_BANK_NUMBER_BEGIN, bank);
            assert_eq!(ctrl.read(CRAM_BEGIN), bank + 1);
        }
    }

    #[test]
    fn rtc_latch_writes_are_accepted_and_inert() {
        let config = CartridgeConfig::new(ControllerType::MBC3, 0x00, 0x00).unwrap();
        let mut ctrl = MBC3::new(config, Arc::from(vec![0u8; ROM_BANK_SIZE * 2]));
        ctrl.write(LATCH_CLOCK_DATA_BEGIN, 0x00);
        ctrl.write(LATCH_CLOCK_DATA_BEGIN, 0x01);
    }
}
