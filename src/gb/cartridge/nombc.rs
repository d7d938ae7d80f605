use crate::gb::cartridge::CartridgeConfig;
use crate::gb::cartridge::controller::BankController;
use crate::gb::constants::*;
use std::sync::Arc;

/// Small games of not more than 32 KiB ROM do not require a MBC chip for
/// ROM banking. The ROM is directly mapped to memory at 0x0000 - 0x7FFF.
/// Optionally up to 8 KiB of RAM could be connected at 0xA000 - 0xBFFF.
pub struct NoMBC {
    rom: Arc<[u8]>,
    ram: Vec<u8>,
}

impl NoMBC {
    pub fn new(config: CartridgeConfig, rom: Arc<[u8]>) -> Self {
        Self {
            ram: vec![0; config.ram_size()],
            rom,
        }
    }
}

impl BankController for NoMBC {
    fn read(&self, address: u16) -> u8 {
        match address {
            ROM_BANK_0_BEGIN..=ROM_BANK_N_END => self.rom[address as usize],
            CRAM_BEGIN..=CRAM_END => match self.ram.is_empty() {
                true => UNDEFINED_READ,
                false => self.ram[(address - CRAM_BEGIN) as usize],
            },
            _ => UNDEFINED_READ,
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        if let CRAM_BEGIN..=CRAM_END = address {
            if !self.ram.is_empty() {
                self.ram[(address - CRAM_BEGIN) as usize] = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gb::cartridge::ControllerType;

    #[test]
    fn rom_is_directly_mapped() {
        let config = CartridgeConfig::new(ControllerType::NoMBC, 0x00, 0x00).unwrap();
        let mut rom = vec![0u8; ROM_BANK_SIZE * 2];
        rom[0x100] = 0x42;
        let ctrl = NoMBC::new(config, Arc::from(rom.into_boxed_slice()));
        assert_eq!(ctrl.read(0x100), 0x42);
    }

    #[test]
    fn ram_disabled_when_cart_has_none() {
        let config = CartridgeConfig::new(ControllerType::NoMBC, 0x00, 0x00).unwrap();
        let mut ctrl = NoMBC::new(config, Arc::from(vec![0u8; ROM_BANK_SIZE * 2]));
        ctrl.write(CRAM_BEGIN, 0x42);
        assert_eq!(ctrl.read(CRAM_BEGIN), UNDEFINED_READ);
    }

    #[test]
    fn ram_readable_when_present() {
        let config = CartridgeConfig::new(ControllerType::NoMBC, 0x00, 0x02).unwrap();
        let mut ctrl = NoMBC::new(config, Arc::from(vec![0u8; ROM_BANK_SIZE * 2]));
        ctrl.write(CRAM_BEGIN + 5, 0x42);
        assert_eq!(ctrl.read(CRAM_BEGIN + 5), 0x42);
    }
}
