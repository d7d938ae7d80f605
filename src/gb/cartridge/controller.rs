use crate::gb::cartridge::mbc1::MBC1;
use crate::gb::cartridge::mbc2::MBC2;
use crate::gb::cartridge::mbc3::MBC3;
use crate::gb::cartridge::nombc::NoMBC;
use crate::gb::cartridge::{CartridgeConfig, ControllerType};
use std::sync::Arc;

/// This trait defines the interface for a bank controller.
/// It allows reading and writing to different banks of the cartridge.
pub trait BankController: Send {
    /// Reads a byte from the given address.
    fn read(&self, address: u16) -> u8;

    /// Writes a byte to the given address. Addresses below 0x8000 hit MBC
    /// control registers rather than ROM; addresses in 0xA000-0xBFFF hit
    /// cartridge RAM.
    fn write(&mut self, address: u16, value: u8);
}

/// Creates a new `BankController` for the given ROM and `CartridgeConfig`.
pub fn new(config: CartridgeConfig, rom: Arc<[u8]>) -> Box<dyn BankController> {
    match config.controller {
        ControllerType::NoMBC => Box::new(NoMBC::new(config, rom)),
        ControllerType::MBC1 => Box::new(MBC1::new(config, rom)),
        ControllerType::MBC2 => Box::new(MBC2::new(config, rom)),
        ControllerType::MBC3 => Box::new(MBC3::new(config, rom)),
    }
}
