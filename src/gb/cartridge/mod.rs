pub mod controller;
mod mbc1;
mod mbc2;
mod mbc3;
mod nombc;

use crate::error::{GbError, GbResult};
use crate::gb::AddressSpace;
use crate::gb::cartridge::controller::BankController;
use crate::gb::constants::RAM_BANK_SIZE;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

const TITLE_BEGIN: usize = 0x0134;
const TITLE_END: usize = 0x0143;
const CONTROLLER_TYPE_ADDRESS: usize = 0x0147;
const ROM_SIZE_ADDRESS: usize = 0x0148;
const RAM_SIZE_ADDRESS: usize = 0x0149;
const HEADER_END: usize = 0x014F;

/// 0x00        => NoMBC
/// 0x01..=0x03 => MBC1
/// 0x05..=0x06 => MBC2
/// 0x0F..=0x13 => MBC3
/// Anything else is accepted but treated as NoMBC per the unknown-controller
/// error policy: reads succeed (bank 0/1 only), bank-control writes are
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerType {
    NoMBC,
    MBC1,
    MBC2,
    MBC3,
}

impl ControllerType {
    fn from_header_byte(byte: u8) -> Self {
        match byte {
            0x01..=0x03 => ControllerType::MBC1,
            0x05 | 0x06 => ControllerType::MBC2,
            0x0F..=0x13 => ControllerType::MBC3,
            _ => ControllerType::NoMBC,
        }
    }
}

impl fmt::Display for ControllerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerType::NoMBC => "NoMBC",
            ControllerType::MBC1 => "MBC1",
            ControllerType::MBC2 => "MBC2",
            ControllerType::MBC3 => "MBC3",
        };
        write!(f, "{name}")
    }
}

/// Derived, immutable configuration for a loaded cartridge: controller
/// type plus the bank counts implied by the ROM/RAM size header bytes.
#[derive(Debug, Clone, Copy)]
pub struct CartridgeConfig {
    pub controller: ControllerType,
    pub rom_banks: u16,
    pub ram_banks: u8,
}

impl CartridgeConfig {
    pub fn new(controller: ControllerType, rom_size_code: u8, ram_size_code: u8) -> GbResult<Self> {
        let rom_banks = match rom_size_code {
            0x00..=0x08 => 2u16 << rom_size_code,
            _ => return Err(GbError::UnsupportedRomSize(rom_size_code)),
        };
        let ram_banks = match ram_size_code {
            0x00 | 0x01 => 0,
            0x02 => 1,
            0x03 => 4,
            0x04 => 16,
            0x05 => 8,
            _ => return Err(GbError::UnsupportedRamSize(ram_size_code)),
        };
        Ok(Self {
            controller,
            rom_banks,
            ram_banks,
        })
    }

    /// Total RAM byte count implied by the RAM size code. MBC2's internal
    /// 512x4-bit RAM is not modeled here; it is owned directly by `MBC2`.
    pub fn ram_size(&self) -> usize {
        self.ram_banks as usize * RAM_BANK_SIZE
    }
}

/// Parsed ROM header fields.
#[derive(Debug, Clone)]
pub struct CartridgeHeader {
    pub title: String,
    pub controller_byte: u8,
    pub rom_size_code: u8,
    pub ram_size_code: u8,
}

impl CartridgeHeader {
    fn parse(rom: &[u8]) -> GbResult<Self> {
        if rom.len() <= HEADER_END {
            return Err(GbError::RomTooSmall { len: rom.len() });
        }
        let title = parse_title(&rom[TITLE_BEGIN..=TITLE_END]);
        Ok(Self {
            title,
            controller_byte: rom[CONTROLLER_TYPE_ADDRESS],
            rom_size_code: rom[ROM_SIZE_ADDRESS],
            ram_size_code: rom[RAM_SIZE_ADDRESS],
        })
    }
}

impl fmt::Display for CartridgeHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (type={:#04x})",
            self.title, self.controller_byte
        )
    }
}

/// Filters the title field down to printable ASCII alphanumerics/space and
/// trims trailing NULs, defaulting to "Unnamed" for a blank title.
fn parse_title(buf: &[u8]) -> String {
    let title: String = buf
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .collect();
    let title = title.trim().to_string();
    if title.is_empty() {
        "Unnamed".to_string()
    } else {
        title
    }
}

/// A loaded ROM image plus its bank-switch controller.
pub struct Cartridge {
    pub header: CartridgeHeader,
    controller: Box<dyn BankController>,
}

impl Cartridge {
    pub fn from_path(path: &Path) -> GbResult<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> GbResult<Self> {
        let header = CartridgeHeader::parse(&bytes)?;
        let controller_type = ControllerType::from_header_byte(header.controller_byte);
        let config =
            CartridgeConfig::new(controller_type, header.rom_size_code, header.ram_size_code)?;
        let rom: Arc<[u8]> = Arc::from(bytes.into_boxed_slice());
        let controller = controller::new(config, rom);
        Ok(Self { header, controller })
    }

    pub fn info(&self) -> String {
        format!("{} ({:#04x})", self.header.title, self.header.controller_byte)
    }
}

impl AddressSpace for Cartridge {
    fn read(&self, address: u16) -> u8 {
        self.controller.read(address)
    }

    fn write(&mut self, address: u16, value: u8) {
        self.controller.write(address, value);
    }
}

/// Computes the bit mask that keeps a requested bank number within the
/// cartridge's actual bank count (rounded down to the nearest power of two).
pub(crate) const fn bank_mask(rom_banks: u16) -> u16 {
    rom_banks.saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with_header(controller_byte: u8, rom_size: u8, ram_size: u8) -> Vec<u8> {
        let mut rom = vec![0u8; ROM_BANK_SIZE * 2];
        let title = b"TESTGAME";
        rom[TITLE_BEGIN..TITLE_BEGIN + title.len()].copy_from_slice(title);
        rom[CONTROLLER_TYPE_ADDRESS] = controller_byte;
        rom[ROM_SIZE_ADDRESS] = rom_size;
        rom[RAM_SIZE_ADDRESS] = ram_size;
        rom
    }

    use crate::gb::constants::ROM_BANK_SIZE;

    #[test]
    fn parses_title_and_controller_type() {
        let rom = rom_with_header(0x01, 0x00, 0x00);
        let cart = Cartridge::from_bytes(rom).unwrap();
        assert_eq!(cart.header.title, "TESTGAME");
        assert_eq!(
            ControllerType::from_header_byte(cart.header.controller_byte),
            ControllerType::MBC1
        );
    }

    #[test]
    fn rejects_truncated_rom() {
        let rom = vec![0u8; 10];
        assert!(matches!(
            Cartridge::from_bytes(rom),
            Err(GbError::RomTooSmall { .. })
        ));
    }

    #[test]
    fn unknown_controller_falls_back_to_nombc() {
        let rom = rom_with_header(0xFF, 0x00, 0x00);
        let cart = Cartridge::from_bytes(rom).unwrap();
        assert_eq!(
            ControllerType::from_header_byte(cart.header.controller_byte),
            ControllerType::NoMBC
        );
    }
}
