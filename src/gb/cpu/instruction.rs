//! Opcode decoding: operand-target enums with `read`/`write` methods plus
//! the `Instruction` enum and its `from_byte` decode tables. Execution
//! itself lives in `cpu::mod`, dispatched from a single match over
//! `Instruction`.

use crate::gb::AddressSpace;
use crate::gb::cpu::CPU;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteSource {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
    D8,
    HLI,
    BCI,
    DEI,
    D16I,
    CIFF00,
    D8IFF00,
}

impl ByteSource {
    pub fn read(self, cpu: &mut CPU, bus: &mut impl AddressSpace) -> u8 {
        match self {
            ByteSource::A => cpu.r.a,
            ByteSource::B => cpu.r.b,
            ByteSource::C => cpu.r.c,
            ByteSource::D => cpu.r.d,
            ByteSource::E => cpu.r.e,
            ByteSource::H => cpu.r.h,
            ByteSource::L => cpu.r.l,
            ByteSource::D8 => cpu.consume_byte(bus),
            ByteSource::HLI => bus.read(cpu.r.get_hl()),
            ByteSource::BCI => bus.read(cpu.r.get_bc()),
            ByteSource::DEI => bus.read(cpu.r.get_de()),
            ByteSource::D16I => {
                let addr = cpu.consume_word(bus);
                bus.read(addr)
            }
            ByteSource::CIFF00 => bus.read(0xFF00 + u16::from(cpu.r.c)),
            ByteSource::D8IFF00 => {
                let offset = cpu.consume_byte(bus);
                bus.read(0xFF00 + u16::from(offset))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadByteTarget {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
    HLI,
    BCI,
    DEI,
    D16I,
    CIFF00,
    D8IFF00,
}

impl LoadByteTarget {
    pub fn write(self, cpu: &mut CPU, bus: &mut impl AddressSpace, value: u8) {
        match self {
            LoadByteTarget::A => cpu.r.a = value,
            LoadByteTarget::B => cpu.r.b = value,
            LoadByteTarget::C => cpu.r.c = value,
            LoadByteTarget::D => cpu.r.d = value,
            LoadByteTarget::E => cpu.r.e = value,
            LoadByteTarget::H => cpu.r.h = value,
            LoadByteTarget::L => cpu.r.l = value,
            LoadByteTarget::HLI => bus.write(cpu.r.get_hl(), value),
            LoadByteTarget::BCI => bus.write(cpu.r.get_bc(), value),
            LoadByteTarget::DEI => bus.write(cpu.r.get_de(), value),
            LoadByteTarget::D16I => {
                let addr = cpu.consume_word(bus);
                bus.write(addr, value);
            }
            LoadByteTarget::CIFF00 => bus.write(0xFF00 + u16::from(cpu.r.c), value),
            LoadByteTarget::D8IFF00 => {
                let offset = cpu.consume_byte(bus);
                bus.write(0xFF00 + u16::from(offset), value);
            }
        }
    }
}

/// Operand used by the CB-prefixed rotate/shift/BIT/RES/SET instructions,
/// which need to read and write the same location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixTarget {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
    HLI,
}

impl PrefixTarget {
    pub fn read(self, cpu: &CPU, bus: &impl AddressSpace) -> u8 {
        match self {
            PrefixTarget::A => cpu.r.a,
            PrefixTarget::B => cpu.r.b,
            PrefixTarget::C => cpu.r.c,
            PrefixTarget::D => cpu.r.d,
            PrefixTarget::E => cpu.r.e,
            PrefixTarget::H => cpu.r.h,
            PrefixTarget::L => cpu.r.l,
            PrefixTarget::HLI => bus.read(cpu.r.get_hl()),
        }
    }

    pub fn write(self, cpu: &mut CPU, bus: &mut impl AddressSpace, value: u8) {
        match self {
            PrefixTarget::A => cpu.r.a = value,
            PrefixTarget::B => cpu.r.b = value,
            PrefixTarget::C => cpu.r.c = value,
            PrefixTarget::D => cpu.r.d = value,
            PrefixTarget::E => cpu.r.e = value,
            PrefixTarget::H => cpu.r.h = value,
            PrefixTarget::L => cpu.r.l = value,
            PrefixTarget::HLI => bus.write(cpu.r.get_hl(), value),
        }
    }

    /// CB-prefixed ops on `(HL)` cost 16 cycles instead of 8.
    pub fn is_indirect(self) -> bool {
        matches!(self, PrefixTarget::HLI)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncDecByteTarget {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
    HLI,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncDecWordTarget {
    BC,
    DE,
    HL,
    SP,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordSource {
    BC,
    DE,
    HL,
    SP,
}

impl WordSource {
    pub fn read(self, cpu: &CPU) -> u16 {
        match self {
            WordSource::BC => cpu.r.get_bc(),
            WordSource::DE => cpu.r.get_de(),
            WordSource::HL => cpu.r.get_hl(),
            WordSource::SP => cpu.sp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadWordTarget {
    BC,
    DE,
    HL,
    SP,
}

impl LoadWordTarget {
    pub fn write(self, cpu: &mut CPU, value: u16) {
        match self {
            LoadWordTarget::BC => cpu.r.set_bc(value),
            LoadWordTarget::DE => cpu.r.set_de(value),
            LoadWordTarget::HL => cpu.r.set_hl(value),
            LoadWordTarget::SP => cpu.sp = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackTarget {
    AF,
    BC,
    DE,
    HL,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ResetCode {
    RST00 = 0x00,
    RST08 = 0x08,
    RST10 = 0x10,
    RST18 = 0x18,
    RST20 = 0x20,
    RST28 = 0x28,
    RST30 = 0x30,
    RST38 = 0x38,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpTest {
    NotZero,
    Zero,
    NotCarry,
    Carry,
    Always,
}

impl JumpTest {
    pub fn resolve(self, cpu: &CPU) -> bool {
        use crate::gb::cpu::registers::FlagsRegister;
        match self {
            JumpTest::NotZero => !cpu.r.f.contains(FlagsRegister::ZERO),
            JumpTest::Zero => cpu.r.f.contains(FlagsRegister::ZERO),
            JumpTest::NotCarry => !cpu.r.f.contains(FlagsRegister::CARRY),
            JumpTest::Carry => cpu.r.f.contains(FlagsRegister::CARRY),
            JumpTest::Always => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Load {
    /// Generic 8-bit register/immediate/indirect load.
    Byte(LoadByteTarget, ByteSource),
    /// `LD rr, d16`.
    Word(LoadWordTarget),
    /// `LD (a16), SP`.
    IndirectFromSP,
    /// `LD SP, HL`.
    SPFromHL,
    /// `LD HL, SP+r8`.
    HLFromSPOffset,
    /// `LD (HL+), A`.
    IndirectFromAInc,
    /// `LD (HL-), A`.
    IndirectFromADec,
    /// `LD A, (HL+)`.
    FromIndirectAInc,
    /// `LD A, (HL-)`.
    FromIndirectADec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    Halt,
    Stop,
    Di,
    Ei,
    Load(Load),
    Push(StackTarget),
    Pop(StackTarget),
    Add(ByteSource),
    Adc(ByteSource),
    Sub(ByteSource),
    Sbc(ByteSource),
    And(ByteSource),
    Or(ByteSource),
    Xor(ByteSource),
    Cp(ByteSource),
    Inc(IncDecByteTarget),
    Dec(IncDecByteTarget),
    IncWord(IncDecWordTarget),
    DecWord(IncDecWordTarget),
    AddHl(WordSource),
    AddSp,
    Rlca,
    Rrca,
    Rla,
    Rra,
    Cpl,
    Scf,
    Ccf,
    Daa,
    Jp(JumpTest),
    JpHl,
    Jr(JumpTest),
    Call(JumpTest),
    Ret(JumpTest),
    Reti,
    Rst(ResetCode),
    /// CB-prefixed: RLC/RRC/RL/RR/SLA/SRA/SRL/SWAP select on the low 3 bits.
    Rlc(PrefixTarget),
    Rrc(PrefixTarget),
    Rl(PrefixTarget),
    Rr(PrefixTarget),
    Sla(PrefixTarget),
    Sra(PrefixTarget),
    Swap(PrefixTarget),
    Srl(PrefixTarget),
    Bit(u8, PrefixTarget),
    Res(u8, PrefixTarget),
    Set(u8, PrefixTarget),
    /// Unofficial opcode, treated as a 4-cycle NOP with a logged warning.
    Illegal(u8),
}

const PREFIX_TARGETS: [PrefixTarget; 8] = [
    PrefixTarget::B,
    PrefixTarget::C,
    PrefixTarget::D,
    PrefixTarget::E,
    PrefixTarget::H,
    PrefixTarget::L,
    PrefixTarget::HLI,
    PrefixTarget::A,
];

const BYTE_SOURCES: [ByteSource; 8] = [
    ByteSource::B,
    ByteSource::C,
    ByteSource::D,
    ByteSource::E,
    ByteSource::H,
    ByteSource::L,
    ByteSource::HLI,
    ByteSource::A,
];

const INC_DEC_TARGETS: [IncDecByteTarget; 8] = [
    IncDecByteTarget::B,
    IncDecByteTarget::C,
    IncDecByteTarget::D,
    IncDecByteTarget::E,
    IncDecByteTarget::H,
    IncDecByteTarget::L,
    IncDecByteTarget::HLI,
    IncDecByteTarget::A,
];

const LOAD_BYTE_TARGETS: [LoadByteTarget; 8] = [
    LoadByteTarget::B,
    LoadByteTarget::C,
    LoadByteTarget::D,
    LoadByteTarget::E,
    LoadByteTarget::H,
    LoadByteTarget::L,
    LoadByteTarget::HLI,
    LoadByteTarget::A,
];

const ILLEGAL_OPCODES: [u8; 11] = [
    0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD,
];

impl Instruction {
    pub fn from_byte(byte: u8, prefixed: bool) -> Option<Instruction> {
        if prefixed {
            Some(Self::from_prefixed(byte))
        } else {
            Self::from_unprefixed(byte)
        }
    }

    fn from_prefixed(byte: u8) -> Instruction {
        let target = PREFIX_TARGETS[(byte & 0x07) as usize];
        let bit = (byte >> 3) & 0x07;
        match byte >> 6 {
            0b01 => Instruction::Bit(bit, target),
            0b10 => Instruction::Res(bit, target),
            0b11 => Instruction::Set(bit, target),
            _ => match byte >> 3 {
                0x00 => Instruction::Rlc(target),
                0x01 => Instruction::Rrc(target),
                0x02 => Instruction::Rl(target),
                0x03 => Instruction::Rr(target),
                0x04 => Instruction::Sla(target),
                0x05 => Instruction::Sra(target),
                0x06 => Instruction::Swap(target),
                0x07 => Instruction::Srl(target),
                _ => unreachable!("rotate/shift group only spans 0x00-0x07"),
            },
        }
    }

    fn from_unprefixed(byte: u8) -> Option<Instruction> {
        if ILLEGAL_OPCODES.contains(&byte) {
            return Some(Instruction::Illegal(byte));
        }
        Some(match byte {
            0x00 => Instruction::Nop,
            0x76 => Instruction::Halt,
            0x10 => Instruction::Stop,
            0xF3 => Instruction::Di,
            0xFB => Instruction::Ei,

            // 8-bit register/immediate loads: 0x40-0x7F minus 0x76 (HALT).
            0x40..=0x7F => {
                let dst = LOAD_BYTE_TARGETS[((byte >> 3) & 0x07) as usize];
                let src = BYTE_SOURCES[(byte & 0x07) as usize];
                Instruction::Load(Load::Byte(dst, src))
            }
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                let dst = LOAD_BYTE_TARGETS[((byte >> 3) & 0x07) as usize];
                Instruction::Load(Load::Byte(dst, ByteSource::D8))
            }

            0x01 => Instruction::Load(Load::Word(LoadWordTarget::BC)),
            0x11 => Instruction::Load(Load::Word(LoadWordTarget::DE)),
            0x21 => Instruction::Load(Load::Word(LoadWordTarget::HL)),
            0x31 => Instruction::Load(Load::Word(LoadWordTarget::SP)),
            0x08 => Instruction::Load(Load::IndirectFromSP),
            0xF9 => Instruction::Load(Load::SPFromHL),
            0xF8 => Instruction::Load(Load::HLFromSPOffset),

            0x02 => Instruction::Load(Load::Byte(LoadByteTarget::BCI, ByteSource::A)),
            0x12 => Instruction::Load(Load::Byte(LoadByteTarget::DEI, ByteSource::A)),
            0x0A => Instruction::Load(Load::Byte(LoadByteTarget::A, ByteSource::BCI)),
            0x1A => Instruction::Load(Load::Byte(LoadByteTarget::A, ByteSource::DEI)),
            0x22 => Instruction::Load(Load::IndirectFromAInc),
            0x32 => Instruction::Load(Load::IndirectFromADec),
            0x2A => Instruction::Load(Load::FromIndirectAInc),
            0x3A => Instruction::Load(Load::FromIndirectADec),
            0xEA => Instruction::Load(Load::Byte(LoadByteTarget::D16I, ByteSource::A)),
            0xFA => Instruction::Load(Load::Byte(LoadByteTarget::A, ByteSource::D16I)),
            0xE0 => Instruction::Load(Load::Byte(LoadByteTarget::D8IFF00, ByteSource::A)),
            0xF0 => Instruction::Load(Load::Byte(LoadByteTarget::A, ByteSource::D8IFF00)),
            0xE2 => Instruction::Load(Load::Byte(LoadByteTarget::CIFF00, ByteSource::A)),
            0xF2 => Instruction::Load(Load::Byte(LoadByteTarget::A, ByteSource::CIFF00)),

            0xC5 => Instruction::Push(StackTarget::BC),
            0xD5 => Instruction::Push(StackTarget::DE),
            0xE5 => Instruction::Push(StackTarget::HL),
            0xF5 => Instruction::Push(StackTarget::AF),
            0xC1 => Instruction::Pop(StackTarget::BC),
            0xD1 => Instruction::Pop(StackTarget::DE),
            0xE1 => Instruction::Pop(StackTarget::HL),
            0xF1 => Instruction::Pop(StackTarget::AF),

            0x80..=0x87 => Instruction::Add(BYTE_SOURCES[(byte & 0x07) as usize]),
            0xC6 => Instruction::Add(ByteSource::D8),
            0x88..=0x8F => Instruction::Adc(BYTE_SOURCES[(byte & 0x07) as usize]),
            0xCE => Instruction::Adc(ByteSource::D8),
            0x90..=0x97 => Instruction::Sub(BYTE_SOURCES[(byte & 0x07) as usize]),
            0xD6 => Instruction::Sub(ByteSource::D8),
            0x98..=0x9F => Instruction::Sbc(BYTE_SOURCES[(byte & 0x07) as usize]),
            0xDE => Instruction::Sbc(ByteSource::D8),
            0xA0..=0xA7 => Instruction::And(BYTE_SOURCES[(byte & 0x07) as usize]),
            0xE6 => Instruction::And(ByteSource::D8),
            0xA8..=0xAF => Instruction::Xor(BYTE_SOURCES[(byte & 0x07) as usize]),
            0xEE => Instruction::Xor(ByteSource::D8),
            0xB0..=0xB7 => Instruction::Or(BYTE_SOURCES[(byte & 0x07) as usize]),
            0xF6 => Instruction::Or(ByteSource::D8),
            0xB8..=0xBF => Instruction::Cp(BYTE_SOURCES[(byte & 0x07) as usize]),
            0xFE => Instruction::Cp(ByteSource::D8),

            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                Instruction::Inc(INC_DEC_TARGETS[((byte >> 3) & 0x07) as usize])
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                Instruction::Dec(INC_DEC_TARGETS[((byte >> 3) & 0x07) as usize])
            }
            0x03 => Instruction::IncWord(IncDecWordTarget::BC),
            0x13 => Instruction::IncWord(IncDecWordTarget::DE),
            0x23 => Instruction::IncWord(IncDecWordTarget::HL),
            0x33 => Instruction::IncWord(IncDecWordTarget::SP),
            0x0B => Instruction::DecWord(IncDecWordTarget::BC),
            0x1B => Instruction::DecWord(IncDecWordTarget::DE),
            0x2B => Instruction::DecWord(IncDecWordTarget::HL),
            0x3B => Instruction::DecWord(IncDecWordTarget::SP),

            0x09 => Instruction::AddHl(WordSource::BC),
            0x19 => Instruction::AddHl(WordSource::DE),
            0x29 => Instruction::AddHl(WordSource::HL),
            0x39 => Instruction::AddHl(WordSource::SP),
            0xE8 => Instruction::AddSp,

            0x07 => Instruction::Rlca,
            0x0F => Instruction::Rrca,
            0x17 => Instruction::Rla,
            0x1F => Instruction::Rra,
            0x2F => Instruction::Cpl,
            0x37 => Instruction::Scf,
            0x3F => Instruction::Ccf,
            0x27 => Instruction::Daa,

            0xC3 => Instruction::Jp(JumpTest::Always),
            0xC2 => Instruction::Jp(JumpTest::NotZero),
            0xCA => Instruction::Jp(JumpTest::Zero),
            0xD2 => Instruction::Jp(JumpTest::NotCarry),
            0xDA => Instruction::Jp(JumpTest::Carry),
            0xE9 => Instruction::JpHl,
            0x18 => Instruction::Jr(JumpTest::Always),
            0x20 => Instruction::Jr(JumpTest::NotZero),
            0x28 => Instruction::Jr(JumpTest::Zero),
            0x30 => Instruction::Jr(JumpTest::NotCarry),
            0x38 => Instruction::Jr(JumpTest::Carry),

            0xCD => Instruction::Call(JumpTest::Always),
            0xC4 => Instruction::Call(JumpTest::NotZero),
            0xCC => Instruction::Call(JumpTest::Zero),
            0xD4 => Instruction::Call(JumpTest::NotCarry),
            0xDC => Instruction::Call(JumpTest::Carry),

            0xC9 => Instruction::Ret(JumpTest::Always),
            0xC0 => Instruction::Ret(JumpTest::NotZero),
            0xC8 => Instruction::Ret(JumpTest::Zero),
            0xD0 => Instruction::Ret(JumpTest::NotCarry),
            0xD8 => Instruction::Ret(JumpTest::Carry),
            0xD9 => Instruction::Reti,

            0xC7 => Instruction::Rst(ResetCode::RST00),
            0xCF => Instruction::Rst(ResetCode::RST08),
            0xD7 => Instruction::Rst(ResetCode::RST10),
            0xDF => Instruction::Rst(ResetCode::RST18),
            0xE7 => Instruction::Rst(ResetCode::RST20),
            0xEF => Instruction::Rst(ResetCode::RST28),
            0xF7 => Instruction::Rst(ResetCode::RST30),
            0xFF => Instruction::Rst(ResetCode::RST38),

            0xCB => unreachable!("0xCB is handled by the prefix fetch, not a plain opcode"),

            _ => return None,
        })
    }
}
