use bitflags::bitflags;

bitflags! {
    /// Shared bit layout of IF (0xFF0F) and IE (0xFFFF). Bits 5-7 of IF
    /// always read back as 1; that masking is applied by the bus, not here.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct InterruptFlags: u8 {
        const VBLANK = 1 << 0;
        const LCD_STAT = 1 << 1;
        const TIMER = 1 << 2;
        const SERIAL = 1 << 3;
        const JOYPAD = 1 << 4;
    }
}

impl InterruptFlags {
    pub const VECTOR_VBLANK: u16 = 0x0040;
    pub const VECTOR_LCD_STAT: u16 = 0x0048;
    pub const VECTOR_TIMER: u16 = 0x0050;
    pub const VECTOR_SERIAL: u16 = 0x0058;
    pub const VECTOR_JOYPAD: u16 = 0x0060;

    /// Highest-priority requested-and-enabled source, if any, along with
    /// the single flag bit to clear and the vector to jump to.
    pub fn highest_priority(requested: InterruptFlags, enabled: InterruptFlags) -> Option<(InterruptFlags, u16)> {
        let pending = requested & enabled;
        if pending.contains(InterruptFlags::VBLANK) {
            Some((InterruptFlags::VBLANK, Self::VECTOR_VBLANK))
        } else if pending.contains(InterruptFlags::LCD_STAT) {
            Some((InterruptFlags::LCD_STAT, Self::VECTOR_LCD_STAT))
        } else if pending.contains(InterruptFlags::TIMER) {
            Some((InterruptFlags::TIMER, Self::VECTOR_TIMER))
        } else if pending.contains(InterruptFlags::SERIAL) {
            Some((InterruptFlags::SERIAL, Self::VECTOR_SERIAL))
        } else if pending.contains(InterruptFlags::JOYPAD) {
            Some((InterruptFlags::JOYPAD, Self::VECTOR_JOYPAD))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vblank_outranks_joypad() {
        let requested = InterruptFlags::VBLANK | InterruptFlags::JOYPAD;
        let enabled = InterruptFlags::all();
        let (bit, vector) = InterruptFlags::highest_priority(requested, enabled).unwrap();
        assert_eq!(bit, InterruptFlags::VBLANK);
        assert_eq!(vector, InterruptFlags::VECTOR_VBLANK);
    }

    #[test]
    fn disabled_source_is_not_serviced() {
        let requested = InterruptFlags::VBLANK;
        let enabled = InterruptFlags::JOYPAD;
        assert!(InterruptFlags::highest_priority(requested, enabled).is_none());
    }

    #[test]
    fn falls_through_to_lower_priority_source() {
        let requested = InterruptFlags::TIMER;
        let enabled = InterruptFlags::all();
        let (bit, vector) = InterruptFlags::highest_priority(requested, enabled).unwrap();
        assert_eq!(bit, InterruptFlags::TIMER);
        assert_eq!(vector, InterruptFlags::VECTOR_TIMER);
    }
}
