pub mod buffer;
pub mod noise;
pub mod square;
pub mod wave;

use crate::gb::audio::buffer::SampleRing;
use crate::gb::audio::noise::NoiseChannel;
use crate::gb::audio::square::SquareChannel;
use crate::gb::audio::wave::WaveChannel;
use crate::gb::constants::*;
use std::sync::Arc;

/// CPU cycles between frame-sequencer ticks: 4194304 Hz / 512 Hz.
const FRAME_SEQUENCER_PERIOD: u32 = 8192;
/// CPU cycles per stereo sample at 44100 Hz output.
const CYCLES_PER_SAMPLE: f32 = 4_194_304.0 / 44_100.0;

/// The 4-channel APU: register shell, frame sequencer, and a mixer that
/// pushes stereo float samples into a shared ring buffer for the host.
pub struct Apu {
    ch1: SquareChannel,
    ch2: SquareChannel,
    ch3: WaveChannel,
    ch4: NoiseChannel,

    nr50: u8,
    nr51: u8,
    power: bool,

    frame_sequencer_cycles: u32,
    frame_sequencer_step: u8,
    sample_acc: f32,

    enabled: bool,
    ring: Arc<SampleRing>,
}

impl Default for Apu {
    fn default() -> Self {
        Self {
            ch1: SquareChannel::with_sweep(),
            ch2: SquareChannel::default(),
            ch3: WaveChannel::default(),
            ch4: NoiseChannel::default(),
            nr50: 0,
            nr51: 0,
            power: true,
            frame_sequencer_cycles: 0,
            frame_sequencer_step: 0,
            sample_acc: 0.0,
            enabled: true,
            ring: Arc::new(SampleRing::default()),
        }
    }
}

impl Apu {
    pub fn reset(&mut self) {
        let ring = Arc::clone(&self.ring);
        let enabled = self.enabled;
        *self = Self::default();
        self.ring = ring;
        self.enabled = enabled;
    }

    pub fn set_audio_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn sample_ring(&self) -> Arc<SampleRing> {
        Arc::clone(&self.ring)
    }

    pub fn read(&self, address: u16) -> u8 {
        match address {
            0xFF11 => 0x3F, // NR11: length is write-only
            0xFF16 => 0x3F, // NR21
            0xFF1B => 0xFF, // NR31
            0xFF20 => 0xFF, // NR41
            0xFF24 => self.nr50,
            0xFF25 => self.nr51,
            0xFF26 => self.status_byte(),
            WAVE_RAM_BEGIN..=WAVE_RAM_END => self.ch3.read_wave_ram((address - WAVE_RAM_BEGIN) as usize),
            AUDIO_BEGIN..=AUDIO_END => 0xFF,
            _ => UNDEFINED_READ,
        }
    }

    pub fn write(&mut self, address: u16, value: u8) {
        if !self.power && address != 0xFF26 {
            return;
        }
        match address {
            0xFF10 => self.ch1.write_sweep(value),
            0xFF11 => self.ch1.write_nrx1(value),
            0xFF12 => self.ch1.write_nrx2(value),
            0xFF13 => self.ch1.write_nrx3(value),
            0xFF14 => self.ch1.write_nrx4(value),

            0xFF16 => self.ch2.write_nrx1(value),
            0xFF17 => self.ch2.write_nrx2(value),
            0xFF18 => self.ch2.write_nrx3(value),
            0xFF19 => self.ch2.write_nrx4(value),

            0xFF1A => self.ch3.write_nr30(value),
            0xFF1B => self.ch3.write_nr31(value),
            0xFF1C => self.ch3.write_nr32(value),
            0xFF1D => self.ch3.write_nr33(value),
            0xFF1E => self.ch3.write_nr34(value),

            0xFF20 => self.ch4.write_nr41(value),
            0xFF21 => self.ch4.write_nr42(value),
            0xFF22 => self.ch4.write_nr43(value),
            0xFF23 => self.ch4.write_nr44(value),

            0xFF24 => self.nr50 = value,
            0xFF25 => self.nr51 = value,
            0xFF26 => self.power = value & 0x80 != 0,

            WAVE_RAM_BEGIN..=WAVE_RAM_END => {
                self.ch3.write_wave_ram((address - WAVE_RAM_BEGIN) as usize, value)
            }
            _ => {}
        }
    }

    fn status_byte(&self) -> u8 {
        let mut bits = 0x70;
        if self.power {
            bits |= 0x80;
        }
        if self.ch1.enabled {
            bits |= 0x01;
        }
        if self.ch2.enabled {
            bits |= 0x02;
        }
        if self.ch3.enabled {
            bits |= 0x04;
        }
        if self.ch4.enabled {
            bits |= 0x08;
        }
        bits
    }

    pub fn step(&mut self, cycles: u8) {
        if !self.power {
            return;
        }

        self.frame_sequencer_cycles += u32::from(cycles);
        while self.frame_sequencer_cycles >= FRAME_SEQUENCER_PERIOD {
            self.frame_sequencer_cycles -= FRAME_SEQUENCER_PERIOD;
            self.step_frame_sequencer();
        }

        let c1 = self.ch1.step(u16::from(cycles));
        let c2 = self.ch2.step(u16::from(cycles));
        let c3 = self.ch3.step(u16::from(cycles));
        let c4 = self.ch4.step(u16::from(cycles));

        if !self.enabled {
            return;
        }

        self.sample_acc += f32::from(cycles);
        while self.sample_acc >= CYCLES_PER_SAMPLE {
            self.sample_acc -= CYCLES_PER_SAMPLE;
            let (left, right) = self.mix(c1, c2, c3, c4);
            self.ring.push(left, right);
        }
    }

    fn step_frame_sequencer(&mut self) {
        // Steps 0,2,4,6 clock length; 7 clocks envelope; 2,6 also clock sweep.
        match self.frame_sequencer_step {
            0 | 4 => {
                self.ch1.step_length();
                self.ch2.step_length();
                self.ch3.step_length();
                self.ch4.step_length();
            }
            2 | 6 => {
                self.ch1.step_length();
                self.ch2.step_length();
                self.ch3.step_length();
                self.ch4.step_length();
                self.ch1.step_sweep();
            }
            7 => {
                self.ch1.step_envelope();
                self.ch2.step_envelope();
                self.ch4.step_envelope();
            }
            _ => {}
        }
        self.frame_sequencer_step = (self.frame_sequencer_step + 1) % 8;
    }

    fn mix(&self, c1: i16, c2: i16, c3: i16, c4: i16) -> (f32, f32) {
        let dac = |raw: i16, dac_enabled: bool| -> f32 {
            if dac_enabled { (f32::from(raw) - 7.5) / 7.5 } else { 0.0 }
        };
        let s1 = dac(c1, self.ch1.dac_enabled());
        let s2 = dac(c2, self.ch2.dac_enabled());
        let s3 = dac(c3, self.ch3.dac_enabled());
        let s4 = dac(c4, self.ch4.dac_enabled());

        let left_volume = f32::from(((self.nr50 >> 4) & 0x07) + 1) / 8.0;
        let right_volume = f32::from((self.nr50 & 0x07) + 1) / 8.0;

        let mut left = 0.0;
        let mut right = 0.0;
        let channels = [(s1, 0x01, 0x10), (s2, 0x02, 0x20), (s3, 0x04, 0x40), (s4, 0x08, 0x80)];
        for (sample, right_bit, left_bit) in channels {
            if self.nr51 & right_bit != 0 {
                right += sample;
            }
            if self.nr51 & left_bit != 0 {
                left += sample;
            }
        }

        ((left / 4.0 * left_volume).clamp(-1.0, 1.0), (right / 4.0 * right_volume).clamp(-1.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_byte_reflects_channel_enable_state() {
        let mut apu = Apu::default();
        apu.write(0xFF12, 0xF0); // ch1 volume/dac
        apu.write(0xFF14, 0x80); // trigger
        assert_eq!(apu.read(0xFF26) & 0x01, 0x01);
    }

    #[test]
    fn power_off_ignores_writes_except_nr52() {
        let mut apu = Apu::default();
        apu.write(0xFF26, 0x00); // power off
        apu.write(0xFF12, 0xF0);
        apu.write(0xFF14, 0x80);
        assert_eq!(apu.read(0xFF26) & 0x01, 0, "trigger write was ignored while powered off");
    }

    #[test]
    fn sample_ring_receives_samples_over_one_frame() {
        let mut apu = Apu::default();
        apu.write(0xFF12, 0xF0);
        apu.write(0xFF11, 0x80);
        apu.write(0xFF14, 0x87);
        apu.write(0xFF24, 0x77); // full volume both sides
        apu.write(0xFF25, 0xFF); // all channels to both sides
        for _ in 0..(70224 / 4) {
            apu.step(4);
        }
        let ring = apu.sample_ring();
        let mut out = [0.0f32; 16];
        let n = ring.read(&mut out);
        assert!(n > 0);
    }

    #[test]
    fn wave_ram_round_trips_through_bus_addressing() {
        let mut apu = Apu::default();
        apu.write(WAVE_RAM_BEGIN, 0xAB);
        assert_eq!(apu.read(WAVE_RAM_BEGIN), 0xAB);
    }
}
