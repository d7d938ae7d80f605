use std::collections::VecDeque;
use std::sync::Mutex;

/// Interleaved stereo float sample ring, sized to a power of two. Written
/// by the emulation thread, drained by whatever audio host the frontend
/// wires up; access is serialised behind a single mutex.
pub struct SampleRing {
    inner: Mutex<VecDeque<f32>>,
    capacity: usize,
}

impl SampleRing {
    pub fn new(capacity_samples: usize) -> Self {
        let capacity = capacity_samples.next_power_of_two() * 2;
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Pushes one stereo frame. If the ring is full the oldest frame is
    /// dropped first, matching the documented overrun policy.
    pub fn push(&self, left: f32, right: f32) {
        let mut buf = self.inner.lock().unwrap();
        if buf.len() + 2 > self.capacity {
            buf.pop_front();
            buf.pop_front();
        }
        buf.push_back(left);
        buf.push_back(right);
    }

    /// Pulls up to `out.len()` interleaved samples, returns how many were
    /// written.
    pub fn read(&self, out: &mut [f32]) -> usize {
        let mut buf = self.inner.lock().unwrap();
        let mut n = 0;
        while n < out.len() {
            match buf.pop_front() {
                Some(sample) => {
                    out[n] = sample;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }
}

impl Default for SampleRing {
    fn default() -> Self {
        Self::new(4096)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_returns_what_was_written() {
        let ring = SampleRing::new(8);
        ring.push(0.5, -0.5);
        let mut out = [0.0f32; 4];
        let n = ring.read(&mut out);
        assert_eq!(n, 2);
        assert_eq!(out[0], 0.5);
        assert_eq!(out[1], -0.5);
    }

    #[test]
    fn overrun_drops_oldest_frame() {
        let ring = SampleRing::new(2); // capacity rounds to 4 samples (2 stereo frames)
        for i in 0..4 {
            ring.push(i as f32, i as f32);
        }
        let mut out = [0.0f32; 8];
        let n = ring.read(&mut out);
        assert!(n <= 4);
        assert_eq!(out[0], 2.0, "oldest two frames were dropped");
    }
}
