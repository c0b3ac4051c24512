#[cfg(test)]
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use rand::Rng;
use crate::drivers::{DriverError, SampleFrame};
use crate::types::{ChannelId, ConfigSignature, SAMPLES_PER_FRAME};
/// Something that hands out one frame per channel each time it reports data ready.
///
/// Mirrors the vendor driver: a readiness poll, then one read per channel into a
/// caller-provided int buffer (3 header slots followed by the samples).
pub trait FrameSource {
    fn is_data_ready(&mut self) -> Result<bool, DriverError>;
    fn read_channel(&mut self, channel: ChannelId, buf: &mut [i32]) -> Result<(), DriverError>;
}
/// In-memory source for deterministic playback.
#[cfg(test)]
pub struct ManualSource {
    queue: VecDeque<[SampleFrame; 2]>,
    current: Option<[SampleFrame; 2]>,
}
#[cfg(test)]
impl ManualSource {
    pub fn new(batches: impl IntoIterator<Item = [SampleFrame; 2]>) -> Self {
        Self {
            queue: batches.into_iter().collect(),
            current: None,
        }
    }
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}
#[cfg(test)]
impl FrameSource for ManualSource {
    fn is_data_ready(&mut self) -> Result<bool, DriverError> {
        self.current = self.queue.pop_front();
        Ok(self.current.is_some())
    }
    fn read_channel(&mut self, channel: ChannelId, buf: &mut [i32]) -> Result<(), DriverError> {
        match &self.current {
            Some(frames) => frames[channel.index()].encode_into(buf),
            None => SampleFrame::empty().encode_into(buf),
        }
    }
}
/// Bin where the simulated trace peaks at startup (the scope's trigger point).
const SIM_TRIGGER_BIN: usize = 1018;
const SIM_SIGNATURE: ConfigSignature = ConfigSignature {
    freq_hz: 1000,
    volt_mv: 500,
    ground_adc: 0,
};
/// Synthetic instrument for machines without the vendor library:
/// a noisy floor with one drifting peak per channel.
pub struct SimulatedSource {
    interval: Duration,
    last_ready: Option<Instant>,
    phase: usize,
}
impl SimulatedSource {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_ready: None,
            phase: 0,
        }
    }
    fn frame_for(&self, channel: ChannelId) -> SampleFrame {
        let mut rng = rand::thread_rng();
        let offset = channel.index() * SAMPLES_PER_FRAME / 3;
        let center = (SIM_TRIGGER_BIN + offset + self.phase * 16) % SAMPLES_PER_FRAME;
        let samples: Vec<u8> = (0..SAMPLES_PER_FRAME)
            .map(|i| {
                let dist = (i as f64 - center as f64) / 40.0;
                let peak = 200.0 * (-dist * dist).exp();
                let noise: f64 = rng.gen_range(0.0..30.0);
                (peak + noise).min(254.0) as u8
            })
            .collect();
        SampleFrame::with_samples(SIM_SIGNATURE, &samples)
    }
}
impl FrameSource for SimulatedSource {
    fn is_data_ready(&mut self) -> Result<bool, DriverError> {
        let now = Instant::now();
        let due = self
            .last_ready
            .map(|t| now.duration_since(t) >= self.interval)
            .unwrap_or(true);
        if due {
            self.last_ready = Some(now);
            self.phase = self.phase.wrapping_add(1);
        }
        Ok(due)
    }
    fn read_channel(&mut self, channel: ChannelId, buf: &mut [i32]) -> Result<(), DriverError> {
        self.frame_for(channel).encode_into(buf)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DRIVER_BUFFER_LEN;
    #[test]
    fn manual_source_plays_batches_in_order() {
        let sig = ConfigSignature {
            freq_hz: 10,
            volt_mv: 20,
            ground_adc: 0,
        };
        let a = SampleFrame::with_samples(sig, &[1, 2, 3]);
        let b = SampleFrame::with_samples(sig, &[4, 5, 6]);
        let mut source = ManualSource::new(vec![[a.clone(), b.clone()]]);
        let mut buf = vec![0i32; DRIVER_BUFFER_LEN];
        assert!(source.is_data_ready().unwrap());
        source.read_channel(ChannelId::Ch2, &mut buf).unwrap();
        let mut decoded = SampleFrame::empty();
        decoded.decode_from(&buf).unwrap();
        assert_eq!(decoded, b);
        assert!(!source.is_data_ready().unwrap());
        source.read_channel(ChannelId::Ch1, &mut buf).unwrap();
        decoded.decode_from(&buf).unwrap();
        assert!(!decoded.has_data());
    }
    #[test]
    fn simulated_source_paces_frames() {
        let mut source = SimulatedSource::new(Duration::from_secs(3600));
        assert!(source.is_data_ready().unwrap());
        assert!(!source.is_data_ready().unwrap());
        let mut buf = vec![0i32; DRIVER_BUFFER_LEN];
        source.read_channel(ChannelId::Ch1, &mut buf).unwrap();
        let mut frame = SampleFrame::empty();
        frame.decode_from(&buf).unwrap();
        assert!(frame.has_data());
        assert_eq!(frame.signature(), SIM_SIGNATURE);
    }
}
