use crate::drivers::DriverError;
use crate::types::{ConfigSignature, HEADER_SLOTS, NO_DATA, SAMPLES_PER_FRAME};
const IDX_FREQ_HZ: usize = 0;
const IDX_VOLT_MV: usize = 1;
const IDX_GROUND_ADC: usize = 2;
/// One channel's worth of samples plus the header the driver reports with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleFrame {
    pub freq_hz: i32,
    pub volt_mv: i32,
    pub ground_adc: i32,
    pub samples: Vec<u8>, // always SAMPLES_PER_FRAME long
}
impl SampleFrame {
    /// Frame that carries no data (every sample at the sentinel).
    pub fn empty() -> Self {
        Self {
            freq_hz: 0,
            volt_mv: 0,
            ground_adc: 0,
            samples: vec![NO_DATA; SAMPLES_PER_FRAME],
        }
    }
    pub fn with_samples(signature: ConfigSignature, samples: &[u8]) -> Self {
        let mut frame = Self::empty();
        frame.freq_hz = signature.freq_hz;
        frame.volt_mv = signature.volt_mv;
        frame.ground_adc = signature.ground_adc;
        for (dst, src) in frame.samples.iter_mut().zip(samples) {
            *dst = *src;
        }
        frame
    }
    pub fn signature(&self) -> ConfigSignature {
        ConfigSignature {
            freq_hz: self.freq_hz,
            volt_mv: self.volt_mv,
            ground_adc: self.ground_adc,
        }
    }
    /// True iff at least one sample differs from the "no data" sentinel.
    pub fn has_data(&self) -> bool {
        self.samples.iter().any(|&s| s != NO_DATA)
    }
    /// Overwrite this frame from a driver buffer laid out as
    /// `[freq, volt, ground, sample_0 .. sample_N-1, ...]`.
    pub fn decode_from(&mut self, buf: &[i32]) -> Result<(), DriverError> {
        let needed = HEADER_SLOTS + SAMPLES_PER_FRAME;
        if buf.len() < needed {
            return Err(DriverError::BufferTooSmall {
                expected: needed,
                actual: buf.len(),
            });
        }
        self.freq_hz = buf[IDX_FREQ_HZ];
        self.volt_mv = buf[IDX_VOLT_MV];
        self.ground_adc = buf[IDX_GROUND_ADC];
        self.samples.resize(SAMPLES_PER_FRAME, NO_DATA);
        for (dst, src) in self.samples.iter_mut().zip(&buf[HEADER_SLOTS..needed]) {
            *dst = (*src).clamp(0, NO_DATA as i32) as u8;
        }
        Ok(())
    }
    /// Inverse of [`SampleFrame::decode_from`], used by non-hardware sources.
    pub fn encode_into(&self, buf: &mut [i32]) -> Result<(), DriverError> {
        let needed = HEADER_SLOTS + SAMPLES_PER_FRAME;
        if buf.len() < needed {
            return Err(DriverError::BufferTooSmall {
                expected: needed,
                actual: buf.len(),
            });
        }
        buf[IDX_FREQ_HZ] = self.freq_hz;
        buf[IDX_VOLT_MV] = self.volt_mv;
        buf[IDX_GROUND_ADC] = self.ground_adc;
        for (dst, src) in buf[HEADER_SLOTS..needed].iter_mut().zip(&self.samples) {
            *dst = *src as i32;
        }
        Ok(())
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DRIVER_BUFFER_LEN;
    #[test]
    fn decodes_header_and_samples_from_driver_layout() {
        let mut buf = vec![0i32; DRIVER_BUFFER_LEN];
        buf[0] = 1000;
        buf[1] = 500;
        buf[2] = 7;
        buf[HEADER_SLOTS] = 12;
        buf[HEADER_SLOTS + SAMPLES_PER_FRAME - 1] = 300; // out of byte range
        buf[HEADER_SLOTS + SAMPLES_PER_FRAME] = 99; // past the frame, ignored
        let mut frame = SampleFrame::empty();
        frame.decode_from(&buf).unwrap();
        assert_eq!((frame.freq_hz, frame.volt_mv, frame.ground_adc), (1000, 500, 7));
        assert_eq!(frame.samples.len(), SAMPLES_PER_FRAME);
        assert_eq!(frame.samples[0], 12);
        assert_eq!(frame.samples[SAMPLES_PER_FRAME - 1], 255);
    }
    #[test]
    fn short_buffer_is_rejected() {
        let mut frame = SampleFrame::empty();
        let err = frame.decode_from(&[0; 10]).unwrap_err();
        assert!(matches!(err, DriverError::BufferTooSmall { actual: 10, .. }));
    }
    #[test]
    fn all_sentinel_frame_has_no_data() {
        let mut frame = SampleFrame::empty();
        assert!(!frame.has_data());
        frame.samples[4095] = 254;
        assert!(frame.has_data());
    }
}
