use std::path::Path;

use chrono::NaiveDateTime;
use log::{debug, info, warn};

use crate::drivers::{DriverError, FrameSource, SampleFrame};
use crate::heatmap::{byte_to_glyph, Glyph};
use crate::recorder::{self, RawLog, RecordError, RecordingTarget};
use crate::types::{ChannelId, ConfigSignature, RecordFormat, DRIVER_BUFFER_LEN, SAMPLES_PER_FRAME};

/// One acquisition input: latest frame, the setting it was taken with, and
/// the file it is being logged to.
pub struct Channel {
    id: ChannelId,
    driver_buf: Vec<i32>,
    frame: SampleFrame,
    signature: ConfigSignature,
    target: Option<RecordingTarget>,
    raw_log: Option<RawLog>,
    // reused for every text row
    row: String,
    rotate_after: u32,
}

impl Channel {
    pub fn new(id: ChannelId, rotate_after: u32) -> Self {
        Self {
            id,
            driver_buf: vec![0; DRIVER_BUFFER_LEN],
            frame: SampleFrame::empty(),
            signature: ConfigSignature::UNSET,
            target: None,
            raw_log: None,
            row: String::new(),
            rotate_after: rotate_after.max(1),
        }
    }

    pub fn signature(&self) -> ConfigSignature {
        self.signature
    }

    pub fn target(&self) -> Option<&RecordingTarget> {
        self.target.as_ref()
    }

    /// Records in the currently open raw file (0 when none is open).
    #[cfg(test)]
    pub fn raw_records(&self) -> u32 {
        self.raw_log.as_ref().map(RawLog::records).unwrap_or(0)
    }

    /// Pull this channel's frame from the source. Returns whether it carries any data.
    pub fn fetch_frame(&mut self, source: &mut impl FrameSource) -> Result<bool, DriverError> {
        source.read_channel(self.id, &mut self.driver_buf)?;
        self.frame.decode_from(&self.driver_buf)?;
        Ok(self.frame.has_data())
    }

    /// Compare the frame header with the stored signature, adopting every
    /// field that differs. The check is the commit.
    pub fn config_changed(&mut self) -> bool {
        let incoming = self.frame.signature();
        let mut changed = false;
        if self.signature.freq_hz != incoming.freq_hz {
            self.signature.freq_hz = incoming.freq_hz;
            changed = true;
        }
        if self.signature.volt_mv != incoming.volt_mv {
            self.signature.volt_mv = incoming.volt_mv;
            changed = true;
        }
        if self.signature.ground_adc != incoming.ground_adc {
            self.signature.ground_adc = incoming.ground_adc;
            changed = true;
        }
        changed
    }

    /// Derive a fresh target from the stored signature.
    pub fn update_target(
        &mut self,
        ts: NaiveDateTime,
        directory: &Path,
        format: RecordFormat,
    ) -> Result<(), RecordError> {
        let target = RecordingTarget::new(ts, directory, self.id, &self.signature, format);
        let stale = self
            .raw_log
            .as_ref()
            .is_some_and(|log| log.path() != target.path);
        info!(
            "channel {}: target {} ({:?})",
            self.id.number(),
            target.path.display(),
            format
        );
        self.target = Some(target);
        if stale {
            self.close_file()?;
        }
        Ok(())
    }

    /// Serialize the current frame to the current target, if any.
    pub fn record_frame(&mut self, ts: NaiveDateTime) -> Result<(), RecordError> {
        match self.target.as_ref().map(|t| t.format) {
            Some(RecordFormat::Raw) => self.record_raw(ts),
            Some(RecordFormat::Text) => self.record_text(ts),
            None => Ok(()),
        }
    }

    fn record_raw(&mut self, ts: NaiveDateTime) -> Result<(), RecordError> {
        let Some(target) = self.target.as_ref() else {
            return Ok(());
        };
        let path = target.path.clone();
        let directory = target.directory.clone();
        if self.raw_log.as_ref().map(|log| log.path() != path).unwrap_or(true) {
            self.close_file()?;
            self.raw_log = Some(RawLog::open(self.id, &path)?);
        }
        let Some(log) = self.raw_log.as_mut() else {
            return Ok(());
        };
        log.append(ts, &self.frame.samples)?;
        if log.records() >= self.rotate_after {
            debug!(
                "channel {}: {} records in {}, rotating",
                self.id.number(),
                log.records(),
                path.display()
            );
            self.close_file()?;
            self.update_target(ts, &directory, RecordFormat::Raw)?;
        }
        Ok(())
    }

    fn record_text(&mut self, ts: NaiveDateTime) -> Result<(), RecordError> {
        let Some(target) = self.target.as_mut() else {
            return Ok(());
        };
        self.row.clear();
        if !target.header_written {
            recorder::write_text_header(&mut self.row, self.id, &self.signature);
        }
        recorder::write_text_row(&mut self.row, ts, &self.frame.samples);
        recorder::append_text(self.id, &target.path, &self.row)?;
        target.header_written = true;
        Ok(())
    }

    /// Downsample the frame into `width` heat glyphs.
    ///
    /// Each bucket spans `N / width` samples but only its first `d - 1` feed the
    /// mean; the last sample of every bucket is skipped.
    pub fn render_row(&self, width: usize) -> Vec<Glyph> {
        if width == 0 {
            return Vec::new();
        }
        let d = (SAMPLES_PER_FRAME / width).max(1);
        (0..width)
            .map(|j| {
                let start = (j * d).min(SAMPLES_PER_FRAME);
                let end = (start + d - 1).min(SAMPLES_PER_FRAME);
                byte_to_glyph(bucket_mean(&self.frame.samples[start..end]))
            })
            .collect()
    }

    /// Forget the signature and target so the next frame starts over.
    /// An open raw file stays open until a different path is needed.
    pub fn reset(&mut self) {
        self.signature = ConfigSignature::UNSET;
        self.target = None;
    }

    /// Drop the target along with any open writer.
    pub fn stop_recording(&mut self) -> Result<(), RecordError> {
        self.target = None;
        self.close_file()
    }

    pub fn close_file(&mut self) -> Result<(), RecordError> {
        match self.raw_log.take() {
            Some(log) => log.close(),
            None => Ok(()),
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if let Err(e) = self.close_file() {
            warn!("{e}");
        }
    }
}

/// Rounded mean of a bucket as a byte; an empty bucket reads as 0.
fn bucket_mean(samples: &[u8]) -> u8 {
    if samples.is_empty() {
        return 0;
    }
    let sum: u32 = samples.iter().map(|&s| s as u32).sum();
    let len = samples.len() as u32;
    ((sum + len / 2) / len) as u8
}
