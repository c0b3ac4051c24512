// src/engine.rs
use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use log::{error, info, warn};
use once_cell::sync::Lazy;

use crate::channel::Channel;
use crate::config::Config;
use crate::drivers::FrameSource;
use crate::heatmap::{Glyph, GLYPH_TABLE};
use crate::terminal::StripTerminal;
use crate::types::{ChannelId, Command, RecordFormat};

pub const IDLE_HINT: &str = "Press [Run] in PCSGU250 GUI to start sampling...";

/// Single-threaded acquisition loop: polls the source, draws the strip and
/// feeds both channels' log files.
pub struct Session<S: FrameSource, T: StripTerminal> {
    source: S,
    terminal: T,
    channels: [Channel; 2],
    enabled: [bool; 2],
    recording: Option<RecordFormat>,
    // format to resume once frames come back after an idle pause
    paused: Option<RecordFormat>,
    output_dir: PathBuf,
    idle_sleep: Duration,
    idle_tick: Duration,
    frames_this_tick: u32,
    current_tick: u64,
}

impl<S: FrameSource, T: StripTerminal> Session<S, T> {
    pub fn new(source: S, terminal: T, config: &Config) -> Self {
        Self {
            source,
            terminal,
            channels: [
                Channel::new(ChannelId::Ch1, config.raw_rotate_records),
                Channel::new(ChannelId::Ch2, config.raw_rotate_records),
            ],
            enabled: [true, true],
            recording: None,
            paused: None,
            output_dir: config.output_dir.clone(),
            idle_sleep: config.idle_sleep(),
            idle_tick: config.idle_tick(),
            frames_this_tick: 0,
            current_tick: 0,
        }
    }

    /// Run until the user quits. Open files are closed on the way out.
    pub fn run(&mut self) -> Result<()> {
        Lazy::force(&GLYPH_TABLE);
        self.terminal.message("START saving data from PCSGU250.")?;
        self.terminal.message(
            "[Esc] exit, [Enter] text log, [Space] raw log, [1]/[2] toggle channel",
        )?;
        info!("session started, output dir {}", self.output_dir.display());

        let started = Instant::now();
        let outcome = self.event_loop(started);
        self.shutdown();
        outcome?;
        self.terminal.message("STOP saving data.")?;
        info!("session stopped");
        Ok(())
    }

    fn event_loop(&mut self, started: Instant) -> Result<()> {
        loop {
            if let Some(cmd) = self.terminal.poll_command()? {
                if !self.handle_command(cmd)? {
                    return Ok(());
                }
            }
            let ready = match self.source.is_data_ready() {
                Ok(ready) => ready,
                Err(e) => {
                    self.report(&format!("driver: {e}"))?;
                    false
                }
            };
            if ready {
                self.poll_once(Local::now().naive_local())?;
            } else {
                thread::sleep(self.idle_sleep);
            }
            let tick = (started.elapsed().as_millis() / self.idle_tick.as_millis().max(1)) as u64;
            self.on_tick(tick)?;
        }
    }

    /// Apply a key command. Returns `false` when the session should end.
    pub fn handle_command(&mut self, cmd: Command) -> io::Result<bool> {
        match cmd {
            Command::Quit => return Ok(false),
            Command::ToggleTextRecording => self.toggle_recording(RecordFormat::Text)?,
            Command::ToggleRawRecording => self.toggle_recording(RecordFormat::Raw)?,
            Command::ToggleChannel(id) => self.toggle_channel(id)?,
        }
        Ok(true)
    }

    fn toggle_recording(&mut self, format: RecordFormat) -> io::Result<()> {
        let active = self.recording.or(self.paused);
        self.paused = None;
        if active.is_some() {
            // stopping, or switching format: either way the current files end here
            self.stop_all_recording()?;
        }
        if active == Some(format) {
            self.recording = None;
            info!("recording stopped");
            self.terminal.message("Recording stopped.")
        } else {
            self.recording = Some(format);
            info!("recording started ({format:?})");
            self.terminal.message(&format!("Recording {format:?} started."))
        }
    }

    fn toggle_channel(&mut self, id: ChannelId) -> io::Result<()> {
        let idx = id.index();
        self.enabled[idx] = !self.enabled[idx];
        if !self.enabled[idx] {
            if let Err(e) = self.channels[idx].stop_recording() {
                self.report(&e.to_string())?;
            }
        }
        self.channels[idx].reset();
        let state = if self.enabled[idx] { "enabled" } else { "disabled" };
        info!("channel {} {state}", id.number());
        self.terminal
            .message(&format!("Channel {} {state}.", id.number()))
    }

    /// Handle one "data ready" poll. Returns whether any channel had data.
    pub fn poll_once(&mut self, ts: NaiveDateTime) -> io::Result<bool> {
        let mut fresh = [false; 2];
        let mut changed = [false; 2];
        for id in ChannelId::ALL {
            let idx = id.index();
            if !self.enabled[idx] {
                continue;
            }
            match self.channels[idx].fetch_frame(&mut self.source) {
                Ok(has_data) => fresh[idx] = has_data,
                Err(e) => self.report(&format!("#{}: {e}", id.number()))?,
            }
            if fresh[idx] && self.channels[idx].config_changed() {
                changed[idx] = true;
                self.announce_config(id)?;
            }
        }
        if !fresh.iter().any(|f| *f) {
            return Ok(false);
        }
        self.frames_this_tick += 1;
        if let Some(format) = self.paused.take() {
            self.recording = Some(format);
            info!("data is back, recording resumed ({format:?})");
            self.terminal.message("Recording resumed.")?;
        }

        let row = self.render(&fresh);
        self.terminal.draw_row(&row)?;

        if let Some(format) = self.recording {
            for id in ChannelId::ALL {
                let idx = id.index();
                if fresh[idx] {
                    self.record(id, ts, format, changed[idx])?;
                }
            }
        }
        Ok(true)
    }

    fn record(
        &mut self,
        id: ChannelId,
        ts: NaiveDateTime,
        format: RecordFormat,
        changed: bool,
    ) -> io::Result<()> {
        let channel = &mut self.channels[id.index()];
        let needs_target = changed || channel.target().map(|t| t.format) != Some(format);
        let mut result = Ok(());
        if needs_target {
            result = channel.update_target(ts, &self.output_dir, format);
        }
        if result.is_ok() {
            result = channel.record_frame(ts);
        }
        match result {
            Ok(()) => Ok(()),
            Err(e) => self.report(&e.to_string()),
        }
    }

    fn render(&self, fresh: &[bool; 2]) -> Vec<Option<Glyph>> {
        let total = self.terminal.width();
        let active = self.enabled.iter().filter(|e| **e).count();
        let width = if active > 1 { total / active } else { total };
        let mut row = Vec::with_capacity(total);
        for id in ChannelId::ALL {
            let idx = id.index();
            if !self.enabled[idx] {
                continue;
            }
            if fresh[idx] {
                row.extend(self.channels[idx].render_row(width).into_iter().map(Some));
            } else {
                row.extend(std::iter::repeat(None).take(width));
            }
        }
        row
    }

    /// Called with the index of the current idle tick; a tick without any
    /// accepted frame pauses recording and resets both channels.
    pub fn on_tick(&mut self, tick: u64) -> io::Result<()> {
        if tick == self.current_tick {
            return Ok(());
        }
        self.current_tick = tick;
        let idle = self.frames_this_tick == 0;
        self.frames_this_tick = 0;
        if !idle {
            return Ok(());
        }
        self.terminal.message(IDLE_HINT)?;
        if let Some(format) = self.recording.take() {
            warn!("no frames for a whole tick, pausing {format:?} recording");
            self.paused = Some(format);
            self.stop_all_recording()?;
            for channel in &mut self.channels {
                channel.reset();
            }
            self.terminal.message("Recording paused: no data.")?;
        }
        Ok(())
    }

    fn stop_all_recording(&mut self) -> io::Result<()> {
        for idx in 0..self.channels.len() {
            if let Err(e) = self.channels[idx].stop_recording() {
                self.report(&e.to_string())?;
            }
        }
        Ok(())
    }

    /// Close every open writer. Safe to call more than once.
    pub fn shutdown(&mut self) {
        for channel in &mut self.channels {
            if let Err(e) = channel.close_file() {
                error!("{e}");
            }
        }
    }

    fn announce_config(&mut self, id: ChannelId) -> io::Result<()> {
        let sig = self.channels[id.index()].signature();
        info!(
            "channel {}: freq {} Hz, volt {} mV, ground {}",
            id.number(),
            sig.freq_hz,
            sig.volt_mv,
            sig.ground_adc
        );
        self.terminal.message(&format!(
            "#{}: Max Freq. = {} Hz, Max Volt = {} mV, GND = {}",
            id.number(),
            sig.freq_hz,
            sig.volt_mv,
            sig.ground_adc
        ))
    }

    fn report(&mut self, text: &str) -> io::Result<()> {
        error!("{text}");
        self.terminal.message(text)
    }
}

#[cfg(test)]
impl<S: FrameSource, T: StripTerminal> Session<S, T> {
    pub fn channel(&self, id: ChannelId) -> &Channel {
        &self.channels[id.index()]
    }

    pub fn is_enabled(&self, id: ChannelId) -> bool {
        self.enabled[id.index()]
    }

    pub fn recording(&self) -> Option<RecordFormat> {
        self.recording
    }

    pub fn paused(&self) -> Option<RecordFormat> {
        self.paused
    }

    pub fn terminal(&self) -> &T {
        &self.terminal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{ManualSource, SampleFrame};
    use crate::heatmap::byte_to_glyph;
    use crate::types::{ConfigSignature, SAMPLES_PER_FRAME};
    use chrono::NaiveDate;
    use std::collections::VecDeque;
    use std::fs;
    use std::path::Path;

    const SIG: ConfigSignature = ConfigSignature {
        freq_hz: 1000,
        volt_mv: 500,
        ground_adc: 0,
    };

    #[derive(Default)]
    struct MemoryTerminal {
        width: usize,
        rows: Vec<Vec<Option<Glyph>>>,
        messages: Vec<String>,
        keys: VecDeque<Option<Command>>,
    }

    impl StripTerminal for MemoryTerminal {
        fn width(&self) -> usize {
            self.width
        }
        fn draw_row(&mut self, cells: &[Option<Glyph>]) -> io::Result<()> {
            self.rows.push(cells.to_vec());
            Ok(())
        }
        fn message(&mut self, text: &str) -> io::Result<()> {
            self.messages.push(text.to_string());
            Ok(())
        }
        fn poll_command(&mut self) -> io::Result<Option<Command>> {
            Ok(self.keys.pop_front().flatten())
        }
    }

    fn frames(value: u8) -> [SampleFrame; 2] {
        let f = SampleFrame::with_samples(SIG, &[value; SAMPLES_PER_FRAME]);
        [f.clone(), f]
    }

    fn ts(sec: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(12, 0, sec)
            .unwrap()
    }

    fn session(
        dir: &Path,
        batches: Vec<[SampleFrame; 2]>,
    ) -> Session<ManualSource, MemoryTerminal> {
        let config = Config {
            output_dir: dir.to_path_buf(),
            ..Config::default()
        };
        let terminal = MemoryTerminal {
            width: 40,
            ..MemoryTerminal::default()
        };
        Session::new(ManualSource::new(batches), terminal, &config)
    }

    fn step(s: &mut Session<ManualSource, MemoryTerminal>, sec: u32) -> bool {
        assert!(s.source.is_data_ready().unwrap());
        s.poll_once(ts(sec)).unwrap()
    }

    fn files_in(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn both_channels_share_the_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path(), vec![frames(10)]);
        assert!(step(&mut s, 0));
        let rows = &s.terminal().rows;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 40);
        assert!(rows[0].iter().all(|c| *c == Some(byte_to_glyph(10))));
        let msgs = &s.terminal().messages;
        assert!(msgs.contains(&"#1: Max Freq. = 1000 Hz, Max Volt = 500 mV, GND = 0".to_string()));
        assert!(msgs.iter().any(|m| m.starts_with("#2: Max Freq.")));
        assert!(files_in(dir.path()).is_empty());
    }

    #[test]
    fn empty_poll_draws_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path(), vec![frames(255)]);
        assert!(!step(&mut s, 0));
        assert!(s.terminal().rows.is_empty());
    }

    #[test]
    fn raw_recording_writes_one_file_per_channel() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path(), vec![frames(10), frames(11)]);
        s.handle_command(Command::ToggleRawRecording).unwrap();
        step(&mut s, 0);
        step(&mut s, 1);
        s.shutdown();
        let files = files_in(dir.path());
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "20261018_120000_#1_F=1kHz_V=500mV.raw".to_string(),
                "20261018_120000_#2_F=1kHz_V=500mV.raw".to_string(),
            ]
        );
        for f in files {
            assert_eq!(fs::metadata(f).unwrap().len(), 2 * (8 + SAMPLES_PER_FRAME as u64));
        }
    }

    #[test]
    fn switching_format_starts_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path(), vec![frames(10), frames(11)]);
        s.handle_command(Command::ToggleRawRecording).unwrap();
        step(&mut s, 0);
        assert_eq!(s.channel(ChannelId::Ch1).raw_records(), 1);
        s.handle_command(Command::ToggleTextRecording).unwrap();
        assert_eq!(s.recording(), Some(RecordFormat::Text));
        assert_eq!(s.channel(ChannelId::Ch1).raw_records(), 0);
        step(&mut s, 1);
        let target = s.channel(ChannelId::Ch1).target().unwrap();
        assert_eq!(target.format, RecordFormat::Text);
        assert!(target.path.to_string_lossy().ends_with("120001_#1_F=1kHz_V=500mV.tsv.txt"));

        s.handle_command(Command::ToggleTextRecording).unwrap();
        assert_eq!(s.recording(), None);
        assert!(s.channel(ChannelId::Ch1).target().is_none());
    }

    #[test]
    fn disabled_channel_gives_up_its_half() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path(), vec![frames(10), frames(20)]);
        s.handle_command(Command::ToggleRawRecording).unwrap();
        step(&mut s, 0);
        assert!(s.channel(ChannelId::Ch2).target().is_some());
        s.handle_command(Command::ToggleChannel(ChannelId::Ch2)).unwrap();
        assert!(!s.is_enabled(ChannelId::Ch2));
        assert!(s.channel(ChannelId::Ch2).target().is_none());
        step(&mut s, 1);
        let last = s.terminal().rows.last().unwrap();
        assert_eq!(last.len(), 40);
        assert!(last.iter().all(|c| *c == Some(byte_to_glyph(20))));
    }

    #[test]
    fn idle_tick_pauses_and_resumes_recording() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path(), vec![frames(10), frames(12)]);
        s.handle_command(Command::ToggleTextRecording).unwrap();
        step(&mut s, 0);
        // frames arrived during tick 0
        s.on_tick(1).unwrap();
        assert_eq!(s.recording(), Some(RecordFormat::Text));
        // nothing during tick 1
        s.on_tick(2).unwrap();
        assert_eq!(s.recording(), None);
        assert_eq!(s.paused(), Some(RecordFormat::Text));
        assert!(s.channel(ChannelId::Ch1).target().is_none());
        assert!(s.terminal().messages.iter().any(|m| m == IDLE_HINT));

        step(&mut s, 40);
        assert_eq!(s.recording(), Some(RecordFormat::Text));
        let target = s.channel(ChannelId::Ch1).target().unwrap();
        assert!(target.path.to_string_lossy().contains("20261018_120040_"));
        assert_eq!(files_in(dir.path()).len(), 4);
    }

    #[test]
    fn run_closes_files_on_quit() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path(), vec![frames(10), frames(11)]);
        s.terminal.keys = VecDeque::from(vec![
            Some(Command::ToggleRawRecording),
            None,
            None,
            Some(Command::Quit),
        ]);
        s.run().unwrap();
        assert_eq!(s.source.remaining(), 0);
        let files = files_in(dir.path());
        assert_eq!(files.len(), 2);
        for f in files {
            assert_eq!(fs::metadata(f).unwrap().len(), 2 * (8 + SAMPLES_PER_FRAME as u64));
        }
        assert_eq!(s.terminal().messages.last().unwrap(), "STOP saving data.");
    }

    #[test]
    fn unwritable_output_dir_is_reported_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, b"file").unwrap();
        let mut s = session(&blocker, vec![frames(10), frames(11)]);
        s.handle_command(Command::ToggleRawRecording).unwrap();

        assert!(step(&mut s, 0));
        assert!(step(&mut s, 1));

        let shown = blocker.display().to_string();
        let msgs = &s.terminal().messages;
        for ch in ["channel 1:", "channel 2:"] {
            let failures = msgs
                .iter()
                .filter(|m| m.starts_with(ch) && m.contains(&shown))
                .count();
            assert_eq!(failures, 2, "{ch} in {msgs:?}");
        }
        assert_eq!(s.terminal().rows.len(), 2);
        assert_eq!(s.recording(), Some(RecordFormat::Raw));
        assert_eq!(s.channel(ChannelId::Ch1).raw_records(), 0);
        assert_eq!(fs::read(&blocker).unwrap(), b"file");
    }
}
