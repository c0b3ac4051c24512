use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::warn;
use thiserror::Error;

use crate::serial_date;
use crate::types::{ChannelId, ConfigSignature, RecordFormat, SAMPLES_PER_FRAME};

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("channel {channel}: cannot open {}: {source}", path.display())]
    Open {
        channel: u8,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("channel {channel}: cannot write {}: {source}", path.display())]
    Write {
        channel: u8,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("channel {channel}: cannot create directory {}: {source}", path.display())]
    CreateDir {
        channel: u8,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where a channel is currently logging to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordingTarget {
    pub path: PathBuf,
    pub format: RecordFormat,
    pub directory: PathBuf,
    /// Text targets only: header block already emitted into `path`.
    pub header_written: bool,
}

impl RecordingTarget {
    pub fn new(
        ts: NaiveDateTime,
        directory: &Path,
        channel: ChannelId,
        signature: &ConfigSignature,
        format: RecordFormat,
    ) -> Self {
        let label = config_label(channel, signature);
        Self {
            path: target_path(directory, ts, &label, format),
            format,
            directory: directory.to_path_buf(),
            header_written: false,
        }
    }
}

/// Pick the unit whose numeric text is shortest; earlier units win ties.
pub fn shortest_unit(value: i32, units: [&str; 3]) -> String {
    let scaled = [value as f64, value as f64 / 1e3, value as f64 / 1e6];
    let mut best = format!("{}", scaled[0]);
    let mut best_unit = units[0];
    for (v, unit) in scaled.iter().zip(units).skip(1) {
        let text = format!("{}", v);
        if text.len() < best.len() {
            best = text;
            best_unit = unit;
        }
    }
    best.push_str(best_unit);
    best
}

/// `#<ch>_F=<freq>_V=<volt>[_nGND=<g>]`
pub fn config_label(channel: ChannelId, sig: &ConfigSignature) -> String {
    let mut label = format!(
        "#{}_F={}_V={}",
        channel.number(),
        shortest_unit(sig.freq_hz, ["Hz", "kHz", "MHz"]),
        shortest_unit(sig.volt_mv, ["mV", "V", "kV"]),
    );
    if sig.ground_adc > 0 {
        let _ = write!(label, "_nGND={}", sig.ground_adc);
    }
    label
}

pub fn target_path(dir: &Path, ts: NaiveDateTime, label: &str, format: RecordFormat) -> PathBuf {
    dir.join(format!(
        "{}_{}.{}",
        ts.format("%Y%m%d_%H%M%S"),
        label,
        format.extension()
    ))
}

/// Run `op`; if it fails because the directory is missing, create it and try exactly once more.
fn retry_after_mkdir<T>(
    channel: ChannelId,
    path: &Path,
    wrap: impl Fn(io::Error) -> RecordError,
    mut op: impl FnMut() -> io::Result<T>,
) -> Result<T, RecordError> {
    match op() {
        Ok(v) => Ok(v),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(dir).map_err(|source| RecordError::CreateDir {
                    channel: channel.number(),
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
            op().map_err(wrap)
        }
        Err(e) => Err(wrap(e)),
    }
}

/// Open binary log: serial-date stamped sample records, appended back to back.
pub struct RawLog<W: Write = BufWriter<File>> {
    channel: ChannelId,
    path: PathBuf,
    writer: W,
    // stamp + samples, assembled before a single write
    record: Vec<u8>,
    records: u32,
}

impl RawLog {
    pub fn open(channel: ChannelId, path: &Path) -> Result<Self, RecordError> {
        let file = retry_after_mkdir(
            channel,
            path,
            |source| RecordError::Open {
                channel: channel.number(),
                path: path.to_path_buf(),
                source,
            },
            || OpenOptions::new().create(true).append(true).open(path),
        )?;
        Ok(Self::with_writer(channel, path, BufWriter::new(file)))
    }
}

impl<W: Write> RawLog<W> {
    pub fn with_writer(channel: ChannelId, path: &Path, writer: W) -> Self {
        Self {
            channel,
            path: path.to_path_buf(),
            writer,
            record: Vec::with_capacity(8 + SAMPLES_PER_FRAME),
            records: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written since this file was opened.
    pub fn records(&self) -> u32 {
        self.records
    }

    /// Append one record. A failed write leaves no part of it behind in the buffer.
    pub fn append(&mut self, ts: NaiveDateTime, samples: &[u8]) -> Result<(), RecordError> {
        self.record.clear();
        self.record.extend_from_slice(&serial_date::to_bytes(ts));
        self.record.extend_from_slice(samples);
        self.writer
            .write_all(&self.record)
            .map_err(|source| self.write_error(source))?;
        self.records += 1;
        Ok(())
    }

    pub fn close(mut self) -> Result<(), RecordError> {
        self.writer.flush().map_err(|source| self.write_error(source))
    }

    fn write_error(&self, source: io::Error) -> RecordError {
        RecordError::Write {
            channel: self.channel.number(),
            path: self.path.clone(),
            source,
        }
    }
}

/// Four metadata lines plus a column label line for the frequency bins.
pub fn write_text_header(out: &mut String, channel: ChannelId, sig: &ConfigSignature) {
    let _ = writeln!(out, "Channel\t{}", channel.number());
    let _ = writeln!(out, "MaxFreq_Hz\t{}", sig.freq_hz);
    let _ = writeln!(out, "MaxVolt_mV\t{}", sig.volt_mv);
    let _ = writeln!(out, "GndLevel_ADC\t{}", sig.ground_adc);
    out.push_str("Date\tTime");
    let bin_width = sig.freq_hz as f64 / SAMPLES_PER_FRAME as f64;
    for i in 0..SAMPLES_PER_FRAME {
        let _ = write!(out, "\t{}", bin_width * (i + 1) as f64);
    }
    out.push('\n');
}

pub fn write_text_row(out: &mut String, ts: NaiveDateTime, samples: &[u8]) {
    let _ = write!(out, "{}\t{}", ts.format("%Y-%m-%d"), ts.format("%H:%M:%S%.3f"));
    for s in samples {
        let _ = write!(out, "\t{}", s);
    }
    out.push('\n');
}

/// Append `text` to `path`, creating the directory once if it is missing.
/// The file never keeps a partial row: a failed write is cut back off.
pub fn append_text(channel: ChannelId, path: &Path, text: &str) -> Result<(), RecordError> {
    retry_after_mkdir(
        channel,
        path,
        |source| RecordError::Write {
            channel: channel.number(),
            path: path.to_path_buf(),
            source,
        },
        || {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            let start = file.metadata()?.len();
            write_whole(&mut file, text.as_bytes(), |f| f.set_len(start))
        },
    )
}

/// Write all of `bytes` or, on failure, run `truncate` to drop what did get through.
fn write_whole<W: Write>(
    out: &mut W,
    bytes: &[u8],
    truncate: impl FnOnce(&mut W) -> io::Result<()>,
) -> io::Result<()> {
    let Err(e) = out.write_all(bytes) else {
        return Ok(());
    };
    if let Err(undo) = truncate(out) {
        warn!("could not drop partial row: {undo}");
    }
    Err(e)
}
