// src/types.rs

/// Samples per frame delivered by the instrument.
pub const SAMPLES_PER_FRAME: usize = 4096;
/// Header slots (freq, volt, ground) in front of the samples in the driver buffer.
pub const HEADER_SLOTS: usize = 3;
/// Size of the int buffer the driver fills per channel read.
pub const DRIVER_BUFFER_LEN: usize = 5000;
/// Sample value the instrument uses for "no data".
pub const NO_DATA: u8 = 255;

// The two physical inputs of the scope
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub enum ChannelId {
    Ch1,
    Ch2,
}

impl ChannelId {
    pub const ALL: [ChannelId; 2] = [ChannelId::Ch1, ChannelId::Ch2];

    /// 1-based number used in labels and file names.
    pub fn number(self) -> u8 {
        match self {
            ChannelId::Ch1 => 1,
            ChannelId::Ch2 => 2,
        }
    }

    pub fn index(self) -> usize {
        self.number() as usize - 1
    }
}

// Output file flavour
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum RecordFormat {
    Raw,
    Text,
}

impl RecordFormat {
    pub fn extension(self) -> &'static str {
        match self {
            RecordFormat::Raw => "raw",
            RecordFormat::Text => "tsv.txt",
        }
    }
}

// Keyboard commands understood by the session
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Command {
    Quit,
    ToggleTextRecording,
    ToggleRawRecording,
    ToggleChannel(ChannelId),
}

/// Acquisition setting a frame was captured with.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct ConfigSignature {
    pub freq_hz: i32,
    pub volt_mv: i32,
    pub ground_adc: i32,
}

impl ConfigSignature {
    /// Never produced by the instrument, so the next frame always differs.
    pub const UNSET: ConfigSignature = ConfigSignature {
        freq_hz: i32::MIN,
        volt_mv: i32::MIN,
        ground_adc: i32::MIN,
    };
}

impl Default for ConfigSignature {
    fn default() -> Self {
        Self::UNSET
    }
}
