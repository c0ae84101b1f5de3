use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NedfError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Missing header field {0}")]
    MissingField(String),

    #[error("Unexpected value for {field}: {value}")]
    UnsupportedValue { field: String, value: String },

    #[error("{0} packets were lost while recording, aborting")]
    PacketsLost(u64),

    #[error("Can't handle intermittent stimulation data: {records} records, expected at least {expected}")]
    InvalidStimulation { records: u64, expected: u64 },

    #[error("Sample range {start}+{count} exceeds the {available} records in file")]
    SampleRange { start: u64, count: u64, available: u64 },

    #[error("Channel index {index} out of range (file has {channels} channels)")]
    InvalidChannelIndex { index: usize, channels: usize },
}

impl From<quick_xml::Error> for NedfError {
    fn from(e: quick_xml::Error) -> Self {
        NedfError::InvalidFormat(format!("XML header could not be parsed: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, NedfError>;
