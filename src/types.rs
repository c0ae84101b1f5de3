use chrono::{DateTime, Utc};

/// EEG acquisition settings (`EEGSettings` subtree)
#[derive(Debug, Clone, PartialEq)]
pub struct EegSettings {
    pub total_channels: u32,
    pub sampling_rate_hz: u32,
    pub record_count: u64,
    pub lost_packet_count: u64,
    pub units: String,
    /// 通道名称，按文件中的顺序
    pub channel_names: Vec<String>,
}

/// Stimulation settings, only present when the recording had a STIM subtree
#[derive(Debug, Clone, PartialEq)]
pub struct StimSettings {
    pub channel_count: u32,
    pub record_count: u64,
    pub sampling_rate_hz: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccelerometerSettings {
    pub channel_count: u32,
    pub sampling_rate_hz: u32,
}

/// Recording device details (`StepDetails` subtree)
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub software_version: String,
    pub device_class: String,
    /// 第一个EEG样本的时间戳（Unix毫秒）
    pub start_timestamp: u64,
}

/// Parsed NEDF header. Immutable once [`parse_header`](crate::parse_header) returns.
#[derive(Debug, Clone, PartialEq)]
pub struct NedfHeader {
    pub version: f64,
    pub additional_channel_status: String,
    pub eeg: EegSettings,
    pub stim: Option<StimSettings>,
    pub accelerometer: AccelerometerSettings,
    pub device: DeviceInfo,
}

impl NedfHeader {
    /// Number of EEG records (samples) in the file
    pub fn record_count(&self) -> u64 {
        self.eeg.record_count
    }

    pub fn channel_count(&self) -> usize {
        self.eeg.total_channels as usize
    }

    pub fn channel_names(&self) -> &[String] {
        &self.eeg.channel_names
    }

    /// Time between two EEG samples in microseconds
    pub fn sampling_interval_us(&self) -> f64 {
        1_000_000.0 / self.eeg.sampling_rate_hz as f64
    }

    /// Recording length in seconds, 0 if the sampling rate is missing
    pub fn duration_seconds(&self) -> f64 {
        if self.eeg.sampling_rate_hz == 0 {
            return 0.0;
        }
        self.eeg.record_count as f64 / self.eeg.sampling_rate_hz as f64
    }

    /// Wall-clock time of the first EEG sample
    ///
    /// Returns `None` when the timestamp does not fit chrono's range.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        let millis = i64::try_from(self.device.start_timestamp).ok()?;
        DateTime::<Utc>::from_timestamp_millis(millis)
    }

    pub fn has_stim(&self) -> bool {
        self.stim.is_some()
    }
}

/// An event code found in the trailing marker field of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    /// 0-based EEG sample index
    pub sample: u64,
    /// Event code, never 0
    pub value: u32,
}
