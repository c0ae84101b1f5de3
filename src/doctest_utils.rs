// Internal utilities for documentation tests and integration tests
// Builds synthetic NEDF files with a known byte layout

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::layout::{HEADER_SIZE, RECORDS_PER_GROUP};
use crate::{NedfError, Result};

/// Filler written into accelerometer blocks
pub const ACCEL_FILL: u8 = 0xAA;

/// Filler written into the stimulation part of a record
pub const STIM_FILL: u8 = 0x55;

/// Raw 24-bit value the builder writes for `(sample, channel)` unless overridden
pub fn default_raw(sample: u64, channel: usize) -> i32 {
    let magnitude = (sample as i32 % 100_000) * 37 + channel as i32 * 1001;
    if (sample + channel as u64) % 2 == 0 {
        magnitude
    } else {
        -magnitude
    }
}

/// Encodes a raw value as big-endian 24-bit two's complement
pub fn encode_i24_be(raw: i32) -> [u8; 3] {
    let bits = (raw as u32) & 0x00FF_FFFF;
    [(bits >> 16) as u8, (bits >> 8) as u8, bits as u8]
}

/// Builder for synthetic NEDF recordings
#[derive(Debug, Clone)]
pub struct NedfBuilder {
    channels: u32,
    records: u64,
    accel_channels: u32,
    root_tag: String,
    version: Option<String>,
    additional_channel_status: String,
    units: String,
    packets_lost: u64,
    accel_rate: u32,
    stim: Option<(u32, u64, u32)>,
    software_version: String,
    device_class: String,
    start_timestamp: u64,
    channel_names: Option<Vec<String>>,
    header_text: Option<String>,
    markers: BTreeMap<u64, u32>,
    raw_values: BTreeMap<(u64, usize), i32>,
}

impl NedfBuilder {
    pub fn new(channels: u32, records: u64) -> Self {
        NedfBuilder {
            channels,
            records,
            accel_channels: 3,
            root_tag: "1NEDF:Enobio".to_string(),
            version: Some("1.4".to_string()),
            additional_channel_status: "OFF".to_string(),
            units: "nV".to_string(),
            packets_lost: 0,
            accel_rate: 100,
            stim: None,
            software_version: "NIC v2.0.10".to_string(),
            device_class: "ENOBIO".to_string(),
            start_timestamp: 1_530_640_122_000,
            channel_names: None,
            header_text: None,
            markers: BTreeMap::new(),
            raw_values: BTreeMap::new(),
        }
    }

    pub fn accel_channels(mut self, n: u32) -> Self {
        self.accel_channels = n;
        self
    }

    pub fn root_tag(mut self, tag: &str) -> Self {
        self.root_tag = tag.to_string();
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// Leaves `NEDFversion` out of the header
    pub fn without_version(mut self) -> Self {
        self.version = None;
        self
    }

    pub fn additional_channel_status(mut self, status: &str) -> Self {
        self.additional_channel_status = status.to_string();
        self
    }

    pub fn units(mut self, units: &str) -> Self {
        self.units = units.to_string();
        self
    }

    pub fn packets_lost(mut self, n: u64) -> Self {
        self.packets_lost = n;
        self
    }

    pub fn accel_rate(mut self, rate: u32) -> Self {
        self.accel_rate = rate;
        self
    }

    /// Adds a STIM subtree with `2 * records` stimulation records at 1000 Hz
    pub fn stim(mut self, channel_count: u32) -> Self {
        self.stim = Some((channel_count, 2 * self.records, 1000));
        self
    }

    pub fn stim_settings(mut self, channel_count: u32, records: u64, rate: u32) -> Self {
        self.stim = Some((channel_count, records, rate));
        self
    }

    pub fn software_version(mut self, version: &str) -> Self {
        self.software_version = version.to_string();
        self
    }

    pub fn device_class(mut self, class: &str) -> Self {
        self.device_class = class.to_string();
        self
    }

    pub fn start_timestamp(mut self, millis: u64) -> Self {
        self.start_timestamp = millis;
        self
    }

    pub fn channel_names(mut self, names: &[&str]) -> Self {
        self.channel_names = Some(names.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Uses `text` verbatim as header content instead of the generated XML
    pub fn header_text(mut self, text: &str) -> Self {
        self.header_text = Some(text.to_string());
        self
    }

    pub fn marker(mut self, sample: u64, value: u32) -> Self {
        self.markers.insert(sample, value);
        self
    }

    pub fn raw_value(mut self, sample: u64, channel: usize, raw: i32) -> Self {
        self.raw_values.insert((sample, channel), raw);
        self
    }

    /// Raw value stored at `(sample, channel)`
    pub fn raw_at(&self, sample: u64, channel: usize) -> i32 {
        self.raw_values
            .get(&(sample, channel))
            .copied()
            .unwrap_or_else(|| default_raw(sample, channel))
    }

    pub fn header_xml(&self) -> String {
        if let Some(text) = &self.header_text {
            return text.clone();
        }

        let names = self.channel_names.clone().unwrap_or_else(|| {
            (1..=self.channels).map(|i| format!("Ch{}", i)).collect()
        });
        let montage: String = names
            .iter()
            .map(|name| format!("<sensor>{}</sensor>", name))
            .collect();

        let mut xml = format!("<{}>\n", self.root_tag);
        if let Some(version) = &self.version {
            xml.push_str(&format!("<NEDFversion>{}</NEDFversion>\n", version));
        }
        xml.push_str(&format!(
            "<AdditionalChannelStatus>{}</AdditionalChannelStatus>\n",
            self.additional_channel_status
        ));
        xml.push_str(&format!(
            "<NumberOfChannelsOfAccelerometer>{}</NumberOfChannelsOfAccelerometer>\n",
            self.accel_channels
        ));
        xml.push_str(&format!(
            "<AccelerometerSamplingRate>{}</AccelerometerSamplingRate>\n",
            self.accel_rate
        ));
        xml.push_str(&format!(
            "<EEGSettings>\n<TotalNumberOfChannels>{}</TotalNumberOfChannels>\n\
             <EEGSamplingRate>500</EEGSamplingRate>\n\
             <NumberOfRecordsOfEEG>{}</NumberOfRecordsOfEEG>\n\
             <NumberOfPacketsLost>{}</NumberOfPacketsLost>\n\
             <EEGUnits>{}</EEGUnits>\n\
             <EEGMontage>{}</EEGMontage>\n</EEGSettings>\n",
            self.channels, self.records, self.packets_lost, self.units, montage
        ));
        if let Some((channel_count, records, rate)) = self.stim {
            xml.push_str(&format!(
                "<STIMSettings>\n<NumberOfStimulationChannels>{}</NumberOfStimulationChannels>\n\
                 <NumberOfRecordsOfStimulation>{}</NumberOfRecordsOfStimulation>\n\
                 <StimulationSamplingRate>{}</StimulationSamplingRate>\n</STIMSettings>\n",
                channel_count, records, rate
            ));
        }
        xml.push_str(&format!(
            "<StepDetails>\n<SoftwareVersion>{}</SoftwareVersion>\n\
             <DeviceClass>{}</DeviceClass>\n\
             <StartDate_firstEEGTimestamp>{}</StartDate_firstEEGTimestamp>\n</StepDetails>\n",
            self.software_version, self.device_class, self.start_timestamp
        ));
        xml.push_str(&format!("</{}>\n", self.root_tag));
        xml
    }

    /// Serializes only the null-padded header block, whatever the record count claims
    pub fn build_header_block(&self) -> Result<Vec<u8>> {
        let xml = self.header_xml();
        if xml.len() > HEADER_SIZE as usize {
            return Err(NedfError::InvalidFormat(format!(
                "header XML of {} bytes does not fit the header block",
                xml.len()
            )));
        }

        let mut bytes = xml.into_bytes();
        bytes.resize(HEADER_SIZE as usize, 0);
        Ok(bytes)
    }

    /// Serializes the whole file
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut bytes = self.build_header_block()?;

        let stim_bytes = if self.stim.is_some() { 2 * self.channels as usize * 3 } else { 0 };
        for sample in 0..self.records {
            if sample % RECORDS_PER_GROUP == 0 {
                bytes.extend(std::iter::repeat(ACCEL_FILL).take(self.accel_channels as usize * 2));
            }
            for channel in 0..self.channels as usize {
                bytes.extend_from_slice(&encode_i24_be(self.raw_at(sample, channel)));
            }
            bytes.extend(std::iter::repeat(STIM_FILL).take(stim_bytes));
            let marker = self.markers.get(&sample).copied().unwrap_or(0);
            bytes.extend_from_slice(&marker.to_be_bytes());
        }

        Ok(bytes)
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.build()?)?;
        Ok(())
    }
}
