//! Byte layout of the NEDF data region.
//!
//! After the fixed 10 240 byte header the file is a sequence of groups. Each group is
//! an accelerometer block followed by [`RECORDS_PER_GROUP`] records, and each record
//! holds one EEG sample for every channel plus a trailing 4 byte marker field.

use crate::types::NedfHeader;

/// 固定头部长度
pub const HEADER_SIZE: u64 = 10_240;

/// Records between two accelerometer blocks
pub const RECORDS_PER_GROUP: u64 = 5;

/// Size of the big-endian marker field at the end of each record
pub const MARKER_SIZE: usize = 4;

/// Bytes per channel value (signed 24-bit big-endian)
pub const BYTES_PER_VALUE: usize = 3;

/// Record and group sizes derived from a header
///
/// The sizes are fixed for the life of a file, so the struct is computed once and copied
/// around freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    /// 每条记录的字节数
    pub record_size: u64,
    /// 每组记录前的加速度计数据字节数
    pub accel_block_size: u64,
    pub group_size: u64,
}

impl RecordLayout {
    pub fn from_header(header: &NedfHeader) -> Self {
        // NIC writes two stim slots per EEG record, each as wide as the EEG block.
        // This is not nchan + nstim, but it is what the files contain.
        let stim_samples_per_eeg_record: u64 = if header.stim.is_some() { 2 } else { 0 };
        let record_size = (1 + stim_samples_per_eeg_record)
            * header.eeg.total_channels as u64
            * BYTES_PER_VALUE as u64
            + MARKER_SIZE as u64;
        let accel_block_size = header.accelerometer.channel_count as u64 * 2;

        RecordLayout {
            record_size,
            accel_block_size,
            group_size: record_size * RECORDS_PER_GROUP + accel_block_size,
        }
    }

    /// Absolute file offset of the record holding `sample`
    ///
    /// Returns `None` when the offset doesn't fit in a `u64`, which only happens for
    /// sample indices no real file can reach.
    pub fn seek_offset(&self, sample: u64) -> Option<u64> {
        let group_start = (sample / RECORDS_PER_GROUP).checked_mul(self.group_size)?;
        let in_group = (sample % RECORDS_PER_GROUP).checked_mul(self.record_size)?;
        (HEADER_SIZE + self.accel_block_size)
            .checked_add(group_start)?
            .checked_add(in_group)
    }

    /// Whether an accelerometer block sits right before `sample`
    pub fn starts_group(sample: u64) -> bool {
        sample % RECORDS_PER_GROUP == 0
    }
}
