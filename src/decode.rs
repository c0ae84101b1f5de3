//! Per-record sample decoding.

use crate::error::{NedfError, Result};
use crate::layout::BYTES_PER_VALUE;

/// nV per ADC count: 2.4 V reference, gain 6, 24-bit full scale
pub const NANOVOLTS_PER_COUNT: f64 = 2_400_000.0 / (6.0 * 8_388_607.0);

/// Largest positive raw value of a signed 24-bit sample
pub const RAW_MAX: i32 = 8_388_607;

/// Raw value passed through without scaling
pub const RAW_SENTINEL: i32 = -1;

/// Reads one big-endian signed 24-bit value
///
/// Sign extension subtracts 2^24 when the top bit is set. Some old reader builds
/// subtracted 2^23 instead, which produced wrong values for every negative sample.
pub fn read_i24_be(bytes: [u8; 3]) -> i32 {
    let mut raw = ((bytes[0] as i32) << 16) | ((bytes[1] as i32) << 8) | bytes[2] as i32;
    if bytes[0] & 0x80 != 0 {
        raw -= 1 << 24;
    }
    raw
}

/// Converts a raw count to nanovolts
///
/// The raw value -1 is returned as `-1.0` without scaling.
pub fn decode_sample_value(raw: i32) -> f32 {
    if raw == RAW_SENTINEL {
        return raw as f32;
    }
    (raw as f64 * NANOVOLTS_PER_COUNT) as f32
}

/// Checks a channel selection against the header's channel count
///
/// An empty selection means all channels in header order.
pub fn resolve_channels(channels: &[usize], total_channels: usize) -> Result<Vec<usize>> {
    if channels.is_empty() {
        return Ok((0..total_channels).collect());
    }

    if let Some(&index) = channels.iter().find(|&&i| i >= total_channels) {
        return Err(NedfError::InvalidChannelIndex { index, channels: total_channels });
    }

    Ok(channels.to_vec())
}

/// Decodes the selected channels of one record and appends them to `out`
///
/// `channels` must already be validated with [`resolve_channels`].
pub fn decode_record(record: &[u8], channels: &[usize], out: &mut Vec<f32>) -> Result<()> {
    for &channel in channels {
        let offset = channel * BYTES_PER_VALUE;
        let bytes = record
            .get(offset..offset + BYTES_PER_VALUE)
            .ok_or_else(|| NedfError::InvalidFormat(format!(
                "record of {} bytes has no room for channel {}",
                record.len(),
                channel
            )))?;
        let raw = read_i24_be([bytes[0], bytes[1], bytes[2]]);
        out.push(decode_sample_value(raw));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_extension() {
        assert_eq!(read_i24_be([0x7F, 0xFF, 0xFF]), RAW_MAX);
        assert_eq!(read_i24_be([0x80, 0x00, 0x00]), -8_388_608);
        assert_eq!(read_i24_be([0xFF, 0xFF, 0xFF]), -1);
        assert_eq!(read_i24_be([0xFF, 0xFF, 0xFE]), -2);
        assert_eq!(read_i24_be([0x00, 0x01, 0x00]), 256);
    }

    #[test]
    fn test_scaling() {
        let max = decode_sample_value(RAW_MAX);
        assert!((max as f64 - 400_000.0).abs() < 0.1);

        let min = decode_sample_value(-8_388_608);
        assert!((min as f64 + 400_000.0).abs() < 0.1);

        assert_eq!(decode_sample_value(0), 0.0);
    }

    #[test]
    fn test_sentinel_is_not_scaled() {
        assert_eq!(decode_sample_value(RAW_SENTINEL), -1.0);
        assert_ne!(decode_sample_value(-2), -2.0);
    }

    #[test]
    fn test_magnitude_bound() {
        let bound = (RAW_MAX as f64 * NANOVOLTS_PER_COUNT) as f32;
        for raw in [RAW_MAX, -RAW_MAX, 1, -2, 4_000_000, -4_000_000] {
            assert!(decode_sample_value(raw).abs() <= bound);
        }
    }

    #[test]
    fn test_decode_record_selection_order() {
        // 3 channels + marker
        let record = [0x00, 0x00, 0x01, 0xFF, 0xFF, 0xFF, 0x7F, 0xFF, 0xFF, 0, 0, 0, 0];
        let mut out = Vec::new();
        decode_record(&record, &[2, 1, 0], &mut out).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[1], -1.0);
        assert_eq!(out[2], decode_sample_value(1));
        assert_eq!(out[0], decode_sample_value(RAW_MAX));
    }

    #[test]
    fn test_resolve_channels() {
        assert_eq!(resolve_channels(&[], 3).unwrap(), vec![0, 1, 2]);
        assert_eq!(resolve_channels(&[2, 0], 3).unwrap(), vec![2, 0]);
        assert!(matches!(
            resolve_channels(&[0, 3], 3),
            Err(NedfError::InvalidChannelIndex { index: 3, channels: 3 })
        ));
    }
}
