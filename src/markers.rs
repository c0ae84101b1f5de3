//! Lazy scan of the per-record marker field.

use std::fs::File;
use std::io::BufReader;

use byteorder::{BigEndian, ReadBytesExt};
use tracing::debug;

use crate::error::Result;
use crate::header::Advisor;
use crate::layout::{RecordLayout, MARKER_SIZE};
use crate::types::Marker;

/// Longest run of consecutive marked samples before the file is flagged
pub const MAX_MARKER_RUN: u64 = 5;

/// Counters collected while scanning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkerScanStats {
    pub samples_scanned: u64,
    pub markers_seen: u64,
    /// 当前连续标记长度
    pub current_run: u64,
    /// 出现过的最长连续标记长度
    pub max_run: u64,
}

/// Iterator over the non-zero markers of a file
///
/// Created by [`NedfFile::scan_markers`](crate::NedfFile::scan_markers). The scan keeps
/// the file cursor to itself until it is dropped, so it can't be interleaved with sample
/// reads on the same file.
///
/// When the scan reaches its end it checks the longest run of consecutive marked
/// samples; runs longer than [`MAX_MARKER_RUN`] are reported to the file's advisory sink.
/// Some devices write a dense tail of spurious markers, the EEG data stays usable in that
/// case. Dropping the iterator early skips the check.
///
/// # Examples
///
/// ```rust
/// use nedf::NedfFile;
///
/// # let dir = tempfile::tempdir().unwrap();
/// # let path = dir.path().join("markers.nedf");
/// # nedf::doctest_utils::NedfBuilder::new(2, 20).marker(7, 42).write_to(&path)?;
/// let mut file = NedfFile::open(&path)?;
/// for marker in file.scan_markers(None)? {
///     let marker = marker?;
///     println!("{};{}", marker.sample, marker.value);
/// }
/// # Ok::<(), nedf::NedfError>(())
/// ```
pub struct MarkerScan<'a> {
    reader: &'a mut BufReader<File>,
    layout: RecordLayout,
    advisor: Advisor<'a>,
    file_name: String,
    next_sample: u64,
    end: u64,
    stats: MarkerScanStats,
    done: bool,
}

impl<'a> MarkerScan<'a> {
    /// `reader` must be positioned right before the first accelerometer block.
    pub(crate) fn new(
        reader: &'a mut BufReader<File>,
        layout: RecordLayout,
        advisor: Advisor<'a>,
        file_name: String,
        end: u64,
    ) -> Self {
        MarkerScan {
            reader,
            layout,
            advisor,
            file_name,
            next_sample: 0,
            end,
            stats: MarkerScanStats::default(),
            done: false,
        }
    }

    pub fn stats(&self) -> MarkerScanStats {
        self.stats
    }

    /// More than one marker per ten scanned samples, the threshold the analyzer import
    /// used to label a recording as corrupt
    ///
    /// Only the samples visited so far count, so a scan limited to the start of a long
    /// recording is judged on that prefix alone.
    pub fn looks_corrupt(&self) -> bool {
        self.stats.markers_seen > self.stats.samples_scanned / 10
    }

    fn read_marker_field(&mut self) -> Result<u32> {
        if RecordLayout::starts_group(self.next_sample) {
            self.reader.seek_relative(self.layout.accel_block_size as i64)?;
        }
        self.reader
            .seek_relative(self.layout.record_size as i64 - MARKER_SIZE as i64)?;
        Ok(self.reader.read_u32::<BigEndian>()?)
    }

    fn finish(&mut self) {
        if self.done {
            return;
        }
        self.done = true;

        debug!(
            "Marker scan of {} finished: {} samples, {} markers, longest run {}",
            self.file_name, self.stats.samples_scanned, self.stats.markers_seen, self.stats.max_run
        );

        if self.stats.max_run > MAX_MARKER_RUN {
            self.advisor.advise(&format!(
                "Unexpected run of {} consecutive markers, this could indicate a broken file ({}).",
                self.stats.max_run, self.file_name
            ));
        }
    }
}

impl Iterator for MarkerScan<'_> {
    type Item = Result<Marker>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if self.next_sample >= self.end {
                self.finish();
                return None;
            }

            let value = match self.read_marker_field() {
                Ok(value) => value,
                Err(e) => {
                    // I/O 错误后不再继续扫描
                    self.done = true;
                    return Some(Err(e));
                }
            };

            let sample = self.next_sample;
            self.next_sample += 1;
            self.stats.samples_scanned += 1;

            if value == 0 {
                self.stats.current_run = 0;
                continue;
            }

            self.stats.markers_seen += 1;
            self.stats.current_run += 1;
            self.stats.max_run = self.stats.max_run.max(self.stats.current_run);

            // 最后一个样本带标记时，在返回前完成检查
            if self.next_sample >= self.end {
                self.finish();
            }
            return Some(Ok(Marker { sample, value }));
        }
        None
    }
}
