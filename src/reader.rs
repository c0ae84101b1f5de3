use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::decode::{decode_record, resolve_channels};
use crate::error::{NedfError, Result};
use crate::header::{parse_header, Advisor};
use crate::layout::{RecordLayout, HEADER_SIZE};
use crate::markers::MarkerScan;
use crate::types::{Marker, NedfHeader};

/// Receiver for non-fatal findings (untested versions, suspicious marker density, ...)
pub type AdvisorySink = Box<dyn FnMut(&str) + Send>;

/// An open NEDF recording
///
/// `NedfFile` owns the file handle. Every read seeks explicitly, so calls don't depend on
/// each other, but they share one cursor: use one `NedfFile` per thread or wrap it in a
/// mutex.
///
/// # Examples
///
/// ```rust
/// use nedf::NedfFile;
///
/// # let dir = tempfile::tempdir().unwrap();
/// # let path = dir.path().join("recording.nedf");
/// # nedf::doctest_utils::NedfBuilder::new(4, 100).write_to(&path)?;
/// let mut file = NedfFile::open(&path)?;
///
/// let header = file.header();
/// println!("NEDF version: {}", header.version);
/// println!("Channels: {:?}", header.channel_names());
/// println!("Duration: {:.1} seconds", header.duration_seconds());
///
/// // First 10 samples of channels 0 and 2, sample-major
/// let values = file.read_samples(0, 10, &[0, 2])?;
/// assert_eq!(values.len(), 20);
/// # Ok::<(), nedf::NedfError>(())
/// ```
pub struct NedfFile {
    file: BufReader<File>,
    path: PathBuf,
    header: NedfHeader,
    layout: RecordLayout,
    header_xml: String,
    advisory: Option<AdvisorySink>,
}

impl NedfFile {
    /// Opens a NEDF file and validates its header
    ///
    /// Non-fatal findings are only logged through `tracing`. Use
    /// [`open_with_advisory`](Self::open_with_advisory) to receive them.
    ///
    /// # Errors
    ///
    /// * `NedfError::FileNotFound` - file doesn't exist
    /// * `NedfError::Io` - file exists but can't be opened or read
    /// * any header error from [`parse_header`](crate::parse_header)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_inner(path.as_ref(), None)
    }

    /// Opens a NEDF file, reporting non-fatal findings to `sink`
    ///
    /// ```rust
    /// use std::sync::{Arc, Mutex};
    /// use nedf::NedfFile;
    ///
    /// # let dir = tempfile::tempdir().unwrap();
    /// # let path = dir.path().join("old.nedf");
    /// # nedf::doctest_utils::NedfBuilder::new(2, 10).version("1.2").write_to(&path)?;
    /// let messages = Arc::new(Mutex::new(Vec::new()));
    /// let sink = Arc::clone(&messages);
    /// let file = NedfFile::open_with_advisory(&path, move |msg: &str| {
    ///     sink.lock().unwrap().push(msg.to_string());
    /// })?;
    ///
    /// assert_eq!(messages.lock().unwrap().len(), 1);
    /// # drop(file);
    /// # Ok::<(), nedf::NedfError>(())
    /// ```
    pub fn open_with_advisory<P, F>(path: P, sink: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: FnMut(&str) + Send + 'static,
    {
        Self::open_inner(path.as_ref(), Some(Box::new(sink)))
    }

    fn open_inner(path: &Path, mut advisory: Option<AdvisorySink>) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => NedfError::FileNotFound(format!("{}: {}", path.display(), e)),
            _ => NedfError::Io(e),
        })?;
        let mut reader = BufReader::new(file);

        // 头部固定为10240字节，文件较短时按实际长度解析
        let mut block = Vec::with_capacity(HEADER_SIZE as usize);
        reader.by_ref().take(HEADER_SIZE).read_to_end(&mut block)?;

        let sink = advisory.as_mut().map(|s| &mut **s as &mut dyn FnMut(&str));
        let parsed = parse_header(&block, sink)?;
        let layout = RecordLayout::from_header(&parsed.header);

        debug!(
            "Opened {}: record_size={}, accel_block_size={}, group_size={}",
            path.display(),
            layout.record_size,
            layout.accel_block_size,
            layout.group_size
        );

        Ok(NedfFile {
            file: reader,
            path: path.to_path_buf(),
            header: parsed.header,
            layout,
            header_xml: parsed.xml,
            advisory,
        })
    }

    pub fn header(&self) -> &NedfHeader {
        &self.header
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    /// Header XML after root tag repair
    pub fn header_xml(&self) -> &str {
        &self.header_xml
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads `count` samples starting at `start` and converts them to nV
    ///
    /// `channels` selects channel indices in output order; an empty slice reads all
    /// channels in header order. The result is sample-major: all selected channels of
    /// sample `start`, then of `start + 1`, and so on. A raw value of -1 is returned
    /// unscaled as `-1.0`.
    ///
    /// # Errors
    ///
    /// * `NedfError::SampleRange` - `start + count` is past the last record, or `start` lies
    ///   beyond any addressable offset; nothing is read
    /// * `NedfError::InvalidChannelIndex` - a selected channel doesn't exist
    /// * `NedfError::Io` - the file is shorter than the header claims
    pub fn read_samples(&mut self, start: u64, count: u64, channels: &[usize]) -> Result<Vec<f32>> {
        let available = self.header.eeg.record_count;
        let end = start
            .checked_add(count)
            .filter(|&end| end <= available)
            .ok_or(NedfError::SampleRange { start, count, available })?;
        let channels = resolve_channels(channels, self.header.channel_count())?;

        if count == 0 {
            return Ok(Vec::new());
        }

        let offset = self
            .layout
            .seek_offset(start)
            .ok_or(NedfError::SampleRange { start, count, available })?;

        // 头部中的记录数不可信，预分配不超过文件实际能容纳的记录数
        let file_len = self.file.get_ref().metadata()?.len();
        let readable = file_len.saturating_sub(offset) / self.layout.record_size;
        let capacity = usize::try_from(count.min(readable))
            .unwrap_or(usize::MAX)
            .saturating_mul(channels.len());
        let mut values = Vec::with_capacity(capacity);

        self.file.seek(SeekFrom::Start(offset))?;

        let mut record = vec![0u8; self.layout.record_size as usize];
        for sample in start..end {
            // 跨越分组时跳过加速度计数据
            if sample > start && RecordLayout::starts_group(sample) {
                self.file.seek_relative(self.layout.accel_block_size as i64)?;
            }
            self.file.read_exact(&mut record)?;
            decode_record(&record, &channels, &mut values)?;
        }

        Ok(values)
    }

    /// Starts a lazy scan over the marker fields of samples `[0, min(limit, records))`
    ///
    /// `None` scans the whole file.
    pub fn scan_markers(&mut self, limit: Option<u64>) -> Result<MarkerScan<'_>> {
        let record_count = self.header.eeg.record_count;
        let end = limit.map_or(record_count, |limit| limit.min(record_count));

        self.file.seek(SeekFrom::Start(HEADER_SIZE))?;

        let file_name = self.path.display().to_string();
        let sink = self.advisory.as_mut().map(|s| &mut **s as &mut dyn FnMut(&str));
        Ok(MarkerScan::new(
            &mut self.file,
            self.layout,
            Advisor::new(sink),
            file_name,
            end,
        ))
    }

    /// Collects all markers in `[0, min(limit, records))`
    pub fn markers(&mut self, limit: Option<u64>) -> Result<Vec<Marker>> {
        self.scan_markers(limit)?.collect()
    }

    /// Closes the file handle
    pub fn close(self) {
        debug!("Closing {}", self.path.display());
    }
}
