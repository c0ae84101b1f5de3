//! # NEDF Reader for Rust
//!
//! A pure Rust decoder for NEDF recordings written by Neuroelectrics wireless EEG
//! amplifiers (Enobio). A NEDF file is a 10 240 byte XML header followed by groups of
//! five fixed-size records, each group prefixed by an accelerometer block.
//!
//! The library reads; it never writes NEDF files.
//!
//! ## Quick Start
//!
//! ```rust
//! use nedf::{NedfFile, Result};
//!
//! fn main() -> Result<()> {
//!     # let dir = tempfile::tempdir().unwrap();
//!     # let path = dir.path().join("recording.nedf");
//!     # nedf::doctest_utils::NedfBuilder::new(8, 500).marker(120, 3).write_to(&path)?;
//!     let mut file = NedfFile::open(&path)?;
//!
//!     let header = file.header();
//!     println!("NEDF version: {}", header.version);
//!     println!("Channels: {}", header.channel_count());
//!     println!("Samples: {}", header.record_count());
//!
//!     // One second of all channels (500 Hz)
//!     let values = file.read_samples(0, 500, &[])?;
//!     assert_eq!(values.len(), 8 * 500);
//!
//!     // Event markers
//!     for marker in file.scan_markers(None)? {
//!         let marker = marker?;
//!         println!("sample {} -> {}", marker.sample, marker.value);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Advisories
//!
//! Some conditions don't stop decoding but deserve attention: untested format versions,
//! firmware known to corrupt stimulation channels, unsupported device families and
//! implausibly dense marker runs. They are always logged with `tracing::warn!` and are
//! also passed to the sink given to [`NedfFile::open_with_advisory`].
//!
//! ## Physical values
//!
//! Channel values are signed 24-bit big-endian integers scaled by
//! [`NANOVOLTS_PER_COUNT`]. The raw value -1 is returned as `-1.0` without scaling:
//!
//! ```rust
//! use nedf::decode::{decode_sample_value, read_i24_be};
//!
//! assert_eq!(decode_sample_value(read_i24_be([0xFF, 0xFF, 0xFF])), -1.0);
//! let full_scale = decode_sample_value(read_i24_be([0x7F, 0xFF, 0xFF]));
//! assert!((full_scale - 400_000.0).abs() < 0.1);
//! ```

pub mod error;
pub mod types;
pub mod utils;
pub mod header;
pub mod layout;
pub mod decode;
pub mod markers;
pub mod reader;

#[doc(hidden)]
pub mod doctest_utils; // For doctests and integration tests

// Re-export main types for convenience
pub use error::{NedfError, Result};
pub use types::{AccelerometerSettings, DeviceInfo, EegSettings, Marker, NedfHeader, StimSettings};
pub use header::{parse_header, ParsedHeader};
pub use layout::RecordLayout;
pub use decode::{decode_record, decode_sample_value, NANOVOLTS_PER_COUNT};
pub use markers::{MarkerScan, MarkerScanStats};
pub use reader::{AdvisorySink, NedfFile};

/// Library version
///
/// ```rust
/// let version = nedf::version();
/// assert!(version.contains('.'));
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
