//! NEDF header parsing and validation.
//!
//! The first [`HEADER_SIZE`](crate::layout::HEADER_SIZE) bytes of a file hold a
//! null-padded UTF-8 XML document. Older NIC versions wrote root tag names that are not
//! valid XML names, so the root is renamed before the document goes to the XML parser.

use std::sync::OnceLock;

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{NedfError, Result};
use crate::types::{AccelerometerSettings, DeviceInfo, EegSettings, NedfHeader, StimSettings};
use crate::utils::{parse_decimal_invariant, parse_uint_invariant};

/// Root tag name written in place of whatever the recording software used
pub const SANITIZED_ROOT_TAG: &str = "valid_xml_tag";

/// Range of format versions the decoder has been checked against
pub const TESTED_VERSIONS: (f64, f64) = (1.3, 1.4);

/// Firmware that corrupts stimulation channels
pub const BUGGY_STIM_SOFTWARE: &str = "NIC v2.0.8";

static OPENING_TAG: OnceLock<Regex> = OnceLock::new();

fn opening_tag_regex() -> &'static Regex {
    OPENING_TAG.get_or_init(|| {
        Regex::new(r"^\s*<([^\s>]+)[^>]*>").expect("Invalid opening tag regex pattern")
    })
}

/// Result of [`parse_header`]
#[derive(Debug, Clone)]
pub struct ParsedHeader {
    pub header: NedfHeader,
    /// XML text after root tag repair
    pub xml: String,
}

impl ParsedHeader {
    /// Byte length of the repaired XML
    pub fn xml_len(&self) -> usize {
        self.xml.len()
    }
}

/// Forwards non-fatal findings to the log and to an optional caller sink
pub(crate) struct Advisor<'a> {
    sink: Option<&'a mut dyn FnMut(&str)>,
}

impl<'a> Advisor<'a> {
    pub(crate) fn new(sink: Option<&'a mut dyn FnMut(&str)>) -> Self {
        Advisor { sink }
    }

    pub(crate) fn advise(&mut self, message: &str) {
        warn!("{}", message);
        if let Some(sink) = self.sink.as_deref_mut() {
            sink(message);
        }
    }
}

/// Parses and validates the fixed-size header block
///
/// Hard violations (wrong units, lost packets, unexpected sampling rates, ...) fail with
/// an error. Soft ones are passed to `advisory` and parsing continues.
///
/// # Errors
///
/// * `NedfError::InvalidFormat` - no XML, unrecognized root tag, broken XML, or a record
///   count that can't be paired with stimulation records
/// * `NedfError::MissingField` - a required header field is absent
/// * `NedfError::UnsupportedValue` - a field has a value the decoder can't handle
/// * `NedfError::PacketsLost` - the recording dropped packets
/// * `NedfError::InvalidStimulation` - fewer stimulation records than expected
pub fn parse_header(block: &[u8], advisory: Option<&mut dyn FnMut(&str)>) -> Result<ParsedHeader> {
    let mut advisor = Advisor::new(advisory);

    let text = extract_xml_text(block);
    if !text.starts_with('<') {
        return Err(NedfError::InvalidFormat("missing XML header".to_string()));
    }

    let xml = repair_root_tag(&text)?;
    let root = XmlElement::parse(&xml)?;
    let header = build_header(&root, &mut advisor)?;

    debug!(
        "Parsed NEDF header: version={}, channels={}, records={}, stim={}",
        header.version,
        header.eeg.total_channels,
        header.eeg.record_count,
        header.stim.is_some()
    );

    Ok(ParsedHeader { header, xml })
}

/// 读取到第一个空字节为止
fn extract_xml_text(block: &[u8]) -> String {
    let end = block.iter().position(|&b| b == 0).unwrap_or(block.len());
    String::from_utf8_lossy(&block[..end]).into_owned()
}

/// Renames the outermost tag pair to [`SANITIZED_ROOT_TAG`]
///
/// The closing tag must carry the same name as the opening one and be the last thing in
/// the document apart from whitespace.
pub fn repair_root_tag(xml: &str) -> Result<String> {
    let unrecognized = || NedfError::InvalidFormat("unrecognized header".to_string());

    let opening = opening_tag_regex().captures(xml).ok_or_else(unrecognized)?;
    let name = opening.get(1).ok_or_else(unrecognized)?.as_str();
    let body_start = opening.get(0).ok_or_else(unrecognized)?.end();

    let closing = format!("</{}>", name);
    let trimmed = xml.trim_end();
    if !trimmed.ends_with(&closing) || trimmed.len() < body_start + closing.len() {
        return Err(unrecognized());
    }

    let body = &trimmed[body_start..trimmed.len() - closing.len()];
    if body.is_empty() {
        return Err(unrecognized());
    }

    Ok(format!("<{0}>{1}</{0}>", SANITIZED_ROOT_TAG, body))
}

/// Minimal owned element tree, enough for path lookups into the header
#[derive(Debug, Clone, Default)]
pub(crate) struct XmlElement {
    pub name: String,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn new(name: String) -> Self {
        XmlElement { name, ..Default::default() }
    }

    pub(crate) fn parse(xml: &str) -> Result<XmlElement> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    stack.push(XmlElement::new(name));
                }
                Event::Empty(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    Self::attach(&mut stack, &mut root, XmlElement::new(name))?;
                }
                Event::Text(t) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&t.unescape()?);
                    }
                }
                Event::CData(c) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                    }
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        NedfError::InvalidFormat("unbalanced closing tag in XML header".to_string())
                    })?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(NedfError::InvalidFormat("unclosed element in XML header".to_string()));
        }
        root.ok_or_else(|| NedfError::InvalidFormat("empty XML header".to_string()))
    }

    fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) -> Result<()> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None if root.is_none() => *root = Some(element),
            None => {
                return Err(NedfError::InvalidFormat("multiple root elements in XML header".to_string()))
            }
        }
        Ok(())
    }

    /// Direct child by name; falls back to a case-insensitive match since field
    /// casing drifted between NIC releases
    pub(crate) fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.children.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
    }

    /// Descendant by slash-separated path, e.g. `EEGSettings/EEGUnits`
    pub(crate) fn find(&self, path: &str) -> Option<&XmlElement> {
        path.split('/').try_fold(self, |node, name| node.child(name))
    }

    pub(crate) fn trimmed_text(&self) -> &str {
        self.text.trim()
    }
}

fn required_u64(node: &XmlElement, path: &str) -> Result<u64> {
    let element = node.find(path).ok_or_else(|| NedfError::MissingField(path.to_string()))?;
    parse_uint_invariant(&element.text).ok_or_else(|| {
        NedfError::InvalidFormat(format!(
            "header field {} is not an unsigned integer: '{}'",
            path,
            element.trimmed_text()
        ))
    })
}

fn required_u32(node: &XmlElement, path: &str) -> Result<u32> {
    let value = required_u64(node, path)?;
    u32::try_from(value).map_err(|_| {
        NedfError::InvalidFormat(format!("header field {} out of range: {}", path, value))
    })
}

fn text_or(node: &XmlElement, path: &str, default: &str) -> String {
    node.find(path)
        .map(|e| e.trimmed_text().to_string())
        .unwrap_or_else(|| default.to_string())
}

fn build_header(root: &XmlElement, advisor: &mut Advisor<'_>) -> Result<NedfHeader> {
    // 版本号缺失时按0处理，只给出警告
    let version = match root.find("NEDFversion") {
        Some(element) => parse_decimal_invariant(&element.text).ok_or_else(|| {
            NedfError::InvalidFormat(format!("NEDFversion is not a number: '{}'", element.trimmed_text()))
        })?,
        None => 0.0,
    };
    if version < TESTED_VERSIONS.0 || version > TESTED_VERSIONS.1 {
        advisor.advise(&format!("Untested NEDFversion {}, proceed at your own risk.", version));
    }

    let additional_channel_status = text_or(root, "AdditionalChannelStatus", "OFF");
    if additional_channel_status != "OFF" {
        return Err(NedfError::UnsupportedValue {
            field: "AdditionalChannelStatus".to_string(),
            value: additional_channel_status,
        });
    }

    let eeg = build_eeg_settings(root, advisor)?;
    let stim = build_stim_settings(root, &eeg)?;

    let accelerometer = AccelerometerSettings {
        channel_count: required_u32(root, "NumberOfChannelsOfAccelerometer")?,
        sampling_rate_hz: required_u32(root, "AccelerometerSamplingRate")?,
    };
    if accelerometer.sampling_rate_hz != 100 {
        return Err(NedfError::UnsupportedValue {
            field: "AccelerometerSamplingRate".to_string(),
            value: accelerometer.sampling_rate_hz.to_string(),
        });
    }

    let device = DeviceInfo {
        software_version: text_or(root, "StepDetails/SoftwareVersion", ""),
        device_class: text_or(root, "StepDetails/DeviceClass", ""),
        start_timestamp: required_u64(root, "StepDetails/StartDate_firstEEGTimestamp")?,
    };

    if let Some(stim) = &stim {
        if stim.channel_count != 0 && device.software_version == BUGGY_STIM_SOFTWARE {
            advisor.advise(&format!(
                "Data files recorded by {} with stimulation channels are broken, proceed at your own risk!",
                BUGGY_STIM_SOFTWARE
            ));
        }
    }

    if device.device_class == "STARSTIM" {
        advisor.advise("Found Starstim device, decoding as Enobio; values may be wrong");
    }

    Ok(NedfHeader {
        version,
        additional_channel_status,
        eeg,
        stim,
        accelerometer,
        device,
    })
}

fn build_eeg_settings(root: &XmlElement, advisor: &mut Advisor<'_>) -> Result<EegSettings> {
    let settings = root
        .find("EEGSettings")
        .ok_or_else(|| NedfError::MissingField("EEGSettings".to_string()))?;

    let montage = settings
        .find("EEGMontage")
        .ok_or_else(|| NedfError::MissingField("EEGSettings/EEGMontage".to_string()))?;
    let channel_names: Vec<String> = montage
        .children
        .iter()
        .map(|c| c.trimmed_text().to_string())
        .collect();

    let total_channels = required_u32(settings, "TotalNumberOfChannels")?;
    let sampling_rate_hz = required_u32(settings, "EEGSamplingRate")?;

    let units = text_or(settings, "EEGUnits", "nV");
    if units != "nV" {
        return Err(NedfError::UnsupportedValue {
            field: "EEGUnits".to_string(),
            value: units,
        });
    }

    let record_count = required_u64(settings, "NumberOfRecordsOfEEG")?;

    let lost_packet_count = required_u64(settings, "NumberOfPacketsLost")?;
    if lost_packet_count != 0 {
        return Err(NedfError::PacketsLost(lost_packet_count));
    }

    if channel_names.len() != total_channels as usize {
        advisor.advise(&format!(
            "EEGMontage lists {} channel names but TotalNumberOfChannels is {}",
            channel_names.len(),
            total_channels
        ));
    }

    Ok(EegSettings {
        total_channels,
        sampling_rate_hz,
        record_count,
        lost_packet_count,
        units,
        channel_names,
    })
}

fn build_stim_settings(root: &XmlElement, eeg: &EegSettings) -> Result<Option<StimSettings>> {
    let Some(node) = root.find("STIMSettings") else {
        return Ok(None);
    };

    let stim = StimSettings {
        channel_count: required_u32(node, "NumberOfStimulationChannels")?,
        record_count: required_u64(node, "NumberOfRecordsOfStimulation")?,
        sampling_rate_hz: required_u32(node, "StimulationSamplingRate")?,
    };

    let expected = eeg.record_count.checked_mul(2).ok_or_else(|| {
        NedfError::InvalidFormat(format!(
            "NumberOfRecordsOfEEG {} is too large for a stimulation recording",
            eeg.record_count
        ))
    })?;
    if stim.record_count < expected {
        return Err(NedfError::InvalidStimulation {
            records: stim.record_count,
            expected,
        });
    }

    if stim.sampling_rate_hz != 1000 {
        return Err(NedfError::UnsupportedValue {
            field: "StimulationSamplingRate".to_string(),
            value: stim.sampling_rate_hz.to_string(),
        });
    }

    Ok(Some(stim))
}
