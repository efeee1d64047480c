//! Playlist entity graph.
//!
//! Plain mutable in-memory structures with no internal synchronization.
//! Callers needing concurrent producers/consumers must impose their own
//! single-writer discipline around a playlist instance.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::custom::CustomTag;

/// Playlist type advertised by `#EXT-X-PLAYLIST-TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    /// Segments may still be appended, none are ever removed.
    Event,
    /// The playlist is complete and immutable.
    Vod,
}

/// A contiguous byte range within a resource, rendered as `length@offset`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub length: u64,
    pub offset: u64,
}

impl ByteRange {
    pub fn new(length: u64, offset: u64) -> Self {
        Self { length, offset }
    }
}

/// Encryption parameters for a segment (`#EXT-X-KEY`).
///
/// Two keys compare equal iff all five fields match; the encoder uses
/// value equality to skip the tag for runs of identically-keyed segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    /// Encryption method, e.g. `AES-128`, `SAMPLE-AES` or `NONE`.
    pub method: String,
    pub uri: String,
    pub iv: String,
    /// KEYFORMAT attribute; a non-empty value requires protocol version 5.
    pub keyformat: String,
    /// KEYFORMATVERSIONS attribute; a non-empty value requires version 5.
    pub keyformatversions: String,
}

impl Key {
    pub fn new(method: &str, uri: &str, iv: &str, keyformat: &str, keyformatversions: &str) -> Self {
        Self {
            method: method.to_string(),
            uri: uri.to_string(),
            iv: iv.to_string(),
            keyformat: keyformat.to_string(),
            keyformatversions: keyformatversions.to_string(),
        }
    }
}

/// Initialization segment reference (`#EXT-X-MAP`).
///
/// Value equality drives the same continuation rule as [`Key`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Map {
    pub uri: String,
    /// Sub-range of the resource holding the initialization section.
    /// A zero length suppresses the BYTERANGE attribute.
    pub byte_range: Option<ByteRange>,
}

impl Map {
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            byte_range: None,
        }
    }

    pub fn with_range(uri: &str, length: u64, offset: u64) -> Self {
        Self {
            uri: uri.to_string(),
            byte_range: Some(ByteRange::new(length, offset)),
        }
    }
}

/// The two mutually exclusive textual conventions for SCTE-35 ad cues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScteSyntax {
    /// ANSI/SCTE 67 2014 style, a single `#EXT-SCTE35` tag.
    #[default]
    Scte67,
    /// OATCLS style, rendered as CUE-OUT / CUE-OUT-CONT / CUE-IN tags
    /// depending on [`ScteCueType`].
    Oatcls,
}

/// Position of an OATCLS cue within the ad break.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScteCueType {
    #[default]
    Start,
    Mid,
    End,
}

/// An ad-insertion cue attached to a segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scte35 {
    pub syntax: ScteSyntax,
    /// Cue position; only consulted for [`ScteSyntax::Oatcls`].
    pub cue_type: ScteCueType,
    /// Raw cue payload (base64 splice info).
    pub cue: String,
    pub id: String,
    /// Break duration in seconds.
    pub time: f64,
    /// Seconds elapsed since the break started (mid cues only).
    pub elapsed: f64,
}

/// A dated metadata interval on the playlist timeline (`#EXT-X-DATERANGE`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Daterange {
    pub id: String,
    pub class: Option<String>,
    pub start_date: DateTime<FixedOffset>,
    pub end_date: Option<DateTime<FixedOffset>>,
    /// Duration in seconds.
    pub duration: Option<f64>,
    /// Expected duration in seconds.
    pub planned_duration: Option<f64>,
    /// Caller-defined attributes, rendered as `X-<name>="<value>"` in
    /// insertion order.
    pub x: Vec<(String, String)>,
    pub scte35_cmd: Option<String>,
    pub scte35_out: Option<String>,
    pub scte35_in: Option<String>,
    pub end_on_next: bool,
}

impl Daterange {
    pub fn new(id: &str, start_date: DateTime<FixedOffset>) -> Self {
        Self {
            id: id.to_string(),
            class: None,
            start_date,
            end_date: None,
            duration: None,
            planned_duration: None,
            x: Vec::new(),
            scte35_cmd: None,
            scte35_out: None,
            scte35_in: None,
            end_on_next: false,
        }
    }
}

/// Widevine DRM metadata block, rendered as a series of `#WV-*` lines.
/// Each zero or empty field is omitted individually.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Widevine {
    pub audio_channels: u32,
    pub audio_format: u32,
    pub audio_profile_idc: u32,
    pub audio_sample_size: u32,
    pub audio_sampling_frequency: u32,
    pub cypher_version: String,
    pub ecm: String,
    pub video_format: u32,
    pub video_frame_rate: u32,
    pub video_level_idc: u32,
    pub video_profile_idc: u32,
    pub video_resolution: String,
    pub video_sar: String,
}

/// An alternative rendition (`#EXT-X-MEDIA`): an auxiliary audio,
/// subtitle or closed-caption track grouped and referenced by variants.
///
/// Renditions are deduplicated across all variants at encode time by the
/// composite key (type, group id, name, language).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternative {
    /// Rendition type: `AUDIO`, `VIDEO`, `SUBTITLES` or `CLOSED-CAPTIONS`.
    /// Rendered unquoted.
    pub media_type: String,
    pub group_id: String,
    pub uri: String,
    pub language: String,
    pub name: String,
    /// Rendered as `DEFAULT=YES`/`DEFAULT=NO`, always present.
    pub is_default: bool,
    /// `YES`/`NO` token, rendered unquoted when non-empty.
    pub autoselect: String,
    /// `YES`/`NO` token, rendered unquoted when non-empty.
    pub forced: String,
    /// Only rendered for `CLOSED-CAPTIONS` renditions.
    pub instream_id: String,
    pub characteristics: String,
    pub channels: String,
    pub subtitles: String,
}

/// A variant stream reference inside a master playlist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub uri: String,
    /// Peak bandwidth in bits per second. Required.
    pub bandwidth: u32,
    pub average_bandwidth: u32,
    /// Legacy PROGRAM-ID, emitted only below protocol version 6.
    pub program_id: u32,
    pub codecs: String,
    /// `WxH` string, rendered unquoted.
    pub resolution: String,
    /// AUDIO group id.
    pub audio: String,
    /// VIDEO group id.
    pub video: String,
    /// CLOSED-CAPTIONS group id; the literal `NONE` is rendered unquoted.
    pub captions: String,
    /// SUBTITLES group id.
    pub subtitles: String,
    pub name: String,
    /// Rendered with three decimals when non-zero.
    pub frame_rate: f64,
    pub video_range: String,
    pub hdcp_level: String,
    /// Marks an I-frame-only (trick play) stream; encoded as
    /// `#EXT-X-I-FRAME-STREAM-INF` with a restricted attribute set.
    pub iframe: bool,
    /// Renditions shared through this variant's group ids.
    pub alternatives: Vec<Alternative>,
}

/// One addressable, time-bounded chunk of media in a media playlist.
#[derive(Debug, Default)]
pub struct MediaSegment {
    pub uri: String,
    /// Duration in seconds.
    pub duration: f64,
    pub title: String,
    pub(crate) seq_id: u64,
    pub key: Option<Key>,
    pub map: Option<Map>,
    /// `#EXT-X-BYTERANGE`; requires protocol version 4 and is only
    /// emitted for a positive length.
    pub byte_range: Option<ByteRange>,
    pub program_date_time: Option<DateTime<FixedOffset>>,
    pub discontinuity: bool,
    pub scte: Option<Scte35>,
    pub dateranges: Vec<Daterange>,
    pub(crate) custom: BTreeMap<String, Box<dyn CustomTag>>,
}

impl MediaSegment {
    pub fn new(uri: &str, duration: f64, title: &str) -> Self {
        Self {
            uri: uri.to_string(),
            duration,
            title: title.to_string(),
            ..Default::default()
        }
    }

    /// Sequence id assigned when the segment was appended to a playlist.
    pub fn seq_id(&self) -> u64 {
        self.seq_id
    }
}

/// A master playlist: an ordered set of variant streams.
#[derive(Debug)]
pub struct MasterPlaylist {
    pub(crate) version: u8,
    pub(crate) independent_segments: bool,
    pub(crate) variants: Vec<Variant>,
    pub(crate) custom: BTreeMap<String, Box<dyn CustomTag>>,
    /// Query string appended to every variant URI at encode time.
    pub args: String,
}

/// A media playlist: a time-ordered sequence of segments with live
/// sliding-window semantics.
#[derive(Debug)]
pub struct MediaPlaylist {
    pub(crate) version: u8,
    pub(crate) target_duration: f64,
    pub(crate) seq_no: u64,
    pub(crate) segments: VecDeque<MediaSegment>,
    pub(crate) iframe: bool,
    pub(crate) closed: bool,
    pub(crate) duration_as_int: bool,
    pub(crate) win_size: usize,
    pub(crate) capacity: Option<usize>,
    pub(crate) custom: BTreeMap<String, Box<dyn CustomTag>>,
    pub media_type: Option<MediaType>,
    pub discontinuity_seq: u64,
    /// `#EXT-X-START` time offset in seconds; emitted when positive.
    pub start_time: f64,
    pub start_time_precise: bool,
    /// Widevine DRM metadata block.
    pub wv: Option<Widevine>,
    /// Query string appended to every segment URI at encode time.
    pub args: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_equality_is_by_value() {
        let a = Key::new("AES-128", "https://example.com/key", "0xABCD", "", "");
        let b = Key::new("AES-128", "https://example.com/key", "0xABCD", "", "");
        let c = Key::new("AES-128", "https://example.com/key2", "0xABCD", "", "");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_map_equality_includes_range() {
        let a = Map::with_range("init.mp4", 1000, 0);
        let b = Map::with_range("init.mp4", 1000, 0);
        let c = Map::with_range("init.mp4", 1000, 512);
        let d = Map::new("init.mp4");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_value_records_serde_round_trip() {
        let key = Key::new("SAMPLE-AES", "skd://key", "", "com.apple.streamingkeydelivery", "1");
        let json = serde_json::to_string(&key).unwrap();
        let back: Key = serde_json::from_str(&json).unwrap();
        assert_eq!(key, back);

        let variant = Variant {
            uri: "chunklist.m3u8".to_string(),
            bandwidth: 1500000,
            resolution: "1280x720".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&variant).unwrap();
        let back: Variant = serde_json::from_str(&json).unwrap();
        assert_eq!(variant, back);
    }
}
