//! Media playlist sliding-window operations and encoder.
//!
//! A live encoder drives a playlist with `append`/`slide` while serving
//! `encode` snapshots; a VOD packager appends everything once and then
//! calls `close`. Mutations that introduce version-gated features raise
//! the protocol version as a side effect.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use chrono::{DateTime, FixedOffset};

use crate::custom::CustomTag;
use crate::error::{PlaylistError, Result};
use crate::playlist::codec::{
    format_byte_range, format_date_time, format_float, push_quoted_attr, DurationCache,
};
use crate::types::{
    Daterange, Key, Map, MediaPlaylist, MediaSegment, MediaType, Scte35, ScteCueType, ScteSyntax,
};
use crate::version::{raise, MIN_VERSION};

impl MediaPlaylist {
    /// Create a new empty media playlist with the given sliding-window
    /// size.
    pub fn new(win_size: usize) -> Self {
        Self {
            version: MIN_VERSION,
            target_duration: 0.0,
            seq_no: 0,
            segments: VecDeque::new(),
            iframe: false,
            closed: false,
            duration_as_int: false,
            win_size,
            capacity: None,
            custom: BTreeMap::new(),
            media_type: None,
            discontinuity_seq: 0,
            start_time: 0.0,
            start_time_precise: false,
            wv: None,
            args: String::new(),
        }
    }

    /// Create a fixed-capacity playlist: `append` fails with
    /// [`PlaylistError::Full`] once `capacity` segments are retained.
    pub fn with_capacity(win_size: usize, capacity: usize) -> Self {
        let mut playlist = Self::new(win_size);
        playlist.capacity = Some(capacity);
        playlist
    }

    /// Build a segment from `uri`, `duration` and `title` and append it
    /// to the tail.
    pub fn append(&mut self, uri: &str, duration: f64, title: &str) -> Result<()> {
        self.append_segment(MediaSegment::new(uri, duration, title))
    }

    /// Append a prepared segment to the tail.
    ///
    /// The segment is assigned the next sequence id (continuing from the
    /// media sequence number when the playlist is empty) and the target
    /// duration high-water mark is updated. The target duration never
    /// decreases for the lifetime of the playlist, even when segments
    /// are removed later.
    pub fn append_segment(&mut self, mut segment: MediaSegment) -> Result<()> {
        if let Some(capacity) = self.capacity {
            if self.segments.len() >= capacity {
                return Err(PlaylistError::Full);
            }
        }

        segment.seq_id = match self.segments.back() {
            Some(last) => last.seq_id + 1,
            None => self.seq_no,
        };
        if self.target_duration < segment.duration {
            self.target_duration = segment.duration.ceil();
        }

        tracing::trace!(uri = %segment.uri, seq_id = segment.seq_id, "append segment");
        self.segments.push_back(segment);
        Ok(())
    }

    /// Drop the head segment. The media sequence number advances only
    /// while the playlist is open.
    pub fn remove(&mut self) -> Result<()> {
        if self.segments.pop_front().is_none() {
            return Err(PlaylistError::Empty);
        }
        if !self.closed {
            self.seq_no += 1;
        }
        Ok(())
    }

    /// Steady-state live operation: expire the head segment when the
    /// window is full, then append the new one.
    pub fn slide(&mut self, uri: &str, duration: f64, title: &str) -> Result<()> {
        if !self.closed && self.segments.len() >= self.win_size {
            // a zero window on an empty playlist degrades to a plain append
            self.remove().ok();
        }
        tracing::debug!(uri = %uri, count = self.segments.len(), "slide window");
        self.append(uri, duration, title)
    }

    fn last_mut(&mut self) -> Result<&mut MediaSegment> {
        self.segments.back_mut().ok_or(PlaylistError::Empty)
    }

    /// Set the encryption key for the most recently appended segment.
    ///
    /// A key carrying KEYFORMAT or KEYFORMATVERSIONS raises the protocol
    /// version to 5.
    pub fn set_key(&mut self, key: Key) -> Result<()> {
        if self.segments.is_empty() {
            return Err(PlaylistError::Empty);
        }
        if !key.keyformat.is_empty() || !key.keyformatversions.is_empty() {
            raise(&mut self.version, 5);
        }
        self.last_mut()?.key = Some(key);
        Ok(())
    }

    /// Set the initialization map for the most recently appended
    /// segment. Requires protocol version 5.
    pub fn set_map(&mut self, map: Map) -> Result<()> {
        if self.segments.is_empty() {
            return Err(PlaylistError::Empty);
        }
        raise(&mut self.version, 5);
        self.last_mut()?.map = Some(map);
        Ok(())
    }

    /// Set the byte range of the most recently appended segment.
    /// Requires protocol version 4.
    pub fn set_range(&mut self, length: u64, offset: u64) -> Result<()> {
        if self.segments.is_empty() {
            return Err(PlaylistError::Empty);
        }
        raise(&mut self.version, 4);
        self.last_mut()?.byte_range = Some(crate::types::ByteRange::new(length, offset));
        Ok(())
    }

    /// Attach a legacy-syntax ad cue to the most recently appended
    /// segment. Convenience wrapper around [`MediaPlaylist::set_scte35`].
    pub fn set_scte(&mut self, cue: &str, id: &str, time: f64) -> Result<()> {
        self.set_scte35(Scte35 {
            syntax: ScteSyntax::Scte67,
            cue: cue.to_string(),
            id: id.to_string(),
            time,
            ..Default::default()
        })
    }

    /// Attach an ad cue to the most recently appended segment.
    pub fn set_scte35(&mut self, scte: Scte35) -> Result<()> {
        self.last_mut()?.scte = Some(scte);
        Ok(())
    }

    /// Attach date ranges to the most recently appended segment.
    pub fn set_dateranges(&mut self, dateranges: Vec<Daterange>) -> Result<()> {
        self.last_mut()?.dateranges = dateranges;
        Ok(())
    }

    /// Flag an encoding discontinuity before the most recently appended
    /// segment.
    pub fn set_discontinuity(&mut self) -> Result<()> {
        self.last_mut()?.discontinuity = true;
        Ok(())
    }

    /// Associate the first sample of the most recently appended segment
    /// with an absolute date and time.
    pub fn set_program_date_time(&mut self, value: DateTime<FixedOffset>) -> Result<()> {
        self.last_mut()?.program_date_time = Some(value);
        Ok(())
    }

    /// Register `tag` on the playlist, replacing any previous tag with
    /// the same name.
    pub fn set_custom_tag(&mut self, tag: Box<dyn CustomTag>) {
        self.custom.insert(tag.tag_name().to_string(), tag);
    }

    /// Register `tag` on the most recently appended segment.
    pub fn set_custom_segment_tag(&mut self, tag: Box<dyn CustomTag>) -> Result<()> {
        let last = self.last_mut()?;
        last.custom.insert(tag.tag_name().to_string(), tag);
        Ok(())
    }

    /// Mark the playlist as consisting of I-frames only. Requires
    /// protocol version 4.
    pub fn set_iframe_only(&mut self) {
        raise(&mut self.version, 4);
        self.iframe = true;
    }

    pub fn is_iframe_only(&self) -> bool {
        self.iframe
    }

    /// Switch segment durations to integer-ceiling rendering for old
    /// clients. Requires protocol version 3.
    pub fn set_duration_as_int(&mut self, yes: bool) {
        if yes {
            raise(&mut self.version, 3);
        }
        self.duration_as_int = yes;
    }

    /// Close the playlist: no more segments will ever be appended and
    /// the media sequence number freezes.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of segments currently retained.
    pub fn count(&self) -> usize {
        self.segments.len()
    }

    /// Retained segments in append order.
    pub fn segments(&self) -> impl Iterator<Item = &MediaSegment> {
        self.segments.iter()
    }

    /// Current protocol version.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Force the protocol version. Feature-introducing mutations may
    /// raise it again; lowering it below what the features in use
    /// require is a caller error the encoder does not detect.
    pub fn set_version(&mut self, version: u8) {
        self.version = version;
    }

    /// Target duration high-water mark in seconds.
    pub fn target_duration(&self) -> f64 {
        self.target_duration
    }

    /// Sequence number of the first retained segment.
    pub fn media_sequence(&self) -> u64 {
        self.seq_no
    }

    pub fn win_size(&self) -> usize {
        self.win_size
    }

    pub fn set_win_size(&mut self, win_size: usize) {
        self.win_size = win_size;
    }

    /// Render the playlist as M3U8 text.
    ///
    /// Read-only aside from a per-call duration formatting cache;
    /// identical models produce byte-identical output.
    pub fn encode(&self) -> String {
        let mut out = String::new();

        out.push_str("#EXTM3U\n#EXT-X-VERSION:");
        out.push_str(&self.version.to_string());
        out.push('\n');

        for tag in self.custom.values() {
            if let Some(text) = tag.encode() {
                out.push_str(&text);
                out.push('\n');
            }
        }

        match self.media_type {
            Some(MediaType::Event) => {
                out.push_str("#EXT-X-PLAYLIST-TYPE:EVENT\n");
                // legacy line kept for players predating protocol version 7
                out.push_str("#EXT-X-ALLOW-CACHE:NO\n");
            }
            Some(MediaType::Vod) => out.push_str("#EXT-X-PLAYLIST-TYPE:VOD\n"),
            None => {}
        }

        out.push_str("#EXT-X-MEDIA-SEQUENCE:");
        out.push_str(&self.seq_no.to_string());
        out.push('\n');

        // TARGETDURATION must be an integer
        out.push_str("#EXT-X-TARGETDURATION:");
        out.push_str(&(self.target_duration.ceil() as i64).to_string());
        out.push('\n');

        if self.start_time > 0.0 {
            out.push_str("#EXT-X-START:TIME-OFFSET=");
            out.push_str(&format_float(self.start_time));
            if self.start_time_precise {
                out.push_str(",PRECISE=YES");
            }
            out.push('\n');
        }

        if self.discontinuity_seq != 0 {
            out.push_str("#EXT-X-DISCONTINUITY-SEQUENCE:");
            out.push_str(&self.discontinuity_seq.to_string());
            out.push('\n');
        }

        if self.iframe {
            out.push_str("#EXT-X-I-FRAMES-ONLY\n");
        }

        if let Some(wv) = &self.wv {
            encode_widevine(&mut out, wv);
        }

        // Key/Map continuation state is carried across the loop, not
        // stored on the segments.
        let mut last_key: Option<&Key> = None;
        let mut last_map: Option<&Map> = None;
        let mut durations = DurationCache::new(self.duration_as_int);

        for segment in &self.segments {
            if let Some(scte) = &segment.scte {
                encode_scte(&mut out, scte);
            }

            for daterange in &segment.dateranges {
                encode_daterange(&mut out, daterange);
            }

            if let Some(key) = &segment.key {
                if last_key != Some(key) {
                    encode_key(&mut out, key);
                }
            }
            last_key = segment.key.as_ref();

            if segment.discontinuity {
                out.push_str("#EXT-X-DISCONTINUITY\n");
            }

            if let Some(map) = &segment.map {
                if last_map != Some(map) {
                    out.push_str("#EXT-X-MAP:URI=\"");
                    out.push_str(&map.uri);
                    out.push('"');
                    if let Some(range) = &map.byte_range {
                        if range.length > 0 {
                            out.push_str(",BYTERANGE=");
                            out.push_str(&format_byte_range(range));
                        }
                    }
                    out.push('\n');
                }
            }
            last_map = segment.map.as_ref();

            if let Some(date_time) = &segment.program_date_time {
                out.push_str("#EXT-X-PROGRAM-DATE-TIME:");
                out.push_str(&format_date_time(date_time));
                out.push('\n');
            }

            if let Some(range) = &segment.byte_range {
                if range.length > 0 {
                    out.push_str("#EXT-X-BYTERANGE:");
                    out.push_str(&format_byte_range(range));
                    out.push('\n');
                }
            }

            for tag in segment.custom.values() {
                if let Some(text) = tag.encode() {
                    out.push_str(&text);
                    out.push('\n');
                }
            }

            out.push_str("#EXTINF:");
            out.push_str(durations.format(segment.duration));
            out.push(',');
            out.push_str(&segment.title);
            out.push('\n');
            out.push_str(&segment.uri);
            if !self.args.is_empty() {
                out.push('?');
                out.push_str(&self.args);
            }
            out.push('\n');
        }

        if self.closed {
            out.push_str("#EXT-X-ENDLIST\n");
        }

        out
    }
}

impl fmt::Display for MediaPlaylist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn encode_key(out: &mut String, key: &Key) {
    out.push_str("#EXT-X-KEY:METHOD=");
    out.push_str(&key.method);
    if key.method != "NONE" {
        out.push_str(",URI=\"");
        out.push_str(&key.uri);
        out.push('"');
        if !key.iv.is_empty() {
            out.push_str(",IV=");
            out.push_str(&key.iv);
        }
        push_quoted_attr(out, "KEYFORMAT", &key.keyformat);
        push_quoted_attr(out, "KEYFORMATVERSIONS", &key.keyformatversions);
    }
    out.push('\n');
}

fn encode_scte(out: &mut String, scte: &Scte35) {
    match scte.syntax {
        ScteSyntax::Scte67 => {
            out.push_str("#EXT-SCTE35:CUE=\"");
            out.push_str(&scte.cue);
            out.push('"');
            push_quoted_attr(out, "ID", &scte.id);
            if scte.time != 0.0 {
                out.push_str(",TIME=");
                out.push_str(&format_float(scte.time));
            }
            out.push('\n');
        }
        ScteSyntax::Oatcls => match scte.cue_type {
            ScteCueType::Start => {
                out.push_str("#EXT-OATCLS-SCTE35:");
                out.push_str(&scte.cue);
                out.push('\n');
                out.push_str("#EXT-X-CUE-OUT:");
                out.push_str(&format_float(scte.time));
                out.push('\n');
            }
            ScteCueType::Mid => {
                out.push_str("#EXT-X-CUE-OUT-CONT:ElapsedTime=");
                out.push_str(&format_float(scte.elapsed));
                out.push_str(",Duration=");
                out.push_str(&format_float(scte.time));
                out.push_str(",SCTE35=");
                out.push_str(&scte.cue);
                out.push('\n');
            }
            ScteCueType::End => out.push_str("#EXT-X-CUE-IN\n"),
        },
    }
}

fn encode_daterange(out: &mut String, daterange: &Daterange) {
    out.push_str("#EXT-X-DATERANGE:ID=\"");
    out.push_str(&daterange.id);
    out.push('"');
    if let Some(class) = &daterange.class {
        push_quoted_attr(out, "CLASS", class);
    }
    out.push_str(",START-DATE=\"");
    out.push_str(&format_date_time(&daterange.start_date));
    out.push('"');
    if let Some(end_date) = &daterange.end_date {
        out.push_str(",END-DATE=\"");
        out.push_str(&format_date_time(end_date));
        out.push('"');
    }
    if let Some(duration) = daterange.duration {
        out.push_str(",DURATION=");
        out.push_str(&format_float(duration));
    }
    if let Some(planned) = daterange.planned_duration {
        out.push_str(",PLANNED-DURATION=");
        out.push_str(&format_float(planned));
    }
    for (name, value) in &daterange.x {
        out.push_str(",X-");
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(value);
        out.push('"');
    }
    if let Some(cmd) = &daterange.scte35_cmd {
        push_quoted_attr(out, "SCTE35-CMD", cmd);
    }
    if let Some(scte_in) = &daterange.scte35_in {
        push_quoted_attr(out, "SCTE35-IN", scte_in);
    }
    if let Some(scte_out) = &daterange.scte35_out {
        push_quoted_attr(out, "SCTE35-OUT", scte_out);
    }
    if daterange.end_on_next {
        out.push_str(",END-ON-NEXT=YES");
    }
    out.push('\n');
}

fn encode_widevine(out: &mut String, wv: &crate::types::Widevine) {
    if wv.audio_channels != 0 {
        out.push_str(&format!("#WV-AUDIO-CHANNELS {}\n", wv.audio_channels));
    }
    if wv.audio_format != 0 {
        out.push_str(&format!("#WV-AUDIO-FORMAT {}\n", wv.audio_format));
    }
    if wv.audio_profile_idc != 0 {
        out.push_str(&format!("#WV-AUDIO-PROFILE-IDC {}\n", wv.audio_profile_idc));
    }
    if wv.audio_sample_size != 0 {
        out.push_str(&format!("#WV-AUDIO-SAMPLE-SIZE {}\n", wv.audio_sample_size));
    }
    if wv.audio_sampling_frequency != 0 {
        out.push_str(&format!(
            "#WV-AUDIO-SAMPLING-FREQUENCY {}\n",
            wv.audio_sampling_frequency
        ));
    }
    if !wv.cypher_version.is_empty() {
        out.push_str(&format!("#WV-CYPHER-VERSION {}\n", wv.cypher_version));
    }
    if !wv.ecm.is_empty() {
        out.push_str(&format!("#WV-ECM {}\n", wv.ecm));
    }
    if wv.video_format != 0 {
        out.push_str(&format!("#WV-VIDEO-FORMAT {}\n", wv.video_format));
    }
    if wv.video_frame_rate != 0 {
        out.push_str(&format!("#WV-VIDEO-FRAME-RATE {}\n", wv.video_frame_rate));
    }
    if wv.video_level_idc != 0 {
        out.push_str(&format!("#WV-VIDEO-LEVEL-IDC {}\n", wv.video_level_idc));
    }
    if wv.video_profile_idc != 0 {
        out.push_str(&format!("#WV-VIDEO-PROFILE-IDC {}\n", wv.video_profile_idc));
    }
    if !wv.video_resolution.is_empty() {
        out.push_str(&format!("#WV-VIDEO-RESOLUTION {}\n", wv.video_resolution));
    }
    if !wv.video_sar.is_empty() {
        out.push_str(&format!("#WV-VIDEO-SAR {}\n", wv.video_sar));
    }
}
