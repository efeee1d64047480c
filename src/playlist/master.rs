//! Master playlist operations and encoder.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::custom::CustomTag;
use crate::playlist::codec::{push_attr, push_quoted_attr};
use crate::types::{MasterPlaylist, Variant};
use crate::version::{raise, MIN_VERSION};

impl MasterPlaylist {
    /// Create a new empty master playlist.
    pub fn new() -> Self {
        Self {
            version: MIN_VERSION,
            independent_segments: false,
            variants: Vec::new(),
            custom: BTreeMap::new(),
            args: String::new(),
        }
    }

    /// Append a variant to the playlist.
    ///
    /// A variant carrying alternative renditions raises the protocol
    /// version to 4.
    pub fn append(&mut self, variant: Variant) {
        if !variant.alternatives.is_empty() {
            raise(&mut self.version, 4);
        }
        self.variants.push(variant);
    }

    /// Variants in append order.
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Register `tag` under its name, replacing any previous tag with
    /// the same name.
    pub fn set_custom_tag(&mut self, tag: Box<dyn CustomTag>) {
        self.custom.insert(tag.tag_name().to_string(), tag);
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

    /// Whether every media sample can be decoded without information
    /// from other segments.
    pub fn independent_segments(&self) -> bool {
        self.independent_segments
    }

    pub fn set_independent_segments(&mut self, value: bool) {
        self.independent_segments = value;
    }

    /// Render the playlist as M3U8 text.
    ///
    /// Read-only; identical models produce byte-identical output.
    pub fn encode(&self) -> String {
        let mut out = String::new();

        out.push_str("#EXTM3U\n#EXT-X-VERSION:");
        out.push_str(&self.version.to_string());
        out.push('\n');

        if self.independent_segments {
            out.push_str("#EXT-X-INDEPENDENT-SEGMENTS\n");
        }

        for tag in self.custom.values() {
            if let Some(text) = tag.encode() {
                out.push_str(&text);
                out.push('\n');
            }
        }

        // Each rendition is emitted once, on first sight across all
        // variants.
        let mut alts_written: HashSet<(String, String, String, String)> = HashSet::new();

        for variant in &self.variants {
            for alt in &variant.alternatives {
                let alt_key = (
                    alt.media_type.clone(),
                    alt.group_id.clone(),
                    alt.name.clone(),
                    alt.language.clone(),
                );
                if !alts_written.insert(alt_key) {
                    continue;
                }

                out.push_str("#EXT-X-MEDIA:");
                if !alt.media_type.is_empty() {
                    // TYPE is an unquoted token
                    out.push_str("TYPE=");
                    out.push_str(&alt.media_type);
                }
                push_quoted_attr(&mut out, "GROUP-ID", &alt.group_id);
                push_quoted_attr(&mut out, "NAME", &alt.name);
                out.push_str(",DEFAULT=");
                out.push_str(if alt.is_default { "YES" } else { "NO" });
                push_attr(&mut out, "AUTOSELECT", &alt.autoselect);
                push_quoted_attr(&mut out, "LANGUAGE", &alt.language);
                push_attr(&mut out, "FORCED", &alt.forced);
                if alt.media_type == "CLOSED-CAPTIONS" {
                    push_quoted_attr(&mut out, "INSTREAM-ID", &alt.instream_id);
                }
                push_quoted_attr(&mut out, "CHARACTERISTICS", &alt.characteristics);
                push_quoted_attr(&mut out, "CHANNELS", &alt.channels);
                push_quoted_attr(&mut out, "SUBTITLES", &alt.subtitles);
                push_quoted_attr(&mut out, "URI", &alt.uri);
                out.push('\n');
            }

            if variant.iframe {
                self.encode_iframe_stream_inf(&mut out, variant);
            } else {
                self.encode_stream_inf(&mut out, variant);
            }
        }

        out
    }

    /// `#EXT-X-I-FRAME-STREAM-INF`: restricted attribute subset, the URI
    /// is an attribute rather than a separate line and never carries the
    /// playlist args.
    fn encode_iframe_stream_inf(&self, out: &mut String, variant: &Variant) {
        out.push_str("#EXT-X-I-FRAME-STREAM-INF:BANDWIDTH=");
        out.push_str(&variant.bandwidth.to_string());
        if self.version < 6 {
            out.push_str(",PROGRAM-ID=");
            out.push_str(&variant.program_id.to_string());
        }
        if variant.average_bandwidth != 0 {
            out.push_str(",AVERAGE-BANDWIDTH=");
            out.push_str(&variant.average_bandwidth.to_string());
        }
        push_quoted_attr(out, "CODECS", &variant.codecs);
        push_attr(out, "RESOLUTION", &variant.resolution);
        push_quoted_attr(out, "VIDEO", &variant.video);
        push_attr(out, "VIDEO-RANGE", &variant.video_range);
        push_attr(out, "HDCP-LEVEL", &variant.hdcp_level);
        push_quoted_attr(out, "URI", &variant.uri);
        out.push('\n');
    }

    fn encode_stream_inf(&self, out: &mut String, variant: &Variant) {
        out.push_str("#EXT-X-STREAM-INF:BANDWIDTH=");
        out.push_str(&variant.bandwidth.to_string());
        if self.version < 6 {
            out.push_str(",PROGRAM-ID=");
            out.push_str(&variant.program_id.to_string());
        }
        if variant.average_bandwidth != 0 {
            out.push_str(",AVERAGE-BANDWIDTH=");
            out.push_str(&variant.average_bandwidth.to_string());
        }
        push_quoted_attr(out, "CODECS", &variant.codecs);
        push_attr(out, "RESOLUTION", &variant.resolution);
        push_quoted_attr(out, "AUDIO", &variant.audio);
        push_quoted_attr(out, "VIDEO", &variant.video);
        if !variant.captions.is_empty() {
            out.push_str(",CLOSED-CAPTIONS=");
            if variant.captions == "NONE" {
                // the NONE token is unquoted
                out.push_str(&variant.captions);
            } else {
                out.push('"');
                out.push_str(&variant.captions);
                out.push('"');
            }
        }
        push_quoted_attr(out, "SUBTITLES", &variant.subtitles);
        push_quoted_attr(out, "NAME", &variant.name);
        if variant.frame_rate != 0.0 {
            out.push_str(&format!(",FRAME-RATE={:.3}", variant.frame_rate));
        }
        push_attr(out, "VIDEO-RANGE", &variant.video_range);
        push_attr(out, "HDCP-LEVEL", &variant.hdcp_level);
        out.push('\n');

        out.push_str(&variant.uri);
        if !self.args.is_empty() {
            out.push(if variant.uri.contains('?') { '&' } else { '?' });
            out.push_str(&self.args);
        }
        out.push('\n');
    }
}

impl Default for MasterPlaylist {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MasterPlaylist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Alternative;

    fn audio_alternative(name: &str, language: &str) -> Alternative {
        Alternative {
            media_type: "AUDIO".to_string(),
            group_id: "aud".to_string(),
            uri: format!("audio/{}.m3u8", language),
            language: language.to_string(),
            name: name.to_string(),
            is_default: true,
            autoselect: "YES".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_encode_minimal_master() {
        let mut master = MasterPlaylist::new();
        master.append(Variant {
            uri: "chunklist.m3u8".to_string(),
            bandwidth: 1500000,
            ..Default::default()
        });

        let expected = "\
#EXTM3U
#EXT-X-VERSION:3
#EXT-X-STREAM-INF:BANDWIDTH=1500000,PROGRAM-ID=0
chunklist.m3u8
";
        assert_eq!(master.encode(), expected);
    }

    #[test]
    fn test_encode_stream_inf_attributes() {
        let mut master = MasterPlaylist::new();
        master.append(Variant {
            uri: "1080p.m3u8".to_string(),
            bandwidth: 5000000,
            average_bandwidth: 4500000,
            program_id: 1,
            codecs: "avc1.640028,mp4a.40.2".to_string(),
            resolution: "1920x1080".to_string(),
            audio: "aud".to_string(),
            captions: "NONE".to_string(),
            name: "1080p".to_string(),
            frame_rate: 29.97,
            ..Default::default()
        });

        let text = master.encode();
        assert!(text.contains(
            "#EXT-X-STREAM-INF:BANDWIDTH=5000000,PROGRAM-ID=1,AVERAGE-BANDWIDTH=4500000,\
             CODECS=\"avc1.640028,mp4a.40.2\",RESOLUTION=1920x1080,AUDIO=\"aud\",\
             CLOSED-CAPTIONS=NONE,NAME=\"1080p\",FRAME-RATE=29.970\n"
        ));
        assert!(text.ends_with("1080p.m3u8\n"));
    }

    #[test]
    fn test_program_id_dropped_at_version_6() {
        let mut master = MasterPlaylist::new();
        master.set_version(6);
        master.append(Variant {
            uri: "chunklist.m3u8".to_string(),
            bandwidth: 1500000,
            program_id: 1,
            ..Default::default()
        });

        assert!(!master.encode().contains("PROGRAM-ID"));
    }

    #[test]
    fn test_alternatives_raise_version_to_4() {
        let mut master = MasterPlaylist::new();
        assert_eq!(master.version(), 3);

        master.append(Variant {
            uri: "low.m3u8".to_string(),
            bandwidth: 1000000,
            audio: "aud".to_string(),
            alternatives: vec![audio_alternative("English", "en")],
            ..Default::default()
        });

        assert_eq!(master.version(), 4);
    }

    #[test]
    fn test_shared_alternative_encoded_once() {
        let shared = audio_alternative("English", "en");

        let mut master = MasterPlaylist::new();
        master.append(Variant {
            uri: "low.m3u8".to_string(),
            bandwidth: 1000000,
            audio: "aud".to_string(),
            alternatives: vec![shared.clone()],
            ..Default::default()
        });
        master.append(Variant {
            uri: "high.m3u8".to_string(),
            bandwidth: 5000000,
            audio: "aud".to_string(),
            alternatives: vec![shared],
            ..Default::default()
        });

        let text = master.encode();
        assert_eq!(text.matches("#EXT-X-MEDIA:").count(), 1);
        assert!(text.contains(
            "#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aud\",NAME=\"English\",DEFAULT=YES,\
             AUTOSELECT=YES,LANGUAGE=\"en\",URI=\"audio/en.m3u8\"\n"
        ));
    }

    #[test]
    fn test_distinct_alternatives_both_encoded() {
        let mut master = MasterPlaylist::new();
        master.append(Variant {
            uri: "main.m3u8".to_string(),
            bandwidth: 1000000,
            audio: "aud".to_string(),
            alternatives: vec![
                audio_alternative("English", "en"),
                audio_alternative("Deutsch", "de"),
            ],
            ..Default::default()
        });

        assert_eq!(master.encode().matches("#EXT-X-MEDIA:").count(), 2);
    }

    #[test]
    fn test_instream_id_only_for_closed_captions() {
        let mut master = MasterPlaylist::new();
        let mut cc = Alternative {
            media_type: "CLOSED-CAPTIONS".to_string(),
            group_id: "cc".to_string(),
            name: "CC1".to_string(),
            instream_id: "CC1".to_string(),
            ..Default::default()
        };
        master.append(Variant {
            uri: "a.m3u8".to_string(),
            bandwidth: 1000000,
            alternatives: vec![cc.clone()],
            ..Default::default()
        });
        assert!(master.encode().contains(",INSTREAM-ID=\"CC1\""));

        cc.media_type = "AUDIO".to_string();
        let mut master = MasterPlaylist::new();
        master.append(Variant {
            uri: "a.m3u8".to_string(),
            bandwidth: 1000000,
            alternatives: vec![cc],
            ..Default::default()
        });
        assert!(!master.encode().contains("INSTREAM-ID"));
    }

    #[test]
    fn test_iframe_variant_uses_restricted_tag() {
        let mut master = MasterPlaylist::new();
        master.args = "token=abc".to_string();
        master.append(Variant {
            uri: "iframes.m3u8".to_string(),
            bandwidth: 220000,
            codecs: "avc1.640028".to_string(),
            resolution: "1920x1080".to_string(),
            audio: "aud".to_string(),
            iframe: true,
            ..Default::default()
        });

        let text = master.encode();
        assert!(text.contains(
            "#EXT-X-I-FRAME-STREAM-INF:BANDWIDTH=220000,PROGRAM-ID=0,\
             CODECS=\"avc1.640028\",RESOLUTION=1920x1080,URI=\"iframes.m3u8\"\n"
        ));
        // no AUDIO reference and no separate URI line with args
        assert!(!text.contains("AUDIO="));
        assert!(!text.contains("token=abc"));
    }

    #[test]
    fn test_args_joined_with_existing_query() {
        let mut master = MasterPlaylist::new();
        master.args = "session=1".to_string();
        master.append(Variant {
            uri: "plain.m3u8".to_string(),
            bandwidth: 1000000,
            ..Default::default()
        });
        master.append(Variant {
            uri: "signed.m3u8?token=abc".to_string(),
            bandwidth: 2000000,
            ..Default::default()
        });

        let text = master.encode();
        assert!(text.contains("plain.m3u8?session=1\n"));
        assert!(text.contains("signed.m3u8?token=abc&session=1\n"));
    }

    #[test]
    fn test_independent_segments_tag() {
        let mut master = MasterPlaylist::new();
        master.set_independent_segments(true);
        assert!(master.encode().contains("#EXT-X-INDEPENDENT-SEGMENTS\n"));
    }

    #[test]
    fn test_encode_is_deterministic() {
        let mut master = MasterPlaylist::new();
        master.append(Variant {
            uri: "a.m3u8".to_string(),
            bandwidth: 64000,
            alternatives: vec![audio_alternative("English", "en")],
            ..Default::default()
        });
        assert_eq!(master.encode(), master.encode());
        assert_eq!(master.to_string(), master.encode());
    }
}
