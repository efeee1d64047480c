//! HLS playlist model and M3U8 text codec.
//!
//! This crate builds master and media playlists in memory, maintains
//! live sliding windows (append/remove/slide with stable sequence
//! numbering and target-duration bookkeeping), and encodes the model to
//! spec-compliant M3U8 text. The minimum protocol version needed by the
//! features in use is negotiated automatically as the model is mutated.
//!
//! Playlists are plain mutable structures without internal locking;
//! wrap an instance in your own synchronization when one task appends
//! segments while another encodes. Parsing M3U8 text back into the
//! model is left to a separate decoder.

pub(crate) mod custom;
pub(crate) mod error;
pub(crate) mod playlist;
pub(crate) mod types;
pub(crate) mod version;

pub use custom::CustomTag;
pub use error::{PlaylistError, Result};
pub use types::{
    Alternative, ByteRange, Daterange, Key, Map, MasterPlaylist, MediaPlaylist, MediaSegment,
    MediaType, Scte35, ScteCueType, ScteSyntax, Variant, Widevine,
};
