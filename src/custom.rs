//! Caller-supplied custom tag encoders.

use std::fmt;

/// A caller-defined tag injected into the encoded playlist.
///
/// Implementations may be registered on a master playlist, a media
/// playlist, or an individual segment, keyed by [`CustomTag::tag_name`].
/// Registering a second tag under the same name replaces the first.
/// During encoding each registered tag is asked to render itself; a
/// non-`None` result is inserted verbatim as one line at the owning
/// scope's position in the output. Tags iterate in name order so that
/// encoding stays deterministic.
pub trait CustomTag: fmt::Debug {
    /// Tag name used as the registration key.
    fn tag_name(&self) -> &str;

    /// Rendered tag line without the trailing newline, or `None` to
    /// suppress the tag for this encode.
    fn encode(&self) -> Option<String>;
}
