use thiserror::Error;

/// Errors returned by playlist mutation operations.
///
/// Encoding never fails; only mutations do, and a failed mutation leaves
/// the playlist in its previous state.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistError {
    /// The operation needs at least one segment in the playlist.
    #[error("playlist is empty")]
    Empty,

    /// The playlist reached its configured segment capacity.
    #[error("playlist is full")]
    Full,
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PlaylistError>;
