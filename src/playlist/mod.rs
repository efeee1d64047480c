//! Playlist operations and M3U8 encoding
//!
//! This module implements the behavior around the entity graph:
//! - Master playlist mutation and encoding (master.rs)
//! - Media playlist sliding-window mutation and encoding (media.rs)
//! - Shared tag value formatting (codec.rs)

pub(crate) mod codec;
pub(crate) mod master;
pub(crate) mod media;
