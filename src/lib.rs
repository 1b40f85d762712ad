//! # hls-remux-core
//!
//! `hls-remux-core` is the transport-stream-to-fragmented-MP4 remuxer core
//! of an HTTP Live Streaming playback library. It consumes demuxed
//! elementary-stream samples — AVC video access units, AAC/MPEG audio
//! frames, timed ID3 metadata, and CEA-608/708 caption cues — and emits
//! ISO BMFF initialization segments and media segments suitable for a
//! Media Source Extensions byte-stream append.
//!
//! ## Core Features
//!
//! - **33-bit PTS/DTS rollover normalization** against a rolling reference
//!   ([`clock::normalize`]).
//! - **Inter-fragment continuity repair**: holes, overlaps, and
//!   out-of-order samples are absorbed so a contiguous playlist produces
//!   seamless `moof` boundaries.
//! - **Audio/video synchronization**, including silent-frame gap filling
//!   and empty-audio synthesis when one track is missing or short.
//! - **A real, minimal ISO BMFF box writer** ([`isobmff`]) and AAC
//!   silent-frame table ([`silence`]), both swappable by a host that
//!   already owns richer versions.
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use hls_remux_core::{Remuxer, RemuxerConfig, TracingObserver};
//!
//! let mut remuxer = Remuxer::new(
//!     Arc::new(TracingObserver),
//!     RemuxerConfig::default(),
//!     "Mozilla/5.0 ... Chrome/120.0.0.0",
//! );
//!
//! let output = remuxer.remux(remux_input);
//! if let Some(video) = output.video {
//!     // append video.moof followed by video.mdat to the source buffer
//! }
//! ```

pub mod clock;
pub mod config;
pub mod config_file;
pub mod error;
pub mod host_quirks;
pub mod isobmff;
pub mod observer;
pub mod remux;
pub mod silence;
pub mod types;

#[cfg(test)]
mod tests;

pub use config::RemuxerConfig;
pub use config_file::RemuxerConfigFile;
pub use error::{RemuxError, Result};
pub use host_quirks::HostQuirks;
pub use observer::{NullObserver, RemuxObserver, TracingObserver};
pub use remux::Remuxer;
pub use types::{RemuxInput, RemuxOutput};
