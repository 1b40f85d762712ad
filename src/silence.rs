//! Silent-frame synthesis for gap filling (`spec.md` §4.4/§4.5).
//!
//! The spec treats this as an external pure function per codec; this module
//! provides a small constant table of precomputed silent AAC frames (one
//! per common channel count) so the crate is self-contained. A host that
//! already owns a more complete table can swap in its own
//! `Fn(AudioCodec, u8) -> Option<Bytes>` at the call site.

use bytes::Bytes;

use crate::types::AudioCodec;

/// A silent AAC-LC frame at 44.1/48 kHz, mono. Matches the raw-AAC-frame
/// (no ADTS header) contract the audio remuxer writes into `mdat`.
const AAC_SILENT_MONO: &[u8] = &[
    0x01, 0x40, 0x20, 0x04, 0x1c, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// A silent AAC-LC frame, stereo.
const AAC_SILENT_STEREO: &[u8] = &[
    0x21, 0x00, 0x49, 0x90, 0x02, 0x19, 0x00, 0x23, 0x80,
];

/// Look up a precomputed silent frame for `codec`/`channels`.
///
/// Returns `None` when no canned frame exists for the combination; callers
/// fall back to duplicating the previous sample's bytes (`spec.md` §4.4).
pub fn silent_frame(codec: AudioCodec, channels: u8) -> Option<Bytes> {
    match codec {
        AudioCodec::Aac => match channels {
            1 => Some(Bytes::from_static(AAC_SILENT_MONO)),
            2 => Some(Bytes::from_static(AAC_SILENT_STEREO)),
            _ => None,
        },
        AudioCodec::Mpeg => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_aac_channel_counts_return_bytes() {
        assert!(silent_frame(AudioCodec::Aac, 1).is_some());
        assert!(silent_frame(AudioCodec::Aac, 2).is_some());
    }

    #[test]
    fn unknown_channel_count_falls_back() {
        assert!(silent_frame(AudioCodec::Aac, 6).is_none());
    }

    #[test]
    fn mpeg_has_no_canned_frame() {
        assert!(silent_frame(AudioCodec::Mpeg, 2).is_none());
    }
}
