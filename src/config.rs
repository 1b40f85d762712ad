//! Remuxer tuning knobs (`spec.md` §6, "Config fields consumed").

use serde::{Deserialize, Serialize};

/// Config fields consumed by the remuxer core.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RemuxerConfig {
    /// Drop leading non-keyframe video samples on a discontinuity so every
    /// independently-appendable fragment starts on a keyframe.
    pub force_key_frame_on_discontinuity: bool,

    /// Widen a video track's last sample duration to cover a short track
    /// relative to its paired audio track.
    pub stretch_short_video_track: bool,

    /// Largest inter-fragment video hole, in seconds, absorbed without
    /// triggering the "stretch short video track" last-sample widening.
    pub max_buffer_hole: f32,

    /// Largest audio PTS drift, in whole frames, before a gap is filled
    /// with silence or an overlap re-anchors the track.
    pub max_audio_frames_drift: u32,
}

impl Default for RemuxerConfig {
    fn default() -> Self {
        Self {
            force_key_frame_on_discontinuity: true,
            stretch_short_video_track: false,
            max_buffer_hole: 0.5,
            max_audio_frames_drift: 1,
        }
    }
}
