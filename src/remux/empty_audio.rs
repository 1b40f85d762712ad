//! Empty-audio synthesizer (`spec.md` §4.5): fills a silent AAC track
//! spanning a video fragment when no audio samples arrived.

use crate::types::{AudioCodec, AudioSample, AudioTrack, TrackRemuxResult};

use super::audio::{remux_audio, AudioRemuxContext, AudioRemuxState, AAC_SAMPLES_PER_FRAME};

/// Synthesize and remux a silent audio segment covering
/// `[start_dts, end_dts]` seconds of a video fragment.
///
/// Returns `None` (logged only, per `spec.md` §4.5/§7) when no silent
/// frame is available for the track's codec.
pub fn remux_empty_audio(
    track: &mut AudioTrack,
    state: &mut AudioRemuxState,
    init_dts: i64,
    start_dts_seconds: f64,
    end_dts_seconds: f64,
    ctx: AudioRemuxContext,
) -> Option<TrackRemuxResult> {
    let codec = if track.is_aac { AudioCodec::Aac } else { AudioCodec::Mpeg };
    let Some(filler) = crate::silence::silent_frame(codec, track.channel_count) else {
        tracing::warn!(track = "audio", "no silent frame available for empty-audio synthesis, skipping");
        return None;
    };

    let scale_factor = track.input_time_scale as f64 / track.samplerate.max(1) as f64;
    let frame_duration = (scale_factor * AAC_SAMPLES_PER_FRAME as f64).round() as i64;

    let start = match state.next_audio_pts {
        Some(next) => next + init_dts,
        None => (start_dts_seconds * track.input_time_scale as f64).round() as i64 + init_dts,
    };
    let end = (end_dts_seconds * track.input_time_scale as f64).round() as i64 + init_dts;

    if end <= start || frame_duration <= 0 {
        return None;
    }

    let frame_count = ((end - start) as f64 / frame_duration as f64).ceil() as i64;
    track.samples = (0..frame_count)
        .map(|i| {
            let pts = start + i * frame_duration;
            AudioSample {
                pts,
                dts: pts,
                unit: filler.clone(),
            }
        })
        .collect();

    remux_audio(track, state, ctx)
}
