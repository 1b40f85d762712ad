//! Video remuxer (`spec.md` §4.3).

use bytes::Bytes;

use crate::clock::normalize;
use crate::host_quirks::HostQuirks;
use crate::isobmff::fragment::{build_mdat, build_moof};
use crate::observer::{AllocErrorEvent, RemuxObserver};
use crate::types::{Mp4Sample, SampleFlags, TrackRemuxResult, VideoTrack};
use crate::config::RemuxerConfig;

/// `spec.md` §6: `0.2 · 90_000`.
pub const PTS_DTS_SHIFT_TOLERANCE_90KHZ: i64 = 18_000;

pub const VIDEO_TRACK_ID: u32 = 1;

/// Per-track state the orchestrator carries between fragments
/// (`nextAvcDts`, `isVideoContiguous` from `spec.md` §3).
#[derive(Debug, Clone, Copy, Default)]
pub struct VideoRemuxState {
    pub next_avc_dts: Option<i64>,
    pub is_contiguous: bool,
}

/// The earliest presentation timestamp of a fragment's video samples, used
/// both by the init-segment anchor computation (`spec.md` §4.2 step 3) and
/// as the `minPTS` the remuxer reports in its return value.
pub fn video_start_pts(samples: &[crate::types::VideoSample]) -> i64 {
    samples.first().map(|s| s.pts).unwrap_or(0)
}

/// Index of the first keyframe, or `-1` if none (`spec.md` §4.7 step 4).
pub fn first_keyframe_index(samples: &[crate::types::VideoSample]) -> i32 {
    samples
        .iter()
        .position(|s| s.key)
        .map(|i| i as i32)
        .unwrap_or(-1)
}

pub struct VideoRemuxContext<'a> {
    pub init_pts: i64,
    pub time_offset: f64,
    pub contiguous: bool,
    pub audio_track_length: f64,
    pub next_audio_pts: Option<i64>,
    pub config: &'a RemuxerConfig,
    pub quirks: HostQuirks,
    pub observer: &'a dyn RemuxObserver,
    /// Computed by the orchestrator's discontinuity gate before this call
    /// (`spec.md` §4.7 step 4); threaded through untouched.
    pub first_key_frame: i32,
    pub independent: bool,
}

/// Remux one fragment's worth of video samples into `moof`+`mdat`.
/// Returns `None` when there are too few samples or `mdat` allocation fails.
pub fn remux_video(
    track: &mut VideoTrack,
    state: &mut VideoRemuxState,
    ctx: VideoRemuxContext,
) -> Option<TrackRemuxResult> {
    let n = track.samples.len();
    if n < 2 {
        return None;
    }

    // Step A: anchor next DTS.
    let next_dts = if ctx.contiguous && state.next_avc_dts.is_some() {
        state.next_avc_dts.unwrap()
    } else {
        let first = &track.samples[0];
        let cts = first.pts - normalize(first.dts, Some(first.pts));
        (ctx.time_offset * track.timescale as f64).round() as i64 - cts
    };

    // Step B: normalize + detect disorder.
    let mut pts_dts_shift = i64::MAX;
    let mut sort_samples = false;
    let mut prev_dts: Option<i64> = None;
    for sample in track.samples.iter_mut() {
        sample.pts = normalize(sample.pts - ctx.init_pts, Some(next_dts));
        sample.dts = normalize(sample.dts - ctx.init_pts, Some(next_dts));
        pts_dts_shift = (pts_dts_shift.min(sample.pts - sample.dts)).max(-PTS_DTS_SHIFT_TOLERANCE_90KHZ);
        if let Some(prev) = prev_dts {
            if sample.dts < prev {
                sort_samples = true;
            }
        }
        prev_dts = Some(sample.dts);
    }
    if sort_samples {
        track
            .samples
            .sort_by(|a, b| a.dts.cmp(&b.dts).then(a.pts.cmp(&b.pts)));
    }

    // Step C: average duration.
    let mut first_dts = track.samples[0].dts;
    let last_dts = track.samples[n - 1].dts;
    let avg_duration = ((last_dts - first_dts) as f64 / (n - 1) as f64).round() as i64;

    // Step D: PTS<DTS repair.
    if pts_dts_shift < 0 {
        if pts_dts_shift < -2 * avg_duration {
            track.samples[0].pts = track.samples[0].pts.max(track.samples[0].dts);
            for i in 1..n {
                let prev_dts = track.samples[i - 1].dts;
                let pts = track.samples[i].pts;
                let dts = prev_dts.max(pts - avg_duration);
                track.samples[i].dts = dts;
                track.samples[i].pts = pts.max(dts);
            }
        } else {
            for sample in track.samples.iter_mut() {
                sample.dts += pts_dts_shift;
            }
        }
        first_dts = track.samples[0].dts;
    }

    // Step E: inter-fragment hole/overlap.
    if ctx.contiguous {
        let delta = first_dts - next_dts;
        if delta > avg_duration || delta < -1 {
            track.samples[0].pts -= delta;
            track.samples[0].dts = next_dts;
            first_dts = next_dts;
        }
    }

    // Step F: positive DTS clamp.
    if ctx.quirks.requires_positive_dts {
        first_dts = first_dts.max(0);
        track.samples[0].dts = first_dts;
    }

    let min_pts = track.samples.iter().map(|s| s.pts).min().unwrap();
    let max_pts = track.samples.iter().map(|s| s.pts).max().unwrap();

    // Step G: allocate mdat payload.
    let total_size: usize = track
        .samples
        .iter()
        .map(|s| s.units.iter().map(|u| 4 + u.len()).sum::<usize>())
        .sum();
    let mut payload: Vec<u8> = Vec::new();
    if payload.try_reserve_exact(total_size).is_err() {
        ctx.observer.on_alloc_error(&AllocErrorEvent {
            bytes: total_size,
            reason: "mdat allocation failed".to_string(),
            track: "video",
        });
        return None;
    }
    for sample in &track.samples {
        for unit in &sample.units {
            payload.extend_from_slice(&(unit.len() as u32).to_be_bytes());
            payload.extend_from_slice(unit);
        }
    }

    // Step H: per-sample duration.
    let mut durations = vec![0u32; n];
    for i in 0..n - 1 {
        durations[i] = (track.samples[i + 1].dts - track.samples[i].dts) as u32;
    }
    let default_last_duration = if n >= 2 {
        (track.samples[n - 1].dts - track.samples[n - 2].dts) as u32
    } else {
        0
    };
    let mut last_duration = default_last_duration;
    if ctx.config.stretch_short_video_track {
        if let Some(next_audio_pts) = ctx.next_audio_pts {
            let last_pts = track.samples[n - 1].pts;
            let delta_to_frame_end = if ctx.audio_track_length > 0.0 {
                (min_pts as f64 + ctx.audio_track_length * track.timescale as f64).round() as i64
                    - last_pts
            } else {
                next_audio_pts - last_pts
            };
            let gap_tolerance = (ctx.config.max_buffer_hole as f64 * track.timescale as f64).floor() as i64;
            if delta_to_frame_end > gap_tolerance {
                last_duration = (delta_to_frame_end - last_duration as i64).max(last_duration as i64) as u32;
            }
        }
    }
    durations[n - 1] = last_duration;

    // Step I: keyframe workaround.
    let mut flags: Vec<SampleFlags> = track
        .samples
        .iter()
        .map(|s| {
            if s.key {
                SampleFlags::keyframe()
            } else {
                SampleFlags::delta_frame()
            }
        })
        .collect();
    if ctx.quirks.legacy_keyframe_workaround && flags[0].is_non_sync {
        flags[0] = SampleFlags::keyframe();
    }

    let mp4_samples: Vec<Mp4Sample> = (0..n)
        .map(|i| Mp4Sample {
            size: (track.samples[i].units.iter().map(|u| 4 + u.len()).sum::<usize>()) as u32,
            duration: durations[i],
            cts: (track.samples[i].pts - track.samples[i].dts) as i32,
            flags: flags[i],
        })
        .collect();

    let moof = build_moof(
        track.sequence_number,
        first_dts.max(0) as u64,
        VIDEO_TRACK_ID,
        &mp4_samples,
    );
    let mdat = build_mdat(&payload);

    // Step J: finalize state. Re-read the last sample's dts: Step D's
    // repair loop may have rewritten it since `last_dts` was captured.
    let last_dts = track.samples[n - 1].dts;
    let next_avc_dts = last_dts.max(first_dts) + last_duration as i64;
    state.next_avc_dts = Some(next_avc_dts);
    state.is_contiguous = true;
    let dropped = track.dropped;
    track.dropped = 0;
    track.sequence_number += 1;
    let nb_samples = track.samples.len();
    track.samples.clear();

    let timescale = track.timescale as f64;
    Some(TrackRemuxResult {
        moof,
        mdat,
        start_pts: min_pts as f64 / timescale,
        end_pts: (max_pts + last_duration as i64) as f64 / timescale,
        start_dts: first_dts as f64 / timescale,
        end_dts: next_avc_dts as f64 / timescale,
        has_audio: false,
        has_video: true,
        nb_samples,
        dropped,
        first_key_frame: Some(ctx.first_key_frame),
        independent: Some(ctx.independent),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NullObserver;
    use crate::types::VideoSample;

    fn sample(pts: i64, dts: i64, key: bool) -> VideoSample {
        VideoSample {
            pts,
            dts,
            key,
            units: vec![Bytes::from_static(&[0u8; 1000])],
        }
    }

    fn base_track(samples: Vec<VideoSample>) -> VideoTrack {
        VideoTrack {
            pid: 0,
            samples,
            input_time_scale: 90_000,
            timescale: 90_000,
            codec: "avc1.64001f".to_string(),
            sps: Some(Bytes::from_static(&[0x67])),
            pps: Some(Bytes::from_static(&[0x68])),
            width: Some(1280),
            height: Some(720),
            dropped: 0,
            sequence_number: 0,
        }
    }

    fn ctx<'a>(config: &'a RemuxerConfig, observer: &'a NullObserver) -> VideoRemuxContext<'a> {
        VideoRemuxContext {
            init_pts: 0,
            time_offset: 0.0,
            contiguous: false,
            audio_track_length: 0.0,
            next_audio_pts: None,
            config,
            quirks: HostQuirks::default(),
            observer,
            first_key_frame: 0,
            independent: true,
        }
    }

    #[test]
    fn single_sample_track_returns_none() {
        let mut track = base_track(vec![sample(3003, 0, true)]);
        let mut state = VideoRemuxState::default();
        let config = RemuxerConfig::default();
        let observer = NullObserver;
        assert!(remux_video(&mut track, &mut state, ctx(&config, &observer)).is_none());
    }

    #[test]
    fn pure_contiguous_pair_matches_scenario_s1() {
        let mut track = base_track(vec![
            sample(3003, 0, true),
            sample(6006, 3003, false),
            sample(9009, 6006, false),
        ]);
        let mut state = VideoRemuxState::default();
        let config = RemuxerConfig::default();
        let observer = NullObserver;
        let result = remux_video(&mut track, &mut state, ctx(&config, &observer)).unwrap();

        assert_eq!(result.nb_samples, 3);
        assert_eq!(result.start_dts, 0.0);
        assert_eq!(state.next_avc_dts, Some(9009));
        assert!(track.samples.is_empty());
        assert_eq!(track.sequence_number, 1);
    }

    #[test]
    fn rollover_pts_normalizes_into_monotone_pair() {
        use crate::clock::MAX_UINT33;
        let mut track = base_track(vec![
            sample(MAX_UINT33 - 1000, MAX_UINT33 - 4000, true),
            sample(200, MAX_UINT33 - 1000, false),
        ]);
        let mut state = VideoRemuxState::default();
        let config = RemuxerConfig::default();
        let observer = NullObserver;
        let result = remux_video(&mut track, &mut state, ctx(&config, &observer)).unwrap();
        assert!(result.end_dts >= result.start_dts);
    }

    #[test]
    fn mild_pts_lt_dts_shifts_dts_uniformly() {
        // avg = 3003, shift = -3003 which is > -2*avg, so the mild branch applies.
        let mut track = base_track(vec![
            sample(0, 0, true),
            sample(0, 3003, false),
            sample(6006, 6006, false),
        ]);
        let mut state = VideoRemuxState::default();
        let config = RemuxerConfig::default();
        let observer = NullObserver;
        let result = remux_video(&mut track, &mut state, ctx(&config, &observer)).unwrap();
        assert_eq!(result.nb_samples, 3);
        assert!(result.end_dts >= result.start_dts);
    }

    #[test]
    fn severe_branch_next_dts_uses_post_repair_last_sample() {
        // Chosen so `pts_dts_shift < -2 * avg_duration` (avg = 3003) fires
        // the severe repair branch, which collapses every sample's dts to
        // 0 - `last_dts` captured before the repair loop (6006) must not
        // leak into `state.next_avc_dts`.
        let mut track = base_track(vec![
            sample(0, 0, true),
            sample(-4000, 3003, false),
            sample(-8000, 6006, false),
        ]);
        let mut state = VideoRemuxState::default();
        let config = RemuxerConfig::default();
        let observer = NullObserver;
        let result = remux_video(&mut track, &mut state, ctx(&config, &observer)).unwrap();
        assert_eq!(state.next_avc_dts, Some(0));
        assert_eq!(result.end_dts, 0.0);
    }

    #[test]
    fn first_keyframe_index_finds_correct_sample() {
        let samples = vec![sample(0, 0, false), sample(1, 1, false), sample(2, 2, true)];
        assert_eq!(first_keyframe_index(&samples), 2);
    }

    #[test]
    fn first_keyframe_index_returns_negative_one_when_absent() {
        let samples = vec![sample(0, 0, false)];
        assert_eq!(first_keyframe_index(&samples), -1);
    }
}
