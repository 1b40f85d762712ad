//! Audio remuxer (`spec.md` §4.4).

use bytes::Bytes;

use crate::clock::normalize;
use crate::config::RemuxerConfig;
use crate::isobmff::fragment::{build_moof, build_sample_data};
use crate::observer::{AllocErrorEvent, RemuxObserver};
use crate::silence::silent_frame;
use crate::types::{AudioCodec, AudioSample, AudioTrack, Mp4Sample, SampleFlags, SinkCapabilities, TrackContainer, TrackRemuxResult};

/// `spec.md` §6.
pub const AAC_SAMPLES_PER_FRAME: i64 = 1024;
/// `spec.md` §6.
pub const MPEG_AUDIO_SAMPLE_PER_FRAME: i64 = 1152;
/// `spec.md` §6.
pub const MAX_SILENT_FRAME_DURATION_MS: f64 = 10_000.0;

pub const AUDIO_TRACK_ID: u32 = 2;

/// Per-track state carried between fragments (`nextAudioPts`,
/// `isAudioContiguous` from `spec.md` §3).
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioRemuxState {
    pub next_audio_pts: Option<i64>,
    pub is_contiguous: bool,
}

/// Which container this fragment's audio belongs in, decided the same way
/// the init-segment generator decides it (`spec.md` §4.2 step 2).
pub fn resolve_container(is_aac: bool, sink: SinkCapabilities) -> TrackContainer {
    if is_aac {
        TrackContainer::Mp4
    } else if sink.mpeg_audio {
        TrackContainer::Mpeg
    } else {
        TrackContainer::Mp4
    }
}

pub struct AudioRemuxContext<'a> {
    pub init_pts: i64,
    pub time_offset: f64,
    pub contiguous: bool,
    pub accurate_time_offset: bool,
    /// `None` when this `remux()` call carried no video track.
    pub video_time_offset: Option<f64>,
    pub sink: SinkCapabilities,
    pub config: &'a RemuxerConfig,
    pub observer: &'a dyn RemuxObserver,
}

/// Remux one fragment's worth of audio samples into `moof`+`mdat` (or, for
/// raw MPEG output, a bare frame concatenation with no box headers at all).
pub fn remux_audio(
    track: &mut AudioTrack,
    state: &mut AudioRemuxState,
    ctx: AudioRemuxContext,
) -> Option<TrackRemuxResult> {
    if track.samples.is_empty() {
        return None;
    }

    let mp4_sample_duration = if track.is_aac {
        AAC_SAMPLES_PER_FRAME
    } else {
        MPEG_AUDIO_SAMPLE_PER_FRAME
    };
    let mp4_timescale = if track.is_aac {
        track.samplerate as i64
    } else {
        track.input_time_scale as i64
    };
    let scale_factor = track.input_time_scale as f64 / mp4_timescale as f64;
    let input_sample_duration = (mp4_sample_duration as f64 * scale_factor).round() as i64;

    let offset_reference = (ctx.time_offset * track.input_time_scale as f64).round() as i64;

    // Contiguity re-evaluation.
    let mut contiguous = ctx.contiguous;
    if let Some(next_audio_pts) = state.next_audio_pts {
        if next_audio_pts > 0 {
            if ctx.accurate_time_offset
                && (offset_reference as f64 - next_audio_pts as f64).abs() < 9000.0
            {
                contiguous = true;
            }
            let normalized_first = normalize(
                track.samples[0].pts - ctx.init_pts,
                Some(offset_reference),
            );
            if (normalized_first - next_audio_pts).abs() < 20 * input_sample_duration {
                contiguous = true;
            }
        }
    }

    // Normalize every sample's PTS.
    for sample in track.samples.iter_mut() {
        sample.pts = normalize(sample.pts - ctx.init_pts, Some(offset_reference));
    }

    // Re-anchor when not contiguous.
    if !contiguous || !matches!(state.next_audio_pts, Some(v) if v >= 0) {
        track.samples.retain(|s| s.pts >= 0);
        if track.samples.is_empty() {
            return None;
        }
        let next_audio_pts = if ctx.video_time_offset == Some(0.0) {
            0
        } else if ctx.accurate_time_offset {
            offset_reference.max(0)
        } else {
            track.samples[0].pts
        };
        state.next_audio_pts = Some(next_audio_pts);
    }

    // Gap/overlap repair, AAC only.
    if track.is_aac {
        let mut next_audio_pts = state.next_audio_pts.unwrap();
        let mut next_pts = next_audio_pts;
        let drift = ctx.config.max_audio_frames_drift as i64 * input_sample_duration;
        let mut i = 0;
        while i < track.samples.len() {
            let delta = track.samples[i].pts - next_pts;
            if delta <= -drift {
                // Legacy behavior: only the head sample re-anchors; later
                // overlaps are a deliberate no-op (`spec.md` §9 Open Questions).
                if i == 0 {
                    next_audio_pts = track.samples[i].pts;
                    next_pts = track.samples[i].pts;
                }
            } else if delta >= drift
                && (delta.abs() as f64) * 1000.0 / track.input_time_scale as f64
                    < MAX_SILENT_FRAME_DURATION_MS
            {
                let mut missing = (delta as f64 / input_sample_duration as f64).round() as i64;
                let mut new_next_pts = track.samples[i].pts - missing * input_sample_duration;
                if new_next_pts < 0 {
                    missing -= 1;
                    new_next_pts += input_sample_duration;
                }
                if i == 0 {
                    next_audio_pts = new_next_pts;
                }
                next_pts = new_next_pts;

                let codec = if track.is_aac { AudioCodec::Aac } else { AudioCodec::Mpeg };
                let filler = silent_frame(codec, track.channel_count)
                    .unwrap_or_else(|| track.samples[i].unit.clone());

                let mut inserted = Vec::with_capacity(missing.max(0) as usize);
                for _ in 0..missing.max(0) {
                    inserted.push(AudioSample {
                        pts: next_pts,
                        dts: next_pts,
                        unit: filler.clone(),
                    });
                    next_pts += input_sample_duration;
                }
                let insert_count = inserted.len();
                track.samples.splice(i..i, inserted);
                i += insert_count;
            }
            track.samples[i].pts = next_pts;
            next_pts += input_sample_duration;
            i += 1;
        }
        state.next_audio_pts = Some(next_audio_pts);
    }

    let container = resolve_container(track.is_aac, ctx.sink);

    // Force an exact join on the first sample of a contiguous AAC fragment.
    if contiguous && track.is_aac {
        track.samples[0].pts = state.next_audio_pts.unwrap();
    }
    for sample in track.samples.iter_mut() {
        sample.dts = sample.pts;
    }

    let n = track.samples.len();
    let first_pts = track.samples[0].pts;

    // Allocate and fill mdat.
    let total_size: usize = track.samples.iter().map(|s| s.unit.len()).sum();
    let mut payload: Vec<u8> = Vec::new();
    if payload.try_reserve_exact(total_size).is_err() {
        ctx.observer.on_alloc_error(&AllocErrorEvent {
            bytes: total_size,
            reason: "mdat allocation failed".to_string(),
            track: "audio",
        });
        return None;
    }
    for sample in &track.samples {
        payload.extend_from_slice(&sample.unit);
    }

    // Per-sample durations, in the mp4 timescale.
    let mut durations = vec![mp4_sample_duration as u32; n];
    for i in 0..n.saturating_sub(1) {
        durations[i] =
            ((track.samples[i + 1].pts - track.samples[i].pts) as f64 / scale_factor).round() as u32;
    }

    let mp4_samples: Vec<Mp4Sample> = (0..n)
        .map(|i| Mp4Sample {
            size: track.samples[i].unit.len() as u32,
            duration: durations[i],
            cts: 0,
            flags: SampleFlags::keyframe(),
        })
        .collect();

    let moof = match container {
        TrackContainer::Mp4 => {
            build_moof(track.sequence_number, first_pts.max(0) as u64, AUDIO_TRACK_ID, &mp4_samples)
        }
        TrackContainer::Mpeg => Bytes::new(),
    };
    let mdat = build_sample_data(container, Bytes::from(payload));

    // Finalize state.
    let last_pts = track.samples[n - 1].pts;
    let last_duration = durations[n - 1];
    let next_audio_pts = last_pts + (scale_factor * last_duration as f64).round() as i64;
    state.next_audio_pts = Some(next_audio_pts);
    state.is_contiguous = true;
    let dropped = track.dropped;
    track.dropped = 0;
    track.sequence_number += 1;
    track.samples.clear();

    let input_time_scale = track.input_time_scale as f64;
    Some(TrackRemuxResult {
        moof,
        mdat,
        start_pts: first_pts as f64 / input_time_scale,
        end_pts: next_audio_pts as f64 / input_time_scale,
        start_dts: first_pts as f64 / input_time_scale,
        end_dts: next_audio_pts as f64 / input_time_scale,
        has_audio: true,
        has_video: false,
        nb_samples: n,
        dropped,
        first_key_frame: None,
        independent: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NullObserver;

    fn aac_track(samples: Vec<AudioSample>) -> AudioTrack {
        AudioTrack {
            pid: 1,
            samples,
            input_time_scale: 90_000,
            timescale: 44_100,
            samplerate: 44_100,
            channel_count: 2,
            codec: "mp4a.40.2".to_string(),
            manifest_codec: None,
            is_aac: true,
            dropped: 0,
            sequence_number: 0,
        }
    }

    fn unit() -> Bytes {
        Bytes::from_static(&[0u8; 8])
    }

    fn ctx<'a>(config: &'a RemuxerConfig, observer: &'a NullObserver) -> AudioRemuxContext<'a> {
        AudioRemuxContext {
            init_pts: 0,
            time_offset: 0.0,
            contiguous: false,
            accurate_time_offset: false,
            video_time_offset: None,
            sink: SinkCapabilities::default(),
            config,
            observer,
        }
    }

    #[test]
    fn empty_track_returns_none() {
        let mut track = aac_track(vec![]);
        let mut state = AudioRemuxState::default();
        let config = RemuxerConfig::default();
        let observer = NullObserver;
        assert!(remux_audio(&mut track, &mut state, ctx(&config, &observer)).is_none());
    }

    #[test]
    fn gap_fill_inserts_silent_frames_matching_scenario_s4() {
        // inputSampleDuration ~= 2089 ticks @ 90kHz for 44.1kHz AAC.
        let input_sample_duration = (1024.0 * 90_000.0 / 44_100.0).round() as i64;
        let samples = vec![
            AudioSample { pts: 0, dts: 0, unit: unit() },
            AudioSample { pts: input_sample_duration, dts: input_sample_duration, unit: unit() },
            AudioSample {
                pts: 2 * input_sample_duration + 10 * input_sample_duration,
                dts: 0,
                unit: unit(),
            },
        ];
        let mut track = aac_track(samples);
        let mut state = AudioRemuxState {
            next_audio_pts: Some(0),
            is_contiguous: true,
        };
        let config = RemuxerConfig::default();
        let observer = NullObserver;
        let result = remux_audio(&mut track, &mut state, ctx(&config, &observer)).unwrap();

        // 3 original + 10 inserted silent frames.
        assert_eq!(result.nb_samples, 13);
    }

    #[test]
    fn overlap_at_head_reanchors_instead_of_dropping() {
        let mut track = aac_track(vec![
            AudioSample { pts: 5000, dts: 0, unit: unit() },
            AudioSample { pts: 7089, dts: 0, unit: unit() },
        ]);
        let mut state = AudioRemuxState {
            next_audio_pts: Some(15_000),
            is_contiguous: true,
        };
        let config = RemuxerConfig::default();
        let observer = NullObserver;
        let result = remux_audio(&mut track, &mut state, ctx(&config, &observer)).unwrap();
        // Both samples survive: the overlap re-anchors rather than drops.
        assert_eq!(result.nb_samples, 2);
    }

    #[test]
    fn raw_mpeg_has_no_box_headers() {
        let mut track = aac_track(vec![
            AudioSample { pts: 0, dts: 0, unit: unit() },
            AudioSample { pts: 3013, dts: 0, unit: unit() },
        ]);
        track.is_aac = false;
        track.codec = "mp3".to_string();
        let mut state = AudioRemuxState::default();
        let config = RemuxerConfig::default();
        let observer = NullObserver;
        let sink = SinkCapabilities { mpeg_audio: true, mp3_in_mp4: false };
        let result = remux_audio(
            &mut track,
            &mut state,
            AudioRemuxContext { sink, ..ctx(&config, &observer) },
        )
        .unwrap();
        assert!(result.moof.is_empty());
        assert_eq!(result.mdat.len(), 16);
    }
}
