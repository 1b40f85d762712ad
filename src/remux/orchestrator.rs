//! Top-level orchestrator (`spec.md` §4.7, §6). `Remuxer` is the crate's
//! single public entry point.

use std::sync::Arc;

use crate::clock::normalize;
use crate::config::RemuxerConfig;
use crate::host_quirks::HostQuirks;
use crate::observer::RemuxObserver;
use crate::types::{RemuxInput, RemuxOutput};

use super::audio::{remux_audio, AudioRemuxContext, AudioRemuxState};
use super::cues::{flush_id3_cues, flush_user_data_cues};
use super::empty_audio::remux_empty_audio;
use super::init_segment::{self, InitAnchors};
use super::video::{first_keyframe_index, remux_video, video_start_pts, VideoRemuxContext, VideoRemuxState};

/// The remuxer core: one instance per playback session (`spec.md` §2, §5).
/// Single-owner, `&mut self` on every mutating call — no `Mutex`/`Arc`
/// wrapping needed since the core performs no I/O of its own.
pub struct Remuxer {
    observer: Arc<dyn RemuxObserver>,
    config: RemuxerConfig,
    quirks: HostQuirks,
    anchors: Option<InitAnchors>,
    is_generated: bool,
    has_audio_track: bool,
    has_video_track: bool,
    video_state: VideoRemuxState,
    audio_state: AudioRemuxState,
}

impl Remuxer {
    pub fn new(observer: Arc<dyn RemuxObserver>, config: RemuxerConfig, vendor: &str) -> Self {
        Self {
            observer,
            config,
            quirks: HostQuirks::detect(vendor),
            anchors: None,
            is_generated: false,
            has_audio_track: false,
            has_video_track: false,
            video_state: VideoRemuxState::default(),
            audio_state: AudioRemuxState::default(),
        }
    }

    /// Remux one fragment's worth of demuxed samples (`spec.md` §4.7).
    pub fn remux(&mut self, mut input: RemuxInput) -> RemuxOutput {
        let mut output = RemuxOutput::default();

        let has_audio = input.audio.pid > -1;
        let has_video = input.video.pid > -1;
        let enough_audio = !input.audio.samples.is_empty();
        let enough_video = input.video.samples.len() > 1;

        // Step 2: proceed gate.
        let proceed = ((!has_audio || enough_audio) && (!has_video || enough_video))
            || self.is_generated
            || input.flush;
        if !proceed {
            return output;
        }

        // Step 3: init-segment generation / re-generation.
        self.maybe_generate_init_segment(&mut input, &mut output);

        // Step 4: forced keyframe on discontinuity. Always compute `kf` for
        // reporting; only drop leading samples when the gate opens.
        let mut video_time_offset = input.time_offset;
        let mut audio_time_offset = input.time_offset;
        let kf = if enough_video {
            let kf = first_keyframe_index(&input.video.samples);
            if !self.video_state.is_contiguous && self.config.force_key_frame_on_discontinuity && kf > 0 {
                let video_start = video_start_pts(&input.video.samples);
                let dropped_pts = input.video.samples[kf as usize].pts;
                input.video.samples.drain(0..kf as usize);
                input.video.dropped += kf as u32;
                video_time_offset += (dropped_pts - video_start) as f64
                    / input.video.timescale.max(1) as f64;
            }
            kf
        } else {
            -1
        };
        let independent = kf != -1;

        // Step 5: AV start-time alignment.
        if enough_audio && enough_video {
            let video_start = video_start_pts(&input.video.samples);
            let ts_delta = normalize(input.audio.samples[0].pts, Some(video_start)) - video_start;
            let delta_seconds = ts_delta as f64 / input.video.input_time_scale.max(1) as f64;
            audio_time_offset += delta_seconds.max(0.0);
            video_time_offset += (-delta_seconds).max(0.0);
        }

        // Step 6: audio before video.
        if enough_audio {
            if !self.has_audio_track && input.audio.has_decoder_config() {
                self.maybe_generate_init_segment(&mut input, &mut output);
            }
            let ctx = AudioRemuxContext {
                init_pts: self.anchors.map(|a| a.init_pts).unwrap_or(0),
                time_offset: audio_time_offset,
                contiguous: self.audio_state.is_contiguous,
                accurate_time_offset: input.accurate_time_offset,
                video_time_offset: if has_video { Some(video_time_offset) } else { None },
                sink: input.sink,
                config: &self.config,
                observer: self.observer.as_ref(),
            };
            output.audio = remux_audio(input.audio, &mut self.audio_state, ctx);
        } else if has_video && enough_video {
            // No audio samples arrived this fragment: synthesize silence
            // spanning the video fragment (`spec.md` §4.5, component 5).
            //
            // `remux_empty_audio` re-adds `init_dts` to recover an absolute
            // tick value (it expects `startDts`/`endDts` in the same "seconds
            // since session start" form `TrackRemuxResult` reports), so the
            // anchor subtracted here must be `init_dts`, not `init_pts` -
            // subtracting `init_pts` here and then `remux_audio` subtracting
            // `ctx.init_pts` again on delegation would double-count it.
            let init_pts = self.anchors.map(|a| a.init_pts).unwrap_or(0);
            let init_dts = self.anchors.map(|a| a.init_dts).unwrap_or(0);
            let first_video_dts = input.video.samples[0].dts;
            let last_video_dts = input.video.samples[input.video.samples.len() - 1].dts;
            let normalized_first = normalize(first_video_dts - init_dts, None);
            let normalized_last = normalize(last_video_dts - init_dts, Some(normalized_first));
            let timescale = input.video.input_time_scale.max(1) as f64;
            let ctx = AudioRemuxContext {
                init_pts,
                time_offset: audio_time_offset,
                contiguous: self.audio_state.is_contiguous,
                accurate_time_offset: input.accurate_time_offset,
                video_time_offset: Some(video_time_offset),
                sink: input.sink,
                config: &self.config,
                observer: self.observer.as_ref(),
            };
            output.audio = remux_empty_audio(
                input.audio,
                &mut self.audio_state,
                init_dts,
                normalized_first as f64 / timescale,
                normalized_last as f64 / timescale,
                ctx,
            );
        }

        if enough_video {
            if !self.has_video_track && input.video.has_decoder_config() {
                self.maybe_generate_init_segment(&mut input, &mut output);
            }
            let audio_track_length = output
                .audio
                .as_ref()
                .map(|r| r.end_pts - r.start_pts)
                .unwrap_or(0.0);
            let ctx = VideoRemuxContext {
                init_pts: self.anchors.map(|a| a.init_pts).unwrap_or(0),
                time_offset: video_time_offset,
                contiguous: self.video_state.is_contiguous,
                audio_track_length,
                next_audio_pts: self.audio_state.next_audio_pts,
                config: &self.config,
                quirks: self.quirks,
                observer: self.observer.as_ref(),
                first_key_frame: kf,
                independent,
            };
            output.video = remux_video(input.video, &mut self.video_state, ctx);
        }

        output.independent = Some(independent);

        // Step 7: flush cues once the init segment has been emitted.
        if self.is_generated {
            if let Some(anchors) = self.anchors {
                output.id3 = Some(flush_id3_cues(
                    input.id3,
                    anchors.init_pts,
                    anchors.init_dts,
                    input.time_offset,
                    input.audio.input_time_scale.max(input.video.input_time_scale).max(90_000),
                ));
                output.text = Some(flush_user_data_cues(
                    input.text,
                    anchors.init_pts,
                    input.time_offset,
                    input.video.input_time_scale.max(90_000),
                ));
            }
        }

        output
    }

    fn maybe_generate_init_segment(&mut self, input: &mut RemuxInput, output: &mut RemuxOutput) {
        if !self.is_generated {
            if let Some(init) = init_segment::generate(
                input.audio,
                input.video,
                input.time_offset,
                input.sink,
                &mut self.anchors,
            ) {
                self.has_audio_track = init.tracks.iter().any(|t| t.id == "audio");
                self.has_video_track = init.tracks.iter().any(|t| t.id == "main");
                self.is_generated = true;
                output.init_segment = Some(init);
            }
            return;
        }

        let audio_needs_regen =
            !self.has_audio_track && input.audio.has_decoder_config() && !input.audio.samples.is_empty();
        let video_needs_regen =
            !self.has_video_track && input.video.has_decoder_config() && !input.video.samples.is_empty();
        if audio_needs_regen || video_needs_regen {
            if let Some(init) = init_segment::generate(
                input.audio,
                input.video,
                input.time_offset,
                input.sink,
                &mut self.anchors,
            ) {
                self.has_audio_track = init.tracks.iter().any(|t| t.id == "audio");
                self.has_video_track = init.tracks.iter().any(|t| t.id == "main");
                output.init_segment = Some(init);
            }
        }
    }

    /// Reset both session anchors to `v` (`spec.md` §6).
    pub fn reset_time_stamp(&mut self, v: i64) {
        self.anchors = Some(InitAnchors {
            init_pts: v,
            init_dts: v,
        });
    }

    /// Clear both contiguity flags (`spec.md` §6).
    pub fn reset_next_timestamp(&mut self) {
        self.video_state.is_contiguous = false;
        self.audio_state.is_contiguous = false;
    }

    /// Force re-emission of the init segment on the next `remux()` call
    /// (`spec.md` §6, e.g. on codec change).
    pub fn reset_init_segment(&mut self) {
        self.is_generated = false;
        self.has_audio_track = false;
        self.has_video_track = false;
    }
}
