//! Init-segment generator (`spec.md` §4.2).

use crate::isobmff::init::{build_init_segment, AudioTrackDescriptor, VideoTrackDescriptor};
use crate::types::{
    AudioTrack, InitSegmentResult, SinkCapabilities, TrackContainer, TrackInitInfo, VideoTrack,
};

/// Session-anchor timestamps, computed once per track configuration and
/// immutable until `Remuxer::reset_time_stamp` (`spec.md` §3).
#[derive(Debug, Clone, Copy)]
pub struct InitAnchors {
    pub init_pts: i64,
    pub init_dts: i64,
}

/// Compute anchors (if not already computed) and, if at least one track
/// qualifies, build and return the init segment. Mutates `audio.timescale`
/// / `video.timescale` as a side effect (`spec.md` §4.2 steps 2-3).
pub fn generate(
    audio: &mut AudioTrack,
    video: &mut VideoTrack,
    time_offset: f64,
    sink: SinkCapabilities,
    anchors: &mut Option<InitAnchors>,
) -> Option<InitSegmentResult> {
    let computing_anchors = anchors.is_none();
    let mut init_pts = anchors.map(|a| a.init_pts);
    let mut init_dts = anchors.map(|a| a.init_dts);

    let mut tracks = Vec::new();
    let mut audio_descriptor = None;
    let mut video_descriptor = None;

    if audio.has_decoder_config() && !audio.samples.is_empty() {
        audio.timescale = audio.samplerate;

        let (container, codec) = if audio.is_aac {
            (TrackContainer::Mp4, audio.codec.clone())
        } else if sink.mpeg_audio {
            (TrackContainer::Mpeg, String::new())
        } else if sink.mp3_in_mp4 {
            (TrackContainer::Mp4, "mp3".to_string())
        } else {
            (TrackContainer::Mp4, audio.codec.clone())
        };

        if container == TrackContainer::Mp4 {
            audio_descriptor = Some(AudioTrackDescriptor {
                timescale: audio.timescale,
                channel_count: audio.channel_count,
                sample_rate: audio.samplerate,
                object_type: 2,
            });
        }

        tracks.push(TrackInitInfo {
            id: "audio".to_string(),
            container,
            codec,
            channel_count: Some(audio.channel_count),
        });

        if computing_anchors {
            let offset = (audio.input_time_scale as f64 * time_offset).round() as i64;
            let anchor = audio.samples[0].pts - offset;
            init_pts = Some(anchor);
            init_dts = Some(anchor);
        }
    }

    if video.has_decoder_config() && !video.samples.is_empty() {
        video.timescale = video.input_time_scale;

        tracks.push(TrackInitInfo {
            id: "main".to_string(),
            container: TrackContainer::Mp4,
            codec: video.codec.clone(),
            channel_count: None,
        });

        video_descriptor = Some(VideoTrackDescriptor {
            timescale: video.timescale,
            width: video.width.unwrap_or(0) as u16,
            height: video.height.unwrap_or(0) as u16,
            sps: video.sps.clone().unwrap_or_default(),
            pps: video.pps.clone().unwrap_or_default(),
        });

        if computing_anchors {
            let start_pts = super::video::video_start_pts(&video.samples);
            let start_offset = (video.input_time_scale as f64 * time_offset).round() as i64;
            let video_dts = crate::clock::normalize(video.samples[0].dts, Some(start_pts));
            let candidate_dts = video_dts - start_offset;
            let candidate_pts = start_pts - start_offset;
            init_dts = Some(init_dts.map_or(candidate_dts, |d| d.min(candidate_dts)));
            init_pts = Some(init_pts.map_or(candidate_pts, |p| p.min(candidate_pts)));
        }
    }

    if tracks.is_empty() {
        return None;
    }

    let (init_pts, init_dts) = (init_pts.unwrap(), init_dts.unwrap());
    *anchors = Some(InitAnchors { init_pts, init_dts });

    let data = build_init_segment(video_descriptor.as_ref(), audio_descriptor.as_ref());

    Some(InitSegmentResult {
        data,
        tracks,
        init_pts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AudioSample, VideoSample};
    use bytes::Bytes;

    fn video_track_with_one_sample() -> VideoTrack {
        VideoTrack {
            pid: 0,
            samples: vec![VideoSample {
                pts: 3003,
                dts: 0,
                key: true,
                units: vec![Bytes::from_static(&[0u8; 10])],
            }],
            input_time_scale: 90_000,
            timescale: 0,
            codec: "avc1.64001f".to_string(),
            sps: Some(Bytes::from_static(&[0x67, 0x64, 0x00, 0x1F])),
            pps: Some(Bytes::from_static(&[0x68, 0xEB])),
            width: Some(1280),
            height: Some(720),
            dropped: 0,
            sequence_number: 0,
        }
    }

    fn audio_track_with_one_sample() -> AudioTrack {
        AudioTrack {
            pid: 1,
            samples: vec![AudioSample {
                pts: 0,
                dts: 0,
                unit: Bytes::from_static(&[0u8; 8]),
            }],
            input_time_scale: 90_000,
            timescale: 0,
            samplerate: 44_100,
            channel_count: 2,
            codec: "mp4a.40.2".to_string(),
            manifest_codec: None,
            is_aac: true,
            dropped: 0,
            sequence_number: 0,
        }
    }

    #[test]
    fn both_tracks_present_produce_two_track_entries() {
        let mut audio = audio_track_with_one_sample();
        let mut video = video_track_with_one_sample();
        let mut anchors = None;
        let sink = SinkCapabilities::default();

        let result = generate(&mut audio, &mut video, 0.0, sink, &mut anchors).unwrap();

        assert_eq!(result.tracks.len(), 2);
        assert!(anchors.is_some());
        assert_eq!(audio.timescale, 44_100);
        assert_eq!(video.timescale, 90_000);
    }

    #[test]
    fn incomplete_tracks_return_none() {
        let mut audio = AudioTrack::default();
        let mut video = VideoTrack::default();
        let mut anchors = None;
        let result = generate(&mut audio, &mut video, 0.0, SinkCapabilities::default(), &mut anchors);
        assert!(result.is_none());
        assert!(anchors.is_none());
    }

    #[test]
    fn anchors_not_recomputed_once_set() {
        let mut audio = audio_track_with_one_sample();
        let mut video = VideoTrack::default();
        let mut anchors = Some(InitAnchors {
            init_pts: 999,
            init_dts: 999,
        });
        let result = generate(&mut audio, &mut video, 0.0, SinkCapabilities::default(), &mut anchors).unwrap();
        assert_eq!(result.init_pts, 999);
    }

    #[test]
    fn raw_mpeg_with_supporting_sink_has_no_mp4_audio_descriptor() {
        let mut audio = audio_track_with_one_sample();
        audio.is_aac = false;
        audio.codec = "mp3".to_string();
        let mut video = VideoTrack::default();
        let mut anchors = None;
        let sink = SinkCapabilities {
            mpeg_audio: true,
            mp3_in_mp4: false,
        };
        let result = generate(&mut audio, &mut video, 0.0, sink, &mut anchors).unwrap();
        assert_eq!(result.tracks[0].container, TrackContainer::Mpeg);
        assert!(result.tracks[0].codec.is_empty());
    }
}
