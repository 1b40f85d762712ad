//! Minimal end-to-end example: feed two synthetic video fragments through
//! `Remuxer` and log what comes out.

use std::sync::Arc;

use bytes::Bytes;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hls_remux_core::observer::TracingObserver;
use hls_remux_core::types::{
    AudioTrack, Id3Track, PlaylistType, RemuxInput, SinkCapabilities, TextTrack, VideoSample,
    VideoTrack,
};
use hls_remux_core::{Remuxer, RemuxerConfig};

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hls_remux_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn video_sample(pts: i64, dts: i64, key: bool) -> VideoSample {
    VideoSample {
        pts,
        dts,
        key,
        units: vec![Bytes::from_static(&[0u8; 188])],
    }
}

fn main() {
    init_logging();

    let mut remuxer = Remuxer::new(
        Arc::new(TracingObserver),
        RemuxerConfig::default(),
        "Mozilla/5.0 (Macintosh) AppleWebKit/605.1.15",
    );

    let mut audio = AudioTrack::default();
    let mut id3 = Id3Track::default();
    let mut text = TextTrack::default();

    let mut video = VideoTrack {
        pid: 0,
        samples: vec![
            video_sample(3003, 0, true),
            video_sample(6006, 3003, false),
            video_sample(9009, 6006, false),
        ],
        input_time_scale: 90_000,
        timescale: 0,
        codec: "avc1.64001f".to_string(),
        sps: Some(Bytes::from_static(&[0x67, 0x64, 0x00, 0x1F])),
        pps: Some(Bytes::from_static(&[0x68, 0xEB])),
        width: Some(1280),
        height: Some(720),
        dropped: 0,
        sequence_number: 0,
    };

    let fragment = remuxer.remux(RemuxInput {
        audio: &mut audio,
        video: &mut video,
        id3: &mut id3,
        text: &mut text,
        time_offset: 0.0,
        accurate_time_offset: false,
        flush: false,
        playlist_type: PlaylistType::Video,
        sink: SinkCapabilities::default(),
    });

    if let Some(init) = &fragment.init_segment {
        tracing::info!(bytes = init.data.len(), tracks = init.tracks.len(), "init segment emitted");
    }
    if let Some(video_result) = &fragment.video {
        tracing::info!(
            samples = video_result.nb_samples,
            start_dts = video_result.start_dts,
            end_dts = video_result.end_dts,
            "video fragment remuxed"
        );
    }

    video.samples = vec![
        video_sample(12012, 9009, true),
        video_sample(15015, 12012, false),
        video_sample(18018, 15015, false),
    ];

    let second = remuxer.remux(RemuxInput {
        audio: &mut audio,
        video: &mut video,
        id3: &mut id3,
        text: &mut text,
        time_offset: 0.0,
        accurate_time_offset: false,
        flush: true,
        playlist_type: PlaylistType::Video,
        sink: SinkCapabilities::default(),
    });

    if let Some(video_result) = &second.video {
        tracing::info!(
            samples = video_result.nb_samples,
            start_dts = video_result.start_dts,
            end_dts = video_result.end_dts,
            "second video fragment joins the first"
        );
    }
}
