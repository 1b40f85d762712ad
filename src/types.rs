//! Input/output data model for the remuxer core (`spec.md` §3).

use bytes::Bytes;

/// One AVC access unit, carried as a list of already-extracted NAL units.
#[derive(Debug, Clone)]
pub struct VideoSample {
    pub pts: i64,
    pub dts: i64,
    pub key: bool,
    pub units: Vec<Bytes>,
}

/// One AAC or MPEG audio frame.
#[derive(Debug, Clone)]
pub struct AudioSample {
    pub pts: i64,
    pub dts: i64,
    pub unit: Bytes,
}

/// One timed-ID3 metadata cue.
#[derive(Debug, Clone)]
pub struct Id3Sample {
    pub pts: i64,
    pub dts: i64,
    pub data: Bytes,
}

/// CEA-608/708 user-data cue kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserDataKind {
    Cea608,
    Cea708,
}

/// One caption cue extracted from picture user-data.
#[derive(Debug, Clone)]
pub struct UserDataSample {
    pub pts: i64,
    pub data: Bytes,
    pub kind: UserDataKind,
}

/// A demuxed video track, as handed to the remuxer for one fragment.
#[derive(Debug, Clone)]
pub struct VideoTrack {
    /// `-1` if the demuxer never observed this elementary stream.
    pub pid: i32,
    pub samples: Vec<VideoSample>,
    pub input_time_scale: u32,
    /// mp4 timescale selected by the init-segment generator; equals
    /// `input_time_scale` once the track has been initialized (`spec.md` §4.2).
    pub timescale: u32,
    pub codec: String,
    pub sps: Option<Bytes>,
    pub pps: Option<Bytes>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub dropped: u32,
    pub sequence_number: u32,
}

impl VideoTrack {
    pub fn has_decoder_config(&self) -> bool {
        self.sps.is_some() && self.pps.is_some()
    }
}

/// `pid` defaults to `-1` ("no elementary stream observed"), matching the
/// sentinel `Remuxer::remux` checks via `pid > -1`.
impl Default for VideoTrack {
    fn default() -> Self {
        Self {
            pid: -1,
            samples: Vec::new(),
            input_time_scale: 0,
            timescale: 0,
            codec: String::new(),
            sps: None,
            pps: None,
            width: None,
            height: None,
            dropped: 0,
            sequence_number: 0,
        }
    }
}

/// A demuxed audio track, as handed to the remuxer for one fragment.
#[derive(Debug, Clone)]
pub struct AudioTrack {
    pub pid: i32,
    pub samples: Vec<AudioSample>,
    pub input_time_scale: u32,
    pub timescale: u32,
    pub samplerate: u32,
    pub channel_count: u8,
    pub codec: String,
    pub manifest_codec: Option<String>,
    pub is_aac: bool,
    pub dropped: u32,
    pub sequence_number: u32,
}

impl AudioTrack {
    pub fn has_decoder_config(&self) -> bool {
        self.samplerate > 0
    }
}

/// `pid` defaults to `-1` ("no elementary stream observed"), matching the
/// sentinel `Remuxer::remux` checks via `pid > -1`.
impl Default for AudioTrack {
    fn default() -> Self {
        Self {
            pid: -1,
            samples: Vec::new(),
            input_time_scale: 0,
            timescale: 0,
            samplerate: 0,
            channel_count: 0,
            codec: String::new(),
            manifest_codec: None,
            is_aac: false,
            dropped: 0,
            sequence_number: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Id3Track {
    pub pid: i32,
    pub samples: Vec<Id3Sample>,
}

#[derive(Debug, Clone, Default)]
pub struct TextTrack {
    pub pid: i32,
    pub samples: Vec<UserDataSample>,
}

/// Which container a track's media segments use (`spec.md` §4.2 step 2).
/// Video and AAC/mp3 audio are always `Mp4`; raw (non-AAC, non-mp3-in-mp4)
/// MPEG audio uses `Mpeg`, which has no init segment and no `mdat` box
/// header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackContainer {
    Mp4,
    Mpeg,
}

/// Which audio codec a sample/track carries, for silent-frame lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    Aac,
    Mpeg,
}

/// 2-bit `sample_depends_on` field of an ISO BMFF sample-flags word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependsOn {
    Unknown = 0,
    DependsOnOthers = 1,
    DoesNotDependOnOthers = 2,
}

/// Per-sample `trun` flags (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleFlags {
    pub depends_on: DependsOn,
    pub is_non_sync: bool,
}

impl SampleFlags {
    pub fn keyframe() -> Self {
        Self {
            depends_on: DependsOn::DoesNotDependOnOthers,
            is_non_sync: false,
        }
    }

    pub fn delta_frame() -> Self {
        Self {
            depends_on: DependsOn::DependsOnOthers,
            is_non_sync: true,
        }
    }

    /// Pack into the 32-bit word `trun`/`tfhd` expect.
    pub fn to_u32(self) -> u32 {
        ((self.depends_on as u32) << 24) | ((self.is_non_sync as u32) << 16)
    }
}

/// One output sample, ready to be written into a `trun` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mp4Sample {
    pub size: u32,
    pub duration: u32,
    pub cts: i32,
    pub flags: SampleFlags,
}

/// Result of remuxing one track for one fragment (`spec.md` §4.3/§4.4 "Return").
#[derive(Debug, Clone)]
pub struct TrackRemuxResult {
    pub moof: Bytes,
    pub mdat: Bytes,
    pub start_pts: f64,
    pub end_pts: f64,
    pub start_dts: f64,
    pub end_dts: f64,
    pub has_audio: bool,
    pub has_video: bool,
    pub nb_samples: usize,
    pub dropped: u32,
    /// Video only: index of the first in-gate keyframe, `-1` if none found.
    pub first_key_frame: Option<i32>,
    /// Video only: whether the fragment can be appended without a preceding one.
    pub independent: Option<bool>,
}

/// One `trak` worth of init-segment metadata (`spec.md` §4.2 step 4).
#[derive(Debug, Clone)]
pub struct TrackInitInfo {
    pub id: String,
    pub container: TrackContainer,
    pub codec: String,
    pub channel_count: Option<u8>,
}

/// Result of generating (or re-generating) the init segment.
#[derive(Debug, Clone)]
pub struct InitSegmentResult {
    pub data: Bytes,
    pub tracks: Vec<TrackInitInfo>,
    pub init_pts: i64,
}

/// One rebased ID3 cue, ready for the playback controller.
#[derive(Debug, Clone)]
pub struct Id3CueOut {
    pub pts: f64,
    pub dts: f64,
    pub data: Bytes,
}

/// One rebased caption cue, ready for the text-track renderer.
#[derive(Debug, Clone)]
pub struct UserDataCueOut {
    pub pts: f64,
    pub data: Bytes,
    pub kind: UserDataKind,
}

/// Which playlist this fragment belongs to (`spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistType {
    Audio,
    Video,
    Subtitle,
}

/// Sink MIME/codec capability flags (`spec.md` §4.2 step 2, "`typeSupported`").
#[derive(Debug, Clone, Copy, Default)]
pub struct SinkCapabilities {
    /// The sink can play a raw `audio/mpeg` byte stream directly.
    pub mpeg_audio: bool,
    /// The sink accepts `mp3` packaged inside an MP4 container.
    pub mp3_in_mp4: bool,
}

/// Everything `remux()` needs for a single fragment (`spec.md` §6).
pub struct RemuxInput<'a> {
    pub audio: &'a mut AudioTrack,
    pub video: &'a mut VideoTrack,
    pub id3: &'a mut Id3Track,
    pub text: &'a mut TextTrack,
    pub time_offset: f64,
    pub accurate_time_offset: bool,
    pub flush: bool,
    pub playlist_type: PlaylistType,
    pub sink: SinkCapabilities,
}

/// Everything `remux()` returns for a single fragment (`spec.md` §6).
#[derive(Debug, Clone, Default)]
pub struct RemuxOutput {
    pub audio: Option<TrackRemuxResult>,
    pub video: Option<TrackRemuxResult>,
    pub init_segment: Option<InitSegmentResult>,
    pub independent: Option<bool>,
    pub text: Option<Vec<UserDataCueOut>>,
    pub id3: Option<Vec<Id3CueOut>>,
}

impl Default for InitSegmentResult {
    fn default() -> Self {
        Self {
            data: Bytes::new(),
            tracks: Vec::new(),
            init_pts: 0,
        }
    }
}
