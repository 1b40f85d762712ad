//! `ftyp` + `moov` initialization-segment construction (`spec.md` §4.2,
//! §6 "Init segment format").

use bytes::{BufMut, Bytes, BytesMut};

use super::{write_box, write_full_box};

pub const VIDEO_TRACK_ID: u32 = 1;
pub const AUDIO_TRACK_ID: u32 = 2;

/// What the box writer needs to know about a video track to build its
/// `trak` + `avcC`.
#[derive(Debug, Clone)]
pub struct VideoTrackDescriptor {
    pub timescale: u32,
    pub width: u16,
    pub height: u16,
    pub sps: Bytes,
    pub pps: Bytes,
}

/// What the box writer needs to know about an audio track to build its
/// `trak` + `esds`.
#[derive(Debug, Clone)]
pub struct AudioTrackDescriptor {
    pub timescale: u32,
    pub channel_count: u8,
    pub sample_rate: u32,
    /// MPEG-4 audio object type, 2 = AAC-LC.
    pub object_type: u8,
}

/// Build a complete `ftyp`+`moov` init segment for the given tracks.
/// At least one of `video`/`audio` must be `Some`, matching
/// `spec.md` §4.2 step 4 ("If at least one track was recorded").
pub fn build_init_segment(
    video: Option<&VideoTrackDescriptor>,
    audio: Option<&AudioTrackDescriptor>,
) -> Bytes {
    let mut buf = BytesMut::new();
    write_ftyp(&mut buf);
    write_moov(&mut buf, video, audio);
    buf.freeze()
}

fn write_ftyp(buf: &mut BytesMut) {
    write_box(buf, b"ftyp", |buf| {
        buf.put_slice(b"isom"); // major_brand
        buf.put_u32(512); // minor_version
        for brand in [b"isom", b"iso6", b"mp41"] {
            buf.put_slice(brand);
        }
    });
}

fn write_moov(
    buf: &mut BytesMut,
    video: Option<&VideoTrackDescriptor>,
    audio: Option<&AudioTrackDescriptor>,
) {
    write_box(buf, b"moov", |buf| {
        write_mvhd(buf, next_track_id(video, audio));
        if let Some(v) = video {
            write_video_trak(buf, v);
        }
        if let Some(a) = audio {
            write_audio_trak(buf, a);
        }
        write_mvex(buf, video.is_some(), audio.is_some());
    });
}

fn next_track_id(video: Option<&VideoTrackDescriptor>, audio: Option<&AudioTrackDescriptor>) -> u32 {
    match (video.is_some(), audio.is_some()) {
        (true, _) => VIDEO_TRACK_ID.max(AUDIO_TRACK_ID) + 1,
        (false, true) => AUDIO_TRACK_ID + 1,
        (false, false) => 1,
    }
}

fn write_mvhd(buf: &mut BytesMut, next_track_id: u32) {
    write_full_box(buf, b"mvhd", 0, 0, |buf| {
        buf.put_u32(0); // creation_time
        buf.put_u32(0); // modification_time
        buf.put_u32(1000); // timescale: arbitrary movie-level clock, tracks carry their own
        buf.put_u32(0); // duration: unknown for fMP4
        buf.put_u32(0x0001_0000); // rate 1.0
        buf.put_u16(0x0100); // volume 1.0
        buf.put_u16(0); // reserved
        buf.put_u64(0); // reserved[2]
        write_identity_matrix(buf);
        for _ in 0..6 {
            buf.put_u32(0); // pre_defined
        }
        buf.put_u32(next_track_id);
    });
}

fn write_identity_matrix(buf: &mut BytesMut) {
    const MATRIX: [i32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];
    for v in MATRIX {
        buf.put_i32(v);
    }
}

fn write_video_trak(buf: &mut BytesMut, v: &VideoTrackDescriptor) {
    write_box(buf, b"trak", |buf| {
        write_tkhd(buf, VIDEO_TRACK_ID, Some((v.width, v.height)));
        write_box(buf, b"mdia", |buf| {
            write_mdhd(buf, v.timescale);
            write_hdlr(buf, b"vide", "VideoHandler");
            write_box(buf, b"minf", |buf| {
                write_box(buf, b"vmhd", |buf| {
                    // full box header written manually: flags=1 is conventional for vmhd
                    buf.put_u32(0x0000_0001);
                    buf.put_u16(0); // graphicsmode
                    buf.put_u16(0); // opcolor[0]
                    buf.put_u16(0); // opcolor[1]
                    buf.put_u16(0); // opcolor[2]
                });
                write_dinf(buf);
                write_box(buf, b"stbl", |buf| {
                    write_box(buf, b"stsd", |buf| {
                        buf.put_u32(0); // version+flags
                        buf.put_u32(1); // entry_count
                        write_avc1(buf, v);
                    });
                    write_empty_stts_stsc_stco_stsz(buf);
                });
            });
        });
    });
}

fn write_audio_trak(buf: &mut BytesMut, a: &AudioTrackDescriptor) {
    write_box(buf, b"trak", |buf| {
        write_tkhd(buf, AUDIO_TRACK_ID, None);
        write_box(buf, b"mdia", |buf| {
            write_mdhd(buf, a.timescale);
            write_hdlr(buf, b"soun", "SoundHandler");
            write_box(buf, b"minf", |buf| {
                write_box(buf, b"smhd", |buf| {
                    buf.put_u32(0); // version+flags
                    buf.put_i16(0); // balance
                    buf.put_u16(0); // reserved
                });
                write_dinf(buf);
                write_box(buf, b"stbl", |buf| {
                    write_box(buf, b"stsd", |buf| {
                        buf.put_u32(0);
                        buf.put_u32(1);
                        write_mp4a(buf, a);
                    });
                    write_empty_stts_stsc_stco_stsz(buf);
                });
            });
        });
    });
}

fn write_tkhd(buf: &mut BytesMut, track_id: u32, dimensions: Option<(u16, u16)>) {
    write_full_box(buf, b"tkhd", 0, 0x0000_0007, |buf| {
        buf.put_u32(0); // creation_time
        buf.put_u32(0); // modification_time
        buf.put_u32(track_id);
        buf.put_u32(0); // reserved
        buf.put_u32(0); // duration
        buf.put_u64(0); // reserved[2]
        buf.put_i16(0); // layer
        buf.put_i16(0); // alternate_group
        buf.put_u16(if dimensions.is_some() { 0 } else { 0x0100 }); // volume
        buf.put_u16(0); // reserved
        write_identity_matrix(buf);
        let (w, h) = dimensions.unwrap_or((0, 0));
        buf.put_u32((w as u32) << 16);
        buf.put_u32((h as u32) << 16);
    });
}

fn write_mdhd(buf: &mut BytesMut, timescale: u32) {
    write_full_box(buf, b"mdhd", 0, 0, |buf| {
        buf.put_u32(0); // creation_time
        buf.put_u32(0); // modification_time
        buf.put_u32(timescale);
        buf.put_u32(0); // duration
        buf.put_u16(0x55C4); // language: "und"
        buf.put_u16(0); // pre_defined
    });
}

fn write_hdlr(buf: &mut BytesMut, subtype: &[u8; 4], name: &str) {
    write_full_box(buf, b"hdlr", 0, 0, |buf| {
        buf.put_u32(0); // pre_defined
        buf.put_slice(subtype);
        buf.put_u32(0); // reserved[0]
        buf.put_u32(0); // reserved[1]
        buf.put_u32(0); // reserved[2]
        buf.put_slice(name.as_bytes());
        buf.put_u8(0); // null terminator
    });
}

fn write_dinf(buf: &mut BytesMut) {
    write_box(buf, b"dinf", |buf| {
        write_box(buf, b"dref", |buf| {
            buf.put_u32(0); // version+flags
            buf.put_u32(1); // entry_count
            write_full_box(buf, b"url ", 0, 0x0000_0001, |_| {});
        });
    });
}

fn write_empty_stts_stsc_stco_stsz(buf: &mut BytesMut) {
    write_full_box(buf, b"stts", 0, 0, |buf| buf.put_u32(0));
    write_full_box(buf, b"stsc", 0, 0, |buf| buf.put_u32(0));
    write_full_box(buf, b"stsz", 0, 0, |buf| {
        buf.put_u32(0); // sample_size
        buf.put_u32(0); // sample_count
    });
    write_full_box(buf, b"stco", 0, 0, |buf| buf.put_u32(0));
}

fn write_avc1(buf: &mut BytesMut, v: &VideoTrackDescriptor) {
    write_box(buf, b"avc1", |buf| {
        buf.put_u32(0); // reserved[0..4]
        buf.put_u16(0); // reserved[4..6]
        buf.put_u16(1); // data_reference_index
        buf.put_u16(0); // pre_defined
        buf.put_u16(0); // reserved
        buf.put_u32(0); // pre_defined[0]
        buf.put_u32(0); // pre_defined[1]
        buf.put_u32(0); // pre_defined[2]
        buf.put_u16(v.width);
        buf.put_u16(v.height);
        buf.put_u32(0x0048_0000); // horizresolution 72dpi
        buf.put_u32(0x0048_0000); // vertresolution 72dpi
        buf.put_u32(0); // reserved
        buf.put_u16(1); // frame_count
        buf.put_bytes(0, 32); // compressorname (pascal string, zeroed = empty)
        buf.put_u16(0x0018); // depth 24
        buf.put_i16(-1); // pre_defined
        write_avcc(buf, v);
    });
}

fn write_avcc(buf: &mut BytesMut, v: &VideoTrackDescriptor) {
    write_box(buf, b"avcC", |buf| {
        buf.put_u8(1); // configurationVersion
        // profile/compat/level from the SPS's first three payload bytes,
        // matching the bitstream layout AvcDecoderConfigurationRecord
        // expects (examples/sile-mse_fmp4/src/avc.rs).
        let (profile, compat, level) = if v.sps.len() >= 4 {
            (v.sps[1], v.sps[2], v.sps[3])
        } else {
            (0, 0, 0)
        };
        buf.put_u8(profile);
        buf.put_u8(compat);
        buf.put_u8(level);
        buf.put_u8(0xFC | 0x03); // reserved(6) + lengthSizeMinusOne(2) = 3 (4-byte lengths)
        buf.put_u8(0xE0 | 0x01); // reserved(3) + numOfSequenceParameterSets(5) = 1
        buf.put_u16(v.sps.len() as u16);
        buf.put_slice(&v.sps);
        buf.put_u8(1); // numOfPictureParameterSets
        buf.put_u16(v.pps.len() as u16);
        buf.put_slice(&v.pps);
    });
}

fn write_mp4a(buf: &mut BytesMut, a: &AudioTrackDescriptor) {
    write_box(buf, b"mp4a", |buf| {
        buf.put_u32(0); // reserved[0..4]
        buf.put_u16(0); // reserved[4..6]
        buf.put_u16(1); // data_reference_index
        buf.put_u32(0); // reserved[0]
        buf.put_u32(0); // reserved[1]
        buf.put_u16(a.channel_count.max(1) as u16);
        buf.put_u16(16); // samplesize
        buf.put_u16(0); // pre_defined
        buf.put_u16(0); // reserved
        buf.put_u32((a.sample_rate.min(u16::MAX as u32) as u32) << 16);
        write_esds(buf, a);
    });
}

fn write_esds(buf: &mut BytesMut, a: &AudioTrackDescriptor) {
    let body = build_esds_payload(a);
    write_full_box(buf, b"esds", 0, 0, |buf| buf.put_slice(&body));
}

fn build_esds_payload(a: &AudioTrackDescriptor) -> Bytes {
    let asc = audio_specific_config(a);

    let mut dec_specific = BytesMut::new();
    write_descriptor(&mut dec_specific, 0x05, &asc);

    let mut dec_config = BytesMut::new();
    dec_config.put_u8(0x40); // MPEG-4 Audio object type indication
    dec_config.put_u8(0x15); // streamType=audio, upStream=0, reserved=1
    dec_config.put_u8(0); // bufferSizeDB
    dec_config.put_u16(0);
    dec_config.put_u32(0); // maxBitrate
    dec_config.put_u32(0); // avgBitrate
    dec_config.put_slice(&dec_specific);

    let mut es = BytesMut::new();
    es.put_u16(0); // ES_ID
    es.put_u8(0); // flags/streamPriority
    let mut dec_config_full = BytesMut::new();
    write_descriptor(&mut dec_config_full, 0x04, &dec_config);
    es.put_slice(&dec_config_full);
    let mut sl_config = BytesMut::new();
    sl_config.put_u8(0x02); // predefined: reserved for use by ISO
    let mut sl_config_full = BytesMut::new();
    write_descriptor(&mut sl_config_full, 0x06, &sl_config);
    es.put_slice(&sl_config_full);

    let mut full = BytesMut::new();
    write_descriptor(&mut full, 0x03, &es);
    full.freeze()
}

/// Write a base-128 varint-length MPEG-4 descriptor: 1-byte tag, varint
/// length, payload.
fn write_descriptor(buf: &mut BytesMut, tag: u8, payload: &[u8]) {
    buf.put_u8(tag);
    let mut len = payload.len() as u32;
    let mut len_bytes = [0u8; 4];
    let mut n = 0;
    loop {
        len_bytes[n] = (len & 0x7F) as u8;
        len >>= 7;
        n += 1;
        if len == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let mut b = len_bytes[i];
        if i != 0 {
            b |= 0x80;
        }
        buf.put_u8(b);
    }
    buf.put_slice(payload);
}

/// Build a 2-byte AAC `AudioSpecificConfig` (ISO/IEC 14496-3 §1.6.2.1).
fn audio_specific_config(a: &AudioTrackDescriptor) -> Bytes {
    let freq_index = sampling_frequency_index(a.sample_rate);
    let object_type = a.object_type.max(1).min(31);
    let channel_config = a.channel_count.min(7);

    let b0 = (object_type << 3) | (freq_index >> 1);
    let b1 = (freq_index & 0x01) << 7 | (channel_config << 3);
    Bytes::copy_from_slice(&[b0, b1])
}

fn sampling_frequency_index(sample_rate: u32) -> u8 {
    const TABLE: [u32; 13] = [
        96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
    ];
    TABLE
        .iter()
        .position(|&f| f == sample_rate)
        .map(|i| i as u8)
        .unwrap_or(4) // default to 44100 if the rate isn't a standard one
}

fn write_mvex(buf: &mut BytesMut, has_video: bool, has_audio: bool) {
    write_box(buf, b"mvex", |buf| {
        if has_video {
            write_trex(buf, VIDEO_TRACK_ID);
        }
        if has_audio {
            write_trex(buf, AUDIO_TRACK_ID);
        }
    });
}

fn write_trex(buf: &mut BytesMut, track_id: u32) {
    write_full_box(buf, b"trex", 0, 0, |buf| {
        buf.put_u32(track_id);
        buf.put_u32(1); // default_sample_description_index
        buf.put_u32(0); // default_sample_duration
        buf.put_u32(0); // default_sample_size
        buf.put_u32(0); // default_sample_flags
    });
}
