//! `moof` + `mdat` fragment assembly (`spec.md` §4.3 Step G, §4.4, §6).
//!
//! Each remuxed track gets its own single-track `moof`; this mirrors
//! `examples/sile-mse_fmp4/src/fmp4/media.rs`'s `MovieFragmentBox` /
//! `TrackFragmentBox` / `TrackRunBox` layout, and the two-pass
//! size-then-patch `data_offset` trick used by the FLV transmuxer in
//! `examples/other_examples/d3f2e9bb_ScuffleTV-scuffle__video-transmuxer-src-lib.rs.rs`.

use bytes::{BufMut, Bytes, BytesMut};

use super::{write_box, write_full_box};
use crate::types::{Mp4Sample, TrackContainer};

/// `default-base-is-moof`: sample data offsets in `trun` are relative to
/// the start of this `moof`, not of the preceding `mdat`.
const TFHD_DEFAULT_BASE_IS_MOOF: u32 = 0x02_0000;

const TRUN_DATA_OFFSET_PRESENT: u32 = 0x00_0001;
const TRUN_SAMPLE_DURATION_PRESENT: u32 = 0x00_0100;
const TRUN_SAMPLE_SIZE_PRESENT: u32 = 0x00_0200;
const TRUN_SAMPLE_FLAGS_PRESENT: u32 = 0x00_0400;
const TRUN_SAMPLE_CTS_PRESENT: u32 = 0x00_0800;

/// Build the `moof` for one fragment of one track.
///
/// `sequence_number` is the track's read-and-increment fragment counter
/// (`spec.md` §9 "sequenceNumber contract"); `base_decode_time` is the
/// fragment's first sample DTS in the track's output timescale, already
/// clamped non-negative by `HostQuirks::requires_positive_dts` if needed.
pub fn build_moof(
    sequence_number: u32,
    base_decode_time: u64,
    track_id: u32,
    samples: &[Mp4Sample],
) -> Bytes {
    let mut buf = BytesMut::new();
    let mut data_offset_pos = 0usize;

    write_box(&mut buf, b"moof", |buf| {
        write_full_box(buf, b"mfhd", 0, 0, |buf| buf.put_u32(sequence_number));
        write_box(buf, b"traf", |buf| {
            write_tfhd(buf, track_id);
            write_tfdt(buf, base_decode_time);
            data_offset_pos = write_trun(buf, samples);
        });
    });

    // trun's data_offset counts bytes from the start of this moof to the
    // start of the sample data, which lands right after mdat's 8-byte
    // box header.
    let data_offset = (buf.len() + 8) as i32;
    buf[data_offset_pos..data_offset_pos + 4].copy_from_slice(&data_offset.to_be_bytes());

    buf.freeze()
}

fn write_tfhd(buf: &mut BytesMut, track_id: u32) {
    write_full_box(buf, b"tfhd", 0, TFHD_DEFAULT_BASE_IS_MOOF, |buf| {
        buf.put_u32(track_id);
    });
}

fn write_tfdt(buf: &mut BytesMut, base_decode_time: u64) {
    write_full_box(buf, b"tfdt", 1, 0, |buf| buf.put_u64(base_decode_time));
}

fn write_trun(buf: &mut BytesMut, samples: &[Mp4Sample]) -> usize {
    let flags = TRUN_DATA_OFFSET_PRESENT
        | TRUN_SAMPLE_DURATION_PRESENT
        | TRUN_SAMPLE_SIZE_PRESENT
        | TRUN_SAMPLE_FLAGS_PRESENT
        | TRUN_SAMPLE_CTS_PRESENT;

    let mut data_offset_pos = 0usize;
    write_full_box(buf, b"trun", 1, flags, |buf| {
        buf.put_u32(samples.len() as u32);
        data_offset_pos = buf.len();
        buf.put_i32(0); // patched by build_moof once the full moof size is known
        for sample in samples {
            buf.put_u32(sample.duration);
            buf.put_u32(sample.size);
            buf.put_u32(sample.flags.to_u32());
            buf.put_i32(sample.cts);
        }
    });
    data_offset_pos
}

/// Wrap `payload` in an `mdat` box.
pub fn build_mdat(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(payload.len() + 8);
    write_box(&mut buf, b"mdat", |buf| buf.put_slice(payload));
    buf.freeze()
}

/// Build the sample-data blob for a fragment, honoring the raw-MPEG
/// exception to the `mdat` wire format (`spec.md` §6): raw `audio/mpeg`
/// output has no `mdat` box at all, just the concatenated frames.
pub fn build_sample_data(container: TrackContainer, payload: Bytes) -> Bytes {
    match container {
        TrackContainer::Mp4 => build_mdat(&payload),
        TrackContainer::Mpeg => payload,
    }
}
