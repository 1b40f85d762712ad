//! Metadata (ID3) and user-data (caption) cue flushers (`spec.md` §4.6).

use crate::clock::normalize;
use crate::types::{Id3CueOut, Id3Track, TextTrack, UserDataCueOut};

/// Rebase every buffered ID3 cue into the presentation clock and clear the
/// track's sample buffer.
pub fn flush_id3_cues(
    track: &mut Id3Track,
    init_pts: i64,
    init_dts: i64,
    time_offset: f64,
    input_time_scale: u32,
) -> Vec<Id3CueOut> {
    let reference = (time_offset * input_time_scale as f64).round() as i64;
    let cues = std::mem::take(&mut track.samples)
        .into_iter()
        .map(|sample| Id3CueOut {
            pts: normalize(sample.pts - init_pts, Some(reference)) as f64 / input_time_scale as f64,
            dts: normalize(sample.dts - init_dts, Some(reference)) as f64 / input_time_scale as f64,
            data: sample.data,
        })
        .collect();
    cues
}

/// Rebase every buffered caption cue, sort ascending by PTS, and clear the
/// track's sample buffer.
pub fn flush_user_data_cues(
    track: &mut TextTrack,
    init_pts: i64,
    time_offset: f64,
    input_time_scale: u32,
) -> Vec<UserDataCueOut> {
    let reference = (time_offset * input_time_scale as f64).round() as i64;
    let mut cues: Vec<UserDataCueOut> = std::mem::take(&mut track.samples)
        .into_iter()
        .map(|sample| UserDataCueOut {
            pts: normalize(sample.pts - init_pts, Some(reference)) as f64 / input_time_scale as f64,
            data: sample.data,
            kind: sample.kind,
        })
        .collect();
    cues.sort_by(|a, b| a.pts.partial_cmp(&b.pts).unwrap());
    cues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Id3Sample, UserDataKind, UserDataSample};
    use bytes::Bytes;

    #[test]
    fn id3_cues_are_rebased_and_buffer_cleared() {
        let mut track = Id3Track {
            pid: 3,
            samples: vec![Id3Sample {
                pts: 90_000,
                dts: 90_000,
                data: Bytes::from_static(b"hello"),
            }],
        };
        let cues = flush_id3_cues(&mut track, 0, 0, 0.0, 90_000);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].pts, 1.0);
        assert!(track.samples.is_empty());
    }

    #[test]
    fn user_data_cues_sort_ascending_by_pts() {
        let mut track = TextTrack {
            pid: 4,
            samples: vec![
                UserDataSample { pts: 180_000, data: Bytes::new(), kind: UserDataKind::Cea608 },
                UserDataSample { pts: 90_000, data: Bytes::new(), kind: UserDataKind::Cea608 },
            ],
        };
        let cues = flush_user_data_cues(&mut track, 0, 0.0, 90_000);
        assert!(cues[0].pts < cues[1].pts);
    }
}
