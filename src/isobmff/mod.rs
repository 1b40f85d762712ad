//! Minimal ISO BMFF box writer.
//!
//! `spec.md` treats box serialization as an external pure function
//! (`initSegment(track) -> bytes`, `moof(seq, baseDts, track) -> bytes`).
//! This module is that function, grounded on the box layout used in
//! `examples/sile-mse_fmp4/src/fmp4/*.rs` and re-expressed with
//! `bytes::BytesMut` instead of a generic `Write` trait, since this crate
//! has no use for a trackable-style error-chaining layer: box construction
//! here cannot fail (sizes are `u32`-bounded by the caller before this
//! module is reached).

pub mod fragment;
pub mod init;

use bytes::{BufMut, BytesMut};

/// Write a full ISO BMFF box: 4-byte big-endian size, 4-byte type, payload.
/// `write_payload` receives the buffer positioned right after the type and
/// writes only the payload bytes.
fn write_box(buf: &mut BytesMut, box_type: &[u8; 4], write_payload: impl FnOnce(&mut BytesMut)) {
    let start = buf.len();
    buf.put_u32(0); // size placeholder, patched below
    buf.put_slice(box_type);
    write_payload(buf);
    let size = (buf.len() - start) as u32;
    buf[start..start + 4].copy_from_slice(&size.to_be_bytes());
}

/// Write a "full box": like `write_box`, but with the additional
/// version(1)+flags(3) header ISO/IEC 14496-12 full boxes carry.
fn write_full_box(
    buf: &mut BytesMut,
    box_type: &[u8; 4],
    version: u8,
    flags: u32,
    write_payload: impl FnOnce(&mut BytesMut),
) {
    write_box(buf, box_type, |buf| {
        let version_and_flags = ((version as u32) << 24) | (flags & 0x00FF_FFFF);
        buf.put_u32(version_and_flags);
        write_payload(buf);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_box_patches_size_after_payload() {
        let mut buf = BytesMut::new();
        write_box(&mut buf, b"test", |buf| buf.put_slice(&[1, 2, 3, 4]));
        assert_eq!(buf.len(), 12);
        assert_eq!(u32::from_be_bytes(buf[0..4].try_into().unwrap()), 12);
        assert_eq!(&buf[4..8], b"test");
        assert_eq!(&buf[8..12], &[1, 2, 3, 4]);
    }

    #[test]
    fn full_box_includes_version_and_flags_word() {
        let mut buf = BytesMut::new();
        write_full_box(&mut buf, b"tfhd", 0, 0x02_0008, |buf| buf.put_u32(42));
        assert_eq!(buf.len(), 16);
        let version_and_flags = u32::from_be_bytes(buf[8..12].try_into().unwrap());
        assert_eq!(version_and_flags, 0x02_0008);
    }
}
