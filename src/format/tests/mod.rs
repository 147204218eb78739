
use crate::format::{TRAILER_MAGIC, Trailer};

/// Serializes `t` (minus `start`) followed by a version word.
pub(super) fn trailer_bytes(t: &Trailer, version_raw: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(60);
    buf.extend_from_slice(&TRAILER_MAGIC);
    buf.extend_from_slice(&t.file_info_offset.to_be_bytes());
    buf.extend_from_slice(&t.data_index_offset.to_be_bytes());
    buf.extend_from_slice(&t.data_index_count.to_be_bytes());
    buf.extend_from_slice(&t.meta_index_offset.to_be_bytes());
    buf.extend_from_slice(&t.meta_index_count.to_be_bytes());
    buf.extend_from_slice(&t.total_uncompressed_data_bytes.to_be_bytes());
    buf.extend_from_slice(&t.entry_count.to_be_bytes());
    buf.extend_from_slice(&t.compression_codec.to_be_bytes());
    buf.extend_from_slice(&version_raw.to_be_bytes());
    buf
}

pub(super) fn sample_trailer(start: u64) -> Trailer {
    Trailer {
        start,
        file_info_offset: 11,
        data_index_offset: 22,
        data_index_count: 3,
        meta_index_offset: 0,
        meta_index_count: 0,
        total_uncompressed_data_bytes: 4096,
        entry_count: 77,
        compression_codec: 2,
    }
}
