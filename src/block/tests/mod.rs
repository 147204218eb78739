
use crate::block::codec::Codec;
use crate::block::BlockContext;
use crate::format::DATA_BLOCK_MAGIC;

/// Raw (uncompressed) block bytes: magic followed by the records.
pub(super) fn raw_block(records: &[(&[u8], &[u8])]) -> Vec<u8> {
    let mut buf = DATA_BLOCK_MAGIC.to_vec();
    for (k, v) in records {
        buf.extend_from_slice(&(k.len() as u32).to_be_bytes());
        buf.extend_from_slice(&(v.len() as u32).to_be_bytes());
        buf.extend_from_slice(k);
        buf.extend_from_slice(v);
    }
    buf
}

/// Snappy framing around `raw`: uncompressed size, compressed size, payload.
pub(super) fn snappy_frame(raw: &[u8], declared_uncompressed: u32) -> Vec<u8> {
    let payload = snap::raw::Encoder::new().compress_vec(raw).unwrap();
    let mut buf = Vec::new();
    buf.extend_from_slice(&declared_uncompressed.to_be_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&payload);
    buf
}

pub(super) fn ctx(file: &[u8], codec: Codec) -> BlockContext<'_> {
    BlockContext {
        file,
        codec,
        max_block_size: 1 << 20,
    }
}
