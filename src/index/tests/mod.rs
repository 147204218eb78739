//! Data index decoding over hand-assembled files.

use crate::BlockLoading;
use crate::block::codec::Codec;
use crate::encoding::encode_uvarint;
use crate::format::{DATA_BLOCK_MAGIC, DATA_INDEX_MAGIC, FormatError, Section, Trailer};
use crate::index::DataIndex;
use tracing::Level;
use tracing_subscriber::fmt::Subscriber;

fn init_tracing() {
    let _ = Subscriber::builder()
        .with_max_level(Level::TRACE)
        .try_init();
}

const MAX: u32 = 1 << 20;

fn raw_block(records: &[(&str, &str)]) -> Vec<u8> {
    let mut buf = DATA_BLOCK_MAGIC.to_vec();
    for (k, v) in records {
        buf.extend_from_slice(&(k.len() as u32).to_be_bytes());
        buf.extend_from_slice(&(v.len() as u32).to_be_bytes());
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(v.as_bytes());
    }
    buf
}

/// Lays out `blocks` uncompressed, then the index, and returns the file
/// bytes (without trailer) plus a matching trailer.
fn assemble(blocks: &[Vec<u8>], codec: u32) -> (Vec<u8>, Trailer) {
    let mut file = Vec::new();
    let mut entries = Vec::new();
    for raw in blocks {
        let offset = file.len() as u64;
        file.extend_from_slice(raw);
        // First key of the first record, or empty for an empty block.
        let first_key = if raw.len() > 16 {
            let key_len = u32::from_be_bytes([raw[8], raw[9], raw[10], raw[11]]) as usize;
            raw[16..16 + key_len].to_vec()
        } else {
            Vec::new()
        };
        entries.push((offset, raw.len() as u32, first_key));
    }

    let data_index_offset = file.len() as u64;
    file.extend_from_slice(&DATA_INDEX_MAGIC);
    for (offset, size, key) in &entries {
        file.extend_from_slice(&offset.to_be_bytes());
        file.extend_from_slice(&size.to_be_bytes());
        encode_uvarint(key.len() as u64, &mut file);
        file.extend_from_slice(key);
    }

    let trailer = Trailer {
        start: file.len() as u64,
        file_info_offset: 0,
        data_index_offset,
        data_index_count: entries.len() as u32,
        meta_index_offset: 0,
        meta_index_count: 0,
        total_uncompressed_data_bytes: blocks.iter().map(|b| b.len() as u64).sum(),
        entry_count: 0,
        compression_codec: codec,
    };
    (file, trailer)
}

#[test]
fn builds_descriptors_in_order() {
    init_tracing();

    let blocks = vec![
        raw_block(&[("a", "1"), ("b", "2")]),
        raw_block(&[("m", "3")]),
        raw_block(&[("x", "4"), ("y", "5")]),
    ];
    let (file, trailer) = assemble(&blocks, Codec::NONE_ID);

    let index = DataIndex::build(&file, &trailer, BlockLoading::Eager, MAX).unwrap();
    assert_eq!(index.len(), 3);
    let keys: Vec<&[u8]> = index.blocks().iter().map(|b| b.first_key()).collect();
    assert_eq!(keys, vec![&b"a"[..], b"m", b"x"]);
    assert!(index.blocks().iter().all(|b| b.is_loaded()));
    assert_eq!(index.blocks()[1].offset(), blocks[0].len() as u64);
    assert_eq!(index.blocks()[2].size(), blocks[2].len() as u32);
}

#[test]
fn lazy_loading_defers_block_decoding() {
    let blocks = vec![raw_block(&[("a", "1")]), raw_block(&[("b", "2")])];
    let (file, trailer) = assemble(&blocks, Codec::NONE_ID);

    let index = DataIndex::build(&file, &trailer, BlockLoading::Lazy, MAX).unwrap();
    assert_eq!(index.len(), 2);
    assert!(index.blocks().iter().all(|b| !b.is_loaded()));
}

#[test]
fn lazy_loading_skips_block_magic_check() {
    let mut blocks = vec![raw_block(&[("a", "1")])];
    blocks[0][0] = b'Q';
    let (file, trailer) = assemble(&blocks, Codec::NONE_ID);

    assert!(DataIndex::build(&file, &trailer, BlockLoading::Lazy, MAX).is_ok());
    assert!(matches!(
        DataIndex::build(&file, &trailer, BlockLoading::Eager, MAX),
        Err(FormatError::BadMagic {
            section: Section::DataBlock,
            ..
        })
    ));
}

#[test]
fn empty_index_is_valid() {
    let (file, trailer) = assemble(&[], Codec::NONE_ID);
    let index = DataIndex::build(&file, &trailer, BlockLoading::Eager, MAX).unwrap();
    assert!(index.is_empty());
    assert_eq!(index.upper_bound_from(0, b"anything"), 0);
}

#[test]
fn unsupported_codec_fails_even_without_blocks() {
    let (file, trailer) = assemble(&[], 1);
    assert!(matches!(
        DataIndex::build(&file, &trailer, BlockLoading::Eager, MAX),
        Err(FormatError::UnsupportedCodec(1))
    ));
}

#[test]
fn bad_index_magic_is_fatal() {
    let (mut file, trailer) = assemble(&[raw_block(&[("a", "1")])], Codec::NONE_ID);
    file[trailer.data_index_offset as usize] ^= 0xFF;
    assert!(matches!(
        DataIndex::build(&file, &trailer, BlockLoading::Eager, MAX),
        Err(FormatError::BadMagic {
            section: Section::DataIndex,
            ..
        })
    ));
}

#[test]
fn index_range_outside_file_is_out_of_bounds() {
    let (file, mut trailer) = assemble(&[raw_block(&[("a", "1")])], Codec::NONE_ID);
    trailer.start = file.len() as u64 + 100;
    assert!(matches!(
        DataIndex::build(&file, &trailer, BlockLoading::Eager, MAX),
        Err(FormatError::OutOfBounds { .. })
    ));

    trailer.start = file.len() as u64;
    trailer.data_index_offset = trailer.start + 1;
    assert!(matches!(
        DataIndex::build(&file, &trailer, BlockLoading::Eager, MAX),
        Err(FormatError::OutOfBounds { .. })
    ));
}

#[test]
fn meta_index_offset_bounds_the_index() {
    init_tracing();

    let (mut file, mut trailer) = assemble(&[raw_block(&[("a", "1")])], Codec::NONE_ID);
    // Garbage after the index that only the meta index offset keeps out.
    let index_end = file.len() as u64;
    file.extend_from_slice(b"META-INDEX-GARBAGE");
    trailer.meta_index_offset = index_end;
    trailer.start = file.len() as u64;

    let index = DataIndex::build(&file, &trailer, BlockLoading::Eager, MAX).unwrap();
    assert_eq!(index.len(), 1);
}

#[test]
fn truncated_descriptor_is_reported() {
    let (file, mut trailer) = assemble(&[raw_block(&[("abc", "1")])], Codec::NONE_ID);
    trailer.start -= 2;
    assert!(matches!(
        DataIndex::build(&file, &trailer, BlockLoading::Eager, MAX),
        Err(FormatError::Truncated(_))
    ));
}

#[test]
fn descriptor_pointing_past_eof_fails_eager_build() {
    let (mut file, trailer) = assemble(&[raw_block(&[("a", "1")])], Codec::NONE_ID);
    let off = trailer.data_index_offset as usize + 8;
    file[off..off + 8].copy_from_slice(&(1u64 << 40).to_be_bytes());
    assert!(matches!(
        DataIndex::build(&file, &trailer, BlockLoading::Eager, MAX),
        Err(FormatError::OutOfBounds { .. })
    ));
}

#[test]
fn count_mismatch_and_disorder_are_tolerated() {
    init_tracing();

    let blocks = vec![raw_block(&[("z", "1")]), raw_block(&[("a", "2")])];
    let (file, mut trailer) = assemble(&blocks, Codec::NONE_ID);
    trailer.data_index_count = 7;

    let index = DataIndex::build(&file, &trailer, BlockLoading::Eager, MAX).unwrap();
    assert_eq!(index.len(), 2);
    assert_eq!(index.blocks()[0].first_key(), b"z");
}

#[test]
fn upper_bound_counts_blocks_at_or_below_key() {
    let blocks = vec![
        raw_block(&[("b", "1")]),
        raw_block(&[("d", "2")]),
        raw_block(&[("d", "3")]),
        raw_block(&[("f", "4")]),
    ];
    let (file, trailer) = assemble(&blocks, Codec::NONE_ID);
    let index = DataIndex::build(&file, &trailer, BlockLoading::Lazy, MAX).unwrap();

    assert_eq!(index.upper_bound_from(0, b"a"), 0);
    assert_eq!(index.upper_bound_from(0, b"b"), 1);
    assert_eq!(index.upper_bound_from(0, b"c"), 1);
    assert_eq!(index.upper_bound_from(0, b"d"), 3);
    assert_eq!(index.upper_bound_from(0, b"z"), 4);
    assert_eq!(index.upper_bound_from(2, b"e"), 1);
    assert_eq!(index.upper_bound_from(9, b"e"), 0);
}
