//! Fractal heap unit tests
//!
//! Header, block and identifier decoding against synthetic file images.

#[path = "../../../tests/integration/fixture.rs"]
mod fixture;

use bytes::Bytes;

use self::fixture::{FileImage, HeapParams};
use crate::format::Superblock;
use crate::heap::{
    BlockSize, ErrorKind, FractalHeap, HeapError, HeapHeader, HeapOptions, IndirectBlock,
};

const HEAP: u64 = 0x40;
const ROOT: u64 = 0x200;

fn superblock(params: &HeapParams) -> Superblock {
    Superblock::new(params.size_of_offsets as u8, params.size_of_lengths as u8).unwrap()
}

/// A heap whose root is a single direct block at `ROOT`
fn single_block_image(params: &mut HeapParams) -> FileImage {
    params.root_address = ROOT;
    params.current_rows = 0;
    let mut image = FileImage::new();
    image.write_header(HEAP, params);
    image.write_direct_block(ROOT, params, HEAP, 0, params.starting_block_size as usize);
    image
}

fn open(
    image: &FileImage,
    params: &HeapParams,
) -> crate::heap::Result<FractalHeap> {
    let channel = Bytes::copy_from_slice(image.as_slice());
    FractalHeap::open(&channel, &superblock(params), HEAP)
}

#[cfg(test)]
mod header_tests {
    use super::*;

    #[test]
    fn test_header_fields() {
        let mut params = HeapParams {
            managed_object_count: 7,
            ..HeapParams::default()
        };
        let image = single_block_image(&mut params);
        let heap = open(&image, &params).unwrap();
        let header = heap.header();

        assert_eq!(header.address, HEAP);
        assert_eq!(header.id_length, 5);
        assert_eq!(header.table_width, 4);
        assert_eq!(header.starting_block_size, 512);
        assert_eq!(header.max_direct_block_size, 1024);
        assert_eq!(header.managed_object_count, 7);
        assert_eq!(header.root(), Some(ROOT));
        assert_eq!(heap.bytes_to_store_offset(), 2);
        // min(1024, 4096) needs two bytes
        assert_eq!(heap.bytes_to_store_length(), 2);
        assert!(!header.direct_blocks_checksummed());
    }

    #[test]
    fn test_offset_width_follows_max_heap_size() {
        for (max_heap_size, expected) in [(16u16, 2usize), (17, 3), (32, 4), (40, 5), (64, 8)] {
            let params = HeapParams {
                max_heap_size,
                ..HeapParams::default()
            };
            let mut image = FileImage::new();
            image.write_header(HEAP, &params);
            let channel = Bytes::from(image.into_vec());
            let header = HeapHeader::read(&channel, &superblock(&params), HEAP).unwrap();
            assert_eq!(header.bytes_to_store_offset, expected);
        }
    }

    #[test]
    fn test_length_width_uses_smaller_limit() {
        let params = HeapParams {
            max_size_of_managed_objects: 200,
            max_direct_block_size: 65536,
            ..HeapParams::default()
        };
        let mut image = FileImage::new();
        image.write_header(HEAP, &params);
        let channel = Bytes::from(image.into_vec());
        let header = HeapHeader::read(&channel, &superblock(&params), HEAP).unwrap();
        assert_eq!(header.bytes_to_store_length, 1);
    }

    #[test]
    fn test_bad_signature() {
        let mut params = HeapParams::default();
        let mut image = single_block_image(&mut params);
        image.put(HEAP, b"FRHX");
        let err = open(&image, &params).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SignatureMismatch);
        assert_eq!(err.address(), HEAP);
        assert!(matches!(err, HeapError::Open { address: HEAP, .. }));
    }

    #[test]
    fn test_unsupported_header_version() {
        let mut params = HeapParams {
            version: 1,
            ..HeapParams::default()
        };
        let image = single_block_image(&mut params);
        let err = open(&image, &params).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
    }

    #[test]
    fn test_io_filters_rejected_before_blocks() {
        // root points past the end of the image; it must never be read
        let params = HeapParams {
            io_filters_length: 2,
            root_address: 0x10_0000,
            ..HeapParams::default()
        };
        let mut image = FileImage::new();
        image.write_header(HEAP, &params);
        let err = open(&image, &params).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
        assert_eq!(err.address(), HEAP);
    }

    #[test]
    fn test_zero_table_width_is_malformed() {
        let mut params = HeapParams {
            table_width: 0,
            ..HeapParams::default()
        };
        let image = single_block_image(&mut params);
        assert_eq!(open(&image, &params).unwrap_err().kind(), ErrorKind::Malformed);
    }

    #[test]
    fn test_truncated_header_is_io_error() {
        let params = HeapParams::default();
        let mut image = FileImage::new();
        image.write_header(HEAP, &params);
        let channel = Bytes::copy_from_slice(&image.as_slice()[..100]);
        let err = FractalHeap::open(&channel, &superblock(&params), HEAP).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_display() {
        let mut params = HeapParams::default();
        let image = single_block_image(&mut params);
        let heap = open(&image, &params).unwrap();
        let text = heap.to_string();
        assert!(text.starts_with("FractalHeap [address=64"));
        assert!(text.contains("directBlocks=1"));
    }
}

#[cfg(test)]
mod block_tests {
    use super::*;

    #[test]
    fn test_empty_heap() {
        let params = HeapParams::default();
        let mut image = FileImage::new();
        image.write_header(HEAP, &params);
        let heap = open(&image, &params).unwrap();
        assert_eq!(heap.direct_block_count(), 0);
        assert!(heap.header().root().is_none());

        let err = heap.resolve(&params.managed_id(0, 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptReference);
    }

    #[test]
    fn test_empty_heap_with_short_offsets() {
        let params = HeapParams {
            size_of_offsets: 4,
            ..HeapParams::default()
        };
        let mut image = FileImage::new();
        image.write_header(HEAP, &params);
        let heap = open(&image, &params).unwrap();
        assert_eq!(heap.header().root_block_address, 0xFFFF_FFFF);
        assert_eq!(heap.direct_block_count(), 0);
    }

    #[test]
    fn test_single_direct_root() {
        let mut params = HeapParams::default();
        let image = single_block_image(&mut params);
        let heap = open(&image, &params).unwrap();

        let blocks: Vec<_> = heap.direct_blocks().collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].block_offset(), 0);
        assert_eq!(blocks[0].address(), ROOT);
        assert_eq!(blocks[0].size(), 512);
        assert_eq!(heap.header().table().block_size(0), BlockSize::Direct(512));
    }

    #[test]
    fn test_checksum_flag_shifts_payload() {
        let mut params = HeapParams {
            flags: 0b10,
            ..HeapParams::default()
        };
        let mut image = single_block_image(&mut params);
        let payload_start = ROOT + params.direct_header_len() as u64;
        image.put(payload_start, b"first");

        let heap = open(&image, &params).unwrap();
        assert!(heap.header().direct_blocks_checksummed());
        let block = heap.direct_blocks().next().unwrap();
        // signature, version, 8 byte heap address, 2 byte offset, checksum
        assert_eq!(block.data().len() - block.payload().len(), 19);
        assert_eq!(&block.payload()[..5], b"first");
        assert_eq!(&block.data()[..4], b"FHDB");
    }

    #[test]
    fn test_direct_block_from_other_heap() {
        let mut params = HeapParams::default();
        let mut image = single_block_image(&mut params);
        image.write_direct_block(ROOT, &params, 0x999, 0, 512);
        let err = open(&image, &params).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptReference);
        assert_eq!(err.address(), ROOT);
    }

    #[test]
    fn test_direct_block_version() {
        let mut params = HeapParams::default();
        let mut image = single_block_image(&mut params);
        image.put(ROOT + 4, &[3]);
        let err = open(&image, &params).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
        assert_eq!(err.address(), ROOT);
    }

    #[test]
    fn test_direct_block_past_end_of_file() {
        let mut params = HeapParams::default();
        let image = single_block_image(&mut params);
        let short = Bytes::copy_from_slice(&image.as_slice()[..ROOT as usize + 100]);
        let err = FractalHeap::open(&short, &superblock(&params), HEAP).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_indirect_root_stops_at_undefined() {
        let params = HeapParams {
            root_address: ROOT,
            current_rows: 2,
            ..HeapParams::default()
        };
        let mut image = FileImage::new();
        image.write_header(HEAP, &params);
        image.write_indirect_block(ROOT, &params, HEAP, 0, 2, &[0x1000, 0x1400, 0x1800]);
        for (i, address) in [0x1000u64, 0x1400, 0x1800].into_iter().enumerate() {
            image.write_direct_block(address, &params, HEAP, i as u64 * 512, 512);
        }

        let heap = open(&image, &params).unwrap();
        let offsets: Vec<_> = heap.direct_blocks().map(|b| b.block_offset()).collect();
        assert_eq!(offsets, vec![0, 512, 1024]);
    }

    #[test]
    fn test_read_indirect_block() {
        let params = HeapParams {
            root_address: ROOT,
            current_rows: 2,
            ..HeapParams::default()
        };
        let mut image = FileImage::new();
        image.write_header(HEAP, &params);
        image.write_indirect_block(ROOT, &params, HEAP, 0, 2, &[0x1000, 0x1400]);
        let channel = Bytes::from(image.into_vec());
        let sb = superblock(&params);
        let header = HeapHeader::read(&channel, &sb, HEAP).unwrap();

        let block = IndirectBlock::read(&channel, &header, &sb, ROOT, 2).unwrap();
        assert_eq!(block.address, ROOT);
        assert_eq!(block.block_offset, 0);
        assert_eq!(block.rows, 2);
        assert_eq!(&block.children[..], &[0x1000, 0x1400]);
    }

    #[test]
    fn test_indirect_block_bad_signature() {
        let params = HeapParams {
            root_address: ROOT,
            current_rows: 1,
            ..HeapParams::default()
        };
        let mut image = FileImage::new();
        image.write_header(HEAP, &params);
        image.write_indirect_block(ROOT, &params, HEAP, 0, 1, &[]);
        image.put(ROOT, b"FHIX");
        let err = open(&image, &params).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SignatureMismatch);
        assert_eq!(err.address(), ROOT);
    }

    #[test]
    fn test_indirect_block_version() {
        let params = HeapParams {
            root_address: ROOT,
            current_rows: 1,
            ..HeapParams::default()
        };
        let mut image = FileImage::new();
        image.write_header(HEAP, &params);
        image.write_indirect_block(ROOT, &params, HEAP, 0, 1, &[]);
        image.put(ROOT + 4, &[2]);
        let err = open(&image, &params).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
        assert_eq!(err.address(), ROOT);
    }

    #[test]
    fn test_indirect_block_from_other_heap() {
        let params = HeapParams {
            root_address: ROOT,
            current_rows: 1,
            ..HeapParams::default()
        };
        let mut image = FileImage::new();
        image.write_header(HEAP, &params);
        image.write_indirect_block(ROOT, &params, 0x10, 0, 1, &[]);
        let err = open(&image, &params).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptReference);
        assert_eq!(err.address(), ROOT);
    }

    #[test]
    fn test_duplicate_block_offsets() {
        let params = HeapParams {
            root_address: ROOT,
            current_rows: 1,
            ..HeapParams::default()
        };
        let mut image = FileImage::new();
        image.write_header(HEAP, &params);
        image.write_indirect_block(ROOT, &params, HEAP, 0, 1, &[0x1000, 0x1400]);
        image.write_direct_block(0x1000, &params, HEAP, 0, 512);
        image.write_direct_block(0x1400, &params, HEAP, 0, 512);
        assert_eq!(open(&image, &params).unwrap_err().kind(), ErrorKind::Malformed);
    }

    #[test]
    fn test_root_rows_beyond_address_space() {
        // 2^16 heap with 4 x 512 byte first rows allows at most 6 rows
        let params = HeapParams {
            root_address: ROOT,
            current_rows: 7,
            ..HeapParams::default()
        };
        let mut image = FileImage::new();
        image.write_header(HEAP, &params);
        image.write_indirect_block(ROOT, &params, HEAP, 0, 7, &[]);
        let err = open(&image, &params).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);
        assert_eq!(err.address(), ROOT);
    }
}

#[cfg(test)]
mod resolve_tests {
    use super::*;

    #[test]
    fn test_resolve_managed_object() {
        let mut params = HeapParams::default();
        let mut image = single_block_image(&mut params);
        image.put(ROOT + 0x20, b"link-name");

        let heap = open(&image, &params).unwrap();
        let data = heap.resolve(&params.managed_id(0x20, 9)).unwrap();
        assert_eq!(&data[..], b"link-name");
    }

    #[test]
    fn test_offset_past_last_block() {
        let mut params = HeapParams::default();
        let image = single_block_image(&mut params);
        let heap = open(&image, &params).unwrap();

        let id = [0x00, 0x00, 0x02, 0x10, 0x00];
        let err = heap.resolve(&id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptReference);
        assert_eq!(err.address(), HEAP);
    }

    #[test]
    fn test_object_overrunning_block() {
        let mut params = HeapParams::default();
        let image = single_block_image(&mut params);
        let heap = open(&image, &params).unwrap();
        let err = heap.resolve(&params.managed_id(500, 20)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptReference);
        // the last byte of the block is still reachable
        assert_eq!(heap.resolve(&params.managed_id(511, 1)).unwrap().len(), 1);
    }

    #[test]
    fn test_huge_and_tiny_unsupported() {
        let mut params = HeapParams::default();
        let image = single_block_image(&mut params);
        let heap = open(&image, &params).unwrap();

        for flags in [0x10u8, 0x20] {
            let err = heap.resolve(&[flags, 0, 0, 0, 0]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
        }
    }

    #[test]
    fn test_wrong_id_length_does_not_poison_heap() {
        let mut params = HeapParams::default();
        let mut image = single_block_image(&mut params);
        image.put(ROOT + 0x30, b"ok");
        let heap = open(&image, &params).unwrap();

        let err = heap.resolve(&[0x00, 0x30, 0x00, 0x02]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedIdentifier);
        assert_eq!(&heap.resolve(&params.managed_id(0x30, 2)).unwrap()[..], b"ok");
    }

    #[test]
    fn test_reserved_mode_is_malformed_by_default() {
        let mut params = HeapParams::default();
        let image = single_block_image(&mut params);
        let heap = open(&image, &params).unwrap();
        let err = heap.resolve(&[0x30, 1, 2, 3, 4]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedIdentifier);
    }

    #[test]
    fn test_legacy_inline_ids() {
        let mut params = HeapParams::default();
        let image = single_block_image(&mut params);
        let channel = Bytes::copy_from_slice(image.as_slice());
        let options = HeapOptions {
            legacy_inline_ids: true,
        };
        let heap = FractalHeap::open_with(&channel, &superblock(&params), HEAP, options).unwrap();
        assert_eq!(&heap.resolve(&[0x30, 1, 2, 3, 4]).unwrap()[..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_legacy_inline_ids_length_limit() {
        let mut params = HeapParams {
            id_length: 19,
            ..HeapParams::default()
        };
        let image = single_block_image(&mut params);
        let channel = Bytes::copy_from_slice(image.as_slice());
        let options = HeapOptions {
            legacy_inline_ids: true,
        };
        let heap = FractalHeap::open_with(&channel, &superblock(&params), HEAP, options).unwrap();
        let mut id = vec![0x30];
        id.resize(19, 7);
        let err = heap.resolve(&id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedIdentifier);
    }
}
