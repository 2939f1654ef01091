//! Block checksum list filter.
//!
//! Ported from
//! `examples/original_source/src/command/restore/blockChecksum.c`: an
//! `In` filter that splits the observed byte stream into fixed-size
//! blocks (the last block may be short) and emits one truncated xxHash3
//! digest per block, concatenated into a single binary result field.
//! This is the checksum half of the block-incremental backup layout —
//! the block map pairs each digest here with the reference it came
//! from.

use super::{Capabilities, IoFilter, XxHashFilter};
use crate::pack::Pack;

pub struct BlockChecksumFilter {
    block_size: usize,
    checksum_size: usize,
    block_current: usize,
    checksum: Option<XxHashFilter>,
    digests: Vec<u8>,
}

impl BlockChecksumFilter {
    pub fn new(block_size: usize, checksum_size: usize) -> Self {
        assert!(block_size > 0, "block_size must be nonzero");
        assert!(checksum_size > 0, "checksum_size must be nonzero");
        Self {
            block_size,
            checksum_size,
            block_current: 0,
            checksum: None,
            digests: Vec::new(),
        }
    }

    fn close_block(&mut self) {
        if let Some(checksum) = self.checksum.take() {
            self.digests.extend_from_slice(&checksum.digest());
        }
        self.block_current = 0;
    }
}

impl IoFilter for BlockChecksumFilter {
    fn filter_type(&self) -> &'static str {
        "block-checksum"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::pass_through_in_with_result()
    }

    fn params(&self) -> Option<Pack> {
        let mut pack = Pack::new();
        pack.write_u64(self.block_size as u64);
        pack.write_u64(self.checksum_size as u64);
        Some(pack)
    }

    fn process_in(&mut self, input: &[u8]) {
        let mut offset = 0;
        while offset != input.len() {
            let checksum = self.checksum.get_or_insert_with(|| XxHashFilter::new(self.checksum_size));

            let block_remains = self.block_size - self.block_current;
            let input_remains = input.len() - offset;
            let take = block_remains.min(input_remains);

            checksum.process_in(&input[offset..offset + take]);
            offset += take;
            self.block_current += take;

            if self.block_current == self.block_size {
                self.close_block();
            }
        }
    }

    fn result(&mut self) -> Option<Pack> {
        self.close_block();
        let mut pack = Pack::new();
        pack.write_bin(std::mem::take(&mut self.digests));
        Some(pack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_one_digest_per_full_block_plus_remainder() {
        let mut filter = BlockChecksumFilter::new(4, 8);
        filter.process_in(b"aaaabbbbcc");
        let pack = filter.result().unwrap();
        let digests = pack.get_bin(0).unwrap();
        assert_eq!(digests.len(), 3 * 8);
    }

    #[test]
    fn exact_multiple_of_block_size_has_no_trailing_block() {
        let mut filter = BlockChecksumFilter::new(4, 8);
        filter.process_in(b"aaaabbbb");
        let pack = filter.result().unwrap();
        assert_eq!(pack.get_bin(0).unwrap().len(), 2 * 8);
    }

    #[test]
    fn blocks_split_across_process_in_calls_still_checksum_correctly() {
        let mut whole = BlockChecksumFilter::new(4, 8);
        whole.process_in(b"aaaabbbb");
        let whole_digest = whole.result().unwrap();

        let mut split = BlockChecksumFilter::new(4, 8);
        split.process_in(b"aa");
        split.process_in(b"aabb");
        split.process_in(b"bb");
        let split_digest = split.result().unwrap();

        assert_eq!(whole_digest.get_bin(0), split_digest.get_bin(0));
    }
}
