//! xxHash3-128 digest filter.
//!
//! Ported from `examples/original_source/src/common/crypto/xxhash.c`: an
//! `In` filter that feeds every observed byte into an `XXH3_128bits`
//! state and, at end-of-stream, returns the canonical (big-endian)
//! digest truncated to `size` bytes. The truncated-digest scheme is
//! what lets the block-incremental layout use a short checksum per
//! block while still using the full 128-bit state internally.

use xxhash_rust::xxh3::Xxh3;

use super::{Capabilities, IoFilter};
use crate::pack::Pack;

pub struct XxHashFilter {
    size: usize,
    state: Xxh3,
}

impl XxHashFilter {
    /// `size` is the number of leading bytes of the canonical 128-bit
    /// digest to keep, 1..=16.
    pub fn new(size: usize) -> Self {
        assert!(size >= 1 && size <= 16, "xxhash digest size out of range: {size}");
        Self {
            size,
            state: Xxh3::new(),
        }
    }

    /// Digest bytes accumulated so far, without consuming the filter —
    /// used by [`super::BlockChecksumFilter`] to close out a block
    /// without waiting for the whole stream to end.
    pub fn digest(&self) -> Vec<u8> {
        let hash = self.state.digest128();
        hash.to_be_bytes()[..self.size].to_vec()
    }
}

impl IoFilter for XxHashFilter {
    fn filter_type(&self) -> &'static str {
        "xxhash"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::pass_through_in_with_result()
    }

    fn process_in(&mut self, input: &[u8]) {
        self.state.update(input);
    }

    fn result(&mut self) -> Option<Pack> {
        let mut pack = Pack::new();
        pack.write_bin(self.digest());
        Some(pack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_for_same_input() {
        let mut a = XxHashFilter::new(16);
        a.process_in(b"hello world");
        let mut b = XxHashFilter::new(16);
        b.process_in(b"hello ");
        b.process_in(b"world");
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn truncation_keeps_leading_bytes_of_full_digest() {
        let mut full = XxHashFilter::new(16);
        full.process_in(b"abcdef");
        let mut short = XxHashFilter::new(4);
        short.process_in(b"abcdef");
        assert_eq!(&full.digest()[..4], short.digest().as_slice());
    }

    #[test]
    fn different_input_yields_different_digest() {
        let mut a = XxHashFilter::new(8);
        a.process_in(b"one");
        let mut b = XxHashFilter::new(8);
        b.process_in(b"two");
        assert_ne!(a.digest(), b.digest());
    }
}
