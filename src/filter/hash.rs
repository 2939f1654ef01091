//! General-purpose digest filter for the algorithms repository manifests
//! use to fingerprint whole files (distinct from the truncated xxHash3
//! block digests `BlockChecksumFilter` produces).

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use super::{Capabilities, IoFilter};
use crate::pack::Pack;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum HashAlgorithm {
    #[serde(rename = "md5")]
    Md5,
    #[serde(rename = "sha1")]
    Sha1,
    #[serde(rename = "sha256")]
    Sha256,
}

impl HashAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
        }
    }
}

enum State {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
}

pub struct HashFilter {
    algorithm: HashAlgorithm,
    state: State,
}

impl HashFilter {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let state = match algorithm {
            HashAlgorithm::Md5 => State::Md5(Md5::new()),
            HashAlgorithm::Sha1 => State::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => State::Sha256(Sha256::new()),
        };
        Self { algorithm, state }
    }
}

impl IoFilter for HashFilter {
    fn filter_type(&self) -> &'static str {
        "hash"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::pass_through_in_with_result()
    }

    fn params(&self) -> Option<Pack> {
        let mut pack = Pack::new();
        pack.write_str(self.algorithm.name());
        Some(pack)
    }

    fn process_in(&mut self, input: &[u8]) {
        match &mut self.state {
            State::Md5(h) => h.update(input),
            State::Sha1(h) => h.update(input),
            State::Sha256(h) => h.update(input),
        }
    }

    fn result(&mut self) -> Option<Pack> {
        let digest = match &self.state {
            State::Md5(h) => h.clone().finalize().to_vec(),
            State::Sha1(h) => h.clone().finalize().to_vec(),
            State::Sha256(h) => h.clone().finalize().to_vec(),
        };
        let mut pack = Pack::new();
        pack.write_bin(digest);
        Some(pack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn sha256_of_empty_input_matches_known_digest() {
        let mut filter = HashFilter::new(HashAlgorithm::Sha256);
        let pack = filter.result().unwrap();
        let digest = pack.get_bin(0).unwrap();
        assert_eq!(
            to_hex(digest),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn different_algorithms_produce_different_length_digests() {
        let mut md5 = HashFilter::new(HashAlgorithm::Md5);
        md5.process_in(b"abc");
        let mut sha1 = HashFilter::new(HashAlgorithm::Sha1);
        sha1.process_in(b"abc");
        assert_eq!(md5.result().unwrap().get_bin(0).unwrap().len(), 16);
        assert_eq!(sha1.result().unwrap().get_bin(0).unwrap().len(), 20);
    }
}
