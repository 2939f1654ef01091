//! Block-incremental backup layout: building a block map while backing
//! up a file against one or more reference backups, and replaying that
//! map to restore a file.
//!
//! Grounded on the block-map description in the backup-file-entry
//! lifecycle and the restore-delta algorithm; no single original-source
//! file owns this end-to-end (the original splits it across the backup
//! and restore commands plus the manifest), so the state machine below
//! is assembled from [`crate::filter::BlockChecksumFilter`]'s digest
//! scheme and the block-map invariants: entries partition `[0, size)`
//! without overlap, and every `reference_id` an entry names is present
//! in the map's `reference_list`.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom, Write};

use xxhash_rust::xxh3::Xxh3;

use crate::error::{PgxError, Result};

/// Which artifact a block map entry's bytes come from. `Latest` only
/// appears before planning resolves it: a caller building a restore or
/// backup plan against `reference = latest` must call [`resolve_latest`]
/// to pin it to a `Named` label before the label is recorded anywhere,
/// per the "resolved label stays pinned for the operation" rule.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ReferenceId {
    SelfArtifact,
    Named(String),
    Latest,
}

/// Pins a `Latest` reference to the most recent backup label, per the
/// "latest resolves once at plan time, then stays pinned" rule. Any
/// other variant passes through unchanged.
pub fn resolve_latest(reference: ReferenceId, most_recent_label: &str) -> ReferenceId {
    match reference {
        ReferenceId::Latest => ReferenceId::Named(most_recent_label.to_string()),
        other => other,
    }
}

/// A contiguous run of `block_count` blocks, all from `reference`,
/// starting at `block_index` within that source's artifact.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockMapEntry {
    pub reference: ReferenceId,
    pub block_index: u64,
    pub block_count: u32,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BlockMap {
    pub block_size: u64,
    pub checksum_size: u64,
    pub reference_list: Vec<String>,
    pub entries: Vec<BlockMapEntry>,
    /// One `checksum_size`-byte digest per logical block of the file, in
    /// file order — independent of which source each block came from,
    /// used both to verify bytes read back off a reference artifact and
    /// to skip rewriting a target block whose current on-disk content
    /// already matches (the `--delta` restore path).
    pub digests: Vec<u8>,
}

impl BlockMap {
    pub fn block_count(&self) -> u64 {
        self.digests.len() as u64 / self.checksum_size
    }

    pub fn digest_at(&self, block_index: u64) -> &[u8] {
        let start = block_index as usize * self.checksum_size as usize;
        &self.digests[start..start + self.checksum_size as usize]
    }
}

/// The same truncated xxHash3-128 digest [`crate::filter::XxHashFilter`]
/// produces, so a reference's block-checksum list (built by
/// [`crate::filter::BlockChecksumFilter`]) and this module's own lookups
/// are always comparing like with like.
fn truncated_digest(block: &[u8], checksum_size: usize) -> Vec<u8> {
    let mut state = Xxh3::new();
    state.update(block);
    state.digest128().to_be_bytes()[..checksum_size].to_vec()
}

/// A reference backup's prior block-checksum list for one file, as
/// produced by [`crate::filter::BlockChecksumFilter`]'s result pack.
pub struct ReferenceBlockChecksums {
    pub label: String,
    pub checksum_size: usize,
    pub digests: Vec<Vec<u8>>,
}

impl ReferenceBlockChecksums {
    pub fn from_concat(label: impl Into<String>, checksum_size: usize, concat: &[u8]) -> Self {
        let digests = concat.chunks_exact(checksum_size).map(|c| c.to_vec()).collect();
        Self {
            label: label.into(),
            checksum_size,
            digests,
        }
    }
}

/// Extends the last entry when `block_index` continues it: either the
/// next sequential block of the same reference, or a repeat of the same
/// reference block (the degenerate case where several consecutive
/// current-file blocks all match one reference block because its content
/// recurs, e.g. a run of zeroed blocks) — both read back to the same
/// bytes, so both collapse into a single entry with a growing count.
/// Otherwise starts a new entry.
fn push_or_coalesce(entries: &mut Vec<BlockMapEntry>, reference: ReferenceId, block_index: u64) {
    if let Some(last) = entries.last_mut() {
        if last.reference == reference
            && (last.block_index + last.block_count as u64 == block_index || last.block_index == block_index)
        {
            last.block_count += 1;
            return;
        }
    }
    entries.push(BlockMapEntry {
        reference,
        block_index,
        block_count: 1,
    });
}

/// Streams `reader`, building a block map against `references` (checked
/// in listed order — the first reference whose corresponding block
/// matches wins). Returns the map plus the raw bytes for every block
/// that missed every reference and must be written into the current
/// backup artifact, in map order.
///
/// A match against a reference is only considered while the current
/// file's block position is still within that reference's own block
/// count — a reference can't supply bytes for a region of the current
/// file beyond what it ever contained, even if some later block happens
/// to collide on content (e.g. another run of zeroed blocks). Beyond
/// that bound, a block always falls back to `SelfArtifact`.
pub fn build_block_map(
    mut reader: impl Read,
    block_size: usize,
    checksum_size: usize,
    references: &[ReferenceBlockChecksums],
) -> Result<(BlockMap, Vec<u8>)> {
    let mut index: HashMap<Vec<u8>, (String, u64)> = HashMap::new();
    let mut reference_block_counts: HashMap<String, u64> = HashMap::new();
    for reference in references {
        reference_block_counts
            .entry(reference.label.clone())
            .or_insert(reference.digests.len() as u64);
        for (i, digest) in reference.digests.iter().enumerate() {
            index.entry(digest.clone()).or_insert((reference.label.clone(), i as u64));
        }
    }

    let mut entries = Vec::new();
    let mut digests = Vec::new();
    let mut self_bytes = Vec::new();
    let mut self_block_index: u64 = 0;
    let mut position: u64 = 0;
    let mut buf = vec![0u8; block_size];

    loop {
        let n = read_block(&mut reader, &mut buf)?;
        if n == 0 {
            break;
        }
        let block = &buf[..n];
        let digest = truncated_digest(block, checksum_size);

        let matched = index
            .get(&digest)
            .filter(|(label, _)| position < reference_block_counts[label]);

        match matched {
            Some((label, ref_block_index)) => {
                push_or_coalesce(&mut entries, ReferenceId::Named(label.clone()), *ref_block_index);
            }
            None => {
                self_bytes.extend_from_slice(block);
                push_or_coalesce(&mut entries, ReferenceId::SelfArtifact, self_block_index);
                self_block_index += 1;
            }
        }
        digests.extend_from_slice(&digest);
        position += 1;
    }

    Ok((
        BlockMap {
            block_size: block_size as u64,
            checksum_size: checksum_size as u64,
            reference_list: references.iter().map(|r| r.label.clone()).collect(),
            entries,
            digests,
        },
        self_bytes,
    ))
}

/// Reads up to `buf.len()` bytes, returning fewer only at end-of-file
/// (unlike a bare `Read::read`, which may short-read without meaning
/// EOF) — block boundaries must be exact for the checksums above to
/// mean anything.
fn read_block(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).map_err(|e| PgxError::FileRead {
            path: "<block-map source>".into(),
            source: e,
        })?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Opens a seekable reader for a block map entry's source artifact:
/// `SelfArtifact` is the backup artifact currently being written (for the
/// rare case a restore needs bytes from it, e.g. verifying a just-built
/// map); `Named(label)` opens that prior backup's stored artifact for
/// this file.
pub trait BlockSourceReader {
    fn open(&mut self, reference: &ReferenceId) -> Result<Box<dyn ReadSeek + '_>>;
}

pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// Replays `map` into `target`, a seekable writer, so entries can be
/// applied out of logical order if a caller ever wants to (restore
/// currently always applies them in order, but nothing here requires
/// it). `existing_digest`, when given, supports the `--delta` path: a
/// block whose current on-disk digest already matches the map's is
/// skipped — no read from the reference artifact, no write to target.
pub fn restore_block_map(
    map: &BlockMap,
    reader: &mut dyn BlockSourceReader,
    target: &mut (impl Write + Seek),
    existing_digest: Option<&dyn Fn(u64) -> Option<Vec<u8>>>,
) -> Result<()> {
    let block_size = map.block_size as usize;
    let mut logical_block = 0u64;

    for entry in &map.entries {
        let mut source_reader = reader.open(&entry.reference)?;
        source_reader
            .seek(SeekFrom::Start(entry.block_index * map.block_size))
            .map_err(|e| PgxError::FileRead {
                path: format!("{:?}", entry.reference).into(),
                source: e,
            })?;

        for _ in 0..entry.block_count {
            let digest = map.digest_at(logical_block).to_vec();

            let skip = existing_digest
                .map(|f| f(logical_block).as_deref() == Some(digest.as_slice()))
                .unwrap_or(false);

            if skip {
                source_reader
                    .seek(SeekFrom::Current(block_size as i64))
                    .map_err(|e| PgxError::FileRead {
                        path: "<block-map source>".into(),
                        source: e,
                    })?;
            } else {
                let mut block = vec![0u8; block_size];
                let n = read_block(&mut source_reader, &mut block)?;
                block.truncate(n);

                let actual_digest = truncated_digest(&block, map.checksum_size as usize);
                if actual_digest != digest {
                    return Err(PgxError::Checksum(format!(
                        "block {logical_block} of {:?} failed verification",
                        entry.reference
                    )));
                }

                target
                    .seek(SeekFrom::Start(logical_block * map.block_size))
                    .map_err(|e| PgxError::FileWrite {
                        path: "<restore target>".into(),
                        source: e,
                    })?;
                target.write_all(&block).map_err(|e| PgxError::FileWrite {
                    path: "<restore target>".into(),
                    source: e,
                })?;
            }

            logical_block += 1;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn blocks(s: &[u8], block_size: usize) -> Vec<Vec<u8>> {
        s.chunks(block_size).map(|c| c.to_vec()).collect()
    }

    fn checksum_list(s: &[u8], block_size: usize, checksum_size: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for block in blocks(s, block_size) {
            out.extend_from_slice(&truncated_digest(&block, checksum_size));
        }
        out
    }

    #[test]
    fn all_new_blocks_produce_single_self_entry() {
        let data = vec![0u8; 64 * 1024];
        let (map, self_bytes) = build_block_map(Cursor::new(&data), 8192, 6, &[]).unwrap();
        assert_eq!(map.entries.len(), 1);
        assert_eq!(map.entries[0].reference, ReferenceId::SelfArtifact);
        assert_eq!(map.entries[0].block_count, 8);
        assert_eq!(self_bytes.len(), data.len());
    }

    #[test]
    fn partial_block_overlap_produces_expected_four_entry_map() {
        // Matches the documented diff scenario: 96 KiB file, 8 KiB
        // blocks, first 16 KiB and last 48 KiB identical to the 64 KiB
        // all-zero reference, middle 32 KiB is new "ones" content.
        let block_size = 8192;
        let zeros_64k = vec![0u8; 64 * 1024];
        let reference = ReferenceBlockChecksums::from_concat(
            "full",
            6,
            &checksum_list(&zeros_64k, block_size, 6),
        );

        let mut new_file = vec![0u8; 16 * 1024];
        new_file.extend(vec![1u8; 32 * 1024]);
        new_file.extend(vec![0u8; 48 * 1024]);

        let (map, self_bytes) = build_block_map(Cursor::new(&new_file), block_size, 6, &[reference]).unwrap();

        assert_eq!(map.entries.len(), 4);
        assert_eq!(map.entries[0], BlockMapEntry { reference: ReferenceId::Named("full".into()), block_index: 0, block_count: 2 });
        assert_eq!(map.entries[1], BlockMapEntry { reference: ReferenceId::SelfArtifact, block_index: 0, block_count: 4 });
        assert_eq!(map.entries[2], BlockMapEntry { reference: ReferenceId::Named("full".into()), block_index: 0, block_count: 2 });
        assert_eq!(map.entries[3], BlockMapEntry { reference: ReferenceId::SelfArtifact, block_index: 4, block_count: 4 });
        // Both self runs land in the artifact: the 32 KiB of "ones" plus
        // the 32 KiB zero tail, which falls back to self once position
        // moves past the reference's own 8-block extent.
        assert_eq!(self_bytes.len(), 64 * 1024);
    }

    struct FakeReader {
        current: Vec<u8>,
        references: HashMap<String, Vec<u8>>,
    }

    impl BlockSourceReader for FakeReader {
        fn open(&mut self, reference: &ReferenceId) -> Result<Box<dyn ReadSeek + '_>> {
            let bytes: &Vec<u8> = match reference {
                ReferenceId::SelfArtifact => &self.current,
                ReferenceId::Named(label) => self.references.get(label).expect("reference present"),
            };
            Ok(Box::new(Cursor::new(bytes.clone())))
        }
    }

    #[test]
    fn restore_reassembles_original_bytes_from_map_and_sources() {
        let block_size = 8192;
        let zeros_64k = vec![0u8; 64 * 1024];
        let reference = ReferenceBlockChecksums::from_concat("full", 6, &checksum_list(&zeros_64k, block_size, 6));

        let mut new_file = vec![0u8; 16 * 1024];
        new_file.extend(vec![1u8; 32 * 1024]);
        new_file.extend(vec![0u8; 48 * 1024]);

        let (map, self_bytes) = build_block_map(Cursor::new(&new_file), block_size, 6, &[reference]).unwrap();

        let mut references = HashMap::new();
        references.insert("full".to_string(), zeros_64k);
        let mut fake_reader = FakeReader {
            current: self_bytes,
            references,
        };

        let mut target = Cursor::new(vec![0u8; new_file.len()]);
        restore_block_map(&map, &mut fake_reader, &mut target, None).unwrap();

        assert_eq!(target.into_inner(), new_file);
    }

    #[test]
    fn delta_restore_skips_blocks_whose_existing_digest_already_matches() {
        let block_size = 8192;
        let data = vec![7u8; 16 * 1024];
        let (map, self_bytes) = build_block_map(Cursor::new(&data), block_size, 6, &[]).unwrap();

        let mut references = HashMap::new();
        references.insert("full".to_string(), Vec::new());
        let mut fake_reader = FakeReader {
            current: self_bytes,
            references,
        };

        // Target already has correct content at block 0 but is wrong
        // (zeroed) at block 1.
        let mut target_data = data.clone();
        target_data[8192..].fill(0);
        let mut target = Cursor::new(target_data);

        let map_clone = map.clone();
        let existing_digest = move |block_index: u64| -> Option<Vec<u8>> {
            if block_index == 0 {
                Some(map_clone.digest_at(0).to_vec())
            } else {
                None
            }
        };

        restore_block_map(&map, &mut fake_reader, &mut target, Some(&existing_digest)).unwrap();
        assert_eq!(target.into_inner(), data);
    }
}
