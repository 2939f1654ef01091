//! `FilterGroup` — an ordered pipeline of filters driven by a caller that
//! owns the I/O buffers.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use super::{BufferFilter, IoFilter};
use crate::buffer::ByteBuf;
use crate::error::{CancelToken, PgxError, Result};
use crate::pack::Pack;

/// Scratch buffer size used to drive each in-out filter one step at a
/// time; unrelated to any caller-visible chunking — in-out filters must
/// fill this when possible, but callers of `FilterGroup` only see the
/// final joined byte stream.
const SCRATCH_SIZE: usize = 64 * 1024;

/// Result packs collected in filter order at end-of-stream, named by
/// filter type.
#[derive(Debug, Default)]
pub struct FilterResults {
    entries: Vec<(String, Pack)>,
}

impl FilterResults {
    pub fn get(&self, filter_type: &str) -> Option<&Pack> {
        self.entries.iter().find(|(name, _)| name == filter_type).map(|(_, p)| p)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Pack)> {
        self.entries.iter()
    }

    pub fn as_map(&self) -> BTreeMap<String, Pack> {
        self.entries.iter().cloned().collect()
    }
}

pub struct FilterGroup {
    stages: Vec<Box<dyn IoFilter>>,
    cancel: CancelToken,
}

impl FilterGroup {
    /// Builds a group from `stages`. If the last stage is not an in-out
    /// filter, an implicit [`BufferFilter`] is appended so the group can
    /// always be driven with fixed-size I/O buffers.
    pub fn new(mut stages: Vec<Box<dyn IoFilter>>) -> Self {
        let needs_trailing_buffer = match stages.last() {
            Some(last) => !last.capabilities().accepts_in_out,
            None => true,
        };
        if needs_trailing_buffer {
            stages.push(Box::new(BufferFilter::new()));
        }
        Self {
            stages,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Drives `reader` through the pipeline, writing the transformed
    /// bytes to `writer`. Byte order is preserved end-to-end. Each read
    /// is a cancellation point.
    pub fn run(&mut self, reader: &mut dyn Read, writer: &mut dyn Write) -> Result<FilterResults> {
        let mut read_buf = vec![0u8; SCRATCH_SIZE];
        loop {
            self.cancel.check()?;
            let n = reader
                .read(&mut read_buf)
                .map_err(|e| PgxError::FileRead {
                    path: "<stream>".into(),
                    source: e,
                })?;
            if n == 0 {
                break;
            }
            self.push_from(0, &read_buf[..n], writer)?;
        }

        self.flush_from(0, writer)?;

        for stage in self.stages.iter() {
            stage.check_format()?;
        }

        let mut results = FilterResults::default();
        for stage in self.stages.iter_mut() {
            if stage.capabilities().yields_result {
                if let Some(pack) = stage.result() {
                    results.entries.push((stage.filter_type().to_string(), pack));
                }
            }
        }
        Ok(results)
    }

    /// Pushes `data` through stages `[idx..]`, writing whatever emerges
    /// from the tail to `writer`.
    fn push_from(&mut self, idx: usize, data: &[u8], writer: &mut dyn Write) -> Result<()> {
        if idx >= self.stages.len() {
            if !data.is_empty() {
                writer.write_all(data).map_err(|e| PgxError::FileWrite {
                    path: "<stream>".into(),
                    source: e,
                })?;
            }
            return Ok(());
        }

        let produced = self.drive_push(idx, data);
        self.push_from(idx + 1, &produced, writer)
    }

    /// Drives a single stage with a normal (non-flush) push of `data`,
    /// returning the bytes it produces.
    fn drive_push(&mut self, idx: usize, data: &[u8]) -> Vec<u8> {
        let stage = &mut self.stages[idx];
        let caps = stage.capabilities();

        if caps.accepts_in_out {
            let mut out = Vec::new();
            let mut scratch = ByteBuf::new(SCRATCH_SIZE);
            loop {
                stage.process_in_out(Some(data), &mut scratch);
                out.extend_from_slice(scratch.as_used_slice());
                scratch.clear();
                if !stage.is_input_same() {
                    break;
                }
            }
            out
        } else {
            if caps.accepts_in {
                stage.process_in(data);
            }
            if caps.terminal {
                Vec::new()
            } else {
                data.to_vec()
            }
        }
    }

    /// Cascades end-of-stream flush through stages `[idx..]`: stage
    /// `idx`'s own flush output is pushed forward (recursively flushing
    /// anything it produces too), then stage `idx+1`'s flush runs.
    fn flush_from(&mut self, idx: usize, writer: &mut dyn Write) -> Result<()> {
        if idx >= self.stages.len() {
            return Ok(());
        }

        let produced = {
            let stage = &mut self.stages[idx];
            let caps = stage.capabilities();
            if caps.accepts_in_out {
                let mut out = Vec::new();
                let mut scratch = ByteBuf::new(SCRATCH_SIZE);
                // Filters must set `done` within a bounded number of
                // `None` calls even on a truncated/malformed stream
                // (surfacing the problem via `check_format` instead of
                // looping forever) — see the `IoFilter::check_format` doc.
                loop {
                    stage.process_in_out(None, &mut scratch);
                    out.extend_from_slice(scratch.as_used_slice());
                    scratch.clear();
                    if stage.is_done() {
                        break;
                    }
                }
                out
            } else {
                Vec::new()
            }
        };

        if !produced.is_empty() {
            self.push_from(idx + 1, &produced, writer)?;
        }

        self.flush_from(idx + 1, writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{ChunkDecodeFilter, ChunkEncodeFilter, SizeFilter};

    #[test]
    fn empty_group_gets_implicit_buffer_filter() {
        let group = FilterGroup::new(vec![]);
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn size_filter_is_pass_through_and_reports_total() {
        let mut group = FilterGroup::new(vec![Box::new(SizeFilter::new())]);
        let input = b"hello world".to_vec();
        let mut output = Vec::new();
        let results = group.run(&mut input.as_slice(), &mut output).unwrap();
        assert_eq!(output, input);
        let size_pack = results.get("size").unwrap();
        assert_eq!(size_pack.get_u64(0), Some(input.len() as u64));
    }

    #[test]
    fn chunk_encode_then_decode_round_trips() {
        let input: Vec<u8> = (0..20000u32).map(|i| (i % 251) as u8).collect();

        let mut encode_group = FilterGroup::new(vec![Box::new(ChunkEncodeFilter::new())]);
        let mut encoded = Vec::new();
        encode_group.run(&mut input.as_slice(), &mut encoded).unwrap();

        let mut decode_group = FilterGroup::new(vec![Box::new(ChunkDecodeFilter::new())]);
        let mut decoded = Vec::new();
        decode_group.run(&mut encoded.as_slice(), &mut decoded).unwrap();

        assert_eq!(decoded, input);
    }
}
