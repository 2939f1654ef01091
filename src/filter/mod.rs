//! The `IoFilter` contract and the `FilterGroup` pipeline driver.

mod block_checksum;
mod buffer_filter;
mod chunk;
mod cipher;
mod compress;
mod group;
mod hash;
mod page_checksum;
mod sink;
mod size;
mod xxhash_filter;

pub use block_checksum::BlockChecksumFilter;
pub use buffer_filter::BufferFilter;
pub use chunk::{ChunkDecodeFilter, ChunkEncodeFilter};
pub use cipher::{CipherFilter, CipherMode};
pub use compress::{CompressAlgorithm, DecompressFilter, compress_filter};
pub use group::{FilterGroup, FilterResults};
pub use hash::{HashAlgorithm, HashFilter};
pub use page_checksum::PageChecksumFilter;
pub use sink::SinkFilter;
pub use size::SizeFilter;
pub use xxhash_filter::XxHashFilter;

use crate::buffer::ByteBuf;
use crate::pack::Pack;

/// Which execution shapes a filter supports. Not all combinations
/// coexist: an `In` filter never reports `done`/`input_same` (it has no
/// internal buffering to flush), and `yields_result` is independent of
/// the other three.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub accepts_in: bool,
    pub accepts_in_out: bool,
    pub reports_done: bool,
    pub reports_input_same: bool,
    pub yields_result: bool,
    /// `In` filters normally mirror bytes downstream unchanged so later
    /// stages still see the stream (e.g. a block-checksum observer sits
    /// ahead of the compressor). A filter that sets this discards bytes
    /// instead — only the terminal [`SinkFilter`] does this.
    pub terminal: bool,
}

impl Capabilities {
    pub const fn pass_through_in() -> Self {
        Self {
            accepts_in: true,
            accepts_in_out: false,
            reports_done: false,
            reports_input_same: false,
            yields_result: false,
            terminal: false,
        }
    }

    pub const fn pass_through_in_with_result() -> Self {
        Self {
            yields_result: true,
            ..Self::pass_through_in()
        }
    }

    pub const fn terminal_in() -> Self {
        Self {
            terminal: true,
            ..Self::pass_through_in()
        }
    }

    pub const fn in_out() -> Self {
        Self {
            accepts_in: false,
            accepts_in_out: true,
            reports_done: true,
            reports_input_same: true,
            yields_result: false,
            terminal: false,
        }
    }
}

/// A streaming transformer with a stable identifier and a capability
/// vector. Every filter may be re-instantiated from its parameter
/// `Pack` so it can cross a worker-process boundary.
pub trait IoFilter: Send {
    /// Stable filter-type name (the in-process stand-in for a packed
    /// `StringId` — see [`crate::stringid`] for the wire encoding used
    /// when this name crosses a process boundary).
    fn filter_type(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Parameters this filter was constructed with, for cross-process
    /// re-instantiation. `None` for filters with no parameters.
    fn params(&self) -> Option<Pack> {
        None
    }

    /// `In` filters: observe `input` without producing per-call output.
    /// The pipeline driver forwards `input` unchanged to the next stage
    /// — an `In` filter is an observer, not a sink.
    fn process_in(&mut self, _input: &[u8]) {}

    /// `In-Out` filters: consume from `input` (or flush when `input` is
    /// `None`), writing to `output`. Must fill `output` fully when
    /// possible.
    fn process_in_out(&mut self, _input: Option<&[u8]>, _output: &mut ByteBuf) {}

    /// True if the output buffer filled before `input` fully drained —
    /// the driver must resume this filter with the *same* input on the
    /// next call.
    fn is_input_same(&self) -> bool {
        false
    }

    /// True once internally finished, even with no further input. Must
    /// tolerate one more call with `input = None` to flush.
    fn is_done(&self) -> bool {
        false
    }

    /// Scalar result captured at end-of-stream, e.g. a digest or a
    /// block-checksum list.
    fn result(&mut self) -> Option<Pack> {
        None
    }

    /// Checked once after end-of-stream flush. Filters that can detect a
    /// malformed stream only once no further input can arrive (truncated
    /// chunk framing, compressed data that never reached its internal
    /// stream-end marker) report it here rather than panicking mid-flush.
    fn check_format(&self) -> crate::error::Result<()> {
        Ok(())
    }
}
