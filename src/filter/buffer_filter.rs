//! Implicit trailing buffer-adapter filter.
//!
//! Pure pass-through: exists so a [`super::FilterGroup`] whose last real
//! filter is `In`-only (e.g. a trailing hash) can still be driven through
//! fixed-size I/O buffers by its caller.

use super::{Capabilities, IoFilter};
use crate::buffer::ByteBuf;

pub struct BufferFilter {
    done: bool,
}

impl BufferFilter {
    pub fn new() -> Self {
        Self { done: false }
    }
}

impl Default for BufferFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl IoFilter for BufferFilter {
    fn filter_type(&self) -> &'static str {
        "buffer"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::in_out()
    }

    fn process_in_out(&mut self, input: Option<&[u8]>, output: &mut ByteBuf) {
        match input {
            Some(bytes) => output.cat(bytes, 0, bytes.len()),
            None => self.done = true,
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }
}
