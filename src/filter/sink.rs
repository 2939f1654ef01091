//! Sink filter: discards all input, reporting `done` immediately (grounded
//! on `examples/original_source/src/common/io/filter/sink.c`). Lets a
//! caller measure pipeline throughput without keeping produced bytes.

use super::{Capabilities, IoFilter};
use crate::buffer::ByteBuf;

pub struct SinkFilter;

impl SinkFilter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SinkFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl IoFilter for SinkFilter {
    fn filter_type(&self) -> &'static str {
        "sink"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::terminal_in()
    }

    fn process_in(&mut self, _input: &[u8]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_accepts_but_yields_nothing() {
        let mut sink = SinkFilter::new();
        sink.process_in(b"anything");
        assert!(sink.result().is_none());
    }
}
