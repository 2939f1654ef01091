//! Chunked framing filter. Encodes an unknown-length byte stream as
//! `C0 C1 … Ck 0`, each `Ci = varint128(size_i) || bytes(size_i)` with
//! the first size absolute and subsequent sizes `zigzag(Δsize) + 1`.
//!
//! Ported from
//! `examples/original_source/src/common/io/filter/chunk.c`: the `buffer`/
//! `buffer_offset`/`size_last`/`done`/`header` state machine is kept
//! verbatim in shape, substituting owned `Vec<u8>` slices for the source's
//! raw pointer into either the header scratch or the caller's input
//! buffer.

use super::{Capabilities, IoFilter};
use crate::buffer::ByteBuf;
use crate::varint::{decode_varint128, encode_varint128, from_zigzag, to_zigzag};

enum Source {
    None,
    Header(Vec<u8>),
    Body,
}

pub struct ChunkEncodeFilter {
    source: Source,
    body_offset: usize,
    size_last: Option<usize>,
    done: bool,
}

impl ChunkEncodeFilter {
    pub fn new() -> Self {
        Self {
            source: Source::None,
            body_offset: 0,
            size_last: None,
            done: false,
        }
    }
}

impl Default for ChunkEncodeFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl IoFilter for ChunkEncodeFilter {
    fn filter_type(&self) -> &'static str {
        "chunk-encode"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::in_out()
    }

    fn process_in_out(&mut self, input: Option<&[u8]>, output: &mut ByteBuf) {
        match input {
            Some(input) => {
                if matches!(self.source, Source::None) {
                    let size = to_header_size(input.len(), self.size_last);
                    let mut header = Vec::new();
                    encode_varint128(size, &mut header);
                    self.size_last = Some(input.len());
                    self.source = Source::Header(header);
                }

                loop {
                    match &self.source {
                        Source::Header(header) => {
                            let remaining = header.len() - self.body_offset;
                            if output.remaining() >= remaining {
                                output.cat(header, self.body_offset, remaining);
                                self.source = Source::Body;
                                self.body_offset = 0;
                            } else {
                                let take = output.remaining();
                                output.cat(header, self.body_offset, take);
                                self.body_offset += take;
                            }
                        }
                        Source::Body => {
                            let remaining = input.len() - self.body_offset;
                            if output.remaining() >= remaining {
                                output.cat(input, self.body_offset, remaining);
                                self.source = Source::None;
                                self.body_offset = 0;
                            } else {
                                let take = output.remaining();
                                output.cat(input, self.body_offset, take);
                                self.body_offset += take;
                            }
                        }
                        Source::None => break,
                    }
                    if self.is_input_same() || output.is_full() {
                        break;
                    }
                }
            }
            None => {
                assert!(output.remaining() > 0, "chunk terminator needs one free byte");
                output.cat(&[0u8], 0, 1);
                self.done = true;
            }
        }
    }

    fn is_input_same(&self) -> bool {
        !matches!(self.source, Source::None)
    }

    fn is_done(&self) -> bool {
        self.done && !self.is_input_same()
    }
}

fn to_header_size(current_len: usize, size_last: Option<usize>) -> u64 {
    match size_last {
        None => current_len as u64,
        Some(last) => to_zigzag(current_len as i64 - last as i64) + 1,
    }
}

enum DecodeState {
    /// Waiting for (more of) a varint128 header.
    Header,
    /// Header parsed; `len` bytes of body remain, `written` already
    /// copied to the caller's output across however many calls it took.
    Body { len: usize, written: usize },
}

/// Decoder mirror: reads a `varint128` header, interprets it as absolute
/// or zigzag-delta depending on whether a previous chunk size is known,
/// then copies the body through — in pieces if the caller's output
/// buffer is smaller than the body, exactly like the encoder does for
/// its header/body source.
pub struct ChunkDecodeFilter {
    carry: Vec<u8>,
    state: DecodeState,
    size_last: Option<u64>,
    done: bool,
    /// Set when a header/body was only partially visible in the last
    /// input slice, or the output buffer filled mid-body — reported as
    /// `input_same` so the driver resupplies from the same logical
    /// position (here: appends more bytes to `carry` / calls again with
    /// a fresh output buffer).
    input_same: bool,
    /// End-of-stream arrived with an incomplete chunk still buffered.
    truncated: bool,
}

impl ChunkDecodeFilter {
    pub fn new() -> Self {
        Self {
            carry: Vec::new(),
            state: DecodeState::Header,
            size_last: None,
            done: false,
            input_same: false,
            truncated: false,
        }
    }
}

impl Default for ChunkDecodeFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl IoFilter for ChunkDecodeFilter {
    fn filter_type(&self) -> &'static str {
        "chunk-decode"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::in_out()
    }

    fn process_in_out(&mut self, input: Option<&[u8]>, output: &mut ByteBuf) {
        if let Some(input) = input {
            self.carry.extend_from_slice(input);
        }
        self.input_same = false;

        loop {
            match self.state {
                DecodeState::Header => {
                    let Some((header, header_len)) = decode_varint128(&self.carry) else {
                        if input.is_none() {
                            self.truncated = !self.carry.is_empty();
                            self.done = true;
                        } else {
                            self.input_same = true;
                        }
                        return;
                    };

                    if header == 0 {
                        self.carry.drain(0..header_len);
                        self.done = true;
                        return;
                    }

                    let body_len = match self.size_last {
                        None => header as usize,
                        Some(last) => {
                            let delta = from_zigzag(header - 1);
                            (last as i64 + delta) as usize
                        }
                    };
                    self.carry.drain(0..header_len);
                    self.size_last = Some(body_len as u64);
                    self.state = DecodeState::Body { len: body_len, written: 0 };
                }
                DecodeState::Body { len, written } => {
                    let available = self.carry.len().min(len - written);
                    if available == 0 {
                        if input.is_none() {
                            self.truncated = true;
                            self.done = true;
                        } else {
                            self.input_same = true;
                        }
                        return;
                    }

                    let take = available.min(output.remaining());
                    if take == 0 {
                        // Output buffer is full; resume the same body on
                        // the next call.
                        self.input_same = true;
                        return;
                    }

                    output.cat(&self.carry, 0, take);
                    self.carry.drain(0..take);
                    let written = written + take;
                    self.state = if written == len {
                        DecodeState::Header
                    } else {
                        DecodeState::Body { len, written }
                    };

                    if output.is_full() {
                        return;
                    }
                }
            }
        }
    }

    fn is_input_same(&self) -> bool {
        self.input_same
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn check_format(&self) -> crate::error::Result<()> {
        if self.truncated {
            Err(crate::error::PgxError::Format("unexpected eof in chunked data".into()))
        } else {
            Ok(())
        }
    }
}
