use std::io::Read;

use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;

pub fn compress(level: i32, input: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(input, Compression::new(level.clamp(0, 9) as u32));
    let mut out = Vec::new();
    encoder.read_to_end(&mut out).expect("in-memory gzip encode cannot fail");
    out
}

pub fn decompress(input: &[u8]) -> Result<Vec<u8>, String> {
    let mut decoder = GzDecoder::new(input);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|_| "unexpected eof in compressed data".to_string())?;
    Ok(out)
}
