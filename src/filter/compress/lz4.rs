pub fn compress(input: &[u8]) -> Vec<u8> {
    lz4_flex::block::compress_prepend_size(input)
}

pub fn decompress(input: &[u8]) -> Result<Vec<u8>, String> {
    lz4_flex::block::decompress_size_prepended(input)
        .map_err(|_| "unexpected eof in compressed data".to_string())
}
