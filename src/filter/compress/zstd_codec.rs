pub fn compress(level: i32, input: &[u8]) -> Vec<u8> {
    zstd::stream::encode_all(input, level).expect("in-memory zstd encode cannot fail")
}

pub fn decompress(input: &[u8]) -> Result<Vec<u8>, String> {
    zstd::stream::decode_all(input).map_err(|_| "unexpected eof in compressed data".to_string())
}
