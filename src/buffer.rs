//! Owned byte buffer with used/size/remaining discipline.
//!
//! Backed by a plain `Vec<u8>`. The `used`/`size`/`remaining` vocabulary
//! is kept because every filter in this crate is reasoned about in
//! those terms.

/// `0 <= used <= size` always holds; see `tests` below for the invariant
/// check used throughout the filter pipeline's property tests.
#[derive(Debug, Clone)]
pub struct ByteBuf {
    data: Vec<u8>,
    used: usize,
}

impl ByteBuf {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0u8; size],
            used: 0,
        }
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        let used = data.len();
        Self { data, used }
    }

    pub fn resize(&mut self, size: usize) {
        self.data.resize(size, 0);
        if self.used > size {
            self.used = size;
        }
    }

    pub fn ptr(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn ptr_const(&self) -> &[u8] {
        &self.data
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.used
    }

    pub fn is_full(&self) -> bool {
        self.remaining() == 0
    }

    /// # Panics
    /// If `n > size()` — overflow here is a programming error.
    pub fn used_inc(&mut self, n: usize) {
        assert!(
            self.used + n <= self.data.len(),
            "used_inc overflow: used={} n={} size={}",
            self.used,
            n,
            self.data.len()
        );
        self.used += n;
    }

    /// # Panics
    /// If `n > size()`.
    pub fn used_set(&mut self, n: usize) {
        assert!(
            n <= self.data.len(),
            "used_set overflow: n={} size={}",
            n,
            self.data.len()
        );
        self.used = n;
    }

    /// Appends `src[src_offset..src_offset + src_size]` to this buffer's
    /// used region, advancing `used`. Overflow past `size` is a
    /// programming error, so this panics rather than erroring.
    pub fn cat(&mut self, src: &[u8], src_offset: usize, src_size: usize) {
        assert!(
            self.remaining() >= src_size,
            "cat overflow: remaining={} src_size={}",
            self.remaining(),
            src_size
        );
        let used = self.used;
        self.data[used..used + src_size].copy_from_slice(&src[src_offset..src_offset + src_size]);
        self.used += src_size;
    }

    pub fn as_used_slice(&self) -> &[u8] {
        &self.data[..self.used]
    }

    pub fn clear(&mut self) {
        self.used = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_holds_after_operations() {
        let mut buf = ByteBuf::new(8);
        assert_eq!(buf.remaining(), 8);
        buf.cat(b"hello", 0, 5);
        assert!(buf.used() <= buf.size());
        assert_eq!(buf.as_used_slice(), b"hello");
        assert_eq!(buf.remaining(), 3);
    }

    #[test]
    #[should_panic]
    fn cat_overflow_panics() {
        let mut buf = ByteBuf::new(2);
        buf.cat(b"abc", 0, 3);
    }

    #[test]
    fn resize_clamps_used() {
        let mut buf = ByteBuf::new(4);
        buf.used_set(4);
        buf.resize(2);
        assert_eq!(buf.used(), 2);
        assert_eq!(buf.size(), 2);
    }
}
