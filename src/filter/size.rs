//! Byte-counting filter. Pass-through `In` filter whose result carries
//! the total bytes seen.

use super::{Capabilities, IoFilter};
use crate::pack::Pack;

pub struct SizeFilter {
    total: u64,
}

impl SizeFilter {
    pub fn new() -> Self {
        Self { total: 0 }
    }
}

impl Default for SizeFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl IoFilter for SizeFilter {
    fn filter_type(&self) -> &'static str {
        "size"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::pass_through_in_with_result()
    }

    fn process_in(&mut self, input: &[u8]) {
        self.total += input.len() as u64;
    }

    fn result(&mut self) -> Option<Pack> {
        let mut pack = Pack::new();
        pack.write_u64(self.total);
        Some(pack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_all_bytes_observed() {
        let mut filter = SizeFilter::new();
        filter.process_in(b"abc");
        filter.process_in(b"de");
        let pack = filter.result().unwrap();
        assert_eq!(pack.get_u64(0), Some(5));
    }
}
