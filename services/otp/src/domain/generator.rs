//! Access code generation.
//!
//! Every digit is drawn independently and uniformly from `rand`'s thread-local
//! CSPRNG, which is seeded from the operating system. Nothing is derived from
//! time or from previous codes, so one code says nothing about the next.

use rand::RngExt;

use crate::domain::types::{AccessCode, MAX_CODE_LEN};

#[derive(Debug, Clone, Copy)]
pub struct CodeGenerator {
    len: usize,
}

impl CodeGenerator {
    /// `len` must be in `1..=MAX_CODE_LEN`; config validation enforces this.
    pub fn new(len: usize) -> Self {
        debug_assert!((1..=MAX_CODE_LEN).contains(&len));
        Self { len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of distinct codes of this length (10^len).
    pub fn space(&self) -> u64 {
        10u64.pow(self.len as u32)
    }

    pub fn generate(&self) -> AccessCode {
        let mut rng = rand::rng();
        let digits = (0..self.len)
            .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
            .collect();
        AccessCode::from_digits(digits)
    }
}
