//! Time-sorted identifiers
//!
//! 64-bit ids rendered as 13 Crockford Base32 characters, so lexical order
//! follows creation order.

use chrono::Utc;
use rand::Rng;
use std::sync::atomic::{AtomicU16, Ordering};

/// Crockford Base32 alphabet (excludes I, L, O, U)
const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const ENCODED_LEN: usize = 13;

static COUNTER: AtomicU16 = AtomicU16::new(0);

pub struct TsidGenerator;

impl TsidGenerator {
    /// Generate a new id.
    ///
    /// Layout: 42 bits millisecond timestamp | 10 bits random | 12 bits counter.
    pub fn generate() -> String {
        let millis = Utc::now().timestamp_millis().max(0) as u64;
        let counter = COUNTER.fetch_add(1, Ordering::Relaxed) as u64;
        let random: u64 = rand::thread_rng().gen_range(0..1024);

        let value = ((millis & 0x3FF_FFFF_FFFF) << 22) | (random << 12) | (counter & 0xFFF);
        encode(value)
    }
}

fn encode(mut value: u64) -> String {
    let mut out = [b'0'; ENCODED_LEN];
    for slot in out.iter_mut().rev() {
        *slot = ALPHABET[(value & 0x1F) as usize];
        value >>= 5;
    }
    out.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_shape() {
        let id = TsidGenerator::generate();
        assert_eq!(id.len(), 13);
        assert!(id.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn test_uniqueness() {
        let ids: HashSet<String> = (0..2000).map(|_| TsidGenerator::generate()).collect();
        assert_eq!(ids.len(), 2000);
    }

    #[test]
    fn test_encode() {
        assert_eq!(encode(0), "0000000000000");
        assert_eq!(encode(31), "000000000000Z");
        assert_eq!(encode(32), "0000000000010");
        assert!(encode(1) < encode(u64::MAX >> 1));
    }

    #[test]
    fn test_time_ordering() {
        let first = TsidGenerator::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = TsidGenerator::generate();
        assert!(first < second);
    }
}
