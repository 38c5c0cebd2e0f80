//! Short, time ordered identifiers.
//!
//! Ids are the base-32 form of a millisecond counter starting at the forum
//! epoch (2018-01-01T00:00:00Z), padded to eight characters. Eight
//! characters cover 2^40 ms, a little under 35 years, after which ids grow
//! to nine. Ids of equal length sort lexically in creation order, and the
//! same encoding is used for slice cursors.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use rand::Rng;

const ALPHABET: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";

pub const MIN_ID_LEN: usize = 8;

/// 2018-01-01T00:00:00Z in unix milliseconds.
pub const EPOCH_MS: i64 = 1_514_764_800_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("empty id")]
    Empty,

    #[error("invalid character '{0}' in id")]
    InvalidCharacter(char),

    #[error("id out of range")]
    Overflow,
}

pub fn encode(value: i64) -> String {
    let mut v = value.max(0) as u64;
    let mut out = Vec::with_capacity(MIN_ID_LEN + 1);
    while v > 0 {
        out.push(ALPHABET[(v & 31) as usize]);
        v >>= 5;
    }
    while out.len() < MIN_ID_LEN {
        out.push(b'0');
    }
    out.reverse();
    // alphabet is ASCII
    out.into_iter().map(char::from).collect()
}

pub fn decode(id: &str) -> Result<i64, IdError> {
    if id.is_empty() {
        return Err(IdError::Empty);
    }
    let mut value: i64 = 0;
    for c in id.chars() {
        let digit = digit_of(c).ok_or(IdError::InvalidCharacter(c))?;
        value = value
            .checked_mul(32)
            .and_then(|v| v.checked_add(digit))
            .ok_or(IdError::Overflow)?;
    }
    Ok(value)
}

fn digit_of(c: char) -> Option<i64> {
    match c {
        '0'..='9' => Some(c as i64 - '0' as i64),
        'a'..='v' => Some(c as i64 - 'a' as i64 + 10),
        _ => None,
    }
}

/// True for strings shaped like an anonymous author: exactly eight
/// characters from the id alphabet.
pub fn looks_like_id(s: &str) -> bool {
    s.chars().count() == MIN_ID_LEN && s.chars().all(|c| digit_of(c).is_some())
}

/// Random eight character author id, unrelated to creation time.
pub fn anonymous_id() -> String {
    let mut rng = rand::thread_rng();
    (0..MIN_ID_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Hands out strictly increasing sequence values, never behind the clock.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicI64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start after `last`, typically the largest sequence already stored.
    pub fn seeded(last: i64) -> Self {
        Self {
            last: AtomicI64::new(last),
        }
    }

    pub fn next_seq(&self) -> i64 {
        let now = Utc::now().timestamp_millis() - EPOCH_MS;
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(prev + 1)
    }

    /// Next sequence value together with its encoded id.
    pub fn next_id(&self) -> (i64, String) {
        let seq = self.next_seq();
        (seq, encode(seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn encode_pads_to_eight_chars() {
        assert_eq!(encode(0), "00000000");
        assert_eq!(encode(31), "0000000v");
        assert_eq!(encode(32), "00000010");
    }

    #[test]
    fn ids_grow_to_nine_chars_after_two_to_the_forty_ms() {
        assert_eq!(encode((1 << 40) - 1).len(), 8);
        assert_eq!(encode(1 << 40).len(), 9);
    }

    #[test]
    fn decode_inverts_encode() {
        for v in [0, 1, 31, 32, 1_000_000, 200_000_000_000, (1 << 40) + 7] {
            assert_eq!(decode(&encode(v)).unwrap(), v);
        }
    }

    #[test]
    fn decode_rejects_bad_input() {
        assert_eq!(decode(""), Err(IdError::Empty));
        assert_eq!(decode("abcw1234"), Err(IdError::InvalidCharacter('w')));
        assert_eq!(decode("ABCDEFGH"), Err(IdError::InvalidCharacter('A')));
        assert_eq!(decode(&"v".repeat(14)), Err(IdError::Overflow));
    }

    #[test]
    fn equal_length_ids_sort_in_sequence_order() {
        let a = encode(123_456_789);
        let b = encode(123_456_790);
        assert!(a < b);
    }

    #[test]
    fn generator_is_strictly_increasing() {
        let gen = IdGenerator::new();
        let mut last = gen.next_seq();
        for _ in 0..1000 {
            let next = gen.next_seq();
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn generator_tracks_wall_clock() {
        let gen = IdGenerator::new();
        let now = Utc::now().timestamp_millis() - EPOCH_MS;
        let seq = gen.next_seq();
        assert!(seq >= now);
        assert_eq!(gen.next_id().1.len(), 8);
    }

    #[test]
    fn seeded_generator_never_reissues() {
        let far_future = (1 << 41) + 5;
        let gen = IdGenerator::seeded(far_future);
        assert_eq!(gen.next_seq(), far_future + 1);
    }

    #[test]
    fn generator_is_unique_across_threads() {
        let gen = Arc::new(IdGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gen = gen.clone();
                std::thread::spawn(move || (0..500).map(|_| gen.next_seq()).collect::<Vec<_>>())
            })
            .collect();
        let mut seen = HashSet::new();
        for handle in handles {
            for seq in handle.join().unwrap() {
                assert!(seen.insert(seq));
            }
        }
    }

    #[test]
    fn anonymous_ids_look_like_ids() {
        let id = anonymous_id();
        assert_eq!(id.len(), 8);
        assert!(looks_like_id(&id));
        assert!(decode(&id).is_ok());
    }

    #[test]
    fn names_are_not_ids() {
        assert!(!looks_like_id("alice"));
        assert!(!looks_like_id("小明同学的名字"));
        assert!(!looks_like_id("zzzzzzzz"));
        assert!(looks_like_id("0a1b2c3d"));
        assert!(!looks_like_id("christina"));
        assert!(!looks_like_id("beachball"));
    }
}
