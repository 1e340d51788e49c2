use getrandom::getrandom;
use std::time::{SystemTime, UNIX_EPOCH};

const BASE36_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_WIDTH: usize = 4;
const SUFFIX_SPACE: u32 = 36 * 36 * 36 * 36;

/// Compact, sortable identifier: `<prefix>-<base36 timestamp>-<base36 random>`.
pub fn generate_id(prefix: &str, now: i64) -> String {
    let timestamp = u64::try_from(now).unwrap_or(0);
    let sample = random_sample() % SUFFIX_SPACE;
    format!(
        "{prefix}-{}-{}",
        base36_encode_u64(timestamp),
        base36_encode_fixed_u32(sample, SUFFIX_WIDTH)
    )
}

fn random_sample() -> u32 {
    let mut bytes = [0_u8; 4];
    if getrandom(&mut bytes).is_ok() {
        return u32::from_le_bytes(bytes);
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    nanos ^ std::process::id()
}

fn base36_encode_u64(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut chars = Vec::new();
    while value > 0 {
        chars.push(BASE36_ALPHABET[(value % 36) as usize] as char);
        value /= 36;
    }
    chars.into_iter().rev().collect()
}

fn base36_encode_fixed_u32(mut value: u32, width: usize) -> String {
    let mut chars = vec!['0'; width];
    for idx in (0..width).rev() {
        chars[idx] = BASE36_ALPHABET[(value % 36) as usize] as char;
        value /= 36;
    }
    chars.into_iter().collect()
}
