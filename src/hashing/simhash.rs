/// Tokenize by non-word boundaries, lowercase, drop tokens of length <= 2.
fn tokenize(message: &str) -> Vec<String> {
    message
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .filter(|t| t.chars().count() > 2)
        .collect()
}

/// 64-bit locality-sensitive hash of a message's token set. An empty token
/// set hashes to 0.
pub fn simhash(message: &str) -> u64 {
    let tokens = tokenize(message);
    if tokens.is_empty() {
        return 0;
    }

    let mut v = [0i64; 64];
    for token in &tokens {
        let digest = md5::compute(token.as_bytes());
        let hex_str = format!("{digest:x}");
        // First 16 hex chars (8 bytes) of the MD5 digest, as a 64-bit value.
        let h = u64::from_str_radix(&hex_str[0..16], 16).unwrap_or(0);
        for (i, slot) in v.iter_mut().enumerate() {
            if (h >> i) & 1 == 1 {
                *slot += 1;
            } else {
                *slot -= 1;
            }
        }
    }

    let mut hash: u64 = 0;
    for (i, slot) in v.iter().enumerate() {
        if *slot > 0 {
            hash |= 1 << i;
        }
    }
    hash
}

/// Popcount of the XOR of two 64-bit values.
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}
