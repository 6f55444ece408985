use sha2::{Digest, Sha256};

/// Lowercase, collapse internal whitespace runs to a single space, trim.
pub fn normalize_message(message: &str) -> String {
    let lower = message.to_lowercase();
    let collapsed = lower.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim().to_string()
}

/// 64-char lowercase hex SHA-256 over `user_id|event_type|normalized_message|source`.
pub fn build_fingerprint(user_id: &str, event_type: &str, message: &str, source: &str) -> String {
    let normalized = normalize_message(message);
    let input = format!("{user_id}|{event_type}|{normalized}|{source}");
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(digest)
}
