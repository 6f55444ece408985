mod fingerprint;
mod simhash;

pub use fingerprint::{build_fingerprint, normalize_message};
pub use simhash::{hamming_distance, simhash};
