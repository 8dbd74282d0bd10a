use sha2::{Digest, Sha256};

/// SHA-256 of arbitrary bytes as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Short content-derived identifier: `<prefix>_<first 12 hex of sha256>`.
///
/// Parts are joined with `\x1f` so `("ab", "c")` and `("a", "bc")` hash
/// differently.
pub fn short_id(prefix: &str, parts: &[&str]) -> String {
    let joined = parts.join("\u{1f}");
    format!("{prefix}_{}", &sha256_hex(joined.as_bytes())[..12])
}

/// Fresh run ID: `run_<ulid>`.
pub fn new_run_id() -> String {
    format!("run_{}", ulid::Ulid::new().to_string().to_lowercase())
}
