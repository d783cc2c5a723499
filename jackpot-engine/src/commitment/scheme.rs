use sha2::{Digest, Sha256};

/// Joins the server and client seeds before hashing.
pub const SEED_SEPARATOR: &str = ":";

/// Leading hex characters of the provable hash read as the ticket integer.
/// 13 hex digits is 52 bits, small enough to be reproduced exactly by
/// verifiers that only have double-precision numbers.
pub const TICKET_HEX_WIDTH: usize = 13;

/// Trait for commitment schemes
pub trait CommitmentScheme {
    /// Public commitment to `secret`.
    fn commit(secret: &str) -> String;

    fn verify(commitment: &str, secret: &str) -> bool {
        Self::commit(secret).eq_ignore_ascii_case(commitment)
    }
}

/// Hex SHA-256 over the UTF-8 bytes of the seed.
pub struct Sha256Hex;

impl CommitmentScheme for Sha256Hex {
    fn commit(secret: &str) -> String {
        sha256_hex(secret.as_bytes())
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// `SHA-256(server_seed ":" client_seed)` as lowercase hex.
pub fn provable_hash(server_seed: &str, client_seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(server_seed.as_bytes());
    hasher.update(SEED_SEPARATOR.as_bytes());
    hasher.update(client_seed.as_bytes());
    hex::encode(hasher.finalize())
}

/// Maps a provable hash onto `[0, total_tickets)`.
///
/// Returns `None` when there are no tickets or the hash is too short or not hex.
pub fn winning_ticket(provable_hash: &str, total_tickets: u64) -> Option<u64> {
    if total_tickets == 0 {
        return None;
    }
    let prefix = provable_hash.get(..TICKET_HEX_WIDTH)?;
    let value = u64::from_str_radix(prefix, 16).ok()?;
    Some(value % total_tickets)
}
