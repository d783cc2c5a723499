pub mod scheme;

pub use scheme::{
    provable_hash, winning_ticket, CommitmentScheme, Sha256Hex, SEED_SEPARATOR, TICKET_HEX_WIDTH,
};

use crate::{JackpotError, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

const SERVER_SEED_BYTES: usize = 32;

/// Server seed commitment for one round.
///
/// The hash and client seed are public from creation; the server seed stays
/// private until [`SeedCommitment::reveal`].
#[derive(Clone)]
pub struct SeedCommitment {
    server_seed: String,
    server_seed_hash: String,
    client_seed: String,
    revealed: bool,
}

impl SeedCommitment {
    /// Fresh secret from the OS CSPRNG, committed with SHA-256.
    pub fn create(client_seed: impl Into<String>) -> Result<Self> {
        let mut secret = [0u8; SERVER_SEED_BYTES];
        OsRng
            .try_fill_bytes(&mut secret)
            .map_err(|e| JackpotError::Entropy(e.to_string()))?;

        Ok(Self::from_seed(hex::encode(secret), client_seed))
    }

    pub fn from_seed(server_seed: impl Into<String>, client_seed: impl Into<String>) -> Self {
        let server_seed = server_seed.into();
        Self {
            server_seed_hash: Sha256Hex::commit(&server_seed),
            server_seed,
            client_seed: client_seed.into(),
            revealed: false,
        }
    }

    pub fn server_seed_hash(&self) -> &str {
        &self.server_seed_hash
    }

    pub fn client_seed(&self) -> &str {
        &self.client_seed
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    /// The server seed, once revealed.
    pub fn revealed_seed(&self) -> Option<&str> {
        self.revealed.then_some(self.server_seed.as_str())
    }

    /// Discloses the server seed. Allowed once per round; the seed is checked
    /// against the published hash before it is handed out.
    pub fn reveal(&mut self, round_id: u64) -> Result<String> {
        if self.revealed {
            return Err(JackpotError::invalid_state(format!(
                "Server seed of round {} already revealed",
                round_id
            )));
        }

        if !Sha256Hex::verify(&self.server_seed_hash, &self.server_seed) {
            return Err(JackpotError::CryptoIntegrity { round_id });
        }

        self.revealed = true;
        Ok(self.server_seed.clone())
    }

    #[cfg(test)]
    pub(crate) fn tamper_hash(&mut self, hash: &str) {
        self.server_seed_hash = hash.to_string();
    }
}

impl std::fmt::Debug for SeedCommitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedCommitment")
            .field("server_seed_hash", &self.server_seed_hash)
            .field("client_seed", &self.client_seed)
            .field("revealed", &self.revealed)
            .finish()
    }
}

/// Result of recomputing a round from its revealed seeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedVerification {
    pub hash_matches: bool,
    pub provable_hash: String,
    pub recomputed_winning_ticket: Option<u64>,
    pub verified: bool,
}

/// Recomputes the commitment and winning ticket from public values.
///
/// Passes only when `SHA-256(server_seed)` equals `expected_hash` and the
/// derived ticket equals `expected_winning_ticket`.
pub fn verify(
    server_seed: &str,
    client_seed: &str,
    total_tickets: u64,
    expected_hash: &str,
    expected_winning_ticket: u64,
) -> SeedVerification {
    let hash_matches = Sha256Hex::verify(expected_hash, server_seed);
    let provable_hash = provable_hash(server_seed, client_seed);
    let recomputed_winning_ticket = winning_ticket(&provable_hash, total_tickets);

    let verified = hash_matches && recomputed_winning_ticket == Some(expected_winning_ticket);

    SeedVerification {
        hash_matches,
        provable_hash,
        recomputed_winning_ticket,
        verified,
    }
}
