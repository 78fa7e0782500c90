//! Commit-reveal cell holding one card.
//!
//! At deal time the client publishes `hash = SHA256(plaintext || nonce)` next
//! to the ciphertext. A later reveal supplies the plaintext, which anyone can
//! re-check against the stored hash and nonce.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::GameError;
use crate::game::CardValue;
use crate::protocol::hex_serde;

/// Plaintext width: `[value: 1 byte][padding: 31 bytes]`.
///
/// Every card encrypts the same number of bytes, so ciphertext length says
/// nothing about the value.
pub const CARD_PLAINTEXT_LEN: usize = 32;

/// Upper bound on a submitted ciphertext
pub const MAX_CIPHERTEXT_LEN: usize = 1024;

/// Compute the commitment hash: SHA256(data || nonce)
pub fn commitment_hash(data: &[u8], nonce: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.update(nonce);
    hasher.finalize().into()
}

/// Build a card plaintext from a value and padding
pub fn encode_card_plaintext(value: CardValue, padding: &[u8; 31]) -> [u8; CARD_PLAINTEXT_LEN] {
    let mut out = [0u8; CARD_PLAINTEXT_LEN];
    out[0] = value.as_u8();
    out[1..].copy_from_slice(padding);
    out
}

/// Parse the value byte out of a card plaintext
pub fn extract_card_value(data: &[u8]) -> Result<CardValue, GameError> {
    if data.len() != CARD_PLAINTEXT_LEN {
        return Err(GameError::InvalidCardData(format!(
            "expected {} bytes, got {}",
            CARD_PLAINTEXT_LEN,
            data.len()
        )));
    }
    CardValue::from_u8(data[0])
        .ok_or_else(|| GameError::InvalidCardData(format!("unknown card value {}", data[0])))
}

/// One card slot: either still sealed or revealed.
///
/// The only transition is `Encrypted` to `Decrypted`, and only through
/// [`Decryptable::decrypt`] with a plaintext that matches the hash.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Decryptable {
    Encrypted {
        #[serde(with = "hex_serde::bytes")]
        ciphertext: Vec<u8>,
        #[serde(with = "hex_serde::bytes32")]
        hash: [u8; 32],
        #[serde(with = "hex_serde::bytes32")]
        nonce: [u8; 32],
    },
    Decrypted {
        #[serde(with = "hex_serde::bytes")]
        data: Vec<u8>,
    },
}

impl Decryptable {
    /// Wrap a sealed card. The hash is only checked on reveal.
    pub fn new(ciphertext: Vec<u8>, hash: [u8; 32], nonce: [u8; 32]) -> Result<Self, GameError> {
        if ciphertext.is_empty() || ciphertext.len() > MAX_CIPHERTEXT_LEN {
            return Err(GameError::InvalidCiphertext(ciphertext.len()));
        }
        Ok(Decryptable::Encrypted {
            ciphertext,
            hash,
            nonce,
        })
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Decryptable::Encrypted { .. })
    }

    pub fn is_decrypted(&self) -> bool {
        matches!(self, Decryptable::Decrypted { .. })
    }

    /// Check a claimed plaintext without changing the cell
    pub fn verify(&self, data: &[u8]) -> Result<(), GameError> {
        match self {
            Decryptable::Encrypted { hash, nonce, .. } => {
                if commitment_hash(data, nonce) == *hash {
                    Ok(())
                } else {
                    Err(GameError::HashMismatch)
                }
            }
            Decryptable::Decrypted { .. } => Err(GameError::WrongState),
        }
    }

    /// Check a claimed plaintext and parse the card value it encodes
    pub fn verify_card(&self, data: &[u8]) -> Result<CardValue, GameError> {
        self.verify(data)?;
        extract_card_value(data)
    }

    /// Reveal the cell. On mismatch the cell stays encrypted.
    pub fn decrypt(&mut self, data: Vec<u8>) -> Result<(), GameError> {
        self.verify(&data)?;
        *self = Decryptable::Decrypted { data };
        Ok(())
    }

    pub fn ciphertext(&self) -> Result<&[u8], GameError> {
        match self {
            Decryptable::Encrypted { ciphertext, .. } => Ok(ciphertext),
            Decryptable::Decrypted { .. } => Err(GameError::WrongState),
        }
    }

    pub fn hash(&self) -> Result<&[u8; 32], GameError> {
        match self {
            Decryptable::Encrypted { hash, .. } => Ok(hash),
            Decryptable::Decrypted { .. } => Err(GameError::WrongState),
        }
    }

    pub fn nonce(&self) -> Result<&[u8; 32], GameError> {
        match self {
            Decryptable::Encrypted { nonce, .. } => Ok(nonce),
            Decryptable::Decrypted { .. } => Err(GameError::WrongState),
        }
    }

    pub fn data(&self) -> Result<&[u8], GameError> {
        match self {
            Decryptable::Decrypted { data } => Ok(data),
            Decryptable::Encrypted { .. } => Err(GameError::WrongState),
        }
    }

    /// Revealed card value, if this cell has been decrypted
    pub fn revealed_value(&self) -> Option<CardValue> {
        self.data().ok().and_then(|d| extract_card_value(d).ok())
    }
}

impl fmt::Debug for Decryptable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decryptable::Encrypted { hash, .. } => {
                write!(f, "Encrypted({})", hex::encode(&hash[..8]))
            }
            Decryptable::Decrypted { data } => {
                write!(f, "Decrypted({})", hex::encode(&data[..data.len().min(8)]))
            }
        }
    }
}
