//! Cryptographic primitives for the sealed card game.
//!
//! This module provides:
//! - `Decryptable`, the per-card commit-reveal cell
//! - The fixed-width card plaintext encoding

mod decryptable;

pub use decryptable::{
    commitment_hash, encode_card_plaintext, extract_card_value, Decryptable, CARD_PLAINTEXT_LEN,
    MAX_CIPHERTEXT_LEN,
};
