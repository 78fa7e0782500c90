//! In-memory seal service for tests and simulations.

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::crypto::{commitment_hash, encode_card_plaintext};
use crate::error::GameError;
use crate::game::{full_deck, CardIndex, CardValue, GameRoom};
use crate::protocol::{Address, RoomId};

/// Encrypted deck ready for `submit_encrypted_deck`
#[derive(Clone, Debug)]
pub struct SealedDeck {
    pub ciphertexts: Vec<Vec<u8>>,
    pub hashes: Vec<[u8; 32]>,
    pub nonces: Vec<[u8; 32]>,
}

/// Mock seal service.
///
/// Each sealed deck gets a fresh room key; card `i` is masked with
/// `SHA256(key || i)`. Plaintext is only handed out after the room's
/// `seal_approve_card` accepts the caller.
#[derive(Clone, Default)]
pub struct MockSealService {
    /// Map of room id -> key of the deck in play
    keys: Arc<Mutex<HashMap<RoomId, [u8; 32]>>>,
}

impl MockSealService {
    pub fn new() -> Self {
        Self::default()
    }

    fn keys(&self) -> MutexGuard<'_, HashMap<RoomId, [u8; 32]>> {
        self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Shuffle a full deck and seal it
    pub fn seal_shuffled<R: Rng + ?Sized>(&self, room_id: RoomId, rng: &mut R) -> SealedDeck {
        let mut values = full_deck();
        values.shuffle(rng);
        self.seal_deck(room_id, &values)
    }

    /// Seal `values` in the given order; card index `i` holds `values[i]`
    pub fn seal_deck(&self, room_id: RoomId, values: &[CardValue]) -> SealedDeck {
        let mut rng = rand::thread_rng();
        let mut key = [0u8; 32];
        rng.fill_bytes(&mut key);

        let mut deck = SealedDeck {
            ciphertexts: Vec::with_capacity(values.len()),
            hashes: Vec::with_capacity(values.len()),
            nonces: Vec::with_capacity(values.len()),
        };
        for (index, value) in values.iter().enumerate() {
            let mut padding = [0u8; 31];
            rng.fill_bytes(&mut padding);
            let mut nonce = [0u8; 32];
            rng.fill_bytes(&mut nonce);

            let plaintext = encode_card_plaintext(*value, &padding);
            deck.hashes.push(commitment_hash(&plaintext, &nonce));
            deck.nonces.push(nonce);
            deck.ciphertexts.push(mask(&key, index, &plaintext));
        }

        self.keys().insert(room_id, key);
        deck
    }

    /// Release a card's plaintext to `caller` if the room approves
    pub fn decrypt_card(
        &self,
        room: &GameRoom,
        caller: &Address,
        seal_id: &[u8],
    ) -> Result<Vec<u8>, GameError> {
        let index = room.seal_approve_card(caller, seal_id)?;
        let cell = &room.cards[index];
        if cell.is_decrypted() {
            return Ok(cell.data()?.to_vec());
        }

        let key = *self
            .keys()
            .get(&room.id)
            .ok_or(GameError::AccessDenied(index))?;
        Ok(mask(&key, index, cell.ciphertext()?))
    }

    /// Forget a room's key once it is archived
    pub fn forget(&self, room_id: &RoomId) {
        self.keys().remove(room_id);
    }
}

/// XOR `data` with the keystream for one card; its own inverse
fn mask(key: &[u8; 32], index: CardIndex, data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(key);
    hasher.update((index as u64).to_be_bytes());
    let pad = hasher.finalize();
    data.iter()
        .zip(pad.iter().cycle())
        .map(|(byte, k)| byte ^ k)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{extract_card_value, Decryptable};
    use crate::game::DECK_SIZE;

    #[test]
    fn test_sealed_cards_open_against_their_commitment() {
        let seal = MockSealService::new();
        let values = full_deck();
        let deck = seal.seal_deck(RoomId::new(), &values);
        assert_eq!(deck.ciphertexts.len(), DECK_SIZE);

        let key = *seal.keys().values().next().unwrap();
        for (i, value) in values.iter().enumerate() {
            let plaintext = mask(&key, i, &deck.ciphertexts[i]);
            let cell =
                Decryptable::new(deck.ciphertexts[i].clone(), deck.hashes[i], deck.nonces[i])
                    .unwrap();
            assert_eq!(cell.verify_card(&plaintext).unwrap(), *value);
            assert_eq!(extract_card_value(&plaintext).unwrap(), *value);
        }
    }

    #[test]
    fn test_shuffle_keeps_composition() {
        let seal = MockSealService::new();
        let deck = seal.seal_shuffled(RoomId::new(), &mut rand::thread_rng());
        assert_eq!(deck.hashes.len(), DECK_SIZE);
        assert!(deck.ciphertexts.iter().all(|c| c.len() == 32));
    }
}
