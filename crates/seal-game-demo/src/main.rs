//! Seal Game Demo
//!
//! Plays complete games between bots in one process. Each bot owns a
//! secp256k1 key; the mock seal service plays the off-chain decryption
//! service, asking the room for approval before handing out any card.
//!
//! Environment:
//! - `DEMO_PLAYERS` - seats per room (default 3)
//! - `DEMO_GAMES` - games to play (default 1)
//! - `DEMO_SEED` - RNG seed for a reproducible run

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use seal_game_core::{
    crypto::extract_card_value,
    game::{
        CardIndex, CardValue, GameRoom, PendingKind, PlayCard, RoomStatus, MAX_PLAYERS,
        MIN_PLAYERS,
    },
    Address, GameService, MockSealService, RoomConfig, RoomId, ServiceError, TxContext,
};
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Upper bound on actions per game, in case a bot gets stuck
const MAX_STEPS: usize = 10_000;

struct Bot {
    name: String,
    address: Address,
}

impl Bot {
    fn new<R: Rng>(name: &str, rng: &mut R) -> Self {
        let secp = Secp256k1::new();
        let secret = SecretKey::new(rng);
        let address = Address::from_public_key(&PublicKey::from_secret_key(&secp, &secret));
        Self {
            name: name.to_string(),
            address,
        }
    }
}

struct Table {
    service: GameService,
    seal: MockSealService,
    bots: Vec<Bot>,
    rng: StdRng,
}

impl Table {
    fn ctx(&self, who: &Address) -> TxContext {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        TxContext::new(*who, now)
    }

    fn name_of(&self, who: &Address) -> &str {
        self.bots
            .iter()
            .find(|b| b.address == *who)
            .map(|b| b.name.as_str())
            .unwrap_or("?")
    }

    /// Fetch a card through the seal service, as its holder would
    fn open(
        &self,
        room: &GameRoom,
        who: &Address,
        index: CardIndex,
    ) -> Result<Vec<u8>, ServiceError> {
        let seal_id = room.seal_id(index);
        debug!("{} requests seal id {}", self.name_of(who), hex::encode(&seal_id));
        Ok(self.seal.decrypt_card(room, who, &seal_id)?)
    }

    fn deal(&mut self, id: RoomId, creator: &Address) -> Result<(), ServiceError> {
        let deck = self.seal.seal_shuffled(id, &mut self.rng);
        let ctx = self.ctx(creator);
        self.service.transact(&id, None, |room, _| {
            room.submit_encrypted_deck(&ctx, deck.ciphertexts, deck.hashes, deck.nonces)
        })?;
        Ok(())
    }

    fn play_game(&mut self, game: usize, config: &RoomConfig) -> Result<(), ServiceError> {
        let creator = self.bots[0].address;
        let id = self
            .service
            .create_room(&self.ctx(&creator), format!("demo-{}", game), config)?
            .value
            .id;
        for bot in &self.bots[1..] {
            let ctx = self.ctx(&bot.address);
            self.service.transact(&id, None, |room, _| room.join(&ctx))?;
        }
        info!("Game {}: room {} seated {} bots", game, id, self.bots.len());
        self.deal(id, &creator)?;

        let mut round = 1;
        for _ in 0..MAX_STEPS {
            let room = self.service.room(&id)?.value;
            match room.status {
                RoomStatus::Finished => {
                    let winners: Vec<&str> = room.winners.iter().map(|w| self.name_of(w)).collect();
                    info!("Game {} finished, winners: {:?}, pot {}", game, winners, room.pot);
                    self.service.cleanup_finished_room(&id)?;
                    self.seal.forget(&id);
                    return Ok(());
                }
                RoomStatus::RoundOver => {
                    let winners: Vec<&str> = room.winners.iter().map(|w| self.name_of(w)).collect();
                    let tokens: Vec<u32> = room.players.iter().map(|p| p.tokens).collect();
                    info!("Round {} won by {:?}, tokens {:?}", round, winners, tokens);
                    round += 1;
                    self.deal(id, &creator)?;
                }
                RoomStatus::Showdown => self.showdown_step(&room)?,
                RoomStatus::InProgress => self.turn_step(&room)?,
                RoomStatus::WaitingForPlayers => {
                    warn!("Room {} is waiting for players", id);
                    return Ok(());
                }
            }
        }
        warn!("Game {} did not finish within {} steps", game, MAX_STEPS);
        Ok(())
    }

    fn showdown_step(&mut self, room: &GameRoom) -> Result<(), ServiceError> {
        let Some(idx) = room
            .alive_indices()
            .into_iter()
            .find(|i| room.showdown_reveals[*i].is_none())
        else {
            return Ok(());
        };
        let player = &room.players[idx];
        let Some(card) = player.hand.first().copied() else {
            return Ok(());
        };
        let data = self.open(room, &player.addr, card)?;
        let ctx = self.ctx(&player.addr);
        let shown = self
            .service
            .transact(&room.id, None, |r, lb| r.reveal_hand(&ctx, lb, card, data))?;
        info!("{} shows {}", self.name_of(&player.addr), shown.value);
        Ok(())
    }

    fn turn_step(&mut self, room: &GameRoom) -> Result<(), ServiceError> {
        if let Some(pending) = &room.pending_action {
            let card = pending.card_index;
            let data = self.open(room, &pending.responder, card)?;
            let ctx = self.ctx(&pending.responder);
            let kind = pending.effect.kind();
            debug!("{} answers {:?}", self.name_of(&pending.responder), kind);
            self.service.transact(&room.id, None, |r, lb| match kind {
                PendingKind::Guard => r.respond_guard(&ctx, lb, card, data),
                PendingKind::Baron => r.respond_baron(&ctx, lb, card, data),
                PendingKind::Prince => r.respond_prince(&ctx, lb, card, data),
            })?;
            return Ok(());
        }

        if let Some(chancellor) = &room.chancellor {
            let who = room.players[chancellor.player_idx].addr;
            let mut cards = chancellor.card_indices.clone();
            // Keep the highest card seen
            let mut best = 0;
            let mut best_value = None;
            for (i, index) in cards.iter().enumerate() {
                let value = extract_card_value(&self.open(room, &who, *index)?)?;
                if best_value.map_or(true, |v| value > v) {
                    best = i;
                    best_value = Some(value);
                }
            }
            let keep = cards.remove(best);
            let ctx = self.ctx(&who);
            self.service.transact(&room.id, None, |r, lb| {
                r.resolve_chancellor(&ctx, lb, keep, cards)
            })?;
            return Ok(());
        }

        let seat = room.current_turn;
        let Some(player) = room.current_player() else {
            return Ok(());
        };
        let mut hand = Vec::new();
        for index in &player.hand {
            let data = self.open(room, &player.addr, *index)?;
            let value = extract_card_value(&data)?;
            hand.push((*index, value, data));
        }
        // Never throw away the Princess when there is a choice
        let choices: Vec<usize> = (0..hand.len())
            .filter(|i| hand.len() == 1 || hand[*i].1 != CardValue::Princess)
            .collect();
        let Some(&pick) = choices.choose(&mut self.rng) else {
            return Ok(());
        };
        let (card, value, data) = hand[pick].clone();

        let mut play = PlayCard::new(card, data);
        if value.requires_target() {
            let targets: Vec<usize> = (0..room.players.len())
                .filter(|i| *i != seat && room.players[*i].is_targetable())
                .collect();
            if let Some(&target) = targets.choose(&mut self.rng) {
                play = play.target(target);
                if value == CardValue::Guard {
                    let guesses: Vec<CardValue> = CardValue::ALL
                        .into_iter()
                        .filter(|v| *v != CardValue::Guard)
                        .collect();
                    if let Some(&guess) = guesses.choose(&mut self.rng) {
                        play = play.guess(guess);
                    }
                }
                if value == CardValue::Baron {
                    if let Some((_, _, kept)) = hand.iter().find(|(i, _, _)| *i != card) {
                        play = play.kept(kept.clone());
                    }
                }
            }
        }

        info!("{} plays {}", self.name_of(&player.addr), value);
        let ctx = self.ctx(&player.addr);
        self.service
            .transact(&room.id, None, |r, lb| r.play_turn(&ctx, lb, play))?;
        Ok(())
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Reject table sizes a room would refuse
fn seat_count(players: usize) -> Result<usize, String> {
    if (MIN_PLAYERS..=MAX_PLAYERS).contains(&players) {
        Ok(players)
    } else {
        Err(format!(
            "DEMO_PLAYERS must be within {}..={}, got {}",
            MIN_PLAYERS, MAX_PLAYERS, players
        ))
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let players = match seat_count(env_or("DEMO_PLAYERS", 3)) {
        Ok(players) => players,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };
    let games: usize = env_or("DEMO_GAMES", 1);
    let seed: u64 = env_or("DEMO_SEED", rand::thread_rng().gen());
    info!("Demo: {} players, {} games, seed {}", players, games, seed);

    let mut rng = StdRng::seed_from_u64(seed);
    let bots: Vec<Bot> = (0..players)
        .map(|i| Bot::new(&format!("bot-{}", i), &mut rng))
        .collect();
    for bot in &bots {
        info!("{} is {}", bot.name, bot.address);
    }

    let config = RoomConfig {
        max_players: players,
        entry_fee: 10,
        ..Default::default()
    };
    let mut table = Table {
        service: GameService::in_memory(),
        seal: MockSealService::new(),
        bots,
        rng,
    };

    for game in 1..=games {
        if let Err(e) = table.play_game(game, &config) {
            tracing::error!("Game {} aborted: {} ({:?})", game, e, e.kind());
            std::process::exit(1);
        }
    }

    let board = table.service.leaderboard();
    for (address, stats) in board.top(players) {
        info!(
            "{}: {} games won, {} rounds won, {} winnings",
            table.name_of(&address),
            stats.games_won,
            stats.rounds_won,
            stats.winnings
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_count_bounds() {
        assert!(seat_count(0).is_err());
        assert!(seat_count(1).is_err());
        assert_eq!(seat_count(MIN_PLAYERS), Ok(MIN_PLAYERS));
        assert_eq!(seat_count(MAX_PLAYERS), Ok(MAX_PLAYERS));
        assert!(seat_count(MAX_PLAYERS + 1).is_err());
    }
}
