//! Integration tests for the full game flow.
//!
//! These tests drive rooms through the transactional service, with the mock
//! seal service standing in for the off-chain encryption service.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use seal_game_core::{
    crypto::extract_card_value,
    error::{ErrorKind, GameError, ServiceError},
    game::{stacked_deck, CardValue, PendingKind, PlayCard, RoomStatus},
    protocol::{Address, RoomId, TxContext},
    seal::MockSealService,
    store::GameService,
    RoomConfig,
};

fn addr(b: u8) -> Address {
    Address::from_bytes([b; 32])
}

fn ctx(b: u8) -> TxContext {
    TxContext::new(addr(b), 0)
}

/// Two-seat room with a dealt deck in `order`
fn two_player_room(service: &GameService, seal: &MockSealService, order: &[CardValue]) -> RoomId {
    let config = RoomConfig {
        max_players: 2,
        ..Default::default()
    };
    let id = service
        .create_room(&ctx(1), "duel".to_string(), &config)
        .unwrap()
        .value
        .id;
    let deck = seal.seal_deck(id, &stacked_deck(order));
    service
        .transact(&id, None, |room, _| {
            room.join(&ctx(2))?;
            room.submit_encrypted_deck(&ctx(1), deck.ciphertexts, deck.hashes, deck.nonces)
        })
        .unwrap();
    id
}

fn plaintext(
    service: &GameService,
    seal: &MockSealService,
    id: &RoomId,
    who: u8,
    index: usize,
) -> Vec<u8> {
    let room = service.room(id).unwrap().value;
    seal.decrypt_card(&room, &addr(who), &room.seal_id(index))
        .unwrap()
}

/// Player 1 holds indices 4 and 6, player 2 holds index 5
fn guard_duel(p2_card: CardValue) -> (GameService, MockSealService, RoomId) {
    use seal_game_core::game::CardValue::*;
    let service = GameService::in_memory();
    let seal = MockSealService::new();
    let id = two_player_room(
        &service,
        &seal,
        &[Countess, Spy, Spy, Handmaid, Guard, p2_card, Priest],
    );

    // Phase 1: player 1 plays the Guard naming Prince
    let guard = plaintext(&service, &seal, &id, 1, 4);
    service
        .transact(&id, None, |room, lb| {
            room.play_turn(
                &ctx(1),
                lb,
                PlayCard::new(4, guard).target(1).guess(Prince),
            )
        })
        .unwrap();

    let room = service.room(&id).unwrap().value;
    let pending = room.pending_action.as_ref().unwrap();
    assert_eq!(pending.effect.kind(), PendingKind::Guard);
    assert_eq!(pending.card_index, 5);

    // Phase 2: player 2 reveals
    let reply = plaintext(&service, &seal, &id, 2, 5);
    service
        .transact(&id, None, |room, lb| room.respond_guard(&ctx(2), lb, 5, reply))
        .unwrap();

    (service, seal, id)
}

#[test]
fn test_guard_miss_passes_turn() {
    let (service, _seal, id) = guard_duel(CardValue::Baron);
    let room = service.room(&id).unwrap().value;

    assert!(room.players[1].is_alive);
    assert_eq!(room.status, RoomStatus::InProgress);
    assert_eq!(room.current_turn, 1);
    assert_eq!(room.players[1].hand.len(), 2);
}

#[test]
fn test_guard_hit_wins_round() {
    let (service, _seal, id) = guard_duel(CardValue::Prince);
    let room = service.room(&id).unwrap().value;

    assert!(!room.players[1].is_alive);
    assert_eq!(room.status, RoomStatus::RoundOver);
    assert_eq!(room.winners, vec![addr(1)]);
    assert_eq!(room.players[0].tokens, 1);
    assert_eq!(service.leaderboard().stats(&addr(1)).unwrap().rounds_won, 1);
}

#[test]
fn test_out_of_turn_play_changes_nothing() {
    use seal_game_core::game::CardValue::*;
    let service = GameService::in_memory();
    let seal = MockSealService::new();
    let id = two_player_room(
        &service,
        &seal,
        &[Countess, Spy, Spy, Handmaid, Guard, Baron, Priest],
    );

    let before = service.room(&id).unwrap();
    let snapshot = serde_json::to_vec(&before.value).unwrap();
    let card = plaintext(&service, &seal, &id, 2, 5);

    let err = service
        .transact(&id, None, |room, lb| {
            room.play_turn(&ctx(2), lb, PlayCard::new(5, card).target(0).guess(Priest))
        })
        .unwrap_err();
    assert_eq!(err, ServiceError::Game(GameError::NotYourTurn));

    let after = service.room(&id).unwrap();
    assert_eq!(after.version, before.version);
    assert_eq!(serde_json::to_vec(&after.value).unwrap(), snapshot);
}

#[test]
fn test_chancellor_must_keep_a_drawn_card() {
    use seal_game_core::game::CardValue::*;
    let service = GameService::in_memory();
    let seal = MockSealService::new();
    let id = two_player_room(
        &service,
        &seal,
        &[Countess, Spy, Spy, Handmaid, Chancellor, Baron, Priest, Guard, Guard],
    );

    let card = plaintext(&service, &seal, &id, 1, 4);
    service
        .transact(&id, None, |room, lb| {
            room.play_turn(&ctx(1), lb, PlayCard::new(4, card))
        })
        .unwrap();
    let before = service.room(&id).unwrap();
    assert_eq!(
        before.value.chancellor.as_ref().unwrap().card_indices,
        vec![6, 7, 8]
    );

    // index 5 belongs to player 2
    let err = service
        .transact(&id, None, |room, lb| {
            room.resolve_chancellor(&ctx(1), lb, 5, vec![7, 8])
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    assert_eq!(service.room(&id).unwrap(), before);
}

#[test]
fn test_swap_moves_access() {
    use seal_game_core::game::CardValue::*;
    let service = GameService::in_memory();
    let seal = MockSealService::new();
    let id = two_player_room(&service, &seal, &[Countess, Spy, Spy, Handmaid, King, Baron, Priest]);

    let card = plaintext(&service, &seal, &id, 1, 4);
    service
        .transact(&id, None, |room, lb| {
            room.play_turn(&ctx(1), lb, PlayCard::new(4, card).target(1))
        })
        .unwrap();

    let room = service.room(&id).unwrap().value;
    assert!(room.access.can_access_card(&addr(1), 5));
    assert!(!room.access.can_access_card(&addr(1), 6));
    assert_eq!(
        service.seal_approve(&id, &addr(1), &room.seal_id(6)),
        Err(ServiceError::Game(GameError::AccessDenied(6)))
    );
    assert_eq!(service.seal_approve(&id, &addr(2), &room.seal_id(6)), Ok(6));
}

/// Take one action on behalf of whoever the room is waiting on
fn bot_step(service: &GameService, seal: &MockSealService, id: &RoomId, rng: &mut StdRng) {
    let room = service.room(id).unwrap().value;
    let open = |who: &Address, index: usize| {
        seal.decrypt_card(&room, who, &room.seal_id(index))
            .unwrap()
    };

    match room.status {
        RoomStatus::RoundOver => {
            let deck = seal.seal_shuffled(*id, rng);
            let creator = TxContext::new(room.creator, 0);
            service
                .transact(id, None, |r, _| {
                    r.submit_encrypted_deck(&creator, deck.ciphertexts, deck.hashes, deck.nonces)
                })
                .unwrap();
        }
        RoomStatus::Showdown => {
            let idx = (0..room.players.len())
                .find(|i| room.players[*i].is_alive && room.showdown_reveals[*i].is_none())
                .unwrap();
            let player = &room.players[idx];
            let card = player.hand[0];
            let data = open(&player.addr, card);
            let actor = TxContext::new(player.addr, 0);
            service
                .transact(id, None, |r, lb| r.reveal_hand(&actor, lb, card, data))
                .unwrap();
        }
        RoomStatus::InProgress => {
            if let Some(pending) = &room.pending_action {
                let card = pending.card_index;
                let data = open(&pending.responder, card);
                let actor = TxContext::new(pending.responder, 0);
                let kind = pending.effect.kind();
                service
                    .transact(id, None, |r, lb| match kind {
                        PendingKind::Guard => r.respond_guard(&actor, lb, card, data),
                        PendingKind::Baron => r.respond_baron(&actor, lb, card, data),
                        PendingKind::Prince => r.respond_prince(&actor, lb, card, data),
                    })
                    .unwrap();
            } else if let Some(chancellor) = &room.chancellor {
                let mut cards = chancellor.card_indices.clone();
                cards.shuffle(rng);
                let keep = cards.remove(0);
                let actor = TxContext::new(room.players[chancellor.player_idx].addr, 0);
                service
                    .transact(id, None, |r, lb| r.resolve_chancellor(&actor, lb, keep, cards))
                    .unwrap();
            } else {
                let seat = room.current_turn;
                let player = &room.players[seat];
                let card = *player.hand.choose(rng).unwrap();
                let data = open(&player.addr, card);
                let value = extract_card_value(&data).unwrap();

                let targets: Vec<usize> = (0..room.players.len())
                    .filter(|i| *i != seat && room.players[*i].is_targetable())
                    .collect();
                let mut play = PlayCard::new(card, data);
                if value.requires_target() {
                    if let Some(target) = targets.choose(rng) {
                        play = play.target(*target);
                        if value == CardValue::Guard {
                            let guesses: Vec<CardValue> = CardValue::ALL
                                .into_iter()
                                .filter(|v| *v != CardValue::Guard)
                                .collect();
                            play = play.guess(*guesses.choose(rng).unwrap());
                        }
                        if value == CardValue::Baron {
                            let kept = player.hand.iter().copied().find(|c| *c != card).unwrap();
                            play = play.kept(open(&player.addr, kept));
                        }
                    }
                }

                let actor = TxContext::new(player.addr, 0);
                service
                    .transact(id, None, |r, lb| r.play_turn(&actor, lb, play))
                    .unwrap();
            }
        }
        status => panic!("bot has nothing to do in {:?}", status),
    }

    service.room(id).unwrap().value.check_card_partition().unwrap();
}

#[test]
fn test_random_games_run_to_completion() {
    for seed in 0..8u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let players = 2 + (seed % 3) as u8;
        let service = GameService::in_memory();
        let seal = MockSealService::new();

        let config = RoomConfig {
            max_players: players as usize,
            entry_fee: 5,
            ..Default::default()
        };
        let id = service
            .create_room(&ctx(1), format!("table-{}", seed), &config)
            .unwrap()
            .value
            .id;
        for b in 2..=players {
            service
                .transact(&id, None, |room, _| room.join(&ctx(b)))
                .unwrap();
        }
        let deck = seal.seal_shuffled(id, &mut rng);
        service
            .transact(&id, None, |room, _| {
                room.submit_encrypted_deck(&ctx(1), deck.ciphertexts, deck.hashes, deck.nonces)
            })
            .unwrap();

        let mut steps = 0;
        while service.room(&id).unwrap().value.status != RoomStatus::Finished {
            bot_step(&service, &seal, &id, &mut rng);
            steps += 1;
            assert!(steps < 20_000, "seed {} did not finish", seed);
        }

        let room = service.room(&id).unwrap().value;
        assert!(!room.winners.is_empty());
        let board = service.leaderboard();
        let paid: u64 = room
            .winners
            .iter()
            .map(|w| board.stats(w).unwrap().winnings)
            .sum();
        assert_eq!(paid, 5 * players as u64);
        for p in &room.players {
            assert_eq!(board.stats(&p.addr).unwrap().games_played, 1);
        }
        drop(board);

        service.cleanup_finished_room(&id).unwrap();
        assert!(service.active_rooms().is_empty());
    }
}
