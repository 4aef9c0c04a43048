use api::game::bracket::{
    build_first_round_matches, build_next_round_matches, compute_round_count, seed_participants,
};
use api::game::GameError;
use chrono::{Duration, TimeZone, Utc};
use infra::models::{NewMatch, ParticipantRow};

fn pair(a: i64, b: Option<i64>) -> NewMatch {
    NewMatch {
        player_a: a,
        player_b: b,
    }
}

#[test]
fn test_round_count() {
    assert_eq!(compute_round_count(1, 5).unwrap(), 0);
    assert_eq!(compute_round_count(2, 5).unwrap(), 1);
    assert_eq!(compute_round_count(3, 5).unwrap(), 2);
    assert_eq!(compute_round_count(4, 5).unwrap(), 2);
    assert_eq!(compute_round_count(5, 5).unwrap(), 3);
    assert_eq!(compute_round_count(8, 5).unwrap(), 3);
    assert_eq!(compute_round_count(9, 5).unwrap(), 4);
}

#[test]
fn test_round_count_is_capped() {
    assert_eq!(compute_round_count(2, 0).unwrap(), 0);
    assert_eq!(compute_round_count(5, 2).unwrap(), 2);
    assert_eq!(compute_round_count(100, 3).unwrap(), 3);
}

#[test]
fn test_round_count_rejects_empty_field() {
    assert!(matches!(compute_round_count(0, 3), Err(GameError::EmptyField)));
}

#[test]
fn test_fold_pairing_for_five_players() {
    let matches = build_first_round_matches(&[10, 11, 12, 13, 14], 3);
    assert_eq!(
        matches,
        vec![
            pair(10, Some(14)),
            pair(11, None),
            pair(12, None),
            pair(13, None),
        ]
    );
}

#[test]
fn test_fold_pairing_for_full_field() {
    let matches = build_first_round_matches(&[1, 2, 3, 4], 2);
    assert_eq!(matches, vec![pair(1, Some(3)), pair(2, Some(4))]);
}

#[test]
fn test_first_round_drops_players_beyond_slots() {
    let matches = build_first_round_matches(&[1, 2, 3, 4, 5, 6], 2);
    assert_eq!(matches, vec![pair(1, Some(3)), pair(2, Some(4))]);
}

#[test]
fn test_every_slot_filled_at_most_once() {
    for n in 2..=16usize {
        let players: Vec<i64> = (1..=n as i64).collect();
        let rounds = compute_round_count(n, 10).unwrap();
        let matches = build_first_round_matches(&players, rounds);

        assert_eq!(matches.len(), 1 << (rounds - 1), "n = {}", n);
        let mut seen: Vec<i64> = matches
            .iter()
            .flat_map(|m| std::iter::once(m.player_a).chain(m.player_b))
            .collect();
        seen.sort();
        assert_eq!(seen, players, "every player appears exactly once for n = {}", n);
    }
}

#[test]
fn test_next_round_pairs_winners_in_order() {
    let matches = build_next_round_matches(&[4, 8, 15, 16]).unwrap();
    assert_eq!(matches, vec![pair(4, Some(8)), pair(15, Some(16))]);
}

#[test]
fn test_next_round_rejects_odd_winner_count() {
    let err = build_next_round_matches(&[4, 8, 15]).unwrap_err();
    assert!(matches!(err, GameError::UnpairedWinner(15)));
}

fn participant(
    registration_id: i64,
    user_id: i64,
    registered_minute: i64,
    last_played_minute: Option<i64>,
) -> ParticipantRow {
    let base = Utc.with_ymd_and_hms(2024, 11, 1, 12, 0, 0).unwrap();
    ParticipantRow {
        registration_id,
        user_id,
        registered_at: base + Duration::minutes(registered_minute),
        token_balance: None,
        last_played: last_played_minute.map(|m| base - Duration::minutes(m)),
    }
}

#[test]
fn test_seeding_follows_registration_order() {
    let participants = vec![
        participant(3, 30, 5, None),
        participant(1, 10, 1, Some(1)),
        participant(2, 20, 1, None),
    ];
    // Same registration time: lower registration id first.
    assert_eq!(seed_participants(&participants, 4), vec![10, 20, 30]);
}

#[test]
fn test_oversubscribed_seeding_prefers_least_recently_active() {
    let participants = vec![
        participant(1, 10, 1, Some(5)),    // played 5 minutes ago
        participant(2, 20, 2, None),       // never played
        participant(3, 30, 3, Some(600)),  // played 10 hours ago
        participant(4, 40, 4, None),       // never played
        participant(5, 50, 5, Some(60)),   // played an hour ago
    ];
    assert_eq!(seed_participants(&participants, 4), vec![20, 40, 30, 50]);
}
