//! Bracket shape: how many rounds, who is seeded, and who meets whom.

use infra::models::{NewMatch, ParticipantRow};

use super::{GameError, UserId};

/// Rounds needed for `participant_count` players, capped at `max_rounds`.
///
/// One player needs zero rounds and wins by walkover.
pub fn compute_round_count(participant_count: usize, max_rounds: u32) -> Result<u32, GameError> {
    if participant_count == 0 {
        return Err(GameError::EmptyField);
    }
    // ceil(log2(n))
    let needed = usize::BITS - (participant_count - 1).leading_zeros();
    Ok(needed.min(max_rounds))
}

/// Number of bracket slots for a given round count.
pub fn slot_count(rounds: u32) -> usize {
    1usize << rounds.min(usize::BITS - 2)
}

/// Order registrants for seeding and keep at most `slots` of them.
///
/// Registration order decides seeds. When there are more registrants than slots,
/// the least recently active players are picked first (never played before
/// anyone who has), and ties keep registration order.
pub fn seed_participants(participants: &[ParticipantRow], slots: usize) -> Vec<UserId> {
    let mut ordered = participants.to_vec();
    ordered.sort_by(|x, y| {
        x.registered_at
            .cmp(&y.registered_at)
            .then(x.registration_id.cmp(&y.registration_id))
    });

    if ordered.len() > slots {
        // Stable: equal activity keeps registration order.
        ordered.sort_by(|x, y| x.last_played.cmp(&y.last_played));
        ordered.truncate(slots);
    }

    ordered.into_iter().map(|p| p.user_id).collect()
}

/// First-round pairings for `2^actual_rounds` slots.
///
/// The ordered field is folded in half: seed `i` meets seed `i + slots/2`.
/// Empty upper slots become byes, so byes always go to the top seeds.
pub fn build_first_round_matches(ordered: &[UserId], actual_rounds: u32) -> Vec<NewMatch> {
    let slots = slot_count(actual_rounds);
    let half = slots / 2;
    let field = &ordered[..ordered.len().min(slots)];

    (0..half)
        .filter_map(|i| {
            field.get(i).map(|&player_a| NewMatch {
                player_a,
                player_b: field.get(i + half).copied(),
            })
        })
        .collect()
}

/// Pair the winners of a round in order: (w0, w1), (w2, w3), ...
pub fn build_next_round_matches(winners: &[UserId]) -> Result<Vec<NewMatch>, GameError> {
    if winners.len() % 2 == 1 {
        let unpaired = winners[winners.len() - 1];
        return Err(GameError::UnpairedWinner(unpaired));
    }

    Ok(winners
        .chunks_exact(2)
        .map(|pair| NewMatch {
            player_a: pair[0],
            player_b: Some(pair[1]),
        })
        .collect())
}
