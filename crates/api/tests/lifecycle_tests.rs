mod common;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use api::game::{GameError, Move, ProcessOutcome, StartOutcome, TiePolicy};
use api::services::{
    register, run_scheduler_tick, submit_move, MoveParams, NotificationKind, RegisterParams,
    TickReport,
};
use chrono::{DateTime, Duration, Utc};
use common::*;
use infra::memory::FailPoint;
use infra::models::TournamentState;
use infra::TournamentStore;

const A: i64 = 1;
const B: i64 = 2;
const C: i64 = 3;
const D: i64 = 4;

async fn play(app: &TestApp, match_id: i64, user_id: i64, mv: Move, at: DateTime<Utc>) {
    submit_move(
        &app.state,
        MoveParams {
            match_id,
            user_id,
            value: mv.value() as i64,
        },
        at,
    )
    .await
    .expect("Move should be accepted");
}

async fn match_of(app: &TestApp, round_id: i64, user_id: i64) -> i64 {
    app.store
        .list_matches(round_id)
        .await
        .unwrap()
        .into_iter()
        .find(|m| m.slot_of(user_id).is_some())
        .map(|m| m.id)
        .expect("Player should have a match")
}

#[tokio::test]
async fn test_four_player_tournament_end_to_end() {
    let app = setup();
    let t = create_registering_tournament(&app, 2, 10).await;
    register_players(&app, t.id, &[A, B, C, D]).await;

    // Round 1
    let report = run_scheduler_tick(&app.state, t0()).await;
    assert_eq!(report.started, vec![t.id]);

    let active = tournament(&app, t.id).await;
    assert_eq!(active.state, TournamentState::Active);
    let round1 = active.current_round_id.expect("Round 1 should be current");
    assert_eq!(pairings(&app, round1).await, vec![(A, Some(C)), (B, Some(D))]);

    let rounds = app.store.list_rounds(t.id).await.unwrap();
    assert_eq!(rounds.len(), 2);
    assert_eq!(rounds[0].deadline, t0() + Duration::minutes(10));
    assert_eq!(rounds[1].deadline, t0() + Duration::minutes(20));

    let during_round1 = t0() + Duration::minutes(1);
    play(&app, match_of(&app, round1, A).await, A, Move::Rock, during_round1).await;
    play(&app, match_of(&app, round1, C).await, C, Move::Scissors, during_round1).await;
    play(&app, match_of(&app, round1, B).await, B, Move::Paper, during_round1).await;
    play(&app, match_of(&app, round1, D).await, D, Move::Rock, during_round1).await;

    // Round 2
    let report = run_scheduler_tick(&app.state, t0() + Duration::minutes(10)).await;
    assert_eq!(report.advanced, vec![t.id]);

    let advanced = tournament(&app, t.id).await;
    let round2 = advanced.current_round_id.expect("Round 2 should be current");
    assert_ne!(round1, round2);
    assert_eq!(pairings(&app, round2).await, vec![(A, Some(B))]);

    let during_round2 = t0() + Duration::minutes(11);
    play(&app, match_of(&app, round2, A).await, A, Move::Rock, during_round2).await;
    play(&app, match_of(&app, round2, B).await, B, Move::Scissors, during_round2).await;

    // Final
    let report = run_scheduler_tick(&app.state, t0() + Duration::minutes(20)).await;
    assert_eq!(report.completed, vec![t.id]);

    let finished = tournament(&app, t.id).await;
    assert_eq!(finished.state, TournamentState::Completed);
    assert!(finished.completed);
    assert_eq!(finished.winner_id, Some(A));
    assert_eq!(finished.current_round_id, None);

    let later = run_scheduler_tick(&app.state, t0() + Duration::hours(1)).await;
    assert_eq!(later, TickReport::default(), "A completed tournament is left alone");
}

#[tokio::test]
async fn test_start_before_scheduled_time_is_noop() {
    let app = setup();
    let t = create_registering_tournament(&app, 2, 10).await;
    register_players(&app, t.id, &[A, B]).await;

    let outcome = app
        .state
        .engine
        .start_if_ready(t.id, t0() - Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(outcome, StartOutcome::NotDue);
    assert!(app.store.list_rounds(t.id).await.unwrap().is_empty());
    assert_eq!(tournament(&app, t.id).await.state, TournamentState::Registering);
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let app = setup();
    let t = create_registering_tournament(&app, 3, 10).await;
    register_players(&app, t.id, &[A, B, C, D, 5]).await;

    let first = app.state.engine.start_if_ready(t.id, t0()).await.unwrap();
    let StartOutcome::Started { round_id, matches } = first else {
        panic!("Expected the tournament to start, got {:?}", first);
    };
    assert_eq!(matches, 4);

    let second = app.state.engine.start_if_ready(t.id, t0()).await;
    assert!(matches!(second, Err(GameError::InvalidState(_))));

    let report = run_scheduler_tick(&app.state, t0() + Duration::seconds(5)).await;
    assert!(report.started.is_empty());

    assert_eq!(tournament(&app, t.id).await.current_round_id, Some(round_id));
    assert_eq!(app.store.list_rounds(t.id).await.unwrap().len(), 3);
    assert_eq!(
        pairings(&app, round_id).await,
        vec![(A, Some(5)), (B, None), (C, None), (D, None)]
    );
    assert_eq!(app.announcer.rounds.lock().len(), 1);
}

#[tokio::test]
async fn test_process_round_is_idempotent() {
    let app = setup();
    let t = create_registering_tournament(&app, 2, 10).await;
    register_players(&app, t.id, &[A, B, C, D]).await;
    run_scheduler_tick(&app.state, t0()).await;
    let round1 = tournament(&app, t.id).await.current_round_id.unwrap();

    let early = app
        .state
        .engine
        .process_active_if_due(t.id, t0() + Duration::minutes(9))
        .await
        .unwrap();
    assert_eq!(early, ProcessOutcome::NotDue);

    let outcome = app.state.engine.process_round(round1).await.unwrap();
    assert_eq!(
        outcome,
        ProcessOutcome::Advanced {
            from_round: 1,
            to_round: 2
        }
    );
    let round2 = tournament(&app, t.id).await.current_round_id.unwrap();

    let again = app.state.engine.process_round(round1).await;
    assert!(matches!(again, Err(GameError::AlreadyProcessed(id)) if id == round1));

    assert_eq!(pairings(&app, round2).await, vec![(A, Some(B))]);
    assert_eq!(tournament(&app, t.id).await.current_round_id, Some(round2));
}

#[tokio::test]
async fn test_future_round_cannot_be_processed() {
    let app = setup();
    let t = create_registering_tournament(&app, 2, 10).await;
    register_players(&app, t.id, &[A, B, C, D]).await;
    run_scheduler_tick(&app.state, t0()).await;

    let rounds = app.store.list_rounds(t.id).await.unwrap();
    let result = app.state.engine.process_round(rounds[1].id).await;
    assert!(matches!(result, Err(GameError::InvalidState(_))));
}

#[tokio::test]
async fn test_byes_advance_without_moves() {
    let app = setup();
    let t = create_registering_tournament(&app, 2, 10).await;
    register_players(&app, t.id, &[A, B, C]).await;

    run_scheduler_tick(&app.state, t0()).await;
    let round1 = tournament(&app, t.id).await.current_round_id.unwrap();
    assert_eq!(pairings(&app, round1).await, vec![(A, Some(C)), (B, None)]);

    // Nobody plays: A keeps the contested match, B takes the bye.
    run_scheduler_tick(&app.state, t0() + Duration::minutes(10)).await;
    let winners: Vec<_> = app
        .store
        .list_matches(round1)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.winner_id)
        .collect();
    assert_eq!(winners, vec![Some(A), Some(B)]);

    let round2 = tournament(&app, t.id).await.current_round_id.unwrap();
    assert_eq!(pairings(&app, round2).await, vec![(A, Some(B))]);
}

#[tokio::test]
async fn test_single_registrant_wins_by_walkover() {
    let app = setup();
    let t = create_registering_tournament(&app, 3, 10).await;
    register_players(&app, t.id, &[C]).await;

    let outcome = app.state.engine.start_if_ready(t.id, t0()).await.unwrap();
    assert_eq!(outcome, StartOutcome::Walkover { winner_id: C });

    let finished = tournament(&app, t.id).await;
    assert_eq!(finished.state, TournamentState::Completed);
    assert_eq!(finished.winner_id, Some(C));
    assert!(app.store.list_rounds(t.id).await.unwrap().is_empty());
    assert_eq!(app.announcer.completions.lock().len(), 1);
}

#[tokio::test]
async fn test_tournament_without_registrants_is_reported() {
    let app = setup();
    let t = create_registering_tournament(&app, 3, 10).await;

    let report = run_scheduler_tick(&app.state, t0()).await;
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].tournament_id, Some(t.id));
    assert_eq!(tournament(&app, t.id).await.state, TournamentState::Registering);
}

#[tokio::test]
async fn test_tie_goes_to_first_seed_by_default() {
    let app = setup();
    let t = create_registering_tournament(&app, 1, 10).await;
    register_players(&app, t.id, &[A, B]).await;
    run_scheduler_tick(&app.state, t0()).await;
    let round1 = tournament(&app, t.id).await.current_round_id.unwrap();

    let m = match_of(&app, round1, A).await;
    play(&app, m, A, Move::Paper, t0() + Duration::minutes(2)).await;
    play(&app, m, B, Move::Paper, t0() + Duration::minutes(3)).await;

    let outcome = app.state.engine.process_round(round1).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Completed { winner_id: A });
}

#[tokio::test]
async fn test_tie_goes_to_richer_player_under_oracle_policy() {
    let config = api::AppConfig {
        tie_policy: TiePolicy::Oracle,
        ..test_config()
    };
    let oracle = FixedOracle {
        balances: HashMap::from([(A, 5.0), (B, 50.0)]),
        failing: HashSet::new(),
    };
    let app = setup_with(config, None, Some(Arc::new(oracle)));
    let t = create_registering_tournament(&app, 1, 10).await;
    register_players(&app, t.id, &[A, B]).await;
    run_scheduler_tick(&app.state, t0()).await;
    let round1 = tournament(&app, t.id).await.current_round_id.unwrap();

    let m = match_of(&app, round1, A).await;
    play(&app, m, A, Move::Scissors, t0() + Duration::minutes(2)).await;
    play(&app, m, B, Move::Scissors, t0() + Duration::minutes(3)).await;

    let outcome = app.state.engine.process_round(round1).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Completed { winner_id: B });
}

#[tokio::test]
async fn test_round_start_is_announced_and_players_notified() {
    let app = setup();
    let t = create_registering_tournament(&app, 2, 10).await;
    register_players(&app, t.id, &[A, B, C]).await;
    run_scheduler_tick(&app.state, t0()).await;

    {
        let rounds = app.announcer.rounds.lock();
        assert_eq!(rounds.len(), 1);
        let post = &rounds[0];
        assert_eq!(post.round_number, 1);
        assert_eq!(post.parent_ref.as_deref(), Some("0xroot"));
        assert_eq!(post.pairings[0].player_a, "player1");
        assert_eq!(post.pairings[0].player_b.as_deref(), Some("player3"));
        assert_eq!(post.pairings[1].player_b, None);
        assert!(post.commentary.is_some());
    }
    assert_eq!(
        tournament(&app, t.id).await.announcement_ref.as_deref(),
        Some("0xround1")
    );

    let sent = app.notifier.of_kind(NotificationKind::RoundStarted);
    assert_eq!(sent.len(), 1);
    let mut recipients = sent[0].recipients.clone();
    recipients.sort();
    assert_eq!(recipients, vec![A, B, C]);
    assert_eq!(sent[0].context.round_number, Some(1));

    run_scheduler_tick(&app.state, t0() + Duration::minutes(10)).await;
    run_scheduler_tick(&app.state, t0() + Duration::minutes(20)).await;

    let completions = app.announcer.completions.lock().clone();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].winner_handle, "player1");
    assert_eq!(completions[0].winner_reward, Some(1000));

    let won = app.notifier.of_kind(NotificationKind::TournamentWon);
    assert_eq!(won.len(), 1);
    assert_eq!(won[0].recipients, vec![A]);
}

#[tokio::test]
async fn test_announcer_outage_does_not_block_progress() {
    let app = setup();
    app.announcer.fail.store(true, Ordering::SeqCst);
    let t = create_registering_tournament(&app, 1, 10).await;
    register_players(&app, t.id, &[A, B]).await;

    let report = run_scheduler_tick(&app.state, t0()).await;
    assert_eq!(report.started, vec![t.id]);
    let report = run_scheduler_tick(&app.state, t0() + Duration::minutes(10)).await;
    assert_eq!(report.completed, vec![t.id]);

    assert_eq!(tournament(&app, t.id).await.winner_id, Some(A));
    assert_eq!(
        tournament(&app, t.id).await.announcement_ref.as_deref(),
        Some("0xroot")
    );
}

#[tokio::test]
async fn test_interrupted_start_resumes_with_existing_matches() {
    let app = setup();
    let t = create_registering_tournament(&app, 2, 10).await;
    register_players(&app, t.id, &[A, B, C, D]).await;

    app.store.fail_next(FailPoint::Activate);
    let report = run_scheduler_tick(&app.state, t0()).await;
    assert_eq!(report.failed.len(), 1);
    assert!(report.started.is_empty());

    let rounds = app.store.list_rounds(t.id).await.unwrap();
    assert_eq!(rounds.len(), 2);
    assert_eq!(app.store.list_matches(rounds[0].id).await.unwrap().len(), 2);
    assert_eq!(tournament(&app, t.id).await.state, TournamentState::Registering);

    let report = run_scheduler_tick(&app.state, t0() + Duration::minutes(1)).await;
    assert_eq!(report.started, vec![t.id]);

    assert_eq!(app.store.list_rounds(t.id).await.unwrap().len(), 2);
    assert_eq!(
        pairings(&app, rounds[0].id).await,
        vec![(A, Some(C)), (B, Some(D))]
    );
    assert_eq!(tournament(&app, t.id).await.current_round_id, Some(rounds[0].id));
}

#[tokio::test]
async fn test_late_registration_rejected_while_start_is_pending() {
    let app = setup();
    let t = create_registering_tournament(&app, 2, 10).await;
    register_players(&app, t.id, &[A, B]).await;

    app.store.fail_next(FailPoint::Activate);
    let report = run_scheduler_tick(&app.state, t0()).await;
    assert_eq!(report.failed.len(), 1);
    assert_eq!(tournament(&app, t.id).await.state, TournamentState::Registering);

    for (user_id, at) in [(C, t0() + Duration::seconds(30)), (D, t0() + Duration::hours(3))] {
        let err = register(
            &app.state,
            RegisterParams {
                tournament_id: t.id,
                user_id,
                force: false,
            },
            at,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GameError::AlreadyStarted(id) if id == t.id));
    }
    assert_eq!(app.store.count_registrations(t.id).await.unwrap(), 2);

    let report = run_scheduler_tick(&app.state, t0() + Duration::minutes(1)).await;
    assert_eq!(report.started, vec![t.id]);
    let round1 = tournament(&app, t.id).await.current_round_id.unwrap();
    assert_eq!(pairings(&app, round1).await, vec![(A, Some(B))]);
}

#[tokio::test]
async fn test_interrupted_processing_resumes() {
    let app = setup();
    let t = create_registering_tournament(&app, 2, 10).await;
    register_players(&app, t.id, &[A, B, C, D]).await;
    run_scheduler_tick(&app.state, t0()).await;
    let round1 = tournament(&app, t.id).await.current_round_id.unwrap();

    app.store.fail_next(FailPoint::AdvanceRound);
    let report = run_scheduler_tick(&app.state, t0() + Duration::minutes(10)).await;
    assert_eq!(report.failed.len(), 1);

    // Winners and next matches were written, the pointer did not move.
    assert_eq!(tournament(&app, t.id).await.current_round_id, Some(round1));
    assert!(app
        .store
        .list_matches(round1)
        .await
        .unwrap()
        .iter()
        .all(|m| m.winner_id.is_some()));

    let report = run_scheduler_tick(&app.state, t0() + Duration::minutes(11)).await;
    assert_eq!(report.advanced, vec![t.id]);

    let round2 = tournament(&app, t.id).await.current_round_id.unwrap();
    assert_ne!(round2, round1);
    assert_eq!(pairings(&app, round2).await, vec![(A, Some(B))]);
}

#[tokio::test]
async fn test_failed_winner_write_is_retried() {
    let app = setup();
    let t = create_registering_tournament(&app, 1, 10).await;
    register_players(&app, t.id, &[A, B]).await;
    run_scheduler_tick(&app.state, t0()).await;

    app.store.fail_next(FailPoint::RecordWinner);
    let report = run_scheduler_tick(&app.state, t0() + Duration::minutes(10)).await;
    assert_eq!(report.failed.len(), 1);
    assert_eq!(tournament(&app, t.id).await.state, TournamentState::Active);

    let report = run_scheduler_tick(&app.state, t0() + Duration::minutes(11)).await;
    assert_eq!(report.completed, vec![t.id]);
    assert_eq!(tournament(&app, t.id).await.winner_id, Some(A));
}
