mod common;

use api::game::{GameError, Move};
use api::services::{get_status, run_scheduler_tick, submit_move, MoveParams};
use chrono::Duration;
use common::*;
use infra::TournamentStore;

#[tokio::test]
async fn test_status_before_start() {
    let app = setup();
    let t = create_registering_tournament(&app, 2, 10).await;
    register_players(&app, t.id, &[1, 2]).await;

    let status = get_status(&app.state, t.id, 1).await.unwrap();
    assert_eq!(status.game_id, t.id);
    assert_eq!(status.user_name, "player1");
    assert_eq!(status.game_state, 1);
    assert_eq!(status.current_registrations, 2);
    assert!(status.user_registered);
    assert!(status.rounds.is_empty());
    assert_eq!(status.cast_hash.as_deref(), Some("0xroot"));

    // Viewers without a stored profile get a placeholder and are not created.
    let outsider = get_status(&app.state, t.id, 77).await.unwrap();
    assert!(!outsider.user_registered);
    assert_eq!(outsider.user_name, "fid:77");
    assert!(app.store.get_user(77).await.unwrap().is_none());
}

#[tokio::test]
async fn test_opponent_move_hidden_until_resolved() {
    let app = setup();
    let t = create_registering_tournament(&app, 1, 10).await;
    register_players(&app, t.id, &[1, 2]).await;
    run_scheduler_tick(&app.state, t0()).await;

    let round_id = tournament(&app, t.id).await.current_round_id.unwrap();
    let match_id = app.store.list_matches(round_id).await.unwrap()[0].id;
    submit_move(
        &app.state,
        MoveParams {
            match_id,
            user_id: 1,
            value: Move::Rock.value() as i64,
        },
        t0() + Duration::minutes(1),
    )
    .await
    .unwrap();

    let status = get_status(&app.state, t.id, 2).await.unwrap();
    assert_eq!(status.game_state, 2);
    assert_eq!(status.current_round_number, Some(1));
    let view = status.rounds[0].viewer_match.as_ref().expect("Viewer has a match");
    assert_eq!(view.opponent_id, Some(1));
    assert_eq!(view.opponent_name.as_deref(), Some("player1"));
    assert_eq!(view.opponent_move, None);
    assert_eq!(view.player_move, None);

    run_scheduler_tick(&app.state, t0() + Duration::minutes(10)).await;

    let status = get_status(&app.state, t.id, 2).await.unwrap();
    assert_eq!(status.game_state, 3);
    assert_eq!(status.winner_id, Some(1));
    let view = status.rounds[0].viewer_match.as_ref().unwrap();
    assert_eq!(view.opponent_move, Some(Move::Rock.value()));
    assert!(!view.player_won);

    let winner_view = get_status(&app.state, t.id, 1).await.unwrap();
    assert!(winner_view.rounds[0].viewer_match.as_ref().unwrap().player_won);
}

#[tokio::test]
async fn test_status_serializes_for_frames() {
    let app = setup();
    let t = create_registering_tournament(&app, 1, 10).await;
    register_players(&app, t.id, &[1, 2]).await;
    run_scheduler_tick(&app.state, t0()).await;

    let status = get_status(&app.state, t.id, 1).await.unwrap();
    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["gameId"], t.id);
    assert_eq!(json["gameState"], 2);
    assert_eq!(json["rounds"][0]["roundNumber"], 1);
    assert_eq!(json["rounds"][0]["match"]["opponentId"], 2);
    assert!(json["rounds"][0]["match"]["opponentMove"].is_null());
}

#[tokio::test]
async fn test_status_of_unknown_tournament() {
    let app = setup();
    let err = get_status(&app.state, 5, 1).await.unwrap_err();
    assert!(matches!(err, GameError::NotFound(_)));
}
