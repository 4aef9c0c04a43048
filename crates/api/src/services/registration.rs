use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::game::{GameError, UserId};
use crate::AppState;
use infra::models::{NewRegistration, RegistrationRow};
use infra::StoreError;

#[derive(Debug, Clone, Copy)]
pub struct RegisterParams {
    pub tournament_id: i64,
    pub user_id: UserId,
    /// Skip the capacity check. Admin only.
    pub force: bool,
}

/// Register a user for a tournament that is still taking entries.
pub async fn register(
    state: &AppState,
    params: RegisterParams,
    now: DateTime<Utc>,
) -> Result<RegistrationRow, GameError> {
    let RegisterParams {
        tournament_id,
        user_id,
        force,
    } = params;

    let tournament = state
        .store
        .get_tournament(tournament_id)
        .await?
        .ok_or_else(|| GameError::NotFound(format!("tournament {}", tournament_id)))?;

    // Closes at the scheduled start even while the start itself is still pending.
    if !tournament.accepts_registrations() || now >= tournament.scheduled_start {
        return Err(GameError::AlreadyStarted(tournament_id));
    }

    if state
        .store
        .get_registration(tournament_id, user_id)
        .await?
        .is_some()
    {
        return Err(GameError::DuplicateRegistration {
            tournament_id,
            user_id,
        });
    }

    let capacity = tournament.capacity();
    if !force && state.store.count_registrations(tournament_id).await? >= capacity {
        return Err(GameError::Full {
            tournament_id,
            capacity,
        });
    }

    state.profiles.get_or_create_profile(user_id).await?;

    let token_balance = match &state.oracle {
        Some(oracle) => match oracle.tie_break_signal(user_id).await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!("Balance snapshot failed for user {}: {}", user_id, e);
                None
            }
        },
        None => None,
    };

    let created = state
        .store
        .create_registration(
            NewRegistration {
                tournament_id,
                user_id,
                registered_at: now,
                token_balance,
                forced: force,
            },
            (!force).then_some(capacity),
        )
        .await;

    match created {
        Ok(Some(registration)) => {
            info!(
                "User {} registered for tournament {}{}",
                user_id,
                tournament_id,
                if force { " (forced)" } else { "" }
            );
            Ok(registration)
        }
        // Lost a race for the last slot.
        Ok(None) => Err(GameError::Full {
            tournament_id,
            capacity,
        }),
        Err(StoreError::Conflict(_)) => Err(GameError::DuplicateRegistration {
            tournament_id,
            user_id,
        }),
        Err(e) => Err(e.into()),
    }
}
