use std::sync::Arc;
use tracing::warn;

use crate::clients::{Profile, ProfileLookup};
use crate::game::{GameError, UserId};
use infra::models::{NewUser, UserRow};
use infra::TournamentStore;

/// Local user records backed by an external profile lookup.
#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn TournamentStore>,
    lookup: Arc<dyn ProfileLookup>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn TournamentStore>, lookup: Arc<dyn ProfileLookup>) -> Self {
        Self { store, lookup }
    }

    /// Return the stored user, creating it from the lookup on first sight.
    ///
    /// A failed lookup still creates the user under a placeholder name.
    pub async fn get_or_create_profile(&self, user_id: UserId) -> Result<UserRow, GameError> {
        if let Some(user) = self.store.get_user(user_id).await? {
            return Ok(user);
        }

        let profile = match self.lookup.fetch_profile(user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Profile lookup failed for user {}: {}", user_id, e);
                Profile::placeholder(user_id)
            }
        };

        let user = self
            .store
            .insert_user_if_missing(NewUser {
                id: user_id,
                name: profile.name,
                display_name: profile.display_name,
                image: profile.image,
            })
            .await?;
        Ok(user)
    }

    /// Read-only view of a user: stored record, else a placeholder.
    pub async fn display(&self, user_id: UserId) -> Result<Profile, GameError> {
        Ok(match self.store.get_user(user_id).await? {
            Some(user) => Profile {
                name: user.name,
                display_name: user.display_name,
                image: user.image,
            },
            None => Profile::placeholder(user_id),
        })
    }

    /// Handle used in public posts; falls back to the placeholder on any failure.
    pub async fn handle(&self, user_id: UserId) -> String {
        match self.display(user_id).await {
            Ok(profile) => profile.name,
            Err(e) => {
                warn!("Could not load handle for user {}: {}", user_id, e);
                Profile::placeholder(user_id).name
            }
        }
    }
}
