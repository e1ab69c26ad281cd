//! Call record repository interface

use crate::domain::call::entity::UserProfile;
use crate::domain::call::record::{ActiveCallPointer, CallHistoryEntry, CallRecord, CallRecordPatch};
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{CallId, UserId};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Repository interface for call records, active-call pointers and history
///
/// This is defined in the domain layer as a trait (port),
/// and implemented in the infrastructure layer (adapter).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CallRepository: Send + Sync {
    /// Allocate a new id and write the full record under it
    async fn create_call(&self, record: &CallRecord) -> Result<CallId>;

    /// Merge fields into an existing record (last write wins)
    async fn update_call(&self, id: &CallId, patch: &CallRecordPatch) -> Result<()>;

    /// Find a call by its ID
    async fn get_call(&self, id: &CallId) -> Result<Option<CallRecord>>;

    /// Overwrite the user's active-call pointer
    async fn set_active_pointer(&self, user: &UserId, pointer: &ActiveCallPointer) -> Result<()>;

    /// Delete the user's active-call pointer
    async fn clear_active_pointer(&self, user: &UserId) -> Result<()>;

    async fn get_active_pointer(&self, user: &UserId) -> Result<Option<ActiveCallPointer>>;

    /// Append to the user's history, returning the generated entry key
    async fn append_history(&self, user: &UserId, entry: &CallHistoryEntry) -> Result<String>;

    /// The user's history, newest first
    async fn get_history(&self, user: &UserId) -> Result<Vec<CallHistoryEntry>>;

    /// Profile lookup; `None` when the user has no profile
    async fn get_user_profile(&self, user: &UserId) -> Result<Option<UserProfile>>;
}

/// Look up the profiles of `users` concurrently. Duplicates are fetched once;
/// users without a profile, or whose lookup failed, are left out.
pub async fn fetch_profiles(
    repository: &dyn CallRepository,
    users: &[UserId],
) -> HashMap<UserId, UserProfile> {
    let unique: HashSet<&UserId> = users.iter().collect();

    let lookups = unique.into_iter().map(|user| async move {
        (user.clone(), repository.get_user_profile(user).await)
    });

    let mut profiles = HashMap::new();
    for (user, result) in join_all(lookups).await {
        match result {
            Ok(Some(profile)) => {
                profiles.insert(user, profile);
            }
            Ok(None) => debug!("No profile for {}", user),
            Err(e) => warn!("Profile lookup for {} failed: {}", user, e),
        }
    }
    profiles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::error::{DomainError, StoreError};

    fn profile(id: &str) -> UserProfile {
        UserProfile {
            id: UserId::new(id),
            pseudo: Some(id.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_profiles_dedupes_and_skips_failures() {
        let mut repo = MockCallRepository::new();
        repo.expect_get_user_profile()
            .times(3)
            .returning(|user| match user.as_str() {
                "bob" => Ok(Some(profile("bob"))),
                "carol" => Ok(None),
                _ => Err(DomainError::Store(StoreError::Unavailable("down".to_string()))),
            });

        let users = vec![
            UserId::new("bob"),
            UserId::new("carol"),
            UserId::new("bob"),
            UserId::new("dave"),
        ];
        let profiles = fetch_profiles(&repo, &users).await;

        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[&UserId::new("bob")].display_name(), "bob");
    }

    #[tokio::test]
    async fn test_fetch_profiles_empty() {
        let repo = MockCallRepository::new();
        assert!(fetch_profiles(&repo, &[]).await.is_empty());
    }
}
