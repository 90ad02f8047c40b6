//! Lifecycle engine (§4.4): the agent and API key state machines, expressed
//! as guarded operations over a [`Store`] trait object — the same
//! "operation validates, store persists" split the teacher's
//! `KeyServer::validate_token` uses to coordinate its subsystems.

use chrono::DateTime;

use crate::store::{Agent, AgentStatus, ApiKey, ApiKeyStatus, Store, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Precondition(&'static str),
}

impl From<StoreError> for LifecycleError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => Self::NotFound,
            StoreError::Conflict => Self::Precondition("conflict"),
        }
    }
}

/// Suspends an active agent. Guarded: an agent cannot suspend itself, and a
/// revoked agent cannot be suspended (§4.4).
pub async fn suspend_agent(
    store: &dyn Store,
    actor_agent_id: &str,
    target_id: &str,
) -> Result<Agent, LifecycleError> {
    if actor_agent_id == target_id {
        return Err(LifecycleError::Precondition("an agent cannot suspend itself"));
    }
    let agent = store.get_agent(target_id).await?;
    if agent.status == AgentStatus::Revoked {
        return Err(LifecycleError::Precondition("agent is revoked"));
    }
    let (agent, _) = store.set_agent_status(target_id, AgentStatus::Suspended).await?;
    Ok(agent)
}

/// Reactivates a suspended agent back to active.
pub async fn reactivate_agent(store: &dyn Store, target_id: &str) -> Result<Agent, LifecycleError> {
    let agent = store.get_agent(target_id).await?;
    if agent.status != AgentStatus::Suspended {
        return Err(LifecycleError::Precondition("agent is not suspended"));
    }
    let (agent, _) = store.set_agent_status(target_id, AgentStatus::Active).await?;
    Ok(agent)
}

/// Revokes an agent permanently, cascading to its active API keys. Guarded:
/// an agent cannot revoke itself, and a revoked agent cannot be revoked
/// again. Returns the agent plus the keys that were cascaded to revoked.
pub async fn revoke_agent(
    store: &dyn Store,
    actor_agent_id: &str,
    target_id: &str,
) -> Result<(Agent, Vec<ApiKey>), LifecycleError> {
    if actor_agent_id == target_id {
        return Err(LifecycleError::Precondition("an agent cannot revoke itself"));
    }
    let agent = store.get_agent(target_id).await?;
    if agent.status == AgentStatus::Revoked {
        return Err(LifecycleError::Precondition("agent is already revoked"));
    }
    let (agent, cascaded) = store.set_agent_status(target_id, AgentStatus::Revoked).await?;
    Ok((agent, cascaded))
}

/// Deletes an agent and everything owned by it. Guarded: an agent cannot
/// delete itself.
pub async fn delete_agent(
    store: &dyn Store,
    actor_agent_id: &str,
    target_id: &str,
) -> Result<(), LifecycleError> {
    if actor_agent_id == target_id {
        return Err(LifecycleError::Precondition("an agent cannot delete itself"));
    }
    store.get_agent(target_id).await?;
    store.delete_agent(target_id).await?;
    Ok(())
}

/// Rotates an active API key: the old key becomes `rotated` (still usable
/// until the grace period elapses), and a fresh `active` key with the same
/// name/expiry is minted. Guarded: only an `active` key can be rotated.
pub async fn rotate_api_key(
    store: &dyn Store,
    key_id: &str,
    new_key_hash: &str,
    new_key_prefix: &str,
) -> Result<(ApiKey, ApiKey), LifecycleError> {
    let key = store.get_api_key(key_id).await?;
    if key.status != ApiKeyStatus::Active {
        return Err(LifecycleError::Precondition("only an active key can be rotated"));
    }
    let (old, new) = store
        .rotate_api_key(key_id, new_key_hash, new_key_prefix)
        .await?;
    Ok((old, new))
}

/// Revokes an API key permanently. Guarded: a key already revoked cannot be
/// revoked again.
pub async fn revoke_api_key(store: &dyn Store, key_id: &str) -> Result<ApiKey, LifecycleError> {
    let key = store.get_api_key(key_id).await?;
    if key.status == ApiKeyStatus::Revoked {
        return Err(LifecycleError::Precondition("key is already revoked"));
    }
    let key = store.revoke_api_key(key_id).await?;
    Ok(key)
}

/// Whether a key in the `rotated` state is still acceptable for
/// authentication: true while `now - rotated_at <= grace_hours` (§4.4).
#[must_use]
pub fn within_rotation_grace(rotated_at: &str, now: DateTime<chrono::Utc>, grace_hours: i64) -> bool {
    let Ok(rotated_at) = DateTime::parse_from_rfc3339(rotated_at) else {
        return false;
    };
    let elapsed = now.signed_duration_since(rotated_at.with_timezone(&chrono::Utc));
    elapsed <= chrono::Duration::hours(grace_hours)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{memory::InMemoryStore, AgentType};

    #[tokio::test]
    async fn cannot_suspend_self() {
        let store = InMemoryStore::new();
        let agent = store
            .create_agent("self", None, "owner", AgentType::Custom, None)
            .await
            .unwrap();
        let result = suspend_agent(&store, &agent.id, &agent.id).await;
        assert!(matches!(result, Err(LifecycleError::Precondition(_))));
    }

    #[tokio::test]
    async fn revoke_is_idempotent_guarded() {
        let store = InMemoryStore::new();
        let admin = store
            .create_agent("admin", None, "owner", AgentType::Custom, None)
            .await
            .unwrap();
        let target = store
            .create_agent("target", None, "owner", AgentType::Custom, None)
            .await
            .unwrap();
        revoke_agent(&store, &admin.id, &target.id).await.unwrap();
        let second = revoke_agent(&store, &admin.id, &target.id).await;
        assert!(matches!(second, Err(LifecycleError::Precondition(_))));
    }

    #[tokio::test]
    async fn rotate_requires_active_key() {
        let store = InMemoryStore::new();
        let agent = store
            .create_agent("a", None, "owner", AgentType::Custom, None)
            .await
            .unwrap();
        let key = store
            .create_api_key(&agent.id, "k", "hash", "hash"[..4].as_ref(), None)
            .await
            .unwrap();
        revoke_api_key(&store, &key.id).await.unwrap();
        let result = rotate_api_key(&store, &key.id, "hash2", "hash2"[..4].as_ref()).await;
        assert!(matches!(result, Err(LifecycleError::Precondition(_))));
    }

    #[test]
    fn within_rotation_grace_boundaries() {
        let rotated_at = "2026-07-28T00:00:00.000000+00:00";
        let just_inside = DateTime::parse_from_rfc3339(rotated_at)
            .unwrap()
            .with_timezone(&chrono::Utc)
            + chrono::Duration::hours(24);
        let just_outside = just_inside + chrono::Duration::seconds(1);
        assert!(within_rotation_grace(rotated_at, just_inside, 24));
        assert!(!within_rotation_grace(rotated_at, just_outside, 24));
    }
}
