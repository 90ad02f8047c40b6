//! In-memory [`Store`] implementation.
//!
//! Backed by one `DashMap` per table plus secondary unique indices, the same
//! shape as the teacher's `InMemoryTokenStore` (bearer/JTI dual index)
//! generalized from one entity to five. Multi-row mutations (agent-revoke
//! cascade, key rotation) are serialized behind a single `tokio::sync::Mutex`
//! so a concurrent reader never observes a partial update — contention is
//! expected to be low, matching the design note on the rate limiter's shared
//! state.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use super::{
    Agent, AgentCapability, AgentFilter, AgentPatch, AgentStatus, AgentType, ApiKey, ApiKeyStatus,
    AuditFilter, AuditLogRow, Capability, Store, StoreError, StoreResult,
};

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
}

/// Mints an opaque UUID v4 id for a new row (§3: "opaque string id,
/// UUID-shaped").
fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// In-memory backing store. Default-constructible; holds no persistent
/// state across process restarts (the persistence engine is an external
/// collaborator per spec §1).
pub struct InMemoryStore {
    agents: DashMap<String, Agent>,
    agents_by_name: DashMap<String, String>,
    api_keys: DashMap<String, ApiKey>,
    api_keys_by_hash: DashMap<String, String>,
    capabilities: DashMap<String, Capability>,
    capabilities_by_name: DashMap<String, String>,
    grants: DashMap<String, AgentCapability>,
    grants_by_pair: DashMap<(String, String), String>,
    audit: DashMap<String, AuditLogRow>,
    audit_seq: AtomicU64,
    /// Serializes multi-row transactions (cascade revoke, rotate).
    txn: Mutex<()>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            agents: DashMap::new(),
            agents_by_name: DashMap::new(),
            api_keys: DashMap::new(),
            api_keys_by_hash: DashMap::new(),
            capabilities: DashMap::new(),
            capabilities_by_name: DashMap::new(),
            grants: DashMap::new(),
            grants_by_pair: DashMap::new(),
            audit: DashMap::new(),
            audit_seq: AtomicU64::new(0),
            txn: Mutex::new(()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_agent(
        &self,
        name: &str,
        description: Option<String>,
        owner: &str,
        agent_type: AgentType,
        metadata_json: Option<String>,
    ) -> StoreResult<Agent> {
        let _g = self.txn.lock().await;
        if self.agents_by_name.contains_key(name) {
            return Err(StoreError::Conflict);
        }
        let now = now_iso();
        let agent = Agent {
            id: new_id(),
            name: name.to_string(),
            description,
            owner: owner.to_string(),
            status: AgentStatus::Active,
            agent_type,
            metadata_json: metadata_json.unwrap_or_else(|| "{}".to_string()),
            created_at: now.clone(),
            updated_at: now,
            suspended_at: None,
            revoked_at: None,
        };
        self.agents_by_name
            .insert(agent.name.clone(), agent.id.clone());
        self.agents.insert(agent.id.clone(), agent.clone());
        Ok(agent)
    }

    async fn get_agent(&self, id: &str) -> StoreResult<Agent> {
        self.agents.get(id).map(|a| a.clone()).ok_or(StoreError::NotFound)
    }

    async fn get_agent_by_name(&self, name: &str) -> StoreResult<Agent> {
        let id = self
            .agents_by_name
            .get(name)
            .map(|e| e.clone())
            .ok_or(StoreError::NotFound)?;
        self.get_agent(&id).await
    }

    async fn list_agents(&self, filter: &AgentFilter) -> Vec<Agent> {
        self.agents
            .iter()
            .map(|e| e.value().clone())
            .filter(|a| filter.status.is_none_or(|s| s == a.status))
            .filter(|a| filter.owner.as_deref().is_none_or(|o| o == a.owner))
            .filter(|a| filter.agent_type.is_none_or(|t| t == a.agent_type))
            .collect()
    }

    async fn patch_agent(&self, id: &str, patch: AgentPatch) -> StoreResult<Agent> {
        let _g = self.txn.lock().await;
        let mut entry = self.agents.get_mut(id).ok_or(StoreError::NotFound)?;
        if let Some(description) = patch.description {
            entry.description = description;
        }
        if let Some(owner) = patch.owner {
            entry.owner = owner;
        }
        if let Some(metadata_json) = patch.metadata_json {
            entry.metadata_json = metadata_json;
        }
        entry.updated_at = now_iso();
        Ok(entry.clone())
    }

    async fn delete_agent(&self, id: &str) -> StoreResult<()> {
        let _g = self.txn.lock().await;
        let (_, agent) = self.agents.remove(id).ok_or(StoreError::NotFound)?;
        self.agents_by_name.remove(&agent.name);

        // FK cascade: delete keys and capability grants belonging to this agent.
        let key_ids: Vec<String> = self
            .api_keys
            .iter()
            .filter(|e| e.value().agent_id == id)
            .map(|e| e.key().clone())
            .collect();
        for kid in key_ids {
            if let Some((_, key)) = self.api_keys.remove(&kid) {
                self.api_keys_by_hash.remove(&key.key_hash);
            }
        }
        let grant_ids: Vec<(String, String)> = self
            .grants
            .iter()
            .filter(|e| e.value().agent_id == id)
            .map(|e| (e.value().agent_id.clone(), e.value().capability_id.clone()))
            .collect();
        for pair in grant_ids {
            if let Some((_, grant_id)) = self.grants_by_pair.remove(&pair) {
                self.grants.remove(&grant_id);
            }
        }
        Ok(())
    }

    async fn set_agent_status(
        &self,
        id: &str,
        status: AgentStatus,
    ) -> StoreResult<(Agent, Vec<ApiKey>)> {
        let _g = self.txn.lock().await;
        let now = now_iso();
        let agent = {
            let mut entry = self.agents.get_mut(id).ok_or(StoreError::NotFound)?;
            entry.status = status;
            entry.updated_at = now.clone();
            match status {
                AgentStatus::Suspended => entry.suspended_at = Some(now.clone()),
                AgentStatus::Active => entry.suspended_at = None,
                AgentStatus::Revoked => entry.revoked_at = Some(now.clone()),
            }
            entry.clone()
        };

        let mut cascaded = Vec::new();
        if status == AgentStatus::Revoked {
            let active_key_ids: Vec<String> = self
                .api_keys
                .iter()
                .filter(|e| e.value().agent_id == id && e.value().status == ApiKeyStatus::Active)
                .map(|e| e.key().clone())
                .collect();
            for kid in active_key_ids {
                if let Some(mut key) = self.api_keys.get_mut(&kid) {
                    key.status = ApiKeyStatus::Revoked;
                    key.revoked_at = Some(now.clone());
                    cascaded.push(key.clone());
                }
            }
        }
        Ok((agent, cascaded))
    }

    async fn create_api_key(
        &self,
        agent_id: &str,
        name: &str,
        key_hash: &str,
        key_prefix: &str,
        expires_at: Option<String>,
    ) -> StoreResult<ApiKey> {
        let _g = self.txn.lock().await;
        if !self.agents.contains_key(agent_id) {
            return Err(StoreError::NotFound);
        }
        if self.api_keys_by_hash.contains_key(key_hash) {
            return Err(StoreError::Conflict);
        }
        let now = now_iso();
        let key = ApiKey {
            id: new_id(),
            agent_id: agent_id.to_string(),
            key_prefix: key_prefix.to_string(),
            key_hash: key_hash.to_string(),
            name: name.to_string(),
            status: ApiKeyStatus::Active,
            expires_at,
            created_at: now,
            rotated_at: None,
            revoked_at: None,
            last_used_at: None,
        };
        self.api_keys_by_hash
            .insert(key.key_hash.clone(), key.id.clone());
        self.api_keys.insert(key.id.clone(), key.clone());
        Ok(key)
    }

    async fn get_api_key(&self, id: &str) -> StoreResult<ApiKey> {
        self.api_keys.get(id).map(|k| k.clone()).ok_or(StoreError::NotFound)
    }

    async fn get_api_key_by_hash(&self, key_hash: &str) -> Option<ApiKey> {
        let id = self.api_keys_by_hash.get(key_hash)?.clone();
        self.api_keys.get(&id).map(|k| k.clone())
    }

    async fn list_api_keys(&self, agent_id: &str) -> Vec<ApiKey> {
        self.api_keys
            .iter()
            .map(|e| e.value().clone())
            .filter(|k| k.agent_id == agent_id)
            .collect()
    }

    async fn touch_api_key_last_used(&self, id: &str) -> StoreResult<()> {
        let mut entry = self.api_keys.get_mut(id).ok_or(StoreError::NotFound)?;
        entry.last_used_at = Some(now_iso());
        Ok(())
    }

    async fn rotate_api_key(
        &self,
        id: &str,
        new_key_hash: &str,
        new_key_prefix: &str,
    ) -> StoreResult<(ApiKey, ApiKey)> {
        let _g = self.txn.lock().await;
        let now = now_iso();
        let (name, expires_at, agent_id) = {
            let mut entry = self.api_keys.get_mut(id).ok_or(StoreError::NotFound)?;
            if entry.status != ApiKeyStatus::Active {
                return Err(StoreError::Conflict);
            }
            entry.status = ApiKeyStatus::Rotated;
            entry.rotated_at = Some(now.clone());
            (
                entry.name.clone(),
                entry.expires_at.clone(),
                entry.agent_id.clone(),
            )
        };
        let new_key = ApiKey {
            id: new_id(),
            agent_id,
            key_prefix: new_key_prefix.to_string(),
            key_hash: new_key_hash.to_string(),
            name,
            status: ApiKeyStatus::Active,
            expires_at,
            created_at: now,
            rotated_at: None,
            revoked_at: None,
            last_used_at: None,
        };
        self.api_keys_by_hash
            .insert(new_key.key_hash.clone(), new_key.id.clone());
        self.api_keys.insert(new_key.id.clone(), new_key.clone());
        let old_key = self.api_keys.get(id).unwrap().clone();
        Ok((old_key, new_key))
    }

    async fn revoke_api_key(&self, id: &str) -> StoreResult<ApiKey> {
        let _g = self.txn.lock().await;
        let mut entry = self.api_keys.get_mut(id).ok_or(StoreError::NotFound)?;
        if entry.status == ApiKeyStatus::Revoked {
            return Err(StoreError::Conflict);
        }
        entry.status = ApiKeyStatus::Revoked;
        entry.revoked_at = Some(now_iso());
        Ok(entry.clone())
    }

    async fn create_capability(
        &self,
        name: &str,
        description: Option<String>,
    ) -> StoreResult<Capability> {
        let _g = self.txn.lock().await;
        if self.capabilities_by_name.contains_key(name) {
            return Err(StoreError::Conflict);
        }
        let cap = Capability {
            id: new_id(),
            name: name.to_string(),
            description,
            created_at: now_iso(),
        };
        self.capabilities_by_name
            .insert(cap.name.clone(), cap.id.clone());
        self.capabilities.insert(cap.id.clone(), cap.clone());
        Ok(cap)
    }

    async fn list_capabilities(&self) -> Vec<Capability> {
        self.capabilities.iter().map(|e| e.value().clone()).collect()
    }

    async fn get_capability(&self, id: &str) -> StoreResult<Capability> {
        self.capabilities
            .get(id)
            .map(|c| c.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn grant_capability(
        &self,
        agent_id: &str,
        capability_id: &str,
        granted_by: Option<String>,
    ) -> StoreResult<AgentCapability> {
        let _g = self.txn.lock().await;
        if !self.agents.contains_key(agent_id) {
            return Err(StoreError::NotFound);
        }
        if !self.capabilities.contains_key(capability_id) {
            return Err(StoreError::NotFound);
        }
        let pair = (agent_id.to_string(), capability_id.to_string());
        if self.grants_by_pair.contains_key(&pair) {
            return Err(StoreError::Conflict);
        }
        let grant = AgentCapability {
            id: new_id(),
            agent_id: agent_id.to_string(),
            capability_id: capability_id.to_string(),
            granted_at: now_iso(),
            granted_by,
        };
        self.grants_by_pair.insert(pair, grant.id.clone());
        self.grants.insert(grant.id.clone(), grant.clone());
        Ok(grant)
    }

    async fn revoke_capability(&self, agent_id: &str, capability_id: &str) -> StoreResult<()> {
        let _g = self.txn.lock().await;
        let pair = (agent_id.to_string(), capability_id.to_string());
        let (_, grant_id) = self.grants_by_pair.remove(&pair).ok_or(StoreError::NotFound)?;
        self.grants.remove(&grant_id);
        Ok(())
    }

    async fn agent_capability_names(&self, agent_id: &str) -> Vec<String> {
        let cap_ids: Vec<String> = self
            .grants
            .iter()
            .filter(|e| e.value().agent_id == agent_id)
            .map(|e| e.value().capability_id.clone())
            .collect();
        cap_ids
            .into_iter()
            .filter_map(|cid| self.capabilities.get(&cid).map(|c| c.name.clone()))
            .collect()
    }

    async fn append_audit(&self, mut row: AuditLogRow) {
        // Sequence number keeps insertion order stable for rows sharing a
        // timestamp (microsecond clocks can still collide under load).
        let seq = self.audit_seq.fetch_add(1, Ordering::Relaxed);
        row.id = format!("{:020}-{}", seq, row.id);
        self.audit.insert(row.id.clone(), row);
    }

    async fn query_audit(&self, filter: &AuditFilter) -> Vec<AuditLogRow> {
        let mut rows: Vec<AuditLogRow> = self
            .audit
            .iter()
            .map(|e| e.value().clone())
            .filter(|r| filter.agent_id.as_deref().is_none_or(|a| Some(a) == r.agent_id.as_deref()))
            .filter(|r| filter.action.as_deref().is_none_or(|a| a == r.action))
            .filter(|r| {
                filter
                    .resource_type
                    .as_deref()
                    .is_none_or(|rt| Some(rt) == r.resource_type.as_deref())
            })
            .filter(|r| filter.start_date.as_deref().is_none_or(|s| r.timestamp.as_str() >= s))
            .filter(|r| filter.end_date.as_deref().is_none_or(|e| r.timestamp.as_str() <= e))
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows.into_iter().skip(filter.offset).take(filter.limit).collect()
    }
}
