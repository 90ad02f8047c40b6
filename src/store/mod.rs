//! Transactional façade over the five AIMS entities.
//!
//! The [`Store`] trait is the only shared mutable state that matters for
//! correctness (concurrency model, §5). [`memory::InMemoryStore`] is the
//! reference implementation: the persistence engine itself is an external
//! collaborator, so an in-memory engine satisfying the same transactional
//! contract stands in for it here.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a [`Store`] operation can fail with.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row matched the requested id or unique field.
    #[error("not found")]
    NotFound,
    /// A unique constraint would be violated.
    #[error("conflict")]
    Conflict,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Agent lifecycle state (§3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Suspended,
    Revoked,
}

/// Agent category (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Llm,
    Tool,
    Orchestrator,
    Custom,
}

impl AgentType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "llm" => Some(Self::Llm),
            "tool" => Some(Self::Tool),
            "orchestrator" => Some(Self::Orchestrator),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// API key lifecycle state (§3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyStatus {
    Active,
    Rotated,
    Revoked,
}

/// A managed machine identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub owner: String,
    pub status: AgentStatus,
    pub agent_type: AgentType,
    pub metadata_json: String,
    pub created_at: String,
    pub updated_at: String,
    pub suspended_at: Option<String>,
    pub revoked_at: Option<String>,
}

/// A long-lived credential belonging to one agent. The raw key is never
/// stored — only its SHA-256 hash and an 8-char prefix for operator display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: String,
    pub agent_id: String,
    pub key_prefix: String,
    pub key_hash: String,
    pub name: String,
    pub status: ApiKeyStatus,
    pub expires_at: Option<String>,
    pub created_at: String,
    pub rotated_at: Option<String>,
    pub revoked_at: Option<String>,
    pub last_used_at: Option<String>,
}

/// A named permission atom (e.g. `agents:read`, `admin:*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

/// The grant relation `(agent, capability)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCapability {
    pub id: String,
    pub agent_id: String,
    pub capability_id: String,
    pub granted_at: String,
    pub granted_by: Option<String>,
}

/// One row of the append-only audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogRow {
    pub id: String,
    pub timestamp: String,
    pub agent_id: Option<String>,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub details_json: String,
    pub ip_address: Option<String>,
    pub success: bool,
}

/// Filters accepted by `list_agents`.
#[derive(Debug, Default, Clone)]
pub struct AgentFilter {
    pub status: Option<AgentStatus>,
    pub owner: Option<String>,
    pub agent_type: Option<AgentType>,
}

/// Filters accepted by `query_audit`, plus pagination.
#[derive(Debug, Default, Clone)]
pub struct AuditFilter {
    pub agent_id: Option<String>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

/// Fields that may be updated by `patch_agent`. `None` leaves a field as-is.
#[derive(Debug, Default, Clone)]
pub struct AgentPatch {
    pub description: Option<Option<String>>,
    pub owner: Option<String>,
    pub metadata_json: Option<String>,
}

/// The five-entity transactional façade described in spec §4.3.
///
/// All multi-row mutations performed by a single method execute atomically:
/// a concurrent reader observes either the pre-state or the post-state, never
/// a partial update (agent-revoke cascade, key rotation).
#[async_trait]
pub trait Store: Send + Sync + 'static {
    // -- Agents --------------------------------------------------------
    async fn create_agent(
        &self,
        name: &str,
        description: Option<String>,
        owner: &str,
        agent_type: AgentType,
        metadata_json: Option<String>,
    ) -> StoreResult<Agent>;
    async fn get_agent(&self, id: &str) -> StoreResult<Agent>;
    async fn get_agent_by_name(&self, name: &str) -> StoreResult<Agent>;
    async fn list_agents(&self, filter: &AgentFilter) -> Vec<Agent>;
    async fn patch_agent(&self, id: &str, patch: AgentPatch) -> StoreResult<Agent>;
    async fn delete_agent(&self, id: &str) -> StoreResult<()>;

    /// `suspend`/`reactivate`/`revoke` — see [`crate::lifecycle`] for the
    /// guards; this method only performs the raw state write plus, for the
    /// `revoked` transition, the key cascade, atomically.
    async fn set_agent_status(
        &self,
        id: &str,
        status: AgentStatus,
    ) -> StoreResult<(Agent, Vec<ApiKey>)>;

    // -- API keys --------------------------------------------------------
    async fn create_api_key(
        &self,
        agent_id: &str,
        name: &str,
        key_hash: &str,
        key_prefix: &str,
        expires_at: Option<String>,
    ) -> StoreResult<ApiKey>;
    async fn get_api_key(&self, id: &str) -> StoreResult<ApiKey>;
    async fn get_api_key_by_hash(&self, key_hash: &str) -> Option<ApiKey>;
    async fn list_api_keys(&self, agent_id: &str) -> Vec<ApiKey>;
    async fn touch_api_key_last_used(&self, id: &str) -> StoreResult<()>;
    /// Atomically marks `id` `rotated` and inserts the replacement `active` key.
    async fn rotate_api_key(
        &self,
        id: &str,
        new_key_hash: &str,
        new_key_prefix: &str,
    ) -> StoreResult<(ApiKey, ApiKey)>;
    async fn revoke_api_key(&self, id: &str) -> StoreResult<ApiKey>;

    // -- Capabilities ------------------------------------------------------
    async fn create_capability(
        &self,
        name: &str,
        description: Option<String>,
    ) -> StoreResult<Capability>;
    async fn list_capabilities(&self) -> Vec<Capability>;
    async fn get_capability(&self, id: &str) -> StoreResult<Capability>;

    // -- Grants --------------------------------------------------------------
    async fn grant_capability(
        &self,
        agent_id: &str,
        capability_id: &str,
        granted_by: Option<String>,
    ) -> StoreResult<AgentCapability>;
    async fn revoke_capability(&self, agent_id: &str, capability_id: &str) -> StoreResult<()>;
    /// Capability names currently granted to `agent_id` (join `agent_capabilities ⋈ capabilities`).
    async fn agent_capability_names(&self, agent_id: &str) -> Vec<String>;

    // -- Audit ---------------------------------------------------------------
    async fn append_audit(&self, row: AuditLogRow);
    async fn query_audit(&self, filter: &AuditFilter) -> Vec<AuditLogRow>;
}
