//! Input validators (§4.8, §3): name patterns, enum membership, and length
//! checks, expressed as small free functions in the style of
//! `security/sanitize.rs`'s validator module. Exact constants are taken from
//! `original_source/.../schemas/agent.py` and `schemas/capability.py`.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::Error;
use crate::store::AgentType;

/// `^[A-Za-z0-9_-]+$`, compiled once (spec §3).
static AGENT_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static pattern is valid"));

/// Validates an agent/capability name-shaped string: non-empty, at most
/// `max_len` characters, matching `AGENT_NAME_PATTERN` when `pattern` is
/// required (agent names); capability names are free-form aside from length.
pub fn validate_agent_name(name: &str) -> Result<(), Error> {
    if name.is_empty() || name.chars().count() > 128 {
        return Err(Error::Validation(
            "name must be 1-128 characters".to_string(),
        ));
    }
    if !AGENT_NAME_PATTERN.is_match(name) {
        return Err(Error::Validation(
            "name must match ^[A-Za-z0-9_-]+$".to_string(),
        ));
    }
    Ok(())
}

/// Validates a bounded, non-empty string field (`owner`, capability `name`).
pub fn validate_nonempty_len(field: &str, value: &str, max_len: usize) -> Result<(), Error> {
    if value.is_empty() || value.chars().count() > max_len {
        return Err(Error::Validation(format!(
            "{field} must be 1-{max_len} characters"
        )));
    }
    Ok(())
}

/// Validates an optional field against a maximum length, ignoring `None`.
pub fn validate_max_len(field: &str, value: &str, max_len: usize) -> Result<(), Error> {
    if value.chars().count() > max_len {
        return Err(Error::Validation(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(())
}

/// Parses an `agent_type` string into [`AgentType`], rejecting anything
/// outside the enum (§3: `llm`, `tool`, `orchestrator`, `custom`).
pub fn validate_agent_type(raw: &str) -> Result<AgentType, Error> {
    AgentType::parse(raw).ok_or_else(|| {
        Error::Validation("agent_type must be one of: llm, tool, orchestrator, custom".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_agent_names() {
        assert!(validate_agent_name("agent_1-ok").is_ok());
    }

    #[test]
    fn rejects_names_with_spaces_or_punctuation() {
        assert!(validate_agent_name("bad name!").is_err());
    }

    #[test]
    fn rejects_empty_and_overlong_names() {
        assert!(validate_agent_name("").is_err());
        assert!(validate_agent_name(&"a".repeat(129)).is_err());
    }

    #[test]
    fn agent_type_rejects_unknown_variant() {
        assert!(validate_agent_type("robot").is_err());
        assert!(validate_agent_type("llm").is_ok());
    }
}
