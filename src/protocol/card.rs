// SPDX-License-Identifier: MIT
//! Agent cards, skills, and protocol-version compatibility.
//!
//! An agent advertises itself with a JSON card at
//! `/.well-known/agent-card.json`. The card *is* the plugin interface: the
//! orchestrator never loads agent code, it only trusts cards that pass
//! [`validate_card`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use url::Url;

/// Protocol version this orchestrator speaks. Agents are compatible iff
/// their card's major component equals ours.
pub const SUPPORTED_PROTOCOL_VERSION: &str = "1.0";

// ─── Protocol version ────────────────────────────────────────────────────────

/// A strict `MAJOR.MINOR` version pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
}

impl FromStr for ProtocolVersion {
    type Err = CardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || CardError::BadProtocolVersion(s.to_string());
        let (major, minor) = s.split_once('.').ok_or_else(bad)?;
        if major.is_empty() || minor.is_empty() || minor.contains('.') {
            return Err(bad());
        }
        // Reject signs, whitespace, and anything else u32::from_str would
        // otherwise tolerate after trimming.
        if !major.bytes().all(|b| b.is_ascii_digit()) || !minor.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(bad());
        }
        Ok(Self {
            major: major.parse().map_err(|_| bad())?,
            minor: minor.parse().map_err(|_| bad())?,
        })
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Compatible iff the agent's major version equals the supported major.
/// A minor mismatch is fine; anything unparseable is not.
pub fn is_protocol_compatible(agent_version: &str, supported: &str) -> bool {
    match (
        ProtocolVersion::from_str(agent_version),
        ProtocolVersion::from_str(supported),
    ) {
        (Ok(a), Ok(s)) => a.major == s.major,
        _ => false,
    }
}

// ─── Card types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    None,
    Bearer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAuth {
    #[serde(rename = "type")]
    pub auth_type: AuthType,
}

/// One advertised capability of an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub version: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
}

/// The self-description an agent serves at `/.well-known/agent-card.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCard {
    pub name: String,
    pub version: String,
    pub protocol_version: String,
    pub endpoint: String,
    pub skills: Vec<Skill>,
    pub auth: AgentAuth,
}

// ─── Validation ──────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum CardError {
    #[error("agent card has an empty name")]
    EmptyName,
    #[error("invalid protocol version: {0:?}")]
    BadProtocolVersion(String),
    #[error("agent card advertises no skills")]
    NoSkills,
    #[error("invalid endpoint URL: {0}")]
    BadEndpoint(String),
    #[error("endpoint {endpoint} does not match the host that served the card ({base})")]
    EndpointHostMismatch { endpoint: String, base: String },
    #[error("skill {id:?} has an empty id")]
    EmptySkillId { id: String },
    #[error("skill {id:?} has invalid version {version:?}")]
    BadSkillVersion { id: String, version: String },
    #[error("skill {id:?} input schema must require {field:?}")]
    MissingInputRequirement { id: String, field: &'static str },
    #[error("skill {id:?} output schema must require \"findings\"")]
    MissingOutputRequirement { id: String },
}

/// Returns true if `schema` lists `field` in its top-level `required` array.
fn schema_requires(schema: &Value, field: &str) -> bool {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|req| req.iter().any(|v| v.as_str() == Some(field)))
        .unwrap_or(false)
}

/// Structural validation of a card fetched from `base`.
///
/// Protocol-version *compatibility* is checked separately by discovery; this
/// only verifies the version is well-formed `MAJOR.MINOR`.
pub fn validate_card(card: &AgentCard, base: &Url) -> Result<(), CardError> {
    if card.name.trim().is_empty() {
        return Err(CardError::EmptyName);
    }
    ProtocolVersion::from_str(&card.protocol_version)?;

    let endpoint =
        Url::parse(&card.endpoint).map_err(|_| CardError::BadEndpoint(card.endpoint.clone()))?;
    // The endpoint must point back at the origin that served the card —
    // a card is not allowed to direct traffic at a third party.
    if endpoint.host_str() != base.host_str()
        || endpoint.port_or_known_default() != base.port_or_known_default()
    {
        return Err(CardError::EndpointHostMismatch {
            endpoint: card.endpoint.clone(),
            base: base.to_string(),
        });
    }

    if card.skills.is_empty() {
        return Err(CardError::NoSkills);
    }
    for skill in &card.skills {
        validate_skill(skill)?;
    }
    Ok(())
}

pub fn validate_skill(skill: &Skill) -> Result<(), CardError> {
    if skill.id.trim().is_empty() {
        return Err(CardError::EmptySkillId {
            id: skill.id.clone(),
        });
    }
    if ProtocolVersion::from_str(&skill.version).is_err() {
        return Err(CardError::BadSkillVersion {
            id: skill.id.clone(),
            version: skill.version.clone(),
        });
    }
    for field in ["diff", "mcp_url"] {
        if !schema_requires(&skill.input_schema, field) {
            return Err(CardError::MissingInputRequirement {
                id: skill.id.clone(),
                field,
            });
        }
    }
    if !schema_requires(&skill.output_schema, "findings") {
        return Err(CardError::MissingOutputRequirement {
            id: skill.id.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn skill() -> Skill {
        Skill {
            id: "review.security".to_string(),
            version: "1.0".to_string(),
            description: "security review".to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["diff", "mcp_url"],
                "properties": {"diff": {"type": "string"}, "mcp_url": {"type": "string"}}
            }),
            output_schema: json!({
                "type": "object",
                "required": ["findings"],
                "properties": {"findings": {"type": "array"}}
            }),
        }
    }

    fn card() -> AgentCard {
        AgentCard {
            name: "security-agent".to_string(),
            version: "0.1.0".to_string(),
            protocol_version: "1.0".to_string(),
            endpoint: "http://127.0.0.1:9201/rpc".to_string(),
            skills: vec![skill()],
            auth: AgentAuth {
                auth_type: AuthType::None,
            },
        }
    }

    fn base() -> Url {
        Url::parse("http://127.0.0.1:9201").unwrap()
    }

    #[test]
    fn version_parses_major_minor_only() {
        assert!("1.0".parse::<ProtocolVersion>().is_ok());
        assert!("12.34".parse::<ProtocolVersion>().is_ok());
        for bad in ["1", "1.0.0", "v1.0", "1.", ".5", "1.-2", "1. 0", ""] {
            assert!(bad.parse::<ProtocolVersion>().is_err(), "{bad:?} should fail");
        }
    }

    #[test]
    fn compatibility_is_major_equality() {
        assert!(is_protocol_compatible("1.0", "1.0"));
        assert!(is_protocol_compatible("1.5", "1.0"));
        assert!(!is_protocol_compatible("2.0", "1.0"));
        assert!(!is_protocol_compatible("garbage", "1.0"));
    }

    #[test]
    fn valid_card_passes() {
        assert!(validate_card(&card(), &base()).is_ok());
    }

    #[test]
    fn card_with_foreign_endpoint_rejected() {
        let mut c = card();
        c.endpoint = "http://10.0.0.1:9201/rpc".to_string();
        assert!(matches!(
            validate_card(&c, &base()),
            Err(CardError::EndpointHostMismatch { .. })
        ));
    }

    #[test]
    fn card_with_no_skills_rejected() {
        let mut c = card();
        c.skills.clear();
        assert!(matches!(validate_card(&c, &base()), Err(CardError::NoSkills)));
    }

    #[test]
    fn skill_missing_diff_requirement_rejected() {
        let mut s = skill();
        s.input_schema = json!({"type": "object", "required": ["mcp_url"]});
        assert!(matches!(
            validate_skill(&s),
            Err(CardError::MissingInputRequirement { field: "diff", .. })
        ));
    }

    #[test]
    fn auth_type_wire_format() {
        let auth: AgentAuth = serde_json::from_value(json!({"type": "bearer"})).unwrap();
        assert_eq!(auth.auth_type, AuthType::Bearer);
        assert!(serde_json::from_value::<AgentAuth>(json!({"type": "mtls"})).is_err());
    }
}
