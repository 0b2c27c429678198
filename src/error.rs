//! Error types with fix suggestions
//!
//! Error code ranges:
//! - DASH-000-009: Configuration errors
//! - DASH-010-019: Dashboard state errors
//! - DASH-020-029: Navigation token errors
//! - DASH-030-039: Alias errors
//! - DASH-040-049: Data source errors
//! - DASH-050-059: Value-state mapping errors
//! - DASH-090-099: IO/parse errors
//!
//! Most engine operations report failures as data (empty page, not-found flag,
//! pass-through value). These variants cover document loading, explicit
//! lookups, and the fetch contract.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DashError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

#[derive(Error, Debug)]
pub enum DashError {
    // ─────────────────────────────────────────────────────────────
    // Configuration errors (DASH-000 to DASH-009)
    // ─────────────────────────────────────────────────────────────
    #[error("DASH-001: Invalid configuration: {reason}")]
    ConfigError { reason: String },

    #[error("DASH-002: Invalid state id '{state_id}'")]
    InvalidStateId { state_id: String },

    #[error("DASH-003: Dashboard declares no root state")]
    NoRootState,

    #[error("DASH-004: Dashboard declares {count} root states (expected exactly one)")]
    MultipleRootStates { count: usize },

    #[error("DASH-005: Duplicate alias name '{alias}'")]
    DuplicateAlias { alias: String },

    // ─────────────────────────────────────────────────────────────
    // State errors (DASH-010 to DASH-019)
    // ─────────────────────────────────────────────────────────────
    #[error("DASH-010: State '{state_id}' does not exist")]
    StateNotFound { state_id: String },

    // ─────────────────────────────────────────────────────────────
    // Token errors (DASH-020 to DASH-029)
    // ─────────────────────────────────────────────────────────────
    #[error("DASH-020: Malformed navigation token: {details}")]
    InvalidToken { details: String },

    // ─────────────────────────────────────────────────────────────
    // Alias errors (DASH-030 to DASH-039)
    // ─────────────────────────────────────────────────────────────
    #[error("DASH-030: Unknown entity alias '{alias}'")]
    UnknownAlias { alias: String },

    #[error("DASH-031: Alias '{alias}' filter is incomplete: {reason}")]
    InvalidAliasFilter { alias: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Data source errors (DASH-040 to DASH-049)
    // ─────────────────────────────────────────────────────────────
    #[error("DASH-040: Page fetch failed: {reason}")]
    FetchFailed { reason: String },

    // ─────────────────────────────────────────────────────────────
    // Mapping errors (DASH-050 to DASH-059)
    // ─────────────────────────────────────────────────────────────
    #[error("DASH-050: Invalid state rule '{label}': {reason}")]
    InvalidRule { label: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // IO/parse errors (DASH-090 to DASH-099)
    // ─────────────────────────────────────────────────────────────
    #[error("DASH-090: IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DASH-091: YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("DASH-092: JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl DashError {
    /// Stable error code (e.g. `DASH-030`)
    pub fn code(&self) -> &'static str {
        match self {
            DashError::ConfigError { .. } => "DASH-001",
            DashError::InvalidStateId { .. } => "DASH-002",
            DashError::NoRootState => "DASH-003",
            DashError::MultipleRootStates { .. } => "DASH-004",
            DashError::DuplicateAlias { .. } => "DASH-005",
            DashError::StateNotFound { .. } => "DASH-010",
            DashError::InvalidToken { .. } => "DASH-020",
            DashError::UnknownAlias { .. } => "DASH-030",
            DashError::InvalidAliasFilter { .. } => "DASH-031",
            DashError::FetchFailed { .. } => "DASH-040",
            DashError::InvalidRule { .. } => "DASH-050",
            DashError::Io(_) => "DASH-090",
            DashError::YamlParse(_) => "DASH-091",
            DashError::JsonParse(_) => "DASH-092",
        }
    }
}

impl FixSuggestion for DashError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            DashError::ConfigError { .. } => Some("Check the settings file keys and value types"),
            DashError::InvalidStateId { .. } => {
                Some("State ids may contain letters, digits, '_' and '-' only")
            }
            DashError::NoRootState => Some("Mark one state with root: true"),
            DashError::MultipleRootStates { .. } => {
                Some("Keep root: true on a single state and remove it from the others")
            }
            DashError::DuplicateAlias { .. } => Some("Use unique alias names in entityAliases"),
            DashError::StateNotFound { .. } => {
                Some("Verify the state id exists in the dashboard states map")
            }
            DashError::InvalidToken { .. } => {
                Some("Navigation tokens are base64-encoded JSON arrays of {id, params}")
            }
            DashError::UnknownAlias { .. } => {
                Some("Declare the alias in entityAliases before referencing it from a widget")
            }
            DashError::InvalidAliasFilter { .. } => {
                Some("Fill in the fields required by the alias filter type")
            }
            DashError::FetchFailed { .. } => Some("Check the backing service is reachable"),
            DashError::InvalidRule { .. } => {
                Some("Constant rules need sourceValue; range rules need numeric bounds")
            }
            DashError::Io(_) => Some("Check file path and permissions"),
            DashError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            DashError::JsonParse(_) => Some("Check JSON syntax (try parsing with jq)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_codes() {
        let err = DashError::UnknownAlias {
            alias: "devices".to_string(),
        };
        assert!(err.to_string().starts_with("DASH-030"));
        assert_eq!(err.code(), "DASH-030");
    }

    #[test]
    fn every_variant_has_a_suggestion() {
        let errors = [
            DashError::NoRootState,
            DashError::StateNotFound {
                state_id: "x".into(),
            },
            DashError::InvalidToken {
                details: "bad".into(),
            },
            DashError::FetchFailed {
                reason: "timeout".into(),
            },
        ];
        for err in errors {
            assert!(err.fix_suggestion().is_some(), "{err}");
        }
    }
}
