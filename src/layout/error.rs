use crate::person::PersonId;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkKind {
    Ancestry,
    Progeny,
    PathToMain,
}

impl fmt::Display for WalkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ancestry => "ancestry",
            Self::Progeny => "progeny",
            Self::PathToMain => "path-to-main",
        })
    }
}

/// Non-fatal problem found while computing a layout. The pass always completes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Diagnostic {
    #[error("{field} must be a positive number, got {value}; using {fallback}")]
    InvalidSeparation {
        field: &'static str,
        value: f64,
        fallback: f64,
    },
    #[error("private cards are enabled but no condition is configured; feature disabled")]
    MissingPrivateCondition,
    #[error("{walk} walk stopped after {limit} steps")]
    WalkLimit { walk: WalkKind, limit: usize },
    #[error("{walk} walk reached `{person}` again through its own line; branch cut")]
    RelationCycle { walk: WalkKind, person: PersonId },
    #[error("main person `{requested}` not found, using `{fallback}`")]
    MainNotFound {
        requested: PersonId,
        fallback: PersonId,
    },
    #[error("store is empty; created main person `{0}`")]
    EmptyStore(PersonId),
}

impl Diagnostic {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidSeparation { .. } => "invalid_separation",
            Self::MissingPrivateCondition => "missing_private_condition",
            Self::WalkLimit { .. } => "walk_limit",
            Self::RelationCycle { .. } => "relation_cycle",
            Self::MainNotFound { .. } => "main_not_found",
            Self::EmptyStore(_) => "empty_store",
        }
    }
}

pub(super) fn report(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        tracing::warn!(kind = diagnostic.kind(), "{diagnostic}");
    }
}
