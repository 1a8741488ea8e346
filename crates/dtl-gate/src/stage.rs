use std::fmt;
use std::time::Duration;

use dtl_refs::TagValidator;
use dtl_types::CommitId;
use serde::{Deserialize, Serialize};

use crate::config::GateConfig;
use crate::error::GateError;

// ---------------------------------------------------------------------------
// RefMutation
// ---------------------------------------------------------------------------

/// What is being done to a tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOperation {
    Create,
    Move,
    Delete,
}

impl MutationOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            MutationOperation::Create => "create",
            MutationOperation::Move => "move",
            MutationOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed tag mutation, evaluated by the gate pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefMutation {
    /// Short tag name (no `refs/tags/` prefix).
    pub name: String,
    pub operation: MutationOperation,
    /// Object the tag will reference; `None` for deletes.
    pub target: Option<CommitId>,
}

impl RefMutation {
    pub fn create(name: impl Into<String>, target: CommitId) -> Self {
        Self {
            name: name.into(),
            operation: MutationOperation::Create,
            target: Some(target),
        }
    }

    pub fn moving(name: impl Into<String>, target: CommitId) -> Self {
        Self {
            name: name.into(),
            operation: MutationOperation::Move,
            target: Some(target),
        }
    }

    pub fn delete(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operation: MutationOperation::Delete,
            target: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ActorContext
// ---------------------------------------------------------------------------

/// An explicit request to bypass protection, recorded in the audit trail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideSignal {
    pub reason: String,
}

impl OverrideSignal {
    /// A blank reason does not count as an override.
    pub fn is_valid(&self) -> bool {
        !self.reason.trim().is_empty()
    }
}

/// Who is proposing the mutation and through which path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub actor: String,
    /// `true` when the mutation comes from the sanctioned deployment
    /// automation.
    pub via_automation: bool,
    pub override_signal: Option<OverrideSignal>,
}

impl ActorContext {
    /// A person acting by hand, without override.
    pub fn manual(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            via_automation: false,
            override_signal: None,
        }
    }

    /// The deployment pipeline.
    pub fn automation(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            via_automation: true,
            override_signal: None,
        }
    }

    pub fn with_override(mut self, reason: impl Into<String>) -> Self {
        self.override_signal = Some(OverrideSignal {
            reason: reason.into(),
        });
        self
    }

    /// Build the context from environment variables named by `config`.
    ///
    /// `lookup` is `std::env::var(..).ok()` in production.
    pub fn from_lookup<F>(config: &GateConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let actor = lookup(&config.actor_env)
            .or_else(|| lookup("USER"))
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        let via_automation = lookup(&config.pipeline_marker)
            .map(|v| !v.is_empty() && v != "0")
            .unwrap_or(false);
        let override_signal = lookup(&config.override_env).map(|reason| OverrideSignal { reason });
        Self {
            actor,
            via_automation,
            override_signal,
        }
    }
}

// ---------------------------------------------------------------------------
// StageDecision
// ---------------------------------------------------------------------------

/// The outcome of a single gate stage evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageDecision {
    /// Conclusively allowed; later stages are skipped.
    Allow { reason: String },
    /// Allowed by administrative override; an audit record is produced.
    Override { reason: String },
    /// Not decided here; evaluate the next stage.
    Continue { reason: String },
    /// The mutation is blocked.
    Block { reason: String },
}

impl StageDecision {
    pub fn reason(&self) -> &str {
        match self {
            StageDecision::Allow { reason }
            | StageDecision::Override { reason }
            | StageDecision::Continue { reason }
            | StageDecision::Block { reason } => reason,
        }
    }
}

// ---------------------------------------------------------------------------
// StageResult
// ---------------------------------------------------------------------------

/// Recorded result from a completed stage evaluation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StageResult {
    pub stage_name: String,
    /// `allow`, `override`, `continue` or `block`.
    pub outcome: &'static str,
    pub reason: String,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// GateContext
// ---------------------------------------------------------------------------

/// Contextual information available to every gate stage.
pub struct GateContext<'a> {
    pub validator: &'a TagValidator,
    pub config: &'a GateConfig,
}

impl<'a> GateContext<'a> {
    pub fn new(validator: &'a TagValidator, config: &'a GateConfig) -> Self {
        Self { validator, config }
    }
}

// ---------------------------------------------------------------------------
// GateStage trait
// ---------------------------------------------------------------------------

/// A single evaluation stage in the gate pipeline.
///
/// Stages are evaluated in order until one returns anything other than
/// [`StageDecision::Continue`].
pub trait GateStage: Send + Sync {
    /// Human-readable name of this stage (e.g. "classification").
    fn name(&self) -> &str;

    fn evaluate(
        &self,
        mutation: &RefMutation,
        actor: &ActorContext,
        context: &GateContext<'_>,
    ) -> Result<StageDecision, GateError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn actor_from_environment() {
        let config = GateConfig::default();
        let ctx = ActorContext::from_lookup(
            &config,
            lookup(&[("DTL_ACTOR", "ci-bot"), ("USER", "alex"), ("DTL_PIPELINE", "1")]),
        );
        assert_eq!(ctx.actor, "ci-bot");
        assert!(ctx.via_automation);
        assert!(ctx.override_signal.is_none());
    }

    #[test]
    fn pipeline_marker_zero_is_not_automation() {
        let config = GateConfig::default();
        let ctx = ActorContext::from_lookup(
            &config,
            lookup(&[("USER", "alex"), ("DTL_PIPELINE", "0"), ("DTL_OVERRIDE_REASON", "hotfix")]),
        );
        assert_eq!(ctx.actor, "alex");
        assert!(!ctx.via_automation);
        assert_eq!(ctx.override_signal.unwrap().reason, "hotfix");
    }

    #[test]
    fn unknown_actor_when_nothing_is_set() {
        let ctx = ActorContext::from_lookup(&GateConfig::default(), lookup(&[]));
        assert_eq!(ctx.actor, "unknown");
    }

    #[test]
    fn blank_override_is_invalid() {
        assert!(!OverrideSignal { reason: " ".into() }.is_valid());
        assert!(OverrideSignal { reason: "incident 42".into() }.is_valid());
    }
}
