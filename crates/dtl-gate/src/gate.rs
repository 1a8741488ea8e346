use std::time::{Duration, Instant};

use dtl_refs::TagValidator;
use serde::Serialize;
use tracing::{debug, info};

use crate::audit::AuditRecord;
use crate::config::GateConfig;
use crate::error::{GateError, Result};
use crate::stage::{ActorContext, GateContext, GateStage, RefMutation, StageDecision, StageResult};
use crate::stages::{ClassificationStage, OriginStage, OverrideStage};

// ---------------------------------------------------------------------------
// GateVerdict
// ---------------------------------------------------------------------------

/// The final decision for one mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// `audit` is set when the mutation was allowed by override.
    Allow { audit: Option<AuditRecord> },
    /// `message` names the automated entry point to use instead.
    Block { message: String },
}

/// The outcome of running a mutation through the full gate pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GateVerdict {
    pub mutation: RefMutation,
    pub verdict: Verdict,
    /// Per-stage results in evaluation order.
    pub stage_results: Vec<StageResult>,
    pub elapsed: Duration,
}

impl GateVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self.verdict, Verdict::Allow { .. })
    }

    pub fn audit(&self) -> Option<&AuditRecord> {
        match &self.verdict {
            Verdict::Allow { audit } => audit.as_ref(),
            Verdict::Block { .. } => None,
        }
    }

    pub fn block_message(&self) -> Option<&str> {
        match &self.verdict {
            Verdict::Block { message } => Some(message),
            Verdict::Allow { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ProtectionGate
// ---------------------------------------------------------------------------

/// Client-side protection for managed tags.
///
/// This is a compensating control evaluated by the pre-push hook and by the
/// `dtl` commands. It cannot stop a client that skips the hook; server-side
/// ref protection is outside its reach.
pub struct ProtectionGate {
    stages: Vec<Box<dyn GateStage>>,
    validator: TagValidator,
    config: GateConfig,
}

impl ProtectionGate {
    /// Create a gate with an empty pipeline.
    pub fn new(validator: TagValidator, config: GateConfig) -> Self {
        Self {
            stages: Vec::new(),
            validator,
            config,
        }
    }

    /// Create a gate with the default pipeline:
    /// Classification -> Origin -> Override
    pub fn with_default_stages(validator: TagValidator, config: GateConfig) -> Self {
        let mut gate = Self::new(validator, config);
        gate.add_stage(Box::new(ClassificationStage));
        gate.add_stage(Box::new(OriginStage));
        gate.add_stage(Box::new(OverrideStage));
        gate
    }

    /// Append a stage to the end of the pipeline.
    pub fn add_stage(&mut self, stage: Box<dyn GateStage>) {
        self.stages.push(stage);
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Evaluate one mutation.
    ///
    /// The pipeline stops at the first stage that does not return
    /// [`StageDecision::Continue`]. A pipeline that never decides blocks.
    pub fn evaluate(&self, mutation: &RefMutation, actor: &ActorContext) -> Result<GateVerdict> {
        let pipeline_start = Instant::now();
        let context = GateContext::new(&self.validator, &self.config);
        let mut stage_results = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let stage_start = Instant::now();
            let decision = stage.evaluate(mutation, actor, &context)?;

            let outcome = match &decision {
                StageDecision::Allow { .. } => "allow",
                StageDecision::Override { .. } => "override",
                StageDecision::Continue { .. } => "continue",
                StageDecision::Block { .. } => "block",
            };
            stage_results.push(StageResult {
                stage_name: stage.name().to_string(),
                outcome,
                reason: decision.reason().to_string(),
                elapsed: stage_start.elapsed(),
            });

            let verdict = match decision {
                StageDecision::Continue { .. } => continue,
                StageDecision::Allow { reason } => {
                    debug!(tag = %mutation.name, stage = stage.name(), %reason, "mutation allowed");
                    Verdict::Allow { audit: None }
                }
                StageDecision::Override { .. } => {
                    let audit = AuditRecord::for_override(mutation, actor);
                    audit.emit();
                    Verdict::Allow { audit: Some(audit) }
                }
                StageDecision::Block { reason } => {
                    info!(tag = %mutation.name, actor = %actor.actor, "protected tag mutation blocked");
                    Verdict::Block { message: reason }
                }
            };
            return Ok(GateVerdict {
                mutation: mutation.clone(),
                verdict,
                stage_results,
                elapsed: pipeline_start.elapsed(),
            });
        }

        Ok(GateVerdict {
            mutation: mutation.clone(),
            verdict: Verdict::Block {
                message: format!(
                    "BLOCKED: no gate stage allowed the {} of '{}'",
                    mutation.operation, mutation.name
                ),
            },
            stage_results,
            elapsed: pipeline_start.elapsed(),
        })
    }

    /// Evaluate every mutation of one push.
    pub fn evaluate_all(
        &self,
        mutations: &[RefMutation],
        actor: &ActorContext,
    ) -> Result<Vec<GateVerdict>> {
        mutations.iter().map(|m| self.evaluate(m, actor)).collect()
    }

    /// Evaluate and turn a block into [`GateError::ProtectedRefBlocked`].
    ///
    /// Returns the audit record when the mutation was allowed by override.
    pub fn enforce(&self, mutation: &RefMutation, actor: &ActorContext) -> Result<Option<AuditRecord>> {
        let verdict = self.evaluate(mutation, actor)?;
        match verdict.verdict {
            Verdict::Allow { audit } => Ok(audit),
            Verdict::Block { message } => Err(GateError::ProtectedRefBlocked {
                name: mutation.name.clone(),
                message,
            }),
        }
    }
}
