use crate::error::GateError;
use crate::stage::{ActorContext, GateContext, GateStage, RefMutation, StageDecision};

/// Allows mutations issued by the deployment automation.
pub struct OriginStage;

impl GateStage for OriginStage {
    fn name(&self) -> &str {
        "origin"
    }

    fn evaluate(
        &self,
        _mutation: &RefMutation,
        actor: &ActorContext,
        context: &GateContext<'_>,
    ) -> Result<StageDecision, GateError> {
        if actor.via_automation {
            return Ok(StageDecision::Allow {
                reason: format!(
                    "issued by the deployment pipeline ({} set)",
                    context.config.pipeline_marker
                ),
            });
        }
        Ok(StageDecision::Continue {
            reason: format!("'{}' is not the deployment pipeline", actor.actor),
        })
    }
}
