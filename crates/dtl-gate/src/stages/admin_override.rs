use crate::error::GateError;
use crate::stage::{
    ActorContext, GateContext, GateStage, MutationOperation, RefMutation, StageDecision,
};
use crate::stages::entry_point_hint;

/// Last stage: an explicit, reasoned override allows the mutation with an
/// audit record; anything else blocks it.
pub struct OverrideStage;

impl GateStage for OverrideStage {
    fn name(&self) -> &str {
        "override"
    }

    fn evaluate(
        &self,
        mutation: &RefMutation,
        actor: &ActorContext,
        context: &GateContext<'_>,
    ) -> Result<StageDecision, GateError> {
        if let Some(signal) = actor.override_signal.as_ref().filter(|s| s.is_valid()) {
            return Ok(StageDecision::Override {
                reason: format!("administrative override by {}: {}", actor.actor, signal.reason.trim()),
            });
        }

        let hint = match context.validator.classify(&mutation.name) {
            Ok(tag) => entry_point_hint(context.config, &tag, mutation.operation),
            Err(_) => context.config.entry_point.clone(),
        };
        Ok(StageDecision::Block {
            reason: format!(
                "BLOCKED: tag '{}' is managed by the deployment pipeline and may not be {} by hand. \
                 Use: {hint}. For an audited emergency override set {} to a reason.",
                mutation.name,
                past_tense(mutation),
                context.config.override_env,
            ),
        })
    }
}

fn past_tense(mutation: &RefMutation) -> &'static str {
    match mutation.operation {
        MutationOperation::Create => "created",
        MutationOperation::Move => "moved",
        MutationOperation::Delete => "deleted",
    }
}
