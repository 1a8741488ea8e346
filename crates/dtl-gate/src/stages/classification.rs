use crate::error::GateError;
use crate::stage::{ActorContext, GateContext, GateStage, MutationOperation, RefMutation, StageDecision};

/// Decides whether the mutation touches a protected tag at all.
///
/// Names outside the ledger grammar pass through untouched. Deletes of any
/// ledger tag are protected; creates and moves are protected when the
/// configured policy covers the tag kind.
pub struct ClassificationStage;

impl GateStage for ClassificationStage {
    fn name(&self) -> &str {
        "classification"
    }

    fn evaluate(
        &self,
        mutation: &RefMutation,
        _actor: &ActorContext,
        context: &GateContext<'_>,
    ) -> Result<StageDecision, GateError> {
        let tag = match context.validator.classify(&mutation.name) {
            Ok(tag) => tag,
            Err(_) => {
                return Ok(StageDecision::Allow {
                    reason: format!("'{}' is not a ledger tag", mutation.name),
                })
            }
        };

        let kind = tag.kind();
        if mutation.operation == MutationOperation::Delete || context.config.policy.covers(kind) {
            return Ok(StageDecision::Continue {
                reason: format!("{} of {kind} tag '{tag}' is protected", mutation.operation),
            });
        }

        Ok(StageDecision::Allow {
            reason: format!(
                "{} of {kind} tags is not protected by policy {:?}",
                mutation.operation, context.config.policy
            ),
        })
    }
}
