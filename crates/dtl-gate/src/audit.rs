use chrono::{DateTime, Utc};
use dtl_types::CommitId;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::stage::{ActorContext, MutationOperation, RefMutation};

/// Record of a protected mutation allowed by administrative override.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub actor: String,
    pub tag: String,
    pub operation: MutationOperation,
    pub target: Option<CommitId>,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub(crate) fn for_override(mutation: &RefMutation, actor: &ActorContext) -> Self {
        Self {
            id: Uuid::now_v7(),
            actor: actor.actor.clone(),
            tag: mutation.name.clone(),
            operation: mutation.operation,
            target: mutation.target.clone(),
            reason: actor
                .override_signal
                .as_ref()
                .map(|s| s.reason.trim().to_string())
                .unwrap_or_default(),
            timestamp: Utc::now(),
        }
    }

    /// Emit the record on the `dtl::audit` tracing target.
    pub fn emit(&self) {
        warn!(
            target: "dtl::audit",
            id = %self.id,
            actor = %self.actor,
            tag = %self.tag,
            operation = %self.operation,
            target_commit = self.target.as_ref().map(CommitId::as_str).unwrap_or("-"),
            reason = %self.reason,
            timestamp = %self.timestamp.to_rfc3339(),
            "protected tag mutation allowed by override"
        );
    }
}
