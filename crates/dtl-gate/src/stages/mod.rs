//! Built-in gate stages.

pub mod admin_override;
pub mod classification;
pub mod origin;

pub use admin_override::OverrideStage;
pub use classification::ClassificationStage;
pub use origin::OriginStage;

use dtl_refs::TagName;

use crate::config::GateConfig;
use crate::stage::MutationOperation;

/// The automated command that performs `operation` on `tag`.
pub(crate) fn entry_point_hint(config: &GateConfig, tag: &TagName, operation: MutationOperation) -> String {
    let ep = &config.entry_point;
    let sub = tag
        .subproject()
        .map(|s| format!(" --subproject {s}"))
        .unwrap_or_default();
    if operation == MutationOperation::Delete {
        return format!("{ep} delete {tag} --override-actor <you> --override-reason <why>");
    }
    match tag {
        TagName::Environment { environment, .. } => format!(
            "{ep} deploy --environment {environment} --version <version>{sub} (or {ep} rollback --environment {environment}{sub})"
        ),
        TagName::Version { version, .. } => format!("{ep} release --version {version}{sub}"),
        TagName::State { version, state, .. } => {
            format!("{ep} mark --version {version} --state {state}{sub}")
        }
    }
}
