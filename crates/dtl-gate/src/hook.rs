//! Parsing for the git `pre-push` hook protocol.
//!
//! git writes one line per ref to the hook's stdin:
//!
//! ```text
//! <local ref> SP <local sha> SP <remote ref> SP <remote sha> LF
//! ```
//!
//! An all-zero local sha is a delete and an all-zero remote sha a create.

use dtl_types::CommitId;

use crate::error::{GateError, Result};
use crate::stage::{MutationOperation, RefMutation};

const TAG_PREFIX: &str = "refs/tags/";

fn is_zero_oid(oid: &str) -> bool {
    !oid.is_empty() && oid.bytes().all(|b| b == b'0')
}

/// Parse one pre-push line. Returns `Ok(None)` for refs that are not tags.
pub fn parse_pre_push_line(line: &str) -> Result<Option<RefMutation>> {
    let malformed = |reason: &str| GateError::MalformedHookLine {
        line: line.to_string(),
        reason: reason.to_string(),
    };

    let fields: Vec<&str> = line.split_whitespace().collect();
    let [_local_ref, local_sha, remote_ref, remote_sha] = fields.as_slice() else {
        return Err(malformed("expected 4 space-separated fields"));
    };

    let Some(name) = remote_ref.strip_prefix(TAG_PREFIX) else {
        return Ok(None);
    };
    if name.is_empty() {
        return Err(malformed("empty tag name"));
    }

    let operation = if is_zero_oid(local_sha) {
        MutationOperation::Delete
    } else if is_zero_oid(remote_sha) {
        MutationOperation::Create
    } else {
        MutationOperation::Move
    };
    let target = match operation {
        MutationOperation::Delete => None,
        MutationOperation::Create | MutationOperation::Move => Some(
            CommitId::new(*local_sha).map_err(|e| malformed(&e.to_string()))?,
        ),
    };

    Ok(Some(RefMutation {
        name: name.to_string(),
        operation,
        target,
    }))
}

/// Parse the whole pre-push stdin, skipping blank lines and non-tag refs.
pub fn parse_pre_push(input: &str) -> Result<Vec<RefMutation>> {
    let mut mutations = Vec::new();
    for line in input.lines().filter(|l| !l.trim().is_empty()) {
        if let Some(mutation) = parse_pre_push_line(line)? {
            mutations.push(mutation);
        }
    }
    Ok(mutations)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZERO: &str = "0000000000000000000000000000000000000000";
    const A: &str = "1111111111111111111111111111111111111111";
    const B: &str = "2222222222222222222222222222222222222222";

    #[test]
    fn create_move_and_delete() {
        let create = parse_pre_push_line(&format!("refs/tags/v1.0.0 {A} refs/tags/v1.0.0 {ZERO}"))
            .unwrap()
            .unwrap();
        assert_eq!(create.operation, MutationOperation::Create);
        assert_eq!(create.name, "v1.0.0");
        assert_eq!(create.target.unwrap().as_str(), A);

        let moved = parse_pre_push_line(&format!(
            "refs/tags/api/staging {B} refs/tags/api/staging {A}"
        ))
        .unwrap()
        .unwrap();
        assert_eq!(moved.operation, MutationOperation::Move);
        assert_eq!(moved.name, "api/staging");

        let deleted = parse_pre_push_line(&format!("(delete) {ZERO} refs/tags/production {A}"))
            .unwrap()
            .unwrap();
        assert_eq!(deleted.operation, MutationOperation::Delete);
        assert!(deleted.target.is_none());
    }

    #[test]
    fn branches_are_ignored() {
        let line = format!("refs/heads/main {A} refs/heads/main {B}");
        assert!(parse_pre_push_line(&line).unwrap().is_none());
    }

    #[test]
    fn short_line_is_malformed() {
        let err = parse_pre_push_line("refs/tags/v1.0.0 abc").unwrap_err();
        assert!(matches!(err, GateError::MalformedHookLine { .. }));
    }

    #[test]
    fn whole_input_skips_blanks_and_branches() {
        let input = format!(
            "refs/heads/main {A} refs/heads/main {B}\n\nrefs/tags/production {A} refs/tags/production {B}\n"
        );
        let mutations = parse_pre_push(&input).unwrap();
        assert_eq!(mutations.len(), 1);
        assert_eq!(mutations[0].name, "production");
    }
}
