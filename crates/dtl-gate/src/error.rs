use dtl_refs::RefError;

/// Errors that can occur during gate evaluation.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// A protected tag mutation was blocked. The message names the
    /// automated entry point to use instead.
    #[error("{message}")]
    ProtectedRefBlocked { name: String, message: String },

    /// A pre-push hook line could not be parsed.
    #[error("malformed pre-push line '{line}': {reason}")]
    MalformedHookLine { line: String, reason: String },

    #[error(transparent)]
    Refs(#[from] RefError),
}

/// Convenience type alias for gate operations.
pub type Result<T> = std::result::Result<T, GateError>;
