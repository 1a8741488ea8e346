use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot read configuration {}: {source}", .path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("version tag '{0}' does not exist; release it first")]
    UnknownVersion(String),

    #[error(transparent)]
    Type(#[from] dtl_types::TypeError),

    #[error(transparent)]
    InvalidFormat(#[from] dtl_refs::ClassifyError),

    #[error(transparent)]
    Ref(#[from] dtl_refs::RefError),

    #[error(transparent)]
    Resolve(#[from] dtl_resolve::ResolveError),

    #[error(transparent)]
    Gate(#[from] dtl_gate::GateError),
}

pub type SdkResult<T> = Result<T, SdkError>;
